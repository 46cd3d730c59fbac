use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, now_timestamp, query_list, Conditions};
use crate::db::{map_write_error, DatabaseError};
use crate::models::enums::MedicationType;
use crate::models::*;

const MEDICATION_SELECT: &str = "SELECT m.medication_id, m.name, m.generic_name, m.brand,
        m.manufacturer, m.medication_type, m.description, m.dosage_form, m.strength,
        m.dosage_unit, m.side_effects, m.contraindications, m.storage,
        m.requires_prescription, m.price, m.stock_quantity, m.reorder_level, m.batch_number,
        m.manufacture_date, m.expiry_date, m.barcode, m.ndc_code, m.is_active,
        m.created_at, m.updated_at
     FROM medications m";

const MEDICATION_ORDER: &str = "m.name COLLATE NOCASE, m.medication_id";

/// Catalog queries.
#[derive(Debug, Clone)]
pub enum MedicationFilter<'a> {
    All,
    /// Case-insensitive substring of name, generic name or brand.
    Search(&'a str),
    Type(MedicationType),
    DosageForm(&'a str),
    RequiresPrescription(bool),
    Active(bool),
    /// Expiry strictly before the given day.
    ExpiredBefore(NaiveDate),
    /// Expiry within `[from, to]`.
    ExpiringBetween(NaiveDate, NaiveDate),
    /// Stock at or below the reorder level.
    ToReorder,
    OutOfStock,
}

impl MedicationFilter<'_> {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::new();
        match self {
            Self::All => {}
            Self::Search(term) => {
                c.push(
                    "LOWER(m.name || ' ' || COALESCE(m.generic_name, '') || ' ' || COALESCE(m.brand, '')) LIKE ?",
                    format!("%{}%", term.trim().to_lowercase()),
                );
            }
            Self::Type(t) => {
                c.push("m.medication_type = ?", t.as_str().to_string());
            }
            Self::DosageForm(form) => {
                c.push("m.dosage_form = ? COLLATE NOCASE", form.to_string());
            }
            Self::RequiresPrescription(flag) => {
                c.push("m.requires_prescription = ?", *flag);
            }
            Self::Active(flag) => {
                c.push("m.is_active = ?", *flag);
            }
            Self::ExpiredBefore(day) => {
                c.push("m.expiry_date < ?", day.to_string());
            }
            Self::ExpiringBetween(from, to) => {
                c.push("m.expiry_date >= ?", from.to_string())
                    .push("m.expiry_date <= ?", to.to_string());
            }
            Self::ToReorder => {
                c.push_raw("m.reorder_level IS NOT NULL")
                    .push_raw("m.stock_quantity <= m.reorder_level");
            }
            Self::OutOfStock => {
                c.push_raw("m.stock_quantity = 0");
            }
        }
        c
    }
}

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<i64, DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO medications (name, generic_name, brand, manufacturer, medication_type,
         description, dosage_form, strength, dosage_unit, side_effects, contraindications, storage,
         requires_prescription, price, stock_quantity, reorder_level, batch_number,
         manufacture_date, expiry_date, barcode, ndc_code, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21, ?22, ?23, ?23)",
        params![
            med.name,
            med.generic_name,
            med.brand,
            med.manufacturer,
            med.medication_type,
            med.description,
            med.dosage_form,
            med.strength,
            med.dosage_unit,
            med.side_effects,
            med.contraindications,
            med.storage,
            med.requires_prescription,
            med.price,
            med.stock_quantity,
            med.reorder_level,
            med.batch_number,
            med.manufacture_date.map(|d| d.to_string()),
            med.expiry_date.map(|d| d.to_string()),
            med.barcode,
            med.ndc_code,
            med.is_active,
            now,
        ],
    )
    .map_err(|e| map_write_error(e, "Medication"))?;
    Ok(conn.last_insert_rowid())
}

pub fn get_medication(conn: &Connection, medication_id: i64) -> Result<Option<Medication>, DatabaseError> {
    let med = conn
        .query_row(
            &format!("{MEDICATION_SELECT} WHERE m.medication_id = ?1"),
            params![medication_id],
            medication_from_row,
        )
        .optional()?;
    Ok(med)
}

pub fn list_medications(
    conn: &Connection,
    filter: &MedicationFilter<'_>,
) -> Result<Vec<Medication>, DatabaseError> {
    query_list(
        conn,
        MEDICATION_SELECT,
        &filter.conditions(),
        MEDICATION_ORDER,
        medication_from_row,
        "medication",
    )
}

pub fn update_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE medications SET name = ?2, generic_name = ?3, brand = ?4, manufacturer = ?5,
             medication_type = ?6, description = ?7, dosage_form = ?8, strength = ?9,
             dosage_unit = ?10, side_effects = ?11, contraindications = ?12, storage = ?13,
             requires_prescription = ?14, price = ?15, stock_quantity = ?16, reorder_level = ?17,
             batch_number = ?18, manufacture_date = ?19, expiry_date = ?20, barcode = ?21,
             ndc_code = ?22, is_active = ?23, updated_at = ?24
             WHERE medication_id = ?1",
            params![
                med.medication_id,
                med.name,
                med.generic_name,
                med.brand,
                med.manufacturer,
                med.medication_type,
                med.description,
                med.dosage_form,
                med.strength,
                med.dosage_unit,
                med.side_effects,
                med.contraindications,
                med.storage,
                med.requires_prescription,
                med.price,
                med.stock_quantity,
                med.reorder_level,
                med.batch_number,
                med.manufacture_date.map(|d| d.to_string()),
                med.expiry_date.map(|d| d.to_string()),
                med.barcode,
                med.ndc_code,
                med.is_active,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Medication"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Medication", med.medication_id));
    }
    Ok(())
}

pub fn set_medication_stock(conn: &Connection, medication_id: i64, quantity: i32) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE medications SET stock_quantity = ?2, updated_at = ?3 WHERE medication_id = ?1",
            params![medication_id, quantity, format_timestamp(&now_timestamp())],
        )
        .map_err(|e| map_write_error(e, "Medication"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Medication", medication_id));
    }
    Ok(())
}

pub fn delete_medication_row(conn: &Connection, medication_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM medications WHERE medication_id = ?1",
        params![medication_id],
    )?;
    Ok(deleted)
}

fn medication_from_row(row: &Row<'_>) -> rusqlite::Result<Medication> {
    Ok(Medication {
        medication_id: row.get("medication_id")?,
        name: row.get("name")?,
        generic_name: row.get("generic_name")?,
        brand: row.get("brand")?,
        manufacturer: row.get("manufacturer")?,
        medication_type: row.get("medication_type")?,
        description: row.get("description")?,
        dosage_form: row.get("dosage_form")?,
        strength: row.get("strength")?,
        dosage_unit: row.get("dosage_unit")?,
        side_effects: row.get("side_effects")?,
        contraindications: row.get("contraindications")?,
        storage: row.get("storage")?,
        requires_prescription: row.get("requires_prescription")?,
        price: row.get("price")?,
        stock_quantity: row.get("stock_quantity")?,
        reorder_level: row.get("reorder_level")?,
        batch_number: row.get("batch_number")?,
        manufacture_date: row.get("manufacture_date")?,
        expiry_date: row.get("expiry_date")?,
        barcode: row.get("barcode")?,
        ndc_code: row.get("ndc_code")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
