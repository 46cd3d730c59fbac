use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, now_timestamp, query_list, Conditions};
use crate::db::{map_write_error, DatabaseError};
use crate::models::*;

const PHARMACY_SELECT: &str = "SELECT ph.pharmacy_id, ph.name, ph.address, ph.city, ph.state,
        ph.zip_code, ph.country, ph.phone_number, ph.email, ph.website, ph.license_number,
        ph.is_active, ph.latitude, ph.longitude, ph.operating_hours, ph.created_at, ph.updated_at
     FROM pharmacies ph";

const PHARMACY_ORDER: &str = "ph.name COLLATE NOCASE, ph.pharmacy_id";

#[derive(Debug, Clone)]
pub enum PharmacyFilter<'a> {
    All,
    /// Case-insensitive substring of the name or address.
    Search(&'a str),
    Active(bool),
    /// Each present part must be a case-insensitive substring; absent parts are ignored.
    Address {
        city: Option<&'a str>,
        state: Option<&'a str>,
        zip_code: Option<&'a str>,
    },
}

fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim().to_lowercase())
}

impl PharmacyFilter<'_> {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::new();
        match self {
            Self::All => {}
            Self::Search(term) => {
                c.push(
                    "LOWER(ph.name || ' ' || COALESCE(ph.address, '')) LIKE ?",
                    like_pattern(term),
                );
            }
            Self::Active(flag) => {
                c.push("ph.is_active = ?", *flag);
            }
            Self::Address { city, state, zip_code } => {
                if let Some(city) = city.filter(|s| !s.trim().is_empty()) {
                    c.push("LOWER(ph.city) LIKE ?", like_pattern(city));
                }
                if let Some(state) = state.filter(|s| !s.trim().is_empty()) {
                    c.push("LOWER(ph.state) LIKE ?", like_pattern(state));
                }
                if let Some(zip) = zip_code.filter(|s| !s.trim().is_empty()) {
                    c.push("LOWER(ph.zip_code) LIKE ?", like_pattern(zip));
                }
            }
        }
        c
    }
}

pub fn insert_pharmacy(conn: &Connection, pharmacy: &Pharmacy) -> Result<i64, DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO pharmacies (name, address, city, state, zip_code, country, phone_number,
         email, website, license_number, is_active, latitude, longitude, operating_hours,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
        params![
            pharmacy.name,
            pharmacy.address,
            pharmacy.city,
            pharmacy.state,
            pharmacy.zip_code,
            pharmacy.country,
            pharmacy.phone_number,
            pharmacy.email,
            pharmacy.website,
            pharmacy.license_number,
            pharmacy.is_active,
            pharmacy.latitude,
            pharmacy.longitude,
            pharmacy.operating_hours,
            now,
        ],
    )
    .map_err(|e| map_write_error(e, "Pharmacy"))?;
    Ok(conn.last_insert_rowid())
}

pub fn pharmacy_exists(conn: &Connection, pharmacy_id: i64) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pharmacies WHERE pharmacy_id = ?1)",
        params![pharmacy_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_pharmacy(conn: &Connection, pharmacy_id: i64) -> Result<Option<Pharmacy>, DatabaseError> {
    let pharmacy = conn
        .query_row(
            &format!("{PHARMACY_SELECT} WHERE ph.pharmacy_id = ?1"),
            params![pharmacy_id],
            pharmacy_from_row,
        )
        .optional()?;
    Ok(pharmacy)
}

pub fn list_pharmacies(conn: &Connection, filter: &PharmacyFilter<'_>) -> Result<Vec<Pharmacy>, DatabaseError> {
    query_list(
        conn,
        PHARMACY_SELECT,
        &filter.conditions(),
        PHARMACY_ORDER,
        pharmacy_from_row,
        "pharmacy",
    )
}

pub fn update_pharmacy(conn: &Connection, pharmacy: &Pharmacy) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE pharmacies SET name = ?2, address = ?3, city = ?4, state = ?5, zip_code = ?6,
             country = ?7, phone_number = ?8, email = ?9, website = ?10, license_number = ?11,
             is_active = ?12, latitude = ?13, longitude = ?14, operating_hours = ?15,
             updated_at = ?16
             WHERE pharmacy_id = ?1",
            params![
                pharmacy.pharmacy_id,
                pharmacy.name,
                pharmacy.address,
                pharmacy.city,
                pharmacy.state,
                pharmacy.zip_code,
                pharmacy.country,
                pharmacy.phone_number,
                pharmacy.email,
                pharmacy.website,
                pharmacy.license_number,
                pharmacy.is_active,
                pharmacy.latitude,
                pharmacy.longitude,
                pharmacy.operating_hours,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Pharmacy"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Pharmacy", pharmacy.pharmacy_id));
    }
    Ok(())
}

/// Prescriptions pointing here have their pharmacy nulled by the schema.
pub fn delete_pharmacy_row(conn: &Connection, pharmacy_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM pharmacies WHERE pharmacy_id = ?1",
        params![pharmacy_id],
    )?;
    Ok(deleted)
}

fn pharmacy_from_row(row: &Row<'_>) -> rusqlite::Result<Pharmacy> {
    Ok(Pharmacy {
        pharmacy_id: row.get("pharmacy_id")?,
        name: row.get("name")?,
        address: row.get("address")?,
        city: row.get("city")?,
        state: row.get("state")?,
        zip_code: row.get("zip_code")?,
        country: row.get("country")?,
        phone_number: row.get("phone_number")?,
        email: row.get("email")?,
        website: row.get("website")?,
        license_number: row.get("license_number")?,
        is_active: row.get("is_active")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        operating_hours: row.get("operating_hours")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
