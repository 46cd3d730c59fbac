use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{collect_lenient, format_timestamp, now_timestamp, query_count, query_list, Conditions};
use crate::db::{map_write_error, DatabaseError};
use crate::models::enums::PrescriptionStatus;
use crate::models::*;

const PRESCRIPTION_SELECT: &str = "SELECT rx.prescription_id, rx.patient_id, rx.doctor_id,
        rx.medical_record_id, rx.pharmacy_id, rx.prescription_date, rx.expiry_date, rx.status,
        rx.notes, rx.is_refillable, rx.total_refills, rx.refills_remaining,
        rx.created_at, rx.updated_at,
        p.first_name || ' ' || p.last_name AS patient_name,
        'Dr. ' || d.first_name || ' ' || d.last_name AS doctor_name,
        ph.name AS pharmacy_name, ph.address AS pharmacy_address,
        ph.phone_number AS pharmacy_phone
     FROM prescriptions rx
     LEFT JOIN patients p ON p.patient_id = rx.patient_id
     LEFT JOIN doctors d ON d.doctor_id = rx.doctor_id
     LEFT JOIN pharmacies ph ON ph.pharmacy_id = rx.pharmacy_id";

const PRESCRIPTION_ORDER: &str = "rx.prescription_date DESC, rx.prescription_id DESC";

#[derive(Debug, Clone)]
pub enum PrescriptionFilter<'a> {
    All,
    Patient(&'a str),
    Doctor(&'a str),
    Pharmacy(i64),
    Status(PrescriptionStatus),
    /// Inclusive on both ends.
    DateRange(NaiveDate, NaiveDate),
    PatientAndStatus(&'a str, PrescriptionStatus),
    DoctorAndStatus(&'a str, PrescriptionStatus),
    /// ACTIVE with an expiry date strictly before the given day.
    ActiveExpiredBefore(NaiveDate),
}

impl PrescriptionFilter<'_> {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::new();
        match self {
            Self::All => {}
            Self::Patient(id) => {
                c.push("rx.patient_id = ?", id.to_string());
            }
            Self::Doctor(id) => {
                c.push("rx.doctor_id = ?", id.to_string());
            }
            Self::Pharmacy(id) => {
                c.push("rx.pharmacy_id = ?", *id);
            }
            Self::Status(s) => {
                c.push("rx.status = ?", s.as_str().to_string());
            }
            Self::DateRange(from, to) => {
                c.push("rx.prescription_date >= ?", from.to_string())
                    .push("rx.prescription_date <= ?", to.to_string());
            }
            Self::PatientAndStatus(id, s) => {
                c.push("rx.patient_id = ?", id.to_string())
                    .push("rx.status = ?", s.as_str().to_string());
            }
            Self::DoctorAndStatus(id, s) => {
                c.push("rx.doctor_id = ?", id.to_string())
                    .push("rx.status = ?", s.as_str().to_string());
            }
            Self::ActiveExpiredBefore(day) => {
                c.push_raw("rx.status = 'ACTIVE'")
                    .push_raw("rx.expiry_date IS NOT NULL")
                    .push("rx.expiry_date < ?", day.to_string());
            }
        }
        c
    }
}

/// Insert a prescription with its medication lines.
pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<i64, DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO prescriptions (patient_id, doctor_id, medical_record_id, pharmacy_id,
         prescription_date, expiry_date, status, notes, is_refillable, total_refills,
         refills_remaining, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            rx.patient_id,
            rx.doctor_id,
            rx.medical_record_id,
            rx.pharmacy_id,
            rx.prescription_date.to_string(),
            rx.expiry_date.map(|d| d.to_string()),
            rx.status,
            rx.notes,
            rx.is_refillable,
            rx.total_refills,
            rx.refills_remaining,
            now,
        ],
    )
    .map_err(|e| map_write_error(e, "Prescription"))?;
    let id = conn.last_insert_rowid();
    replace_medication_lines(conn, id, &rx.medications)?;
    Ok(id)
}

/// Replace the ordered medication lines of a prescription.
pub fn replace_medication_lines(
    conn: &Connection,
    prescription_id: i64,
    lines: &[MedicationLine],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM prescription_medications WHERE prescription_id = ?1",
        params![prescription_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO prescription_medications (prescription_id, position, medication_name,
         dosage, frequency, instructions, quantity, duration)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, line) in lines.iter().enumerate() {
        stmt.execute(params![
            prescription_id,
            position as i64,
            line.medication_name,
            line.dosage,
            line.frequency,
            line.instructions,
            line.quantity,
            line.duration,
        ])?;
    }
    Ok(())
}

fn medication_lines(conn: &Connection, prescription_id: i64) -> Result<Vec<MedicationLine>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT medication_name, dosage, frequency, instructions, quantity, duration
         FROM prescription_medications WHERE prescription_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![prescription_id], |row| {
        Ok(MedicationLine {
            medication_name: row.get(0)?,
            dosage: row.get(1)?,
            frequency: row.get(2)?,
            instructions: row.get(3)?,
            quantity: row.get(4)?,
            duration: row.get(5)?,
        })
    })?;
    Ok(collect_lenient(rows, "medication_line"))
}

pub fn get_prescription(conn: &Connection, prescription_id: i64) -> Result<Option<Prescription>, DatabaseError> {
    let rx = conn
        .query_row(
            &format!("{PRESCRIPTION_SELECT} WHERE rx.prescription_id = ?1"),
            params![prescription_id],
            prescription_from_row,
        )
        .optional()?;
    match rx {
        Some(mut rx) => {
            rx.medications = medication_lines(conn, rx.prescription_id)?;
            Ok(Some(rx))
        }
        None => Ok(None),
    }
}

pub fn list_prescriptions(
    conn: &Connection,
    filter: &PrescriptionFilter<'_>,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut list = query_list(
        conn,
        PRESCRIPTION_SELECT,
        &filter.conditions(),
        PRESCRIPTION_ORDER,
        prescription_from_row,
        "prescription",
    )?;
    for rx in &mut list {
        rx.medications = medication_lines(conn, rx.prescription_id)?;
    }
    Ok(list)
}

pub fn count_prescriptions_for_doctor_on(
    conn: &Connection,
    doctor_id: &str,
    date: NaiveDate,
) -> Result<i64, DatabaseError> {
    let mut c = Conditions::new();
    c.push("doctor_id = ?", doctor_id.to_string())
        .push("prescription_date = ?", date.to_string());
    query_count(conn, "SELECT COUNT(*) FROM prescriptions", &c)
}

pub fn count_prescriptions_for_patient_between(
    conn: &Connection,
    patient_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<i64, DatabaseError> {
    let mut c = Conditions::new();
    c.push("patient_id = ?", patient_id.to_string())
        .push("prescription_date >= ?", from.to_string())
        .push("prescription_date <= ?", to.to_string());
    query_count(conn, "SELECT COUNT(*) FROM prescriptions", &c)
}

/// Overwrite the prescription row (not its lines).
pub fn update_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE prescriptions SET patient_id = ?2, doctor_id = ?3, medical_record_id = ?4,
             pharmacy_id = ?5, prescription_date = ?6, expiry_date = ?7, status = ?8, notes = ?9,
             is_refillable = ?10, total_refills = ?11, refills_remaining = ?12, updated_at = ?13
             WHERE prescription_id = ?1",
            params![
                rx.prescription_id,
                rx.patient_id,
                rx.doctor_id,
                rx.medical_record_id,
                rx.pharmacy_id,
                rx.prescription_date.to_string(),
                rx.expiry_date.map(|d| d.to_string()),
                rx.status,
                rx.notes,
                rx.is_refillable,
                rx.total_refills,
                rx.refills_remaining,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Prescription"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Prescription", rx.prescription_id));
    }
    Ok(())
}

/// Write status and remaining refills together.
pub fn set_prescription_state(
    conn: &Connection,
    prescription_id: i64,
    status: PrescriptionStatus,
    refills_remaining: i32,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE prescriptions SET status = ?2, refills_remaining = ?3, updated_at = ?4
         WHERE prescription_id = ?1",
        params![
            prescription_id,
            status,
            refills_remaining,
            format_timestamp(&now_timestamp()),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Prescription", prescription_id));
    }
    Ok(())
}

/// Null the doctor on every prescription of `doctor_id` and cancel it.
pub fn cancel_prescriptions_of_doctor(conn: &Connection, doctor_id: &str) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE prescriptions SET doctor_id = NULL, status = 'CANCELLED', refills_remaining = 0,
         updated_at = ?2 WHERE doctor_id = ?1",
        params![doctor_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(n)
}

/// Null the patient on every prescription of `patient_id` and cancel it.
pub fn cancel_prescriptions_of_patient(conn: &Connection, patient_id: &str) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE prescriptions SET patient_id = NULL, status = 'CANCELLED', refills_remaining = 0,
         updated_at = ?2 WHERE patient_id = ?1",
        params![patient_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(n)
}

pub fn delete_prescription_row(conn: &Connection, prescription_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM prescriptions WHERE prescription_id = ?1",
        params![prescription_id],
    )?;
    Ok(deleted)
}

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        prescription_id: row.get("prescription_id")?,
        patient_id: row.get("patient_id")?,
        doctor_id: row.get("doctor_id")?,
        medical_record_id: row.get("medical_record_id")?,
        pharmacy_id: row.get("pharmacy_id")?,
        prescription_date: row.get("prescription_date")?,
        expiry_date: row.get("expiry_date")?,
        status: row.get("status")?,
        notes: row.get("notes")?,
        is_refillable: row.get("is_refillable")?,
        total_refills: row.get("total_refills")?,
        refills_remaining: row.get("refills_remaining")?,
        medications: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        patient_name: row.get("patient_name")?,
        doctor_name: row.get("doctor_name")?,
        pharmacy_name: row.get("pharmacy_name")?,
        pharmacy_address: row.get("pharmacy_address")?,
        pharmacy_phone: row.get("pharmacy_phone")?,
    })
}
