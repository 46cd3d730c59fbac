use rusqlite::{params, Connection, OptionalExtension, Row};

use super::user::{account_from_row, ACCOUNT_COLUMNS};
use super::{collect_lenient, format_timestamp, now_timestamp};
use crate::db::{map_delete_error, map_write_error, DatabaseError};
use crate::models::*;

const PATIENT_COLUMNS: &str = "p.patient_id, p.user_id, p.first_name, p.last_name, p.blood_group,
     p.height, p.weight, p.allergies, p.emergency_contact_name, p.emergency_contact_phone,
     p.insurance_provider, p.insurance_id, p.primary_doctor_id, p.created_at, p.updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO patients (patient_id, user_id, first_name, last_name, blood_group, height,
         weight, allergies, emergency_contact_name, emergency_contact_phone, insurance_provider,
         insurance_id, primary_doctor_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            patient.patient_id,
            patient.user_id,
            patient.first_name,
            patient.last_name,
            patient.blood_group,
            patient.height,
            patient.weight,
            patient.allergies,
            patient.emergency_contact_name,
            patient.emergency_contact_phone,
            patient.insurance_provider,
            patient.insurance_id,
            patient.primary_doctor_id,
            now,
        ],
    )?;
    Ok(())
}

pub fn patient_exists(conn: &Connection, patient_id: &str) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM patients WHERE patient_id = ?1)",
        params![patient_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_patient(conn: &Connection, patient_id: &str) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.patient_id = ?1"),
            params![patient_id],
            patient_from_row,
        )
        .optional()?;
    Ok(patient)
}

pub fn get_patient_by_user(conn: &Connection, user_id: i64) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.user_id = ?1"),
            params![user_id],
            patient_from_row,
        )
        .optional()?;
    Ok(patient)
}

fn profile_select() -> String {
    format!(
        "SELECT {PATIENT_COLUMNS}, {ACCOUNT_COLUMNS},
            'Dr. ' || pd.first_name || ' ' || pd.last_name AS primary_doctor_name
         FROM patients p
         JOIN users u ON u.user_id = p.user_id
         LEFT JOIN doctors pd ON pd.doctor_id = p.primary_doctor_id"
    )
}

pub fn get_patient_profile(conn: &Connection, patient_id: &str) -> Result<Option<PatientProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            &format!("{} WHERE p.patient_id = ?1", profile_select()),
            params![patient_id],
            patient_profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

pub fn list_patient_profiles(conn: &Connection) -> Result<Vec<PatientProfile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY p.last_name, p.first_name", profile_select()))?;
    let rows = stmt.query_map([], patient_profile_from_row)?;
    Ok(collect_lenient(rows, "patient"))
}

/// Case-insensitive substring match on name, patient ID or email.
pub fn search_patient_profiles(conn: &Connection, query: &str) -> Result<Vec<PatientProfile>, DatabaseError> {
    let pattern = format!("%{}%", query.trim());
    let mut stmt = conn.prepare(&format!(
        "{} WHERE LOWER(p.first_name) LIKE LOWER(?1)
            OR LOWER(p.last_name) LIKE LOWER(?1)
            OR LOWER(p.first_name || ' ' || p.last_name) LIKE LOWER(?1)
            OR LOWER(p.patient_id) LIKE LOWER(?1)
            OR LOWER(u.email) LIKE LOWER(?1)
         ORDER BY p.last_name, p.first_name",
        profile_select()
    ))?;
    let rows = stmt.query_map(params![pattern], patient_profile_from_row)?;
    Ok(collect_lenient(rows, "patient"))
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE patients SET first_name = ?2, last_name = ?3, blood_group = ?4, height = ?5,
             weight = ?6, allergies = ?7, emergency_contact_name = ?8, emergency_contact_phone = ?9,
             insurance_provider = ?10, insurance_id = ?11, primary_doctor_id = ?12, updated_at = ?13
             WHERE patient_id = ?1",
            params![
                patient.patient_id,
                patient.first_name,
                patient.last_name,
                patient.blood_group,
                patient.height,
                patient.weight,
                patient.allergies,
                patient.emergency_contact_name,
                patient.emergency_contact_phone,
                patient.insurance_provider,
                patient.insurance_id,
                patient.primary_doctor_id,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Patient"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Patient", &patient.patient_id));
    }
    Ok(())
}

/// Null the primary-doctor link on every patient pointing at `doctor_id`.
pub fn clear_primary_doctor(conn: &Connection, doctor_id: &str) -> Result<usize, DatabaseError> {
    let cleared = conn.execute(
        "UPDATE patients SET primary_doctor_id = NULL, updated_at = ?2 WHERE primary_doctor_id = ?1",
        params![doctor_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(cleared)
}

pub fn delete_patient_row(conn: &Connection, patient_id: &str) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM patients WHERE patient_id = ?1", params![patient_id])
        .map_err(|e| map_delete_error(e, "Patient"))?;
    Ok(deleted)
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        patient_id: row.get("patient_id")?,
        user_id: row.get("user_id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        blood_group: row.get("blood_group")?,
        height: row.get("height")?,
        weight: row.get("weight")?,
        allergies: row.get("allergies")?,
        emergency_contact_name: row.get("emergency_contact_name")?,
        emergency_contact_phone: row.get("emergency_contact_phone")?,
        insurance_provider: row.get("insurance_provider")?,
        insurance_id: row.get("insurance_id")?,
        primary_doctor_id: row.get("primary_doctor_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn patient_profile_from_row(row: &Row<'_>) -> rusqlite::Result<PatientProfile> {
    Ok(PatientProfile {
        patient: patient_from_row(row)?,
        account: account_from_row(row)?,
        primary_doctor_name: row.get("primary_doctor_name")?,
    })
}
