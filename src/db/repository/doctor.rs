use rusqlite::{params, Connection, OptionalExtension, Row};

use super::user::{account_from_row, ACCOUNT_COLUMNS};
use super::{collect_lenient, format_timestamp, now_timestamp};
use crate::db::{map_delete_error, map_write_error, DatabaseError};
use crate::models::*;

const DOCTOR_COLUMNS: &str = "d.doctor_id, d.user_id, d.first_name, d.last_name, d.specialization,
     d.qualification, d.experience_years, d.license_number, d.consultation_fee, d.bio, d.rating,
     d.department_id, d.created_at, d.updated_at";

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO doctors (doctor_id, user_id, first_name, last_name, specialization,
         qualification, experience_years, license_number, consultation_fee, bio, rating,
         department_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            doctor.doctor_id,
            doctor.user_id,
            doctor.first_name,
            doctor.last_name,
            doctor.specialization,
            doctor.qualification,
            doctor.experience_years,
            doctor.license_number,
            doctor.consultation_fee,
            doctor.bio,
            doctor.rating,
            doctor.department_id,
            now,
        ],
    )?;
    Ok(())
}

pub fn doctor_exists(conn: &Connection, doctor_id: &str) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM doctors WHERE doctor_id = ?1)",
        params![doctor_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_doctor(conn: &Connection, doctor_id: &str) -> Result<Option<Doctor>, DatabaseError> {
    let doctor = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors d WHERE d.doctor_id = ?1"),
            params![doctor_id],
            doctor_from_row,
        )
        .optional()?;
    Ok(doctor)
}

pub fn get_doctor_by_user(conn: &Connection, user_id: i64) -> Result<Option<Doctor>, DatabaseError> {
    let doctor = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors d WHERE d.user_id = ?1"),
            params![user_id],
            doctor_from_row,
        )
        .optional()?;
    Ok(doctor)
}

fn profile_select() -> String {
    format!(
        "SELECT {DOCTOR_COLUMNS}, {ACCOUNT_COLUMNS}, dep.name AS department_name
         FROM doctors d
         JOIN users u ON u.user_id = d.user_id
         LEFT JOIN departments dep ON dep.department_id = d.department_id"
    )
}

pub fn get_doctor_profile(conn: &Connection, doctor_id: &str) -> Result<Option<DoctorProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            &format!("{} WHERE d.doctor_id = ?1", profile_select()),
            params![doctor_id],
            doctor_profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

pub fn list_doctor_profiles(conn: &Connection) -> Result<Vec<DoctorProfile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY d.last_name, d.first_name", profile_select()))?;
    let rows = stmt.query_map([], doctor_profile_from_row)?;
    Ok(collect_lenient(rows, "doctor"))
}

/// Overwrite the editable doctor columns.
pub fn update_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE doctors SET first_name = ?2, last_name = ?3, specialization = ?4,
             qualification = ?5, experience_years = ?6, license_number = ?7,
             consultation_fee = ?8, bio = ?9, rating = ?10, department_id = ?11, updated_at = ?12
             WHERE doctor_id = ?1",
            params![
                doctor.doctor_id,
                doctor.first_name,
                doctor.last_name,
                doctor.specialization,
                doctor.qualification,
                doctor.experience_years,
                doctor.license_number,
                doctor.consultation_fee,
                doctor.bio,
                doctor.rating,
                doctor.department_id,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Doctor"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Doctor", &doctor.doctor_id));
    }
    Ok(())
}

pub fn delete_doctor_row(conn: &Connection, doctor_id: &str) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM doctors WHERE doctor_id = ?1", params![doctor_id])
        .map_err(|e| map_delete_error(e, "Doctor"))?;
    Ok(deleted)
}

pub(crate) fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        doctor_id: row.get("doctor_id")?,
        user_id: row.get("user_id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        specialization: row.get("specialization")?,
        qualification: row.get("qualification")?,
        experience_years: row.get("experience_years")?,
        license_number: row.get("license_number")?,
        consultation_fee: row.get("consultation_fee")?,
        bio: row.get("bio")?,
        rating: row.get("rating")?,
        department_id: row.get("department_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn doctor_profile_from_row(row: &Row<'_>) -> rusqlite::Result<DoctorProfile> {
    Ok(DoctorProfile {
        doctor: doctor_from_row(row)?,
        account: account_from_row(row)?,
        department_name: row.get("department_name")?,
    })
}
