use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, now_timestamp, query_count, query_list, Conditions};
use crate::db::{map_delete_error, map_write_error, DatabaseError};
use crate::models::enums::AppointmentStatus;
use crate::models::*;

const APPOINTMENT_SELECT: &str = "SELECT a.appointment_id, a.patient_id, a.doctor_id,
        a.department_id, a.appointment_date, a.start_time, a.end_time, a.status, a.reason,
        a.notes, a.appointment_fee, a.is_paid, a.created_at, a.updated_at,
        p.first_name || ' ' || p.last_name AS patient_name,
        pu.email AS patient_email, pu.phone_number AS patient_phone,
        'Dr. ' || d.first_name || ' ' || d.last_name AS doctor_name,
        d.specialization AS doctor_specialization,
        dep.name AS department_name
     FROM appointments a
     LEFT JOIN patients p ON p.patient_id = a.patient_id
     LEFT JOIN users pu ON pu.user_id = p.user_id
     LEFT JOIN doctors d ON d.doctor_id = a.doctor_id
     LEFT JOIN departments dep ON dep.department_id = a.department_id";

const APPOINTMENT_ORDER: &str = "a.appointment_date, a.start_time, a.appointment_id";

/// Selection criteria for appointment lists.
#[derive(Debug, Clone)]
pub enum AppointmentFilter<'a> {
    All,
    Doctor(&'a str),
    Patient(&'a str),
    Date(NaiveDate),
    /// Inclusive on both ends.
    DateRange(NaiveDate, NaiveDate),
    Status(AppointmentStatus),
}

impl AppointmentFilter<'_> {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::new();
        match self {
            Self::All => {}
            Self::Doctor(id) => {
                c.push("a.doctor_id = ?", id.to_string());
            }
            Self::Patient(id) => {
                c.push("a.patient_id = ?", id.to_string());
            }
            Self::Date(date) => {
                c.push("a.appointment_date = ?", date.to_string());
            }
            Self::DateRange(from, to) => {
                c.push("a.appointment_date >= ?", from.to_string())
                    .push("a.appointment_date <= ?", to.to_string());
            }
            Self::Status(status) => {
                c.push("a.status = ?", status.as_str().to_string());
            }
        }
        c
    }
}

/// Insert an appointment. The id on `appt` is ignored; the new id is returned.
pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<i64, DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO appointments (patient_id, doctor_id, department_id, appointment_date,
         start_time, end_time, status, reason, notes, appointment_fee, is_paid, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            appt.patient_id,
            appt.doctor_id,
            appt.department_id,
            appt.appointment_date.to_string(),
            appt.start_time.map(|t| t.format("%H:%M:%S").to_string()),
            appt.end_time.map(|t| t.format("%H:%M:%S").to_string()),
            appt.status,
            appt.reason,
            appt.notes,
            appt.appointment_fee,
            appt.is_paid,
            now,
        ],
    )
    .map_err(|e| map_write_error(e, "Appointment"))?;
    Ok(conn.last_insert_rowid())
}

pub fn appointment_exists(conn: &Connection, appointment_id: i64) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM appointments WHERE appointment_id = ?1)",
        params![appointment_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_appointment(conn: &Connection, appointment_id: i64) -> Result<Option<Appointment>, DatabaseError> {
    let appt = conn
        .query_row(
            &format!("{APPOINTMENT_SELECT} WHERE a.appointment_id = ?1"),
            params![appointment_id],
            appointment_from_row,
        )
        .optional()?;
    Ok(appt)
}

pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter<'_>,
) -> Result<Vec<Appointment>, DatabaseError> {
    query_list(
        conn,
        APPOINTMENT_SELECT,
        &filter.conditions(),
        APPOINTMENT_ORDER,
        appointment_from_row,
        "appointment",
    )
}

pub fn count_appointments_on(conn: &Connection, date: NaiveDate) -> Result<i64, DatabaseError> {
    let mut c = Conditions::new();
    c.push("a.appointment_date = ?", date.to_string());
    query_count(conn, "SELECT COUNT(*) FROM appointments a", &c)
}

/// Overwrite references and fields. The paid flag is left to settlement.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE appointments SET patient_id = ?2, doctor_id = ?3, department_id = ?4,
             appointment_date = ?5, start_time = ?6, end_time = ?7, status = ?8, reason = ?9,
             notes = ?10, appointment_fee = ?11, updated_at = ?12
             WHERE appointment_id = ?1",
            params![
                appt.appointment_id,
                appt.patient_id,
                appt.doctor_id,
                appt.department_id,
                appt.appointment_date.to_string(),
                appt.start_time.map(|t| t.format("%H:%M:%S").to_string()),
                appt.end_time.map(|t| t.format("%H:%M:%S").to_string()),
                appt.status,
                appt.reason,
                appt.notes,
                appt.appointment_fee,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Appointment"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Appointment", appt.appointment_id));
    }
    Ok(())
}

pub fn set_appointment_status(
    conn: &Connection,
    appointment_id: i64,
    status: AppointmentStatus,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE appointment_id = ?1",
        params![appointment_id, status, format_timestamp(&now_timestamp())],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Appointment", appointment_id));
    }
    Ok(())
}

pub fn set_appointment_paid(conn: &Connection, appointment_id: i64, paid: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE appointments SET is_paid = ?2, updated_at = ?3 WHERE appointment_id = ?1",
        params![appointment_id, paid, format_timestamp(&now_timestamp())],
    )?;
    Ok(())
}

/// Null the doctor on every appointment of `doctor_id` and cancel it.
pub fn cancel_appointments_of_doctor(conn: &Connection, doctor_id: &str) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE appointments SET doctor_id = NULL, status = 'CANCELLED', updated_at = ?2
         WHERE doctor_id = ?1",
        params![doctor_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(n)
}

/// Null the patient on every appointment of `patient_id` and cancel it.
pub fn cancel_appointments_of_patient(conn: &Connection, patient_id: &str) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE appointments SET patient_id = NULL, status = 'CANCELLED', updated_at = ?2
         WHERE patient_id = ?1",
        params![patient_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(n)
}

pub fn delete_appointment_row(conn: &Connection, appointment_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute(
            "DELETE FROM appointments WHERE appointment_id = ?1",
            params![appointment_id],
        )
        .map_err(|e| map_delete_error(e, "Appointment"))?;
    Ok(deleted)
}

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        appointment_id: row.get("appointment_id")?,
        patient_id: row.get("patient_id")?,
        doctor_id: row.get("doctor_id")?,
        department_id: row.get("department_id")?,
        appointment_date: row.get("appointment_date")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        status: row.get("status")?,
        reason: row.get("reason")?,
        notes: row.get("notes")?,
        appointment_fee: row.get("appointment_fee")?,
        is_paid: row.get("is_paid")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        patient_name: row.get("patient_name")?,
        patient_email: row.get("patient_email")?,
        patient_phone: row.get("patient_phone")?,
        doctor_name: row.get("doctor_name")?,
        doctor_specialization: row.get("doctor_specialization")?,
        department_name: row.get("department_name")?,
    })
}
