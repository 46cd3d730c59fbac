use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{collect_lenient, format_timestamp, now_timestamp, query_list, Conditions};
use crate::db::{map_delete_error, map_write_error, DatabaseError};
use crate::models::enums::RecordType;
use crate::models::*;

const RECORD_SELECT: &str = "SELECT r.record_id, r.patient_id, r.doctor_id, r.appointment_id,
        r.record_type, r.diagnosis, r.symptoms, r.treatment, r.notes, r.prescription,
        r.test_results, r.medical_history, r.record_date, r.next_appointment,
        r.created_at, r.updated_at,
        p.first_name || ' ' || p.last_name AS patient_name,
        'Dr. ' || d.first_name || ' ' || d.last_name AS doctor_name,
        d.specialization AS doctor_specialization
     FROM medical_records r
     LEFT JOIN patients p ON p.patient_id = r.patient_id
     LEFT JOIN doctors d ON d.doctor_id = r.doctor_id";

const RECORD_ORDER: &str = "r.record_date DESC, r.record_id DESC";

#[derive(Debug, Clone)]
pub enum MedicalRecordFilter<'a> {
    All,
    Patient(&'a str),
    Doctor(&'a str),
    Appointment(i64),
    Type(RecordType),
    /// Inclusive on both ends.
    DateRange(NaiveDateTime, NaiveDateTime),
    PatientAndType(&'a str, RecordType),
}

impl MedicalRecordFilter<'_> {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::new();
        match self {
            Self::All => {}
            Self::Patient(id) => {
                c.push("r.patient_id = ?", id.to_string());
            }
            Self::Doctor(id) => {
                c.push("r.doctor_id = ?", id.to_string());
            }
            Self::Appointment(id) => {
                c.push("r.appointment_id = ?", *id);
            }
            Self::Type(t) => {
                c.push("r.record_type = ?", t.as_str().to_string());
            }
            Self::DateRange(from, to) => {
                c.push("r.record_date >= ?", format_timestamp(from))
                    .push("r.record_date <= ?", format_timestamp(to));
            }
            Self::PatientAndType(id, t) => {
                c.push("r.patient_id = ?", id.to_string())
                    .push("r.record_type = ?", t.as_str().to_string());
            }
        }
        c
    }
}

pub fn insert_medical_record(conn: &Connection, record: &MedicalRecord) -> Result<i64, DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO medical_records (patient_id, doctor_id, appointment_id, record_type, diagnosis,
         symptoms, treatment, notes, prescription, test_results, medical_history, record_date,
         next_appointment, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            record.patient_id,
            record.doctor_id,
            record.appointment_id,
            record.record_type,
            record.diagnosis,
            record.symptoms,
            record.treatment,
            record.notes,
            record.prescription,
            record.test_results,
            record.medical_history,
            format_timestamp(&record.record_date),
            record.next_appointment.as_ref().map(format_timestamp),
            now,
        ],
    )
    .map_err(|e| map_write_error(e, "Medical record"))?;
    Ok(conn.last_insert_rowid())
}

pub fn medical_record_exists(conn: &Connection, record_id: i64) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM medical_records WHERE record_id = ?1)",
        params![record_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_medical_record(conn: &Connection, record_id: i64) -> Result<Option<MedicalRecord>, DatabaseError> {
    let record = conn
        .query_row(
            &format!("{RECORD_SELECT} WHERE r.record_id = ?1"),
            params![record_id],
            medical_record_from_row,
        )
        .optional()?;
    Ok(record)
}

pub fn list_medical_records(
    conn: &Connection,
    filter: &MedicalRecordFilter<'_>,
) -> Result<Vec<MedicalRecord>, DatabaseError> {
    query_list(
        conn,
        RECORD_SELECT,
        &filter.conditions(),
        RECORD_ORDER,
        medical_record_from_row,
        "medical_record",
    )
}

pub fn update_medical_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE medical_records SET patient_id = ?2, doctor_id = ?3, appointment_id = ?4,
             record_type = ?5, diagnosis = ?6, symptoms = ?7, treatment = ?8, notes = ?9,
             prescription = ?10, test_results = ?11, medical_history = ?12, record_date = ?13,
             next_appointment = ?14, updated_at = ?15
             WHERE record_id = ?1",
            params![
                record.record_id,
                record.patient_id,
                record.doctor_id,
                record.appointment_id,
                record.record_type,
                record.diagnosis,
                record.symptoms,
                record.treatment,
                record.notes,
                record.prescription,
                record.test_results,
                record.medical_history,
                format_timestamp(&record.record_date),
                record.next_appointment.as_ref().map(format_timestamp),
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Medical record"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("MedicalRecord", record.record_id));
    }
    Ok(())
}

pub fn delete_medical_record_row(conn: &Connection, record_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM medical_records WHERE record_id = ?1", params![record_id])
        .map_err(|e| map_delete_error(e, "Medical record"))?;
    Ok(deleted)
}

/// Hard-delete every record tied to the appointment.
pub fn delete_medical_records_for_appointment(
    conn: &Connection,
    appointment_id: i64,
) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute(
            "DELETE FROM medical_records WHERE appointment_id = ?1",
            params![appointment_id],
        )
        .map_err(|e| map_delete_error(e, "Medical record"))?;
    Ok(deleted)
}

pub fn detach_records_from_doctor(conn: &Connection, doctor_id: &str) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE medical_records SET doctor_id = NULL, updated_at = ?2 WHERE doctor_id = ?1",
        params![doctor_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(n)
}

pub fn detach_records_from_patient(conn: &Connection, patient_id: &str) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE medical_records SET patient_id = NULL, updated_at = ?2 WHERE patient_id = ?1",
        params![patient_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(n)
}

/// Distinct non-empty diagnoses recorded for a patient, alphabetical.
pub fn distinct_diagnoses(conn: &Connection, patient_id: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT diagnosis FROM medical_records
         WHERE patient_id = ?1 AND diagnosis IS NOT NULL AND TRIM(diagnosis) != ''
         ORDER BY diagnosis",
    )?;
    let rows = stmt.query_map(params![patient_id], |row| row.get::<_, String>(0))?;
    Ok(collect_lenient(rows, "diagnosis"))
}

pub fn count_records_by_type(conn: &Connection, patient_id: &str) -> Result<Vec<RecordTypeCount>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT record_type, COUNT(*) FROM medical_records
         WHERE patient_id = ?1 AND record_type IS NOT NULL
         GROUP BY record_type ORDER BY record_type",
    )?;
    let rows = stmt.query_map(params![patient_id], |row| {
        Ok(RecordTypeCount {
            record_type: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    Ok(collect_lenient(rows, "record_type_count"))
}

fn medical_record_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecord> {
    Ok(MedicalRecord {
        record_id: row.get("record_id")?,
        patient_id: row.get("patient_id")?,
        doctor_id: row.get("doctor_id")?,
        appointment_id: row.get("appointment_id")?,
        record_type: row.get("record_type")?,
        diagnosis: row.get("diagnosis")?,
        symptoms: row.get("symptoms")?,
        treatment: row.get("treatment")?,
        notes: row.get("notes")?,
        prescription: row.get("prescription")?,
        test_results: row.get("test_results")?,
        medical_history: row.get("medical_history")?,
        record_date: row.get("record_date")?,
        next_appointment: row.get("next_appointment")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        patient_name: row.get("patient_name")?,
        doctor_name: row.get("doctor_name")?,
        doctor_specialization: row.get("doctor_specialization")?,
    })
}
