//! Clinical workflow: appointments and the medical records they produce.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::models::enums::{AppointmentStatus, RecordType};
use crate::models::*;

// ─── Appointments ─────────────────────────────────────────────────────────────

/// Body of appointment create and update. Update replaces every field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    pub patient_id: String,
    pub doctor_id: String,
    pub department_id: Option<i64>,
    pub appointment_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: Option<AppointmentStatus>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub appointment_fee: Option<f64>,
}

fn require_patient(conn: &Connection, patient_id: &str) -> Result<(), DatabaseError> {
    if !patient_exists(conn, patient_id)? {
        return Err(DatabaseError::not_found("Patient", patient_id));
    }
    Ok(())
}

fn require_doctor(conn: &Connection, doctor_id: &str) -> Result<(), DatabaseError> {
    if !doctor_exists(conn, doctor_id)? {
        return Err(DatabaseError::not_found("Doctor", doctor_id));
    }
    Ok(())
}

fn require_department(conn: &Connection, department_id: Option<i64>) -> Result<(), DatabaseError> {
    match department_id {
        Some(id) if !department_exists(conn, id)? => Err(DatabaseError::not_found("Department", id)),
        _ => Ok(()),
    }
}

fn require_appointment(conn: &Connection, appointment_id: Option<i64>) -> Result<(), DatabaseError> {
    match appointment_id {
        Some(id) if !appointment_exists(conn, id)? => Err(DatabaseError::not_found("Appointment", id)),
        _ => Ok(()),
    }
}

fn validate_appointment(conn: &Connection, req: &AppointmentRequest) -> Result<(), DatabaseError> {
    require_patient(conn, &req.patient_id)?;
    require_doctor(conn, &req.doctor_id)?;
    require_department(conn, req.department_id)
}

fn fetch_appointment(conn: &Connection, appointment_id: i64) -> Result<Appointment, DatabaseError> {
    get_appointment(conn, appointment_id)?.ok_or_else(|| DatabaseError::not_found("Appointment", appointment_id))
}

/// Book an appointment. Status defaults to SCHEDULED; it starts unpaid.
pub fn create_appointment(conn: &Connection, req: &AppointmentRequest) -> Result<Appointment, DatabaseError> {
    validate_appointment(conn, req)?;
    let now = now_timestamp();
    let appt = Appointment {
        appointment_id: 0,
        patient_id: Some(req.patient_id.clone()),
        doctor_id: Some(req.doctor_id.clone()),
        department_id: req.department_id,
        appointment_date: req.appointment_date,
        start_time: req.start_time,
        end_time: req.end_time,
        status: req.status.unwrap_or(AppointmentStatus::Scheduled),
        reason: req.reason.clone(),
        notes: req.notes.clone(),
        appointment_fee: req.appointment_fee,
        is_paid: false,
        created_at: now,
        updated_at: now,
        patient_name: None,
        patient_email: None,
        patient_phone: None,
        doctor_name: None,
        doctor_specialization: None,
        department_name: None,
    };
    let id = insert_appointment(conn, &appt)?;
    tracing::info!(appointment_id = id, doctor_id = %req.doctor_id, date = %req.appointment_date, "Appointment created");
    fetch_appointment(conn, id)
}

/// Replace references and fields. The paid flag stays with settlement.
pub fn update_appointment_details(
    conn: &Connection,
    appointment_id: i64,
    req: &AppointmentRequest,
) -> Result<Appointment, DatabaseError> {
    let mut appt = fetch_appointment(conn, appointment_id)?;
    validate_appointment(conn, req)?;
    appt.patient_id = Some(req.patient_id.clone());
    appt.doctor_id = Some(req.doctor_id.clone());
    appt.department_id = req.department_id;
    appt.appointment_date = req.appointment_date;
    appt.start_time = req.start_time;
    appt.end_time = req.end_time;
    if let Some(status) = req.status {
        appt.status = status;
    }
    appt.reason = req.reason.clone();
    appt.notes = req.notes.clone();
    appt.appointment_fee = req.appointment_fee;
    update_appointment(conn, &appt)?;
    fetch_appointment(conn, appointment_id)
}

pub fn update_appointment_status(
    conn: &Connection,
    appointment_id: i64,
    status: AppointmentStatus,
) -> Result<Appointment, DatabaseError> {
    set_appointment_status(conn, appointment_id, status)?;
    tracing::info!(appointment_id, %status, "Appointment status changed");
    fetch_appointment(conn, appointment_id)
}

pub fn appointment(conn: &Connection, appointment_id: i64) -> Result<Appointment, DatabaseError> {
    fetch_appointment(conn, appointment_id)
}

/// List appointments. Per-person filters require the person to exist.
pub fn appointments(conn: &Connection, filter: &AppointmentFilter<'_>) -> Result<Vec<Appointment>, DatabaseError> {
    match filter {
        AppointmentFilter::Doctor(id) => require_doctor(conn, id)?,
        AppointmentFilter::Patient(id) => require_patient(conn, id)?,
        _ => {}
    }
    list_appointments(conn, filter)
}

pub fn appointments_today_count(conn: &Connection) -> Result<i64, DatabaseError> {
    count_appointments_on(conn, Local::now().date_naive())
}

pub fn appointments_count_on(conn: &Connection, date: NaiveDate) -> Result<i64, DatabaseError> {
    count_appointments_on(conn, date)
}

// ─── Medical records ──────────────────────────────────────────────────────────

/// Body of record create (patient and doctor required) and partial update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecordRequest {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub appointment_id: Option<i64>,
    pub record_type: Option<RecordType>,
    pub diagnosis: Option<String>,
    pub symptoms: Option<String>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub prescription: Option<String>,
    pub test_results: Option<String>,
    pub medical_history: Option<String>,
    pub record_date: Option<NaiveDateTime>,
    pub next_appointment: Option<NaiveDateTime>,
}

fn fetch_record(conn: &Connection, record_id: i64) -> Result<MedicalRecord, DatabaseError> {
    get_medical_record(conn, record_id)?.ok_or_else(|| DatabaseError::not_found("MedicalRecord", record_id))
}

/// Patient and doctor are required and must exist; the appointment is
/// optional. Record date defaults to now; record type to GENERAL_CHECKUP.
pub fn create_medical_record(conn: &Connection, req: &MedicalRecordRequest) -> Result<MedicalRecord, DatabaseError> {
    let patient_id = req
        .patient_id
        .as_deref()
        .ok_or_else(|| DatabaseError::Validation("patientId is required".into()))?;
    let doctor_id = req
        .doctor_id
        .as_deref()
        .ok_or_else(|| DatabaseError::Validation("doctorId is required".into()))?;
    require_patient(conn, patient_id)?;
    require_doctor(conn, doctor_id)?;
    require_appointment(conn, req.appointment_id)?;

    let now = now_timestamp();
    let record = MedicalRecord {
        record_id: 0,
        patient_id: Some(patient_id.to_string()),
        doctor_id: Some(doctor_id.to_string()),
        appointment_id: req.appointment_id,
        record_type: Some(req.record_type.unwrap_or(RecordType::GeneralCheckup)),
        diagnosis: req.diagnosis.clone(),
        symptoms: req.symptoms.clone(),
        treatment: req.treatment.clone(),
        notes: req.notes.clone(),
        prescription: req.prescription.clone(),
        test_results: req.test_results.clone(),
        medical_history: req.medical_history.clone(),
        record_date: req.record_date.unwrap_or(now),
        next_appointment: req.next_appointment,
        created_at: now,
        updated_at: now,
        patient_name: None,
        doctor_name: None,
        doctor_specialization: None,
    };
    let id = insert_medical_record(conn, &record)?;
    tracing::info!(record_id = id, patient_id, "Medical record created");
    fetch_record(conn, id)
}

/// References, type and record date change only when given. The clinical
/// text fields are replaced as sent, so omitting one clears it.
pub fn update_medical_record_details(
    conn: &Connection,
    record_id: i64,
    req: &MedicalRecordRequest,
) -> Result<MedicalRecord, DatabaseError> {
    let mut record = fetch_record(conn, record_id)?;
    if let Some(patient_id) = req.patient_id.as_deref() {
        require_patient(conn, patient_id)?;
        record.patient_id = Some(patient_id.to_string());
    }
    if let Some(doctor_id) = req.doctor_id.as_deref() {
        require_doctor(conn, doctor_id)?;
        record.doctor_id = Some(doctor_id.to_string());
    }
    if req.appointment_id.is_some() {
        require_appointment(conn, req.appointment_id)?;
        record.appointment_id = req.appointment_id;
    }
    if req.record_type.is_some() {
        record.record_type = req.record_type;
    }
    if let Some(date) = req.record_date {
        record.record_date = date;
    }
    record.diagnosis = req.diagnosis.clone();
    record.symptoms = req.symptoms.clone();
    record.treatment = req.treatment.clone();
    record.notes = req.notes.clone();
    record.prescription = req.prescription.clone();
    record.test_results = req.test_results.clone();
    record.medical_history = req.medical_history.clone();
    record.next_appointment = req.next_appointment;

    update_medical_record(conn, &record)?;
    fetch_record(conn, record_id)
}

pub fn medical_record(conn: &Connection, record_id: i64) -> Result<MedicalRecord, DatabaseError> {
    fetch_record(conn, record_id)
}

pub fn delete_medical_record(conn: &Connection, record_id: i64) -> Result<(), DatabaseError> {
    if delete_medical_record_row(conn, record_id)? == 0 {
        return Err(DatabaseError::not_found("MedicalRecord", record_id));
    }
    tracing::info!(record_id, "Medical record deleted");
    Ok(())
}

/// List records. Per-person and per-appointment filters require the target to exist.
pub fn medical_records(
    conn: &Connection,
    filter: &MedicalRecordFilter<'_>,
) -> Result<Vec<MedicalRecord>, DatabaseError> {
    match filter {
        MedicalRecordFilter::Patient(id) => require_patient(conn, id)?,
        MedicalRecordFilter::Doctor(id) => require_doctor(conn, id)?,
        MedicalRecordFilter::Appointment(id) => require_appointment(conn, Some(*id))?,
        _ => {}
    }
    list_medical_records(conn, filter)
}

pub fn patient_diagnoses(conn: &Connection, patient_id: &str) -> Result<Vec<String>, DatabaseError> {
    distinct_diagnoses(conn, patient_id)
}

/// Count per record type for a patient, with every type present.
pub fn patient_record_counts(conn: &Connection, patient_id: &str) -> Result<Vec<RecordTypeCount>, DatabaseError> {
    let stored = count_records_by_type(conn, patient_id)?;
    Ok(RecordType::ALL
        .iter()
        .map(|record_type| RecordTypeCount {
            record_type: *record_type,
            count: stored
                .iter()
                .find(|c| c.record_type == *record_type)
                .map_or(0, |c| c.count),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> Connection {
        let conn = open_memory_database().unwrap();
        fixtures::doctor(&conn, "D10000");
        fixtures::patient(&conn, "P10000");
        conn
    }

    fn booking(date: NaiveDate) -> AppointmentRequest {
        AppointmentRequest {
            patient_id: "P10000".into(),
            doctor_id: "D10000".into(),
            department_id: None,
            appointment_date: date,
            start_time: NaiveTime::from_hms_opt(9, 30, 0),
            end_time: NaiveTime::from_hms_opt(10, 0, 0),
            status: None,
            reason: Some("Headache".into()),
            notes: None,
            appointment_fee: Some(75.0),
        }
    }

    #[test]
    fn create_defaults_to_scheduled_and_unpaid() {
        let conn = setup();
        let appt = create_appointment(&conn, &booking(day(2025, 4, 1))).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert!(!appt.is_paid);
        assert_eq!(appt.doctor_name.as_deref(), Some("Dr. Gregory House"));
        assert_eq!(appt.start_time, NaiveTime::from_hms_opt(9, 30, 0));
    }

    #[test]
    fn create_requires_existing_people_and_department() {
        let conn = setup();
        let mut req = booking(day(2025, 4, 1));
        req.doctor_id = "D99999".into();
        assert!(matches!(create_appointment(&conn, &req), Err(DatabaseError::NotFound { .. })));

        let mut req = booking(day(2025, 4, 1));
        req.department_id = Some(42);
        assert!(matches!(create_appointment(&conn, &req), Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn update_keeps_paid_flag() {
        let conn = setup();
        let appt = create_appointment(&conn, &booking(day(2025, 4, 1))).unwrap();
        set_appointment_paid(&conn, appt.appointment_id, true).unwrap();

        let mut req = booking(day(2025, 4, 8));
        req.status = Some(AppointmentStatus::InProgress);
        let updated = update_appointment_details(&conn, appt.appointment_id, &req).unwrap();
        assert_eq!(updated.appointment_date, day(2025, 4, 8));
        assert_eq!(updated.status, AppointmentStatus::InProgress);
        assert!(updated.is_paid);
    }

    #[test]
    fn filters_and_counts() {
        let conn = setup();
        create_appointment(&conn, &booking(day(2025, 4, 1))).unwrap();
        create_appointment(&conn, &booking(day(2025, 4, 1))).unwrap();
        let late = create_appointment(&conn, &booking(day(2025, 4, 20))).unwrap();
        update_appointment_status(&conn, late.appointment_id, AppointmentStatus::NoShow).unwrap();

        assert_eq!(appointments_count_on(&conn, day(2025, 4, 1)).unwrap(), 2);
        assert_eq!(
            appointments(&conn, &AppointmentFilter::DateRange(day(2025, 4, 2), day(2025, 4, 30))).unwrap().len(),
            1
        );
        assert_eq!(
            appointments(&conn, &AppointmentFilter::Status(AppointmentStatus::NoShow)).unwrap().len(),
            1
        );
        assert_eq!(appointments(&conn, &AppointmentFilter::Doctor("D10000")).unwrap().len(), 3);
        assert!(matches!(
            appointments(&conn, &AppointmentFilter::Doctor("D00001")),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn today_count_uses_local_date() {
        let conn = setup();
        create_appointment(&conn, &booking(Local::now().date_naive())).unwrap();
        assert_eq!(appointments_today_count(&conn).unwrap(), 1);
    }

    #[test]
    fn record_defaults_date_and_type() {
        let conn = setup();
        let before = now_timestamp();
        let record = create_medical_record(&conn, &MedicalRecordRequest {
            patient_id: Some("P10000".into()),
            doctor_id: Some("D10000".into()),
            diagnosis: Some("Tension headache".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(record.record_type, Some(RecordType::GeneralCheckup));
        assert!(record.record_date >= before);
        assert_eq!(record.patient_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn record_requires_patient_and_doctor() {
        let conn = setup();
        let err = create_medical_record(&conn, &MedicalRecordRequest {
            patient_id: Some("P10000".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(ref m) if m.contains("doctorId")));

        let err = create_medical_record(&conn, &MedicalRecordRequest {
            doctor_id: Some("D10000".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(ref m) if m.contains("patientId")));

        let err = create_medical_record(&conn, &MedicalRecordRequest {
            patient_id: Some("P10000".into()),
            doctor_id: Some("D99999".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));

        let err = create_medical_record(&conn, &MedicalRecordRequest {
            patient_id: Some("P10000".into()),
            doctor_id: Some("D10000".into()),
            appointment_id: Some(404),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn record_update_keeps_unsent_references() {
        let conn = setup();
        let record = create_medical_record(&conn, &MedicalRecordRequest {
            patient_id: Some("P10000".into()),
            doctor_id: Some("D10000".into()),
            record_type: Some(RecordType::Emergency),
            diagnosis: Some("Fracture".into()),
            ..Default::default()
        })
        .unwrap();

        let updated = update_medical_record_details(&conn, record.record_id, &MedicalRecordRequest {
            treatment: Some("Cast".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(updated.doctor_id.as_deref(), Some("D10000"));
        assert_eq!(updated.record_type, Some(RecordType::Emergency));
        assert_eq!(updated.record_date, record.record_date);
        assert_eq!(updated.treatment.as_deref(), Some("Cast"));
        assert_eq!(updated.diagnosis, None);
    }

    #[test]
    fn record_counts_cover_every_type() {
        let conn = setup();
        for record_type in [RecordType::Surgery, RecordType::Surgery, RecordType::LabTest] {
            create_medical_record(&conn, &MedicalRecordRequest {
                patient_id: Some("P10000".into()),
                doctor_id: Some("D10000".into()),
                record_type: Some(record_type),
                ..Default::default()
            })
            .unwrap();
        }
        let counts = patient_record_counts(&conn, "P10000").unwrap();
        assert_eq!(counts.len(), RecordType::ALL.len());
        let count_of = |t: RecordType| counts.iter().find(|c| c.record_type == t).unwrap().count;
        assert_eq!(count_of(RecordType::Surgery), 2);
        assert_eq!(count_of(RecordType::LabTest), 1);
        assert_eq!(count_of(RecordType::Vaccination), 0);
    }

    #[test]
    fn delete_missing_record_is_not_found() {
        let conn = setup();
        assert!(matches!(delete_medical_record(&conn, 77), Err(DatabaseError::NotFound { .. })));
    }
}
