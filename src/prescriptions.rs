//! Prescriptions and the refill state machine.
//!
//! ACTIVE is the only state that admits refills. Consuming the last refill
//! moves the prescription to COMPLETED; any terminal state (COMPLETED,
//! EXPIRED, CANCELLED) forces `refills_remaining` to zero. Expiry is only
//! reported by [`expired_prescriptions`], never applied automatically.

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::models::enums::PrescriptionStatus;
use crate::models::*;

/// Create body (patient and doctor required) and partial update body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRequest {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub medical_record_id: Option<i64>,
    pub pharmacy_id: Option<i64>,
    pub prescription_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub status: Option<PrescriptionStatus>,
    pub notes: Option<String>,
    pub is_refillable: Option<bool>,
    pub total_refills: Option<i32>,
    #[serde(default)]
    pub medications: Vec<MedicationLine>,
}

fn fetch(conn: &Connection, prescription_id: i64) -> Result<Prescription, DatabaseError> {
    get_prescription(conn, prescription_id)?.ok_or_else(|| DatabaseError::not_found("Prescription", prescription_id))
}

fn check_references(conn: &Connection, req: &PrescriptionRequest) -> Result<(), DatabaseError> {
    if let Some(id) = req.patient_id.as_deref() {
        if !patient_exists(conn, id)? {
            return Err(DatabaseError::not_found("Patient", id));
        }
    }
    if let Some(id) = req.doctor_id.as_deref() {
        if !doctor_exists(conn, id)? {
            return Err(DatabaseError::not_found("Doctor", id));
        }
    }
    if let Some(id) = req.medical_record_id {
        if !medical_record_exists(conn, id)? {
            return Err(DatabaseError::not_found("MedicalRecord", id));
        }
    }
    if let Some(id) = req.pharmacy_id {
        if !pharmacy_exists(conn, id)? {
            return Err(DatabaseError::not_found("Pharmacy", id));
        }
    }
    if req.total_refills.is_some_and(|n| n < 0) {
        return Err(DatabaseError::Validation("totalRefills cannot be negative".into()));
    }
    Ok(())
}

/// Remaining refills after `total_refills` moves from `old_total` to `new_total`.
fn shifted_remaining(remaining: i32, old_total: i32, new_total: i32) -> i32 {
    (remaining + (new_total - old_total)).clamp(0, new_total)
}

pub fn create_prescription(conn: &Connection, req: &PrescriptionRequest) -> Result<Prescription, DatabaseError> {
    let patient_id = req
        .patient_id
        .clone()
        .ok_or_else(|| DatabaseError::Validation("patientId is required".into()))?;
    let doctor_id = req
        .doctor_id
        .clone()
        .ok_or_else(|| DatabaseError::Validation("doctorId is required".into()))?;
    check_references(conn, req)?;

    let status = req.status.unwrap_or(PrescriptionStatus::Active);
    let total_refills = req.total_refills.unwrap_or(0);
    let now = now_timestamp();
    let rx = Prescription {
        prescription_id: 0,
        patient_id: Some(patient_id),
        doctor_id: Some(doctor_id),
        medical_record_id: req.medical_record_id,
        pharmacy_id: req.pharmacy_id,
        prescription_date: req.prescription_date.unwrap_or_else(|| Local::now().date_naive()),
        expiry_date: req.expiry_date,
        status,
        notes: req.notes.clone(),
        is_refillable: req.is_refillable.unwrap_or(false),
        total_refills,
        refills_remaining: if status.is_terminal() { 0 } else { total_refills },
        medications: req.medications.clone(),
        created_at: now,
        updated_at: now,
        patient_name: None,
        doctor_name: None,
        pharmacy_name: None,
        pharmacy_address: None,
        pharmacy_phone: None,
    };

    let tx = conn.unchecked_transaction()?;
    let id = insert_prescription(&tx, &rx)?;
    tx.commit()?;

    tracing::info!(prescription_id = id, lines = rx.medications.len(), "Prescription created");
    fetch(conn, id)
}

/// Partial update.
///
/// Turning refills on with a total resets both counters to that total. Any
/// other total change shifts the remaining count by the same amount, kept
/// within `0..=total`. A non-empty medication list replaces the lines.
pub fn update_prescription_details(
    conn: &Connection,
    prescription_id: i64,
    req: &PrescriptionRequest,
) -> Result<Prescription, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut rx = fetch(&tx, prescription_id)?;
    check_references(&tx, req)?;

    if req.patient_id.is_some() {
        rx.patient_id = req.patient_id.clone();
    }
    if req.doctor_id.is_some() {
        rx.doctor_id = req.doctor_id.clone();
    }
    if req.medical_record_id.is_some() {
        rx.medical_record_id = req.medical_record_id;
    }
    if req.pharmacy_id.is_some() {
        rx.pharmacy_id = req.pharmacy_id;
    }
    if let Some(date) = req.prescription_date {
        rx.prescription_date = date;
    }
    if req.expiry_date.is_some() {
        rx.expiry_date = req.expiry_date;
    }
    if let Some(status) = req.status {
        rx.status = status;
    }
    rx.notes = req.notes.clone();

    let was_refillable = rx.is_refillable;
    if let Some(refillable) = req.is_refillable {
        rx.is_refillable = refillable;
    }
    match req.total_refills {
        Some(total) if !was_refillable && rx.is_refillable => {
            rx.total_refills = total;
            rx.refills_remaining = total;
        }
        Some(total) => {
            rx.refills_remaining = shifted_remaining(rx.refills_remaining, rx.total_refills, total);
            rx.total_refills = total;
        }
        None => {}
    }
    if rx.status.is_terminal() {
        rx.refills_remaining = 0;
    }

    update_prescription(&tx, &rx)?;
    if !req.medications.is_empty() {
        replace_medication_lines(&tx, prescription_id, &req.medications)?;
    }
    let updated = fetch(&tx, prescription_id)?;
    tx.commit()?;
    Ok(updated)
}

/// Consume one refill.
///
/// Fails without writing when the prescription is not refillable, out of
/// refills, or not ACTIVE. Reaching zero completes the prescription.
pub fn process_refill(conn: &Connection, prescription_id: i64) -> Result<Prescription, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let rx = fetch(&tx, prescription_id)?;

    if !rx.is_refillable {
        return Err(DatabaseError::NotRefillable(prescription_id));
    }
    // An exhausted prescription reports that first, even once COMPLETED.
    if rx.refills_remaining <= 0 {
        return Err(DatabaseError::NoRefillsRemaining(prescription_id));
    }
    if rx.status != PrescriptionStatus::Active {
        return Err(DatabaseError::InvalidState(format!(
            "Cannot refill prescription with status: {}",
            rx.status
        )));
    }

    let remaining = rx.refills_remaining - 1;
    let status = if remaining == 0 {
        PrescriptionStatus::Completed
    } else {
        PrescriptionStatus::Active
    };
    set_prescription_state(&tx, prescription_id, status, remaining)?;
    let updated = fetch(&tx, prescription_id)?;
    tx.commit()?;

    tracing::info!(prescription_id, remaining, %status, "Refill processed");
    Ok(updated)
}

/// Set the status unconditionally; terminal states zero the remaining refills.
pub fn update_prescription_status(
    conn: &Connection,
    prescription_id: i64,
    status: PrescriptionStatus,
) -> Result<Prescription, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let rx = fetch(&tx, prescription_id)?;
    let remaining = if status.is_terminal() { 0 } else { rx.refills_remaining };
    set_prescription_state(&tx, prescription_id, status, remaining)?;
    let updated = fetch(&tx, prescription_id)?;
    tx.commit()?;

    tracing::info!(prescription_id, from = %rx.status, to = %status, "Prescription status changed");
    Ok(updated)
}

pub fn prescription(conn: &Connection, prescription_id: i64) -> Result<Prescription, DatabaseError> {
    fetch(conn, prescription_id)
}

pub fn delete_prescription(conn: &Connection, prescription_id: i64) -> Result<(), DatabaseError> {
    if delete_prescription_row(conn, prescription_id)? == 0 {
        return Err(DatabaseError::not_found("Prescription", prescription_id));
    }
    tracing::info!(prescription_id, "Prescription deleted");
    Ok(())
}

/// List prescriptions. Filtering by pharmacy requires the pharmacy to exist.
pub fn prescriptions(
    conn: &Connection,
    filter: &PrescriptionFilter<'_>,
) -> Result<Vec<Prescription>, DatabaseError> {
    if let PrescriptionFilter::Pharmacy(id) = filter {
        if !pharmacy_exists(conn, *id)? {
            return Err(DatabaseError::not_found("Pharmacy", id));
        }
    }
    list_prescriptions(conn, filter)
}

/// ACTIVE prescriptions whose expiry date is before `today`. Nothing is written.
pub fn expired_prescriptions(conn: &Connection, today: NaiveDate) -> Result<Vec<Prescription>, DatabaseError> {
    list_prescriptions(conn, &PrescriptionFilter::ActiveExpiredBefore(today))
}

pub fn doctor_prescription_count(conn: &Connection, doctor_id: &str, date: NaiveDate) -> Result<i64, DatabaseError> {
    count_prescriptions_for_doctor_on(conn, doctor_id, date)
}

pub fn patient_prescription_count(
    conn: &Connection,
    patient_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<i64, DatabaseError> {
    count_prescriptions_for_patient_between(conn, patient_id, from, to)
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
        fixtures::doctor(&conn, "D20000");
        fixtures::patient(&conn, "P20000");
        conn
    }

    fn refillable(total: i32) -> PrescriptionRequest {
        PrescriptionRequest {
            patient_id: Some("P20000".into()),
            doctor_id: Some("D20000".into()),
            is_refillable: Some(true),
            total_refills: Some(total),
            medications: vec![
                MedicationLine {
                    medication_name: "Amoxicillin".into(),
                    dosage: Some("500mg".into()),
                    frequency: Some("3x daily".into()),
                    quantity: Some(21),
                    ..Default::default()
                },
                MedicationLine {
                    medication_name: "Paracetamol".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn create_applies_defaults_and_keeps_line_order() {
        let conn = setup();
        let rx = create_prescription(&conn, &refillable(2)).unwrap();
        assert_eq!(rx.status, PrescriptionStatus::Active);
        assert_eq!(rx.prescription_date, Local::now().date_naive());
        assert_eq!(rx.refills_remaining, 2);
        let names: Vec<_> = rx.medications.iter().map(|m| m.medication_name.as_str()).collect();
        assert_eq!(names, ["Amoxicillin", "Paracetamol"]);
        assert_eq!(rx.doctor_name.as_deref(), Some("Dr. Gregory House"));
    }

    #[test]
    fn create_rejects_unknown_pharmacy() {
        let conn = setup();
        let mut req = refillable(1);
        req.pharmacy_id = Some(3);
        assert!(matches!(create_prescription(&conn, &req), Err(DatabaseError::NotFound { .. })));
        assert!(list_prescriptions(&conn, &PrescriptionFilter::All).unwrap().is_empty());
    }

    #[test]
    fn refills_run_down_to_completed() {
        let conn = setup();
        let id = create_prescription(&conn, &refillable(2)).unwrap().prescription_id;

        let first = process_refill(&conn, id).unwrap();
        assert_eq!(first.refills_remaining, 1);
        assert_eq!(first.status, PrescriptionStatus::Active);

        let second = process_refill(&conn, id).unwrap();
        assert_eq!(second.refills_remaining, 0);
        assert_eq!(second.status, PrescriptionStatus::Completed);

        let err = process_refill(&conn, id).unwrap_err();
        assert!(matches!(err, DatabaseError::NoRefillsRemaining(n) if n == id));
        let after = prescription(&conn, id).unwrap();
        assert_eq!(after.refills_remaining, 0);
        assert_eq!(after.status, PrescriptionStatus::Completed);
    }

    #[test]
    fn active_with_no_refills_left_fails_unchanged() {
        let conn = setup();
        let id = create_prescription(&conn, &refillable(0)).unwrap().prescription_id;
        let err = process_refill(&conn, id).unwrap_err();
        assert!(matches!(err, DatabaseError::NoRefillsRemaining(n) if n == id));
        let after = prescription(&conn, id).unwrap();
        assert_eq!(after.status, PrescriptionStatus::Active);
        assert_eq!(after.refills_remaining, 0);
    }

    #[test]
    fn non_refillable_is_rejected() {
        let conn = setup();
        let mut req = refillable(3);
        req.is_refillable = Some(false);
        let id = create_prescription(&conn, &req).unwrap().prescription_id;
        assert!(matches!(process_refill(&conn, id), Err(DatabaseError::NotRefillable(_))));
        assert_eq!(prescription(&conn, id).unwrap().refills_remaining, 3);
    }

    #[test]
    fn terminal_status_zeroes_refills() {
        let conn = setup();
        let id = create_prescription(&conn, &refillable(3)).unwrap().prescription_id;
        let rx = update_prescription_status(&conn, id, PrescriptionStatus::Cancelled).unwrap();
        assert_eq!(rx.status, PrescriptionStatus::Cancelled);
        assert_eq!(rx.refills_remaining, 0);
        assert!(process_refill(&conn, id).is_err());
        assert_eq!(prescription(&conn, id).unwrap().refills_remaining, 0);
    }

    #[test]
    fn inactive_with_refills_left_is_invalid_state() {
        let conn = setup();
        let id = create_prescription(&conn, &refillable(3)).unwrap().prescription_id;
        set_prescription_state(&conn, id, PrescriptionStatus::Expired, 2).unwrap();
        assert!(matches!(process_refill(&conn, id), Err(DatabaseError::InvalidState(_))));
        assert_eq!(prescription(&conn, id).unwrap().refills_remaining, 2);
    }

    #[test]
    fn non_terminal_status_keeps_refills() {
        let conn = setup();
        let id = create_prescription(&conn, &refillable(3)).unwrap().prescription_id;
        process_refill(&conn, id).unwrap();
        let rx = update_prescription_status(&conn, id, PrescriptionStatus::Active).unwrap();
        assert_eq!(rx.refills_remaining, 2);
    }

    #[test]
    fn update_shifts_remaining_with_total() {
        let conn = setup();
        let id = create_prescription(&conn, &refillable(3)).unwrap().prescription_id;
        process_refill(&conn, id).unwrap();

        let rx = update_prescription_details(&conn, id, &PrescriptionRequest {
            total_refills: Some(5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!((rx.total_refills, rx.refills_remaining), (5, 4));

        let rx = update_prescription_details(&conn, id, &PrescriptionRequest {
            total_refills: Some(0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!((rx.total_refills, rx.refills_remaining), (0, 0));
        assert_eq!(rx.medications.len(), 2);
    }

    #[test]
    fn enabling_refills_resets_counters() {
        let conn = setup();
        let mut req = refillable(0);
        req.is_refillable = Some(false);
        let id = create_prescription(&conn, &req).unwrap().prescription_id;

        let rx = update_prescription_details(&conn, id, &PrescriptionRequest {
            is_refillable: Some(true),
            total_refills: Some(4),
            medications: vec![MedicationLine {
                medication_name: "Metformin".into(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .unwrap();
        assert!(rx.is_refillable);
        assert_eq!((rx.total_refills, rx.refills_remaining), (4, 4));
        assert_eq!(rx.medications.len(), 1);
        assert_eq!(rx.medications[0].medication_name, "Metformin");
    }

    #[test]
    fn expiry_is_reported_not_applied() {
        let conn = setup();
        let mut req = refillable(1);
        req.expiry_date = Some(day(2024, 12, 31));
        let old = create_prescription(&conn, &req).unwrap().prescription_id;
        req.expiry_date = Some(day(2030, 1, 1));
        create_prescription(&conn, &req).unwrap();

        let expired = expired_prescriptions(&conn, day(2025, 6, 1)).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].prescription_id, old);
        assert_eq!(prescription(&conn, old).unwrap().status, PrescriptionStatus::Active);
    }

    #[test]
    fn counts_by_doctor_day_and_patient_period() {
        let conn = setup();
        let mut req = refillable(0);
        req.prescription_date = Some(day(2025, 3, 10));
        create_prescription(&conn, &req).unwrap();
        create_prescription(&conn, &req).unwrap();
        req.prescription_date = Some(day(2025, 5, 1));
        create_prescription(&conn, &req).unwrap();

        assert_eq!(doctor_prescription_count(&conn, "D20000", day(2025, 3, 10)).unwrap(), 2);
        assert_eq!(
            patient_prescription_count(&conn, "P20000", day(2025, 3, 1), day(2025, 3, 31)).unwrap(),
            2
        );
        assert_eq!(
            prescriptions(&conn, &PrescriptionFilter::DateRange(day(2025, 4, 1), day(2025, 5, 31))).unwrap().len(),
            1
        );
    }

    #[test]
    fn shifted_remaining_stays_in_bounds() {
        assert_eq!(shifted_remaining(1, 3, 5), 3);
        assert_eq!(shifted_remaining(1, 3, 1), 0);
        assert_eq!(shifted_remaining(3, 3, 2), 2);
    }
}
