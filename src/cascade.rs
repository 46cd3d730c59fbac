//! Deletion with referential cleanup.
//!
//! Removing a person never orphans dependent rows: references to the deleted
//! role are nulled (and clinical items cancelled) before the specialization
//! row and its account are removed. Each operation is one transaction; any
//! failure leaves the database exactly as it was.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::repository::*;
use crate::db::DatabaseError;

/// Dependent rows touched by a cascade, for logging and API responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub departments_cleared: usize,
    pub patients_detached: usize,
    pub doctors_detached: usize,
    pub appointments_cancelled: usize,
    pub records_detached: usize,
    pub records_deleted: usize,
    pub prescriptions_cancelled: usize,
    pub payments_detached: usize,
}

pub fn delete_doctor(conn: &Connection, doctor_id: &str) -> Result<CascadeReport, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let doctor = get_doctor(&tx, doctor_id)?.ok_or_else(|| DatabaseError::not_found("Doctor", doctor_id))?;

    let report = CascadeReport {
        departments_cleared: clear_department_head(&tx, doctor_id)?,
        patients_detached: clear_primary_doctor(&tx, doctor_id)?,
        appointments_cancelled: cancel_appointments_of_doctor(&tx, doctor_id)?,
        records_detached: detach_records_from_doctor(&tx, doctor_id)?,
        prescriptions_cancelled: cancel_prescriptions_of_doctor(&tx, doctor_id)?,
        ..Default::default()
    };
    tracing::debug!(doctor_id, ?report, "Doctor references cleared");

    delete_doctor_row(&tx, doctor_id)?;
    delete_user(&tx, doctor.user_id)?;
    tx.commit()?;

    tracing::info!(doctor_id, user_id = doctor.user_id, "Doctor deleted");
    Ok(report)
}

pub fn delete_patient(conn: &Connection, patient_id: &str) -> Result<CascadeReport, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let patient = get_patient(&tx, patient_id)?.ok_or_else(|| DatabaseError::not_found("Patient", patient_id))?;

    let report = CascadeReport {
        appointments_cancelled: cancel_appointments_of_patient(&tx, patient_id)?,
        records_detached: detach_records_from_patient(&tx, patient_id)?,
        prescriptions_cancelled: cancel_prescriptions_of_patient(&tx, patient_id)?,
        payments_detached: detach_payments_from_patient(&tx, patient_id)?,
        ..Default::default()
    };
    tracing::debug!(patient_id, ?report, "Patient references cleared");

    delete_patient_row(&tx, patient_id)?;
    delete_user(&tx, patient.user_id)?;
    tx.commit()?;

    tracing::info!(patient_id, user_id = patient.user_id, "Patient deleted");
    Ok(report)
}

pub fn delete_staff(conn: &Connection, staff_id: &str) -> Result<CascadeReport, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let staff = get_staff(&tx, staff_id)?.ok_or_else(|| DatabaseError::not_found("Staff", staff_id))?;

    let report = CascadeReport {
        payments_detached: detach_payments_from_staff(&tx, staff_id)?,
        ..Default::default()
    };

    delete_staff_row(&tx, staff_id)?;
    delete_user(&tx, staff.user_id)?;
    tx.commit()?;

    tracing::info!(staff_id, user_id = staff.user_id, "Staff member deleted");
    Ok(report)
}

/// Nothing references admins, so only the admin row and its account go.
pub fn delete_admin(conn: &Connection, admin_id: &str) -> Result<CascadeReport, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let admin = get_admin(&tx, admin_id)?.ok_or_else(|| DatabaseError::not_found("Admin", admin_id))?;
    delete_admin_row(&tx, admin_id)?;
    delete_user(&tx, admin.user_id)?;
    tx.commit()?;

    tracing::info!(admin_id, user_id = admin.user_id, "Admin deleted");
    Ok(CascadeReport::default())
}

/// Records tied to the appointment are deleted outright; payments block the delete.
pub fn delete_appointment(conn: &Connection, appointment_id: i64) -> Result<CascadeReport, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    if !appointment_exists(&tx, appointment_id)? {
        return Err(DatabaseError::not_found("Appointment", appointment_id));
    }
    let report = CascadeReport {
        records_deleted: delete_medical_records_for_appointment(&tx, appointment_id)?,
        ..Default::default()
    };
    delete_appointment_row(&tx, appointment_id)?;
    tx.commit()?;

    tracing::info!(appointment_id, records_deleted = report.records_deleted, "Appointment deleted");
    Ok(report)
}

/// Assigned doctors are detached first; staff, admins or appointments still
/// pointing at the department make the delete a `Conflict`.
pub fn delete_department(conn: &Connection, department_id: i64) -> Result<CascadeReport, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    if !department_exists(&tx, department_id)? {
        return Err(DatabaseError::not_found("Department", department_id));
    }
    let report = CascadeReport {
        doctors_detached: detach_doctors_from_department(&tx, department_id)?,
        ..Default::default()
    };
    delete_department_row(&tx, department_id)?;
    tx.commit()?;

    tracing::info!(department_id, doctors_detached = report.doctors_detached, "Department deleted");
    Ok(report)
}
