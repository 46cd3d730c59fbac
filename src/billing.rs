//! Payments, appointment settlement and revenue figures.
//!
//! An appointment's `is_paid` flag is derived from its payments: linking a
//! payment (or completing one) sets it, and removing the last payment of an
//! appointment clears it. Every write that can move the flag runs in the
//! same transaction as the settlement.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::models::enums::{PaymentStatus, PaymentType};
use crate::models::*;

/// Create body (patient, amount and type required) and partial update body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub patient_id: Option<String>,
    pub appointment_id: Option<i64>,
    pub staff_id: Option<String>,
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub payment_type: Option<PaymentType>,
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub payment_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    pub month: u32,
    pub revenue: f64,
}

/// Figures for the billing dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub year: i32,
    pub month: u32,
    pub month_revenue: f64,
    pub year_revenue: f64,
    pub pending_payments: i64,
    pub completed_payments: i64,
    pub monthly: Vec<MonthlyRevenue>,
}

fn fetch(conn: &Connection, payment_id: i64) -> Result<Payment, DatabaseError> {
    get_payment(conn, payment_id)?.ok_or_else(|| DatabaseError::not_found("Payment", payment_id))
}

fn check_references(conn: &Connection, req: &PaymentRequest) -> Result<(), DatabaseError> {
    if let Some(id) = req.patient_id.as_deref() {
        if !patient_exists(conn, id)? {
            return Err(DatabaseError::not_found("Patient", id));
        }
    }
    if let Some(id) = req.appointment_id {
        if !appointment_exists(conn, id)? {
            return Err(DatabaseError::not_found("Appointment", id));
        }
    }
    if let Some(id) = req.staff_id.as_deref() {
        if !staff_exists(conn, id)? {
            return Err(DatabaseError::not_found("Staff", id));
        }
    }
    if req.amount.is_some_and(|a| !a.is_finite() || a < 0.0) {
        return Err(DatabaseError::Validation("amount must be a non-negative number".into()));
    }
    Ok(())
}

/// Recompute `is_paid` from the payments still linked to the appointment.
fn resettle(conn: &Connection, appointment_id: i64) -> Result<bool, DatabaseError> {
    let paid = count_payments_for_appointment(conn, appointment_id)? > 0;
    set_appointment_paid(conn, appointment_id, paid)?;
    tracing::debug!(appointment_id, paid, "Appointment settlement recomputed");
    Ok(paid)
}

/// Record a payment. A linked appointment is marked paid whatever the status.
pub fn create_payment(conn: &Connection, req: &PaymentRequest) -> Result<Payment, DatabaseError> {
    let patient_id = req
        .patient_id
        .clone()
        .ok_or_else(|| DatabaseError::Validation("patientId is required".into()))?;
    let amount = req
        .amount
        .ok_or_else(|| DatabaseError::Validation("amount is required".into()))?;
    let payment_type = req
        .payment_type
        .ok_or_else(|| DatabaseError::Validation("type is required".into()))?;
    check_references(conn, req)?;

    let now = now_timestamp();
    let payment = Payment {
        payment_id: 0,
        patient_id: Some(patient_id),
        appointment_id: req.appointment_id,
        received_by: req.staff_id.clone(),
        amount,
        payment_type,
        status: req.status.unwrap_or(PaymentStatus::Pending),
        payment_method: req.payment_method.clone(),
        transaction_id: req.transaction_id.clone(),
        notes: req.notes.clone(),
        payment_date: req.payment_date.unwrap_or(now),
        created_at: now,
        updated_at: now,
        patient_name: None,
        doctor_name: None,
        staff_name: None,
    };

    let tx = conn.unchecked_transaction()?;
    let id = insert_payment(&tx, &payment)?;
    if let Some(appointment_id) = payment.appointment_id {
        set_appointment_paid(&tx, appointment_id, true)?;
    }
    let created = fetch(&tx, id)?;
    tx.commit()?;

    tracing::info!(payment_id = id, amount, status = %created.status, "Payment recorded");
    Ok(created)
}

/// Partial update. Moving the payment to another appointment settles both.
pub fn update_payment_details(
    conn: &Connection,
    payment_id: i64,
    req: &PaymentRequest,
) -> Result<Payment, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut payment = fetch(&tx, payment_id)?;
    check_references(&tx, req)?;
    let previous_appointment = payment.appointment_id;

    if req.patient_id.is_some() {
        payment.patient_id = req.patient_id.clone();
    }
    if req.appointment_id.is_some() {
        payment.appointment_id = req.appointment_id;
    }
    if req.staff_id.is_some() {
        payment.received_by = req.staff_id.clone();
    }
    if let Some(amount) = req.amount {
        payment.amount = amount;
    }
    if let Some(payment_type) = req.payment_type {
        payment.payment_type = payment_type;
    }
    if let Some(status) = req.status {
        payment.status = status;
    }
    payment.transaction_id = req.transaction_id.clone();
    payment.payment_method = req.payment_method.clone();
    payment.notes = req.notes.clone();
    if let Some(date) = req.payment_date {
        payment.payment_date = date;
    }
    update_payment(&tx, &payment)?;

    if previous_appointment != payment.appointment_id {
        if let Some(old) = previous_appointment {
            resettle(&tx, old)?;
        }
    }
    if let Some(current) = payment.appointment_id {
        if previous_appointment != payment.appointment_id || payment.status == PaymentStatus::Completed {
            set_appointment_paid(&tx, current, true)?;
        }
    }
    let updated = fetch(&tx, payment_id)?;
    tx.commit()?;
    Ok(updated)
}

/// Change the status. COMPLETED marks a linked appointment paid.
pub fn update_payment_status(
    conn: &Connection,
    payment_id: i64,
    status: PaymentStatus,
) -> Result<Payment, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let payment = fetch(&tx, payment_id)?;
    set_payment_status(&tx, payment_id, status)?;
    if status == PaymentStatus::Completed {
        if let Some(appointment_id) = payment.appointment_id {
            set_appointment_paid(&tx, appointment_id, true)?;
        }
    }
    let updated = fetch(&tx, payment_id)?;
    tx.commit()?;

    tracing::info!(payment_id, from = %payment.status, to = %status, "Payment status changed");
    Ok(updated)
}

/// Delete a payment; its appointment stays paid only while other payments remain.
pub fn delete_payment(conn: &Connection, payment_id: i64) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let payment = fetch(&tx, payment_id)?;
    delete_payment_row(&tx, payment_id)?;
    if let Some(appointment_id) = payment.appointment_id {
        resettle(&tx, appointment_id)?;
    }
    tx.commit()?;

    tracing::info!(payment_id, "Payment deleted");
    Ok(())
}

pub fn payment(conn: &Connection, payment_id: i64) -> Result<Payment, DatabaseError> {
    fetch(conn, payment_id)
}

/// List payments. Per-patient and per-appointment filters require the target to exist.
pub fn payments(conn: &Connection, filter: &PaymentFilter<'_>) -> Result<Vec<Payment>, DatabaseError> {
    match filter {
        PaymentFilter::Patient(id) if !patient_exists(conn, id)? => {
            return Err(DatabaseError::not_found("Patient", id));
        }
        PaymentFilter::Appointment(id) if !appointment_exists(conn, *id)? => {
            return Err(DatabaseError::not_found("Appointment", id));
        }
        _ => {}
    }
    list_payments(conn, filter)
}

// ─── Revenue ──────────────────────────────────────────────────────────────────

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDateTime, NaiveDateTime), DatabaseError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DatabaseError::Validation(format!("Invalid month: {year}-{month}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| DatabaseError::Validation(format!("Invalid month: {year}-{month}")))?;
    let last = next
        .pred_opt()
        .ok_or_else(|| DatabaseError::Validation(format!("Invalid month: {year}-{month}")))?;
    Ok((first.and_time(NaiveTime::MIN), end_of_day(last)))
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59).unwrap_or_else(|| date.and_time(NaiveTime::MIN))
}

/// COMPLETED revenue dated within `[from, to]`.
pub fn revenue_for_period(conn: &Connection, from: NaiveDateTime, to: NaiveDateTime) -> Result<f64, DatabaseError> {
    sum_completed_payments(conn, &from, &to)
}

pub fn revenue_for_month(conn: &Connection, year: i32, month: u32) -> Result<f64, DatabaseError> {
    let (from, to) = month_bounds(year, month)?;
    sum_completed_payments(conn, &from, &to)
}

/// Revenue for each month of `year`, all twelve present.
pub fn monthly_revenue(conn: &Connection, year: i32) -> Result<Vec<MonthlyRevenue>, DatabaseError> {
    (1..=12)
        .map(|month| {
            Ok(MonthlyRevenue {
                month,
                revenue: revenue_for_month(conn, year, month)?,
            })
        })
        .collect()
}

pub fn payment_count_by_status(conn: &Connection, status: PaymentStatus) -> Result<i64, DatabaseError> {
    count_payments_by_status(conn, status)
}

/// Dashboard figures for the month and year containing `today`.
pub fn revenue_summary(conn: &Connection, today: NaiveDate) -> Result<RevenueSummary, DatabaseError> {
    let monthly = monthly_revenue(conn, today.year())?;
    let year_revenue = monthly.iter().map(|m| m.revenue).sum();
    let month_revenue = monthly
        .iter()
        .find(|m| m.month == today.month())
        .map_or(0.0, |m| m.revenue);
    Ok(RevenueSummary {
        year: today.year(),
        month: today.month(),
        month_revenue,
        year_revenue,
        pending_payments: count_payments_by_status(conn, PaymentStatus::Pending)?,
        completed_payments: count_payments_by_status(conn, PaymentStatus::Completed)?,
        monthly,
    })
}

/// [`revenue_summary`] for the current local date.
pub fn current_revenue_summary(conn: &Connection) -> Result<RevenueSummary, DatabaseError> {
    revenue_summary(conn, Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        day(y, m, d).and_hms_opt(10, 0, 0).unwrap()
    }

    fn setup() -> (Connection, i64) {
        let conn = open_memory_database().unwrap();
        fixtures::doctor(&conn, "D30000");
        fixtures::patient(&conn, "P30000");
        let appt = fixtures::appointment(&conn, "P30000", "D30000", day(2025, 5, 5));
        (conn, appt)
    }

    fn pay(appointment_id: Option<i64>, status: PaymentStatus) -> PaymentRequest {
        PaymentRequest {
            patient_id: Some("P30000".into()),
            appointment_id,
            amount: Some(80.0),
            payment_type: Some(PaymentType::Consultation),
            status: Some(status),
            payment_method: Some("CASH".into()),
            ..Default::default()
        }
    }

    fn is_paid(conn: &Connection, appointment_id: i64) -> bool {
        get_appointment(conn, appointment_id).unwrap().unwrap().is_paid
    }

    #[test]
    fn settlement_round_trip() {
        let (conn, appt) = setup();
        assert!(!is_paid(&conn, appt));

        let single = create_payment(&conn, &pay(Some(appt), PaymentStatus::Pending)).unwrap();
        assert!(is_paid(&conn, appt));
        delete_payment(&conn, single.payment_id).unwrap();
        assert!(!is_paid(&conn, appt));

        let first = create_payment(&conn, &pay(Some(appt), PaymentStatus::Pending)).unwrap();
        let second = create_payment(&conn, &pay(Some(appt), PaymentStatus::Completed)).unwrap();
        delete_payment(&conn, first.payment_id).unwrap();
        assert!(is_paid(&conn, appt));
        delete_payment(&conn, second.payment_id).unwrap();
        assert!(!is_paid(&conn, appt));
    }

    #[test]
    fn completing_a_payment_marks_appointment_paid() {
        let (conn, appt) = setup();
        let payment = create_payment(&conn, &pay(Some(appt), PaymentStatus::Pending)).unwrap();
        set_appointment_paid(&conn, appt, false).unwrap();

        let updated = update_payment_status(&conn, payment.payment_id, PaymentStatus::Completed).unwrap();
        assert_eq!(updated.status, PaymentStatus::Completed);
        assert!(is_paid(&conn, appt));
    }

    #[test]
    fn moving_payment_resettles_both_appointments() {
        let (conn, first) = setup();
        let second = fixtures::appointment(&conn, "P30000", "D30000", day(2025, 5, 6));
        let payment = create_payment(&conn, &pay(Some(first), PaymentStatus::Completed)).unwrap();

        update_payment_details(&conn, payment.payment_id, &PaymentRequest {
            appointment_id: Some(second),
            ..Default::default()
        })
        .unwrap();
        assert!(!is_paid(&conn, first));
        assert!(is_paid(&conn, second));
    }

    #[test]
    fn create_validates_required_fields_and_references() {
        let (conn, _) = setup();
        let mut req = pay(None, PaymentStatus::Pending);
        req.amount = None;
        assert!(matches!(create_payment(&conn, &req), Err(DatabaseError::Validation(_))));

        let mut req = pay(Some(999), PaymentStatus::Pending);
        assert!(matches!(create_payment(&conn, &req), Err(DatabaseError::NotFound { .. })));

        req.appointment_id = None;
        req.staff_id = Some("S00404".into());
        assert!(matches!(create_payment(&conn, &req), Err(DatabaseError::NotFound { .. })));
        assert!(list_payments(&conn, &PaymentFilter::All).unwrap().is_empty());
    }

    #[test]
    fn defaults_to_pending_and_now() {
        let (conn, _) = setup();
        let mut req = pay(None, PaymentStatus::Pending);
        req.status = None;
        let payment = create_payment(&conn, &req).unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.patient_name.as_deref(), Some("Ada Lovelace"));
        assert!(payment.payment_date <= now_timestamp());
    }

    #[test]
    fn revenue_counts_completed_only() {
        let (conn, _) = setup();
        for (date, amount, status) in [
            (at(2025, 1, 15), 100.0, PaymentStatus::Completed),
            (at(2025, 1, 31), 50.0, PaymentStatus::Completed),
            (at(2025, 3, 2), 25.0, PaymentStatus::Completed),
            (at(2025, 3, 3), 999.0, PaymentStatus::Pending),
            (at(2024, 12, 31), 70.0, PaymentStatus::Completed),
        ] {
            let mut req = pay(None, status);
            req.amount = Some(amount);
            req.payment_date = Some(date);
            create_payment(&conn, &req).unwrap();
        }

        assert_eq!(revenue_for_month(&conn, 2025, 1).unwrap(), 150.0);
        assert_eq!(revenue_for_period(&conn, at(2025, 1, 1), at(2025, 12, 31)).unwrap(), 175.0);

        let monthly = monthly_revenue(&conn, 2025).unwrap();
        assert_eq!(monthly.len(), 12);
        assert_eq!(monthly[0], MonthlyRevenue { month: 1, revenue: 150.0 });
        assert_eq!(monthly[1].revenue, 0.0);
        assert_eq!(monthly[2].revenue, 25.0);

        let summary = revenue_summary(&conn, day(2025, 3, 20)).unwrap();
        assert_eq!(summary.month_revenue, 25.0);
        assert_eq!(summary.year_revenue, 175.0);
        assert_eq!(summary.pending_payments, 1);
        assert_eq!(summary.completed_payments, 4);
    }

    #[test]
    fn invalid_month_is_validation_error() {
        let (conn, _) = setup();
        assert!(matches!(revenue_for_month(&conn, 2025, 13), Err(DatabaseError::Validation(_))));
    }

    #[test]
    fn december_bounds_reach_year_end() {
        let (from, to) = month_bounds(2025, 12).unwrap();
        assert_eq!(from, day(2025, 12, 1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(to, day(2025, 12, 31).and_hms_opt(23, 59, 59).unwrap());
    }
}
