use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, now_timestamp, query_count, query_list, Conditions};
use crate::db::{map_delete_error, map_write_error, DatabaseError};
use crate::models::enums::{PaymentStatus, PaymentType};
use crate::models::*;

const PAYMENT_SELECT: &str = "SELECT pay.payment_id, pay.patient_id, pay.appointment_id,
        pay.received_by, pay.amount, pay.payment_type, pay.status, pay.payment_method,
        pay.transaction_id, pay.notes, pay.payment_date, pay.created_at, pay.updated_at,
        p.first_name || ' ' || p.last_name AS patient_name,
        'Dr. ' || d.first_name || ' ' || d.last_name AS doctor_name,
        s.first_name || ' ' || s.last_name AS staff_name
     FROM payments pay
     LEFT JOIN patients p ON p.patient_id = pay.patient_id
     LEFT JOIN appointments a ON a.appointment_id = pay.appointment_id
     LEFT JOIN doctors d ON d.doctor_id = a.doctor_id
     LEFT JOIN staff s ON s.staff_id = pay.received_by";

const PAYMENT_ORDER: &str = "pay.payment_date DESC, pay.payment_id DESC";

#[derive(Debug, Clone)]
pub enum PaymentFilter<'a> {
    All,
    Patient(&'a str),
    Appointment(i64),
    Status(PaymentStatus),
    Type(PaymentType),
    /// Inclusive on both ends.
    DateRange(NaiveDateTime, NaiveDateTime),
}

impl PaymentFilter<'_> {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::new();
        match self {
            Self::All => {}
            Self::Patient(id) => {
                c.push("pay.patient_id = ?", id.to_string());
            }
            Self::Appointment(id) => {
                c.push("pay.appointment_id = ?", *id);
            }
            Self::Status(s) => {
                c.push("pay.status = ?", s.as_str().to_string());
            }
            Self::Type(t) => {
                c.push("pay.payment_type = ?", t.as_str().to_string());
            }
            Self::DateRange(from, to) => {
                c.push("pay.payment_date >= ?", format_timestamp(from))
                    .push("pay.payment_date <= ?", format_timestamp(to));
            }
        }
        c
    }
}

pub fn insert_payment(conn: &Connection, payment: &Payment) -> Result<i64, DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO payments (patient_id, appointment_id, received_by, amount, payment_type,
         status, payment_method, transaction_id, notes, payment_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            payment.patient_id,
            payment.appointment_id,
            payment.received_by,
            payment.amount,
            payment.payment_type,
            payment.status,
            payment.payment_method,
            payment.transaction_id,
            payment.notes,
            format_timestamp(&payment.payment_date),
            now,
        ],
    )
    .map_err(|e| map_write_error(e, "Payment"))?;
    Ok(conn.last_insert_rowid())
}

pub fn payment_exists(conn: &Connection, payment_id: i64) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM payments WHERE payment_id = ?1)",
        params![payment_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_payment(conn: &Connection, payment_id: i64) -> Result<Option<Payment>, DatabaseError> {
    let payment = conn
        .query_row(
            &format!("{PAYMENT_SELECT} WHERE pay.payment_id = ?1"),
            params![payment_id],
            payment_from_row,
        )
        .optional()?;
    Ok(payment)
}

pub fn list_payments(conn: &Connection, filter: &PaymentFilter<'_>) -> Result<Vec<Payment>, DatabaseError> {
    query_list(
        conn,
        PAYMENT_SELECT,
        &filter.conditions(),
        PAYMENT_ORDER,
        payment_from_row,
        "payment",
    )
}

pub fn update_payment(conn: &Connection, payment: &Payment) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE payments SET patient_id = ?2, appointment_id = ?3, received_by = ?4, amount = ?5,
             payment_type = ?6, status = ?7, payment_method = ?8, transaction_id = ?9, notes = ?10,
             payment_date = ?11, updated_at = ?12
             WHERE payment_id = ?1",
            params![
                payment.payment_id,
                payment.patient_id,
                payment.appointment_id,
                payment.received_by,
                payment.amount,
                payment.payment_type,
                payment.status,
                payment.payment_method,
                payment.transaction_id,
                payment.notes,
                format_timestamp(&payment.payment_date),
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Payment"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Payment", payment.payment_id));
    }
    Ok(())
}

pub fn set_payment_status(conn: &Connection, payment_id: i64, status: PaymentStatus) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE payments SET status = ?2, updated_at = ?3 WHERE payment_id = ?1",
        params![payment_id, status, format_timestamp(&now_timestamp())],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Payment", payment_id));
    }
    Ok(())
}

pub fn delete_payment_row(conn: &Connection, payment_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM payments WHERE payment_id = ?1", params![payment_id])
        .map_err(|e| map_delete_error(e, "Payment"))?;
    Ok(deleted)
}

pub fn count_payments_for_appointment(conn: &Connection, appointment_id: i64) -> Result<i64, DatabaseError> {
    let mut c = Conditions::new();
    c.push("appointment_id = ?", appointment_id);
    query_count(conn, "SELECT COUNT(*) FROM payments", &c)
}

pub fn count_payments_by_status(conn: &Connection, status: PaymentStatus) -> Result<i64, DatabaseError> {
    let mut c = Conditions::new();
    c.push("status = ?", status.as_str().to_string());
    query_count(conn, "SELECT COUNT(*) FROM payments", &c)
}

/// Sum of COMPLETED payment amounts dated within `[from, to]`.
pub fn sum_completed_payments(
    conn: &Connection,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<f64, DatabaseError> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM payments
         WHERE status = 'COMPLETED' AND payment_date >= ?1 AND payment_date <= ?2",
        params![format_timestamp(from), format_timestamp(to)],
        |row| row.get::<_, f64>(0),
    )?;
    Ok(total)
}

pub fn detach_payments_from_patient(conn: &Connection, patient_id: &str) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE payments SET patient_id = NULL, updated_at = ?2 WHERE patient_id = ?1",
        params![patient_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(n)
}

pub fn detach_payments_from_staff(conn: &Connection, staff_id: &str) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE payments SET received_by = NULL, updated_at = ?2 WHERE received_by = ?1",
        params![staff_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(n)
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        payment_id: row.get("payment_id")?,
        patient_id: row.get("patient_id")?,
        appointment_id: row.get("appointment_id")?,
        received_by: row.get("received_by")?,
        amount: row.get("amount")?,
        payment_type: row.get("payment_type")?,
        status: row.get("status")?,
        payment_method: row.get("payment_method")?,
        transaction_id: row.get("transaction_id")?,
        notes: row.get("notes")?,
        payment_date: row.get("payment_date")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        patient_name: row.get("patient_name")?,
        doctor_name: row.get("doctor_name")?,
        staff_name: row.get("staff_name")?,
    })
}
