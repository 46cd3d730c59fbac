use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::enums::AppointmentStatus;

/// Appointment row plus the display fields of the people it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub appointment_id: i64,
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub department_id: Option<i64>,
    pub appointment_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub appointment_fee: Option<f64>,
    pub is_paid: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,

    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub patient_email: Option<String>,
    #[serde(default)]
    pub patient_phone: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub doctor_specialization: Option<String>,
    #[serde(default)]
    pub department_name: Option<String>,
}
