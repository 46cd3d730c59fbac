use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::{PaymentStatus, PaymentType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub payment_id: i64,
    pub patient_id: Option<String>,
    pub appointment_id: Option<i64>,
    /// Staff member who took the payment.
    pub received_by: Option<String>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub payment_date: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,

    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub staff_name: Option<String>,
}
