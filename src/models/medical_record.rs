use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::RecordType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    pub record_id: i64,
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
    pub record_date: NaiveDateTime,
    pub next_appointment: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,

    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub doctor_specialization: Option<String>,
}

/// Number of records of one type for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTypeCount {
    pub record_type: RecordType,
    pub count: i64,
}
