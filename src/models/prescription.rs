use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::PrescriptionStatus;

/// One medication line of a prescription. No identity of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationLine {
    pub medication_name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub instructions: Option<String>,
    pub quantity: Option<i32>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub prescription_id: i64,
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub medical_record_id: Option<i64>,
    pub pharmacy_id: Option<i64>,
    pub prescription_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub status: PrescriptionStatus,
    pub notes: Option<String>,
    pub is_refillable: bool,
    pub total_refills: i32,
    pub refills_remaining: i32,
    pub medications: Vec<MedicationLine>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,

    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub pharmacy_name: Option<String>,
    #[serde(default)]
    pub pharmacy_address: Option<String>,
    #[serde(default)]
    pub pharmacy_phone: Option<String>,
}
