use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::{DosageUnit, MedicationType};

/// Pharmacy catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub medication_id: i64,
    pub name: String,
    pub generic_name: Option<String>,
    pub brand: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "type")]
    pub medication_type: Option<MedicationType>,
    pub description: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub dosage_unit: Option<DosageUnit>,
    pub side_effects: Option<String>,
    pub contraindications: Option<String>,
    pub storage: Option<String>,
    pub requires_prescription: bool,
    pub price: Option<f64>,
    pub stock_quantity: i32,
    pub reorder_level: Option<i32>,
    pub batch_number: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub barcode: Option<String>,
    pub ndc_code: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
