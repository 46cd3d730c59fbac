use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub department_id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Weak reference: cleared when the doctor goes away.
    pub head_doctor_id: Option<String>,
    #[serde(default)]
    pub head_doctor_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
