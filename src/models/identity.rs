use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::{Gender, UserType};

/// Login account. Exactly one specialization row links back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: i64,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub user_type: UserType,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Contact fields shared by every registration and profile update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// Account fields embedded in profile projections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub user_type: UserType,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub doctor_id: String,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub license_number: Option<String>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub rating: Option<f64>,
    pub department_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Doctor {
    /// "Dr. First Last", the form embedded in clinical projections.
    pub fn display_name(&self) -> String {
        format!("Dr. {} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    #[serde(flatten)]
    pub doctor: Doctor,
    #[serde(flatten)]
    pub account: AccountSummary,
    pub department_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub patient_id: String,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub blood_group: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_id: Option<String>,
    pub primary_doctor_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    #[serde(flatten)]
    pub patient: Patient,
    #[serde(flatten)]
    pub account: AccountSummary,
    pub primary_doctor_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub staff_id: String,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub department_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffProfile {
    #[serde(flatten)]
    pub staff: Staff,
    #[serde(flatten)]
    pub account: AccountSummary,
    pub department_name: Option<String>,
    /// Taken from the stored user role, never from the ID prefix.
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub admin_id: String,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub department_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    #[serde(flatten)]
    pub admin: Admin,
    #[serde(flatten)]
    pub account: AccountSummary,
    pub department_name: Option<String>,
}
