//! Identity: registration, login and profile maintenance for the four roles.
//!
//! A person is one `users` row plus exactly one specialization row (doctor,
//! patient, staff or admin) keyed by a role ID: a one-letter prefix and five
//! random digits. Both rows are written in one transaction. The stored
//! `user_type` is the only source of truth for the role; the prefix is cosmetic.

use std::sync::LazyLock;

use chrono::NaiveDate;
use rand::Rng;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::crypto::PasswordHasher;
use crate::db::repository::*;
use crate::db::{constraint_kind, ConstraintKind, DatabaseError};
use crate::models::enums::UserType;
use crate::models::*;

/// Digits after the role prefix.
pub const ROLE_ID_DIGITS: u32 = 5;

/// Consecutive collisions tolerated before the ID space is treated as exhausted.
const MAX_ID_ATTEMPTS: usize = 10_000;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

static ROLE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[DPSA]\d{5}$").expect("role id pattern is valid"));

// ─── Requests & responses ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub license_number: Option<String>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub blood_group: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_id: Option<String>,
    pub primary_doctor_id: Option<String>,
}

/// Staff registration. `is_admin` yields an ADMIN account with an `A` ID.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub department_id: Option<i64>,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub department_id: Option<i64>,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub user_id: i64,
    pub role_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub success: bool,
    pub message: String,
}

/// `identifier` is either the role ID or the account email.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub authenticated: bool,
    pub message: String,
    pub user_id: Option<i64>,
    pub role_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub user_type: Option<UserType>,
}

impl LoginResponse {
    fn rejected(message: &str) -> Self {
        Self {
            authenticated: false,
            message: message.to_string(),
            ..Default::default()
        }
    }
}

/// Account fields every profile update may touch; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    pub email: Option<String>,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorUpdate {
    #[serde(flatten)]
    pub account: AccountUpdate,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub license_number: Option<String>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub rating: Option<f64>,
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    #[serde(flatten)]
    pub account: AccountUpdate,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub blood_group: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_id: Option<String>,
    pub primary_doctor_id: Option<String>,
}

/// Shared by staff and admin profiles.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUpdate {
    #[serde(flatten)]
    pub account: AccountUpdate,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub department_id: Option<i64>,
}

// ─── Role IDs ─────────────────────────────────────────────────────────────────

/// Prefix letter for a role's IDs.
pub fn role_prefix(user_type: UserType) -> char {
    match user_type {
        UserType::Doctor => 'D',
        UserType::Patient => 'P',
        UserType::Staff => 'S',
        UserType::Admin => 'A',
    }
}

pub fn generate_role_id(prefix: char) -> String {
    let n = rand::thread_rng().gen_range(0..10u32.pow(ROLE_ID_DIGITS));
    format!("{prefix}{n:05}")
}

pub fn is_role_id(value: &str) -> bool {
    ROLE_ID_PATTERN.is_match(value)
}

/// Checked against every role table so `A` IDs stay unique across staff and admins.
fn role_id_taken(conn: &Connection, role_id: &str) -> Result<bool, DatabaseError> {
    Ok(doctor_exists(conn, role_id)?
        || patient_exists(conn, role_id)?
        || staff_exists(conn, role_id)?
        || admin_exists(conn, role_id)?)
}

/// Draw IDs until `insert` succeeds with one that is free.
///
/// A unique violation from `insert` (a concurrent registration won the same
/// ID) counts as a collision and triggers another draw.
fn insert_with_fresh_id<F>(conn: &Connection, prefix: char, mut insert: F) -> Result<String, DatabaseError>
where
    F: FnMut(&str) -> Result<(), DatabaseError>,
{
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = generate_role_id(prefix);
        if role_id_taken(conn, &candidate)? {
            continue;
        }
        match insert(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(DatabaseError::Sqlite(e)) if constraint_kind(&e) == Some(ConstraintKind::Unique) => {
                tracing::debug!(%candidate, "Role ID collided on insert, drawing again");
            }
            Err(e) => return Err(e),
        }
    }
    Err(DatabaseError::IdSpaceExhausted {
        prefix,
        attempts: MAX_ID_ATTEMPTS,
    })
}

// ─── Validation ───────────────────────────────────────────────────────────────

/// Trimmed email, or `Validation` when it does not look like an address.
pub fn normalize_email(email: &str) -> Result<String, DatabaseError> {
    let email = email.trim();
    if !EMAIL_PATTERN.is_match(email) {
        return Err(DatabaseError::Validation(format!("Invalid email address: {email}")));
    }
    Ok(email.to_string())
}

fn require_text(value: &str, field: &str) -> Result<String, DatabaseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DatabaseError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

struct NewAccount {
    email: String,
    first_name: String,
    last_name: String,
}

fn validate_new_account(
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<NewAccount, DatabaseError> {
    if password.is_empty() {
        return Err(DatabaseError::Validation("password is required".into()));
    }
    Ok(NewAccount {
        email: normalize_email(email)?,
        first_name: require_text(first_name, "firstName")?,
        last_name: require_text(last_name, "lastName")?,
    })
}

/// Keep a department reference only when the department exists.
fn resolve_department(conn: &Connection, department_id: Option<i64>) -> Result<Option<i64>, DatabaseError> {
    match department_id {
        Some(id) if department_exists(conn, id)? => Ok(Some(id)),
        Some(id) => {
            tracing::warn!(department_id = id, "Unknown department dropped");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Keep a doctor reference only when the doctor exists.
pub(crate) fn resolve_doctor(conn: &Connection, doctor_id: Option<&str>) -> Result<Option<String>, DatabaseError> {
    match doctor_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) if doctor_exists(conn, id)? => Ok(Some(id.to_string())),
        Some(id) => {
            tracing::warn!(doctor_id = id, "Unknown doctor reference dropped");
            Ok(None)
        }
        None => Ok(None),
    }
}

fn create_account(
    conn: &Connection,
    hasher: &PasswordHasher,
    account: &NewAccount,
    password: &str,
    contact: &ContactDetails,
    user_type: UserType,
) -> Result<i64, DatabaseError> {
    if email_exists(conn, &account.email)? {
        return Err(DatabaseError::DuplicateEmail(account.email.clone()));
    }
    insert_user(conn, &account.email, &hasher.hash(password), contact, user_type)
}

fn registered(user_id: i64, role_id: String, account: NewAccount, user_type: UserType, label: &str) -> RegistrationResponse {
    RegistrationResponse {
        user_id,
        role_id,
        email: account.email,
        first_name: account.first_name,
        last_name: account.last_name,
        user_type,
        success: true,
        message: format!("{label} registered successfully"),
    }
}

// ─── Registration ─────────────────────────────────────────────────────────────

pub fn register_doctor(
    conn: &Connection,
    hasher: &PasswordHasher,
    req: &DoctorRegistration,
) -> Result<RegistrationResponse, DatabaseError> {
    let account = validate_new_account(&req.email, &req.password, &req.first_name, &req.last_name)?;
    let tx = conn.unchecked_transaction()?;
    let user_id = create_account(&tx, hasher, &account, &req.password, &req.contact, UserType::Doctor)?;
    let now = now_timestamp();
    let mut doctor = Doctor {
        doctor_id: String::new(),
        user_id,
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        specialization: req.specialization.clone(),
        qualification: req.qualification.clone(),
        experience_years: req.experience_years,
        license_number: req.license_number.clone(),
        consultation_fee: req.consultation_fee,
        bio: req.bio.clone(),
        rating: None,
        department_id: resolve_department(&tx, req.department_id)?,
        created_at: now,
        updated_at: now,
    };
    let doctor_id = insert_with_fresh_id(&tx, role_prefix(UserType::Doctor), |id| {
        doctor.doctor_id = id.to_string();
        insert_doctor(&tx, &doctor)
    })?;
    tx.commit()?;

    tracing::info!(%doctor_id, user_id, "Doctor registered");
    Ok(registered(user_id, doctor_id, account, UserType::Doctor, "Doctor"))
}

pub fn register_patient(
    conn: &Connection,
    hasher: &PasswordHasher,
    req: &PatientRegistration,
) -> Result<RegistrationResponse, DatabaseError> {
    let account = validate_new_account(&req.email, &req.password, &req.first_name, &req.last_name)?;
    let tx = conn.unchecked_transaction()?;
    let user_id = create_account(&tx, hasher, &account, &req.password, &req.contact, UserType::Patient)?;
    let now = now_timestamp();
    let mut patient = Patient {
        patient_id: String::new(),
        user_id,
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        blood_group: req.blood_group.clone(),
        height: req.height,
        weight: req.weight,
        allergies: req.allergies.clone(),
        emergency_contact_name: req.emergency_contact_name.clone(),
        emergency_contact_phone: req.emergency_contact_phone.clone(),
        insurance_provider: req.insurance_provider.clone(),
        insurance_id: req.insurance_id.clone(),
        primary_doctor_id: resolve_doctor(&tx, req.primary_doctor_id.as_deref())?,
        created_at: now,
        updated_at: now,
    };
    let patient_id = insert_with_fresh_id(&tx, role_prefix(UserType::Patient), |id| {
        patient.patient_id = id.to_string();
        insert_patient(&tx, &patient)
    })?;
    tx.commit()?;

    tracing::info!(%patient_id, user_id, "Patient registered");
    Ok(registered(user_id, patient_id, account, UserType::Patient, "Patient"))
}

pub fn register_staff(
    conn: &Connection,
    hasher: &PasswordHasher,
    req: &StaffRegistration,
) -> Result<RegistrationResponse, DatabaseError> {
    let account = validate_new_account(&req.email, &req.password, &req.first_name, &req.last_name)?;
    let user_type = if req.is_admin { UserType::Admin } else { UserType::Staff };
    let tx = conn.unchecked_transaction()?;
    let user_id = create_account(&tx, hasher, &account, &req.password, &req.contact, user_type)?;
    let now = now_timestamp();
    let mut staff = Staff {
        staff_id: String::new(),
        user_id,
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        position: req.position.clone(),
        hire_date: req.hire_date,
        department_id: resolve_department(&tx, req.department_id)?,
        created_at: now,
        updated_at: now,
    };
    let staff_id = insert_with_fresh_id(&tx, role_prefix(user_type), |id| {
        staff.staff_id = id.to_string();
        insert_staff(&tx, &staff)
    })?;
    tx.commit()?;

    let label = if req.is_admin { "Admin" } else { "Staff" };
    tracing::info!(%staff_id, user_id, %user_type, "Staff member registered");
    Ok(registered(user_id, staff_id, account, user_type, label))
}

pub fn register_admin(
    conn: &Connection,
    hasher: &PasswordHasher,
    req: &AdminRegistration,
) -> Result<RegistrationResponse, DatabaseError> {
    let account = validate_new_account(&req.email, &req.password, &req.first_name, &req.last_name)?;
    let tx = conn.unchecked_transaction()?;
    let user_id = create_account(&tx, hasher, &account, &req.password, &req.contact, UserType::Admin)?;
    let now = now_timestamp();
    let mut admin = Admin {
        admin_id: String::new(),
        user_id,
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        position: req.position.clone(),
        hire_date: req.hire_date,
        department_id: resolve_department(&tx, req.department_id)?,
        created_at: now,
        updated_at: now,
    };
    let admin_id = insert_with_fresh_id(&tx, role_prefix(UserType::Admin), |id| {
        admin.admin_id = id.to_string();
        insert_admin(&tx, &admin)
    })?;
    tx.commit()?;

    tracing::info!(%admin_id, user_id, "Admin registered");
    Ok(registered(user_id, admin_id, account, UserType::Admin, "Admin"))
}

// ─── Login ────────────────────────────────────────────────────────────────────

/// A specialization row resolved for login, with its account.
struct LoginIdentity {
    user: User,
    role_id: String,
    first_name: String,
    last_name: String,
}

/// Whether an account of `user_type` may sign in through the `role` endpoint.
fn accepts(role: UserType, user_type: UserType) -> bool {
    match role {
        UserType::Staff => matches!(user_type, UserType::Staff | UserType::Admin),
        other => other == user_type,
    }
}

fn identity_by_role_id(conn: &Connection, role: UserType, role_id: &str) -> Result<Option<(i64, String, String, String)>, DatabaseError> {
    let found = match role {
        UserType::Doctor => get_doctor(conn, role_id)?.map(|d| (d.user_id, d.doctor_id, d.first_name, d.last_name)),
        UserType::Patient => get_patient(conn, role_id)?.map(|p| (p.user_id, p.patient_id, p.first_name, p.last_name)),
        UserType::Staff => get_staff(conn, role_id)?.map(|s| (s.user_id, s.staff_id, s.first_name, s.last_name)),
        UserType::Admin => match get_admin(conn, role_id)? {
            Some(a) => Some((a.user_id, a.admin_id, a.first_name, a.last_name)),
            None => get_staff(conn, role_id)?.map(|s| (s.user_id, s.staff_id, s.first_name, s.last_name)),
        },
    };
    Ok(found)
}

fn identity_by_user(conn: &Connection, role: UserType, user_id: i64) -> Result<Option<(i64, String, String, String)>, DatabaseError> {
    let found = match role {
        UserType::Doctor => get_doctor_by_user(conn, user_id)?.map(|d| (d.user_id, d.doctor_id, d.first_name, d.last_name)),
        UserType::Patient => get_patient_by_user(conn, user_id)?.map(|p| (p.user_id, p.patient_id, p.first_name, p.last_name)),
        UserType::Staff => get_staff_by_user(conn, user_id)?.map(|s| (s.user_id, s.staff_id, s.first_name, s.last_name)),
        UserType::Admin => match get_admin_by_user(conn, user_id)? {
            Some(a) => Some((a.user_id, a.admin_id, a.first_name, a.last_name)),
            None => get_staff_by_user(conn, user_id)?.map(|s| (s.user_id, s.staff_id, s.first_name, s.last_name)),
        },
    };
    Ok(found)
}

fn resolve_login(conn: &Connection, role: UserType, identifier: &str) -> Result<Option<LoginIdentity>, DatabaseError> {
    let identifier = identifier.trim();
    let by_id = identity_by_role_id(conn, role, identifier)?;
    let found = match by_id {
        Some(found) => Some(found),
        None => match get_user_by_email(conn, identifier)? {
            Some(user) if accepts(role, user.user_type) => identity_by_user(conn, role, user.user_id)?,
            _ => None,
        },
    };
    let Some((user_id, role_id, first_name, last_name)) = found else {
        return Ok(None);
    };
    let Some(user) = get_user(conn, user_id)? else {
        return Ok(None);
    };
    if !accepts(role, user.user_type) {
        return Ok(None);
    }
    Ok(Some(LoginIdentity {
        user,
        role_id,
        first_name,
        last_name,
    }))
}

/// Authenticate through the `role` endpoint. Never writes anything.
pub fn login(
    conn: &Connection,
    hasher: &PasswordHasher,
    role: UserType,
    req: &LoginRequest,
) -> Result<LoginResponse, DatabaseError> {
    let Some(identity) = resolve_login(conn, role, &req.identifier)? else {
        let label = match role {
            UserType::Doctor => "Doctor",
            UserType::Patient => "Patient",
            UserType::Staff => "Staff",
            UserType::Admin => "Admin",
        };
        return Ok(LoginResponse::rejected(&format!("{label} not found with provided credentials")));
    };
    if !identity.user.is_active {
        return Ok(LoginResponse::rejected("Account is deactivated"));
    }
    if !hasher.verify(&req.password, &identity.user.password_hash) {
        return Ok(LoginResponse::rejected("Invalid credentials"));
    }

    tracing::info!(role_id = %identity.role_id, %role, "Login successful");
    Ok(LoginResponse {
        authenticated: true,
        message: "Login successful".into(),
        user_id: Some(identity.user.user_id),
        role_id: Some(identity.role_id),
        first_name: Some(identity.first_name),
        last_name: Some(identity.last_name),
        email: Some(identity.user.email),
        user_type: Some(identity.user.user_type),
    })
}

// ─── Profiles ─────────────────────────────────────────────────────────────────

fn apply_account(conn: &Connection, user_id: i64, update: &AccountUpdate) -> Result<(), DatabaseError> {
    let email = match update.email.as_deref() {
        Some(raw) => Some(normalize_email(raw)?),
        None => None,
    };
    update_user_contact(conn, user_id, email.as_deref(), &update.contact, update.is_active)
}

fn replace_name(target: &mut String, value: &Option<String>, field: &str) -> Result<(), DatabaseError> {
    if let Some(value) = value {
        *target = require_text(value, field)?;
    }
    Ok(())
}

pub fn update_doctor_profile(conn: &Connection, doctor_id: &str, req: &DoctorUpdate) -> Result<DoctorProfile, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut doctor = get_doctor(&tx, doctor_id)?.ok_or_else(|| DatabaseError::not_found("Doctor", doctor_id))?;
    replace_name(&mut doctor.first_name, &req.first_name, "firstName")?;
    replace_name(&mut doctor.last_name, &req.last_name, "lastName")?;
    if req.specialization.is_some() {
        doctor.specialization = req.specialization.clone();
    }
    if req.qualification.is_some() {
        doctor.qualification = req.qualification.clone();
    }
    if req.experience_years.is_some() {
        doctor.experience_years = req.experience_years;
    }
    if req.license_number.is_some() {
        doctor.license_number = req.license_number.clone();
    }
    if req.consultation_fee.is_some() {
        doctor.consultation_fee = req.consultation_fee;
    }
    if req.bio.is_some() {
        doctor.bio = req.bio.clone();
    }
    if req.rating.is_some() {
        doctor.rating = req.rating;
    }
    if req.department_id.is_some() {
        doctor.department_id = resolve_department(&tx, req.department_id)?;
    }
    update_doctor(&tx, &doctor)?;
    apply_account(&tx, doctor.user_id, &req.account)?;
    let profile = get_doctor_profile(&tx, doctor_id)?.ok_or_else(|| DatabaseError::not_found("Doctor", doctor_id))?;
    tx.commit()?;
    Ok(profile)
}

pub fn update_patient_profile(conn: &Connection, patient_id: &str, req: &PatientUpdate) -> Result<PatientProfile, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut patient = get_patient(&tx, patient_id)?.ok_or_else(|| DatabaseError::not_found("Patient", patient_id))?;
    replace_name(&mut patient.first_name, &req.first_name, "firstName")?;
    replace_name(&mut patient.last_name, &req.last_name, "lastName")?;
    macro_rules! keep_or_replace {
        ($($field:ident),+) => {
            $(if req.$field.is_some() {
                patient.$field = req.$field.clone();
            })+
        };
    }
    keep_or_replace!(
        blood_group,
        height,
        weight,
        allergies,
        emergency_contact_name,
        emergency_contact_phone,
        insurance_provider,
        insurance_id
    );
    if req.primary_doctor_id.is_some() {
        patient.primary_doctor_id = resolve_doctor(&tx, req.primary_doctor_id.as_deref())?;
    }
    update_patient(&tx, &patient)?;
    apply_account(&tx, patient.user_id, &req.account)?;
    let profile = get_patient_profile(&tx, patient_id)?.ok_or_else(|| DatabaseError::not_found("Patient", patient_id))?;
    tx.commit()?;
    Ok(profile)
}

pub fn update_staff_profile(conn: &Connection, staff_id: &str, req: &StaffUpdate) -> Result<StaffProfile, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut staff = get_staff(&tx, staff_id)?.ok_or_else(|| DatabaseError::not_found("Staff", staff_id))?;
    replace_name(&mut staff.first_name, &req.first_name, "firstName")?;
    replace_name(&mut staff.last_name, &req.last_name, "lastName")?;
    if req.position.is_some() {
        staff.position = req.position.clone();
    }
    if req.hire_date.is_some() {
        staff.hire_date = req.hire_date;
    }
    if req.department_id.is_some() {
        staff.department_id = resolve_department(&tx, req.department_id)?;
    }
    update_staff(&tx, &staff)?;
    apply_account(&tx, staff.user_id, &req.account)?;
    let profile = get_staff_profile(&tx, staff_id)?.ok_or_else(|| DatabaseError::not_found("Staff", staff_id))?;
    tx.commit()?;
    Ok(profile)
}

pub fn update_admin_profile(conn: &Connection, admin_id: &str, req: &StaffUpdate) -> Result<AdminProfile, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut admin = get_admin(&tx, admin_id)?.ok_or_else(|| DatabaseError::not_found("Admin", admin_id))?;
    replace_name(&mut admin.first_name, &req.first_name, "firstName")?;
    replace_name(&mut admin.last_name, &req.last_name, "lastName")?;
    if req.position.is_some() {
        admin.position = req.position.clone();
    }
    if req.hire_date.is_some() {
        admin.hire_date = req.hire_date;
    }
    if req.department_id.is_some() {
        admin.department_id = resolve_department(&tx, req.department_id)?;
    }
    update_admin(&tx, &admin)?;
    apply_account(&tx, admin.user_id, &req.account)?;
    let profile = get_admin_profile(&tx, admin_id)?.ok_or_else(|| DatabaseError::not_found("Admin", admin_id))?;
    tx.commit()?;
    Ok(profile)
}

pub fn doctor_profile(conn: &Connection, doctor_id: &str) -> Result<DoctorProfile, DatabaseError> {
    get_doctor_profile(conn, doctor_id)?.ok_or_else(|| DatabaseError::not_found("Doctor", doctor_id))
}

pub fn patient_profile(conn: &Connection, patient_id: &str) -> Result<PatientProfile, DatabaseError> {
    get_patient_profile(conn, patient_id)?.ok_or_else(|| DatabaseError::not_found("Patient", patient_id))
}

pub fn staff_profile(conn: &Connection, staff_id: &str) -> Result<StaffProfile, DatabaseError> {
    get_staff_profile(conn, staff_id)?.ok_or_else(|| DatabaseError::not_found("Staff", staff_id))
}

pub fn admin_profile(conn: &Connection, admin_id: &str) -> Result<AdminProfile, DatabaseError> {
    get_admin_profile(conn, admin_id)?.ok_or_else(|| DatabaseError::not_found("Admin", admin_id))
}

pub fn doctors(conn: &Connection) -> Result<Vec<DoctorProfile>, DatabaseError> {
    list_doctor_profiles(conn)
}

pub fn patients(conn: &Connection) -> Result<Vec<PatientProfile>, DatabaseError> {
    list_patient_profiles(conn)
}

/// Staff profiles, admins registered through the staff flow included.
pub fn staff_members(conn: &Connection) -> Result<Vec<StaffProfile>, DatabaseError> {
    list_staff_profiles(conn)
}

pub fn admins(conn: &Connection) -> Result<Vec<AdminProfile>, DatabaseError> {
    list_admin_profiles(conn)
}

/// Blank queries list every patient.
pub fn search_patients(conn: &Connection, query: &str) -> Result<Vec<PatientProfile>, DatabaseError> {
    if query.trim().is_empty() {
        return list_patient_profiles(conn);
    }
    search_patient_profiles(conn, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    fn doctor_req(email: &str) -> DoctorRegistration {
        DoctorRegistration {
            email: email.into(),
            password: "s3cret!".into(),
            first_name: "Meredith".into(),
            last_name: "Grey".into(),
            contact: ContactDetails::default(),
            specialization: Some("Surgery".into()),
            qualification: None,
            experience_years: Some(5),
            license_number: None,
            consultation_fee: Some(120.0),
            bio: None,
            department_id: None,
        }
    }

    fn patient_req(email: &str) -> PatientRegistration {
        PatientRegistration {
            email: email.into(),
            password: "pw".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            contact: ContactDetails::default(),
            blood_group: None,
            height: None,
            weight: None,
            allergies: Some("Penicillin".into()),
            emergency_contact_name: None,
            emergency_contact_phone: None,
            insurance_provider: None,
            insurance_id: None,
            primary_doctor_id: None,
        }
    }

    fn staff_req(email: &str, is_admin: bool) -> StaffRegistration {
        StaffRegistration {
            email: email.into(),
            password: "pw".into(),
            first_name: "Nina".into(),
            last_name: "Reyes".into(),
            contact: ContactDetails::default(),
            department_id: None,
            position: Some("Reception".into()),
            hire_date: None,
            is_admin,
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn generated_ids_match_role_pattern() {
        for user_type in UserType::ALL {
            for _ in 0..200 {
                let id = generate_role_id(role_prefix(*user_type));
                assert!(is_role_id(&id), "{id}");
            }
        }
    }

    #[test]
    fn register_doctor_creates_user_and_doctor() {
        let conn = open_memory_database().unwrap();
        let resp = register_doctor(&conn, &hasher(), &doctor_req(" grey@clinic.test ")).unwrap();
        assert!(resp.success);
        assert!(resp.role_id.starts_with('D'));
        assert!(is_role_id(&resp.role_id));
        assert_eq!(resp.email, "grey@clinic.test");

        let user = get_user(&conn, resp.user_id).unwrap().unwrap();
        assert_eq!(user.user_type, UserType::Doctor);
        assert_ne!(user.password_hash, "s3cret!");
        assert_eq!(get_doctor(&conn, &resp.role_id).unwrap().unwrap().user_id, resp.user_id);
    }

    #[test]
    fn duplicate_email_fails_and_writes_nothing() {
        let conn = open_memory_database().unwrap();
        register_doctor(&conn, &hasher(), &doctor_req("dup@clinic.test")).unwrap();
        let users_before = count(&conn, "users");

        let err = register_patient(&conn, &hasher(), &patient_req("DUP@clinic.test")).unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail(_)));
        let err = register_doctor(&conn, &hasher(), &doctor_req("dup@clinic.test")).unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail(_)));
        let err = register_staff(&conn, &hasher(), &staff_req("dup@clinic.test", false)).unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail(_)));

        assert_eq!(count(&conn, "users"), users_before);
        assert_eq!(count(&conn, "doctors"), 1);
        assert_eq!(count(&conn, "patients"), 0);
        assert_eq!(count(&conn, "staff"), 0);
    }

    #[test]
    fn invalid_email_is_rejected() {
        let conn = open_memory_database().unwrap();
        let err = register_doctor(&conn, &hasher(), &doctor_req("not-an-email")).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
        assert_eq!(count(&conn, "users"), 0);
    }

    #[test]
    fn many_registrations_get_distinct_ids() {
        let conn = open_memory_database().unwrap();
        let mut ids = std::collections::HashSet::new();
        for i in 0..50 {
            let resp = register_patient(&conn, &hasher(), &patient_req(&format!("p{i}@clinic.test"))).unwrap();
            assert!(is_role_id(&resp.role_id));
            assert!(ids.insert(resp.role_id));
        }
    }

    #[test]
    fn collision_on_insert_draws_again() {
        let conn = open_memory_database().unwrap();
        let mut calls = 0;
        conn.execute(
            "INSERT INTO users (email, password_hash, user_type, created_at, updated_at)
             VALUES ('busy@clinic.test', 'h', 'STAFF', 'now', 'now')",
            [],
        )
        .unwrap();
        let id = insert_with_fresh_id(&conn, 'S', |_| {
            calls += 1;
            if calls < 3 {
                conn.execute(
                    "INSERT INTO users (email, password_hash, user_type, created_at, updated_at)
                     VALUES ('busy@clinic.test', 'h', 'STAFF', 'now', 'now')",
                    [],
                )?;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 3);
        assert!(id.starts_with('S'));
    }

    #[test]
    fn exhausted_id_space_gives_up() {
        let conn = open_memory_database().unwrap();
        let insert_busy = || {
            conn.execute(
                "INSERT INTO users (email, password_hash, user_type, created_at, updated_at)
                 VALUES ('full@clinic.test', 'h', 'STAFF', 'now', 'now')",
                [],
            )
        };
        insert_busy().unwrap();
        let err = insert_with_fresh_id(&conn, 'S', |_| {
            insert_busy()?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::IdSpaceExhausted { prefix: 'S', attempts: MAX_ID_ATTEMPTS }
        ));
    }

    #[test]
    fn staff_admin_flag_comes_from_user_type() {
        let conn = open_memory_database().unwrap();
        let admin = register_staff(&conn, &hasher(), &staff_req("boss@clinic.test", true)).unwrap();
        let plain = register_staff(&conn, &hasher(), &staff_req("desk@clinic.test", false)).unwrap();
        assert!(admin.role_id.starts_with('A'));
        assert_eq!(admin.user_type, UserType::Admin);
        assert!(plain.role_id.starts_with('S'));

        assert!(staff_profile(&conn, &admin.role_id).unwrap().is_admin);
        assert!(!staff_profile(&conn, &plain.role_id).unwrap().is_admin);

        // Prefix is cosmetic: the stored role decides.
        conn.execute("UPDATE users SET user_type = 'STAFF' WHERE user_id = ?1", [admin.user_id]).unwrap();
        assert!(!staff_profile(&conn, &admin.role_id).unwrap().is_admin);
    }

    #[test]
    fn unknown_department_and_doctor_are_dropped() {
        let conn = open_memory_database().unwrap();
        let mut req = doctor_req("d@clinic.test");
        req.department_id = Some(999);
        let doctor = register_doctor(&conn, &hasher(), &req).unwrap();
        assert_eq!(get_doctor(&conn, &doctor.role_id).unwrap().unwrap().department_id, None);

        let mut req = patient_req("p@clinic.test");
        req.primary_doctor_id = Some("D99999".into());
        let patient = register_patient(&conn, &hasher(), &req).unwrap();
        assert_eq!(get_patient(&conn, &patient.role_id).unwrap().unwrap().primary_doctor_id, None);
    }

    #[test]
    fn login_by_role_id_and_email() {
        let conn = open_memory_database().unwrap();
        let reg = register_doctor(&conn, &hasher(), &doctor_req("house@clinic.test")).unwrap();

        let by_id = login(&conn, &hasher(), UserType::Doctor, &LoginRequest {
            identifier: reg.role_id.clone(),
            password: "s3cret!".into(),
        })
        .unwrap();
        assert!(by_id.authenticated);
        assert_eq!(by_id.role_id.as_deref(), Some(reg.role_id.as_str()));

        let by_email = login(&conn, &hasher(), UserType::Doctor, &LoginRequest {
            identifier: "house@clinic.test".into(),
            password: "s3cret!".into(),
        })
        .unwrap();
        assert!(by_email.authenticated);
        assert_eq!(by_email.user_type, Some(UserType::Doctor));
    }

    #[test]
    fn login_rejects_wrong_password_and_wrong_role() {
        let conn = open_memory_database().unwrap();
        register_doctor(&conn, &hasher(), &doctor_req("house@clinic.test")).unwrap();

        let wrong = login(&conn, &hasher(), UserType::Doctor, &LoginRequest {
            identifier: "house@clinic.test".into(),
            password: "nope".into(),
        })
        .unwrap();
        assert!(!wrong.authenticated);
        assert_eq!(wrong.message, "Invalid credentials");
        assert!(wrong.role_id.is_none());

        let as_patient = login(&conn, &hasher(), UserType::Patient, &LoginRequest {
            identifier: "house@clinic.test".into(),
            password: "s3cret!".into(),
        })
        .unwrap();
        assert!(!as_patient.authenticated);
        assert_eq!(count(&conn, "login_history"), 0);
    }

    #[test]
    fn staff_login_accepts_admin_accounts() {
        let conn = open_memory_database().unwrap();
        register_staff(&conn, &hasher(), &staff_req("boss@clinic.test", true)).unwrap();
        let resp = login(&conn, &hasher(), UserType::Staff, &LoginRequest {
            identifier: "boss@clinic.test".into(),
            password: "pw".into(),
        })
        .unwrap();
        assert!(resp.authenticated);
        assert_eq!(resp.user_type, Some(UserType::Admin));
    }

    #[test]
    fn inactive_accounts_cannot_log_in() {
        let conn = open_memory_database().unwrap();
        let reg = register_patient(&conn, &hasher(), &patient_req("ada@clinic.test")).unwrap();
        update_patient_profile(&conn, &reg.role_id, &PatientUpdate {
            account: AccountUpdate { is_active: Some(false), ..Default::default() },
            ..Default::default()
        })
        .unwrap();
        let resp = login(&conn, &hasher(), UserType::Patient, &LoginRequest {
            identifier: reg.role_id,
            password: "pw".into(),
        })
        .unwrap();
        assert!(!resp.authenticated);
    }

    #[test]
    fn profile_update_touches_both_rows() {
        let conn = open_memory_database().unwrap();
        let reg = register_patient(&conn, &hasher(), &patient_req("ada@clinic.test")).unwrap();
        let profile = update_patient_profile(&conn, &reg.role_id, &PatientUpdate {
            account: AccountUpdate {
                email: Some("ada.l@clinic.test".into()),
                contact: ContactDetails { phone_number: Some("555-0101".into()), ..Default::default() },
                is_active: None,
            },
            weight: Some(61.5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(profile.account.email, "ada.l@clinic.test");
        assert_eq!(profile.account.phone_number.as_deref(), Some("555-0101"));
        assert_eq!(profile.patient.weight, Some(61.5));
        assert_eq!(profile.patient.allergies.as_deref(), Some("Penicillin"));
    }

    #[test]
    fn profile_update_to_taken_email_rolls_back() {
        let conn = open_memory_database().unwrap();
        register_doctor(&conn, &hasher(), &doctor_req("taken@clinic.test")).unwrap();
        let reg = register_patient(&conn, &hasher(), &patient_req("ada@clinic.test")).unwrap();
        let err = update_patient_profile(&conn, &reg.role_id, &PatientUpdate {
            account: AccountUpdate { email: Some("taken@clinic.test".into()), ..Default::default() },
            first_name: Some("Augusta".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail(_)));
        assert_eq!(patient_profile(&conn, &reg.role_id).unwrap().patient.first_name, "Ada");
    }

    #[test]
    fn search_patients_matches_name_and_email() {
        let conn = open_memory_database().unwrap();
        register_patient(&conn, &hasher(), &patient_req("ada@clinic.test")).unwrap();
        let mut other = patient_req("grace@clinic.test");
        other.first_name = "Grace".into();
        other.last_name = "Hopper".into();
        register_patient(&conn, &hasher(), &other).unwrap();

        assert_eq!(search_patients(&conn, "hop").unwrap().len(), 1);
        assert_eq!(search_patients(&conn, "ADA@").unwrap().len(), 1);
        assert_eq!(search_patients(&conn, "  ").unwrap().len(), 2);
    }
}
