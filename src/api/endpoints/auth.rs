//! Registration and login, one pair of routes per role.
//!
//! - `POST /auth/{doctor,patient,staff,admin}/register` → 201
//! - `POST /auth/{doctor,patient,staff,admin}/login` → 200, or 401 with
//!   the same body shape when the credentials are rejected

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson};
use crate::identity::{
    self, AdminRegistration, DoctorRegistration, LoginRequest, LoginResponse, PatientRegistration,
    RegistrationResponse, StaffRegistration,
};
use crate::models::enums::UserType;

type Registered = Result<(StatusCode, Json<RegistrationResponse>), ApiError>;

pub async fn register_doctor(State(ctx): State<ApiContext>, ApiJson(req): ApiJson<DoctorRegistration>) -> Registered {
    let conn = ctx.core.open_db()?;
    let response = identity::register_doctor(&conn, &ctx.core.passwords, &req)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn register_patient(State(ctx): State<ApiContext>, ApiJson(req): ApiJson<PatientRegistration>) -> Registered {
    let conn = ctx.core.open_db()?;
    let response = identity::register_patient(&conn, &ctx.core.passwords, &req)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn register_staff(State(ctx): State<ApiContext>, ApiJson(req): ApiJson<StaffRegistration>) -> Registered {
    let conn = ctx.core.open_db()?;
    let response = identity::register_staff(&conn, &ctx.core.passwords, &req)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn register_admin(State(ctx): State<ApiContext>, ApiJson(req): ApiJson<AdminRegistration>) -> Registered {
    let conn = ctx.core.open_db()?;
    let response = identity::register_admin(&conn, &ctx.core.passwords, &req)?;
    Ok((StatusCode::CREATED, Json(response)))
}

fn login_as(ctx: &ApiContext, role: UserType, req: &LoginRequest) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let conn = ctx.core.open_db()?;
    let response = identity::login(&conn, &ctx.core.passwords, role, req)?;
    let status = if response.authenticated {
        StatusCode::OK
    } else {
        tracing::info!(%role, reason = %response.message, "Login rejected");
        StatusCode::UNAUTHORIZED
    };
    Ok((status, Json(response)))
}

pub async fn login_doctor(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    login_as(&ctx, UserType::Doctor, &req)
}

pub async fn login_patient(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    login_as(&ctx, UserType::Patient, &req)
}

pub async fn login_staff(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    login_as(&ctx, UserType::Staff, &req)
}

pub async fn login_admin(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    login_as(&ctx, UserType::Admin, &req)
}
