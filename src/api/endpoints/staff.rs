//! Staff and admin profiles.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath};
use crate::cascade;
use crate::identity::{self, RegistrationResponse, StaffRegistration, StaffUpdate};
use crate::models::{AdminProfile, StaffProfile};

/// `GET /staff` and `GET /staff/profiles`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<StaffProfile>>, ApiError> {
    let conn = ctx.core.open_db()?;
    list_or_empty("staff", identity::staff_members(&conn))
}

/// `POST /staff/create`: same flow as staff self-registration.
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<StaffRegistration>,
) -> Result<(StatusCode, Json<RegistrationResponse>), ApiError> {
    let conn = ctx.core.open_db()?;
    let response = identity::register_staff(&conn, &ctx.core.passwords, &req)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /staff/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(staff_id): ApiPath<String>,
) -> Result<Json<StaffProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::staff_profile(&conn, &staff_id)?))
}

/// `PUT /staff/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(staff_id): ApiPath<String>,
    ApiJson(req): ApiJson<StaffUpdate>,
) -> Result<Json<StaffProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::update_staff_profile(&conn, &staff_id, &req)?))
}

/// `DELETE /staff/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(staff_id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    cascade::delete_staff(&conn, &staff_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /admins`
pub async fn list_admins(State(ctx): State<ApiContext>) -> Result<Json<Vec<AdminProfile>>, ApiError> {
    let conn = ctx.core.open_db()?;
    list_or_empty("admins", identity::admins(&conn))
}

/// `GET /admins/:id`
pub async fn admin_detail(
    State(ctx): State<ApiContext>,
    ApiPath(admin_id): ApiPath<String>,
) -> Result<Json<AdminProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::admin_profile(&conn, &admin_id)?))
}

/// `PUT /admins/:id`
pub async fn update_admin(
    State(ctx): State<ApiContext>,
    ApiPath(admin_id): ApiPath<String>,
    ApiJson(req): ApiJson<StaffUpdate>,
) -> Result<Json<AdminProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::update_admin_profile(&conn, &admin_id, &req)?))
}

/// `DELETE /admins/:id`
pub async fn delete_admin(
    State(ctx): State<ApiContext>,
    ApiPath(admin_id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    cascade::delete_admin(&conn, &admin_id)?;
    Ok(StatusCode::NO_CONTENT)
}
