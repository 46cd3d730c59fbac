//! Doctor profiles.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath};
use crate::cascade;
use crate::identity::{self, DoctorUpdate};
use crate::models::DoctorProfile;

/// `GET /doctors`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<DoctorProfile>>, ApiError> {
    let conn = ctx.core.open_db()?;
    list_or_empty("doctors", identity::doctors(&conn))
}

/// `GET /doctors/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(doctor_id): ApiPath<String>,
) -> Result<Json<DoctorProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::doctor_profile(&conn, &doctor_id)?))
}

/// `PUT /doctors/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(doctor_id): ApiPath<String>,
    ApiJson(req): ApiJson<DoctorUpdate>,
) -> Result<Json<DoctorProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::update_doctor_profile(&conn, &doctor_id, &req)?))
}

/// `DELETE /doctors/:id`: nulls every reference to the doctor first.
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(doctor_id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    cascade::delete_doctor(&conn, &doctor_id)?;
    Ok(StatusCode::NO_CONTENT)
}
