//! Patient profiles and search.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery};
use crate::cascade;
use crate::identity::{self, PatientUpdate};
use crate::models::PatientProfile;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// `GET /patients`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<PatientProfile>>, ApiError> {
    let conn = ctx.core.open_db()?;
    list_or_empty("patients", identity::patients(&conn))
}

/// `GET /patients/search?query=` (name, ID or email substring).
pub async fn search(
    State(ctx): State<ApiContext>,
    ApiQuery(q): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<PatientProfile>>, ApiError> {
    let conn = ctx.core.open_db()?;
    list_or_empty("patients", identity::search_patients(&conn, &q.query))
}

/// `GET /patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(patient_id): ApiPath<String>,
) -> Result<Json<PatientProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::patient_profile(&conn, &patient_id)?))
}

/// `PUT /patients/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(patient_id): ApiPath<String>,
    ApiJson(req): ApiJson<PatientUpdate>,
) -> Result<Json<PatientProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::update_patient_profile(&conn, &patient_id, &req)?))
}

/// `DELETE /patients/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(patient_id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    cascade::delete_patient(&conn, &patient_id)?;
    Ok(StatusCode::NO_CONTENT)
}
