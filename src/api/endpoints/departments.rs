//! Departments.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath};
use crate::cascade;
use crate::inventory::{self, DepartmentRequest};
use crate::models::Department;

/// `GET /departments`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Department>>, ApiError> {
    let conn = ctx.core.open_db()?;
    list_or_empty("departments", inventory::departments(&conn))
}

/// `POST /departments`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<DepartmentRequest>,
) -> Result<(StatusCode, Json<Department>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(inventory::create_department(&conn, &req)?)))
}

/// `GET /departments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(department_id): ApiPath<i64>,
) -> Result<Json<Department>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(inventory::department(&conn, department_id)?))
}

/// `PUT /departments/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(department_id): ApiPath<i64>,
    ApiJson(req): ApiJson<DepartmentRequest>,
) -> Result<Json<Department>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(inventory::update_department_details(&conn, department_id, &req)?))
}

/// `DELETE /departments/:id`: 409 while staff, admins or appointments still point at it.
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(department_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    cascade::delete_department(&conn, department_id)?;
    Ok(StatusCode::NO_CONTENT)
}
