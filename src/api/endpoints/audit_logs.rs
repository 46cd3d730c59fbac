//! Audit trail.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::activity::{self, AuditLogRequest};
use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery, StartEndQuery};
use crate::db::AuditFilter;
use crate::models::AuditLog;

type AuditList = Result<Json<Vec<AuditLog>>, ApiError>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityQuery {
    pub entity_type: String,
    pub entity_id: String,
}

fn list_by(ctx: &ApiContext, filter: &AuditFilter<'_>) -> AuditList {
    let conn = ctx.core.open_db()?;
    list_or_empty("audit logs", activity::audit_logs(&conn, filter))
}

/// `POST /audit-logs`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<AuditLogRequest>,
) -> Result<(StatusCode, Json<AuditLog>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(activity::record_audit(&conn, &req)?)))
}

/// `GET /audit-logs`
pub async fn list(State(ctx): State<ApiContext>) -> AuditList {
    list_by(&ctx, &AuditFilter::All)
}

/// `GET /audit-logs/:id`
pub async fn detail(State(ctx): State<ApiContext>, ApiPath(id): ApiPath<i64>) -> Result<Json<AuditLog>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(activity::audit_log(&conn, id)?))
}

/// `GET /audit-logs/user/:username`
pub async fn by_user(State(ctx): State<ApiContext>, ApiPath(username): ApiPath<String>) -> AuditList {
    list_by(&ctx, &AuditFilter::User(&username))
}

/// `GET /audit-logs/action/:action`
pub async fn by_action(State(ctx): State<ApiContext>, ApiPath(action): ApiPath<String>) -> AuditList {
    list_by(&ctx, &AuditFilter::Action(&action))
}

/// `GET /audit-logs/entity?entityType=&entityId=`
pub async fn by_entity(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<EntityQuery>) -> AuditList {
    list_by(&ctx, &AuditFilter::Entity(&q.entity_type, &q.entity_id))
}

/// `GET /audit-logs/date-range?start=&end=`
pub async fn by_date_range(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<StartEndQuery>) -> AuditList {
    list_by(&ctx, &AuditFilter::DateRange(q.start, q.end))
}

/// `DELETE /audit-logs/:id`
pub async fn delete(State(ctx): State<ApiContext>, ApiPath(id): ApiPath<i64>) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    activity::remove_audit_log(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
