//! Login history.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::activity::{self, LoginHistoryRequest};
use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery, StartEndQuery};
use crate::db::LoginHistoryFilter;
use crate::models::LoginHistory;

type HistoryList = Result<Json<Vec<LoginHistory>>, ApiError>;

fn list_by(ctx: &ApiContext, filter: &LoginHistoryFilter<'_>) -> HistoryList {
    let conn = ctx.core.open_db()?;
    list_or_empty("login history", activity::login_history(&conn, filter))
}

/// `POST /login-history`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<LoginHistoryRequest>,
) -> Result<(StatusCode, Json<LoginHistory>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(activity::record_login(&conn, &req)?)))
}

/// `GET /login-history`
pub async fn list(State(ctx): State<ApiContext>) -> HistoryList {
    list_by(&ctx, &LoginHistoryFilter::All)
}

/// `GET /login-history/:id`
pub async fn detail(State(ctx): State<ApiContext>, ApiPath(id): ApiPath<i64>) -> Result<Json<LoginHistory>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(activity::login_entry(&conn, id)?))
}

/// `GET /login-history/user/:username`
pub async fn by_user(State(ctx): State<ApiContext>, ApiPath(username): ApiPath<String>) -> HistoryList {
    list_by(&ctx, &LoginHistoryFilter::User(&username))
}

/// `GET /login-history/failed`
pub async fn failed(State(ctx): State<ApiContext>) -> HistoryList {
    list_by(&ctx, &LoginHistoryFilter::Failed)
}

/// `GET /login-history/date-range?start=&end=`
pub async fn by_date_range(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<StartEndQuery>) -> HistoryList {
    list_by(&ctx, &LoginHistoryFilter::DateRange(q.start, q.end))
}

/// `DELETE /login-history/:id`
pub async fn delete(State(ctx): State<ApiContext>, ApiPath(id): ApiPath<i64>) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    activity::remove_login_entry(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
