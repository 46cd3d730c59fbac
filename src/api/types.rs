//! Shared types for the HTTP layer: router state, extractors that answer in
//! the API error format, and the query shapes reused across resources.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::db::DatabaseError;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Request id assigned by the access middleware.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

// ═══════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════

/// JSON body whose rejections (bad enum, malformed date, wrong type) become
/// `400 BAD_REQUEST` in the API error format.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// Path parameters with API-format rejections.
pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| ApiPath(value))
            .map_err(|rejection: PathRejection| ApiError::BadRequest(rejection.body_text()))
    }
}

/// Query string with API-format rejections.
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection: QueryRejection| ApiError::BadRequest(rejection.body_text()))
    }
}

// ═══════════════════════════════════════════════════════════
// Shared query shapes
// ═══════════════════════════════════════════════════════════

/// `?startDate=YYYY-MM-DD&endDate=YYYY-MM-DD`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// `?startDate=...T..&endDate=...T..`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeRangeQuery {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
}

/// `?start=...T..&end=...T..` (activity records).
#[derive(Debug, Deserialize)]
pub struct StartEndQuery {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// `{"status": "..."}` bodies of status patches.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

// ═══════════════════════════════════════════════════════════
// Lenient lists
// ═══════════════════════════════════════════════════════════

/// Answer a list endpoint. Store failures degrade to an empty list so
/// dashboards stay up; domain errors (unknown filter target, bad input)
/// still reach the caller.
pub fn list_or_empty<T>(what: &'static str, result: Result<Vec<T>, DatabaseError>) -> Result<Json<Vec<T>>, ApiError> {
    match result {
        Ok(items) => Ok(Json(items)),
        Err(err @ DatabaseError::Sqlite(_)) => {
            tracing::warn!(what, error = %err, "List query failed, answering with an empty list");
            Ok(Json(Vec::new()))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_degrade_to_empty() {
        let failed: Result<Vec<i32>, DatabaseError> = Err(DatabaseError::Sqlite(rusqlite::Error::InvalidQuery));
        let Json(items) = list_or_empty("numbers", failed).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn domain_errors_still_surface() {
        let missing: Result<Vec<i32>, DatabaseError> = Err(DatabaseError::not_found("Patient", "P00000"));
        assert!(matches!(list_or_empty("numbers", missing), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn date_range_uses_camel_case_keys() {
        let q: DateRangeQuery = serde_json::from_str(r#"{"startDate":"2025-01-01","endDate":"2025-01-31"}"#).unwrap();
        assert!(q.start_date < q.end_date);
    }
}
