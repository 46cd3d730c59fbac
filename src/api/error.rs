//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::db::DatabaseError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),
    /// The entity's current state forbids the operation.
    #[error("{message}")]
    InvalidState { code: &'static str, message: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::DuplicateEmail(email) => (
                StatusCode::BAD_REQUEST,
                "DUPLICATE_EMAIL",
                format!("Email already registered: {email}"),
            ),
            ApiError::InvalidState { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} not found with id {id}"))
            }
            DatabaseError::DuplicateEmail(email) => ApiError::DuplicateEmail(email),
            DatabaseError::InvalidEnum { .. }
            | DatabaseError::Validation(_)
            | DatabaseError::ConstraintViolation(_) => ApiError::BadRequest(err.to_string()),
            DatabaseError::InvalidState(message) => ApiError::InvalidState {
                code: "INVALID_STATE",
                message,
            },
            DatabaseError::NotRefillable(_) => ApiError::InvalidState {
                code: "NOT_REFILLABLE",
                message: err.to_string(),
            },
            DatabaseError::NoRefillsRemaining(_) => ApiError::InvalidState {
                code: "NO_REFILLS_REMAINING",
                message: err.to_string(),
            },
            DatabaseError::Conflict(detail) => ApiError::Conflict(detail),
            DatabaseError::Sqlite(_)
            | DatabaseError::MigrationFailed { .. }
            | DatabaseError::IdSpaceExhausted { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => e.into(),
            CoreError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_found_maps_entity_and_id() {
        let api_err: ApiError = DatabaseError::not_found("Doctor", "D00001").into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Doctor not found with id D00001");
    }

    #[tokio::test]
    async fn duplicate_email_returns_400_with_code() {
        let api_err: ApiError = DatabaseError::DuplicateEmail("a@b.test".into()).into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "DUPLICATE_EMAIL");
    }

    #[tokio::test]
    async fn refill_failures_are_distinguishable() {
        let response = ApiError::from(DatabaseError::NoRefillsRemaining(7)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "NO_REFILLS_REMAINING");

        let response = ApiError::from(DatabaseError::NotRefillable(7)).into_response();
        assert_eq!(body_json(response).await["error"]["code"], "NOT_REFILLABLE");
    }

    #[tokio::test]
    async fn conflict_returns_409() {
        let response = ApiError::from(DatabaseError::Conflict("still referenced".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn bad_enum_returns_400() {
        let err = DatabaseError::InvalidEnum {
            field: "PaymentStatus".into(),
            value: "SOMETIMES".into(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn exhausted_role_ids_are_internal() {
        let err = DatabaseError::IdSpaceExhausted { prefix: 'P', attempts: 10 };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"]["code"], "INTERNAL");
    }

    #[tokio::test]
    async fn core_database_error_keeps_its_mapping() {
        let api_err: ApiError = CoreError::Database(DatabaseError::Validation("bad".into())).into();
        assert_eq!(api_err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
