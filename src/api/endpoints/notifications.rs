//! Notifications.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::activity::{self, NotificationRequest};
use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath};
use crate::models::enums::RecipientType;
use crate::models::Notification;

type NotificationList = Result<Json<Vec<Notification>>, ApiError>;

/// `POST /notifications`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<NotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(activity::create_notification(&conn, &req)?)))
}

/// `GET /notifications`
pub async fn list(State(ctx): State<ApiContext>) -> NotificationList {
    let conn = ctx.core.open_db()?;
    list_or_empty("notifications", activity::notifications(&conn))
}

/// `GET /notifications/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(notification_id): ApiPath<i64>,
) -> Result<Json<Notification>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(activity::notification(&conn, notification_id)?))
}

async fn for_recipient(ctx: ApiContext, recipient_type: String, recipient_id: String, unread_only: bool) -> NotificationList {
    let recipient_type: RecipientType = recipient_type.parse()?;
    let conn = ctx.core.open_db()?;
    list_or_empty(
        "notifications",
        activity::recipient_notifications(&conn, recipient_type, &recipient_id, unread_only),
    )
}

/// `GET /notifications/recipient/:type/:id`
pub async fn by_recipient(
    State(ctx): State<ApiContext>,
    ApiPath((recipient_type, recipient_id)): ApiPath<(String, String)>,
) -> NotificationList {
    for_recipient(ctx, recipient_type, recipient_id, false).await
}

/// `GET /notifications/unread/:type/:id`
pub async fn unread(
    State(ctx): State<ApiContext>,
    ApiPath((recipient_type, recipient_id)): ApiPath<(String, String)>,
) -> NotificationList {
    for_recipient(ctx, recipient_type, recipient_id, true).await
}

/// `PUT /notifications/:id/read`
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    ApiPath(notification_id): ApiPath<i64>,
) -> Result<Json<Notification>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(activity::mark_read(&conn, notification_id)?))
}

/// `DELETE /notifications/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(notification_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    activity::remove_notification(&conn, notification_id)?;
    Ok(StatusCode::NO_CONTENT)
}
