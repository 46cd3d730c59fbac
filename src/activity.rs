//! Notifications, audit trail and login history.
//!
//! These records stand alone: nothing clinical references them and they are
//! never touched by the cascades.

use rusqlite::Connection;
use serde::Deserialize;

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::models::enums::{NotificationPriority, RecipientType};
use crate::models::*;

const UNKNOWN: &str = "unknown";

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, DatabaseError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DatabaseError::Validation(format!("{field} is required")))
}

fn or_unknown(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(UNKNOWN)
}

// ─── Notifications ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub recipient_type: Option<RecipientType>,
    pub recipient_id: Option<String>,
    pub sender_username: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub priority: Option<NotificationPriority>,
}

/// Queue a notification. Broadcasts (`ALL`) carry no recipient id.
pub fn create_notification(conn: &Connection, req: &NotificationRequest) -> Result<Notification, DatabaseError> {
    let title = required(req.title.as_deref(), "title")?;
    let message = required(req.message.as_deref(), "message")?;
    let recipient_type = req.recipient_type.unwrap_or(RecipientType::All);
    let recipient_id = match recipient_type {
        RecipientType::All => None,
        _ => Some(required(req.recipient_id.as_deref(), "recipientId")?),
    };

    let id = insert_notification(
        conn,
        recipient_type,
        recipient_id,
        req.sender_username.as_deref(),
        title,
        message,
        req.priority.unwrap_or(NotificationPriority::Normal),
    )?;
    tracing::info!(notification_id = id, %recipient_type, "Notification created");
    notification(conn, id)
}

pub fn notification(conn: &Connection, notification_id: i64) -> Result<Notification, DatabaseError> {
    get_notification(conn, notification_id)?
        .ok_or_else(|| DatabaseError::not_found("Notification", notification_id))
}

pub fn notifications(conn: &Connection) -> Result<Vec<Notification>, DatabaseError> {
    list_notifications(conn)
}

pub fn recipient_notifications(
    conn: &Connection,
    recipient_type: RecipientType,
    recipient_id: &str,
    unread_only: bool,
) -> Result<Vec<Notification>, DatabaseError> {
    if unread_only {
        unread_notifications(conn, recipient_type, recipient_id)
    } else {
        notifications_for_recipient(conn, recipient_type, recipient_id)
    }
}

/// Mark read. A second call keeps the first `read_at`.
pub fn mark_read(conn: &Connection, notification_id: i64) -> Result<Notification, DatabaseError> {
    if !mark_notification_read(conn, notification_id)? {
        return Err(DatabaseError::not_found("Notification", notification_id));
    }
    notification(conn, notification_id)
}

pub fn remove_notification(conn: &Connection, notification_id: i64) -> Result<(), DatabaseError> {
    if delete_notification(conn, notification_id)? == 0 {
        return Err(DatabaseError::not_found("Notification", notification_id));
    }
    Ok(())
}

// ─── Audit logs ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogRequest {
    pub username: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
}

pub fn record_audit(conn: &Connection, req: &AuditLogRequest) -> Result<AuditLog, DatabaseError> {
    let id = insert_audit_log(
        conn,
        required(req.username.as_deref(), "username")?,
        required(req.action.as_deref(), "action")?,
        required(req.entity_type.as_deref(), "entityType")?,
        required(req.entity_id.as_deref(), "entityId")?,
        req.details.as_deref(),
        or_unknown(req.ip_address.as_deref()),
    )?;
    tracing::debug!(audit_id = id, "Audit entry recorded");
    audit_log(conn, id)
}

pub fn audit_log(conn: &Connection, id: i64) -> Result<AuditLog, DatabaseError> {
    get_audit_log(conn, id)?.ok_or_else(|| DatabaseError::not_found("AuditLog", id))
}

pub fn audit_logs(conn: &Connection, filter: &AuditFilter<'_>) -> Result<Vec<AuditLog>, DatabaseError> {
    list_audit_logs(conn, filter)
}

pub fn remove_audit_log(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    if delete_audit_log(conn, id)? == 0 {
        return Err(DatabaseError::not_found("AuditLog", id));
    }
    Ok(())
}

// ─── Login history ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginHistoryRequest {
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub login_success: bool,
    pub failure_reason: Option<String>,
}

pub fn record_login(conn: &Connection, req: &LoginHistoryRequest) -> Result<LoginHistory, DatabaseError> {
    let failure_reason = if req.login_success { None } else { req.failure_reason.as_deref() };
    let id = insert_login_history(
        conn,
        required(req.username.as_deref(), "username")?,
        or_unknown(req.ip_address.as_deref()),
        or_unknown(req.user_agent.as_deref()),
        req.login_success,
        failure_reason,
    )?;
    login_entry(conn, id)
}

pub fn login_entry(conn: &Connection, id: i64) -> Result<LoginHistory, DatabaseError> {
    get_login_history(conn, id)?.ok_or_else(|| DatabaseError::not_found("LoginHistory", id))
}

pub fn login_history(conn: &Connection, filter: &LoginHistoryFilter<'_>) -> Result<Vec<LoginHistory>, DatabaseError> {
    list_login_history(conn, filter)
}

pub fn remove_login_entry(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    if delete_login_history(conn, id)? == 0 {
        return Err(DatabaseError::not_found("LoginHistory", id));
    }
    Ok(())
}
