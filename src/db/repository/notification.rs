use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, now_timestamp, query_list, Conditions};
use crate::db::DatabaseError;
use crate::models::enums::{NotificationPriority, RecipientType};
use crate::models::*;

const NOTIFICATION_SELECT: &str = "SELECT n.notification_id, n.recipient_type, n.recipient_id,
        n.sender_username, n.title, n.message, n.priority, n.is_read, n.read_at, n.created_at
     FROM notifications n";

const NOTIFICATION_ORDER: &str = "n.created_at DESC, n.notification_id DESC";

pub fn insert_notification(
    conn: &Connection,
    recipient_type: RecipientType,
    recipient_id: Option<&str>,
    sender_username: Option<&str>,
    title: &str,
    message: &str,
    priority: NotificationPriority,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (recipient_type, recipient_id, sender_username, title, message,
         priority, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        params![
            recipient_type,
            recipient_id,
            sender_username,
            title,
            message,
            priority,
            format_timestamp(&now_timestamp()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_notification(conn: &Connection, notification_id: i64) -> Result<Option<Notification>, DatabaseError> {
    let notification = conn
        .query_row(
            &format!("{NOTIFICATION_SELECT} WHERE n.notification_id = ?1"),
            params![notification_id],
            notification_from_row,
        )
        .optional()?;
    Ok(notification)
}

pub fn list_notifications(conn: &Connection) -> Result<Vec<Notification>, DatabaseError> {
    query_list(
        conn,
        NOTIFICATION_SELECT,
        &Conditions::new(),
        NOTIFICATION_ORDER,
        notification_from_row,
        "notification",
    )
}

fn recipient_conditions(recipient_type: RecipientType, recipient_id: &str) -> Conditions {
    let mut c = Conditions::new();
    c.push("n.recipient_type = ?", recipient_type.as_str().to_string())
        .push("n.recipient_id = ?", recipient_id.to_string());
    c
}

pub fn notifications_for_recipient(
    conn: &Connection,
    recipient_type: RecipientType,
    recipient_id: &str,
) -> Result<Vec<Notification>, DatabaseError> {
    query_list(
        conn,
        NOTIFICATION_SELECT,
        &recipient_conditions(recipient_type, recipient_id),
        NOTIFICATION_ORDER,
        notification_from_row,
        "notification",
    )
}

pub fn unread_notifications(
    conn: &Connection,
    recipient_type: RecipientType,
    recipient_id: &str,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut c = recipient_conditions(recipient_type, recipient_id);
    c.push_raw("n.is_read = 0");
    query_list(
        conn,
        NOTIFICATION_SELECT,
        &c,
        NOTIFICATION_ORDER,
        notification_from_row,
        "notification",
    )
}

/// Mark read and stamp `read_at`. Returns false when the id is unknown.
pub fn mark_notification_read(conn: &Connection, notification_id: i64) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?2)
         WHERE notification_id = ?1",
        params![notification_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(updated > 0)
}

pub fn delete_notification(conn: &Connection, notification_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM notifications WHERE notification_id = ?1",
        params![notification_id],
    )?;
    Ok(deleted)
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        notification_id: row.get("notification_id")?,
        recipient_type: row.get("recipient_type")?,
        recipient_id: row.get("recipient_id")?,
        sender_username: row.get("sender_username")?,
        title: row.get("title")?,
        message: row.get("message")?,
        priority: row.get("priority")?,
        is_read: row.get("is_read")?,
        read_at: row.get("read_at")?,
        created_at: row.get("created_at")?,
    })
}
