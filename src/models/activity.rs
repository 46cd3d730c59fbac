use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::{NotificationPriority, RecipientType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: i64,
    pub recipient_type: RecipientType,
    pub recipient_id: Option<String>,
    pub sender_username: Option<String>,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: i64,
    pub username: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<String>,
    pub timestamp: NaiveDateTime,
    pub ip_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginHistory {
    pub id: i64,
    pub username: String,
    pub login_time: NaiveDateTime,
    pub ip_address: String,
    pub user_agent: String,
    pub login_success: bool,
    pub failure_reason: Option<String>,
}
