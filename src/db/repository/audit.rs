use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, now_timestamp, query_list, Conditions};
use crate::db::DatabaseError;
use crate::models::*;

const AUDIT_SELECT: &str = "SELECT id, username, action, entity_type, entity_id, details,
        timestamp, ip_address
     FROM audit_logs";

#[derive(Debug, Clone)]
pub enum AuditFilter<'a> {
    All,
    User(&'a str),
    Action(&'a str),
    /// Entity type and id.
    Entity(&'a str, &'a str),
    DateRange(NaiveDateTime, NaiveDateTime),
}

impl AuditFilter<'_> {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::new();
        match self {
            Self::All => {}
            Self::User(u) => {
                c.push("username = ?", u.to_string());
            }
            Self::Action(a) => {
                c.push("action = ?", a.to_string());
            }
            Self::Entity(kind, id) => {
                c.push("entity_type = ?", kind.to_string())
                    .push("entity_id = ?", id.to_string());
            }
            Self::DateRange(from, to) => {
                c.push("timestamp >= ?", format_timestamp(from))
                    .push("timestamp <= ?", format_timestamp(to));
            }
        }
        c
    }
}

pub fn insert_audit_log(
    conn: &Connection,
    username: &str,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    details: Option<&str>,
    ip_address: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_logs (username, action, entity_type, entity_id, details, timestamp, ip_address)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            username,
            action,
            entity_type,
            entity_id,
            details,
            format_timestamp(&now_timestamp()),
            ip_address,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_audit_log(conn: &Connection, id: i64) -> Result<Option<AuditLog>, DatabaseError> {
    let log = conn
        .query_row(&format!("{AUDIT_SELECT} WHERE id = ?1"), params![id], audit_from_row)
        .optional()?;
    Ok(log)
}

pub fn list_audit_logs(conn: &Connection, filter: &AuditFilter<'_>) -> Result<Vec<AuditLog>, DatabaseError> {
    query_list(
        conn,
        AUDIT_SELECT,
        &filter.conditions(),
        "timestamp DESC, id DESC",
        audit_from_row,
        "audit_log",
    )
}

pub fn delete_audit_log(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM audit_logs WHERE id = ?1", params![id])?;
    Ok(deleted)
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditLog> {
    Ok(AuditLog {
        id: row.get("id")?,
        username: row.get("username")?,
        action: row.get("action")?,
        entity_type: row.get("entity_type")?,
        entity_id: row.get("entity_id")?,
        details: row.get("details")?,
        timestamp: row.get("timestamp")?,
        ip_address: row.get("ip_address")?,
    })
}
