use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, now_timestamp, query_list, Conditions};
use crate::db::DatabaseError;
use crate::models::*;

const LOGIN_SELECT: &str = "SELECT id, username, login_time, ip_address, user_agent,
        login_success, failure_reason
     FROM login_history";

#[derive(Debug, Clone)]
pub enum LoginHistoryFilter<'a> {
    All,
    User(&'a str),
    Failed,
    DateRange(NaiveDateTime, NaiveDateTime),
}

impl LoginHistoryFilter<'_> {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::new();
        match self {
            Self::All => {}
            Self::User(u) => {
                c.push("username = ?", u.to_string());
            }
            Self::Failed => {
                c.push_raw("login_success = 0");
            }
            Self::DateRange(from, to) => {
                c.push("login_time >= ?", format_timestamp(from))
                    .push("login_time <= ?", format_timestamp(to));
            }
        }
        c
    }
}

pub fn insert_login_history(
    conn: &Connection,
    username: &str,
    ip_address: &str,
    user_agent: &str,
    login_success: bool,
    failure_reason: Option<&str>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO login_history (username, login_time, ip_address, user_agent, login_success, failure_reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            username,
            format_timestamp(&now_timestamp()),
            ip_address,
            user_agent,
            login_success,
            failure_reason,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_login_history(conn: &Connection, id: i64) -> Result<Option<LoginHistory>, DatabaseError> {
    let entry = conn
        .query_row(&format!("{LOGIN_SELECT} WHERE id = ?1"), params![id], login_from_row)
        .optional()?;
    Ok(entry)
}

pub fn list_login_history(
    conn: &Connection,
    filter: &LoginHistoryFilter<'_>,
) -> Result<Vec<LoginHistory>, DatabaseError> {
    query_list(
        conn,
        LOGIN_SELECT,
        &filter.conditions(),
        "login_time DESC, id DESC",
        login_from_row,
        "login_history",
    )
}

pub fn delete_login_history(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM login_history WHERE id = ?1", params![id])?;
    Ok(deleted)
}

fn login_from_row(row: &Row<'_>) -> rusqlite::Result<LoginHistory> {
    Ok(LoginHistory {
        id: row.get("id")?,
        username: row.get("username")?,
        login_time: row.get("login_time")?,
        ip_address: row.get("ip_address")?,
        user_agent: row.get("user_agent")?,
        login_success: row.get("login_success")?,
        failure_reason: row.get("failure_reason")?,
    })
}
