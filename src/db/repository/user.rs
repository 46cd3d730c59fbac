use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, now_timestamp};
use crate::db::{constraint_kind, map_delete_error, ConstraintKind, DatabaseError};
use crate::models::enums::UserType;
use crate::models::*;

const USER_COLUMNS: &str = "user_id, email, password_hash, phone_number, address, date_of_birth,
     gender, user_type, is_active, created_at, updated_at";

/// Insert a login account. A taken email maps to `DuplicateEmail`.
pub fn insert_user(
    conn: &Connection,
    email: &str,
    password_hash: &str,
    contact: &ContactDetails,
    user_type: UserType,
) -> Result<i64, DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO users (email, password_hash, phone_number, address, date_of_birth, gender,
         user_type, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
        params![
            email,
            password_hash,
            contact.phone_number,
            contact.address,
            contact.date_of_birth.map(|d| d.to_string()),
            contact.gender,
            user_type,
            now,
        ],
    )
    .map_err(|e| match constraint_kind(&e) {
        Some(ConstraintKind::Unique) => DatabaseError::DuplicateEmail(email.to_string()),
        _ => DatabaseError::Sqlite(e),
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            params![user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        params![email],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

/// Replace the contact fields of an account; `None` keeps the stored value.
pub fn update_user_contact(
    conn: &Connection,
    user_id: i64,
    email: Option<&str>,
    contact: &ContactDetails,
    is_active: Option<bool>,
) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE users SET
                email = COALESCE(?2, email),
                phone_number = COALESCE(?3, phone_number),
                address = COALESCE(?4, address),
                date_of_birth = COALESCE(?5, date_of_birth),
                gender = COALESCE(?6, gender),
                is_active = COALESCE(?7, is_active),
                updated_at = ?8
             WHERE user_id = ?1",
            params![
                user_id,
                email,
                contact.phone_number,
                contact.address,
                contact.date_of_birth.map(|d| d.to_string()),
                contact.gender,
                is_active,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(ConstraintKind::Unique) => {
                DatabaseError::DuplicateEmail(email.unwrap_or_default().to_string())
            }
            _ => DatabaseError::Sqlite(e),
        })?;
    if updated == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }
    Ok(())
}

pub fn set_user_password(conn: &Connection, user_id: i64, password_hash: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE user_id = ?1",
        params![user_id, password_hash, format_timestamp(&now_timestamp())],
    )?;
    Ok(())
}

pub fn delete_user(conn: &Connection, user_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM users WHERE user_id = ?1", params![user_id])
        .map_err(|e| map_delete_error(e, "User"))?;
    Ok(deleted)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get("user_id")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        phone_number: row.get("phone_number")?,
        address: row.get("address")?,
        date_of_birth: row.get("date_of_birth")?,
        gender: row.get("gender")?,
        user_type: row.get("user_type")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Account columns shared by every profile projection (aliased `u`).
pub(crate) const ACCOUNT_COLUMNS: &str = "u.email, u.phone_number, u.address, u.date_of_birth,
     u.gender, u.user_type, u.is_active";

pub(crate) fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountSummary> {
    Ok(AccountSummary {
        email: row.get("email")?,
        phone_number: row.get("phone_number")?,
        address: row.get("address")?,
        date_of_birth: row.get("date_of_birth")?,
        gender: row.get("gender")?,
        user_type: row.get("user_type")?,
        is_active: row.get("is_active")?,
    })
}
