use rusqlite::{params, Connection, OptionalExtension, Row};

use super::user::{account_from_row, ACCOUNT_COLUMNS};
use super::{collect_lenient, format_timestamp, now_timestamp};
use crate::db::{map_delete_error, map_write_error, DatabaseError};
use crate::models::*;

const ADMIN_COLUMNS: &str = "a.admin_id, a.user_id, a.first_name, a.last_name, a.position,
     a.hire_date, a.department_id, a.created_at, a.updated_at";

pub fn insert_admin(conn: &Connection, admin: &Admin) -> Result<(), DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO admins (admin_id, user_id, first_name, last_name, position, hire_date,
         department_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            admin.admin_id,
            admin.user_id,
            admin.first_name,
            admin.last_name,
            admin.position,
            admin.hire_date.map(|d| d.to_string()),
            admin.department_id,
            now,
        ],
    )?;
    Ok(())
}

pub fn admin_exists(conn: &Connection, admin_id: &str) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM admins WHERE admin_id = ?1)",
        params![admin_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_admin(conn: &Connection, admin_id: &str) -> Result<Option<Admin>, DatabaseError> {
    let admin = conn
        .query_row(
            &format!("SELECT {ADMIN_COLUMNS} FROM admins a WHERE a.admin_id = ?1"),
            params![admin_id],
            admin_from_row,
        )
        .optional()?;
    Ok(admin)
}

pub fn get_admin_by_user(conn: &Connection, user_id: i64) -> Result<Option<Admin>, DatabaseError> {
    let admin = conn
        .query_row(
            &format!("SELECT {ADMIN_COLUMNS} FROM admins a WHERE a.user_id = ?1"),
            params![user_id],
            admin_from_row,
        )
        .optional()?;
    Ok(admin)
}

fn profile_select() -> String {
    format!(
        "SELECT {ADMIN_COLUMNS}, {ACCOUNT_COLUMNS}, dep.name AS department_name
         FROM admins a
         JOIN users u ON u.user_id = a.user_id
         LEFT JOIN departments dep ON dep.department_id = a.department_id"
    )
}

pub fn get_admin_profile(conn: &Connection, admin_id: &str) -> Result<Option<AdminProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            &format!("{} WHERE a.admin_id = ?1", profile_select()),
            params![admin_id],
            admin_profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

pub fn list_admin_profiles(conn: &Connection) -> Result<Vec<AdminProfile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY a.last_name, a.first_name", profile_select()))?;
    let rows = stmt.query_map([], admin_profile_from_row)?;
    Ok(collect_lenient(rows, "admin"))
}

pub fn update_admin(conn: &Connection, admin: &Admin) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE admins SET first_name = ?2, last_name = ?3, position = ?4, hire_date = ?5,
             department_id = ?6, updated_at = ?7
             WHERE admin_id = ?1",
            params![
                admin.admin_id,
                admin.first_name,
                admin.last_name,
                admin.position,
                admin.hire_date.map(|d| d.to_string()),
                admin.department_id,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Admin"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Admin", &admin.admin_id));
    }
    Ok(())
}

pub fn delete_admin_row(conn: &Connection, admin_id: &str) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM admins WHERE admin_id = ?1", params![admin_id])
        .map_err(|e| map_delete_error(e, "Admin"))?;
    Ok(deleted)
}

fn admin_from_row(row: &Row<'_>) -> rusqlite::Result<Admin> {
    Ok(Admin {
        admin_id: row.get("admin_id")?,
        user_id: row.get("user_id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        position: row.get("position")?,
        hire_date: row.get("hire_date")?,
        department_id: row.get("department_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn admin_profile_from_row(row: &Row<'_>) -> rusqlite::Result<AdminProfile> {
    Ok(AdminProfile {
        admin: admin_from_row(row)?,
        account: account_from_row(row)?,
        department_name: row.get("department_name")?,
    })
}
