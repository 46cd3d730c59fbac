use rusqlite::{params, Connection, OptionalExtension, Row};

use super::user::{account_from_row, ACCOUNT_COLUMNS};
use super::{collect_lenient, format_timestamp, now_timestamp};
use crate::db::{map_delete_error, map_write_error, DatabaseError};
use crate::models::enums::UserType;
use crate::models::*;

const STAFF_COLUMNS: &str = "s.staff_id, s.user_id, s.first_name, s.last_name, s.position,
     s.hire_date, s.department_id, s.created_at, s.updated_at";

pub fn insert_staff(conn: &Connection, staff: &Staff) -> Result<(), DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO staff (staff_id, user_id, first_name, last_name, position, hire_date,
         department_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            staff.staff_id,
            staff.user_id,
            staff.first_name,
            staff.last_name,
            staff.position,
            staff.hire_date.map(|d| d.to_string()),
            staff.department_id,
            now,
        ],
    )?;
    Ok(())
}

pub fn staff_exists(conn: &Connection, staff_id: &str) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM staff WHERE staff_id = ?1)",
        params![staff_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_staff(conn: &Connection, staff_id: &str) -> Result<Option<Staff>, DatabaseError> {
    let staff = conn
        .query_row(
            &format!("SELECT {STAFF_COLUMNS} FROM staff s WHERE s.staff_id = ?1"),
            params![staff_id],
            staff_from_row,
        )
        .optional()?;
    Ok(staff)
}

pub fn get_staff_by_user(conn: &Connection, user_id: i64) -> Result<Option<Staff>, DatabaseError> {
    let staff = conn
        .query_row(
            &format!("SELECT {STAFF_COLUMNS} FROM staff s WHERE s.user_id = ?1"),
            params![user_id],
            staff_from_row,
        )
        .optional()?;
    Ok(staff)
}

fn profile_select() -> String {
    format!(
        "SELECT {STAFF_COLUMNS}, {ACCOUNT_COLUMNS}, dep.name AS department_name
         FROM staff s
         JOIN users u ON u.user_id = s.user_id
         LEFT JOIN departments dep ON dep.department_id = s.department_id"
    )
}

pub fn get_staff_profile(conn: &Connection, staff_id: &str) -> Result<Option<StaffProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            &format!("{} WHERE s.staff_id = ?1", profile_select()),
            params![staff_id],
            staff_profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

pub fn list_staff_profiles(conn: &Connection) -> Result<Vec<StaffProfile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY s.last_name, s.first_name", profile_select()))?;
    let rows = stmt.query_map([], staff_profile_from_row)?;
    Ok(collect_lenient(rows, "staff"))
}

pub fn update_staff(conn: &Connection, staff: &Staff) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE staff SET first_name = ?2, last_name = ?3, position = ?4, hire_date = ?5,
             department_id = ?6, updated_at = ?7
             WHERE staff_id = ?1",
            params![
                staff.staff_id,
                staff.first_name,
                staff.last_name,
                staff.position,
                staff.hire_date.map(|d| d.to_string()),
                staff.department_id,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Staff"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Staff", &staff.staff_id));
    }
    Ok(())
}

pub fn delete_staff_row(conn: &Connection, staff_id: &str) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM staff WHERE staff_id = ?1", params![staff_id])
        .map_err(|e| map_delete_error(e, "Staff"))?;
    Ok(deleted)
}

fn staff_from_row(row: &Row<'_>) -> rusqlite::Result<Staff> {
    Ok(Staff {
        staff_id: row.get("staff_id")?,
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

fn staff_profile_from_row(row: &Row<'_>) -> rusqlite::Result<StaffProfile> {
    let account = account_from_row(row)?;
    Ok(StaffProfile {
        staff: staff_from_row(row)?,
        is_admin: account.user_type == UserType::Admin,
        account,
        department_name: row.get("department_name")?,
    })
}
