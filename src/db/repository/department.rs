use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{collect_lenient, format_timestamp, now_timestamp};
use crate::db::{map_delete_error, map_write_error, DatabaseError};
use crate::models::*;

const DEPARTMENT_SELECT: &str = "SELECT dep.department_id, dep.name, dep.description,
        dep.head_doctor_id, 'Dr. ' || hd.first_name || ' ' || hd.last_name AS head_doctor_name,
        dep.created_at, dep.updated_at
     FROM departments dep
     LEFT JOIN doctors hd ON hd.doctor_id = dep.head_doctor_id";

pub fn insert_department(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    head_doctor_id: Option<&str>,
) -> Result<i64, DatabaseError> {
    let now = format_timestamp(&now_timestamp());
    conn.execute(
        "INSERT INTO departments (name, description, head_doctor_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![name, description, head_doctor_id, now],
    )
    .map_err(|e| map_write_error(e, "Department"))?;
    Ok(conn.last_insert_rowid())
}

pub fn department_exists(conn: &Connection, department_id: i64) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM departments WHERE department_id = ?1)",
        params![department_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub fn get_department(conn: &Connection, department_id: i64) -> Result<Option<Department>, DatabaseError> {
    let dept = conn
        .query_row(
            &format!("{DEPARTMENT_SELECT} WHERE dep.department_id = ?1"),
            params![department_id],
            department_from_row,
        )
        .optional()?;
    Ok(dept)
}

pub fn list_departments(conn: &Connection) -> Result<Vec<Department>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{DEPARTMENT_SELECT} ORDER BY dep.name"))?;
    let rows = stmt.query_map([], department_from_row)?;
    Ok(collect_lenient(rows, "department"))
}

pub fn update_department(
    conn: &Connection,
    department_id: i64,
    name: &str,
    description: Option<&str>,
    head_doctor_id: Option<&str>,
) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE departments SET name = ?2, description = ?3, head_doctor_id = ?4, updated_at = ?5
             WHERE department_id = ?1",
            params![
                department_id,
                name,
                description,
                head_doctor_id,
                format_timestamp(&now_timestamp()),
            ],
        )
        .map_err(|e| map_write_error(e, "Department"))?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Department", department_id));
    }
    Ok(())
}

/// Clear headship of every department led by this doctor.
pub fn clear_department_head(conn: &Connection, doctor_id: &str) -> Result<usize, DatabaseError> {
    let cleared = conn.execute(
        "UPDATE departments SET head_doctor_id = NULL, updated_at = ?2 WHERE head_doctor_id = ?1",
        params![doctor_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(cleared)
}

/// Detach every doctor assigned to the department.
pub fn detach_doctors_from_department(conn: &Connection, department_id: i64) -> Result<usize, DatabaseError> {
    let detached = conn.execute(
        "UPDATE doctors SET department_id = NULL, updated_at = ?2 WHERE department_id = ?1",
        params![department_id, format_timestamp(&now_timestamp())],
    )?;
    Ok(detached)
}

pub fn delete_department_row(conn: &Connection, department_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn
        .execute(
            "DELETE FROM departments WHERE department_id = ?1",
            params![department_id],
        )
        .map_err(|e| map_delete_error(e, "Department"))?;
    Ok(deleted)
}

fn department_from_row(row: &Row<'_>) -> rusqlite::Result<Department> {
    Ok(Department {
        department_id: row.get("department_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        head_doctor_id: row.get("head_doctor_id")?,
        head_doctor_name: row.get("head_doctor_name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
