pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

/// SQLite extended result codes the domain layer distinguishes.
const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Prescription {0} is not refillable")]
    NotRefillable(i64),

    #[error("Prescription {0} has no refills remaining")]
    NoRefillsRemaining(i64),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No free {prefix} role ID after {attempts} attempts")]
    IdSpaceExhausted { prefix: char, attempts: usize },
}

impl DatabaseError {
    pub fn not_found(entity_type: &str, id: impl ToString) -> Self {
        DatabaseError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }
}

/// Kind of constraint a failed statement tripped, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
}

/// Classify a SQLite failure by its extended result code.
pub fn constraint_kind(err: &rusqlite::Error) -> Option<ConstraintKind> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => match e.extended_code {
            SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY => Some(ConstraintKind::Unique),
            SQLITE_CONSTRAINT_FOREIGNKEY => Some(ConstraintKind::ForeignKey),
            _ => None,
        },
        _ => None,
    }
}

/// Turn a foreign-key failure on delete into `Conflict`; pass anything else through.
pub fn map_delete_error(err: rusqlite::Error, what: &str) -> DatabaseError {
    match constraint_kind(&err) {
        Some(ConstraintKind::ForeignKey) => {
            DatabaseError::Conflict(format!("{what} is still referenced by other records"))
        }
        _ => DatabaseError::Sqlite(err),
    }
}

/// Turn a foreign-key failure on write into `Validation`; unique failures into `ConstraintViolation`.
pub fn map_write_error(err: rusqlite::Error, what: &str) -> DatabaseError {
    match constraint_kind(&err) {
        Some(ConstraintKind::ForeignKey) => {
            DatabaseError::Validation(format!("{what} references a record that does not exist"))
        }
        Some(ConstraintKind::Unique) => {
            DatabaseError::ConstraintViolation(format!("{what} duplicates an existing record"))
        }
        None => DatabaseError::Sqlite(err),
    }
}
