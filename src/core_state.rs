//! Transport-agnostic application state.
//!
//! `CoreState` is built once at startup and shared (behind `Arc`) by every
//! request handler. SQLite connections are opened per request against the
//! configured database file; the schema is migrated once in [`CoreState::open`].

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::crypto::PasswordHasher;
use crate::db;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Hasher configured with the startup iteration count.
    pub passwords: PasswordHasher,
}

impl CoreState {
    /// Migrate the database at `config.db_path` and build the shared state.
    pub fn open(config: &Config) -> Result<Self, CoreError> {
        Self::with_db_path(&config.db_path, config.password_iterations)
    }

    pub fn with_db_path(db_path: &Path, password_iterations: u32) -> Result<Self, CoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // Migrations run on this first connection; it is dropped right after.
        db::open_database(db_path)?;
        tracing::info!(path = %db_path.display(), "Database ready");
        Ok(Self {
            db_path: db_path.to_path_buf(),
            passwords: PasswordHasher::new(password_iterations),
        })
    }

    /// Open a connection for one unit of work.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::connect(&self.db_path).map_err(CoreError::Database)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
