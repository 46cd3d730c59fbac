pub mod api;
pub mod activity; // Notifications, audit trail, login history
pub mod billing; // Payments and revenue
pub mod cascade; // Person/appointment/department deletion
pub mod clinical; // Appointments and medical records
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod identity; // Registration, login, profiles
pub mod inventory; // Departments, medications, pharmacies
pub mod models;
pub mod prescriptions; // Prescriptions and refills

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::ServerError;
use crate::config::{Config, ConfigError};
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Load configuration, migrate the database and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let core = Arc::new(CoreState::open(&config)?);
    let server = api::start_api_server(core, config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for Ctrl-C, shutting down");
    }
    server.stop().await;
    Ok(())
}
