//! HTTP API.
//!
//! Exposes the domain modules as JSON endpoints. The router is
//! composable: `api_router()` returns a `Router` that can be mounted on any
//! axum server instance, and `server` runs it standalone.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
