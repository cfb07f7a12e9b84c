//! Defines the migration API routes.
//!
//! ## Structure
//! - `GET  /healthz`: liveness probe
//! - `GET  /list-source`: files in the source Drive folder
//! - `GET  /list-dest`: blobs in the destination container
//! - `POST /migrate`: copy every source file into the container
//!
//! Anything else falls through to static assets under the public directory.

use crate::{
    handlers::{
        health_handlers::healthz,
        migration_handlers::{list_dest, list_source, migrate},
    },
    services::migration_service::MigrationService,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Build the router carrying `MigrationService` as shared state.
pub fn routes(public_dir: impl AsRef<Path>) -> Router<MigrationService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/list-source", get(list_source))
        .route("/list-dest", get(list_dest))
        .route("/migrate", post(migrate))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
}
