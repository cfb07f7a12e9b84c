//! HTTP handlers for listing both sides and triggering a migration.
//! Each one delegates to `MigrationService` and serializes the result as-is.

use crate::{
    errors::AppError,
    models::{blob::BlobDescriptor, file::FileDescriptor, migration::MigrationResult},
    services::migration_service::MigrationService,
};
use axum::{Json, extract::State};

/// `GET /list-source`: files currently in the source folder.
pub async fn list_source(
    State(service): State<MigrationService>,
) -> Result<Json<Vec<FileDescriptor>>, AppError> {
    Ok(Json(service.list_source().await?))
}

/// `GET /list-dest`: blobs currently in the destination container.
pub async fn list_dest(
    State(service): State<MigrationService>,
) -> Result<Json<Vec<BlobDescriptor>>, AppError> {
    Ok(Json(service.list_destination().await?))
}

/// `POST /migrate`: copy every source file and report per-file outcomes.
///
/// The request body is ignored. Per-file failures still produce 200; only a
/// failed source listing turns into an error response.
pub async fn migrate(
    State(service): State<MigrationService>,
) -> Result<Json<Vec<MigrationResult>>, AppError> {
    Ok(Json(service.migrate().await?))
}
