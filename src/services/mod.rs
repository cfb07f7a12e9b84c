//! Remote clients and the migration orchestrator.
//!
//! The orchestrator only sees the two traits below, so the Drive and Blob
//! clients can be swapped for in-memory fakes in tests.

pub mod blob_client;
pub mod drive_client;
pub mod migration_service;

use crate::{
    errors::ClientResult,
    models::{blob::BlobDescriptor, file::FileDescriptor},
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;

/// File content as it arrives from the source, chunk by chunk.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Outcome of the idempotent container bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    AlreadyExisted,
}

/// Folder-scoped file storage that files are copied from.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// List every non-trashed file directly inside `folder_id`.
    async fn list_files(&self, folder_id: &str) -> ClientResult<Vec<FileDescriptor>>;

    /// Open the content of a single file as a byte stream.
    async fn download(&self, file_id: &str) -> ClientResult<ByteStream>;
}

/// Object storage container that files are copied into.
#[async_trait]
pub trait ObjectDestination: Send + Sync {
    async fn ensure_container(&self, container: &str) -> ClientResult<ContainerStatus>;

    async fn list_blobs(&self, container: &str) -> ClientResult<Vec<BlobDescriptor>>;

    /// Store `stream` as `name`, replacing any existing object. Resolves only
    /// after the stream has been fully consumed.
    async fn upload(&self, container: &str, name: &str, stream: ByteStream) -> ClientResult<()>;
}
