//! src/services/migration_service.rs
//!
//! MigrationService: copies every file of the source folder into the
//! destination container, one file at a time. Each file's download and upload
//! are isolated: a failure is recorded against that file and the run moves on.
//! Only the initial source listing can fail the run as a whole.
//!
//! Concurrent runs are not coordinated. Each one re-lists the source and
//! uploads independently, so the last upload of a given name wins.

use crate::{
    errors::ClientResult,
    models::{blob::BlobDescriptor, file::FileDescriptor, migration::MigrationResult},
    services::{ContainerStatus, FileSource, ObjectDestination},
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct MigrationService {
    source: Arc<dyn FileSource>,
    destination: Arc<dyn ObjectDestination>,
    folder_id: String,
    container: String,
}

impl MigrationService {
    pub fn new(
        source: Arc<dyn FileSource>,
        destination: Arc<dyn ObjectDestination>,
        folder_id: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            folder_id: folder_id.into(),
            container: container.into(),
        }
    }

    /// Make sure the destination container exists before traffic is served.
    ///
    /// Failures are logged and swallowed; uploads will surface them per file.
    pub async fn bootstrap(&self) -> Option<ContainerStatus> {
        match self.destination.ensure_container(&self.container).await {
            Ok(status) => {
                match status {
                    ContainerStatus::Created => {
                        info!("Created destination container {}", self.container)
                    }
                    ContainerStatus::AlreadyExisted => {
                        info!("Destination container {} already exists", self.container)
                    }
                }
                Some(status)
            }
            Err(err) => {
                error!(
                    "Failed to create destination container {}: {}",
                    self.container, err
                );
                None
            }
        }
    }

    pub async fn list_source(&self) -> ClientResult<Vec<FileDescriptor>> {
        self.source.list_files(&self.folder_id).await
    }

    pub async fn list_destination(&self) -> ClientResult<Vec<BlobDescriptor>> {
        self.destination.list_blobs(&self.container).await
    }

    /// Transfer every file currently in the source folder.
    ///
    /// Returns one result per listed file, in listing order. Files are
    /// processed strictly one after another.
    pub async fn migrate(&self) -> ClientResult<Vec<MigrationResult>> {
        let files = self.list_source().await?;
        info!(
            "Migrating {} files from folder {} to container {}",
            files.len(),
            self.folder_id,
            self.container
        );

        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let result = match self.transfer(&file).await {
                Ok(()) => {
                    info!("Migrated {}", file.name);
                    MigrationResult::success(file.name)
                }
                Err(err) => {
                    warn!("Failed to migrate {}: {}", file.name, err);
                    MigrationResult::failure(file.name, err.to_string())
                }
            };
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            "Migration finished: {} succeeded, {} failed",
            succeeded,
            results.len() - succeeded
        );
        Ok(results)
    }

    async fn transfer(&self, file: &FileDescriptor) -> ClientResult<()> {
        let stream = self.source.download(&file.id).await?;
        self.destination
            .upload(&self.container, &file.name, stream)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::{CallLog, FakeDestination, FakeSource};
    use super::*;
    use crate::models::migration::MigrationStatus;

    fn service(source: FakeSource, destination: Arc<FakeDestination>) -> MigrationService {
        MigrationService::new(Arc::new(source), destination, "folder-1", "migrated")
    }

    #[tokio::test]
    async fn records_download_failure_and_keeps_going() {
        let source = FakeSource::default()
            .with_file("a1", "report.pdf", b"%PDF-1.7")
            .failing_download("a2", "image.png", "network timeout");
        let destination = Arc::new(FakeDestination::default());

        let results = service(source, destination.clone()).migrate().await.unwrap();

        assert_eq!(
            results,
            vec![
                MigrationResult::success("report.pdf"),
                MigrationResult::failure("image.png", "network timeout"),
            ]
        );
        assert_eq!(
            destination.objects.lock().unwrap().get("report.pdf").unwrap(),
            b"%PDF-1.7"
        );
    }

    #[tokio::test]
    async fn records_upload_failure_and_keeps_going() {
        let source = FakeSource::default()
            .with_file("a1", "one.txt", b"1")
            .with_file("a2", "two.txt", b"2")
            .with_file("a3", "three.txt", b"3");
        let mut destination = FakeDestination::default();
        destination
            .upload_errors
            .insert("two.txt".into(), "blob returned 403 Forbidden: denied".into());

        let results = service(source, Arc::new(destination)).migrate().await.unwrap();

        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                MigrationStatus::Success,
                MigrationStatus::Error,
                MigrationStatus::Success
            ]
        );
        assert_eq!(
            results[1].error.as_deref(),
            Some("blob returned 403 Forbidden: denied")
        );
        assert!(results[0].error.is_none() && results[2].error.is_none());
    }

    #[tokio::test]
    async fn empty_folder_yields_no_results() {
        let destination = Arc::new(FakeDestination::default());
        let results = service(FakeSource::default(), destination)
            .migrate()
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_run() {
        let source = FakeSource {
            listing_error: Some("File not found: folder-1".into()),
            ..FakeSource::default()
        };
        let destination = Arc::new(FakeDestination::default());

        let err = service(source, destination.clone()).migrate().await.unwrap_err();

        assert_eq!(err.to_string(), "File not found: folder-1");
        assert!(destination.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_follow_listing_order_and_length() {
        let mut source = FakeSource::default();
        let names: Vec<String> = (0..25).map(|i| format!("file-{:02}.bin", 24 - i)).collect();
        for (i, name) in names.iter().enumerate() {
            if i % 4 == 0 {
                source = source.failing_download(&format!("id-{}", i), name, "boom");
            } else {
                source = source.with_file(&format!("id-{}", i), name, name.as_bytes());
            }
        }

        let results = service(source, Arc::new(FakeDestination::default()))
            .migrate()
            .await
            .unwrap();

        assert_eq!(results.len(), names.len());
        let result_names: Vec<_> = results.iter().map(|r| r.name.clone()).collect();
        assert_eq!(result_names, names);
    }

    #[tokio::test]
    async fn transfers_never_overlap() {
        let log: CallLog = Default::default();
        let source = FakeSource {
            log: log.clone(),
            ..FakeSource::default()
        }
        .with_file("a1", "a.txt", b"aaaa")
        .failing_download("a2", "b.txt", "gone")
        .with_file("a3", "c.txt", b"cccc");
        let destination = Arc::new(FakeDestination {
            log: log.clone(),
            ..FakeDestination::default()
        });

        service(source, destination).migrate().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "list:folder-1",
                "download:a1",
                "upload-start:a.txt",
                "upload-end:a.txt",
                "download:a2",
                "download:a3",
                "upload-start:c.txt",
                "upload-end:c.txt",
            ]
        );
    }

    #[tokio::test]
    async fn repeated_runs_converge_on_same_object_names() {
        let source = FakeSource::default()
            .with_file("a1", "report.pdf", b"v1")
            .with_file("a2", "image.png", b"png");
        let destination = Arc::new(FakeDestination::default());
        let service = service(source, destination.clone());

        service.migrate().await.unwrap();
        let first = service.list_destination().await.unwrap();
        service.migrate().await.unwrap();
        let second = service.list_destination().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn bootstrap_tolerates_existing_container() {
        let destination = Arc::new(FakeDestination::default());
        let service = service(FakeSource::default(), destination);

        assert_eq!(service.bootstrap().await, Some(ContainerStatus::Created));
        assert_eq!(
            service.bootstrap().await,
            Some(ContainerStatus::AlreadyExisted)
        );
    }

    #[tokio::test]
    async fn bootstrap_failure_is_not_fatal() {
        let destination = Arc::new(FakeDestination {
            container_error: Some("Signature did not match.".into()),
            ..FakeDestination::default()
        });
        let service = service(FakeSource::default().with_file("a1", "a.txt", b"a"), destination);

        assert_eq!(service.bootstrap().await, None);
        assert_eq!(service.list_source().await.unwrap().len(), 1);
    }
}
