//! Per-file outcome of a migration run.

use serde::{Deserialize, Serialize};

/// Final state of one file's transfer attempt.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Success,
    Error,
}

/// One record per source file, in source-listing order.
///
/// `error` is only serialized for failed transfers and carries the underlying
/// failure message unchanged.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MigrationResult {
    pub name: String,

    pub status: MigrationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationResult {
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: MigrationStatus::Success,
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: MigrationStatus::Error,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MigrationStatus::Success
    }
}
