//! Represents a file listed from the source Drive folder.

use serde::{Deserialize, Serialize};

/// A single file inside the source folder.
///
/// `id` is opaque and only meaningful to the source service. `name` becomes
/// the destination blob key verbatim.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Source-assigned identifier used to download the content.
    pub id: String,

    /// Display name, reused as the destination object name.
    pub name: String,
}

impl FileDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
