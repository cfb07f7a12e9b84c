//! Represents a blob listed from the destination container.

use serde::{Deserialize, Serialize};

/// A single object in the destination container, addressed by name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlobDescriptor {
    pub name: String,
}

impl BlobDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
