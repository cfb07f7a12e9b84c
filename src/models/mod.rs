//! Data models exchanged between the Drive source, the Blob destination and
//! the HTTP surface.
//!
//! Nothing here is persisted: every value lives for a single request and
//! serializes as JSON via `serde`.

pub mod blob;
pub mod credential;
pub mod file;
pub mod migration;
