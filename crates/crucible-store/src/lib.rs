//! Versioned release store, working copy, and transaction manager for Crucible.
//!
//! This crate provides the durable repository of application/platform/version
//! nodes (`VersionStore`), the single mutable shadow used during an update
//! (`WorkingCopy`), the `TransactionManager` that gives all-or-nothing
//! semantics across store mutations, and the `DurableMedium` abstraction the
//! store persists through (`FileMedium` with checksummed atomic writes, or
//! `MemoryMedium` for tests).

pub mod medium;
pub mod snapshot;
pub mod store;
pub mod transaction;

pub use medium::{DurableMedium, FileMedium, MemoryMedium};
pub use snapshot::{
    AppEntry, Credentials, GeneratorConfig, LockRef, PlatformEntry, PublisherKind, PublisherSpec,
    StoreSnapshot, VersionNode,
};
pub use store::{DescriptorFilter, VersionStore};
pub use transaction::{TransactionManager, WorkingCopy};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee this.
/// Calling `fsync()` on the parent directory makes the rename durable on
/// all filesystems and mount configurations.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("a transaction is already active")]
    TransactionAlreadyActive,
    #[error("store mutation attempted outside of a transaction")]
    NotInTransaction,
    #[error("failed to persist store snapshot: {0}")]
    Persist(String),
    #[error("descriptor '{0}' is not complete (name:platform:version required)")]
    IncompleteDescriptor(String),
    #[error("no version matching '{0}' in the store")]
    VersionNotFound(String),
    #[error("version '{version}' already exists for '{descriptor}'")]
    DuplicateVersion { descriptor: String, version: String },
    #[error("{what} '{id}' is already attached to '{descriptor}'")]
    AlreadyPresent {
        what: &'static str,
        id: String,
        descriptor: String,
    },
    #[error("{what} '{id}' is not attached to '{descriptor}'")]
    NotPresent {
        what: &'static str,
        id: String,
        descriptor: String,
    },
    #[error("snapshot integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_embeds_identifiers() {
        let e = StoreError::AlreadyPresent {
            what: "MiniApp",
            id: "movies@1.0.0".to_owned(),
            descriptor: "walmart:android:17.0.0".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("movies@1.0.0"));
        assert!(msg.contains("walmart:android:17.0.0"));
    }

    #[test]
    fn error_display_version_not_found() {
        let e = StoreError::VersionNotFound("walmart:ios:99.0.0".to_owned());
        assert!(e.to_string().contains("walmart:ios:99.0.0"));
    }

    #[test]
    fn error_display_persist() {
        let e = StoreError::Persist("disk full".to_owned());
        assert!(e.to_string().contains("disk full"));
    }
}
