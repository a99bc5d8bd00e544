use crate::snapshot::StoreSnapshot;
use crate::{fsync_dir, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// The persistence seam under the store. The transaction manager only ever
/// needs these two operations; everything else about layout is the medium's
/// business.
pub trait DurableMedium {
    fn read_snapshot(&self) -> Result<StoreSnapshot, StoreError>;

    /// Persist `snapshot` as the new durable state, tagged with the commit
    /// message(s). Must be atomic: on error the previously persisted
    /// snapshot stays readable.
    fn write_snapshot(&mut self, snapshot: &StoreSnapshot, tags: &[String])
        -> Result<(), StoreError>;
}

/// On-disk snapshot wrapper carrying a blake3 checksum of the serialized
/// store for integrity verification on read.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    checksum: String,
    store: StoreSnapshot,
}

fn store_checksum(snapshot: &StoreSnapshot) -> Result<String, StoreError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// File-backed durable medium: a single checksummed JSON document written
/// atomically (temp file, fsync, rename, parent-dir fsync), plus a sidecar
/// `commits.log` recording one timestamped line per commit tag.
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn log_path(&self) -> PathBuf {
        self.path.with_extension("commits.log")
    }
}

impl DurableMedium for FileMedium {
    fn read_snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        if !self.path.exists() {
            return Ok(StoreSnapshot::default());
        }
        let content = fs::read_to_string(&self.path)?;
        let file: SnapshotFile = serde_json::from_str(&content)?;
        let actual = store_checksum(&file.store)?;
        if actual != file.checksum {
            return Err(StoreError::IntegrityFailure {
                expected: file.checksum,
                actual,
            });
        }
        Ok(file.store)
    }

    fn write_snapshot(
        &mut self,
        snapshot: &StoreSnapshot,
        tags: &[String],
    ) -> Result<(), StoreError> {
        let file = SnapshotFile {
            checksum: store_checksum(snapshot)?,
            store: snapshot.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        let mut tmp =
            NamedTempFile::new_in(&dir).map_err(|e| StoreError::Persist(e.to_string()))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| StoreError::Persist(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::Persist(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Persist(e.error.to_string()))?;
        fsync_dir(&dir).map_err(|e| StoreError::Persist(e.to_string()))?;

        // The snapshot rename above is the commit point. The tag journal is
        // audit metadata only: a failure here must not fail a commit that is
        // already durable, or the caller would roll back its cached state
        // while the new snapshot stays on disk.
        match fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
        {
            Ok(mut log) => {
                let stamp = chrono::Utc::now().to_rfc3339();
                for tag in tags {
                    if let Err(e) = writeln!(log, "{stamp} {tag}") {
                        warn!("failed to record commit tag '{tag}': {e}");
                        break;
                    }
                }
            }
            Err(e) => warn!("failed to open commit tag journal: {e}"),
        }
        debug!("persisted snapshot to {} ({} tags)", self.path.display(), tags.len());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: StoreSnapshot,
    tags: Vec<String>,
    fail_writes: bool,
}

/// In-memory durable medium for tests. Clones share state, so a test can
/// keep one handle to inspect persisted data or inject write failures while
/// the store owns another.
#[derive(Clone, Default)]
pub struct MemoryMedium {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        let medium = Self::default();
        medium.state.lock().expect("medium lock").snapshot = snapshot;
        medium
    }

    /// Make every subsequent `write_snapshot` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().expect("medium lock").fail_writes = fail;
    }

    /// The snapshot as last persisted.
    pub fn persisted(&self) -> StoreSnapshot {
        self.state.lock().expect("medium lock").snapshot.clone()
    }

    /// All commit tags recorded so far, in commit order.
    pub fn tags(&self) -> Vec<String> {
        self.state.lock().expect("medium lock").tags.clone()
    }
}

impl DurableMedium for MemoryMedium {
    fn read_snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        Ok(self.persisted())
    }

    fn write_snapshot(
        &mut self,
        snapshot: &StoreSnapshot,
        tags: &[String],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("medium lock");
        if state.fail_writes {
            return Err(StoreError::Persist("injected write failure".to_owned()));
        }
        state.snapshot = snapshot.clone();
        state.tags.extend(tags.iter().cloned());
        Ok(())
    }
}
