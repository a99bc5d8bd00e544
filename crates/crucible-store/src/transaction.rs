use crate::snapshot::StoreSnapshot;
use crate::store::VersionStore;
use crate::StoreError;
use tracing::{debug, info, warn};

/// The single in-flight mutable shadow of the store.
///
/// Created by [`TransactionManager::begin`], promoted to durable state by
/// `commit`, dropped by `discard`. At most one exists at any time; its
/// lifetime is exactly one top-level operation.
#[derive(Debug)]
pub struct WorkingCopy {
    snapshot: StoreSnapshot,
}

impl WorkingCopy {
    pub(crate) fn new(snapshot: StoreSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }

    pub(crate) fn snapshot_mut(&mut self) -> &mut StoreSnapshot {
        &mut self.snapshot
    }
}

/// Wraps a sequence of store mutations and external side effects with
/// atomic commit/discard semantics.
///
/// An explicit instance is passed to every operation that needs one; there
/// is no process-wide transaction flag. "No other transaction active" is
/// enforced by [`TransactionManager::begin`].
pub struct TransactionManager {
    store: VersionStore,
}

impl TransactionManager {
    pub fn new(store: VersionStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VersionStore {
        &mut self.store
    }

    pub fn in_transaction(&self) -> bool {
        self.store.in_transaction()
    }

    /// Create a working copy from the current durable snapshot.
    pub fn begin(&mut self) -> Result<(), StoreError> {
        if self.store.working.is_some() {
            return Err(StoreError::TransactionAlreadyActive);
        }
        debug!("transaction begin");
        self.store.working = Some(WorkingCopy::new(self.store.durable.clone()));
        Ok(())
    }

    /// Persist the working copy as the new durable snapshot, tagged with
    /// the commit message(s).
    ///
    /// On a medium write failure the working copy is discarded and durable
    /// state is left at the prior snapshot.
    pub fn commit(&mut self, messages: &[String]) -> Result<(), StoreError> {
        let Some(copy) = self.store.working.take() else {
            return Err(StoreError::NotInTransaction);
        };
        match self.store.medium.write_snapshot(copy.snapshot(), messages) {
            Ok(()) => {
                self.store.durable = copy.snapshot;
                info!("transaction committed ({} message(s))", messages.len());
                Ok(())
            }
            Err(e) => {
                warn!("commit failed, durable state unchanged: {e}");
                Err(e)
            }
        }
    }

    /// Drop the working copy, restoring visible state to the last durable
    /// snapshot. Idempotent; safe to call with no active transaction.
    pub fn discard(&mut self) {
        if self.store.working.take().is_some() {
            debug!("transaction discarded");
        }
    }

    /// Run `body` against the working copy of a fresh transaction and
    /// commit, discarding on any error.
    ///
    /// Either every mutation performed by `body` is durably committed, or
    /// the store is byte-for-byte as it was before `begin()`. External side
    /// effects performed by `body` are outside this guarantee.
    pub fn perform_state_update<T, E, F>(&mut self, messages: &[String], body: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut VersionStore) -> Result<T, E>,
    {
        self.begin().map_err(E::from)?;
        match body(&mut self.store) {
            Ok(value) => {
                self.commit(messages).map_err(E::from)?;
                Ok(value)
            }
            Err(e) => {
                self.discard();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::MemoryMedium;
    use crate::snapshot::{AppEntry, PlatformEntry, VersionNode};
    use crucible_descriptor::{AppDescriptor, PackageRef, Platform};

    fn seeded() -> (MemoryMedium, TransactionManager) {
        let snapshot = StoreSnapshot {
            apps: vec![AppEntry {
                name: "walmart".to_owned(),
                platforms: vec![PlatformEntry {
                    platform: Platform::Android,
                    versions: vec![VersionNode::new("17.0.0")],
                }],
            }],
        };
        let medium = MemoryMedium::with_snapshot(snapshot);
        let store = VersionStore::open(Box::new(medium.clone())).unwrap();
        (medium, TransactionManager::new(store))
    }

    fn descriptor() -> AppDescriptor {
        AppDescriptor::complete("walmart", Platform::Android, "17.0.0")
    }

    #[test]
    fn begin_twice_fails_and_keeps_working_copy() {
        let (_medium, mut tm) = seeded();
        tm.begin().unwrap();
        tm.store_mut()
            .add_miniapp(&descriptor(), PackageRef::versioned("movies", "1.0.0"))
            .unwrap();

        assert!(matches!(
            tm.begin().unwrap_err(),
            StoreError::TransactionAlreadyActive
        ));
        // The in-flight mutation survived the failed begin.
        assert_eq!(tm.store().miniapps(&descriptor()).unwrap().len(), 1);
    }

    #[test]
    fn discard_restores_durable_view_and_is_idempotent() {
        let (_medium, mut tm) = seeded();
        tm.begin().unwrap();
        tm.store_mut()
            .add_miniapp(&descriptor(), PackageRef::versioned("movies", "1.0.0"))
            .unwrap();
        tm.discard();
        assert!(tm.store().miniapps(&descriptor()).unwrap().is_empty());
        // Safe with no active transaction.
        tm.discard();
        assert!(!tm.in_transaction());
    }

    #[test]
    fn commit_persists_and_tags() {
        let (medium, mut tm) = seeded();
        tm.begin().unwrap();
        tm.store_mut()
            .add_miniapp(&descriptor(), PackageRef::versioned("movies", "1.0.0"))
            .unwrap();
        tm.commit(&["add movies MiniApp".to_owned()]).unwrap();

        assert!(!tm.in_transaction());
        assert_eq!(
            medium.persisted().find_version(&descriptor()).unwrap().miniapps.len(),
            1
        );
        assert_eq!(medium.tags(), vec!["add movies MiniApp"]);
    }

    #[test]
    fn commit_without_transaction_fails() {
        let (_medium, mut tm) = seeded();
        assert!(matches!(
            tm.commit(&[]).unwrap_err(),
            StoreError::NotInTransaction
        ));
    }

    #[test]
    fn failed_commit_leaves_prior_snapshot() {
        let (medium, mut tm) = seeded();
        let before = medium.persisted();

        tm.begin().unwrap();
        tm.store_mut()
            .add_miniapp(&descriptor(), PackageRef::versioned("movies", "1.0.0"))
            .unwrap();
        medium.fail_writes(true);
        assert!(matches!(
            tm.commit(&["doomed".to_owned()]).unwrap_err(),
            StoreError::Persist(_)
        ));

        // Working copy is gone and both the durable cache and the medium
        // still hold the pre-transaction state.
        assert!(!tm.in_transaction());
        assert_eq!(medium.persisted(), before);
        assert!(tm.store().miniapps(&descriptor()).unwrap().is_empty());
    }

    #[test]
    fn perform_state_update_commits_on_success() {
        let (medium, mut tm) = seeded();
        let d = descriptor();
        tm.perform_state_update::<_, StoreError, _>(&["add dep".to_owned()], |store| {
            store.add_native_dep(&d, PackageRef::versioned("react-native", "0.42.0"))
        })
        .unwrap();
        assert_eq!(
            medium.persisted().find_version(&d).unwrap().native_deps.len(),
            1
        );
    }

    #[test]
    fn perform_state_update_discards_on_body_error() {
        let (medium, mut tm) = seeded();
        let before = medium.persisted();
        let d = descriptor();

        let result = tm.perform_state_update::<(), StoreError, _>(&[], |store| {
            store.add_native_dep(&d, PackageRef::versioned("react-native", "0.42.0"))?;
            Err(StoreError::Persist("publisher exploded".to_owned()))
        });
        assert!(result.is_err());
        assert!(!tm.in_transaction());
        assert_eq!(medium.persisted(), before);
        assert!(tm.store().native_deps(&d).unwrap().is_empty());
    }
}
