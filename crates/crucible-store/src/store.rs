use crate::medium::DurableMedium;
use crate::snapshot::{GeneratorConfig, LockRef, StoreSnapshot, VersionNode};
use crate::transaction::WorkingCopy;
use crate::StoreError;
use crucible_descriptor::{AppDescriptor, PackageRef, Platform};
use tracing::debug;

/// Filter for enumerating complete descriptors out of the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorFilter {
    pub platform: Option<Platform>,
    /// `Some(true)` keeps only released versions, `Some(false)` only
    /// unreleased ones.
    pub released: Option<bool>,
}

/// The durable repository of application/platform/version nodes.
///
/// Reads are answered from the active working copy when a transaction is
/// open (so a transaction body sees its own mutations), and from the last
/// durable snapshot otherwise. All writes require an active working copy.
pub struct VersionStore {
    pub(crate) medium: Box<dyn DurableMedium>,
    pub(crate) durable: StoreSnapshot,
    pub(crate) working: Option<WorkingCopy>,
}

impl VersionStore {
    /// Open a store over the given medium, reading the current durable
    /// snapshot.
    pub fn open(medium: Box<dyn DurableMedium>) -> Result<Self, StoreError> {
        let durable = medium.read_snapshot()?;
        debug!("opened store with {} application(s)", durable.apps.len());
        Ok(Self {
            medium,
            durable,
            working: None,
        })
    }

    /// The snapshot reads are currently answered from.
    pub fn current(&self) -> &StoreSnapshot {
        match &self.working {
            Some(copy) => copy.snapshot(),
            None => &self.durable,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.working.is_some()
    }

    fn working_snapshot_mut(&mut self) -> Result<&mut StoreSnapshot, StoreError> {
        self.working
            .as_mut()
            .map(WorkingCopy::snapshot_mut)
            .ok_or(StoreError::NotInTransaction)
    }

    fn node(&self, descriptor: &AppDescriptor) -> Result<&VersionNode, StoreError> {
        if !descriptor.is_complete() {
            return Err(StoreError::IncompleteDescriptor(descriptor.to_string()));
        }
        self.current()
            .find_version(descriptor)
            .ok_or_else(|| StoreError::VersionNotFound(descriptor.to_string()))
    }

    fn node_mut(&mut self, descriptor: &AppDescriptor) -> Result<&mut VersionNode, StoreError> {
        if !descriptor.is_complete() {
            return Err(StoreError::IncompleteDescriptor(descriptor.to_string()));
        }
        let key = descriptor.to_string();
        self.working_snapshot_mut()?
            .find_version_mut(descriptor)
            .ok_or(StoreError::VersionNotFound(key))
    }

    // ----- read operations -----

    pub fn app_names(&self) -> Vec<String> {
        self.current().apps.iter().map(|a| a.name.clone()).collect()
    }

    /// Raw version strings for one `(name, platform)` pair, in insertion
    /// order. Empty when the pair is unknown.
    pub fn version_names(&self, name: &str, platform: Platform) -> Vec<String> {
        self.current()
            .find_platform(name, platform)
            .map(|p| p.versions.iter().map(|v| v.version.clone()).collect())
            .unwrap_or_default()
    }

    pub fn has_descriptor(&self, descriptor: &AppDescriptor) -> bool {
        self.current().matches(descriptor)
    }

    pub fn container_version(
        &self,
        descriptor: &AppDescriptor,
    ) -> Result<Option<String>, StoreError> {
        Ok(self.node(descriptor)?.container_version.clone())
    }

    pub fn generator_config(
        &self,
        descriptor: &AppDescriptor,
    ) -> Result<Option<GeneratorConfig>, StoreError> {
        Ok(self.node(descriptor)?.generator.clone())
    }

    pub fn miniapps(&self, descriptor: &AppDescriptor) -> Result<Vec<PackageRef>, StoreError> {
        Ok(self.node(descriptor)?.miniapps.clone())
    }

    pub fn js_api_impls(&self, descriptor: &AppDescriptor) -> Result<Vec<PackageRef>, StoreError> {
        Ok(self.node(descriptor)?.js_api_impls.clone())
    }

    pub fn native_deps(&self, descriptor: &AppDescriptor) -> Result<Vec<PackageRef>, StoreError> {
        Ok(self.node(descriptor)?.native_deps.clone())
    }

    pub fn is_released(&self, descriptor: &AppDescriptor) -> Result<bool, StoreError> {
        Ok(self.node(descriptor)?.is_released)
    }

    /// Enumerate complete descriptors, optionally filtered by platform and
    /// release status, in store (insertion) order.
    pub fn descriptors(&self, filter: DescriptorFilter) -> Vec<AppDescriptor> {
        let mut out = Vec::new();
        for app in &self.current().apps {
            for entry in &app.platforms {
                if filter.platform.is_some_and(|p| p != entry.platform) {
                    continue;
                }
                for node in &entry.versions {
                    if filter.released.is_some_and(|r| r != node.is_released) {
                        continue;
                    }
                    out.push(AppDescriptor::complete(
                        app.name.clone(),
                        entry.platform,
                        node.version.clone(),
                    ));
                }
            }
        }
        out
    }

    // ----- write operations (working copy only) -----

    /// Add a new version node. Fails if the version string is already used
    /// within the `(name, platform)` pair.
    pub fn add_version(&mut self, descriptor: &AppDescriptor) -> Result<(), StoreError> {
        if !descriptor.is_complete() {
            return Err(StoreError::IncompleteDescriptor(descriptor.to_string()));
        }
        let name = descriptor.name.clone();
        let platform = descriptor.platform.expect("complete descriptor");
        let version = descriptor.version.clone().expect("complete descriptor");
        let snapshot = self.working_snapshot_mut()?;

        let app = match snapshot.apps.iter_mut().find(|a| a.name == name) {
            Some(app) => app,
            None => {
                snapshot.apps.push(crate::snapshot::AppEntry {
                    name: name.clone(),
                    platforms: Vec::new(),
                });
                snapshot.apps.last_mut().expect("just pushed")
            }
        };
        let entry = match app.platforms.iter_mut().find(|p| p.platform == platform) {
            Some(entry) => entry,
            None => {
                app.platforms.push(crate::snapshot::PlatformEntry {
                    platform,
                    versions: Vec::new(),
                });
                app.platforms.last_mut().expect("just pushed")
            }
        };
        if entry.versions.iter().any(|v| v.version == version) {
            return Err(StoreError::DuplicateVersion {
                descriptor: format!("{name}:{platform}"),
                version,
            });
        }
        entry.versions.push(VersionNode::new(version));
        Ok(())
    }

    pub fn add_miniapp(
        &mut self,
        descriptor: &AppDescriptor,
        miniapp: PackageRef,
    ) -> Result<(), StoreError> {
        let key = descriptor.to_string();
        let node = self.node_mut(descriptor)?;
        if node.miniapps.iter().any(|m| m.same_package(&miniapp)) {
            return Err(StoreError::AlreadyPresent {
                what: "MiniApp",
                id: miniapp.to_string(),
                descriptor: key,
            });
        }
        node.miniapps.push(miniapp);
        Ok(())
    }

    pub fn remove_miniapp(
        &mut self,
        descriptor: &AppDescriptor,
        miniapp: &PackageRef,
    ) -> Result<(), StoreError> {
        let key = descriptor.to_string();
        let node = self.node_mut(descriptor)?;
        let before = node.miniapps.len();
        node.miniapps.retain(|m| !m.same_package(miniapp));
        if node.miniapps.len() == before {
            return Err(StoreError::NotPresent {
                what: "MiniApp",
                id: miniapp.to_string(),
                descriptor: key,
            });
        }
        Ok(())
    }

    pub fn add_native_dep(
        &mut self,
        descriptor: &AppDescriptor,
        dep: PackageRef,
    ) -> Result<(), StoreError> {
        let key = descriptor.to_string();
        let node = self.node_mut(descriptor)?;
        if node.native_deps.iter().any(|d| d.same_package(&dep)) {
            return Err(StoreError::AlreadyPresent {
                what: "dependency",
                id: dep.to_string(),
                descriptor: key,
            });
        }
        node.native_deps.push(dep);
        Ok(())
    }

    pub fn remove_native_dep(
        &mut self,
        descriptor: &AppDescriptor,
        dep: &PackageRef,
    ) -> Result<(), StoreError> {
        let key = descriptor.to_string();
        let node = self.node_mut(descriptor)?;
        let before = node.native_deps.len();
        node.native_deps.retain(|d| !d.same_package(dep));
        if node.native_deps.len() == before {
            return Err(StoreError::NotPresent {
                what: "dependency",
                id: dep.to_string(),
                descriptor: key,
            });
        }
        Ok(())
    }

    pub fn add_js_api_impl(
        &mut self,
        descriptor: &AppDescriptor,
        api_impl: PackageRef,
    ) -> Result<(), StoreError> {
        let key = descriptor.to_string();
        let node = self.node_mut(descriptor)?;
        if node.js_api_impls.iter().any(|j| j.same_package(&api_impl)) {
            return Err(StoreError::AlreadyPresent {
                what: "JS API implementation",
                id: api_impl.to_string(),
                descriptor: key,
            });
        }
        node.js_api_impls.push(api_impl);
        Ok(())
    }

    pub fn remove_js_api_impl(
        &mut self,
        descriptor: &AppDescriptor,
        api_impl: &PackageRef,
    ) -> Result<(), StoreError> {
        let key = descriptor.to_string();
        let node = self.node_mut(descriptor)?;
        let before = node.js_api_impls.len();
        node.js_api_impls.retain(|j| !j.same_package(api_impl));
        if node.js_api_impls.len() == before {
            return Err(StoreError::NotPresent {
                what: "JS API implementation",
                id: api_impl.to_string(),
                descriptor: key,
            });
        }
        Ok(())
    }

    /// Set or replace the lock-file reference under `key`.
    pub fn set_lock_ref(
        &mut self,
        descriptor: &AppDescriptor,
        key: &str,
        lock_ref: LockRef,
    ) -> Result<(), StoreError> {
        self.node_mut(descriptor)?
            .lock_refs
            .insert(key.to_owned(), lock_ref);
        Ok(())
    }

    pub fn set_container_version(
        &mut self,
        descriptor: &AppDescriptor,
        version: &str,
    ) -> Result<(), StoreError> {
        self.node_mut(descriptor)?.container_version = Some(version.to_owned());
        Ok(())
    }

    pub fn set_generator_config(
        &mut self,
        descriptor: &AppDescriptor,
        config: GeneratorConfig,
    ) -> Result<(), StoreError> {
        self.node_mut(descriptor)?.generator = Some(config);
        Ok(())
    }

    pub fn set_released(
        &mut self,
        descriptor: &AppDescriptor,
        released: bool,
    ) -> Result<(), StoreError> {
        self.node_mut(descriptor)?.is_released = released;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::MemoryMedium;
    use crate::snapshot::{AppEntry, PlatformEntry};
    use crate::transaction::TransactionManager;

    fn seeded_store() -> VersionStore {
        let snapshot = StoreSnapshot {
            apps: vec![AppEntry {
                name: "walmart".to_owned(),
                platforms: vec![PlatformEntry {
                    platform: Platform::Android,
                    versions: vec![VersionNode::new("17"), VersionNode::new("18")],
                }],
            }],
        };
        VersionStore::open(Box::new(MemoryMedium::with_snapshot(snapshot))).unwrap()
    }

    #[test]
    fn reads_outside_transaction_hit_durable_snapshot() {
        let store = seeded_store();
        assert_eq!(store.app_names(), vec!["walmart"]);
        assert_eq!(
            store.version_names("walmart", Platform::Android),
            vec!["17", "18"]
        );
        assert!(store.version_names("walmart", Platform::Ios).is_empty());
    }

    #[test]
    fn writes_fail_outside_transaction() {
        let mut store = seeded_store();
        let d = AppDescriptor::complete("walmart", Platform::Android, "17");
        let err = store
            .add_miniapp(&d, PackageRef::versioned("movies", "1.0.0"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotInTransaction));
    }

    #[test]
    fn writes_inside_transaction_are_visible_to_reads() {
        let mut tm = TransactionManager::new(seeded_store());
        tm.begin().unwrap();
        let d = AppDescriptor::complete("walmart", Platform::Android, "17");
        tm.store_mut()
            .add_miniapp(&d, PackageRef::versioned("movies", "1.0.0"))
            .unwrap();
        assert_eq!(tm.store().miniapps(&d).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_miniapp_is_rejected() {
        let mut tm = TransactionManager::new(seeded_store());
        tm.begin().unwrap();
        let d = AppDescriptor::complete("walmart", Platform::Android, "17");
        tm.store_mut()
            .add_miniapp(&d, PackageRef::versioned("movies", "1.0.0"))
            .unwrap();
        let err = tm
            .store_mut()
            .add_miniapp(&d, PackageRef::versioned("movies", "2.0.0"))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyPresent { .. }));
        assert!(err.to_string().contains("movies"));
    }

    #[test]
    fn remove_missing_dependency_is_rejected() {
        let mut tm = TransactionManager::new(seeded_store());
        tm.begin().unwrap();
        let d = AppDescriptor::complete("walmart", Platform::Android, "17");
        let err = tm
            .store_mut()
            .remove_native_dep(&d, &PackageRef::new("absent"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotPresent { .. }));
    }

    #[test]
    fn add_version_enforces_uniqueness() {
        let mut tm = TransactionManager::new(seeded_store());
        tm.begin().unwrap();
        let dup = AppDescriptor::complete("walmart", Platform::Android, "17");
        assert!(matches!(
            tm.store_mut().add_version(&dup).unwrap_err(),
            StoreError::DuplicateVersion { .. }
        ));

        let fresh = AppDescriptor::complete("walmart", Platform::Android, "19.1");
        tm.store_mut().add_version(&fresh).unwrap();
        assert_eq!(
            tm.store().version_names("walmart", Platform::Android),
            vec!["17", "18", "19.1"]
        );
    }

    #[test]
    fn descriptors_respects_filters() {
        let mut tm = TransactionManager::new(seeded_store());
        tm.begin().unwrap();
        let d17 = AppDescriptor::complete("walmart", Platform::Android, "17");
        tm.store_mut().set_released(&d17, true).unwrap();
        tm.commit(&["mark 17 released".to_owned()]).unwrap();

        let store = tm.store();
        let released = store.descriptors(DescriptorFilter {
            platform: None,
            released: Some(true),
        });
        assert_eq!(released, vec![d17]);

        let ios_only = store.descriptors(DescriptorFilter {
            platform: Some(Platform::Ios),
            released: None,
        });
        assert!(ios_only.is_empty());

        let all = store.descriptors(DescriptorFilter::default());
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn incomplete_descriptor_reads_are_rejected() {
        let store = seeded_store();
        let partial = AppDescriptor::with_platform("walmart", Platform::Android);
        assert!(matches!(
            store.container_version(&partial).unwrap_err(),
            StoreError::IncompleteDescriptor(_)
        ));
    }
}
