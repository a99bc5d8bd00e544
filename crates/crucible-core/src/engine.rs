use crate::CoreError;
use crucible_descriptor::{
    increment_patch, matching_versions, AppDescriptor, PackageRef, Platform,
};
use crucible_publish::{
    probe_package, ContainerGenerator, DecisionProvider, GenerateRequest, PublishRequest,
    PublisherSet, RegistryClient,
};
use crucible_store::{DescriptorFilter, LockRef, TransactionManager, VersionStore};
use std::path::PathBuf;
use tracing::{debug, info};

/// Key under which the composite bundle's lock file is recorded on a
/// version node.
pub const CONTAINER_LOCK_KEY: &str = "container";

/// Caller-tunable knobs for one container publication run.
#[derive(Debug, Clone)]
pub struct PublicationOptions {
    /// Explicit container version to publish as. When absent the current
    /// version's patch component is incremented, falling back to `1.0.0`
    /// for a version node that has never had a container.
    pub container_version: Option<String>,
    /// Root directory generated containers are written under; each run
    /// writes into a per-platform subdirectory.
    pub out_root: PathBuf,
}

/// Compute the container version the next publication will carry.
pub fn next_container_version(
    store: &VersionStore,
    descriptor: &AppDescriptor,
    explicit: Option<&str>,
) -> Result<String, CoreError> {
    if let Some(version) = explicit {
        return Ok(version.to_owned());
    }
    match store.container_version(descriptor)? {
        Some(current) => Ok(increment_patch(&current)?),
        None => Ok("1.0.0".to_owned()),
    }
}

/// Drives the compute-version → mutate → generate → publish → persist
/// workflow for one application version, inside a single store transaction.
///
/// Store mutations are atomic: any failure after `begin` discards the
/// working copy and leaves the durable snapshot untouched. Failures that
/// occur after external targets have been touched are wrapped in
/// [`CoreError::ExternalSideEffects`] so callers can tell the two apart.
pub struct Publication<'a> {
    generator: &'a dyn ContainerGenerator,
    publishers: &'a PublisherSet,
}

impl<'a> Publication<'a> {
    pub fn new(generator: &'a dyn ContainerGenerator, publishers: &'a PublisherSet) -> Self {
        Self {
            generator,
            publishers,
        }
    }

    /// Apply `body` to the store, then regenerate and republish the
    /// container for `descriptor`, capturing the bundle lock file and the
    /// new container version on the node before commit.
    ///
    /// Errors out of `body` propagate unmodified. Errors from the
    /// generation and publication phase are wrapped in
    /// [`CoreError::ExternalSideEffects`].
    pub fn update_container_state<T, F>(
        &self,
        tm: &mut TransactionManager,
        descriptor: &AppDescriptor,
        messages: &[String],
        opts: &PublicationOptions,
        body: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(&mut VersionStore) -> Result<T, CoreError>,
    {
        let platform = descriptor
            .platform
            .ok_or_else(|| CoreError::MissingPlatform(descriptor.to_string()))?;
        let version = next_container_version(
            tm.store(),
            descriptor,
            opts.container_version.as_deref(),
        )?;
        info!("publishing container {version} for '{descriptor}'");

        tm.perform_state_update(messages, |store| {
            let value = body(store)?;
            self.generate_and_publish(store, descriptor, platform, &version, opts)
                .map_err(|e| CoreError::ExternalSideEffects {
                    source: Box::new(e),
                })?;
            Ok(value)
        })
    }

    fn generate_and_publish(
        &self,
        store: &mut VersionStore,
        descriptor: &AppDescriptor,
        platform: Platform,
        version: &str,
        opts: &PublicationOptions,
    ) -> Result<(), CoreError> {
        let generated = self.generator.generate(&GenerateRequest {
            descriptor: descriptor.clone(),
            platform,
            miniapps: store.miniapps(descriptor)?,
            js_api_impls: store.js_api_impls(descriptor)?,
            native_deps: store.native_deps(descriptor)?,
            out_dir: opts.out_root.join(platform.to_string()),
        })?;

        // Publishers run in configuration order; the first failure aborts
        // the run with the remaining targets untouched.
        let config = store.generator_config(descriptor)?.unwrap_or_default();
        for spec in &config.publishers {
            debug!("publishing to {} target {}", spec.kind, spec.url);
            self.publishers.get(spec.kind)?.publish(&PublishRequest {
                container_dir: generated.container_dir.clone(),
                version: version.to_owned(),
                url: spec.url.clone(),
                credentials: spec.credentials.clone(),
            })?;
        }

        if let Some(lock_file) = &generated.lock_file {
            let content = std::fs::read(lock_file)?;
            store.set_lock_ref(
                descriptor,
                CONTAINER_LOCK_KEY,
                LockRef::from_content(CONTAINER_LOCK_KEY, &content),
            )?;
        }
        store.set_container_version(descriptor, version)?;
        Ok(())
    }
}

/// Complete descriptors for the versions of `(name, platform)` whose
/// version string satisfies the semantic-version `range`, in store order.
pub fn descriptors_matching_range(
    store: &VersionStore,
    name: &str,
    platform: Platform,
    range: &str,
) -> Result<Vec<AppDescriptor>, CoreError> {
    let versions = store.version_names(name, platform);
    let matching = matching_versions(range, &versions)?;
    Ok(matching
        .into_iter()
        .map(|v| AppDescriptor::complete(name, platform, v))
        .collect())
}

/// Pick one complete descriptor out of the store, prompting through
/// `decisions` only when more than one candidate survives the filter.
pub fn choose_descriptor(
    store: &VersionStore,
    filter: DescriptorFilter,
    decisions: &dyn DecisionProvider,
) -> Result<AppDescriptor, CoreError> {
    let candidates = store.descriptors(filter);
    match candidates.as_slice() {
        [] => Err(CoreError::NoMatchingVersions),
        [only] => Ok(only.clone()),
        _ => {
            let options: Vec<String> = candidates.iter().map(ToString::to_string).collect();
            let chosen = decisions.choose_one(&options, "select an application version")?;
            Ok(chosen.parse()?)
        }
    }
}

/// Pick any subset of the store's complete descriptors.
pub fn choose_descriptors(
    store: &VersionStore,
    filter: DescriptorFilter,
    decisions: &dyn DecisionProvider,
) -> Result<Vec<AppDescriptor>, CoreError> {
    let candidates = store.descriptors(filter);
    if candidates.is_empty() {
        return Err(CoreError::NoMatchingVersions);
    }
    let options: Vec<String> = candidates.iter().map(ToString::to_string).collect();
    let chosen = decisions.choose_many(&options, "select application versions")?;
    chosen
        .iter()
        .map(|c| c.parse().map_err(CoreError::from))
        .collect()
}

/// Whether to go ahead with creating a package called `name`.
///
/// A name already taken on the registry is not a hard error; the caller's
/// decision provider is asked whether to continue, defaulting to no.
/// Registry lookup failures count the name as free, matching the probe's
/// error handling.
pub fn package_name_conflict_check(
    registry: &dyn RegistryClient,
    decisions: &dyn DecisionProvider,
    name: &str,
) -> Result<bool, CoreError> {
    if !probe_package(registry, &PackageRef::new(name)) {
        return Ok(true);
    }
    Ok(decisions.confirm(
        &format!("package '{name}' already exists on the registry, continue anyway?"),
        false,
    )?)
}
