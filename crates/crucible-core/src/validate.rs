use crate::CoreError;
use crucible_descriptor::{is_valid_container_version, AppDescriptor, PackageRef};
use crucible_publish::{probe_package, RegistryClient};
use crucible_store::VersionStore;
use semver::Version;
use tracing::debug;

/// Module flavors that carry a conventional name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    MiniApp,
    Api,
    JsApiImpl,
    NativeApiImpl,
}

impl ModuleKind {
    pub fn suffix(self) -> &'static str {
        match self {
            ModuleKind::MiniApp => "MiniApp",
            ModuleKind::Api => "Api",
            ModuleKind::JsApiImpl => "ApiImplJs",
            ModuleKind::NativeApiImpl => "ApiImplNative",
        }
    }
}

/// Whether `name` already carries the conventional suffix for its kind
/// (case-insensitive).
pub fn module_name_has_suffix(name: &str, kind: ModuleKind) -> bool {
    name.to_uppercase().contains(&kind.suffix().to_uppercase())
}

/// npm-style package name validity: optionally scoped, lowercase,
/// URL-safe, at most 214 characters, no leading dot or underscore.
pub fn is_valid_package_name(name: &str) -> bool {
    fn valid_part(part: &str) -> bool {
        !part.is_empty()
            && !part.starts_with('.')
            && !part.starts_with('_')
            && part
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b"-_.".contains(&b))
    }

    if name.is_empty() || name.len() > 214 {
        return false;
    }
    match name.strip_prefix('@') {
        Some(rest) => match rest.split_once('/') {
            Some((scope, part)) => valid_part(scope) && valid_part(part),
            None => false,
        },
        None => valid_part(name),
    }
}

/// Module name validity: a letter followed by letters, digits, `-` or `_`.
pub fn is_valid_module_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// A named precondition check with its typed arguments.
///
/// Checks are evaluated in a fixed priority order regardless of the order a
/// caller lists them in; see [`Check::priority`].
#[derive(Debug, Clone)]
pub enum Check {
    /// A store session is attached.
    StoreActive,
    /// The container version is a strict `major.minor.patch` triple.
    ValidContainerVersion { version: String },
    /// The container version is newer than the descriptor's current one.
    NewerContainerVersion {
        descriptor: AppDescriptor,
        version: String,
    },
    /// The descriptor names application, platform, and version.
    CompleteDescriptor { descriptor: AppDescriptor },
    /// None of the references is a git or local filesystem path.
    NoGitOrFilesystemPath { refs: Vec<PackageRef> },
    /// None of the references is a local filesystem path.
    NoFilesystemPath { refs: Vec<PackageRef> },
    /// Every descriptor matches at least one store node (partial
    /// descriptors match as patterns).
    DescriptorExists { descriptors: Vec<AppDescriptor> },
    /// All descriptors name the same application and platform.
    SameAppAndPlatform { descriptors: Vec<AppDescriptor> },
    /// The descriptor matches nothing in the store yet.
    DescriptorDoesNotExist { descriptor: AppDescriptor },
    /// Every referenced package version has been published to the registry.
    PublishedToRegistry { refs: Vec<PackageRef> },
    /// No referenced MiniApp is attached to the target version.
    MiniAppAbsent {
        refs: Vec<PackageRef>,
        descriptor: AppDescriptor,
    },
    /// Every referenced MiniApp is attached to the target version.
    MiniAppPresent {
        refs: Vec<PackageRef>,
        descriptor: AppDescriptor,
    },
    /// Every referenced MiniApp is attached at exactly the given version.
    MiniAppPresentSameVersion {
        refs: Vec<PackageRef>,
        descriptor: AppDescriptor,
    },
    /// Every referenced MiniApp is attached, at a different version.
    MiniAppPresentDifferentVersion {
        refs: Vec<PackageRef>,
        descriptor: AppDescriptor,
    },
    /// No referenced dependency is attached to the target version.
    DependencyAbsent {
        refs: Vec<PackageRef>,
        descriptor: AppDescriptor,
    },
    /// Every referenced dependency is attached to the target version.
    DependencyPresent {
        refs: Vec<PackageRef>,
        descriptor: AppDescriptor,
    },
    /// Every referenced dependency is attached, at a different version.
    DependencyPresentDifferentVersion {
        refs: Vec<PackageRef>,
        descriptor: AppDescriptor,
    },
    /// No MiniApp in the supplied dependency mapping still depends on any
    /// of the referenced dependencies. The mapping (MiniApp → its declared
    /// dependencies) is supplied by the caller, which obtains it from
    /// registry metadata outside the store.
    DependencyNotInUseByMiniApp {
        refs: Vec<PackageRef>,
        descriptor: AppDescriptor,
        miniapp_deps: Vec<(PackageRef, Vec<PackageRef>)>,
    },
    /// The name is a valid registry package name.
    ValidPackageName { name: String },
    /// The name is a valid module name.
    ValidModuleName { name: String },
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::StoreActive => "active-store",
            Check::ValidContainerVersion { .. } => "valid-container-version",
            Check::NewerContainerVersion { .. } => "newer-container-version",
            Check::CompleteDescriptor { .. } => "complete-descriptor",
            Check::NoGitOrFilesystemPath { .. } => "no-git-or-filesystem-path",
            Check::NoFilesystemPath { .. } => "no-filesystem-path",
            Check::DescriptorExists { .. } => "descriptor-exists",
            Check::SameAppAndPlatform { .. } => "same-app-and-platform",
            Check::DescriptorDoesNotExist { .. } => "descriptor-does-not-exist",
            Check::PublishedToRegistry { .. } => "published-to-registry",
            Check::MiniAppAbsent { .. } => "miniapp-absent-from-version",
            Check::MiniAppPresent { .. } => "miniapp-present-in-version",
            Check::MiniAppPresentSameVersion { .. } => "miniapp-present-same-version",
            Check::MiniAppPresentDifferentVersion { .. } => "miniapp-present-different-version",
            Check::DependencyAbsent { .. } => "dependency-absent-from-version",
            Check::DependencyPresent { .. } => "dependency-present-in-version",
            Check::DependencyPresentDifferentVersion { .. } => {
                "dependency-present-different-version"
            }
            Check::DependencyNotInUseByMiniApp { .. } => "dependency-not-in-use-by-miniapp",
            Check::ValidPackageName { .. } => "valid-package-name",
            Check::ValidModuleName { .. } => "valid-module-name",
        }
    }

    /// Fixed evaluation priority. Lower runs first; checks sharing a
    /// priority keep the caller's relative order.
    fn priority(&self) -> u8 {
        match self {
            Check::StoreActive => 1,
            Check::ValidContainerVersion { .. } => 2,
            Check::NewerContainerVersion { .. } => 3,
            Check::CompleteDescriptor { .. } => 4,
            Check::NoGitOrFilesystemPath { .. } | Check::NoFilesystemPath { .. } => 5,
            Check::DescriptorExists { .. } => 6,
            Check::SameAppAndPlatform { .. } => 7,
            Check::DescriptorDoesNotExist { .. } => 8,
            Check::PublishedToRegistry { .. } => 9,
            Check::MiniAppAbsent { .. }
            | Check::MiniAppPresent { .. }
            | Check::MiniAppPresentSameVersion { .. }
            | Check::MiniAppPresentDifferentVersion { .. } => 10,
            Check::DependencyAbsent { .. }
            | Check::DependencyPresent { .. }
            | Check::DependencyPresentDifferentVersion { .. }
            | Check::DependencyNotInUseByMiniApp { .. } => 11,
            Check::ValidPackageName { .. } => 12,
            Check::ValidModuleName { .. } => 13,
        }
    }

    /// Attach an extra message appended to this check's failure text.
    pub fn with_extra(self, extra: impl Into<String>) -> CheckRequest {
        CheckRequest {
            check: self,
            extra: Some(extra.into()),
        }
    }
}

/// A check plus an optional caller-supplied message appended on failure.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub check: Check,
    pub extra: Option<String>,
}

impl From<Check> for CheckRequest {
    fn from(check: Check) -> Self {
        Self { check, extra: None }
    }
}

/// Ordered battery of precondition checks over the store and registry.
///
/// A single invocation names a subset of checks; the engine executes them
/// strictly in the fixed priority order and stops at the first failure,
/// surfacing exactly one error even when later checks would also fail.
pub struct ValidationEngine<'a> {
    store: Option<&'a VersionStore>,
    registry: &'a dyn RegistryClient,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(store: &'a VersionStore, registry: &'a dyn RegistryClient) -> Self {
        Self {
            store: Some(store),
            registry,
        }
    }

    /// Engine with no attached store session; any store-backed check fails.
    pub fn detached(registry: &'a dyn RegistryClient) -> Self {
        Self {
            store: None,
            registry,
        }
    }

    pub fn run(&self, requests: Vec<CheckRequest>) -> Result<(), CoreError> {
        let mut requests = requests;
        requests.sort_by_key(|r| r.check.priority());
        for request in &requests {
            debug!("running check '{}'", request.check.name());
            if let Err(mut detail) = self.evaluate(&request.check) {
                if let Some(extra) = &request.extra {
                    detail.push_str(". ");
                    detail.push_str(extra);
                }
                return Err(CoreError::Validation {
                    check: request.check.name(),
                    detail,
                });
            }
        }
        Ok(())
    }

    fn store(&self) -> Result<&VersionStore, String> {
        self.store
            .ok_or_else(|| "no store session is active".to_owned())
    }

    fn miniapps_of(&self, descriptor: &AppDescriptor) -> Result<Vec<PackageRef>, String> {
        self.store()?
            .miniapps(descriptor)
            .map_err(|e| e.to_string())
    }

    fn deps_of(&self, descriptor: &AppDescriptor) -> Result<Vec<PackageRef>, String> {
        self.store()?
            .native_deps(descriptor)
            .map_err(|e| e.to_string())
    }

    #[allow(clippy::too_many_lines)]
    fn evaluate(&self, check: &Check) -> Result<(), String> {
        match check {
            Check::StoreActive => self.store().map(|_| ()),
            Check::ValidContainerVersion { version } => {
                if is_valid_container_version(version) {
                    Ok(())
                } else {
                    Err(format!("'{version}' is not a valid container version"))
                }
            }
            Check::NewerContainerVersion {
                descriptor,
                version,
            } => {
                let current = self
                    .store()?
                    .container_version(descriptor)
                    .map_err(|e| e.to_string())?;
                let Some(current) = current else {
                    return Ok(());
                };
                let proposed = parse_container_version(version)?;
                let current = parse_container_version(&current)?;
                if proposed > current {
                    Ok(())
                } else {
                    Err(format!(
                        "container version {proposed} is not newer than current version {current}"
                    ))
                }
            }
            Check::CompleteDescriptor { descriptor } => {
                if descriptor.is_complete() {
                    Ok(())
                } else {
                    Err(format!("descriptor '{descriptor}' is not complete"))
                }
            }
            Check::NoGitOrFilesystemPath { refs } => {
                let offending = join_refs(refs, |r| r.is_git_path() || r.is_file_path());
                if offending.is_empty() {
                    Ok(())
                } else {
                    Err(format!("git or filesystem path(s) not allowed here: {offending}"))
                }
            }
            Check::NoFilesystemPath { refs } => {
                let offending = join_refs(refs, PackageRef::is_file_path);
                if offending.is_empty() {
                    Ok(())
                } else {
                    Err(format!("filesystem path(s) not allowed here: {offending}"))
                }
            }
            Check::DescriptorExists { descriptors } => {
                let store = self.store()?;
                for descriptor in descriptors {
                    if !store.has_descriptor(descriptor) {
                        return Err(format!("'{descriptor}' does not exist in the store"));
                    }
                }
                Ok(())
            }
            Check::SameAppAndPlatform { descriptors } => {
                let mut iter = descriptors.iter();
                let Some(first) = iter.next() else {
                    return Ok(());
                };
                for d in iter {
                    if d.name != first.name || d.platform != first.platform {
                        return Err(format!(
                            "'{d}' does not target the same application and platform as '{first}'"
                        ));
                    }
                }
                Ok(())
            }
            Check::DescriptorDoesNotExist { descriptor } => {
                if self.store()?.has_descriptor(descriptor) {
                    Err(format!("'{descriptor}' already exists in the store"))
                } else {
                    Ok(())
                }
            }
            Check::PublishedToRegistry { refs } => {
                let missing = join_refs(refs, |r| !probe_package(self.registry, r));
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(format!("package version(s) not published to the registry: {missing}"))
                }
            }
            Check::MiniAppAbsent { refs, descriptor } => {
                let attached = self.miniapps_of(descriptor)?;
                let present =
                    join_refs(refs, |r| attached.iter().any(|m| m.same_package(r)));
                if present.is_empty() {
                    Ok(())
                } else {
                    Err(format!("MiniApp(s) already in '{descriptor}': {present}"))
                }
            }
            Check::MiniAppPresent { refs, descriptor } => {
                let attached = self.miniapps_of(descriptor)?;
                let missing =
                    join_refs(refs, |r| !attached.iter().any(|m| m.same_package(r)));
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(format!("MiniApp(s) not in '{descriptor}': {missing}"))
                }
            }
            Check::MiniAppPresentSameVersion { refs, descriptor } => {
                let attached = self.miniapps_of(descriptor)?;
                let mismatched = join_refs(refs, |r| {
                    !attached
                        .iter()
                        .any(|m| m.same_package(r) && m.version == r.version)
                });
                if mismatched.is_empty() {
                    Ok(())
                } else {
                    Err(format!(
                        "MiniApp(s) not in '{descriptor}' at this exact version: {mismatched}"
                    ))
                }
            }
            Check::MiniAppPresentDifferentVersion { refs, descriptor } => {
                let attached = self.miniapps_of(descriptor)?;
                let mismatched = join_refs(refs, |r| {
                    !attached
                        .iter()
                        .any(|m| m.same_package(r) && m.version != r.version)
                });
                if mismatched.is_empty() {
                    Ok(())
                } else {
                    Err(format!(
                        "MiniApp(s) not in '{descriptor}' with a different version: {mismatched}"
                    ))
                }
            }
            Check::DependencyAbsent { refs, descriptor } => {
                let attached = self.deps_of(descriptor)?;
                let present =
                    join_refs(refs, |r| attached.iter().any(|d| d.same_package(r)));
                if present.is_empty() {
                    Ok(())
                } else {
                    Err(format!("dependency(ies) already in '{descriptor}': {present}"))
                }
            }
            Check::DependencyPresent { refs, descriptor } => {
                let attached = self.deps_of(descriptor)?;
                let missing =
                    join_refs(refs, |r| !attached.iter().any(|d| d.same_package(r)));
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(format!("dependency(ies) not in '{descriptor}': {missing}"))
                }
            }
            Check::DependencyPresentDifferentVersion { refs, descriptor } => {
                let attached = self.deps_of(descriptor)?;
                let mismatched = join_refs(refs, |r| {
                    !attached
                        .iter()
                        .any(|d| d.same_package(r) && d.version != r.version)
                });
                if mismatched.is_empty() {
                    Ok(())
                } else {
                    Err(format!(
                        "dependency(ies) not in '{descriptor}' with a different version: {mismatched}"
                    ))
                }
            }
            Check::DependencyNotInUseByMiniApp {
                refs,
                descriptor,
                miniapp_deps,
            } => {
                for r in refs {
                    let users: Vec<String> = miniapp_deps
                        .iter()
                        .filter(|(_, deps)| deps.iter().any(|d| d.same_package(r)))
                        .map(|(miniapp, _)| miniapp.to_string())
                        .collect();
                    if !users.is_empty() {
                        return Err(format!(
                            "dependency '{r}' of '{descriptor}' is still used by MiniApp(s): {}",
                            users.join(", ")
                        ));
                    }
                }
                Ok(())
            }
            Check::ValidPackageName { name } => {
                if is_valid_package_name(name) {
                    Ok(())
                } else {
                    Err(format!("'{name}' is not a valid package name"))
                }
            }
            Check::ValidModuleName { name } => {
                if is_valid_module_name(name) {
                    Ok(())
                } else {
                    Err(format!("'{name}' is not a valid module name"))
                }
            }
        }
    }
}

fn parse_container_version(s: &str) -> Result<Version, String> {
    if !is_valid_container_version(s) {
        return Err(format!("'{s}' is not a valid container version"));
    }
    Version::parse(s).map_err(|e| format!("'{s}' is not a valid container version: {e}"))
}

fn join_refs(refs: &[PackageRef], mut offending: impl FnMut(&PackageRef) -> bool) -> String {
    refs.iter()
        .filter(|r| offending(r))
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
