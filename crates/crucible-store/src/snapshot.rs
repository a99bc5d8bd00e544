use crucible_descriptor::{AppDescriptor, PackageRef, Platform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Publisher target flavor. `Git` pushes the container to a git host;
/// `Maven` and `Jcenter` upload it to the matching artifact registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    Git,
    Maven,
    Jcenter,
}

impl std::fmt::Display for PublisherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublisherKind::Git => write!(f, "git"),
            PublisherKind::Maven => write!(f, "maven"),
            PublisherKind::Jcenter => write!(f, "jcenter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// One publish target in a version node's generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherSpec {
    pub kind: PublisherKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// Container generator configuration: an ordered list of publish targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub publishers: Vec<PublisherSpec>,
}

/// Named lock-file capture: the key under which it was recorded plus a
/// blake3 hash of the captured content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRef {
    pub id: String,
    pub content_hash: String,
}

impl LockRef {
    pub fn from_content(id: impl Into<String>, content: &[u8]) -> Self {
        Self {
            id: id.into(),
            content_hash: blake3::hash(content).to_hex().to_string(),
        }
    }
}

/// One application version on one platform.
///
/// The `version` string is kept verbatim as supplied when the version was
/// added; it is never rewritten into a normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionNode {
    pub version: String,
    #[serde(default)]
    pub is_released: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_version: Option<String>,
    #[serde(default)]
    pub native_deps: Vec<PackageRef>,
    #[serde(default)]
    pub miniapps: Vec<PackageRef>,
    #[serde(default)]
    pub js_api_impls: Vec<PackageRef>,
    #[serde(default)]
    pub lock_refs: BTreeMap<String, LockRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorConfig>,
}

impl VersionNode {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            is_released: false,
            container_version: None,
            native_deps: Vec::new(),
            miniapps: Vec::new(),
            js_api_impls: Vec::new(),
            lock_refs: BTreeMap::new(),
            generator: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    pub platform: Platform,
    pub versions: Vec<VersionNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub platforms: Vec<PlatformEntry>,
}

/// The full store state: every application, platform, and version node.
///
/// All collections are `Vec`s so that enumeration order is insertion order;
/// range matching and descriptor listings rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub apps: Vec<AppEntry>,
}

impl StoreSnapshot {
    pub fn find_app(&self, name: &str) -> Option<&AppEntry> {
        self.apps.iter().find(|a| a.name == name)
    }

    pub fn find_platform(&self, name: &str, platform: Platform) -> Option<&PlatformEntry> {
        self.find_app(name)?
            .platforms
            .iter()
            .find(|p| p.platform == platform)
    }

    /// Look up the version node a complete descriptor points at.
    pub fn find_version(&self, descriptor: &AppDescriptor) -> Option<&VersionNode> {
        let platform = descriptor.platform?;
        let version = descriptor.version.as_deref()?;
        self.find_platform(&descriptor.name, platform)?
            .versions
            .iter()
            .find(|v| v.version == version)
    }

    pub fn find_version_mut(&mut self, descriptor: &AppDescriptor) -> Option<&mut VersionNode> {
        let platform = descriptor.platform?;
        let version = descriptor.version.as_deref()?;
        self.apps
            .iter_mut()
            .find(|a| a.name == descriptor.name)?
            .platforms
            .iter_mut()
            .find(|p| p.platform == platform)?
            .versions
            .iter_mut()
            .find(|v| v.version == version)
    }

    /// Whether any node matches the descriptor, treating partial descriptors
    /// as query patterns (`name` matches any platform, `name:platform` any
    /// version).
    pub fn matches(&self, descriptor: &AppDescriptor) -> bool {
        let Some(app) = self.find_app(&descriptor.name) else {
            return false;
        };
        let Some(platform) = descriptor.platform else {
            return true;
        };
        let Some(entry) = app.platforms.iter().find(|p| p.platform == platform) else {
            return false;
        };
        match descriptor.version.as_deref() {
            Some(version) => entry.versions.iter().any(|v| v.version == version),
            None => true,
        }
    }
}
