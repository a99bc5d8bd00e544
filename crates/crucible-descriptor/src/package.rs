use crate::DescriptorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference to a published package: a MiniApp, a native dependency, or a
/// JS API implementation.
///
/// String form is `name@version` or just `name`; scoped names
/// (`@scope/name@version`) are supported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: Option<String>,
}

impl PackageRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn versioned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// True when the reference points at a source-control location rather
    /// than a registry package.
    pub fn is_git_path(&self) -> bool {
        self.name.starts_with("git+")
            || self.name.starts_with("git://")
            || ((self.name.starts_with("https://") || self.name.starts_with("ssh://"))
                && self.name.ends_with(".git"))
    }

    /// True when the reference points at a local filesystem location.
    pub fn is_file_path(&self) -> bool {
        self.name.starts_with("file:")
            || self.name.starts_with('/')
            || self.name.starts_with("./")
            || self.name.starts_with("../")
    }

    /// Same package, regardless of version.
    pub fn same_package(&self, other: &PackageRef) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{version}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for PackageRef {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DescriptorError::MalformedPackage(s.to_owned()));
        }
        // Skip a leading '@' so scoped names keep their scope marker.
        let split_at = s[1..].rfind('@').map(|i| i + 1);
        match split_at {
            Some(i) => {
                let (name, version) = (&s[..i], &s[i + 1..]);
                if name.is_empty() || version.is_empty() {
                    return Err(DescriptorError::MalformedPackage(s.to_owned()));
                }
                Ok(Self::versioned(name, version))
            }
            None => Ok(Self::new(s)),
        }
    }
}
