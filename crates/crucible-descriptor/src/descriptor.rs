use crate::DescriptorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mobile platform a release targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => write!(f, "android"),
            Platform::Ios => write!(f, "ios"),
        }
    }
}

impl FromStr for Platform {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(DescriptorError::UnknownPlatform(other.to_owned())),
        }
    }
}

/// Identifier of an application release, optionally scoped to platform and version.
///
/// String form is `name:platform:version` with trailing parts omittable:
/// `walmart`, `walmart:android`, and `walmart:android:17.0.0` are all valid.
/// A descriptor is *complete* when all three parts are present; partial
/// descriptors are used as query patterns against the store.
///
/// Round-trip invariant: `AppDescriptor::from_str(&d.to_string()) == Ok(d)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub name: String,
    pub platform: Option<Platform>,
    pub version: Option<String>,
}

impl AppDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: None,
            version: None,
        }
    }

    pub fn with_platform(name: impl Into<String>, platform: Platform) -> Self {
        Self {
            name: name.into(),
            platform: Some(platform),
            version: None,
        }
    }

    pub fn complete(
        name: impl Into<String>,
        platform: Platform,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            platform: Some(platform),
            version: Some(version.into()),
        }
    }

    /// A descriptor is complete when name, platform, and version are all present.
    pub fn is_complete(&self) -> bool {
        self.platform.is_some() && self.version.is_some()
    }

    /// Copy of this descriptor with the version replaced.
    pub fn at_version(&self, version: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            platform: self.platform,
            version: Some(version.into()),
        }
    }
}

impl fmt::Display for AppDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(platform) = self.platform {
            write!(f, ":{platform}")?;
        }
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

impl FromStr for AppDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(DescriptorError::Malformed(s.to_owned()));
        }
        let platform = parts.next().map(Platform::from_str).transpose()?;
        let version = parts.next().map(str::to_owned);
        if parts.next().is_some() {
            return Err(DescriptorError::TooManyParts(s.to_owned()));
        }
        Ok(Self {
            name: name.to_owned(),
            platform,
            version,
        })
    }
}
