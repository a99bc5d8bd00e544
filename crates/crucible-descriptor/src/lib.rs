//! Release descriptor parsing, package references, and version normalization for Crucible.
//!
//! This crate defines the identifier layer: `AppDescriptor` for naming an
//! application release (optionally scoped to platform and version),
//! `PackageRef` for MiniApp / native dependency / JS API implementation
//! identifiers, and best-effort normalization of raw version strings into
//! comparable semantic versions (`normalize_to_semver`, `matching_versions`).

pub mod descriptor;
pub mod normalize;
pub mod package;

pub use descriptor::{AppDescriptor, Platform};
pub use normalize::{
    increment_patch, is_valid_container_version, matching_versions, normalize_to_semver,
};
pub use package::PackageRef;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("malformed descriptor '{0}': application name is required")]
    Malformed(String),
    #[error("malformed descriptor '{0}': at most name:platform:version")]
    TooManyParts(String),
    #[error("unknown platform '{0}': expected 'android' or 'ios'")]
    UnknownPlatform(String),
    #[error("malformed package reference '{0}'")]
    MalformedPackage(String),
    #[error("invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },
    #[error("invalid container version '{0}': expected major.minor.patch")]
    InvalidContainerVersion(String),
}
