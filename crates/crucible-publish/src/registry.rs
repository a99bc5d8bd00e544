use crate::PublishError;
use crucible_descriptor::PackageRef;
use tracing::debug;

/// Read-only package registry lookups.
pub trait RegistryClient {
    /// Whether `package` (at its version, when one is given) exists in the
    /// registry.
    fn package_exists(&self, package: &PackageRef) -> Result<bool, PublishError>;
}

/// Existence probe that treats any lookup failure as "package does not
/// exist".
///
/// A registry that is unreachable or returns a malformed response must not
/// abort the enclosing operation, so the error is swallowed here rather
/// than propagated. This is the one place in the system where an error is
/// deliberately not surfaced.
pub fn probe_package(client: &dyn RegistryClient, package: &PackageRef) -> bool {
    match client.package_exists(package) {
        Ok(exists) => exists,
        Err(e) => {
            debug!("registry probe for '{package}' failed ({e}); treating as absent");
            false
        }
    }
}
