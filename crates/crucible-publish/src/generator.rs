use crate::PublishError;
use crucible_descriptor::{AppDescriptor, PackageRef, Platform};
use std::path::PathBuf;

/// Everything the generator needs to produce a composite container for one
/// application version.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub descriptor: AppDescriptor,
    pub platform: Platform,
    pub miniapps: Vec<PackageRef>,
    pub js_api_impls: Vec<PackageRef>,
    pub native_deps: Vec<PackageRef>,
    pub out_dir: PathBuf,
}

/// Output of a successful generation run.
#[derive(Debug, Clone)]
pub struct GeneratedContainer {
    /// Directory holding the generated container project.
    pub container_dir: PathBuf,
    /// Lock file capturing the exact JS dependency resolution used for the
    /// composite bundle, when the generator produced one.
    pub lock_file: Option<PathBuf>,
}

/// External artifact-generation collaborator. Concrete code generation
/// (templates, build toolchains) lives behind this seam.
pub trait ContainerGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<GeneratedContainer, PublishError>;
}
