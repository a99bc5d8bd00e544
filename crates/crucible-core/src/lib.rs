//! Validation engine and container publication orchestrator for Crucible.
//!
//! This crate ties the descriptor, store, and publication layers together:
//! `ValidationEngine` runs an ordered battery of named precondition checks
//! before any mutation is attempted, and `Publication` drives the
//! compute-version → generate → publish → persist workflow inside a store
//! transaction.

pub mod engine;
pub mod validate;

pub use engine::{
    choose_descriptor, choose_descriptors, descriptors_matching_range,
    next_container_version, package_name_conflict_check, Publication, PublicationOptions,
    CONTAINER_LOCK_KEY,
};
pub use validate::{
    is_valid_module_name, is_valid_package_name, module_name_has_suffix, Check, CheckRequest,
    ModuleKind, ValidationEngine,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("descriptor error: {0}")]
    Descriptor(#[from] crucible_descriptor::DescriptorError),
    #[error("store error: {0}")]
    Store(#[from] crucible_store::StoreError),
    #[error("publication error: {0}")]
    Publish(#[from] crucible_publish::PublishError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("validation failed [{check}]: {detail}")]
    Validation { check: &'static str, detail: String },
    #[error("{source}; store state was rolled back, but external publish targets may have been partially updated")]
    ExternalSideEffects {
        #[source]
        source: Box<CoreError>,
    },
    #[error("descriptor '{0}' does not name a platform")]
    MissingPlatform(String),
    #[error("no application version matching the requested criteria in the store")]
    NoMatchingVersions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_check_and_detail() {
        let e = CoreError::Validation {
            check: "complete-descriptor",
            detail: "'walmart:android' is missing a version".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("complete-descriptor"));
        assert!(msg.contains("walmart:android"));
    }

    #[test]
    fn external_side_effects_wrapper_states_the_limitation() {
        let inner = CoreError::Publish(crucible_publish::PublishError::Generation(
            "boom".to_owned(),
        ));
        let e = CoreError::ExternalSideEffects {
            source: Box::new(inner),
        };
        let msg = e.to_string();
        assert!(msg.contains("rolled back"));
        assert!(msg.contains("partially updated"));
        assert!(msg.contains("boom"));
    }
}
