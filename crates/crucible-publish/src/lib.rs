//! External collaborator interfaces for Crucible container publication.
//!
//! The core engine only ever talks to the outside world through the traits
//! defined here: `ContainerGenerator` produces the composite build artifact,
//! `ContainerPublisher` pushes it to a git host or package registry,
//! `RegistryClient` probes package registries, and `DecisionProvider`
//! replaces interactive prompts so operations stay deterministic under test.
//! The `mock` module provides scriptable implementations of all of them.

pub mod decision;
pub mod generator;
pub mod mock;
pub mod publisher;
pub mod registry;

pub use decision::DecisionProvider;
pub use generator::{ContainerGenerator, GenerateRequest, GeneratedContainer};
pub use publisher::{ContainerPublisher, PublishRequest, PublisherSet};
pub use registry::{probe_package, RegistryClient};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("container generation failed: {0}")]
    Generation(String),
    #[error("publisher '{kind}' failed for {url}: {reason}")]
    Publication {
        kind: String,
        url: String,
        reason: String,
    },
    #[error("no publisher registered for kind '{0}'")]
    NoPublisherForKind(String),
    #[error("registry lookup failed for '{package}': {reason}")]
    RegistryLookup { package: String, reason: String },
    #[error("decision provider failed: {0}")]
    Decision(String),
}
