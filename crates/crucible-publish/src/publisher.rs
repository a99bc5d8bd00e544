use crate::PublishError;
use crucible_store::{Credentials, PublisherKind};
use std::path::PathBuf;

/// One publication of a generated container to one external target.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub container_dir: PathBuf,
    pub version: String,
    pub url: String,
    pub credentials: Option<Credentials>,
}

/// External publisher collaborator: a git host, or one of the package
/// registry flavors.
pub trait ContainerPublisher {
    fn kind(&self) -> PublisherKind;

    fn publish(&self, request: &PublishRequest) -> Result<(), PublishError>;
}

impl std::fmt::Debug for dyn ContainerPublisher + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerPublisher")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Dispatch table from publisher kind to implementation.
///
/// A version node's generator configuration names publishers by kind; the
/// orchestrator resolves each entry through this set, in configuration
/// order. A kind with no registered publisher is a configuration error.
#[derive(Default)]
pub struct PublisherSet {
    publishers: Vec<Box<dyn ContainerPublisher>>,
}

impl PublisherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, publisher: Box<dyn ContainerPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn get(&self, kind: PublisherKind) -> Result<&dyn ContainerPublisher, PublishError> {
        self.publishers
            .iter()
            .map(AsRef::as_ref)
            .find(|p| p.kind() == kind)
            .ok_or_else(|| PublishError::NoPublisherForKind(kind.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPublisher;

    #[test]
    fn lookup_by_kind() {
        let set = PublisherSet::new()
            .register(Box::new(MockPublisher::new(PublisherKind::Git)))
            .register(Box::new(MockPublisher::new(PublisherKind::Maven)));
        assert_eq!(set.get(PublisherKind::Maven).unwrap().kind(), PublisherKind::Maven);
        assert!(matches!(
            set.get(PublisherKind::Jcenter).unwrap_err(),
            PublishError::NoPublisherForKind(kind) if kind == "jcenter"
        ));
    }
}
