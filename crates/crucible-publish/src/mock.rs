//! Deterministic collaborator implementations for tests.
//!
//! Kept in the main tree (not behind a feature) so dependent crates'
//! integration tests can drive the engine without any real generator,
//! publisher, or registry.

use crate::decision::DecisionProvider;
use crate::generator::{ContainerGenerator, GenerateRequest, GeneratedContainer};
use crate::publisher::{ContainerPublisher, PublishRequest};
use crate::registry::RegistryClient;
use crate::PublishError;
use crucible_descriptor::PackageRef;
use crucible_store::PublisherKind;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Generator that writes a fake container project (and a fake lock file)
/// into the requested output directory and records every request.
#[derive(Default)]
pub struct MockGenerator {
    fail: bool,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().expect("mock lock").clone()
    }
}

impl ContainerGenerator for MockGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<GeneratedContainer, PublishError> {
        if self.fail {
            return Err(PublishError::Generation("injected generator failure".to_owned()));
        }
        self.requests.lock().expect("mock lock").push(request.clone());

        std::fs::create_dir_all(&request.out_dir)?;
        std::fs::write(
            request.out_dir.join(".crucible-mock-container"),
            format!("container for {}", request.descriptor),
        )?;
        let lock_file = request.out_dir.join("yarn.lock");
        let mut lock_content = String::new();
        for miniapp in &request.miniapps {
            lock_content.push_str(&format!("{miniapp}\n"));
        }
        std::fs::write(&lock_file, lock_content)?;

        Ok(GeneratedContainer {
            container_dir: request.out_dir.clone(),
            lock_file: Some(lock_file),
        })
    }
}

/// Shared, ordered record of publish calls across several mock publishers.
pub type PublishJournal = Arc<Mutex<Vec<String>>>;

pub fn publish_journal() -> PublishJournal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Publisher that records calls into a journal and optionally always fails.
pub struct MockPublisher {
    kind: PublisherKind,
    fail: bool,
    journal: PublishJournal,
}

impl MockPublisher {
    pub fn new(kind: PublisherKind) -> Self {
        Self::with_journal(kind, publish_journal())
    }

    pub fn with_journal(kind: PublisherKind, journal: PublishJournal) -> Self {
        Self {
            kind,
            fail: false,
            journal,
        }
    }

    pub fn failing(kind: PublisherKind, journal: PublishJournal) -> Self {
        Self {
            kind,
            fail: true,
            journal,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.journal.lock().expect("mock lock").clone()
    }
}

impl ContainerPublisher for MockPublisher {
    fn kind(&self) -> PublisherKind {
        self.kind
    }

    fn publish(&self, request: &PublishRequest) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Publication {
                kind: self.kind.to_string(),
                url: request.url.clone(),
                reason: "injected publisher failure".to_owned(),
            });
        }
        self.journal.lock().expect("mock lock").push(format!(
            "{} {} {}",
            self.kind, request.url, request.version
        ));
        Ok(())
    }
}

/// Registry stub answering from a fixed package set, or failing every
/// lookup to exercise the probe's error-swallowing path.
#[derive(Default)]
pub struct MockRegistry {
    packages: Vec<String>,
    failure: Option<String>,
}

impl MockRegistry {
    pub fn with_packages(packages: &[&str]) -> Self {
        Self {
            packages: packages.iter().map(|p| (*p).to_owned()).collect(),
            failure: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            packages: Vec::new(),
            failure: Some(reason.to_owned()),
        }
    }
}

impl RegistryClient for MockRegistry {
    fn package_exists(&self, package: &PackageRef) -> Result<bool, PublishError> {
        if let Some(reason) = &self.failure {
            return Err(PublishError::RegistryLookup {
                package: package.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.packages.iter().any(|p| p == &package.to_string()))
    }
}

/// Decision provider answering from pre-scripted queues.
///
/// `choose_one` pops from the scripted choices; `confirm` pops from the
/// scripted answers and falls back to the caller's default when the queue
/// is empty. An empty `choose_one` script is an error so tests fail loudly
/// instead of silently picking an option.
#[derive(Default)]
pub struct ScriptedDecisions {
    choices: Mutex<VecDeque<String>>,
    multi_choices: Mutex<VecDeque<Vec<String>>>,
    confirmations: Mutex<VecDeque<bool>>,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn will_choose(self, choice: &str) -> Self {
        self.choices
            .lock()
            .expect("mock lock")
            .push_back(choice.to_owned());
        self
    }

    pub fn will_choose_many(self, choices: &[&str]) -> Self {
        self.multi_choices
            .lock()
            .expect("mock lock")
            .push_back(choices.iter().map(|c| (*c).to_owned()).collect());
        self
    }

    pub fn will_confirm(self, answer: bool) -> Self {
        self.confirmations
            .lock()
            .expect("mock lock")
            .push_back(answer);
        self
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn choose_one(&self, options: &[String], prompt: &str) -> Result<String, PublishError> {
        let choice = self
            .choices
            .lock()
            .expect("mock lock")
            .pop_front()
            .ok_or_else(|| PublishError::Decision(format!("no scripted choice for '{prompt}'")))?;
        if !options.contains(&choice) {
            return Err(PublishError::Decision(format!(
                "scripted choice '{choice}' is not among the offered options"
            )));
        }
        Ok(choice)
    }

    fn choose_many(&self, options: &[String], prompt: &str) -> Result<Vec<String>, PublishError> {
        let choices = self
            .multi_choices
            .lock()
            .expect("mock lock")
            .pop_front()
            .ok_or_else(|| PublishError::Decision(format!("no scripted choices for '{prompt}'")))?;
        for choice in &choices {
            if !options.contains(choice) {
                return Err(PublishError::Decision(format!(
                    "scripted choice '{choice}' is not among the offered options"
                )));
            }
        }
        Ok(choices)
    }

    fn confirm(&self, _prompt: &str, default: bool) -> Result<bool, PublishError> {
        Ok(self
            .confirmations
            .lock()
            .expect("mock lock")
            .pop_front()
            .unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_descriptor::{AppDescriptor, Platform};

    #[test]
    fn mock_generator_writes_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let generator = MockGenerator::new();
        let request = GenerateRequest {
            descriptor: AppDescriptor::complete("walmart", Platform::Android, "17.0.0"),
            platform: Platform::Android,
            miniapps: vec![PackageRef::versioned("movies", "1.0.0")],
            js_api_impls: Vec::new(),
            native_deps: Vec::new(),
            out_dir: dir.path().join("out"),
        };

        let generated = generator.generate(&request).unwrap();
        let lock_file = generated.lock_file.unwrap();
        let content = std::fs::read_to_string(lock_file).unwrap();
        assert!(content.contains("movies@1.0.0"));
        assert_eq!(generator.requests().len(), 1);
    }

    #[test]
    fn mock_publisher_journal_preserves_order() {
        let journal = publish_journal();
        let git = MockPublisher::with_journal(PublisherKind::Git, Arc::clone(&journal));
        let maven = MockPublisher::with_journal(PublisherKind::Maven, Arc::clone(&journal));

        let request = PublishRequest {
            container_dir: "out".into(),
            version: "1.0.0".to_owned(),
            url: "url-a".to_owned(),
            credentials: None,
        };
        git.publish(&request).unwrap();
        maven
            .publish(&PublishRequest {
                url: "url-b".to_owned(),
                ..request
            })
            .unwrap();

        let calls = journal.lock().unwrap().clone();
        assert_eq!(calls, vec!["git url-a 1.0.0", "maven url-b 1.0.0"]);
    }

    #[test]
    fn scripted_decisions_validate_choices() {
        let decisions = ScriptedDecisions::new().will_choose("b");
        let options = vec!["a".to_owned(), "b".to_owned()];
        assert_eq!(decisions.choose_one(&options, "pick").unwrap(), "b");
        // Queue exhausted: the next call errors instead of guessing.
        assert!(decisions.choose_one(&options, "pick").is_err());
    }

    #[test]
    fn scripted_confirm_falls_back_to_default() {
        let decisions = ScriptedDecisions::new().will_confirm(false);
        assert!(!decisions.confirm("continue?", true).unwrap());
        assert!(decisions.confirm("continue?", true).unwrap());
    }
}
