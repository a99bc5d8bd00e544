//! End-to-end publication workflow tests driving the orchestrator with
//! mock collaborators over an in-memory store medium.

use crucible_core::{
    next_container_version, Check, CoreError, Publication, PublicationOptions, ValidationEngine,
    CONTAINER_LOCK_KEY,
};
use crucible_descriptor::{AppDescriptor, PackageRef, Platform};
use crucible_publish::mock::{publish_journal, MockGenerator, MockPublisher, MockRegistry};
use crucible_publish::PublisherSet;
use crucible_store::{
    AppEntry, GeneratorConfig, LockRef, MemoryMedium, PlatformEntry, PublisherKind, PublisherSpec,
    StoreSnapshot, TransactionManager, VersionNode, VersionStore,
};
use std::path::Path;
use std::sync::Arc;

fn descriptor() -> AppDescriptor {
    AppDescriptor::complete("walmart", Platform::Android, "17.0.0")
}

fn publisher_spec(kind: PublisherKind, url: &str) -> PublisherSpec {
    PublisherSpec {
        kind,
        url: url.to_owned(),
        credentials: None,
    }
}

fn seeded_medium() -> MemoryMedium {
    let mut node = VersionNode::new("17.0.0");
    node.generator = Some(GeneratorConfig {
        publishers: vec![
            publisher_spec(PublisherKind::Git, "git@github.com:walmart/container.git"),
            publisher_spec(PublisherKind::Maven, "https://repo.example.com/releases"),
        ],
    });
    MemoryMedium::with_snapshot(StoreSnapshot {
        apps: vec![AppEntry {
            name: "walmart".to_owned(),
            platforms: vec![PlatformEntry {
                platform: Platform::Android,
                versions: vec![node],
            }],
        }],
    })
}

fn manager_over(medium: &MemoryMedium) -> TransactionManager {
    TransactionManager::new(VersionStore::open(Box::new(medium.clone())).unwrap())
}

fn options(out_root: &Path) -> PublicationOptions {
    PublicationOptions {
        container_version: None,
        out_root: out_root.to_owned(),
    }
}

#[test]
fn successful_publication_persists_version_and_lock_ref() {
    let medium = seeded_medium();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();

    let generator = MockGenerator::new();
    let journal = publish_journal();
    let publishers = PublisherSet::new()
        .register(Box::new(MockPublisher::with_journal(
            PublisherKind::Git,
            Arc::clone(&journal),
        )))
        .register(Box::new(MockPublisher::with_journal(
            PublisherKind::Maven,
            Arc::clone(&journal),
        )));
    let publication = Publication::new(&generator, &publishers);

    let d = descriptor();
    publication
        .update_container_state(
            &mut tm,
            &d,
            &["add movies MiniApp".to_owned()],
            &options(out.path()),
            |store| {
                store.add_miniapp(&d, PackageRef::versioned("movies", "1.0.0"))?;
                Ok(())
            },
        )
        .unwrap();

    // Publishers ran in configuration order with the computed version.
    assert_eq!(
        journal.lock().unwrap().clone(),
        vec![
            "git git@github.com:walmart/container.git 1.0.0",
            "maven https://repo.example.com/releases 1.0.0",
        ]
    );

    // The durable snapshot carries the body's mutation, the new container
    // version, and a lock ref hashed over the generated lock file (which
    // itself reflects the MiniApp added by the body).
    let persisted = medium.persisted();
    let node = persisted.find_version(&d).unwrap();
    assert_eq!(node.miniapps, vec![PackageRef::versioned("movies", "1.0.0")]);
    assert_eq!(node.container_version.as_deref(), Some("1.0.0"));
    assert_eq!(
        node.lock_refs[CONTAINER_LOCK_KEY],
        LockRef::from_content(CONTAINER_LOCK_KEY, b"movies@1.0.0\n")
    );
    assert_eq!(medium.tags(), vec!["add movies MiniApp"]);
    assert!(!tm.in_transaction());

    // Generation saw the working copy, not the pre-transaction snapshot.
    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].miniapps.len(), 1);
    assert_eq!(requests[0].out_dir, out.path().join("android"));
}

#[test]
fn repeat_publication_increments_patch_component() {
    let medium = seeded_medium();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();

    let generator = MockGenerator::new();
    let publishers = PublisherSet::new()
        .register(Box::new(MockPublisher::new(PublisherKind::Git)))
        .register(Box::new(MockPublisher::new(PublisherKind::Maven)));
    let publication = Publication::new(&generator, &publishers);
    let d = descriptor();

    for expected in ["1.0.0", "1.0.1", "1.0.2"] {
        assert_eq!(
            next_container_version(tm.store(), &d, None).unwrap(),
            expected
        );
        publication
            .update_container_state(&mut tm, &d, &[], &options(out.path()), |_| Ok(()))
            .unwrap();
        assert_eq!(
            tm.store().container_version(&d).unwrap().as_deref(),
            Some(expected)
        );
    }
}

#[test]
fn explicit_container_version_is_used_verbatim() {
    let medium = seeded_medium();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();

    let generator = MockGenerator::new();
    let publishers = PublisherSet::new()
        .register(Box::new(MockPublisher::new(PublisherKind::Git)))
        .register(Box::new(MockPublisher::new(PublisherKind::Maven)));
    let publication = Publication::new(&generator, &publishers);
    let d = descriptor();

    publication
        .update_container_state(
            &mut tm,
            &d,
            &[],
            &PublicationOptions {
                container_version: Some("4.2.0".to_owned()),
                out_root: out.path().to_owned(),
            },
            |_| Ok(()),
        )
        .unwrap();
    assert_eq!(
        medium
            .persisted()
            .find_version(&d)
            .unwrap()
            .container_version
            .as_deref(),
        Some("4.2.0")
    );
}

#[test]
fn publisher_failure_rolls_back_store_but_reports_side_effects() {
    let medium = seeded_medium();
    let before = medium.persisted();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();

    let generator = MockGenerator::new();
    let journal = publish_journal();
    // Git succeeds, maven fails: an external target has already been
    // touched when the run aborts.
    let publishers = PublisherSet::new()
        .register(Box::new(MockPublisher::with_journal(
            PublisherKind::Git,
            Arc::clone(&journal),
        )))
        .register(Box::new(MockPublisher::failing(
            PublisherKind::Maven,
            Arc::clone(&journal),
        )));
    let publication = Publication::new(&generator, &publishers);

    let d = descriptor();
    let err = publication
        .update_container_state(&mut tm, &d, &[], &options(out.path()), |store| {
            store.add_miniapp(&d, PackageRef::versioned("movies", "1.0.0"))?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, CoreError::ExternalSideEffects { .. }));
    assert!(err.to_string().contains("partially updated"));

    // The git push happened, the store did not move.
    assert_eq!(
        journal.lock().unwrap().clone(),
        vec!["git git@github.com:walmart/container.git 1.0.0"]
    );
    assert_eq!(medium.persisted(), before);
    assert!(!tm.in_transaction());
    assert!(tm.store().miniapps(&d).unwrap().is_empty());
}

#[test]
fn generator_failure_rolls_back_store() {
    let medium = seeded_medium();
    let before = medium.persisted();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();

    let generator = MockGenerator::failing();
    let publishers = PublisherSet::new();
    let publication = Publication::new(&generator, &publishers);

    let d = descriptor();
    let err = publication
        .update_container_state(&mut tm, &d, &[], &options(out.path()), |store| {
            store.add_miniapp(&d, PackageRef::versioned("movies", "1.0.0"))?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, CoreError::ExternalSideEffects { .. }));
    assert_eq!(medium.persisted(), before);
    assert!(tm.store().miniapps(&d).unwrap().is_empty());
}

#[test]
fn body_error_propagates_unwrapped() {
    let medium = seeded_medium();
    let before = medium.persisted();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();

    let generator = MockGenerator::new();
    let publishers = PublisherSet::new();
    let publication = Publication::new(&generator, &publishers);

    let d = descriptor();
    let err = publication
        .update_container_state(&mut tm, &d, &[], &options(out.path()), |_| {
            Err::<(), _>(CoreError::Validation {
                check: "miniapp-present-in-version",
                detail: "MiniApp(s) not in 'walmart:android:17.0.0': movies".to_owned(),
            })
        })
        .unwrap_err();

    // Nothing external ran, so no side-effect wrapper.
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(generator.requests().is_empty());
    assert_eq!(medium.persisted(), before);
}

#[test]
fn missing_publisher_kind_aborts_the_run() {
    let medium = seeded_medium();
    let before = medium.persisted();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();

    let generator = MockGenerator::new();
    // Config names git and maven but only git is registered.
    let publishers =
        PublisherSet::new().register(Box::new(MockPublisher::new(PublisherKind::Git)));
    let publication = Publication::new(&generator, &publishers);

    let err = publication
        .update_container_state(&mut tm, &descriptor(), &[], &options(out.path()), |_| Ok(()))
        .unwrap_err();
    assert!(err.to_string().contains("maven"));
    assert_eq!(medium.persisted(), before);
}

#[test]
fn publication_rejects_descriptor_without_platform() {
    let medium = seeded_medium();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();

    let generator = MockGenerator::new();
    let publishers = PublisherSet::new();
    let publication = Publication::new(&generator, &publishers);

    let err = publication
        .update_container_state(
            &mut tm,
            &AppDescriptor::new("walmart"),
            &[],
            &options(out.path()),
            |_| Ok(()),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::MissingPlatform(_)));
    assert!(!tm.in_transaction());
}

#[test]
fn concurrent_transaction_blocks_publication() {
    let medium = seeded_medium();
    let mut tm = manager_over(&medium);
    let out = tempfile::tempdir().unwrap();
    tm.begin().unwrap();

    let generator = MockGenerator::new();
    let publishers = PublisherSet::new();
    let publication = Publication::new(&generator, &publishers);

    let err = publication
        .update_container_state(&mut tm, &descriptor(), &[], &options(out.path()), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Store(crucible_store::StoreError::TransactionAlreadyActive)
    ));
    // The pre-existing transaction is untouched.
    assert!(tm.in_transaction());
}

#[test]
fn validation_gates_the_publication_workflow() {
    let medium = seeded_medium();
    let mut tm = manager_over(&medium);
    let registry = MockRegistry::with_packages(&["movies@1.0.0"]);

    // The happy gate passes, then the workflow runs.
    let engine = ValidationEngine::new(tm.store(), &registry);
    engine
        .run(vec![
            Check::CompleteDescriptor {
                descriptor: descriptor(),
            }
            .into(),
            Check::PublishedToRegistry {
                refs: vec![PackageRef::versioned("movies", "1.0.0")],
            }
            .into(),
            Check::MiniAppAbsent {
                refs: vec![PackageRef::versioned("movies", "1.0.0")],
                descriptor: descriptor(),
            }
            .into(),
        ])
        .unwrap();

    let out = tempfile::tempdir().unwrap();
    let generator = MockGenerator::new();
    let publishers = PublisherSet::new()
        .register(Box::new(MockPublisher::new(PublisherKind::Git)))
        .register(Box::new(MockPublisher::new(PublisherKind::Maven)));
    let publication = Publication::new(&generator, &publishers);
    let d = descriptor();
    publication
        .update_container_state(&mut tm, &d, &[], &options(out.path()), |store| {
            store.add_miniapp(&d, PackageRef::versioned("movies", "1.0.0"))?;
            Ok(())
        })
        .unwrap();

    // Re-running the absence gate now fails before any publication work.
    let engine = ValidationEngine::new(tm.store(), &registry);
    let err = engine
        .run(vec![Check::MiniAppAbsent {
            refs: vec![PackageRef::versioned("movies", "1.0.0")],
            descriptor: descriptor(),
        }
        .into()])
        .unwrap_err();
    match err {
        CoreError::Validation { check, .. } => assert_eq!(check, "miniapp-absent-from-version"),
        other => panic!("unexpected error: {other}"),
    }
}
