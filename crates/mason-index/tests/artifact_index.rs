use std::path::{Path, PathBuf};

use mason_core::ArtifactCoordinate;
use mason_index::{
    ArtifactQuery, ContextState, IndexDelta, IndexError, IndexRegistry, QueryField,
    RemoteIndexTransport, TransportError, UpdateSettings, MAX_CLAUSE_COUNT,
};
use mason_scheduler::{CancellationToken, Progress, Scheduler, SchedulerConfig};

fn progress() -> Progress {
    let scheduler = Scheduler::new(SchedulerConfig {
        worker_threads: 1,
        progress_channel_capacity: 16,
    });
    scheduler.progress().start("test")
}

fn write_artifact(repo: &Path, group_id: &str, artifact_id: &str, version: &str) -> PathBuf {
    let path = repo.join(
        ArtifactCoordinate::new(group_id, artifact_id, version).repository_path(),
    );
    std::fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    std::fs::write(&path, b"jar-bytes").expect("write artifact");
    path
}

#[test]
fn create_requires_exactly_one_backing() {
    let registry = IndexRegistry::new();

    let err = registry
        .create_index("central", "central", None, None)
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidContext { .. }));

    let err = registry
        .create_index(
            "central",
            "central",
            Some(PathBuf::from("/repo")),
            Some("https://repo.example/maven2".to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidContext { .. }));
}

#[test]
fn scan_then_search_finds_indexed_artifacts() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_artifact(temp.path(), "org.slf4j", "slf4j-api", "2.0.9");
    write_artifact(temp.path(), "org.slf4j", "slf4j-simple", "2.0.9");
    // Noise that must not be indexed.
    std::fs::write(temp.path().join("stray.txt"), b"").expect("write noise");

    let registry = IndexRegistry::new();
    let handle = registry
        .create_index("local", "local", Some(temp.path().to_path_buf()), None)
        .expect("create");

    let discovered = registry
        .scan(handle, &CancellationToken::new(), &progress())
        .expect("scan");
    assert_eq!(discovered, 2);

    let results = registry
        .search(
            handle,
            &ArtifactQuery::coordinates("org.slf4j", "slf4j-api"),
            10,
        )
        .expect("search");
    assert_eq!(results.len(), 1);
    let found = results.into_iter().next().expect("one result");
    assert_eq!(found.version, "2.0.9");

    let context = registry.context(handle).expect("context");
    assert_eq!(context.state(), ContextState::Idle);
}

#[test]
fn add_artifact_round_trip_and_unrecognized_null() {
    let temp = tempfile::tempdir().expect("temp dir");
    let jar = write_artifact(temp.path(), "com.example", "app", "1.0");

    let registry = IndexRegistry::new();
    let handle = registry
        .create_index("local", "local", Some(temp.path().to_path_buf()), None)
        .expect("create");

    let coordinate = registry
        .add_artifact(handle, &jar)
        .expect("add")
        .expect("recognized");
    assert_eq!(coordinate, ArtifactCoordinate::new("com.example", "app", "1.0"));

    let results = registry
        .search(handle, &ArtifactQuery::coordinates("com.example", "app"), 10)
        .expect("search");
    assert_eq!(results.into_iter().next(), Some(coordinate));

    // An unrecognized file returns null and leaves the index unchanged.
    let stray = temp.path().join("not-an-artifact.txt");
    std::fs::write(&stray, b"").expect("write stray");
    assert_eq!(registry.add_artifact(handle, &stray).expect("add"), None);

    let mut total = 0usize;
    registry
        .process_artifacts(handle, 100, |chunk| total += chunk.len())
        .expect("enumerate");
    assert_eq!(total, 1);
}

#[test]
fn wildcard_explosion_returns_empty_not_error() {
    let temp = tempfile::tempdir().expect("temp dir");
    let registry = IndexRegistry::new();
    let handle = registry
        .create_index("local", "local", Some(temp.path().to_path_buf()), None)
        .expect("create");

    for i in 0..(MAX_CLAUSE_COUNT + 1) {
        let jar = write_artifact(temp.path(), "com.example", &format!("artifact-{i}"), "1.0");
        registry.add_artifact(handle, &jar).expect("add");
    }

    let results = registry
        .search(
            handle,
            &ArtifactQuery::term(QueryField::ArtifactId, "artifact-*"),
            10,
        )
        .expect("search must not fail");
    assert!(results.is_empty());
}

#[test]
fn release_twice_is_an_error() {
    let registry = IndexRegistry::new();
    let handle = registry
        .create_index("local", "local", Some(PathBuf::from("/repo")), None)
        .expect("create");

    registry.release_index(handle).expect("first release");
    let err = registry.release_index(handle).unwrap_err();
    assert!(matches!(err, IndexError::UnknownHandle { .. }));
}

#[test]
fn handles_are_not_reused_after_release() {
    let registry = IndexRegistry::new();
    let first = registry
        .create_index("a", "a", Some(PathBuf::from("/repo-a")), None)
        .expect("create");
    registry.release_index(first).expect("release");

    let second = registry
        .create_index("b", "b", Some(PathBuf::from("/repo-b")), None)
        .expect("create");
    assert_ne!(first, second);
}

#[test]
fn cancelled_scan_reports_cancelled_and_returns_to_idle() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_artifact(temp.path(), "com.example", "app", "1.0");

    let registry = IndexRegistry::new();
    let handle = registry
        .create_index("local", "local", Some(temp.path().to_path_buf()), None)
        .expect("create");

    let token = CancellationToken::new();
    token.cancel();
    let err = registry.scan(handle, &token, &progress()).unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));

    let context = registry.context(handle).expect("context");
    assert_eq!(context.state(), ContextState::Idle);
}

struct FixedDelta(IndexDelta);

impl RemoteIndexTransport for FixedDelta {
    fn fetch_delta(
        &self,
        _url: &str,
        _settings: &UpdateSettings,
        _since_generation: u64,
        _token: &CancellationToken,
    ) -> Result<IndexDelta, TransportError> {
        Ok(self.0.clone())
    }
}

struct FailingTransport(bool);

impl RemoteIndexTransport for FailingTransport {
    fn fetch_delta(
        &self,
        _url: &str,
        _settings: &UpdateSettings,
        _since_generation: u64,
        _token: &CancellationToken,
    ) -> Result<IndexDelta, TransportError> {
        if self.0 {
            Err(TransportError::Aborted)
        } else {
            Err(TransportError::Network {
                message: "connection reset".to_string(),
            })
        }
    }
}

#[test]
fn remote_update_applies_delta() {
    let registry = IndexRegistry::new();
    let handle = registry
        .create_index(
            "central",
            "central",
            None,
            Some("https://repo.example/maven2".to_string()),
        )
        .expect("create");

    let delta = IndexDelta {
        replace_all: false,
        added: vec![
            ArtifactCoordinate::new("org.slf4j", "slf4j-api", "2.0.9"),
            ArtifactCoordinate::new("org.slf4j", "slf4j-api", "2.0.10"),
        ],
        removed: Vec::new(),
    };
    registry
        .update(
            handle,
            &FixedDelta(delta),
            &UpdateSettings::default(),
            &CancellationToken::new(),
            &progress(),
        )
        .expect("update");

    let results = registry
        .search(handle, &ArtifactQuery::coordinates("org.slf4j", "slf4j-api"), 10)
        .expect("search");
    assert_eq!(results.len(), 2);

    // A follow-up delta can remove entries.
    let delta = IndexDelta {
        replace_all: false,
        added: Vec::new(),
        removed: vec![ArtifactCoordinate::new("org.slf4j", "slf4j-api", "2.0.9")],
    };
    registry
        .update(
            handle,
            &FixedDelta(delta),
            &UpdateSettings::default(),
            &CancellationToken::new(),
            &progress(),
        )
        .expect("update");
    let results = registry
        .search(handle, &ArtifactQuery::coordinates("org.slf4j", "slf4j-api"), 10)
        .expect("search");
    assert_eq!(results.len(), 1);
}

#[test]
fn transport_failures_are_classified() {
    let registry = IndexRegistry::new();
    let handle = registry
        .create_index(
            "central",
            "central",
            None,
            Some("https://repo.example/maven2".to_string()),
        )
        .expect("create");

    let err = registry
        .update(
            handle,
            &FailingTransport(false),
            &UpdateSettings::default(),
            &CancellationToken::new(),
            &progress(),
        )
        .unwrap_err();
    assert!(matches!(err, IndexError::Transport { .. }));

    // A transport-level abort is a cancelled outcome, not a transport error.
    let err = registry
        .update(
            handle,
            &FailingTransport(true),
            &UpdateSettings::default(),
            &CancellationToken::new(),
            &progress(),
        )
        .unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));

    // Either way the context survives and stays usable.
    assert_eq!(
        registry.context(handle).expect("context").state(),
        ContextState::Idle
    );
}

#[test]
fn scan_requires_local_and_update_requires_remote() {
    let registry = IndexRegistry::new();
    let remote = registry
        .create_index(
            "central",
            "central",
            None,
            Some("https://repo.example/maven2".to_string()),
        )
        .expect("create");
    let err = registry
        .scan(remote, &CancellationToken::new(), &progress())
        .unwrap_err();
    assert!(matches!(err, IndexError::NotLocal));

    let temp = tempfile::tempdir().expect("temp dir");
    let local = registry
        .create_index("local", "local", Some(temp.path().to_path_buf()), None)
        .expect("create");
    let err = registry
        .update(
            local,
            &FixedDelta(IndexDelta::default()),
            &UpdateSettings::default(),
            &CancellationToken::new(),
            &progress(),
        )
        .unwrap_err();
    assert!(matches!(err, IndexError::NotRemote));
}
