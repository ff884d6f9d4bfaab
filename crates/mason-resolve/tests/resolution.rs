use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mason_core::{ArtifactCoordinate, ExecutionResult, Repository, ResolvedArtifact};
use mason_model::ExplicitProfileSelection;
use mason_resolve::{
    GoalExecutionReport, LocalRepositoryResolver, ModelResolver, NativeProjectHandle,
    ResolutionFacade, ResolverError, WorkspaceEnvironment,
};
use mason_scheduler::CancellationToken;

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(path, contents).expect("write file");
}

/// Fake resolver that counts per-coordinate resolve calls and echoes a
/// closure containing duplicates, so dedup is observable.
#[derive(Default)]
struct CountingResolver {
    calls: Mutex<HashMap<ArtifactCoordinate, usize>>,
    missing: BTreeSet<ArtifactCoordinate>,
}

impl CountingResolver {
    fn calls_for(&self, coordinate: &ArtifactCoordinate) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(coordinate)
            .copied()
            .unwrap_or(0)
    }
}

impl ModelResolver for CountingResolver {
    fn resolve(
        &self,
        coordinate: &ArtifactCoordinate,
        _repositories: &[Repository],
    ) -> Result<ResolvedArtifact, ResolverError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(coordinate.clone())
            .or_insert(0) += 1;

        if self.missing.contains(coordinate) {
            Ok(ResolvedArtifact::unresolved(coordinate.clone()))
        } else {
            Ok(ResolvedArtifact::resolved(
                coordinate.clone(),
                PathBuf::from(format!("/repo/{}", coordinate.repository_path().display())),
            ))
        }
    }

    fn transitive_closure(
        &self,
        coordinates: &[ArtifactCoordinate],
        _repositories: &[Repository],
    ) -> Result<Vec<ArtifactCoordinate>, ResolverError> {
        // Deliberately repeat every coordinate: the facade must still
        // resolve each distinct one exactly once.
        let mut closure = coordinates.to_vec();
        closure.extend(coordinates.iter().cloned());
        Ok(closure)
    }

    fn resolve_project_model(
        &self,
        _descriptor: &Path,
        _active_profiles: &[String],
        _inactive_profiles: &[String],
    ) -> Result<Arc<mason_resolve::ResolvedProjectModel>, ResolverError> {
        Err(ResolverError::fatal("not a project resolver"))
    }

    fn execute_goals(
        &self,
        _descriptor: &Path,
        _goals: &[String],
        _active_profiles: &[String],
        _selected_modules: &[String],
        _make_flags: &[String],
    ) -> Result<GoalExecutionReport, ResolverError> {
        Ok(GoalExecutionReport {
            succeeded: true,
            log: Vec::new(),
        })
    }

    fn available_versions(
        &self,
        _group_id: &str,
        _artifact_id: &str,
        _repositories: &[Repository],
    ) -> Result<Vec<String>, ResolverError> {
        Err(ResolverError::fatal("version listing unavailable"))
    }

    fn clear_caches(&self) {}

    fn clear_caches_for(&self, _project_id: &str) {}
}

#[test]
fn duplicate_coordinates_resolve_at_most_once_per_call() {
    let resolver = Arc::new(CountingResolver::default());
    let facade = ResolutionFacade::new(resolver.clone());

    let coord = ArtifactCoordinate::new("org.slf4j", "slf4j-api", "2.0.9");
    let coordinates = vec![coord.clone(), coord.clone(), coord.clone()];

    let result = facade.resolve_transitively(&coordinates, &[], &CancellationToken::new());
    let ExecutionResult::Success { payload, .. } = result else {
        panic!("expected success");
    };

    // Three explicit + three echoed duplicates in the closure, one resolve.
    assert_eq!(payload.len(), 1);
    assert_eq!(resolver.calls_for(&coord), 1);

    // The dedup cache is call-scoped: a second call resolves again.
    facade.resolve_transitively(&coordinates, &[], &CancellationToken::new());
    assert_eq!(resolver.calls_for(&coord), 2);
}

#[test]
fn unresolved_artifacts_are_collected_not_fatal() {
    let missing = ArtifactCoordinate::new("com.example", "ghost", "1.0");
    let present = ArtifactCoordinate::new("com.example", "real", "1.0");
    let resolver = Arc::new(CountingResolver {
        missing: BTreeSet::from([missing.clone()]),
        ..Default::default()
    });
    let facade = ResolutionFacade::new(resolver);

    let result = facade.resolve_transitively(
        &[missing.clone(), present.clone()],
        &[],
        &CancellationToken::new(),
    );
    let ExecutionResult::Success {
        payload, unresolved, ..
    } = result
    else {
        panic!("expected success");
    };

    assert_eq!(payload.len(), 2);
    assert_eq!(unresolved, BTreeSet::from([missing]));
    assert!(payload.iter().any(|a| a.coordinate == present && a.resolved));
}

#[test]
fn cancelled_token_short_circuits_resolution() {
    let facade = ResolutionFacade::new(Arc::new(CountingResolver::default()));
    let token = CancellationToken::new();
    token.cancel();

    let result = facade.resolve_transitively(
        &[ArtifactCoordinate::new("g", "a", "1")],
        &[],
        &token,
    );
    assert!(result.is_cancelled());
}

#[test]
fn plugin_resolution_with_stale_handle_is_a_clear_error() {
    let facade = ResolutionFacade::new(Arc::new(CountingResolver::default()));

    let result = facade.resolve_plugin(
        &ArtifactCoordinate::new("org.apache.maven.plugins", "maven-compiler-plugin", "3.11.0"),
        &[],
        NativeProjectHandle(999),
        false,
        &CancellationToken::new(),
    );

    match result {
        ExecutionResult::Error { message } => assert!(message.contains("stale")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[test]
fn single_resolve_never_fails_on_not_found() {
    let missing = ArtifactCoordinate::new("com.example", "ghost", "1.0");
    let facade = ResolutionFacade::new(Arc::new(CountingResolver {
        missing: BTreeSet::from([missing.clone()]),
        ..Default::default()
    }));

    let artifact = facade.resolve(&missing, &[]);
    assert_eq!(artifact.coordinate, missing);
    assert!(!artifact.resolved);
    assert_eq!(artifact.file, None);
}

#[test]
fn version_retrieval_degrades_to_empty_list() {
    let facade = ResolutionFacade::new(Arc::new(CountingResolver::default()));
    assert!(facade.available_versions("com.example", "app", &[]).is_empty());
}

#[test]
fn project_resolution_unions_settings_local_and_parent_layers() {
    let temp = tempfile::tempdir().expect("temp dir");
    let repo = temp.path().join("repo");
    let workspace = temp.path().join("ws");

    // Parent POM in the repo with a default-active profile of its own.
    write_file(
        &repo.join("com/test/parent/1.0/parent-1.0.pom"),
        r#"
<project>
  <groupId>com.test</groupId>
  <artifactId>parent</artifactId>
  <version>1.0</version>
  <packaging>pom</packaging>
  <profiles>
    <profile>
      <id>parent-default</id>
      <activation>
        <activeByDefault>true</activeByDefault>
      </activation>
    </profile>
  </profiles>
</project>
"#,
    );

    // Workspace descriptor: profile A is default-active, profile B has a
    // file predicate that matches. B's activation must suppress A.
    std::fs::create_dir_all(&workspace).expect("workspace");
    std::fs::write(workspace.join("b-marker"), b"").expect("marker");
    write_file(
        &workspace.join("pom.xml"),
        r#"
<project>
  <parent>
    <groupId>com.test</groupId>
    <artifactId>parent</artifactId>
    <version>1.0</version>
  </parent>
  <artifactId>app</artifactId>
  <dependencies>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
      <version>2.0.9</version>
    </dependency>
  </dependencies>
  <profiles>
    <profile>
      <id>A</id>
      <activation>
        <activeByDefault>true</activeByDefault>
      </activation>
    </profile>
    <profile>
      <id>B</id>
      <activation>
        <file>
          <exists>b-marker</exists>
        </file>
      </activation>
    </profile>
  </profiles>
</project>
"#,
    );

    // Settings layer contributes an always-on profile.
    let settings_path = temp.path().join("settings.xml");
    write_file(
        &settings_path,
        r#"
<settings>
  <profiles>
    <profile>
      <id>corp</id>
    </profile>
  </profiles>
  <activeProfiles>
    <activeProfile>corp</activeProfile>
  </activeProfiles>
</settings>
"#,
    );

    let facade = ResolutionFacade::new(Arc::new(LocalRepositoryResolver::new(&repo)));
    let env = WorkspaceEnvironment {
        user_settings: Some(settings_path),
        global_settings: None,
        activation: Default::default(),
    };

    let result = facade.resolve_project(
        &workspace.join("pom.xml"),
        &ExplicitProfileSelection::default(),
        &env,
        &CancellationToken::new(),
    );
    let ExecutionResult::Success { payload, .. } = result else {
        panic!("expected success, got {result:?}");
    };

    // Settings layer, then the local model's own activations, then the
    // parent chain's — each collected separately.
    assert_eq!(payload.activated_profiles, ["corp", "B", "parent-default"]);

    let coordinate = payload.coordinate.expect("coordinate");
    assert_eq!(coordinate.group_id, "com.test");
    assert_eq!(coordinate.artifact_id, "app");
    assert_eq!(coordinate.version, "1.0");
    assert_eq!(
        payload.dependencies,
        [ArtifactCoordinate::new("org.slf4j", "slf4j-api", "2.0.9")]
    );

    // The model is reachable through its handle until the result is
    // released.
    let handle = payload.handle.expect("handle");
    let model = facade.handles().get(handle).expect("live model");
    assert_eq!(model.parent.as_ref().expect("parent").coordinate.artifact_id, "parent");
}

#[test]
fn unparseable_descriptor_is_a_call_level_error() {
    let temp = tempfile::tempdir().expect("temp dir");
    let descriptor = temp.path().join("pom.xml");
    std::fs::write(&descriptor, "<project><unclosed").expect("write");

    let facade = ResolutionFacade::new(Arc::new(CountingResolver::default()));
    let result = facade.resolve_project(
        &descriptor,
        &ExplicitProfileSelection::default(),
        &WorkspaceEnvironment::default(),
        &CancellationToken::new(),
    );
    assert!(matches!(result, ExecutionResult::Error { .. }));
}
