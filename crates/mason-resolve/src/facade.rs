use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mason_core::{
    ArtifactCoordinate, ExecutionResult, GoalExecutionReport, NativeProjectHandle,
    ProjectProblem, ProjectResolutionData, Repository, ResolvedArtifact,
};
use mason_model::{
    activate, read_pom, read_settings, ActivationEnvironment, ActivationResult,
    ExplicitProfileSelection, Profile, ProfileSource, DEFAULT_ACTIVATOR_ORDER,
};
use mason_scheduler::{ensure_live, CancellationToken};

use crate::classify::classify;
use crate::handles::ProjectHandleTable;
use crate::ModelResolver;

/// Cross-call workspace configuration the facade consumes, not owns:
/// settings file locations and the activation environment snapshot.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceEnvironment {
    pub user_settings: Option<PathBuf>,
    pub global_settings: Option<PathBuf>,
    pub activation: ActivationEnvironment,
}

/// Orchestrates calls into the external [`ModelResolver`].
pub struct ResolutionFacade {
    resolver: Arc<dyn ModelResolver>,
    handles: Arc<ProjectHandleTable>,
}

impl ResolutionFacade {
    pub fn new(resolver: Arc<dyn ModelResolver>) -> Self {
        Self {
            resolver,
            handles: Arc::new(ProjectHandleTable::new()),
        }
    }

    pub fn handles(&self) -> &ProjectHandleTable {
        &self.handles
    }

    /// Resolve one coordinate. Never fails: not-found comes back with
    /// `resolved = false` and the coordinate unmodified.
    pub fn resolve(
        &self,
        coordinate: &ArtifactCoordinate,
        repositories: &[Repository],
    ) -> ResolvedArtifact {
        let mut session = ResolutionSession::new(self.resolver.as_ref(), repositories);
        session.resolve(coordinate)
    }

    /// Resolve a coordinate list and its transitive closure. Identical
    /// coordinates are resolved at most once within this call; individual
    /// failures land in the unresolved set, never abort the call.
    pub fn resolve_transitively(
        &self,
        coordinates: &[ArtifactCoordinate],
        repositories: &[Repository],
        token: &CancellationToken,
    ) -> ExecutionResult<Vec<ResolvedArtifact>> {
        let mut session = ResolutionSession::new(self.resolver.as_ref(), repositories);

        let closure = match self.resolver.transitive_closure(coordinates, repositories) {
            Ok(closure) => closure,
            Err(err) => {
                // Partial failure: fall back to the explicit list.
                tracing::warn!(
                    target: "mason.resolve",
                    error = %err,
                    "transitive expansion failed; resolving the explicit list only"
                );
                coordinates.to_vec()
            }
        };

        let mut resolved = Vec::new();
        let mut seen = BTreeSet::new();
        for coordinate in closure {
            if ensure_live(token).is_err() {
                return ExecutionResult::Cancelled;
            }
            if seen.insert(coordinate.clone()) {
                resolved.push(session.resolve(&coordinate));
            }
        }

        ExecutionResult::Success {
            payload: resolved,
            problems: Vec::new(),
            unresolved: session.unresolved,
        }
    }

    /// Resolve a plugin against an already-resolved owning project,
    /// referenced by handle rather than re-parsed.
    pub fn resolve_plugin(
        &self,
        plugin: &ArtifactCoordinate,
        repositories: &[Repository],
        project: NativeProjectHandle,
        transitive: bool,
        token: &CancellationToken,
    ) -> ExecutionResult<BTreeSet<ResolvedArtifact>> {
        let model = match self.handles.get(project) {
            Ok(model) => model,
            Err(err) => return ExecutionResult::error(err.to_string()),
        };

        let mut session = ResolutionSession::new(self.resolver.as_ref(), repositories);
        let mut problems = Vec::new();

        let coordinates = if transitive {
            match self
                .resolver
                .transitive_closure(std::slice::from_ref(plugin), repositories)
            {
                Ok(closure) => closure,
                Err(err) => {
                    problems.extend(classify(&model.descriptor, &err));
                    vec![plugin.clone()]
                }
            }
        } else {
            vec![plugin.clone()]
        };

        let mut resolved = BTreeSet::new();
        let mut seen = BTreeSet::new();
        for coordinate in coordinates {
            if ensure_live(token).is_err() {
                return ExecutionResult::Cancelled;
            }
            if seen.insert(coordinate.clone()) {
                resolved.insert(session.resolve(&coordinate));
            }
        }

        ExecutionResult::Success {
            payload: resolved,
            problems,
            unresolved: session.unresolved,
        }
    }

    /// Resolve a project descriptor: activate profiles, compute the model
    /// through the resolver, and register it under a fresh handle.
    pub fn resolve_project(
        &self,
        descriptor: &Path,
        selection: &ExplicitProfileSelection,
        env: &WorkspaceEnvironment,
        token: &CancellationToken,
    ) -> ExecutionResult<ProjectResolutionData> {
        let (activation, settings_profile_ids, mut problems) =
            match self.activate_for_descriptor(descriptor, selection, env) {
                Ok(parts) => parts,
                Err(result) => return result,
            };

        if ensure_live(token).is_err() {
            return ExecutionResult::Cancelled;
        }

        let inactive: Vec<String> = activation.deactivated.iter().cloned().collect();
        let model = match self
            .resolver
            .resolve_project_model(descriptor, &activation.activated, &inactive)
        {
            Ok(model) => model,
            Err(err) => {
                problems.extend(classify(descriptor, &err));
                return ExecutionResult::Success {
                    payload: ProjectResolutionData {
                        handle: None,
                        coordinate: None,
                        activated_profiles: activation.activated,
                        deactivated_profiles: inactive,
                        dependencies: Vec::new(),
                    },
                    problems,
                    unresolved: BTreeSet::new(),
                };
            }
        };

        // Activated profiles are the explicit union of three separately
        // collected layers: the settings layer, the local model, and the
        // parent chain. A child's set does not include its parent's, and the
        // parent's does not include the settings layer's, so each must be
        // gathered on its own.
        let mut activated = Vec::new();
        let mut seen = BTreeSet::new();
        let settings_layer = activation
            .activated
            .iter()
            .filter(|id| settings_profile_ids.contains(*id));
        for id in settings_layer.chain(model.activated_profile_ids.iter()) {
            if seen.insert(id.clone()) {
                activated.push(id.clone());
            }
        }
        let mut parent = model.parent.clone();
        while let Some(ancestor) = parent {
            for id in &ancestor.activated_profile_ids {
                if seen.insert(id.clone()) {
                    activated.push(id.clone());
                }
            }
            parent = ancestor.parent.clone();
        }

        problems.extend(model.problems.clone());
        let handle = self.handles.register(&model);

        ExecutionResult::Success {
            payload: ProjectResolutionData {
                handle: Some(handle),
                coordinate: Some(model.coordinate.clone()),
                activated_profiles: activated,
                deactivated_profiles: inactive,
                dependencies: model.dependencies.clone(),
            },
            problems,
            unresolved: BTreeSet::new(),
        }
    }

    /// Run build goals for a descriptor through the resolver.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        descriptor: &Path,
        selection: &ExplicitProfileSelection,
        goals: &[String],
        selected_modules: &[String],
        make_flags: &[String],
        env: &WorkspaceEnvironment,
        token: &CancellationToken,
    ) -> ExecutionResult<GoalExecutionReport> {
        let (activation, _settings_ids, mut problems) =
            match self.activate_for_descriptor(descriptor, selection, env) {
                Ok(parts) => parts,
                Err(result) => return result,
            };

        if ensure_live(token).is_err() {
            return ExecutionResult::Cancelled;
        }

        match self.resolver.execute_goals(
            descriptor,
            goals,
            &activation.activated,
            selected_modules,
            make_flags,
        ) {
            Ok(report) => ExecutionResult::Success {
                payload: report,
                problems,
                unresolved: BTreeSet::new(),
            },
            Err(err) => {
                problems.extend(classify(descriptor, &err));
                ExecutionResult::Success {
                    payload: GoalExecutionReport::default(),
                    problems,
                    unresolved: BTreeSet::new(),
                }
            }
        }
    }

    /// Ordered version list for an artifact; any failure degrades to an
    /// empty list.
    pub fn available_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        repositories: &[Repository],
    ) -> Vec<String> {
        match self
            .resolver
            .available_versions(group_id, artifact_id, repositories)
        {
            Ok(versions) => versions,
            Err(err) => {
                tracing::warn!(
                    target: "mason.resolve",
                    group_id,
                    artifact_id,
                    error = %err,
                    "version retrieval failed"
                );
                Vec::new()
            }
        }
    }

    pub fn clear_caches(&self) {
        self.resolver.clear_caches();
        self.handles.clear();
    }

    pub fn clear_caches_for(&self, project_id: &str) {
        self.resolver.clear_caches_for(project_id);
    }

    /// Shared first half of `resolve_project`/`execute`: read raw profiles
    /// from the descriptor and the settings layer, then run activation.
    ///
    /// A descriptor that cannot be parsed at all makes the operation
    /// meaningless and propagates as a call-level error; a malformed
    /// settings file degrades to a collected problem.
    #[allow(clippy::type_complexity)]
    fn activate_for_descriptor<T>(
        &self,
        descriptor: &Path,
        selection: &ExplicitProfileSelection,
        env: &WorkspaceEnvironment,
    ) -> Result<(ActivationResult, BTreeSet<String>, Vec<ProjectProblem>), ExecutionResult<T>> {
        let mut problems = Vec::new();

        let pom = match read_pom(descriptor) {
            Ok(pom) => pom,
            Err(err) => return Err(ExecutionResult::error(err.to_string())),
        };

        let mut raw_profiles: Vec<Profile> = pom.profiles;
        let mut always_on = BTreeSet::new();
        for path in [&env.user_settings, &env.global_settings]
            .into_iter()
            .flatten()
        {
            if !path.is_file() {
                continue;
            }
            match read_settings(path) {
                Ok(settings) => {
                    raw_profiles.extend(settings.profiles);
                    always_on.extend(settings.active_profiles);
                }
                Err(err) => {
                    problems.push(ProjectProblem::structure(path.clone(), err.to_string()));
                }
            }
        }

        let settings_profile_ids: BTreeSet<String> = raw_profiles
            .iter()
            .filter(|p| p.source == ProfileSource::Settings)
            .map(|p| p.id.clone())
            .collect();

        let activation_env = match descriptor.parent() {
            Some(base) => env.activation.clone().with_base_dir(base),
            None => env.activation.clone(),
        };
        let activation = activate(
            &raw_profiles,
            selection,
            &always_on,
            &DEFAULT_ACTIVATOR_ORDER,
            &activation_env,
        );

        Ok((activation, settings_profile_ids, problems))
    }
}

/// Call-scoped resolution state: the dedup cache and the best-effort
/// collections. Never shared across calls.
struct ResolutionSession<'a> {
    resolver: &'a dyn ModelResolver,
    repositories: &'a [Repository],
    cache: HashMap<ArtifactCoordinate, ResolvedArtifact>,
    unresolved: BTreeSet<ArtifactCoordinate>,
}

impl<'a> ResolutionSession<'a> {
    fn new(resolver: &'a dyn ModelResolver, repositories: &'a [Repository]) -> Self {
        Self {
            resolver,
            repositories,
            cache: HashMap::new(),
            unresolved: BTreeSet::new(),
        }
    }

    /// The dedup cache is consulted before every resolution attempt, so the
    /// underlying resolver sees each distinct coordinate at most once per
    /// call — failures included.
    fn resolve(&mut self, coordinate: &ArtifactCoordinate) -> ResolvedArtifact {
        if let Some(hit) = self.cache.get(coordinate) {
            return hit.clone();
        }

        let resolved = match self.resolver.resolve(coordinate, self.repositories) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(
                    target: "mason.resolve",
                    coordinate = %coordinate,
                    error = %err,
                    "artifact resolution failed"
                );
                ResolvedArtifact::unresolved(coordinate.clone())
            }
        };

        if !resolved.resolved {
            self.unresolved.insert(coordinate.clone());
        }
        self.cache.insert(coordinate.clone(), resolved.clone());
        resolved
    }
}
