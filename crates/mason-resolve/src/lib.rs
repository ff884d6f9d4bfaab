//! Dependency resolution facade.
//!
//! The actual build-tool library — effective model computation, transitive
//! graph resolution, repository transport — sits behind the
//! [`ModelResolver`] capability. This crate orchestrates calls into it:
//! per-call deduplication, best-effort collection of unresolved artifacts,
//! error classification into the problem model, and the weakly-held
//! native-project-handle table that lets a later call refer back to an
//! earlier call's resolved model.

mod classify;
mod facade;
mod handles;
mod local_repo;

pub use classify::classify;
pub use facade::{ResolutionFacade, WorkspaceEnvironment};
pub use handles::ProjectHandleTable;
pub use local_repo::LocalRepositoryResolver;

pub use mason_core::{GoalExecutionReport, NativeProjectHandle, ProjectResolutionData};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mason_core::{ArtifactCoordinate, ProjectProblem, Repository, ResolvedArtifact};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("project handle {handle} is stale or released")]
    StaleHandle { handle: NativeProjectHandle },
}

/// Error surfaced by the external model resolver, shaped once at the
/// boundary so nothing above depends on a specific library's error
/// hierarchy.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The descriptor failed validation; `messages` may be empty when the
    /// library produced no structured messages.
    #[error("descriptor validation failed")]
    Validation { messages: Vec<String> },

    /// Anything else fatal to the requested operation.
    #[error("{message}")]
    Fatal {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ResolverError {
    pub fn fatal(message: impl Into<String>) -> Self {
        ResolverError::Fatal {
            message: message.into(),
            cause: None,
        }
    }
}

/// A project model computed by the external resolver, heavyweight enough to
/// keep in-process and reference from later calls by handle.
#[derive(Debug)]
pub struct ResolvedProjectModel {
    pub descriptor: PathBuf,
    pub coordinate: ArtifactCoordinate,
    pub dependencies: Vec<ArtifactCoordinate>,
    /// Profiles the model itself activated. Deliberately excludes the
    /// parent's and the settings layer's activations; those are collected
    /// and unioned separately.
    pub activated_profile_ids: Vec<String>,
    pub parent: Option<Arc<ResolvedProjectModel>>,
    pub problems: Vec<ProjectProblem>,
}

/// The external build-tool capability. All methods are synchronous: calls
/// run on the harness worker pool, and cancellation is handled by the
/// harness around them.
pub trait ModelResolver: Send + Sync {
    /// Resolve one artifact to a file. Not-found is expressed through
    /// [`ResolvedArtifact::resolved`], not an error.
    fn resolve(
        &self,
        coordinate: &ArtifactCoordinate,
        repositories: &[Repository],
    ) -> Result<ResolvedArtifact, ResolverError>;

    /// Expand a coordinate list to its transitive dependency closure.
    fn transitive_closure(
        &self,
        coordinates: &[ArtifactCoordinate],
        repositories: &[Repository],
    ) -> Result<Vec<ArtifactCoordinate>, ResolverError>;

    fn resolve_project_model(
        &self,
        descriptor: &Path,
        active_profiles: &[String],
        inactive_profiles: &[String],
    ) -> Result<Arc<ResolvedProjectModel>, ResolverError>;

    fn execute_goals(
        &self,
        descriptor: &Path,
        goals: &[String],
        active_profiles: &[String],
        selected_modules: &[String],
        make_flags: &[String],
    ) -> Result<GoalExecutionReport, ResolverError>;

    fn available_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        repositories: &[Repository],
    ) -> Result<Vec<String>, ResolverError>;

    /// Explicit cache-clearing capability; the server never reaches into
    /// resolver internals.
    fn clear_caches(&self);

    fn clear_caches_for(&self, project_id: &str);
}
