use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ArtifactCoordinate;

/// Severity category of a [`ProjectProblem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// Malformed or inconsistent descriptor/model.
    Structure,
    /// A dependency declaration that could not be interpreted.
    Dependency,
    /// A dependency the resolver could not fetch.
    UnresolvedArtifact,
}

/// A document/model defect attached to a result.
///
/// A result's problem list and its unresolved-artifact set are orthogonal:
/// problems describe descriptor defects, the unresolved set names
/// coordinates the resolver could not fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProblem {
    pub path: PathBuf,
    pub description: String,
    pub kind: ProblemKind,
}

impl ProjectProblem {
    pub fn structure(path: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            kind: ProblemKind::Structure,
        }
    }

    pub fn dependency(path: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            kind: ProblemKind::Dependency,
        }
    }

    pub fn unresolved_artifact(path: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            kind: ProblemKind::UnresolvedArtifact,
        }
    }
}

/// Unified outcome of a cancellable server call.
///
/// Exactly one of the three variants is ever observable. `Success` always
/// carries the problems list and the unresolved set, even when both are
/// empty — a call with zero hard errors but a non-empty unresolved set is
/// still a success from the protocol's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionResult<T> {
    Success {
        payload: T,
        problems: Vec<ProjectProblem>,
        unresolved: BTreeSet<ArtifactCoordinate>,
    },
    Cancelled,
    Error {
        message: String,
    },
}

impl<T> ExecutionResult<T> {
    pub fn success(payload: T) -> Self {
        Self::Success {
            payload,
            problems: Vec::new(),
            unresolved: BTreeSet::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
