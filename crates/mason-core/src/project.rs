use serde::{Deserialize, Serialize};

use crate::ArtifactCoordinate;

/// Small integer id a client uses to refer back to a project model computed
/// by an earlier call, without re-serializing the model across the process
/// boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NativeProjectHandle(pub u64);

impl std::fmt::Display for NativeProjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a successful project resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectResolutionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<NativeProjectHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<ArtifactCoordinate>,
    pub activated_profiles: Vec<String>,
    pub deactivated_profiles: Vec<String>,
    pub dependencies: Vec<ArtifactCoordinate>,
}

/// Payload of a goal-execution call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalExecutionReport {
    pub succeeded: bool,
    pub log: Vec<String>,
}
