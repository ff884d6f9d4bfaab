//! Wire model for mason's remote RPC surface.
//!
//! Frames are u32 length-prefixed JSON documents. Size limits are enforced
//! from the length prefix, before any payload allocation, so a small input
//! cannot trigger an outsized allocation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use mason_core::{
    ArtifactCoordinate, ArtifactQuery, ExecutionResult, GoalExecutionReport,
    ProjectResolutionData, Repository, ResolvedArtifact,
};

/// Maximum size of a single RPC payload (not including the outer 4-byte
/// length prefix).
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024; // 64 MiB

/// Default `processArtifacts` chunk size: bounded streaming on the order of
/// thousands of entries rather than materializing the whole index.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

pub type RequestId = u64;

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("message too large: {len} > {max}")]
    MessageTooLarge { len: usize, max: usize },

    #[error("encode error: {message}")]
    Encode { message: String },

    #[error("decode error: {message}")]
    Decode { message: String },
}

/// Snapshot/plugin update policy, two-valued by design.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    AlwaysUpdate,
    #[default]
    NeverUpdate,
}

/// Cross-call resolver configuration, consumed by the server but owned by
/// the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven_home: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_settings: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_settings: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_repository: Option<PathBuf>,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub update_policy: UpdatePolicy,
}

/// Per-call credentials/policy for a remote index update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexUpdateSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub force_full_update: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    ResolveProject {
        descriptor: PathBuf,
        #[serde(default)]
        active_profiles: Vec<String>,
        #[serde(default)]
        inactive_profiles: Vec<String>,
    },
    Resolve {
        coordinate: ArtifactCoordinate,
        #[serde(default)]
        repositories: Vec<Repository>,
    },
    ResolveTransitively {
        coordinates: Vec<ArtifactCoordinate>,
        #[serde(default)]
        repositories: Vec<Repository>,
    },
    ResolvePlugin {
        plugin: ArtifactCoordinate,
        #[serde(default)]
        repositories: Vec<Repository>,
        project_handle: u64,
        #[serde(default)]
        transitive: bool,
    },
    Execute {
        descriptor: PathBuf,
        #[serde(default)]
        active_profiles: Vec<String>,
        #[serde(default)]
        inactive_profiles: Vec<String>,
        goals: Vec<String>,
        #[serde(default)]
        selected_modules: Vec<String>,
        /// Build-tool make-style flags (`--also-make` etc.), passed through
        /// verbatim.
        #[serde(default)]
        make_flags: Vec<String>,
    },
    RetrieveAvailableVersions {
        group_id: String,
        artifact_id: String,
        #[serde(default)]
        repositories: Vec<Repository>,
    },
    CreateIndex {
        index_id: String,
        repository_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        local_path: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_url: Option<String>,
    },
    ReleaseIndex {
        handle: u32,
    },
    UpdateIndex {
        handle: u32,
        #[serde(default)]
        settings: IndexUpdateSettings,
    },
    ProcessArtifacts {
        handle: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chunk_size: Option<usize>,
    },
    AddArtifact {
        handle: u32,
        file: PathBuf,
    },
    Search {
        handle: u32,
        query: ArtifactQuery,
        max_results: usize,
    },
    Customize {
        settings: ResolverSettings,
        /// Workspace map: in-workspace project coordinates to their
        /// descriptor paths, keyed `group:artifact:version`.
        #[serde(default)]
        workspace: BTreeMap<String, PathBuf>,
    },
    Reset,
    ClearCaches,
    ClearCachesFor {
        project_id: String,
    },
    CancelRequest {
        id: RequestId,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcErrorCode {
    InvalidRequest,
    UnknownHandle,
    IndexerError,
    TransportError,
    Internal,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Project {
        result: ExecutionResult<ProjectResolutionData>,
    },
    Artifact {
        result: ExecutionResult<ResolvedArtifact>,
    },
    Artifacts {
        result: ExecutionResult<Vec<ResolvedArtifact>>,
    },
    GoalRun {
        result: ExecutionResult<GoalExecutionReport>,
    },
    Versions {
        versions: Vec<String>,
    },
    IndexCreated {
        handle: u32,
    },
    IndexUpdated {
        result: ExecutionResult<usize>,
    },
    ArtifactAdded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinate: Option<ArtifactCoordinate>,
    },
    SearchResults {
        artifacts: BTreeSet<ArtifactCoordinate>,
    },
    /// Fire-and-forget acknowledgement for configuration calls.
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RpcResult {
    Ok { response: Response },
    Err { error: RpcError },
}

/// Client → server envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: RequestId,
    pub request: Request,
}

/// Server → client messages: one terminal response per request, plus
/// streamed artifact chunks and progress notifications in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerMessage {
    Response {
        id: RequestId,
        result: RpcResult,
    },
    ArtifactChunk {
        id: RequestId,
        artifacts: Vec<ArtifactCoordinate>,
    },
    Progress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fraction: Option<f64>,
    },
}

/// Validate a frame length read from the 4-byte prefix before allocating.
pub fn checked_frame_len(prefix: [u8; 4]) -> Result<usize, ProtoError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_BYTES {
        return Err(ProtoError::MessageTooLarge {
            len,
            max: MAX_MESSAGE_BYTES,
        });
    }
    Ok(len)
}

/// Encode a message as a length-prefixed JSON frame.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtoError> {
    let payload = serde_json::to_vec(message).map_err(|err| ProtoError::Encode {
        message: err.to_string(),
    })?;
    if payload.len() > MAX_MESSAGE_BYTES {
        return Err(ProtoError::MessageTooLarge {
            len: payload.len(),
            max: MAX_MESSAGE_BYTES,
        });
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a frame payload (without the length prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> Result<T, ProtoError> {
    serde_json::from_slice(payload).map_err(|err| ProtoError::Decode {
        message: err.to_string(),
    })
}
