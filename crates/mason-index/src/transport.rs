use mason_core::ArtifactCoordinate;
use mason_scheduler::CancellationToken;

/// Per-call remote update settings. Supplied on every update rather than
/// cached from context creation: credentials and policy can change between
/// calls.
#[derive(Debug, Clone, Default)]
pub struct UpdateSettings {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Request a full index transfer instead of an incremental delta.
    pub force_full_update: bool,
}

/// Incremental index delta fetched from a remote repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDelta {
    /// When set, the existing index contents are discarded before applying
    /// `added` (a full transfer).
    pub replace_all: bool,
    pub added: Vec<ArtifactCoordinate>,
    pub removed: Vec<ArtifactCoordinate>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network failure: {message}")]
    Network { message: String },

    /// Transport-level abort triggered by cancellation; reported to callers
    /// as a cancelled result, distinct from other transport errors.
    #[error("transfer aborted")]
    Aborted,
}

/// The network side of remote index updates, injected per call.
pub trait RemoteIndexTransport: Send + Sync {
    fn fetch_delta(
        &self,
        url: &str,
        settings: &UpdateSettings,
        since_generation: u64,
        token: &CancellationToken,
    ) -> Result<IndexDelta, TransportError>;
}
