//! Inverted index over artifact coordinates.
//!
//! An indexing context binds one index to either a local repository
//! directory (incrementally scanned) or a remote repository URL
//! (incrementally updated through a transport). Contexts are addressed by
//! process-local integer handles that are never reused while a context is
//! live.

mod index;
mod layout;
mod registry;
mod transport;

pub use index::{ArtifactIndex, ClauseLimitExceeded, MAX_CLAUSE_COUNT};

pub use mason_core::{ArtifactQuery, QueryClause, QueryField};
pub use layout::artifact_at;
pub use registry::{ContextBacking, ContextState, IndexHandle, IndexRegistry, IndexingContext};
pub use transport::{IndexDelta, RemoteIndexTransport, TransportError, UpdateSettings};

use std::path::PathBuf;

use mason_scheduler::Cancelled;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid indexing context: {message}")]
    InvalidContext { message: String },

    #[error("unknown index handle {handle}")]
    UnknownHandle { handle: IndexHandle },

    #[error("operation requires a locally backed index context")]
    NotLocal,

    #[error("operation requires a remotely backed index context")]
    NotRemote,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index transport failure: {message}")]
    Transport { message: String },

    /// Cooperative stop: a distinct terminal outcome, not a failure. Callers
    /// map this variant to their cancelled result, never to an error report.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<Cancelled> for IndexError {
    fn from(_: Cancelled) -> Self {
        IndexError::Cancelled
    }
}
