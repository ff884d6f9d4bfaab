use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use mason_core::ArtifactCoordinate;
use mason_scheduler::{ensure_live, CancellationToken, Progress};

use crate::index::ArtifactIndex;
use crate::layout::artifact_at;
use crate::transport::{RemoteIndexTransport, TransportError, UpdateSettings};
use crate::{ArtifactQuery, IndexError};

/// Process-local identity of an indexing context. Allocated monotonically
/// and never reused while any context is live — reuse would silently
/// corrupt search results for callers holding the old handle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IndexHandle(pub u32);

impl std::fmt::Display for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an indexing context is bound to: a local repository directory or a
/// remote repository URL, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextBacking {
    Local(PathBuf),
    Remote(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Created,
    Scanning,
    Updating,
    Idle,
    Released,
}

/// One live index bound to a repository.
pub struct IndexingContext {
    handle: IndexHandle,
    index_id: String,
    repository_id: String,
    backing: ContextBacking,
    state: Mutex<ContextState>,
    /// Serializes mutating operations on this context; readers go through
    /// the index lock and always observe the bumped generation.
    op_lock: Mutex<()>,
    index: RwLock<ArtifactIndex>,
}

impl IndexingContext {
    pub fn handle(&self) -> IndexHandle {
        self.handle
    }

    pub fn index_id(&self) -> &str {
        &self.index_id
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn backing(&self) -> &ContextBacking {
        &self.backing
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    fn local_path(&self) -> Result<&Path, IndexError> {
        match &self.backing {
            ContextBacking::Local(path) => Ok(path),
            ContextBacking::Remote(_) => Err(IndexError::NotLocal),
        }
    }

    fn remote_url(&self) -> Result<&str, IndexError> {
        match &self.backing {
            ContextBacking::Remote(url) => Ok(url),
            ContextBacking::Local(_) => Err(IndexError::NotRemote),
        }
    }

    fn begin_mutation(&self, state: ContextState) -> MutationGuard<'_> {
        let op = self.op_lock.lock();
        *self.state.lock() = state;
        MutationGuard { context: self, _op: op }
    }
}

/// Holds the per-context operation lock for the duration of a mutating
/// operation and restores the context to `Idle` on every exit path,
/// including errors and cancellation.
struct MutationGuard<'a> {
    context: &'a IndexingContext,
    _op: MutexGuard<'a, ()>,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        *self.context.state.lock() = ContextState::Idle;
    }
}

/// The shared handle table: concurrent lookups, single-writer
/// create/release.
#[derive(Default)]
pub struct IndexRegistry {
    contexts: RwLock<HashMap<IndexHandle, Arc<IndexingContext>>>,
    next_handle: AtomicU32,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            next_handle: AtomicU32::new(1),
        }
    }

    pub fn create_index(
        &self,
        index_id: impl Into<String>,
        repository_id: impl Into<String>,
        local_path: Option<PathBuf>,
        remote_url: Option<String>,
    ) -> Result<IndexHandle, IndexError> {
        let backing = match (local_path, remote_url) {
            (Some(path), None) => ContextBacking::Local(path),
            (None, Some(url)) => ContextBacking::Remote(url),
            (Some(_), Some(_)) => {
                return Err(IndexError::InvalidContext {
                    message: "both a local path and a remote url were supplied".to_string(),
                })
            }
            (None, None) => {
                return Err(IndexError::InvalidContext {
                    message: "neither a local path nor a remote url was supplied".to_string(),
                })
            }
        };

        let handle = IndexHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let context = Arc::new(IndexingContext {
            handle,
            index_id: index_id.into(),
            repository_id: repository_id.into(),
            backing,
            state: Mutex::new(ContextState::Created),
            op_lock: Mutex::new(()),
            index: RwLock::new(ArtifactIndex::new()),
        });

        self.contexts.write().insert(handle, context);
        Ok(handle)
    }

    /// Release a context. Releasing an already-released (or never-created)
    /// handle is an error: silently accepting it would make handle misuse
    /// after release ambiguous.
    pub fn release_index(&self, handle: IndexHandle) -> Result<(), IndexError> {
        let context = self
            .contexts
            .write()
            .remove(&handle)
            .ok_or(IndexError::UnknownHandle { handle })?;
        *context.state.lock() = ContextState::Released;
        tracing::debug!(
            target: "mason.index",
            handle = %handle,
            index_id = %context.index_id,
            "released indexing context"
        );
        Ok(())
    }

    pub fn context(&self, handle: IndexHandle) -> Result<Arc<IndexingContext>, IndexError> {
        self.contexts
            .read()
            .get(&handle)
            .cloned()
            .ok_or(IndexError::UnknownHandle { handle })
    }

    /// Walk a local repository and index every recognized artifact.
    ///
    /// The cancellation token is checked per visited file, so cancellation
    /// latency is bounded by a single directory entry. A cancelled scan is
    /// reported as cancelled, never as a partial success.
    pub fn scan(
        &self,
        handle: IndexHandle,
        token: &CancellationToken,
        progress: &Progress,
    ) -> Result<usize, IndexError> {
        let context = self.context(handle)?;
        let root = context.local_path()?.to_path_buf();
        if !root.is_dir() {
            return Err(IndexError::Io {
                path: root,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "repository directory does not exist",
                ),
            });
        }

        let _guard = context.begin_mutation(ContextState::Scanning);
        let mut discovered = 0usize;

        for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
            ensure_live(token)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(coordinate) = artifact_at(&root, entry.path()) else {
                continue;
            };
            context.index.write().add(coordinate.clone());
            discovered += 1;
            progress.report(Some(coordinate.to_string()), None);
        }

        tracing::info!(
            target: "mason.index",
            handle = %handle,
            discovered,
            "repository scan complete"
        );
        Ok(discovered)
    }

    /// Fetch and apply an incremental delta for a remote context. Returns
    /// the number of entries added.
    pub fn update(
        &self,
        handle: IndexHandle,
        transport: &dyn RemoteIndexTransport,
        settings: &UpdateSettings,
        token: &CancellationToken,
        progress: &Progress,
    ) -> Result<usize, IndexError> {
        let context = self.context(handle)?;
        let url = context.remote_url()?.to_string();

        let _guard = context.begin_mutation(ContextState::Updating);
        let since = context.index.read().generation();

        progress.report(Some(format!("fetching index delta from {url}")), None);
        let delta = transport
            .fetch_delta(&url, settings, since, token)
            .map_err(|err| match err {
                TransportError::Aborted => IndexError::Cancelled,
                TransportError::Network { message } => IndexError::Transport { message },
            })?;
        ensure_live(token)?;

        let mut index = context.index.write();
        if delta.replace_all {
            index.clear();
        }
        for coordinate in &delta.removed {
            index.remove(coordinate);
        }
        let total = delta.added.len();
        for (i, coordinate) in delta.added.into_iter().enumerate() {
            index.add(coordinate);
            if i % 1000 == 0 {
                progress.report(None, Some(i as f64 / total.max(1) as f64));
            }
        }

        tracing::info!(
            target: "mason.index",
            handle = %handle,
            added = total,
            removed = delta.removed.len(),
            "remote index update applied"
        );
        Ok(total)
    }

    /// Insert a single artifact file's metadata. Returns `None` (not an
    /// error) when the file is not a recognizable artifact; on success the
    /// index generation is bumped so the next search observes the entry.
    pub fn add_artifact(
        &self,
        handle: IndexHandle,
        file: &Path,
    ) -> Result<Option<ArtifactCoordinate>, IndexError> {
        let context = self.context(handle)?;
        let root = context.local_path()?.to_path_buf();

        let Some(coordinate) = artifact_at(&root, file) else {
            return Ok(None);
        };

        let _guard = context.begin_mutation(ContextState::Updating);
        context.index.write().add(coordinate.clone());
        Ok(Some(coordinate))
    }

    /// Bounded query over a context. An overly broad wildcard that would
    /// exceed the clause limit yields zero matches, not an error — it is a
    /// query-shape problem the caller cannot easily avoid.
    pub fn search(
        &self,
        handle: IndexHandle,
        query: &ArtifactQuery,
        max_results: usize,
    ) -> Result<BTreeSet<ArtifactCoordinate>, IndexError> {
        let context = self.context(handle)?;
        let index = context.index.read();
        match index.search(query, max_results) {
            Ok(results) => Ok(results),
            Err(_) => {
                tracing::debug!(
                    target: "mason.index",
                    handle = %handle,
                    "query exceeded the clause limit; returning no matches"
                );
                Ok(BTreeSet::new())
            }
        }
    }

    /// Stream all live entries in bounded chunks instead of materializing
    /// the whole index.
    pub fn process_artifacts(
        &self,
        handle: IndexHandle,
        chunk_size: usize,
        sink: impl FnMut(Vec<ArtifactCoordinate>),
    ) -> Result<(), IndexError> {
        let context = self.context(handle)?;
        context.index.read().for_each_chunk(chunk_size, sink);
        Ok(())
    }
}
