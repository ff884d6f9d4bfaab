use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use mason_core::NativeProjectHandle;

use crate::{ResolveError, ResolvedProjectModel};

/// Shared table of weakly-held project models.
///
/// Entries never pin a model alive: once the owning call's result is
/// dropped, lookups surface a clear stale-handle error instead of a
/// dangling object. Ids are allocated monotonically and an explicit
/// release path exists, so correctness never depends on drop timing.
#[derive(Default)]
pub struct ProjectHandleTable {
    entries: RwLock<HashMap<u64, Weak<ResolvedProjectModel>>>,
    next: AtomicU64,
}

impl ProjectHandleTable {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    pub fn register(&self, model: &Arc<ResolvedProjectModel>) -> NativeProjectHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write();
        // Opportunistic pruning keeps the table from accumulating entries
        // for models the client has long dropped.
        entries.retain(|_, weak| weak.strong_count() > 0);
        entries.insert(id, Arc::downgrade(model));
        NativeProjectHandle(id)
    }

    pub fn get(
        &self,
        handle: NativeProjectHandle,
    ) -> Result<Arc<ResolvedProjectModel>, ResolveError> {
        self.entries
            .read()
            .get(&handle.0)
            .and_then(Weak::upgrade)
            .ok_or(ResolveError::StaleHandle { handle })
    }

    pub fn release(&self, handle: NativeProjectHandle) -> bool {
        self.entries.write().remove(&handle.0).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of live (upgradable) entries.
    pub fn live_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
