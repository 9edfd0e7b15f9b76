use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::au::AuId;

use super::{Clock, Node, SystemClock, VersionedStore};

/// Registry of per-AU stores. Each AU owns exactly one node tree.
#[derive(Clone)]
pub struct Repository {
    stores: Arc<RwLock<HashMap<AuId, VersionedStore>>>,
    clock: Arc<dyn Clock>,
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            stores: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// The store for `au_id`, created empty on first use
    pub fn store(&self, au_id: &AuId) -> VersionedStore {
        if let Some(store) = self.stores.read().get(au_id) {
            return store.clone();
        }
        self.stores
            .write()
            .entry(au_id.clone())
            .or_insert_with(|| {
                tracing::debug!("Creating store for AU {}", au_id);
                VersionedStore::with_clock(au_id.clone(), self.clock.clone())
            })
            .clone()
    }

    pub fn open(&self, au_id: &AuId, url: &str) -> Node {
        self.store(au_id).open(url)
    }

    pub fn au_ids(&self) -> Vec<AuId> {
        let mut ids: Vec<AuId> = self.stores.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
