mod clock;
mod node;
pub mod path;
mod repository;
mod version;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::archive::ArchiveError;
use crate::au::AuId;

pub use clock::{Clock, SystemClock};
pub use node::Node;
pub use repository::Repository;
pub use version::{Version, VersionHandle, VersionProps};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {url} (version {ordinal:?})")]
    NotFound { url: String, ordinal: Option<u32> },
    #[error("operation not supported on archive member {url}")]
    UnsupportedOnMember { url: String },
    #[error("invalid node path: {0:?}")]
    InvalidPath(String),
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

/// A tree vertex and its version history. Versions are only ever
///  appended, under the entry's own lock.
pub(crate) struct NodeEntry {
    url: String,
    versions: RwLock<Vec<Version>>,
}

impl NodeEntry {
    fn new(url: String) -> Self {
        Self {
            url,
            versions: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn current(&self) -> Option<Version> {
        self.versions.read().last().cloned()
    }

    pub(crate) fn current_ordinal(&self) -> u32 {
        self.versions.read().len() as u32
    }

    pub(crate) fn get(&self, ordinal: u32) -> Option<Version> {
        if ordinal == 0 {
            return None;
        }
        self.versions.read().get(ordinal as usize - 1).cloned()
    }

    pub(crate) fn all_newest_first(&self) -> Vec<Version> {
        self.versions.read().iter().rev().cloned().collect()
    }
}

struct TreeNode {
    entry: Arc<NodeEntry>,
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn new(url: String) -> Self {
        Self {
            entry: Arc::new(NodeEntry::new(url)),
            children: BTreeMap::new(),
        }
    }

    fn find(&self, comps: &[String]) -> Option<&TreeNode> {
        comps
            .iter()
            .try_fold(self, |node, comp| node.children.get(comp))
    }

    fn collect_preorder(&self, out: &mut Vec<String>) {
        for child in self.children.values() {
            out.push(child.entry.url.clone());
            child.collect_preorder(out);
        }
    }
}

struct StoreInner {
    au_id: AuId,
    // the root is virtual, its url is ""
    tree: RwLock<TreeNode>,
    clock: Arc<dyn Clock>,
    suspect: Mutex<HashSet<(String, u32)>>,
    current_suspect_count: AtomicUsize,
}

/// Append-only, per-url version history for one AU
#[derive(Clone)]
pub struct VersionedStore(Arc<StoreInner>);

impl std::fmt::Debug for VersionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedStore")
            .field("au_id", &self.0.au_id)
            .finish()
    }
}

impl VersionedStore {
    pub fn new(au_id: AuId) -> Self {
        Self::with_clock(au_id, Arc::new(SystemClock))
    }

    pub fn with_clock(au_id: AuId, clock: Arc<dyn Clock>) -> Self {
        Self(Arc::new(StoreInner {
            au_id,
            tree: RwLock::new(TreeNode::new(String::new())),
            clock,
            suspect: Mutex::new(HashSet::new()),
            current_suspect_count: AtomicUsize::new(0),
        }))
    }

    pub fn au_id(&self) -> &AuId {
        &self.0.au_id
    }

    pub fn ptr_eq(&self, other: &VersionedStore) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Handle on the tree position for `url`. Never fails and never
    ///  creates anything.
    pub fn open(&self, url: &str) -> Node {
        Node::new(self.clone(), path::normalize(url))
    }

    pub(crate) fn entry(&self, url: &str) -> Option<Arc<NodeEntry>> {
        let comps = path::components(url);
        if comps.is_empty() {
            return None;
        }
        let tree = self.0.tree.read();
        tree.find(&comps).map(|node| node.entry.clone())
    }

    fn entry_or_create(&self, comps: &[String]) -> Arc<NodeEntry> {
        if let Some(node) = self.0.tree.read().find(comps) {
            return node.entry.clone();
        }
        let mut tree = self.0.tree.write();
        let mut node = &mut *tree;
        for comp in comps {
            let parent_url = node.entry.url.clone();
            node = node.children.entry(comp.clone()).or_insert_with(|| {
                let url = path::join(&parent_url, comp);
                tracing::trace!("Creating tree vertex {}", url);
                TreeNode::new(url)
            });
        }
        node.entry.clone()
    }

    /// Append a new version of `url`, creating the node and its
    ///  ancestors as needed
    pub fn commit(
        &self,
        url: &str,
        content: impl Into<Bytes>,
        mut props: VersionProps,
    ) -> Result<Version, StoreError> {
        let comps = path::components(url);
        if comps.is_empty() {
            return Err(StoreError::InvalidPath(url.to_string()));
        }
        let entry = self.entry_or_create(&comps);
        props.node_url = entry.url.clone();
        let created = self.0.clock.now();

        let mut versions = entry.versions.write();
        let ordinal = versions.len() as u32 + 1;
        let version = Version::new(ordinal, created, content.into(), props);
        versions.push(version.clone());
        drop(versions);

        tracing::debug!(
            "Committed {} version {} ({} bytes) in AU {}",
            entry.url,
            ordinal,
            version.properties().content_length,
            self.0.au_id
        );
        Ok(version)
    }

    /// Urls of the immediate children of `url`, in path order
    pub(crate) fn child_urls(&self, url: &str) -> Vec<String> {
        let comps = path::components(url);
        let tree = self.0.tree.read();
        tree.find(&comps)
            .map(|node| {
                node.children
                    .values()
                    .map(|child| child.entry.url.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Pre-order urls of the subtree at `url`, the node itself first
    ///  unless it is the AU root
    pub(crate) fn subtree_urls(&self, url: &str) -> Vec<String> {
        let comps = path::components(url);
        let tree = self.0.tree.read();
        let mut out = Vec::new();
        if let Some(node) = tree.find(&comps) {
            if !comps.is_empty() {
                out.push(node.entry.url.clone());
            }
            node.collect_preorder(&mut out);
        }
        out
    }

    pub fn mark_suspect(&self, url: &str, ordinal: u32) {
        let url = path::normalize(url);
        tracing::debug!("Marking {} version {} suspect", url, ordinal);
        self.0.suspect.lock().insert((url, ordinal));
    }

    pub fn is_suspect(&self, url: &str, ordinal: u32) -> bool {
        self.0
            .suspect
            .lock()
            .contains(&(path::normalize(url), ordinal))
    }

    pub fn current_suspect_count(&self) -> usize {
        self.0.current_suspect_count.load(Ordering::SeqCst)
    }

    pub fn set_current_suspect_count(&self, count: usize) {
        self.0.current_suspect_count.store(count, Ordering::SeqCst);
    }

    /// Count the suspect marks that still apply to a current version
    ///  and store the result as the current suspect count
    pub fn recompute_current_suspect_count(&self) -> usize {
        let marks: Vec<(String, u32)> = self.0.suspect.lock().iter().cloned().collect();
        let count = marks
            .iter()
            .filter(|(url, ordinal)| {
                self.entry(url)
                    .map(|entry| entry.current_ordinal() == *ordinal)
                    .unwrap_or(false)
            })
            .count();
        self.set_current_suspect_count(count);
        tracing::debug!("AU {} current suspect count is {}", self.0.au_id, count);
        count
    }
}
