use crate::au::AuId;

use super::{Version, VersionHandle, VersionedStore};

/// Lightweight handle on a tree position. Holds the store and the
///  canonical url; the vertex may or may not exist yet.
#[derive(Debug, Clone)]
pub struct Node {
    store: VersionedStore,
    url: String,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.store.ptr_eq(&other.store)
    }
}

impl Eq for Node {}

impl Node {
    pub(crate) fn new(store: VersionedStore, url: String) -> Self {
        Self { store, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn au_id(&self) -> &AuId {
        self.store.au_id()
    }

    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    /// Whether the tree vertex has been created by a commit
    pub fn exists(&self) -> bool {
        self.store.entry(&self.url).is_some()
    }

    pub fn has_content(&self) -> bool {
        self.current_ordinal() > 0
    }

    pub fn current_version(&self) -> Option<Version> {
        self.store.entry(&self.url).and_then(|entry| entry.current())
    }

    pub fn current_ordinal(&self) -> u32 {
        self.store
            .entry(&self.url)
            .map(|entry| entry.current_ordinal())
            .unwrap_or(0)
    }

    /// Version `ordinal`; past the current ordinal the handle exists
    ///  but every content access fails with `NotFound`
    pub fn version(&self, ordinal: u32) -> VersionHandle {
        let version = self
            .store
            .entry(&self.url)
            .and_then(|entry| entry.get(ordinal));
        VersionHandle::new(self.url.clone(), ordinal, version)
    }

    /// Every version, newest first
    pub fn all_versions(&self) -> Vec<Version> {
        self.store
            .entry(&self.url)
            .map(|entry| entry.all_newest_first())
            .unwrap_or_default()
    }

    /// Existing immediate children, in path order
    pub fn children(&self) -> Vec<Node> {
        self.store
            .child_urls(&self.url)
            .into_iter()
            .map(|url| Node::new(self.store.clone(), url))
            .collect()
    }

    pub fn mark_suspect(&self, ordinal: u32) {
        self.store.mark_suspect(&self.url, ordinal);
    }

    pub fn is_suspect(&self, ordinal: u32) -> bool {
        self.store.is_suspect(&self.url, ordinal)
    }

    /// Whether the current version carries a suspect mark
    pub fn is_current_suspect(&self) -> bool {
        match self.current_ordinal() {
            0 => false,
            n => self.is_suspect(n),
        }
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use crate::store::{StoreError, VersionProps};

    use super::*;

    #[test]
    fn test_version_history() {
        let store = VersionedStore::new(AuId::new("au"));
        store.commit("http://h/x", "abc", VersionProps::new()).unwrap();
        store.commit("http://h/x", "defg", VersionProps::new()).unwrap();
        let node = store.open("http://h/x");

        let contents: Vec<Bytes> = node.all_versions().iter().map(Version::content).collect();
        assert_eq!(contents, vec![Bytes::from("defg"), Bytes::from("abc")]);
        let ordinals: Vec<u32> = node.all_versions().iter().map(Version::ordinal).collect();
        assert_eq!(ordinals, vec![2, 1]);

        assert_eq!(node.version(1).content().unwrap(), Bytes::from("abc"));
        assert_eq!(node.version(1).content().unwrap(), Bytes::from("abc"));
        assert_eq!(node.current_version().unwrap().content(), Bytes::from("defg"));

        let beyond = node.version(3);
        assert_eq!(beyond.ordinal(), 3);
        assert!(matches!(beyond.content(), Err(StoreError::NotFound { .. })));
        assert!(node.version(0).content().is_err());
    }

    #[test]
    fn test_absent_node() {
        let store = VersionedStore::new(AuId::new("au"));
        let node = store.open("http://h/nothing");
        assert_eq!(node.current_ordinal(), 0);
        assert!(node.current_version().is_none());
        assert!(node.all_versions().is_empty());
        assert!(node.children().is_empty());
        assert!(!node.is_current_suspect());
    }

    #[test]
    fn test_handles_compare_by_url() {
        let store = VersionedStore::new(AuId::new("au"));
        assert_eq!(store.open("http://h/a/"), store.open("http://h/a"));
    }
}
