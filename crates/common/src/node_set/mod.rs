mod relation;
mod spec;

use crate::au::AuId;
use crate::store::{Node, VersionedStore};

pub use relation::{compare, Relation};
pub use spec::{NodeSetError, NodeSetSpec};

/// A selector bound to the store it selects from
#[derive(Debug, Clone)]
pub struct NodeSet {
    store: VersionedStore,
    spec: NodeSetSpec,
}

impl NodeSet {
    pub fn new(store: VersionedStore, spec: NodeSetSpec) -> Self {
        Self { store, spec }
    }

    pub fn whole(store: VersionedStore) -> Self {
        Self::new(store, NodeSetSpec::whole())
    }

    pub fn spec(&self) -> &NodeSetSpec {
        &self.spec
    }

    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    pub fn au_id(&self) -> &AuId {
        self.store.au_id()
    }

    pub fn contains(&self, node: &Node) -> bool {
        node.au_id() == self.au_id() && self.spec.matches(node.url())
    }

    /// Immediate children of the selection's root, in path order
    pub fn children(&self) -> Vec<Node> {
        match &self.spec {
            NodeSetSpec::Single(_) => Vec::new(),
            spec => self
                .store
                .child_urls(spec.prefix_url())
                .into_iter()
                .filter(|url| spec.matches(url))
                .map(|url| self.store.open(&url))
                .collect(),
        }
    }

    /// Pre-order walk of the selected subtree
    pub fn traverse(&self) -> Vec<Node> {
        match &self.spec {
            NodeSetSpec::Single(url) => vec![self.store.open(url)],
            spec => self
                .store
                .subtree_urls(spec.prefix_url())
                .into_iter()
                .filter(|url| spec.matches(url))
                .map(|url| self.store.open(&url))
                .collect(),
        }
    }

    pub fn relation(&self, other: &NodeSet) -> Relation {
        if self.au_id() != other.au_id() {
            return Relation::NoRelation;
        }
        compare(&self.spec, &other.spec)
    }
}
