use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::au::Au;
use crate::node_set::NodeSet;
use crate::store::{Node, Version, VersionedStore};

use super::member::{MemberNode, MEMBER_SEPARATOR};
use super::reader::{self, EntryInfo};
use super::{split, ArchiveError, ArchiveFormat, ArchiveTypes, Entry};

struct Container {
    format: ArchiveFormat,
    data: Bytes,
    name: String,
}

pub(crate) struct Located {
    pub content: Bytes,
    pub info: EntryInfo,
    pub archive_version: Version,
}

/// Member-aware view over one AU's store
#[derive(Debug, Clone)]
pub struct ArchiveView {
    store: VersionedStore,
    au: Arc<Au>,
}

impl ArchiveView {
    pub fn new(store: VersionedStore, au: Arc<Au>) -> Self {
        Self { store, au }
    }

    pub fn au(&self) -> &Au {
        &self.au
    }

    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    fn types(&self) -> Option<&ArchiveTypes> {
        self.au.archive_types()
    }

    /// Container format recognized for the node's url, regardless of content
    pub fn container_format(&self, node: &Node) -> Option<ArchiveFormat> {
        self.types()?.format_for(node.url())
    }

    pub fn is_container(&self, node: &Node) -> bool {
        self.container_format(node).is_some() && node.has_content()
    }

    fn container_data(&self, node: &Node, version: &Version) -> Result<Bytes, ArchiveError> {
        match self.types() {
            Some(types) if types.is_split_candidate(node.url()) => {
                split::join_parts(&self.store, node.url(), version.content())
            }
            _ => Ok(version.content()),
        }
    }

    /// The archive's current version as an outermost container
    fn outermost(&self, archive: &Node) -> Result<Option<(Container, Version)>, ArchiveError> {
        let Some(format) = self.container_format(archive) else {
            return Ok(None);
        };
        let Some(version) = archive.current_version() else {
            return Ok(None);
        };
        let container = Container {
            format,
            data: self.container_data(archive, &version)?,
            name: archive.url().to_string(),
        };
        Ok(Some((container, version)))
    }

    /// Walk down the nested containers named in `path`, returning the
    ///  innermost one and the path left inside it
    fn innermost<'p>(
        &self,
        mut container: Container,
        mut path: &'p str,
    ) -> Result<Option<(Container, &'p str)>, ArchiveError> {
        while let Some((outer, rest)) = path.split_once(MEMBER_SEPARATOR) {
            let Some(format) = self.types().and_then(|t| t.format_for(outer)) else {
                return Ok(None);
            };
            match reader::extract(container.format, &container.data, &container.name, outer)? {
                Some((data, _)) => {
                    container = Container {
                        format,
                        data,
                        name: outer.to_string(),
                    };
                    path = rest;
                }
                None => return Ok(None),
            }
        }
        Ok(Some((container, path)))
    }

    /// Find `member_path` in the archive's current version
    pub(crate) fn locate(
        &self,
        archive: &Node,
        member_path: &str,
    ) -> Result<Option<Located>, ArchiveError> {
        let Some((outer, version)) = self.outermost(archive)? else {
            return Ok(None);
        };
        let Some((inner, path)) = self.innermost(outer, member_path)? else {
            return Ok(None);
        };
        let found = reader::extract(inner.format, &inner.data, &inner.name, path)?;
        Ok(found.map(|(content, info)| Located {
            content,
            info,
            archive_version: version,
        }))
    }

    /// Whether the archive's current version holds `member_path`,
    ///  without reading the member itself
    pub(crate) fn member_exists(&self, archive: &Node, member_path: &str) -> Result<bool, ArchiveError> {
        let Some((outer, _)) = self.outermost(archive)? else {
            return Ok(false);
        };
        match self.innermost(outer, member_path)? {
            Some((inner, path)) => reader::contains(inner.format, &inner.data, &inner.name, path),
            None => Ok(false),
        }
    }

    /// The member at `member_path`, if the archive node has content,
    ///  is a recognized container and its current version holds that path
    pub fn resolve_member(&self, archive: &Node, member_path: &str) -> Option<MemberNode> {
        let member_path = member_path.trim_start_matches('/');
        match self.member_exists(archive, member_path) {
            Ok(true) => Some(MemberNode::new(
                self.clone(),
                archive.clone(),
                member_path.to_string(),
            )),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!("Unreadable archive {}: {}", archive.url(), e);
                None
            }
        }
    }

    fn expand(
        &self,
        format: ArchiveFormat,
        data: &Bytes,
        name: &str,
        prefix: &str,
        out: &mut Vec<String>,
    ) -> Result<(), ArchiveError> {
        for entry in reader::list(format, data, name)? {
            let path = format!("{}{}", prefix, entry.path);
            if let Some(inner_format) = self.types().and_then(|t| t.format_for(&entry.path)) {
                let mut nested = Vec::new();
                let inner_prefix = format!("{}{}", path, MEMBER_SEPARATOR);
                let expanded = reader::extract(format, data, name, &entry.path).and_then(|found| {
                    match found {
                        Some((inner, _)) => {
                            self.expand(inner_format, &inner, &entry.path, &inner_prefix, &mut nested)
                        }
                        None => Ok(()),
                    }
                });
                match expanded {
                    Ok(()) => {
                        out.extend(nested);
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Nested archive {} unreadable, listing as a file: {}", path, e);
                    }
                }
            }
            out.push(path);
        }
        Ok(())
    }

    /// Every member of a container node, nested containers expanded
    pub fn members(&self, archive: &Node) -> Result<Vec<MemberNode>, ArchiveError> {
        let format = self
            .container_format(archive)
            .ok_or_else(|| ArchiveError::NotAContainer(archive.url().to_string()))?;
        let Some(version) = archive.current_version() else {
            return Err(ArchiveError::NotAContainer(archive.url().to_string()));
        };
        let data = self.container_data(archive, &version)?;
        let mut paths = Vec::new();
        self.expand(format, &data, archive.url(), "", &mut paths)?;
        Ok(paths
            .into_iter()
            .map(|path| MemberNode::new(self.clone(), archive.clone(), path))
            .collect())
    }

    /// Like [`NodeSet::traverse`], with container nodes replaced by
    ///  their members. With a threshold, entries whose current version
    ///  (or, for members, whose archive's current version) was created
    ///  at or before it are left out.
    pub fn traverse_members(
        &self,
        node_set: &NodeSet,
        exclude_at_or_before: Option<DateTime<Utc>>,
    ) -> Vec<Entry> {
        let mut out = Vec::new();
        for node in node_set.traverse() {
            let current = node.current_version();
            if let Some(threshold) = exclude_at_or_before {
                match &current {
                    Some(version) if version.created() > threshold => {}
                    _ => continue,
                }
            }
            if current.is_some() && self.container_format(&node).is_some() {
                match self.members(&node) {
                    Ok(members) => {
                        out.extend(members.into_iter().map(Entry::Member));
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Unreadable archive {}, listing as a file: {}", node.url(), e);
                    }
                }
            }
            out.push(Entry::Node(node));
        }
        out
    }

    /// Resolve a plain url or a `archive!/member` url
    pub fn find(&self, url: &str) -> Option<Entry> {
        match url.split_once(MEMBER_SEPARATOR) {
            Some((archive_url, member_path)) => self
                .resolve_member(&self.store.open(archive_url), member_path)
                .map(Entry::Member),
            None => {
                let node = self.store.open(url);
                node.exists().then_some(Entry::Node(node))
            }
        }
    }
}
