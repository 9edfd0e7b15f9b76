use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::au::AuId;
use crate::store::{Node, StoreError, Version, VersionHandle, VersionProps};

use super::view::{ArchiveView, Located};

/// Separator between an archive url and a path inside it
pub const MEMBER_SEPARATOR: &str = "!/";

/// A read-only virtual node for one entry of a container. Nothing is
///  cached: every read goes back to the archive's current version.
#[derive(Debug, Clone)]
pub struct MemberNode {
    view: ArchiveView,
    archive: Node,
    path: String,
}

impl PartialEq for MemberNode {
    fn eq(&self, other: &Self) -> bool {
        self.archive == other.archive && self.path == other.path
    }
}

impl MemberNode {
    pub(crate) fn new(view: ArchiveView, archive: Node, path: String) -> Self {
        Self {
            view,
            archive,
            path,
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}{}", self.archive.url(), MEMBER_SEPARATOR, self.path)
    }

    /// The stored node holding the outermost container
    pub fn archive(&self) -> &Node {
        &self.archive
    }

    /// Path inside the archive; nested levels are joined with `!/`
    pub fn member_path(&self) -> &str {
        &self.path
    }

    pub fn au_id(&self) -> &AuId {
        self.archive.au_id()
    }

    fn located(&self) -> Result<Located, StoreError> {
        self.view
            .locate(&self.archive, &self.path)?
            .ok_or_else(|| StoreError::NotFound {
                url: self.url(),
                ordinal: None,
            })
    }

    pub fn has_content(&self) -> bool {
        matches!(self.view.member_exists(&self.archive, &self.path), Ok(true))
    }

    pub fn content(&self) -> Result<Bytes, StoreError> {
        self.located().map(|located| located.content)
    }

    pub fn open(&self) -> Result<Cursor<Bytes>, StoreError> {
        self.content().map(Cursor::new)
    }

    /// Creation time of the archive version backing this member
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.archive.current_version().map(|v| v.created())
    }

    pub fn properties(&self) -> Result<VersionProps, StoreError> {
        let located = self.located()?;
        let leaf = self.path.rsplit(MEMBER_SEPARATOR).next().unwrap_or(&self.path);
        Ok(VersionProps {
            content_length: located.info.size,
            node_url: self.url(),
            content_type: self.view.au().content_types().infer(leaf),
            last_modified: Some(
                located
                    .info
                    .modified
                    .unwrap_or_else(|| located.archive_version.created()),
            ),
            ..VersionProps::default()
        })
    }

    fn unsupported<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::UnsupportedOnMember { url: self.url() })
    }

    pub fn version(&self, _ordinal: u32) -> Result<VersionHandle, StoreError> {
        self.unsupported()
    }

    pub fn all_versions(&self) -> Result<Vec<Version>, StoreError> {
        self.unsupported()
    }

    pub fn resolve_member(&self, _member_path: &str) -> Result<MemberNode, StoreError> {
        self.unsupported()
    }
}
