mod format;
mod member;
pub mod reader;
pub mod split;
mod view;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::store::{Node, StoreError, VersionProps};

pub use format::{ArchiveFormat, ArchiveTypes};
pub use member::{MemberNode, MEMBER_SEPARATOR};
pub use view::ArchiveView;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path}: entry declares {declared} bytes, archive holds {actual}")]
    SizeMismatch {
        path: String,
        declared: u64,
        actual: u64,
    },
    #[error("split archive: {0}")]
    Split(String),
    #[error("{0} is not a recognized container")]
    NotAContainer(String),
}

/// A stored node or an archive member, as produced by member-aware
///  traversal and lookup
#[derive(Debug, Clone)]
pub enum Entry {
    Node(Node),
    Member(MemberNode),
}

impl Entry {
    pub fn url(&self) -> String {
        match self {
            Entry::Node(node) => node.url().to_string(),
            Entry::Member(member) => member.url(),
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Entry::Member(_))
    }

    pub fn has_content(&self) -> bool {
        match self {
            Entry::Node(node) => node.has_content(),
            Entry::Member(member) => member.has_content(),
        }
    }

    pub fn content(&self) -> Result<Bytes, StoreError> {
        match self {
            Entry::Node(node) => node
                .current_version()
                .map(|v| v.content())
                .ok_or_else(|| StoreError::NotFound {
                    url: node.url().to_string(),
                    ordinal: None,
                }),
            Entry::Member(member) => member.content(),
        }
    }

    pub fn properties(&self) -> Result<VersionProps, StoreError> {
        match self {
            Entry::Node(node) => node
                .current_version()
                .map(|v| v.properties().clone())
                .ok_or_else(|| StoreError::NotFound {
                    url: node.url().to_string(),
                    ordinal: None,
                }),
            Entry::Member(member) => member.properties(),
        }
    }

    /// Creation time of the version that produced this entry
    pub fn created(&self) -> Option<DateTime<Utc>> {
        match self {
            Entry::Node(node) => node.current_version().map(|v| v.created()),
            Entry::Member(member) => member.created(),
        }
    }
}
