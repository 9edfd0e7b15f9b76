use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreError;

/// Property map stored alongside each version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionProps {
    /// Filled in by the store from the committed bytes
    pub content_length: u64,
    /// Filled in by the store with the node's canonical url
    pub node_url: String,
    pub content_type: Option<String>,
    /// Defaults to the version's creation time when not supplied
    pub last_modified: Option<DateTime<Utc>>,
    /// `ALG:HEX`, e.g. `SHA-256:9F86D0...`
    pub checksum: Option<String>,
    /// Next hop when this version was stored for an intermediate redirect
    pub redirected_to: Option<String>,
    /// Url the content was actually served from, on the last hop
    pub content_url: Option<String>,
    /// Url the fetch started from, on redirect hops
    pub orig_url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl VersionProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct VersionInner {
    ordinal: u32,
    created: DateTime<Utc>,
    content: Bytes,
    hash: blake3::Hash,
    props: VersionProps,
}

/// One immutable snapshot of a node's content
#[derive(Clone)]
pub struct Version(Arc<VersionInner>);

impl std::fmt::Debug for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Version")
            .field("url", &self.0.props.node_url)
            .field("ordinal", &self.0.ordinal)
            .field("created", &self.0.created)
            .field("len", &self.0.content.len())
            .finish()
    }
}

impl Version {
    pub(crate) fn new(
        ordinal: u32,
        created: DateTime<Utc>,
        content: Bytes,
        mut props: VersionProps,
    ) -> Self {
        props.content_length = content.len() as u64;
        if props.last_modified.is_none() {
            props.last_modified = Some(created);
        }
        let hash = blake3::hash(&content);
        Self(Arc::new(VersionInner {
            ordinal,
            created,
            content,
            hash,
            props,
        }))
    }

    pub fn ordinal(&self) -> u32 {
        self.0.ordinal
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.0.created
    }

    pub fn content(&self) -> Bytes {
        self.0.content.clone()
    }

    /// Fresh reader over the content
    pub fn open(&self) -> Cursor<Bytes> {
        Cursor::new(self.0.content.clone())
    }

    pub fn properties(&self) -> &VersionProps {
        &self.0.props
    }

    pub fn url(&self) -> &str {
        &self.0.props.node_url
    }

    pub fn content_hash(&self) -> blake3::Hash {
        self.0.hash
    }

    pub fn has_same_content(&self, other: &Version) -> bool {
        self.0.hash == other.0.hash
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.0.props.last_modified.unwrap_or(self.0.created)
    }
}

/// Result of asking a node for a specific ordinal. Handles past the
///  current ordinal can be built but fail on every content access.
#[derive(Debug, Clone)]
pub struct VersionHandle {
    url: String,
    ordinal: u32,
    version: Option<Version>,
}

impl VersionHandle {
    pub(crate) fn new(url: String, ordinal: u32, version: Option<Version>) -> Self {
        Self {
            url,
            ordinal,
            version,
        }
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn exists(&self) -> bool {
        self.version.is_some()
    }

    pub fn version(&self) -> Result<&Version, StoreError> {
        self.version.as_ref().ok_or_else(|| StoreError::NotFound {
            url: self.url.clone(),
            ordinal: Some(self.ordinal),
        })
    }

    pub fn content(&self) -> Result<Bytes, StoreError> {
        self.version().map(Version::content)
    }

    pub fn open(&self) -> Result<Cursor<Bytes>, StoreError> {
        self.version().map(Version::open)
    }

    pub fn properties(&self) -> Result<&VersionProps, StoreError> {
        self.version().map(Version::properties)
    }
}
