use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveFormat;
use crate::ingest::ResultActionName;

use super::{AuError, RuleAction, DEFAULT_FETCH_DELAY_MS};

/// Serializable AU configuration
///
/// Loaded from TOML or JSON and turned into an [`Au`](super::Au)
/// with [`Au::from_settings`](super::Au::from_settings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuSettings {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub plugin_id: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub title_attributes: BTreeMap<String, String>,
    /// Ordered crawl rules; empty means every URL is in scope
    #[serde(default)]
    pub crawl_rules: Vec<CrawlRuleSettings>,
    #[serde(default = "default_rate_limiter_source")]
    pub rate_limiter_source: String,
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,
    /// Overrides `fetch_delay_ms` when set, e.g. `"10/1s"`
    #[serde(default)]
    pub fetch_rate: Option<String>,
    #[serde(default)]
    pub archive_types: Option<ArchiveTypesSettings>,
    #[serde(default)]
    pub content_types: Vec<super::ContentTypeRule>,
    #[serde(default)]
    pub validation_results: Vec<ResultMapping>,
    #[serde(default = "default_normalize_redirects")]
    pub normalize_redirects: bool,
    #[serde(default)]
    pub checksum_algorithm: Option<String>,
}

fn default_rate_limiter_source() -> String {
    "au".to_string()
}

fn default_fetch_delay_ms() -> u64 {
    DEFAULT_FETCH_DELAY_MS
}

fn default_normalize_redirects() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRuleSettings {
    pub action: RuleAction,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveTypesSettings {
    #[serde(default = "default_archive_types")]
    pub types: Vec<ArchiveTypeEntry>,
    /// Regex matched against an archive URL to decide whether
    ///  `.zNN` sibling parts should be chained ahead of it
    #[serde(default)]
    pub split_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveTypeEntry {
    pub suffix: String,
    pub format: ArchiveFormat,
}

pub(crate) fn default_archive_types() -> Vec<ArchiveTypeEntry> {
    [
        (".tar.gz", ArchiveFormat::TarGz),
        (".tgz", ArchiveFormat::TarGz),
        (".tar", ArchiveFormat::Tar),
        (".zip", ArchiveFormat::Zip),
        (".gz", ArchiveFormat::Gzip),
    ]
    .into_iter()
    .map(|(suffix, format)| ArchiveTypeEntry {
        suffix: suffix.to_string(),
        format,
    })
    .collect()
}

/// Override of the outcome for one validation signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMapping {
    /// `empty_file`, `wrong_length`, or a custom validator kind
    pub kind: String,
    pub action: ResultActionName,
    /// Only meaningful for `fail`
    #[serde(default)]
    pub retryable: bool,
}

impl AuSettings {
    pub fn new(id: impl Into<String>, plugin_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            plugin_id: plugin_id.into(),
            params: BTreeMap::new(),
            title_attributes: BTreeMap::new(),
            crawl_rules: Vec::new(),
            rate_limiter_source: default_rate_limiter_source(),
            fetch_delay_ms: default_fetch_delay_ms(),
            fetch_rate: None,
            archive_types: None,
            content_types: Vec::new(),
            validation_results: Vec::new(),
            normalize_redirects: default_normalize_redirects(),
            checksum_algorithm: None,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, AuError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, AuError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load settings from a file, picking the format from its extension
    pub fn from_file(path: &Path) -> Result<Self, AuError> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_toml_str(&raw),
        }
    }
}
