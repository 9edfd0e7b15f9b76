//! Archival Unit identity and capabilities
//!
//! An AU is an independently configured namespace of preserved content.
//! Everything that varies per AU is collected in the [`Au`] capability
//! struct and handed to the store, the archive view and the ingestion
//! pipeline at construction time:
//!
//! - **crawl spec**: which URLs belong to the AU ([`CrawlSpec`], [`CrawlRules`])
//! - **archive types**: which extensions are containers, and how split
//!   archives are named ([`ArchiveTypes`](crate::archive::ArchiveTypes))
//! - **content types**: pattern -> MIME overrides ([`ContentTypeMap`])
//! - **fetch policy**: rate limiter source and rate, validator, login page
//!   checker, validation result overrides, checksum algorithm
//!
//! Settings are plain serde data ([`AuSettings`]); trait-object
//! capabilities are attached with the `with_*` builder methods.

mod content_types;
mod crawl_rules;
mod settings;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveTypes;
use crate::ingest::{
    ChecksumAlgorithm, ContentValidator, LoginPageChecker, ResultMap,
};
use crate::rate_limiter::{Rate, RateLimiterSource};

pub use content_types::{ContentTypeMap, ContentTypeRule};
pub use crawl_rules::{CrawlRule, CrawlRules, CrawlSpec, RuleAction};
pub(crate) use settings::default_archive_types;
pub use settings::{
    ArchiveTypeEntry, ArchiveTypesSettings, AuSettings, CrawlRuleSettings,
    ResultMapping,
};

/// Default pause between fetches from one rate limiter
pub const DEFAULT_FETCH_DELAY_MS: u64 = 6_000;

/// Stable identifier of an Archival Unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuId(String);

impl AuId {
    pub fn new(id: impl Into<String>) -> Self {
        AuId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AuId {
    fn from(s: &str) -> Self {
        AuId(s.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuError {
    #[error("default error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("invalid crawl rule pattern {0:?}: {1}")]
    CrawlRule(String, regex::Error),
    #[error("invalid content type pattern {0:?}: {1}")]
    ContentType(String, regex::Error),
    #[error("invalid split archive pattern {0:?}: {1}")]
    SplitPattern(String, regex::Error),
    #[error("invalid fetch rate: {0}")]
    Rate(#[from] crate::rate_limiter::RateError),
    #[error("unknown checksum algorithm: {0}")]
    Checksum(String),
    #[error("settings i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("settings parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-AU capability struct
#[derive(Clone)]
pub struct Au {
    id: AuId,
    name: String,
    plugin_id: String,
    params: BTreeMap<String, String>,
    title_attributes: BTreeMap<String, String>,
    crawl_spec: Arc<dyn CrawlSpec>,
    archive_types: Option<ArchiveTypes>,
    content_types: ContentTypeMap,
    validator: Option<Arc<dyn ContentValidator>>,
    login_checker: Option<Arc<dyn LoginPageChecker>>,
    result_map: ResultMap,
    rate_limiter_source: RateLimiterSource,
    fetch_rate: Rate,
    normalize_redirects: bool,
    checksum: Option<ChecksumAlgorithm>,
}

impl fmt::Debug for Au {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Au")
            .field("id", &self.id)
            .field("plugin_id", &self.plugin_id)
            .field("rate_limiter_source", &self.rate_limiter_source)
            .field("fetch_rate", &self.fetch_rate)
            .field("archive_types", &self.archive_types.is_some())
            .finish()
    }
}

impl Au {
    /// An AU with permissive defaults: every URL is in the crawl spec,
    ///  no archive types, one fetch per [`DEFAULT_FETCH_DELAY_MS`]
    ///  limited per AU.
    pub fn new(id: impl Into<AuId>, plugin_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            plugin_id: plugin_id.into(),
            params: BTreeMap::new(),
            title_attributes: BTreeMap::new(),
            crawl_spec: Arc::new(CrawlRules::allow_all()),
            archive_types: None,
            content_types: ContentTypeMap::default(),
            validator: None,
            login_checker: None,
            result_map: ResultMap::default(),
            rate_limiter_source: RateLimiterSource::PerAu,
            fetch_rate: Rate::per_millis(1, DEFAULT_FETCH_DELAY_MS),
            normalize_redirects: true,
            checksum: None,
        }
    }

    /// Build the capability struct from loaded settings
    pub fn from_settings(settings: &AuSettings) -> Result<Self, AuError> {
        let mut au = Au::new(AuId::new(settings.id.clone()), settings.plugin_id.clone());
        if let Some(name) = &settings.name {
            au.name = name.clone();
        }
        au.params = settings.params.clone();
        au.title_attributes = settings.title_attributes.clone();

        if !settings.crawl_rules.is_empty() {
            au.crawl_spec = Arc::new(CrawlRules::from_settings(&settings.crawl_rules)?);
        }
        if let Some(types) = &settings.archive_types {
            au.archive_types = Some(ArchiveTypes::from_settings(types)?);
        }
        au.content_types = ContentTypeMap::from_rules(&settings.content_types)?;
        au.result_map = ResultMap::from_settings(&settings.validation_results);
        au.rate_limiter_source = RateLimiterSource::parse(&settings.rate_limiter_source);
        au.fetch_rate = match &settings.fetch_rate {
            Some(rate) => rate.parse()?,
            None => Rate::new(1, Duration::from_millis(settings.fetch_delay_ms))?,
        };
        au.normalize_redirects = settings.normalize_redirects;
        au.checksum = settings
            .checksum_algorithm
            .as_deref()
            .map(|alg| {
                alg.parse::<ChecksumAlgorithm>()
                    .map_err(|_| AuError::Checksum(alg.to_string()))
            })
            .transpose()?;

        tracing::debug!("Configured AU {} (plugin {})", au.id, au.plugin_id);
        Ok(au)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_title_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.title_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_crawl_spec(mut self, spec: impl CrawlSpec + 'static) -> Self {
        self.crawl_spec = Arc::new(spec);
        self
    }

    pub fn with_archive_types(mut self, types: ArchiveTypes) -> Self {
        self.archive_types = Some(types);
        self
    }

    pub fn with_content_types(mut self, map: ContentTypeMap) -> Self {
        self.content_types = map;
        self
    }

    pub fn with_validator(mut self, validator: impl ContentValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_login_checker(mut self, checker: impl LoginPageChecker + 'static) -> Self {
        self.login_checker = Some(Arc::new(checker));
        self
    }

    pub fn with_result_map(mut self, map: ResultMap) -> Self {
        self.result_map = map;
        self
    }

    pub fn with_rate_limiter_source(mut self, source: RateLimiterSource) -> Self {
        self.rate_limiter_source = source;
        self
    }

    pub fn with_fetch_rate(mut self, rate: Rate) -> Self {
        self.fetch_rate = rate;
        self
    }

    pub fn with_normalize_redirects(mut self, normalize: bool) -> Self {
        self.normalize_redirects = normalize;
        self
    }

    pub fn with_checksum(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum = Some(algorithm);
        self
    }

    pub fn id(&self) -> &AuId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn title_attribute(&self, key: &str) -> Option<&str> {
        self.title_attributes.get(key).map(String::as_str)
    }

    /// Crawl spec membership test
    pub fn should_be_cached(&self, url: &str) -> bool {
        self.crawl_spec.should_be_cached(url)
    }

    pub fn archive_types(&self) -> Option<&ArchiveTypes> {
        self.archive_types.as_ref()
    }

    pub fn content_types(&self) -> &ContentTypeMap {
        &self.content_types
    }

    pub fn validator(&self) -> Option<&Arc<dyn ContentValidator>> {
        self.validator.as_ref()
    }

    pub fn login_checker(&self) -> Option<&Arc<dyn LoginPageChecker>> {
        self.login_checker.as_ref()
    }

    pub fn result_map(&self) -> &ResultMap {
        &self.result_map
    }

    pub fn rate_limiter_source(&self) -> &RateLimiterSource {
        &self.rate_limiter_source
    }

    pub fn fetch_rate(&self) -> Rate {
        self.fetch_rate
    }

    pub fn normalize_redirects(&self) -> bool {
        self.normalize_redirects
    }

    pub fn checksum(&self) -> Option<ChecksumAlgorithm> {
        self.checksum
    }
}
