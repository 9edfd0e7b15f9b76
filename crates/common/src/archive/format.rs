use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::au::{ArchiveTypeEntry, ArchiveTypesSettings, AuError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    /// A single compressed stream, exposed as one member named after
    ///  the archive minus its `.gz`
    Gzip,
}

/// The container types an AU recognizes, and how its split zip
///  archives are named
#[derive(Debug, Clone)]
pub struct ArchiveTypes {
    entries: Vec<ArchiveTypeEntry>,
    split_pattern: Option<Regex>,
}

impl Default for ArchiveTypes {
    fn default() -> Self {
        Self {
            entries: crate::au::default_archive_types(),
            split_pattern: None,
        }
    }
}

impl ArchiveTypes {
    pub fn new(entries: Vec<ArchiveTypeEntry>) -> Self {
        Self {
            entries,
            split_pattern: None,
        }
    }

    pub fn from_settings(settings: &ArchiveTypesSettings) -> Result<Self, AuError> {
        let types = Self::new(settings.types.clone());
        match &settings.split_pattern {
            Some(pattern) => types.with_split_pattern(pattern),
            None => Ok(types),
        }
    }

    pub fn with_split_pattern(mut self, pattern: &str) -> Result<Self, AuError> {
        let re = Regex::new(pattern).map_err(|e| AuError::SplitPattern(pattern.to_string(), e))?;
        self.split_pattern = Some(re);
        Ok(self)
    }

    /// Container format for a url or member path, by suffix,
    ///  ignoring case and any query string
    pub fn format_for(&self, url: &str) -> Option<ArchiveFormat> {
        let path = url.split('?').next().unwrap_or(url).to_ascii_lowercase();
        self.entries
            .iter()
            .find(|entry| path.ends_with(&entry.suffix.to_ascii_lowercase()))
            .map(|entry| entry.format)
    }

    /// Whether `url` is the final part of a split zip archive whose
    ///  numbered parts should be chained ahead of it
    pub fn is_split_candidate(&self, url: &str) -> bool {
        self.format_for(url) == Some(ArchiveFormat::Zip)
            && self
                .split_pattern
                .as_ref()
                .is_some_and(|re| re.is_match(url))
    }
}
