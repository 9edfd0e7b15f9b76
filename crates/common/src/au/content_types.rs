use regex::Regex;
use serde::{Deserialize, Serialize};

use super::AuError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeRule {
    pub pattern: String,
    pub mime: String,
}

/// Ordered pattern -> MIME type overrides, with extension guessing
///  as the fallback
#[derive(Debug, Clone, Default)]
pub struct ContentTypeMap {
    rules: Vec<(Regex, String)>,
}

impl ContentTypeMap {
    pub fn from_rules(rules: &[ContentTypeRule]) -> Result<Self, AuError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule.mime.clone()))
                    .map_err(|e| AuError::ContentType(rule.pattern.clone(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn with_rule(mut self, pattern: &str, mime: &str) -> Result<Self, AuError> {
        let re = Regex::new(pattern).map_err(|e| AuError::ContentType(pattern.to_string(), e))?;
        self.rules.push((re, mime.to_string()));
        Ok(self)
    }

    /// First configured override matching `path`
    pub fn lookup(&self, path: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(path))
            .map(|(_, mime)| mime.as_str())
    }

    /// Override if one matches, otherwise a guess from the extension
    pub fn infer(&self, path: &str) -> Option<String> {
        if let Some(mime) = self.lookup(path) {
            return Some(mime.to_string());
        }
        let path = path.split(['?', '#']).next().unwrap_or(path);
        mime_guess::from_path(path).first().map(|m| m.to_string())
    }
}
