use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{AuError, CrawlRuleSettings};

/// Decides whether a URL belongs to an AU
pub trait CrawlSpec: Send + Sync {
    fn should_be_cached(&self, url: &str) -> bool;
}

impl<F> CrawlSpec for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn should_be_cached(&self, url: &str) -> bool {
        self(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Include,
    Exclude,
}

#[derive(Debug, Clone)]
pub struct CrawlRule {
    pub action: RuleAction,
    pub pattern: Regex,
}

/// Ordered regex rules; the first matching rule decides.
///  URLs matched by no rule fall back to `default_action`.
#[derive(Debug, Clone)]
pub struct CrawlRules {
    rules: Vec<CrawlRule>,
    default_action: RuleAction,
}

impl CrawlRules {
    pub fn new(rules: Vec<CrawlRule>) -> Self {
        Self {
            rules,
            default_action: RuleAction::Exclude,
        }
    }

    pub fn allow_all() -> Self {
        Self {
            rules: Vec::new(),
            default_action: RuleAction::Include,
        }
    }

    pub fn from_settings(settings: &[CrawlRuleSettings]) -> Result<Self, AuError> {
        let rules = settings
            .iter()
            .map(|s| {
                Regex::new(&s.pattern)
                    .map(|pattern| CrawlRule {
                        action: s.action,
                        pattern,
                    })
                    .map_err(|e| AuError::CrawlRule(s.pattern.clone(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Include everything matching one of `patterns`
    pub fn include(patterns: &[&str]) -> Result<Self, AuError> {
        let settings = patterns
            .iter()
            .map(|p| CrawlRuleSettings {
                action: RuleAction::Include,
                pattern: p.to_string(),
            })
            .collect::<Vec<_>>();
        Self::from_settings(&settings)
    }
}

impl CrawlSpec for CrawlRules {
    fn should_be_cached(&self, url: &str) -> bool {
        let action = self
            .rules
            .iter()
            .find(|rule| rule.pattern.is_match(url))
            .map(|rule| rule.action)
            .unwrap_or(self.default_action);
        action == RuleAction::Include
    }
}
