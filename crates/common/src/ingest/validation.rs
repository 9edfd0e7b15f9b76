use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::au::ResultMapping;
use crate::store::VersionProps;

/// A problem signalled about fetched content before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationKind {
    EmptyFile,
    /// Received byte count differs from the declared `Content-Length`
    WrongLength { expected: u64, actual: u64 },
    /// Signalled by an AU content validator
    Custom(String),
}

impl ValidationKind {
    /// Name used to match result overrides
    pub fn name(&self) -> &str {
        match self {
            ValidationKind::EmptyFile => "empty_file",
            ValidationKind::WrongLength { .. } => "wrong_length",
            ValidationKind::Custom(name) => name,
        }
    }

    pub fn message(&self, url: &str) -> String {
        match self {
            ValidationKind::EmptyFile => "Empty file stored".to_string(),
            ValidationKind::WrongLength { expected, actual } => format!(
                "File size ({}) differs from Content-Length header ({}): {}",
                actual, expected, url
            ),
            ValidationKind::Custom(name) => format!("Validation failed ({}): {}", name, url),
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::WrongLength { expected, actual } => {
                write!(f, "wrong_length (expected {}, got {})", expected, actual)
            }
            other => f.write_str(other.name()),
        }
    }
}

/// What the pipeline does about a signalled kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAction {
    /// Store, say nothing
    Accept,
    /// Store and report a warning
    WarnAndStore,
    /// Report a warning, store nothing, do not fail
    WarnNoStore,
    /// Store nothing and fail the fetch
    Fail { retryable: bool },
}

impl ResultAction {
    pub fn stores(&self) -> bool {
        matches!(self, ResultAction::Accept | ResultAction::WarnAndStore)
    }
}

/// Serialized name of a [`ResultAction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultActionName {
    Accept,
    WarnAndStore,
    WarnNoStore,
    Fail,
}

impl ResultMapping {
    pub fn result_action(&self) -> ResultAction {
        match self.action {
            ResultActionName::Accept => ResultAction::Accept,
            ResultActionName::WarnAndStore => ResultAction::WarnAndStore,
            ResultActionName::WarnNoStore => ResultAction::WarnNoStore,
            ResultActionName::Fail => ResultAction::Fail {
                retryable: self.retryable,
            },
        }
    }
}

#[derive(Clone)]
pub enum KindPredicate {
    Named(String),
    Matching(Arc<dyn Fn(&ValidationKind) -> bool + Send + Sync>),
}

impl fmt::Debug for KindPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindPredicate::Named(name) => f.debug_tuple("Named").field(name).finish(),
            KindPredicate::Matching(_) => f.write_str("Matching(..)"),
        }
    }
}

impl KindPredicate {
    fn matches(&self, kind: &ValidationKind) -> bool {
        match self {
            KindPredicate::Named(name) => kind.name() == name,
            KindPredicate::Matching(pred) => pred(kind),
        }
    }
}

/// Ordered kind -> action overrides, checked in registration order
///  before the built-in defaults
#[derive(Debug, Clone, Default)]
pub struct ResultMap {
    rules: Vec<(KindPredicate, ResultAction)>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(mappings: &[ResultMapping]) -> Self {
        let rules = mappings
            .iter()
            .map(|m| (KindPredicate::Named(m.kind.clone()), m.result_action()))
            .collect();
        Self { rules }
    }

    pub fn map(mut self, kind: &str, action: ResultAction) -> Self {
        self.rules.push((KindPredicate::Named(kind.to_string()), action));
        self
    }

    pub fn map_matching<F>(mut self, predicate: F, action: ResultAction) -> Self
    where
        F: Fn(&ValidationKind) -> bool + Send + Sync + 'static,
    {
        self.rules
            .push((KindPredicate::Matching(Arc::new(predicate)), action));
        self
    }

    pub fn default_action(kind: &ValidationKind) -> ResultAction {
        match kind {
            ValidationKind::EmptyFile => ResultAction::WarnAndStore,
            ValidationKind::WrongLength { .. } => ResultAction::Fail { retryable: true },
            ValidationKind::Custom(_) => ResultAction::Fail { retryable: false },
        }
    }

    pub fn action_for(&self, kind: &ValidationKind) -> ResultAction {
        self.rules
            .iter()
            .find(|(predicate, _)| predicate.matches(kind))
            .map(|(_, action)| *action)
            .unwrap_or_else(|| Self::default_action(kind))
    }
}

/// Inspects proposed content before it is stored
pub trait ContentValidator: Send + Sync {
    fn validate(&self, content: &Bytes, props: &VersionProps) -> Result<(), ValidationKind>;
}

impl<F> ContentValidator for F
where
    F: Fn(&Bytes, &VersionProps) -> Result<(), ValidationKind> + Send + Sync,
{
    fn validate(&self, content: &Bytes, props: &VersionProps) -> Result<(), ValidationKind> {
        self(content, props)
    }
}

/// Recognizes a login page served in place of the requested content
pub trait LoginPageChecker: Send + Sync {
    fn is_login_page(&self, props: &VersionProps, content: &Bytes) -> bool;
}

impl<F> LoginPageChecker for F
where
    F: Fn(&VersionProps, &Bytes) -> bool + Send + Sync,
{
    fn is_login_page(&self, props: &VersionProps, content: &Bytes) -> bool {
        self(props, content)
    }
}

/// Non-fatal validation outcome carried in a fetch report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub kind: ValidationKind,
    pub message: String,
    pub stored: bool,
}
