//! Fetch -> redirect -> validate -> commit
//!
//! [`IngestionPipeline::fetch`] drives one url through the states of
//! [`FetchState`], pacing every transport request through the AU's
//! shared rate limiter. Only the bounded redirect loop is retried here;
//! every other retryable failure goes back to the caller, classified by
//! [`FetchError::is_retryable`].

mod checksum;
mod notify;
mod pipeline;
mod redirect;
mod transport;
mod validation;

use crate::store::StoreError;

pub use checksum::ChecksumAlgorithm;
pub use notify::{ChannelSink, Notification, NotificationKind, NotificationSink, Severity, TracingSink};
pub use pipeline::{FetchState, IngestionPipeline};
pub use redirect::{is_directory_redirect, resolve_target, same_host, RedirectPolicy, MAX_REDIRECTS};
pub use transport::{FetchRequest, Transport, TransportError, TransportResponse, HTTP_DATE_FORMAT};
pub use validation::{
    ContentValidator, KindPredicate, LoginPageChecker, ResultAction, ResultActionName, ResultMap,
    ValidationKind, ValidationWarning,
};

/// What a successful fetch stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Url the fetch started from
    pub url: String,
    /// Url the content was finally served from
    pub final_url: String,
    /// Node urls of every hop, starting url first
    pub hops: Vec<String>,
    /// `(node url, ordinal)` of every version committed
    pub stored: Vec<(String, u32)>,
    pub warnings: Vec<ValidationWarning>,
}

impl FetchReport {
    pub fn is_stored(&self) -> bool {
        !self.stored.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(FetchReport),
    /// The server reported the stored version is current; nothing written
    NotModified,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("redirect from {url} to {target} rejected by policy")]
    OutsideSpec {
        url: String,
        target: String,
        hops: Vec<String>,
    },
    #[error("more than {} redirects fetching {url}", MAX_REDIRECTS)]
    TooManyRedirects { url: String, hops: Vec<String> },
    #[error("malformed redirect target {target:?} from {url}")]
    MalformedTarget {
        url: String,
        target: Option<String>,
        hops: Vec<String>,
    },
    #[error("{url} redirects to {target}, not followed")]
    RedirectNotFollowed {
        url: String,
        target: String,
        hops: Vec<String>,
    },
    #[error("validation failed for {url}: {kind}")]
    Validation {
        url: String,
        kind: ValidationKind,
        retryable: bool,
    },
    #[error("{url} returned HTTP {code}")]
    HttpStatus {
        url: String,
        code: u16,
        retryable: bool,
    },
    #[error("transport error fetching {url}: {message}")]
    Transport {
        url: String,
        message: String,
        retryable: bool,
    },
    #[error("{url} returned a login page")]
    LoginPage { url: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl FetchError {
    /// Whether the caller's own retry loop should try again
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Validation { retryable, .. }
            | FetchError::HttpStatus { retryable, .. }
            | FetchError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// The offending url
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::OutsideSpec { url, .. }
            | FetchError::TooManyRedirects { url, .. }
            | FetchError::MalformedTarget { url, .. }
            | FetchError::RedirectNotFollowed { url, .. }
            | FetchError::Validation { url, .. }
            | FetchError::HttpStatus { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::LoginPage { url } => Some(url),
            FetchError::Store(_) => None,
        }
    }

    /// Attempted hop chain of a redirect failure
    pub fn hops(&self) -> Option<&[String]> {
        match self {
            FetchError::OutsideSpec { hops, .. }
            | FetchError::TooManyRedirects { hops, .. }
            | FetchError::MalformedTarget { hops, .. }
            | FetchError::RedirectNotFollowed { hops, .. } => Some(hops),
            _ => None,
        }
    }
}

/// 5xx, request timeout and too-many-requests are worth retrying
pub fn is_retryable_status(code: u16) -> bool {
    code >= 500 || code == 408 || code == 429
}
