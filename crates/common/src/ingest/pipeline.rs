use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::au::Au;
use crate::rate_limiter::{RateLimiter, RateLimiterPool};
use crate::store::{Node, VersionProps, VersionedStore};

use super::notify::{Notification, NotificationKind, NotificationSink, Severity, TracingSink};
use super::redirect::{is_directory_redirect, resolve_target, same_host, RedirectPolicy, MAX_REDIRECTS};
use super::transport::{FetchRequest, Transport, TransportResponse};
use super::validation::{ResultAction, ValidationKind, ValidationWarning};
use super::{is_retryable_status, FetchError, FetchOutcome, FetchReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    Init,
    Connecting,
    ConditionalCheck,
    Fetching,
    Redirected,
    Validating,
    Committing,
    Done,
    Failed,
}

struct StateMachine<'a> {
    url: &'a str,
    state: FetchState,
}

impl<'a> StateMachine<'a> {
    fn new(url: &'a str) -> Self {
        Self {
            url,
            state: FetchState::Init,
        }
    }

    fn to(&mut self, next: FetchState) {
        tracing::trace!("fetch {}: {:?} -> {:?}", self.url, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, error: FetchError) -> FetchError {
        self.to(FetchState::Failed);
        tracing::debug!("fetch {} failed: {}", self.url, error);
        error
    }
}

/// The final 2xx response and the chain that led to it
struct Fetched {
    response: TransportResponse,
    hops: Vec<String>,
    final_url: String,
}

/// Fetches urls of one AU into its store
#[derive(Clone)]
pub struct IngestionPipeline {
    au: Arc<Au>,
    store: VersionedStore,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    sink: Arc<dyn NotificationSink>,
}

impl IngestionPipeline {
    /// Pipeline pacing through the limiter `pool` assigns to the AU,
    ///  logging notifications through tracing
    pub fn new(
        au: Arc<Au>,
        store: VersionedStore,
        transport: Arc<dyn Transport>,
        pool: &RateLimiterPool,
    ) -> Self {
        let limiter = pool.acquire(&au);
        Self {
            au,
            store,
            transport,
            limiter,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn au(&self) -> &Au {
        &self.au
    }

    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn notify(&self, kind: NotificationKind, url: &str, severity: Severity, message: String) {
        self.sink.notify(Notification {
            kind,
            au_id: self.au.id().clone(),
            url: url.to_string(),
            severity,
            message,
        });
    }

    /// Fetch `node`'s url and store what comes back
    pub async fn fetch(
        &self,
        node: &Node,
        policy: RedirectPolicy,
        force_refetch: bool,
    ) -> Result<FetchOutcome, FetchError> {
        let url = node.url().to_string();
        let mut sm = StateMachine::new(&url);

        let if_modified_since = if force_refetch {
            None
        } else {
            node.current_version().map(|v| v.last_modified())
        };

        let fetched = match self.request_chain(&mut sm, &url, policy, if_modified_since).await? {
            Some(fetched) => fetched,
            None => {
                sm.to(FetchState::Done);
                tracing::debug!("{} not modified", url);
                return Ok(FetchOutcome::NotModified);
            }
        };

        let props = chain_props(&url, &fetched, response_props(&fetched.response));
        let body = fetched.response.body.clone();

        if let Some(checker) = self.au.login_checker() {
            if checker.is_login_page(&props, &body) {
                return Err(sm.fail(FetchError::LoginPage {
                    url: fetched.final_url,
                }));
            }
        }

        sm.to(FetchState::Validating);
        let warnings = match self.validate(&fetched, &props, &body) {
            Ok(warnings) => warnings,
            Err(e) => return Err(sm.fail(e)),
        };
        if warnings.iter().any(|w| !w.stored) {
            sm.to(FetchState::Done);
            return Ok(FetchOutcome::Fetched(FetchReport {
                url: url.clone(),
                final_url: fetched.final_url,
                hops: fetched.hops,
                stored: Vec::new(),
                warnings,
            }));
        }

        sm.to(FetchState::Committing);
        let stored = match self.commit(&fetched, props, body) {
            Ok(stored) => stored,
            Err(e) => return Err(sm.fail(e)),
        };
        sm.to(FetchState::Done);

        Ok(FetchOutcome::Fetched(FetchReport {
            url: url.clone(),
            final_url: fetched.final_url,
            hops: fetched.hops,
            stored,
            warnings,
        }))
    }

    /// Issue requests until a 2xx arrives, following redirects per
    ///  `policy`. `None` means the server answered not-modified.
    async fn request_chain(
        &self,
        sm: &mut StateMachine<'_>,
        url: &str,
        policy: RedirectPolicy,
        if_modified_since: Option<DateTime<Utc>>,
    ) -> Result<Option<Fetched>, FetchError> {
        let mut hops = vec![url.to_string()];
        let mut request_url = url.to_string();
        let mut redirects = 0usize;

        loop {
            sm.to(FetchState::Connecting);
            self.limiter.pace().await;

            let conditional = if redirects == 0 { if_modified_since } else { None };
            if conditional.is_some() {
                sm.to(FetchState::ConditionalCheck);
            }
            let request = FetchRequest {
                url: request_url.clone(),
                if_modified_since: conditional,
                au_id: self.au.id().clone(),
            };
            let response = match self.transport.fetch(request).await {
                Ok(response) => response,
                Err(e) => {
                    return Err(sm.fail(FetchError::Transport {
                        url: request_url,
                        message: e.message,
                        retryable: e.retryable,
                    }))
                }
            };

            if response.status == 304 {
                return Ok(None);
            }

            if response.is_redirect() {
                sm.to(FetchState::Redirected);
                let location = response.redirect_target().map(str::to_string);
                let target = location
                    .as_deref()
                    .and_then(|loc| resolve_target(&request_url, loc, self.au.normalize_redirects()));
                let Some(target) = target else {
                    return Err(sm.fail(FetchError::MalformedTarget {
                        url: request_url,
                        target: location,
                        hops,
                    }));
                };

                if policy == RedirectPolicy::DontFollow {
                    hops.push(target.clone());
                    return Err(sm.fail(FetchError::RedirectNotFollowed {
                        url: request_url,
                        target,
                        hops,
                    }));
                }

                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    hops.push(target);
                    return Err(sm.fail(FetchError::TooManyRedirects { url: url.to_string(), hops }));
                }

                let in_spec = !policy.requires_spec() || self.au.should_be_cached(&target);
                let on_host = !policy.requires_same_host() || same_host(&request_url, &target);
                if !(in_spec && on_host) {
                    hops.push(target.clone());
                    return Err(sm.fail(FetchError::OutsideSpec {
                        url: request_url,
                        target,
                        hops,
                    }));
                }

                tracing::debug!("{} redirected to {}", request_url, target);
                // a slash appended to the same path is the same node
                if !is_directory_redirect(&request_url, &target) {
                    hops.push(target.clone());
                }
                request_url = target;
                continue;
            }

            if !(200..300).contains(&response.status) {
                return Err(sm.fail(FetchError::HttpStatus {
                    url: request_url,
                    code: response.status,
                    retryable: is_retryable_status(response.status),
                }));
            }

            sm.to(FetchState::Fetching);
            return Ok(Some(Fetched {
                response,
                hops,
                final_url: request_url,
            }));
        }
    }

    /// Run the built-in checks and the AU validator, mapping each
    ///  signal to an action. Returns the warnings, or the first failure.
    fn validate(
        &self,
        fetched: &Fetched,
        props: &VersionProps,
        body: &Bytes,
    ) -> Result<Vec<ValidationWarning>, FetchError> {
        let url = &fetched.final_url;
        let mut signals = Vec::new();

        let declared = fetched
            .response
            .header("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(expected) = declared {
            let actual = body.len() as u64;
            if expected != actual {
                let kind = ValidationKind::WrongLength { expected, actual };
                self.notify(
                    NotificationKind::FileVerification,
                    url,
                    Severity::Warning,
                    kind.message(url),
                );
                signals.push(kind);
            }
        }
        if body.is_empty() {
            signals.push(ValidationKind::EmptyFile);
        }
        if let Some(validator) = self.au.validator() {
            if let Err(kind) = validator.validate(body, props) {
                signals.push(kind);
            }
        }

        let mut warnings = Vec::new();
        for kind in signals {
            let action = self.au.result_map().action_for(&kind);
            tracing::debug!("{}: {} -> {:?}", url, kind, action);
            match action {
                ResultAction::Accept => {}
                ResultAction::WarnAndStore | ResultAction::WarnNoStore => {
                    warnings.push(ValidationWarning {
                        message: kind.message(url),
                        kind,
                        stored: action.stores(),
                    });
                }
                ResultAction::Fail { retryable } => {
                    return Err(FetchError::Validation {
                        url: url.clone(),
                        kind,
                        retryable,
                    });
                }
            }
        }
        Ok(warnings)
    }

    /// Commit the fetched bytes at every hop of the chain. Each hop
    ///  points at the next; only the last one keeps `content_url`.
    fn commit(
        &self,
        fetched: &Fetched,
        mut props: VersionProps,
        body: Bytes,
    ) -> Result<Vec<(String, u32)>, FetchError> {
        props.checksum = self.au.checksum().map(|alg| alg.checksum(&body));
        let redirected = props.orig_url.is_some();
        let mut stored = Vec::with_capacity(fetched.hops.len());
        let mut was_suspect = false;

        for (i, hop) in fetched.hops.iter().enumerate() {
            let mut hop_props = props.clone();
            if redirected {
                hop_props.redirected_to = fetched.hops.get(i + 1).cloned();
                if hop_props.redirected_to.is_some() {
                    hop_props.content_url = None;
                }
            }

            let node = self.store.open(hop);
            let previous = node.current_version();
            was_suspect |= node.is_current_suspect();

            let version = self.store.commit(hop, body.clone(), hop_props)?;
            if let Some(previous) = previous {
                if !previous.has_same_content(&version) {
                    self.notify(
                        NotificationKind::NewFileVersion,
                        version.url(),
                        Severity::Info,
                        format!("Collected an additional version: {}", version.url()),
                    );
                }
            }
            stored.push((version.url().to_string(), version.ordinal()));
        }

        if was_suspect {
            self.store.recompute_current_suspect_count();
        }
        Ok(stored)
    }
}

/// Record the redirect chain on the proposed properties: where the
///  fetch started, its first hop and the url the content came from
fn chain_props(url: &str, fetched: &Fetched, mut props: VersionProps) -> VersionProps {
    if fetched.hops.len() > 1 || fetched.final_url != url {
        props.orig_url = Some(url.to_string());
        props.redirected_to = fetched.hops.get(1).cloned();
        props.content_url = Some(fetched.final_url.clone());
    }
    props
}

/// Properties derived from response headers
fn response_props(response: &TransportResponse) -> VersionProps {
    let mut props = VersionProps::new();
    props.headers = response.headers.clone();
    props.content_type = response.header("content-type").map(str::to_string);
    props.last_modified = response
        .header("last-modified")
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|t| t.with_timezone(&Utc));
    props
}
