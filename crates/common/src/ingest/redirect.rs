use serde::{Deserialize, Serialize};
use url::Url;

/// Longest redirect chain followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// How a fetch treats 3xx responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectPolicy {
    /// Fail with the target instead of following
    DontFollow,
    /// Follow while every hop is in the crawl spec, storing each hop
    StoreAllInSpec,
    /// Follow while every hop is in the crawl spec and on the same host
    FollowOnHostInSpec,
    /// Follow while every hop is on the same host
    FollowOnHost,
}

impl RedirectPolicy {
    pub fn requires_spec(&self) -> bool {
        matches!(
            self,
            RedirectPolicy::StoreAllInSpec | RedirectPolicy::FollowOnHostInSpec
        )
    }

    pub fn requires_same_host(&self) -> bool {
        matches!(
            self,
            RedirectPolicy::FollowOnHostInSpec | RedirectPolicy::FollowOnHost
        )
    }
}

/// Absolute target of a redirect from `base`. With `normalize` the
///  target is re-serialized through url parsing (lower-cased scheme and
///  host, resolved dot segments) and loses its fragment.
pub fn resolve_target(base: &str, location: &str, normalize: bool) -> Option<String> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    let resolved = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(location).ok()?,
        Err(_) => return None,
    };
    if !resolved.has_host() {
        return None;
    }
    if normalize {
        let mut resolved = resolved;
        resolved.set_fragment(None);
        Some(resolved.to_string())
    } else if location.contains("://") {
        Some(location.to_string())
    } else {
        Some(resolved.to_string())
    }
}

pub fn same_host(a: &str, b: &str) -> bool {
    let host = |u: &str| {
        Url::parse(u)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
    };
    matches!((host(a), host(b)), (Some(x), Some(y)) if x == y)
}

/// `to` is `from` with a slash appended
pub fn is_directory_redirect(from: &str, to: &str) -> bool {
    !from.ends_with('/') && to.len() == from.len() + 1 && to.starts_with(from) && to.ends_with('/')
}
