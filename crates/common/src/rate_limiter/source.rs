use crate::au::Au;

/// Which key an AU's fetches are paced under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimiterSource {
    PerAu,
    PerPlugin,
    /// Hostname of the URL held in the named AU param
    PerHost { param: String },
    PerTitleAttribute {
        attribute: String,
        default: Option<String>,
    },
    Key(String),
}

impl RateLimiterSource {
    /// Parse a configured source string. Unrecognized strings
    ///  fall back to [`RateLimiterSource::PerAu`].
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        let (kind, arg) = match source.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (source, None),
        };
        match (kind.to_ascii_lowercase().as_str(), arg) {
            ("au", None) => RateLimiterSource::PerAu,
            ("plugin", None) => RateLimiterSource::PerPlugin,
            ("host", Some(param)) if !param.is_empty() => RateLimiterSource::PerHost {
                param: param.to_string(),
            },
            ("title_attribute", Some(rest)) if !rest.is_empty() => {
                let (attribute, default) = match rest.split_once(':') {
                    Some((attr, dflt)) => (attr, Some(dflt.to_string())),
                    None => (rest, None),
                };
                RateLimiterSource::PerTitleAttribute {
                    attribute: attribute.to_string(),
                    default,
                }
            }
            ("key", Some(key)) if !key.is_empty() => RateLimiterSource::Key(key.to_string()),
            _ => {
                tracing::debug!("Unknown rate limiter source {:?}, pacing per AU", source);
                RateLimiterSource::PerAu
            }
        }
    }

    /// Pool key for `au`; unresolvable sources fall back to the
    ///  per-AU key
    pub fn key_for(&self, au: &Au) -> String {
        let per_au = || format!("au:{}", au.id());
        match self {
            RateLimiterSource::PerAu => per_au(),
            RateLimiterSource::PerPlugin => format!("plugin:{}", au.plugin_id()),
            RateLimiterSource::PerHost { param } => {
                let host = au
                    .param(param)
                    .and_then(|u| url::Url::parse(u).ok())
                    .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
                match host {
                    Some(host) => format!("host:{}", host),
                    None => {
                        tracing::debug!(
                            "AU {} has no host for param {:?}, pacing per AU",
                            au.id(),
                            param
                        );
                        per_au()
                    }
                }
            }
            RateLimiterSource::PerTitleAttribute { attribute, default } => {
                match au.title_attribute(attribute).or(default.as_deref()) {
                    Some(value) => format!("{}:{}", attribute, value),
                    None => {
                        tracing::debug!(
                            "AU {} has no title attribute {:?}, pacing per AU",
                            au.id(),
                            attribute
                        );
                        per_au()
                    }
                }
            }
            RateLimiterSource::Key(key) => key.clone(),
        }
    }
}
