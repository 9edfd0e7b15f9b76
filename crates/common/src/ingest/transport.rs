use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::au::AuId;

/// `If-Modified-Since` date format
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub au_id: AuId,
}

impl FetchRequest {
    pub fn if_modified_since_header(&self) -> Option<String> {
        self.if_modified_since
            .map(|t| t.format(HTTP_DATE_FORMAT).to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    /// Redirect target, when the transport extracted one
    pub location: Option<String>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn not_modified() -> Self {
        Self {
            status: 304,
            ..Self::default()
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Redirect target from the explicit location or the `Location` header
    pub fn redirect_target(&self) -> Option<&str> {
        self.location
            .as_deref()
            .or_else(|| self.header("location"))
            .map(str::trim)
            .filter(|target| !target.is_empty())
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.status != 304
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub retryable: bool,
}

impl TransportError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Fetches bytes for a url. Sockets, TLS and timeouts live behind
///  this trait; timeouts surface as a retryable [`TransportError`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_if_modified_since_format() {
        let request = FetchRequest {
            url: "http://h/x".into(),
            if_modified_since: DateTime::from_timestamp(784_111_777, 0),
            au_id: AuId::new("au"),
        };
        assert_eq!(
            request.if_modified_since_header().unwrap(),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }

    #[test]
    fn test_redirect_target() {
        let resp = TransportResponse::status(302).with_header("Location", " http://h/y ");
        assert!(resp.is_redirect());
        assert_eq!(resp.redirect_target(), Some("http://h/y"));
        assert!(!TransportResponse::not_modified().is_redirect());
        assert_eq!(TransportResponse::redirect(301, "").redirect_target(), None);
    }
}
