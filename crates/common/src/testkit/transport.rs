use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::ingest::{FetchRequest, Transport, TransportError, TransportResponse};

type Scripted = Result<TransportResponse, TransportError>;

#[derive(Default)]
struct MockInner {
    // per-url queue; the last entry keeps answering once the rest are used
    scripts: HashMap<String, VecDeque<Scripted>>,
    requests: Vec<(Instant, FetchRequest)>,
}

/// Transport answering from per-url scripts. Unscripted urls get a 404.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`
    pub fn respond(&self, url: &str, response: TransportResponse) {
        self.push(url, Ok(response));
    }

    /// Queue a transport failure for `url`
    pub fn fail(&self, url: &str, error: TransportError) {
        self.push(url, Err(error));
    }

    fn push(&self, url: &str, scripted: Scripted) {
        self.inner
            .lock()
            .scripts
            .entry(url.to_string())
            .or_default()
            .push_back(scripted);
    }

    /// Every request seen, in order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.inner
            .lock()
            .requests
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    /// When each request arrived, on the tokio clock
    pub fn request_times(&self) -> Vec<Instant> {
        self.inner.lock().requests.iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError> {
        let mut inner = self.inner.lock();
        inner.requests.push((Instant::now(), request.clone()));
        let Some(queue) = inner.scripts.get_mut(&request.url) else {
            return Ok(TransportResponse::status(404));
        };
        let scripted = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        scripted.unwrap_or_else(|| Ok(TransportResponse::status(404)))
    }
}
