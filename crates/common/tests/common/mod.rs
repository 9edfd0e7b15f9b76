//! Shared helpers for store, archive and ingestion integration tests
#![allow(dead_code)]

use std::sync::Arc;

use common::archive::{ArchiveTypes, ArchiveView};
use common::au::Au;
use common::ingest::IngestionPipeline;
use common::rate_limiter::{Rate, RateLimiterPool};
use common::store::{VersionProps, VersionedStore};
use common::testkit::{self, MockTransport, RecordingSink};

/// An AU that paces nothing and recognizes the default container types
pub fn test_au(id: &str) -> Au {
    testkit::init_tracing();
    Au::new(id, "test-plugin")
        .with_fetch_rate(Rate::Unlimited)
        .with_archive_types(ArchiveTypes::default())
}

/// A pipeline over a fresh store for `au`, recording its notifications
pub fn setup_pipeline(au: Au, transport: &MockTransport) -> (IngestionPipeline, RecordingSink) {
    let store = VersionedStore::new(au.id().clone());
    let sink = RecordingSink::default();
    let pipeline = IngestionPipeline::new(
        Arc::new(au),
        store,
        Arc::new(transport.clone()),
        &RateLimiterPool::new(),
    )
    .with_sink(Arc::new(sink.clone()));
    (pipeline, sink)
}

/// A fresh store and a view over it for `au`
pub fn setup_view(au: Au) -> ArchiveView {
    let store = VersionedStore::new(au.id().clone());
    ArchiveView::new(store, Arc::new(au))
}

/// Commit every `(url, content)` pair once
pub fn populate(store: &VersionedStore, files: &[(&str, &str)]) {
    for (url, content) in files {
        store
            .commit(url, content.to_string(), VersionProps::new())
            .unwrap();
    }
}
