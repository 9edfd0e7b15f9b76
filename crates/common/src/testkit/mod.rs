/// In-process fixtures for store, archive and ingestion tests
///
/// Nothing here touches the network or the filesystem: the transport is
/// scripted per url, notifications are recorded, version creation time
/// is driven by hand and archives are built in memory.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::{MockTransport, RecordingSink};
///
/// #[tokio::test]
/// async fn test_fetch() -> anyhow::Result<()> {
///     let transport = MockTransport::new();
///     transport.respond("http://h/x", TransportResponse::ok("hello"));
///
///     let pipeline = IngestionPipeline::new(au, store, Arc::new(transport.clone()), &pool)
///         .with_sink(Arc::new(RecordingSink::default()));
///     pipeline.fetch(&node, RedirectPolicy::StoreAllInSpec, false).await?;
///
///     assert_eq!(transport.requests().len(), 1);
///     Ok(())
/// }
/// ```
mod archives;
mod clock;
mod sink;
mod transport;

pub use archives::{gzip_bytes, tar_bytes, zip_bytes, ArchiveFixture};
pub use clock::ManualClock;
pub use sink::RecordingSink;
pub use transport::MockTransport;

/// Install a test-friendly fmt subscriber honoring `RUST_LOG`.
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .from_env_lossy();
    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_test_writer()
        .with_filter(env_filter);
    let _ = tracing_subscriber::registry().with(layer).try_init();
}
