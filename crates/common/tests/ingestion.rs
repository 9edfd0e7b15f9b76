//! Integration tests for fetching content into an AU's store
mod common;

use std::sync::Arc;

use ::common::au::CrawlRules;
use ::common::ingest::{
    FetchError, FetchOutcome, FetchReport, NotificationKind, RedirectPolicy, ResultAction, ResultMap,
    Severity, TransportError, TransportResponse, ValidationKind,
};
use ::common::store::VersionProps;
use ::common::testkit::MockTransport;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

fn fetched(outcome: FetchOutcome) -> FetchReport {
    match outcome {
        FetchOutcome::Fetched(report) => report,
        FetchOutcome::NotModified => panic!("expected content, got not-modified"),
    }
}

fn in_spec_au() -> ::common::au::Au {
    common::test_au("au").with_crawl_spec(CrawlRules::include(&[r"^http://h/"]).unwrap())
}

#[tokio::test]
async fn test_not_modified_leaves_history_alone() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::not_modified());
    let (pipeline, sink) = common::setup_pipeline(in_spec_au(), &transport);

    let lm = Utc.with_ymd_and_hms(2023, 3, 4, 5, 6, 7).unwrap();
    pipeline
        .store()
        .commit("http://h/x", "cached", VersionProps::new().with_last_modified(lm))
        .unwrap();
    let node = pipeline.store().open("http://h/x");

    let outcome = pipeline
        .fetch(&node, RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::NotModified);
    assert_eq!(node.all_versions().len(), 1);
    assert_eq!(
        transport.requests()[0].if_modified_since_header().as_deref(),
        Some("Sat, 04 Mar 2023 05:06:07 GMT")
    );
    assert!(sink.notifications().is_empty());
}

#[tokio::test]
async fn test_two_hop_redirect_to_directory() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::redirect(301, "http://h/y"));
    transport.respond("http://h/y", TransportResponse::redirect(302, "/y/"));
    transport.respond("http://h/y/", TransportResponse::ok("bar"));
    let (pipeline, _) = common::setup_pipeline(in_spec_au(), &transport);
    let store = pipeline.store().clone();

    let report = fetched(
        pipeline
            .fetch(&store.open("http://h/x"), RedirectPolicy::StoreAllInSpec, false)
            .await
            .unwrap(),
    );
    assert_eq!(report.hops, vec!["http://h/x", "http://h/y"]);
    assert_eq!(report.final_url, "http://h/y/");
    assert_eq!(
        report.stored,
        vec![("http://h/x".to_string(), 1), ("http://h/y".to_string(), 1)]
    );

    let x = store.open("http://h/x").current_version().unwrap();
    assert_eq!(x.properties().redirected_to.as_deref(), Some("http://h/y"));
    assert_eq!(x.properties().orig_url.as_deref(), Some("http://h/x"));

    let y = store.open("http://h/y").current_version().unwrap();
    assert_eq!(y.content(), "bar");
    assert!(y.properties().redirected_to.is_none());
    assert_eq!(y.properties().content_url.as_deref(), Some("http://h/y/"));

    // the slash variant shares the node, nothing new under it
    assert!(store.open("http://h/y").children().is_empty());
    assert_eq!(store.open("http://h").children().len(), 2);
}

#[tokio::test]
async fn test_three_hop_redirect_stores_every_hop() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::redirect(301, "http://h/y"));
    transport.respond("http://h/y", TransportResponse::redirect(301, "http://h/z"));
    transport.respond("http://h/z", TransportResponse::ok("bar"));
    let (pipeline, _) = common::setup_pipeline(in_spec_au(), &transport);
    let store = pipeline.store().clone();

    pipeline
        .fetch(&store.open("http://h/x"), RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap();

    let props = |url: &str| store.open(url).current_version().unwrap().properties().clone();
    assert_eq!(props("http://h/x").redirected_to.as_deref(), Some("http://h/y"));
    assert_eq!(props("http://h/y").redirected_to.as_deref(), Some("http://h/z"));
    assert_eq!(props("http://h/z").content_url.as_deref(), Some("http://h/z"));
    assert_eq!(store.open("http://h/y").current_version().unwrap().content(), "bar");
}

#[tokio::test]
async fn test_validator_sees_redirect_chain() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::redirect(301, "http://h/y"));
    transport.respond("http://h/y", TransportResponse::ok("bar"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let au = in_spec_au().with_validator(move |_: &Bytes, props: &VersionProps| {
        recorded.lock().push(props.clone());
        Ok(())
    });
    let (pipeline, _) = common::setup_pipeline(au, &transport);

    pipeline
        .fetch(&pipeline.store().open("http://h/x"), RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].orig_url.as_deref(), Some("http://h/x"));
    assert_eq!(seen[0].redirected_to.as_deref(), Some("http://h/y"));
    assert_eq!(seen[0].content_url.as_deref(), Some("http://h/y"));

    // committed hops carry the same chain
    let x = pipeline.store().open("http://h/x").current_version().unwrap();
    assert_eq!(x.properties().orig_url.as_deref(), Some("http://h/x"));
    assert_eq!(x.properties().redirected_to.as_deref(), Some("http://h/y"));
    assert!(x.properties().content_url.is_none());
    let y = pipeline.store().open("http://h/y").current_version().unwrap();
    assert_eq!(y.properties().orig_url.as_deref(), Some("http://h/x"));
    assert_eq!(y.properties().content_url.as_deref(), Some("http://h/y"));
}

#[tokio::test]
async fn test_validator_sees_no_chain_without_redirect() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::ok("bar"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let au = in_spec_au().with_validator(move |_: &Bytes, props: &VersionProps| {
        recorded.lock().push(props.clone());
        Ok(())
    });
    let (pipeline, _) = common::setup_pipeline(au, &transport);

    pipeline
        .fetch(&pipeline.store().open("http://h/x"), RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap();
    let seen = seen.lock();
    assert!(seen[0].orig_url.is_none());
    assert!(seen[0].content_url.is_none());
}

#[tokio::test]
async fn test_redirect_policies() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::redirect(302, "http://elsewhere/x"));
    let (pipeline, _) = common::setup_pipeline(in_spec_au(), &transport);
    let node = pipeline.store().open("http://h/x");

    let err = pipeline
        .fetch(&node, RedirectPolicy::DontFollow, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RedirectNotFollowed { .. }));
    assert_eq!(
        err.hops().unwrap(),
        &["http://h/x".to_string(), "http://elsewhere/x".to_string()]
    );

    for policy in [
        RedirectPolicy::StoreAllInSpec,
        RedirectPolicy::FollowOnHostInSpec,
        RedirectPolicy::FollowOnHost,
    ] {
        let err = pipeline.fetch(&node, policy, false).await.unwrap_err();
        assert!(matches!(err, FetchError::OutsideSpec { .. }), "{:?}", policy);
        assert!(!err.is_retryable());
    }
    assert!(!node.has_content());
    assert_eq!(transport.requested_urls().len(), 4);
}

#[tokio::test]
async fn test_follow_on_host_ignores_crawl_spec() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::redirect(302, "http://h/private/x"));
    transport.respond("http://h/private/x", TransportResponse::ok("ok"));
    let au = common::test_au("au")
        .with_crawl_spec(CrawlRules::include(&[r"^http://h/x$"]).unwrap());
    let (pipeline, _) = common::setup_pipeline(au, &transport);
    let node = pipeline.store().open("http://h/x");

    let err = pipeline
        .fetch(&node, RedirectPolicy::FollowOnHostInSpec, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::OutsideSpec { .. }));

    let report = fetched(
        pipeline
            .fetch(&node, RedirectPolicy::FollowOnHost, false)
            .await
            .unwrap(),
    );
    assert_eq!(report.final_url, "http://h/private/x");
}

#[tokio::test]
async fn test_redirect_loop_gives_up() {
    let transport = MockTransport::new();
    transport.respond("http://h/a", TransportResponse::redirect(302, "http://h/b"));
    transport.respond("http://h/b", TransportResponse::redirect(302, "http://h/a"));
    let (pipeline, _) = common::setup_pipeline(in_spec_au(), &transport);
    let node = pipeline.store().open("http://h/a");

    let err = pipeline
        .fetch(&node, RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::TooManyRedirects { .. }));
    assert_eq!(transport.requests().len(), 11);
    assert!(!node.has_content());
}

#[tokio::test]
async fn test_malformed_redirect() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::status(302));
    transport.respond("http://h/y", TransportResponse::redirect(301, "http://[broken"));
    let (pipeline, _) = common::setup_pipeline(in_spec_au(), &transport);

    for url in ["http://h/x", "http://h/y"] {
        let err = pipeline
            .fetch(&pipeline.store().open(url), RedirectPolicy::StoreAllInSpec, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedTarget { .. }), "{}", url);
    }
}

#[tokio::test]
async fn test_length_mismatch_fails_by_default() {
    let transport = MockTransport::new();
    transport.respond(
        "http://h/x",
        TransportResponse::ok("short").with_header("Content-Length", "100"),
    );
    let (pipeline, sink) = common::setup_pipeline(in_spec_au(), &transport);
    let node = pipeline.store().open("http://h/x");

    let err = pipeline
        .fetch(&node, RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::Validation {
            kind: ValidationKind::WrongLength { expected: 100, actual: 5 },
            ..
        }
    ));
    assert!(err.is_retryable());
    assert!(!node.has_content());

    let notes = sink.of_kind(NotificationKind::FileVerification);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].severity, Severity::Warning);
    assert_eq!(
        notes[0].message,
        "File size (5) differs from Content-Length header (100): http://h/x"
    );
}

#[tokio::test]
async fn test_length_mismatch_mapped_to_warning_is_stored() {
    let transport = MockTransport::new();
    transport.respond(
        "http://h/x",
        TransportResponse::ok("short").with_header("Content-Length", "100"),
    );
    let au = in_spec_au()
        .with_result_map(ResultMap::new().map("wrong_length", ResultAction::WarnAndStore));
    let (pipeline, sink) = common::setup_pipeline(au, &transport);
    let node = pipeline.store().open("http://h/x");

    let report = fetched(
        pipeline
            .fetch(&node, RedirectPolicy::StoreAllInSpec, false)
            .await
            .unwrap(),
    );
    assert!(report.is_stored());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].stored);
    assert_eq!(node.current_version().unwrap().content(), "short");
    assert_eq!(sink.of_kind(NotificationKind::FileVerification).len(), 1);
}

#[tokio::test]
async fn test_warn_no_store_commits_nothing() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::ok("<broken"));
    let au = in_spec_au()
        .with_validator(|content: &Bytes, _: &VersionProps| {
            if content.starts_with(b"<broken") {
                Err(ValidationKind::Custom("unbalanced_markup".into()))
            } else {
                Ok(())
            }
        })
        .with_result_map(ResultMap::new().map("unbalanced_markup", ResultAction::WarnNoStore));
    let (pipeline, _) = common::setup_pipeline(au, &transport);
    pipeline
        .store()
        .commit("http://h/x", "<ok/>", VersionProps::new())
        .unwrap();
    let node = pipeline.store().open("http://h/x");

    let report = fetched(
        pipeline
            .fetch(&node, RedirectPolicy::StoreAllInSpec, true)
            .await
            .unwrap(),
    );
    assert!(!report.is_stored());
    assert_eq!(report.warnings.len(), 1);
    assert!(!report.warnings[0].stored);
    assert_eq!(node.all_versions().len(), 1);
    assert_eq!(node.current_version().unwrap().content(), "<ok/>");
}

#[tokio::test]
async fn test_custom_validation_failure_by_default() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::ok("<broken"));
    let au = in_spec_au().with_validator(|_: &Bytes, _: &VersionProps| {
        Err(ValidationKind::Custom("unbalanced_markup".into()))
    });
    let (pipeline, _) = common::setup_pipeline(au, &transport);
    let err = pipeline
        .fetch(&pipeline.store().open("http://h/x"), RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Validation { retryable: false, .. }));
}

#[tokio::test]
async fn test_matching_rule_checked_in_order() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::ok("payload"));
    let au = in_spec_au()
        .with_validator(|_: &Bytes, _: &VersionProps| {
            Err(ValidationKind::Custom("soft_problem".into()))
        })
        .with_result_map(
            ResultMap::new()
                .map_matching(
                    |kind: &ValidationKind| kind.name().starts_with("soft_"),
                    ResultAction::Accept,
                )
                .map("soft_problem", ResultAction::Fail { retryable: true }),
        );
    let (pipeline, _) = common::setup_pipeline(au, &transport);
    let node = pipeline.store().open("http://h/x");
    let report = fetched(
        pipeline
            .fetch(&node, RedirectPolicy::StoreAllInSpec, false)
            .await
            .unwrap(),
    );
    assert!(report.warnings.is_empty());
    assert!(node.has_content());
}

#[tokio::test]
async fn test_empty_file_stored_with_warning() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::ok(Bytes::new()));
    let (pipeline, _) = common::setup_pipeline(in_spec_au(), &transport);
    let node = pipeline.store().open("http://h/x");

    let report = fetched(
        pipeline
            .fetch(&node, RedirectPolicy::StoreAllInSpec, false)
            .await
            .unwrap(),
    );
    assert_eq!(report.warnings[0].kind, ValidationKind::EmptyFile);
    assert_eq!(report.warnings[0].message, "Empty file stored");
    assert!(node.has_content());
    assert_eq!(node.current_version().unwrap().properties().content_length, 0);
}

#[tokio::test]
async fn test_transport_failure_classified() {
    let transport = MockTransport::new();
    transport.fail("http://h/x", TransportError::retryable("connection reset"));
    transport.fail("http://h/y", TransportError::fatal("unknown host"));
    let (pipeline, _) = common::setup_pipeline(in_spec_au(), &transport);

    let err = pipeline
        .fetch(&pipeline.store().open("http://h/x"), RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
    assert!(err.is_retryable());

    let err = pipeline
        .fetch(&pipeline.store().open("http://h/y"), RedirectPolicy::StoreAllInSpec, false)
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_new_version_notification_only_on_change() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::ok("one"));
    transport.respond("http://h/x", TransportResponse::ok("one"));
    transport.respond("http://h/x", TransportResponse::ok("two"));
    let (pipeline, sink) = common::setup_pipeline(in_spec_au(), &transport);
    let node = pipeline.store().open("http://h/x");

    for _ in 0..3 {
        pipeline
            .fetch(&node, RedirectPolicy::StoreAllInSpec, true)
            .await
            .unwrap();
    }
    assert_eq!(node.all_versions().len(), 3);
    let notes = sink.of_kind(NotificationKind::NewFileVersion);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].url, "http://h/x");
}

#[tokio::test]
async fn test_refetch_clears_suspect_count() {
    let transport = MockTransport::new();
    transport.respond("http://h/x", TransportResponse::ok("fresh"));
    let (pipeline, _) = common::setup_pipeline(in_spec_au(), &transport);
    let store = pipeline.store().clone();
    store.commit("http://h/x", "damaged", VersionProps::new()).unwrap();
    store.mark_suspect("http://h/x", 1);
    assert_eq!(store.recompute_current_suspect_count(), 1);

    pipeline
        .fetch(&store.open("http://h/x"), RedirectPolicy::StoreAllInSpec, true)
        .await
        .unwrap();
    assert_eq!(store.current_suspect_count(), 0);
}
