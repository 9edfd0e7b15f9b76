//! Tests for the versioned node store
mod common;

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use ::common::au::AuId;
use ::common::store::{Repository, StoreError, VersionProps, VersionedStore};
use ::common::testkit::ManualClock;

#[test]
fn test_versions_newest_first() {
    let store = VersionedStore::new(AuId::new("au"));
    store.commit("http://h/x", "abc", VersionProps::new()).unwrap();
    store.commit("http://h/x", "defg", VersionProps::new()).unwrap();

    let node = store.open("http://h/x");
    let contents: Vec<_> = node.all_versions().iter().map(|v| v.content()).collect();
    assert_eq!(contents, vec!["defg", "abc"]);
    assert_eq!(node.current_ordinal(), 2);

    assert_eq!(node.version(1).content().unwrap(), "abc");
    assert_eq!(node.version(1).properties().unwrap().content_length, 3);
    assert!(node.version(2).exists());

    let missing = node.version(3);
    assert!(!missing.exists());
    assert!(matches!(
        missing.content(),
        Err(StoreError::NotFound { ordinal: Some(3), .. })
    ));
    assert!(missing.open().is_err());
}

#[test]
fn test_version_stream_reads_content() {
    let store = VersionedStore::new(AuId::new("au"));
    let version = store.commit("http://h/x", "streamed", VersionProps::new()).unwrap();
    let mut out = String::new();
    version.open().read_to_string(&mut out).unwrap();
    assert_eq!(out, "streamed");
}

#[test]
fn test_unstored_node_has_no_content() {
    let store = VersionedStore::new(AuId::new("au"));
    let node = store.open("http://h/nothing");
    assert!(!node.exists());
    assert!(!node.has_content());
    assert!(node.current_version().is_none());
    assert!(node.all_versions().is_empty());
    assert_eq!(node.current_ordinal(), 0);
}

#[test]
fn test_ancestors_exist_without_content() {
    let store = VersionedStore::new(AuId::new("au"));
    store.commit("http://h/a/b/c", "leaf", VersionProps::new()).unwrap();

    let parent = store.open("http://h/a/b");
    assert!(parent.exists());
    assert!(!parent.has_content());
    let children: Vec<_> = store
        .open("http://h/a")
        .children()
        .iter()
        .map(|n| n.url().to_string())
        .collect();
    assert_eq!(children, vec!["http://h/a/b"]);
}

#[test]
fn test_trailing_slash_is_same_node() {
    let store = VersionedStore::new(AuId::new("au"));
    store.commit("http://h/dir/", "listing", VersionProps::new()).unwrap();
    let node = store.open("http://h/dir");
    assert!(node.has_content());
    assert_eq!(node.current_version().unwrap().url(), "http://h/dir");
}

#[test]
fn test_clock_drives_creation_time() {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let store = VersionedStore::with_clock(AuId::new("au"), Arc::new(clock.clone()));

    let first = store.commit("http://h/x", "a", VersionProps::new()).unwrap();
    clock.advance(Duration::hours(1));
    let second = store.commit("http://h/x", "b", VersionProps::new()).unwrap();

    assert_eq!(first.created(), start);
    assert_eq!(second.created(), start + Duration::hours(1));
    // no Last-Modified header: creation time stands in
    assert_eq!(first.last_modified(), start);
}

#[test]
fn test_same_content_detection() {
    let store = VersionedStore::new(AuId::new("au"));
    let a = store.commit("http://h/x", "same", VersionProps::new()).unwrap();
    let b = store.commit("http://h/x", "same", VersionProps::new()).unwrap();
    let c = store.commit("http://h/x", "different", VersionProps::new()).unwrap();
    assert!(a.has_same_content(&b));
    assert!(!b.has_same_content(&c));
}

#[test]
fn test_suspect_count_follows_current_versions() {
    let store = VersionedStore::new(AuId::new("au"));
    store.commit("http://h/x", "1", VersionProps::new()).unwrap();
    store.commit("http://h/y", "1", VersionProps::new()).unwrap();
    store.mark_suspect("http://h/x", 1);
    store.mark_suspect("http://h/y", 1);
    assert_eq!(store.recompute_current_suspect_count(), 2);

    store.commit("http://h/x", "2", VersionProps::new()).unwrap();
    assert!(store.is_suspect("http://h/x", 1));
    assert!(!store.open("http://h/x").is_current_suspect());
    assert_eq!(store.recompute_current_suspect_count(), 1);
    assert_eq!(store.current_suspect_count(), 1);
}

#[test]
fn test_repository_keeps_one_store_per_au() {
    let repo = Repository::new();
    let a = AuId::new("a");
    let b = AuId::new("b");
    repo.store(&a).commit("http://h/x", "in a", VersionProps::new()).unwrap();

    assert!(repo.store(&a).ptr_eq(&repo.store(&a)));
    assert!(repo.open(&a, "http://h/x").has_content());
    assert!(!repo.open(&b, "http://h/x").has_content());
    assert_eq!(repo.au_ids(), vec![a, b]);
}

#[test]
fn test_empty_url_rejected() {
    let store = VersionedStore::new(AuId::new("au"));
    assert!(matches!(
        store.commit("", "x", VersionProps::new()),
        Err(StoreError::InvalidPath(_))
    ));
}

#[test]
fn test_concurrent_readers_never_see_partial_commits() {
    const COMMITS: u32 = 200;
    let store = VersionedStore::new(AuId::new("au"));
    store.commit("http://h/stable", "fixed", VersionProps::new()).unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let done = &done;
                scope.spawn(move || {
                    let busy = store.open("http://h/busy");
                    let stable = store.open("http://h/stable");
                    let mut last_seen = 0;
                    let mut reads = 0u32;
                    while !done.load(Ordering::SeqCst) || reads == 0 {
                        let ordinals: Vec<u32> =
                            busy.all_versions().iter().map(|v| v.ordinal()).collect();
                        let expected: Vec<u32> = (1..=ordinals.len() as u32).rev().collect();
                        assert_eq!(ordinals, expected);
                        assert!(ordinals.len() as u32 >= last_seen);
                        last_seen = ordinals.len() as u32;

                        let current = busy.current_ordinal();
                        assert!(current >= last_seen);
                        if let Some(version) = busy.current_version() {
                            assert_eq!(version.content(), format!("v{}", version.ordinal()));
                        }

                        assert_eq!(stable.all_versions().len(), 1);
                        assert_eq!(stable.current_version().unwrap().content(), "fixed");
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for n in 1..=COMMITS {
            store
                .commit("http://h/busy", format!("v{}", n), VersionProps::new())
                .unwrap();
            store
                .commit(&format!("http://h/other/{}", n), "o", VersionProps::new())
                .unwrap();
        }
        done.store(true, Ordering::SeqCst);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
    });

    assert_eq!(store.open("http://h/busy").current_ordinal(), COMMITS);
    assert_eq!(store.open("http://h/other").children().len(), COMMITS as usize);
}
