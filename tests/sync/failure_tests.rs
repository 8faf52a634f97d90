// Tests for failure isolation and deletion safety

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use mirrorsync::source::MemorySource;
use mirrorsync::store::MemoryStore;
use mirrorsync::sync::{ItemAction, SyncOutcome};
use mirrorsync::{ErrorKind, MirrorError};

use crate::common::{engine, options};

#[tokio::test]
async fn test_one_failed_upload_does_not_stop_the_rest() {
    let items: Vec<(String, String)> = (0..5).map(|i| (format!("f{}", i), format!("v{}", i))).collect();
    let source = Arc::new(MemorySource::with_items(items));
    let store = Arc::new(MemoryStore::new());
    store.fail_put("p/f2");

    let engine = engine(&source, &store, options());
    let report = engine.run("p").await.unwrap();

    assert_eq!(report.uploaded_count(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "f2");
    assert_eq!(report.failed[0].action, ItemAction::Upload);
    assert!(report.failed[0].retryable);
    assert_eq!(report.outcome, SyncOutcome::Partial);

    // A rerun only has the failed item left to do.
    let again = engine.plan("p").await.unwrap();
    assert_eq!(again.plan.upload_names(), BTreeSet::from(["f2".to_string()]));
    assert!(again.plan.to_delete.is_empty());
}

#[tokio::test]
async fn test_failed_delete_is_recorded() {
    let source = Arc::new(MemorySource::with_items([("keep", "1")]));
    let store = Arc::new(MemoryStore::new());
    store.insert("p/keep", "1");
    store.insert("p/gone", "x");
    store.insert("p/stuck", "x");
    store.fail_delete("p/stuck");

    let report = engine(&source, &store, options()).run("p").await.unwrap();

    assert_eq!(report.deleted, vec!["gone".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "stuck");
    assert_eq!(report.failed[0].action, ItemAction::Delete);
    assert_eq!(report.failed[0].kind, ErrorKind::StoreUnavailable);
}

#[tokio::test]
async fn test_remote_listing_failure_aborts_before_deleting() {
    let source = Arc::new(MemorySource::with_items([("a", "1")]));
    source.fail_list(true);
    let store = Arc::new(MemoryStore::new());
    store.insert("p/a", "1");
    store.insert("p/b", "2");

    let result = engine(&source, &store, options()).run("p").await;

    assert!(matches!(result, Err(MirrorError::RemoteUnavailable { .. })));
    assert_eq!(store.delete_calls(), 0);
    assert_eq!(store.put_calls(), 0);
    assert_eq!(store.keys().len(), 2);
}

#[tokio::test]
async fn test_store_listing_failure_aborts_before_uploading() {
    let source = Arc::new(MemorySource::with_items([("a", "1")]));
    let store = Arc::new(MemoryStore::new());
    store.fail_list(true);

    let result = engine(&source, &store, options()).run("p").await;

    assert!(matches!(result, Err(MirrorError::StoreUnavailable { .. })));
    assert_eq!(store.put_calls(), 0);
}

#[tokio::test]
async fn test_unfetched_items_keep_their_stored_copy() {
    let source = Arc::new(MemorySource::with_items([("missing", "1"), ("flaky", "2"), ("secret", "3"), ("ok", "4")]));
    source.fail_fetch_not_found("missing");
    source.fail_fetch_unavailable("flaky");
    source.deny("secret");

    let store = Arc::new(MemoryStore::new());
    for key in ["p/missing", "p/flaky", "p/secret", "p/orphan"] {
        store.insert(key, "old");
    }

    let report = engine(&source, &store, options()).run("p").await.unwrap();

    assert_eq!(report.uploaded, vec!["ok".to_string()]);
    assert_eq!(report.deleted, vec!["orphan".to_string()]);
    let kinds: Vec<(&str, ErrorKind)> = report.failed.iter().map(|f| (f.name.as_str(), f.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("flaky", ErrorKind::RemoteUnavailable),
            ("missing", ErrorKind::NotFound),
            ("secret", ErrorKind::AccessDenied),
        ]
    );
    assert!(report.failed.iter().all(|f| f.action == ItemAction::Fetch));
    for key in ["p/missing", "p/flaky", "p/secret"] {
        assert!(store.contains(key), "{} was deleted", key);
    }
}

#[tokio::test]
async fn test_store_timeout_is_retryable() {
    let source = Arc::new(MemorySource::with_items([("a", "1")]));
    let store = Arc::new(MemoryStore::new());
    store.set_latency(Some(Duration::from_secs(2)));

    let options = mirrorsync::EngineOptions { timeout: Duration::from_millis(50), ..options() };
    let result = engine(&source, &store, options).run("p").await;

    assert!(matches!(result, Err(MirrorError::StoreUnavailable { retryable: true, .. })));
    assert_eq!(store.put_calls(), 0);
}

#[tokio::test]
async fn test_slow_store_within_deadline_succeeds() {
    let source = Arc::new(MemorySource::with_items([("a", "1")]));
    let store = Arc::new(MemoryStore::new());
    store.set_latency(Some(Duration::from_millis(30)));

    let options = mirrorsync::EngineOptions { timeout: Duration::from_secs(2), ..options() };
    let report = engine(&source, &store, options).run("p").await.unwrap();

    assert_eq!(report.uploaded, vec!["a".to_string()]);
}
