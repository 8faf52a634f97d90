// Tests for mirroring a JSON API snapshot

use std::sync::Arc;

use mirrorsync::source::snapshot::{snapshot_object, JSON_CONTENT_TYPE};
use mirrorsync::source::MemorySource;
use mirrorsync::store::MemoryStore;
use mirrorsync::sync::SyncOutcome;

use crate::common::{engine, options};

const FIRST: &[u8] = br#"{"data":[{"ID Nation":"01000US","Year":"2021","Population":331893745}],"source":[{"name":"acs_yg_total_population_1"}]}"#;
const REORDERED: &[u8] = br#"{"source":[{"name":"acs_yg_total_population_1"}],"data":[{"Population":331893745,"Year":"2021","ID Nation":"01000US"}]}"#;
const UPDATED: &[u8] = br#"{"data":[{"ID Nation":"01000US","Year":"2022","Population":333287557}],"source":[{"name":"acs_yg_total_population_1"}]}"#;

#[tokio::test]
async fn test_reordered_snapshot_issues_no_write() {
    let source = Arc::new(MemorySource::new());
    source.put(snapshot_object("population_data.json", FIRST).unwrap());
    let store = Arc::new(MemoryStore::new());
    let engine = engine(&source, &store, options());

    let first = engine.run("population").await.unwrap();
    assert_eq!(first.uploaded, vec!["population_data.json".to_string()]);
    assert_eq!(
        store.content_type("population/population_data.json").as_deref(),
        Some(JSON_CONTENT_TYPE)
    );

    source.put(snapshot_object("population_data.json", REORDERED).unwrap());
    let second = engine.run("population").await.unwrap();

    assert_eq!(second.outcome, SyncOutcome::NoOp);
    assert_eq!(second.skipped, vec!["population_data.json".to_string()]);
    assert_eq!(store.put_calls(), 1);
}

#[tokio::test]
async fn test_changed_snapshot_replaces_object() {
    let source = Arc::new(MemorySource::new());
    source.put(snapshot_object("population_data.json", FIRST).unwrap());
    let store = Arc::new(MemoryStore::new());
    let engine = engine(&source, &store, options());
    engine.run("").await.unwrap();

    source.put(snapshot_object("population_data.json", UPDATED).unwrap());
    let report = engine.run("").await.unwrap();

    assert_eq!(report.uploaded, vec!["population_data.json".to_string()]);
    let stored = store.object("population_data.json").unwrap();
    let value: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(value["data"][0]["Year"], "2022");
}

#[tokio::test]
async fn test_managed_names_limit_deletes() {
    let source = Arc::new(MemorySource::new());
    source.put(snapshot_object("population_data.json", FIRST).unwrap());
    source.manage_only(&["population_data.json"]);
    let store = Arc::new(MemoryStore::new());
    store.insert("bls/pr/pr.series", "series");
    store.insert("notes.txt", "kept");

    let report = engine(&source, &store, options()).run("").await.unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(store.delete_calls(), 0);
    assert!(store.contains("bls/pr/pr.series"));
    assert!(store.contains("notes.txt"));
}
