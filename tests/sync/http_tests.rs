// Tests for the HTTP-backed sources against a mock server

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mirrorsync::config::{MirrorConfig, SourceKind};
use mirrorsync::source::{self, DirectoryListing, HttpFetcher, NameFilter, RemoteCatalog, RequestPacer};
use mirrorsync::store::MemoryStore;
use mirrorsync::sync::{MirrorEngine, SyncOutcome};
use mirrorsync::MirrorError;

use crate::common::options;

const AGENT: &str = "DataResearchBot/1.0 (Contact: data@example.com)";
const FALLBACK: &str = "Mozilla/5.0 (compatible; DataResearchBot/2.0)";

fn index_html() -> String {
    r##"<html><body><pre>
<a href="/pub/">[To Parent Directory]</a><br>
<a href="/pr/pr.series">pr.series</a><br>
<a href="/pr/pr.class">pr.class</a><br>
<a href="?C=N;O=D">Name</a> <a href="#top">top</a>
</pre></body></html>"##
        .to_string()
}

fn listing_config(server: &MockServer) -> MirrorConfig {
    MirrorConfig {
        name: "bls".to_string(),
        source_url: format!("{}/pr/", server.uri()),
        bucket_name: "data-bucket".to_string(),
        bucket_prefix: "bls/pr".to_string(),
        contact_email: Some("data@example.com".to_string()),
        requests_per_second: 0,
        timeout_seconds: 5,
        ..MirrorConfig::default()
    }
}

fn fetcher(fallback: Option<&str>) -> HttpFetcher {
    HttpFetcher::new(
        Duration::from_secs(5),
        AGENT,
        fallback.map(str::to_string),
        Some("data@example.com".to_string()),
        RequestPacer::unlimited(),
    )
    .unwrap()
}

async fn mount_index(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/pr/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(index_html(), "text/html"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_listing_sends_identifying_headers() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("GET"))
        .and(path("/pr/pr.series"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("series_id\tyear\n", "text/plain"))
        .mount(&server)
        .await;

    let source = source::from_config(&listing_config(&server)).unwrap();
    let names = source.list().await.unwrap();
    assert_eq!(names, vec!["pr.series".to_string(), "pr.class".to_string()]);

    let object = source.fetch("pr.series").await.unwrap();
    assert_eq!(object.bytes, b"series_id\tyear\n".to_vec());
    assert_eq!(object.content_type.as_deref(), Some("text/plain"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.headers.get("user-agent").unwrap().to_str().unwrap(), AGENT);
        assert_eq!(request.headers.get("from").unwrap().to_str().unwrap(), "data@example.com");
    }
}

#[tokio::test]
async fn test_forbidden_retries_with_fallback_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pr/pr.class"))
        .and(header("user-agent", FALLBACK))
        .respond_with(ResponseTemplate::new(200).set_body_raw("class", "text/plain"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pr/pr.class"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let url = url::Url::parse(&format!("{}/pr/pr.class", server.uri())).unwrap();
    let body = fetcher(Some(FALLBACK)).get(&url).await.unwrap();
    assert_eq!(body.bytes, b"class".to_vec());

    let agents: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.headers.get("user-agent").unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(agents, vec![AGENT.to_string(), FALLBACK.to_string()]);
}

#[tokio::test]
async fn test_item_status_codes_map_to_error_kinds() {
    let server = MockServer::start().await;
    for (route, status) in [("/pr/gone", 404), ("/pr/secret", 403), ("/pr/busy", 503), ("/pr/odd", 418)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }
    let listing = DirectoryListing::new(&format!("{}/pr/", server.uri()), fetcher(None), NameFilter::accept_all())
        .unwrap();

    assert!(matches!(listing.fetch("gone").await, Err(MirrorError::NotFound(_))));
    assert!(matches!(listing.fetch("secret").await, Err(MirrorError::AccessDenied(_))));
    assert!(matches!(
        listing.fetch("busy").await,
        Err(MirrorError::RemoteUnavailable { retryable: true, .. })
    ));
    assert!(matches!(
        listing.fetch("odd").await,
        Err(MirrorError::RemoteUnavailable { retryable: false, .. })
    ));
}

#[tokio::test]
async fn test_missing_index_is_a_listing_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pr/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = source::from_config(&listing_config(&server)).unwrap();
    assert!(matches!(
        source.list().await,
        Err(MirrorError::RemoteUnavailable { retryable: false, .. })
    ));
}

#[tokio::test]
async fn test_listing_mirror_end_to_end() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    for (route, body) in [("/pr/pr.series", "series"), ("/pr/pr.class", "class")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain"))
            .mount(&server)
            .await;
    }

    let config = listing_config(&server);
    let remote: Arc<dyn RemoteCatalog> = Arc::from(source::from_config(&config).unwrap());
    let store = Arc::new(MemoryStore::new());
    store.insert("bls/pr/pr.old", "stale");
    store.insert("population_data.json", "{}");

    let engine = MirrorEngine::new(remote, store.clone(), options());
    let report = engine.run(&config.bucket_prefix).await.unwrap();

    assert_eq!(report.uploaded, vec!["pr.class".to_string(), "pr.series".to_string()]);
    assert_eq!(report.deleted, vec!["pr.old".to_string()]);
    assert_eq!(store.object("bls/pr/pr.series"), Some(b"series".to_vec()));
    assert!(store.contains("population_data.json"));

    let again = engine.run(&config.bucket_prefix).await.unwrap();
    assert_eq!(again.outcome, SyncOutcome::NoOp);
}

#[tokio::test]
async fn test_snapshot_fetch_is_canonical() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"source":[],"data":[{"Year":"2022","Population":333287557}]}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let config = MirrorConfig {
        name: "population".to_string(),
        source_kind: SourceKind::JsonSnapshot,
        source_url: format!("{}/api/data", server.uri()),
        bucket_name: "data-bucket".to_string(),
        requests_per_second: 0,
        ..MirrorConfig::default()
    };
    let source = source::from_config(&config).unwrap();

    assert_eq!(source.list().await.unwrap(), vec!["population_data.json".to_string()]);
    let object = source.fetch("population_data.json").await.unwrap();
    assert_eq!(
        object.bytes,
        br#"{"data": [{"Population": 333287557, "Year": "2022"}], "source": []}"#.to_vec()
    );
    assert_eq!(object.content_type.as_deref(), Some("application/json"));
    assert!(matches!(source.fetch("other.json").await, Err(MirrorError::NotFound(_))));
}

#[tokio::test]
async fn test_snapshot_mirror_at_bucket_root_keeps_other_objects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"data":[]}"#, "application/json"))
        .mount(&server)
        .await;

    let config = MirrorConfig {
        name: "population".to_string(),
        source_kind: SourceKind::JsonSnapshot,
        source_url: format!("{}/api/data", server.uri()),
        bucket_name: "data-bucket".to_string(),
        requests_per_second: 0,
        ..MirrorConfig::default()
    };
    let remote: Arc<dyn RemoteCatalog> = Arc::from(source::from_config(&config).unwrap());
    let store = Arc::new(MemoryStore::new());
    store.insert("bls/pr/pr.series", "series");
    store.insert("bls/pr/pr.data.0.Current", "data");

    let report = MirrorEngine::new(remote, store.clone(), options()).run("").await.unwrap();

    assert_eq!(report.uploaded, vec!["population_data.json".to_string()]);
    assert!(report.deleted.is_empty());
    assert_eq!(
        store.keys(),
        vec![
            "bls/pr/pr.data.0.Current".to_string(),
            "bls/pr/pr.series".to_string(),
            "population_data.json".to_string(),
        ]
    );
}
