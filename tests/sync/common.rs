use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mirrorsync::error::Result;
use mirrorsync::source::MemorySource;
use mirrorsync::store::{MemoryStore, ObjectStore, StoredObject};
use mirrorsync::sync::{EngineOptions, MirrorEngine};

pub fn options() -> EngineOptions {
    EngineOptions {
        name: "test".to_string(),
        timeout: Duration::from_secs(5),
        ..EngineOptions::default()
    }
}

pub fn engine(source: &Arc<MemorySource>, store: &Arc<MemoryStore>, options: EngineOptions) -> MirrorEngine {
    MirrorEngine::new(source.clone(), store.clone(), options)
}

/// Store wrapper that records the highest number of concurrent puts.
pub struct GaugedStore {
    pub inner: MemoryStore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GaugedStore {
    pub fn new() -> Self {
        let inner = MemoryStore::new();
        inner.set_latency(Some(Duration::from_millis(20)));
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for GaugedStore {
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        self.inner.list(prefix).await
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>) -> Result<Option<String>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.put(key, data, content_type).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
}
