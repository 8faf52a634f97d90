//! In-memory object store.
//!
//! Tags objects with the MD5 of their content, the way S3 tags single-part
//! uploads. Failures and latency can be injected for tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{MirrorError, Result};
use crate::store::{list_root, relative_name, ObjectStore, StoredObject};
use crate::sync::fingerprint::fingerprint;

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Vec<u8>,
    tag: String,
    content_type: Option<String>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_list: bool,
    fail_put: HashSet<String>,
    fail_delete: HashSet<String>,
    latency: Option<Duration>,
}

/// Object store held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, MemoryObject>>,
    faults: Mutex<Faults>,
    lists: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing call counters.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let tag = fingerprint(&data);
        self.lock_objects().insert(
            key.to_string(),
            MemoryObject { data, tag, content_type: None },
        );
    }

    /// Seed an object with an explicit tag (e.g. a multipart ETag).
    pub fn insert_with_tag(&self, key: &str, data: impl Into<Vec<u8>>, tag: &str) {
        self.lock_objects().insert(
            key.to_string(),
            MemoryObject { data: data.into(), tag: tag.to_string(), content_type: None },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock_objects().contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock_objects().get(key).map(|o| o.data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock_objects().get(key).and_then(|o| o.content_type.clone())
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.lock_objects().keys().cloned().collect()
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every listing fail.
    pub fn fail_list(&self, fail: bool) {
        self.lock_faults().fail_list = fail;
    }

    /// Make puts to `key` fail.
    pub fn fail_put(&self, key: &str) {
        self.lock_faults().fail_put.insert(key.to_string());
    }

    /// Make deletes of `key` fail.
    pub fn fail_delete(&self, key: &str) {
        self.lock_faults().fail_delete.insert(key.to_string());
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock_faults().latency = latency;
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, MemoryObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency = self.lock_faults().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.lock_faults().fail_list {
            return Err(MirrorError::store("injected list failure"));
        }

        let root = list_root(prefix);
        let objects = self.lock_objects();
        Ok(objects
            .range(root.clone()..)
            .take_while(|(key, _)| key.starts_with(&root))
            .filter_map(|(key, object)| {
                relative_name(prefix, key).map(|name| StoredObject {
                    name,
                    identity_tag: Some(object.tag.clone()),
                    size: object.data.len() as u64,
                })
            })
            .collect())
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>) -> Result<Option<String>> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.lock_faults().fail_put.contains(key) {
            return Err(MirrorError::store(format!("injected put failure for {}", key)));
        }

        let tag = fingerprint(&data);
        self.lock_objects().insert(
            key.to_string(),
            MemoryObject {
                data,
                tag: tag.clone(),
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(Some(tag))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.simulate_latency().await;
        self.object(key)
            .ok_or_else(|| MirrorError::store_fatal(format!("object not found: {}", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.lock_faults().fail_delete.contains(key) {
            return Err(MirrorError::store(format!("injected delete failure for {}", key)));
        }
        self.lock_objects().remove(key);
        Ok(())
    }

    fn display_key(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}
