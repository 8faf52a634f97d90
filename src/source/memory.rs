//! In-memory source for tests and embedding.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{MirrorError, Result};
use crate::source::{RemoteCatalog, SourceObject};

#[derive(Debug, Default)]
struct State {
    order: Vec<String>,
    objects: HashMap<String, SourceObject>,
    fail_list: bool,
    fail_fetch: HashMap<String, FetchFault>,
    denied: HashSet<String>,
    managed: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
enum FetchFault {
    NotFound,
    Unavailable,
}

/// A source whose items live in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    state: Mutex<State>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source from `(name, bytes)` pairs.
    pub fn with_items<I, N, B>(items: I) -> Self
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Vec<u8>>,
    {
        let source = Self::new();
        for (name, bytes) in items {
            source.put(SourceObject::new(name, bytes));
        }
        source
    }

    /// Add or replace an item.
    pub fn put(&self, object: SourceObject) {
        let mut state = self.lock();
        if !state.objects.contains_key(&object.name) {
            state.order.push(object.name.clone());
        }
        state.objects.insert(object.name.clone(), object);
    }

    pub fn remove(&self, name: &str) {
        let mut state = self.lock();
        state.order.retain(|n| n != name);
        state.objects.remove(name);
    }

    /// List `name` once more, as a broken index page would.
    pub fn list_twice(&self, name: &str) {
        self.lock().order.push(name.to_string());
    }

    pub fn fail_list(&self, fail: bool) {
        self.lock().fail_list = fail;
    }

    /// Keep `name` listed but make fetching it report not found.
    pub fn fail_fetch_not_found(&self, name: &str) {
        self.lock().fail_fetch.insert(name.to_string(), FetchFault::NotFound);
    }

    /// Keep `name` listed but make fetching it fail with a transport error.
    pub fn fail_fetch_unavailable(&self, name: &str) {
        self.lock().fail_fetch.insert(name.to_string(), FetchFault::Unavailable);
    }

    /// Claim only `names` under the store prefix, like a snapshot source.
    pub fn manage_only(&self, names: &[&str]) {
        self.lock().managed = Some(names.iter().map(|n| n.to_string()).collect());
    }

    pub fn deny(&self, name: &str) {
        self.lock().denied.insert(name.to_string());
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteCatalog for MemorySource {
    async fn list(&self) -> Result<Vec<String>> {
        let state = self.lock();
        if state.fail_list {
            return Err(MirrorError::remote("injected listing failure"));
        }
        Ok(state.order.clone())
    }

    async fn fetch(&self, name: &str) -> Result<SourceObject> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        if state.denied.contains(name) {
            return Err(MirrorError::AccessDenied(name.to_string()));
        }
        match state.fail_fetch.get(name) {
            Some(FetchFault::NotFound) => return Err(MirrorError::NotFound(name.to_string())),
            Some(FetchFault::Unavailable) => {
                return Err(MirrorError::remote(format!("injected fetch failure for {}", name)))
            }
            None => {}
        }
        state
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| MirrorError::NotFound(name.to_string()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn managed_names(&self) -> Option<Vec<String>> {
        self.lock().managed.clone()
    }
}
