//! Mirror engine.
//!
//! One run walks `DISCOVER_REMOTE -> DISCOVER_STORE -> DIFF -> APPLY ->
//! REPORT`. The two discovery phases run concurrently; nothing survives
//! the run.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::config::{EqualityStrategy, MirrorConfig};
use crate::error::{MirrorError, Result};
use crate::source::RemoteCatalog;
use crate::store::{normalize_prefix, object_key, ObjectStore};
use crate::sync::executor::{with_timeout, CancelToken, RetainedContent, SyncExecutor};
use crate::sync::fingerprint::FingerprintAlgorithm;
use crate::sync::plan::{diff, DuplicatePolicy, Item, ItemSet, RemoteSet, StoreSet, SyncPlan};
use crate::sync::report::{FailedItem, ItemAction, PlanSummary, SyncReport};

/// Phase of a mirror run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    DiscoverRemote,
    DiscoverStore,
    Diff,
    Apply,
    Report,
}

/// Progress update for a mirror run.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    /// Item being processed, empty for phase transitions.
    pub current: String,
    pub done: usize,
    pub total: usize,
}

impl SyncProgress {
    /// Get progress as a percentage (0.0 - 1.0).
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.done as f32 / self.total as f32
    }
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Label used in logs and reports.
    pub name: String,
    pub concurrency_limit: usize,
    pub timeout: Duration,
    pub fingerprint: FingerprintAlgorithm,
    pub equality: EqualityStrategy,
    pub duplicates: DuplicatePolicy,
    pub dry_run: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            name: "mirror".to_string(),
            concurrency_limit: crate::config::DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECONDS),
            fingerprint: FingerprintAlgorithm::Md5,
            equality: EqualityStrategy::IdentityTag,
            duplicates: DuplicatePolicy::Reject,
            dry_run: false,
        }
    }
}

impl From<&MirrorConfig> for EngineOptions {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            name: config.name.clone(),
            concurrency_limit: config.concurrency_limit,
            timeout: config.timeout(),
            fingerprint: config.fingerprint,
            equality: config.equality,
            duplicates: config.duplicates,
            dry_run: config.dry_run,
        }
    }
}

/// Remote side of a run: fingerprints, retained bytes and items that were
/// listed but could not be fetched.
#[derive(Debug, Default)]
pub struct RemoteDiscovery {
    pub set: RemoteSet,
    pub content: RetainedContent,
    pub failures: Vec<FailedItem>,
}

impl RemoteDiscovery {
    /// Names listed remotely whose content is unknown this run.
    pub fn unfetched(&self) -> HashSet<String> {
        self.failures.iter().map(|f| f.name.clone()).collect()
    }
}

/// Everything DIFF produced, before anything is applied.
#[derive(Debug)]
pub struct Discovery {
    pub remote: RemoteDiscovery,
    pub store: StoreSet,
    pub plan: SyncPlan,
}

/// Mirrors a remote catalog into one store prefix.
pub struct MirrorEngine {
    remote: Arc<dyn RemoteCatalog>,
    store: Arc<dyn ObjectStore>,
    options: EngineOptions,
    cancel: CancelToken,
    progress_tx: Option<mpsc::Sender<SyncProgress>>,
}

impl MirrorEngine {
    /// Create a new mirror engine.
    pub fn new(remote: Arc<dyn RemoteCatalog>, store: Arc<dyn ObjectStore>, options: EngineOptions) -> Self {
        Self {
            remote,
            store,
            options,
            cancel: CancelToken::new(),
            progress_tx: None,
        }
    }

    /// Create a mirror engine with progress reporting.
    pub fn with_progress(
        remote: Arc<dyn RemoteCatalog>,
        store: Arc<dyn ObjectStore>,
        options: EngineOptions,
        progress_tx: mpsc::Sender<SyncProgress>,
    ) -> Self {
        let mut engine = Self::new(remote, store, options);
        engine.progress_tx = Some(progress_tx);
        engine
    }

    /// Handle that cancels the run before its next upload or delete.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    async fn send_progress(&self, phase: SyncPhase) {
        if let Some(ref tx) = self.progress_tx {
            let _ = tx
                .send(SyncProgress { phase, current: String::new(), done: 0, total: 0 })
                .await;
        }
    }

    /// Run the mirror for `prefix`.
    ///
    /// Fails only when a catalog cannot be obtained; per-item failures end
    /// up in the report.
    pub async fn run(&self, prefix: &str) -> Result<SyncReport> {
        let started = Instant::now();
        let prefix = normalize_prefix(prefix);
        let mut report = SyncReport::new(self.options.name.clone(), prefix.clone());
        report.dry_run = self.options.dry_run;

        let Discovery { remote, plan, .. } = self.plan(&prefix).await?;

        let applied = if self.options.dry_run {
            tracing::info!(
                mirror = %self.options.name,
                upload = plan.to_upload.len(),
                delete = plan.to_delete.len(),
                "Dry run, no changes applied"
            );
            let mut dry = SyncReport::new("", prefix.clone());
            dry.skipped = plan.to_skip.iter().cloned().collect();
            dry
        } else {
            self.send_progress(SyncPhase::Apply).await;
            let mut executor = SyncExecutor::new(
                self.store.clone(),
                prefix.clone(),
                self.options.concurrency_limit,
                self.options.timeout,
            )
            .with_cancel(self.cancel.clone());
            if let Some(tx) = &self.progress_tx {
                executor = executor.with_progress(tx.clone());
            }
            executor.execute(&plan, &remote.content).await
        };

        self.send_progress(SyncPhase::Report).await;
        report.plan = PlanSummary::from(&plan);
        report.absorb(applied);
        report.failed.extend(remote.failures);
        report.duration_ms = started.elapsed().as_millis() as u64;
        report.finish();

        tracing::info!(
            mirror = %report.mirror,
            prefix = %report.prefix,
            uploaded = report.uploaded_count(),
            deleted = report.deleted_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            duration_ms = report.duration_ms,
            "Sync complete"
        );

        Ok(report)
    }

    /// Discover both catalogs and compute the plan without applying it.
    pub async fn plan(&self, prefix: &str) -> Result<Discovery> {
        let prefix = normalize_prefix(prefix);

        let (remote, store) = tokio::try_join!(self.discover_remote(), self.discover_store(&prefix))?;

        self.send_progress(SyncPhase::Diff).await;
        let mut plan = diff(&remote.set, &store);

        let unfetched = remote.unfetched();
        for name in plan.protect(unfetched.iter()) {
            tracing::warn!(name = %name, "Keeping stored copy of an item that could not be fetched");
        }

        tracing::info!(
            mirror = %self.options.name,
            upload = plan.to_upload.len(),
            delete = plan.to_delete.len(),
            skip = plan.to_skip.len(),
            "Computed sync plan"
        );

        Ok(Discovery { remote, store, plan })
    }

    /// List the remote source and fetch every item once.
    async fn discover_remote(&self) -> Result<RemoteDiscovery> {
        self.send_progress(SyncPhase::DiscoverRemote).await;
        tracing::info!(mirror = %self.options.name, source = %self.remote.describe(), "Listing remote source");

        let timeout = self.options.timeout;
        let listed = with_timeout(timeout, self.remote.list(), || {
            MirrorError::remote(format!("remote listing timed out after {:?}", timeout))
        })
        .await?;
        let names = dedupe_names(listed, self.options.duplicates)?;
        tracing::info!(mirror = %self.options.name, files = names.len(), "Found remote files");

        let fetched: Vec<(String, Result<crate::source::SourceObject>)> = stream::iter(names)
            .map(|name| async move {
                let result = with_timeout(timeout, self.remote.fetch(&name), || {
                    MirrorError::remote(format!("fetch {} timed out after {:?}", name, timeout))
                })
                .await;
                (name, result)
            })
            .buffer_unordered(self.options.concurrency_limit.max(1))
            .collect()
            .await;

        let mut discovery = RemoteDiscovery::default();
        for (name, result) in fetched {
            match result {
                Ok(object) => {
                    let fingerprint = self.options.fingerprint.fingerprint(&object.bytes);
                    discovery.set.insert(Item::new(name.clone(), fingerprint), DuplicatePolicy::Reject)?;
                    discovery.content.insert(name, object);
                }
                Err(err) => {
                    tracing::warn!(name = %name, error = %err, "Failed to fetch remote file");
                    discovery.failures.push(FailedItem::new(name, ItemAction::Fetch, &err));
                }
            }
        }

        Ok(discovery)
    }

    /// List the store prefix and reduce it to fingerprints.
    async fn discover_store(&self, prefix: &str) -> Result<StoreSet> {
        self.send_progress(SyncPhase::DiscoverStore).await;
        tracing::info!(mirror = %self.options.name, prefix, "Checking existing files in store");

        let timeout = self.options.timeout;
        let objects = with_timeout(timeout, self.store.list(prefix), || {
            MirrorError::store(format!("store listing timed out after {:?}", timeout))
        })
        .await?;
        let objects = match self.remote.managed_names() {
            Some(names) => {
                let managed: HashSet<String> = names.into_iter().collect();
                let (owned, foreign): (Vec<_>, Vec<_>) =
                    objects.into_iter().partition(|object| managed.contains(&object.name));
                if !foreign.is_empty() {
                    tracing::debug!(mirror = %self.options.name, ignored = foreign.len(), "Ignoring objects the source does not manage");
                }
                owned
            }
            None => objects,
        };
        tracing::info!(mirror = %self.options.name, files = objects.len(), "Found existing files");

        let items: Vec<Item> = match self.options.equality {
            EqualityStrategy::IdentityTag => objects
                .into_iter()
                .map(|object| Item::new(object.name, object.identity_tag.unwrap_or_default()))
                .collect(),
            EqualityStrategy::FetchAndHash => {
                let algorithm = self.options.fingerprint;
                stream::iter(objects)
                    .map(|object| async move {
                        let key = object_key(prefix, &object.name);
                        let data = with_timeout(timeout, self.store.get(&key), || {
                            MirrorError::store(format!("get {} timed out after {:?}", key, timeout))
                        })
                        .await?;
                        Ok::<Item, MirrorError>(Item::new(object.name, algorithm.fingerprint(&data)))
                    })
                    .buffer_unordered(self.options.concurrency_limit.max(1))
                    .try_collect::<Vec<Item>>()
                    .await?
            }
        };

        let mut set = ItemSet::new();
        for item in items {
            set.insert(item, DuplicatePolicy::Reject)?;
        }
        Ok(set)
    }
}

/// Apply the duplicate policy to a raw listing, keeping first-seen order.
pub fn dedupe_names(names: Vec<String>, policy: DuplicatePolicy) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        if seen.insert(name.clone()) {
            unique.push(name);
            continue;
        }
        match policy {
            DuplicatePolicy::Reject => {
                return Err(MirrorError::InvalidListing(format!("duplicate name in listing: {}", name)));
            }
            DuplicatePolicy::LastWins => {
                tracing::warn!(name = %name, "Duplicate name in listing, fetching it once");
            }
        }
    }
    Ok(unique)
}
