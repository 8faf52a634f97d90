//! Applies a [`SyncPlan`] to an object store.
//!
//! Every upload and delete is independent. A failure is recorded against
//! its item and the rest of the plan carries on.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{MirrorError, Result};
use crate::source::SourceObject;
use crate::store::{object_key, ObjectStore};
use crate::sync::engine::{SyncPhase, SyncProgress};
use crate::sync::plan::SyncPlan;
use crate::sync::report::{FailedItem, ItemAction, PlanSummary, SyncReport};

/// Remote content retained from discovery, keyed by item name.
pub type RetainedContent = HashMap<String, SourceObject>;

/// Cooperative cancellation flag, checked before each item starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Run `fut` with a deadline; a timeout becomes the retryable error made by
/// `on_timeout`.
pub async fn with_timeout<T, F, E>(limit: Duration, fut: F, on_timeout: E) -> Result<T>
where
    F: Future<Output = Result<T>>,
    E: FnOnce() -> MirrorError,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

#[derive(Debug)]
enum Action<'a> {
    Upload(&'a str),
    Delete(&'a str),
}

enum Outcome {
    Uploaded { name: String, bytes: u64 },
    Deleted(String),
    Failed(FailedItem),
}

/// Executes plans against one store prefix.
pub struct SyncExecutor {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    concurrency_limit: usize,
    timeout: Duration,
    cancel: CancelToken,
    progress_tx: Option<mpsc::Sender<SyncProgress>>,
}

impl SyncExecutor {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, concurrency_limit: usize, timeout: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            concurrency_limit: concurrency_limit.max(1),
            timeout,
            cancel: CancelToken::new(),
            progress_tx: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress_tx: mpsc::Sender<SyncProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    /// Apply `plan`. Upload bytes come from `content`, which holds what
    /// discovery already downloaded.
    pub async fn execute(&self, plan: &SyncPlan, content: &RetainedContent) -> SyncReport {
        let mut report = SyncReport::new("", self.prefix.clone());
        report.plan = PlanSummary::from(plan);
        report.skipped = plan.to_skip.iter().cloned().collect();

        if plan.is_noop() {
            report.finish();
            return report;
        }

        let actions: Vec<Action<'_>> = plan
            .to_upload
            .keys()
            .map(|name| Action::Upload(name.as_str()))
            .chain(plan.to_delete.iter().map(|name| Action::Delete(name.as_str())))
            .collect();
        let total = actions.len();
        let done = AtomicUsize::new(0);

        let outcomes: Vec<Outcome> = stream::iter(actions)
            .map(|action| self.apply(action, content, &done, total))
            .buffer_unordered(self.concurrency_limit)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Uploaded { name, bytes } => {
                    report.uploaded.push(name);
                    report.bytes_uploaded += bytes;
                }
                Outcome::Deleted(name) => report.deleted.push(name),
                Outcome::Failed(item) => report.failed.push(item),
            }
        }

        report.finish();
        report
    }

    async fn apply(&self, action: Action<'_>, content: &RetainedContent, done: &AtomicUsize, total: usize) -> Outcome {
        let outcome = if self.cancel.is_cancelled() {
            let (name, kind) = match action {
                Action::Upload(name) => (name, ItemAction::Upload),
                Action::Delete(name) => (name, ItemAction::Delete),
            };
            Outcome::Failed(FailedItem::new(name, kind, &MirrorError::Cancelled))
        } else {
            match action {
                Action::Upload(name) => self.upload(name, content).await,
                Action::Delete(name) => self.delete(name).await,
            }
        };

        let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(tx) = &self.progress_tx {
            let current = match &outcome {
                Outcome::Uploaded { name, .. } | Outcome::Deleted(name) => name.clone(),
                Outcome::Failed(item) => item.name.clone(),
            };
            let _ = tx
                .send(SyncProgress {
                    phase: SyncPhase::Apply,
                    current,
                    done: finished,
                    total,
                })
                .await;
        }

        outcome
    }

    async fn upload(&self, name: &str, content: &RetainedContent) -> Outcome {
        let Some(object) = content.get(name) else {
            let err = MirrorError::ContentReadFailure(format!("no retained content for {}", name));
            tracing::warn!(name, error = %err, "Upload skipped");
            return Outcome::Failed(FailedItem::new(name, ItemAction::Upload, &err));
        };

        let key = object_key(&self.prefix, name);
        let size = object.bytes.len() as u64;
        let timeout = self.timeout;
        let result = with_timeout(
            timeout,
            self.store.put(&key, object.bytes.clone(), object.content_type.as_deref()),
            || MirrorError::store(format!("put {} timed out after {:?}", key, timeout)),
        )
        .await;

        match result {
            Ok(tag) => {
                tracing::info!(
                    name,
                    key = %self.store.display_key(&key),
                    bytes = size,
                    tag = tag.as_deref().unwrap_or("-"),
                    "Uploaded"
                );
                Outcome::Uploaded { name: name.to_string(), bytes: size }
            }
            Err(err) => {
                tracing::warn!(name, key = %key, error = %err, "Upload failed");
                Outcome::Failed(FailedItem::new(name, ItemAction::Upload, &err))
            }
        }
    }

    async fn delete(&self, name: &str) -> Outcome {
        let key = object_key(&self.prefix, name);
        let timeout = self.timeout;
        let result = with_timeout(timeout, self.store.delete(&key), || {
            MirrorError::store(format!("delete {} timed out after {:?}", key, timeout))
        })
        .await;

        match result {
            Ok(()) => {
                tracing::info!(name, key = %self.store.display_key(&key), "Deleted");
                Outcome::Deleted(name.to_string())
            }
            Err(err) => {
                tracing::warn!(name, key = %key, error = %err, "Delete failed");
                Outcome::Failed(FailedItem::new(name, ItemAction::Delete, &err))
            }
        }
    }
}
