//! Outcome of a mirror run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ErrorKind, MirrorError};
use crate::sync::plan::SyncPlan;

/// Which step failed for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Fetch,
    Upload,
    Delete,
}

/// An item whose operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub name: String,
    pub action: ItemAction,
    pub kind: ErrorKind,
    pub retryable: bool,
    pub message: String,
}

impl FailedItem {
    pub fn new(name: impl Into<String>, action: ItemAction, err: &MirrorError) -> Self {
        Self {
            name: name.into(),
            action,
            kind: err.kind(),
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

/// Counts of the computed plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub upload: usize,
    pub delete: usize,
    pub skip: usize,
}

impl From<&SyncPlan> for PlanSummary {
    fn from(plan: &SyncPlan) -> Self {
        Self {
            upload: plan.to_upload.len(),
            delete: plan.to_delete.len(),
            skip: plan.to_skip.len(),
        }
    }
}

/// Overall result classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing needed to change and nothing failed.
    NoOp,
    /// Every planned action succeeded.
    Complete,
    /// Some items failed while the rest were processed.
    Partial,
}

/// Report of one mirror run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mirror: String,
    pub prefix: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub plan: PlanSummary,
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedItem>,
    pub bytes_uploaded: u64,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    pub fn new(mirror: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            mirror: mirror.into(),
            prefix: prefix.into(),
            dry_run: false,
            started_at: Utc::now(),
            duration_ms: 0,
            plan: PlanSummary::default(),
            uploaded: Vec::new(),
            deleted: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            bytes_uploaded: 0,
            outcome: SyncOutcome::NoOp,
        }
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Sort item lists and recompute the outcome.
    pub fn finish(&mut self) {
        self.uploaded.sort();
        self.deleted.sort();
        self.skipped.sort();
        self.failed.sort_by(|a, b| a.name.cmp(&b.name).then(a.action.cmp(&b.action)));

        self.outcome = if !self.failed.is_empty() {
            SyncOutcome::Partial
        } else if self.plan.upload == 0 && self.plan.delete == 0 {
            SyncOutcome::NoOp
        } else {
            SyncOutcome::Complete
        };
    }

    /// Merge another partial report's item lists into this one.
    pub fn absorb(&mut self, other: SyncReport) {
        self.uploaded.extend(other.uploaded);
        self.deleted.extend(other.deleted);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.bytes_uploaded += other.bytes_uploaded;
    }

    /// One-line summary for logs and terminals.
    pub fn summary(&self) -> String {
        format!(
            "{}: uploaded={} deleted={} skipped={} failed={}{}",
            self.mirror,
            self.uploaded_count(),
            self.deleted_count(),
            self.skipped_count(),
            self.failed_count(),
            if self.dry_run { " (dry run)" } else { "" }
        )
    }
}
