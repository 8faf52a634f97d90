//! Sync-by-fingerprint engine.
//!
//! Fingerprinting, the three-way diff, plan execution and the run state
//! machine that ties them together.

pub mod canonical;
pub mod engine;
pub mod executor;
pub mod fingerprint;
pub mod plan;
pub mod report;

pub use canonical::{canonical_json, canonicalize, fingerprint_json};
pub use engine::{Discovery, EngineOptions, MirrorEngine, RemoteDiscovery, SyncPhase, SyncProgress};
pub use executor::{CancelToken, RetainedContent, SyncExecutor};
pub use fingerprint::{fingerprint, FingerprintAlgorithm};
pub use plan::{diff, DuplicatePolicy, Item, ItemSet, RemoteSet, StoreSet, SyncPlan, Upload, UploadReason};
pub use report::{FailedItem, ItemAction, PlanSummary, SyncOutcome, SyncReport};
