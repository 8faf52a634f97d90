// Library module for mirrorsync
// Re-exports modules for use in integration tests and external crates

pub mod config;
pub mod error;
pub mod source;
pub mod store;
pub mod sync;

use std::sync::Arc;

pub use config::{EqualityStrategy, MirrorConfig, PipelineConfig, SourceKind};
pub use error::{ErrorKind, MirrorError, Result};
pub use source::RemoteCatalog;
pub use store::ObjectStore;
pub use sync::{EngineOptions, MirrorEngine, SyncPlan, SyncReport};

/// Build the engine for one configured mirror: its remote source and the
/// S3 bucket it writes to.
pub fn build_engine(config: &MirrorConfig) -> Result<MirrorEngine> {
    config.validate()?;
    let remote: Arc<dyn RemoteCatalog> = Arc::from(source::from_config(config)?);
    let store: Arc<dyn ObjectStore> = Arc::new(store::S3Store::from_config(config)?);
    Ok(MirrorEngine::new(remote, store, EngineOptions::from(config)))
}

/// Mirror the configured source into `bucket_name/bucket_prefix`.
pub async fn sync(config: &MirrorConfig) -> Result<SyncReport> {
    build_engine(config)?.run(&config.bucket_prefix).await
}
