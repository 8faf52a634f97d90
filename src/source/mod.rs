//! Remote content sources.
//!
//! A source only produces `(name, bytes)` pairs. New kinds of source are
//! added by implementing [`RemoteCatalog`].

pub mod filter;
pub mod http;
pub mod listing;
pub mod memory;
pub mod pacer;
pub mod snapshot;

pub use filter::NameFilter;
pub use http::HttpFetcher;
pub use listing::DirectoryListing;
pub use memory::MemorySource;
pub use pacer::RequestPacer;
pub use snapshot::JsonSnapshot;

use async_trait::async_trait;

use crate::config::{MirrorConfig, SourceKind};
use crate::error::Result;

/// Content fetched from a remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl SourceObject {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A discoverable set of remote items.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Names currently offered by the source. May contain duplicates; the
    /// engine applies the configured duplicate policy.
    async fn list(&self) -> Result<Vec<String>>;

    /// Fetch one item. Missing or forbidden items surface as
    /// `MirrorError::NotFound` / `MirrorError::AccessDenied`.
    async fn fetch(&self, name: &str) -> Result<SourceObject>;

    /// Human readable source description for logs.
    fn describe(&self) -> String;

    /// Fixed set of names this source owns under the store prefix. When
    /// set, stored objects with other names are neither compared nor
    /// deleted. `None` means the source owns the whole prefix.
    fn managed_names(&self) -> Option<Vec<String>> {
        None
    }
}

/// Build the remote source described by a mirror config.
pub fn from_config(config: &MirrorConfig) -> Result<Box<dyn RemoteCatalog>> {
    let fetcher = HttpFetcher::from_config(config)?;
    Ok(match config.source_kind {
        SourceKind::Listing => {
            let filter = NameFilter::new(&config.include, &config.exclude)?;
            Box::new(DirectoryListing::new(&config.source_url, fetcher, filter)?)
        }
        SourceKind::JsonSnapshot => {
            Box::new(JsonSnapshot::new(&config.source_url, &config.snapshot_name, fetcher)?)
        }
    })
}
