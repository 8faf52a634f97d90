//! JSON API snapshot source.
//!
//! The API response is one document, mirrored as a single object. It is
//! canonicalized before fingerprinting, so a response that only reorders
//! keys maps to the same bytes and is skipped.

use async_trait::async_trait;
use url::Url;

use crate::error::{MirrorError, Result};
use crate::source::http::HttpFetcher;
use crate::source::{RemoteCatalog, SourceObject};
use crate::sync::canonical::canonicalize;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Source producing one canonical JSON object from an API endpoint.
pub struct JsonSnapshot {
    url: Url,
    name: String,
    fetcher: HttpFetcher,
}

impl JsonSnapshot {
    pub fn new(url: &str, name: &str, fetcher: HttpFetcher) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| MirrorError::Config(format!("invalid source_url {:?}: {}", url, e)))?;
        Ok(Self {
            url,
            name: name.to_string(),
            fetcher,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Turn a raw API response into the object that gets stored.
pub fn snapshot_object(name: &str, body: &[u8]) -> Result<SourceObject> {
    let bytes = canonicalize(body)?;
    Ok(SourceObject::new(name, bytes).with_content_type(JSON_CONTENT_TYPE))
}

#[async_trait]
impl RemoteCatalog for JsonSnapshot {
    async fn list(&self) -> Result<Vec<String>> {
        Ok(vec![self.name.clone()])
    }

    async fn fetch(&self, name: &str) -> Result<SourceObject> {
        if name != self.name {
            return Err(MirrorError::NotFound(name.to_string()));
        }
        let body = self.fetcher.get(&self.url).await?;
        snapshot_object(&self.name, &body.bytes)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }

    fn managed_names(&self) -> Option<Vec<String>> {
        Some(vec![self.name.clone()])
    }
}
