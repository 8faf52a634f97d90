//! Destination object stores.

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

use async_trait::async_trait;

use crate::error::Result;

/// An object found under a store prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Key relative to the listed prefix.
    pub name: String,
    /// Store-supplied content tag (quotes stripped), if the store has one.
    pub identity_tag: Option<String>,
    pub size: u64,
}

/// Object-store operations used by the mirror engine.
///
/// Keys are full keys (`prefix/name`). Implementations must treat a put as
/// atomic: readers see either the old or the new object, never a partial
/// one.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object whose key lives under `prefix/`. Names in the
    /// result are relative to the prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;

    /// Write an object and return its new identity tag when the store
    /// reports one.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>) -> Result<Option<String>>;

    /// Read an object.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Human readable location for logs.
    fn display_key(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Normalize a prefix: no leading or trailing slashes.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}

/// Full key for `name` under `prefix`.
pub fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Listing root for `prefix`: `prefix/`, or empty for the bucket root.
pub fn list_root(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix)
    }
}

/// Name of `key` relative to `prefix`, or `None` when the key is outside
/// the prefix or is a directory marker.
pub fn relative_name(prefix: &str, key: &str) -> Option<String> {
    let root = list_root(prefix);
    let key = key.trim_start_matches('/');
    let rest = key.strip_prefix(root.as_str())?;
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() || rest.ends_with('/') {
        return None;
    }
    Some(rest.to_string())
}
