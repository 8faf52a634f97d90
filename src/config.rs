//! Mirror configuration.
//!
//! A [`MirrorConfig`] is built once at process start (usually from a TOML
//! file through [`PipelineConfig::load`]) and handed to the engine. The
//! engine itself never reads the process environment.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MirrorError, Result};
use crate::store::{list_root, object_key};
use crate::sync::fingerprint::FingerprintAlgorithm;
use crate::sync::plan::DuplicatePolicy;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 2;
pub const DEFAULT_SNAPSHOT_NAME: &str = "population_data.json";
pub const DEFAULT_USER_AGENT: &str = "DataResearchBot/1.0";
pub const DEFAULT_FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (compatible; DataResearchBot/2.0)";

/// Kind of remote source a mirror reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// HTML directory index; every matching link is one item.
    #[default]
    Listing,
    /// A single JSON document fetched from an API.
    JsonSnapshot,
}

/// How the engine decides that a stored object matches remote content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityStrategy {
    /// Compare the local digest with the store's identity tag (S3 ETag).
    /// Only exact for single-part uploads hashed with MD5.
    #[default]
    IdentityTag,
    /// Download every stored object and hash it locally.
    FetchAndHash,
}

/// Configuration for one mirror: one source, one bucket prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    /// Label used in logs and reports.
    pub name: String,
    pub source_url: String,
    pub source_kind: SourceKind,
    pub bucket_name: String,
    /// Scope under which the engine may list, write and delete.
    pub bucket_prefix: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub concurrency_limit: usize,
    pub timeout_seconds: u64,
    /// Remote request rate; 0 disables pacing.
    pub requests_per_second: u32,
    pub contact_email: Option<String>,
    pub user_agent: String,
    pub fallback_user_agent: String,
    /// Glob patterns a listed name must match (empty = everything).
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Object name for a JSON snapshot source.
    pub snapshot_name: String,
    pub fingerprint: FingerprintAlgorithm,
    pub equality: EqualityStrategy,
    pub duplicates: DuplicatePolicy,
    pub dry_run: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            name: "mirror".to_string(),
            source_url: String::new(),
            source_kind: SourceKind::Listing,
            bucket_name: String::new(),
            bucket_prefix: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            concurrency_limit: DEFAULT_CONCURRENCY,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            contact_email: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fallback_user_agent: DEFAULT_FALLBACK_USER_AGENT.to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            snapshot_name: DEFAULT_SNAPSHOT_NAME.to_string(),
            fingerprint: FingerprintAlgorithm::Md5,
            equality: EqualityStrategy::IdentityTag,
            duplicates: DuplicatePolicy::Reject,
            dry_run: false,
        }
    }
}

impl MirrorConfig {
    /// Per-call timeout for remote and store operations.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Keys this mirror may write or delete. A listing mirror owns its whole
    /// prefix; a snapshot mirror only owns its one object.
    pub fn scope(&self) -> MirrorScope {
        match self.source_kind {
            SourceKind::Listing => MirrorScope::Prefix(list_root(&self.bucket_prefix)),
            SourceKind::JsonSnapshot => MirrorScope::Key(object_key(&self.bucket_prefix, &self.snapshot_name)),
        }
    }

    /// Check the configuration before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(MirrorError::Config(format!("{}: source_url is required", self.name)));
        }
        if self.bucket_name.trim().is_empty() {
            return Err(MirrorError::Config(format!("{}: bucket_name is required", self.name)));
        }
        if self.concurrency_limit == 0 {
            return Err(MirrorError::Config(format!(
                "{}: concurrency_limit must be at least 1",
                self.name
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(MirrorError::Config(format!(
                "{}: timeout_seconds must be at least 1",
                self.name
            )));
        }
        if self.equality == EqualityStrategy::IdentityTag
            && self.fingerprint != FingerprintAlgorithm::Md5
        {
            return Err(MirrorError::Config(format!(
                "{}: identity_tag equality needs the md5 fingerprint, got {}",
                self.name, self.fingerprint
            )));
        }
        if self.source_kind == SourceKind::JsonSnapshot && self.snapshot_name.trim().is_empty() {
            return Err(MirrorError::Config(format!("{}: snapshot_name is required", self.name)));
        }
        Ok(())
    }
}

/// Keys a mirror may write or delete inside its bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorScope {
    /// Everything under a listing root (`""` is the whole bucket).
    Prefix(String),
    /// A single object key.
    Key(String),
}

impl MirrorScope {
    /// Whether two mirrors in the same bucket could touch the same key.
    pub fn overlaps(&self, other: &MirrorScope) -> bool {
        match (self, other) {
            (Self::Prefix(a), Self::Prefix(b)) => a.starts_with(b.as_str()) || b.starts_with(a.as_str()),
            (Self::Prefix(root), Self::Key(key)) | (Self::Key(key), Self::Prefix(root)) => {
                key.starts_with(root.as_str())
            }
            (Self::Key(a), Self::Key(b)) => a == b,
        }
    }
}

impl std::fmt::Display for MirrorScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prefix(root) if root.is_empty() => write!(f, "the whole bucket"),
            Self::Prefix(root) => write!(f, "{}*", root),
            Self::Key(key) => write!(f, "{}", key),
        }
    }
}

/// A set of mirrors run together by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, rename = "mirror")]
    pub mirrors: Vec<MirrorConfig>,
}

impl PipelineConfig {
    /// Parse a pipeline from TOML text.
    pub fn from_toml(text: &str) -> AnyResult<Self> {
        let config: PipelineConfig = toml::from_str(text).context("Failed to parse mirror config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every mirror, then reject names used twice and mirrors whose
    /// scopes overlap in one bucket, since each would delete the other's
    /// objects.
    pub fn validate(&self) -> Result<()> {
        for mirror in &self.mirrors {
            mirror.validate()?;
        }

        for (i, a) in self.mirrors.iter().enumerate() {
            for b in &self.mirrors[i + 1..] {
                if a.name == b.name {
                    return Err(MirrorError::Config(format!("mirror name {:?} is used twice", a.name)));
                }
                if a.bucket_name != b.bucket_name || a.endpoint != b.endpoint {
                    continue;
                }
                let (scope_a, scope_b) = (a.scope(), b.scope());
                if scope_a.overlaps(&scope_b) {
                    return Err(MirrorError::Config(format!(
                        "mirrors {} ({}) and {} ({}) overlap in bucket {}",
                        a.name, scope_a, b.name, scope_b, a.bucket_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Load a pipeline from a TOML file.
    pub fn load(path: &Path) -> AnyResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Find a mirror by name.
    pub fn mirror(&self, name: &str) -> Option<&MirrorConfig> {
        self.mirrors.iter().find(|m| m.name == name)
    }
}
