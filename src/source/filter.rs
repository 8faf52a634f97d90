//! Name filtering for listed remote files.
//!
//! A directory index links to much more than the data files (sort links,
//! parent directory, readme files). Include and exclude globs pick the
//! names that belong to the mirror.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{MirrorError, Result};

/// Include/exclude glob patterns for remote names.
#[derive(Debug, Clone)]
pub struct NameFilter {
    include: GlobSet,
    exclude: GlobSet,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl NameFilter {
    /// Accept every name.
    pub fn accept_all() -> Self {
        Self {
            include: GlobSet::empty(),
            exclude: GlobSet::empty(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Build a filter. An empty include list accepts every name that is not
    /// excluded.
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
            include_patterns: include.iter().map(|p| p.as_ref().to_string()).collect(),
            exclude_patterns: exclude.iter().map(|p| p.as_ref().to_string()).collect(),
        })
    }

    /// Check if a name belongs to the mirror.
    pub fn accepts(&self, name: &str) -> bool {
        if self.exclude.is_match(name) {
            return false;
        }
        self.include_patterns.is_empty() || self.include.is_match(name)
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }
}

fn build_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern.as_ref()).map_err(|e| {
            MirrorError::Config(format!("invalid glob pattern {:?}: {}", pattern.as_ref(), e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| MirrorError::Config(format!("invalid glob set: {}", e)))
}
