//! Three-way diff between a remote catalog and a store catalog.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MirrorError, Result};

/// A named piece of content and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Item {
    pub name: String,
    pub fingerprint: String,
}

impl Item {
    pub fn new(name: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fingerprint: fingerprint.into(),
        }
    }
}

/// What to do when a remote listing names the same item twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Abort the run (default).
    #[default]
    Reject,
    /// Keep the entry seen last.
    LastWins,
}

/// A catalog keyed by item name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSet {
    items: BTreeMap<String, Item>,
}

/// Items discovered at the remote source.
pub type RemoteSet = ItemSet;
/// Items already present under the store prefix.
pub type StoreSet = ItemSet;

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(name, fingerprint)` pairs, applying `policy` to
    /// repeated names.
    pub fn from_pairs<I, N, F>(pairs: I, policy: DuplicatePolicy) -> Result<Self>
    where
        I: IntoIterator<Item = (N, F)>,
        N: Into<String>,
        F: Into<String>,
    {
        let mut set = Self::new();
        for (name, fingerprint) in pairs {
            set.insert(Item::new(name, fingerprint), policy)?;
        }
        Ok(set)
    }

    /// Insert an item. Names are compared exactly; `a.txt` and `A.txt` are
    /// different items.
    pub fn insert(&mut self, item: Item, policy: DuplicatePolicy) -> Result<()> {
        if let Some(previous) = self.items.get(&item.name) {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(MirrorError::InvalidListing(format!(
                        "duplicate name in listing: {}",
                        item.name
                    )));
                }
                DuplicatePolicy::LastWins => {
                    tracing::warn!(
                        name = %item.name,
                        previous = %previous.fingerprint,
                        current = %item.fingerprint,
                        "Duplicate name in listing, keeping the last entry"
                    );
                }
            }
        }
        self.items.insert(item.name.clone(), item);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.items.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }
}

/// Why an item is scheduled for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadReason {
    /// Not present in the store.
    New,
    /// Present with a different fingerprint.
    Changed,
}

/// An item to upload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Upload {
    pub item: Item,
    pub reason: UploadReason,
}

/// Actions that reconcile a store prefix with the remote source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub to_upload: BTreeMap<String, Upload>,
    pub to_delete: BTreeSet<String>,
    pub to_skip: BTreeSet<String>,
}

impl SyncPlan {
    /// True when no store call is needed.
    pub fn is_noop(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }

    /// Number of store calls the plan will issue.
    pub fn action_count(&self) -> usize {
        self.to_upload.len() + self.to_delete.len()
    }

    pub fn upload_names(&self) -> BTreeSet<String> {
        self.to_upload.keys().cloned().collect()
    }

    /// Remove deletions for names the caller must not touch (e.g. items that
    /// are listed remotely but could not be fetched). Returns the names
    /// that were dropped.
    pub fn protect<'a, I>(&mut self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|name| self.to_delete.remove(*name))
            .cloned()
            .collect()
    }
}

/// Compute the plan that turns `store` into a mirror of `remote`.
///
/// Fingerprints are compared as exact strings. The result does not depend
/// on the iteration order of either set.
pub fn diff(remote: &RemoteSet, store: &StoreSet) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for item in remote.iter() {
        match store.get(&item.name) {
            None => {
                plan.to_upload.insert(
                    item.name.clone(),
                    Upload { item: item.clone(), reason: UploadReason::New },
                );
            }
            Some(existing) if existing.fingerprint != item.fingerprint => {
                plan.to_upload.insert(
                    item.name.clone(),
                    Upload { item: item.clone(), reason: UploadReason::Changed },
                );
            }
            Some(_) => {
                plan.to_skip.insert(item.name.clone());
            }
        }
    }

    for item in store.iter() {
        if !remote.contains(&item.name) {
            plan.to_delete.insert(item.name.clone());
        }
    }

    plan
}
