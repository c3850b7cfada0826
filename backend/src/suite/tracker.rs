//! Created-resource tracking
//!
//! The tracker is the single source of truth for teardown: it only ever holds
//! names that a successful create call returned.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::ResourceKind;

/// Ordered names of created resources, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatedResources(BTreeMap<ResourceKind, Vec<String>>);

impl CreatedResources {
    /// Append `name` under `kind`. Duplicates are kept.
    pub fn record(&mut self, kind: ResourceKind, name: impl Into<String>) {
        self.0.entry(kind).or_default().push(name.into());
    }

    pub fn snapshot(&self) -> BTreeMap<ResourceKind, Vec<String>> {
        self.0.clone()
    }

    pub fn names(&self, kind: ResourceKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.0.keys().copied().collect()
    }

    /// Replace the names tracked for `kind`; an empty list drops the kind
    pub fn retain_only(&mut self, kind: ResourceKind, names: Vec<String>) {
        if names.is_empty() {
            self.0.remove(&kind);
        } else {
            self.0.insert(kind, names);
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Total number of tracked names across kinds
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

impl From<BTreeMap<ResourceKind, Vec<String>>> for CreatedResources {
    fn from(map: BTreeMap<ResourceKind, Vec<String>>) -> Self {
        Self(map)
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown resource kind '{0}' in tracker")]
    UnknownKind(String),

    #[error("tracker unavailable: {0}")]
    Unavailable(String),
}

/// Suite-scoped store of created resources
///
/// Every operation is keyed by suite id; suites never see each other's entries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TrackerStore: Send + Sync {
    async fn record(
        &self,
        suite_id: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), TrackerError>;

    /// Kinds that currently have tracked names
    async fn kinds(&self, suite_id: &str) -> Result<Vec<ResourceKind>, TrackerError>;

    /// Tracked names for a kind, in creation order
    async fn list(&self, suite_id: &str, kind: ResourceKind) -> Result<Vec<String>, TrackerError>;

    /// Replace the tracked names for a kind
    async fn replace(
        &self,
        suite_id: &str,
        kind: ResourceKind,
        names: Vec<String>,
    ) -> Result<(), TrackerError>;

    async fn clear(&self, suite_id: &str) -> Result<(), TrackerError>;
}

/// In-process tracker store
#[derive(Default)]
pub struct MemoryTracker {
    suites: RwLock<HashMap<String, CreatedResources>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self, suite_id: &str) -> CreatedResources {
        self.suites
            .read()
            .await
            .get(suite_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TrackerStore for MemoryTracker {
    async fn record(
        &self,
        suite_id: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), TrackerError> {
        self.suites
            .write()
            .await
            .entry(suite_id.to_string())
            .or_default()
            .record(kind, name);
        Ok(())
    }

    async fn kinds(&self, suite_id: &str) -> Result<Vec<ResourceKind>, TrackerError> {
        Ok(self
            .suites
            .read()
            .await
            .get(suite_id)
            .map(CreatedResources::kinds)
            .unwrap_or_default())
    }

    async fn list(&self, suite_id: &str, kind: ResourceKind) -> Result<Vec<String>, TrackerError> {
        Ok(self
            .suites
            .read()
            .await
            .get(suite_id)
            .map(|created| created.names(kind).to_vec())
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        suite_id: &str,
        kind: ResourceKind,
        names: Vec<String>,
    ) -> Result<(), TrackerError> {
        let mut suites = self.suites.write().await;
        if let Some(created) = suites.get_mut(suite_id) {
            created.retain_only(kind, names);
            if created.is_empty() {
                suites.remove(suite_id);
            }
        } else if !names.is_empty() {
            let mut created = CreatedResources::default();
            created.retain_only(kind, names);
            suites.insert(suite_id.to_string(), created);
        }
        Ok(())
    }

    async fn clear(&self, suite_id: &str) -> Result<(), TrackerError> {
        self.suites.write().await.remove(suite_id);
        Ok(())
    }
}
