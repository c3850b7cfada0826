pub mod cluster;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod suites;

use std::collections::HashMap;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::db::Database;
use crate::models::Suite;
use crate::suite::SuiteEngine;

/// A registered suite; each suite is locked independently
pub type SharedSuite = Arc<Mutex<Suite>>;

/// Suites known to this process, by id
#[derive(Clone, Default)]
pub struct SuiteRegistry {
    inner: Arc<RwLock<HashMap<String, SharedSuite>>>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, suite: Suite) -> SharedSuite {
        let id = suite.id.clone();
        let shared = Arc::new(Mutex::new(suite));
        self.inner.write().await.insert(id, Arc::clone(&shared));
        shared
    }

    pub async fn get(&self, id: &str) -> Option<SharedSuite> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<SharedSuite> {
        self.inner.write().await.remove(id)
    }

    pub async fn all(&self) -> Vec<SharedSuite> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub engine: Arc<SuiteEngine>,
    pub suites: SuiteRegistry,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(db: Database, config: Config, engine: Arc<SuiteEngine>) -> Self {
        Self {
            db,
            config,
            engine,
            suites: SuiteRegistry::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Register every persisted suite that may still own cluster resources.
    /// Returns the number of suites restored.
    pub async fn restore_live_suites(&self) -> Result<usize, sqlx::Error> {
        let live = self.db.list_live_suites().await?;
        let count = live.len();
        for suite in live {
            tracing::info!(suite_id = %suite.id, state = %suite.state, "Restored suite");
            self.suites.insert(suite).await;
        }
        Ok(count)
    }
}
