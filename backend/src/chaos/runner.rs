//! Runs chaos workers on the cluster

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{info, instrument};

use super::daemonset::{create_pumba_daemon_set, PumbaSettings};
use super::worker::Worker;
use crate::k8s::{GatewayError, Manifest, ResourceGateway};
use crate::models::ResourceKind;

/// Starts a worker on the cluster and reports the created unit's name
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkerRunner: Send + Sync {
    async fn run(&self, worker: &Worker) -> Result<String, GatewayError>;
}

/// Runs workers as pumba daemon sets through a resource gateway
pub struct PumbaRunner {
    gateway: Arc<dyn ResourceGateway>,
    settings: PumbaSettings,
}

impl PumbaRunner {
    pub fn new(gateway: Arc<dyn ResourceGateway>, settings: PumbaSettings) -> Self {
        Self { gateway, settings }
    }
}

#[async_trait]
impl WorkerRunner for PumbaRunner {
    #[instrument(
        skip(self, worker),
        fields(worker_id = %worker.id(), target = %worker.target(), mode = %worker.mode())
    )]
    async fn run(&self, worker: &Worker) -> Result<String, GatewayError> {
        let daemon_set = create_pumba_daemon_set(worker, &self.settings);
        let name = self
            .gateway
            .apply(ResourceKind::ChaosDaemonSet, Manifest::DaemonSet(daemon_set))
            .await?;
        info!(daemon_set = %name, "Started chaos worker");
        Ok(name)
    }
}
