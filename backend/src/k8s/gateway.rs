//! Resource gateway: the cluster capability the suite engine depends on

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use super::manifest::Manifest;
use crate::models::ResourceKind;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("created {kind} was returned without a name")]
    MissingName { kind: ResourceKind },

    #[error("manifest does not match resource kind {kind}")]
    KindMismatch { kind: ResourceKind },

    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

/// Apply/list/delete cluster objects by kind and name
///
/// This trait abstracts the Kubernetes API for testability.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    /// Check whether an object of `kind` named `name` exists
    async fn exists(&self, kind: ResourceKind, name: &str) -> Result<bool, GatewayError>;

    /// Create the object, returning the name the cluster reports
    async fn apply(&self, kind: ResourceKind, manifest: Manifest) -> Result<String, GatewayError>;

    /// Names of all objects of `kind`
    async fn list(&self, kind: ResourceKind) -> Result<Vec<String>, GatewayError>;

    /// Delete an object; a missing object yields `GatewayError::NotFound`
    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), GatewayError>;

    /// Names of all pods in the gateway's namespace
    async fn list_pods(&self) -> Result<Vec<String>, GatewayError>;
}
