//! Kubernetes integration module for Resilia
//!
//! This module handles all interactions with the cluster:
//! - Decoding raw suite manifests into typed objects
//! - Creating, listing and deleting deployments, services and daemon sets
//! - Listing pods that chaos workers can target

mod client;
mod gateway;
mod manifest;

pub use client::K8sClient;
#[cfg(test)]
pub use gateway::MockResourceGateway;
pub use gateway::{GatewayError, ResourceGateway};
pub use manifest::{Manifest, ManifestError};
