//! Kubernetes client wrapper for Resilia

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{
    api::{Api, DeleteParams, ListParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, info, instrument};

use super::gateway::{GatewayError, ResourceGateway};
use super::manifest::Manifest;
use crate::chaos::PUMBA_LABEL;
use crate::models::ResourceKind;

/// Wrapper around kube::Client scoped to a single namespace
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
    namespace: String,
}

impl K8sClient {
    /// Create a client from an explicit kubeconfig path, or infer one when absent
    #[instrument(skip_all, fields(namespace = %namespace))]
    pub async fn connect(kubeconfig: Option<&str>, namespace: &str) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
            }
            None => Config::infer().await?,
        };
        Self::from_kube_config(config, namespace)
    }

    fn from_kube_config(config: Config, namespace: &str) -> Result<Self> {
        let client = Client::try_from(config)?;

        info!(namespace, "Connected to Kubernetes cluster");

        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }

    /// Get the namespace this client operates in
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub fn daemon_sets(&self) -> Api<DaemonSet> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Check if cluster is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let version = self.client.apiserver_version().await?;
        info!(version = %version.git_version, "Kubernetes cluster is healthy");
        Ok(true)
    }
}

/// Label selector separating ordinary daemon sets from chaos daemon sets
fn list_params(kind: ResourceKind) -> ListParams {
    match kind {
        ResourceKind::DaemonSet => ListParams::default().labels(&format!("!{}", PUMBA_LABEL)),
        ResourceKind::ChaosDaemonSet => {
            ListParams::default().labels(&format!("{}=true", PUMBA_LABEL))
        }
        ResourceKind::Deployment | ResourceKind::Service => ListParams::default(),
    }
}

async fn exists_in<K>(api: Api<K>, name: &str) -> Result<bool, GatewayError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    Ok(api.get_opt(name).await?.is_some())
}

async fn create_in<K>(api: Api<K>, kind: ResourceKind, object: &K) -> Result<String, GatewayError>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let requested = object.meta().name.clone().unwrap_or_default();
    match api.create(&PostParams::default(), object).await {
        Ok(created) => created
            .meta()
            .name
            .clone()
            .ok_or(GatewayError::MissingName { kind }),
        Err(kube::Error::Api(e)) if e.code == 409 => Err(GatewayError::AlreadyExists {
            kind,
            name: requested,
        }),
        Err(e) => Err(e.into()),
    }
}

async fn list_in<K>(api: Api<K>, params: &ListParams) -> Result<Vec<String>, GatewayError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let list = api.list(params).await?;
    Ok(list
        .items
        .into_iter()
        .filter_map(|item| item.meta().name.clone())
        .collect())
}

async fn delete_in<K>(api: Api<K>, kind: ResourceKind, name: &str) -> Result<(), GatewayError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Err(GatewayError::NotFound {
            kind,
            name: name.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ResourceGateway for K8sClient {
    #[instrument(skip(self))]
    async fn exists(&self, kind: ResourceKind, name: &str) -> Result<bool, GatewayError> {
        match kind {
            ResourceKind::Deployment => exists_in(self.deployments(), name).await,
            ResourceKind::Service => exists_in(self.services(), name).await,
            ResourceKind::DaemonSet | ResourceKind::ChaosDaemonSet => {
                exists_in(self.daemon_sets(), name).await
            }
        }
    }

    #[instrument(skip(self, manifest), fields(name = manifest.name().unwrap_or("unknown")))]
    async fn apply(&self, kind: ResourceKind, manifest: Manifest) -> Result<String, GatewayError> {
        let name = match (kind, &manifest) {
            (ResourceKind::Deployment, Manifest::Deployment(d)) => {
                create_in(self.deployments(), kind, d).await?
            }
            (ResourceKind::Service, Manifest::Service(s)) => {
                create_in(self.services(), kind, s).await?
            }
            (ResourceKind::DaemonSet | ResourceKind::ChaosDaemonSet, Manifest::DaemonSet(ds)) => {
                create_in(self.daemon_sets(), kind, ds).await?
            }
            _ => return Err(GatewayError::KindMismatch { kind }),
        };
        info!(%kind, %name, "Created resource");
        Ok(name)
    }

    #[instrument(skip(self))]
    async fn list(&self, kind: ResourceKind) -> Result<Vec<String>, GatewayError> {
        let params = list_params(kind);
        match kind {
            ResourceKind::Deployment => list_in(self.deployments(), &params).await,
            ResourceKind::Service => list_in(self.services(), &params).await,
            ResourceKind::DaemonSet | ResourceKind::ChaosDaemonSet => {
                list_in(self.daemon_sets(), &params).await
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), GatewayError> {
        match kind {
            ResourceKind::Deployment => delete_in(self.deployments(), kind, name).await?,
            ResourceKind::Service => delete_in(self.services(), kind, name).await?,
            ResourceKind::DaemonSet | ResourceKind::ChaosDaemonSet => {
                delete_in(self.daemon_sets(), kind, name).await?
            }
        }
        debug!(%kind, name, "Deleted resource");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_pods(&self) -> Result<Vec<String>, GatewayError> {
        list_in(self.pods(), &ListParams::default()).await
    }
}
