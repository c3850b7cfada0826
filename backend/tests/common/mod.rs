//! In-memory fakes shared by integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use resilia_backend::{
    chaos::{PumbaRunner, PumbaSettings},
    k8s::{GatewayError, Manifest, ResourceGateway},
    models::ResourceKind,
    suite::{MemoryTracker, SuiteEngine, TrackerError, TrackerStore},
};

pub fn server_error(message: &str) -> GatewayError {
    GatewayError::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

#[derive(Default)]
struct ClusterState {
    objects: BTreeMap<ResourceKind, Vec<String>>,
    pods: Vec<String>,
    fail_exists: bool,
    fail_apply: HashSet<String>,
    fail_delete: HashSet<String>,
    applied: Vec<(ResourceKind, String)>,
    delete_attempts: Vec<(ResourceKind, String)>,
}

/// A cluster kept in memory, with per-name failure injection
#[derive(Default, Clone)]
pub struct FakeGateway {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `name` already exists on the cluster
    pub fn seed(&self, kind: ResourceKind, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.objects.entry(kind).or_default().push(name.to_string());
    }

    pub fn add_pod(&self, name: &str) {
        self.state.lock().unwrap().pods.push(name.to_string());
    }

    pub fn fail_exists(&self) {
        self.state.lock().unwrap().fail_exists = true;
    }

    pub fn fail_apply(&self, name: &str) {
        self.state.lock().unwrap().fail_apply.insert(name.to_string());
    }

    pub fn fail_delete(&self, name: &str) {
        self.state.lock().unwrap().fail_delete.insert(name.to_string());
    }

    pub fn heal_delete(&self, name: &str) {
        self.state.lock().unwrap().fail_delete.remove(name);
    }

    pub fn applied(&self) -> Vec<(ResourceKind, String)> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn delete_attempts(&self) -> Vec<(ResourceKind, String)> {
        self.state.lock().unwrap().delete_attempts.clone()
    }

    pub fn objects(&self, kind: ResourceKind) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResourceGateway for FakeGateway {
    async fn exists(&self, kind: ResourceKind, name: &str) -> Result<bool, GatewayError> {
        let state = self.state.lock().unwrap();
        if state.fail_exists {
            return Err(server_error("existence check unavailable"));
        }
        Ok(state
            .objects
            .get(&kind)
            .is_some_and(|names| names.iter().any(|n| n == name)))
    }

    async fn apply(&self, kind: ResourceKind, manifest: Manifest) -> Result<String, GatewayError> {
        let name = manifest
            .name()
            .ok_or(GatewayError::MissingName { kind })?
            .to_string();

        let mut state = self.state.lock().unwrap();
        if state.fail_apply.contains(&name) {
            return Err(server_error("apply rejected"));
        }
        let names = state.objects.entry(kind).or_default();
        if names.contains(&name) {
            return Err(GatewayError::AlreadyExists { kind, name });
        }
        names.push(name.clone());
        state.applied.push((kind, name.clone()));
        Ok(name)
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<String>, GatewayError> {
        Ok(self.objects(kind))
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.delete_attempts.push((kind, name.to_string()));
        if state.fail_delete.contains(name) {
            return Err(server_error("delete rejected"));
        }
        let names = state.objects.entry(kind).or_default();
        match names.iter().position(|n| n == name) {
            Some(index) => {
                names.remove(index);
                Ok(())
            }
            None => Err(GatewayError::NotFound {
                kind,
                name: name.to_string(),
            }),
        }
    }

    async fn list_pods(&self) -> Result<Vec<String>, GatewayError> {
        Ok(self.state.lock().unwrap().pods.clone())
    }
}

/// Memory tracker whose `list` fails for chosen kinds
pub struct FlakyTracker {
    inner: MemoryTracker,
    broken: Mutex<HashSet<ResourceKind>>,
}

impl FlakyTracker {
    pub fn new() -> Self {
        Self {
            inner: MemoryTracker::new(),
            broken: Mutex::new(HashSet::new()),
        }
    }

    pub fn break_list(&self, kind: ResourceKind) {
        self.broken.lock().unwrap().insert(kind);
    }

    pub fn repair(&self) {
        self.broken.lock().unwrap().clear();
    }
}

#[async_trait]
impl TrackerStore for FlakyTracker {
    async fn record(
        &self,
        suite_id: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(), TrackerError> {
        self.inner.record(suite_id, kind, name).await
    }

    async fn kinds(&self, suite_id: &str) -> Result<Vec<ResourceKind>, TrackerError> {
        self.inner.kinds(suite_id).await
    }

    async fn list(&self, suite_id: &str, kind: ResourceKind) -> Result<Vec<String>, TrackerError> {
        if self.broken.lock().unwrap().contains(&kind) {
            return Err(TrackerError::Unavailable(format!("{kind} index unreadable")));
        }
        self.inner.list(suite_id, kind).await
    }

    async fn replace(
        &self,
        suite_id: &str,
        kind: ResourceKind,
        names: Vec<String>,
    ) -> Result<(), TrackerError> {
        self.inner.replace(suite_id, kind, names).await
    }

    async fn clear(&self, suite_id: &str) -> Result<(), TrackerError> {
        self.inner.clear(suite_id).await
    }
}

/// Engine wired to a fake cluster, running workers through the real pumba runner
pub fn engine_with(gateway: &FakeGateway, tracker: Arc<dyn TrackerStore>) -> SuiteEngine {
    let gateway: Arc<dyn ResourceGateway> = Arc::new(gateway.clone());
    let runner = Arc::new(PumbaRunner::new(Arc::clone(&gateway), PumbaSettings::default()));
    SuiteEngine::new(gateway, runner, tracker)
}

pub fn deployment(name: &str) -> String {
    format!(
        r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
spec:
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      containers:
        - name: {name}
          image: redis:7
"#
    )
}

pub fn service(name: &str) -> String {
    format!(
        r#"{{"apiVersion":"v1","kind":"Service","metadata":{{"name":"{name}"}},"spec":{{"selector":{{"app":"{name}"}},"ports":[{{"port":6379}}]}}}}"#
    )
}

pub fn daemon_set(name: &str) -> String {
    format!(
        r#"
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: {name}
spec:
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      containers:
        - name: {name}
          image: busybox
"#
    )
}
