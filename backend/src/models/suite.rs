use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::resource::{ResourceDescriptor, ResourceKind};
use crate::chaos::{Worker, WorkerMode, WorkerOption};
use crate::suite::CreatedResources;

/// Lifecycle state of a suite run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SuiteState {
    #[default]
    Idle,
    Applying,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl SuiteState {
    /// Whether the suite may still own live cluster resources
    pub fn is_live(&self) -> bool {
        !matches!(self, SuiteState::Stopped)
    }
}

impl std::fmt::Display for SuiteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuiteState::Idle => write!(f, "idle"),
            SuiteState::Applying => write!(f, "applying"),
            SuiteState::Running => write!(f, "running"),
            SuiteState::Stopping => write!(f, "stopping"),
            SuiteState::Stopped => write!(f, "stopped"),
            SuiteState::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SuiteState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SuiteState::Idle),
            "applying" => Ok(SuiteState::Applying),
            "running" => Ok(SuiteState::Running),
            "stopping" => Ok(SuiteState::Stopping),
            "stopped" => Ok(SuiteState::Stopped),
            "failed" => Ok(SuiteState::Failed),
            _ => Err(format!("Unknown suite state: {}", s)),
        }
    }
}

/// A bundle of declared cluster resources and chaos workers run and torn down
/// as a unit
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Suite {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: SuiteState,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(default)]
    pub workers: Vec<Worker>,
    /// Names returned by successful create calls, per kind
    #[serde(default)]
    #[schema(value_type = Object)]
    pub created_resources: CreatedResources,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            state: SuiteState::Idle,
            resources: Vec::new(),
            workers: Vec::new(),
            created_resources: CreatedResources::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Declare a resource owned by this suite
    pub fn add_resource(
        &mut self,
        name: impl Into<String>,
        kind: ResourceKind,
        value: impl Into<String>,
    ) -> &ResourceDescriptor {
        let resource = ResourceDescriptor::new(self.id.clone(), name, kind, value);
        self.resources.push(resource);
        self.touch();
        &self.resources[self.resources.len() - 1]
    }

    pub fn add_worker(&mut self, worker: Worker) {
        self.workers.push(worker);
        self.touch();
    }

    pub(crate) fn set_state(&mut self, state: SuiteState) {
        self.state = state;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Request body for declaring a resource
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceRequest {
    pub name: String,
    pub kind: ResourceKind,
    /// Raw manifest body (JSON or YAML)
    pub value: String,
}

/// Request body for declaring a chaos worker
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkerRequest {
    /// Target pod name
    pub target: String,
    /// Recurrence interval with unit suffix (e.g. "20s")
    pub interval: String,
    pub mode: WorkerMode,
    /// Configuration steps; the last one decides the worker's mode
    #[serde(default)]
    pub options: Vec<WorkerOption>,
}

impl WorkerRequest {
    pub fn into_worker(self) -> Worker {
        Worker::new(self.target, self.interval, self.mode, self.options)
    }
}

/// Request body for creating and running a suite
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSuiteRequest {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ResourceRequest>,
    #[serde(default)]
    pub workers: Vec<WorkerRequest>,
}

impl CreateSuiteRequest {
    pub fn into_suite(self) -> Suite {
        let mut suite = Suite::new(self.name);
        for resource in self.resources {
            suite.add_resource(resource.name, resource.kind, resource.value);
        }
        for worker in self.workers {
            suite.add_worker(worker.into_worker());
        }
        suite
    }
}
