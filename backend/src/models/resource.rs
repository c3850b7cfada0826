use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// Classification of a cluster object handled by a suite.
///
/// `DaemonSet` and `ChaosDaemonSet` share the same `apps/v1` object type but are
/// created and torn down through different paths, so they are distinct tags.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    ToSchema,
)]
pub enum ResourceKind {
    #[serde(rename = "deployment")]
    #[strum(serialize = "deployment")]
    Deployment,
    #[serde(rename = "service")]
    #[strum(serialize = "service")]
    Service,
    /// Ordinary daemon set declared by a suite
    #[serde(rename = "daemonset")]
    #[strum(serialize = "daemonset")]
    DaemonSet,
    /// Daemon set created by the chaos runner for a worker
    #[serde(rename = "chaos-daemonset")]
    #[strum(serialize = "chaos-daemonset")]
    ChaosDaemonSet,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A declared resource of a suite: a raw manifest plus its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResourceDescriptor {
    pub id: String,
    pub suite_id: String,
    pub name: String,
    pub kind: ResourceKind,
    /// Raw manifest body (JSON or YAML)
    pub value: String,
}

impl ResourceDescriptor {
    pub fn new(
        suite_id: impl Into<String>,
        name: impl Into<String>,
        kind: ResourceKind,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            suite_id: suite_id.into(),
            name: name.into(),
            kind,
            value: value.into(),
        }
    }
}
