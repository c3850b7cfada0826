use thiserror::Error;

use super::engine::TeardownReport;
use super::tracker::TrackerError;
use crate::k8s::{GatewayError, ManifestError};
use crate::models::ResourceKind;

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("invalid manifest for resource '{resource}': {source}")]
    Manifest {
        resource: String,
        #[source]
        source: ManifestError,
    },

    #[error("failed to apply {kind} '{name}': {source}")]
    Apply {
        kind: ResourceKind,
        name: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to run chaos worker {worker_id} against '{target}': {source}")]
    RunWorker {
        worker_id: String,
        target: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to track {kind} '{name}': {source}")]
    Track {
        kind: ResourceKind,
        name: String,
        #[source]
        source: TrackerError,
    },

    #[error("failed to list tracked resources ({}): {source}", scope(.kind))]
    ListTracked {
        kind: Option<ResourceKind>,
        #[source]
        source: TrackerError,
    },

    #[error("teardown task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("teardown incomplete, {} error(s)", .errors.len())]
    Teardown {
        errors: Vec<SuiteError>,
        report: TeardownReport,
    },
}

fn scope(kind: &Option<ResourceKind>) -> &'static str {
    kind.map(|k| k.as_str()).unwrap_or("all kinds")
}

impl SuiteError {
    /// Per-kind errors carried by a failed teardown, or the error itself
    pub fn causes(&self) -> Vec<String> {
        match self {
            SuiteError::Teardown { errors, .. } => errors.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}
