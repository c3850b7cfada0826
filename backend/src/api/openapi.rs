//! OpenAPI documentation for the Resilia API

use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

/// API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Resilia API",
        version = "1.0.0",
        description = "Disposable cluster test suites with chaos injection.\n\n## Features\n- Apply suites of deployments, services and daemon sets\n- Run pumba chaos workers (pause, network emulation) against pods\n- Tear down every created resource",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8181", description = "Local development server")
    ),
    tags(
        (name = "suites", description = "Suite lifecycle - create, run, stop"),
        (name = "cluster", description = "Cluster inspection"),
        (name = "health", description = "Liveness and metrics")
    ),
    paths(
        crate::api::health::ping,
        crate::api::health::health_check,
        crate::api::metrics::metrics_handler,
        crate::api::suites::create,
        crate::api::suites::list,
        crate::api::suites::get,
        crate::api::suites::stop,
        crate::api::cluster::list_pods,
        crate::api::cluster::list_kind,
    ),
    components(
        schemas(
            crate::models::Suite,
            crate::models::SuiteState,
            crate::models::ResourceKind,
            crate::models::ResourceDescriptor,
            crate::models::CreateSuiteRequest,
            crate::models::ResourceRequest,
            crate::models::WorkerRequest,
            crate::chaos::Worker,
            crate::chaos::WorkerMode,
            crate::chaos::WorkerOption,
            crate::chaos::ChaosVariant,
            crate::chaos::NetEmCommand,
            crate::chaos::NetEmOptions,
            crate::chaos::PauseOptions,
            crate::suite::TeardownReport,
            crate::suite::DeleteFailure,
            crate::api::health::PingResponse,
            crate::api::health::HealthResponse,
            ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

/// Error response returned by the API
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code
    #[schema(example = "suite")]
    pub error: String,
    /// Human-readable message
    pub message: String,
    /// Set when a suite operation failed; the suite can still be stopped
    pub suite_id: Option<String>,
    /// Per-kind causes of a failed teardown
    #[serde(default)]
    pub causes: Vec<String>,
}
