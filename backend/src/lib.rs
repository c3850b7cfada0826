//! Resilia Backend Library
//!
//! Suite lifecycle, created-resource tracking and pumba chaos workers on
//! Kubernetes, plus the HTTP surface around them.

pub mod api;
pub mod chaos;
pub mod config;
pub mod db;
pub mod error;
pub mod k8s;
pub mod models;
pub mod suite;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;
use crate::api::AppState;

/// Create the application router with the given state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/ping", get(api::health::ping))
        .route("/health", get(api::health::health_check))
        // Metrics (Prometheus)
        .route("/metrics", get(api::metrics::metrics_handler))
        // Suites
        .route("/suites", get(api::suites::list))
        .route("/suites", post(api::suites::create))
        .route("/suites/:id", get(api::suites::get))
        .route("/suites/:id/stop", post(api::suites::stop))
        // Cluster
        .route("/pods", get(api::cluster::list_pods))
        .route("/cluster/:kind", get(api::cluster::list_kind))
        // OpenAPI / Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
