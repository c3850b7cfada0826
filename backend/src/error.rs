//! HTTP boundary errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::k8s::GatewayError;
use crate::suite::SuiteError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] GatewayError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A suite operation failed; the suite stays registered under `suite_id`
    #[error("{source}")]
    Suite {
        suite_id: String,
        #[source]
        source: SuiteError,
    },
}

impl AppError {
    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn bad_request(msg: &str) -> Self {
        AppError::BadRequest(msg.to_string())
    }

    pub fn suite(suite_id: impl Into<String>, source: SuiteError) -> Self {
        AppError::Suite {
            suite_id: suite_id.into(),
            source,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Kubernetes(GatewayError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Kubernetes(_) => StatusCode::BAD_GATEWAY,
            AppError::Suite {
                source: SuiteError::Manifest { .. },
                ..
            } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Suite { .. } => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) => "database",
            AppError::Kubernetes(_) => "kubernetes",
            AppError::Serialization(_) => "serialization",
            AppError::Suite { .. } => "suite",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suite_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    causes: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let (suite_id, causes) = match &self {
            AppError::Suite {
                suite_id,
                source: source @ SuiteError::Teardown { .. },
            } => (Some(suite_id.clone()), source.causes()),
            AppError::Suite { suite_id, .. } => (Some(suite_id.clone()), Vec::new()),
            _ => (None, Vec::new()),
        };

        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            suite_id,
            causes,
        };
        (status, Json(body)).into_response()
    }
}
