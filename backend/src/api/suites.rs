use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use crate::api::{AppState, SharedSuite};
use crate::error::{AppError, AppResult};
use crate::models::{CreateSuiteRequest, Suite, SuiteState};
use crate::suite::{SuiteError, TeardownReport};

/// Create a suite, apply its resources and start its chaos workers.
///
/// A failed suite stays registered so it can still be stopped.
#[utoipa::path(
    post,
    path = "/suites",
    tag = "suites",
    request_body = CreateSuiteRequest,
    responses(
        (status = 201, description = "Suite running", body = Suite),
        (status = 400, description = "Invalid request"),
        (status = 422, description = "Invalid manifest"),
        (status = 502, description = "Cluster operation failed")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateSuiteRequest>,
) -> AppResult<(StatusCode, Json<Suite>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Suite name is required"));
    }
    if let Some(worker) = req.workers.iter().find(|w| w.target.trim().is_empty()) {
        return Err(AppError::BadRequest(format!(
            "Worker with interval {} has no target",
            worker.interval
        )));
    }

    let suite = req.into_suite();
    state.db.save_suite(&suite).await?;
    let shared = state.suites.insert(suite).await;

    let mut suite = shared.lock().await;
    info!(suite_id = %suite.id, suite = %suite.name, "Running suite");

    let result = match state.engine.run_declared_resources(&mut suite).await {
        Ok(()) => state.engine.run_chaos_workers(&mut suite).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        persist_after_failure(&state, &suite).await;
        return Err(AppError::suite(suite.id.clone(), e));
    }

    state.db.save_suite(&suite).await?;
    metrics::counter!("resilia_suites_total", 1, "outcome" => "running");
    Ok((StatusCode::CREATED, Json(suite.clone())))
}

/// List all suites
#[utoipa::path(
    get,
    path = "/suites",
    tag = "suites",
    responses(
        (status = 200, description = "All suites", body = Vec<Suite>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Suite>>> {
    Ok(Json(state.db.list_suites().await?))
}

/// Get a suite by ID
#[utoipa::path(
    get,
    path = "/suites/{id}",
    tag = "suites",
    params(("id" = String, Path, description = "Suite ID")),
    responses(
        (status = 200, description = "Suite found", body = Suite),
        (status = 404, description = "Suite not found")
    )
)]
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Suite>> {
    if let Some(shared) = state.suites.get(&id).await {
        return Ok(Json(shared.lock().await.clone()));
    }

    let suite = state
        .db
        .get_suite(&id)
        .await?
        .ok_or_else(|| AppError::not_found(&format!("Suite {} not found", id)))?;
    Ok(Json(suite))
}

/// Tear down everything a suite created
#[utoipa::path(
    post,
    path = "/suites/{id}/stop",
    tag = "suites",
    params(("id" = String, Path, description = "Suite ID")),
    responses(
        (status = 200, description = "Teardown report", body = TeardownReport),
        (status = 404, description = "Suite not found"),
        (status = 409, description = "Suite is busy with another operation"),
        (status = 502, description = "Tracked resources could not be listed")
    )
)]
pub async fn stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<TeardownReport>> {
    let shared = registered(&state, &id).await?;
    let mut suite = shared
        .try_lock()
        .map_err(|_| AppError::Conflict(format!("Suite {} is busy", id)))?;

    match stop_locked(&state, &mut suite).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => Err(AppError::suite(id, e)),
    }
}

/// Stop a suite the caller holds the lock of, persisting its final state.
///
/// A stopped suite leaves the registry; later reads come from the database.
pub async fn stop_locked(
    state: &AppState,
    suite: &mut Suite,
) -> Result<TeardownReport, SuiteError> {
    match state.engine.stop(suite).await {
        Ok(report) => {
            if let Err(e) = state.db.save_suite(suite).await {
                warn!(suite_id = %suite.id, error = %e, "Failed to persist stopped suite");
            }
            if suite.state == SuiteState::Stopped {
                state.suites.remove(&suite.id).await;
            }
            Ok(report)
        }
        Err(e) => {
            persist_after_failure(state, suite).await;
            Err(e)
        }
    }
}

/// Look a suite up in the registry, falling back to the database
async fn registered(state: &AppState, id: &str) -> AppResult<SharedSuite> {
    if let Some(shared) = state.suites.get(id).await {
        return Ok(shared);
    }
    let suite = state
        .db
        .get_suite(id)
        .await?
        .ok_or_else(|| AppError::not_found(&format!("Suite {} not found", id)))?;
    Ok(state.suites.insert(suite).await)
}

async fn persist_after_failure(state: &AppState, suite: &Suite) {
    if let Err(e) = state.db.save_suite(suite).await {
        warn!(suite_id = %suite.id, error = %e, "Failed to persist failed suite");
    }
}
