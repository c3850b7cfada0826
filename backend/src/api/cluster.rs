use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::ResourceKind;

/// List pod names in the configured namespace
#[utoipa::path(
    get,
    path = "/pods",
    tag = "cluster",
    responses(
        (status = 200, description = "Pod names", body = Vec<String>),
        (status = 502, description = "Cluster unavailable")
    )
)]
pub async fn list_pods(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.engine.gateway().list_pods().await?))
}

/// List cluster resources of one kind
#[utoipa::path(
    get,
    path = "/cluster/{kind}",
    tag = "cluster",
    params(("kind" = String, Path, description = "Resource kind, e.g. deployment")),
    responses(
        (status = 200, description = "Resource names", body = Vec<String>),
        (status = 400, description = "Unknown kind"),
        (status = 502, description = "Cluster unavailable")
    )
)]
pub async fn list_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    let kind: ResourceKind = kind
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown resource kind: {}", kind)))?;
    Ok(Json(state.engine.gateway().list(kind).await?))
}
