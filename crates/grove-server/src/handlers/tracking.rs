//! Time-tracking endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use grove_types::{ForestError, TrackedInterval};

use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;
use crate::state::{AppState, Engine};

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub path: String,
}

/// `POST /time/start` – open a tracking interval for the caller.
pub async fn start_time_tracking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<TrackingRequest>,
) -> ApiResult<StatusCode> {
    let node_id = state.resolve_path(&request.path).await?;
    let user_id = user.user_id;

    state
        .queue
        .submit("start_time_tracking", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.start_time_tracking(&user_id)?;
            }
            engine.persist().await?;
            Ok::<(), ForestError>(())
        })
        .await??;

    Ok(StatusCode::OK)
}

/// `POST /time/stop` – close the open interval and return the updated
/// summary.
pub async fn stop_time_tracking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<TrackingRequest>,
) -> ApiResult<Json<Vec<TrackedInterval>>> {
    let node_id = state.resolve_path(&request.path).await?;
    let user_id = user.user_id;

    let summary = state
        .queue
        .submit("stop_time_tracking", move |engine: Engine| async move {
            let summary = {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.stop_time_tracking(&user_id)?;
                node.time_tracking_summary(&user_id)
            };
            engine.persist().await?;
            Ok::<Vec<TrackedInterval>, ForestError>(summary)
        })
        .await??;

    Ok(Json(summary))
}

/// `GET /time` – the caller's tracked intervals on a node.
pub async fn time_tracking_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<TrackingRequest>,
) -> ApiResult<Json<Vec<TrackedInterval>>> {
    let node_id = state.resolve_path(&request.path).await?;
    let forest = state.engine.forest.read().await;
    let node = forest
        .node(&node_id)
        .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
    Ok(Json(node.time_tracking_summary(&user.user_id)))
}
