//! Event lifecycle endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use grove_types::{Entry, EventSummary, ForestError, Metadata};

use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;
use crate::state::{AppState, Engine};

use super::{parse_rfc3339, parse_rfc3339_opt};

#[derive(Debug, Deserialize)]
pub struct StartEventRequest {
    pub path: String,
    pub event_id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// `POST /events/start` – start an event now, or schedule it when the
/// requested start lies in the future.
pub async fn start_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<StartEventRequest>,
) -> ApiResult<StatusCode> {
    let node_id = state.resolve_path(&request.path).await?;
    let planned_start = parse_rfc3339_opt("start_time", request.start_time.as_deref())?;
    let planned_end = parse_rfc3339_opt("end_time", request.end_time.as_deref())?;
    let user_id = user.user_id;

    state
        .queue
        .submit("start_event", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.start_event(
                    &request.event_id,
                    &user_id,
                    planned_start,
                    planned_end,
                    request.metadata,
                )?;
            }
            engine.persist().await?;
            Ok::<(), ForestError>(())
        })
        .await??;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct AppendEventRequest {
    pub path: String,
    pub event_id: String,
    pub content: serde_json::Value,
    #[serde(default)]
    pub metadata: Metadata,
}

/// `POST /events/append` – append an entry to an ongoing event.
pub async fn append_to_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<AppendEventRequest>,
) -> ApiResult<StatusCode> {
    let node_id = state.resolve_path(&request.path).await?;
    let user_id = user.user_id;

    state
        .queue
        .submit("append_to_event", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.append_to_event(
                    &request.event_id,
                    &user_id,
                    request.content,
                    request.metadata,
                )?;
            }
            engine.persist().await?;
            Ok::<(), ForestError>(())
        })
        .await??;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct EndEventRequest {
    pub path: String,
    pub event_id: String,
}

/// `POST /events/end` – finish an ongoing event.
pub async fn end_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<EndEventRequest>,
) -> ApiResult<StatusCode> {
    let node_id = state.resolve_path(&request.path).await?;
    let user_id = user.user_id;

    state
        .queue
        .submit("end_event", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.end_event(&request.event_id, &user_id)?;
            }
            engine.persist().await?;
            Ok::<(), ForestError>(())
        })
        .await??;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct EventEntriesRequest {
    pub path: String,
    pub event_id: String,
}

/// `POST /events` – fetch the entries of one event.
pub async fn event_entries(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(request): Json<EventEntriesRequest>,
) -> ApiResult<Json<Vec<Entry>>> {
    let node_id = state.resolve_path(&request.path).await?;
    let forest = state.engine.forest.read().await;
    let node = forest
        .node(&node_id)
        .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
    Ok(Json(node.event_entries(&request.event_id)?))
}

#[derive(Debug, Deserialize)]
pub struct PlanEventRequest {
    pub path: String,
    pub event_id: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// `POST /events/plan` – record a planned event for later comparison
/// against the actual one.
pub async fn plan_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<PlanEventRequest>,
) -> ApiResult<StatusCode> {
    let node_id = state.resolve_path(&request.path).await?;
    let start_time = parse_rfc3339("start_time", &request.start_time)?;
    let end_time = parse_rfc3339("end_time", &request.end_time)?;
    let user_id = user.user_id;

    state
        .queue
        .submit("plan_event", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.plan_event(
                    &request.event_id,
                    &user_id,
                    Some(start_time),
                    Some(end_time),
                    request.metadata,
                )?;
            }
            engine.persist().await?;
            Ok::<(), ForestError>(())
        })
        .await??;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct CompareEventsRequest {
    pub path: String,
    pub planned_event_id: String,
    pub actual_event_id: String,
}

#[derive(Debug, Serialize)]
pub struct CompareEventsResponse {
    pub equal: bool,
    pub differences: Vec<String>,
}

/// `POST /events/compare` – planned-vs-actual comparison.
pub async fn compare_events(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(request): Json<CompareEventsRequest>,
) -> ApiResult<Json<CompareEventsResponse>> {
    let node_id = state.resolve_path(&request.path).await?;
    let forest = state.engine.forest.read().await;
    let node = forest
        .node(&node_id)
        .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
    let (equal, differences) =
        node.compare_events(&request.planned_event_id, &request.actual_event_id)?;
    Ok(Json(CompareEventsResponse { equal, differences }))
}

#[derive(Debug, Deserialize)]
pub struct EventSummaryRequest {
    pub path: String,
    pub event_id: String,
}

/// `POST /events/summary` – status, duration and progress of one event.
pub async fn event_summary(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(request): Json<EventSummaryRequest>,
) -> ApiResult<Json<EventSummary>> {
    let node_id = state.resolve_path(&request.path).await?;
    let forest = state.engine.forest.read().await;
    let node = forest
        .node(&node_id)
        .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
    Ok(Json(node.event_summary(&request.event_id)?))
}
