//! Forest inspection endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use grove_core::Forest;

use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// `GET /forest` – the full forest snapshot.
pub async fn get_forest(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<Forest>> {
    let forest = state.engine.forest.read().await;
    Ok(Json(forest.clone()))
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub path: String,
}

/// `GET /forest/tree?path=…` – the sub-tree at a path, rendered with
/// nested children.
pub async fn get_tree(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<TreeQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let node_id = state.resolve_path(&query.path).await?;
    let forest = state.engine.forest.read().await;
    Ok(Json(forest.subtree(&node_id)?))
}
