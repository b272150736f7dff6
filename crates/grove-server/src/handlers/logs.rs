//! Ops-log endpoint backed by the logview reader.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use grove_logview::{filter_level, paginate, read_log_file, LogLevel, LogPage, DEFAULT_PAGE_SIZE};
use grove_types::ForestError;

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

/// `GET /logs?level=…&page=…` – parse the ops log, filter by level and
/// cut one page.
pub async fn get_logs(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogPage>> {
    let log_file = state.config.read().await.log_file.clone();
    let entries = match log_file {
        Some(path) => read_log_file(&path)
            .map_err(|e| ApiError(ForestError::Internal(format!("read log file: {e}"))))?,
        None => Vec::new(),
    };

    let entries = match &query.level {
        Some(raw) => {
            let level: LogLevel = raw
                .parse()
                .map_err(|e: grove_logview::ParseError| {
                    ApiError(ForestError::InvalidArgument(e.to_string()))
                })?;
            filter_level(entries, level)
        }
        None => entries,
    };

    Ok(Json(paginate(
        entries,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )))
}
