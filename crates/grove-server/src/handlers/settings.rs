//! Server settings: admin-gated read and update of the safe subset.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use grove_types::{ForestError, Permission};

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub organization: String,
    pub server_port: u16,
    pub dashboard_url: String,
    pub phone: String,
}

async fn require_root_admin(state: &AppState, user_id: &str) -> Result<(), ApiError> {
    let forest = state.engine.forest.read().await;
    if forest.root().check_permission(user_id, Permission::Admin) {
        Ok(())
    } else {
        Err(ApiError(ForestError::Forbidden(
            "admin permission required".into(),
        )))
    }
}

/// `GET /settings/` – the safe configuration subset.
pub async fn get_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<SettingsView>> {
    require_root_admin(&state, &user.user_id).await?;

    let config = state.config.read().await;
    Ok(Json(SettingsView {
        organization: config.organization.clone(),
        server_port: config.server_port,
        dashboard_url: config.dashboard_url.clone(),
        phone: config.phone.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateSettingsResponse {
    pub status: String,
}

/// `POST /settings/update` – update the safe subset and persist the
/// configuration file when one was loaded.
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<UpdateSettingsResponse>> {
    require_root_admin(&state, &user.user_id).await?;

    {
        let mut config = state.config.write().await;
        if let Some(organization) = request.organization {
            config.organization = organization;
        }
        if let Some(dashboard_url) = request.dashboard_url {
            config.dashboard_url = dashboard_url;
        }
        if let Some(phone) = request.phone {
            config.phone = phone;
        }

        if let Some(path) = &state.config_path {
            if let Err(err) = config.save(path) {
                warn!(error = %err, "failed to persist settings");
                return Err(ApiError(ForestError::Internal(err.to_string())));
            }
        }
    }

    Ok(Json(UpdateSettingsResponse {
        status: "success".to_owned(),
    }))
}
