//! Login, token refresh and user management.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use grove_auth::TokenKind;
use grove_core::generate_id;
use grove_types::{ForestError, Permission, User};

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, Engine};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub session_token: String,
    pub refresh_token: String,
}

/// `POST /login` – verify credentials against the root node's users and
/// issue a session/refresh pair.
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    // Copy what we need out of the lock; bcrypt is slow.
    let found = {
        let forest = state.engine.forest.read().await;
        forest
            .root()
            .users
            .iter()
            .find(|u| u.username == credentials.username)
            .map(|u| (u.id.clone(), u.username.clone(), u.password.clone()))
    };

    let (user_id, username, password_hash) = found.ok_or_else(|| {
        ApiError(ForestError::Unauthenticated("invalid credentials".into()))
    })?;

    if !grove_auth::verify_password(&credentials.password, &password_hash) {
        return Err(ApiError(ForestError::Unauthenticated(
            "invalid credentials".into(),
        )));
    }

    let pair = state.signer.mint_pair(&user_id, &username)?;
    info!(%username, "login successful");
    Ok(Json(LoginResponse {
        user_id,
        session_token: pair.session_token,
        refresh_token: pair.refresh_token,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub session_token: String,
}

/// `POST /refresh` – exchange a refresh token (body or bearer) for a new
/// session token.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> ApiResult<Json<RefreshResponse>> {
    let token = payload
        .and_then(|Json(req)| req.refresh_token)
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).to_owned())
        })
        .ok_or_else(|| ApiError(ForestError::Unauthenticated("no token provided".into())))?;

    let claims = state
        .validator
        .validate_kind(&token, TokenKind::Refresh)
        .map_err(|e| ApiError(ForestError::Unauthenticated(e.to_string())))?;

    let session_token = state
        .signer
        .mint(&claims.user_id, &claims.username, TokenKind::Session)?;
    Ok(Json(RefreshResponse { session_token }))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: String,
}

/// `POST /users/create` – create a user on the root node with Read
/// permission.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<Json<CreateUserResponse>> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError(ForestError::InvalidArgument(
            "username and password are required".into(),
        )));
    }

    let mut user = User::new(generate_id(), request.username);
    user.email = request.email;
    user.password = grove_auth::hash_password(&request.password)?;
    let user_id = user.id.clone();

    state
        .queue
        .submit("create_user", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let duplicate = forest
                    .root()
                    .users
                    .iter()
                    .any(|u| u.username == user.username);
                if duplicate {
                    return Err(ForestError::Conflict(format!(
                        "username already exists: {}",
                        user.username
                    )));
                }
                forest.root_mut().assign_user(user, Permission::Read)?;
            }
            engine.persist().await?;
            Ok(())
        })
        .await??;

    Ok(Json(CreateUserResponse { user_id }))
}

#[derive(Debug, Deserialize)]
pub struct AssignUserRequest {
    pub path: String,
    pub assignee_id: String,
    pub permission: Permission,
}

/// `POST /users/assign` – grant a permission level on a node. Requires
/// Admin on that node.
pub async fn assign_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<AssignUserRequest>,
) -> ApiResult<StatusCode> {
    let node_id = state.resolve_path(&request.path).await?;
    let caller = user.user_id.clone();

    state
        .queue
        .submit("assign_user", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                if !node.check_permission(&caller, Permission::Admin) {
                    return Err(ForestError::Forbidden(format!(
                        "user {caller} lacks admin permission on node {}",
                        node.name
                    )));
                }

                let assignee = User::new(request.assignee_id.clone(), String::new());
                node.assign_user(assignee, request.permission)?;

                let mut metadata = grove_types::Metadata::new();
                metadata.insert("assignee_id".into(), request.assignee_id.into());
                metadata.insert(
                    "permission".into(),
                    serde_json::to_value(request.permission)
                        .map_err(|e| ForestError::Internal(e.to_string()))?,
                );
                node.add_activity("assign_user".into(), metadata, &caller);
            }
            engine.persist().await?;
            Ok(())
        })
        .await??;

    Ok(StatusCode::OK)
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub organization: String,
    pub phone: String,
    pub permissions: Vec<Permission>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            organization: user.organization.clone(),
            phone: user.phone.clone(),
            permissions: user.permissions.clone(),
        }
    }
}

/// `GET /users` – users registered on the root node. Password hashes
/// never leave the forest.
pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<Vec<UserView>>> {
    let forest = state.engine.forest.read().await;
    Ok(Json(forest.root().users.iter().map(UserView::from).collect()))
}

/// `GET /users/profile` – the caller's profile on the root node.
pub async fn user_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<UserView>> {
    let forest = state.engine.forest.read().await;
    let profile = forest.root().user_profile(&user.user_id)?;
    Ok(Json(UserView::from(profile)))
}
