#![forbid(unsafe_code)]

//! **grove-server** – The Grove HTTP service.
//!
//! Wires the forest engine, snapshot store, worker pool and token layer
//! into one axum application. Mutating endpoints funnel through the
//! bounded worker queue and persist a snapshot after every change;
//! read endpoints take the forest read lock directly, helped by a
//! generation-keyed path cache.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::ServerConfig;
pub use state::{AppState, Engine};

use grove_core::{generate_id, AttachmentStore, Forest};
use grove_queue::WorkerPool;
use grove_store::SnapshotStore;
use grove_types::{Permission, User};

/// Fallback signing secret for setups that configured none.
const DEV_JWT_SECRET: &str = "grove-secret-change-in-production";

/// Build the full API router over `state`.
pub fn router(state: AppState) -> Router {
    let body_limit = state.attachments.max_size() + 64 * 1024;
    Router::new()
        // Public routes
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/users/create", post(handlers::auth::create_user))
        // Protected routes
        .route("/events", post(handlers::events::event_entries))
        .route("/events/start", post(handlers::events::start_event))
        .route("/events/append", post(handlers::events::append_to_event))
        .route("/events/end", post(handlers::events::end_event))
        .route("/events/plan", post(handlers::events::plan_event))
        .route("/events/compare", post(handlers::events::compare_events))
        .route("/events/summary", post(handlers::events::event_summary))
        .route(
            "/events/:event_id/entries/:entry_index/attachments",
            post(handlers::attachments::add_entry_attachment),
        )
        .route("/time", get(handlers::tracking::time_tracking_summary))
        .route("/time/start", post(handlers::tracking::start_time_tracking))
        .route("/time/stop", post(handlers::tracking::stop_time_tracking))
        .route("/forest", get(handlers::forest::get_forest))
        .route("/forest/tree", get(handlers::forest::get_tree))
        .route("/users", get(handlers::auth::list_users))
        .route("/users/assign", post(handlers::auth::assign_user))
        .route("/users/profile", get(handlers::auth::user_profile))
        .route("/settings/", get(handlers::settings::get_settings))
        .route("/settings/update", post(handlers::settings::update_settings))
        .route(
            "/attachments/upload",
            post(handlers::attachments::upload_attachment),
        )
        .route(
            "/attachments/:id",
            get(handlers::attachments::get_attachment)
                .delete(handlers::attachments::delete_attachment),
        )
        .route("/logs", get(handlers::logs::get_logs))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit))
                .into_inner(),
        )
        .with_state(state)
}

/// Build the application state and worker pool for `config`.
///
/// Loads the snapshot when one exists; otherwise initializes a fresh
/// forest, assigns the bootstrap administrator on the root and writes the
/// first snapshot.
pub fn bootstrap(
    config: ServerConfig,
    config_path: Option<PathBuf>,
) -> Result<(AppState, WorkerPool<Engine>)> {
    std::fs::create_dir_all(&config.database_path).with_context(|| {
        format!("failed to create database dir {}", config.database_path.display())
    })?;

    let snapshot_path = config.snapshot_path();
    let mut store = SnapshotStore::new(&snapshot_path);

    let forest = if snapshot_path.exists() {
        let forest = store.read().with_context(|| {
            format!("failed to load database {}", snapshot_path.display())
        })?;
        info!(path = %snapshot_path.display(), "loaded existing database");
        forest
    } else {
        let admin_config = config.admin.clone().unwrap_or_default();
        let mut forest = Forest::new("forest");
        let mut admin = User::new(generate_id(), admin_config.username);
        admin.email = admin_config.email;
        admin.organization = admin_config.organization;
        admin.phone = admin_config.phone;
        admin.password = grove_auth::hash_password(&admin_config.password)
            .context("failed to hash admin password")?;
        forest.root_mut().assign_user(admin, Permission::Admin)?;
        store
            .write(&forest)
            .context("failed to save state after admin creation")?;
        info!(path = %snapshot_path.display(), "initialized new database");
        forest
    };

    let secret = if config.jwt_secret.is_empty() {
        warn!("no jwt secret configured, using the built-in development secret");
        DEV_JWT_SECRET.to_owned()
    } else {
        config.jwt_secret.clone()
    };

    let engine = Engine::new(forest, store);
    let pool = WorkerPool::new(engine.clone(), config.workers, config.queue_capacity);
    let state = AppState {
        engine,
        queue: pool.client(),
        signer: grove_auth::JwtHs256Signer::new(&secret),
        validator: grove_auth::JwtHs256Validator::new(&secret),
        attachments: AttachmentStore::new(config.max_attachment_size),
        cache: Arc::new(cache::PathCache::new()),
        config: Arc::new(tokio::sync::RwLock::new(config)),
        config_path,
    };
    Ok((state, pool))
}
