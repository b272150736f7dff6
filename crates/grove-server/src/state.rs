//! Shared application state and the engine handed to queue workers.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use grove_core::{AttachmentStore, Forest};
use grove_queue::QueueClient;
use grove_store::SnapshotStore;
use grove_types::ForestError;

use crate::cache::PathCache;
use crate::config::ServerConfig;

/// The mutable heart of the service: forest state plus its snapshot
/// store. Cloned into every queued request.
#[derive(Clone)]
pub struct Engine {
    /// The forest, under the service-wide reader–writer lock.
    pub forest: Arc<RwLock<Forest>>,
    /// Snapshot writer, serialized by its own lock.
    pub store: Arc<Mutex<SnapshotStore>>,
}

impl Engine {
    /// Wrap a forest and its snapshot store.
    pub fn new(forest: Forest, store: SnapshotStore) -> Self {
        Self {
            forest: Arc::new(RwLock::new(forest)),
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Persist the current forest. Skips the disk entirely when the
    /// content hash matches the previous snapshot.
    pub async fn persist(&self) -> Result<bool, ForestError> {
        let forest = self.forest.read().await;
        let mut store = self.store.lock().await;
        store.write(&forest).map_err(Into::into)
    }

    /// Hex hash of the last snapshot, used as the cache generation.
    pub async fn generation(&self) -> String {
        self.store.lock().await.last_hash_hex().unwrap_or_default()
    }
}

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Forest plus snapshot store.
    pub engine: Engine,
    /// Submission handle for the mutation worker pool.
    pub queue: QueueClient<Engine>,
    /// Token minting.
    pub signer: grove_auth::JwtHs256Signer,
    /// Token verification.
    pub validator: grove_auth::JwtHs256Validator,
    /// Attachment builder with the configured size cap.
    pub attachments: AttachmentStore,
    /// Path→node-id cache keyed by snapshot generation.
    pub cache: Arc<PathCache>,
    /// Live server configuration.
    pub config: Arc<RwLock<ServerConfig>>,
    /// Where settings updates are persisted, when a file was loaded.
    pub config_path: Option<PathBuf>,
}

impl AppState {
    /// Resolve `path` to a node id through the cache.
    ///
    /// A hit under the current snapshot generation skips the forest walk;
    /// a miss walks the forest and refreshes the cache. Correctness never
    /// depends on the cache: the generation key changes with every
    /// persisted mutation.
    pub async fn resolve_path(&self, path: &str) -> Result<String, ForestError> {
        let generation = self.engine.generation().await;
        if let Some(id) = self.cache.get(&generation, path) {
            return Ok(id);
        }
        let forest = self.engine.forest.read().await;
        let id = forest.resolve_path(path)?;
        self.cache.insert(&generation, path, &id);
        Ok(id)
    }
}
