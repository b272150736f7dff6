#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **grove-store** – Snapshot persistence for the Grove forest.
//!
//! A snapshot file is `[32 bytes SHA-256(payload)] || gzip(payload)` where
//! the payload is the JSON-encoded forest. Writes go through a temp file
//! and an atomic rename; a content-hash comparison skips the write
//! entirely when nothing changed since the last snapshot. Reads verify
//! the stored hash against the decompressed bytes and refuse corrupted
//! files.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing::debug;

use grove_core::Forest;

/// Length of the integrity header in bytes.
pub const HASH_LEN: usize = 32;

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Failures of the snapshot layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying filesystem failure.
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// Forest could not be (de)serialized.
    #[error("snapshot codec failed: {0}")]
    Codec(#[from] serde_json::Error),
    /// Stored hash does not match the decompressed payload.
    #[error("snapshot hash mismatch, file may be corrupted: {path}")]
    Corruption {
        /// Path of the offending file.
        path: PathBuf,
    },
    /// File is too short to carry the integrity header.
    #[error("snapshot truncated: {path}")]
    Truncated {
        /// Path of the offending file.
        path: PathBuf,
    },
}

impl From<StoreError> for grove_types::ForestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corruption { path } | StoreError::Truncated { path } => {
                grove_types::ForestError::Corruption(path.display().to_string())
            }
            other => grove_types::ForestError::Internal(other.to_string()),
        }
    }
}

/// Crate result helper.
pub type Result<T> = std::result::Result<T, StoreError>;

//─────────────────────────────
//  Snapshot store
//─────────────────────────────

/// Writes and reads forest snapshots at a fixed path, remembering the
/// hash of the last payload it touched.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    last_hash: Option<[u8; HASH_LEN]>,
}

impl SnapshotStore {
    /// Create a store for `path`. No I/O happens until the first
    /// [`write`](Self::write) or [`read`](Self::read).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), last_hash: None }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash of the last payload written or read, if any.
    pub fn last_hash(&self) -> Option<[u8; HASH_LEN]> {
        self.last_hash
    }

    /// Hex rendering of [`last_hash`](Self::last_hash), used as a cache
    /// generation key.
    pub fn last_hash_hex(&self) -> Option<String> {
        self.last_hash.map(hex::encode)
    }

    /// Persist the forest. Returns `true` when bytes hit the disk and
    /// `false` when the content hash matched the previous snapshot and
    /// the write was skipped.
    pub fn write(&mut self, forest: &Forest) -> Result<bool> {
        let payload = serde_json::to_vec(forest)?;
        let hash: [u8; HASH_LEN] = Sha256::digest(&payload).into();

        if self.last_hash == Some(hash) {
            debug!(path = %self.path.display(), "no changes to save");
            return Ok(false);
        }

        let tmp = self.path.with_extension("tmp");
        if let Err(err) = self.write_tmp(&tmp, &hash, &payload) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }

        self.last_hash = Some(hash);
        debug!(path = %self.path.display(), "saved snapshot");
        Ok(true)
    }

    fn write_tmp(&self, tmp: &Path, hash: &[u8; HASH_LEN], payload: &[u8]) -> Result<()> {
        let mut file = File::create(tmp)?;
        file.write_all(hash)?;
        let mut encoder = GzEncoder::new(&mut file, Compression::default());
        encoder.write_all(payload)?;
        encoder.finish()?;
        file.sync_all()?;
        Ok(())
    }

    /// Load the forest from disk, verifying the integrity header.
    pub fn read(&mut self) -> Result<Forest> {
        let mut file = File::open(&self.path)?;

        let mut stored = [0u8; HASH_LEN];
        file.read_exact(&mut stored).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StoreError::Truncated { path: self.path.clone() }
            } else {
                StoreError::Io(e)
            }
        })?;

        let mut payload = Vec::new();
        GzDecoder::new(&mut file).read_to_end(&mut payload)?;

        let computed: [u8; HASH_LEN] = Sha256::digest(&payload).into();
        if computed != stored {
            return Err(StoreError::Corruption { path: self.path.clone() });
        }

        let forest = serde_json::from_slice(&payload)?;
        self.last_hash = Some(stored);
        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_core::{Metadata, Node, NodeKind, Permission, User};
    use tempfile::tempdir;

    fn sample_forest() -> Forest {
        let mut forest = Forest::new("root");
        let root_id = forest.root_id().clone();
        forest
            .root_mut()
            .assign_user(User::new("admin", "admin"), Permission::Admin)
            .unwrap();
        forest
            .root_mut()
            .assign_user(User::new("u2", "bob"), Permission::Read)
            .unwrap();

        let mut leaf = Node::new(NodeKind::Leaf, "test-node");
        leaf.assign_user(User::new("admin", "admin"), Permission::Write)
            .unwrap();
        let leaf_id = forest.add_child(&root_id, leaf).unwrap();

        let node = forest.node_mut(&leaf_id).unwrap();
        node.start_event("e1", "admin", None, None, Metadata::new())
            .unwrap();
        node.append_to_event("e1", "admin", "first".into(), Metadata::new())
            .unwrap();
        node.end_event("e1", "admin").unwrap();
        forest
    }

    #[test]
    fn snapshot_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.dat");
        let forest = sample_forest();

        let mut store = SnapshotStore::new(&path);
        assert!(store.write(&forest).unwrap());

        let mut fresh = SnapshotStore::new(&path);
        let loaded = fresh.read().unwrap();
        assert_eq!(loaded, forest);

        let leaf_id = loaded.resolve_path("test-node").unwrap();
        let node = loaded.node(&leaf_id).unwrap();
        assert_eq!(node.users.len(), 1);
        assert_eq!(node.events["e1"].entries.len(), 1);
        assert_eq!(node.events["e1"].entries[0].content, "first");
        assert_eq!(fresh.last_hash(), store.last_hash());
    }

    #[test]
    fn unchanged_forest_skips_the_second_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.dat");
        let forest = sample_forest();

        let mut store = SnapshotStore::new(&path);
        assert!(store.write(&forest).unwrap());
        assert!(!store.write(&forest).unwrap());

        // A real mutation makes the next write go through again.
        let mut mutated = forest.clone();
        let root_id = mutated.root_id().clone();
        mutated
            .add_child(&root_id, Node::new(NodeKind::Leaf, "extra"))
            .unwrap();
        assert!(store.write(&mutated).unwrap());
    }

    #[test]
    fn corrupted_header_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.dat");
        let forest = sample_forest();

        SnapshotStore::new(&path).write(&forest).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let err = SnapshotStore::new(&path).read().unwrap_err();
        assert!(matches!(err, StoreError::Corruption { .. }));
    }

    #[test]
    fn truncated_file_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.dat");
        fs::write(&path, [0u8; 10]).unwrap();

        let err = SnapshotStore::new(&path).read().unwrap_err();
        assert!(matches!(err, StoreError::Truncated { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = SnapshotStore::new(dir.path().join("absent.dat"))
            .read()
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn no_tmp_residue_after_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.dat");
        SnapshotStore::new(&path).write(&sample_forest()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn file_layout_is_hash_then_gzip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.dat");
        let forest = sample_forest();
        let mut store = SnapshotStore::new(&path);
        store.write(&forest).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.len() > HASH_LEN);
        assert_eq!(&bytes[..HASH_LEN], store.last_hash().unwrap().as_slice());
        // gzip magic
        assert_eq!(&bytes[HASH_LEN..HASH_LEN + 2], &[0x1f, 0x8b]);
    }
}
