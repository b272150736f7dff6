#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **grove-types** – Shared primitive data structures for the Grove forest.
//!
//! The crate is dependency-light and sits at the very bottom of the crate
//! graph so that every other crate can depend on it without causing cycles.
//! It defines the forest's record types (users, entries, events,
//! attachments), the permission and status enumerations, and the error
//! taxonomy the whole workspace propagates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//─────────────────────────────
//  Limits
//─────────────────────────────

/// Maximum accepted attachment size in bytes (10 MiB).
pub const MAX_ATTACHMENT_SIZE: usize = 10 * 1024 * 1024;

//─────────────────────────────
//  Identifiers and metadata
//─────────────────────────────

/// Stable identifier of a node inside the forest.
pub type NodeId = String;

/// Free-form key→value metadata attached to events and entries.
///
/// A `BTreeMap` keeps JSON key order stable, which the snapshot layer
/// relies on: the integrity hash is computed over the serialized bytes.
pub type Metadata = BTreeMap<String, serde_json::Value>;

//─────────────────────────────
//  Enumerations
//─────────────────────────────

/// Permission level a user holds on a node.
///
/// Levels form a *set* per user, not a lattice: holding `Admin` does not
/// imply `Write` or `Read`. Callers check the exact level they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// May read node contents and summaries.
    Read,
    /// May mutate events, entries and attachments.
    Write,
    /// May assign users and change server settings.
    Admin,
}

/// Discriminates the two node shapes of the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Carries events, planned events and time-tracking entries.
    Leaf,
    /// Carries children; never events.
    Branch,
}

/// Lifecycle state of a named event on a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Scheduled with a future start time; not yet running.
    Pending,
    /// Started and accepting entries.
    Ongoing,
    /// Ended; immutable from here on.
    Finished,
}

//─────────────────────────────
//  Records
//─────────────────────────────

/// A user as scoped to a single node.
///
/// The same person appearing on several nodes is represented by one
/// `User` record per node, each carrying that node's permission set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier.
    pub id: String,
    /// Login name, unique within the node.
    pub username: String,
    /// Contact email.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// bcrypt hash of the user's password. Never the cleartext.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Optional organization label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization: String,
    /// Optional phone number.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    /// Permission set on the owning node. Duplicate-free.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl User {
    /// Create a bare user record with no permissions yet.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: String::new(),
            password: String::new(),
            organization: String::new(),
            phone: String::new(),
            permissions: Vec::new(),
        }
    }
}

/// An append-only datum inside an event or directly on a node.
///
/// Direct node entries implement the time-tracking protocol via the
/// sentinel contents [`START_TIME_ENTRY`] and [`STOP_TIME_ENTRY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Wall-clock moment the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// User who appended the entry.
    pub user_id: String,
    /// Opaque content. Time-tracking entries carry a sentinel string.
    pub content: serde_json::Value,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    /// Attachments bound to this entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Sentinel content marking the start of a time-tracking interval.
pub const START_TIME_ENTRY: &str = "start_time_entry";

/// Sentinel content marking the end of a time-tracking interval.
pub const STOP_TIME_ENTRY: &str = "stop_time_entry";

/// A content-addressed binary attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Hex SHA-256 of `data`; doubles as the storage key.
    pub id: String,
    /// Original file name.
    pub name: String,
    /// MIME type as supplied at upload.
    pub mime_type: String,
    /// Size of `data` in bytes.
    pub size: u64,
    /// Hex SHA-256 of `data` (same value as `id`).
    pub hash: String,
    /// Raw file bytes, persisted inside the snapshot.
    pub data: Vec<u8>,
    /// User who uploaded the attachment.
    pub uploaded_by: String,
    /// Upload moment.
    pub uploaded_at: DateTime<Utc>,
}

/// A named, state-machine-governed record on a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Start moment. Set when Ongoing; the planned start while Pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// End moment. Set only once Finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Current lifecycle state.
    pub status: EventStatus,
    /// Entries appended while Ongoing.
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// Free-form metadata as supplied by the caller.
    #[serde(default)]
    pub metadata: Metadata,
    /// Typed extraction of the `category` metadata key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Typed extraction of the `frequency` metadata key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    /// Typed extraction of the `custom_pattern` metadata key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// User who created the event.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,
    /// Creation moment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// User who last mutated the event.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub modified_by: String,
    /// Last mutation moment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Event {
    /// True while the event accepts appended entries.
    pub fn is_ongoing(&self) -> bool {
        self.status == EventStatus::Ongoing
    }
}

/// Computed snapshot of an event's timing and progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Lifecycle state at summary time.
    pub status: EventStatus,
    /// `end − start` once Finished, `now − start` while Ongoing,
    /// absent while Pending. Rendered in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    /// Number of entries appended so far.
    pub entries_count: usize,
    /// Timestamp of the most recent entry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

/// One matched start/stop pair from the time-tracking scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedInterval {
    /// Moment of the matched start entry.
    pub start_time: DateTime<Utc>,
    /// Moment of the matching stop entry.
    pub end_time: DateTime<Utc>,
    /// `end − start` in whole seconds. Never negative.
    pub duration_secs: i64,
}

//─────────────────────────────
//  Error taxonomy
//─────────────────────────────

/// Error kinds produced across the workspace.
///
/// Low-level layers return these unchanged; the HTTP layer maps each
/// variant to its status code.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForestError {
    /// Malformed input: bad JSON, bad path syntax, bad enum value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Missing or invalid credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Authenticated but lacking the required permission.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Referenced node, event, user or attachment does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Duplicate event, sibling name or permission.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Operation applied in the wrong event state.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// Attachment exceeds the configured size limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Leaf operation on a branch, or vice versa.
    #[error("invalid node type: {0}")]
    InvalidType(String),
    /// Snapshot integrity hash mismatch.
    #[error("corruption: {0}")]
    Corruption(String),
    /// Unexpected internal failure.
    #[error("internal: {0}")]
    Internal(String),
}

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, ForestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_levels_are_ordered() {
        assert!(Permission::Read < Permission::Write);
        assert!(Permission::Write < Permission::Admin);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Permission::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&NodeKind::Leaf).unwrap(), "\"leaf\"");
        assert_eq!(
            serde_json::to_string(&EventStatus::Ongoing).unwrap(),
            "\"ongoing\""
        );
    }

    #[test]
    fn user_round_trips_without_optional_fields() {
        let user = User::new("u1", "alice");
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn error_messages_name_the_kind() {
        let err = ForestError::PayloadTooLarge { size: 11, max: 10 };
        assert_eq!(err.to_string(), "payload too large: 11 bytes (max 10)");
        let err = ForestError::NotFound("event e1".into());
        assert!(err.to_string().starts_with("not found"));
    }
}
