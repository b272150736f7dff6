//! The node record and its user-facing bookkeeping operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use grove_types::{
    Attachment, Entry, Event, ForestError, Metadata, NodeId, NodeKind, Permission, Result, User,
};

/// A single node of the forest.
///
/// Leaves carry events and time-tracking entries; branches carry
/// children. Parent and child edges are id→name maps into the arena that
/// owns the node, so a node can sit under several parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier, unique across the forest.
    pub id: NodeId,
    /// Leaf or Branch.
    pub kind: NodeKind,
    /// Human label; unique among siblings.
    pub name: String,
    /// Parent id → parent name. Empty on the root.
    #[serde(default)]
    pub parents: BTreeMap<NodeId, String>,
    /// Child id → child name. Populated only on branches.
    #[serde(default)]
    pub children: BTreeMap<NodeId, String>,
    /// Actual events, keyed by event id. Leaves only.
    #[serde(default)]
    pub events: BTreeMap<String, Event>,
    /// Planned events, keyed by event id. Separate keyspace from `events`.
    #[serde(default)]
    pub planned_events: BTreeMap<String, Event>,
    /// Users scoped to this node, in assignment order.
    #[serde(default)]
    pub users: Vec<User>,
    /// Direct entries: time tracking and audit records.
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// Node-level attachments keyed by content hash.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, Attachment>,
    /// User who created the node.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,
    /// Creation moment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// User who last mutated the node.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub modified_by: String,
    /// Last mutation moment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Create a detached node with a fresh id.
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self::with_id(crate::generate_id(), kind, name)
    }

    /// Create a detached node with a caller-supplied id.
    pub fn with_id(id: impl Into<NodeId>, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            parents: BTreeMap::new(),
            children: BTreeMap::new(),
            events: BTreeMap::new(),
            planned_events: BTreeMap::new(),
            users: Vec::new(),
            entries: Vec::new(),
            attachments: BTreeMap::new(),
            created_by: String::new(),
            created_at: None,
            modified_by: String::new(),
            modified_at: None,
        }
    }

    /// True if the node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    /// Record a mutation for the audit trail.
    pub(crate) fn touch(&mut self, user_id: &str) {
        self.modified_by = user_id.to_owned();
        self.modified_at = Some(Utc::now());
    }

    //───────────────────── users & permissions ─────────────────────

    /// True iff `user_id` holds exactly `permission` on this node.
    ///
    /// Membership is exact: Admin does not imply Write or Read. Callers
    /// that accept either level test both.
    pub fn check_permission(&self, user_id: &str, permission: Permission) -> bool {
        self.users
            .iter()
            .any(|u| u.id == user_id && u.permissions.contains(&permission))
    }

    /// True iff `user_id` may mutate this node (Write or Admin).
    pub fn can_write(&self, user_id: &str) -> bool {
        self.check_permission(user_id, Permission::Write)
            || self.check_permission(user_id, Permission::Admin)
    }

    pub(crate) fn require_write(&self, user_id: &str) -> Result<()> {
        if self.can_write(user_id) {
            return Ok(());
        }
        Err(ForestError::Forbidden(format!(
            "user {user_id} lacks write permission on node {}",
            self.name
        )))
    }

    /// Assign `user` to this node with `permission`.
    ///
    /// Idempotent per level: an already-present level is a no-op. A known
    /// user gains the new level; an unknown user is inserted with a
    /// singleton permission set.
    pub fn assign_user(&mut self, user: User, permission: Permission) -> Result<()> {
        if let Some(existing) = self.users.iter_mut().find(|u| u.id == user.id) {
            if !existing.permissions.contains(&permission) {
                existing.permissions.push(permission);
            }
            return Ok(());
        }
        let mut user = user;
        user.permissions = vec![permission];
        self.users.push(user);
        Ok(())
    }

    /// Profile of `user_id` as scoped to this node.
    pub fn user_profile(&self, user_id: &str) -> Result<&User> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ForestError::NotFound(format!("user not found: {user_id}")))
    }

    //───────────────────── audit entries ─────────────────────

    /// Append a free-form activity entry directly to the node.
    pub fn add_activity(
        &mut self,
        content: serde_json::Value,
        metadata: Metadata,
        user_id: &str,
    ) {
        self.entries.push(Entry {
            timestamp: Utc::now(),
            user_id: user_id.to_owned(),
            content,
            metadata,
            attachments: Vec::new(),
        });
    }
}
