#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **grove-core** – Forest data engine for Grove.
//!
//! The forest is an in-memory hierarchy of [`Node`]s rooted at a single
//! branch. Nodes are held in an id-indexed arena owned by [`Forest`], with
//! parent and child edges stored as id→name maps on each node. The arena
//! keeps multi-parent wiring honest: a leaf shared by several branches is
//! one node, however it is reached, and stays one node across a snapshot
//! round-trip.
//!
//! Node-local behaviour (events, time tracking, users, attachments) lives
//! as methods on [`Node`]; only structural operations (wiring children,
//! resolving paths) need the [`Forest`].
//!
//! All operations are synchronous and deterministic. Callers that need
//! shared mutability wrap the forest in their runtime's lock; the HTTP
//! service serializes mutations through its worker queue.

mod attachment;
mod events;
mod forest;
mod node;
mod tracking;

pub use attachment::AttachmentStore;
pub use forest::Forest;
pub use node::Node;

pub use grove_types::{
    Attachment, Entry, Event, EventStatus, EventSummary, ForestError, Metadata, NodeId, NodeKind,
    Permission, Result, TrackedInterval, User, MAX_ATTACHMENT_SIZE, START_TIME_ENTRY,
    STOP_TIME_ENTRY,
};

/// Generate a fresh node or user identifier.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
