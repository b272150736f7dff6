//! Content-addressed attachments on nodes and event entries.

use chrono::Utc;
use sha2::{Digest, Sha256};

use grove_types::{Attachment, ForestError, Result, MAX_ATTACHMENT_SIZE};

use crate::node::Node;

/// Builds content-addressed attachments and enforces the size cap.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    max_size: usize,
}

impl Default for AttachmentStore {
    fn default() -> Self {
        Self::new(MAX_ATTACHMENT_SIZE)
    }
}

impl AttachmentStore {
    /// Create a store with a custom size cap in bytes.
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// The configured size cap.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Build an attachment record from raw bytes.
    ///
    /// The hex SHA-256 of the content becomes both the id and the hash,
    /// so identical bytes always produce the same record key.
    pub fn store(
        &self,
        content: Vec<u8>,
        filename: &str,
        mime_type: &str,
        user_id: &str,
    ) -> Result<Attachment> {
        if content.len() > self.max_size {
            return Err(ForestError::PayloadTooLarge {
                size: content.len(),
                max: self.max_size,
            });
        }

        let digest = hex::encode(Sha256::digest(&content));
        Ok(Attachment {
            id: digest.clone(),
            name: filename.to_owned(),
            mime_type: mime_type.to_owned(),
            size: content.len() as u64,
            hash: digest,
            data: content,
            uploaded_by: user_id.to_owned(),
            uploaded_at: Utc::now(),
        })
    }
}

impl Node {
    /// Attach a stored blob to the node, keyed by its content hash.
    pub fn add_attachment(&mut self, attachment: Attachment, user_id: &str) -> Result<()> {
        self.require_write(user_id)?;
        self.attachments.insert(attachment.id.clone(), attachment);
        self.touch(user_id);
        Ok(())
    }

    /// Attach a stored blob to one entry of an event.
    pub fn add_entry_attachment(
        &mut self,
        event_id: &str,
        entry_index: usize,
        attachment: Attachment,
        user_id: &str,
    ) -> Result<()> {
        self.require_write(user_id)?;
        let event = self
            .events
            .get_mut(event_id)
            .ok_or_else(|| ForestError::NotFound(format!("event not found: {event_id}")))?;
        let entry = event.entries.get_mut(entry_index).ok_or_else(|| {
            ForestError::InvalidArgument(format!("invalid entry index: {entry_index}"))
        })?;
        entry.attachments.push(attachment);
        self.touch(user_id);
        Ok(())
    }

    /// Node-level attachment by id.
    pub fn attachment(&self, attachment_id: &str) -> Result<&Attachment> {
        self.attachments
            .get(attachment_id)
            .ok_or_else(|| ForestError::NotFound(format!("attachment not found: {attachment_id}")))
    }

    /// Attachment bound to one entry of an event.
    pub fn entry_attachment(
        &self,
        event_id: &str,
        entry_index: usize,
        attachment_id: &str,
    ) -> Result<&Attachment> {
        let event = self
            .events
            .get(event_id)
            .ok_or_else(|| ForestError::NotFound(format!("event not found: {event_id}")))?;
        let entry = event.entries.get(entry_index).ok_or_else(|| {
            ForestError::InvalidArgument(format!("invalid entry index: {entry_index}"))
        })?;
        entry
            .attachments
            .iter()
            .find(|a| a.id == attachment_id)
            .ok_or_else(|| ForestError::NotFound(format!("attachment not found: {attachment_id}")))
    }

    /// Remove a node-level attachment.
    pub fn delete_attachment(&mut self, attachment_id: &str, user_id: &str) -> Result<()> {
        self.require_write(user_id)?;
        if self.attachments.remove(attachment_id).is_none() {
            return Err(ForestError::NotFound(format!(
                "attachment not found: {attachment_id}"
            )));
        }
        self.touch(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_types::{Metadata, NodeKind, Permission, User};

    fn writable_leaf() -> Node {
        let mut node = Node::new(NodeKind::Leaf, "leaf");
        node.assign_user(User::new("u1", "alice"), Permission::Write)
            .unwrap();
        node
    }

    #[test]
    fn store_is_content_addressed() {
        let store = AttachmentStore::default();
        let a = store.store(b"bytes".to_vec(), "a.txt", "text/plain", "u1").unwrap();
        let b = store.store(b"bytes".to_vec(), "b.txt", "text/plain", "u1").unwrap();
        let c = store.store(b"bytez".to_vec(), "c.txt", "text/plain", "u1").unwrap();

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id, a.hash);
        assert_eq!(a.size, 5);
    }

    #[test]
    fn oversized_content_is_rejected() {
        let store = AttachmentStore::new(8);
        let err = store
            .store(vec![0u8; 9], "big.bin", "application/octet-stream", "u1")
            .unwrap_err();
        assert!(matches!(err, ForestError::PayloadTooLarge { size: 9, max: 8 }));
    }

    #[test]
    fn limit_boundary_is_inclusive() {
        let store = AttachmentStore::new(8);
        assert!(store
            .store(vec![0u8; 8], "ok.bin", "application/octet-stream", "u1")
            .is_ok());
    }

    #[test]
    fn node_attachments_deduplicate_by_content() {
        let store = AttachmentStore::default();
        let mut node = writable_leaf();
        let a = store.store(b"same".to_vec(), "x", "text/plain", "u1").unwrap();
        let b = store.store(b"same".to_vec(), "y", "text/plain", "u1").unwrap();

        node.add_attachment(a.clone(), "u1").unwrap();
        node.add_attachment(b, "u1").unwrap();
        assert_eq!(node.attachments.len(), 1);
        assert_eq!(node.attachment(&a.id).unwrap().id, a.id);
    }

    #[test]
    fn entry_attachment_requires_valid_index() {
        let store = AttachmentStore::default();
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        node.append_to_event("e1", "u1", "first".into(), Metadata::new())
            .unwrap();

        let att = store.store(b"blob".to_vec(), "f", "text/plain", "u1").unwrap();
        node.add_entry_attachment("e1", 0, att.clone(), "u1").unwrap();
        assert_eq!(
            node.entry_attachment("e1", 0, &att.id).unwrap().id,
            att.id
        );

        let err = node
            .add_entry_attachment("e1", 5, att, "u1")
            .unwrap_err();
        assert!(matches!(err, ForestError::InvalidArgument(_)));
    }

    #[test]
    fn delete_missing_attachment_is_not_found() {
        let mut node = writable_leaf();
        let err = node.delete_attachment("ghost", "u1").unwrap_err();
        assert!(matches!(err, ForestError::NotFound(_)));
    }
}
