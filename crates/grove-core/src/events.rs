//! Event lifecycle: the per-leaf state machine, planned events and the
//! plan-vs-actual comparison.

use chrono::Utc;

use grove_types::{
    Entry, Event, EventStatus, EventSummary, ForestError, Metadata, Result,
};

use crate::node::Node;

fn extract_string(metadata: &Metadata, key: &str) -> Option<String> {
    metadata.get(key).and_then(|v| v.as_str()).map(str::to_owned)
}

impl Node {
    /// Start a new event, or schedule it when `planned_start` is in the
    /// future.
    ///
    /// Only valid on leaves. An event id already present in any state is
    /// rejected with `Conflict`. Requires write permission.
    pub fn start_event(
        &mut self,
        event_id: &str,
        user_id: &str,
        planned_start: Option<chrono::DateTime<Utc>>,
        planned_end: Option<chrono::DateTime<Utc>>,
        metadata: Metadata,
    ) -> Result<()> {
        if !self.is_leaf() {
            return Err(ForestError::InvalidType(format!(
                "cannot add event to non-leaf node {}",
                self.name
            )));
        }
        self.require_write(user_id)?;
        if self.events.contains_key(event_id) {
            return Err(ForestError::Conflict(format!(
                "event already exists: {event_id}"
            )));
        }

        let now = Utc::now();
        let mut event = Event {
            start_time: None,
            end_time: planned_end,
            status: EventStatus::Pending,
            entries: Vec::new(),
            category: extract_string(&metadata, "category"),
            frequency: extract_string(&metadata, "frequency"),
            pattern: extract_string(&metadata, "custom_pattern"),
            metadata,
            created_by: user_id.to_owned(),
            created_at: Some(now),
            modified_by: user_id.to_owned(),
            modified_at: Some(now),
        };

        match planned_start {
            Some(start) if start > now => {
                event.start_time = Some(start);
            }
            _ => {
                event.start_time = Some(now);
                event.status = EventStatus::Ongoing;
            }
        }

        self.events.insert(event_id.to_owned(), event);
        self.touch(user_id);
        Ok(())
    }

    /// Mark an ongoing event as finished.
    pub fn end_event(&mut self, event_id: &str, user_id: &str) -> Result<()> {
        self.require_write(user_id)?;
        let event = self
            .events
            .get_mut(event_id)
            .ok_or_else(|| ForestError::NotFound(format!("event not found: {event_id}")))?;

        if !event.is_ongoing() {
            return Err(ForestError::Precondition(format!(
                "cannot end event {event_id} in state {:?}",
                event.status
            )));
        }

        let now = Utc::now();
        event.end_time = Some(now);
        event.status = EventStatus::Finished;
        event.modified_by = user_id.to_owned();
        event.modified_at = Some(now);
        self.touch(user_id);
        Ok(())
    }

    /// Append an entry to an ongoing event.
    pub fn append_to_event(
        &mut self,
        event_id: &str,
        user_id: &str,
        content: serde_json::Value,
        metadata: Metadata,
    ) -> Result<()> {
        self.require_write(user_id)?;
        let event = self
            .events
            .get_mut(event_id)
            .ok_or_else(|| ForestError::NotFound(format!("event not found: {event_id}")))?;

        match event.status {
            EventStatus::Finished => {
                return Err(ForestError::Precondition(format!(
                    "cannot append to finished event {event_id}"
                )));
            }
            EventStatus::Pending => {
                return Err(ForestError::Precondition(format!(
                    "cannot append to event {event_id} that has not started"
                )));
            }
            EventStatus::Ongoing => {}
        }

        let timestamp = Utc::now();
        event.entries.push(Entry {
            timestamp,
            user_id: user_id.to_owned(),
            content,
            metadata,
            attachments: Vec::new(),
        });
        event.modified_by = user_id.to_owned();
        event.modified_at = Some(timestamp);
        self.touch(user_id);
        Ok(())
    }

    /// Store a planned event in the separate planned keyspace.
    ///
    /// Planned events never transition; they exist to be compared against
    /// the actual event of the same id. An Ongoing actual event blocks
    /// planning under its id; a Finished one turns the call into a no-op.
    pub fn plan_event(
        &mut self,
        event_id: &str,
        user_id: &str,
        planned_start: Option<chrono::DateTime<Utc>>,
        planned_end: Option<chrono::DateTime<Utc>>,
        metadata: Metadata,
    ) -> Result<()> {
        if !self.is_leaf() {
            return Err(ForestError::InvalidType(format!(
                "cannot plan event for non-leaf node {}",
                self.name
            )));
        }
        self.require_write(user_id)?;

        match self.events.get(event_id).map(|e| e.status) {
            Some(EventStatus::Ongoing) => {
                return Err(ForestError::Conflict(format!(
                    "event {event_id} is already ongoing"
                )));
            }
            Some(EventStatus::Finished) => return Ok(()),
            _ => {}
        }

        let now = Utc::now();
        let event = Event {
            start_time: planned_start,
            end_time: planned_end,
            status: EventStatus::Pending,
            entries: Vec::new(),
            category: extract_string(&metadata, "category"),
            frequency: extract_string(&metadata, "frequency"),
            pattern: extract_string(&metadata, "custom_pattern"),
            metadata,
            created_by: user_id.to_owned(),
            created_at: Some(now),
            modified_by: user_id.to_owned(),
            modified_at: Some(now),
        };
        self.planned_events.insert(event_id.to_owned(), event);
        self.touch(user_id);
        Ok(())
    }

    /// Compare a planned event against an actual one.
    ///
    /// Returns whether they match and the list of human-readable
    /// differences: start, end, status, metadata (deep) and entries
    /// (pairwise).
    pub fn compare_events(
        &self,
        planned_event_id: &str,
        actual_event_id: &str,
    ) -> Result<(bool, Vec<String>)> {
        let planned = self.planned_events.get(planned_event_id);
        let actual = self.events.get(actual_event_id);
        let (planned, actual) = match (planned, actual) {
            (Some(p), Some(a)) => (p, a),
            _ => {
                return Err(ForestError::NotFound(format!(
                    "one or both events not found: planned={planned_event_id}, actual={actual_event_id}"
                )));
            }
        };

        let mut differences = Vec::new();

        match (planned.start_time, actual.start_time) {
            (Some(p), Some(a)) if p != a => {
                differences.push(format!("start time differs: planned={p}, actual={a}"));
            }
            (None, Some(_)) | (Some(_), None) => {
                differences.push("start time differs".to_owned());
            }
            _ => {}
        }

        match (planned.end_time, actual.end_time) {
            (Some(p), Some(a)) if p != a => {
                differences.push(format!("end time differs: planned={p}, actual={a}"));
            }
            (None, Some(_)) | (Some(_), None) => {
                differences.push("end time differs".to_owned());
            }
            _ => {}
        }

        if planned.status != actual.status {
            differences.push(format!(
                "status differs: planned={:?}, actual={:?}",
                planned.status, actual.status
            ));
        }

        if planned.metadata != actual.metadata {
            differences.push("metadata differs".to_owned());
        }

        if planned.entries.len() != actual.entries.len() {
            differences.push(format!(
                "entries count differs: planned={}, actual={}",
                planned.entries.len(),
                actual.entries.len()
            ));
        } else {
            for (i, (p, a)) in planned.entries.iter().zip(&actual.entries).enumerate() {
                if p != a {
                    differences.push(format!("entry {i} differs"));
                }
            }
        }

        Ok((differences.is_empty(), differences))
    }

    /// Summary of an event's current timing and progress.
    pub fn event_summary(&self, event_id: &str) -> Result<EventSummary> {
        let event = self
            .events
            .get(event_id)
            .ok_or_else(|| ForestError::NotFound(format!("event not found: {event_id}")))?;

        let duration_secs = match (event.status, event.start_time, event.end_time) {
            (EventStatus::Finished, Some(start), Some(end)) => {
                Some((end - start).num_seconds())
            }
            (EventStatus::Ongoing, Some(start), _) => {
                Some((Utc::now() - start).num_seconds())
            }
            _ => None,
        };

        Ok(EventSummary {
            status: event.status,
            duration_secs,
            entries_count: event.entries.len(),
            last_update_time: event.entries.last().map(|e| e.timestamp),
        })
    }

    /// All entries of one event, in append order.
    pub fn event_entries(&self, event_id: &str) -> Result<Vec<Entry>> {
        let event = self
            .events
            .get(event_id)
            .ok_or_else(|| ForestError::NotFound(format!("event not found: {event_id}")))?;
        Ok(event.entries.clone())
    }

    /// Entries of every event on the node, grouped by event iteration
    /// order.
    pub fn all_event_entries(&self) -> Vec<Entry> {
        self.events
            .values()
            .flat_map(|e| e.entries.iter().cloned())
            .collect()
    }

    /// Copy of the planned-events map.
    pub fn planned(&self) -> std::collections::BTreeMap<String, Event> {
        self.planned_events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use grove_types::{NodeKind, Permission, User};

    fn writable_leaf() -> Node {
        let mut node = Node::new(NodeKind::Leaf, "leaf");
        node.assign_user(User::new("u1", "alice"), Permission::Write)
            .unwrap();
        node
    }

    #[test]
    fn start_event_without_schedule_is_ongoing() {
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();

        let event = &node.events["e1"];
        assert_eq!(event.status, EventStatus::Ongoing);
        assert!(event.start_time.is_some());
        assert!(event.end_time.is_none());
    }

    #[test]
    fn start_event_with_future_start_stays_pending() {
        let mut node = writable_leaf();
        let future = Utc::now() + Duration::hours(1);
        node.start_event("e1", "u1", Some(future), None, Metadata::new())
            .unwrap();

        let event = &node.events["e1"];
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.start_time, Some(future));
    }

    #[test]
    fn start_event_twice_conflicts() {
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        let err = node
            .start_event("e1", "u1", None, None, Metadata::new())
            .unwrap_err();
        assert!(matches!(err, ForestError::Conflict(_)));
    }

    #[test]
    fn start_event_on_branch_is_invalid() {
        let mut node = Node::new(NodeKind::Branch, "branch");
        node.assign_user(User::new("u1", "alice"), Permission::Write)
            .unwrap();
        let err = node
            .start_event("e1", "u1", None, None, Metadata::new())
            .unwrap_err();
        assert!(matches!(err, ForestError::InvalidType(_)));
    }

    #[test]
    fn start_event_requires_write() {
        let mut node = Node::new(NodeKind::Leaf, "leaf");
        node.assign_user(User::new("reader", "bob"), Permission::Read)
            .unwrap();
        let err = node
            .start_event("e1", "reader", None, None, Metadata::new())
            .unwrap_err();
        assert!(matches!(err, ForestError::Forbidden(_)));
    }

    #[test]
    fn metadata_keys_are_extracted() {
        let mut node = writable_leaf();
        let mut metadata = Metadata::new();
        metadata.insert("category".into(), "work".into());
        metadata.insert("frequency".into(), "weekly".into());
        metadata.insert("custom_pattern".into(), "mon,wed".into());
        node.start_event("e1", "u1", None, None, metadata).unwrap();

        let event = &node.events["e1"];
        assert_eq!(event.category.as_deref(), Some("work"));
        assert_eq!(event.frequency.as_deref(), Some("weekly"));
        assert_eq!(event.pattern.as_deref(), Some("mon,wed"));
    }

    #[test]
    fn append_then_end_then_reject_append() {
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        node.append_to_event("e1", "u1", "first".into(), Metadata::new())
            .unwrap();
        node.end_event("e1", "u1").unwrap();

        let event = &node.events["e1"];
        assert_eq!(event.status, EventStatus::Finished);
        assert!(event.end_time.unwrap() >= event.start_time.unwrap());
        assert_eq!(event.entries.len(), 1);

        let err = node
            .append_to_event("e1", "u1", "late".into(), Metadata::new())
            .unwrap_err();
        assert!(matches!(err, ForestError::Precondition(_)));
    }

    #[test]
    fn pending_event_rejects_append_and_end() {
        let mut node = writable_leaf();
        let future = Utc::now() + Duration::hours(1);
        node.start_event("e1", "u1", Some(future), None, Metadata::new())
            .unwrap();

        assert!(matches!(
            node.append_to_event("e1", "u1", "x".into(), Metadata::new()),
            Err(ForestError::Precondition(_))
        ));
        assert!(matches!(
            node.end_event("e1", "u1"),
            Err(ForestError::Precondition(_))
        ));
    }

    #[test]
    fn missing_event_operations_are_not_found() {
        let mut node = writable_leaf();
        assert!(matches!(
            node.end_event("ghost", "u1"),
            Err(ForestError::NotFound(_))
        ));
        assert!(matches!(
            node.append_to_event("ghost", "u1", "x".into(), Metadata::new()),
            Err(ForestError::NotFound(_))
        ));
        assert!(matches!(
            node.event_summary("ghost"),
            Err(ForestError::NotFound(_))
        ));
    }

    #[test]
    fn plan_event_is_blocked_by_ongoing_actual() {
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        let err = node
            .plan_event("e1", "u1", None, None, Metadata::new())
            .unwrap_err();
        assert!(matches!(err, ForestError::Conflict(_)));
    }

    #[test]
    fn plan_event_is_noop_after_finish() {
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        node.end_event("e1", "u1").unwrap();

        node.plan_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        assert!(!node.planned_events.contains_key("e1"));
    }

    #[test]
    fn compare_reports_differences() {
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        node.end_event("e1", "u1").unwrap();

        let start = Utc::now() + Duration::hours(1);
        let end = Utc::now() + Duration::hours(2);
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), "T2".into());
        node.plan_event("e2", "u1", Some(start), Some(end), metadata)
            .unwrap();

        let (equal, differences) = node.compare_events("e2", "e1").unwrap();
        assert!(!equal);
        assert!(!differences.is_empty());
        assert!(differences.iter().any(|d| d.contains("start time")));
        assert!(differences.iter().any(|d| d.contains("metadata")));
    }

    #[test]
    fn compare_missing_event_is_not_found() {
        let node = writable_leaf();
        assert!(matches!(
            node.compare_events("ghost", "also-ghost"),
            Err(ForestError::NotFound(_))
        ));
    }

    #[test]
    fn entry_accessors_cover_all_events() {
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        node.append_to_event("e1", "u1", "a".into(), Metadata::new())
            .unwrap();
        node.start_event("e2", "u1", None, None, Metadata::new())
            .unwrap();
        node.append_to_event("e2", "u1", "b".into(), Metadata::new())
            .unwrap();
        node.plan_event("e3", "u1", None, None, Metadata::new())
            .unwrap();

        assert_eq!(node.event_entries("e1").unwrap().len(), 1);
        assert_eq!(node.all_event_entries().len(), 2);
        assert!(node.planned().contains_key("e3"));
    }

    #[test]
    fn summary_reflects_lifecycle() {
        let mut node = writable_leaf();
        node.start_event("e1", "u1", None, None, Metadata::new())
            .unwrap();
        node.append_to_event("e1", "u1", "first".into(), Metadata::new())
            .unwrap();

        let summary = node.event_summary("e1").unwrap();
        assert_eq!(summary.status, EventStatus::Ongoing);
        assert_eq!(summary.entries_count, 1);
        assert!(summary.duration_secs.is_some());
        assert!(summary.last_update_time.is_some());

        node.end_event("e1", "u1").unwrap();
        let summary = node.event_summary("e1").unwrap();
        assert_eq!(summary.status, EventStatus::Finished);
        assert!(summary.duration_secs.unwrap() >= 0);
    }
}
