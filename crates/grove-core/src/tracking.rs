//! Time tracking: paired start/stop entries appended directly to a node.

use chrono::Utc;

use grove_types::{Entry, Metadata, Result, TrackedInterval, START_TIME_ENTRY, STOP_TIME_ENTRY};

use crate::node::Node;

impl Node {
    /// Append a time-tracking start entry for `user_id`.
    pub fn start_time_tracking(&mut self, user_id: &str) -> Result<Entry> {
        self.require_write(user_id)?;
        let entry = Entry {
            timestamp: Utc::now(),
            user_id: user_id.to_owned(),
            content: START_TIME_ENTRY.into(),
            metadata: Metadata::new(),
            attachments: Vec::new(),
        };
        self.entries.push(entry.clone());
        self.touch(user_id);
        Ok(entry)
    }

    /// Append a time-tracking stop entry for `user_id`.
    pub fn stop_time_tracking(&mut self, user_id: &str) -> Result<Entry> {
        self.require_write(user_id)?;
        let entry = Entry {
            timestamp: Utc::now(),
            user_id: user_id.to_owned(),
            content: STOP_TIME_ENTRY.into(),
            metadata: Metadata::new(),
            attachments: Vec::new(),
        };
        self.entries.push(entry.clone());
        self.touch(user_id);
        Ok(entry)
    }

    /// Pair start/stop entries for `user_id` into tracked intervals.
    ///
    /// The scan walks entries in insertion order. The most recent
    /// unmatched start pairs with the next stop for the same user;
    /// unpaired starts are ignored and stops without a prior start are
    /// discarded.
    pub fn time_tracking_summary(&self, user_id: &str) -> Vec<TrackedInterval> {
        let mut intervals = Vec::new();
        let mut open_start: Option<&Entry> = None;

        for entry in self.entries.iter().filter(|e| e.user_id == user_id) {
            if entry.content == START_TIME_ENTRY {
                open_start = Some(entry);
            } else if entry.content == STOP_TIME_ENTRY {
                if let Some(start) = open_start.take() {
                    intervals.push(TrackedInterval {
                        start_time: start.timestamp,
                        end_time: entry.timestamp,
                        duration_secs: (entry.timestamp - start.timestamp).num_seconds(),
                    });
                }
            }
        }

        intervals
    }
}
