use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core::config;

/// One recorded admin action.
#[derive(Debug, Clone, Serialize)]
pub struct AdminLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: &'static str,
    pub details: serde_json::Value,
}

/// Bounded in-memory ring of admin actions.
///
/// Process-wide state, reset on restart. Oldest entries are evicted once
/// the ring is at capacity. Every entry is mirrored to the process log.
#[derive(Clone)]
pub struct AdminLog {
    entries: Arc<Mutex<VecDeque<AdminLogEntry>>>,
    capacity: usize,
}

impl Default for AdminLog {
    fn default() -> Self {
        Self::new(config::admin_log::CAPACITY)
    }
}

impl AdminLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest one beyond capacity.
    pub fn record(&self, action: &'static str, details: serde_json::Value) {
        log::info!("[ADMIN] {}: {}", action, details);

        let entry = AdminLogEntry {
            timestamp: Utc::now(),
            action,
            details,
        };

        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Returns up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AdminLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Total entries currently held in the ring.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_recent_order() {
        let log = AdminLog::new(10);
        log.record("VIEW_STATS", json!({}));
        log.record("POINTS_UPDATE", json!({"user_id": 1}));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "POINTS_UPDATE");
        assert_eq!(recent[1].action, "VIEW_STATS");
    }

    #[test]
    fn test_ring_evicts_oldest_beyond_capacity() {
        let log = AdminLog::new(3);
        for i in 0..5 {
            log.record("BROADCAST", json!({"seq": i}));
        }

        assert_eq!(log.len(), 3);
        let recent = log.recent(10);
        assert_eq!(recent[0].details["seq"], 4);
        assert_eq!(recent[2].details["seq"], 2);
    }

    #[test]
    fn test_recent_respects_limit() {
        let log = AdminLog::new(10);
        for i in 0..8 {
            log.record("VIEW_DIRECTORY", json!({"seq": i}));
        }
        assert_eq!(log.recent(5).len(), 5);
    }
}
