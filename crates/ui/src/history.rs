//! Console log history.
//!
//! Console events captured from the target frame are kept here so that a
//! devtools surface attaching late (or re-attaching after a reload) can be
//! brought up to date by replaying them in capture order.

use crate::protocol::{LogEntry, WireMessage};
use crate::surface::Endpoint;
use std::collections::VecDeque;

/// Default number of entries kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Ordered buffer of serialized console events.
#[derive(Clone, Debug)]
pub struct LogHistory {
    /// Entries in append order.
    entries: VecDeque<LogEntry>,
    /// Maximum number of entries, `None` for unbounded.
    capacity: Option<usize>,
    /// Entries dropped to honor `capacity` since the last clear.
    evicted: usize,
}

impl LogHistory {
    /// Create a history bounded to [`DEFAULT_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_capacity(Some(DEFAULT_CAPACITY))
    }

    /// Create a history with a custom bound.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            evicted: 0,
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn append(&mut self, entry: LogEntry) {
        if let Some(cap) = self.capacity {
            if cap == 0 {
                self.evicted += 1;
                return;
            }
            if self.entries.len() >= cap {
                self.entries.pop_front();
                self.evicted += 1;
                tracing::trace!(capacity = cap, "log history full, evicted oldest entry");
            }
        }
        self.entries.push_back(entry);
    }

    /// Deliver every entry to `endpoint` in append order. Returns the count.
    pub fn replay<E: Endpoint + ?Sized>(&self, endpoint: &E) -> usize {
        for entry in &self.entries {
            endpoint.post_message(WireMessage::Text(entry.as_str().to_string()));
        }
        tracing::debug!(entries = self.entries.len(), "replayed log history");
        self.entries.len()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(entries = self.entries.len(), "cleared log history");
        }
        self.entries.clear();
        self.evicted = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries dropped to honor the capacity since the last clear.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

impl Default for LogHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::recording::RecordingSurface;

    fn entry(n: usize) -> LogEntry {
        LogEntry::from_raw(format!(r#"{{"method":"Runtime.consoleAPICalled","params":{{"n":{}}}}}"#, n))
    }

    #[test]
    fn test_replay_preserves_append_order() {
        let mut history = LogHistory::new();
        for n in 0..20 {
            history.append(entry(n));
        }

        let surface = RecordingSurface::new();
        assert_eq!(history.replay(&surface), 20);

        let expected: Vec<String> = (0..20).map(|n| entry(n).as_str().to_string()).collect();
        assert_eq!(surface.texts(), expected);
    }

    #[test]
    fn test_clear_then_replay_delivers_nothing() {
        let mut history = LogHistory::new();
        history.append(entry(1));
        history.append(entry(2));
        history.clear();

        let surface = RecordingSurface::new();
        assert_eq!(history.replay(&surface), 0);
        assert!(surface.messages().is_empty());
        assert!(history.is_empty());
    }

    #[test]
    fn test_replay_does_not_drain() {
        let mut history = LogHistory::new();
        history.append(entry(1));

        let surface = RecordingSurface::new();
        history.replay(&surface);
        history.replay(&surface);

        assert_eq!(surface.messages().len(), 2);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = LogHistory::with_capacity(Some(3));
        for n in 0..5 {
            history.append(entry(n));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.evicted(), 2);
        let kept: Vec<&str> = history.iter().map(LogEntry::as_str).collect();
        assert_eq!(kept, vec![entry(2).as_str(), entry(3).as_str(), entry(4).as_str()]);
    }

    #[test]
    fn test_unbounded() {
        let mut history = LogHistory::with_capacity(None);
        for n in 0..(DEFAULT_CAPACITY + 5) {
            history.append(entry(n));
        }
        assert_eq!(history.len(), DEFAULT_CAPACITY + 5);
        assert_eq!(history.evicted(), 0);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = LogHistory::with_capacity(Some(0));
        history.append(entry(1));
        assert!(history.is_empty());
        assert_eq!(history.evicted(), 1);
    }
}
