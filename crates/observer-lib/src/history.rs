//! Bounded historical context store
//!
//! Keeps the most recent observation records in a FIFO ring so that later
//! cycles can feed trend context into the analysis stages. In-memory only;
//! the history resets on restart along with the iteration counter.

use std::collections::VecDeque;

use crate::models::ObservationRecord;

/// Maximum retained observation records
pub const HISTORY_CAPACITY: usize = 10;

/// Records required before the load-prediction stage runs
pub const MIN_PREDICTION_HISTORY: usize = 3;

/// Bounded FIFO store of past observation cycles
#[derive(Debug)]
pub struct HistoryStore {
    records: VecDeque<ObservationRecord>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest entries while at capacity
    pub fn append(&mut self, record: ObservationRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The last `min(k, len)` records in chronological order, oldest first
    pub fn recent(&self, k: usize) -> impl Iterator<Item = &ObservationRecord> {
        let skip = self.records.len().saturating_sub(k);
        self.records.iter().skip(skip)
    }

    /// Whether enough history has accumulated to gate history-dependent stages
    pub fn is_warm(&self, min_count: usize) -> bool {
        self.records.len() >= min_count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricsSnapshot;
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;

    fn record_at(offset_secs: i64) -> ObservationRecord {
        let snapshot = MetricsSnapshot::new(
            Utc::now() + Duration::seconds(offset_secs),
            BTreeMap::new(),
        );
        ObservationRecord::new(snapshot, Vec::new())
    }

    #[test]
    fn test_append_within_capacity() {
        let mut store = HistoryStore::with_capacity(10);
        for i in 0..4 {
            store.append(record_at(i));
        }
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_fifo_eviction_keeps_most_recent() {
        let capacity = 10;
        let mut store = HistoryStore::with_capacity(capacity);

        // Append capacity + 5 records; the 5 oldest must be evicted.
        for i in 0..(capacity as i64 + 5) {
            store.append(record_at(i));
        }

        assert_eq!(store.len(), capacity);

        let timestamps: Vec<_> = store.recent(capacity).map(|r| r.timestamp).collect();
        assert_eq!(timestamps.len(), capacity);

        // Chronological order, oldest first
        for pair in timestamps.windows(2) {
            assert!(pair[0] < pair[1]);
        }

        // The first 5 appended records are gone
        let all: Vec<_> = store.recent(usize::MAX).map(|r| r.timestamp).collect();
        assert_eq!(all.first(), timestamps.first());
    }

    #[test]
    fn test_recent_fewer_than_requested() {
        let mut store = HistoryStore::with_capacity(10);
        store.append(record_at(0));
        store.append(record_at(1));

        let recent: Vec<_> = store.recent(3).collect();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp < recent[1].timestamp);
    }

    #[test]
    fn test_recent_is_restartable() {
        let mut store = HistoryStore::with_capacity(10);
        for i in 0..5 {
            store.append(record_at(i));
        }
        assert_eq!(store.recent(3).count(), 3);
        assert_eq!(store.recent(3).count(), 3);
    }

    #[test]
    fn test_is_warm() {
        let mut store = HistoryStore::new();
        assert!(!store.is_warm(MIN_PREDICTION_HISTORY));

        for i in 0..3 {
            store.append(record_at(i));
        }
        assert!(store.is_warm(MIN_PREDICTION_HISTORY));
    }
}
