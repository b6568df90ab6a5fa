//! # History Log
//!
//! Bounded, most-recent-first list of movement reports. The engine keeps two:
//! one for inventory additions/removals and one for waste write-offs.

use std::collections::VecDeque;

use crate::types::MovementReport;

/// Default number of reports retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Most-recent-first list of reports, capped at `capacity`.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<MovementReport>,
    capacity: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        HistoryLog::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryLog {
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        HistoryLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepends a report, evicting the oldest beyond capacity.
    pub fn prepend(&mut self, report: MovementReport) {
        self.entries.push_front(report);
        self.entries.truncate(self.capacity);
    }

    /// Replaces the log with backend rows. Sorted newest first, then capped.
    pub fn replace<I>(&mut self, reports: I)
    where
        I: IntoIterator<Item = MovementReport>,
    {
        let mut reports: Vec<MovementReport> = reports.into_iter().collect();
        reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        reports.truncate(self.capacity);
        self.entries = reports.into();
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovementReport> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&MovementReport> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
