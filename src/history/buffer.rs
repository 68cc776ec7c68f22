use std::collections::VecDeque;
use crate::types::metrics::DerivedMetrics;

/// Arrival-ordered, capacity-bounded series for one key. Append and
/// front-trim are the only mutations.
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<DerivedMetrics>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        HistoryBuffer {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends and trims to capacity, oldest first. Returns how many entries were dropped.
    pub fn push(&mut self, metrics: DerivedMetrics) -> usize {
        self.entries.push_back(metrics);

        let mut dropped = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn latest(&self) -> Option<&DerivedMetrics> {
        self.entries.back()
    }

    /// The most recent `min(n, len)` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<DerivedMetrics> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedMetrics> {
        self.entries.iter()
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
