//! Append-only record of authorization decisions, for audit and display.
//! Capacity-bounded: a long-lived process evicts the oldest entries instead
//! of growing without bound.

use std::collections::VecDeque;
use std::sync::Mutex;

use entity::Decision;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug)]
pub struct DecisionLog {
    entries: Mutex<VecDeque<Decision>>,
    capacity: usize,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, decision: Decision) {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(decision);
    }

    /// Oldest-first copy of the retained decisions.
    pub fn snapshot(&self) -> Vec<Decision> {
        self.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<Decision> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Decision>> {
        self.entries.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Default for DecisionLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
