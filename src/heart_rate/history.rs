use std::collections::VecDeque;
use std::num::NonZeroUsize;

use super::HeartRateValue;

pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Most recent heart rate readings, oldest first.
///
/// Once `capacity` values are held, every new value pushes out the oldest one.
/// Mutation needs `&mut self`, so sharing a buffer across threads means
/// wrapping it in a lock (or keeping it inside one task, like `App` does).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryBuffer {
    values: VecDeque<HeartRateValue>,
    capacity: NonZeroUsize,
}

impl HistoryBuffer {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    pub fn append(&mut self, value: HeartRateValue) {
        self.values.push_back(value);
        while self.values.len() > self.capacity.get() {
            self.values.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Owned copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<HeartRateValue> {
        self.values.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<HeartRateValue> {
        self.values.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeartRateValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        let capacity =
            NonZeroUsize::new(DEFAULT_HISTORY_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self::new(capacity)
    }
}
