//! Bounded per-metric history of raw values
//!
//! FIFO eviction keeps at most `capacity` values; after inserting
//! `capacity + k` values the buffer holds exactly the last `capacity` of
//! them in insertion order.

use std::collections::VecDeque;

/// Default buffer capacity per metric
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Rolling buffer of recent raw values for one metric
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingBuffer {
    /// Create an empty buffer (capacity is at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
        }
    }

    /// Append one value, evicting the oldest if full
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Append values in order
    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        for value in values {
            self.push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently inserted value
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// All buffered values, oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// The last `n` values (or fewer), oldest first
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(n);
        self.values.iter().skip(skip).copied().collect()
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
