//! Successful-bind counter.

/// Counts successful binds and tells the caller when to report progress.
#[derive(Debug, Clone)]
pub struct SuccessCounter {
    count: u64,
    interval: u64,
}

impl SuccessCounter {
    /// Create a counter reporting every `interval` successes.
    ///
    /// An interval of 0 is treated as 1.
    pub fn new(interval: u64) -> Self {
        Self {
            count: 0,
            interval: interval.max(1),
        }
    }

    /// Record one success. Returns true when the new total is a multiple
    /// of the interval.
    pub fn record_success(&mut self) -> bool {
        self.count += 1;
        self.count % self.interval == 0
    }

    /// Successful binds so far.
    pub fn value(&self) -> u64 {
        self.count
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }
}

impl Default for SuccessCounter {
    fn default() -> Self {
        Self::new(100)
    }
}
