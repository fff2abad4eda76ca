use std::time::Duration;

/// Options for a single counter increment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncrementOptions {
    /// Expiry attached when this increment creates the counter.
    pub ttl: Option<Duration>,
    /// Delete the counter instead of incrementing it.
    pub reset: bool,
    /// Step size, 1 when unset.
    pub increment_by: Option<i64>,
}

impl IncrementOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset() -> Self {
        Self {
            reset: true,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn by(mut self, step: i64) -> Self {
        self.increment_by = Some(step);
        self
    }

    pub fn step(&self) -> i64 {
        match self.increment_by {
            Some(0) | None => 1,
            Some(n) => n,
        }
    }

    /// True when `value` is the reply of the increment that created the counter.
    pub fn is_first_write(&self, value: i64) -> bool {
        value == self.step()
    }
}
