//! Monotonic clock for the render loop

use std::time::Instant;

use crate::Timestamp;

/// Source of "now" for playback scheduling
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Monotonic clock backed by the OS clock
/// INVARIANT: successive `now()` calls never go backwards
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    /// Reference instant (timestamp zero)
    reference: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is the moment of construction
    pub fn new() -> Self {
        MonotonicClock {
            reference: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let elapsed = Instant::now().duration_since(self.reference);
        Timestamp::from_micros(elapsed.as_micros() as u64)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();

        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }
}
