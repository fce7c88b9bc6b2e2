use std::time::{Duration, Instant};

/// a single recorded value and the instant it was admitted
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Measurement {
    value: i64,
    timestamp: Instant,
}

impl Measurement {
    /// create a new Measurement stamped with the current time
    pub fn new(value: i64) -> Measurement {
        Measurement::at(value, Instant::now())
    }

    /// create a new Measurement with an explicit timestamp
    pub fn at(value: i64, timestamp: Instant) -> Measurement {
        Measurement {
            value: value,
            timestamp: timestamp,
        }
    }

    /// return the value
    pub fn value(&self) -> i64 {
        self.value
    }

    /// return the timestamp
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// time elapsed between the timestamp and `now`, zero if `now` is earlier
    pub fn age(&self, now: Instant) -> Duration {
        now.checked_duration_since(self.timestamp)
            .unwrap_or_else(|| Duration::new(0, 0))
    }

    /// true once the measurement is strictly older than `window`
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        self.age(now) > window
    }
}
