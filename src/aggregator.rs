//! turns the live contents of a `WindowBuffer` into a `Statistics` snapshot
//!
//! All time-window policy lives here. The buffer is appended to in
//! timestamp order, so eviction walks from the oldest entry and stops at the
//! first one still inside the window.

use buffer::WindowBuffer;
use data::{Histogram, Statistics};
use std::time::{Duration, Instant};

/// evict every entry older than `window` as of `now`, returning how many went
pub fn evict_expired(buffer: &WindowBuffer, now: Instant, window: Duration) -> usize {
    let mut evicted = 0;
    while buffer.advance_if(|m| m.is_expired(now, window)).is_some() {
        evicted += 1;
    }
    if evicted > 0 {
        trace!("aggregator: evicted {} expired measurement(s)", evicted);
    }
    evicted
}

/// fold the entries live at `now` into a histogram
pub fn histogram(buffer: &WindowBuffer, now: Instant, window: Duration) -> Histogram {
    let mut histogram = Histogram::new();
    for m in buffer.iter().filter(|m| !m.is_expired(now, window)) {
        histogram.increment(m.value());
    }
    histogram
}

/// evict expired entries and snapshot what remains
pub fn compute_snapshot(buffer: &WindowBuffer, now: Instant, window: Duration) -> Statistics {
    evict_expired(buffer, now, window);
    Statistics::new(histogram(buffer, now, window))
}
