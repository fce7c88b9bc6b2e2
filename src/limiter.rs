//! admission control over a trailing time window
//!
//! `RateLimiter` keeps the instants of recently admitted operations. Each
//! decision first purges instants at least one window old, then admits only
//! if fewer than `max_ops` remain. Purge, check, and record share one lock,
//! so no more than `max_ops` operations are ever admitted within any
//! trailing window.

use common::{lock, wait_for_control, Admission, ControlMessage, Wake};
use error::Error;
use fnv::FnvHashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Inner {
    max_ops: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
    // control channels of live notifier threads, each removes its own entry
    watchers: Mutex<FnvHashMap<usize, Sender<ControlMessage>>>,
    next_watcher: AtomicUsize,
}

// unregisters a notifier thread when it exits, including on unwind
struct Watch {
    limiter: RateLimiter,
    id: usize,
}

impl Drop for Watch {
    fn drop(&mut self) {
        lock(&self.limiter.inner.watchers).remove(&self.id);
    }
}

/// a sliding-window rate limiter, clonable for sharing between threads
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// admit at most `max_ops` operations within any trailing `window`
    pub fn new(max_ops: usize, window: Duration) -> Result<RateLimiter, Error> {
        if max_ops == 0 {
            return Err(Error::InvalidArgument("rate limit must admit at least 1 operation"));
        }
        if window == Duration::new(0, 0) {
            return Err(Error::InvalidArgument("rate window must be non-zero"));
        }
        Ok(RateLimiter {
            inner: Arc::new(Inner {
                max_ops: max_ops,
                window: window,
                admitted: Mutex::new(VecDeque::with_capacity(max_ops)),
                watchers: Mutex::new(FnvHashMap::default()),
                next_watcher: AtomicUsize::new(0),
            }),
        })
    }

    pub fn max_ops(&self) -> usize {
        self.inner.max_ops
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// decide whether an operation happening now may proceed
    pub fn should_proceed(&self) -> Admission {
        let mut admitted = lock(&self.inner.admitted);
        self.admit(&mut admitted, Instant::now())
    }

    /// decide whether an operation happening at `now` may proceed
    pub fn should_proceed_at(&self, now: Instant) -> Admission {
        let mut admitted = lock(&self.inner.admitted);
        self.admit(&mut admitted, now)
    }

    /// number of admissions still counted against the window at `now`
    pub fn in_window(&self, now: Instant) -> usize {
        let mut admitted = lock(&self.inner.admitted);
        self.purge(&mut admitted, now);
        admitted.len()
    }

    fn purge(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = admitted.front() {
            match now.checked_duration_since(oldest) {
                Some(age) if age >= self.inner.window => {
                    admitted.pop_front();
                }
                _ => break,
            }
        }
    }

    fn admit(&self, admitted: &mut VecDeque<Instant>, now: Instant) -> Admission {
        self.purge(admitted, now);
        if admitted.len() < self.inner.max_ops {
            admitted.push_back(now);
            Admission::Proceed
        } else {
            Admission::DoNotProceed
        }
    }

    /// poll for admission every `period` on a background thread, invoking
    /// `callback` once when an operation is admitted
    ///
    /// the admission is counted against the window like any other
    pub fn notify_when_can_proceed<F>(&self, period: Duration, callback: F) -> Result<Notifier, Error>
        where F: FnOnce(Admission) + Send + 'static
    {
        if period == Duration::new(0, 0) {
            return Err(Error::InvalidArgument("notify period must be non-zero"));
        }
        let (control_tx, control_rx) = mpsc::channel();
        let id = self.inner.next_watcher.fetch_add(1, Ordering::Relaxed);
        // registered before the thread starts so its exit always finds the entry
        lock(&self.inner.watchers).insert(id, control_tx.clone());
        let watch = Watch {
            limiter: self.clone(),
            id: id,
        };
        let spawned = thread::Builder::new()
            .name("winstat-notify".to_owned())
            .spawn(move || {
                let watch = watch;
                loop {
                    if watch.limiter.should_proceed().is_proceed() {
                        trace!("notify: admitted");
                        callback(Admission::Proceed);
                        return;
                    }
                    if wait_for_control(&control_rx, period) == Wake::Exit {
                        debug!("notify: cancelled");
                        return;
                    }
                }
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                lock(&self.inner.watchers).remove(&id);
                return Err(Error::from(e));
            }
        };
        Ok(Notifier {
            control: control_tx,
            handle: Some(handle),
        })
    }

    /// cancel every outstanding notification
    pub fn shutdown(&self) {
        let watchers: Vec<_> = lock(&self.inner.watchers).drain().map(|(_, w)| w).collect();
        if !watchers.is_empty() {
            debug!("limiter: cancelling {} notifier(s)", watchers.len());
        }
        for watcher in watchers {
            let _ = watcher.send(ControlMessage::Shutdown);
        }
    }
}

/// handle to a pending `notify_when_can_proceed`
///
/// dropping the handle leaves the notification armed
pub struct Notifier {
    control: Sender<ControlMessage>,
    handle: Option<JoinHandle<()>>,
}

impl Notifier {
    /// stop polling and wait for the polling thread to exit
    ///
    /// has no effect if the callback already ran
    pub fn cancel(mut self) {
        let _ = self.control.send(ControlMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// re-check admission immediately instead of at the next period
    pub fn poke(&self) {
        let _ = self.control.send(ControlMessage::Flush);
    }
}


#[cfg(feature = "benchmark")]
#[cfg(test)]
mod benchmark {
    extern crate test;
    use super::*;

    #[bench]
    fn should_proceed(b: &mut test::Bencher) {
        let limiter = RateLimiter::new(1_000, Duration::from_millis(1)).unwrap();
        b.iter(|| limiter.should_proceed());
    }
}
