use std::sync::{Mutex, MutexGuard};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// the outcome of asking a `RateLimiter` for admission
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Admission {
    /// the operation may proceed and has been counted against the window
    Proceed,
    /// the window is saturated, the operation should be skipped
    DoNotProceed,
}

impl Admission {
    /// true for `Admission::Proceed`
    pub fn is_proceed(&self) -> bool {
        *self == Admission::Proceed
    }
}

/// messages used to steer a background loop
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlMessage {
    /// run the loop body now instead of waiting for the next period
    Flush,
    /// leave the loop
    Shutdown,
}

/// what a periodic loop should do after waiting on its control channel
#[derive(Debug, Eq, PartialEq)]
pub enum Wake {
    Run,
    Exit,
}

/// wait up to `period` for a control message
///
/// an elapsed period or a `Flush` both mean the loop body should run, a
/// `Shutdown` or a dropped controller ends the loop
pub fn wait_for_control(control: &Receiver<ControlMessage>, period: Duration) -> Wake {
    match control.recv_timeout(period) {
        Ok(ControlMessage::Flush) |
        Err(RecvTimeoutError::Timeout) => Wake::Run,
        Ok(ControlMessage::Shutdown) |
        Err(RecvTimeoutError::Disconnected) => Wake::Exit,
    }
}

/// reports a background thread as finished when dropped, including on unwind
pub struct ExitNotice {
    done: Sender<()>,
}

impl ExitNotice {
    pub fn new(done: Sender<()>) -> ExitNotice {
        ExitNotice { done: done }
    }
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.done.send(());
    }
}

/// wait until `count` threads report exit or `timeout` elapses
///
/// returns the number of threads still running at the deadline
pub fn await_exits(done: &Receiver<()>, count: usize, timeout: Duration) -> usize {
    let deadline = Instant::now() + timeout;
    let mut remaining = count;
    while remaining > 0 {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match done.recv_timeout(deadline - now) {
            Ok(()) => remaining -= 1,
            Err(RecvTimeoutError::Timeout) => break,
            // every notice has been dropped, so every thread is gone
            Err(RecvTimeoutError::Disconnected) => return 0,
        }
    }
    remaining
}

/// lock a mutex, recovering the data if a previous holder panicked
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// helper function for tests, ignore dead_code warnings
#[allow(dead_code)]
pub fn is_between(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}
