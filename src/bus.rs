//! a typed publish/subscribe bus with asynchronous fan-out
//!
//! Events are a closed set of variants implementing `Event`; subscribers
//! register against a variant's `Kind` and only ever see events of exactly
//! that kind. `publish` pushes onto a bounded `mpmc::Queue` and returns
//! immediately. A single dispatch thread drains the queue in FIFO order and
//! submits one job per matching subscriber to a fixed pool of workers, so a
//! slow or panicking subscriber never holds up its siblings or the
//! dispatcher.
//!
//! `publish_coalesced` additionally remembers the last value published that
//! way for each kind and skips values equal to it.

use common::{await_exits, lock, ControlMessage, ExitNotice};
use error::Error;
use fnv::FnvHashMap;
use mpmc::Queue;
use std::any::Any;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// an event that can travel on an `EventBus`
pub trait Event: Clone + PartialEq + Send + Sync + 'static {
    /// the tag subscribers register against, one per variant
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

type Filter<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type Handler<E> = Box<dyn Fn(&E) + Send + Sync>;
type Job = Box<dyn FnOnce() + Send + Sync>;

struct Subscriber<E> {
    id: usize,
    filter: Option<Filter<E>>,
    handler: Handler<E>,
}

impl<E> Subscriber<E> {
    fn accepts(&self, event: &E) -> bool {
        match self.filter {
            Some(ref filter) => filter(event),
            None => true,
        }
    }
}

#[derive(Default)]
struct Counters {
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

/// a configuration struct for customizing an `EventBus`
#[derive(Clone, Debug)]
pub struct BusConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub poll_delay: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> BusConfig {
        BusConfig {
            workers: 4,
            queue_capacity: 1024,
            poll_delay: Duration::from_millis(1),
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

impl BusConfig {
    /// create a new BusConfig with defaults
    pub fn new() -> BusConfig {
        Default::default()
    }

    /// set number of threads running subscriber handlers: default 4
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// set capacity of the event queue and the job queue: default 1024
    ///
    /// the queues round this up to the next power of two
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// set how long idle threads sleep between queue polls: default 1ms
    pub fn poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// set how long `shutdown` waits for in-flight work: default 1s
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::InvalidArgument("bus needs at least 1 worker"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidArgument("bus queue capacity must be non-zero"));
        }
        if self.poll_delay == Duration::new(0, 0) {
            return Err(Error::InvalidArgument("bus poll delay must be non-zero"));
        }
        Ok(())
    }

    /// Build a new EventBus based on the current configuration
    pub fn build<E: Event>(self) -> Result<EventBus<E>, Error> {
        EventBus::configured(self)
    }
}

struct Shared<E: Event> {
    subscribers: RwLock<FnvHashMap<E::Kind, Vec<Arc<Subscriber<E>>>>>,
    latest: Mutex<FnvHashMap<E::Kind, E>>,
    events: Queue<E>,
    jobs: Queue<Job>,
    pending: AtomicUsize,
    next_id: AtomicUsize,
    counters: Arc<Counters>,
    // held for reading across every push, so no event lands after shutdown
    // has flipped it
    accepting: RwLock<bool>,
    // set by the dispatcher once it has submitted its last job
    draining: AtomicBool,
    // set when shutdown gives up waiting, queued work is abandoned
    cancelled: AtomicBool,
    poll_delay: Duration,
}

impl<E: Event> Shared<E> {
    fn subscribers(&self) -> RwLockReadGuard<FnvHashMap<E::Kind, Vec<Arc<Subscriber<E>>>>> {
        match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn subscribers_mut(&self) -> RwLockWriteGuard<FnvHashMap<E::Kind, Vec<Arc<Subscriber<E>>>>> {
        match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn accepting(&self) -> RwLockReadGuard<bool> {
        match self.accepting.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn stop_accepting(&self) {
        let mut accepting = match self.accepting.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *accepting = false;
    }

    // callers hold the `accepting` read guard
    fn enqueue(&self, event: E) -> bool {
        let kind = event.kind();
        // counted before the push so the dispatcher never takes it below zero
        self.pending.fetch_add(1, Ordering::SeqCst);
        match self.events.push(event) {
            Ok(()) => {
                trace!("bus: queued {:?} event", kind);
                true
            }
            Err(_) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                warn!("bus: queue full, rejecting {:?} event", kind);
                false
            }
        }
    }
}

struct Threads {
    control: Sender<ControlMessage>,
    done: Receiver<()>,
    handles: Vec<JoinHandle<()>>,
}

/// an asynchronous publish/subscribe bus for events of type `E`
pub struct EventBus<E: Event> {
    shared: Arc<Shared<E>>,
    config: BusConfig,
    threads: Mutex<Option<Threads>>,
}

impl<E: Event> EventBus<E> {
    /// create an `EventBus` with the default configuration
    pub fn new() -> Result<EventBus<E>, Error> {
        EventBus::configured(BusConfig::default())
    }

    /// create an `EventBus` from a `BusConfig`, starting its threads
    pub fn configured(config: BusConfig) -> Result<EventBus<E>, Error> {
        config.validate()?;

        let shared = Arc::new(Shared {
            subscribers: RwLock::new(FnvHashMap::default()),
            latest: Mutex::new(FnvHashMap::default()),
            events: Queue::with_capacity(config.queue_capacity),
            jobs: Queue::with_capacity(config.queue_capacity),
            pending: AtomicUsize::new(0),
            next_id: AtomicUsize::new(0),
            counters: Arc::new(Counters::default()),
            accepting: RwLock::new(true),
            draining: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            poll_delay: config.poll_delay,
        });

        let (control_tx, control_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(config.workers + 1);

        let spawned = spawn_threads(&shared, &config, control_rx, &done_tx, &mut handles);
        if let Err(e) = spawned {
            error!("bus: failed to start threads: {}", e);
            shared.cancelled.store(true, Ordering::SeqCst);
            return Err(e);
        }
        debug!("bus: started dispatcher and {} worker(s)", config.workers);

        Ok(EventBus {
            shared: shared,
            config: config,
            threads: Mutex::new(Some(Threads {
                control: control_tx,
                done: done_rx,
                handles: handles,
            })),
        })
    }

    /// register `handler` for every event of `kind`
    pub fn subscribe<H>(&self, kind: E::Kind, handler: H) -> Result<(), Error>
        where H: Fn(&E) + Send + Sync + 'static
    {
        self.register(kind, None, Box::new(handler))
    }

    /// register `handler` for events of `kind` accepted by `filter`
    ///
    /// the filter runs on the bus's threads, never on the publisher's
    pub fn subscribe_filtered<F, H>(&self, kind: E::Kind, filter: F, handler: H) -> Result<(), Error>
        where F: Fn(&E) -> bool + Send + Sync + 'static,
              H: Fn(&E) + Send + Sync + 'static
    {
        self.register(kind, Some(Box::new(filter)), Box::new(handler))
    }

    fn register(&self, kind: E::Kind, filter: Option<Filter<E>>, handler: Handler<E>) -> Result<(), Error> {
        if !*self.shared.accepting() {
            return Err(Error::Shutdown);
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared
            .subscribers_mut()
            .entry(kind)
            .or_insert_with(Vec::new)
            .push(Arc::new(Subscriber {
                id: id,
                filter: filter,
                handler: handler,
            }));
        debug!("bus: subscriber {} registered for {:?}", id, kind);
        Ok(())
    }

    /// queue `event` for every subscriber of its kind
    ///
    /// returns false if the bus is shut down or the queue is full
    pub fn publish(&self, event: E) -> bool {
        let accepting = self.shared.accepting();
        if !*accepting {
            debug!("bus: shut down, dropping {:?} event", event.kind());
            return false;
        }
        self.shared.enqueue(event)
    }

    /// like `publish`, but a no-op returning true when `event` equals the last
    /// event of its kind published through this method
    ///
    /// an event is only remembered once it has been queued
    pub fn publish_coalesced(&self, event: E) -> bool {
        let accepting = self.shared.accepting();
        if !*accepting {
            debug!("bus: shut down, dropping {:?} event", event.kind());
            return false;
        }
        let kind = event.kind();
        let mut latest = lock(&self.shared.latest);
        if latest.get(&kind) == Some(&event) {
            trace!("bus: coalesced {:?} event", kind);
            return true;
        }
        if self.shared.enqueue(event.clone()) {
            latest.insert(kind, event);
            true
        } else {
            false
        }
    }

    /// number of subscribers registered for `kind`
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.shared.subscribers().get(&kind).map_or(0, |s| s.len())
    }

    /// events queued but not yet taken by the dispatcher
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// handler invocations that completed
    pub fn delivered(&self) -> usize {
        self.shared.counters.delivered.load(Ordering::SeqCst)
    }

    /// handler invocations that panicked
    pub fn failed(&self) -> usize {
        self.shared.counters.failed.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        !*self.shared.accepting()
    }

    /// stop accepting events, let queued dispatches finish, and stop threads
    ///
    /// waits at most the configured `shutdown_timeout`; threads still busy at
    /// the deadline are told to abandon remaining work and left to exit on
    /// their own
    pub fn shutdown(&self) {
        let threads = match lock(&self.threads).take() {
            Some(threads) => threads,
            None => return,
        };
        self.shared.stop_accepting();
        let _ = threads.control.send(ControlMessage::Shutdown);

        let remaining = await_exits(&threads.done,
                                    threads.handles.len(),
                                    self.config.shutdown_timeout);
        if remaining > 0 {
            warn!("bus: {} thread(s) still busy after {:?}, cancelling",
                  remaining,
                  self.config.shutdown_timeout);
            self.shared.cancelled.store(true, Ordering::SeqCst);
            return;
        }
        for handle in threads.handles {
            let _ = handle.join();
        }
        debug!("bus: shut down");
    }
}

impl<E: Event> Drop for EventBus<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_threads<E: Event>(shared: &Arc<Shared<E>>,
                           config: &BusConfig,
                           control: Receiver<ControlMessage>,
                           done: &Sender<()>,
                           handles: &mut Vec<JoinHandle<()>>)
                           -> Result<(), Error> {
    let s = shared.clone();
    let notice = ExitNotice::new(done.clone());
    handles.push(thread::Builder::new()
        .name("winstat-dispatch".to_owned())
        .spawn(move || {
            let _notice = notice;
            dispatch(&s, &control);
        })?);

    for i in 0..config.workers {
        let s = shared.clone();
        let notice = ExitNotice::new(done.clone());
        handles.push(thread::Builder::new()
            .name(format!("winstat-worker-{}", i))
            .spawn(move || {
                let _notice = notice;
                work(&s);
            })?);
    }
    Ok(())
}

// drain the event queue in order until told to stop and the queue is empty
fn dispatch<E: Event>(shared: &Shared<E>, control: &Receiver<ControlMessage>) {
    trace!("bus: dispatch loop running");
    let mut stopping = false;
    while !shared.cancelled.load(Ordering::SeqCst) {
        if !stopping {
            match control.try_recv() {
                Ok(ControlMessage::Shutdown) |
                Err(TryRecvError::Disconnected) => stopping = true,
                Ok(ControlMessage::Flush) |
                Err(TryRecvError::Empty) => {}
            }
        }
        match shared.events.pop() {
            Some(event) => {
                shared.pending.fetch_sub(1, Ordering::SeqCst);
                fan_out(shared, event);
            }
            None => {
                if stopping {
                    break;
                }
                thread::sleep(shared.poll_delay);
            }
        }
    }
    shared.draining.store(true, Ordering::SeqCst);
    trace!("bus: dispatch loop stopped");
}

fn fan_out<E: Event>(shared: &Shared<E>, event: E) {
    let kind = event.kind();
    let subscribers = match shared.subscribers().get(&kind) {
        Some(subscribers) => subscribers.clone(),
        None => {
            trace!("bus: no subscribers for {:?}", kind);
            return;
        }
    };
    let event = Arc::new(event);
    for subscriber in subscribers {
        let event = event.clone();
        let counters = shared.counters.clone();
        let mut job: Job = Box::new(move || invoke(&subscriber, &event, &counters));
        // a full job queue applies backpressure to the dispatcher only
        loop {
            match shared.jobs.push(job) {
                Ok(()) => break,
                Err(rejected) => {
                    if shared.cancelled.load(Ordering::SeqCst) {
                        return;
                    }
                    job = rejected;
                    thread::sleep(shared.poll_delay);
                }
            }
        }
    }
}

fn work<E: Event>(shared: &Shared<E>) {
    while !shared.cancelled.load(Ordering::SeqCst) {
        match shared.jobs.pop() {
            Some(job) => job(),
            None => {
                if shared.draining.load(Ordering::SeqCst) {
                    // the dispatcher may have pushed between our pop and the flag
                    match shared.jobs.pop() {
                        Some(job) => job(),
                        None => break,
                    }
                } else {
                    thread::sleep(shared.poll_delay);
                }
            }
        }
    }
}

fn invoke<E: Event>(subscriber: &Subscriber<E>, event: &E, counters: &Counters) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| if subscriber.accepts(event) {
        (subscriber.handler)(event);
        true
    } else {
        false
    }));
    match result {
        Ok(true) => {
            counters.delivered.fetch_add(1, Ordering::SeqCst);
        }
        Ok(false) => {
            trace!("bus: subscriber {} filtered out {:?} event", subscriber.id, event.kind());
        }
        Err(cause) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            error!("bus: subscriber {} failed on {:?} event: {}",
                   subscriber.id,
                   event.kind(),
                   panic_message(&cause));
        }
    }
}

fn panic_message(cause: &Box<dyn Any + Send>) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        return (*s).to_owned();
    }
    if let Some(s) = cause.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic".to_owned()
}
