//! the sliding-window statistics service
//!
//! `add` passes through the rate limiter into the window buffer and marks
//! the window dirty. A scheduler thread wakes every tick; when the window is
//! dirty, or still holds measurements that may expire, it computes a snapshot
//! and offers it to the bus with `publish_coalesced`, so subscribers only
//! hear about snapshots that differ from the last one published.

use aggregator;
use buffer::WindowBuffer;
use bus::EventBus;
use common::{await_exits, lock, wait_for_control, ControlMessage, ExitNotice, Wake};
use config::Config;
use controller::Controller;
use data::{Measurement, Statistics, Telemetry, TelemetryKind};
use error::Error;
use limiter::RateLimiter;
use sender::Sender;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// the ingest and aggregate path shared by a `Service`, its `Sender`s, and
/// its scheduler thread
pub struct Pipeline {
    limiter: RateLimiter,
    buffer: WindowBuffer,
    window: Duration,
    bus: Arc<EventBus<Telemetry>>,
    publish_on_add: bool,
    dirty: AtomicBool,
    rejected: AtomicUsize,
    dropped: AtomicUsize,
}

impl Pipeline {
    pub fn record(&self, value: i64) -> bool {
        if !self.limiter.should_proceed().is_proceed() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            trace!("service: rate limited, skipping {}", value);
            return false;
        }
        let measurement = Measurement::new(value);
        if !self.buffer.add(measurement) {
            // make room from the expired end before giving up
            aggregator::evict_expired(&self.buffer, measurement.timestamp(), self.window);
            if !self.buffer.add(measurement) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("service: buffer full, dropping {}", value);
                return false;
            }
        }
        self.dirty.store(true, Ordering::SeqCst);
        if self.publish_on_add {
            self.publish();
        }
        true
    }

    pub fn snapshot(&self) -> Statistics {
        aggregator::compute_snapshot(&self.buffer, Instant::now(), self.window)
    }

    fn publish(&self) -> bool {
        self.bus.publish_coalesced(Telemetry::Statistics(self.snapshot()))
    }

    fn tick(&self) {
        let dirty = self.dirty.swap(false, Ordering::SeqCst);
        // a non-empty window can still change as entries expire
        if dirty || !self.buffer.is_empty() {
            trace!("service: tick publishing");
            self.publish();
        }
    }
}

struct Scheduler {
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// sliding-window statistics over rate-limited measurements
pub struct Service {
    pipeline: Arc<Pipeline>,
    sender: Sender,
    controller: Mutex<Controller>,
    owns_bus: bool,
    shutdown_timeout: Duration,
    scheduler: Mutex<Option<Scheduler>>,
}

impl Service {
    /// Create a new Config which can be used to build() a Service
    ///
    /// # Example
    /// ```
    /// # use std::time::Duration;
    /// # use winstat::Service;
    /// let service = Service::configure(1024,
    ///                                  Duration::from_secs(1),
    ///                                  100,
    ///                                  Duration::from_secs(1),
    ///                                  Duration::from_millis(10))
    ///     .build()
    ///     .unwrap();
    /// service.add(42);
    /// assert_eq!(service.latest_statistics().mode(), 42);
    /// service.shutdown();
    /// ```
    pub fn configure(capacity: usize,
                     window: Duration,
                     max_ops: usize,
                     rate_window: Duration,
                     tick_period: Duration)
                     -> Config {
        Config::new(capacity, window, max_ops, rate_window, tick_period)
    }

    /// create a `Service` and the `EventBus` it publishes on
    pub fn configured(config: Config) -> Result<Service, Error> {
        config.validate()?;
        let bus = Arc::new(config.bus_config().build()?);
        Service::start(config, bus, true)
    }

    /// create a `Service` publishing on a bus owned elsewhere
    pub fn with_bus(config: Config, bus: Arc<EventBus<Telemetry>>) -> Result<Service, Error> {
        config.validate()?;
        Service::start(config, bus, false)
    }

    fn start(config: Config, bus: Arc<EventBus<Telemetry>>, owns_bus: bool) -> Result<Service, Error> {
        let pipeline = Arc::new(Pipeline {
            limiter: RateLimiter::new(config.max_ops, config.rate_window)?,
            buffer: WindowBuffer::new(config.capacity)?,
            window: config.window,
            bus: bus,
            publish_on_add: config.publish_on_add,
            dirty: AtomicBool::new(false),
            rejected: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        });

        let (control_tx, control_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let notice = ExitNotice::new(done_tx);
        let p = pipeline.clone();
        let period = config.tick_period;
        let handle = thread::Builder::new()
            .name("winstat-tick".to_owned())
            .spawn(move || {
                let _notice = notice;
                schedule(&p, period, &control_rx);
            });
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                error!("service: failed to start scheduler: {}", e);
                if owns_bus {
                    pipeline.bus.shutdown();
                }
                return Err(Error::from(e));
            }
        };
        debug!("service: started, window {:?}, tick {:?}", config.window, period);

        Ok(Service {
            sender: Sender::new(pipeline.clone()),
            pipeline: pipeline,
            controller: Mutex::new(Controller::new(control_tx)),
            owns_bus: owns_bus,
            shutdown_timeout: config.shutdown_timeout,
            scheduler: Mutex::new(Some(Scheduler {
                done: done_rx,
                handle: handle,
            })),
        })
    }

    /// record a measurement, returns false if it was rate limited or dropped
    pub fn add(&self, value: i64) -> bool {
        self.sender.send(value)
    }

    /// returns a clone of the `Sender`
    pub fn get_sender(&self) -> Sender {
        self.sender.clone()
    }

    /// returns a `Controller` for the aggregation loop
    pub fn get_controller(&self) -> Controller {
        lock(&self.controller).clone()
    }

    /// call `handler` with each published snapshot accepted by `filter`
    pub fn subscribe_for_statistics<F, H>(&self, filter: F, handler: H) -> Result<(), Error>
        where F: Fn(&Statistics) -> bool + Send + Sync + 'static,
              H: Fn(&Statistics) + Send + Sync + 'static
    {
        self.pipeline.bus.subscribe_filtered(TelemetryKind::Statistics,
                                             move |event| match *event {
                                                 Telemetry::Statistics(ref s) => filter(s),
                                             },
                                             move |event| match *event {
                                                 Telemetry::Statistics(ref s) => handler(s),
                                             })
    }

    /// call `handler` with every published snapshot
    pub fn subscribe<H>(&self, handler: H) -> Result<(), Error>
        where H: Fn(&Statistics) + Send + Sync + 'static
    {
        self.subscribe_for_statistics(|_| true, handler)
    }

    /// compute a snapshot of the window right now, bypassing the bus
    pub fn latest_statistics(&self) -> Statistics {
        self.pipeline.snapshot()
    }

    /// the bus snapshots are published on
    pub fn bus(&self) -> &Arc<EventBus<Telemetry>> {
        &self.pipeline.bus
    }

    /// measurements turned away by the rate limiter
    pub fn rejected(&self) -> usize {
        self.pipeline.rejected.load(Ordering::Relaxed)
    }

    /// admitted measurements lost to a full buffer
    pub fn dropped(&self) -> usize {
        self.pipeline.dropped.load(Ordering::Relaxed)
    }

    /// stop the scheduler, then the bus if this service created it
    ///
    /// each stage waits at most the configured shutdown timeout
    pub fn shutdown(&self) {
        let scheduler = match lock(&self.scheduler).take() {
            Some(scheduler) => scheduler,
            None => return,
        };
        let _ = lock(&self.controller).shutdown();
        if await_exits(&scheduler.done, 1, self.shutdown_timeout) > 0 {
            warn!("service: scheduler still running after {:?}, abandoning it",
                  self.shutdown_timeout);
        } else {
            let _ = scheduler.handle.join();
        }
        self.pipeline.limiter.shutdown();
        if self.owns_bus {
            self.pipeline.bus.shutdown();
        }
        debug!("service: shut down");
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn schedule(pipeline: &Pipeline, period: Duration, control: &Receiver<ControlMessage>) {
    trace!("service: scheduler running");
    while wait_for_control(control, period) == Wake::Run {
        pipeline.tick();
    }
    trace!("service: scheduler stopped");
}
