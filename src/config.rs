use bus::{BusConfig, EventBus};
use data::Telemetry;
use error::Error;
use service::Service;
use std::sync::Arc;
use std::time::Duration;

/// a configuration struct for customizing a `Service`
///
/// the window, rate limit, and tick settings have no defaults and are given
/// to `Config::new`, the remaining knobs default to sensible values
#[derive(Clone, Debug)]
pub struct Config {
    pub capacity: usize,
    pub window: Duration,
    pub max_ops: usize,
    pub rate_window: Duration,
    pub tick_period: Duration,
    pub workers: usize,
    pub queue_capacity: usize,
    pub poll_delay: Duration,
    pub shutdown_timeout: Duration,
    pub publish_on_add: bool,
}

impl Config {
    /// create a new Config
    ///
    /// * `capacity` - buffer slots, at most `capacity - 1` measurements are held
    /// * `window` - how long a measurement stays in the statistics
    /// * `max_ops` - admissions allowed per `rate_window`
    /// * `rate_window` - horizon of the rate limiter
    /// * `tick_period` - cadence of aggregation and publishing
    ///
    /// # Example
    /// ```
    /// # use std::time::Duration;
    /// # use winstat::Config;
    /// let c = Config::new(1024,
    ///                     Duration::from_secs(1),
    ///                     100,
    ///                     Duration::from_secs(1),
    ///                     Duration::from_millis(10));
    /// ```
    pub fn new(capacity: usize,
               window: Duration,
               max_ops: usize,
               rate_window: Duration,
               tick_period: Duration)
               -> Config {
        let bus = BusConfig::default();
        Config {
            capacity: capacity,
            window: window,
            max_ops: max_ops,
            rate_window: rate_window,
            tick_period: tick_period,
            workers: bus.workers,
            queue_capacity: bus.queue_capacity,
            poll_delay: bus.poll_delay,
            shutdown_timeout: bus.shutdown_timeout,
            publish_on_add: false,
        }
    }

    /// set number of threads running subscribers: default 4
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// set capacity of the event bus queue: default 1024
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// set the idle poll delay of the bus threads: default 1ms
    pub fn poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// set how long each stage of `shutdown` may wait: default 1s
    ///
    /// # Example
    /// ```
    /// # use std::time::Duration;
    /// # use winstat::Config;
    /// let c = Config::new(64, Duration::from_secs(1), 10, Duration::from_secs(1),
    ///                     Duration::from_millis(10))
    ///     .shutdown_timeout(Duration::from_millis(250));
    /// ```
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// also aggregate and publish from `add`, not only on ticks: default false
    pub fn publish_on_add(mut self, enabled: bool) -> Self {
        self.publish_on_add = enabled;
        self
    }

    /// the `BusConfig` for a bus owned by the service
    pub fn bus_config(&self) -> BusConfig {
        BusConfig::new()
            .workers(self.workers)
            .queue_capacity(self.queue_capacity)
            .poll_delay(self.poll_delay)
            .shutdown_timeout(self.shutdown_timeout)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let zero = Duration::new(0, 0);
        if self.capacity < 2 {
            return Err(Error::InvalidArgument("buffer capacity must be at least 2"));
        }
        if self.window == zero {
            return Err(Error::InvalidArgument("window duration must be non-zero"));
        }
        if self.max_ops == 0 {
            return Err(Error::InvalidArgument("rate limit must admit at least 1 operation"));
        }
        if self.rate_window == zero {
            return Err(Error::InvalidArgument("rate window must be non-zero"));
        }
        if self.tick_period == zero {
            return Err(Error::InvalidArgument("tick period must be non-zero"));
        }
        self.bus_config().validate()
    }

    /// Build a new Service, with its own event bus, from the current configuration
    pub fn build(self) -> Result<Service, Error> {
        Service::configured(self)
    }

    /// Build a new Service publishing on a shared `bus`
    ///
    /// the service will not shut the bus down, that is left to its owner
    pub fn build_with_bus(self, bus: Arc<EventBus<Telemetry>>) -> Result<Service, Error> {
        Service::with_bus(self, bus)
    }
}
