//! sliding-window statistics over a stream of rate-limited measurements
//!
//! # Features
//!
//! * rate limiting - a trailing-window limiter guards ingestion
//! * bounded memory - measurements live in a fixed-capacity ring
//! * sliding window - statistics only cover measurements younger than the window
//! * statistics - mean, mode and percentiles from a per-value histogram
//! * event bus - snapshots are fanned out to filtered subscribers on a worker pool
//! * coalescing - a snapshot equal to the last one published is not delivered again
//!
//! # Usage
//!
//! Add `winstat` to your `Cargo.toml`
//!
//! ```toml
//! [dependencies]
//! winstat = "*"
//! ```
//!
//! and to your crate root
//!
//! ```rust
//! extern crate winstat;
//! ```
//!
//! # Example: Service Mode
//!
//! This example shows how to use `winstat` in a long-running service
//!
//! ```rust
//! use std::thread;
//! use std::time::Duration;
//! use winstat::Service;
//!
//! // keep one second of measurements, admit at most 1000 per second, and
//! // publish changed statistics every 10ms
//! let service = Service::configure(4096,
//!                                  Duration::from_secs(1),
//!                                  1000,
//!                                  Duration::from_secs(1),
//!                                  Duration::from_millis(10))
//!     .build()
//!     .unwrap();
//!
//! // be told about every snapshot with a high mean
//! service.subscribe_for_statistics(|s| s.mean() > 100.0,
//!                                   |s| println!("p99: {}", s.percentile(99.0)))
//!     .unwrap();
//!
//! // get a sender for the producer threads
//! let sender = service.get_sender();
//! let producer = thread::spawn(move || for i in 0..100 {
//!     sender.send(i);
//! });
//! producer.join().unwrap();
//!
//! // statistics can also be read directly
//! assert_eq!(service.latest_statistics().count(), 100);
//! service.shutdown();
//! ```
#![cfg_attr(feature = "cargo-clippy", deny(missing_docs))]
#![cfg_attr(feature = "cargo-clippy", deny(warnings))]
#![cfg_attr(feature = "benchmark", feature(test))]
#[cfg(feature = "benchmark")]
extern crate test;

extern crate fnv;
#[macro_use]
extern crate log;
extern crate mpmc;
extern crate rand;

mod aggregator;
mod buffer;
mod bus;
mod common;
mod config;
mod controller;
mod data;
mod error;
mod limiter;
mod sampler;
mod sender;
mod service;

pub use aggregator::{compute_snapshot, evict_expired};
pub use buffer::WindowBuffer;
pub use bus::{BusConfig, Event, EventBus};
pub use common::{Admission, ControlMessage};
pub use config::Config;
pub use controller::Controller;
pub use data::{Histogram, Measurement, Statistics, Telemetry, TelemetryKind};
pub use error::Error;
pub use limiter::{Notifier, RateLimiter};
pub use sampler::WeightedSampler;
pub use sender::Sender;
pub use service::Service;
