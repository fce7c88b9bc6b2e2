#[macro_use]
extern crate log;

use log::{LogLevel, LogLevelFilter, LogMetadata, LogRecord};

extern crate getopts;
extern crate rand;
extern crate time;
extern crate winstat;

use getopts::{Matches, Options};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use winstat::{Sender, Service, WeightedSampler};

struct Generator {
    stats: Sender,
    values: WeightedSampler,
    running: Arc<AtomicBool>,
    sent: Arc<AtomicUsize>,
}

impl Generator {
    fn new(stats: Sender,
           values: WeightedSampler,
           running: Arc<AtomicBool>,
           sent: Arc<AtomicUsize>)
           -> Generator {
        Generator {
            stats: stats,
            values: values,
            running: running,
            sent: sent,
        }
    }

    fn run(&mut self) {
        let mut rng = rand::thread_rng();
        while self.running.load(Ordering::Relaxed) {
            if self.stats.send(self.values.sample_with(&mut rng)) {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

pub struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &LogMetadata) -> bool {
        metadata.level() <= LogLevel::Trace
    }

    fn log(&self, record: &LogRecord) {
        if self.enabled(record.metadata()) {
            let now = time::strftime("%Y-%m-%d %H:%M:%S", &time::now()).unwrap_or_default();
            println!("{} {:<5} [{}] {}",
                     now,
                     record.level().to_string(),
                     "benchmark",
                     record.args());
        }
    }
}

fn set_log_level(level: usize) {
    let log_filter;
    match level {
        0 => {
            log_filter = LogLevelFilter::Info;
        }
        1 => {
            log_filter = LogLevelFilter::Debug;
        }
        _ => {
            log_filter = LogLevelFilter::Trace;
        }
    }
    let _ = log::set_logger(|max_log_level| {
        max_log_level.set(log_filter);
        Box::new(SimpleLogger)
    });
}

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt("p", "producers", "number of producers", "INTEGER");
    opts.optopt("d", "duration", "seconds to run for", "INTEGER");
    opts.optopt("r", "rate", "measurements admitted per second", "INTEGER");
    opts.optopt("w", "window", "statistics window in milliseconds", "INTEGER");
    opts.optopt("c", "capacity", "window buffer capacity", "INTEGER");
    opts.optflagmulti("v", "verbose", "verbosity (stacking)");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn parse_opt<T>(matches: &Matches, name: &str, default: T) -> Result<T, String>
    where T: FromStr,
          T::Err: Display
{
    match matches.opt_str(name) {
        Some(v) => v.parse().map_err(|e| format!("bad value for --{}: {}", name, e)),
        None => Ok(default),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let program = &args[0];

    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            println!("Failed to parse command line args: {}", f);
            return;
        }
    };

    if matches.opt_present("help") {
        print_usage(program, opts);
        return;
    }
    set_log_level(matches.opt_count("verbose"));
    info!("winstat benchmark");

    let settings = (parse_opt(&matches, "producers", 1usize),
                    parse_opt(&matches, "duration", 10u64),
                    parse_opt(&matches, "rate", 100_000usize),
                    parse_opt(&matches, "window", 1_000u64),
                    parse_opt(&matches, "capacity", 131_072usize));
    let (producers, duration, rate, window, capacity) = match settings {
        (Ok(p), Ok(d), Ok(r), Ok(w), Ok(c)) => (p, d, r, w, c),
        (p, d, r, w, c) => {
            for e in vec![p.err(), d.err(), r.err(), w.err(), c.err()]
                .into_iter()
                .filter_map(|e| e) {
                error!("{}", e);
            }
            return;
        }
    };

    info!("producers: {} duration: {}s rate: {}/s window: {}ms capacity: {}",
          producers,
          duration,
          rate,
          window,
          capacity);

    let service = match Service::configure(capacity,
                                           Duration::from_millis(window),
                                           rate,
                                           Duration::from_secs(1),
                                           Duration::from_millis(100))
        .build() {
        Ok(service) => service,
        Err(e) => {
            error!("failed to start service: {}", e);
            return;
        }
    };

    let subscribed = service.subscribe(|s| {
        info!("count: {} mean: {:.2} mode: {} p50: {} p90: {} p99: {}",
              s.count(),
              s.mean(),
              s.mode(),
              s.percentile(50.0),
              s.percentile(90.0),
              s.percentile(99.0));
    });
    if let Err(e) = subscribed {
        error!("failed to subscribe: {}", e);
        return;
    }

    // a skewed latency-like distribution
    let values = match WeightedSampler::new(vec![(1, 50.0),
                                                 (2, 25.0),
                                                 (5, 15.0),
                                                 (10, 7.0),
                                                 (100, 2.0),
                                                 (1000, 1.0)]) {
        Ok(values) => values,
        Err(e) => {
            error!("bad value distribution: {}", e);
            return;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let sent = Arc::new(AtomicUsize::new(0));
    let t0 = Instant::now();
    let handles: Vec<_> = (0..producers)
        .map(|_| {
            let mut generator = Generator::new(service.get_sender(),
                                               values.clone(),
                                               running.clone(),
                                               sent.clone());
            thread::spawn(move || generator.run())
        })
        .collect();

    thread::sleep(Duration::from_secs(duration));
    running.store(false, Ordering::Relaxed);
    for handle in handles {
        let _ = handle.join();
    }
    let elapsed = t0.elapsed();
    let seconds = elapsed.as_secs() as f64 + elapsed.subsec_nanos() as f64 / 1e9;

    info!("accepted: {} ({:.0}/s) rejected: {} dropped: {}",
          sent.load(Ordering::Relaxed),
          sent.load(Ordering::Relaxed) as f64 / seconds,
          service.rejected(),
          service.dropped());
    info!("bus delivered: {} failed: {}",
          service.bus().delivered(),
          service.bus().failed());
    service.shutdown();
}
