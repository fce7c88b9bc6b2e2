mod histogram;
mod measurement;
mod statistics;
mod telemetry;

pub use self::histogram::Histogram;
pub use self::measurement::Measurement;
pub use self::statistics::Statistics;
pub use self::telemetry::{Telemetry, TelemetryKind};
