use bus::Event;
use data::Statistics;

/// events carried on the statistics bus
#[derive(Clone, Debug, PartialEq)]
pub enum Telemetry {
    /// a fresh snapshot of the sliding window
    Statistics(Statistics),
}

/// the tag subscribers register against
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TelemetryKind {
    Statistics,
}

impl Event for Telemetry {
    type Kind = TelemetryKind;

    fn kind(&self) -> TelemetryKind {
        match *self {
            Telemetry::Statistics(_) => TelemetryKind::Statistics,
        }
    }
}
