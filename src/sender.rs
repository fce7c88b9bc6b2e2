use service::Pipeline;
use std::sync::Arc;

/// a Sender records measurements into a `Service`, it is clonable for sharing
/// between producer threads
#[derive(Clone)]
pub struct Sender {
    pipeline: Arc<Pipeline>,
}

impl Sender {
    pub(crate) fn new(pipeline: Arc<Pipeline>) -> Sender {
        Sender { pipeline: pipeline }
    }

    #[inline]
    /// record `value`, returns false if it was rate limited or dropped
    pub fn send(&self, value: i64) -> bool {
        self.pipeline.record(value)
    }
}
