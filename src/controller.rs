use common::ControlMessage;
use error::Error;
use std::sync::mpsc;

/// a `Controller` steers the aggregation loop of a `Service` from any thread
#[derive(Clone)]
pub struct Controller {
    control_tx: mpsc::Sender<ControlMessage>,
}

impl Controller {
    pub fn new(control_tx: mpsc::Sender<ControlMessage>) -> Controller {
        Controller { control_tx: control_tx }
    }

    /// run an aggregation tick now rather than at the next period
    ///
    /// fails once the loop has stopped
    pub fn flush(&self) -> Result<(), Error> {
        self.send(ControlMessage::Flush)
    }

    /// ask the loop to stop, does not wait for it
    pub fn shutdown(&self) -> Result<(), Error> {
        self.send(ControlMessage::Shutdown)
    }

    fn send(&self, msg: ControlMessage) -> Result<(), Error> {
        match self.control_tx.send(msg) {
            Ok(()) => Ok(()),
            Err(_) => {
                debug!("controller: loop has already stopped");
                Err(Error::Shutdown)
            }
        }
    }
}
