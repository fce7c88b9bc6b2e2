use std::error;
use std::fmt;
use std::io;

/// errors surfaced to callers, all of them at configuration time
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// a constructor or setter was given a value it cannot work with
    InvalidArgument(&'static str),
    /// the component has been shut down and accepts no new registrations
    Shutdown,
    /// a background thread could not be started
    Spawn(io::ErrorKind),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Spawn(e.kind())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidArgument(reason) => write!(f, "invalid argument: {}", reason),
            Error::Shutdown => write!(f, "already shut down"),
            Error::Spawn(kind) => write!(f, "failed to spawn thread: {:?}", kind),
        }
    }
}

impl error::Error for Error {}
