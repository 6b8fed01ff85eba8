//! Unified error type.

use std::fmt;

/// A boxed, thread-safe error, as carried by request and response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by loupe's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding to a port, reading a request body off the
/// wire, or loading configuration.
#[derive(Debug)]
pub enum Error {
    /// Binding the listener or accepting a connection failed.
    Io(std::io::Error),
    /// Reading the request body from the transport failed.
    Body(BoxError),
    /// Configuration could not be extracted.
    Config(Box<figment::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Body(e) => write!(f, "body read: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Body(e) => Some(&**e),
            Self::Config(e) => Some(&**e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}
