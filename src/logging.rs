//! Diagnostic logging for the binary.
//!
//! Logs go to stderr so stdout stays reserved for command output. The level
//! defaults to `info` and follows `RUST_LOG` when set.

use std::io;

use thiserror::Error;
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the global subscriber.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LoggingError {
    /// Raised when a global subscriber is already installed.
    #[error("unable to set the global logging subscriber: {0}")]
    TryInit(String),
}

/// Global logging setup.
#[derive(Clone, Copy, Debug)]
pub struct Logging;

impl Logging {
    /// Installs the stderr subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`LoggingError::TryInit`] when a subscriber is already set.
    pub fn try_init() -> Result<(), LoggingError> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_writer(io::stderr)
            .with_target(false)
            .try_init()
            .map_err(|err| LoggingError::TryInit(err.to_string()))
    }
}
