//! Error types for credential loading and token exchange.

use thiserror::Error;

/// Errors raised while loading credentials or fetching access tokens.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CredentialsError {
    /// Raised when the key file cannot be read.
    #[error("failed to read service account key `{path}`: {message}")]
    Read {
        /// Key file path.
        path: String,
        /// Underlying I/O message.
        message: String,
    },
    /// Raised when the key file is not a usable service account key.
    #[error("invalid service account key `{origin}`: {message}")]
    InvalidKey {
        /// Where the key came from (a path or `<inline>`).
        origin: String,
        /// Parser message.
        message: String,
    },
    /// Raised when the JWT assertion cannot be signed.
    #[error("failed to sign token assertion: {0}")]
    Signing(String),
    /// Raised when the token endpoint cannot be reached.
    #[error("token request to {url} failed: {message}")]
    Transport {
        /// Token endpoint URL.
        url: String,
        /// Message from the HTTP client.
        message: String,
    },
    /// Raised when the token endpoint refuses the assertion.
    #[error("token endpoint rejected the assertion ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error description returned by the endpoint.
        message: String,
    },
}
