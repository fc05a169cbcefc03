//! Error types for Compute Engine calls.

use std::time::Duration;

use thiserror::Error;

use crate::compute::model::{ApiErrorBody, OperationError};
use crate::credentials::CredentialsError;

/// Errors raised while talking to the Compute Engine API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ComputeError {
    /// Raised when an access token cannot be obtained.
    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),
    /// Raised when the HTTP request itself fails.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Request URL.
        url: String,
        /// Message from the HTTP client.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("compute API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },
    /// Raised when a success response cannot be decoded.
    #[error("failed to decode {resource} response: {message}")]
    Decode {
        /// Resource being decoded (for example `operation`).
        resource: String,
        /// Decoder message.
        message: String,
    },
    /// Raised when a finished operation carries an error payload.
    #[error("operation {operation} failed: {errors}")]
    OperationFailed {
        /// Operation name.
        operation: String,
        /// Errors reported by the service.
        errors: OperationError,
    },
    /// Raised when an operation is still running once the wait deadline passes.
    #[error("timed out after {waited:?} waiting for operation {operation}")]
    OperationTimeout {
        /// Operation name.
        operation: String,
        /// Time spent waiting.
        waited: Duration,
    },
    /// Raised when an instance record lacks a field the parser relies on.
    #[error("malformed instance record: missing {field}")]
    MalformedResponse {
        /// Path of the missing field, for example `networkInterfaces[0]`.
        field: String,
    },
    /// Raised when the startup script cannot be loaded.
    #[error("failed to load startup script `{path}`: {message}")]
    StartupScript {
        /// Script path.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

impl ComputeError {
    pub(crate) fn malformed(field: impl Into<String>) -> Self {
        Self::MalformedResponse {
            field: field.into(),
        }
    }

    /// Builds an [`ComputeError::Api`] from a raw error response, preferring
    /// the message inside the standard error envelope.
    pub(crate) fn from_response(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ApiErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.error.message)
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        Self::Api { status, message }
    }
}
