//! Error types for the Compute Engine REST backend.

use thiserror::Error;

use crate::backend::ProviderError;

/// Errors raised by the Compute Engine REST backend.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GceError {
    /// Raised for an HTTP 404 response.
    #[error("{resource} not found")]
    NotFound {
        /// Resource path that was requested.
        resource: String,
    },
    /// Raised for any other non-success response.
    #[error("request for {resource} failed with status {status}: {message}")]
    Api {
        /// Resource path that was requested.
        resource: String,
        /// HTTP status code.
        status: u16,
        /// Response body returned by the API.
        message: String,
    },
    /// Raised when the request never produced a response.
    #[error("request for {resource} could not be sent: {message}")]
    Transport {
        /// Resource path that was requested.
        resource: String,
        /// Transport error text.
        message: String,
    },
    /// Raised when a success response does not have the expected shape.
    #[error("response for {resource} could not be decoded: {message}")]
    Decode {
        /// Resource path that was requested.
        resource: String,
        /// Decoder error text.
        message: String,
    },
    /// Raised when a resource name cannot be used as a single path segment.
    #[error("invalid name {segment:?} in {resource}")]
    InvalidName {
        /// Resource path that was requested.
        resource: String,
        /// Offending segment.
        segment: String,
    },
    /// Raised when the configured endpoint is not a usable base URL.
    #[error("invalid API endpoint {endpoint}: {message}")]
    InvalidEndpoint {
        /// Configured endpoint.
        endpoint: String,
        /// Parser error text.
        message: String,
    },
}

impl ProviderError for GceError {
    fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
