//! Error types for Dinedash
//!
//! This module defines the error types used throughout the crate, using
//! `thiserror` for ergonomic error handling.
//!
//! Two enums live here:
//!
//! - [`ApiError`] is returned by the authenticated client and its
//!   collaborators. It is `Clone` so a single refresh failure can be handed
//!   to every request waiting on that refresh.
//! - [`DinedashError`] covers application-level failures (configuration,
//!   storage setup, serialization) and flows through the [`Result`] alias.

use thiserror::Error;

/// Errors surfaced by [`crate::client::ApiClient`] and the auth layer
///
/// Callers can distinguish a transport failure from an authentication
/// failure from an error the backend reported itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response could be obtained (connection refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The credential refresh failed or the request was rejected again after
    /// a successful refresh. The session has been ended.
    #[error("Authentication refresh failed: {0}")]
    AuthRefreshFailed(String),

    /// The backend answered with a non-success status
    #[error("Backend error: status={status}, {body}")]
    Backend {
        /// HTTP status code returned by the backend
        status: u16,
        /// Raw response body, possibly empty
        body: String,
    },

    /// An access token is present but its expiry claim cannot be decoded
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// The credential store could not be read or written
    #[error("Credential store error: {0}")]
    Store(String),

    /// The request could not be built (bad path, invalid input)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for client operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Main error type for Dinedash application code
#[derive(Error, Debug)]
pub enum DinedashError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage setup errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Client-level failure bubbled up to the application
    #[error(transparent)]
    Api(#[from] ApiError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for Dinedash application operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
