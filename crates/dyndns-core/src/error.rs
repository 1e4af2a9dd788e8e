//! Error types for the dyndns updater
//!
//! Every fallible operation in the workspace returns [`Result`]. The IP
//! resolver is the one component that never surfaces an error; everything
//! provider-related ends up here.

use thiserror::Error;

/// Result type alias for dyndns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dyndns updater
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing or malformed settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider rejected the credentials or lacks permissions
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider rate limit hit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from configuration rather than a remote call
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
