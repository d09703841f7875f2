//! Error types for the dipper reconciler
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for dipper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dipper reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at startup only)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP errors (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a non-success status
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The provider accepted the request but rejected the value
    #[error("Rejected by {provider}: {response}")]
    Rejected {
        /// Provider name
        provider: String,
        /// Raw response body (trimmed)
        response: String,
    },

    /// No client registered for an account's provider type
    #[error("Unknown provider type: {0}")]
    UnknownProvider(String),

    /// A domain was configured twice
    #[error("Domain {0} is configured more than once")]
    DuplicateDomain(String),

    /// A network call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
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

    /// Create a protocol-level rejection
    pub fn rejected(provider: impl Into<String>, response: impl Into<String>) -> Self {
        Self::Rejected {
            provider: provider.into(),
            response: response.into(),
        }
    }

    /// Create an unknown provider error
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider(name.into())
    }

    /// Create a duplicate domain error
    pub fn duplicate_domain(domain: impl Into<String>) -> Self {
        Self::DuplicateDomain(domain.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Whether this error happened at startup and should stop the process
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DuplicateDomain(_) | Self::Toml(_) | Self::UnknownProvider(_)
        )
    }
}
