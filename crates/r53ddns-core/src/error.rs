//! Error types for the r53ddns agent
//!
//! Only two kinds of error are allowed to reach the process entry point:
//! [`Error::Config`] and [`Error::NoMatchingRecords`] on the very first
//! fetch. Everything else is logged where it is detected and replaced by a
//! safe fallback.

use thiserror::Error;

/// Result type alias for r53ddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the r53ddns agent
#[derive(Error, Debug)]
pub enum Error {
    /// Required setting missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// No zones or address records matched the configured hostnames
    #[error("No matching DNS records: {0}")]
    NoMatchingRecords(String),

    /// Public IP lookup failure
    #[error("IP lookup error: {0}")]
    IpLookup(String),

    /// DNS record client failure
    #[error("DNS client error: {0}")]
    DnsClient(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a zero-match error
    pub fn no_matching_records(msg: impl Into<String>) -> Self {
        Self::NoMatchingRecords(msg.into())
    }

    /// Create an IP lookup error
    pub fn ip_lookup(msg: impl Into<String>) -> Self {
        Self::IpLookup(msg.into())
    }

    /// Create a DNS client error
    pub fn dns_client(msg: impl Into<String>) -> Self {
        Self::DnsClient(msg.into())
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

    /// Whether this error must stop the agent from starting
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::NoMatchingRecords(_))
    }
}
