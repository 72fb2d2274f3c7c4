//! Error types for the DDNS system
//!
//! This module defines the error types shared by every crate in the
//! workspace. Scheduler misuse has its own types in [`crate::scheduler`].

use crate::address::AddressFamily;
use crate::traits::ProviderMessage;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// CIDR prefix length outside `0..=bit width`
    #[error("prefix length {prefix} is out of range for {family} (0..={width})")]
    PrefixOutOfRange {
        prefix: i64,
        family: AddressFamily,
        width: u32,
    },

    /// CIDR prefix length that is not a whole number
    #[error("prefix length must be an integer, got {0}")]
    NonIntegerPrefix(f64),

    /// Malformed address literal
    #[error("malformed address literal '{input}': {reason}")]
    AddressFormat { input: String, reason: String },

    /// Two operands (or a record and its literals) disagree on family
    #[error("address family mismatch: expected {expected}, got {actual}")]
    FamilyMismatch {
        expected: AddressFamily,
        actual: AddressFamily,
    },

    /// Public address lookup failed
    #[error("address lookup via {service} failed: {message}")]
    AddressLookup { service: String, message: String },

    /// Rename guard refused the update
    #[error(
        "record name change from '{current}' to '{expected}' is not allowed, update withheld"
    )]
    UnexpectedNameChange { current: String, expected: String },

    /// Provider answered with `success: false`
    #[error("{provider} rejected the request: {}", format_messages(.errors))]
    ProviderRejected {
        provider: String,
        errors: Vec<ProviderMessage>,
    },

    /// Provider-specific transport error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record definition in configuration is invalid
    #[error("record '{record}': {source}")]
    Record {
        record: String,
        #[source]
        source: Box<Error>,
    },

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn format_messages(errors: &[ProviderMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a malformed-literal error
    pub fn address_format(input: impl Into<String>, reason: impl ToString) -> Self {
        Self::AddressFormat {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an address lookup error
    pub fn address_lookup(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AddressLookup {
            service: service.into(),
            message: message.into(),
        }
    }

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

    /// True for failures that the next scheduled cycle may resolve on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AddressLookup { .. } | Self::Provider { .. } | Self::Http(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
