//! Unified error type for questgate
//!
//! Denials are not errors. A feature being switched off for a user is a normal
//! `false` decision; `GateError` is reserved for misconfiguration and for the
//! plumbing around the emergency configuration source.

use serde::{Deserialize, Serialize};

/// Unified error type for all questgate operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum GateError {
    /// A feature identifier that is not part of the catalogue
    #[error("Unknown feature: {feature}")]
    UnknownFeature {
        /// The identifier as it was supplied
        feature: String,
    },

    /// Invalid input
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Network or transport error while talking to a remote source
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl GateError {
    /// Create an unknown feature error
    pub fn unknown_feature(feature: impl Into<String>) -> Self {
        Self::UnknownFeature {
            feature: feature.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for errors that indicate a deployment bug rather than a runtime fault
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::UnknownFeature { .. } | Self::Config { .. })
    }
}

/// Standard Result type for questgate operations
pub type Result<T> = std::result::Result<T, GateError>;

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::config(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<toml::de::Error> for GateError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("invalid TOML: {err}"))
    }
}
