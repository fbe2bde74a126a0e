//! Error types and handling for EvHub
//!
//! The decision core never lets these escape a tick; they exist so ports,
//! configuration and session bookkeeping can report what went wrong and the
//! controller can log it before holding its previous state.

use thiserror::Error;

/// Result type alias for EvHub operations
pub type Result<T> = std::result::Result<T, EvHubError>;

/// Main error type for EvHub
#[derive(Debug, Error)]
pub enum EvHubError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// A sensor port could not produce a reading
    #[error("Sensor error: {message}")]
    Sensor { message: String },

    /// A charger adapter command failed
    #[error("Charger error: {message}")]
    Charger { message: String },

    /// Session bookkeeping errors
    #[error("Session error: {message}")]
    Session { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl EvHubError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new sensor error
    pub fn sensor<S: Into<String>>(message: S) -> Self {
        Self::Sensor {
            message: message.into(),
        }
    }

    /// Create a new charger error
    pub fn charger<S: Into<String>>(message: S) -> Self {
        Self::Charger {
            message: message.into(),
        }
    }

    /// Create a new session error
    pub fn session<S: Into<String>>(message: S) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for EvHubError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for EvHubError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EvHubError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = EvHubError::config("test config error");
        assert!(matches!(err, EvHubError::Config { .. }));

        let err = EvHubError::charger("adapter unreachable");
        assert!(matches!(err, EvHubError::Charger { .. }));

        let err = EvHubError::validation("field", "test validation error");
        assert!(matches!(err, EvHubError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = EvHubError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = EvHubError::validation("hub.non_hours", "hour 24 out of range");
        assert_eq!(
            format!("{}", err),
            "Validation error: hub.non_hours - hour 24 out of range"
        );
    }
}
