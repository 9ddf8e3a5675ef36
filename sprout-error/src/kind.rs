//! Error kinds for sprout operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on ErrorKind to decide whether to retry, alert, or
/// abstain from watering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// A blocking wait was cut short before it completed
    Interrupted,

    // =========================================================================
    // Hardware errors
    // =========================================================================
    /// The raw voltage read primitive failed
    SensorReadFailed,

    /// A voltage reading cannot be classified (non-finite or outside calibration)
    SensorOutOfRange,

    /// The motor could not be switched
    MotorFailed,

    // =========================================================================
    // Persistence errors
    // =========================================================================
    /// The last-watered record could not be written
    PersistenceWriteFailed,

    /// The last-watered record exists but could not be read or parsed
    PersistenceLoadFailed,

    // =========================================================================
    // Tool errors
    // =========================================================================
    /// No tool registered under the requested name
    ToolUnknown,

    // =========================================================================
    // Inference/LLM errors
    // =========================================================================
    /// LLM inference failed
    InferenceFailed,

    /// Rate limit exceeded
    RateLimited,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input
    ParseFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::Interrupted => "Interrupted",

            // Hardware
            ErrorKind::SensorReadFailed => "SensorReadFailed",
            ErrorKind::SensorOutOfRange => "SensorOutOfRange",
            ErrorKind::MotorFailed => "MotorFailed",

            // Persistence
            ErrorKind::PersistenceWriteFailed => "PersistenceWriteFailed",
            ErrorKind::PersistenceLoadFailed => "PersistenceLoadFailed",

            // Tools
            ErrorKind::ToolUnknown => "ToolUnknown",

            // Inference
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::RateLimited => "RateLimited",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            // Parse
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::SensorReadFailed
                | ErrorKind::InferenceFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::SensorReadFailed.to_string(), "SensorReadFailed");
        assert_eq!(
            ErrorKind::PersistenceWriteFailed.to_string(),
            "PersistenceWriteFailed"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::SensorReadFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::SensorOutOfRange.is_retryable());
        assert!(!ErrorKind::PersistenceWriteFailed.is_retryable());
    }
}
