//! Error status - whether an operation is worth retrying

use std::fmt;

/// How the caller should treat an error.
///
/// The engine never acts on this itself. It is a hint for the controller
/// sitting above it (an agent loop or an operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// Retrying will not help
    Permanent,
    /// Retrying may succeed (e.g. a flaky bus read or a busy server)
    Temporary,
}

impl ErrorStatus {
    /// Returns true if the operation may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorStatus::Temporary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::Permanent => "permanent",
            ErrorStatus::Temporary => "temporary",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ErrorStatus::Temporary.to_string(), "temporary");
        assert_eq!(ErrorStatus::Permanent.to_string(), "permanent");
    }

    #[test]
    fn test_only_temporary_is_retryable() {
        assert!(ErrorStatus::Temporary.is_retryable());
        assert!(!ErrorStatus::Permanent.is_retryable());
    }
}
