//! Closed error taxonomy shared by every crate boundary.

use serde::{Deserialize, Serialize};

/// The category an error falls into.
///
/// Each crate error exposes a `kind()` so that boundaries (HTTP mapping,
/// trigger handlers, the saga coordinator) can decide between reporting a
/// structured failure and re-raising for retry without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or missing input. Never retried.
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// A conditional stock guard failed.
    InsufficientStock,
    /// A create collided with an existing record.
    Conflict,
    /// Store or bus unavailable. The invoking trigger may retry.
    Transient,
}

impl ErrorKind {
    /// Returns true if the invoking trigger should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Transient => "TRANSIENT",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::InsufficientStock.is_retryable());
        assert!(!ErrorKind::Conflict.is_retryable());
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(ErrorKind::InsufficientStock.to_string(), "INSUFFICIENT_STOCK");
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"NOT_FOUND\"");
    }
}
