use thiserror::Error;

/// Errors that can occur during key/value store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("Key/value backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("Key/value operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KvError {
    /// Returns true when the backend could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

impl From<serde_json::Error> for KvError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for key/value operations.
pub type Result<T> = std::result::Result<T, KvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_unavailable_display() {
        let error = KvError::BackendUnavailable("connection refused".to_string());
        assert_eq!(
            error.to_string(),
            "Key/value backend unavailable: connection refused"
        );
        assert!(error.is_unavailable());
    }

    #[test]
    fn test_operation_failed_display() {
        let error = KvError::OperationFailed("value is not an integer".to_string());
        assert_eq!(
            error.to_string(),
            "Key/value operation failed: value is not an integer"
        );
        assert!(!error.is_unavailable());
    }

    #[test]
    fn test_serialization_from_serde_json() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let error = KvError::from(err);
        assert!(matches!(error, KvError::Serialization(_)));
    }
}
