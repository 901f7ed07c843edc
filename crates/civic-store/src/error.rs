//! Error types for record persistence.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Check if a read can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Unavailable(_))
    }

    /// Check if an append can be retried without duplicating or tearing a
    /// record.
    ///
    /// Sinks raise `Unavailable` only before anything reaches storage. An `Io`
    /// failure may follow a partial write, so it is final for appends.
    pub fn is_retryable_append(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(StoreError::unavailable("down").is_retryable());
        assert!(StoreError::Io(std::io::Error::other("disk")).is_retryable());
        assert!(!StoreError::rejected("bad").is_retryable());

        assert!(StoreError::unavailable("down").is_retryable_append());
        assert!(!StoreError::Io(std::io::Error::other("disk")).is_retryable_append());
        assert!(!StoreError::rejected("bad").is_retryable_append());
    }
}
