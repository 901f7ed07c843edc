//! Delivery errors.

use thiserror::Error;

pub type SendResult<T> = Result<T, SendError>;

/// Why a message could not be handed to an observer.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Observer connection closed")]
    Closed,

    #[error("Send deadline of {0} ms passed")]
    TimedOut(u64),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SendError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            SendError::Closed => "closed",
            SendError::TimedOut(_) => "timeout",
            SendError::Serialize(_) => "serialize",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels() {
        assert_eq!(SendError::Closed.reason(), "closed");
        let timed_out = SendError::TimedOut(2000);
        assert_eq!(timed_out.reason(), "timeout");
        assert_eq!(timed_out.to_string(), "Send deadline of 2000 ms passed");
    }
}
