//! Error types.

/// Errors raised by queue, storage and pool operations.
///
/// Routine conditions (queue full on `try_add`, queue empty on
/// `try_dequeue`) are reported through `Option`/counts instead.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue full: requested {requested}, free {free}")]
    Full { requested: usize, free: usize },
    #[error("queue underflow: requested {requested}, available {available}")]
    Underflow { requested: usize, available: usize },
    #[error("config: {0}")]
    Config(String),
    #[error("pool: {0}")]
    Pool(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueueError::Full {
            requested: 4,
            free: 3,
        };
        assert_eq!(err.to_string(), "queue full: requested 4, free 3");

        let err = QueueError::Underflow {
            requested: 4,
            available: 3,
        };
        assert_eq!(err.to_string(), "queue underflow: requested 4, available 3");

        assert_eq!(QueueError::config("bad").to_string(), "config: bad");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "mmap");
        let err: QueueError = io.into();
        assert!(matches!(err, QueueError::Io(_)));
    }
}
