//! Error types for store operations.

use std::path::PathBuf;

/// Errors that can occur while opening, mutating, or flushing a store.
///
/// Unlike read-side cache misses, these are consistency errors: a store
/// that cannot be opened or written leaves the round unable to commit, so
/// they propagate to the caller and the round marker stays absent.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred while reading or writing a store file.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A store file exists but its header or payload is not valid.
    #[error("corrupt store file at {path}: {reason}")]
    Corrupt {
        /// The store file path.
        path: PathBuf,
        /// Description of what failed to validate.
        reason: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("store serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The store was used after `close`.
    #[error("store at {path} was used after close")]
    Closed {
        /// The store file path.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = StoreError::Io {
            path: PathBuf::from("/tmp/caches/symbols.bin"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let msg = err.to_string();
        assert!(msg.contains("store I/O error"));
        assert!(msg.contains("symbols.bin"));
    }

    #[test]
    fn corrupt_display() {
        let err = StoreError::Corrupt {
            path: PathBuf::from("sealed.bin"),
            reason: "bad magic".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("corrupt store file"));
        assert!(msg.contains("bad magic"));
    }

    #[test]
    fn closed_display() {
        let err = StoreError::Closed {
            path: PathBuf::from("lookups.bin"),
        };
        assert!(err.to_string().contains("after close"));
    }
}
