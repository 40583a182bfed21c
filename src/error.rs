//! Error types for the PDF library.
//!
//! This module defines all error types that can occur while reading or
//! writing PDF files.

/// Result type alias for PDF library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// `startxref` missing or pointing outside the buffer
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Cross-reference section without a trailer dictionary
    #[error("Cross-reference section at byte {0} has no trailer")]
    MissingTrailer(usize),

    /// `/Prev` chain longer than the configured limit (or circular)
    #[error("Cross-reference /Prev chain exceeded {0} sections")]
    XrefChainTooDeep(u32),

    /// Stream payload shorter than its declared `/Length`
    #[error("Stream at byte {offset} declares {declared} bytes but only {available} remain")]
    TruncatedStream {
        /// Offset of the first payload byte
        offset: usize,
        /// Declared `/Length`
        declared: usize,
        /// Bytes actually available
        available: usize,
    },

    /// Referenced object not found in the registry
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Writer used out of order (e.g. adding a page after finalization)
    #[error("Invalid writer state: {0}")]
    InvalidState(String),

    /// Authoring error detected during finalization
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A pool-local reference that was never rebased to an object number
    #[error("Unresolved pool reference: {0}")]
    UnresolvedReference(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(format!("{}", err).contains("10 0 R"));
    }

    #[test]
    fn test_truncated_stream_error() {
        let err = Error::TruncatedStream {
            offset: 40,
            declared: 100,
            available: 12,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("100"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
