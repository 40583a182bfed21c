//! Reader configuration options.
//!
//! Controls how tolerant the reader is of malformed input and how much
//! work a single file may cause.

use serde::{Deserialize, Serialize};

/// Options for reading a PDF buffer.
///
/// Structural failures (an unresolvable `startxref`, a missing trailer, a
/// declared stream length past the end of the buffer) are fatal in every
/// mode. These options only govern the recoverable anomalies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Reject an object whose `n g obj` header disagrees with the
    /// cross-reference entry that located it.
    pub strict: bool,

    /// Accept object bodies that run into the next object without `endobj`.
    pub allow_missing_endobj: bool,

    /// Maximum number of cross-reference sections followed through `/Prev`
    /// (and `/XRefStm`) before giving up.
    pub max_prev_chain: u32,

    /// Maximum size of a single decoded stream, in bytes (0 = unlimited).
    pub max_decompressed_size: usize,

    /// Maximum decoded-to-encoded size ratio (0 = unlimited).
    pub max_decompression_ratio: u32,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ReaderOptions {
    /// Strict reading: any anomaly is an error.
    pub fn strict() -> Self {
        Self {
            strict: true,
            allow_missing_endobj: false,
            max_prev_chain: 100,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
            max_decompression_ratio: 100,
        }
    }

    /// Lenient reading: recoverable anomalies are logged and skipped.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            allow_missing_endobj: true,
            max_prev_chain: 100,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
            max_decompression_ratio: 1000,
        }
    }

    /// Set the `/Prev` chain limit.
    pub fn with_max_prev_chain(mut self, limit: u32) -> Self {
        self.max_prev_chain = limit;
        self
    }

    /// Set the decoded stream size limit.
    pub fn with_max_decompressed_size(mut self, limit: usize) -> Self {
        self.max_decompressed_size = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mode() {
        let opts = ReaderOptions::strict();
        assert!(opts.strict);
        assert!(!opts.allow_missing_endobj);
        assert_eq!(opts.max_prev_chain, 100);
    }

    #[test]
    fn test_lenient_is_default() {
        let opts = ReaderOptions::default();
        assert!(!opts.strict);
        assert!(opts.allow_missing_endobj);
        assert_eq!(opts, ReaderOptions::lenient());
    }

    #[test]
    fn test_builders() {
        let opts = ReaderOptions::strict()
            .with_max_prev_chain(3)
            .with_max_decompressed_size(1024);
        assert_eq!(opts.max_prev_chain, 3);
        assert_eq!(opts.max_decompressed_size, 1024);
    }
}
