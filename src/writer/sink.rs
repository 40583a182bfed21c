//! Byte sink with offset tracking.
//!
//! Every append goes through [`ByteSink`], which counts bytes as they are
//! written so the writer can record an object's offset simply by asking for
//! the current count before emitting its header.

use crate::error::Result;
use std::io::Write;

/// Fractional digits kept when writing reals.
const REAL_PRECISION: usize = 5;

/// Format a real number for PDF output.
///
/// Integral values are written without a fraction; other values keep at
/// most five fractional digits with trailing zeros trimmed. The formatting
/// is locale-independent.
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return format!("{}", value as i64);
    }
    let formatted = format!("{:.*}", REAL_PRECISION, value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Append-only output channel that tracks the number of bytes written.
#[derive(Debug)]
pub struct ByteSink<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> ByteSink<W> {
    /// Wrap a writer; the count starts at zero.
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Number of bytes written so far, i.e. the offset of the next byte.
    pub fn offset(&self) -> u64 {
        self.count
    }

    /// Append a string.
    pub fn append_str(&mut self, s: &str) -> Result<()> {
        self.append_bytes(s.as_bytes())
    }

    /// Append a single byte.
    pub fn append_byte(&mut self, byte: u8) -> Result<()> {
        self.append_bytes(&[byte])
    }

    /// Append a raw byte range.
    pub fn append_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.count += data.len() as u64;
        Ok(())
    }

    /// Append an integer in decimal.
    pub fn append_int(&mut self, value: i64) -> Result<()> {
        self.append_str(&value.to_string())
    }

    /// Append a real number with bounded precision.
    pub fn append_float(&mut self, value: f64) -> Result<()> {
        self.append_str(&format_real(value))
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ByteSink<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_every_append() {
        let mut sink = ByteSink::new(Vec::new());
        sink.append_str("%PDF-1.5\n").unwrap();
        assert_eq!(sink.offset(), 9);
        sink.append_byte(b'%').unwrap();
        sink.append_bytes(&[0xE2, 0xE3, 0xCF, 0xD3]).unwrap();
        sink.append_int(-42).unwrap();
        sink.append_float(0.5).unwrap();
        assert_eq!(sink.offset(), 9 + 1 + 4 + 3 + 3);
        let out = sink.finish().unwrap();
        assert_eq!(out.len(), 20);
    }

    #[test]
    fn test_write_trait_counts() {
        let mut sink = ByteSink::new(Vec::new());
        writeln!(sink, "{} 0 obj", 12).unwrap();
        assert_eq!(sink.offset(), 9);
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(1.0), "1");
        assert_eq!(format_real(612.0), "612");
        assert_eq!(format_real(0.5), "0.5");
        assert_eq!(format_real(-2.25), "-2.25");
        assert_eq!(format_real(1.0 / 3.0), "0.33333");
        assert_eq!(format_real(0.000001), "0");
        assert_eq!(format_real(-0.000001), "0");
        assert_eq!(format_real(f64::NAN), "0");
    }

    #[test]
    fn test_io_failure_is_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut sink = ByteSink::new(Broken);
        assert!(sink.append_str("x").is_err());
        assert_eq!(sink.offset(), 0);
    }
}
