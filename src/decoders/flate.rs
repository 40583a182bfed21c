//! FlateDecode (zlib/deflate) implementation.
//!
//! Uses the flate2 crate in both directions. Decoding is strict: a corrupt
//! stream is an error for that object, never a partially recovered buffer.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

/// FlateDecode filter implementation.
///
/// `max_output` caps the decoded size (0 = unlimited). A stream that ends
/// before its final deflate block is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateDecoder {
    /// Maximum decoded size in bytes (0 = unlimited)
    pub max_output: usize,
}

impl FlateDecoder {
    /// Decoder with an output size cap.
    pub fn with_limit(max_output: usize) -> Self {
        Self { max_output }
    }
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut inflater = Decompress::new(true);
        let mut output = Vec::with_capacity(input.len().saturating_mul(4).clamp(64, 1 << 20));
        loop {
            if output.len() == output.capacity() {
                output.reserve(output.capacity().max(4096));
            }
            let consumed = inflater.total_in() as usize;
            let produced = inflater.total_out();
            let status = inflater
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::None)
                .map_err(|e| Error::Decode(format!("FlateDecode failed: {}", e)))?;

            if self.max_output > 0 && output.len() > self.max_output {
                return Err(Error::Decode(format!(
                    "Decoded stream exceeds limit of {} bytes",
                    self.max_output
                )));
            }
            match status {
                Status::StreamEnd => return Ok(output),
                Status::Ok | Status::BufError => {
                    let stalled = inflater.total_in() as usize == consumed && inflater.total_out() == produced;
                    if stalled && output.len() < output.capacity() {
                        return Err(Error::Decode(format!(
                            "FlateDecode: stream truncated after {} input bytes",
                            consumed
                        )));
                    }
                },
            }
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Compress `data` with zlib at the default level.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a zlib stream with no size limit.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    FlateDecoder::default().decode(data)
}
