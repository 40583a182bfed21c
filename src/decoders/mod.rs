//! Stream codec.
//!
//! Streams advertise their encoding through `/Filter` (a name or an array of
//! names, applied in order) and `/DecodeParms` (a dictionary, or an array
//! parallel to the filters). Only FlateDecode is supported, optionally
//! followed by a row predictor; any other filter is reported as
//! [`Error::UnsupportedFilter`] so callers can keep the raw bytes.

use crate::error::{Error, Result};
use crate::object::{value_end, Dict, Token};
use crate::parser_config::ReaderOptions;

mod flate;
mod predictor;

pub use flate::{deflate, inflate, FlateDecoder};
pub use predictor::{decode_predictor, encode_png_predictor, DecodeParams, PngPredictor};

/// Trait for stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as it appears in `/Filter`.
    fn name(&self) -> &str;
}

/// Filter names listed by a stream dictionary, in application order.
pub fn stream_filters(dict: &Dict) -> Vec<String> {
    match dict.get("Filter") {
        Some(value) => value
            .iter()
            .filter_map(Token::as_name)
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Predictor parameters attached to the filter at `index`, if any.
fn filter_params(dict: &Dict, index: usize) -> Option<DecodeParams> {
    let value = dict.get("DecodeParms")?;
    let parms = match value.first()? {
        Token::DictOpen => Dict::from_tokens(value.to_vec()),
        Token::ArrayOpen => {
            let mut pos = 1;
            let mut nth = 0;
            loop {
                let end = value_end(value, pos);
                if pos >= value.len() - 1 || end <= pos {
                    return None;
                }
                if nth == index {
                    break Dict::from_tokens(value[pos..end].to_vec());
                }
                nth += 1;
                pos = end;
            }
        },
        _ => return None,
    };
    if !parms.is_dict() {
        return None;
    }
    let int = |key: &str, default: i64| parms.get_int(key).unwrap_or(default);
    Some(DecodeParams {
        predictor: int("Predictor", 1),
        columns: int("Columns", 1).max(1) as usize,
        colors: int("Colors", 1).max(1) as usize,
        bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
    })
}

/// Decode a stream payload according to its dictionary.
///
/// Unfiltered payloads are returned as-is.
pub fn decode_stream(dict: &Dict, data: &[u8], options: &ReaderOptions) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for (index, filter) in stream_filters(dict).iter().enumerate() {
        let decoder = match filter.as_str() {
            "FlateDecode" | "Fl" => FlateDecoder::with_limit(options.max_decompressed_size),
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        };
        current = decoder.decode(&current)?;

        if options.max_decompression_ratio > 0 && !data.is_empty() {
            let ratio = current.len() as u64 / data.len() as u64;
            if ratio > options.max_decompression_ratio as u64 {
                return Err(Error::Decode(format!(
                    "Decompression ratio {}:1 exceeds limit {}:1",
                    ratio, options.max_decompression_ratio
                )));
            }
        }

        if let Some(params) = filter_params(dict, index) {
            if params.predictor != 1 {
                current = decode_predictor(&current, &params)?;
            }
        }
    }
    Ok(current)
}
