//! Row predictors for PDF stream decoding.
//!
//! Flate streams (cross-reference streams in particular) may have their rows
//! passed through a PNG (10-15) or TIFF (2) predictor before compression.
//! Decoding is a fold over the rows: every row is reconstructed from its
//! encoded bytes and the previously reconstructed row.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// PNG row filter types, as carried in each row's leading tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PngPredictor {
    /// No prediction (tag 0)
    None = 0,
    /// Difference from the byte to the left (tag 1)
    Sub = 1,
    /// Difference from the same column of the previous row (tag 2)
    Up = 2,
    /// Difference from the average of left and above (tag 3)
    Average = 3,
    /// Paeth predictor (tag 4)
    Paeth = 4,
}

impl PngPredictor {
    /// Filter type for a row tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Sub),
            2 => Some(Self::Up),
            3 => Some(Self::Average),
            4 => Some(Self::Paeth),
            _ => None,
        }
    }

    /// `/Predictor` value advertising this filter for every row.
    pub fn predictor_value(self) -> i64 {
        10 + self as i64
    }
}

/// `/DecodeParms` entries relevant to predictors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of samples per row
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Parameters for a cross-reference stream whose rows are `columns` bytes wide.
    pub fn for_columns(predictor: i64, columns: usize) -> Self {
        Self {
            predictor,
            columns,
            ..Default::default()
        }
    }

    /// Bytes of sample data per row (without the PNG tag byte).
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete sample, at least one.
    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

/// Decode TIFF Predictor 2 (8-bit samples): each sample is the difference
/// from the sample to its left in the same row.
fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    if row_len == 0 || data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }
    let bpp = params.bytes_per_pixel();
    let mut output = Vec::with_capacity(data.len());
    for row in data.chunks(row_len) {
        let start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { output[start + i - bpp] } else { 0 };
            output.push(byte.wrapping_add(left));
        }
    }
    Ok(output)
}

/// Decode PNG predictors. Every row begins with its own filter tag.
fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let stride = row_len + 1;
    if row_len == 0 || data.len() % stride != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            stride
        )));
    }
    let bpp = params.bytes_per_pixel();

    let (output, _) = data.chunks(stride).try_fold(
        (Vec::with_capacity(data.len() / stride * row_len), vec![0u8; row_len]),
        |(mut output, prev), encoded| {
            let filter = PngPredictor::from_tag(encoded[0])
                .ok_or_else(|| Error::Decode(format!("Invalid PNG predictor tag: {}", encoded[0])))?;
            let row = unfilter_row(filter, &encoded[1..], &prev, bpp);
            output.extend_from_slice(&row);
            Ok::<_, Error>((output, row))
        },
    )?;
    Ok(output)
}

fn unfilter_row(filter: PngPredictor, encoded: &[u8], prev: &[u8], bpp: usize) -> Vec<u8> {
    let mut row: Vec<u8> = Vec::with_capacity(encoded.len());
    for (i, &byte) in encoded.iter().enumerate() {
        let left = if i >= bpp { row[i - bpp] } else { 0 };
        let up = prev[i];
        let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
        row.push(byte.wrapping_add(prediction(filter, left, up, up_left)));
    }
    row
}

/// Apply a PNG predictor to raw rows, tagging every row with `filter`.
///
/// Inverse of [`decode_predictor`] for PNG predictors.
pub fn encode_png_predictor(data: &[u8], params: &DecodeParams, filter: PngPredictor) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    if row_len == 0 || data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }
    let bpp = params.bytes_per_pixel();
    let mut output = Vec::with_capacity(data.len() / row_len * (row_len + 1));
    let zero = vec![0u8; row_len];
    let mut prev: &[u8] = &zero;
    for row in data.chunks(row_len) {
        output.push(filter as u8);
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            output.push(byte.wrapping_sub(prediction(filter, left, prev[i], up_left)));
        }
        prev = row;
    }
    Ok(output)
}

fn prediction(filter: PngPredictor, left: u8, up: u8, up_left: u8) -> u8 {
    match filter {
        PngPredictor::None => 0,
        PngPredictor::Sub => left,
        PngPredictor::Up => up,
        PngPredictor::Average => ((left as u16 + up as u16) / 2) as u8,
        PngPredictor::Paeth => paeth(left as i16, up as i16, up_left as i16) as u8,
    }
}

/// Paeth predictor function from the PNG specification.
fn paeth(a: i16, b: i16, c: i16) -> i16 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_predictor() {
        let data = b"Hello, World!";
        let result = decode_predictor(data, &DecodeParams::default()).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_png_up_predictor() {
        let params = DecodeParams::for_columns(12, 4);
        // Row 0 literal, row 1 stored as column-wise differences from row 0
        let encoded = [2, 1, 0, 16, 0, 2, 0, 0, 2, 5];
        let decoded = decode_predictor(&encoded, &params).unwrap();
        assert_eq!(decoded, vec![1, 0, 16, 0, 1, 0, 18, 5]);
    }

    #[test]
    fn test_up_wraps_modulo_256() {
        let params = DecodeParams::for_columns(12, 1);
        let decoded = decode_predictor(&[2, 200, 2, 100], &params).unwrap();
        assert_eq!(decoded, vec![200, 44]);
    }

    #[test]
    fn test_png_sub_predictor() {
        let params = DecodeParams::for_columns(11, 3);
        let decoded = decode_predictor(&[1, 10, 5, 5], &params).unwrap();
        assert_eq!(decoded, vec![10, 15, 20]);
    }

    #[test]
    fn test_optimum_uses_row_tags() {
        let params = DecodeParams::for_columns(15, 2);
        let decoded = decode_predictor(&[0, 3, 4, 2, 1, 1], &params).unwrap();
        assert_eq!(decoded, vec![3, 4, 4, 5]);
    }

    #[test]
    fn test_invalid_row_tag() {
        let params = DecodeParams::for_columns(12, 2);
        assert!(decode_predictor(&[9, 1, 1], &params).is_err());
    }

    #[test]
    fn test_wrong_length() {
        let params = DecodeParams::for_columns(12, 4);
        assert!(decode_predictor(&[2, 1, 2], &params).is_err());
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 3,
            ..Default::default()
        };
        let decoded = decode_predictor(&[1, 1, 1, 5, 0, 250], &params).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 5, 5, 255]);
    }

    #[test]
    fn test_encode_then_decode_each_filter() {
        let rows: Vec<u8> = (0u8..24).map(|b| b.wrapping_mul(37)).collect();
        for filter in [
            PngPredictor::None,
            PngPredictor::Sub,
            PngPredictor::Up,
            PngPredictor::Average,
            PngPredictor::Paeth,
        ] {
            let params = DecodeParams::for_columns(filter.predictor_value(), 6);
            let encoded = encode_png_predictor(&rows, &params, filter).unwrap();
            assert_eq!(decode_predictor(&encoded, &params).unwrap(), rows, "{:?}", filter);
        }
    }
}
