//! PNG and TIFF predictors for Flate and LZW streams.
//!
//! Predictors encode each sample as a difference from a neighbor. Decoding
//! runs row by row with a copy of the previous decoded row.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};

/// Decode parameters for Flate and LZW streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of samples per row
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
    /// LZW code-width switch timing (1 = one code early)
    pub early_change: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
            early_change: true,
        }
    }
}

impl DecodeParams {
    /// Read parameters from a `DecodeParms` dictionary.
    pub fn from_dict(dict: &Dict) -> Self {
        let int = |key: &str, default: i64| dict.get(key).and_then(Object::as_integer).unwrap_or(default);
        Self {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1).clamp(1, 1 << 20) as usize,
            colors: int("Colors", 1).clamp(1, 32) as usize,
            bits_per_component: int("BitsPerComponent", 8).clamp(1, 16) as usize,
            early_change: int("EarlyChange", 1) != 0,
        }
    }

    /// Bytes of sample data per row, without the PNG tag byte.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Distance in bytes to the corresponding byte of the previous pixel.
    fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component) / 8).max(1)
    }
}

/// Reverse the predictor named in `params`.
///
/// A truncated final row is decoded as far as it goes.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Ok(decode_tiff(data, params)),
        10..=15 => Ok(decode_png(data, params)),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Vec<u8> {
    let row_len = params.pixel_bytes_per_row();
    let mut output = data.to_vec();
    if params.bits_per_component == 8 {
        let bpp = params.colors;
        for row in output.chunks_mut(row_len) {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
    } else if params.bits_per_component == 16 {
        let bpp = params.colors * 2;
        for row in output.chunks_mut(row_len) {
            let mut i = bpp;
            while i + 1 < row.len() {
                let left = u16::from_be_bytes([row[i - bpp], row[i - bpp + 1]]);
                let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                let [hi, lo] = cur.wrapping_add(left).to_be_bytes();
                row[i] = hi;
                row[i + 1] = lo;
                i += 2;
            }
        }
    } else {
        log::debug!(
            "TIFF predictor with {} bits per component left undecoded",
            params.bits_per_component
        );
    }
    output
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Vec<u8> {
    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    let mut output = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    let mut row = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let tag = chunk[0];
        let encoded = &chunk[1..];
        let n = encoded.len();
        row[..n].copy_from_slice(encoded);
        for i in 0..n {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match tag {
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => 0,
            };
            row[i] = row[i].wrapping_add(predicted);
        }
        output.extend_from_slice(&row[..n]);
        prev[..n].copy_from_slice(&row[..n]);
    }
    output
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
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

    fn params(predictor: i64, columns: usize, colors: usize) -> DecodeParams {
        DecodeParams {
            predictor,
            columns,
            colors,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_predictor() {
        let data = b"Hello, World!";
        assert_eq!(decode_predictor(data, &params(1, 1, 1)).unwrap(), data);
    }

    #[test]
    fn test_png_up_predictor() {
        let encoded = vec![2, 10, 20, 30, 40, 50, 2, 5, 5, 5, 5, 5];
        let result = decode_predictor(&encoded, &params(12, 5, 1)).unwrap();
        assert_eq!(result, vec![10, 20, 30, 40, 50, 15, 25, 35, 45, 55]);
    }

    #[test]
    fn test_png_sub_uses_pixel_width() {
        // Two RGB pixels per row: the second pixel adds the first one
        let encoded = vec![1, 10, 20, 30, 1, 1, 1];
        let result = decode_predictor(&encoded, &params(15, 2, 3)).unwrap();
        assert_eq!(result, vec![10, 20, 30, 11, 21, 31]);
    }

    #[test]
    fn test_png_truncated_row() {
        let encoded = vec![0, 1, 2, 3, 2, 1];
        let result = decode_predictor(&encoded, &params(10, 3, 1)).unwrap();
        assert_eq!(result, vec![1, 2, 3, 2]);
    }

    #[test]
    fn test_tiff_predictor() {
        let encoded = vec![10, 1, 1, 1];
        let result = decode_predictor(&encoded, &params(2, 4, 1)).unwrap();
        assert_eq!(result, vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_unsupported_predictor() {
        assert!(decode_predictor(b"x", &params(7, 1, 1)).is_err());
    }

    #[test]
    fn test_from_dict() {
        let mut dict = Dict::new();
        dict.insert("Predictor".to_string(), Object::Integer(12));
        dict.insert("Columns".to_string(), Object::Integer(4));
        dict.insert("EarlyChange".to_string(), Object::Integer(0));
        let p = DecodeParams::from_dict(&dict);
        assert_eq!(p.predictor, 12);
        assert_eq!(p.columns, 4);
        assert!(!p.early_change);
        assert_eq!(p.pixel_bytes_per_row(), 4);
    }
}
