//! ASCIIHexDecode implementation.
//!
//! Decodes hexadecimal-encoded data (e.g., "48656C6C6F>" -> "Hello").
//! Whitespace is ignored, `>` ends the data, and an odd trailing digit is
//! padded with an implicit '0'.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCIIHexDecode filter implementation.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode_prefix(&self, input: &[u8]) -> Result<(Vec<u8>, usize)> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;
        let mut consumed = input.len();

        for (i, &c) in input.iter().enumerate() {
            if c == b'>' {
                consumed = i + 1;
                break;
            }
            if c.is_ascii_whitespace() || c == 0 {
                continue;
            }
            let nibble = hex_digit_to_value(c).ok_or_else(|| {
                Error::Decode(format!("ASCIIHexDecode: invalid hex digit '{}'", c as char))
            })?;
            match high.take() {
                Some(h) => output.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }
        if let Some(h) = high {
            output.push(h << 4);
        }

        Ok((output, consumed))
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// Convert a hexadecimal ASCII character to its numeric value.
pub(crate) fn hex_digit_to_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        assert_eq!(AsciiHexDecoder.decode(b"48656C6C6F>").unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_whitespace_and_odd() {
        assert_eq!(AsciiHexDecoder.decode(b"4 8 6>").unwrap(), vec![0x48, 0x60]);
    }

    #[test]
    fn test_consumed_stops_after_marker() {
        let (data, consumed) = AsciiHexDecoder.decode_prefix(b"41>trailing").unwrap();
        assert_eq!(data, b"A");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_invalid_digit() {
        assert!(AsciiHexDecoder.decode(b"4G>").is_err());
    }
}
