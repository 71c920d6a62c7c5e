//! ASCII85Decode (Base85) implementation.
//!
//! Decodes ASCII85/Base85 encoded data. This encoding represents 4 bytes
//! as 5 ASCII characters in the range '!' to 'u'.
//! Special case: 'z' represents 4 zero bytes (00000000).

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCII85Decode filter implementation.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode_prefix(&self, input: &[u8]) -> Result<(Vec<u8>, usize)> {
        let mut output = Vec::with_capacity(input.len() * 4 / 5);
        let mut acc: u32 = 0;
        let mut count = 0;
        let mut consumed = input.len();

        let start = if input.starts_with(b"<~") { 2 } else { 0 };
        let mut i = start;
        while i < input.len() {
            let byte = input[i];
            match byte {
                b'~' => {
                    // End marker '~>'
                    consumed = if input.get(i + 1) == Some(&b'>') { i + 2 } else { i + 1 };
                    break;
                },
                b'z' if count == 0 => output.extend_from_slice(&[0, 0, 0, 0]),
                b'!'..=b'u' => {
                    acc = acc
                        .checked_mul(85)
                        .and_then(|v| v.checked_add((byte - b'!') as u32))
                        .ok_or_else(|| Error::Decode("ASCII85Decode: overflow in decoding".to_string()))?;
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&acc.to_be_bytes());
                        acc = 0;
                        count = 0;
                    }
                },
                _ if byte.is_ascii_whitespace() || byte == 0 => {},
                _ => {
                    return Err(Error::Decode(format!(
                        "ASCII85Decode: invalid character '{}'",
                        byte as char
                    )));
                },
            }
            i += 1;
        }

        // A final partial group is padded with 'u'
        if count > 1 {
            for _ in count..5 {
                acc = acc.wrapping_mul(85).wrapping_add(84);
            }
            output.extend_from_slice(&acc.to_be_bytes()[..count - 1]);
        }

        Ok((output, consumed))
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_group() {
        assert_eq!(Ascii85Decoder.decode(b"87cURDZ~>").unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_z() {
        assert_eq!(Ascii85Decoder.decode(b"z~>").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_consumed_includes_marker() {
        let (_, consumed) = Ascii85Decoder.decode_prefix(b"87cURDZ~> EI").unwrap();
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_invalid_character() {
        assert!(Ascii85Decoder.decode(b"87c{~>").is_err());
    }
}
