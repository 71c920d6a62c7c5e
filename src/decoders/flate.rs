//! FlateDecode (zlib/deflate) implementation.
//!
//! This is the most common PDF compression filter. Decoding goes through
//! `flate2::Decompress` directly so the number of consumed input bytes is
//! known, with recovery for streams whose zlib wrapper is damaged.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::{Decompress, FlushDecompress, Status};

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode_prefix(&self, input: &[u8]) -> Result<(Vec<u8>, usize)> {
        // Strategy 1: standard zlib
        let zlib_err = match inflate(input, true) {
            Ok(result) => return Ok(result),
            Err(Partial { output, consumed, .. }) if !output.is_empty() => {
                log::warn!(
                    "FlateDecode partial recovery: extracted {} bytes before corruption",
                    output.len()
                );
                return Ok((output, consumed));
            },
            Err(partial) => partial.message,
        };

        // Strategy 2: raw deflate (no zlib wrapper)
        log::info!("Zlib decode failed ({}), trying raw deflate", zlib_err);
        match inflate(input, false) {
            Ok(result) => return Ok(result),
            Err(Partial { output, consumed, .. }) if !output.is_empty() => {
                log::warn!("Raw deflate partial recovery: {} bytes", output.len());
                return Ok((output, consumed));
            },
            Err(_) => {},
        }

        // Strategy 3: skip a corrupt two-byte zlib header
        if input.len() > 2 {
            match inflate(&input[2..], false) {
                Ok((output, consumed)) => return Ok((output, consumed + 2)),
                Err(Partial { output, consumed, .. }) if !output.is_empty() => {
                    log::warn!("Deflate with header skip partial recovery: {} bytes", output.len());
                    return Ok((output, consumed + 2));
                },
                Err(_) => {},
            }
        }

        Err(Error::Decode(format!("FlateDecode error: {}", zlib_err)))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

struct Partial {
    output: Vec<u8>,
    consumed: usize,
    message: String,
}

fn inflate(input: &[u8], zlib: bool) -> std::result::Result<(Vec<u8>, usize), Partial> {
    let mut decompress = Decompress::new(zlib);
    let mut output: Vec<u8> = Vec::with_capacity(input.len().saturating_mul(4).max(1024));

    loop {
        if output.capacity() - output.len() < 1024 {
            output.reserve(output.capacity().max(4096));
        }
        let in_before = decompress.total_in();
        let out_before = decompress.total_out();
        let offset = (in_before as usize).min(input.len());

        match decompress.decompress_vec(&input[offset..], &mut output, FlushDecompress::None) {
            Ok(Status::StreamEnd) => break,
            Ok(_) => {
                let stalled =
                    decompress.total_in() == in_before && decompress.total_out() == out_before;
                if stalled {
                    // Input exhausted without an end-of-stream marker
                    if output.is_empty() && offset >= input.len() {
                        return Err(Partial {
                            output,
                            consumed: offset,
                            message: "unexpected end of data".to_string(),
                        });
                    }
                    break;
                }
            },
            Err(e) => {
                return Err(Partial {
                    output,
                    consumed: decompress.total_in() as usize,
                    message: e.to_string(),
                });
            },
        }
    }

    Ok((output, decompress.total_in() as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_zlib_decode() {
        let encoded = zlib(b"0 0 m 10 10 l S");
        assert_eq!(FlateDecoder.decode(&encoded).unwrap(), b"0 0 m 10 10 l S");
    }

    #[test]
    fn test_consumed_excludes_trailing_bytes() {
        let mut encoded = zlib(b"pixels");
        let len = encoded.len();
        encoded.extend_from_slice(b"\nEI Q");
        let (data, consumed) = FlateDecoder.decode_prefix(&encoded).unwrap();
        assert_eq!(data, b"pixels");
        assert_eq!(consumed, len);
    }

    #[test]
    fn test_raw_deflate_fallback() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate body").unwrap();
        let encoded = encoder.finish().unwrap();
        assert_eq!(FlateDecoder.decode(&encoded).unwrap(), b"raw deflate body");
    }

    #[test]
    fn test_damaged_header_recovered() {
        // Past the two header bytes the rest inflates as fixed-Huffman data
        assert!(FlateDecoder.decode(b"\x00\x01\x02not deflate").is_ok());
    }

    #[test]
    fn test_invalid_block_type_fails() {
        // 0xFF selects the reserved block type under every strategy
        assert!(FlateDecoder.decode(b"\xff\xff\xff\xff").is_err());
    }
}
