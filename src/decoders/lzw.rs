//! LZWDecode implementation for PDF.
//!
//! PDF's LZW variant uses MSB-first bit ordering, 9 to 12 bit codes, clear
//! code 256 and EOD code 257. With `EarlyChange` 1 (the default) the code
//! width grows one code early, the same switch TIFF uses.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use weezl::{BitOrder, LzwStatus, decode::Decoder as WeezlDecoder};

/// LZWDecode filter implementation.
pub struct LzwDecoder {
    /// Grow the code width one code early
    pub early_change: bool,
}

impl Default for LzwDecoder {
    fn default() -> Self {
        Self { early_change: true }
    }
}

impl StreamDecoder for LzwDecoder {
    fn decode_prefix(&self, input: &[u8]) -> Result<(Vec<u8>, usize)> {
        let mut decoder = if self.early_change {
            WeezlDecoder::with_tiff_size_switch(BitOrder::Msb, 8)
        } else {
            WeezlDecoder::new(BitOrder::Msb, 8)
        };

        let mut output = Vec::with_capacity(input.len() * 2);
        let mut buffer = vec![0u8; 16 * 1024];
        let mut consumed = 0;

        loop {
            let result = decoder.decode_bytes(&input[consumed..], &mut buffer);
            consumed += result.consumed_in;
            output.extend_from_slice(&buffer[..result.consumed_out]);
            match result.status {
                Ok(LzwStatus::Done) | Ok(LzwStatus::NoProgress) => break,
                Ok(LzwStatus::Ok) => {
                    if result.consumed_in == 0 && result.consumed_out == 0 {
                        break;
                    }
                },
                Err(e) => {
                    if output.is_empty() {
                        return Err(Error::Decode(format!("LZWDecode error: {:?}", e)));
                    }
                    log::warn!("LZWDecode partial recovery: {} bytes before {:?}", output.len(), e);
                    break;
                },
            }
        }

        Ok((output, consumed))
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}
