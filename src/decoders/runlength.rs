//! RunLengthDecode implementation.
//!
//! - Length byte 0-127: Copy next N+1 bytes literally
//! - Length byte 128: EOD marker
//! - Length byte 129-255: Repeat next byte 257-N times

use crate::decoders::StreamDecoder;
use crate::error::Result;

/// RunLengthDecode filter implementation.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode_prefix(&self, input: &[u8]) -> Result<(Vec<u8>, usize)> {
        let mut output = Vec::new();
        let mut i = 0;

        while i < input.len() {
            let length = input[i];
            i += 1;
            match length {
                0..=127 => {
                    let count = length as usize + 1;
                    let end = (i + count).min(input.len());
                    if end - i < count {
                        log::warn!(
                            "RunLengthDecode: literal run truncated ({} of {} bytes)",
                            end - i,
                            count
                        );
                    }
                    output.extend_from_slice(&input[i..end]);
                    i = end;
                },
                128 => break,
                129..=255 => {
                    let Some(&byte) = input.get(i) else {
                        log::warn!("RunLengthDecode: missing byte for run");
                        break;
                    };
                    i += 1;
                    output.resize(output.len() + 257 - length as usize, byte);
                },
            }
        }

        Ok((output, i))
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}
