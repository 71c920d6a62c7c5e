//! Stream decoder implementations for PDF filters.
//!
//! This module provides decoders for the general-purpose PDF filters:
//! - FlateDecode (zlib/deflate) - most common
//! - ASCIIHexDecode - hexadecimal encoding
//! - ASCII85Decode - base85 encoding
//! - LZWDecode - LZW compression
//! - RunLengthDecode - run-length encoding
//!
//! Image codecs (DCT, CCITT, JBIG2, JPX) are not decoded here; a chain that
//! ends in one of them stops before it and reports the codec so the image
//! loader can take over.
//!
//! Every decoder also reports how many input bytes it consumed. Inline
//! images need that to find where their data ends inside a content stream.

use crate::config::ParseLimits;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii_hex::AsciiHexDecoder;
pub use ascii85::Ascii85Decoder;
pub use flate::FlateDecoder;
pub use lzw::LzwDecoder;
pub use predictor::{DecodeParams, decode_predictor};
pub use runlength::RunLengthDecoder;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode a prefix of `input`.
    ///
    /// Returns the decoded bytes and the number of input bytes consumed,
    /// which stops at the filter's end-of-data marker when it has one.
    fn decode_prefix(&self, input: &[u8]) -> Result<(Vec<u8>, usize)>;

    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.decode_prefix(input).map(|(data, _)| data)
    }

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// One step of a filter pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Canonical filter name (abbreviations expanded)
    pub name: String,
    /// `DecodeParms` dictionary for this filter
    pub params: Option<Dict>,
}

/// Output of a filter pipeline.
#[derive(Debug, Clone, Default)]
pub struct DecodedStream {
    /// Decoded bytes
    pub data: Vec<u8>,
    /// Image codec that still has to be applied, if the chain ended in one
    pub image_codec: Option<FilterSpec>,
}

/// Expand the abbreviated filter names allowed in inline images.
pub fn canonical_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

/// True for filters whose output is an image rather than a byte stream.
pub fn is_image_codec(name: &str) -> bool {
    matches!(
        canonical_filter_name(name),
        "DCTDecode" | "CCITTFaxDecode" | "JBIG2Decode" | "JPXDecode"
    )
}

/// Read the `Filter`/`DecodeParms` pair of a dictionary (direct objects only).
///
/// Inline-image dictionaries may use the short keys `F` and `DP`.
pub fn filter_chain(dict: &Dict) -> Vec<FilterSpec> {
    let filter = dict.get("Filter").or_else(|| dict.get("F"));
    let params = dict.get("DecodeParms").or_else(|| dict.get("DP"));
    let names: Vec<&str> = match filter {
        Some(Object::Name(name)) => vec![name.as_str()],
        Some(Object::Array(arr)) => arr.iter().filter_map(Object::as_name).collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let param = match params {
                Some(Object::Dictionary(d)) if i == 0 => Some(d.clone()),
                Some(Object::Array(arr)) => arr.get(i).and_then(Object::as_dict).cloned(),
                _ => None,
            };
            FilterSpec {
                name: canonical_filter_name(name).to_string(),
                params: param,
            }
        })
        .collect()
}

fn decoder_for(name: &str, params: Option<&DecodeParams>) -> Option<Box<dyn StreamDecoder>> {
    let early_change = params.map(|p| p.early_change).unwrap_or(true);
    match name {
        "FlateDecode" => Some(Box::new(FlateDecoder)),
        "ASCIIHexDecode" => Some(Box::new(AsciiHexDecoder)),
        "ASCII85Decode" => Some(Box::new(Ascii85Decoder)),
        "LZWDecode" => Some(Box::new(LzwDecoder { early_change })),
        "RunLengthDecode" => Some(Box::new(RunLengthDecoder)),
        _ => None,
    }
}

/// Run a filter pipeline.
///
/// With `stop_at_image_codec`, an image codec ends the pipeline and is
/// returned in [`DecodedStream::image_codec`]; otherwise it is an error.
pub fn decode_filters(
    data: &[u8],
    chain: &[FilterSpec],
    limits: &ParseLimits,
    stop_at_image_codec: bool,
) -> Result<DecodedStream> {
    let mut current = data.to_vec();

    for (i, spec) in chain.iter().enumerate() {
        if is_image_codec(&spec.name) {
            if stop_at_image_codec && i + 1 == chain.len() {
                return Ok(DecodedStream {
                    data: current,
                    image_codec: Some(spec.clone()),
                });
            }
            return Err(Error::UnsupportedFilter(spec.name.clone()));
        }
        let params = spec.params.as_ref().map(DecodeParams::from_dict);
        let decoder = decoder_for(&spec.name, params.as_ref())
            .ok_or_else(|| Error::UnsupportedFilter(spec.name.clone()))?;

        current = decoder.decode(&current)?;

        if let Some(params) = &params {
            if params.predictor > 1 {
                current = decode_predictor(&current, params)?;
            }
        }

        if limits.max_decompressed_size > 0 && current.len() > limits.max_decompressed_size {
            return Err(Error::Decode(format!(
                "Decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                limits.max_decompressed_size
            )));
        }
    }

    Ok(DecodedStream {
        data: current,
        image_codec: None,
    })
}

/// Number of input bytes consumed by the first filter of `spec`.
///
/// Returns `None` for image codecs and unknown filters, whose end cannot be
/// found without the codec itself.
pub fn encoded_length(data: &[u8], spec: &FilterSpec) -> Option<usize> {
    let params = spec.params.as_ref().map(DecodeParams::from_dict);
    let decoder = decoder_for(&spec.name, params.as_ref())?;
    match decoder.decode_prefix(data) {
        Ok((_, consumed)) => Some(consumed),
        Err(e) => {
            log::debug!("{} could not measure inline data: {}", decoder.name(), e);
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(names: &[&str]) -> Vec<FilterSpec> {
        names
            .iter()
            .map(|n| FilterSpec {
                name: n.to_string(),
                params: None,
            })
            .collect()
    }

    #[test]
    fn test_no_filters() {
        let out = decode_filters(b"Hello", &[], &ParseLimits::default(), false).unwrap();
        assert_eq!(out.data, b"Hello");
        assert!(out.image_codec.is_none());
    }

    #[test]
    fn test_unsupported_filter() {
        let result = decode_filters(b"x", &chain(&["Bogus"]), &ParseLimits::default(), false);
        assert!(matches!(result, Err(Error::UnsupportedFilter(name)) if name == "Bogus"));
    }

    #[test]
    fn test_pipeline() {
        // ASCII hex of the run-length encoding of "aaaa"
        let out = decode_filters(
            b"FD6180>",
            &chain(&["ASCIIHexDecode", "RunLengthDecode"]),
            &ParseLimits::default(),
            false,
        )
        .unwrap();
        assert_eq!(out.data, b"aaaa");
    }

    #[test]
    fn test_stop_at_image_codec() {
        let out = decode_filters(
            b"4142>",
            &chain(&["ASCIIHexDecode", "DCTDecode"]),
            &ParseLimits::default(),
            true,
        )
        .unwrap();
        assert_eq!(out.data, b"AB");
        assert_eq!(out.image_codec.map(|c| c.name), Some("DCTDecode".to_string()));
    }

    #[test]
    fn test_size_limit() {
        let limits = ParseLimits {
            max_decompressed_size: 2,
            ..ParseLimits::default()
        };
        let result = decode_filters(b"414243>", &chain(&["ASCIIHexDecode"]), &limits, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_chain_abbreviations() {
        let mut dict = Dict::new();
        dict.insert(
            "F".to_string(),
            Object::Array(vec![Object::Name("AHx".into()), Object::Name("Fl".into())]),
        );
        let specs = filter_chain(&dict);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "ASCIIHexDecode");
        assert_eq!(specs[1].name, "FlateDecode");
    }

    #[test]
    fn test_encoded_length_stops_at_marker() {
        let spec = FilterSpec {
            name: "ASCIIHexDecode".to_string(),
            params: None,
        };
        assert_eq!(encoded_length(b"4142> EI", &spec), Some(5));
        let dct = FilterSpec {
            name: "DCTDecode".to_string(),
            params: None,
        };
        assert_eq!(encoded_length(b"\xff\xd8", &dct), None);
    }
}
