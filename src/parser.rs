//! PDF object parser.
//!
//! This module builds complete objects (arrays, dictionaries, streams,
//! indirect references) from lexer tokens. It is used by the file loader;
//! content streams go through [`crate::content::stream_reader`] instead.
//!
//! # Error Handling
//!
//! All parsing functions return `IResult` from nom. Unclosed arrays and
//! dictionaries at end of input return what was read so far.

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Dict, Object, ObjectRef};
use nom::IResult;

/// Decode escape sequences in PDF literal strings.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` and line continuations.
///
/// # Examples
///
/// ```
/// # use pdf_raster::parser::decode_literal_string_escapes;
/// let decoded = decode_literal_string_escapes(b"Section \\247 71.01");
/// assert_eq!(decoded, b"Section \xa7 71.01");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i];
        if c != b'\\' || i + 1 >= raw.len() {
            // A bare CR or CRLF inside a string reads as LF
            if c == b'\r' {
                result.push(b'\n');
                if raw.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            } else if c != b'\\' {
                result.push(c);
            }
            i += 1;
            continue;
        }
        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(8),
            b'f' => result.push(12),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut octal = (next - b'0') as u32;
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d) if (b'0'..=b'7').contains(&d) => {
                            octal = octal * 8 + (d - b'0') as u32;
                            i += 1;
                        },
                        _ => break,
                    }
                }
                result.push((octal & 0xFF) as u8);
            },
            // Unknown escape: the backslash is dropped
            other => result.push(other),
        }
    }

    result
}

/// Decode a hex string body to bytes.
///
/// Whitespace is ignored; an odd final digit is padded with 0.
///
/// # Example
///
/// ```
/// use pdf_raster::parser::decode_hex;
///
/// assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"7").unwrap(), vec![0x70]);
/// ```
///
/// # Errors
///
/// Returns `Err` if the input contains non-hex, non-whitespace characters.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(hex_bytes.len() / 2 + 1);
    let mut high: Option<u8> = None;
    for (offset, &c) in hex_bytes.iter().enumerate() {
        if crate::lexer::is_whitespace(c) {
            continue;
        }
        let nibble = (c as char).to_digit(16).ok_or_else(|| Error::ParseError {
            offset,
            reason: format!("Invalid hex digit '{}'", c as char),
        })? as u8;
        match high.take() {
            Some(h) => result.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        result.push(h << 4);
    }
    Ok(result)
}

/// Parse a PDF object from input bytes.
///
/// Handles primitives, arrays, dictionaries, streams and indirect
/// references (`10 0 R`).
///
/// # Example
///
/// ```
/// use pdf_raster::parser::parse_object;
///
/// let (_, obj) = parse_object(b"<< /Type /Page /Count 3 >>").unwrap();
/// assert_eq!(obj.get("Count").and_then(|o| o.as_integer()), Some(3));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (rest, tok) = token(input)?;

    match tok {
        Token::Integer(i) => {
            // Could be the start of an indirect reference (obj_num gen R)
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::Keyword(b"R"))) = token(after_gen) {
                    if i >= 0 && (0..=u16::MAX as i64).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                    }
                }
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(bytes) => Ok((rest, Object::String(decode_literal_string_escapes(bytes)))),
        Token::HexString(hex) => match decode_hex(hex) {
            Ok(decoded) => Ok((rest, Object::String(decoded))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(rest, nom::error::ErrorKind::HexDigit))),
        },
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::ArrayStart => parse_array(rest),
        Token::DictStart => {
            let (after_dict, dict) = parse_dictionary(rest)?;
            if let Ok((stream_input, Token::Keyword(b"stream"))) = token(after_dict) {
                let (remaining, data) = parse_stream_data(stream_input, &dict)?;
                return Ok((
                    remaining,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(data),
                    },
                ));
            }
            Ok((after_dict, Object::Dictionary(dict)))
        },
        Token::Keyword(b"true") => Ok((rest, Object::Boolean(true))),
        Token::Keyword(b"false") => Ok((rest, Object::Boolean(false))),
        Token::Keyword(b"null") => Ok((rest, Object::Null)),
        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Parse `N G obj <object> endobj`.
///
/// A missing `endobj` is tolerated.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let fail = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag));
    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) if id >= 0 => (rest, id as u32),
        _ => return Err(fail()),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) if (0..=u16::MAX as i64).contains(&gen) => (rest, gen as u16),
        _ => return Err(fail()),
    };
    let rest = match token(rest)? {
        (rest, Token::Keyword(b"obj")) => rest,
        _ => return Err(fail()),
    };
    let (rest, object) = parse_object(rest)?;
    let rest = match token(rest) {
        Ok((after, Token::Keyword(b"endobj"))) => after,
        _ => rest,
    };
    Ok((rest, (ObjectRef::new(id, gen), object)))
}

/// Parse stream data after the `stream` keyword.
///
/// A direct `/Length` is trusted when `endstream` follows it; otherwise the
/// data runs to the next `endstream`.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dict) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = length.max(0) as usize;
        if length <= input.len() {
            if let Ok((after, Token::Keyword(b"endstream"))) = token(&input[length..]) {
                return Ok((after, input[..length].to_vec()));
            }
        }
        log::warn!("Stream /Length {} does not end at endstream, scanning", length);
    }

    match find_endstream(input) {
        Some(pos) => {
            let mut end = pos;
            // Drop the EOL that precedes the keyword
            if end > 0 && input[end - 1] == b'\n' {
                end -= 1;
            }
            if end > 0 && input[end - 1] == b'\r' {
                end -= 1;
            }
            let remaining = &input[pos + b"endstream".len()..];
            Ok((remaining, input[..end].to_vec()))
        },
        None => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof))),
    }
}

fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input.windows(keyword.len()).position(|window| window == keyword)
}

fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((after, Token::ArrayEnd)) => return Ok((after, Object::Array(objects))),
            Ok(_) => {
                let (after, obj) = parse_object(remaining)?;
                objects.push(obj);
                remaining = after;
            },
            Err(_) if crate::lexer::skip_ws(remaining).is_empty() => {
                return Ok((remaining, Object::Array(objects)));
            },
            Err(e) => return Err(e),
        }
    }
}

fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Dict> {
    let mut dict = Dict::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((after, Token::DictEnd)) => return Ok((after, dict)),
            Ok((after, Token::Name(key))) => {
                let (after_value, value) = parse_object(after)?;
                dict.insert(key, value);
                remaining = after_value;
            },
            Ok(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Tag,
                )));
            },
            Err(_) if crate::lexer::skip_ws(remaining).is_empty() => return Ok((remaining, dict)),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let (_, obj) = parse_object(b"12 0 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(12, 0)));
    }

    #[test]
    fn test_parse_integer_pair_is_not_reference() {
        let (rest, obj) = parse_object(b"12 0 obj").unwrap();
        assert_eq!(obj, Object::Integer(12));
        assert_eq!(rest, b" 0 obj");
    }

    #[test]
    fn test_parse_nested_array() {
        let (_, obj) = parse_object(b"[1 [2 3] /N (s) true null]").unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 6);
        assert_eq!(arr[1].as_array().map(Vec::len), Some(2));
        assert_eq!(arr[4], Object::Boolean(true));
        assert!(arr[5].is_null());
    }

    #[test]
    fn test_parse_dictionary_with_reference() {
        let (_, obj) = parse_object(b"<< /Font << /F1 5 0 R >> /Count 2 >>").unwrap();
        let font = obj.get("Font").unwrap();
        assert_eq!(font.get("F1"), Some(&Object::Reference(ObjectRef::new(5, 0))));
    }

    #[test]
    fn test_parse_stream_with_length() {
        let input = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        let (_, data) = obj.as_stream().unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[test]
    fn test_parse_stream_with_wrong_length() {
        let input = b"<< /Length 99 >>\nstream\nhello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        let (_, data) = obj.as_stream().unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[test]
    fn test_parse_indirect_object() {
        let (_, (r, obj)) = parse_indirect_object(b"3 0 obj\n<< /Type /Page >>\nendobj").unwrap();
        assert_eq!(r, ObjectRef::new(3, 0));
        assert_eq!(obj.get("Type").and_then(Object::as_name), Some("Page"));
    }

    #[test]
    fn test_literal_escapes() {
        assert_eq!(decode_literal_string_escapes(b"a\\(b\\)\\n\\101"), b"a(b)\nA");
        assert_eq!(decode_literal_string_escapes(b"line\\\ncontinued"), b"linecontinued");
    }

    #[test]
    fn test_decode_hex_invalid() {
        assert!(decode_hex(b"4G").is_err());
    }
}
