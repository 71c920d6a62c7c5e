//! PDF lexer (tokenizer).
//!
//! This module provides low-level tokenization of PDF byte streams with
//! nom combinators, plus the byte classes shared with the content-stream
//! reader.
//!
//! # PDF Syntax Overview
//!
//! - Numbers: integers (42, -123) and reals (3.14, -2.5, .5)
//! - Strings: literal ((Hello)) and hexadecimal (<48656C6C6F>)
//! - Names: identifiers starting with / (/Type, /Pages)
//! - Delimiters: `[`, `]`, `<<`, `>>`
//! - Keywords: any other run of regular characters (true, obj, R, stream)
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded},
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),
    /// Literal string bytes, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Hexadecimal string digits, whitespace included
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded
    Name(String),
    /// Array start delimiter [
    ArrayStart,
    /// Array end delimiter ]
    ArrayEnd,
    /// Dictionary start delimiter <<
    DictStart,
    /// Dictionary end delimiter >>
    DictEnd,
    /// Any other keyword
    Keyword(&'a [u8]),
}

/// PDF whitespace (PDF Ref 1.7, Table 3.1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Characters that belong to a keyword, number or name.
pub fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

/// Characters that may appear in a number.
pub fn is_numeric(c: u8) -> bool {
    c.is_ascii_digit() || matches!(c, b'.' | b'-' | b'+')
}

fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    value((), take_while1(is_whitespace))(input)
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
pub fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;
    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }
        return remaining;
    }
}

/// Parse an integer or real number.
///
/// PDF allows leading +/- signs and numbers starting with a decimal point.
/// Damaged files run numbers into keywords ("10R"); the number stops there.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(pair(
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
            recognize(pair(char('.'), digit1)),
        )),
    ))(input)?;

    let is_real = text.contains(&b'.');
    let text = std::str::from_utf8(text).unwrap_or("0");
    if is_real {
        let num: f64 = text.parse().unwrap_or(0.0);
        Ok((rest, Token::Real(num)))
    } else {
        match text.parse::<i64>() {
            Ok(n) => Ok((rest, Token::Integer(n))),
            Err(_) => Ok((rest, Token::Real(text.parse().unwrap_or(0.0)))),
        }
    }
}

/// Length of a balanced literal string body starting after `(`.
///
/// Returns the index of the closing parenthesis.
pub fn literal_string_end(body: &[u8]) -> Option<usize> {
    let mut depth = 1;
    let mut pos = 0;
    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            },
            _ => {},
        }
        pos += 1;
    }
    None
}

fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    match literal_string_end(body) {
        Some(end) => Ok((&body[end + 1..], Token::LiteralString(&body[..end]))),
        None => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in PDF names.
///
/// # Examples
///
/// ```
/// # use pdf_raster::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"Type"), "Type");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(name: &[u8]) -> String {
    let mut result = Vec::with_capacity(name.len());
    let mut i = 0;
    while i < name.len() {
        if name[i] == b'#' && i + 2 < name.len() {
            let hi = (name[i + 1] as char).to_digit(16);
            let lo = (name[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                result.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        result.push(name[i]);
        i += 1;
    }
    match String::from_utf8(result) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |bytes: &[u8]| Token::Name(decode_name_escapes(bytes))),
    )(input)
}

fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(is_regular), Token::Keyword)(input)
}

/// Parse a single PDF token, skipping leading whitespace and comments.
///
/// # Errors
///
/// Returns `Err` if the input doesn't start with a valid token after
/// skipping whitespace.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((
        parse_delimiter,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
        parse_keyword,
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+7"), Ok((&b""[..], Token::Integer(7))));
    }

    #[test]
    fn test_parse_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
    }

    #[test]
    fn test_number_followed_by_keyword() {
        assert_eq!(token(b"10R"), Ok((&b"R"[..], Token::Integer(10))));
    }

    #[test]
    fn test_parse_name_with_escape() {
        assert_eq!(token(b"/A#20B "), Ok((&b" "[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/Type/Page"), Ok((&b"/Page"[..], Token::Name("Type".to_string()))));
    }

    #[test]
    fn test_parse_nested_literal_string() {
        assert_eq!(
            token(b"(a (b) \\) c) rest"),
            Ok((&b" rest"[..], Token::LiteralString(b"a (b) \\) c")))
        );
    }

    #[test]
    fn test_unbalanced_literal_string_fails() {
        assert!(token(b"(never closed").is_err());
    }

    #[test]
    fn test_hex_string_vs_dict() {
        assert_eq!(token(b"<4142>"), Ok((&b""[..], Token::HexString(b"4142"))));
        assert_eq!(token(b"<< /A 1 >>"), Ok((&b" /A 1 >>"[..], Token::DictStart)));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(token(b"  endobj\n"), Ok((&b"\n"[..], Token::Keyword(b"endobj"))));
        assert_eq!(token(b"true]"), Ok((&b"]"[..], Token::Keyword(b"true"))));
    }

    #[test]
    fn test_skip_comment() {
        assert_eq!(token(b"% note\n 12"), Ok((&b""[..], Token::Integer(12))));
    }

    #[test]
    fn test_byte_classes() {
        assert!(is_whitespace(0x0C));
        assert!(is_delimiter(b'%'));
        assert!(is_regular(b'q'));
        assert!(is_numeric(b'-'));
        assert!(!is_numeric(b'e'));
    }
}
