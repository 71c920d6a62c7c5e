//! Token reader for content streams.
//!
//! Content streams are a flat sequence of operands followed by operators.
//! [`StreamReader::parse_next_element`] classifies the next token without
//! building objects for the common cases (numbers, names, operators); only
//! strings, arrays and dictionaries are read into an [`Object`].
//!
//! Damaged input never produces an error. A token that cannot be read is
//! reported as [`ElementType::EndOfData`] and parsing simply stops there.

use crate::config::ParseLimits;
use crate::decoders::{FilterSpec, canonical_filter_name, encoded_length};
use crate::lexer::{self, Token, is_delimiter, is_numeric, is_regular, is_whitespace};
use crate::object::{Dict, Object};
use crate::parser::{decode_hex, decode_literal_string_escapes};

/// Kind of the element returned by [`StreamReader::parse_next_element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// No more data, or data that cannot be tokenized
    EndOfData,
    /// An operator (including `BI`, `ID` and `EI`)
    Keyword,
    /// A numeric literal
    Number,
    /// A name literal
    Name,
    /// Any other object: strings, arrays, dictionaries, booleans, null
    Other,
}

/// Reads content-stream tokens from a byte span.
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
    word_start: usize,
    word_end: usize,
    last_object: Option<Object>,
    limits: ParseLimits,
}

impl<'a> StreamReader<'a> {
    /// Create a reader positioned at `start`.
    pub fn new(data: &'a [u8], start: usize, limits: ParseLimits) -> Self {
        Self {
            data,
            pos: start.min(data.len()),
            word_start: 0,
            word_end: 0,
            last_object: None,
            limits,
        }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to a byte position.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// Whether the whole span has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The raw lexeme of the last keyword, number or name.
    ///
    /// A name keeps its leading `/` and its `#XX` escapes.
    pub fn word(&self) -> &'a [u8] {
        &self.data[self.word_start..self.word_end]
    }

    /// The last name element, decoded and without the leading `/`.
    pub fn name(&self) -> String {
        let word = self.word();
        lexer::decode_name_escapes(word.strip_prefix(b"/").unwrap_or(word))
    }

    /// The last number element.
    pub fn number(&self) -> f32 {
        parse_number_word(self.word())
    }

    /// Take the object read for the last [`ElementType::Other`] element.
    pub fn take_object(&mut self) -> Option<Object> {
        self.last_object.take()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.data.len() {
            let c = self.data[self.pos];
            if is_whitespace(c) {
                self.pos += 1;
            } else if c == b'%' {
                while self.pos < self.data.len() && !matches!(self.data[self.pos], b'\r' | b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Read a run of regular characters, starting with an optional `/`.
    ///
    /// Words longer than the word limit are consumed but truncated.
    fn read_word(&mut self) {
        self.word_start = self.pos;
        if self.pos < self.data.len() && self.data[self.pos] == b'/' {
            self.pos += 1;
        }
        while self.pos < self.data.len() && is_regular(self.data[self.pos]) {
            self.pos += 1;
        }
        self.word_end = self.pos.min(self.word_start + self.limits.max_word_length);
    }

    /// Advance to the next element and classify it.
    pub fn parse_next_element(&mut self) -> ElementType {
        self.last_object = None;
        self.skip_whitespace_and_comments();
        if self.pos >= self.data.len() {
            return ElementType::EndOfData;
        }

        let c = self.data[self.pos];
        if is_delimiter(c) && c != b'/' {
            return match self.read_next_object(false, false, 0) {
                Some(obj) => {
                    self.last_object = Some(obj);
                    ElementType::Other
                },
                None => {
                    log::debug!("Unreadable token at byte {}, stopping", self.pos);
                    ElementType::EndOfData
                },
            };
        }

        self.read_word();
        let word = self.word();
        if word.first() == Some(&b'/') {
            return ElementType::Name;
        }
        if word.iter().all(|&b| is_numeric(b)) {
            return ElementType::Number;
        }
        match word {
            b"true" => {
                self.last_object = Some(Object::Boolean(true));
                ElementType::Other
            },
            b"false" => {
                self.last_object = Some(Object::Boolean(false));
                ElementType::Other
            },
            b"null" => {
                self.last_object = Some(Object::Null);
                ElementType::Other
            },
            _ => ElementType::Keyword,
        }
    }

    /// Read one complete object at the current position.
    ///
    /// Arrays inside arrays are only kept when `allow_nested_array` is set;
    /// otherwise their elements are flattened into the enclosing array.
    /// Nesting deeper than the configured limit yields `None`.
    pub fn read_next_object(&mut self, allow_nested_array: bool, in_array: bool, depth: usize) -> Option<Object> {
        if depth > self.limits.max_nesting {
            log::warn!("Object nesting deeper than {}", self.limits.max_nesting);
            return None;
        }
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let input = &self.data[start..];
        let Ok((rest, tok)) = lexer::token(input) else {
            self.word_start = start;
            self.word_end = start;
            return None;
        };
        let consumed = input.len() - rest.len();
        self.word_start = start;
        self.word_end = start + consumed;
        self.pos = start + consumed;

        match tok {
            Token::Integer(n) => Some(Object::Integer(n)),
            Token::Real(r) => Some(Object::Real(r)),
            Token::Name(n) => Some(Object::Name(n)),
            Token::LiteralString(raw) => {
                let mut s = decode_literal_string_escapes(raw);
                s.truncate(self.limits.max_string_length);
                Some(Object::String(s))
            },
            Token::HexString(raw) => {
                let mut s = decode_hex(raw).ok()?;
                s.truncate(self.limits.max_string_length);
                Some(Object::String(s))
            },
            Token::Keyword(b"true") => Some(Object::Boolean(true)),
            Token::Keyword(b"false") => Some(Object::Boolean(false)),
            Token::Keyword(b"null") => Some(Object::Null),
            Token::Keyword(_) | Token::ArrayEnd | Token::DictEnd => None,
            Token::ArrayStart => {
                let mut items = Vec::new();
                loop {
                    match self.read_next_object(allow_nested_array, true, depth + 1) {
                        Some(Object::Array(inner)) if !allow_nested_array => items.extend(inner),
                        Some(obj) => items.push(obj),
                        None => {
                            if self.word_end <= self.word_start || self.word() == b"]" || self.at_end() {
                                break;
                            }
                        },
                    }
                }
                Some(Object::Array(items))
            },
            Token::DictStart => {
                let mut dict = Dict::new();
                loop {
                    self.skip_whitespace_and_comments();
                    if self.data[self.pos..].starts_with(b">>") {
                        self.pos += 2;
                        break;
                    }
                    if self.at_end() || self.data[self.pos] != b'/' {
                        return None;
                    }
                    self.read_word();
                    let key = self.name();
                    let value = self.read_next_object(true, in_array, depth + 1)?;
                    dict.insert(key, value);
                }
                Some(Object::Dictionary(dict))
            },
        }
    }

    /// Read the data of an inline image that starts after `ID`.
    ///
    /// `dict` must already have its abbreviations expanded. `components` is
    /// the number of color components of the image's color space. The
    /// returned stream carries a `/Length` entry; the reader is left just
    /// past the data, ahead of `EI`.
    pub fn read_inline_stream(&mut self, mut dict: Dict, components: u32) -> Option<Object> {
        if self.pos < self.data.len() && is_whitespace(self.data[self.pos]) {
            self.pos += 1;
        }
        let start = self.pos;
        let remaining = &self.data[start..];

        let filter = first_filter(&dict);
        let length = match &filter {
            None => {
                let width = dict.get("Width").and_then(Object::as_integer).unwrap_or(0);
                let height = dict.get("Height").and_then(Object::as_integer).unwrap_or(0);
                let is_mask = dict.get("ImageMask").and_then(Object::as_bool).unwrap_or(false);
                let (bpc, comps) = if is_mask {
                    (1, 1)
                } else {
                    (
                        dict.get("BitsPerComponent").and_then(Object::as_integer).unwrap_or(8),
                        components as i64,
                    )
                };
                let pitch = width
                    .checked_mul(bpc)
                    .and_then(|v| v.checked_mul(comps))
                    .map(|bits| (bits + 7) / 8);
                let size = pitch.and_then(|p| p.checked_mul(height));
                match size {
                    Some(size) if size >= 0 => (size as usize).min(remaining.len()),
                    _ => return None,
                }
            },
            Some(spec) => match encoded_length(remaining, spec) {
                Some(consumed) => consumed.min(remaining.len()),
                None => match find_inline_end(remaining) {
                    Some(end) => end,
                    None => remaining.len(),
                },
            },
        };

        let data = bytes::Bytes::copy_from_slice(&remaining[..length]);
        self.pos = start + length;
        dict.insert("Length".to_string(), Object::Integer(length as i64));
        Some(Object::Stream { dict, data })
    }
}

/// First filter of an inline image dictionary.
fn first_filter(dict: &Dict) -> Option<FilterSpec> {
    let (name, params) = match dict.get("Filter")? {
        Object::Name(n) => (n.as_str(), dict.get("DecodeParms").and_then(Object::as_dict)),
        Object::Array(arr) => (
            arr.first()?.as_name()?,
            dict.get("DecodeParms")
                .and_then(Object::as_array)
                .and_then(|a| a.first())
                .and_then(Object::as_dict),
        ),
        _ => return None,
    };
    Some(FilterSpec {
        name: canonical_filter_name(name).to_string(),
        params: params.cloned(),
    })
}

/// Offset of the whitespace that precedes a standalone `EI` keyword.
fn find_inline_end(data: &[u8]) -> Option<usize> {
    let mut i = 1;
    while i + 1 < data.len() {
        if data[i] == b'E'
            && data[i + 1] == b'I'
            && is_whitespace(data[i - 1])
            && data.get(i + 2).map_or(true, |&c| is_whitespace(c) || is_delimiter(c))
        {
            return Some(i - 1);
        }
        i += 1;
    }
    None
}

/// Parse a number lexeme leniently.
///
/// Stray signs and second decimal points end the number, so `--5` reads
/// as 0 and `1.2.3` as 1.2.
pub fn parse_number_word(word: &[u8]) -> f32 {
    let mut i = 0;
    let negative = match word.first() {
        Some(b'-') => {
            i = 1;
            true
        },
        Some(b'+') => {
            i = 1;
            false
        },
        _ => false,
    };
    let mut value = 0f64;
    while i < word.len() && word[i].is_ascii_digit() {
        value = value * 10.0 + (word[i] - b'0') as f64;
        i += 1;
    }
    if i < word.len() && word[i] == b'.' {
        i += 1;
        let mut scale = 0.1;
        while i < word.len() && word[i].is_ascii_digit() {
            value += (word[i] - b'0') as f64 * scale;
            scale *= 0.1;
            i += 1;
        }
    }
    let value = if negative { -value } else { value };
    value as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &[u8]) -> StreamReader<'_> {
        StreamReader::new(data, 0, ParseLimits::default())
    }

    #[test]
    fn test_element_types() {
        let mut r = reader(b"12.5 /F1#20x Tf (hi) true % comment\n[1 2]");
        assert_eq!(r.parse_next_element(), ElementType::Number);
        assert_eq!(r.number(), 12.5);
        assert_eq!(r.parse_next_element(), ElementType::Name);
        assert_eq!(r.word(), b"/F1#20x");
        assert_eq!(r.name(), "F1 x");
        assert_eq!(r.parse_next_element(), ElementType::Keyword);
        assert_eq!(r.word(), b"Tf");
        assert_eq!(r.parse_next_element(), ElementType::Other);
        assert_eq!(r.take_object(), Some(Object::String(b"hi".to_vec())));
        assert_eq!(r.parse_next_element(), ElementType::Other);
        assert_eq!(r.take_object(), Some(Object::Boolean(true)));
        assert_eq!(r.parse_next_element(), ElementType::Other);
        assert_eq!(
            r.take_object(),
            Some(Object::Array(vec![Object::Integer(1), Object::Integer(2)]))
        );
        assert_eq!(r.parse_next_element(), ElementType::EndOfData);
    }

    #[test]
    fn test_stray_delimiter_ends_stream() {
        let mut r = reader(b"1 0 0 rg ] 5 w");
        for _ in 0..4 {
            r.parse_next_element();
        }
        assert_eq!(r.parse_next_element(), ElementType::EndOfData);
    }

    #[test]
    fn test_unterminated_string_ends_stream() {
        let mut r = reader(b"(abc");
        assert_eq!(r.parse_next_element(), ElementType::EndOfData);
    }

    #[test]
    fn test_nested_array_flattened_at_top_level() {
        let mut r = reader(b"[1 [2] 3]");
        assert_eq!(r.parse_next_element(), ElementType::Other);
        assert_eq!(
            r.take_object(),
            Some(Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(3)]))
        );
    }

    #[test]
    fn test_dictionary_operand() {
        let mut r = reader(b"<< /MCID 3 /Alt (x) >> BDC");
        assert_eq!(r.parse_next_element(), ElementType::Other);
        let obj = r.take_object().unwrap();
        assert_eq!(obj.get("MCID"), Some(&Object::Integer(3)));
        assert_eq!(r.parse_next_element(), ElementType::Keyword);
        assert_eq!(r.word(), b"BDC");
    }

    #[test]
    fn test_nesting_limit() {
        let limits = ParseLimits {
            max_nesting: 2,
            ..ParseLimits::default()
        };
        let mut r = StreamReader::new(b"<< /A << /B << /C 1 >> >> >>", 0, limits);
        assert_eq!(r.parse_next_element(), ElementType::EndOfData);
    }

    #[test]
    fn test_string_length_cap() {
        let limits = ParseLimits {
            max_string_length: 4,
            ..ParseLimits::default()
        };
        let mut r = StreamReader::new(b"<41424344454647>", 0, limits);
        assert_eq!(r.parse_next_element(), ElementType::Other);
        assert_eq!(r.take_object(), Some(Object::String(b"ABCD".to_vec())));
    }

    #[test]
    fn test_inline_stream_unfiltered_length() {
        let mut dict = Dict::new();
        dict.insert("Width".into(), Object::Integer(3));
        dict.insert("Height".into(), Object::Integer(2));
        dict.insert("BitsPerComponent".into(), Object::Integer(1));
        let data = b" \x80\x40 EI Q";
        let mut r = reader(data);
        let stream = r.read_inline_stream(dict, 1).unwrap();
        let (dict, bytes) = stream.as_stream().unwrap();
        assert_eq!(&bytes[..], b"\x80\x40");
        assert_eq!(dict.get("Length"), Some(&Object::Integer(2)));
        assert_eq!(r.parse_next_element(), ElementType::Keyword);
        assert_eq!(r.word(), b"EI");
    }

    #[test]
    fn test_inline_stream_filtered_length() {
        let mut dict = Dict::new();
        dict.insert("Filter".into(), Object::Name("ASCIIHexDecode".into()));
        let mut r = reader(b" 414243> EI");
        let stream = r.read_inline_stream(dict, 3).unwrap();
        assert_eq!(&stream.as_stream().unwrap().1[..], b"414243>");
    }

    #[test]
    fn test_inline_stream_codec_falls_back_to_ei_search() {
        let mut dict = Dict::new();
        dict.insert("Filter".into(), Object::Name("DCTDecode".into()));
        let mut r = reader(b" \xff\xd8EIx\xff\xd9 EI Q");
        let stream = r.read_inline_stream(dict, 3).unwrap();
        assert_eq!(&stream.as_stream().unwrap().1[..], b"\xff\xd8EIx\xff\xd9");
    }

    #[test]
    fn test_parse_number_word() {
        assert_eq!(parse_number_word(b"-.5"), -0.5);
        assert_eq!(parse_number_word(b"1.2.3"), 1.2);
        assert_eq!(parse_number_word(b"--5"), 0.0);
        assert_eq!(parse_number_word(b"+7"), 7.0);
    }
}
