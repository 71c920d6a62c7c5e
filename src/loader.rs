//! Loading documents from bytes by scanning for indirect objects.
//!
//! The loader does not read cross-reference tables. It scans the whole file
//! for `N G obj` headers, parses each object where it starts and lets later
//! definitions replace earlier ones, which is what an incremental update
//! means. The trailer is the last `trailer` dictionary in the file, or is
//! rebuilt around the catalog object when there is none (for example when
//! the file only has a cross-reference stream).

use crate::config::ParseLimits;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::parser::{parse_indirect_object, parse_object};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::path::Path;

lazy_static! {
    /// Regex for finding "N G obj" headers
    static ref RE_OBJ_PATTERN: regex::bytes::Regex = regex::bytes::Regex::new(r"(\d+)\s+(\d+)\s+obj").unwrap();

    /// Regex for finding "trailer <<" patterns
    static ref RE_TRAILER: regex::bytes::Regex = regex::bytes::Regex::new(r"trailer\s*<<").unwrap();

    /// Regex for the header version
    static ref RE_HEADER: regex::bytes::Regex = regex::bytes::Regex::new(r"%PDF-(\d)\.(\d)").unwrap();
}

impl Document {
    /// Open a PDF file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has no PDF header or
    /// contains no catalog.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load(&data)
    }

    /// Load a PDF from memory with the default limits.
    pub fn load(data: &[u8]) -> Result<Self> {
        Self::load_with_limits(data, ParseLimits::default())
    }

    /// Load a PDF from memory.
    pub fn load_with_limits(data: &[u8], limits: ParseLimits) -> Result<Self> {
        let version = parse_header(data)?;
        let objects = scan_objects(data);
        if objects.is_empty() {
            return Err(Error::InvalidPdf("No objects found".to_string()));
        }
        let trailer = match find_trailer(data) {
            Some(t) if t.contains_key("Root") => t,
            _ => {
                log::warn!("No usable trailer, locating the catalog by scanning objects");
                minimal_trailer(&objects)?
            },
        };
        log::info!("Loaded {} objects (PDF {}.{})", objects.len(), version.0, version.1);
        Document::from_objects(objects, trailer, version, limits)
    }
}

/// Find the `%PDF-x.y` header within the first kilobyte.
fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let caps = RE_HEADER.captures(window).ok_or_else(|| {
        let found = String::from_utf8_lossy(&data[..data.len().min(8)]).to_string();
        Error::InvalidHeader(found)
    })?;
    let digit = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_bytes().first())
            .map(|b| b - b'0')
            .unwrap_or(0)
    };
    Ok((digit(1), digit(2)))
}

/// Scan for every indirect object in the file.
fn scan_objects(data: &[u8]) -> HashMap<ObjectRef, Object> {
    let mut objects = HashMap::new();

    for capture in RE_OBJ_PATTERN.captures_iter(data) {
        let Some(full_match) = capture.get(0) else {
            continue;
        };
        let start = full_match.start();

        // "12 0 obj" inside "112 0 obj" is found by the regex as well
        if start > 0 && data[start - 1].is_ascii_digit() {
            continue;
        }

        // The byte after "obj" should start an object
        let after = skip_whitespace(data, full_match.end());
        if let Some(&next) = data.get(after) {
            if !matches!(next, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.')
                && !next.is_ascii_digit()
            {
                log::debug!("Skipping false object header at {}", start);
                continue;
            }
        }

        match parse_indirect_object(&data[start..]) {
            Ok((_, (r, obj))) => {
                objects.insert(r, obj);
            },
            Err(e) => log::warn!("Failed to parse object at byte {}: {:?}", start, e),
        }
    }

    objects
}

fn skip_whitespace(data: &[u8], mut pos: usize) -> usize {
    while pos < data.len() && crate::lexer::is_whitespace(data[pos]) {
        pos += 1;
    }
    pos
}

/// The last `trailer` dictionary in the file.
fn find_trailer(data: &[u8]) -> Option<Dict> {
    let m = RE_TRAILER.find_iter(data).last()?;
    let dict_start = m.end() - 2;
    match parse_object(&data[dict_start..]) {
        Ok((_, Object::Dictionary(d))) => Some(d),
        _ => {
            log::warn!("Unreadable trailer at byte {}", m.start());
            None
        },
    }
}

fn is_catalog(obj: &Object) -> bool {
    obj.as_dict()
        .and_then(|d| d.get("Type"))
        .and_then(Object::as_name)
        == Some("Catalog")
}

/// Build a trailer pointing at the catalog.
///
/// Cross-reference streams carry the trailer keys in their dictionary;
/// when one names a root, that root wins.
fn minimal_trailer(objects: &HashMap<ObjectRef, Object>) -> Result<Dict> {
    let mut refs: Vec<&ObjectRef> = objects.keys().collect();
    refs.sort();

    let from_xref_stream = refs.iter().rev().find_map(|r| {
        let dict = objects.get(r)?.as_dict()?;
        if dict.get("Type").and_then(Object::as_name) == Some("XRef") {
            dict.get("Root").and_then(Object::as_reference)
        } else {
            None
        }
    });

    let root = from_xref_stream
        .or_else(|| {
            refs.iter()
                .find(|r| objects.get(r).is_some_and(is_catalog))
                .map(|r| **r)
        })
        .ok_or_else(|| Error::InvalidPdf("Could not find the document catalog".to_string()))?;

    let mut trailer = Dict::new();
    trailer.insert("Root".to_string(), Object::Reference(root));
    Ok(trailer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_PDF: &[u8] = b"%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 200 100] >>
endobj
3 0 obj
<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << >> >>
endobj
4 0 obj
<< /Length 23 >>
stream
0 0 1 rg 0 0 10 10 re f
endstream
endobj
trailer
<< /Size 5 /Root 1 0 R >>
%%EOF
";

    #[test]
    fn test_load_simple_pdf() {
        let doc = Document::load(SIMPLE_PDF).unwrap();
        assert_eq!(doc.version(), (1, 4));
        assert_eq!(doc.object_count(), 4);
        assert_eq!(doc.page_count(), 1);
        let page = doc.page_info(0).unwrap();
        assert_eq!(page.media_box.width(), 200.0);
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(Document::load(b"hello"), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_no_objects() {
        assert!(matches!(Document::load(b"%PDF-1.7\n%%EOF"), Err(Error::InvalidPdf(_))));
    }

    #[test]
    fn test_catalog_without_trailer() {
        let data = b"%PDF-1.5\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n";
        let doc = Document::load(data).unwrap();
        assert_eq!(doc.page_count(), 0);
        assert_eq!(doc.trailer().get("Root"), Some(&Object::Reference(ObjectRef::new(1, 0))));
    }

    #[test]
    fn test_incremental_update_replaces_object() {
        let mut data = SIMPLE_PDF.to_vec();
        data.extend_from_slice(
            b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 50 50] >>\nendobj\n\
trailer\n<< /Size 5 /Root 1 0 R >>\n",
        );
        let doc = Document::load(&data).unwrap();
        assert_eq!(doc.page_info(0).unwrap().media_box.width(), 50.0);
    }

    #[test]
    fn test_open_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simple.pdf");
        std::fs::write(&path, SIMPLE_PDF).unwrap();
        let doc = Document::open(&path).unwrap();
        assert_eq!(doc.page_count(), 1);
    }
}
