//! Pages: attributes, content parsing and the display matrix.
//!
//! A page's `/Contents` may be a single stream or an array of streams.
//! The decoded streams are joined with a space and parsed as one, with
//! the start offset of each part recorded so objects can be traced back
//! to the stream they came from.
//!
//! Parsing can run in one go with [`Page::parse_content`] or in slices
//! with [`Page::start_parse`] and [`Page::continue_parse`].
//!
//! # Examples
//!
//! ```
//! use pdf_raster::document::Document;
//! use pdf_raster::geometry::Rect;
//! use pdf_raster::object::Dict;
//! use pdf_raster::page::Page;
//!
//! let mut doc = Document::new();
//! let index = doc.add_page(Rect::new(0.0, 0.0, 200.0, 200.0), Dict::new(), b"1 0 0 rg 10 10 100 100 re f");
//! let mut page = Page::new(&doc, index).unwrap();
//! page.parse_content(&doc);
//! assert_eq!(page.objects().len(), 1);
//! ```

use crate::content::form::RecursionState;
use crate::content::graphics_state::AllStates;
use crate::content::interpreter::ContentInterpreter;
use crate::content::page_object::{PageObject, PageObjectHolder, ParseState, Transparency};
use crate::document::{Document, PageInfo};
use crate::error::Result;
use crate::geometry::{Matrix, Rect};
use crate::object::{Dict, Object};
use std::rc::Rc;

/// One page of a document.
#[derive(Debug)]
pub struct Page {
    index: usize,
    info: PageInfo,
    holder: PageObjectHolder,
    parser: Option<PageParser>,
}

struct PageParser {
    interpreter: ContentInterpreter,
    data: Vec<u8>,
    offsets: Vec<usize>,
    position: usize,
}

impl std::fmt::Debug for PageParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageParser")
            .field("len", &self.data.len())
            .field("streams", &self.offsets.len())
            .field("position", &self.position)
            .finish()
    }
}

impl Page {
    /// Look up page `index` (zero-based).
    pub fn new(doc: &Document, index: usize) -> Result<Self> {
        let info = doc.page_info(index)?.clone();
        let holder = PageObjectHolder {
            bbox: info.crop_box,
            transparency: Transparency::from_dict(doc, &info.dict),
            ..PageObjectHolder::default()
        };
        Ok(Self {
            index,
            info,
            holder,
            parser: None,
        })
    }

    /// Zero-based page index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The media box.
    pub fn media_box(&self) -> Rect {
        self.info.media_box
    }

    /// The crop box; this is the visible area.
    pub fn crop_box(&self) -> Rect {
        self.info.crop_box
    }

    /// Rotation in degrees, normalized to 0, 90, 180 or 270.
    pub fn rotate(&self) -> i32 {
        self.info.rotate.rem_euclid(360) / 90 * 90
    }

    /// The page's resource dictionary.
    pub fn resources(&self) -> &Dict {
        &self.info.resources
    }

    /// The page dictionary.
    pub fn dict(&self) -> &Dict {
        &self.info.dict
    }

    /// Parsed objects and page-level rendering attributes.
    pub fn holder(&self) -> &PageObjectHolder {
        &self.holder
    }

    /// Parsed objects in painting order.
    pub fn objects(&self) -> &[Rc<PageObject>] {
        &self.holder.objects
    }

    /// True once the whole content has been parsed.
    pub fn is_parsed(&self) -> bool {
        self.holder.is_parsed()
    }

    /// Parse the whole content stream.
    pub fn parse_content(&mut self, doc: &Document) {
        self.start_parse(doc);
        self.continue_parse(doc, 0);
    }

    /// Decode the content streams and prepare an interpreter.
    ///
    /// Does nothing when parsing already started.
    pub fn start_parse(&mut self, doc: &Document) {
        if self.holder.parse_state != ParseState::NotParsed {
            return;
        }
        self.holder.parse_state = ParseState::Parsing;
        let (data, offsets) = collect_contents(doc, doc.dict_get(&self.info.dict, "Contents"));
        let interpreter = ContentInterpreter::new(
            doc,
            self.info.resources.clone(),
            self.info.resources.clone(),
            self.info.crop_box,
            AllStates::new(),
            RecursionState::new(),
        );
        self.parser = Some(PageParser {
            interpreter,
            data,
            offsets,
            position: 0,
        });
    }

    /// Parse until `max_cost` more objects have been produced, or to the
    /// end when `max_cost` is zero. Returns true once parsing is complete.
    pub fn continue_parse(&mut self, doc: &Document, max_cost: usize) -> bool {
        let Some(parser) = self.parser.as_mut() else {
            return self.holder.is_parsed();
        };
        let before = parser.interpreter.objects().len();
        parser.position = parser
            .interpreter
            .parse(doc, &parser.data, parser.position, max_cost, &parser.offsets);
        let produced = parser.interpreter.objects().len() - before;
        for obj in &parser.interpreter.objects()[before..] {
            self.holder.append(obj.clone());
        }
        if max_cost > 0 && produced >= max_cost && parser.position < parser.data.len() {
            return false;
        }

        if let Some(parser) = self.parser.take() {
            let output = parser.interpreter.finish();
            self.holder.objects = output.objects;
            self.holder.stream_ctms = output.stream_ctms;
            self.holder.image_mask_boxes = output.image_mask_boxes;
            self.holder.background_alpha_needed =
                output.background_alpha_needed || self.holder.transparency.isolated;
            log::debug!(
                "Page {} parsed: {} objects",
                self.index,
                self.holder.objects.len()
            );
        }
        self.holder.parse_state = ParseState::Parsed;
        true
    }

    /// Size in pixels of the page rendered at `scale` device pixels per
    /// point, rotation applied.
    pub fn pixel_size(&self, scale: f32) -> (u32, u32) {
        let crop = self.info.crop_box;
        let w = (crop.width() * scale).round().max(1.0) as u32;
        let h = (crop.height() * scale).round().max(1.0) as u32;
        match self.rotate() {
            90 | 270 => (h, w),
            _ => (w, h),
        }
    }

    /// Map page space to device pixels: origin at the top left of the
    /// crop box, y growing downwards, rotated clockwise by `/Rotate`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::document::Document;
    /// use pdf_raster::geometry::{Point, Rect};
    /// use pdf_raster::object::Dict;
    /// use pdf_raster::page::Page;
    ///
    /// let mut doc = Document::new();
    /// let index = doc.add_page(Rect::new(0.0, 0.0, 100.0, 50.0), Dict::new(), b"");
    /// let page = Page::new(&doc, index).unwrap();
    /// let m = page.display_matrix(2.0);
    /// assert_eq!(m.transform(Point::new(0.0, 50.0)), Point::new(0.0, 0.0));
    /// assert_eq!(m.transform(Point::new(100.0, 0.0)), Point::new(200.0, 100.0));
    /// ```
    pub fn display_matrix(&self, scale: f32) -> Matrix {
        let crop = self.info.crop_box;
        let (w, h) = (crop.width(), crop.height());
        let flip = Matrix::new(1.0, 0.0, 0.0, -1.0, -crop.left, crop.top);
        let rotation = match self.rotate() {
            90 => Matrix::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
            180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h),
            270 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
            _ => Matrix::identity(),
        };
        flip.multiply(&rotation).multiply(&Matrix::scaling(scale, scale))
    }
}

/// Decode `/Contents` and join the parts, returning the data and the start
/// offset of each part.
fn collect_contents(doc: &Document, contents: &Object) -> (Vec<u8>, Vec<usize>) {
    let parts: Vec<&Object> = match doc.resolve(contents) {
        Object::Array(items) => items.iter().collect(),
        Object::Null => Vec::new(),
        _ => vec![contents],
    };
    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(parts.len());
    for part in parts {
        match doc.decode_stream(part) {
            Ok(bytes) => {
                offsets.push(data.len());
                data.extend_from_slice(&bytes);
                data.push(b' ');
            },
            Err(e) => log::warn!("Skipping unreadable content stream: {}", e),
        }
    }
    (data, offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn page_with(content: &[u8]) -> (Document, usize) {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 200.0, 100.0), Dict::new(), content);
        (doc, index)
    }

    #[test]
    fn test_parse_content() {
        let (doc, index) = page_with(b"q 2 0 0 2 0 0 cm 0 0 10 10 re f Q 0 0 m 5 5 l S");
        let mut page = Page::new(&doc, index).unwrap();
        assert!(!page.is_parsed());
        page.parse_content(&doc);
        assert!(page.is_parsed());
        assert_eq!(page.objects().len(), 2);
        assert_eq!(page.objects()[0].rect, Rect::new(0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn test_progressive_parse() {
        let (doc, index) = page_with(b"0 0 1 1 re f 1 1 1 1 re f 2 2 1 1 re f");
        let mut page = Page::new(&doc, index).unwrap();
        page.start_parse(&doc);
        assert!(!page.continue_parse(&doc, 1));
        assert_eq!(page.objects().len(), 1);
        assert!(!page.continue_parse(&doc, 1));
        assert_eq!(page.objects().len(), 2);
        while !page.continue_parse(&doc, 1) {}
        assert_eq!(page.objects().len(), 3);
        assert!(page.is_parsed());
    }

    #[test]
    fn test_content_array_offsets() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 10.0, 10.0), Dict::new(), b"0 0 1 1 re");
        let first = doc.page_info(index).unwrap().dict.get("Contents").cloned().unwrap();
        let second = doc.add(Object::Stream {
            dict: Dict::new(),
            data: bytes::Bytes::from_static(b"f"),
        });
        let (data, offsets) = collect_contents(&doc, &Object::Array(vec![first, Object::Reference(second)]));
        assert_eq!(data, b"0 0 1 1 re f ".to_vec());
        assert_eq!(offsets, vec![0, 11]);
    }

    #[test]
    fn test_display_matrix_rotation() {
        let mut doc = Document::new();
        let mut rotated_page = |rotate: i32| {
            let index = doc.add_page(Rect::new(0.0, 0.0, 100.0, 50.0), Dict::new(), b"");
            let mut page = Page::new(&doc, index).unwrap();
            page.info.rotate = rotate;
            page
        };
        let page = rotated_page(90);
        assert_eq!(page.pixel_size(1.0), (50, 100));
        let m = page.display_matrix(1.0);
        // The top left corner of the unrotated page moves to the top right
        assert_eq!(m.transform(Point::new(0.0, 50.0)), Point::new(50.0, 0.0));

        let page = rotated_page(180);
        let m = page.display_matrix(1.0);
        assert_eq!(m.transform(Point::new(0.0, 50.0)), Point::new(100.0, 50.0));

        let page = rotated_page(-90);
        assert_eq!(page.rotate(), 270);
        let m = page.display_matrix(1.0);
        assert_eq!(m.transform(Point::new(0.0, 50.0)), Point::new(0.0, 100.0));
    }
}
