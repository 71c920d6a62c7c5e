//! Content stream interpreter.
//!
//! [`ContentInterpreter`] executes the operators of a content stream
//! against a graphics-state stack and emits page objects (paths, text,
//! images, shadings and forms). Operators are dispatched through a sorted
//! table keyed by the operator name packed into a `u32`, so lookups are a
//! binary search over integers.
//!
//! The interpreter never fails: unknown operators are skipped, operators
//! with missing operands read zeros, and missing resources only set the
//! [`InterpreterOutput::resource_missing`] flag.
//!
//! # Examples
//!
//! ```
//! use pdf_raster::content::form::RecursionState;
//! use pdf_raster::content::graphics_state::AllStates;
//! use pdf_raster::content::interpreter::ContentInterpreter;
//! use pdf_raster::document::Document;
//! use pdf_raster::geometry::Rect;
//! use pdf_raster::object::Dict;
//!
//! let doc = Document::new();
//! let mut interpreter = ContentInterpreter::new(
//!     &doc,
//!     Dict::new(),
//!     Dict::new(),
//!     Rect::new(0.0, 0.0, 612.0, 792.0),
//!     AllStates::new(),
//!     RecursionState::new(),
//! );
//! interpreter.parse(&doc, b"1 0 0 rg 10 10 100 100 re f", 0, 0, &[]);
//! let output = interpreter.finish();
//! assert_eq!(output.objects.len(), 1);
//! ```

mod path_ops;
mod state_ops;
mod text_ops;
mod xobject_ops;

use crate::config::ParseLimits;
use crate::content::color::{ColorSpace, ColorSpaceFamily};
use crate::content::font::{Font, load_font};
use crate::content::form::RecursionState;
use crate::content::graphics_state::{AllStates, GraphicsStateStack};
use crate::content::image::Image;
use crate::content::marks::ContentMarks;
use crate::content::operand_stack::OperandStack;
use crate::content::page_object::{PageObject, PageObjectKind};
use crate::content::path::{FillType, PathPoint};
use crate::content::pattern::{Pattern, Shading};
use crate::content::stream_reader::{ElementType, StreamReader};
use crate::document::Document;
use crate::geometry::{Matrix, Point, Rect};
use crate::object::{Dict, Object};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Glyph metrics declared by `d0` or `d1` in a Type 3 glyph procedure.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Type3Metrics {
    /// Horizontal advance in glyph space
    pub width: f32,
    /// Vertical advance in glyph space
    pub height: f32,
    /// Glyph bounding box from `d1`
    pub bbox: Option<Rect>,
    /// True after `d0`: the glyph carries its own colors
    pub colored: bool,
}

/// Everything an interpreter produced.
#[derive(Debug, Default)]
pub struct InterpreterOutput {
    /// Page objects in content order
    pub objects: Vec<Rc<PageObject>>,
    /// CTM in effect at the end of each sub-stream
    pub stream_ctms: BTreeMap<usize, Matrix>,
    /// Device-independent boxes of image masks
    pub image_mask_boxes: Vec<Rect>,
    /// A nested form needs a transparent backdrop
    pub background_alpha_needed: bool,
    /// Recursion bookkeeping handed back to the caller
    pub recursion: RecursionState,
    /// Metrics captured from `d0`/`d1`, when requested
    pub type3: Option<Type3Metrics>,
    /// A named resource could not be found
    pub resource_missing: bool,
}

type Handler = fn(&mut ContentInterpreter, &Document);

/// Pack an operator name of up to four bytes into a big-endian,
/// left-aligned `u32`.
///
/// # Examples
///
/// ```
/// use pdf_raster::content::interpreter::pack_operator;
///
/// assert_eq!(pack_operator(b"q"), Some(0x7100_0000));
/// assert_eq!(pack_operator(b"BDC"), Some(0x4244_4300));
/// assert_eq!(pack_operator(b"TooLong"), None);
/// ```
pub const fn pack_operator(word: &[u8]) -> Option<u32> {
    if word.is_empty() || word.len() > 4 {
        return None;
    }
    let mut code = 0u32;
    let mut i = 0;
    while i < 4 {
        code <<= 8;
        if i < word.len() {
            code |= word[i] as u32;
        }
        i += 1;
    }
    Some(code)
}

const fn op(word: &[u8]) -> u32 {
    match pack_operator(word) {
        Some(code) => code,
        None => 0,
    }
}

type I = ContentInterpreter;

/// Operator table, sorted by packed code.
static OPERATORS: [(u32, Handler); 73] = [
    (op(b"\""), I::handle_next_line_show_text_spacing),
    (op(b"'"), I::handle_next_line_show_text),
    (op(b"B"), I::handle_fill_stroke_path),
    (op(b"B*"), I::handle_eo_fill_stroke_path),
    (op(b"BDC"), I::handle_begin_marked_content_dict),
    (op(b"BI"), I::handle_noop),
    (op(b"BMC"), I::handle_begin_marked_content),
    (op(b"BT"), I::handle_begin_text),
    (op(b"BX"), I::handle_noop),
    (op(b"CS"), I::handle_set_stroke_color_space),
    (op(b"DP"), I::handle_noop),
    (op(b"Do"), I::handle_execute_xobject),
    (op(b"EI"), I::handle_noop),
    (op(b"EMC"), I::handle_end_marked_content),
    (op(b"ET"), I::handle_end_text),
    (op(b"EX"), I::handle_noop),
    (op(b"F"), I::handle_fill_path),
    (op(b"G"), I::handle_set_stroke_gray),
    (op(b"ID"), I::handle_noop),
    (op(b"J"), I::handle_set_line_cap),
    (op(b"K"), I::handle_set_stroke_cmyk),
    (op(b"M"), I::handle_set_miter_limit),
    (op(b"MP"), I::handle_noop),
    (op(b"Q"), I::handle_restore_graph_state),
    (op(b"RG"), I::handle_set_stroke_rgb),
    (op(b"S"), I::handle_stroke_path),
    (op(b"SC"), I::handle_set_stroke_color),
    (op(b"SCN"), I::handle_set_stroke_color_pattern),
    (op(b"T*"), I::handle_move_to_next_line),
    (op(b"TD"), I::handle_move_text_point_set_leading),
    (op(b"TJ"), I::handle_show_text_positioning),
    (op(b"TL"), I::handle_set_text_leading),
    (op(b"Tc"), I::handle_set_char_space),
    (op(b"Td"), I::handle_move_text_point),
    (op(b"Tf"), I::handle_set_font),
    (op(b"Tj"), I::handle_show_text),
    (op(b"Tm"), I::handle_set_text_matrix),
    (op(b"Tr"), I::handle_set_text_render_mode),
    (op(b"Ts"), I::handle_set_text_rise),
    (op(b"Tw"), I::handle_set_word_space),
    (op(b"Tz"), I::handle_set_horz_scale),
    (op(b"W"), I::handle_clip),
    (op(b"W*"), I::handle_eo_clip),
    (op(b"b"), I::handle_close_fill_stroke_path),
    (op(b"b*"), I::handle_close_eo_fill_stroke_path),
    (op(b"c"), I::handle_curve_to_123),
    (op(b"cm"), I::handle_concat_matrix),
    (op(b"cs"), I::handle_set_fill_color_space),
    (op(b"d"), I::handle_set_dash),
    (op(b"d0"), I::handle_set_char_width),
    (op(b"d1"), I::handle_set_cached_device),
    (op(b"f"), I::handle_fill_path),
    (op(b"f*"), I::handle_eo_fill_path),
    (op(b"g"), I::handle_set_fill_gray),
    (op(b"gs"), I::handle_set_ext_graph_state),
    (op(b"h"), I::handle_close_path),
    (op(b"i"), I::handle_set_flat),
    (op(b"j"), I::handle_set_line_join),
    (op(b"k"), I::handle_set_fill_cmyk),
    (op(b"l"), I::handle_line_to),
    (op(b"m"), I::handle_move_to),
    (op(b"n"), I::handle_end_path),
    (op(b"q"), I::handle_save_graph_state),
    (op(b"re"), I::handle_rectangle),
    (op(b"rg"), I::handle_set_fill_rgb),
    (op(b"ri"), I::handle_set_rendering_intent),
    (op(b"s"), I::handle_close_stroke_path),
    (op(b"sc"), I::handle_set_fill_color),
    (op(b"scn"), I::handle_set_fill_color_pattern),
    (op(b"sh"), I::handle_shade_fill),
    (op(b"v"), I::handle_curve_to_23),
    (op(b"w"), I::handle_set_line_width),
    (op(b"y"), I::handle_curve_to_13),
];

/// Executes content stream operators and collects page objects.
pub struct ContentInterpreter {
    limits: ParseLimits,
    resources: Dict,
    page_resources: Dict,
    bbox: Rect,
    content_to_user: Matrix,
    states: GraphicsStateStack,
    operands: OperandStack,
    /// Marked-content stack; the bottom entry is an empty sentinel
    marks: Vec<ContentMarks>,
    path_points: Vec<PathPoint>,
    path_start: Point,
    path_current: Point,
    pending_clip: FillType,
    clip_texts: Vec<Rc<PageObject>>,
    objects: Vec<Rc<PageObject>>,
    stream_ctms: BTreeMap<usize, Matrix>,
    stream_offsets: Vec<usize>,
    position: usize,
    recursion: RecursionState,
    type3: Option<Type3Metrics>,
    last_image: Option<(String, Rc<Image>)>,
    resource_missing: bool,
    background_alpha_needed: bool,
    image_mask_boxes: Vec<Rect>,
}

impl ContentInterpreter {
    /// Create an interpreter.
    ///
    /// `resources` are searched before `page_resources`. `bbox` bounds
    /// shadings painted with `sh` when no clip is set.
    pub fn new(
        doc: &Document,
        resources: Dict,
        page_resources: Dict,
        bbox: Rect,
        states: AllStates,
        recursion: RecursionState,
    ) -> Self {
        Self {
            limits: *doc.limits(),
            resources,
            page_resources,
            bbox,
            content_to_user: Matrix::identity(),
            states: GraphicsStateStack::with_state(states),
            operands: OperandStack::new(),
            marks: vec![ContentMarks::new()],
            path_points: Vec::new(),
            path_start: Point::default(),
            path_current: Point::default(),
            pending_clip: FillType::NoFill,
            clip_texts: Vec::new(),
            objects: Vec::new(),
            stream_ctms: BTreeMap::new(),
            stream_offsets: Vec::new(),
            position: 0,
            recursion,
            type3: None,
            last_image: None,
            resource_missing: false,
            background_alpha_needed: false,
            image_mask_boxes: Vec::new(),
        }
    }

    /// Map object coordinates through `matrix` after the CTM.
    pub fn set_content_to_user(&mut self, matrix: Matrix) {
        self.content_to_user = matrix;
    }

    /// Record `d0`/`d1` metrics for [`InterpreterOutput::type3`].
    pub fn enable_type3_metrics(&mut self) {
        self.type3 = Some(Type3Metrics::default());
    }

    /// The graphics state stack.
    pub fn states(&self) -> &GraphicsStateStack {
        &self.states
    }

    /// Objects emitted so far.
    pub fn objects(&self) -> &[Rc<PageObject>] {
        &self.objects
    }

    /// True once a named resource lookup failed.
    pub fn resource_missing(&self) -> bool {
        self.resource_missing
    }

    /// Interpret `data` from byte `start`.
    ///
    /// Stops after `max_cost` new objects when `max_cost` is non-zero, so
    /// a page can be parsed in slices. `stream_offsets` holds the start of
    /// each concatenated sub-stream and is used to tag objects with the
    /// stream they came from. Returns the position reached.
    pub fn parse(&mut self, doc: &Document, data: &[u8], start: usize, max_cost: usize, stream_offsets: &[usize]) -> usize {
        self.stream_offsets = stream_offsets.to_vec();
        let initial = self.objects.len();
        let mut reader = StreamReader::new(data, start, self.limits);
        loop {
            let cost = self.objects.len() - initial;
            if max_cost > 0 && cost >= max_cost {
                break;
            }
            match reader.parse_next_element() {
                ElementType::EndOfData => break,
                ElementType::Keyword => {
                    self.position = reader.position();
                    let word = reader.word();
                    self.on_operator(doc, word, &mut reader);
                    self.operands.clear();
                },
                ElementType::Number => self.operands.add_number(reader.number()),
                ElementType::Name => self.operands.add_name(reader.name()),
                ElementType::Other => {
                    if let Some(obj) = reader.take_object() {
                        self.operands.add_object(obj);
                    }
                },
            }
        }
        reader.position()
    }

    /// Hand back the produced objects and bookkeeping.
    pub fn finish(self) -> InterpreterOutput {
        InterpreterOutput {
            objects: self.objects,
            stream_ctms: self.stream_ctms,
            image_mask_boxes: self.image_mask_boxes,
            background_alpha_needed: self.background_alpha_needed,
            recursion: self.recursion,
            type3: self.type3,
            resource_missing: self.resource_missing,
        }
    }

    fn on_operator(&mut self, doc: &Document, word: &[u8], reader: &mut StreamReader<'_>) {
        if word == b"BI" {
            self.handle_begin_image(doc, reader);
            return;
        }
        let Some(code) = pack_operator(word) else {
            log::trace!("Skipping operator {}", String::from_utf8_lossy(word));
            return;
        };
        match OPERATORS.binary_search_by_key(&code, |(c, _)| *c) {
            Ok(index) => {
                #[cfg(feature = "logging")]
                log::trace!("{} with {} operands", String::from_utf8_lossy(word), self.operands.len());
                (OPERATORS[index].1)(self, doc);
            },
            Err(_) => log::trace!("Unknown operator {}", String::from_utf8_lossy(word)),
        }
        if code == op(b"m") && self.operands.len() == 2 {
            self.parse_path_fast(reader);
        }
    }

    fn handle_noop(&mut self, _doc: &Document) {}

    /// Index of the sub-stream the current operator came from.
    fn current_stream_index(&self) -> Option<usize> {
        let after = self.stream_offsets.partition_point(|&offset| offset <= self.position);
        after.checked_sub(1)
    }

    fn current_marks(&self) -> &ContentMarks {
        // The sentinel keeps the stack non-empty
        &self.marks[self.marks.len() - 1]
    }

    /// CTM followed by the content-to-user matrix.
    fn object_matrix(&self) -> Matrix {
        self.states.current().ctm.multiply(&self.content_to_user)
    }

    /// A new page object carrying the requested parts of the current state.
    fn new_object(&self, kind: PageObjectKind, color: bool, text: bool, graph: bool) -> PageObject {
        let mut obj = PageObject::new(kind);
        obj.set_graphic_states(self.states.current(), color, text, graph);
        obj.marks = self.current_marks().clone();
        obj.content_stream = self.current_stream_index();
        obj
    }

    fn append_object(&mut self, obj: Rc<PageObject>) {
        self.objects.push(obj);
    }

    /// Bytes of a string operand (names give their UTF-8 bytes).
    fn string_bytes(&mut self, index: usize) -> Vec<u8> {
        match self.operands.object(index) {
            Some(Object::String(bytes)) => bytes.clone(),
            Some(Object::Name(name)) => name.as_bytes().to_vec(),
            _ => Vec::new(),
        }
    }

    /// A named resource of `category`, from the local resources first and
    /// then the page. The entry is returned unresolved.
    fn find_resource(&self, doc: &Document, category: &str, name: &str) -> Option<Object> {
        [&self.resources, &self.page_resources].into_iter().find_map(|resources| {
            let entry = doc.dict_get_dict(resources, category)?.get(name)?;
            if doc.resolve(entry).is_null() {
                None
            } else {
                Some(entry.clone())
            }
        })
    }

    /// The category dictionary holding `name`, with the resolved entry.
    fn find_resource_holder(&self, doc: &Document, category: &str, name: &str) -> Option<(Object, Dict)> {
        [&self.resources, &self.page_resources].into_iter().find_map(|resources| {
            let entry = doc.dict_get_dict(resources, category)?.get(name)?;
            let dict = doc.resolve(entry).as_dict()?.clone();
            Some((entry.clone(), dict))
        })
    }

    fn find_font(&mut self, doc: &Document, name: &str) -> Rc<dyn Font> {
        let found = self
            .find_resource(doc, "Font", name)
            .filter(|obj| doc.resolve(obj).as_dict().is_some());
        let Some(obj) = found else {
            log::debug!("Font {} not found", name);
            self.resource_missing = true;
            return doc.stock_font();
        };
        match load_font(doc, &obj) {
            Some(font) => {
                if let Some(type3) = font.as_type3() {
                    type3.set_page_resources(&self.resources);
                }
                font
            },
            None => doc.stock_font(),
        }
    }

    fn find_color_space(&mut self, doc: &Document, name: &str) -> Option<Rc<ColorSpace>> {
        if name == "Pattern" {
            return Some(ColorSpace::stock(ColorSpaceFamily::Pattern));
        }
        if let Some(stock) = ColorSpace::stock_by_name(name) {
            let default_name = match name {
                "DeviceGray" | "G" => "DefaultGray",
                "DeviceRGB" | "RGB" => "DefaultRGB",
                _ => "DefaultCMYK",
            };
            let default = self
                .find_resource(doc, "ColorSpace", default_name)
                .and_then(|obj| ColorSpace::load(doc, &obj))
                .filter(|cs| cs.components() == stock.components());
            return Some(default.unwrap_or(stock));
        }
        match self.find_resource(doc, "ColorSpace", name) {
            Some(obj) => ColorSpace::load(doc, &obj),
            None => {
                log::debug!("Color space {} not found", name);
                self.resource_missing = true;
                None
            },
        }
    }

    fn find_pattern(&mut self, doc: &Document, name: &str) -> Option<Rc<Pattern>> {
        let found = self
            .find_resource(doc, "Pattern", name)
            .filter(|obj| matches!(doc.resolve(obj), Object::Dictionary(_) | Object::Stream { .. }));
        match found {
            Some(obj) => Pattern::load(doc, &obj),
            None => {
                self.resource_missing = true;
                None
            },
        }
    }

    fn find_shading(&mut self, doc: &Document, name: &str) -> Option<Rc<Shading>> {
        let found = self
            .find_resource(doc, "Shading", name)
            .filter(|obj| matches!(doc.resolve(obj), Object::Dictionary(_) | Object::Stream { .. }));
        match found {
            Some(obj) => Shading::load(doc, &obj),
            None => {
                self.resource_missing = true;
                None
            },
        }
    }
}
