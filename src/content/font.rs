//! Fonts as seen by the content interpreter and the text renderer.
//!
//! Metrics are expressed in 1/1000 of text space and glyph outlines in the
//! same units, so a glyph is placed with `Matrix::scaling(size / 1000, ...)`.
//! Embedded TrueType and OpenType programs are read with `ttf-parser`; any
//! font without a usable program falls back to box glyphs.

use crate::content::form::Form;
use crate::content::path::{Path, PointKind};
use crate::document::Document;
use crate::geometry::{Matrix, Point, Rect};
use crate::object::{Dict, Object};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use ttf_parser::{Face, GlyphId, OutlineBuilder, PlatformId};

/// Width used by the stock font for every code.
const STOCK_WIDTH: f32 = 600.0;

/// Default vertical metrics (`/DW2`).
const DEFAULT_VERT_ORIGIN_Y: f32 = 880.0;
const DEFAULT_VERT_WIDTH: f32 = -1000.0;

/// A font resource.
pub trait Font: std::fmt::Debug {
    /// The `/BaseFont` name.
    fn name(&self) -> &str;

    /// Horizontal advance of `code` in 1/1000 text space units.
    fn char_width(&self, code: u32) -> f32;

    /// Glyph bounding box of `code` in 1/1000 text space units.
    fn char_bbox(&self, code: u32) -> Rect;

    /// Glyph outline of `code` in 1/1000 text space units.
    fn glyph_path(&self, code: u32) -> Option<Path>;

    /// Split a string operand into character codes.
    fn split_codes(&self, bytes: &[u8]) -> Vec<u32> {
        bytes.iter().map(|&b| u32::from(b)).collect()
    }

    /// True for fonts written top to bottom.
    fn is_vert_writing(&self) -> bool {
        false
    }

    /// Vertical advance of `code` (negative, downwards).
    fn vert_width(&self, _code: u32) -> f32 {
        DEFAULT_VERT_WIDTH
    }

    /// Position vector from the horizontal to the vertical origin.
    fn vert_origin(&self, code: u32) -> (f32, f32) {
        (self.char_width(code) / 2.0, DEFAULT_VERT_ORIGIN_Y)
    }

    /// True when `Tw` applies to `code`.
    fn is_word_space(&self, code: u32) -> bool {
        code == 32
    }

    /// The Type 3 view of this font.
    fn as_type3(&self) -> Option<&Type3Font> {
        None
    }
}

/// Load the font described by `obj`, caching it in the document.
///
/// Repeated loads of the same font give the same `Rc`, whether the font is
/// an indirect object or a direct dictionary.
pub fn load_font(doc: &Document, obj: &Object) -> Option<Rc<dyn Font>> {
    let reference = obj.as_reference();
    if let Some(r) = reference {
        if let Some(font) = doc.cache.fonts.borrow().get(&r) {
            return Some(font.clone());
        }
    }

    let dict = doc.resolve(obj).as_dict()?;
    if reference.is_none() {
        let cached = doc
            .cache
            .direct_fonts
            .borrow()
            .iter()
            .find(|(key, _)| key == dict)
            .map(|(_, font)| font.clone());
        if cached.is_some() {
            return cached;
        }
    }
    let subtype = doc.dict_get(dict, "Subtype").as_name().unwrap_or("Type1");
    let font: Rc<dyn Font> = match subtype {
        "Type0" => Rc::new(CidFont::load(doc, dict)?),
        "Type3" => Rc::new(Type3Font::load(doc, dict)?),
        _ => Rc::new(SimpleFont::load(doc, dict)),
    };
    log::debug!("Loaded {} font {}", subtype, font.name());

    match reference {
        Some(r) => {
            doc.cache.fonts.borrow_mut().insert(r, font.clone());
        },
        None => doc.cache.direct_fonts.borrow_mut().push((dict.clone(), font.clone())),
    }
    Some(font)
}

/// Box glyph used when no glyph program is available.
///
/// Capitals and digits reach cap height, lower case letters x-height and
/// everything else sits in between. Spaces and control codes have no outline.
fn box_glyph(code: u32, width: f32) -> Option<Path> {
    let ch = char::from_u32(code)?;
    if ch.is_whitespace() || ch.is_control() || width <= 0.0 {
        return None;
    }
    let top = if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
        700.0
    } else if ch.is_ascii_lowercase() {
        500.0
    } else {
        600.0
    };
    let mut path = Path::new();
    path.append_rect(width * 0.1, 0.0, width * 0.9, top);
    Some(path)
}

fn box_bbox(code: u32, width: f32) -> Rect {
    box_glyph(code, width).map_or_else(Rect::default, |p| p.bounding_box())
}

/// The built-in fallback font: fixed widths and box glyphs.
#[derive(Debug, Clone)]
pub struct StockFont {
    name: String,
}

impl StockFont {
    /// Create a stock font reporting `name` as its base font.
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl Font for StockFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn char_width(&self, _code: u32) -> f32 {
        STOCK_WIDTH
    }

    fn char_bbox(&self, code: u32) -> Rect {
        box_bbox(code, STOCK_WIDTH)
    }

    fn glyph_path(&self, code: u32) -> Option<Path> {
        box_glyph(code, STOCK_WIDTH)
    }
}

/// Converts `ttf-parser` outlines into paths in 1/1000 em units.
struct GlyphOutline {
    path: Path,
    scale: f32,
    last: Point,
}

impl GlyphOutline {
    fn point(&self, x: f32, y: f32) -> Point {
        Point::new(x * self.scale, y * self.scale)
    }
}

impl OutlineBuilder for GlyphOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.path.append_point(p, PointKind::Move);
        self.last = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.path.append_point(p, PointKind::Line);
        self.last = p;
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let q = self.point(x1, y1);
        let end = self.point(x, y);
        let c1 = Point::new(
            self.last.x + (q.x - self.last.x) * 2.0 / 3.0,
            self.last.y + (q.y - self.last.y) * 2.0 / 3.0,
        );
        let c2 = Point::new(end.x + (q.x - end.x) * 2.0 / 3.0, end.y + (q.y - end.y) * 2.0 / 3.0);
        self.path.append_point(c1, PointKind::Bezier);
        self.path.append_point(c2, PointKind::Bezier);
        self.path.append_point(end, PointKind::Bezier);
        self.last = end;
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = self.point(x1, y1);
        let c2 = self.point(x2, y2);
        let end = self.point(x, y);
        self.path.append_point(c1, PointKind::Bezier);
        self.path.append_point(c2, PointKind::Bezier);
        self.path.append_point(end, PointKind::Bezier);
        self.last = end;
    }

    fn close(&mut self) {
        self.path.close_figure();
    }
}

/// An embedded TrueType/OpenType program.
///
/// `Face` borrows its data, so the face is re-parsed on demand and outlines
/// are cached per glyph id.
struct FontProgram {
    data: Rc<Vec<u8>>,
    units_per_em: f32,
    outlines: RefCell<HashMap<u16, Option<Path>>>,
}

impl std::fmt::Debug for FontProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontProgram")
            .field("len", &self.data.len())
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontProgram {
    fn parse(data: Vec<u8>) -> Option<Self> {
        let units_per_em = match Face::parse(&data, 0) {
            Ok(face) => f32::from(face.units_per_em().max(1)),
            Err(e) => {
                log::warn!("Failed to parse embedded font program: {}", e);
                return None;
            },
        };
        Some(Self {
            data: Rc::new(data),
            units_per_em,
            outlines: RefCell::new(HashMap::new()),
        })
    }

    fn load(doc: &Document, descriptor: Option<&Dict>) -> Option<Self> {
        let descriptor = descriptor?;
        for key in ["FontFile2", "FontFile3"] {
            let file = doc.dict_get(descriptor, key);
            if file.is_null() {
                continue;
            }
            if key == "FontFile3" {
                let subtype = file
                    .as_stream()
                    .and_then(|(d, _)| doc.dict_get(d, "Subtype").as_name());
                if subtype != Some("OpenType") {
                    log::debug!("Bare CFF font programs are drawn with box glyphs");
                    return None;
                }
            }
            return match doc.decode_stream(file) {
                Ok(data) => Self::parse(data),
                Err(e) => {
                    log::warn!("Failed to decode font program: {}", e);
                    None
                },
            };
        }
        None
    }

    fn with_face<R>(&self, f: impl FnOnce(&Face<'_>) -> Option<R>) -> Option<R> {
        Face::parse(&self.data, 0).ok().and_then(|face| f(&face))
    }

    fn scale(&self) -> f32 {
        1000.0 / self.units_per_em
    }

    /// Glyph for a single-byte code: by glyph name, by Unicode, then through
    /// the symbolic and Macintosh cmaps.
    fn glyph_for_code(&self, code: u8, name: Option<&str>) -> Option<GlyphId> {
        self.with_face(|face| {
            if let Some(name) = name {
                if let Some(gid) = face.glyph_index_by_name(name) {
                    return Some(gid);
                }
                if let Some(gid) = glyph_name_to_unicode(name).and_then(|c| face.glyph_index(c)) {
                    return Some(gid);
                }
            }
            if let Some(gid) = winansi_to_unicode(code).and_then(|c| face.glyph_index(c)) {
                return Some(gid);
            }
            let cmap = face.tables().cmap?;
            for subtable in cmap.subtables {
                let gid = match (subtable.platform_id, subtable.encoding_id) {
                    (PlatformId::Windows, 0) => subtable
                        .glyph_index(0xF000 + u32::from(code))
                        .or_else(|| subtable.glyph_index(u32::from(code))),
                    (PlatformId::Macintosh, 0) => subtable.glyph_index(u32::from(code)),
                    _ => None,
                };
                if gid.is_some() {
                    return gid;
                }
            }
            None
        })
    }

    fn advance(&self, gid: GlyphId) -> Option<f32> {
        let scale = self.scale();
        self.with_face(|face| face.glyph_hor_advance(gid).map(|w| f32::from(w) * scale))
    }

    fn bbox(&self, gid: GlyphId) -> Option<Rect> {
        let scale = self.scale();
        self.with_face(|face| {
            face.glyph_bounding_box(gid).map(|r| {
                Rect::new(
                    f32::from(r.x_min) * scale,
                    f32::from(r.y_min) * scale,
                    f32::from(r.x_max) * scale,
                    f32::from(r.y_max) * scale,
                )
            })
        })
    }

    fn outline(&self, gid: GlyphId) -> Option<Path> {
        if let Some(cached) = self.outlines.borrow().get(&gid.0) {
            return cached.clone();
        }
        let scale = self.scale();
        let path = self.with_face(|face| {
            let mut builder = GlyphOutline {
                path: Path::new(),
                scale,
                last: Point::default(),
            };
            face.outline_glyph(gid, &mut builder)?;
            Some(builder.path)
        });
        self.outlines.borrow_mut().insert(gid.0, path.clone());
        path
    }
}

/// Maps WinAnsi codes to Unicode; 0x80..0x9F differ from Latin-1.
fn winansi_to_unicode(code: u8) -> Option<char> {
    let cp = match code {
        0x80 => 0x20AC,
        0x82 => 0x201A,
        0x83 => 0x0192,
        0x84 => 0x201E,
        0x85 => 0x2026,
        0x86 => 0x2020,
        0x87 => 0x2021,
        0x88 => 0x02C6,
        0x89 => 0x2030,
        0x8A => 0x0160,
        0x8B => 0x2039,
        0x8C => 0x0152,
        0x8E => 0x017D,
        0x91 => 0x2018,
        0x92 => 0x2019,
        0x93 => 0x201C,
        0x94 => 0x201D,
        0x95 => 0x2022,
        0x96 => 0x2013,
        0x97 => 0x2014,
        0x98 => 0x02DC,
        0x99 => 0x2122,
        0x9A => 0x0161,
        0x9B => 0x203A,
        0x9C => 0x0153,
        0x9E => 0x017E,
        0x9F => 0x0178,
        0x80..=0x9F => return None,
        c => u32::from(c),
    };
    char::from_u32(cp)
}

/// Unicode value of a glyph name: `uniXXXX`, `uXXXX[XX]`, single letters and
/// the common punctuation names.
pub fn glyph_name_to_unicode(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 {
            return u32::from_str_radix(&hex[..4], 16).ok().and_then(char::from_u32);
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Ok(cp) = u32::from_str_radix(hex, 16) {
                return char::from_u32(cp);
            }
        }
    }
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c);
        }
    }
    let c = match name {
        "space" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" | "quoteright" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "underscore" => '_',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "bullet" => '\u{2022}',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        _ => return None,
    };
    Some(c)
}

/// `/Differences` of an encoding dictionary as a code -> glyph name map.
fn load_differences(doc: &Document, encoding: &Object) -> HashMap<u32, String> {
    let mut names = HashMap::new();
    let Some(array) = encoding
        .as_dict()
        .and_then(|d| doc.dict_get(d, "Differences").as_array())
    else {
        return names;
    };
    let mut code = 0u32;
    for item in array {
        match doc.resolve(item) {
            Object::Integer(n) => code = (*n).clamp(0, 255) as u32,
            Object::Name(name) => {
                names.insert(code, name.clone());
                code += 1;
            },
            _ => {},
        }
    }
    names
}

/// Type 1, TrueType and MMType1 fonts with single-byte codes.
#[derive(Debug)]
pub struct SimpleFont {
    name: String,
    first_char: u32,
    widths: Vec<f32>,
    missing_width: f32,
    font_bbox: Option<Rect>,
    differences: HashMap<u32, String>,
    program: Option<FontProgram>,
}

impl SimpleFont {
    /// Read a simple font dictionary. Never fails: missing parts fall back
    /// to stock metrics and box glyphs.
    pub fn load(doc: &Document, dict: &Dict) -> Self {
        let name = doc
            .dict_get(dict, "BaseFont")
            .as_name()
            .unwrap_or("Unnamed")
            .to_string();
        let first_char = doc
            .dict_get(dict, "FirstChar")
            .as_integer()
            .unwrap_or(0)
            .clamp(0, 255) as u32;
        let widths = doc.number_array(doc.dict_get(dict, "Widths")).unwrap_or_default();
        let descriptor = doc.dict_get_dict(dict, "FontDescriptor");
        let missing_width = descriptor
            .and_then(|d| doc.dict_get_number(d, "MissingWidth"))
            .unwrap_or(0.0);
        let font_bbox = descriptor
            .and_then(|d| doc.number_array(doc.dict_get(d, "FontBBox")))
            .and_then(|v| Rect::from_array(&v));
        let differences = load_differences(doc, doc.dict_get(dict, "Encoding"));
        let program = FontProgram::load(doc, descriptor);

        Self {
            name,
            first_char,
            widths,
            missing_width,
            font_bbox,
            differences,
            program,
        }
    }

    fn glyph(&self, code: u32) -> Option<GlyphId> {
        let program = self.program.as_ref()?;
        let byte = u8::try_from(code).ok()?;
        program.glyph_for_code(byte, self.differences.get(&code).map(String::as_str))
    }
}

impl Font for SimpleFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn char_width(&self, code: u32) -> f32 {
        if let Some(index) = code.checked_sub(self.first_char) {
            if let Some(w) = self.widths.get(index as usize) {
                return *w;
            }
        }
        if self.missing_width > 0.0 {
            return self.missing_width;
        }
        if let (Some(program), Some(gid)) = (self.program.as_ref(), self.glyph(code)) {
            if let Some(w) = program.advance(gid) {
                return w;
            }
        }
        if self.widths.is_empty() {
            STOCK_WIDTH
        } else {
            0.0
        }
    }

    fn char_bbox(&self, code: u32) -> Rect {
        if let (Some(program), Some(gid)) = (self.program.as_ref(), self.glyph(code)) {
            if let Some(rect) = program.bbox(gid) {
                return rect;
            }
        }
        if self.program.is_none() {
            return box_bbox(code, self.char_width(code));
        }
        self.font_bbox.unwrap_or_default()
    }

    fn glyph_path(&self, code: u32) -> Option<Path> {
        match (self.program.as_ref(), self.glyph(code)) {
            (Some(program), Some(gid)) => program.outline(gid),
            (Some(_), None) => None,
            (None, _) => box_glyph(code, self.char_width(code)),
        }
    }
}

/// One `/W` or `/W2` run.
#[derive(Debug, Clone)]
struct MetricRun<T> {
    first: u32,
    last: u32,
    values: Vec<T>,
    // true when one value applies to the whole range
    constant: bool,
}

fn lookup_run<T: Clone>(runs: &[MetricRun<T>], cid: u32) -> Option<T> {
    runs.iter().find(|r| (r.first..=r.last).contains(&cid)).and_then(|r| {
        if r.constant {
            r.values.first().cloned()
        } else {
            r.values.get((cid - r.first) as usize).cloned()
        }
    })
}

/// Parse a `/W`-style array where each entry holds `group` numbers.
fn load_metric_runs(doc: &Document, obj: &Object, group: usize) -> Vec<MetricRun<Vec<f32>>> {
    let mut runs = Vec::new();
    let Some(items) = doc.resolve(obj).as_array() else {
        return runs;
    };
    let mut i = 0;
    while i < items.len() {
        let Some(first) = doc.resolve(&items[i]).as_integer() else {
            break;
        };
        let first = first.max(0) as u32;
        match items.get(i + 1).map(|o| doc.resolve(o)) {
            Some(Object::Array(values)) => {
                let nums: Vec<f32> = values
                    .iter()
                    .filter_map(|v| doc.resolve(v).as_number())
                    .collect();
                let chunks: Vec<Vec<f32>> = nums.chunks_exact(group).map(<[f32]>::to_vec).collect();
                runs.push(MetricRun {
                    first,
                    last: first + chunks.len().saturating_sub(1) as u32,
                    constant: false,
                    values: chunks,
                });
                i += 2;
            },
            Some(last) => {
                let last = last.as_integer().unwrap_or(0).max(0) as u32;
                let nums: Option<Vec<f32>> = items
                    .get(i + 2..i + 2 + group)
                    .map(|s| s.iter().filter_map(|v| doc.resolve(v).as_number()).collect());
                match nums {
                    Some(values) if values.len() == group => runs.push(MetricRun {
                        first,
                        last,
                        constant: true,
                        values: vec![values],
                    }),
                    _ => break,
                }
                i += 2 + group;
            },
            None => break,
        }
    }
    runs
}

/// A composite (Type 0) font with an Identity CMap.
#[derive(Debug)]
pub struct CidFont {
    name: String,
    vertical: bool,
    default_width: f32,
    widths: Vec<MetricRun<Vec<f32>>>,
    default_vert: (f32, f32),
    vert_metrics: Vec<MetricRun<Vec<f32>>>,
    cid_to_gid: Option<Vec<u16>>,
    program: Option<FontProgram>,
}

impl CidFont {
    /// Read a Type 0 font and its descendant.
    pub fn load(doc: &Document, dict: &Dict) -> Option<Self> {
        let name = doc
            .dict_get(dict, "BaseFont")
            .as_name()
            .unwrap_or("Unnamed")
            .to_string();
        let encoding = doc.dict_get(dict, "Encoding").as_name().unwrap_or("Identity-H");
        let vertical = encoding.ends_with("-V");
        if !encoding.starts_with("Identity") {
            log::debug!("CMap {} treated as Identity", encoding);
        }
        let descendant = doc
            .dict_get(dict, "DescendantFonts")
            .as_array()
            .and_then(|a| a.first())
            .and_then(|d| doc.resolve(d).as_dict())?;

        let default_width = doc.dict_get_number(descendant, "DW").unwrap_or(1000.0);
        let widths = load_metric_runs(doc, doc.dict_get(descendant, "W"), 1);
        let default_vert = doc
            .number_array(doc.dict_get(descendant, "DW2"))
            .filter(|v| v.len() == 2)
            .map_or((DEFAULT_VERT_ORIGIN_Y, DEFAULT_VERT_WIDTH), |v| (v[0], v[1]));
        let vert_metrics = load_metric_runs(doc, doc.dict_get(descendant, "W2"), 3);
        let cid_to_gid = match doc.dict_get(descendant, "CIDToGIDMap") {
            obj @ Object::Stream { .. } => doc
                .decode_stream(obj)
                .ok()
                .map(|data| data.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect()),
            _ => None,
        };
        let program = FontProgram::load(doc, doc.dict_get_dict(descendant, "FontDescriptor"));

        Some(Self {
            name,
            vertical,
            default_width,
            widths,
            default_vert,
            vert_metrics,
            cid_to_gid,
            program,
        })
    }

    fn glyph(&self, cid: u32) -> GlyphId {
        let gid = match &self.cid_to_gid {
            Some(map) => map.get(cid as usize).copied().unwrap_or(0),
            None => cid as u16,
        };
        GlyphId(gid)
    }
}

impl Font for CidFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn char_width(&self, code: u32) -> f32 {
        lookup_run(&self.widths, code)
            .and_then(|v| v.first().copied())
            .unwrap_or(self.default_width)
    }

    fn char_bbox(&self, code: u32) -> Rect {
        match &self.program {
            Some(program) => program.bbox(self.glyph(code)).unwrap_or_default(),
            None => box_bbox(code, self.char_width(code)),
        }
    }

    fn glyph_path(&self, code: u32) -> Option<Path> {
        match &self.program {
            Some(program) => program.outline(self.glyph(code)),
            None => box_glyph(code, self.char_width(code)),
        }
    }

    fn split_codes(&self, bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks(2)
            .map(|c| match c {
                [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                [single] => u32::from(*single),
                _ => 0,
            })
            .collect()
    }

    fn is_vert_writing(&self) -> bool {
        self.vertical
    }

    fn vert_width(&self, code: u32) -> f32 {
        lookup_run(&self.vert_metrics, code)
            .and_then(|v| v.first().copied())
            .unwrap_or(self.default_vert.1)
    }

    fn vert_origin(&self, code: u32) -> (f32, f32) {
        match lookup_run(&self.vert_metrics, code) {
            Some(v) if v.len() == 3 => (v[1], v[2]),
            _ => (self.char_width(code) / 2.0, self.default_vert.0),
        }
    }

    fn is_word_space(&self, _code: u32) -> bool {
        false
    }
}

/// A Type 3 glyph: its content stream parsed as a form, plus metrics.
#[derive(Debug)]
pub struct Type3Char {
    /// The glyph procedure, parsed
    pub form: Rc<Form>,
    /// Advance in 1/1000 text space units
    pub width: f32,
    /// Bounding box in 1/1000 text space units
    pub bbox: Rect,
    /// True for `d0` glyphs, which carry their own colors
    pub colored: bool,
}

/// A font whose glyphs are content streams.
#[derive(Debug)]
pub struct Type3Font {
    name: String,
    font_matrix: Matrix,
    font_bbox: Rect,
    first_char: u32,
    widths: Vec<f32>,
    char_procs: Dict,
    names: HashMap<u32, String>,
    resources: Option<Dict>,
    page_resources: RefCell<Option<Dict>>,
    chars: RefCell<HashMap<u32, Option<Rc<Type3Char>>>>,
}

impl Type3Font {
    /// Read a Type 3 font dictionary.
    pub fn load(doc: &Document, dict: &Dict) -> Option<Self> {
        let font_matrix = doc
            .number_array(doc.dict_get(dict, "FontMatrix"))
            .filter(|v| v.len() == 6)
            .map_or_else(|| Matrix::new(0.001, 0.0, 0.0, 0.001, 0.0, 0.0), |v| Matrix::from_array(&v));
        let char_procs = doc.dict_get_dict(dict, "CharProcs")?.clone();
        let font_bbox = doc
            .number_array(doc.dict_get(dict, "FontBBox"))
            .and_then(|v| Rect::from_array(&v))
            .map(|r| font_matrix.transform_rect(&r))
            .map(|r| Rect::new(r.left * 1000.0, r.bottom * 1000.0, r.right * 1000.0, r.top * 1000.0))
            .unwrap_or_default();
        let first_char = doc
            .dict_get(dict, "FirstChar")
            .as_integer()
            .unwrap_or(0)
            .clamp(0, 255) as u32;
        let xscale = font_matrix.a * 1000.0;
        let widths = doc
            .number_array(doc.dict_get(dict, "Widths"))
            .unwrap_or_default()
            .into_iter()
            .map(|w| w * xscale)
            .collect();

        Some(Self {
            name: doc
                .dict_get(dict, "Name")
                .as_name()
                .unwrap_or("Type3")
                .to_string(),
            font_matrix,
            font_bbox,
            first_char,
            widths,
            char_procs,
            names: load_differences(doc, doc.dict_get(dict, "Encoding")),
            resources: doc.dict_get_dict(dict, "Resources").cloned(),
            page_resources: RefCell::new(None),
            chars: RefCell::new(HashMap::new()),
        })
    }

    /// The `/FontMatrix`.
    pub fn font_matrix(&self) -> Matrix {
        self.font_matrix
    }

    /// Resources used by glyph procedures when the font has none of its own.
    pub fn set_page_resources(&self, resources: &Dict) {
        let mut slot = self.page_resources.borrow_mut();
        if slot.is_none() {
            *slot = Some(resources.clone());
        }
    }

    /// Parse (once) the glyph procedure for `code`.
    pub fn load_char(&self, doc: &Document, code: u32) -> Option<Rc<Type3Char>> {
        if let Some(loaded) = self.chars.borrow().get(&code) {
            return loaded.clone();
        }
        // Reserve the slot first so a glyph that shows itself stops here.
        self.chars.borrow_mut().insert(code, None);
        let loaded = self.build_char(doc, code).map(Rc::new);
        self.chars.borrow_mut().insert(code, loaded.clone());
        loaded
    }

    fn build_char(&self, doc: &Document, code: u32) -> Option<Type3Char> {
        let name = self.names.get(&code)?;
        let proc_obj = self.char_procs.get(name)?;
        let page_resources = self.page_resources.borrow().clone().unwrap_or_default();
        let mut form = Form::new(doc, proc_obj, self.resources.as_ref(), &page_resources)?;
        let metrics = form.parse_type3(doc);

        let width = metrics.width * self.font_matrix.x_unit() * 1000.0;
        let glyph_box = metrics
            .bbox
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| form.holder().bbox);
        let bbox = self.font_matrix.transform_rect(&glyph_box);
        let bbox = Rect::new(
            bbox.left * 1000.0,
            bbox.bottom * 1000.0,
            bbox.right * 1000.0,
            bbox.top * 1000.0,
        );

        Some(Type3Char {
            form: Rc::new(form),
            width,
            bbox,
            colored: metrics.colored,
        })
    }
}

impl Font for Type3Font {
    fn name(&self) -> &str {
        &self.name
    }

    fn char_width(&self, code: u32) -> f32 {
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize).copied())
            .or_else(|| {
                self.chars
                    .borrow()
                    .get(&code)
                    .and_then(|c| c.as_ref().map(|c| c.width))
            })
            .unwrap_or(0.0)
    }

    fn char_bbox(&self, code: u32) -> Rect {
        self.chars
            .borrow()
            .get(&code)
            .and_then(|c| c.as_ref().map(|c| c.bbox))
            .unwrap_or(self.font_bbox)
    }

    fn glyph_path(&self, _code: u32) -> Option<Path> {
        None
    }

    fn as_type3(&self) -> Option<&Type3Font> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    #[test]
    fn test_stock_font_metrics() {
        let font = StockFont::new("Helvetica");
        assert_eq!(font.char_width(b'A' as u32), 600.0);
        assert!(font.glyph_path(b' ' as u32).is_none());
        let bbox = font.char_bbox(b'A' as u32);
        assert_eq!(bbox.top, 700.0);
        assert!(font.char_bbox(b'x' as u32).top < bbox.top);
        assert!(font.as_type3().is_none());
    }

    #[test]
    fn test_simple_font_widths() {
        let doc = Document::new();
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), name("Font"));
        dict.insert("Subtype".to_string(), name("Type1"));
        dict.insert("BaseFont".to_string(), name("Custom"));
        dict.insert("FirstChar".to_string(), Object::Integer(65));
        dict.insert(
            "Widths".to_string(),
            Object::Array(vec![Object::Integer(722), Object::Integer(667)]),
        );
        let font = load_font(&doc, &Object::Dictionary(dict)).expect("font");
        assert_eq!(font.name(), "Custom");
        assert_eq!(font.char_width(65), 722.0);
        assert_eq!(font.char_width(66), 667.0);
        assert_eq!(font.char_width(67), 0.0);
        assert!(font.glyph_path(65).is_some());
    }

    #[test]
    fn test_cid_font_identity_v() {
        let doc = Document::new();
        let mut descendant = Dict::new();
        descendant.insert("Subtype".to_string(), name("CIDFontType2"));
        descendant.insert("DW".to_string(), Object::Integer(500));
        descendant.insert(
            "W".to_string(),
            Object::Array(vec![
                Object::Integer(1),
                Object::Array(vec![Object::Integer(300), Object::Integer(400)]),
                Object::Integer(10),
                Object::Integer(20),
                Object::Integer(250),
            ]),
        );
        let mut dict = Dict::new();
        dict.insert("Subtype".to_string(), name("Type0"));
        dict.insert("Encoding".to_string(), name("Identity-V"));
        dict.insert(
            "DescendantFonts".to_string(),
            Object::Array(vec![Object::Dictionary(descendant)]),
        );
        let font = load_font(&doc, &Object::Dictionary(dict)).expect("font");
        assert!(font.is_vert_writing());
        assert_eq!(font.split_codes(&[0, 1, 0, 2]), vec![1, 2]);
        assert_eq!(font.char_width(1), 300.0);
        assert_eq!(font.char_width(2), 400.0);
        assert_eq!(font.char_width(15), 250.0);
        assert_eq!(font.char_width(99), 500.0);
        assert_eq!(font.vert_width(1), -1000.0);
        assert!(!font.is_word_space(32));
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_unicode("A"), Some('A'));
        assert_eq!(glyph_name_to_unicode("uni0041"), Some('A'));
        assert_eq!(glyph_name_to_unicode("u1F600"), Some('\u{1F600}'));
        assert_eq!(glyph_name_to_unicode("seven"), Some('7'));
        assert_eq!(glyph_name_to_unicode("notaglyph"), None);
        assert_eq!(winansi_to_unicode(0x80), Some('\u{20AC}'));
        assert_eq!(winansi_to_unicode(0x81), None);
        assert_eq!(winansi_to_unicode(b'a'), Some('a'));
    }

    #[test]
    fn test_type3_widths_scaled_by_font_matrix() {
        let doc = Document::new();
        let mut dict = Dict::new();
        dict.insert("Subtype".to_string(), name("Type3"));
        dict.insert(
            "FontMatrix".to_string(),
            Object::Array(vec![
                Object::Real(0.01),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(0.01),
                Object::Integer(0),
                Object::Integer(0),
            ]),
        );
        dict.insert("CharProcs".to_string(), Object::Dictionary(Dict::new()));
        dict.insert("FirstChar".to_string(), Object::Integer(0));
        dict.insert("Widths".to_string(), Object::Array(vec![Object::Integer(50)]));
        let font = load_font(&doc, &Object::Dictionary(dict)).expect("font");
        let t3 = font.as_type3().expect("type3");
        assert!((font.char_width(0) - 500.0).abs() < 1e-3);
        assert!(t3.load_char(&doc, 0).is_none());
    }

    fn type3_dict(encoding: Object) -> Dict {
        let mut procs = Dict::new();
        procs.insert(
            "g".to_string(),
            Object::Stream {
                dict: Dict::new(),
                data: bytes::Bytes::from_static(b"500 0 d0 0 0 500 700 re f"),
            },
        );
        let mut dict = Dict::new();
        dict.insert("Subtype".to_string(), name("Type3"));
        dict.insert("CharProcs".to_string(), Object::Dictionary(procs));
        dict.insert("Encoding".to_string(), encoding);
        dict
    }

    #[test]
    fn test_type3_encoding_by_reference() {
        let mut doc = Document::new();
        let mut encoding = Dict::new();
        encoding.insert(
            "Differences".to_string(),
            Object::Array(vec![Object::Integer(97), name("g")]),
        );
        let encoding_ref = doc.add(Object::Dictionary(encoding));
        let font = load_font(&doc, &Object::Dictionary(type3_dict(Object::Reference(encoding_ref)))).expect("font");
        let t3 = font.as_type3().expect("type3");
        let ch = t3.load_char(&doc, 97).expect("glyph a");
        assert!(ch.colored);
        assert!((ch.width - 500.0).abs() < 1e-3);
        assert!(t3.load_char(&doc, 98).is_none());
    }

    #[test]
    fn test_direct_font_dict_loaded_once() {
        let doc = Document::new();
        let mut encoding = Dict::new();
        encoding.insert("Differences".to_string(), Object::Array(vec![Object::Integer(97), name("g")]));
        let dict = Object::Dictionary(type3_dict(Object::Dictionary(encoding)));
        let first = load_font(&doc, &dict).expect("font");
        let second = load_font(&doc, &dict.clone()).expect("font");
        assert!(Rc::ptr_eq(&first, &second));

        let mut other = Dict::new();
        other.insert("Subtype".to_string(), name("Type1"));
        other.insert("BaseFont".to_string(), name("Other"));
        let third = load_font(&doc, &Object::Dictionary(other)).expect("font");
        assert!(!Rc::ptr_eq(&first, &third));
    }
}
