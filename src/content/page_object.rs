//! Page objects: the display list built by the content interpreter.
//!
//! Every object carries the graphics state that was current when it was
//! created, so the renderer never needs to replay the content stream.

use crate::content::clip_path::ClipPath;
use crate::content::color::{ColorState, RgbColor};
use crate::content::font::Font;
use crate::content::form::Form;
use crate::content::graphics_state::{AllStates, BlendMode, GeneralState, GraphState, TextRenderMode, TextState};
use crate::content::image::Image;
use crate::content::marks::ContentMarks;
use crate::content::path::{FillType, Path};
use crate::content::pattern::{Shading, ShadingType};
use crate::document::Document;
use crate::geometry::{Matrix, Point, Rect};
use crate::object::Dict;
use serde::Serialize;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// A filled and/or stroked path.
#[derive(Debug, Clone)]
pub struct PathObject {
    /// Path in the coordinate space of `matrix`
    pub path: Path,
    /// Fill rule, `NoFill` when only stroked
    pub fill_type: FillType,
    /// True when the path is stroked
    pub stroke: bool,
    /// Path to user space
    pub matrix: Matrix,
}

impl PathObject {
    /// Bounding box in user space, widened for the stroke.
    ///
    /// Returns `(original, transformed)`.
    pub fn calc_bounding_box(&self, graph: &GraphState) -> (Rect, Rect) {
        let width = graph.line_width;
        let original = if self.stroke && width != 0.0 {
            self.path.bounding_box_for_stroke(width, graph.miter_limit)
        } else {
            self.path.bounding_box()
        };
        let mut rect = self.matrix.transform_rect(&original);
        if width == 0.0 && self.stroke {
            rect.inflate(0.5, 0.5);
        }
        (original, rect)
    }
}

/// One glyph of a text object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextItem {
    /// Character code
    pub code: u32,
    /// Glyph origin in text space
    pub origin: Point,
}

/// A run of glyphs shown by one text-showing operator.
#[derive(Debug, Clone)]
pub struct TextObject {
    /// Glyphs in showing order
    pub items: Vec<TextItem>,
    /// Text space to user space, position included
    pub matrix: Matrix,
}

impl TextObject {
    /// Glyph space (1/1000 units) to user space for one glyph.
    pub fn glyph_matrix(&self, item: &TextItem, font_size: f32) -> Matrix {
        let scale = font_size / 1000.0;
        Matrix::new(scale, 0.0, 0.0, scale, item.origin.x, item.origin.y).multiply(&self.matrix)
    }

    /// Type 3 glyph space to user space for one glyph.
    pub fn type3_glyph_matrix(&self, item: &TextItem, font_size: f32, font_matrix: &Matrix) -> Matrix {
        font_matrix
            .multiply(&Matrix::new(font_size, 0.0, 0.0, font_size, item.origin.x, item.origin.y))
            .multiply(&self.matrix)
    }

    /// Character codes in showing order.
    pub fn char_codes(&self) -> Vec<u32> {
        self.items.iter().map(|i| i.code).collect()
    }
}

/// Text spacing parameters used to lay out glyphs.
#[derive(Debug, Clone, Copy)]
pub struct TextSpacing {
    /// Font size
    pub font_size: f32,
    /// `Tc`
    pub char_space: f32,
    /// `Tw`
    pub word_space: f32,
    /// `Tz` / 100
    pub horz_scale: f32,
}

/// Glyph positions of a text run.
#[derive(Debug, Clone, Default)]
pub struct TextLayout {
    /// Glyph origins
    pub items: Vec<TextItem>,
    /// Text position advance after the run, horizontal scaling applied
    pub advance: Point,
    /// Bounding box in text space
    pub bbox: Rect,
}

/// Lay out `segments`, separated by `kernings` (thousandths of text space,
/// subtracted from the position between segment `i` and `i + 1`).
pub fn layout_text(font: &dyn Font, segments: &[Vec<u32>], kernings: &[f32], spacing: TextSpacing) -> TextLayout {
    let fs = spacing.font_size / 1000.0;
    let vertical = font.is_vert_writing();
    let mut items = Vec::new();
    let mut curpos = 0.0f32;
    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);

    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            curpos -= kernings.get(index - 1).copied().unwrap_or(0.0) * fs;
        }
        for &code in segment {
            let bbox = font.char_bbox(code);
            if vertical {
                let (vx, vy) = font.vert_origin(code);
                let origin = Point::new(-vx * fs, curpos - vy * fs);
                min_x = min_x.min(origin.x + bbox.left * fs);
                max_x = max_x.max(origin.x + bbox.right * fs);
                min_y = min_y.min(origin.y + bbox.bottom * fs);
                max_y = max_y.max(origin.y + bbox.top * fs);
                items.push(TextItem { code, origin });
                curpos += font.vert_width(code) * fs;
            } else {
                let origin = Point::new(curpos, 0.0);
                let left = curpos + bbox.left * fs;
                let right = curpos + bbox.right * fs;
                min_x = min_x.min(left.min(right));
                max_x = max_x.max(left.max(right));
                min_y = min_y.min(bbox.bottom * fs);
                max_y = max_y.max(bbox.top * fs);
                items.push(TextItem { code, origin });
                curpos += font.char_width(code) * fs;
            }
            if font.is_word_space(code) {
                curpos += spacing.word_space;
            }
            curpos += spacing.char_space;
        }
    }

    let advance = if vertical {
        Point::new(0.0, curpos)
    } else {
        Point::new(curpos * spacing.horz_scale, 0.0)
    };
    let bbox = if items.is_empty() || min_x > max_x {
        Rect::default()
    } else {
        Rect::new(min_x, min_y.min(max_y), max_x, max_y)
    };
    TextLayout { items, advance, bbox }
}

/// A drawn image.
#[derive(Debug, Clone)]
pub struct ImageObject {
    /// Image data and parameters
    pub image: Rc<Image>,
    /// Unit square to user space
    pub matrix: Matrix,
}

/// A shading painted with `sh`.
#[derive(Debug, Clone)]
pub struct ShadingObject {
    /// The shading
    pub shading: Rc<Shading>,
    /// Shading space to user space
    pub matrix: Matrix,
}

/// A form XObject placed with `Do`.
#[derive(Debug, Clone)]
pub struct FormObject {
    /// The parsed form
    pub form: Rc<Form>,
    /// Form space to user space
    pub matrix: Matrix,
}

/// The kind-specific part of a page object.
#[derive(Debug, Clone)]
pub enum PageObjectKind {
    /// Path object
    Path(PathObject),
    /// Text object
    Text(TextObject),
    /// Image object
    Image(ImageObject),
    /// Shading object
    Shading(ShadingObject),
    /// Form object
    Form(FormObject),
}

impl PageObjectKind {
    /// Short lower-case name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            PageObjectKind::Path(_) => "path",
            PageObjectKind::Text(_) => "text",
            PageObjectKind::Image(_) => "image",
            PageObjectKind::Shading(_) => "shading",
            PageObjectKind::Form(_) => "form",
        }
    }
}

/// One entry of a page or form display list.
#[derive(Debug)]
pub struct PageObject {
    id: u64,
    /// Bounding box in user space
    pub rect: Rect,
    /// Bounding box before the object matrix is applied
    pub original_rect: Rect,
    dirty: Cell<bool>,
    active: Cell<bool>,
    /// Index of the content stream the object came from
    pub content_stream: Option<usize>,
    /// Resource name the object was drawn through (`Do`, `sh`)
    pub resource_name: Option<String>,
    /// Open marked-content sequences
    pub marks: ContentMarks,
    /// Alpha, blend and soft mask
    pub general: GeneralState,
    /// Clip region
    pub clip: ClipPath,
    /// Fill and stroke colors
    pub color: ColorState,
    /// Font and text parameters
    pub text: TextState,
    /// Line parameters
    pub graph: GraphState,
    /// Kind-specific data
    pub kind: PageObjectKind,
}

impl PageObject {
    /// Create an object with default graphics state.
    pub fn new(kind: PageObjectKind) -> Self {
        Self {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            rect: Rect::default(),
            original_rect: Rect::default(),
            dirty: Cell::new(false),
            active: Cell::new(true),
            content_stream: None,
            resource_name: None,
            marks: ContentMarks::new(),
            general: GeneralState::default(),
            clip: ClipPath::new(),
            color: ColorState::default(),
            text: TextState::default(),
            graph: GraphState::default(),
            kind,
        }
    }

    /// Unique object identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Copy the parts of `states` this kind of object uses.
    ///
    /// General state and clip are always taken.
    pub fn set_graphic_states(&mut self, states: &AllStates, color: bool, text: bool, graph: bool) {
        self.general = states.general.clone();
        self.clip = states.clip.clone();
        if color {
            self.color = states.color.clone();
        }
        if text {
            self.text = states.text.clone();
        }
        if graph {
            self.graph = states.graph.clone();
        }
    }

    /// False for objects hidden by the application.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Show or hide the object; any change marks it dirty.
    pub fn set_active(&self, active: bool) {
        if self.active.get() != active {
            self.active.set(active);
            self.dirty.set(true);
        }
    }

    /// True after a change not yet seen by a renderer.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Set or clear the dirty flag.
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.set(dirty);
    }

    /// The path payload, if this is a path object.
    pub fn as_path(&self) -> Option<&PathObject> {
        match &self.kind {
            PageObjectKind::Path(p) => Some(p),
            _ => None,
        }
    }

    /// The text payload, if this is a text object.
    pub fn as_text(&self) -> Option<&TextObject> {
        match &self.kind {
            PageObjectKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The image payload, if this is an image object.
    pub fn as_image(&self) -> Option<&ImageObject> {
        match &self.kind {
            PageObjectKind::Image(i) => Some(i),
            _ => None,
        }
    }

    /// The form payload, if this is a form object.
    pub fn as_form(&self) -> Option<&FormObject> {
        match &self.kind {
            PageObjectKind::Form(f) => Some(f),
            _ => None,
        }
    }

    /// A copy with a fresh identifier.
    pub fn clone_object(&self) -> PageObject {
        PageObject {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            rect: self.rect,
            original_rect: self.original_rect,
            dirty: Cell::new(self.dirty.get()),
            active: Cell::new(self.active.get()),
            content_stream: self.content_stream,
            resource_name: self.resource_name.clone(),
            marks: self.marks.clone(),
            general: self.general.clone(),
            clip: self.clip.clone(),
            color: self.color.clone(),
            text: self.text.clone(),
            graph: self.graph.clone(),
            kind: self.kind.clone(),
        }
    }

    /// Serializable description used by the JSON dump.
    pub fn summary(&self) -> ObjectSummary {
        let detail = match &self.kind {
            PageObjectKind::Path(p) => ObjectDetail::Path {
                points: p.path.len(),
                fill: p.fill_type,
                stroke: p.stroke,
                line_width: self.graph.line_width,
            },
            PageObjectKind::Text(t) => ObjectDetail::Text {
                font: self.text.font.as_ref().map(|f| f.name().to_string()),
                size: self.text.font_size,
                render_mode: self.text.render_mode,
                codes: t.char_codes(),
            },
            PageObjectKind::Image(i) => ObjectDetail::Image {
                width: i.image.width,
                height: i.image.height,
                bits_per_component: i.image.bits_per_component,
                mask: i.image.is_mask,
                inline: i.image.is_inline,
            },
            PageObjectKind::Shading(s) => ObjectDetail::Shading {
                shading_type: s.shading.shading_type,
            },
            PageObjectKind::Form(f) => ObjectDetail::Form {
                objects: f.form.holder().objects.iter().map(|o| o.summary()).collect(),
            },
        };
        ObjectSummary {
            id: self.id,
            kind: self.kind.name(),
            rect: self.rect,
            content_stream: self.content_stream,
            resource_name: self.resource_name.clone(),
            mcid: self.marks.mcid(),
            fill_alpha: self.general.fill_alpha,
            stroke_alpha: self.general.stroke_alpha,
            blend_mode: self.general.blend_mode,
            fill_color: self.color.fill_rgb(),
            stroke_color: self.color.stroke_rgb(),
            clipped: !self.clip.is_empty(),
            detail,
        }
    }
}

/// JSON-friendly view of a page object.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    /// Object identifier
    pub id: u64,
    /// Object kind
    pub kind: &'static str,
    /// Bounding box in user space
    pub rect: Rect,
    /// Source content stream
    pub content_stream: Option<usize>,
    /// Resource name
    pub resource_name: Option<String>,
    /// Marked-content identifier
    pub mcid: Option<i64>,
    /// Fill alpha
    pub fill_alpha: f32,
    /// Stroke alpha
    pub stroke_alpha: f32,
    /// Blend mode
    pub blend_mode: BlendMode,
    /// Fill color, when it is not a pattern
    pub fill_color: Option<RgbColor>,
    /// Stroke color, when it is not a pattern
    pub stroke_color: Option<RgbColor>,
    /// True when a clip path applies
    pub clipped: bool,
    /// Kind-specific details
    pub detail: ObjectDetail,
}

/// Kind-specific part of an [`ObjectSummary`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectDetail {
    /// Path details
    Path {
        /// Number of path points
        points: usize,
        /// Fill rule
        fill: FillType,
        /// Stroked
        stroke: bool,
        /// Line width
        line_width: f32,
    },
    /// Text details
    Text {
        /// Font name
        font: Option<String>,
        /// Font size
        size: f32,
        /// Render mode
        render_mode: TextRenderMode,
        /// Character codes
        codes: Vec<u32>,
    },
    /// Image details
    Image {
        /// Width in samples
        width: u32,
        /// Height in samples
        height: u32,
        /// Bits per component
        bits_per_component: u32,
        /// Stencil mask
        mask: bool,
        /// Inline image
        inline: bool,
    },
    /// Shading details
    Shading {
        /// Shading type
        shading_type: ShadingType,
    },
    /// Nested objects of a form
    Form {
        /// Children
        objects: Vec<ObjectSummary>,
    },
}

/// Transparency group attributes of a page or form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Transparency {
    /// `/Group` with `/S /Transparency`
    pub group: bool,
    /// `/I true`
    pub isolated: bool,
    /// `/K true`
    pub knockout: bool,
}

impl Transparency {
    /// Read the `/Group` entry of a page or form dictionary.
    pub fn from_dict(doc: &Document, dict: &Dict) -> Self {
        let Some(group) = doc.dict_get_dict(dict, "Group") else {
            return Self::default();
        };
        if doc.dict_get(group, "S").as_name() != Some("Transparency") {
            return Self::default();
        }
        Self {
            group: true,
            isolated: doc.dict_get(group, "I").as_bool().unwrap_or(false),
            knockout: doc.dict_get(group, "K").as_bool().unwrap_or(false),
        }
    }
}

/// Parse progress of a holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    /// Nothing parsed yet
    #[default]
    NotParsed,
    /// Parsing started but not finished
    Parsing,
    /// Complete
    Parsed,
}

/// The object list of a page or form plus what rendering needs to know
/// about it as a whole.
#[derive(Debug, Clone, Default)]
pub struct PageObjectHolder {
    /// Objects in painting order
    pub objects: Vec<Rc<PageObject>>,
    /// `/BBox` of a form or the page box
    pub bbox: Rect,
    /// Transparency group attributes
    pub transparency: Transparency,
    /// Some object needs a backdrop alpha channel
    pub background_alpha_needed: bool,
    /// Rectangles covered by image masks
    pub image_mask_boxes: Vec<Rect>,
    /// CTM at the end of each content stream that changed it
    pub stream_ctms: BTreeMap<usize, Matrix>,
    /// Parse progress
    pub parse_state: ParseState,
}

impl PageObjectHolder {
    /// An empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when there are no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object `index`.
    pub fn get(&self, index: usize) -> Option<&Rc<PageObject>> {
        self.objects.get(index)
    }

    /// Append an object.
    pub fn append(&mut self, object: Rc<PageObject>) {
        self.objects.push(object);
    }

    /// Iterate objects in painting order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<PageObject>> {
        self.objects.iter()
    }

    /// Union of all object rectangles.
    pub fn calc_bounding_box(&self) -> Rect {
        let mut rects = self.objects.iter().map(|o| o.rect);
        let Some(first) = rects.next() else {
            return Rect::default();
        };
        rects.fold(first, |acc, r| acc.union(&r))
    }

    /// CTM in effect at the end of content stream `index`.
    pub fn ctm_for_stream(&self, index: usize) -> Matrix {
        self.stream_ctms.get(&index).copied().unwrap_or_default()
    }

    /// True once parsing completed.
    pub fn is_parsed(&self) -> bool {
        self.parse_state == ParseState::Parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::font::StockFont;
    use crate::content::path::{LineCap, PointKind};

    fn rect_path() -> PathObject {
        let mut path = Path::new();
        path.append_rect(10.0, 10.0, 110.0, 110.0);
        PathObject {
            path,
            fill_type: FillType::Winding,
            stroke: false,
            matrix: Matrix::identity(),
        }
    }

    #[test]
    fn test_active_marks_dirty() {
        let obj = PageObject::new(PageObjectKind::Path(rect_path()));
        assert!(obj.is_active());
        assert!(!obj.is_dirty());
        obj.set_active(true);
        assert!(!obj.is_dirty());
        obj.set_active(false);
        assert!(obj.is_dirty());
        obj.set_dirty(false);
        obj.set_active(true);
        assert!(obj.is_dirty());
    }

    #[test]
    fn test_clone_gets_new_id() {
        let obj = PageObject::new(PageObjectKind::Path(rect_path()));
        let copy = obj.clone_object();
        assert_ne!(obj.id(), copy.id());
        assert_eq!(copy.kind.name(), "path");
    }

    #[test]
    fn test_path_bbox() {
        let obj = rect_path();
        let graph = GraphState::default();
        let (_, rect) = obj.calc_bounding_box(&graph);
        assert_eq!(rect, Rect::new(10.0, 10.0, 110.0, 110.0));

        let stroked = PathObject {
            stroke: true,
            ..rect_path()
        };
        let wide = GraphState {
            line_width: 0.0,
            line_cap: LineCap::Butt,
            ..GraphState::default()
        };
        let (_, rect) = stroked.calc_bounding_box(&wide);
        assert_eq!(rect, Rect::new(9.5, 9.5, 110.5, 110.5));
    }

    #[test]
    fn test_layout_with_kerning() {
        let font = StockFont::new("Helvetica");
        let spacing = TextSpacing {
            font_size: 10.0,
            char_space: 0.0,
            word_space: 0.0,
            horz_scale: 1.0,
        };
        let segments = vec![vec![65, 66], vec![67]];
        let layout = layout_text(&font, &segments, &[100.0], spacing);
        assert_eq!(layout.items.len(), 3);
        assert_eq!(layout.items[1].origin.x, 6.0);
        // 12 - 100 * 10 / 1000
        assert!((layout.items[2].origin.x - 11.0).abs() < 1e-5);
        assert!((layout.advance.x - 17.0).abs() < 1e-5);
        assert_eq!(layout.bbox.top, 7.0);
    }

    #[test]
    fn test_layout_word_and_char_space() {
        let font = StockFont::new("Helvetica");
        let spacing = TextSpacing {
            font_size: 1000.0,
            char_space: 1.0,
            word_space: 10.0,
            horz_scale: 0.5,
        };
        let layout = layout_text(&font, &[vec![32, 65]], &[], spacing);
        assert_eq!(layout.items[1].origin.x, 600.0 + 10.0 + 1.0);
        assert_eq!(layout.advance.x, (1211.0 + 1.0) * 0.5);
    }

    #[test]
    fn test_holder_bbox() {
        let mut holder = PageObjectHolder::new();
        assert_eq!(holder.calc_bounding_box(), Rect::default());
        let mut a = PageObject::new(PageObjectKind::Path(rect_path()));
        a.rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let mut b = PageObject::new(PageObjectKind::Path(rect_path()));
        b.rect = Rect::new(5.0, 5.0, 20.0, 30.0);
        holder.append(Rc::new(a));
        holder.append(Rc::new(b));
        assert_eq!(holder.calc_bounding_box(), Rect::new(0.0, 0.0, 20.0, 30.0));
        assert_eq!(holder.ctm_for_stream(3), Matrix::identity());
    }

    #[test]
    fn test_summary_serializes() {
        let mut path = Path::new();
        path.append_point(Point::new(0.0, 0.0), PointKind::Move);
        path.append_point(Point::new(1.0, 1.0), PointKind::Line);
        let obj = PageObject::new(PageObjectKind::Path(PathObject {
            path,
            fill_type: FillType::NoFill,
            stroke: true,
            matrix: Matrix::identity(),
        }));
        let json = serde_json::to_value(obj.summary()).expect("json");
        assert_eq!(json["kind"], "path");
        assert_eq!(json["detail"]["type"], "path");
        assert_eq!(json["detail"]["points"], 2);
    }
}
