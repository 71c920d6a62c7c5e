//! Graphics state management for content stream execution.
//!
//! [`AllStates`] is the complete state an operator sees: the CTM, text
//! positioning, and the general, graph, color, text and clip sub-states.
//! Page objects snapshot the sub-states they need when they are created.
//! [`GraphicsStateStack`] implements `q` and `Q` on top of it.

use crate::content::clip_path::ClipPath;
use crate::content::color::ColorState;
use crate::content::font::{Font, load_font};
use crate::content::path::{LineCap, LineJoin};
use crate::document::Document;
use crate::geometry::{Matrix, Point};
use crate::object::{Dict, Object};
use std::rc::Rc;

/// Separable and non-separable blend modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum BlendMode {
    /// Source over
    #[default]
    Normal,
    /// Multiply
    Multiply,
    /// Screen
    Screen,
    /// Overlay
    Overlay,
    /// Darken
    Darken,
    /// Lighten
    Lighten,
    /// Color dodge
    ColorDodge,
    /// Color burn
    ColorBurn,
    /// Hard light
    HardLight,
    /// Soft light
    SoftLight,
    /// Difference
    Difference,
    /// Exclusion
    Exclusion,
    /// Hue
    Hue,
    /// Saturation
    Saturation,
    /// Color
    Color,
    /// Luminosity
    Luminosity,
}

impl BlendMode {
    /// Parse a `/BM` name; unknown names are `Normal`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Multiply" => BlendMode::Multiply,
            "Screen" => BlendMode::Screen,
            "Overlay" => BlendMode::Overlay,
            "Darken" => BlendMode::Darken,
            "Lighten" => BlendMode::Lighten,
            "ColorDodge" => BlendMode::ColorDodge,
            "ColorBurn" => BlendMode::ColorBurn,
            "HardLight" => BlendMode::HardLight,
            "SoftLight" => BlendMode::SoftLight,
            "Difference" => BlendMode::Difference,
            "Exclusion" => BlendMode::Exclusion,
            "Hue" => BlendMode::Hue,
            "Saturation" => BlendMode::Saturation,
            "Color" => BlendMode::Color,
            "Luminosity" => BlendMode::Luminosity,
            _ => BlendMode::Normal,
        }
    }

    /// The rasterizer's blend mode.
    pub fn to_skia(self) -> tiny_skia::BlendMode {
        match self {
            BlendMode::Normal => tiny_skia::BlendMode::SourceOver,
            BlendMode::Multiply => tiny_skia::BlendMode::Multiply,
            BlendMode::Screen => tiny_skia::BlendMode::Screen,
            BlendMode::Overlay => tiny_skia::BlendMode::Overlay,
            BlendMode::Darken => tiny_skia::BlendMode::Darken,
            BlendMode::Lighten => tiny_skia::BlendMode::Lighten,
            BlendMode::ColorDodge => tiny_skia::BlendMode::ColorDodge,
            BlendMode::ColorBurn => tiny_skia::BlendMode::ColorBurn,
            BlendMode::HardLight => tiny_skia::BlendMode::HardLight,
            BlendMode::SoftLight => tiny_skia::BlendMode::SoftLight,
            BlendMode::Difference => tiny_skia::BlendMode::Difference,
            BlendMode::Exclusion => tiny_skia::BlendMode::Exclusion,
            BlendMode::Hue => tiny_skia::BlendMode::Hue,
            BlendMode::Saturation => tiny_skia::BlendMode::Saturation,
            BlendMode::Color => tiny_skia::BlendMode::Color,
            BlendMode::Luminosity => tiny_skia::BlendMode::Luminosity,
        }
    }
}

/// Parameters set through `gs`, `i` and `ri` that are not line geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralState {
    /// Nonstroking alpha (`ca`)
    pub fill_alpha: f32,
    /// Stroking alpha (`CA`)
    pub stroke_alpha: f32,
    /// Blend mode (`BM`)
    pub blend_mode: BlendMode,
    /// Soft mask dictionary (`SMask`)
    pub soft_mask: Option<Rc<Dict>>,
    /// CTM at the time the soft mask was set
    pub soft_mask_matrix: Matrix,
    /// Transfer function entry (`TR`/`TR2`), unresolved
    pub transfer: Option<Object>,
    /// Nonstroking overprint (`op`)
    pub fill_overprint: bool,
    /// Stroking overprint (`OP`)
    pub stroke_overprint: bool,
    /// Overprint mode (`OPM`)
    pub overprint_mode: i32,
    /// Flatness tolerance (`i`, `FL`)
    pub flatness: f32,
    /// Smoothness tolerance (`SM`)
    pub smoothness: f32,
    /// Stroke adjustment (`SA`)
    pub stroke_adjust: bool,
    /// Rendering intent (`ri`, `RI`)
    pub rendering_intent: String,
    /// Alpha source flag (`AIS`)
    pub alpha_source: bool,
    /// Text knockout (`TK`)
    pub text_knockout: bool,
}

impl Default for GeneralState {
    fn default() -> Self {
        Self {
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            blend_mode: BlendMode::Normal,
            soft_mask: None,
            soft_mask_matrix: Matrix::identity(),
            transfer: None,
            fill_overprint: false,
            stroke_overprint: false,
            overprint_mode: 0,
            flatness: 1.0,
            smoothness: 0.0,
            stroke_adjust: false,
            rendering_intent: "RelativeColorimetric".to_string(),
            alpha_source: false,
            text_knockout: true,
        }
    }
}

impl GeneralState {
    /// Reset the transparency parameters, as done on entry to a group.
    pub fn reset_transparency(&mut self) {
        self.blend_mode = BlendMode::Normal;
        self.fill_alpha = 1.0;
        self.stroke_alpha = 1.0;
        self.soft_mask = None;
    }
}

/// Line geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphState {
    /// Line width (`w`)
    pub line_width: f32,
    /// Line cap (`J`)
    pub line_cap: LineCap,
    /// Line join (`j`)
    pub line_join: LineJoin,
    /// Miter limit (`M`)
    pub miter_limit: f32,
    /// Dash lengths (`d`)
    pub dash_array: Vec<f32>,
    /// Dash phase (`d`)
    pub dash_phase: f32,
}

impl Default for GraphState {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash_array: Vec::new(),
            dash_phase: 0.0,
        }
    }
}

impl GraphState {
    /// True when a dash pattern is active.
    pub fn is_dashed(&self) -> bool {
        !self.dash_array.is_empty()
    }
}

/// Text rendering mode (`Tr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum TextRenderMode {
    /// 0
    #[default]
    Fill,
    /// 1
    Stroke,
    /// 2
    FillStroke,
    /// 3
    Invisible,
    /// 4
    FillClip,
    /// 5
    StrokeClip,
    /// 6
    FillStrokeClip,
    /// 7
    Clip,
}

impl TextRenderMode {
    /// From the `Tr` operand; values outside 0..=7 are rejected.
    pub fn from_int(value: i32) -> Option<Self> {
        Some(match value {
            0 => TextRenderMode::Fill,
            1 => TextRenderMode::Stroke,
            2 => TextRenderMode::FillStroke,
            3 => TextRenderMode::Invisible,
            4 => TextRenderMode::FillClip,
            5 => TextRenderMode::StrokeClip,
            6 => TextRenderMode::FillStrokeClip,
            7 => TextRenderMode::Clip,
            _ => return None,
        })
    }

    /// Adds the glyphs to the clip path.
    pub fn is_clip(self) -> bool {
        matches!(
            self,
            TextRenderMode::FillClip
                | TextRenderMode::StrokeClip
                | TextRenderMode::FillStrokeClip
                | TextRenderMode::Clip
        )
    }

    /// Fills the glyphs.
    pub fn is_fill(self) -> bool {
        matches!(
            self,
            TextRenderMode::Fill
                | TextRenderMode::FillStroke
                | TextRenderMode::FillClip
                | TextRenderMode::FillStrokeClip
        )
    }

    /// Strokes the glyph outlines.
    pub fn is_stroke(self) -> bool {
        matches!(
            self,
            TextRenderMode::Stroke
                | TextRenderMode::FillStroke
                | TextRenderMode::StrokeClip
                | TextRenderMode::FillStrokeClip
        )
    }
}

/// Font and spacing parameters.
#[derive(Debug, Clone)]
pub struct TextState {
    /// Current font (`Tf`)
    pub font: Option<Rc<dyn Font>>,
    /// Font size (`Tf`)
    pub font_size: f32,
    /// Character spacing (`Tc`)
    pub char_space: f32,
    /// Word spacing (`Tw`)
    pub word_space: f32,
    /// Rendering mode (`Tr`)
    pub render_mode: TextRenderMode,
    /// Linear part of the CTM, used to transform stroke widths of text
    pub ctm: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 1.0,
            char_space: 0.0,
            word_space: 0.0,
            render_mode: TextRenderMode::Fill,
            ctm: Matrix::identity(),
        }
    }
}

impl PartialEq for TextState {
    fn eq(&self, other: &Self) -> bool {
        let same_font = match (&self.font, &other.font) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_font
            && self.font_size == other.font_size
            && self.char_space == other.char_space
            && self.word_space == other.word_space
            && self.render_mode == other.render_mode
            && self.ctm == other.ctm
    }
}

/// The complete graphics state seen by an operator.
#[derive(Debug, Clone)]
pub struct AllStates {
    /// Current transformation matrix
    pub ctm: Matrix,
    /// Matrix of the enclosing form or pattern, applied to patterns
    pub parent_matrix: Matrix,
    /// Text matrix (`Tm`)
    pub text_matrix: Matrix,
    /// Current text position in text-matrix space
    pub text_pos: Point,
    /// Start of the current text line
    pub text_line_pos: Point,
    /// Leading (`TL`)
    pub text_leading: f32,
    /// Rise (`Ts`)
    pub text_rise: f32,
    /// Horizontal scaling (`Tz` / 100)
    pub text_horz_scale: f32,
    /// General state
    pub general: GeneralState,
    /// Line geometry
    pub graph: GraphState,
    /// Fill and stroke colors
    pub color: ColorState,
    /// Font and text spacing
    pub text: TextState,
    /// Clip region
    pub clip: ClipPath,
}

impl AllStates {
    /// The initial state of a page.
    pub fn new() -> Self {
        Self {
            ctm: Matrix::identity(),
            parent_matrix: Matrix::identity(),
            text_matrix: Matrix::identity(),
            text_pos: Point::default(),
            text_line_pos: Point::default(),
            text_leading: 0.0,
            text_rise: 0.0,
            text_horz_scale: 1.0,
            general: GeneralState::default(),
            graph: GraphState::default(),
            color: ColorState::new(),
            text: TextState::default(),
            clip: ClipPath::default(),
        }
    }

    /// A state that inherits only the general, graph, color and text
    /// sub-states of `parent`, as a form does.
    pub fn inherit(parent: &AllStates) -> Self {
        Self {
            general: parent.general.clone(),
            graph: parent.graph.clone(),
            color: parent.color.clone(),
            text: parent.text.clone(),
            ..Self::new()
        }
    }

    /// Set the dash pattern, scaling every length by `scale`.
    pub fn set_line_dash(&mut self, doc: &Document, array: &[Object], phase: f32, scale: f32) {
        self.graph.dash_array = array
            .iter()
            .map(|o| doc.resolve(o).as_number().unwrap_or(0.0) * scale)
            .collect();
        self.graph.dash_phase = phase * scale;
    }

    /// Apply an `ExtGState` parameter dictionary.
    pub fn process_ext_gstate(&mut self, doc: &Document, dict: &Dict) {
        for (key, value) in dict {
            let value = doc.resolve(value);
            match key.as_str() {
                "LW" => {
                    if let Some(w) = value.as_number() {
                        self.graph.line_width = w;
                    }
                },
                "LC" => {
                    if let Some(v) = value.as_integer() {
                        self.graph.line_cap = LineCap::from_int(v as i32);
                    }
                },
                "LJ" => {
                    if let Some(v) = value.as_integer() {
                        self.graph.line_join = LineJoin::from_int(v as i32);
                    }
                },
                "ML" => {
                    if let Some(v) = value.as_number() {
                        self.graph.miter_limit = v;
                    }
                },
                "D" => {
                    if let Some(arr) = value.as_array() {
                        if let Some(dashes) = arr.first().and_then(|d| doc.resolve(d).as_array()) {
                            let phase = arr.get(1).and_then(|p| doc.resolve(p).as_number()).unwrap_or(0.0);
                            let dashes = dashes.clone();
                            self.set_line_dash(doc, &dashes, phase, 1.0);
                        }
                    }
                },
                "RI" => {
                    if let Some(name) = value.as_name() {
                        self.general.rendering_intent = name.to_string();
                    }
                },
                "Font" => {
                    if let Some(arr) = value.as_array() {
                        if let Some(size) = arr.get(1).and_then(|s| doc.resolve(s).as_number()) {
                            self.text.font_size = size;
                        }
                        if let Some(font) = arr.first().and_then(|f| load_font(doc, f)) {
                            self.text.font = Some(font);
                        }
                    }
                },
                "TR" => {
                    if !dict.contains_key("TR2") {
                        self.general.transfer = transfer_entry(dict.get(key.as_str()), value);
                    }
                },
                "TR2" => {
                    self.general.transfer = transfer_entry(dict.get(key.as_str()), value);
                },
                "BM" => {
                    let name = match value {
                        Object::Array(arr) => arr.first().and_then(|n| doc.resolve(n).as_name()),
                        other => other.as_name(),
                    };
                    self.general.blend_mode = BlendMode::from_name(name.unwrap_or("Normal"));
                },
                "SMask" => match value.as_dict() {
                    Some(mask) => {
                        self.general.soft_mask = Some(Rc::new(mask.clone()));
                        self.general.soft_mask_matrix = self.ctm;
                    },
                    None => self.general.soft_mask = None,
                },
                "CA" => {
                    if let Some(a) = value.as_number() {
                        self.general.stroke_alpha = a.clamp(0.0, 1.0);
                    }
                },
                "ca" => {
                    if let Some(a) = value.as_number() {
                        self.general.fill_alpha = a.clamp(0.0, 1.0);
                    }
                },
                "OP" => {
                    let op = value.as_bool().unwrap_or(false);
                    self.general.stroke_overprint = op;
                    if !dict.contains_key("op") {
                        self.general.fill_overprint = op;
                    }
                },
                "op" => self.general.fill_overprint = value.as_bool().unwrap_or(false),
                "OPM" => self.general.overprint_mode = value.as_integer().unwrap_or(0) as i32,
                "FL" => {
                    if let Some(v) = value.as_number() {
                        self.general.flatness = v;
                    }
                },
                "SM" => {
                    if let Some(v) = value.as_number() {
                        self.general.smoothness = v;
                    }
                },
                "SA" => self.general.stroke_adjust = value.as_bool().unwrap_or(false),
                "AIS" => self.general.alpha_source = value.as_bool().unwrap_or(false),
                "TK" => self.general.text_knockout = value.as_bool().unwrap_or(false),
                _ => {},
            }
        }
    }
}

impl Default for AllStates {
    fn default() -> Self {
        Self::new()
    }
}

/// `TR`/`TR2` value: names (`/Identity`, `/Default`) clear the transfer.
fn transfer_entry(raw: Option<&Object>, resolved: &Object) -> Option<Object> {
    match resolved {
        Object::Name(_) | Object::Null => None,
        _ => raw.cloned(),
    }
}

/// Stack of graphics states for `q` and `Q`.
///
/// The bottom state can never be popped: a `Q` without a matching `q`
/// leaves the current state untouched.
#[derive(Debug, Clone)]
pub struct GraphicsStateStack {
    current: AllStates,
    saved: Vec<AllStates>,
}

impl GraphicsStateStack {
    /// Create a stack holding one initial state.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::content::GraphicsStateStack;
    ///
    /// let stack = GraphicsStateStack::new();
    /// assert_eq!(stack.depth(), 1);
    /// ```
    pub fn new() -> Self {
        Self::with_state(AllStates::new())
    }

    /// Create a stack starting from `state`.
    pub fn with_state(state: AllStates) -> Self {
        Self {
            current: state,
            saved: Vec::new(),
        }
    }

    /// The current state.
    pub fn current(&self) -> &AllStates {
        &self.current
    }

    /// The current state, mutably.
    pub fn current_mut(&mut self) -> &mut AllStates {
        &mut self.current
    }

    /// Save a copy of the current state (`q`).
    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// Restore the last saved state (`Q`).
    ///
    /// Returns false when nothing was saved.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::content::GraphicsStateStack;
    ///
    /// let mut stack = GraphicsStateStack::new();
    /// stack.save();
    /// stack.current_mut().graph.line_width = 4.0;
    /// assert!(stack.restore());
    /// assert_eq!(stack.current().graph.line_width, 1.0);
    /// assert!(!stack.restore()); // no effect on the bottom state
    /// assert_eq!(stack.depth(), 1);
    /// ```
    pub fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some(state) => {
                self.current = state;
                true
            },
            None => false,
        }
    }

    /// Number of states, the current one included.
    pub fn depth(&self) -> usize {
        self.saved.len() + 1
    }
}

impl Default for GraphicsStateStack {
    fn default() -> Self {
        Self::new()
    }
}
