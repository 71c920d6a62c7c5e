//! Color spaces, colors and the fill/stroke color state.
//!
//! Color spaces are loaded from resource objects and shared through `Rc`.
//! Conversion to RGB is approximate for the calibrated and ICC families:
//! calibrated spaces use their device equivalents and ICC profiles are
//! replaced by their alternate space.

use crate::content::function::Function;
use crate::content::pattern::Pattern;
use crate::document::Document;
use crate::object::{Object, ObjectRef};
use serde::Serialize;
use std::collections::HashSet;
use std::rc::Rc;

/// Maximum nesting of based color spaces (Indexed over ICCBased over ...).
const MAX_COLOR_SPACE_DEPTH: u32 = 16;

/// An RGB color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RgbColor {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
}

impl RgbColor {
    /// Black.
    pub const BLACK: RgbColor = RgbColor { r: 0.0, g: 0.0, b: 0.0 };
    /// White.
    pub const WHITE: RgbColor = RgbColor { r: 1.0, g: 1.0, b: 1.0 };

    /// Create a color, clamping each component.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// From a packed `0xRRGGBB` value.
    pub fn from_u32(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as f32 / 255.0,
            g: ((rgb >> 8) & 0xFF) as f32 / 255.0,
            b: (rgb & 0xFF) as f32 / 255.0,
        }
    }

    /// Components as 8-bit values.
    pub fn to_bytes(self) -> [u8; 3] {
        [
            (self.r * 255.0 + 0.5) as u8,
            (self.g * 255.0 + 0.5) as u8,
            (self.b * 255.0 + 0.5) as u8,
        ]
    }

    /// Packed `0xAARRGGBB` with the given alpha.
    pub fn to_argb(self, alpha: f32) -> u32 {
        let [r, g, b] = self.to_bytes();
        let a = (alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
        (a << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
    }

    /// Luminosity used by soft masks and gray output.
    pub fn luminosity(self) -> f32 {
        self.r * 0.30 + self.g * 0.59 + self.b * 0.11
    }
}

/// Color space families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorSpaceFamily {
    /// DeviceGray
    DeviceGray,
    /// DeviceRGB
    DeviceRgb,
    /// DeviceCMYK
    DeviceCmyk,
    /// CalGray
    CalGray,
    /// CalRGB
    CalRgb,
    /// Lab
    Lab,
    /// ICCBased
    IccBased,
    /// Indexed
    Indexed,
    /// Separation
    Separation,
    /// DeviceN
    DeviceN,
    /// Pattern
    Pattern,
}

/// A loaded color space.
#[derive(Debug)]
pub enum ColorSpace {
    /// One gray component
    DeviceGray,
    /// Three RGB components
    DeviceRgb,
    /// Four CMYK components
    DeviceCmyk,
    /// Calibrated gray, converted as DeviceGray
    CalGray,
    /// Calibrated RGB, converted as DeviceRGB
    CalRgb,
    /// CIE L*a*b* with the a*/b* ranges
    Lab {
        /// a_min, a_max, b_min, b_max
        ranges: [f32; 4],
    },
    /// ICC profile replaced by its alternate space
    IccBased {
        /// Number of components (1, 3 or 4)
        components: usize,
        /// Space used for conversion
        alternate: Rc<ColorSpace>,
        /// Component ranges
        ranges: Vec<f32>,
    },
    /// Palette over a base space
    Indexed {
        /// Base space
        base: Rc<ColorSpace>,
        /// Highest valid index
        max_index: u32,
        /// Palette bytes, `base.components()` per entry
        lookup: Vec<u8>,
    },
    /// Single colorant with a tint transform
    Separation {
        /// Colorant name
        name: String,
        /// Alternate space, absent for `/None`
        alternate: Option<Rc<ColorSpace>>,
        /// Tint transform
        function: Option<Rc<Function>>,
    },
    /// Several colorants with a tint transform
    DeviceN {
        /// Colorant names
        names: Vec<String>,
        /// Alternate space
        alternate: Rc<ColorSpace>,
        /// Tint transform
        function: Rc<Function>,
    },
    /// Pattern space with an optional underlying space for uncolored patterns
    Pattern {
        /// Underlying space
        base: Option<Rc<ColorSpace>>,
    },
}

impl ColorSpace {
    /// A device or pattern space by family.
    pub fn stock(family: ColorSpaceFamily) -> Rc<ColorSpace> {
        Rc::new(match family {
            ColorSpaceFamily::DeviceRgb => ColorSpace::DeviceRgb,
            ColorSpaceFamily::DeviceCmyk => ColorSpace::DeviceCmyk,
            ColorSpaceFamily::Pattern => ColorSpace::Pattern { base: None },
            _ => ColorSpace::DeviceGray,
        })
    }

    /// The stock space for a device family name, abbreviations included.
    pub fn stock_by_name(name: &str) -> Option<Rc<ColorSpace>> {
        let family = match name {
            "DeviceRGB" | "RGB" => ColorSpaceFamily::DeviceRgb,
            "DeviceGray" | "G" => ColorSpaceFamily::DeviceGray,
            "DeviceCMYK" | "CMYK" => ColorSpaceFamily::DeviceCmyk,
            "Pattern" => ColorSpaceFamily::Pattern,
            _ => return None,
        };
        Some(Self::stock(family))
    }

    /// Load a color space from a name, array or stream.
    ///
    /// Indirect arrays are cached in the document. Loops through based
    /// spaces and spaces without components fail.
    pub fn load(doc: &Document, obj: &Object) -> Option<Rc<ColorSpace>> {
        let mut visited = HashSet::new();
        Self::load_visited(doc, obj, &mut visited, 0)
    }

    fn load_visited(
        doc: &Document,
        obj: &Object,
        visited: &mut HashSet<ObjectRef>,
        depth: u32,
    ) -> Option<Rc<ColorSpace>> {
        if depth > MAX_COLOR_SPACE_DEPTH {
            return None;
        }
        let obj_ref = obj.as_reference();
        if let Some(r) = obj_ref {
            if let Some(cs) = doc.cache.color_spaces.borrow().get(&r) {
                return Some(cs.clone());
            }
            if !visited.insert(r) {
                log::warn!("Color space loop through {}", r);
                return None;
            }
        }
        let resolved = doc.resolve(obj);
        let cs = match resolved {
            Object::Name(name) => Self::stock_by_name(name),
            Object::Stream { dict, .. } => dict.values().find_map(|v| {
                doc.resolve(v).as_name().and_then(Self::stock_by_name)
            }),
            Object::Array(arr) => Self::load_array(doc, arr, visited, depth),
            _ => None,
        };
        if let Some(r) = obj_ref {
            visited.remove(&r);
        }
        let cs = cs.filter(|cs| cs.components() > 0)?;
        if let Some(r) = obj_ref {
            doc.cache.color_spaces.borrow_mut().insert(r, cs.clone());
        }
        Some(cs)
    }

    fn load_array(
        doc: &Document,
        arr: &[Object],
        visited: &mut HashSet<ObjectRef>,
        depth: u32,
    ) -> Option<Rc<ColorSpace>> {
        let family = doc.resolve(arr.first()?).as_name()?;
        if arr.len() == 1 {
            return Self::stock_by_name(family);
        }
        let load_base = |visited: &mut HashSet<ObjectRef>, i: usize| {
            arr.get(i)
                .and_then(|o| Self::load_visited(doc, o, visited, depth + 1))
        };

        let prefix: String = family.chars().take(4).collect();
        let cs = match prefix.as_str() {
            "CalG" => ColorSpace::CalGray,
            "CalR" => ColorSpace::CalRgb,
            "Lab" => {
                let dict = doc.resolve(arr.get(1)?).as_dict()?;
                let ranges = match dict.get("Range").and_then(|o| doc.number_array(o)) {
                    Some(r) if r.len() >= 4 => [r[0], r[1], r[2], r[3]],
                    _ => [-100.0, 100.0, -100.0, 100.0],
                };
                ColorSpace::Lab { ranges }
            },
            "ICCB" => {
                let dict = doc.resolve(arr.get(1)?).as_dict()?;
                let components = doc.dict_get(dict, "N").as_integer().unwrap_or(0) as usize;
                let fallback = match components {
                    1 => ColorSpaceFamily::DeviceGray,
                    3 => ColorSpaceFamily::DeviceRgb,
                    4 => ColorSpaceFamily::DeviceCmyk,
                    _ => {
                        log::debug!("ICCBased space with {} components", components);
                        return None;
                    },
                };
                let alternate = dict
                    .get("Alternate")
                    .and_then(|o| Self::load_visited(doc, o, visited, depth + 1))
                    .filter(|alt| alt.family() != ColorSpaceFamily::Pattern && alt.components() == components)
                    .unwrap_or_else(|| Self::stock(fallback));
                let ranges = match dict.get("Range").and_then(|o| doc.number_array(o)) {
                    Some(r) if r.len() >= components * 2 => r[..components * 2].to_vec(),
                    _ => [0.0, 1.0].repeat(components),
                };
                ColorSpace::IccBased {
                    components,
                    alternate,
                    ranges,
                }
            },
            "Inde" | "I" => {
                let base = load_base(visited, 1)?;
                if matches!(base.family(), ColorSpaceFamily::Indexed | ColorSpaceFamily::Pattern) {
                    return None;
                }
                let max_index = doc.resolve(arr.get(2)?).as_integer()?.clamp(0, 255) as u32;
                let lookup = match doc.resolve(arr.get(3)?) {
                    Object::String(bytes) => bytes.clone(),
                    stream @ Object::Stream { .. } => doc.decode_stream(stream).ok()?,
                    _ => return None,
                };
                ColorSpace::Indexed {
                    base,
                    max_index,
                    lookup,
                }
            },
            "Sepa" => {
                let name = doc.resolve(arr.get(1)?).as_name().unwrap_or_default().to_string();
                if name == "None" {
                    ColorSpace::Separation {
                        name,
                        alternate: None,
                        function: None,
                    }
                } else {
                    let alternate = load_base(visited, 2)?;
                    if alternate.is_special() {
                        return None;
                    }
                    let function = arr
                        .get(3)
                        .and_then(|o| Function::load(doc, o))
                        .filter(|f| f.outputs() >= alternate.components());
                    ColorSpace::Separation {
                        name,
                        alternate: Some(alternate),
                        function,
                    }
                }
            },
            "Devi" => {
                let names: Vec<String> = doc
                    .resolve(arr.get(1)?)
                    .as_array()?
                    .iter()
                    .filter_map(|o| doc.resolve(o).as_name().map(str::to_string))
                    .collect();
                if names.is_empty() {
                    return None;
                }
                let alternate = load_base(visited, 2)?;
                if alternate.is_special() {
                    return None;
                }
                let function = Function::load(doc, arr.get(3)?)?;
                if function.outputs() < alternate.components() {
                    return None;
                }
                ColorSpace::DeviceN {
                    names,
                    alternate,
                    function,
                }
            },
            "Patt" => ColorSpace::Pattern {
                base: load_base(visited, 1).filter(|b| b.family() != ColorSpaceFamily::Pattern),
            },
            _ => {
                log::debug!("Unknown color space family {}", family);
                return None;
            },
        };
        Some(Rc::new(cs))
    }

    /// The family of this space.
    pub fn family(&self) -> ColorSpaceFamily {
        match self {
            ColorSpace::DeviceGray => ColorSpaceFamily::DeviceGray,
            ColorSpace::DeviceRgb => ColorSpaceFamily::DeviceRgb,
            ColorSpace::DeviceCmyk => ColorSpaceFamily::DeviceCmyk,
            ColorSpace::CalGray => ColorSpaceFamily::CalGray,
            ColorSpace::CalRgb => ColorSpaceFamily::CalRgb,
            ColorSpace::Lab { .. } => ColorSpaceFamily::Lab,
            ColorSpace::IccBased { .. } => ColorSpaceFamily::IccBased,
            ColorSpace::Indexed { .. } => ColorSpaceFamily::Indexed,
            ColorSpace::Separation { .. } => ColorSpaceFamily::Separation,
            ColorSpace::DeviceN { .. } => ColorSpaceFamily::DeviceN,
            ColorSpace::Pattern { .. } => ColorSpaceFamily::Pattern,
        }
    }

    /// Pattern, Indexed, Separation and DeviceN cannot be alternates.
    fn is_special(&self) -> bool {
        matches!(
            self.family(),
            ColorSpaceFamily::Pattern
                | ColorSpaceFamily::Indexed
                | ColorSpaceFamily::Separation
                | ColorSpaceFamily::DeviceN
        )
    }

    /// Number of color components.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => 1,
            ColorSpace::DeviceRgb | ColorSpace::CalRgb | ColorSpace::Lab { .. } => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::IccBased { components, .. } => *components,
            ColorSpace::Indexed { .. } | ColorSpace::Separation { .. } => 1,
            ColorSpace::DeviceN { names, .. } => names.len(),
            ColorSpace::Pattern { base } => base.as_ref().map_or(1, |b| b.components()),
        }
    }

    /// Subtractive spaces, where overprint simulation darkens.
    pub fn is_subtractive(&self) -> bool {
        matches!(
            self.family(),
            ColorSpaceFamily::DeviceCmyk | ColorSpaceFamily::Separation | ColorSpaceFamily::DeviceN
        )
    }

    /// Initial value, minimum and maximum of component `index`.
    pub fn default_value(&self, index: usize) -> (f32, f32, f32) {
        match self {
            ColorSpace::Lab { ranges } => {
                if index > 0 && ranges[index * 2 - 2] <= ranges[index * 2 - 1] {
                    let (min, max) = (ranges[index * 2 - 2], ranges[index * 2 - 1]);
                    (0.0f32.clamp(min, max), min, max)
                } else {
                    (0.0, 0.0, 100.0)
                }
            },
            ColorSpace::IccBased { ranges, .. } => {
                let min = ranges.get(index * 2).copied().unwrap_or(0.0);
                let max = ranges.get(index * 2 + 1).copied().unwrap_or(1.0);
                (min.max(0.0).min(max), min, max)
            },
            ColorSpace::Indexed { max_index, .. } => (0.0, 0.0, *max_index as f32),
            ColorSpace::Separation { .. } | ColorSpace::DeviceN { .. } => (1.0, 0.0, 1.0),
            _ => (0.0, 0.0, 1.0),
        }
    }

    /// Initial color values (`CS`/`cs` set these).
    pub fn initial_values(&self) -> Vec<f32> {
        (0..self.components()).map(|i| self.default_value(i).0).collect()
    }

    /// Default image `Decode` array for a given bit depth.
    pub fn default_decode(&self, bits_per_component: u32) -> Vec<f32> {
        if let ColorSpace::Indexed { .. } = self {
            let max = ((1u32 << bits_per_component.min(16)) - 1) as f32;
            return vec![0.0, max];
        }
        (0..self.components())
            .flat_map(|i| {
                let (_, min, max) = self.default_value(i);
                [min, max]
            })
            .collect()
    }

    /// Convert component values to RGB.
    ///
    /// Missing components read as 0. Returns `None` for spaces that paint
    /// nothing (`/None` separations) and for patterns without a base.
    pub fn to_rgb(&self, values: &[f32]) -> Option<RgbColor> {
        let v = |i: usize| values.get(i).copied().unwrap_or(0.0);
        match self {
            ColorSpace::DeviceGray | ColorSpace::CalGray => {
                let g = v(0);
                Some(RgbColor::new(g, g, g))
            },
            ColorSpace::DeviceRgb | ColorSpace::CalRgb => Some(RgbColor::new(v(0), v(1), v(2))),
            ColorSpace::DeviceCmyk => Some(cmyk_to_rgb(v(0), v(1), v(2), v(3))),
            ColorSpace::Lab { .. } => Some(lab_to_rgb(v(0), v(1), v(2))),
            ColorSpace::IccBased { alternate, .. } => alternate.to_rgb(values),
            ColorSpace::Indexed {
                base,
                max_index,
                lookup,
            } => {
                let index = (v(0).round().max(0.0) as u32).min(*max_index) as usize;
                let comps = base.components();
                let start = index * comps;
                let entry: Vec<f32> = (0..comps)
                    .map(|i| {
                        let byte = lookup.get(start + i).copied().unwrap_or(0) as f32 / 255.0;
                        let (_, min, max) = base.default_value(i);
                        min + byte * (max - min)
                    })
                    .collect();
                base.to_rgb(&entry)
            },
            ColorSpace::Separation {
                alternate, function, ..
            } => {
                let alternate = alternate.as_ref()?;
                match function {
                    Some(f) => alternate.to_rgb(&f.evaluate(&[v(0)])),
                    None => alternate.to_rgb(&vec![v(0); alternate.components()]),
                }
            },
            ColorSpace::DeviceN {
                alternate, function, names,
            } => {
                let inputs: Vec<f32> = (0..names.len()).map(v).collect();
                alternate.to_rgb(&function.evaluate(&inputs))
            },
            ColorSpace::Pattern { base } => base.as_ref().and_then(|b| b.to_rgb(values)),
        }
    }
}

/// Naive CMYK conversion without a profile.
pub fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> RgbColor {
    let k = k.clamp(0.0, 1.0);
    RgbColor::new(
        (1.0 - c.clamp(0.0, 1.0)) * (1.0 - k),
        (1.0 - m.clamp(0.0, 1.0)) * (1.0 - k),
        (1.0 - y.clamp(0.0, 1.0)) * (1.0 - k),
    )
}

fn srgb_gamma(value: f32) -> f32 {
    let value = value.clamp(0.0, 1.0);
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_to_rgb(l: f32, a: f32, b: f32) -> RgbColor {
    let m = (l + 16.0) / 116.0;
    let ll = m + a / 500.0;
    let n = m - b / 200.0;
    let x = if ll < 0.2069 { 0.957 * 0.12842 * (ll - 0.1379) } else { 0.957 * ll * ll * ll };
    let y = if m < 0.2069 { 0.12842 * (m - 0.1379) } else { m * m * m };
    let z = if n < 0.2069 { 1.0889 * 0.12842 * (n - 0.1379) } else { 1.0889 * n * n * n };
    RgbColor::new(
        srgb_gamma(3.2410 * x - 1.5374 * y - 0.4986 * z),
        srgb_gamma(-0.9692 * x + 1.8760 * y + 0.0416 * z),
        srgb_gamma(0.0556 * x - 0.2040 * y + 1.0570 * z),
    )
}

/// A color: a space plus component values, or a pattern.
#[derive(Debug, Clone)]
pub struct Color {
    space: Rc<ColorSpace>,
    values: Vec<f32>,
    pattern: Option<Rc<Pattern>>,
}

impl Default for Color {
    fn default() -> Self {
        Self::new(ColorSpace::stock(ColorSpaceFamily::DeviceGray))
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        self.space.family() == other.space.family()
            && self.values == other.values
            && match (&self.pattern, &other.pattern) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl Color {
    /// A color in `space` with its initial values.
    pub fn new(space: Rc<ColorSpace>) -> Self {
        let values = space.initial_values();
        Self {
            space,
            values,
            pattern: None,
        }
    }

    /// The color space.
    pub fn space(&self) -> &Rc<ColorSpace> {
        &self.space
    }

    /// Component values (for patterns: the uncolored pattern's tint).
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The pattern painted by this color.
    pub fn pattern(&self) -> Option<&Rc<Pattern>> {
        self.pattern.as_ref()
    }

    /// True when this color is a pattern.
    pub fn is_pattern(&self) -> bool {
        self.space.family() == ColorSpaceFamily::Pattern
    }

    /// Set component values; ignored when the count is wrong.
    pub fn set_values(&mut self, values: &[f32]) -> bool {
        if self.is_pattern() || values.len() != self.space.components() {
            return false;
        }
        self.values = values.to_vec();
        true
    }

    /// Set the pattern and, for uncolored patterns, its tint values.
    pub fn set_pattern(&mut self, pattern: Rc<Pattern>, values: &[f32]) {
        if !self.is_pattern() {
            self.space = ColorSpace::stock(ColorSpaceFamily::Pattern);
        }
        self.values = values.to_vec();
        self.pattern = Some(pattern);
    }

    /// RGB value of a non-pattern color.
    pub fn rgb(&self) -> Option<RgbColor> {
        if self.is_pattern() {
            return None;
        }
        self.space.to_rgb(&self.values)
    }
}

/// Fill and stroke colors plus their cached RGB values.
///
/// A `None` RGB value means the color paints nothing by itself: a
/// `/None` separation or a shading pattern.
///
/// The default state has neither color set. Renderers substitute the
/// colors of their initial states for unset ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorState {
    fill: Color,
    stroke: Color,
    fill_rgb: Option<RgbColor>,
    stroke_rgb: Option<RgbColor>,
    fill_set: bool,
    stroke_set: bool,
}

impl Default for ColorState {
    fn default() -> Self {
        Self {
            fill: Color::default(),
            stroke: Color::default(),
            fill_rgb: Some(RgbColor::BLACK),
            stroke_rgb: Some(RgbColor::BLACK),
            fill_set: false,
            stroke_set: false,
        }
    }
}

/// Gray placeholder painted for colored tiling patterns.
const PATTERN_PLACEHOLDER: u32 = 0xBF_BF_BF;

fn pattern_rgb(pattern: &Pattern, color: &Color) -> Option<RgbColor> {
    match pattern {
        Pattern::Tiling(tiling) if !tiling.colored => match color.space().as_ref() {
            ColorSpace::Pattern { base: Some(base) } => base.to_rgb(color.values()),
            _ => None,
        },
        Pattern::Tiling(_) => Some(RgbColor::from_u32(PATTERN_PLACEHOLDER)),
        Pattern::Shading(_) => None,
    }
}

impl ColorState {
    /// Page start state: black in DeviceGray for both, marked as set.
    pub fn new() -> Self {
        Self {
            fill_set: true,
            stroke_set: true,
            ..Self::default()
        }
    }

    /// Fill color.
    pub fn fill_color(&self) -> &Color {
        &self.fill
    }

    /// Stroke color.
    pub fn stroke_color(&self) -> &Color {
        &self.stroke
    }

    /// Cached RGB of the fill color.
    pub fn fill_rgb(&self) -> Option<RgbColor> {
        self.fill_rgb
    }

    /// Cached RGB of the stroke color.
    pub fn stroke_rgb(&self) -> Option<RgbColor> {
        self.stroke_rgb
    }

    /// True when no fill color was ever set.
    pub fn is_fill_missing(&self) -> bool {
        !self.fill_set
    }

    /// True when no stroke color was ever set.
    pub fn is_stroke_missing(&self) -> bool {
        !self.stroke_set
    }

    /// Take the colors missing here from `parent`.
    pub fn inherit_missing(&mut self, parent: &ColorState) {
        if self.is_fill_missing() {
            self.fill = parent.fill.clone();
            self.fill_rgb = parent.fill_rgb;
            self.fill_set = parent.fill_set;
        }
        if self.is_stroke_missing() {
            self.stroke = parent.stroke.clone();
            self.stroke_rgb = parent.stroke_rgb;
            self.stroke_set = parent.stroke_set;
        }
    }

    /// `cs`: select the fill space and its initial color.
    pub fn set_fill_color_space(&mut self, space: Rc<ColorSpace>) {
        self.fill = Color::new(space);
        self.fill_rgb = self.fill.rgb();
        self.fill_set = true;
    }

    /// `CS`: select the stroke space and its initial color.
    pub fn set_stroke_color_space(&mut self, space: Rc<ColorSpace>) {
        self.stroke = Color::new(space);
        self.stroke_rgb = self.stroke.rgb();
        self.stroke_set = true;
    }

    /// `sc`/`scn` with numbers. Ignored when the count does not match.
    pub fn set_fill_values(&mut self, values: &[f32]) {
        if self.fill.set_values(values) {
            self.fill_rgb = self.fill.rgb();
            self.fill_set = true;
        }
    }

    /// `SC`/`SCN` with numbers.
    pub fn set_stroke_values(&mut self, values: &[f32]) {
        if self.stroke.set_values(values) {
            self.stroke_rgb = self.stroke.rgb();
            self.stroke_set = true;
        }
    }

    /// `g`, `rg` and `k`: switch to a device space and set values.
    pub fn set_fill_device(&mut self, family: ColorSpaceFamily, values: &[f32]) {
        if self.fill.space.family() != family || self.fill.pattern.is_some() {
            self.set_fill_color_space(ColorSpace::stock(family));
        }
        self.set_fill_values(values);
    }

    /// `G`, `RG` and `K`.
    pub fn set_stroke_device(&mut self, family: ColorSpaceFamily, values: &[f32]) {
        if self.stroke.space.family() != family || self.stroke.pattern.is_some() {
            self.set_stroke_color_space(ColorSpace::stock(family));
        }
        self.set_stroke_values(values);
    }

    /// `scn` with a pattern name.
    pub fn set_fill_pattern(&mut self, pattern: Rc<Pattern>, values: &[f32]) {
        self.fill.set_pattern(pattern.clone(), values);
        self.fill_rgb = pattern_rgb(&pattern, &self.fill);
        self.fill_set = true;
    }

    /// `SCN` with a pattern name.
    pub fn set_stroke_pattern(&mut self, pattern: Rc<Pattern>, values: &[f32]) {
        self.stroke.set_pattern(pattern.clone(), values);
        self.stroke_rgb = pattern_rgb(&pattern, &self.stroke);
        self.stroke_set = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_stock_names() {
        assert_eq!(ColorSpace::stock_by_name("RGB").map(|c| c.components()), Some(3));
        assert_eq!(ColorSpace::stock_by_name("G").map(|c| c.family()), Some(ColorSpaceFamily::DeviceGray));
        assert_eq!(ColorSpace::stock_by_name("CMYK").map(|c| c.components()), Some(4));
        assert!(ColorSpace::stock_by_name("Foo").is_none());
    }

    #[test]
    fn test_device_conversions() {
        let rgb = ColorSpace::DeviceRgb.to_rgb(&[1.0, 0.0, 0.0]);
        assert_eq!(rgb, Some(RgbColor::new(1.0, 0.0, 0.0)));
        let cmyk = ColorSpace::DeviceCmyk.to_rgb(&[0.0, 1.0, 1.0, 0.0]);
        assert_eq!(cmyk, Some(RgbColor::new(1.0, 0.0, 0.0)));
        assert_eq!(ColorSpace::DeviceGray.to_rgb(&[]), Some(RgbColor::BLACK));
    }

    #[test]
    fn test_indexed_lookup() {
        let doc = Document::new();
        let cs = Object::Array(vec![
            Object::Name("Indexed".into()),
            Object::Name("DeviceRGB".into()),
            Object::Integer(1),
            Object::String(vec![255, 0, 0, 0, 0, 255]),
        ]);
        let cs = ColorSpace::load(&doc, &cs).unwrap();
        assert_eq!(cs.components(), 1);
        assert_eq!(cs.to_rgb(&[1.0]), Some(RgbColor::new(0.0, 0.0, 1.0)));
        assert_eq!(cs.to_rgb(&[7.0]), Some(RgbColor::new(0.0, 0.0, 1.0)));
        assert_eq!(cs.default_decode(8), vec![0.0, 255.0]);
    }

    #[test]
    fn test_separation_with_tint_function() {
        let mut doc = Document::new();
        let mut f = Dict::new();
        f.insert("FunctionType".into(), Object::Integer(2));
        f.insert("Domain".into(), Object::Array(vec![Object::Integer(0), Object::Integer(1)]));
        f.insert("C0".into(), Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(0), Object::Integer(0)]));
        f.insert("C1".into(), Object::Array(vec![Object::Integer(0), Object::Integer(1), Object::Integer(0), Object::Integer(0)]));
        f.insert("N".into(), Object::Integer(1));
        let f_ref = doc.add(Object::Dictionary(f));
        let cs = Object::Array(vec![
            Object::Name("Separation".into()),
            Object::Name("Spot".into()),
            Object::Name("DeviceCMYK".into()),
            Object::Reference(f_ref),
        ]);
        let cs = ColorSpace::load(&doc, &cs).unwrap();
        assert_eq!(cs.default_value(0).0, 1.0);
        let rgb = cs.to_rgb(&[1.0]).unwrap();
        assert!(approx(rgb.r, 1.0) && approx(rgb.g, 0.0) && approx(rgb.b, 1.0));
    }

    #[test]
    fn test_separation_none_paints_nothing() {
        let doc = Document::new();
        let cs = Object::Array(vec![
            Object::Name("Separation".into()),
            Object::Name("None".into()),
            Object::Name("DeviceGray".into()),
        ]);
        let cs = ColorSpace::load(&doc, &cs).unwrap();
        assert!(cs.to_rgb(&[1.0]).is_none());
    }

    #[test]
    fn test_icc_falls_back_to_component_count() {
        let mut doc = Document::new();
        let mut dict = Dict::new();
        dict.insert("N".into(), Object::Integer(3));
        let stream = doc.add(Object::Stream {
            dict,
            data: bytes::Bytes::new(),
        });
        let cs = Object::Array(vec![Object::Name("ICCBased".into()), Object::Reference(stream)]);
        let cs = ColorSpace::load(&doc, &cs).unwrap();
        assert_eq!(cs.family(), ColorSpaceFamily::IccBased);
        assert_eq!(cs.to_rgb(&[0.0, 1.0, 0.0]), Some(RgbColor::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_self_referencing_color_space_fails() {
        let mut doc = Document::new();
        let r = doc.add(Object::Null);
        doc.insert(
            r,
            Object::Array(vec![
                Object::Name("Indexed".into()),
                Object::Reference(r),
                Object::Integer(0),
                Object::String(vec![0]),
            ]),
        );
        assert!(ColorSpace::load(&doc, &Object::Reference(r)).is_none());
    }

    #[test]
    fn test_lab_white() {
        let rgb = lab_to_rgb(100.0, 0.0, 0.0);
        assert!(rgb.r > 0.95 && rgb.g > 0.95 && rgb.b > 0.95);
    }

    #[test]
    fn test_color_state_defaults_and_updates() {
        let mut state = ColorState::new();
        assert_eq!(state.fill_rgb(), Some(RgbColor::BLACK));
        state.set_fill_device(ColorSpaceFamily::DeviceRgb, &[1.0, 0.0, 0.0]);
        assert_eq!(state.fill_rgb(), Some(RgbColor::new(1.0, 0.0, 0.0)));
        state.set_fill_values(&[0.5]);
        assert_eq!(state.fill_rgb(), Some(RgbColor::new(1.0, 0.0, 0.0)));
        state.set_stroke_color_space(ColorSpace::stock(ColorSpaceFamily::DeviceCmyk));
        assert_eq!(state.stroke_rgb(), Some(RgbColor::WHITE));
    }

    #[test]
    fn test_unset_colors_inherit() {
        let mut state = ColorState::default();
        assert!(state.is_fill_missing() && state.is_stroke_missing());
        state.set_stroke_device(ColorSpaceFamily::DeviceGray, &[0.5]);
        assert!(!state.is_stroke_missing());

        let mut parent = ColorState::new();
        parent.set_fill_device(ColorSpaceFamily::DeviceRgb, &[0.0, 0.0, 1.0]);
        parent.set_stroke_device(ColorSpaceFamily::DeviceRgb, &[1.0, 0.0, 0.0]);
        state.inherit_missing(&parent);
        assert_eq!(state.fill_rgb(), Some(RgbColor::new(0.0, 0.0, 1.0)));
        assert!(!state.is_fill_missing());
        assert_eq!(state.stroke_rgb(), Some(RgbColor::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn test_pattern_space_counts_as_set() {
        let mut state = ColorState::default();
        state.set_fill_color_space(ColorSpace::stock(ColorSpaceFamily::Pattern));
        assert!(!state.is_fill_missing());
        assert_eq!(state.fill_rgb(), None);
    }

    #[test]
    fn test_argb_packing() {
        assert_eq!(RgbColor::new(1.0, 0.0, 0.0).to_argb(1.0), 0xFFFF0000);
        assert_eq!(RgbColor::from_u32(0x00FF00).to_bytes(), [0, 255, 0]);
    }
}
