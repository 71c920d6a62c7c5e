//! Render options: output format, color translation and optional content.

use crate::config::RenderLimits;
use crate::content::color::RgbColor;
use crate::content::marks::MarkParams;
use crate::content::page_object::{PageObject, PageObjectKind};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use bitflags::bitflags;
use std::collections::HashSet;

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// PNG format (lossless, supports transparency)
    #[default]
    Png,
    /// JPEG format (lossy, smaller file size)
    Jpeg,
}

/// How colors are translated before painting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Colors as specified
    #[default]
    Normal,
    /// Convert to gray by luminance
    Gray,
    /// Paint with the fixed colors of a [`ColorScheme`]
    ForcedColor,
}

bitflags! {
    /// Rendering switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderFlags: u32 {
        /// Stroke every path with a hairline
        const THIN_LINE = 1 << 0;
        /// Disable anti-aliasing for paths
        const NO_PATH_SMOOTH = 1 << 1;
        /// Disable anti-aliasing for text
        const NO_TEXT_SMOOTH = 1 << 2;
        /// Nearest-neighbour image sampling
        const NO_IMAGE_SMOOTH = 1 << 3;
        /// Simulate overprint of subtractive images with a darken blend
        const OVERPRINT = 1 << 4;
        /// Skip objects that cannot be drawn at full fidelity
        const DROP_OBJECTS = 1 << 5;
        /// Pause progressive rendering after each image mask
        const BREAK_FOR_MASKS = 1 << 6;
    }
}

/// Fixed colors used by [`ColorMode::ForcedColor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScheme {
    /// Fill color of paths
    pub path_fill: RgbColor,
    /// Stroke color of paths
    pub path_stroke: RgbColor,
    /// Fill color of text
    pub text_fill: RgbColor,
    /// Stroke color of text
    pub text_stroke: RgbColor,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            path_fill: RgbColor::BLACK,
            path_stroke: RgbColor::BLACK,
            text_fill: RgbColor::BLACK,
            text_stroke: RgbColor::BLACK,
        }
    }
}

/// Which optional content groups are hidden.
///
/// A group is hidden when its `/Name` was hidden explicitly or when the
/// document's default configuration lists it under `/OFF`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalContent {
    hidden_names: HashSet<String>,
    hidden_refs: HashSet<ObjectRef>,
}

impl OptionalContent {
    /// Nothing hidden.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `/OCProperties /D /OFF` from the document catalog.
    pub fn from_document(doc: &Document) -> Self {
        let mut oc = Self::default();
        let off = doc
            .dict_get_dict(doc.trailer(), "Root")
            .and_then(|root| doc.dict_get_dict(root, "OCProperties"))
            .and_then(|props| doc.dict_get_dict(props, "D"))
            .and_then(|d| d.get("OFF"))
            .map(|off| doc.resolve(off));
        if let Some(Object::Array(items)) = off {
            oc.hidden_refs.extend(items.iter().filter_map(Object::as_reference));
        }
        oc
    }

    /// Hide the groups named `name`.
    pub fn hide(&mut self, name: impl Into<String>) {
        self.hidden_names.insert(name.into());
    }

    /// True when nothing is hidden.
    pub fn is_empty(&self) -> bool {
        self.hidden_names.is_empty() && self.hidden_refs.is_empty()
    }

    fn is_group_visible(&self, doc: &Document, group: &Object) -> bool {
        if let Some(r) = group.as_reference() {
            if self.hidden_refs.contains(&r) {
                return false;
            }
        }
        let Some(dict) = doc.resolve(group).as_dict() else {
            return true;
        };
        match doc.dict_get(dict, "Name").as_string() {
            Some(name) => !self.hidden_names.contains(String::from_utf8_lossy(name).as_ref()),
            None => true,
        }
    }

    /// Visibility of an optional content group or membership dictionary.
    pub fn is_visible(&self, doc: &Document, entry: &Object) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(dict) = doc.resolve(entry).as_dict() else {
            return true;
        };
        if doc.dict_get(dict, "Type").as_name() != Some("OCMD") {
            return self.is_group_visible(doc, entry);
        }
        let groups: Vec<&Object> = match dict.get("OCGs").map(|g| (g, doc.resolve(g))) {
            Some((_, Object::Array(items))) => items.iter().collect(),
            Some((g, Object::Dictionary(_))) => vec![g],
            _ => return true,
        };
        if groups.is_empty() {
            return true;
        }
        let mut visible = groups.iter().map(|g| self.is_group_visible(doc, g));
        match doc.dict_get(dict, "P").as_name().unwrap_or("AnyOn") {
            "AllOn" => visible.all(|v| v),
            "AnyOff" => visible.any(|v| !v),
            "AllOff" => visible.all(|v| !v),
            _ => visible.any(|v| v),
        }
    }

    /// Visibility of an object through its `/OC` marked-content sequences.
    pub fn is_object_visible(&self, doc: &Document, obj: &PageObject) -> bool {
        if self.is_empty() {
            return true;
        }
        obj.marks.optional_content().all(|params| match params {
            MarkParams::PropertiesResource { object, .. } => self.is_visible(doc, object),
            MarkParams::DirectDict(dict) => self.is_visible(doc, &Object::Dictionary(dict.clone())),
            MarkParams::None => true,
        })
    }

    /// Visibility of a form or image through the `/OC` entry of its
    /// dictionary.
    pub fn is_dict_visible(&self, doc: &Document, dict: &Dict) -> bool {
        match dict.get("OC") {
            Some(oc) => self.is_visible(doc, oc),
            None => true,
        }
    }
}

/// Options for page rendering.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Dots per inch (default: 150)
    pub dpi: u32,
    /// Output image format
    pub format: ImageFormat,
    /// Background color (None for transparent)
    pub background: Option<[f32; 4]>,
    /// JPEG quality (1-100, only for JPEG format)
    pub jpeg_quality: u8,
    /// Color translation
    pub color_mode: ColorMode,
    /// Colors used in forced-color mode
    pub color_scheme: ColorScheme,
    /// Rendering switches
    pub flags: RenderFlags,
    /// Hidden optional content
    pub optional_content: OptionalContent,
    /// Resource limits
    pub limits: RenderLimits,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: 150,
            format: ImageFormat::Png,
            background: Some([1.0, 1.0, 1.0, 1.0]), // White background
            jpeg_quality: 85,
            color_mode: ColorMode::Normal,
            color_scheme: ColorScheme::default(),
            flags: RenderFlags::empty(),
            optional_content: OptionalContent::new(),
            limits: RenderLimits::default(),
        }
    }
}

impl RenderOptions {
    /// Create options with custom DPI.
    pub fn with_dpi(dpi: u32) -> Self {
        Self {
            dpi,
            ..Default::default()
        }
    }

    /// Set transparent background.
    pub fn with_transparent_background(mut self) -> Self {
        self.background = None;
        self
    }

    /// Set JPEG format with quality.
    pub fn as_jpeg(mut self, quality: u8) -> Self {
        self.format = ImageFormat::Jpeg;
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Render in grayscale.
    pub fn as_gray(mut self) -> Self {
        self.color_mode = ColorMode::Gray;
        self
    }

    /// Paint everything with the colors of `scheme`.
    pub fn with_forced_colors(mut self, scheme: ColorScheme) -> Self {
        self.color_mode = ColorMode::ForcedColor;
        self.color_scheme = scheme;
        self
    }

    /// Add rendering switches.
    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Device pixels per point.
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }

    /// Check the options for values that cannot produce an image.
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 || self.dpi > 4800 {
            return Err(Error::Render(format!("DPI out of range: {}", self.dpi)));
        }
        Ok(())
    }

    /// Apply the color mode to a packed `0xAARRGGBB` value.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::rendering::RenderOptions;
    ///
    /// let gray = RenderOptions::default().as_gray();
    /// assert_eq!(gray.translate_color(0xFF_FF_00_00), 0xFF_4C_4C_4C);
    /// assert_eq!(RenderOptions::default().translate_color(0x80_12_34_56), 0x80_12_34_56);
    /// ```
    pub fn translate_color(&self, argb: u32) -> u32 {
        match self.color_mode {
            ColorMode::Gray => {
                let r = (argb >> 16) & 0xFF;
                let g = (argb >> 8) & 0xFF;
                let b = argb & 0xFF;
                let gray = (r * 30 + g * 59 + b * 11) / 100;
                (argb & 0xFF00_0000) | (gray << 16) | (gray << 8) | gray
            },
            _ => argb,
        }
    }

    /// Forced fill color for an object, if the mode forces one.
    pub fn forced_fill(&self, obj: &PageObject) -> Option<RgbColor> {
        if self.color_mode != ColorMode::ForcedColor {
            return None;
        }
        match obj.kind {
            PageObjectKind::Text(_) => Some(self.color_scheme.text_fill),
            _ => Some(self.color_scheme.path_fill),
        }
    }

    /// Forced stroke color for an object, if the mode forces one.
    pub fn forced_stroke(&self, obj: &PageObject) -> Option<RgbColor> {
        if self.color_mode != ColorMode::ForcedColor {
            return None;
        }
        match obj.kind {
            PageObjectKind::Text(_) => Some(self.color_scheme.text_stroke),
            _ => Some(self.color_scheme.path_stroke),
        }
    }

    /// Anti-aliasing for paths.
    pub fn path_anti_alias(&self) -> bool {
        !self.flags.contains(RenderFlags::NO_PATH_SMOOTH)
    }

    /// Anti-aliasing for glyph outlines.
    pub fn text_anti_alias(&self) -> bool {
        !self.flags.contains(RenderFlags::NO_TEXT_SMOOTH)
    }

    /// Sampling quality for images.
    pub fn image_quality(&self, interpolate: bool) -> tiny_skia::FilterQuality {
        if self.flags.contains(RenderFlags::NO_IMAGE_SMOOTH) {
            tiny_skia::FilterQuality::Nearest
        } else if interpolate {
            tiny_skia::FilterQuality::Bicubic
        } else {
            tiny_skia::FilterQuality::Bilinear
        }
    }
}

/// Rendered image output.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Image data in the specified format
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Output format
    pub format: ImageFormat,
}

impl RenderedImage {
    /// Save the image to a file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::write(path.as_ref(), &self.data)?;
        Ok(())
    }

    /// Get the image data as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::page_object::{PathObject, TextObject};
    use crate::content::path::{FillType, Path};
    use crate::geometry::Matrix;

    #[test]
    fn test_render_options_default() {
        let opts = RenderOptions::default();
        assert_eq!(opts.dpi, 150);
        assert_eq!(opts.format, ImageFormat::Png);
        assert!(opts.background.is_some());
        assert_eq!(opts.color_mode, ColorMode::Normal);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_render_options_with_dpi() {
        let opts = RenderOptions::with_dpi(300);
        assert_eq!(opts.dpi, 300);
        assert!((opts.scale() - 300.0 / 72.0).abs() < 1e-6);
        assert!(RenderOptions::with_dpi(0).validate().is_err());
    }

    #[test]
    fn test_jpeg_quality_clamped() {
        let opts = RenderOptions::default().as_jpeg(0);
        assert_eq!(opts.format, ImageFormat::Jpeg);
        assert_eq!(opts.jpeg_quality, 1);
    }

    #[test]
    fn test_gray_translation() {
        let opts = RenderOptions::default().as_gray();
        // (0*30 + 255*59 + 0*11) / 100 = 150
        assert_eq!(opts.translate_color(0xFF00_FF00), 0xFF96_9696);
        assert_eq!(opts.translate_color(0x00FF_FFFF), 0x00FF_FFFF);
    }

    #[test]
    fn test_forced_colors_by_kind() {
        let scheme = ColorScheme {
            path_fill: RgbColor::new(1.0, 0.0, 0.0),
            path_stroke: RgbColor::new(0.0, 1.0, 0.0),
            text_fill: RgbColor::new(0.0, 0.0, 1.0),
            text_stroke: RgbColor::WHITE,
        };
        let opts = RenderOptions::default().with_forced_colors(scheme);
        let path = PageObject::new(PageObjectKind::Path(PathObject {
            path: Path::new(),
            fill_type: FillType::Winding,
            stroke: false,
            matrix: Matrix::identity(),
        }));
        let text = PageObject::new(PageObjectKind::Text(TextObject {
            items: Vec::new(),
            matrix: Matrix::identity(),
        }));
        assert_eq!(opts.forced_fill(&path), Some(scheme.path_fill));
        assert_eq!(opts.forced_stroke(&path), Some(scheme.path_stroke));
        assert_eq!(opts.forced_fill(&text), Some(scheme.text_fill));
        assert_eq!(RenderOptions::default().forced_fill(&text), None);
    }

    #[test]
    fn test_optional_content_membership() {
        let mut doc = Document::new();
        let mut ocg_a = Dict::new();
        ocg_a.insert("Type".to_string(), Object::Name("OCG".to_string()));
        ocg_a.insert("Name".to_string(), Object::String(b"Draft".to_vec()));
        let a = doc.add(Object::Dictionary(ocg_a));
        let mut ocg_b = Dict::new();
        ocg_b.insert("Type".to_string(), Object::Name("OCG".to_string()));
        ocg_b.insert("Name".to_string(), Object::String(b"Final".to_vec()));
        let b = doc.add(Object::Dictionary(ocg_b));

        let mut oc = OptionalContent::new();
        assert!(oc.is_visible(&doc, &Object::Reference(a)));
        oc.hide("Draft");
        assert!(!oc.is_visible(&doc, &Object::Reference(a)));
        assert!(oc.is_visible(&doc, &Object::Reference(b)));

        let mut ocmd = Dict::new();
        ocmd.insert("Type".to_string(), Object::Name("OCMD".to_string()));
        ocmd.insert(
            "OCGs".to_string(),
            Object::Array(vec![Object::Reference(a), Object::Reference(b)]),
        );
        let any_on = Object::Dictionary(ocmd.clone());
        assert!(oc.is_visible(&doc, &any_on));
        ocmd.insert("P".to_string(), Object::Name("AllOn".to_string()));
        assert!(!oc.is_visible(&doc, &Object::Dictionary(ocmd)));
    }
}
