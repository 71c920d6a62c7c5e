//! Page rendering: drawing parsed page objects onto a raster device.
//!
//! This module turns the object lists produced by the content interpreter
//! into pixels using the pure-Rust `tiny-skia` library.
//!
//! ## Features
//!
//! - Render pages to PNG/JPEG images
//! - Clipping with text clips and anti-aliased clip masks
//! - Transparency groups, soft masks and blend modes
//! - Tiling and shading patterns, all seven shading types
//! - Type 3 glyphs with a glyph bitmap cache
//! - Progressive rendering that can pause between objects
//!
//! ## Example
//!
//! ```
//! use pdf_raster::document::Document;
//! use pdf_raster::geometry::Rect;
//! use pdf_raster::object::Dict;
//! use pdf_raster::rendering::{render_page, RenderOptions};
//!
//! let mut doc = Document::new();
//! let index = doc.add_page(Rect::new(0.0, 0.0, 72.0, 72.0), Dict::new(), b"1 0 0 rg 0 0 72 72 re f");
//! let image = render_page(&doc, index, &RenderOptions::with_dpi(72)).unwrap();
//! assert_eq!((image.width, image.height), (72, 72));
//! ```
//!
//! ## Architecture
//!
//! 1. A [`RenderContext`] holds the document, page resources and layers
//! 2. A [`RenderStatus`] walks one object list: clip, transparency, then
//!    the object itself; forms, groups, glyphs and masks nest new statuses
//! 3. A [`RenderDevice`] keeps the pixmap and the clip stack
//! 4. [`PageRenderer`] encodes the result as PNG or JPEG

mod context;
mod device;
mod image_renderer;
mod options;
mod page_renderer;
mod pattern_renderer;
mod render_status;
mod shading;
mod text_renderer;
mod transfer;

pub use context::{Layer, RenderContext};
pub use device::{DeviceCaps, DeviceClass, RenderDevice};
pub use image_renderer::ImageRenderer;
pub use options::{
    ColorMode, ColorScheme, ImageFormat, OptionalContent, RenderFlags, RenderOptions, RenderedImage,
};
pub use page_renderer::{PageRenderer, PauseIndicator, ProgressiveRenderer, RenderState};
pub use render_status::RenderStatus;
pub use transfer::TransferFunction;

use crate::content::font::Font;
use crate::document::Document;
use crate::error::Result;
use crate::object::{Object, ObjectRef};
use crate::page::Page;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tiny_skia::Mask;

/// Render page `index` of `doc` with `options`.
pub fn render_page(doc: &Document, index: usize, options: &RenderOptions) -> Result<RenderedImage> {
    let mut page = Page::new(doc, index)?;
    page.parse_content(doc);
    PageRenderer::new(options.clone()).render(doc, &page)
}

/// Cache key of a Type 3 glyph bitmap: font, code and the linear part of
/// the glyph-to-device matrix, quantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GlyphKey {
    pub font: usize,
    pub code: u32,
    pub matrix: [i32; 4],
}

/// A rendered glyph, positioned relative to the rounded glyph origin.
#[derive(Debug, Clone)]
pub(crate) struct GlyphBitmap {
    pub left: i32,
    pub top: i32,
    pub mask: Mask,
}

/// Per-document render caches.
#[derive(Default)]
pub struct RenderData {
    transfers: RefCell<HashMap<ObjectRef, Option<Rc<TransferFunction>>>>,
    glyphs: RefCell<HashMap<GlyphKey, Option<Rc<GlyphBitmap>>>>,
    // Keeps glyph-cache fonts alive so their addresses stay unique.
    glyph_fonts: RefCell<HashMap<usize, Rc<dyn Font>>>,
}

impl std::fmt::Debug for RenderData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderData")
            .field("transfers", &self.transfers.borrow().len())
            .field("glyphs", &self.glyphs.borrow().len())
            .finish()
    }
}

impl RenderData {
    /// The transfer function for a `/TR` entry; indirect entries are
    /// sampled once.
    pub fn transfer_function(&self, doc: &Document, obj: &Object) -> Option<Rc<TransferFunction>> {
        let Some(r) = obj.as_reference() else {
            return TransferFunction::load(doc, obj).map(Rc::new);
        };
        if let Some(cached) = self.transfers.borrow().get(&r) {
            return cached.clone();
        }
        let loaded = TransferFunction::load(doc, obj).map(Rc::new);
        self.transfers.borrow_mut().insert(r, loaded.clone());
        loaded
    }

    /// Number of cached glyph bitmaps.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.borrow().len()
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.transfers.borrow_mut().clear();
        self.glyphs.borrow_mut().clear();
        self.glyph_fonts.borrow_mut().clear();
    }

    /// A cached glyph; the inner `None` records a glyph that cannot be
    /// drawn as a bitmap.
    pub(crate) fn glyph(&self, key: &GlyphKey) -> Option<Option<Rc<GlyphBitmap>>> {
        self.glyphs.borrow().get(key).cloned()
    }

    pub(crate) fn store_glyph(&self, font: &Rc<dyn Font>, key: GlyphKey, bitmap: Option<Rc<GlyphBitmap>>, limit: usize) {
        let mut glyphs = self.glyphs.borrow_mut();
        if glyphs.len() >= limit {
            log::debug!("Glyph cache full, dropping {} entries", glyphs.len());
            glyphs.clear();
            self.glyph_fonts.borrow_mut().clear();
        }
        self.glyph_fonts
            .borrow_mut()
            .entry(key.font)
            .or_insert_with(|| font.clone());
        glyphs.insert(key, bitmap);
    }
}
