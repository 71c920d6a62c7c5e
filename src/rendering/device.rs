//! The raster device: a pixmap plus a clip stack.
//!
//! Clips are kept as coverage masks so that anti-aliased and text clips
//! intersect exactly. `save_state`/`restore_state` push and pop the clip;
//! `restore_state(true)` pops and immediately saves again, which is how a
//! render status replaces the clip of the previous object.

use crate::content::graphics_state::{BlendMode, GraphState};
use crate::content::path::{FillType, LineCap, LineJoin, Path};
use crate::geometry::{IntRect, Matrix, Rect};
use bitflags::bitflags;
use tiny_skia::{Mask, MaskType, Paint, Pixmap, PixmapPaint, Stroke, StrokeDash, Transform};

bitflags! {
    /// What a device can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceCaps: u32 {
        /// Clips carry anti-aliased coverage, text clips included
        const SOFT_CLIP = 1 << 0;
        /// Existing pixels can be read back
        const GET_BITS = 1 << 1;
        /// Separable and non-separable blend modes
        const BLEND_MODE = 1 << 2;
        /// The output keeps an alpha channel
        const ALPHA_OUTPUT = 1 << 3;
    }
}

/// The kind of output a device stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    /// Screen-like output
    #[default]
    Display,
    /// Print output; no group bitmaps, glyphs are drawn one at a time
    Printer,
}

#[derive(Clone)]
struct SavedClip {
    clip: Option<Mask>,
    clip_box: IntRect,
}

/// A drawing surface.
pub struct RenderDevice {
    pixmap: Pixmap,
    clip: Option<Mask>,
    clip_box: IntRect,
    saved: Vec<SavedClip>,
    caps: DeviceCaps,
    class: DeviceClass,
    clip_ops: usize,
}

impl std::fmt::Debug for RenderDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDevice")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("clip_box", &self.clip_box)
            .field("depth", &self.saved.len())
            .field("caps", &self.caps)
            .field("class", &self.class)
            .finish()
    }
}

/// Convert a line cap to the rasterizer's type.
fn skia_line_cap(cap: LineCap) -> tiny_skia::LineCap {
    match cap {
        LineCap::Butt => tiny_skia::LineCap::Butt,
        LineCap::Round => tiny_skia::LineCap::Round,
        LineCap::Square => tiny_skia::LineCap::Square,
    }
}

/// Convert a line join to the rasterizer's type.
fn skia_line_join(join: LineJoin) -> tiny_skia::LineJoin {
    match join {
        LineJoin::Miter => tiny_skia::LineJoin::Miter,
        LineJoin::Round => tiny_skia::LineJoin::Round,
        LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
    }
}

/// Build a stroke from the line style. A zero width gives a hairline.
pub(crate) fn make_stroke(graph: &GraphState) -> Stroke {
    let dash = if graph.is_dashed() {
        StrokeDash::new(graph.dash_array.clone(), graph.dash_phase)
    } else {
        None
    };
    Stroke {
        width: graph.line_width.max(0.0),
        line_cap: skia_line_cap(graph.line_cap),
        line_join: skia_line_join(graph.line_join),
        miter_limit: graph.miter_limit.max(1.0),
        dash,
    }
}

/// A solid paint.
pub(crate) fn solid_paint(argb: u32, blend: BlendMode, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8((argb >> 16) as u8, (argb >> 8) as u8, argb as u8, (argb >> 24) as u8);
    paint.blend_mode = blend.to_skia();
    paint.anti_alias = anti_alias;
    paint
}

/// Scale every pixel of `pixmap` by `alpha`.
pub(crate) fn multiply_alpha(pixmap: &mut Pixmap, alpha: f32) {
    if alpha >= 1.0 {
        return;
    }
    let factor = (alpha.max(0.0) * 255.0).round() as u32;
    for px in pixmap.data_mut().iter_mut() {
        *px = ((*px as u32 * factor + 127) / 255) as u8;
    }
}

/// Scale every pixel of `pixmap` by the coverage of `mask`, placed at
/// (`left`, `top`) in the pixmap. Pixels outside the mask become clear.
pub(crate) fn multiply_alpha_mask(pixmap: &mut Pixmap, mask: &Mask, left: i32, top: i32) {
    let (width, height) = (pixmap.width() as i32, pixmap.height() as i32);
    let (mw, mh) = (mask.width() as i32, mask.height() as i32);
    let coverage = mask.data();
    let data = pixmap.data_mut();
    for y in 0..height {
        for x in 0..width {
            let (mx, my) = (x - left, y - top);
            let m = if mx >= 0 && my >= 0 && mx < mw && my < mh {
                coverage[(my * mw + mx) as usize] as u32
            } else {
                0
            };
            let i = ((y * width + x) * 4) as usize;
            for c in &mut data[i..i + 4] {
                *c = ((*c as u32 * m + 127) / 255) as u8;
            }
        }
    }
}

impl RenderDevice {
    /// A transparent display device of `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self::from_pixmap(Pixmap::new(width, height)?))
    }

    /// A device of the given class.
    pub fn with_class(width: u32, height: u32, class: DeviceClass) -> Option<Self> {
        let mut device = Self::new(width, height)?;
        device.class = class;
        if class == DeviceClass::Printer {
            device.caps.remove(DeviceCaps::GET_BITS | DeviceCaps::ALPHA_OUTPUT);
        }
        Some(device)
    }

    /// Draw on an existing pixmap.
    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        let clip_box = IntRect::new(0, 0, pixmap.width() as i32, pixmap.height() as i32);
        Self {
            pixmap,
            clip: None,
            clip_box,
            saved: Vec::new(),
            caps: DeviceCaps::all(),
            class: DeviceClass::Display,
            clip_ops: 0,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Capabilities.
    pub fn caps(&self) -> DeviceCaps {
        self.caps
    }

    /// Replace the capabilities.
    pub fn set_caps(&mut self, caps: DeviceCaps) {
        self.caps = caps;
    }

    /// Device class.
    pub fn class(&self) -> DeviceClass {
        self.class
    }

    /// Bounding box of the current clip.
    pub fn clip_box(&self) -> IntRect {
        self.clip_box
    }

    /// Number of clip paths, rectangles and masks applied so far.
    pub fn clip_op_count(&self) -> usize {
        self.clip_ops
    }

    /// The pixels drawn so far.
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Give up the device and keep the pixels.
    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    /// Fill every pixel with `color`, ignoring the clip.
    pub fn clear(&mut self, color: tiny_skia::Color) {
        self.pixmap.fill(color);
    }

    fn full_box(&self) -> IntRect {
        IntRect::new(0, 0, self.pixmap.width() as i32, self.pixmap.height() as i32)
    }

    /// Push the current clip.
    pub fn save_state(&mut self) {
        self.saved.push(SavedClip {
            clip: self.clip.clone(),
            clip_box: self.clip_box,
        });
    }

    /// Pop the clip saved last. With `keep_saved`, the popped state stays
    /// on the stack so it can be restored again.
    pub fn restore_state(&mut self, keep_saved: bool) {
        let Some(state) = self.saved.pop() else {
            self.clip = None;
            self.clip_box = self.full_box();
            return;
        };
        if keep_saved {
            self.saved.push(state.clone());
        }
        self.clip = state.clip;
        self.clip_box = state.clip_box;
    }

    fn intersect_mask(&mut self, mask: Mask, bounds: IntRect) {
        match self.clip.as_mut() {
            Some(clip) => {
                for (c, m) in clip.data_mut().iter_mut().zip(mask.data()) {
                    *c = ((*c as u32 * *m as u32 + 127) / 255) as u8;
                }
            },
            None => self.clip = Some(mask),
        }
        self.clip_box = self.clip_box.intersect(&bounds);
        self.clip_ops += 1;
    }

    fn empty_clip(&mut self) {
        if let Some(mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) {
            self.clip = Some(mask);
        }
        self.clip_box = IntRect::default();
        self.clip_ops += 1;
    }

    /// Intersect the clip with a filled path.
    pub fn set_clip_path(&mut self, path: &Path, matrix: &Matrix, fill: FillType, anti_alias: bool) {
        let Some(sk) = path.to_skia(Some(matrix)) else {
            self.empty_clip();
            return;
        };
        self.set_clip_skia_path(&sk, fill.to_skia(), anti_alias);
    }

    pub(crate) fn set_clip_skia_path(&mut self, path: &tiny_skia::Path, rule: tiny_skia::FillRule, anti_alias: bool) {
        let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) else {
            return;
        };
        mask.fill_path(path, rule, anti_alias, Transform::identity());
        let b = path.bounds();
        let bounds = Rect::new(b.left(), b.top(), b.right(), b.bottom()).outer();
        self.intersect_mask(mask, bounds);
    }

    /// Intersect the clip with the outline of a stroked path.
    pub fn set_clip_stroke(&mut self, path: &Path, matrix: &Matrix, graph: &GraphState, anti_alias: bool) {
        let Some(sk) = path.to_skia(None) else {
            self.empty_clip();
            return;
        };
        let stroke = make_stroke(graph);
        let scale = matrix.x_unit().max(matrix.y_unit());
        let outline = sk
            .stroke(&stroke, scale)
            .and_then(|outline| outline.transform(matrix.to_skia()));
        match outline {
            Some(outline) => self.set_clip_skia_path(&outline, tiny_skia::FillRule::Winding, anti_alias),
            None => self.empty_clip(),
        }
    }

    /// Intersect the clip with a device rectangle.
    pub fn set_clip_rect(&mut self, rect: IntRect) {
        let rect = rect.intersect(&self.full_box());
        if rect.is_empty() {
            self.empty_clip();
            return;
        }
        let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) else {
            return;
        };
        let width = self.pixmap.width() as usize;
        let data = mask.data_mut();
        for y in rect.top..rect.bottom {
            let row = y as usize * width;
            data[row + rect.left as usize..row + rect.right as usize].fill(255);
        }
        self.intersect_mask(mask, rect);
    }

    /// Intersect the clip with a coverage mask placed at (`left`, `top`).
    pub fn set_clip_mask(&mut self, mask: &Mask, left: i32, top: i32) {
        let Some(mut full) = Mask::new(self.pixmap.width(), self.pixmap.height()) else {
            return;
        };
        let width = self.pixmap.width() as i32;
        let height = self.pixmap.height() as i32;
        let (mw, mh) = (mask.width() as i32, mask.height() as i32);
        let src = mask.data();
        let dst = full.data_mut();
        for y in top.max(0)..(top + mh).min(height) {
            for x in left.max(0)..(left + mw).min(width) {
                dst[(y * width + x) as usize] = src[((y - top) * mw + (x - left)) as usize];
            }
        }
        self.intersect_mask(full, IntRect::from_xywh(left, top, mw, mh));
    }

    /// Fill a path given in device space.
    pub fn fill_path(&mut self, path: &tiny_skia::Path, paint: &Paint<'_>, rule: tiny_skia::FillRule) {
        self.pixmap
            .fill_path(path, paint, rule, Transform::identity(), self.clip.as_ref());
    }

    /// Stroke a path, `transform` mapping its coordinates to the device.
    pub fn stroke_path(&mut self, path: &tiny_skia::Path, paint: &Paint<'_>, stroke: &Stroke, transform: &Matrix) {
        self.pixmap
            .stroke_path(path, paint, stroke, transform.to_skia(), self.clip.as_ref());
    }

    /// Fill a device rectangle.
    pub fn fill_rect(&mut self, rect: IntRect, paint: &Paint<'_>) {
        let Some(r) = tiny_skia::Rect::from_ltrb(
            rect.left as f32,
            rect.top as f32,
            rect.right as f32,
            rect.bottom as f32,
        ) else {
            return;
        };
        self.pixmap
            .fill_rect(r, paint, Transform::identity(), self.clip.as_ref());
    }

    /// Composite `src` with its top left corner at (`left`, `top`).
    pub fn composite_pixmap(&mut self, src: &Pixmap, left: i32, top: i32, alpha: f32, blend: BlendMode) {
        let paint = PixmapPaint {
            opacity: alpha.clamp(0.0, 1.0),
            blend_mode: blend.to_skia(),
            quality: tiny_skia::FilterQuality::Nearest,
        };
        self.pixmap
            .draw_pixmap(left, top, src.as_ref(), &paint, Transform::identity(), self.clip.as_ref());
    }

    /// Draw `src` through an arbitrary transform.
    pub fn draw_pixmap(
        &mut self,
        src: &Pixmap,
        transform: &Matrix,
        alpha: f32,
        blend: BlendMode,
        quality: tiny_skia::FilterQuality,
    ) {
        let paint = PixmapPaint {
            opacity: alpha.clamp(0.0, 1.0),
            blend_mode: blend.to_skia(),
            quality,
        };
        self.pixmap
            .draw_pixmap(0, 0, src.as_ref(), &paint, transform.to_skia(), self.clip.as_ref());
    }

    /// Paint `argb` through the coverage of `mask` placed at (`left`, `top`).
    pub fn set_bit_mask(&mut self, mask: &Mask, left: i32, top: i32, argb: u32) {
        let Some(mut src) = Pixmap::new(mask.width(), mask.height()) else {
            return;
        };
        let color = tiny_skia::ColorU8::from_rgba((argb >> 16) as u8, (argb >> 8) as u8, argb as u8, 255).premultiply();
        let alpha = argb >> 24;
        for (px, m) in src.pixels_mut().iter_mut().zip(mask.data()) {
            let a = (*m as u32 * alpha + 127) / 255;
            let scale = |c: u8| ((c as u32 * a + 127) / 255) as u8;
            if let Some(p) = tiny_skia::PremultipliedColorU8::from_rgba(
                scale(color.red()),
                scale(color.green()),
                scale(color.blue()),
                a as u8,
            ) {
                *px = p;
            }
        }
        self.composite_pixmap(&src, left, top, 1.0, BlendMode::Normal);
    }

    /// A copy of the pixels under `rect`, clipped to the device.
    pub fn backdrop(&self, rect: IntRect) -> Option<Pixmap> {
        if !self.caps.contains(DeviceCaps::GET_BITS) {
            return None;
        }
        let r = rect.intersect(&self.full_box());
        let sk = tiny_skia::IntRect::from_xywh(r.left, r.top, r.width() as u32, r.height() as u32)?;
        self.pixmap.clone_rect(sk)
    }

    /// Move the pixels of `src` into `rect` as `backdrop + (src - backdrop)
    /// * coverage`, where coverage combines `alpha`, the optional mask (in
    /// `src` coordinates) and the clip. `src` must have been seeded with
    /// the backdrop.
    pub fn blend_from_backdrop(&mut self, src: &Pixmap, left: i32, top: i32, alpha: f32, mask: Option<&Mask>) {
        let (width, height) = (self.pixmap.width() as i32, self.pixmap.height() as i32);
        let (sw, sh) = (src.width() as i32, src.height() as i32);
        let factor = (alpha.clamp(0.0, 1.0) * 255.0).round() as u32;
        let src_data = src.data();
        let clip = self.clip.as_ref().map(|c| c.data());
        let dst = self.pixmap.data_mut();
        for sy in 0..sh {
            let y = sy + top;
            if y < 0 || y >= height {
                continue;
            }
            for sx in 0..sw {
                let x = sx + left;
                if x < 0 || x >= width {
                    continue;
                }
                let di = (y * width + x) as usize;
                let si = (sy * sw + sx) as usize;
                let mut cov = factor;
                if let Some(m) = mask {
                    cov = cov * m.data()[si] as u32 / 255;
                }
                if let Some(c) = clip {
                    cov = cov * c[di] as u32 / 255;
                }
                if cov == 0 {
                    continue;
                }
                for k in 0..4 {
                    let d = dst[di * 4 + k] as i32;
                    let s = src_data[si * 4 + k] as i32;
                    dst[di * 4 + k] = (d + (s - d) * cov as i32 / 255).clamp(0, 255) as u8;
                }
            }
        }
    }
}

/// A coverage mask from the alpha channel of `pixmap`.
pub(crate) fn alpha_mask(pixmap: &Pixmap) -> Mask {
    Mask::from_pixmap(pixmap.as_ref(), MaskType::Alpha)
}
