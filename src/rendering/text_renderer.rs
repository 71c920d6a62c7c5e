//! Text drawing: glyph outlines for ordinary fonts, nested glyph forms and
//! cached glyph bitmaps for Type 3 fonts.

use super::device::{alpha_mask, make_stroke, solid_paint, DeviceClass, RenderDevice};
use super::options::RenderFlags;
use super::render_status::{object_states, RenderStatus};
use super::{GlyphBitmap, GlyphKey};
use crate::content::color::RgbColor;
use crate::content::font::{Font, Type3Char};
use crate::content::graphics_state::TextRenderMode;
use crate::content::page_object::{ImageObject, PageObject, PageObjectKind, PathObject, TextObject};
use crate::content::path::{FillType, Path};
use crate::geometry::{IntRect, Matrix, Rect};
use std::rc::Rc;
use tiny_skia::{FillRule, Mask, Pixmap, PixmapPaint};

/// Glyph matrices are quantized to this many steps per unit for caching.
const MATRIX_QUANTUM: f32 = 1000.0;

/// A cached glyph placed at an integer origin.
struct PlacedGlyph {
    x: i32,
    y: i32,
    bitmap: Rc<GlyphBitmap>,
}

impl RenderStatus<'_> {
    /// Glyph outlines of a text object, in user space.
    ///
    /// Type 3 glyphs have no outline and contribute nothing.
    pub(super) fn text_outline(&self, obj: &PageObject) -> Path {
        let mut outline = Path::new();
        let (Some(text), Some(font)) = (obj.as_text(), obj.text.font.as_ref()) else {
            return outline;
        };
        let size = obj.text.font_size;
        for item in &text.items {
            if let Some(glyph) = font.glyph_path(item.code) {
                outline.append(&glyph, Some(&text.glyph_matrix(item, size)));
            }
        }
        outline
    }

    pub(super) fn process_text(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        text: &TextObject,
        obj2device: &Matrix,
    ) -> bool {
        let mode = obj.text.render_mode;
        if text.items.is_empty() || mode == TextRenderMode::Invisible {
            return true;
        }
        let Some(font) = obj.text.font.clone() else {
            return true;
        };
        if font.as_type3().is_some() {
            return self.process_type3_text(device, obj, text, &font, obj2device);
        }

        let fill = mode.is_fill();
        let stroke = mode.is_stroke();
        let outline = self.text_outline(obj);
        if outline.is_empty() {
            return true;
        }
        let fill_pattern = fill && obj.color.fill_color().pattern().is_some();
        let stroke_pattern = stroke && obj.color.stroke_color().pattern().is_some();
        if fill_pattern || stroke_pattern {
            self.draw_text_path_with_pattern(device, obj, &outline, fill, stroke, obj2device);
            return true;
        }

        let aa = self.options.text_anti_alias();
        if fill {
            let argb = self.fill_argb(obj, false);
            if argb >> 24 != 0 {
                if let Some(sk) = outline.to_skia(Some(obj2device)) {
                    device.fill_path(&sk, &solid_paint(argb, self.current_blend, aa), FillRule::Winding);
                }
            }
        }
        if stroke {
            let argb = self.stroke_argb(obj);
            if argb >> 24 != 0 {
                // Stroke in pre-CTM space so the line width follows the CTM.
                let ctm = obj.text.ctm;
                let mut path = outline;
                path.transform(&ctm.inverse());
                if let Some(sk) = path.to_skia(None) {
                    let mut graph = obj.graph.clone();
                    if self.options.flags.contains(RenderFlags::THIN_LINE) {
                        graph.line_width = 0.0;
                    }
                    device.stroke_path(
                        &sk,
                        &solid_paint(argb, self.current_blend, aa),
                        &make_stroke(&graph),
                        &ctm.multiply(obj2device),
                    );
                }
            }
        }
        true
    }

    /// Paint pattern-filled or pattern-stroked text as a path object.
    fn draw_text_path_with_pattern(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        outline: &Path,
        fill: bool,
        stroke: bool,
        obj2device: &Matrix,
    ) {
        let ctm = obj.text.ctm;
        let mut path = outline.clone();
        path.transform(&ctm.inverse());
        let path = PathObject {
            path,
            fill_type: if fill { FillType::Winding } else { FillType::NoFill },
            stroke,
            matrix: ctm,
        };
        let mut path_obj = PageObject::new(PageObjectKind::Path(path.clone()));
        path_obj.rect = obj.rect;
        path_obj.general = obj.general.clone();
        path_obj.color = obj.color.clone();
        path_obj.graph = obj.graph.clone();
        self.process_path(device, &path_obj, &path, obj2device);
    }

    fn process_type3_text(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        text: &TextObject,
        font: &Rc<dyn Font>,
        obj2device: &Matrix,
    ) -> bool {
        let Some(type3) = font.as_type3() else {
            return true;
        };
        let font_key = Rc::as_ptr(font) as *const () as usize;
        if self.type3_fonts.contains(&font_key) {
            log::debug!("Type 3 font {} draws itself, skipping", type3.name());
            return true;
        }
        let fill_argb = self.fill_argb(obj, true);
        let fill_alpha = fill_argb >> 24;
        if device.class() != DeviceClass::Display && fill_alpha < 255 {
            return false;
        }

        let doc = self.context.document();
        let size = obj.text.font_size;
        let font_matrix = type3.font_matrix();
        let states = object_states(obj);
        let mut batch: Vec<PlacedGlyph> = Vec::new();

        for item in &text.items {
            let Some(ch) = type3.load_char(doc, item.code) else {
                continue;
            };
            let matrix = text
                .type3_glyph_matrix(item, size, &font_matrix)
                .multiply(obj2device);

            let Some(image) = sole_mask_image(&ch).filter(|_| !ch.colored) else {
                self.flush_glyphs(device, &mut batch, fill_argb);
                if fill_alpha == 255 {
                    let mut status = RenderStatus::new(self.context, self.options);
                    status.transparency = ch.form.transparency();
                    status.type3_char = Some(ch.clone());
                    status.t3_fill_argb = fill_argb;
                    status.drop_objects = self.drop_objects;
                    status.form_resources = Some(ch.form.resources().clone());
                    status.initialize(Some(self), Some(&states));
                    status.type3_fonts.push(font_key);
                    device.save_state();
                    status.render_object_list(device, ch.form.holder(), &matrix);
                    device.restore_state(false);
                } else {
                    self.draw_type3_char_offscreen(device, &ch, &matrix, fill_argb, font_key, &states);
                }
                continue;
            };

            let key = GlyphKey {
                font: font_key,
                code: item.code,
                matrix: [matrix.a, matrix.b, matrix.c, matrix.d].map(|v| (v * MATRIX_QUANTUM).round() as i32),
            };
            let cache = doc.render_data();
            let bitmap = match cache.glyph(&key) {
                Some(cached) => cached,
                None => {
                    let loaded = self.load_glyph_bitmap(image, &matrix).map(Rc::new);
                    cache.store_glyph(font, key, loaded.clone(), self.options.limits.glyph_cache_size);
                    loaded
                },
            };
            let Some(bitmap) = bitmap else {
                continue;
            };
            let placed = PlacedGlyph {
                x: matrix.e.round() as i32,
                y: matrix.f.round() as i32,
                bitmap,
            };
            if device.class() == DeviceClass::Display {
                batch.push(placed);
            } else {
                let b = &placed.bitmap;
                device.set_bit_mask(&b.mask, placed.x + b.left, placed.y + b.top, fill_argb);
            }
        }
        self.flush_glyphs(device, &mut batch, fill_argb);
        true
    }

    /// Draw a glyph form into its own bitmap and composite it, so that
    /// overlapping parts of a translucent glyph are painted once.
    fn draw_type3_char_offscreen(
        &self,
        device: &mut RenderDevice,
        ch: &Rc<Type3Char>,
        matrix: &Matrix,
        fill_argb: u32,
        font_key: usize,
        states: &crate::content::graphics_state::AllStates,
    ) {
        let rect = matrix
            .transform_rect(&ch.form.holder().calc_bounding_box())
            .outer()
            .intersect(&device.clip_box());
        if rect.is_empty() {
            return;
        }
        let Some(mut buffer) = RenderDevice::new(rect.width() as u32, rect.height() as u32) else {
            return;
        };
        let mut local = *matrix;
        local.translate(-rect.left as f32, -rect.top as f32);
        {
            let mut status = RenderStatus::new(self.context, self.options);
            status.transparency = ch.form.transparency();
            status.type3_char = Some(ch.clone());
            status.t3_fill_argb = fill_argb;
            status.drop_objects = self.drop_objects;
            status.form_resources = Some(ch.form.resources().clone());
            status.initialize(Some(self), Some(states));
            status.type3_fonts.push(font_key);
            status.render_object_list(&mut buffer, ch.form.holder(), &local);
        }
        device.composite_pixmap(&buffer.into_pixmap(), rect.left, rect.top, 1.0, self.current_blend);
    }

    /// Rasterize the stencil image of a glyph under `matrix`, relative to
    /// the rounded glyph origin.
    fn load_glyph_bitmap(&self, image: &ImageObject, matrix: &Matrix) -> Option<GlyphBitmap> {
        let doc = self.context.document();
        let (w, h) = (image.image.width as f32, image.image.height as f32);
        let pixel_to_unit = Matrix::new(1.0 / w, 0.0, 0.0, -1.0 / h, 0.0, 1.0);
        let full = pixel_to_unit.multiply(&image.matrix).multiply(matrix);
        let bounds = full.transform_rect(&Rect::new(0.0, 0.0, w, h)).outer();
        if bounds.is_empty() {
            return None;
        }
        let decoded = match image.image.decode(doc) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::debug!("Type 3 glyph image unreadable: {}", e);
                return None;
            },
        };
        let source = decoded.to_pixmap(Some(RgbColor::BLACK))?;
        let mut target = Pixmap::new(bounds.width() as u32, bounds.height() as u32)?;
        let mut local = full;
        local.translate(-bounds.left as f32, -bounds.top as f32);
        target.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &PixmapPaint {
                quality: self.options.image_quality(image.image.interpolate),
                ..PixmapPaint::default()
            },
            local.to_skia(),
            None,
        );
        let origin_x = matrix.e.round() as i32;
        let origin_y = matrix.f.round() as i32;
        Some(GlyphBitmap {
            left: bounds.left - origin_x,
            top: bounds.top - origin_y,
            mask: alpha_mask(&target),
        })
    }

    /// Paint the pending glyph bitmaps as one mask.
    fn flush_glyphs(&self, device: &mut RenderDevice, batch: &mut Vec<PlacedGlyph>, fill_argb: u32) {
        if batch.is_empty() {
            return;
        }
        let mut bounds: Option<IntRect> = None;
        for g in batch.iter() {
            let r = IntRect::from_xywh(
                g.x + g.bitmap.left,
                g.y + g.bitmap.top,
                g.bitmap.mask.width() as i32,
                g.bitmap.mask.height() as i32,
            );
            bounds = Some(match bounds {
                Some(b) => IntRect::new(
                    b.left.min(r.left),
                    b.top.min(r.top),
                    b.right.max(r.right),
                    b.bottom.max(r.bottom),
                ),
                None => r,
            });
        }
        let glyphs = std::mem::take(batch);
        let Some(bounds) = bounds.map(|b| b.intersect(&device.clip_box())) else {
            return;
        };
        if bounds.is_empty() {
            return;
        }
        let Some(mut mask) = Mask::new(bounds.width() as u32, bounds.height() as u32) else {
            return;
        };
        let width = bounds.width();
        let height = bounds.height();
        let data = mask.data_mut();
        for g in &glyphs {
            let (gw, gh) = (g.bitmap.mask.width() as i32, g.bitmap.mask.height() as i32);
            let src = g.bitmap.mask.data();
            let (ox, oy) = (g.x + g.bitmap.left - bounds.left, g.y + g.bitmap.top - bounds.top);
            for y in oy.max(0)..(oy + gh).min(height) {
                for x in ox.max(0)..(ox + gw).min(width) {
                    let s = src[((y - oy) * gw + (x - ox)) as usize];
                    let d = &mut data[(y * width + x) as usize];
                    *d = (*d).max(s);
                }
            }
        }
        device.set_bit_mask(&mask, bounds.left, bounds.top, fill_argb);
    }
}

/// The glyph's only object, when it is a stencil mask image. Only
/// meaningful for `d1` glyphs, which take the text's fill color.
fn sole_mask_image(ch: &Type3Char) -> Option<&ImageObject> {
    let objects = &ch.form.holder().objects;
    if objects.len() != 1 {
        return None;
    }
    objects[0].as_image().filter(|image| image.image.is_mask)
}
