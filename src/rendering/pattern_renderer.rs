//! Shading objects and pattern fills.

use super::device::RenderDevice;
use super::render_status::RenderStatus;
use super::shading;
use crate::content::form::{Form, RecursionState};
use crate::content::page_object::{PageObject, PageObjectKind, ShadingObject};
use crate::content::path::{FillType, Path};
use crate::content::pattern::{Pattern, Shading, ShadingPattern, TilingPattern};
use crate::geometry::{IntRect, Matrix};
use std::rc::Rc;
use tiny_skia::{FilterQuality, Paint, Pixmap, PremultipliedColorU8, SpreadMode};

impl RenderStatus<'_> {
    pub(super) fn process_shading(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        shading: &ShadingObject,
        obj2device: &Matrix,
    ) -> bool {
        let rect = self.object_clipped_rect(device, obj, obj2device);
        if rect.is_empty() {
            return true;
        }
        let matrix = shading.matrix.multiply(obj2device);
        let alpha = obj.general.fill_alpha * self.initial_alpha;
        self.draw_shading(device, &shading.shading, &matrix, rect, alpha, false);
        true
    }

    /// Rasterize `shading` into `clip` (device pixels) and composite it.
    pub(super) fn draw_shading(
        &self,
        device: &mut RenderDevice,
        shading: &Shading,
        matrix: &Matrix,
        clip: IntRect,
        alpha: f32,
        background: bool,
    ) {
        let mut rect = clip;
        if let Some(bbox) = shading.bbox {
            rect = rect.intersect(&matrix.transform_rect(&bbox).outer());
        }
        if rect.is_empty() {
            return;
        }
        let Some(mut pixmap) = Pixmap::new(rect.width() as u32, rect.height() as u32) else {
            return;
        };
        let mut to_bitmap = *matrix;
        to_bitmap.translate(-rect.left as f32, -rect.top as f32);
        if background {
            shading::fill_background(&mut pixmap, shading, alpha);
        }
        shading::rasterize(&mut pixmap, shading, &to_bitmap, alpha);
        self.translate_pixmap(&mut pixmap);
        device.composite_pixmap(&pixmap, rect.left, rect.top, 1.0, self.current_blend);
    }

    /// Paint the area of a path (or image) with a pattern.
    pub(super) fn draw_path_with_pattern(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        obj2device: &Matrix,
        pattern: &Rc<Pattern>,
        stroke: bool,
    ) {
        match pattern.as_ref() {
            Pattern::Tiling(tiling) => self.draw_tiling_pattern(device, obj, obj2device, tiling, stroke),
            Pattern::Shading(shading) => self.draw_shading_pattern(device, obj, obj2device, shading, stroke),
        }
    }

    /// Clip the device to the painted area of `obj`.
    fn clip_pattern(&self, device: &mut RenderDevice, obj: &PageObject, obj2device: &Matrix, stroke: bool) -> bool {
        let aa = self.options.path_anti_alias();
        match &obj.kind {
            PageObjectKind::Path(path) => {
                let matrix = path.matrix.multiply(obj2device);
                if stroke {
                    device.set_clip_stroke(&path.path, &matrix, &obj.graph, aa);
                } else {
                    device.set_clip_path(&path.path, &matrix, path.fill_type, aa);
                }
                true
            },
            PageObjectKind::Image(image) => {
                let matrix = image.matrix.multiply(obj2device);
                let mut unit = Path::new();
                unit.append_rect(0.0, 0.0, 1.0, 1.0);
                device.set_clip_path(&unit, &matrix, FillType::Winding, aa);
                true
            },
            _ => false,
        }
    }

    fn pattern_alpha(&self, obj: &PageObject, stroke: bool) -> f32 {
        let alpha = if stroke {
            obj.general.stroke_alpha
        } else {
            obj.general.fill_alpha
        };
        alpha * self.initial_alpha
    }

    fn draw_shading_pattern(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        obj2device: &Matrix,
        pattern: &ShadingPattern,
        stroke: bool,
    ) {
        device.save_state();
        if self.clip_pattern(device, obj, obj2device, stroke) {
            let rect = device.clip_box();
            if !rect.is_empty() {
                let matrix = pattern.matrix.multiply(obj2device);
                let alpha = self.pattern_alpha(obj, stroke);
                self.draw_shading(device, &pattern.shading, &matrix, rect, alpha, true);
            }
        }
        device.restore_state(false);
    }

    fn draw_tiling_pattern(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        obj2device: &Matrix,
        pattern: &TilingPattern,
        stroke: bool,
    ) {
        device.save_state();
        if self.clip_pattern(device, obj, obj2device, stroke) {
            let rect = device.clip_box();
            if !rect.is_empty() {
                let tint = if pattern.colored {
                    None
                } else if stroke {
                    Some(self.stroke_argb(obj))
                } else {
                    Some(self.fill_argb(obj, true))
                };
                let alpha = self.pattern_alpha(obj, stroke);
                self.draw_tiles(device, pattern, obj2device, rect, alpha, tint);
            }
        }
        device.restore_state(false);
    }

    /// Render one pattern cell and repeat it over `rect`.
    ///
    /// Uncolored patterns paint the cell's coverage with `tint`.
    fn draw_tiles(
        &self,
        device: &mut RenderDevice,
        pattern: &TilingPattern,
        obj2device: &Matrix,
        rect: IntRect,
        alpha: f32,
        tint: Option<u32>,
    ) {
        let doc = self.context.document();
        let (x_step, y_step) = (pattern.x_step.abs(), pattern.y_step.abs());
        if x_step < f32::EPSILON || y_step < f32::EPSILON {
            return;
        }
        let Some(mut form) = Form::new(doc, &pattern.stream, None, self.context.page_resources()) else {
            return;
        };
        form.parse(doc, None, None, &mut RecursionState::new());

        let pattern_to_device = pattern.matrix.multiply(obj2device);
        let mut cell_width = (x_step * pattern_to_device.x_unit()).ceil().max(1.0);
        let mut cell_height = (y_step * pattern_to_device.y_unit()).ceil().max(1.0);
        let max_pixels = self.options.limits.max_pattern_cell_pixels as f32;
        if cell_width * cell_height > max_pixels {
            let k = (max_pixels / (cell_width * cell_height)).sqrt();
            cell_width = (cell_width * k).floor().max(1.0);
            cell_height = (cell_height * k).floor().max(1.0);
            log::debug!("Pattern cell reduced to {}x{}", cell_width, cell_height);
        }
        let (sx, sy) = (cell_width / x_step, cell_height / y_step);

        let bbox = pattern.bbox;
        let pattern_to_cell = Matrix::new(sx, 0.0, 0.0, -sy, -bbox.left * sx, (bbox.bottom + y_step) * sy);
        // Parsed objects already include /Matrix.
        let objects_to_cell = form.matrix().inverse().multiply(&pattern_to_cell);

        let Some(mut cell) = RenderDevice::new(cell_width as u32, cell_height as u32) else {
            return;
        };
        {
            let mut status = RenderStatus::new(self.context, self.options);
            status.drop_objects = self.drop_objects;
            status.load_mask = self.load_mask;
            status.form_resources = Some(form.resources().clone());
            status.in_group = true;
            status.type3_fonts = self.type3_fonts.clone();
            status.initialize(None, None);
            status.render_object_list(&mut cell, form.holder(), &objects_to_cell);
        }
        let mut cell = cell.into_pixmap();
        if let Some(argb) = tint {
            // The shader applies the alpha.
            recolor(&mut cell, argb | 0xFF00_0000);
        }

        let shader_transform = pattern_to_cell.inverse().multiply(&pattern_to_device);
        let shader = tiny_skia::Pattern::new(
            cell.as_ref(),
            SpreadMode::Repeat,
            FilterQuality::Nearest,
            alpha.clamp(0.0, 1.0),
            shader_transform.to_skia(),
        );
        let paint = Paint {
            shader,
            blend_mode: self.current_blend.to_skia(),
            anti_alias: false,
            ..Paint::default()
        };
        device.fill_rect(rect, &paint);
    }
}

/// Replace the color of every pixel with `argb`, keeping coverage.
fn recolor(pixmap: &mut Pixmap, argb: u32) {
    let color_alpha = argb >> 24;
    let (r, g, b) = ((argb >> 16) & 0xFF, (argb >> 8) & 0xFF, argb & 0xFF);
    for px in pixmap.pixels_mut() {
        let a = (px.alpha() as u32 * color_alpha + 127) / 255;
        let scale = |c: u32| ((c * a + 127) / 255) as u8;
        if let Some(p) = PremultipliedColorU8::from_rgba(scale(r), scale(g), scale(b), a as u8) {
            *px = p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recolor_keeps_coverage() {
        let mut pixmap = Pixmap::new(2, 1).unwrap();
        pixmap.pixels_mut()[0] = PremultipliedColorU8::from_rgba(0, 0, 0, 255).unwrap();
        recolor(&mut pixmap, 0xFF_FF_00_00);
        let first = pixmap.pixels()[0].demultiply();
        assert_eq!((first.red(), first.green(), first.alpha()), (255, 0, 255));
        assert_eq!(pixmap.pixels()[1].alpha(), 0);
    }
}
