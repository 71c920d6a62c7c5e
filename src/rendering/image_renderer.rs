//! Image drawing, with row-sliced decoding for progressive rendering.

use super::device::{alpha_mask, DeviceClass, RenderDevice};
use super::page_renderer::PauseIndicator;
use super::render_status::RenderStatus;
use super::transfer::TransferFunction;
use crate::content::color::RgbColor;
use crate::content::graphics_state::BlendMode;
use crate::content::image::{DecodedImage, Image, ImageDecoder};
use crate::content::page_object::{ImageObject, PageObject};
use crate::geometry::{IntRect, Matrix, Rect};
use std::rc::Rc;
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint};

/// Rows decoded between pause checks.
const ROWS_PER_STEP: u32 = 64;

/// Draws one image, possibly over several calls.
pub struct ImageRenderer {
    decoder: Option<ImageDecoder>,
    transform: Matrix,
    alpha: f32,
    blend: BlendMode,
    quality: FilterQuality,
    /// Stencil color, for image masks
    mask_color: Option<RgbColor>,
    transfer: Option<Rc<TransferFunction>>,
    succeeded: bool,
}

impl std::fmt::Debug for ImageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRenderer")
            .field("rows_done", &self.decoder.as_ref().map(|d| d.rows_done()))
            .field("alpha", &self.alpha)
            .field("blend", &self.blend)
            .field("succeeded", &self.succeeded)
            .finish()
    }
}

/// Map the unit square to the image's pixel grid, top row first.
fn pixel_matrix(image: &Image) -> Matrix {
    Matrix::new(1.0 / image.width as f32, 0.0, 0.0, -1.0 / image.height as f32, 0.0, 1.0)
}

impl ImageRenderer {
    /// Prepare drawing `image`. Returns `None` when there is nothing left
    /// to do, either because the image is empty or unreadable, or because
    /// it was painted synchronously (pattern-filled stencils).
    pub fn start(
        status: &mut RenderStatus<'_>,
        device: &mut RenderDevice,
        obj: &PageObject,
        image: &ImageObject,
        obj2device: &Matrix,
    ) -> Option<Self> {
        let source = &image.image;
        if source.width == 0 || source.height == 0 {
            return None;
        }
        let image2device = image.matrix.multiply(obj2device);
        let doc = status.context.document();

        if source.is_mask {
            if let Some(pattern) = obj.color.fill_color().pattern().cloned() {
                status.draw_stencil_with_pattern(device, obj, image, &image2device, obj2device, &pattern);
                return None;
            }
        }

        let decoder = match ImageDecoder::new(doc, source) {
            Ok(decoder) => decoder,
            Err(e) => {
                log::warn!("Skipping unreadable image: {}", e);
                return None;
            },
        };

        let (mask_color, alpha) = if source.is_mask {
            let argb = status.fill_argb(obj, false);
            let channel = |shift: u32| ((argb >> shift) & 0xFF) as f32 / 255.0;
            let rgb = RgbColor::new(channel(16), channel(8), channel(0));
            (Some(rgb), (argb >> 24) as f32 / 255.0)
        } else {
            (None, obj.general.fill_alpha * status.initial_alpha)
        };
        if alpha <= 0.0 {
            return None;
        }
        let transfer = match (&obj.general.transfer, source.is_mask) {
            // Stencil colors already went through the transfer function.
            (Some(tr), false) => doc.render_data().transfer_function(doc, tr),
            _ => None,
        };

        let blend = status.current_blend;
        let succeeded = device.class() == DeviceClass::Display || (alpha >= 1.0 && blend == BlendMode::Normal);
        Some(Self {
            decoder: succeeded.then_some(decoder),
            transform: pixel_matrix(source).multiply(&image2device),
            alpha,
            blend,
            quality: status.options.image_quality(source.interpolate),
            mask_color,
            transfer,
            succeeded,
        })
    }

    /// Decode more rows and draw the image once complete. Returns true
    /// while rows remain, after `pause` asked to stop.
    pub fn continue_render(
        &mut self,
        status: &RenderStatus<'_>,
        device: &mut RenderDevice,
        pause: Option<&dyn PauseIndicator>,
    ) -> bool {
        let Some(decoder) = self.decoder.as_mut() else {
            return false;
        };
        while !decoder.decode_rows(ROWS_PER_STEP) {
            if pause.is_some_and(|p| p.need_to_pause()) {
                log::trace!("Image paused after {} rows", decoder.rows_done());
                return true;
            }
        }
        if let Some(decoder) = self.decoder.take() {
            self.draw(status, device, &decoder.finish());
        }
        false
    }

    /// False when the device could not draw the image and the caller
    /// should flatten it instead.
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    fn draw(&self, status: &RenderStatus<'_>, device: &mut RenderDevice, decoded: &DecodedImage) {
        let Some(mut pixmap) = decoded.to_pixmap(self.mask_color) else {
            return;
        };
        if let Some(transfer) = &self.transfer {
            transfer.translate_pixmap(&mut pixmap);
        }
        if self.mask_color.is_none() {
            status.translate_pixmap(&mut pixmap);
        }
        device.draw_pixmap(&pixmap, &self.transform, self.alpha, self.blend, self.quality);
    }
}

impl RenderStatus<'_> {
    pub(super) fn process_image(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        image: &ImageObject,
        obj2device: &Matrix,
    ) -> bool {
        let Some(mut renderer) = ImageRenderer::start(self, device, obj, image, obj2device) else {
            return true;
        };
        while renderer.continue_render(self, device, None) {}
        renderer.succeeded()
    }

    /// Paint a stencil mask with the fill pattern: clip to the stencil's
    /// coverage and fill its unit square.
    fn draw_stencil_with_pattern(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        image: &ImageObject,
        image2device: &Matrix,
        obj2device: &Matrix,
        pattern: &Rc<crate::content::pattern::Pattern>,
    ) {
        let doc = self.context.document();
        let transform = pixel_matrix(&image.image).multiply(image2device);
        let rect = image2device
            .transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0))
            .outer()
            .intersect(&device.clip_box());
        if rect.is_empty() {
            return;
        }
        let decoded = match image.image.decode(doc) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Skipping unreadable stencil: {}", e);
                return;
            },
        };
        let Some(source) = decoded.to_pixmap(Some(RgbColor::BLACK)) else {
            return;
        };
        let Some(coverage) = stencil_coverage(&source, &transform, rect, self.options.image_quality(image.image.interpolate))
        else {
            return;
        };
        device.save_state();
        device.set_clip_mask(&alpha_mask(&coverage), rect.left, rect.top);
        self.draw_path_with_pattern(device, obj, obj2device, pattern, false);
        device.restore_state(false);
    }
}

/// Rasterize a stencil into a pixmap covering `rect` of the device.
fn stencil_coverage(source: &Pixmap, transform: &Matrix, rect: IntRect, quality: FilterQuality) -> Option<Pixmap> {
    let mut coverage = Pixmap::new(rect.width() as u32, rect.height() as u32)?;
    let mut local = *transform;
    local.translate(-rect.left as f32, -rect.top as f32);
    coverage.draw_pixmap(
        0,
        0,
        source.as_ref(),
        &PixmapPaint {
            quality,
            ..PixmapPaint::default()
        },
        local.to_skia(),
        None,
    );
    Some(coverage)
}
