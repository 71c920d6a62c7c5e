//! Page renderer - converts parsed pages to raster images.
//!
//! [`PageRenderer`] draws a page in one go and encodes it. The
//! [`ProgressiveRenderer`] underneath can also stop between objects (and
//! inside large images) whenever a [`PauseIndicator`] asks it to.

use super::context::RenderContext;
use super::device::RenderDevice;
use super::options::{ImageFormat, RenderFlags, RenderOptions, RenderedImage};
use super::render_status::RenderStatus;
use crate::content::page_object::PageObjectKind;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::page::Page;

use tiny_skia::{Color, Pixmap};

/// Objects drawn between two pause checks.
const OBJECTS_PER_STEP: usize = 100;

/// Asked between steps of progressive rendering.
pub trait PauseIndicator {
    /// True when rendering should return control to the caller.
    fn need_to_pause(&self) -> bool;
}

/// Where a progressive render stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    /// Not started
    #[default]
    Ready,
    /// Paused; call [`ProgressiveRenderer::continue_render`]
    ToBeContinued,
    /// Every layer drawn
    Done,
    /// Started twice or continued before starting
    Failed,
}

/// Renders the layers of a context across several calls.
///
/// # Examples
///
/// ```
/// use pdf_raster::document::Document;
/// use pdf_raster::geometry::Rect;
/// use pdf_raster::object::Dict;
/// use pdf_raster::page::Page;
/// use pdf_raster::rendering::{ProgressiveRenderer, RenderContext, RenderDevice, RenderOptions, RenderState};
///
/// let mut doc = Document::new();
/// let index = doc.add_page(Rect::new(0.0, 0.0, 10.0, 10.0), Dict::new(), b"0 0 1 rg 0 0 10 10 re f");
/// let mut page = Page::new(&doc, index).unwrap();
/// page.parse_content(&doc);
///
/// let mut context = RenderContext::new(&doc, page.resources().clone());
/// context.append_layer(page.holder(), page.display_matrix(1.0));
/// let options = RenderOptions::default();
/// let mut device = RenderDevice::new(10, 10).unwrap();
///
/// let mut renderer = ProgressiveRenderer::new(&context, &options);
/// assert_eq!(renderer.start(&mut device, None), RenderState::Done);
/// assert_eq!(device.pixmap().pixel(5, 5).unwrap().blue(), 255);
/// ```
pub struct ProgressiveRenderer<'a> {
    context: &'a RenderContext<'a>,
    options: &'a RenderOptions,
    state: RenderState,
    layer: usize,
    object: usize,
    status: Option<RenderStatus<'a>>,
    /// Device clip in the current layer's object space
    clip: Rect,
}

impl std::fmt::Debug for ProgressiveRenderer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressiveRenderer")
            .field("state", &self.state)
            .field("layer", &self.layer)
            .field("object", &self.object)
            .finish()
    }
}

impl<'a> ProgressiveRenderer<'a> {
    /// A renderer for every layer of `context`.
    pub fn new(context: &'a RenderContext<'a>, options: &'a RenderOptions) -> Self {
        Self {
            context,
            options,
            state: RenderState::Ready,
            layer: 0,
            object: 0,
            status: None,
            clip: Rect::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// True once every layer is drawn.
    pub fn is_done(&self) -> bool {
        self.state == RenderState::Done
    }

    /// Begin rendering and run until done or paused.
    pub fn start(&mut self, device: &mut RenderDevice, pause: Option<&dyn PauseIndicator>) -> RenderState {
        if self.state != RenderState::Ready {
            log::warn!("Progressive render started twice");
            self.state = RenderState::Failed;
            return self.state;
        }
        self.state = RenderState::ToBeContinued;
        self.continue_render(device, pause)
    }

    /// Resume after a pause.
    pub fn continue_render(&mut self, device: &mut RenderDevice, pause: Option<&dyn PauseIndicator>) -> RenderState {
        if self.state != RenderState::ToBeContinued {
            if self.state == RenderState::Ready {
                self.state = RenderState::Failed;
            }
            return self.state;
        }
        let layers = self.context.layers();
        let break_for_masks = self.options.flags.contains(RenderFlags::BREAK_FOR_MASKS);
        let objects_per_step = match self.options.limits.objects_per_step {
            0 => OBJECTS_PER_STEP,
            n => n,
        };

        while self.layer < layers.len() {
            let layer = layers[self.layer];
            if self.status.is_none() {
                device.save_state();
                self.clip = layer.matrix.inverse().transform_rect(&device.clip_box().to_rect());
                let mut status = RenderStatus::new(self.context, self.options);
                status.set_transparency(layer.holder.transparency);
                status.initialize(None, None);
                self.status = Some(status);
                self.object = 0;
            }
            let Some(status) = self.status.as_mut() else {
                break;
            };

            let mut to_go = objects_per_step;
            while let Some(obj) = layer.holder.get(self.object) {
                let rect = obj.rect;
                let culled = rect.left > self.clip.right
                    || rect.right < self.clip.left
                    || rect.bottom > self.clip.top
                    || rect.top < self.clip.bottom;
                if obj.is_active() && !culled {
                    if status.continue_single_object(device, obj, &layer.matrix, pause) {
                        return self.state;
                    }
                    match &obj.kind {
                        PageObjectKind::Image(image) if break_for_masks && image.image.is_mask => {
                            if pause.is_some_and(|p| p.need_to_pause()) {
                                self.object += 1;
                                return self.state;
                            }
                        },
                        PageObjectKind::Form(_) | PageObjectKind::Shading(_) => to_go = 0,
                        _ => to_go = to_go.saturating_sub(1),
                    }
                }
                self.object += 1;
                if to_go == 0 {
                    if pause.is_some_and(|p| p.need_to_pause()) {
                        return self.state;
                    }
                    to_go = objects_per_step;
                }
            }

            self.status = None;
            device.restore_state(false);
            self.layer += 1;
        }
        self.state = RenderState::Done;
        self.state
    }
}

/// Page renderer that converts parsed pages to raster images.
#[derive(Debug, Clone, Default)]
pub struct PageRenderer {
    options: RenderOptions,
}

impl PageRenderer {
    /// Create a new page renderer with the given options.
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// The options pages are rendered with.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render a parsed page into a premultiplied pixmap.
    pub fn render_pixmap(&self, doc: &Document, page: &Page) -> Result<Pixmap> {
        self.options.validate()?;
        let scale = self.options.scale();
        let (width, height) = page.pixel_size(scale);
        let max_pixels = self.options.limits.max_offscreen_pixels;
        if u64::from(width) * u64::from(height) > max_pixels as u64 {
            return Err(Error::Render(format!("Page bitmap too large: {}x{}", width, height)));
        }
        let mut device = RenderDevice::new(width, height)
            .ok_or_else(|| Error::Render(format!("Failed to create pixmap {}x{}", width, height)))?;
        if let Some([r, g, b, a]) = self.options.background {
            device.clear(Color::from_rgba(r, g, b, a).unwrap_or(Color::WHITE));
        }

        let mut context = RenderContext::new(doc, page.resources().clone());
        context.append_layer(page.holder(), page.display_matrix(scale));
        log::debug!(
            "Rendering page {} at {}x{} ({} objects)",
            page.index(),
            width,
            height,
            page.objects().len()
        );
        context.render(&mut device, &self.options, None);
        Ok(device.into_pixmap())
    }

    /// Render a parsed page and encode it in the configured format.
    pub fn render(&self, doc: &Document, page: &Page) -> Result<RenderedImage> {
        let pixmap = self.render_pixmap(doc, page)?;
        let data = match self.options.format {
            ImageFormat::Png => pixmap
                .encode_png()
                .map_err(|e| Error::Render(format!("PNG encoding failed: {}", e)))?,
            ImageFormat::Jpeg => encode_jpeg(&pixmap, self.options.jpeg_quality)?,
        };
        Ok(RenderedImage {
            data,
            width: pixmap.width(),
            height: pixmap.height(),
            format: self.options.format,
        })
    }
}

/// Encode to JPEG, flattening transparency onto white.
fn encode_jpeg(pixmap: &Pixmap, quality: u8) -> Result<Vec<u8>> {
    use image::codecs::jpeg::JpegEncoder;
    use image::ImageBuffer;

    let width = pixmap.width();
    let height = pixmap.height();
    let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);
    for chunk in pixmap.data().chunks_exact(4) {
        // Premultiplied color over white.
        let inverse = 255 - chunk[3];
        rgb_data.extend_from_slice(&[
            chunk[0].saturating_add(inverse),
            chunk[1].saturating_add(inverse),
            chunk[2].saturating_add(inverse),
        ]);
    }

    let img: ImageBuffer<image::Rgb<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, rgb_data)
        .ok_or_else(|| Error::Render("Failed to create image buffer".to_string()))?;

    let mut output = std::io::Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100))
        .encode_image(&img)
        .map_err(|e| Error::Render(format!("JPEG encoding failed: {}", e)))?;

    Ok(output.into_inner())
}
