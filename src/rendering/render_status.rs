//! The render status: draws one object list onto a device.
//!
//! A status applies each object's clip, decides whether the object needs an
//! offscreen group (soft masks, group alpha, blend modes, isolated groups,
//! text clips on devices without soft clipping), then paints it. Forms,
//! groups, soft masks, Type 3 glyphs and tiling cells are drawn by nested
//! statuses that share the same [`RenderContext`].
//!
//! Text, image and pattern drawing live in sibling modules as further
//! `impl RenderStatus` blocks.

use super::context::RenderContext;
use super::device::{multiply_alpha_mask, solid_paint, DeviceCaps, DeviceClass, RenderDevice};
use super::image_renderer::ImageRenderer;
use super::options::{RenderFlags, RenderOptions};
use super::page_renderer::PauseIndicator;
use crate::content::clip_path::ClipPath;
use crate::content::color::{ColorSpace, ColorSpaceFamily};
use crate::content::font::Type3Char;
use crate::content::form::{Form, RecursionState};
use crate::content::function::Function;
use crate::content::graphics_state::{AllStates, BlendMode};
use crate::content::page_object::{FormObject, PageObject, PageObjectHolder, PageObjectKind, PathObject, Transparency};
use crate::content::path::{FillType, Path};
use crate::geometry::{IntRect, Matrix};
use crate::object::{Dict, Object};
use std::rc::Rc;
use tiny_skia::Mask;

/// Draws page objects; one per object list being rendered.
pub struct RenderStatus<'a> {
    pub(super) context: &'a RenderContext<'a>,
    pub(super) options: &'a RenderOptions,
    pub(super) last_clip: Option<ClipPath>,
    pub(super) transparency: Transparency,
    pub(super) stop_object: Option<u64>,
    pub(super) stopped: bool,
    /// Type 3 fonts whose glyphs are being drawn, by address
    pub(super) type3_fonts: Vec<usize>,
    pub(super) initial_states: AllStates,
    pub(super) type3_char: Option<Rc<Type3Char>>,
    pub(super) t3_fill_argb: u32,
    pub(super) drop_objects: bool,
    pub(super) load_mask: bool,
    pub(super) in_group: bool,
    pub(super) initial_alpha: f32,
    pub(super) form_resources: Option<Dict>,
    pub(super) current_blend: BlendMode,
    pub(super) image_renderer: Option<ImageRenderer>,
}

impl std::fmt::Debug for RenderStatus<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderStatus")
            .field("transparency", &self.transparency)
            .field("stop_object", &self.stop_object)
            .field("stopped", &self.stopped)
            .field("type3_fonts", &self.type3_fonts.len())
            .field("in_group", &self.in_group)
            .field("initial_alpha", &self.initial_alpha)
            .finish()
    }
}

/// The graphics states an object was painted with.
pub(super) fn object_states(obj: &PageObject) -> AllStates {
    let mut states = AllStates::new();
    states.general = obj.general.clone();
    states.graph = obj.graph.clone();
    states.color = obj.color.clone();
    states.text = obj.text.clone();
    states
}

impl<'a> RenderStatus<'a> {
    /// A status drawing with `options`. Call [`initialize`](Self::initialize)
    /// before rendering.
    pub fn new(context: &'a RenderContext<'a>, options: &'a RenderOptions) -> Self {
        Self {
            context,
            options,
            last_clip: None,
            transparency: Transparency::default(),
            stop_object: None,
            stopped: false,
            type3_fonts: Vec::new(),
            initial_states: AllStates::new(),
            type3_char: None,
            t3_fill_argb: 0,
            drop_objects: options.flags.contains(RenderFlags::DROP_OBJECTS),
            load_mask: false,
            in_group: false,
            initial_alpha: 1.0,
            form_resources: None,
            current_blend: BlendMode::Normal,
            image_renderer: None,
        }
    }

    /// Stop before drawing the object with this id.
    pub fn set_stop_object(&mut self, id: Option<u64>) {
        self.stop_object = id;
    }

    /// Group attributes of the object list being drawn.
    pub fn set_transparency(&mut self, transparency: Transparency) {
        self.transparency = transparency;
    }

    /// Skip objects that cannot be drawn directly instead of flattening them.
    pub fn set_drop_objects(&mut self, drop: bool) {
        self.drop_objects = drop;
    }

    /// True once the stop object was reached.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// The render options.
    pub fn options(&self) -> &RenderOptions {
        self.options
    }

    /// Resources of the form being drawn, if any.
    pub fn form_resources(&self) -> Option<&Dict> {
        self.form_resources.as_ref()
    }

    /// Take over the parent's Type 3 font stack and set the states used
    /// for objects that leave colors unset.
    ///
    /// Colors missing from `initial_states` come from the parent. Without
    /// explicit states, or while drawing a Type 3 glyph, defaults apply.
    /// Explicit states given to an outermost status also fix the initial
    /// alpha, which nested non-group statuses inherit.
    pub fn initialize(&mut self, parent: Option<&RenderStatus<'_>>, initial_states: Option<&AllStates>) {
        if let Some(parent) = parent {
            self.type3_fonts = parent.type3_fonts.clone();
        }
        match initial_states {
            Some(states) if self.type3_char.is_none() => {
                self.initial_states = states.clone();
                if let Some(parent) = parent {
                    self.initial_states
                        .color
                        .inherit_missing(&parent.initial_states.color);
                }
            },
            _ => self.initial_states = AllStates::new(),
        }
        self.initial_alpha = match (parent, initial_states) {
            (Some(parent), _) if !self.in_group => parent.initial_alpha,
            (None, Some(states)) => states.general.fill_alpha,
            _ => 1.0,
        };
    }

    /// Draw every active object of `holder` that can touch the device clip.
    pub fn render_object_list(&mut self, device: &mut RenderDevice, holder: &PageObjectHolder, obj2device: &Matrix) {
        let clip = obj2device
            .inverse()
            .transform_rect(&device.clip_box().to_rect());
        for obj in holder.iter() {
            if self.stop_object == Some(obj.id()) {
                self.stopped = true;
                return;
            }
            if !obj.is_active() {
                continue;
            }
            let rect = obj.rect;
            if rect.left > clip.right || rect.right < clip.left || rect.bottom > clip.top || rect.top < clip.bottom {
                continue;
            }
            self.render_single_object(device, obj, obj2device);
            if self.stopped {
                return;
            }
        }
    }

    /// Draw one object: clip, transparency, then the object itself.
    pub fn render_single_object(&mut self, device: &mut RenderDevice, obj: &PageObject, obj2device: &Matrix) {
        let context = self.context;
        let Some(_guard) = context.enter(self.options.limits.max_recursion_depth) else {
            log::warn!("Render nesting limit reached, skipping {} object", obj.kind.name());
            return;
        };
        if !self
            .options
            .optional_content
            .is_object_visible(context.document(), obj)
        {
            return;
        }
        self.process_clip_path(device, &obj.clip, obj2device);
        if self.process_transparency(device, obj, obj2device) {
            return;
        }
        self.process_object_no_clip(device, obj, obj2device);
    }

    /// Progressive form of [`render_single_object`](Self::render_single_object).
    ///
    /// Images are decoded in slices; returns true while an image still has
    /// rows left, in which case the call must be repeated for the same
    /// object.
    pub fn continue_single_object(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        obj2device: &Matrix,
        pause: Option<&dyn PauseIndicator>,
    ) -> bool {
        if let Some(mut renderer) = self.image_renderer.take() {
            if renderer.continue_render(self, device, pause) {
                self.image_renderer = Some(renderer);
                return true;
            }
            if !renderer.succeeded() {
                self.draw_obj_with_background(device, obj, obj2device);
            }
            return false;
        }

        let context = self.context;
        let Some(_guard) = context.enter(self.options.limits.max_recursion_depth) else {
            log::warn!("Render nesting limit reached, skipping {} object", obj.kind.name());
            return false;
        };
        if !self
            .options
            .optional_content
            .is_object_visible(context.document(), obj)
        {
            return false;
        }
        self.process_clip_path(device, &obj.clip, obj2device);
        if self.process_transparency(device, obj, obj2device) {
            return false;
        }
        let PageObjectKind::Image(image) = &obj.kind else {
            self.process_object_no_clip(device, obj, obj2device);
            return false;
        };
        match ImageRenderer::start(self, device, obj, image, obj2device) {
            Some(mut renderer) => {
                if renderer.continue_render(self, device, pause) {
                    self.image_renderer = Some(renderer);
                    return true;
                }
                if !renderer.succeeded() {
                    self.draw_obj_with_background(device, obj, obj2device);
                }
                false
            },
            None => false,
        }
    }

    /// Replace the device clip with `clip`, skipping the work when it equals
    /// the clip of the previous object.
    pub fn process_clip_path(&mut self, device: &mut RenderDevice, clip: &ClipPath, obj2device: &Matrix) {
        if clip.is_empty() {
            if self.last_clip.take().is_some() {
                device.restore_state(true);
            }
            return;
        }
        if self.last_clip.as_ref() == Some(clip) {
            return;
        }
        self.last_clip = Some(clip.clone());
        device.restore_state(true);

        let aa = self.options.path_anti_alias();
        for i in 0..clip.path_count() {
            let Some((path, fill)) = clip.path(i) else {
                continue;
            };
            if path.is_empty() {
                device.set_clip_rect(IntRect::default());
            } else {
                device.set_clip_path(path, obj2device, fill, aa);
            }
        }

        if clip.text_count() == 0 {
            return;
        }
        if device.class() == DeviceClass::Display && !device.caps().contains(DeviceCaps::SOFT_CLIP) {
            // Drawn through a text mask in process_transparency instead.
            return;
        }
        let text_aa = self.options.text_anti_alias();
        let mut group: Option<Path> = None;
        for i in 0..clip.text_count() {
            match clip.text(i) {
                Some(text) => {
                    let outline = self.text_outline(text);
                    group.get_or_insert_with(Path::new).append(&outline, None);
                },
                None => {
                    if let Some(path) = group.take() {
                        device.set_clip_path(&path, obj2device, FillType::Winding, text_aa);
                    }
                },
            }
        }
    }

    /// Device rectangle an object covers, within the clip.
    pub(super) fn object_clipped_rect(&self, device: &RenderDevice, obj: &PageObject, obj2device: &Matrix) -> IntRect {
        obj2device
            .transform_rect(&obj.rect)
            .outer()
            .intersect(&device.clip_box())
    }

    /// Draw the object through an offscreen group when its transparency
    /// needs one. Returns true when the object has been handled.
    pub(super) fn process_transparency(&mut self, device: &mut RenderDevice, obj: &PageObject, obj2device: &Matrix) -> bool {
        let mut blend = obj.general.blend_mode;
        let mut soft_mask = obj.general.soft_mask.clone();
        if let Some(image) = obj.as_image() {
            if image.image.smask.is_some() {
                soft_mask = None;
            }
        }

        let mut group_alpha = 1.0;
        let mut transparency = self.transparency;
        let mut isolated_group = false;
        let mut form_resources = None;
        if let Some(form) = obj.as_form() {
            group_alpha = obj.general.fill_alpha;
            transparency = form.form.transparency();
            isolated_group = transparency.isolated;
            form_resources = Some(form.form.resources().clone());
        }
        let text_clip = obj.clip.text_count() > 0
            && device.class() == DeviceClass::Display
            && !device.caps().contains(DeviceCaps::SOFT_CLIP);

        if self.options.flags.contains(RenderFlags::OVERPRINT) {
            if let Some(image) = obj.as_image() {
                let subtractive = image.image.color_space.as_ref().is_some_and(|cs| {
                    matches!(
                        cs.family(),
                        ColorSpaceFamily::DeviceCmyk | ColorSpaceFamily::Separation | ColorSpaceFamily::DeviceN
                    )
                });
                if obj.general.fill_overprint && obj.general.stroke_overprint && subtractive {
                    blend = BlendMode::Darken;
                }
            }
        }

        if soft_mask.is_none() && group_alpha == 1.0 && blend == BlendMode::Normal && !text_clip && !isolated_group {
            return false;
        }

        if device.class() == DeviceClass::Printer {
            let simple = !(transparency.isolated || soft_mask.is_some() || text_clip);
            if simple && device.caps().contains(DeviceCaps::BLEND_MODE) {
                let old_blend = self.current_blend;
                self.current_blend = blend;
                self.process_object_no_clip(device, obj, obj2device);
                self.current_blend = old_blend;
            } else {
                self.draw_obj_with_background(device, obj, obj2device);
            }
            return true;
        }

        let rect = self.object_clipped_rect(device, obj, obj2device);
        if rect.is_empty() {
            return true;
        }
        let (width, height) = (rect.width() as u32, rect.height() as u32);
        if width as usize * height as usize > self.options.limits.max_offscreen_pixels {
            log::warn!("Transparency group of {}x{} pixels drawn without isolation", width, height);
            self.process_object_no_clip(device, obj, obj2device);
            return true;
        }

        let seeded = obj.as_form().is_some() && !transparency.isolated && blend == BlendMode::Normal;
        let backdrop = if seeded { device.backdrop(rect) } else { None };
        let use_backdrop = backdrop.is_some();
        let mut group_device = match backdrop {
            Some(pixmap) => RenderDevice::from_pixmap(pixmap),
            None => match RenderDevice::new(width, height) {
                Some(d) => d,
                None => return true,
            },
        };

        let mut new_matrix = *obj2device;
        new_matrix.translate(-rect.left as f32, -rect.top as f32);

        let text_mask = if text_clip {
            self.text_clip_mask(obj, &new_matrix, width, height)
        } else {
            None
        };

        {
            let mut status = RenderStatus::new(self.context, self.options);
            status.stop_object = self.stop_object;
            status.drop_objects = self.drop_objects;
            status.form_resources = form_resources;
            status.in_group = transparency.group;
            status.initialize(None, None);
            status.process_object_no_clip(&mut group_device, obj, &new_matrix);
            self.stopped = status.stopped;
        }

        let mut mask: Option<Mask> = None;
        if let Some(smask) = &soft_mask {
            let smask_matrix = obj.general.soft_mask_matrix.multiply(obj2device);
            mask = self.load_soft_mask(smask, rect, &smask_matrix);
        }
        if let Some(text_mask) = text_mask {
            mask = Some(match mask {
                Some(mut m) => {
                    for (c, t) in m.data_mut().iter_mut().zip(text_mask.data()) {
                        *c = ((*c as u32 * *t as u32 + 127) / 255) as u8;
                    }
                    m
                },
                None => text_mask,
            });
        }
        let alpha = if group_alpha != 1.0 && transparency.group {
            group_alpha
        } else {
            1.0
        };

        let pixmap = group_device.into_pixmap();
        if use_backdrop {
            device.blend_from_backdrop(&pixmap, rect.left, rect.top, alpha, mask.as_ref());
        } else {
            let mut pixmap = pixmap;
            if let Some(mask) = &mask {
                multiply_alpha_mask(&mut pixmap, mask, 0, 0);
            }
            device.composite_pixmap(&pixmap, rect.left, rect.top, alpha, blend);
        }
        true
    }

    /// Coverage of the first text clip group of `obj`, `width` x `height`
    /// pixels under `matrix`.
    fn text_clip_mask(&self, obj: &PageObject, matrix: &Matrix, width: u32, height: u32) -> Option<Mask> {
        let mut mask = Mask::new(width, height)?;
        let mut outline = Path::new();
        for i in 0..obj.clip.text_count() {
            let Some(text) = obj.clip.text(i) else {
                break;
            };
            outline.append(&self.text_outline(text), None);
        }
        if let Some(path) = outline.to_skia(Some(matrix)) {
            mask.fill_path(
                &path,
                tiny_skia::FillRule::Winding,
                self.options.text_anti_alias(),
                tiny_skia::Transform::identity(),
            );
        }
        Some(mask)
    }

    /// Render a soft mask group into a coverage mask covering `rect`.
    pub(super) fn load_soft_mask(&self, smask: &Dict, rect: IntRect, matrix: &Matrix) -> Option<Mask> {
        let doc = self.context.document();
        let group = smask.get("G")?;
        let luminosity = doc.dict_get(smask, "S").as_name() != Some("Alpha");
        let transfer = match doc.dict_get(smask, "TR") {
            Object::Dictionary(_) | Object::Stream { .. } => smask.get("TR").and_then(|tr| Function::load(doc, tr)),
            _ => None,
        };

        let mut form = Form::new(doc, group, None, self.context.page_resources())?;
        form.parse(doc, None, None, &mut RecursionState::new());

        let (width, height) = (rect.width() as u32, rect.height() as u32);
        let mut mask_device = RenderDevice::new(width, height)?;
        if luminosity {
            mask_device.clear(self.soft_mask_backdrop(smask, form.dict()));
        }
        let mut mask_matrix = *matrix;
        mask_matrix.translate(-rect.left as f32, -rect.top as f32);
        {
            let mut status = RenderStatus::new(self.context, self.options);
            status.load_mask = true;
            status.drop_objects = self.drop_objects;
            status.form_resources = Some(form.resources().clone());
            status.in_group = true;
            status.initialize(None, None);
            status.render_object_list(&mut mask_device, form.holder(), &mask_matrix);
        }

        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = match &transfer {
                Some(f) => {
                    let out = f.evaluate(&[i as f32 / 255.0]).first().copied().unwrap_or(0.0);
                    (out.clamp(0.0, 1.0) * 255.0).round() as u8
                },
                None => i as u8,
            };
        }

        let pixmap = mask_device.into_pixmap();
        let mut mask = Mask::new(width, height)?;
        for (dst, px) in mask.data_mut().iter_mut().zip(pixmap.pixels()) {
            let value = if luminosity {
                let c = px.demultiply();
                (c.red() as u32 * 30 + c.green() as u32 * 59 + c.blue() as u32 * 11) / 100
            } else {
                px.alpha() as u32
            };
            *dst = lut[value.min(255) as usize];
        }
        Some(mask)
    }

    /// The `/BC` backdrop of a luminosity mask, black when absent.
    fn soft_mask_backdrop(&self, smask: &Dict, group_dict: Option<&Dict>) -> tiny_skia::Color {
        let doc = self.context.document();
        let Some(bc) = doc.number_array(doc.dict_get(smask, "BC")) else {
            return tiny_skia::Color::BLACK;
        };
        let space = group_dict
            .and_then(|d| doc.dict_get_dict(d, "Group"))
            .and_then(|g| g.get("CS"))
            .and_then(|cs| ColorSpace::load(doc, cs))
            .or_else(|| match bc.len() {
                1 => Some(ColorSpace::stock(ColorSpaceFamily::DeviceGray)),
                3 => Some(ColorSpace::stock(ColorSpaceFamily::DeviceRgb)),
                4 => Some(ColorSpace::stock(ColorSpaceFamily::DeviceCmyk)),
                _ => None,
            });
        match space.and_then(|cs| cs.to_rgb(&bc)) {
            Some(rgb) => tiny_skia::Color::from_rgba(rgb.r, rgb.g, rgb.b, 1.0).unwrap_or(tiny_skia::Color::BLACK),
            None => tiny_skia::Color::BLACK,
        }
    }

    /// Paint the object without touching the clip.
    pub(crate) fn process_object_no_clip(&mut self, device: &mut RenderDevice, obj: &PageObject, obj2device: &Matrix) {
        let drawn = match &obj.kind {
            PageObjectKind::Text(text) => self.process_text(device, obj, text, obj2device),
            PageObjectKind::Path(path) => self.process_path(device, obj, path, obj2device),
            PageObjectKind::Image(image) => self.process_image(device, obj, image, obj2device),
            PageObjectKind::Shading(shading) => self.process_shading(device, obj, shading, obj2device),
            PageObjectKind::Form(form) => self.process_form(device, obj, form, obj2device),
        };
        if !drawn {
            self.draw_obj_with_background(device, obj, obj2device);
        }
    }

    /// Flatten an object the device could not draw directly: render it
    /// alone into a display bitmap and composite the result.
    fn draw_obj_with_background(&mut self, device: &mut RenderDevice, obj: &PageObject, obj2device: &Matrix) {
        if self.drop_objects {
            log::debug!("Dropping {} object", obj.kind.name());
            return;
        }
        let rect = self.object_clipped_rect(device, obj, obj2device);
        if rect.is_empty() {
            return;
        }
        let Some(mut buffer) = RenderDevice::new(rect.width() as u32, rect.height() as u32) else {
            return;
        };
        let mut matrix = *obj2device;
        matrix.translate(-rect.left as f32, -rect.top as f32);
        {
            let mut status = RenderStatus::new(self.context, self.options);
            status.drop_objects = true;
            status.stop_object = self.stop_object;
            status.form_resources = self.form_resources.clone();
            status.initialize(Some(self), Some(&self.initial_states));
            status.process_object_no_clip(&mut buffer, obj, &matrix);
        }
        device.composite_pixmap(&buffer.into_pixmap(), rect.left, rect.top, 1.0, self.current_blend);
    }

    fn process_form(&mut self, device: &mut RenderDevice, obj: &PageObject, form: &FormObject, obj2device: &Matrix) -> bool {
        let doc = self.context.document();
        if let Some(dict) = form.form.dict() {
            if !self.options.optional_content.is_dict_visible(doc, dict) {
                return true;
            }
        }
        let matrix = form.matrix.multiply(obj2device);
        let states = object_states(obj);
        let mut status = RenderStatus::new(self.context, self.options);
        status.stop_object = self.stop_object;
        status.transparency = form.form.transparency();
        status.drop_objects = self.drop_objects;
        status.form_resources = Some(form.form.resources().clone());
        status.in_group = self.in_group;
        status.load_mask = self.load_mask;
        status.type3_char = self.type3_char.clone();
        status.t3_fill_argb = self.t3_fill_argb;
        status.current_blend = self.current_blend;
        status.initialize(Some(self), Some(&states));

        device.save_state();
        status.render_object_list(device, form.form.holder(), &matrix);
        self.stopped = status.stopped;
        device.restore_state(false);
        true
    }

    pub(super) fn process_path(&mut self, device: &mut RenderDevice, obj: &PageObject, path: &PathObject, obj2device: &Matrix) -> bool {
        let mut fill_type = path.fill_type;
        let mut stroke = path.stroke;
        self.process_path_pattern(device, obj, obj2device, &mut fill_type, &mut stroke);
        if fill_type == FillType::NoFill && !stroke {
            return true;
        }

        let matrix = path.matrix.multiply(obj2device);
        let aa = self.options.path_anti_alias();
        if fill_type.is_fill() {
            let argb = self.fill_argb(obj, false);
            if argb >> 24 != 0 {
                if let Some(sk) = path.path.to_skia(Some(&matrix)) {
                    device.fill_path(&sk, &solid_paint(argb, self.current_blend, aa), fill_type.to_skia());
                }
            }
        }
        if stroke {
            let argb = self.stroke_argb(obj);
            if argb >> 24 != 0 {
                let mut graph = obj.graph.clone();
                if self.options.flags.contains(RenderFlags::THIN_LINE) {
                    graph.line_width = 0.0;
                }
                if let Some(sk) = path.path.to_skia(None) {
                    let stroke = super::device::make_stroke(&graph);
                    device.stroke_path(&sk, &solid_paint(argb, self.current_blend, aa), &stroke, &matrix);
                }
            }
        }
        true
    }

    /// Paint pattern fills and strokes, clearing the flags they cover.
    fn process_path_pattern(
        &mut self,
        device: &mut RenderDevice,
        obj: &PageObject,
        obj2device: &Matrix,
        fill_type: &mut FillType,
        stroke: &mut bool,
    ) {
        if fill_type.is_fill() {
            if let Some(pattern) = obj.color.fill_color().pattern().cloned() {
                self.draw_path_with_pattern(device, obj, obj2device, &pattern, false);
                *fill_type = FillType::NoFill;
            }
        }
        if *stroke {
            if let Some(pattern) = obj.color.stroke_color().pattern().cloned() {
                self.draw_path_with_pattern(device, obj, obj2device, &pattern, true);
                *stroke = false;
            }
        }
    }

    /// Fill color as `0xAARRGGBB`.
    ///
    /// Inside a Type 3 glyph without its own colors the glyph's fill color
    /// wins; `type3` skips that substitution. Missing colors fall back to
    /// the initial states, then the transfer function and the color mode
    /// apply.
    pub(super) fn fill_argb(&self, obj: &PageObject, type3: bool) -> u32 {
        if !type3 {
            if let Some(ch) = &self.type3_char {
                if !ch.colored || obj.color.is_fill_missing() {
                    return self.t3_fill_argb;
                }
            }
        }
        let rgb = if obj.color.is_fill_missing() {
            self.initial_states.color.fill_rgb()
        } else {
            obj.color.fill_rgb()
        };
        let Some(rgb) = rgb else {
            return 0;
        };
        let rgb = self.options.forced_fill(obj).unwrap_or(rgb);
        self.finish_argb(obj, rgb.to_argb(obj.general.fill_alpha * self.initial_alpha))
    }

    /// Stroke color as `0xAARRGGBB`.
    pub(super) fn stroke_argb(&self, obj: &PageObject) -> u32 {
        if let Some(ch) = &self.type3_char {
            if !ch.colored || obj.color.is_stroke_missing() {
                return self.t3_fill_argb;
            }
        }
        let rgb = if obj.color.is_stroke_missing() {
            self.initial_states.color.stroke_rgb()
        } else {
            obj.color.stroke_rgb()
        };
        let Some(rgb) = rgb else {
            return 0;
        };
        let rgb = self.options.forced_stroke(obj).unwrap_or(rgb);
        self.finish_argb(obj, rgb.to_argb(obj.general.stroke_alpha * self.initial_alpha))
    }

    fn finish_argb(&self, obj: &PageObject, argb: u32) -> u32 {
        let argb = match &obj.general.transfer {
            Some(tr) => {
                let doc = self.context.document();
                match doc.render_data().transfer_function(doc, tr) {
                    Some(transfer) => transfer.translate(argb),
                    None => argb,
                }
            },
            None => argb,
        };
        if self.load_mask {
            return argb;
        }
        self.options.translate_color(argb)
    }

    /// True when pixels produced outside the color pipeline (images,
    /// shadings, pattern cells) still need the color mode applied.
    pub(super) fn translates_pixels(&self) -> bool {
        !self.load_mask && self.options.color_mode == super::options::ColorMode::Gray
    }

    /// Apply the color mode to every pixel of `pixmap`.
    pub(super) fn translate_pixmap(&self, pixmap: &mut tiny_skia::Pixmap) {
        if !self.translates_pixels() {
            return;
        }
        for px in pixmap.pixels_mut() {
            let c = px.demultiply();
            let argb = (c.alpha() as u32) << 24 | (c.red() as u32) << 16 | (c.green() as u32) << 8 | c.blue() as u32;
            let gray = (self.options.translate_color(argb) & 0xFF) as u8;
            *px = tiny_skia::ColorU8::from_rgba(gray, gray, gray, c.alpha()).premultiply();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::color::{ColorState, RgbColor};
    use crate::document::Document;
    use crate::geometry::Rect;
    use crate::page::Page;

    fn render(content: &[u8], size: f32) -> tiny_skia::Pixmap {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, size, size), Dict::new(), content);
        render_doc(&doc, index, size)
    }

    fn render_doc(doc: &Document, index: usize, size: f32) -> tiny_skia::Pixmap {
        let mut page = Page::new(doc, index).unwrap();
        page.parse_content(doc);
        let mut device = RenderDevice::new(size as u32, size as u32).unwrap();
        let mut context = RenderContext::new(doc, page.resources().clone());
        context.append_layer(page.holder(), page.display_matrix(1.0));
        let options = RenderOptions::default();
        context.render(&mut device, &options, None);
        device.into_pixmap()
    }

    fn pixel(pixmap: &tiny_skia::Pixmap, x: u32, y: u32) -> [u8; 4] {
        let c = pixmap.pixel(x, y).unwrap().demultiply();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn test_fill_rect() {
        let pixmap = render(b"1 0 0 rg 10 10 20 20 re f", 50.0);
        // Device y is flipped: user y 10..30 maps to rows 20..40
        assert_eq!(pixel(&pixmap, 15, 25), [255, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 5, 25)[3], 0);
    }

    #[test]
    fn test_clip_rect() {
        let pixmap = render(b"0 0 10 50 re W n 0 0 1 rg 0 0 50 50 re f", 50.0);
        assert_eq!(pixel(&pixmap, 5, 25), [0, 0, 255, 255]);
        assert_eq!(pixel(&pixmap, 20, 25)[3], 0);
    }

    #[test]
    fn test_same_clip_applied_once() {
        let mut doc = Document::new();
        let index = doc.add_page(
            Rect::new(0.0, 0.0, 50.0, 50.0),
            Dict::new(),
            b"0 0 20 20 re W n 0 0 5 5 re f 5 5 5 5 re f 10 10 5 5 re f",
        );
        let mut page = Page::new(&doc, index).unwrap();
        page.parse_content(&doc);
        let mut device = RenderDevice::new(50, 50).unwrap();
        let mut context = RenderContext::new(&doc, page.resources().clone());
        context.append_layer(page.holder(), page.display_matrix(1.0));
        context.render(&mut device, &RenderOptions::default(), None);
        assert_eq!(device.clip_op_count(), 1);
    }

    #[test]
    fn test_stop_object() {
        let mut doc = Document::new();
        let index = doc.add_page(
            Rect::new(0.0, 0.0, 50.0, 50.0),
            Dict::new(),
            b"0 0 10 10 re f 1 0 0 rg 20 20 10 10 re f",
        );
        let mut page = Page::new(&doc, index).unwrap();
        page.parse_content(&doc);
        let stop = page.objects()[1].id();
        let mut device = RenderDevice::new(50, 50).unwrap();
        let mut context = RenderContext::new(&doc, page.resources().clone());
        context.append_layer(page.holder(), page.display_matrix(1.0));
        context.render(&mut device, &RenderOptions::default(), Some(stop));
        let pixmap = device.into_pixmap();
        assert_eq!(pixel(&pixmap, 5, 45)[3], 255);
        assert_eq!(pixel(&pixmap, 25, 25)[3], 0);
    }

    #[test]
    fn test_initial_alpha_applies_once() {
        let doc = Document::new();
        let context = RenderContext::new(&doc, Dict::new());
        let options = RenderOptions::default();
        let mut states = AllStates::new();
        states.general.fill_alpha = 0.5;

        let mut outer = RenderStatus::new(&context, &options);
        outer.initialize(None, Some(&states));
        assert_eq!(outer.initial_alpha, 0.5);

        let mut nested = RenderStatus::new(&context, &options);
        nested.initialize(Some(&outer), Some(&AllStates::new()));
        assert_eq!(nested.initial_alpha, 0.5);

        let mut group = RenderStatus::new(&context, &options);
        group.in_group = true;
        group.initialize(Some(&outer), Some(&AllStates::new()));
        assert_eq!(group.initial_alpha, 1.0);
    }

    #[test]
    fn test_missing_fill_uses_initial_states() {
        let doc = Document::new();
        let context = RenderContext::new(&doc, Dict::new());
        let options = RenderOptions::default();
        let mut states = AllStates::new();
        states
            .color
            .set_fill_device(ColorSpaceFamily::DeviceRgb, &[0.0, 1.0, 0.0]);
        let mut status = RenderStatus::new(&context, &options);
        status.initialize(None, Some(&states));

        let mut obj = PageObject::new(PageObjectKind::Path(PathObject {
            path: Path::new(),
            fill_type: FillType::Winding,
            stroke: false,
            matrix: Matrix::identity(),
        }));
        assert!(obj.color.is_fill_missing());
        assert_eq!(status.fill_argb(&obj, false), RgbColor::new(0.0, 1.0, 0.0).to_argb(1.0));
        assert_eq!(status.stroke_argb(&obj), RgbColor::BLACK.to_argb(1.0));

        // A selected pattern space without a pattern paints nothing
        obj.color
            .set_fill_color_space(ColorSpace::stock(ColorSpaceFamily::Pattern));
        assert_eq!(status.fill_argb(&obj, false), 0);
    }

    #[test]
    fn test_unset_initial_color_comes_from_parent() {
        let doc = Document::new();
        let context = RenderContext::new(&doc, Dict::new());
        let options = RenderOptions::default();
        let mut outer_states = AllStates::new();
        outer_states
            .color
            .set_fill_device(ColorSpaceFamily::DeviceRgb, &[0.0, 0.0, 1.0]);
        let mut outer = RenderStatus::new(&context, &options);
        outer.initialize(None, Some(&outer_states));

        let mut inner_states = AllStates::new();
        inner_states.color = ColorState::default();
        let mut inner = RenderStatus::new(&context, &options);
        inner.initialize(Some(&outer), Some(&inner_states));

        let obj = PageObject::new(PageObjectKind::Path(PathObject {
            path: Path::new(),
            fill_type: FillType::Winding,
            stroke: false,
            matrix: Matrix::identity(),
        }));
        assert_eq!(inner.fill_argb(&obj, false), RgbColor::new(0.0, 0.0, 1.0).to_argb(1.0));
    }

    #[test]
    fn test_gray_translation_of_fill() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 20.0, 20.0), Dict::new(), b"1 0 0 rg 0 0 20 20 re f");
        let mut page = Page::new(&doc, index).unwrap();
        page.parse_content(&doc);
        let mut device = RenderDevice::new(20, 20).unwrap();
        let mut context = RenderContext::new(&doc, page.resources().clone());
        context.append_layer(page.holder(), page.display_matrix(1.0));
        context.render(&mut device, &RenderOptions::default().as_gray(), None);
        assert_eq!(pixel(&device.into_pixmap(), 10, 10), [76, 76, 76, 255]);
    }
}
