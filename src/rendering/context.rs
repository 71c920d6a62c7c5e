//! What is being rendered: the document, page resources and the object
//! layers drawn on top of each other.

use super::device::RenderDevice;
use super::options::RenderOptions;
use super::render_status::RenderStatus;
use crate::content::page_object::PageObjectHolder;
use crate::document::Document;
use crate::geometry::Matrix;
use crate::object::Dict;
use std::cell::Cell;

/// One object list and its object-to-device matrix.
#[derive(Debug, Clone, Copy)]
pub struct Layer<'a> {
    /// Parsed objects
    pub holder: &'a PageObjectHolder,
    /// Object space to device pixels
    pub matrix: Matrix,
}

/// Shared state of one render invocation.
///
/// Every nested status (forms, groups, glyphs, soft masks, pattern cells)
/// borrows the same context, which also tracks how deeply statuses nest.
#[derive(Debug)]
pub struct RenderContext<'a> {
    document: &'a Document,
    page_resources: Dict,
    layers: Vec<Layer<'a>>,
    depth: Cell<usize>,
}

/// Leaves one nesting level when dropped.
pub(crate) struct DepthGuard<'c> {
    depth: &'c Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl<'a> RenderContext<'a> {
    /// A context with no layers.
    pub fn new(document: &'a Document, page_resources: Dict) -> Self {
        Self {
            document,
            page_resources,
            layers: Vec::new(),
            depth: Cell::new(0),
        }
    }

    /// Add an object list drawn over the previous ones.
    pub fn append_layer(&mut self, holder: &'a PageObjectHolder, matrix: Matrix) {
        self.layers.push(Layer { holder, matrix });
    }

    /// The layers in drawing order.
    pub fn layers(&self) -> &[Layer<'a>] {
        &self.layers
    }

    /// The document objects are resolved in.
    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Page resources; fallback for forms and glyphs without their own.
    pub fn page_resources(&self) -> &Dict {
        &self.page_resources
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Enter one nesting level, or `None` past `limit`.
    pub(crate) fn enter(&self, limit: usize) -> Option<DepthGuard<'_>> {
        if self.depth.get() >= limit {
            return None;
        }
        self.depth.set(self.depth.get() + 1);
        Some(DepthGuard { depth: &self.depth })
    }

    /// Draw every layer in one go.
    ///
    /// Rendering ends early at the object whose id is `stop_object`.
    pub fn render(&self, device: &mut RenderDevice, options: &RenderOptions, stop_object: Option<u64>) {
        for layer in &self.layers {
            device.save_state();
            let mut status = RenderStatus::new(self, options);
            status.set_stop_object(stop_object);
            status.set_transparency(layer.holder.transparency);
            status.initialize(None, None);
            status.render_object_list(device, layer.holder, &layer.matrix);
            device.restore_state(false);
            if status.is_stopped() {
                log::debug!("Rendering stopped at object {:?}", stop_object);
                break;
            }
        }
    }
}
