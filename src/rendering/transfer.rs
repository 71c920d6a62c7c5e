//! Transfer functions (`/TR`, `/TR2`) as per-channel lookup tables.

use crate::content::function::Function;
use crate::document::Document;
use crate::object::Object;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Three 256-entry tables, one per RGB channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    identity: bool,
    samples: [[u8; 256]; 3],
}

impl TransferFunction {
    /// A transfer function that changes nothing.
    pub fn identity() -> Self {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as u8;
        }
        Self {
            identity: true,
            samples: [table; 3],
        }
    }

    /// Sample one function, or an array of four (only the first three
    /// apply to RGB output). Returns `None` when no function can be loaded.
    pub fn load(doc: &Document, obj: &Object) -> Option<Self> {
        let functions: Vec<_> = match doc.resolve(obj) {
            Object::Array(items) => {
                if items.len() < 3 {
                    return None;
                }
                items.iter().take(3).map(|f| Function::load(doc, f)).collect::<Option<_>>()?
            },
            Object::Name(_) => return None,
            _ => vec![Function::load(doc, obj)?],
        };

        let mut transfer = Self::identity();
        let mut identity = true;
        for channel in 0..3 {
            let function = &functions[channel.min(functions.len() - 1)];
            for i in 0..256 {
                let output = function
                    .evaluate(&[i as f32 / 255.0])
                    .first()
                    .copied()
                    .unwrap_or(0.0);
                let value = (output.clamp(0.0, 1.0) * 255.0).round() as u8;
                if value as usize != i {
                    identity = false;
                }
                transfer.samples[channel][i] = value;
            }
        }
        transfer.identity = identity;
        Some(transfer)
    }

    /// True when every table maps a value to itself.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Map the color channels of a packed `0xAARRGGBB` value.
    pub fn translate(&self, argb: u32) -> u32 {
        if self.identity {
            return argb;
        }
        let r = self.samples[0][((argb >> 16) & 0xFF) as usize] as u32;
        let g = self.samples[1][((argb >> 8) & 0xFF) as usize] as u32;
        let b = self.samples[2][(argb & 0xFF) as usize] as u32;
        (argb & 0xFF00_0000) | (r << 16) | (g << 8) | b
    }

    /// Map every pixel of a premultiplied pixmap.
    pub fn translate_pixmap(&self, pixmap: &mut Pixmap) {
        if self.identity {
            return;
        }
        for px in pixmap.pixels_mut() {
            let c = px.demultiply();
            let a = c.alpha() as u32;
            let map = |table: &[u8; 256], v: u8| ((table[v as usize] as u32 * a + 127) / 255) as u8;
            if let Some(p) = PremultipliedColorU8::from_rgba(
                map(&self.samples[0], c.red()),
                map(&self.samples[1], c.green()),
                map(&self.samples[2], c.blue()),
                c.alpha(),
            ) {
                *px = p;
            }
        }
    }
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self::identity()
    }
}
