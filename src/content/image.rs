//! Image XObjects and inline images: parameters and sample decoding.
//!
//! Decoding turns the filtered samples into straight-alpha RGBA rows. It
//! runs row by row through [`ImageDecoder`] so that the progressive image
//! renderer can pause between batches of rows.

use crate::content::bitstream::{BitReader, max_value};
use crate::content::color::{ColorSpace, RgbColor};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use std::rc::Rc;

/// Largest decoded image, in pixels.
const MAX_IMAGE_PIXELS: u64 = 1 << 28;

/// How an image is masked besides its own samples.
#[derive(Debug, Clone)]
pub enum ImageMaskKind {
    /// `/Mask` stencil stream: samples of 1 are not painted
    Stencil(Object),
    /// `/Mask` color key array on raw sample values
    ColorKey(Vec<u32>),
}

/// Parameters of an image stream.
#[derive(Debug, Clone)]
pub struct Image {
    /// Width in samples
    pub width: u32,
    /// Height in samples
    pub height: u32,
    /// Bits per component
    pub bits_per_component: u32,
    /// Color space (absent for stencil masks)
    pub color_space: Option<Rc<ColorSpace>>,
    /// Stencil mask painted with the fill color
    pub is_mask: bool,
    /// Decode array
    pub decode: Vec<f32>,
    /// Interpolate flag
    pub interpolate: bool,
    /// Inline image (`BI`..`EI`)
    pub is_inline: bool,
    /// Soft mask stream
    pub smask: Option<Object>,
    /// Explicit or color-key mask
    pub mask: Option<ImageMaskKind>,
    stream: Object,
}

impl Image {
    /// Load an image XObject; indirect images are cached.
    pub fn load(doc: &Document, obj: &Object) -> Option<Rc<Image>> {
        let obj_ref = obj.as_reference();
        if let Some(r) = obj_ref {
            if let Some(img) = doc.cache.images.borrow().get(&r) {
                return Some(img.clone());
            }
        }
        let image = Rc::new(Self::from_stream(doc, doc.resolve(obj).clone(), false)?);
        if let Some(r) = obj_ref {
            doc.cache.images.borrow_mut().insert(r, image.clone());
        }
        Some(image)
    }

    /// Read the parameters of an image stream.
    pub fn from_stream(doc: &Document, stream: Object, is_inline: bool) -> Option<Image> {
        let dict = stream.as_stream()?.0;
        let int = |key: &str| doc.dict_get(dict, key).as_integer();
        let width = int("Width").filter(|w| *w > 0)? as u32;
        let height = int("Height").filter(|h| *h > 0)? as u32;
        if width as u64 * height as u64 > MAX_IMAGE_PIXELS {
            log::warn!("Image of {}x{} is too large", width, height);
            return None;
        }
        let is_mask = doc.dict_get(dict, "ImageMask").as_bool().unwrap_or(false);
        let (color_space, bits_per_component) = if is_mask {
            (None, 1)
        } else {
            let cs = dict.get("ColorSpace").and_then(|o| ColorSpace::load(doc, o));
            let codec = dict
                .get("Filter")
                .map(|f| doc.resolve(f))
                .and_then(|f| match f {
                    Object::Name(n) => Some(n.as_str()),
                    Object::Array(a) => a.last().and_then(Object::as_name),
                    _ => None,
                });
            // JPX data carries its own color space
            if cs.is_none() && codec != Some("JPXDecode") {
                log::debug!("Image without a color space");
                return None;
            }
            let bpc = int("BitsPerComponent").unwrap_or(8) as u32;
            if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
                return None;
            }
            (cs, bpc)
        };
        let components = color_space.as_ref().map_or(1, |cs| cs.components());
        let decode = match dict.get("Decode").and_then(|o| doc.number_array(o)) {
            Some(d) if d.len() >= components * 2 => d,
            _ if is_mask => vec![0.0, 1.0],
            _ => color_space
                .as_ref()
                .map(|cs| cs.default_decode(bits_per_component))
                .unwrap_or_else(|| vec![0.0, 1.0]),
        };
        let mask = match dict.get("Mask").map(|m| (m, doc.resolve(m))) {
            Some((_, Object::Array(arr))) => Some(ImageMaskKind::ColorKey(
                arr.iter()
                    .map(|o| doc.resolve(o).as_integer().unwrap_or(0).max(0) as u32)
                    .collect(),
            )),
            Some((m, Object::Stream { .. })) => Some(ImageMaskKind::Stencil(m.clone())),
            _ => None,
        };
        let smask = dict
            .get("SMask")
            .filter(|s| doc.resolve(s).as_stream().is_some())
            .cloned();
        Some(Image {
            width,
            height,
            bits_per_component,
            color_space,
            is_mask,
            decode,
            interpolate: doc.dict_get(dict, "Interpolate").as_bool().unwrap_or(false),
            is_inline,
            smask,
            mask,
            stream,
        })
    }

    /// The image stream dictionary.
    pub fn dict(&self) -> Option<&Dict> {
        self.stream.as_dict()
    }

    /// The image stream object.
    pub fn stream(&self) -> &Object {
        &self.stream
    }

    /// True when painting uses an overprint-sensitive space.
    pub fn is_subtractive(&self) -> bool {
        self.color_space.as_ref().is_some_and(|cs| cs.is_subtractive())
    }

    /// Decode the whole image.
    pub fn decode(&self, doc: &Document) -> Result<DecodedImage> {
        let mut decoder = ImageDecoder::new(doc, self)?;
        decoder.decode_rows(u32::MAX);
        Ok(decoder.finish())
    }
}

/// Straight-alpha RGBA pixels of a decoded image.
///
/// For stencil masks only the alpha channel is meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA rows, top row first
    pub rgba: Vec<u8>,
    /// Stencil mask
    pub is_mask: bool,
}

impl DecodedImage {
    /// Premultiplied pixmap; stencil masks are painted with `mask_color`.
    pub fn to_pixmap(&self, mask_color: Option<RgbColor>) -> Option<tiny_skia::Pixmap> {
        let mut pixmap = tiny_skia::Pixmap::new(self.width, self.height)?;
        let fill = mask_color.unwrap_or(RgbColor::BLACK).to_bytes();
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(self.rgba.chunks_exact(4)) {
            let (r, g, b) = if self.is_mask { (fill[0], fill[1], fill[2]) } else { (src[0], src[1], src[2]) };
            *dst = tiny_skia::ColorU8::from_rgba(r, g, b, src[3]).premultiply();
        }
        Some(pixmap)
    }

    /// True when every pixel is opaque.
    pub fn is_opaque(&self) -> bool {
        self.rgba.chunks_exact(4).all(|p| p[3] == 255)
    }
}

enum Samples {
    Packed { data: Vec<u8>, components: usize, bpc: u32 },
    Rgb8(Vec<u8>),
    Gray8(Vec<u8>),
}

/// Incremental sample decoder.
pub struct ImageDecoder {
    image: Image,
    samples: Samples,
    gray_lut: Option<Vec<[u8; 3]>>,
    alpha: Option<Vec<u8>>,
    next_row: u32,
    rgba: Vec<u8>,
}

impl ImageDecoder {
    /// Run the stream filters and decode any soft mask or stencil mask.
    pub fn new(doc: &Document, image: &Image) -> Result<Self> {
        let samples = decode_samples(doc, image)?;
        let gray_lut = match (&samples, &image.color_space) {
            (Samples::Packed { components: 1, bpc, .. }, Some(cs)) if *bpc <= 8 && !image.is_mask => {
                let max = max_value(*bpc);
                Some(
                    (0..=max as u32)
                        .map(|raw| {
                            let value = decode_value(raw, &image.decode, 0, max);
                            cs.to_rgb(&[value]).unwrap_or(RgbColor::BLACK).to_bytes()
                        })
                        .collect(),
                )
            },
            _ => None,
        };
        let alpha = match (&image.smask, &image.mask) {
            (Some(smask), _) => load_soft_mask(doc, smask, image.width, image.height),
            (None, Some(ImageMaskKind::Stencil(mask))) => load_stencil_mask(doc, mask, image.width, image.height),
            _ => None,
        };
        Ok(Self {
            image: image.clone(),
            samples,
            gray_lut,
            alpha,
            next_row: 0,
            rgba: Vec::with_capacity(image.width as usize * image.height as usize * 4),
        })
    }

    /// True when every row has been decoded.
    pub fn is_done(&self) -> bool {
        self.next_row >= self.image.height
    }

    /// Rows decoded so far.
    pub fn rows_done(&self) -> u32 {
        self.next_row
    }

    /// Decode up to `max_rows` more rows. Returns true when done.
    pub fn decode_rows(&mut self, max_rows: u32) -> bool {
        let end = self.image.height.min(self.next_row.saturating_add(max_rows));
        while self.next_row < end {
            self.decode_row(self.next_row);
            self.next_row += 1;
        }
        self.is_done()
    }

    fn decode_row(&mut self, y: u32) {
        let width = self.image.width as usize;
        let start = self.rgba.len();
        match &self.samples {
            Samples::Rgb8(data) => {
                let row = data.get(y as usize * width * 3..).unwrap_or(&[]);
                for x in 0..width {
                    let px = row.get(x * 3..x * 3 + 3).unwrap_or(&[0, 0, 0]);
                    self.rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
            },
            Samples::Gray8(data) => {
                let row = data.get(y as usize * width..).unwrap_or(&[]);
                for x in 0..width {
                    let g = row.get(x).copied().unwrap_or(0);
                    self.rgba.extend_from_slice(&[g, g, g, 255]);
                }
            },
            Samples::Packed { data, components, bpc } => {
                let row_bytes = (width * components * *bpc as usize).div_ceil(8);
                let row = data.get(y as usize * row_bytes..).unwrap_or(&[]);
                let mut reader = BitReader::new(row);
                let max = max_value(*bpc);
                let mut raw = vec![0u32; *components];
                let mut values = vec![0f32; *components];
                for _ in 0..width {
                    for r in raw.iter_mut() {
                        *r = reader.read(*bpc);
                    }
                    let keyed = match &self.image.mask {
                        Some(ImageMaskKind::ColorKey(ranges)) => raw.iter().enumerate().all(|(i, v)| {
                            let lo = ranges.get(i * 2).copied().unwrap_or(0);
                            let hi = ranges.get(i * 2 + 1).copied().unwrap_or(u32::MAX);
                            (lo..=hi).contains(v)
                        }),
                        _ => false,
                    };
                    if self.image.is_mask {
                        let value = decode_value(raw[0], &self.image.decode, 0, max);
                        let a = if value < 0.5 { 255 } else { 0 };
                        self.rgba.extend_from_slice(&[0, 0, 0, a]);
                        continue;
                    }
                    let rgb = match &self.gray_lut {
                        Some(lut) => lut[raw[0] as usize],
                        None => {
                            for (i, v) in values.iter_mut().enumerate() {
                                *v = decode_value(raw[i], &self.image.decode, i, max);
                            }
                            self.image
                                .color_space
                                .as_ref()
                                .and_then(|cs| cs.to_rgb(&values))
                                .unwrap_or(RgbColor::BLACK)
                                .to_bytes()
                        },
                    };
                    self.rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], if keyed { 0 } else { 255 }]);
                }
            },
        }
        if let Some(alpha) = &self.alpha {
            let row_alpha = alpha.get(y as usize * width..(y as usize + 1) * width).unwrap_or(&[]);
            for (px, a) in self.rgba[start..].chunks_exact_mut(4).zip(row_alpha) {
                px[3] = ((px[3] as u32 * *a as u32 + 127) / 255) as u8;
            }
        }
    }

    /// The decoded image; undecoded rows stay transparent.
    pub fn finish(mut self) -> DecodedImage {
        let total = self.image.width as usize * self.image.height as usize * 4;
        self.rgba.resize(total, 0);
        DecodedImage {
            width: self.image.width,
            height: self.image.height,
            rgba: self.rgba,
            is_mask: self.image.is_mask,
        }
    }
}

fn decode_value(raw: u32, decode: &[f32], component: usize, max: f32) -> f32 {
    let min = decode.get(component * 2).copied().unwrap_or(0.0);
    let hi = decode.get(component * 2 + 1).copied().unwrap_or(1.0);
    min + raw as f32 * (hi - min) / max
}

fn decode_samples(doc: &Document, image: &Image) -> Result<Samples> {
    let (dict, data) = image.stream.as_stream().ok_or_else(|| Error::Image("Not a stream".to_string()))?;
    let decoded = doc.decode_image_stream(dict, data)?;
    match decoded.image_codec.as_ref().map(|c| c.name.as_str()) {
        None => {
            let components = image.color_space.as_ref().map_or(1, |cs| cs.components());
            if image.bits_per_component == 16 {
                // Keep the high byte of each sample
                let data = decoded.data.chunks(2).map(|c| c[0]).collect();
                return Ok(Samples::Packed {
                    data,
                    components,
                    bpc: 8,
                });
            }
            Ok(Samples::Packed {
                data: decoded.data,
                components,
                bpc: image.bits_per_component,
            })
        },
        Some("DCTDecode") => {
            let img = image::load_from_memory_with_format(&decoded.data, image::ImageFormat::Jpeg)?;
            let single_channel = image.color_space.as_ref().map_or(true, |cs| cs.components() == 1);
            if img.color().channel_count() == 1 && single_channel {
                Ok(Samples::Gray8(img.to_luma8().into_raw()))
            } else {
                Ok(Samples::Rgb8(img.to_rgb8().into_raw()))
            }
        },
        Some(other) => Err(Error::UnsupportedFilter(other.to_string())),
    }
}

fn resample_alpha(decoded: &DecodedImage, width: u32, height: u32, from_gray: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        let sy = (y as u64 * decoded.height as u64 / height as u64) as usize;
        for x in 0..width {
            let sx = (x as u64 * decoded.width as u64 / width as u64) as usize;
            let i = (sy * decoded.width as usize + sx) * 4;
            let a = if from_gray {
                decoded.rgba.get(i).copied().unwrap_or(255)
            } else {
                decoded.rgba.get(i + 3).copied().unwrap_or(255)
            };
            out.push(a);
        }
    }
    out
}

fn load_soft_mask(doc: &Document, smask: &Object, width: u32, height: u32) -> Option<Vec<u8>> {
    let mask = Image::from_stream(doc, doc.resolve(smask).clone(), false)?;
    let decoded = mask.decode(doc).ok()?;
    Some(resample_alpha(&decoded, width, height, true))
}

fn load_stencil_mask(doc: &Document, mask: &Object, width: u32, height: u32) -> Option<Vec<u8>> {
    let mut stream = doc.resolve(mask).clone();
    if let Some(dict) = stream.as_dict_mut() {
        dict.insert("ImageMask".to_string(), Object::Boolean(true));
    }
    let mask = Image::from_stream(doc, stream, false)?;
    let decoded = mask.decode(doc).ok()?;
    Some(resample_alpha(&decoded, width, height, false))
}
