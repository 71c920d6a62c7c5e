//! In-memory PDF document: object store, page list and shared caches.
//!
//! A [`Document`] owns every indirect object of a file (see
//! [`crate::loader`] for reading one from bytes) and the caches that make
//! repeated resource lookups cheap: fonts, color spaces, patterns, images
//! and the render data shared by all pages.
//!
//! Documents can also be assembled programmatically, which is how most of
//! the tests build their inputs:
//!
//! ```
//! use pdf_raster::document::Document;
//! use pdf_raster::geometry::Rect;
//! use pdf_raster::object::Dict;
//!
//! let mut doc = Document::new();
//! doc.add_page(Rect::new(0.0, 0.0, 200.0, 200.0), Dict::new(), b"0 0 1 rg 0 0 50 50 re f");
//! assert_eq!(doc.page_count(), 1);
//! ```

use crate::config::ParseLimits;
use crate::content::color::ColorSpace;
use crate::content::font::{Font, StockFont};
use crate::content::function::Function;
use crate::content::image::Image;
use crate::content::pattern::{Pattern, Shading};
use crate::decoders::{DecodedStream, FilterSpec, canonical_filter_name, decode_filters};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{Dict, NULL, Object, ObjectRef};
use crate::rendering::RenderData;
use std::cell::{OnceCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Attributes of one page after inheritance through the page tree.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// The page dictionary's object reference, if it is indirect
    pub object_ref: Option<ObjectRef>,
    /// Page dictionary
    pub dict: Dict,
    /// Media box
    pub media_box: Rect,
    /// Crop box (defaults to the media box)
    pub crop_box: Rect,
    /// Rotation in degrees, a multiple of 90
    pub rotate: i32,
    /// Resource dictionary (resolved)
    pub resources: Dict,
}

/// Caches of parsed resources keyed by their indirect reference.
///
/// Fonts given as direct dictionaries are keyed by the dictionary itself.
#[derive(Default)]
pub(crate) struct ResourceCache {
    pub fonts: RefCell<HashMap<ObjectRef, Rc<dyn Font>>>,
    pub direct_fonts: RefCell<Vec<(Dict, Rc<dyn Font>)>>,
    pub color_spaces: RefCell<HashMap<ObjectRef, Rc<ColorSpace>>>,
    pub patterns: RefCell<HashMap<ObjectRef, Rc<Pattern>>>,
    pub shadings: RefCell<HashMap<ObjectRef, Rc<Shading>>>,
    pub images: RefCell<HashMap<ObjectRef, Rc<Image>>>,
    pub functions: RefCell<HashMap<ObjectRef, Rc<Function>>>,
    pub stock_font: OnceCell<Rc<dyn Font>>,
}

/// A PDF document held in memory.
pub struct Document {
    objects: HashMap<ObjectRef, Object>,
    trailer: Dict,
    pages: Vec<PageInfo>,
    version: (u8, u8),
    limits: ParseLimits,
    next_id: u32,
    pub(crate) cache: ResourceCache,
    render_data: RenderData,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("objects", &self.objects.len())
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            trailer: Dict::new(),
            pages: Vec::new(),
            version: (1, 7),
            limits: ParseLimits::default(),
            next_id: 1,
            cache: ResourceCache::default(),
            render_data: RenderData::default(),
        }
    }

    /// Build a document from loaded objects and a trailer, walking the page tree.
    pub fn from_objects(
        objects: HashMap<ObjectRef, Object>,
        trailer: Dict,
        version: (u8, u8),
        limits: ParseLimits,
    ) -> Result<Self> {
        let next_id = objects.keys().map(|r| r.id).max().unwrap_or(0) + 1;
        let mut doc = Self {
            objects,
            trailer,
            pages: Vec::new(),
            version,
            limits,
            next_id,
            cache: ResourceCache::default(),
            render_data: RenderData::default(),
        };
        doc.pages = doc.collect_pages()?;
        Ok(doc)
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Parse limits applied to this document.
    pub fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    /// Replace the parse limits.
    pub fn set_limits(&mut self, limits: ParseLimits) {
        self.limits = limits;
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Number of indirect objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page attributes by zero-based index.
    pub fn page_info(&self, index: usize) -> Result<&PageInfo> {
        self.pages.get(index).ok_or(Error::PageOutOfRange {
            index,
            count: self.pages.len(),
        })
    }

    /// Look up an indirect object.
    pub fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects.get(&r)
    }

    /// Store an object under a fresh reference.
    pub fn add(&mut self, object: Object) -> ObjectRef {
        let r = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        self.objects.insert(r, object);
        r
    }

    /// Store an object under a given reference, replacing any previous one.
    pub fn insert(&mut self, r: ObjectRef, object: Object) {
        self.next_id = self.next_id.max(r.id + 1);
        self.objects.insert(r, object);
    }

    /// Append a page with the given media box, resources and content stream.
    pub fn add_page(&mut self, media_box: Rect, resources: Dict, content: &[u8]) -> usize {
        let contents = self.add(Object::Stream {
            dict: Dict::new(),
            data: bytes::Bytes::copy_from_slice(content),
        });
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("Page".to_string()));
        dict.insert(
            "MediaBox".to_string(),
            Object::Array(
                [media_box.left, media_box.bottom, media_box.right, media_box.top]
                    .into_iter()
                    .map(Object::from)
                    .collect(),
            ),
        );
        dict.insert("Resources".to_string(), Object::Dictionary(resources.clone()));
        dict.insert("Contents".to_string(), Object::Reference(contents));
        let page_ref = self.add(Object::Dictionary(dict.clone()));
        self.pages.push(PageInfo {
            object_ref: Some(page_ref),
            dict,
            media_box,
            crop_box: media_box,
            rotate: 0,
            resources,
        });
        self.pages.len() - 1
    }

    /// Follow indirect references until a direct object is reached.
    ///
    /// Missing objects, cycles and over-long chains resolve to null.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        for _ in 0..self.limits.max_reference_depth {
            match current {
                Object::Reference(r) => match self.objects.get(r) {
                    Some(next) => current = next,
                    None => {
                        log::debug!("Unresolved reference {}", r);
                        return &NULL;
                    },
                },
                _ => return current,
            }
        }
        log::warn!("Reference chain too deep, treating as null");
        &NULL
    }

    /// Resolved value of a dictionary entry (null when absent).
    pub fn dict_get<'a>(&'a self, dict: &'a Dict, key: &str) -> &'a Object {
        match dict.get(key) {
            Some(obj) => self.resolve(obj),
            None => &NULL,
        }
    }

    /// Resolved dictionary entry that is a dictionary or stream dictionary.
    pub fn dict_get_dict<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a Dict> {
        self.dict_get(dict, key).as_dict()
    }

    /// Resolved numeric dictionary entry.
    pub fn dict_get_number(&self, dict: &Dict, key: &str) -> Option<f32> {
        self.dict_get(dict, key).as_number()
    }

    /// Resolved numeric array, with non-numbers read as 0.
    pub fn number_array(&self, obj: &Object) -> Option<Vec<f32>> {
        self.resolve(obj).as_array().map(|arr| {
            arr.iter()
                .map(|o| self.resolve(o).as_number().unwrap_or(0.0))
                .collect()
        })
    }

    fn filter_specs(&self, dict: &Dict) -> Vec<FilterSpec> {
        let filter = self.resolve(dict.get("Filter").or_else(|| dict.get("F")).unwrap_or(&NULL));
        let params = self.resolve(dict.get("DecodeParms").or_else(|| dict.get("DP")).unwrap_or(&NULL));
        let names: Vec<String> = match filter {
            Object::Name(n) => vec![n.clone()],
            Object::Array(arr) => arr
                .iter()
                .filter_map(|o| self.resolve(o).as_name().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let p = match params {
                    Object::Dictionary(d) if i == 0 => Some(d.clone()),
                    Object::Array(arr) => arr.get(i).and_then(|o| self.resolve(o).as_dict()).cloned(),
                    _ => None,
                };
                FilterSpec {
                    name: canonical_filter_name(name).to_string(),
                    params: p,
                }
            })
            .collect()
    }

    /// Decode a stream, resolving indirect filter names and parameters.
    pub fn decode_stream(&self, obj: &Object) -> Result<Vec<u8>> {
        let (dict, data) = self.resolve(obj).as_stream().ok_or_else(|| Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: self.resolve(obj).type_name().to_string(),
        })?;
        let chain = self.filter_specs(dict);
        Ok(decode_filters(data, &chain, &self.limits, false)?.data)
    }

    /// Decode a stream up to a trailing image codec.
    pub fn decode_image_stream(&self, dict: &Dict, data: &[u8]) -> Result<DecodedStream> {
        let chain = self.filter_specs(dict);
        decode_filters(data, &chain, &self.limits, true)
    }

    /// Shared render data (transfer functions, glyph caches).
    pub fn render_data(&self) -> &RenderData {
        &self.render_data
    }

    /// The fallback font used when a `Tf` font cannot be found.
    pub fn stock_font(&self) -> Rc<dyn Font> {
        self.cache
            .stock_font
            .get_or_init(|| Rc::new(StockFont::new("Helvetica")) as Rc<dyn Font>)
            .clone()
    }

    fn collect_pages(&self) -> Result<Vec<PageInfo>> {
        let root = self.dict_get(&self.trailer, "Root");
        let catalog = root
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf("Missing document catalog".to_string()))?;
        let pages_obj = catalog
            .get("Pages")
            .ok_or_else(|| Error::InvalidPdf("Catalog has no /Pages".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.walk_page_tree(pages_obj, &Dict::new(), &mut visited, &mut pages, 0);
        Ok(pages)
    }

    fn walk_page_tree(
        &self,
        node_obj: &Object,
        inherited: &Dict,
        visited: &mut HashSet<ObjectRef>,
        pages: &mut Vec<PageInfo>,
        depth: u32,
    ) {
        if depth > 64 {
            log::warn!("Page tree too deep, truncating");
            return;
        }
        let node_ref = node_obj.as_reference();
        if let Some(r) = node_ref {
            if !visited.insert(r) {
                log::warn!("Page tree cycle at {}", r);
                return;
            }
        }
        let Some(node) = self.resolve(node_obj).as_dict() else {
            return;
        };

        let mut attrs = inherited.clone();
        for key in ["Resources", "MediaBox", "CropBox", "Rotate"] {
            if let Some(value) = node.get(key) {
                attrs.insert(key.to_string(), value.clone());
            }
        }

        let is_leaf = match node.get("Type").and_then(Object::as_name) {
            Some("Page") => true,
            Some("Pages") => false,
            _ => !node.contains_key("Kids"),
        };
        if !is_leaf {
            if let Some(kids) = self.dict_get(node, "Kids").as_array() {
                for kid in kids {
                    self.walk_page_tree(kid, &attrs, visited, pages, depth + 1);
                }
            }
            return;
        }

        let rect = |key: &str| {
            attrs
                .get(key)
                .and_then(|o| self.number_array(o))
                .and_then(|v| Rect::from_array(&v))
        };
        let media_box = rect("MediaBox").unwrap_or(Rect::new(0.0, 0.0, 612.0, 792.0));
        let crop_box = rect("CropBox")
            .map(|c| c.intersect(&media_box))
            .filter(|c| !c.is_empty())
            .unwrap_or(media_box);
        let rotate = attrs
            .get("Rotate")
            .and_then(|o| self.resolve(o).as_integer())
            .unwrap_or(0)
            .rem_euclid(360) as i32
            / 90
            * 90;
        let resources = attrs
            .get("Resources")
            .and_then(|o| self.resolve(o).as_dict())
            .cloned()
            .unwrap_or_default();

        pages.push(PageInfo {
            object_ref: node_ref,
            dict: node.clone(),
            media_box,
            crop_box,
            rotate,
            resources,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    fn two_page_document() -> Document {
        let mut objects = HashMap::new();
        let mut catalog = Dict::new();
        catalog.insert("Type".into(), name("Catalog"));
        catalog.insert("Pages".into(), Object::Reference(ObjectRef::new(2, 0)));
        objects.insert(ObjectRef::new(1, 0), Object::Dictionary(catalog));

        let mut pages = Dict::new();
        pages.insert("Type".into(), name("Pages"));
        pages.insert(
            "Kids".into(),
            Object::Array(vec![
                Object::Reference(ObjectRef::new(3, 0)),
                Object::Reference(ObjectRef::new(4, 0)),
                // Cycle back to the tree root is ignored
                Object::Reference(ObjectRef::new(2, 0)),
            ]),
        );
        pages.insert(
            "MediaBox".into(),
            Object::Array(vec![0i64.into(), 0i64.into(), 300i64.into(), 400i64.into()]),
        );
        objects.insert(ObjectRef::new(2, 0), Object::Dictionary(pages));

        let mut page1 = Dict::new();
        page1.insert("Type".into(), name("Page"));
        page1.insert("Rotate".into(), Object::Integer(-90));
        objects.insert(ObjectRef::new(3, 0), Object::Dictionary(page1));

        let mut page2 = Dict::new();
        page2.insert("Type".into(), name("Page"));
        page2.insert(
            "MediaBox".into(),
            Object::Array(vec![0i64.into(), 0i64.into(), 100i64.into(), 100i64.into()]),
        );
        objects.insert(ObjectRef::new(4, 0), Object::Dictionary(page2));

        let mut trailer = Dict::new();
        trailer.insert("Root".into(), Object::Reference(ObjectRef::new(1, 0)));
        Document::from_objects(objects, trailer, (1, 7), ParseLimits::default()).unwrap()
    }

    #[test]
    fn test_page_tree_inheritance() {
        let doc = two_page_document();
        assert_eq!(doc.page_count(), 2);
        let first = doc.page_info(0).unwrap();
        assert_eq!(first.media_box, Rect::new(0.0, 0.0, 300.0, 400.0));
        assert_eq!(first.rotate, 270);
        let second = doc.page_info(1).unwrap();
        assert_eq!(second.media_box, Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = two_page_document();
        assert!(matches!(doc.page_info(5), Err(Error::PageOutOfRange { index: 5, count: 2 })));
    }

    #[test]
    fn test_resolve_chain_and_missing() {
        let mut doc = Document::new();
        let target = doc.add(Object::Integer(7));
        let alias = doc.add(Object::Reference(target));
        assert_eq!(doc.resolve(&Object::Reference(alias)), &Object::Integer(7));
        assert!(doc.resolve(&Object::Reference(ObjectRef::new(99, 0))).is_null());
    }

    #[test]
    fn test_resolve_cycle_is_null() {
        let mut doc = Document::new();
        let a = ObjectRef::new(1, 0);
        let b = ObjectRef::new(2, 0);
        doc.insert(a, Object::Reference(b));
        doc.insert(b, Object::Reference(a));
        assert!(doc.resolve(&Object::Reference(a)).is_null());
    }

    #[test]
    fn test_decode_stream_with_indirect_filter() {
        let mut doc = Document::new();
        let filter = doc.add(name("ASCIIHexDecode"));
        let mut dict = Dict::new();
        dict.insert("Filter".into(), Object::Reference(filter));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"3020304D>"),
        };
        assert_eq!(doc.decode_stream(&stream).unwrap(), b"0 0M");
    }

    #[test]
    fn test_add_page() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 10.0, 20.0), Dict::new(), b"q Q");
        assert_eq!(index, 0);
        let info = doc.page_info(0).unwrap();
        assert_eq!(info.crop_box, Rect::new(0.0, 0.0, 10.0, 20.0));
        let contents = doc.dict_get(&info.dict, "Contents");
        assert_eq!(doc.decode_stream(contents).unwrap(), b"q Q");
    }
}
