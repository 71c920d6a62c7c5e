//! XObjects (`Do`), inline images (`BI`) and shading fills (`sh`).

use super::ContentInterpreter;
use crate::content::color::ColorSpace;
use crate::content::form::Form;
use crate::content::graphics_state::AllStates;
use crate::content::image::Image;
use crate::content::inline_image::expand_dict;
use crate::content::mesh::mesh_bounds;
use crate::content::page_object::{FormObject, ImageObject, PageObjectKind, ShadingObject};
use crate::content::stream_reader::{ElementType, StreamReader};
use crate::document::Document;
use crate::geometry::Rect;
use crate::object::{Dict, Object};
use std::rc::Rc;

/// Device color spaces an inline image may name without a resource.
const INLINE_DEVICE_SPACES: [&str; 3] = ["DeviceRGB", "DeviceGray", "DeviceCMYK"];

impl ContentInterpreter {
    pub(super) fn handle_execute_xobject(&mut self, doc: &Document) {
        let name = self.operands.string(0);
        if let Some((last_name, image)) = &self.last_image {
            if *last_name == name {
                let image = image.clone();
                self.add_image(image, Some(name));
                return;
            }
        }

        let Some(obj) = self
            .find_resource(doc, "XObject", &name)
            .filter(|obj| doc.resolve(obj).as_stream().is_some())
        else {
            log::debug!("XObject {} not found", name);
            self.resource_missing = true;
            return;
        };
        let subtype = doc
            .resolve(&obj)
            .as_stream()
            .and_then(|(dict, _)| doc.dict_get(dict, "Subtype").as_name())
            .map(str::to_string);
        match subtype.as_deref() {
            Some("Form") => self.add_form(doc, &obj, name),
            Some("Image") => {
                let Some(image) = Image::load(doc, &obj) else {
                    log::debug!("Image {} could not be loaded", name);
                    return;
                };
                if obj.as_reference().is_some() {
                    self.last_image = Some((name.clone(), image.clone()));
                }
                self.add_image(image, Some(name));
            },
            other => log::debug!("Ignoring XObject {} of subtype {:?}", name, other),
        }
    }

    fn add_form(&mut self, doc: &Document, obj: &Object, name: String) {
        let states = AllStates::inherit(self.states.current());
        let Some(mut form) = Form::new(doc, obj, Some(&self.resources), &self.page_resources) else {
            return;
        };
        let mut recursion = std::mem::take(&mut self.recursion);
        form.parse(doc, Some(&states), None, &mut recursion);
        self.recursion = recursion;

        let matrix = self.object_matrix();
        let rect = matrix.transform_rect(&form.holder().calc_bounding_box());
        if form.holder().background_alpha_needed {
            self.background_alpha_needed = true;
        }
        let kind = PageObjectKind::Form(FormObject {
            form: Rc::new(form),
            matrix,
        });
        let mut obj = self.new_object(kind, true, true, true);
        obj.rect = rect;
        obj.resource_name = Some(name);
        self.append_object(Rc::new(obj));
    }

    fn add_image(&mut self, image: Rc<Image>, name: Option<String>) {
        let matrix = self.object_matrix();
        let is_mask = image.is_mask;
        let kind = PageObjectKind::Image(ImageObject { image, matrix });
        let mut obj = self.new_object(kind, is_mask, false, false);
        let unit = Rect::new(0.0, 0.0, 1.0, 1.0);
        obj.original_rect = unit;
        obj.rect = matrix.transform_rect(&unit);
        obj.resource_name = name;
        if is_mask {
            self.image_mask_boxes.push(obj.rect);
        }
        self.append_object(Rc::new(obj));
    }

    /// `BI`: read the inline dictionary and data up to `EI`.
    pub(super) fn handle_begin_image(&mut self, doc: &Document, reader: &mut StreamReader<'_>) {
        let saved = reader.position();
        let mut dict = Dict::new();
        loop {
            match reader.parse_next_element() {
                ElementType::Keyword => {
                    if reader.word() != b"ID" {
                        reader.set_position(saved);
                        return;
                    }
                    break;
                },
                ElementType::Name => {
                    let key = reader.name();
                    match reader.read_next_object(false, false, 0) {
                        Some(value) => {
                            dict.insert(key, value);
                        },
                        None => break,
                    }
                },
                _ => break,
            }
        }
        expand_dict(&mut dict);

        if let Some(space_name) = dict.get("ColorSpace").and_then(Object::as_name).map(str::to_string) {
            if !INLINE_DEVICE_SPACES.contains(&space_name.as_str()) {
                if let Some(space) = self.find_resource(doc, "ColorSpace", &space_name) {
                    dict.insert("ColorSpace".to_string(), doc.resolve(&space).clone());
                }
            }
        }
        let is_mask = dict.get("ImageMask").and_then(Object::as_bool).unwrap_or(false);
        let components = if is_mask {
            1
        } else {
            dict.get("ColorSpace")
                .and_then(|cs| ColorSpace::load(doc, cs))
                .map_or(1, |cs| cs.components() as u32)
        };
        dict.insert("Subtype".to_string(), Object::Name("Image".to_string()));
        let stream = reader.read_inline_stream(dict, components);

        loop {
            match reader.parse_next_element() {
                ElementType::EndOfData => break,
                ElementType::Keyword if reader.word() == b"EI" => break,
                _ => {},
            }
        }

        let Some(stream) = stream else {
            return;
        };
        match Image::from_stream(doc, stream, true) {
            Some(image) => self.add_image(Rc::new(image), None),
            None => log::debug!("Skipping unreadable inline image"),
        }
    }

    pub(super) fn handle_shade_fill(&mut self, doc: &Document) {
        let name = self.operands.string(0);
        let Some(shading) = self.find_shading(doc, &name) else {
            return;
        };
        let matrix = self.object_matrix();
        let kind = PageObjectKind::Shading(ShadingObject {
            shading: shading.clone(),
            matrix,
        });
        let mut obj = self.new_object(kind, false, false, false);
        let mut bbox = obj.clip.clip_box().unwrap_or(self.bbox);
        if shading.shading_type.is_mesh() {
            if let Some(mesh) = mesh_bounds(&shading, &matrix) {
                bbox = bbox.intersect(&mesh);
            }
        }
        obj.rect = bbox;
        obj.resource_name = Some(name);
        self.append_object(Rc::new(obj));
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::run_with;
    use crate::content::page_object::PageObjectKind;
    use crate::document::Document;
    use crate::geometry::Rect;
    use crate::object::{Dict, Object};

    fn xobjects(entries: Vec<(&str, Object)>) -> Dict {
        let mut inner = Dict::new();
        for (name, value) in entries {
            inner.insert(name.to_string(), value);
        }
        let mut res = Dict::new();
        res.insert("XObject".to_string(), Object::Dictionary(inner));
        res
    }

    fn stream(entries: Vec<(&str, Object)>, data: &[u8]) -> Object {
        let mut dict = Dict::new();
        for (key, value) in entries {
            dict.insert(key.to_string(), value);
        }
        Object::Stream {
            dict,
            data: bytes::Bytes::copy_from_slice(data),
        }
    }

    fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    fn bbox() -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(10),
            Object::Integer(10),
        ])
    }

    #[test]
    fn test_image_xobject() {
        let mut doc = Document::new();
        let image = stream(
            vec![
                ("Subtype", name("Image")),
                ("Width", Object::Integer(2)),
                ("Height", Object::Integer(2)),
                ("ColorSpace", name("DeviceGray")),
                ("BitsPerComponent", Object::Integer(8)),
            ],
            &[0, 255, 255, 0],
        );
        let image_ref = doc.add(image);
        let res = xobjects(vec![("Im1", Object::Reference(image_ref))]);
        let output = run_with(&doc, res, b"q 50 0 0 20 10 10 cm /Im1 Do /Im1 Do Q /Im2 Do");
        assert_eq!(output.objects.len(), 2);
        assert_eq!(output.objects[0].rect, Rect::new(10.0, 10.0, 60.0, 30.0));
        assert_eq!(output.objects[0].resource_name.as_deref(), Some("Im1"));
        let (a, b) = match (&output.objects[0].kind, &output.objects[1].kind) {
            (PageObjectKind::Image(a), PageObjectKind::Image(b)) => (a, b),
            _ => panic!("expected images"),
        };
        assert!(std::rc::Rc::ptr_eq(&a.image, &b.image));
        assert!(output.resource_missing);
    }

    #[test]
    fn test_form_xobject() {
        let doc = Document::new();
        let form = stream(
            vec![("Subtype", name("Form")), ("BBox", bbox())],
            b"0 0 m 10 10 l S",
        );
        let res = xobjects(vec![("Fm1", form)]);
        let output = run_with(&doc, res, b"2 0 0 2 0 0 cm /Fm1 Do");
        assert_eq!(output.objects.len(), 1);
        let obj = &output.objects[0];
        let form = obj.as_form().expect("form");
        assert_eq!(form.form.holder().len(), 1);
        assert_eq!(obj.rect, Rect::new(-1.0, -1.0, 21.0, 21.0));
    }

    #[test]
    fn test_self_referencing_form_terminates() {
        let mut doc = Document::new();
        let form_ref = doc.add(Object::Null);
        let res = xobjects(vec![("Fm1", Object::Reference(form_ref))]);
        let mut form_dict = Dict::new();
        form_dict.insert("Subtype".to_string(), name("Form"));
        form_dict.insert("BBox".to_string(), bbox());
        form_dict.insert("Resources".to_string(), Object::Dictionary(res.clone()));
        doc.insert(
            form_ref,
            Object::Stream {
                dict: form_dict,
                data: bytes::Bytes::from_static(b"0 0 5 5 re f /Fm1 Do"),
            },
        );
        let output = run_with(&doc, res, b"/Fm1 Do");
        assert_eq!(output.objects.len(), 1);
        let outer = output.objects[0].as_form().expect("form");
        // The nested reference to itself parses as an empty form
        assert_eq!(outer.form.holder().len(), 2);
        let inner = outer.form.holder().objects[1].as_form().expect("nested form");
        assert!(inner.form.holder().is_empty());
    }

    #[test]
    fn test_inline_image() {
        let doc = Document::new();
        let output = run_with(
            &doc,
            Dict::new(),
            b"q 20 0 0 20 0 0 cm BI /W 2 /H 1 /CS /G /BPC 8 ID \x00\xff EI Q 0 0 1 1 re f",
        );
        assert_eq!(output.objects.len(), 2);
        let image = output.objects[0].as_image().expect("image");
        assert!(image.image.is_inline);
        assert_eq!(image.image.width, 2);
        assert_eq!(output.objects[0].rect, Rect::new(0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn test_inline_mask_box() {
        let doc = Document::new();
        let output = run_with(&doc, Dict::new(), b"BI /W 8 /H 1 /IM true ID \xaa EI");
        assert_eq!(output.image_mask_boxes, vec![Rect::new(0.0, 0.0, 1.0, 1.0)]);
    }

    #[test]
    fn test_shading_bounded_by_clip() {
        let mut shading = Dict::new();
        shading.insert("ShadingType".to_string(), Object::Integer(2));
        shading.insert("ColorSpace".to_string(), name("DeviceGray"));
        shading.insert(
            "Coords".to_string(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Integer(0),
            ]),
        );
        let mut function = Dict::new();
        function.insert("FunctionType".to_string(), Object::Integer(2));
        function.insert("Domain".to_string(), Object::Array(vec![Object::Integer(0), Object::Integer(1)]));
        function.insert("N".to_string(), Object::Integer(1));
        shading.insert("Function".to_string(), Object::Dictionary(function));
        let mut inner = Dict::new();
        inner.insert("Sh1".to_string(), Object::Dictionary(shading));
        let mut res = Dict::new();
        res.insert("Shading".to_string(), Object::Dictionary(inner));

        let doc = Document::new();
        let output = run_with(&doc, res, b"/Sh1 sh 0 0 50 50 re W n /Sh1 sh");
        assert_eq!(output.objects.len(), 2);
        assert_eq!(output.objects[0].rect, Rect::new(0.0, 0.0, 200.0, 200.0));
        assert_eq!(output.objects[1].rect, Rect::new(0.0, 0.0, 50.0, 50.0));
    }
}
