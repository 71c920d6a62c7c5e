//! Integration tests for content stream interpretation.

use bytes::Bytes;
use pdf_raster::content::graphics_state::BlendMode;
use pdf_raster::content::inline_image::expand_dict;
use pdf_raster::content::page_object::PageObjectKind;
use pdf_raster::content::path::PointKind;
use pdf_raster::content::{PageObject, TextRenderMode};
use pdf_raster::document::Document;
use pdf_raster::geometry::{Matrix, Point, Rect};
use pdf_raster::object::{Dict, Object};
use pdf_raster::page::Page;
use std::rc::Rc;

fn parse_page(doc: &Document, index: usize) -> Vec<Rc<PageObject>> {
    let mut page = Page::new(doc, index).expect("page");
    page.parse_content(doc);
    page.objects().to_vec()
}

fn parse(content: &[u8]) -> Vec<Rc<PageObject>> {
    let mut doc = Document::new();
    let index = doc.add_page(Rect::new(0.0, 0.0, 200.0, 200.0), Dict::new(), content);
    parse_page(&doc, index)
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

mod graphics_state {
    use super::*;

    #[test]
    fn test_cm_concatenation_order() {
        // Rotate by 90 degrees, then scale: the scale acts first on user coordinates.
        let objects = parse(b"0 1 -1 0 0 0 cm 2 0 0 3 0 0 cm 0 0 m 1 0 l S");
        let matrix = objects[0].as_path().expect("path").matrix;
        assert_eq!(matrix, Matrix::new(0.0, 2.0, -3.0, 0.0, 0.0, 0.0));
        let p = matrix.transform_point(1.0, 0.0);
        assert!(close(p.x, 0.0) && close(p.y, 2.0));

        let objects = parse(b"2 0 0 3 0 0 cm 0 1 -1 0 0 0 cm 0 0 m 1 0 l S");
        let matrix = objects[0].as_path().expect("path").matrix;
        let p = matrix.transform_point(1.0, 0.0);
        assert!(close(p.x, 0.0) && close(p.y, 3.0));
    }

    #[test]
    fn test_restore_underflow_keeps_state() {
        let objects = parse(b"q 1 0 0 rg Q Q Q 0.5 g 0 0 1 1 re f");
        assert_eq!(objects.len(), 1);
        let rgb = objects[0].color.fill_rgb().expect("fill");
        assert_eq!(rgb.to_bytes(), [128, 128, 128]);
    }

    #[test]
    fn test_save_restore_scopes_line_width() {
        let objects = parse(b"q 4 w 0 0 m 1 1 l S Q 0 0 m 1 1 l S");
        assert_eq!(objects[0].graph.line_width, 4.0);
        assert_eq!(objects[1].graph.line_width, 1.0);
    }

    #[test]
    fn test_ext_gstate_from_resources() {
        let mut gs = Dict::new();
        gs.insert("LW".to_string(), Object::Integer(7));
        gs.insert("CA".to_string(), Object::Real(0.25));
        gs.insert("BM".to_string(), Object::Name("Screen".to_string()));
        let mut states = Dict::new();
        states.insert("GS0".to_string(), Object::Dictionary(gs));
        let mut resources = Dict::new();
        resources.insert("ExtGState".to_string(), Object::Dictionary(states));

        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 100.0, 100.0), resources, b"/GS0 gs 0 0 m 9 9 l S");
        let objects = parse_page(&doc, index);
        let obj = &objects[0];
        assert_eq!(obj.graph.line_width, 7.0);
        assert_eq!(obj.general.stroke_alpha, 0.25);
        assert_eq!(obj.general.blend_mode, BlendMode::Screen);
    }
}

mod paths {
    use super::*;

    #[test]
    fn test_round_cap_dot_survives() {
        let objects = parse(b"1 J 20 20 m h S");
        assert_eq!(objects.len(), 1);
        let path = &objects[0].as_path().expect("path").path;
        assert_eq!(path.points()[1].kind, PointKind::Line);
        assert_eq!(path.points()[1].point, Point::new(20.0, 20.0));
    }

    #[test]
    fn test_butt_cap_dot_dropped() {
        assert!(parse(b"0 J 20 20 m h S").is_empty());
    }

    #[test]
    fn test_rectangle_bounding_box() {
        let objects = parse(b"2 0 0 2 0 0 cm 5 5 10 20 re f");
        assert_eq!(objects[0].rect, Rect::new(10.0, 10.0, 30.0, 50.0));
    }

    #[test]
    fn test_stroke_box_includes_width() {
        let objects = parse(b"4 w 10 10 m 20 10 l S");
        let rect = objects[0].rect;
        assert!(rect.bottom <= 8.0 && rect.top >= 12.0);
    }

    #[test]
    fn test_clip_shared_by_following_objects() {
        let objects = parse(b"0 0 50 50 re W n 0 0 10 10 re f 20 20 10 10 re f");
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].clip.clip_box(), objects[1].clip.clip_box());
        assert_eq!(objects[0].clip.clip_box(), Some(Rect::new(0.0, 0.0, 50.0, 50.0)));
    }
}

mod text {
    use super::*;

    #[test]
    fn test_tj_array_splits_with_kerning() {
        // Stock glyphs are 600 units wide; at size 10 each advances 6.
        let objects = parse(b"BT /F1 10 Tf [-100 (AB) 50 (CD)] TJ ET");
        assert_eq!(objects.len(), 1);
        let text = objects[0].as_text().expect("text");
        assert!(close(text.matrix.e, 1.0), "leading kerning moves the start: {}", text.matrix.e);
        let xs: Vec<f32> = text.items.iter().map(|item| item.origin.x).collect();
        assert_eq!(xs.len(), 4);
        assert!(close(xs[0], 0.0));
        assert!(close(xs[1], 6.0));
        assert!(close(xs[2], 11.5));
        assert!(close(xs[3], 17.5));
        assert_eq!(text.char_codes(), vec![b'A' as u32, b'B' as u32, b'C' as u32, b'D' as u32]);
    }

    #[test]
    fn test_text_follows_previous_advance() {
        let objects = parse(b"BT /F1 10 Tf 5 5 Td (AB) Tj (C) Tj ET");
        let second = objects[1].as_text().expect("text");
        assert!(close(second.matrix.e, 17.0));
        assert!(close(second.matrix.f, 5.0));
    }

    #[test]
    fn test_render_mode_recorded() {
        let objects = parse(b"BT /F1 10 Tf 1 Tr (A) Tj 3 Tr (B) Tj ET");
        assert_eq!(objects[0].text.render_mode, TextRenderMode::Stroke);
        assert_eq!(objects[1].text.render_mode, TextRenderMode::Invisible);
    }

    #[test]
    fn test_clip_text_reaches_following_objects() {
        let objects = parse(b"BT /F1 10 Tf 7 Tr (A) Tj ET 0 0 5 5 re f");
        assert_eq!(objects.len(), 2);
        let clip = &objects[1].clip;
        assert_eq!(clip.text_count(), 2);
        let clip_text = clip.text(0).expect("clip text").as_text().expect("text");
        assert_eq!(clip_text.char_codes(), vec![b'A' as u32]);
        assert!(clip.text(1).is_none());
    }
}

mod xobjects {
    use super::*;

    fn form_stream(resources: Dict, content: &'static [u8]) -> Object {
        let mut dict = Dict::new();
        dict.insert("Subtype".to_string(), Object::Name("Form".to_string()));
        dict.insert(
            "BBox".to_string(),
            Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(50), Object::Integer(50)]),
        );
        dict.insert("Resources".to_string(), Object::Dictionary(resources));
        Object::Stream {
            dict,
            data: Bytes::from_static(content),
        }
    }

    #[test]
    fn test_self_referencing_form_terminates() {
        let mut doc = Document::new();
        let form_ref = doc.add(Object::Null);
        let mut xobjects = Dict::new();
        xobjects.insert("Fm1".to_string(), Object::Reference(form_ref));
        let mut resources = Dict::new();
        resources.insert("XObject".to_string(), Object::Dictionary(xobjects));
        doc.insert(form_ref, form_stream(resources.clone(), b"0 0 5 5 re f /Fm1 Do"));

        let index = doc.add_page(Rect::new(0.0, 0.0, 100.0, 100.0), resources, b"/Fm1 Do");
        let objects = parse_page(&doc, index);
        assert_eq!(objects.len(), 1);
        let PageObjectKind::Form(form) = &objects[0].kind else {
            panic!("expected a form object");
        };
        assert!(form.form.holder().len() <= 2);
    }

    #[test]
    fn test_form_matrix_applied() {
        let mut xobjects = Dict::new();
        let mut form = form_stream(Dict::new(), b"0 0 10 10 re f");
        if let Object::Stream { dict, .. } = &mut form {
            dict.insert(
                "Matrix".to_string(),
                Object::Array([1, 0, 0, 1, 30, 40].into_iter().map(Object::Integer).collect()),
            );
        }
        xobjects.insert("Fm1".to_string(), form);
        let mut resources = Dict::new();
        resources.insert("XObject".to_string(), Object::Dictionary(xobjects));

        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 100.0, 100.0), resources, b"/Fm1 Do");
        let objects = parse_page(&doc, index);
        let form = objects[0].as_form().expect("form");
        let inner = &form.form.holder().objects[0];
        assert_eq!(inner.rect, Rect::new(30.0, 40.0, 40.0, 50.0));
    }

    #[test]
    fn test_missing_xobject_is_skipped() {
        let objects = parse(b"/Nope Do 0 0 1 1 re f");
        assert_eq!(objects.len(), 1);
        assert!(objects[0].as_path().is_some());
    }
}

mod inline_images {
    use super::*;

    #[test]
    fn test_abbreviations_expand() {
        let mut dict = Dict::new();
        dict.insert("BPC".to_string(), Object::Integer(8));
        dict.insert("CS".to_string(), Object::Name("RGB".to_string()));
        dict.insert("F".to_string(), Object::Name("DCT".to_string()));
        expand_dict(&mut dict);
        assert_eq!(dict.get("BitsPerComponent"), Some(&Object::Integer(8)));
        assert_eq!(dict.get("ColorSpace"), Some(&Object::Name("DeviceRGB".to_string())));
        assert_eq!(dict.get("Filter"), Some(&Object::Name("DCTDecode".to_string())));
        assert!(dict.get("BPC").is_none());
    }

    #[test]
    fn test_filter_arrays_expand() {
        let mut dict = Dict::new();
        dict.insert(
            "F".to_string(),
            Object::Array(vec![Object::Name("AHx".to_string()), Object::Name("Fl".to_string())]),
        );
        expand_dict(&mut dict);
        assert_eq!(
            dict.get("Filter"),
            Some(&Object::Array(vec![
                Object::Name("ASCIIHexDecode".to_string()),
                Object::Name("FlateDecode".to_string())
            ]))
        );
    }

    #[test]
    fn test_inline_image_becomes_image_object() {
        let objects = parse(b"q 10 0 0 10 5 5 cm BI /W 2 /H 2 /CS /G /BPC 8 ID \x00\x40\x80\xff EI Q");
        assert_eq!(objects.len(), 1);
        let image = objects[0].as_image().expect("image");
        assert_eq!((image.image.width, image.image.height), (2, 2));
        assert_eq!(objects[0].rect, Rect::new(5.0, 5.0, 15.0, 15.0));
    }
}

mod incremental {
    use super::*;

    #[test]
    fn test_continue_parse_in_steps() {
        let mut doc = Document::new();
        let content = b"0 0 1 1 re f 2 2 1 1 re f 4 4 1 1 re f 6 6 1 1 re f";
        let index = doc.add_page(Rect::new(0.0, 0.0, 10.0, 10.0), Dict::new(), content);
        let mut page = Page::new(&doc, index).expect("page");
        page.start_parse(&doc);
        let mut rounds = 0;
        while !page.continue_parse(&doc, 1) {
            rounds += 1;
            assert!(rounds < 100);
        }
        assert!(page.is_parsed());
        assert_eq!(page.objects().len(), 4);
    }
}
