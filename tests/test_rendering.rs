//! Integration tests for page rendering.
//!
//! Pages are assembled in memory, parsed and rendered at 72 DPI so that one
//! user-space unit is one pixel and device row `y` is user `height - y`.

use bytes::Bytes;
use pdf_raster::document::Document;
use pdf_raster::geometry::Rect;
use pdf_raster::object::{Dict, Object};
use pdf_raster::page::Page;
use pdf_raster::rendering::{
    ImageFormat, PageRenderer, RenderContext, RenderDevice, RenderFlags, RenderOptions, render_page,
};
use tiny_skia::Pixmap;

fn name(s: &str) -> Object {
    Object::Name(s.to_string())
}

fn dict(entries: Vec<(&str, Object)>) -> Dict {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn numbers(values: &[f64]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
}

fn stream(entries: Vec<(&str, Object)>, data: &[u8]) -> Object {
    Object::Stream {
        dict: dict(entries),
        data: Bytes::copy_from_slice(data),
    }
}

fn render_with(doc: &Document, index: usize, options: RenderOptions) -> Pixmap {
    let mut page = Page::new(doc, index).expect("page");
    page.parse_content(doc);
    PageRenderer::new(options).render_pixmap(doc, &page).expect("render")
}

fn render(size: f32, resources: Dict, content: &[u8]) -> Pixmap {
    let mut doc = Document::new();
    let index = doc.add_page(Rect::new(0.0, 0.0, size, size), resources, content);
    render_with(&doc, index, RenderOptions::with_dpi(72))
}

fn rgba(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
    let c = pixmap.pixel(x, y).expect("pixel in range").demultiply();
    [c.red(), c.green(), c.blue(), c.alpha()]
}

fn near(actual: u8, expected: u8) -> bool {
    (actual as i32 - expected as i32).abs() <= 2
}

mod page_rendering {
    use super::*;

    #[test]
    fn test_red_rectangle_end_to_end() {
        let pixmap = render(200.0, Dict::new(), b"1 0 0 rg 10 10 100 100 re f");
        assert_eq!((pixmap.width(), pixmap.height()), (200, 200));
        // Inside: user (50, 50) is device row 150
        assert_eq!(rgba(&pixmap, 50, 150), [255, 0, 0, 255]);
        // Outside stays white
        assert_eq!(rgba(&pixmap, 150, 20), [255, 255, 255, 255]);
        assert_eq!(rgba(&pixmap, 5, 195), [255, 255, 255, 255]);
    }

    #[test]
    fn test_transparent_background() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 20.0, 20.0), Dict::new(), b"");
        let pixmap = render_with(&doc, index, RenderOptions::with_dpi(72).with_transparent_background());
        assert_eq!(rgba(&pixmap, 10, 10)[3], 0);
    }

    #[test]
    fn test_dpi_scales_output() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 72.0, 36.0), Dict::new(), b"");
        let image = render_page(&doc, index, &RenderOptions::with_dpi(144)).expect("render");
        assert_eq!((image.width, image.height), (144, 72));
        assert_eq!(image.format, ImageFormat::Png);
    }

    #[test]
    fn test_stroked_round_dot() {
        let pixmap = render(40.0, Dict::new(), b"1 J 10 w 20 20 m h S");
        assert_eq!(rgba(&pixmap, 20, 20), [0, 0, 0, 255]);
        assert_eq!(rgba(&pixmap, 20, 10), [255, 255, 255, 255]);

        let pixmap = render(40.0, Dict::new(), b"0 J 10 w 20 20 m h S");
        assert_eq!(rgba(&pixmap, 20, 20), [255, 255, 255, 255]);
    }

    #[test]
    fn test_thin_line_flag() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 40.0, 40.0), Dict::new(), b"20 w 0 20 m 40 20 l S");
        let wide = render_with(&doc, index, RenderOptions::with_dpi(72));
        let thin = render_with(&doc, index, RenderOptions::with_dpi(72).with_flags(RenderFlags::THIN_LINE));
        assert_eq!(rgba(&wide, 20, 12), [0, 0, 0, 255]);
        assert_eq!(rgba(&thin, 20, 12), [255, 255, 255, 255]);
    }

    #[test]
    fn test_gray_mode() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 20.0, 20.0), Dict::new(), b"0 1 0 rg 0 0 20 20 re f");
        let pixmap = render_with(&doc, index, RenderOptions::with_dpi(72).as_gray());
        let [r, g, b, _] = rgba(&pixmap, 10, 10);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(near(r, 150));
    }
}

mod clipping {
    use super::*;

    #[test]
    fn test_clip_limits_fill() {
        let pixmap = render(100.0, Dict::new(), b"0 0 50 50 re W n 1 0 0 rg 0 0 100 100 re f");
        assert_eq!(rgba(&pixmap, 25, 75), [255, 0, 0, 255]);
        assert_eq!(rgba(&pixmap, 75, 75), [255, 255, 255, 255]);
        assert_eq!(rgba(&pixmap, 25, 25), [255, 255, 255, 255]);
    }

    #[test]
    fn test_clip_diffing_applies_shared_clip_once() {
        let mut doc = Document::new();
        let index = doc.add_page(
            Rect::new(0.0, 0.0, 60.0, 60.0),
            Dict::new(),
            b"0 0 30 30 re W n 1 0 0 rg 0 0 60 60 re f 0 0 1 rg 10 10 5 5 re f",
        );
        let mut page = Page::new(&doc, index).expect("page");
        page.parse_content(&doc);
        let mut device = RenderDevice::new(60, 60).expect("device");
        let mut context = RenderContext::new(&doc, page.resources().clone());
        context.append_layer(page.holder(), page.display_matrix(1.0));
        context.render(&mut device, &RenderOptions::default(), None);
        assert_eq!(device.clip_op_count(), 1);

        let pixmap = device.into_pixmap();
        assert_eq!(rgba(&pixmap, 12, 47), [0, 0, 255, 255]);
        assert_eq!(rgba(&pixmap, 25, 35), [255, 0, 0, 255]);
        assert_eq!(rgba(&pixmap, 45, 15)[3], 0);
    }

    #[test]
    fn test_restore_drops_clip() {
        let pixmap = render(
            100.0,
            Dict::new(),
            b"q 0 0 10 10 re W n Q 0 0 1 rg 50 50 20 20 re f",
        );
        assert_eq!(rgba(&pixmap, 60, 40), [0, 0, 255, 255]);
    }
}

mod transparency {
    use super::*;

    fn group_form(content: &[u8]) -> Object {
        stream(
            vec![
                ("Subtype", name("Form")),
                ("BBox", numbers(&[0.0, 0.0, 100.0, 100.0])),
                ("Group", Object::Dictionary(dict(vec![("S", name("Transparency"))]))),
            ],
            content,
        )
    }

    #[test]
    fn test_fill_alpha() {
        let resources = dict(vec![(
            "ExtGState",
            Object::Dictionary(dict(vec![("GS1", Object::Dictionary(dict(vec![("ca", Object::Real(0.5))])))])),
        )]);
        let pixmap = render(20.0, resources, b"/GS1 gs 1 0 0 rg 0 0 20 20 re f");
        let [r, g, b, a] = rgba(&pixmap, 10, 10);
        assert_eq!((r, a), (255, 255));
        assert!(near(g, 128) && near(b, 128), "got {:?}", (g, b));
    }

    #[test]
    fn test_group_alpha_not_applied_twice() {
        let resources = dict(vec![
            (
                "ExtGState",
                Object::Dictionary(dict(vec![("GS1", Object::Dictionary(dict(vec![("ca", Object::Real(0.5))])))])),
            ),
            (
                "XObject",
                Object::Dictionary(dict(vec![("Fm1", group_form(b"1 0 0 rg 0 0 100 100 re f"))])),
            ),
        ]);
        let pixmap = render(100.0, resources, b"/GS1 gs /Fm1 Do");
        let [r, g, b, _] = rgba(&pixmap, 50, 50);
        assert_eq!(r, 255);
        // 0.5 over white, not 0.25
        assert!(near(g, 128) && near(b, 128), "got {:?}", (g, b));
    }

    #[test]
    fn test_multiply_blend() {
        let resources = dict(vec![(
            "ExtGState",
            Object::Dictionary(dict(vec![("GS1", Object::Dictionary(dict(vec![("BM", name("Multiply"))])))])),
        )]);
        let pixmap = render(
            20.0,
            resources,
            b"1 1 0 rg 0 0 20 20 re f /GS1 gs 0 1 1 rg 0 0 20 20 re f",
        );
        assert_eq!(rgba(&pixmap, 10, 10), [0, 255, 0, 255]);
    }

    #[test]
    fn test_luminosity_soft_mask() {
        // Mask form paints white on the left half only.
        let mask_form = stream(
            vec![
                ("Subtype", name("Form")),
                ("BBox", numbers(&[0.0, 0.0, 40.0, 40.0])),
                ("Group", Object::Dictionary(dict(vec![("S", name("Transparency"))]))),
            ],
            b"1 g 0 0 20 40 re f",
        );
        let smask = dict(vec![("S", name("Luminosity")), ("G", mask_form)]);
        let resources = dict(vec![(
            "ExtGState",
            Object::Dictionary(dict(vec![(
                "GS1",
                Object::Dictionary(dict(vec![("SMask", Object::Dictionary(smask))])),
            )])),
        )]);
        let pixmap = render(40.0, resources, b"/GS1 gs 0 0 1 rg 0 0 40 40 re f");
        assert_eq!(rgba(&pixmap, 10, 20), [0, 0, 255, 255]);
        assert_eq!(rgba(&pixmap, 30, 20), [255, 255, 255, 255]);
    }
}

mod patterns_and_shadings {
    use super::*;

    fn axial_shading() -> Object {
        let function = dict(vec![
            ("FunctionType", Object::Integer(2)),
            ("Domain", numbers(&[0.0, 1.0])),
            ("C0", numbers(&[0.0])),
            ("C1", numbers(&[1.0])),
            ("N", Object::Integer(1)),
        ]);
        Object::Dictionary(dict(vec![
            ("ShadingType", Object::Integer(2)),
            ("ColorSpace", name("DeviceGray")),
            ("Coords", numbers(&[0.0, 0.0, 100.0, 0.0])),
            ("Function", Object::Dictionary(function)),
        ]))
    }

    #[test]
    fn test_sh_operator_gradient() {
        let resources = dict(vec![("Shading", Object::Dictionary(dict(vec![("Sh1", axial_shading())])))]);
        let pixmap = render(100.0, resources, b"/Sh1 sh");
        let left = rgba(&pixmap, 2, 50)[0];
        let middle = rgba(&pixmap, 50, 50)[0];
        let right = rgba(&pixmap, 97, 50)[0];
        assert!(left < middle && middle < right);
        assert!(near(middle, 128));
    }

    #[test]
    fn test_shading_pattern_fill() {
        let pattern = dict(vec![
            ("PatternType", Object::Integer(2)),
            ("Shading", axial_shading()),
        ]);
        let resources = dict(vec![("Pattern", Object::Dictionary(dict(vec![("P1", Object::Dictionary(pattern))])))]);
        let pixmap = render(100.0, resources, b"/Pattern cs /P1 scn 0 0 50 100 re f");
        assert!(near(rgba(&pixmap, 25, 50)[0], 64));
        assert_eq!(rgba(&pixmap, 75, 50), [255, 255, 255, 255]);
    }

    #[test]
    fn test_colored_tiling_pattern() {
        let pattern = stream(
            vec![
                ("PatternType", Object::Integer(1)),
                ("PaintType", Object::Integer(1)),
                ("TilingType", Object::Integer(1)),
                ("BBox", numbers(&[0.0, 0.0, 10.0, 10.0])),
                ("XStep", Object::Integer(10)),
                ("YStep", Object::Integer(10)),
                ("Resources", Object::Dictionary(Dict::new())),
            ],
            b"1 0 0 rg 0 0 5 5 re f",
        );
        let resources = dict(vec![("Pattern", Object::Dictionary(dict(vec![("P1", pattern)])))]);
        let pixmap = render(40.0, resources, b"/Pattern cs /P1 scn 0 0 40 40 re f");
        // Cells repeat every 10 units; the red quarter is the lower left of each.
        assert_eq!(rgba(&pixmap, 2, 37), [255, 0, 0, 255]);
        assert_eq!(rgba(&pixmap, 12, 37), [255, 0, 0, 255]);
        assert_eq!(rgba(&pixmap, 7, 37), [255, 255, 255, 255]);
    }

    #[test]
    fn test_uncolored_tiling_pattern_takes_tint() {
        let pattern = stream(
            vec![
                ("PatternType", Object::Integer(1)),
                ("PaintType", Object::Integer(2)),
                ("TilingType", Object::Integer(1)),
                ("BBox", numbers(&[0.0, 0.0, 10.0, 10.0])),
                ("XStep", Object::Integer(10)),
                ("YStep", Object::Integer(10)),
                ("Resources", Object::Dictionary(Dict::new())),
            ],
            b"0 0 10 10 re f",
        );
        let resources = dict(vec![
            ("Pattern", Object::Dictionary(dict(vec![("P1", pattern)]))),
            (
                "ColorSpace",
                Object::Dictionary(dict(vec![("CS0", Object::Array(vec![name("Pattern"), name("DeviceRGB")]))])),
            ),
        ]);
        let pixmap = render(20.0, resources, b"/CS0 cs 0 0 1 /P1 scn 0 0 20 20 re f");
        assert_eq!(rgba(&pixmap, 10, 10), [0, 0, 255, 255]);
    }
}

mod images {
    use super::*;

    /// Nearest-neighbour sampling keeps the two-pixel images crisp.
    fn render_sharp(resources: Dict, content: &[u8]) -> Pixmap {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 20.0, 20.0), resources, content);
        render_with(&doc, index, RenderOptions::with_dpi(72).with_flags(RenderFlags::NO_IMAGE_SMOOTH))
    }

    #[test]
    fn test_image_xobject() {
        let image = stream(
            vec![
                ("Subtype", name("Image")),
                ("Width", Object::Integer(2)),
                ("Height", Object::Integer(1)),
                ("ColorSpace", name("DeviceRGB")),
                ("BitsPerComponent", Object::Integer(8)),
            ],
            &[255, 0, 0, 0, 0, 255],
        );
        let resources = dict(vec![("XObject", Object::Dictionary(dict(vec![("Im1", image)])))]);
        let pixmap = render_sharp(resources, b"q 20 0 0 20 0 0 cm /Im1 Do Q");
        assert_eq!(rgba(&pixmap, 3, 10), [255, 0, 0, 255]);
        assert_eq!(rgba(&pixmap, 17, 10), [0, 0, 255, 255]);
    }

    #[test]
    fn test_inline_stencil_mask_uses_fill_color() {
        let pixmap = render_sharp(
            Dict::new(),
            b"0 1 0 rg q 20 0 0 20 0 0 cm BI /W 2 /H 1 /IM true /BPC 1 ID \x40 EI Q",
        );
        // Sample 0 paints: the left pixel of 0b01.. is painted, the right is not
        assert_eq!(rgba(&pixmap, 3, 10), [0, 255, 0, 255]);
        assert_eq!(rgba(&pixmap, 17, 10), [255, 255, 255, 255]);
    }
}

mod output {
    use super::*;

    #[test]
    fn test_save_png_to_file() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 30.0, 30.0), Dict::new(), b"1 0 0 rg 0 0 30 30 re f");
        let image = render_page(&doc, index, &RenderOptions::with_dpi(72)).expect("render");

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("page.png");
        image.save(&path).expect("save");
        let written = std::fs::read(&path).expect("read back");
        assert_eq!(written, image.data);

        let decoded = image::load_from_memory(&written).expect("valid png").to_rgba8();
        assert_eq!(decoded.dimensions(), (30, 30));
        assert_eq!(decoded.get_pixel(15, 15).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_jpeg_output() {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 16.0, 16.0), Dict::new(), b"");
        let image = render_page(&doc, index, &RenderOptions::with_dpi(72).as_jpeg(90)).expect("render");
        assert_eq!(image.format, ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&image.data).expect("valid jpeg").to_rgb8();
        let px = decoded.get_pixel(8, 8).0;
        assert!(px.iter().all(|&c| c > 250));
    }
}
