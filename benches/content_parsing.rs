use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdf_raster::document::Document;
use pdf_raster::geometry::Rect;
use pdf_raster::object::Dict;
use pdf_raster::page::Page;
use pdf_raster::rendering::{PageRenderer, RenderOptions};

/// A page of `count` small colored rectangles, strokes and text runs.
fn generate_content(count: usize) -> Vec<u8> {
    let mut content = Vec::with_capacity(count * 64);
    for i in 0..count {
        let x = (i % 50) as f32 * 11.0;
        let y = (i / 50) as f32 * 11.0;
        let shade = (i % 10) as f32 / 10.0;
        content.extend_from_slice(
            format!(
                "q {shade} 0.2 0.6 rg {x} {y} 10 10 re f 0.5 w {x} {y} m {} {} l S Q\n",
                x + 10.0,
                y + 10.0
            )
            .as_bytes(),
        );
        if i % 25 == 0 {
            content.extend_from_slice(format!("BT /F1 8 Tf {x} {y} Td (Item {i}) Tj ET\n").as_bytes());
        }
    }
    content
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_content");
    for count in [100usize, 1000, 5000] {
        let mut doc = Document::new();
        let index = doc.add_page(Rect::new(0.0, 0.0, 612.0, 792.0), Dict::new(), &generate_content(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut page = Page::new(&doc, index).expect("page");
                page.parse_content(&doc);
                black_box(page.objects().len())
            })
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut doc = Document::new();
    let index = doc.add_page(Rect::new(0.0, 0.0, 612.0, 792.0), Dict::new(), &generate_content(1000));
    let mut page = Page::new(&doc, index).expect("page");
    page.parse_content(&doc);

    let mut group = c.benchmark_group("render_page");
    for dpi in [72u32, 150] {
        let renderer = PageRenderer::new(RenderOptions::with_dpi(dpi));
        group.bench_with_input(BenchmarkId::from_parameter(dpi), &dpi, |b, _| {
            b.iter(|| black_box(renderer.render_pixmap(&doc, &page).expect("render").width()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_render);
criterion_main!(benches);
