//! Render PDF pages to images, or dump their page objects as JSON.
//!
//! Usage:
//!   pdf-raster input.pdf
//!   pdf-raster input.pdf --dpi 300 --pages 1,3 --output-dir out
//!   pdf-raster input.pdf --jpeg 85 --gray
//!   pdf-raster input.pdf --json
//!
//! Set `RUST_LOG=debug` for interpreter and compositor diagnostics.

use pdf_raster::document::Document;
use pdf_raster::page::Page;
use pdf_raster::rendering::{OptionalContent, PageRenderer, RenderFlags, RenderOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

struct RasterConfig {
    input: Option<PathBuf>,
    output_dir: PathBuf,
    pages: Option<Vec<usize>>,
    dpi: u32,
    jpeg_quality: Option<u8>,
    gray: bool,
    transparent: bool,
    thin_lines: bool,
    json: bool,
    verbose: bool,
}

impl RasterConfig {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut config = Self {
            input: None,
            output_dir: PathBuf::from("."),
            pages: None,
            dpi: 150,
            jpeg_quality: None,
            gray: false,
            transparent: false,
            thin_lines: false,
            json: false,
            verbose: false,
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--output-dir" | "-o" => {
                    i += 1;
                    if i < args.len() {
                        config.output_dir = PathBuf::from(&args[i]);
                    }
                },
                "--dpi" => {
                    i += 1;
                    if let Some(dpi) = args.get(i).and_then(|s| s.parse().ok()) {
                        config.dpi = dpi;
                    }
                },
                "--pages" => {
                    i += 1;
                    if let Some(list) = args.get(i) {
                        // One-based on the command line.
                        let pages = list
                            .split(',')
                            .filter_map(|p| p.trim().parse::<usize>().ok())
                            .filter(|&p| p > 0)
                            .map(|p| p - 1)
                            .collect();
                        config.pages = Some(pages);
                    }
                },
                "--jpeg" => {
                    i += 1;
                    config.jpeg_quality = Some(args.get(i).and_then(|s| s.parse().ok()).unwrap_or(85));
                },
                "--gray" => config.gray = true,
                "--transparent" => config.transparent = true,
                "--thin-lines" => config.thin_lines = true,
                "--json" => config.json = true,
                "--verbose" | "-v" => config.verbose = true,
                arg if !arg.starts_with('-') && config.input.is_none() => {
                    config.input = Some(PathBuf::from(arg));
                },
                other => eprintln!("Ignoring unknown argument: {}", other),
            }
            i += 1;
        }
        config
    }

    fn render_options(&self, doc: &Document) -> RenderOptions {
        let mut options = RenderOptions::with_dpi(self.dpi);
        options.optional_content = OptionalContent::from_document(doc);
        if let Some(quality) = self.jpeg_quality {
            options = options.as_jpeg(quality);
        }
        if self.gray {
            options = options.as_gray();
        }
        if self.transparent {
            options = options.with_transparent_background();
        }
        if self.thin_lines {
            options = options.with_flags(RenderFlags::THIN_LINE);
        }
        options
    }
}

fn dump_json(doc: &Document, pages: &[usize]) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = Vec::new();
    for &index in pages {
        let mut page = Page::new(doc, index)?;
        page.parse_content(doc);
        let objects: Vec<_> = page.objects().iter().map(|o| o.summary()).collect();
        out.push(serde_json::json!({
            "page": index + 1,
            "media_box": page.media_box(),
            "crop_box": page.crop_box(),
            "rotate": page.rotate(),
            "objects": objects,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn render_pages(
    doc: &Document,
    pages: &[usize],
    config: &RasterConfig,
    stem: &str,
) -> Result<usize, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.output_dir)?;
    let renderer = PageRenderer::new(config.render_options(doc));
    let extension = if config.jpeg_quality.is_some() { "jpg" } else { "png" };

    let mut rendered = 0;
    for &index in pages {
        let start = Instant::now();
        let mut page = match Page::new(doc, index) {
            Ok(page) => page,
            Err(e) => {
                eprintln!("Page {}: {}", index + 1, e);
                continue;
            },
        };
        page.parse_content(doc);
        let image = renderer.render(doc, &page)?;
        let output = config
            .output_dir
            .join(format!("{}-{}.{}", stem, index + 1, extension));
        image.save(&output)?;
        rendered += 1;
        if config.verbose {
            println!(
                "Page {}: {} objects, {}x{} in {:.1} ms -> {}",
                index + 1,
                page.objects().len(),
                image.width,
                image.height,
                start.elapsed().as_secs_f64() * 1000.0,
                output.display()
            );
        }
    }
    Ok(rendered)
}

fn run(config: &RasterConfig, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let doc = Document::open(input)?;
    let pages: Vec<usize> = match &config.pages {
        Some(pages) => pages.iter().copied().filter(|&p| p < doc.page_count()).collect(),
        None => (0..doc.page_count()).collect(),
    };
    log::info!("{}: {} pages, rendering {}", input.display(), doc.page_count(), pages.len());

    if config.json {
        return dump_json(&doc, &pages);
    }
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("page");
    let rendered = render_pages(&doc, &pages, config, stem)?;
    println!("Rendered {} page(s) to {}", rendered, config.output_dir.display());
    Ok(())
}

fn main() {
    env_logger::init();
    let config = RasterConfig::from_args();
    let Some(input) = config.input.clone() else {
        eprintln!("Usage: pdf-raster <file.pdf> [--dpi N] [--pages 1,2] [--output-dir DIR] [--jpeg Q] [--gray] [--transparent] [--thin-lines] [--json] [-v]");
        std::process::exit(2);
    };
    if let Err(e) = run(&config, &input) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
