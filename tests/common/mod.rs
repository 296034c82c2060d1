//! Shared fixtures for the integration tests: a minimal `.pptx` writer and an
//! in-process rasterizer that paints shape fills instead of calling
//! LibreOffice.

#![allow(dead_code)]

use edgequake_pptx2png::pipeline::geometry::{emu_to_pixels, rendered_size};
use edgequake_pptx2png::{Package, Pptx2PngError, Rasterizer, Rgb};
use image::RgbImage;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const EMU: i64 = 914_400;

/// Inches to EMU.
pub fn inch(v: f64) -> i64 {
    (v * EMU as f64).round() as i64
}

/// A filled rectangle, positions in inches.
#[derive(Debug, Clone, Copy)]
pub struct Boxed {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub color: Rgb,
}

pub fn boxed(x: f64, y: f64, w: f64, h: f64) -> Boxed {
    Boxed {
        x,
        y,
        w,
        h,
        color: Rgb(30, 60, 200),
    }
}

/// Build a `.pptx` with a `width_in × height_in` canvas and one slide per
/// entry of `slides`.
pub fn build_pptx(width_in: f64, height_in: f64, slides: &[Vec<Boxed>]) -> Vec<u8> {
    build_pptx_with_hidden(width_in, height_in, slides, &[])
}

/// Like [`build_pptx`], with the 1-based slides in `hidden` marked
/// `show="0"`.
pub fn build_pptx_with_hidden(
    width_in: f64,
    height_in: f64,
    slides: &[Vec<Boxed>],
    hidden: &[usize],
) -> Vec<u8> {
    let mut parts: Vec<(String, String)> = Vec::new();

    let mut overrides = String::new();
    let mut sld_ids = String::new();
    let mut rels = String::new();
    for (i, shapes) in slides.iter().enumerate() {
        let n = i + 1;
        overrides.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        ));
        sld_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{n}.xml"/>"#,
            n + 1
        ));
        parts.push((format!("ppt/slides/slide{n}.xml"), slide_xml(shapes, hidden.contains(&n))));
    }

    parts.push((
        "[Content_Types].xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>{overrides}</Types>"#
        ),
    ));
    parts.push((
        "_rels/.rels".into(),
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#
            .into(),
    ));
    parts.push((
        "ppt/presentation.xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldIdLst>{sld_ids}</p:sldIdLst><p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
            inch(width_in),
            inch(height_in)
        ),
    ));
    parts.push((
        "ppt/_rels/presentation.xml.rels".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        ),
    ));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        writer.start_file(name, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn slide_xml(shapes: &[Boxed], hidden: bool) -> String {
    let mut tree = String::new();
    for (i, b) in shapes.iter().enumerate() {
        let id = i + 2;
        tree.push_str(&format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Box {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:solidFill><a:srgbClr val="{}"/></a:solidFill></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US"/><a:t>Box {id}</a:t></a:r></a:p></p:txBody></p:sp>"#,
            inch(b.x),
            inch(b.y),
            inch(b.w),
            inch(b.h),
            b.color.hex()
        ));
    }
    let show = if hidden { r#" show="0""# } else { "" };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"{show}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{tree}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

/// Write a deck into `dir` and return its path.
pub fn write_pptx(dir: &Path, name: &str, width_in: f64, height_in: f64, slides: &[Vec<Boxed>]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_pptx(width_in, height_in, slides)).unwrap();
    path
}

/// Renders a deck by painting every filled, framed shape in z-order onto a
/// white canvas. Output files use their own naming scheme and are returned
/// in reverse order, like a renderer that finishes pages out of order.
#[derive(Default)]
pub struct PaintRasterizer {
    pub calls: AtomicUsize,
}

impl Rasterizer for PaintRasterizer {
    fn render_pages(
        &self,
        deck_path: &Path,
        out_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, Pptx2PngError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let deck = Package::open(deck_path)?.deck()?;
        let (width, height) = rendered_size(deck.width, deck.height, dpi);

        let mut paths = Vec::new();
        for (i, slide) in deck.slides.iter().enumerate() {
            let mut img = RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
            for shape in &slide.shapes {
                let (Some(frame), Some(fill)) = (shape.frame, shape.fill) else {
                    continue;
                };
                let x0 = emu_to_pixels(frame.left, dpi).min(width);
                let y0 = emu_to_pixels(frame.top, dpi).min(height);
                let x1 = emu_to_pixels(frame.right(), dpi).min(width);
                let y1 = emu_to_pixels(frame.bottom(), dpi).min(height);
                for y in y0..y1 {
                    for x in x0..x1 {
                        img.put_pixel(x, y, image::Rgb(fill.channels()));
                    }
                }
            }
            let path = out_dir.join(format!("render_{:03}.png", i + 1));
            img.save(&path)
                .map_err(|e| Pptx2PngError::RasterisationFailed {
                    page: i + 1,
                    detail: e.to_string(),
                })?;
            paths.push(path);
        }
        paths.reverse();
        Ok(paths)
    }
}

/// Always fails like a LibreOffice that cannot open the file.
pub struct FailingRasterizer;

impl Rasterizer for FailingRasterizer {
    fn render_pages(&self, _: &Path, _: &Path, _: u32) -> Result<Vec<PathBuf>, Pptx2PngError> {
        Err(Pptx2PngError::RendererFailed {
            program: PathBuf::from("soffice"),
            code: Some(1),
            stderr: "Error: source file could not be loaded".into(),
        })
    }
}

/// Drops the last page.
pub struct ShortRasterizer;

impl Rasterizer for ShortRasterizer {
    fn render_pages(&self, deck: &Path, out: &Path, dpi: u32) -> Result<Vec<PathBuf>, Pptx2PngError> {
        let mut pages = PaintRasterizer::default().render_pages(deck, out, dpi)?;
        // Reverse order: the first entry is the last page.
        pages.remove(0);
        Ok(pages)
    }
}
