//! Deck rasterisation: `.pptx` → PDF (LibreOffice) → PNG pages (pdfium).
//!
//! ## Why a trait?
//!
//! Both external tools are heavyweight, platform-specific installs. Putting
//! them behind [`Rasterizer`] keeps the rest of the pipeline testable with an
//! in-process fake, and lets callers plug in another renderer through
//! [`crate::ConversionConfig::rasterizer`].
//!
//! ## Why re-order the output?
//!
//! Renderers name their pages however they like (`slide-1.png`,
//! `page_001.png`, …) and directory listings come back in arbitrary order.
//! The core never trusts either: [`order_page_images`] parses the trailing
//! page number of every file, insists on a gap-free `1..=N` sequence, and
//! renames the files to a canonical `<prefix>-<n>.png`.
//!
//! ## Why spawn_blocking?
//!
//! Spawning `soffice` and driving pdfium are blocking, CPU-heavy operations.
//! `tokio::task::spawn_blocking` moves them onto the blocking pool so the
//! Tokio worker threads never stall.

use crate::config::ConversionConfig;
use crate::error::Pptx2PngError;
use image::ImageFormat;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info};

/// Renders every slide of a deck to an image file.
pub trait Rasterizer: Send + Sync {
    /// Render `deck_path` at `dpi` into `out_dir`.
    ///
    /// Returns one image path per slide, in any order. Each file stem must
    /// end with the slide's 1-based number.
    fn render_pages(
        &self,
        deck_path: &Path,
        out_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, Pptx2PngError>;
}

// ── LibreOffice + pdfium ─────────────────────────────────────────────────

/// `--convert-to` target. Impress drops `show="0"` slides from PDF exports
/// unless told otherwise, which would leave the page count short of the
/// slide count.
pub const PDF_EXPORT_TARGET: &str =
    r#"pdf:impress_pdf_Export:{"ExportHiddenSlides":{"type":"boolean","value":"true"}}"#;

/// The default rasterizer: headless LibreOffice exports a PDF, pdfium renders
/// its pages.
#[derive(Debug, Clone)]
pub struct LibreOfficeRasterizer {
    soffice: PathBuf,
    pdfium_lib_path: Option<PathBuf>,
    file_prefix: String,
}

impl LibreOfficeRasterizer {
    pub fn new(soffice: impl Into<PathBuf>) -> Self {
        Self {
            soffice: soffice.into(),
            pdfium_lib_path: None,
            file_prefix: "page".to_string(),
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            soffice: config.soffice_path.clone(),
            pdfium_lib_path: config.pdfium_lib_path.clone(),
            file_prefix: config.file_prefix.clone(),
        }
    }

    /// Run `soffice --headless --convert-to pdf`, hidden slides included,
    /// and return the PDF path.
    fn export_pdf(&self, deck_path: &Path, work_dir: &Path) -> Result<PathBuf, Pptx2PngError> {
        // A private profile lets several conversions run side by side and
        // keeps the user's LibreOffice settings out of the render.
        let profile = work_dir.join("lo-profile");
        let profile = std::path::absolute(&profile).unwrap_or(profile);

        let mut cmd = Command::new(&self.soffice);
        cmd.arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .args(["--headless", "--convert-to", PDF_EXPORT_TARGET, "--outdir"])
            .arg(work_dir)
            .arg(deck_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Running {:?}", cmd);
        let output = cmd.output().map_err(|source| Pptx2PngError::RendererNotFound {
            program: self.soffice.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(Pptx2PngError::RendererFailed {
                program: self.soffice.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stem = deck_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deck".to_string());
        let pdf = work_dir.join(format!("{}.pdf", stem));
        if !pdf.is_file() {
            return Err(Pptx2PngError::MissingArtifact {
                what: "PDF export".to_string(),
                path: pdf,
            });
        }
        Ok(pdf)
    }

    /// Render every PDF page at `dpi` into `<prefix>-<n>.png`.
    fn rasterize_pdf(
        &self,
        pdf: &Path,
        out_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, Pptx2PngError> {
        let pdfium = bind_pdfium(self.pdfium_lib_path.as_deref())?;
        let document = pdfium
            .load_pdf_from_file(pdf, None)
            .map_err(|e| Pptx2PngError::RasterisationFailed {
                page: 0,
                detail: format!("{:?}", e),
            })?;

        // PDF user space is 72 units per inch.
        let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

        let pages = document.pages();
        info!("PDF export has {} pages", pages.len());

        let mut paths = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let number = idx + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                Pptx2PngError::RasterisationFailed {
                    page: number,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image().to_rgb8();
            let path = out_dir.join(format!("{}-{}.png", self.file_prefix, number));
            image
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| Pptx2PngError::RasterisationFailed {
                    page: number,
                    detail: format!("writing {}: {}", path.display(), e),
                })?;

            debug!(
                "Rendered page {} → {}x{} px",
                number,
                image.width(),
                image.height()
            );
            paths.push(path);
        }
        Ok(paths)
    }
}

impl Rasterizer for LibreOfficeRasterizer {
    fn render_pages(
        &self,
        deck_path: &Path,
        out_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, Pptx2PngError> {
        let scratch = tempfile::Builder::new()
            .prefix("pptx2png-soffice-")
            .tempdir()
            .map_err(|source| Pptx2PngError::WorkDirFailed { source })?;

        let pdf = self.export_pdf(deck_path, scratch.path())?;
        info!("Exported {} → {}", deck_path.display(), pdf.display());
        self.rasterize_pdf(&pdf, out_dir, dpi)
    }
}

/// Bind to pdfium: an explicit library (file or directory), then
/// `PDFIUM_LIB_PATH`, then whatever the system loader finds.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, Pptx2PngError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            let library = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(&library).map_err(|e| {
                Pptx2PngError::PdfiumBindingFailed(format!("{}: {}", library.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| Pptx2PngError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

// ── Page ordering ────────────────────────────────────────────────────────

static TRAILING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)$").expect("static regex"));

/// The 1-based page number at the end of a file stem (`slide-12.png` → 12).
pub fn page_number(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    TRAILING_NUMBER
        .captures(stem)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Put rasterizer output into deterministic order and canonical names.
///
/// Every path must carry a page number; the numbers must form exactly
/// `1..=N`. Files are moved to `out_dir/<prefix>-<n>.png` and returned in
/// page order.
pub fn order_page_images(
    paths: Vec<PathBuf>,
    out_dir: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>, Pptx2PngError> {
    let mut numbered = Vec::with_capacity(paths.len());
    for path in paths {
        let number = page_number(&path).ok_or_else(|| Pptx2PngError::PageOrderingFailed {
            detail: format!("no page number in '{}'", path.display()),
        })?;
        numbered.push((number, path));
    }
    numbered.sort_by_key(|(n, _)| *n);

    for (expected, (number, path)) in (1..).zip(&numbered) {
        if *number != expected {
            let detail = if *number < expected {
                format!("page {} appears more than once ('{}')", number, path.display())
            } else {
                format!("page {} is missing (next file is '{}')", expected, path.display())
            };
            return Err(Pptx2PngError::PageOrderingFailed { detail });
        }
    }

    let mut ordered = Vec::with_capacity(numbered.len());
    for (number, path) in numbered {
        let target = out_dir.join(format!("{}-{}.png", prefix, number));
        if path != target {
            move_file(&path, &target)?;
        }
        ordered.push(target);
    }
    debug!("Ordered {} rendered pages", ordered.len());
    Ok(ordered)
}

fn move_file(from: &Path, to: &Path) -> Result<(), Pptx2PngError> {
    let write_err = |source| Pptx2PngError::OutputWriteFailed {
        path: to.to_path_buf(),
        source,
    };
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device: fall back to copy + delete.
    std::fs::copy(from, to).map_err(write_err)?;
    std::fs::remove_file(from).map_err(write_err)
}

/// Run `rasterizer` on the blocking pool and order its output.
pub async fn rasterize(
    rasterizer: Arc<dyn Rasterizer>,
    deck_path: &Path,
    out_dir: &Path,
    dpi: u32,
    prefix: &str,
) -> Result<Vec<PathBuf>, Pptx2PngError> {
    let deck = deck_path.to_path_buf();
    let out = out_dir.to_path_buf();
    let prefix = prefix.to_string();

    tokio::task::spawn_blocking(move || {
        let pages = rasterizer.render_pages(&deck, &out, dpi)?;
        order_page_images(pages, &out, &prefix)
    })
    .await
    .map_err(|e| Pptx2PngError::Internal(format!("Render task panicked: {}", e)))?
}
