//! Error types for the edgequake-pptx2png library.
//!
//! Every failure in this crate is **fatal**: the pipeline either produces a
//! complete [`crate::output::ConversionOutput`] or nothing at all. A slide that
//! overflows its canvas is *not* an error; it is reported through
//! [`crate::output::OverflowReport`] and the run still completes.
//!
//! Each variant belongs to exactly one pipeline [`Stage`] so the CLI can tell
//! the user *where* things went wrong (bad input file vs. a broken LibreOffice
//! install vs. an unreadable render) without parsing the message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage a failure (or a progress event) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Builder validation.
    Config,
    /// Locating and sniffing the input file.
    Input,
    /// Reading or writing the `.pptx` package.
    Deck,
    /// Enlarging the deck with the padding band.
    Padding,
    /// External render pipeline (LibreOffice → PDF → PNG) and page ordering.
    Rasterize,
    /// Margin inspection of the padded renders.
    Inspect,
    /// Writing final artefacts.
    Output,
    /// Task-level failures not tied to a single stage.
    Internal,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "configuration",
            Stage::Input => "input",
            Stage::Deck => "deck",
            Stage::Padding => "padding",
            Stage::Rasterize => "rasterize",
            Stage::Inspect => "inspect",
            Stage::Output => "output",
            Stage::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// All fatal errors returned by the edgequake-pptx2png library.
#[derive(Debug, Error)]
pub enum Pptx2PngError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Deck file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a ZIP-based Office package.
    #[error("File is not a valid .pptx package: '{path}'\nFirst bytes: {magic:?}")]
    NotAPptx { path: PathBuf, magic: [u8; 4] },

    // ── Deck errors ───────────────────────────────────────────────────────
    /// The ZIP container could not be read or written.
    #[error("Deck '{path}' is corrupt: {detail}")]
    CorruptDeck { path: PathBuf, detail: String },

    /// A part the deck needs (presentation, slide, relationship) is missing.
    #[error("Deck is missing required part '{part}'")]
    MissingPart { part: String },

    /// A part exists but its XML could not be parsed.
    #[error("Invalid XML in part '{part}': {detail}")]
    InvalidXml { part: String, detail: String },

    /// The deck has no slides; there is nothing to render or check.
    #[error("Deck '{path}' contains no slides")]
    EmptyDeck { path: PathBuf },

    /// The declared slide size is missing or not positive.
    #[error("Invalid slide canvas {width}x{height} EMU")]
    InvalidCanvas { width: i64, height: i64 },

    // ── Padding errors ────────────────────────────────────────────────────
    /// The padding band collapsed to zero width at the chosen resolution.
    #[error("Padding of {pad_px}px at {dpi} dpi is narrower than one EMU")]
    InvalidPadding { pad_px: u32, dpi: u32 },

    // ── Render pipeline errors ────────────────────────────────────────────
    /// The document renderer executable could not be started.
    #[error(
        "Could not start document renderer '{program}': {source}\n\
Install LibreOffice or point --soffice / PPTX2PNG_SOFFICE at the soffice binary."
    )]
    RendererNotFound {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document renderer exited unsuccessfully.
    #[error("Document renderer '{program}' failed (exit code {code:?}): {stderr}")]
    RendererFailed {
        program: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// An intermediate artefact the next stage depends on was not produced.
    #[error("Expected {what} at '{path}' but it was not produced")]
    MissingArtifact { what: String, path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or --pdfium-lib) to use an existing copy,\n\
or install pdfium so the system loader can find it."
    )]
    PdfiumBindingFailed(String),

    /// pdfium-render returned an error for a specific page (0 = whole document).
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Rasterizer output files could not be put into a gap-free 1..N order.
    #[error("Could not order rendered pages: {detail}")]
    PageOrderingFailed { detail: String },

    /// The rasterizer produced a different number of images than the deck has slides.
    #[error("Rasterizer produced {actual} images for a deck of {expected} slides")]
    PageCountMismatch { expected: usize, actual: usize },

    // ── Inspection errors ─────────────────────────────────────────────────
    /// A rendered page image could not be decoded.
    #[error("Failed to load rendered image '{path}': {detail}")]
    ImageLoadFailed { path: PathBuf, detail: String },

    /// A rendered page image has unusable dimensions.
    #[error("Rendered image for slide {slide} has unusable size {width}x{height}")]
    InconsistentImageSize {
        slide: usize,
        width: u32,
        height: u32,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the private working directory.
    #[error("Failed to create working directory: {source}")]
    WorkDirFailed {
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file or directory.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pptx2PngError {
    /// The pipeline stage this error aborted.
    pub fn stage(&self) -> Stage {
        match self {
            Pptx2PngError::FileNotFound { .. }
            | Pptx2PngError::PermissionDenied { .. }
            | Pptx2PngError::NotAPptx { .. } => Stage::Input,

            Pptx2PngError::CorruptDeck { .. }
            | Pptx2PngError::MissingPart { .. }
            | Pptx2PngError::InvalidXml { .. }
            | Pptx2PngError::EmptyDeck { .. }
            | Pptx2PngError::InvalidCanvas { .. } => Stage::Deck,

            Pptx2PngError::RendererNotFound { .. }
            | Pptx2PngError::RendererFailed { .. }
            | Pptx2PngError::MissingArtifact { .. }
            | Pptx2PngError::PdfiumBindingFailed(_)
            | Pptx2PngError::RasterisationFailed { .. }
            | Pptx2PngError::PageOrderingFailed { .. }
            | Pptx2PngError::PageCountMismatch { .. } => Stage::Rasterize,

            Pptx2PngError::ImageLoadFailed { .. }
            | Pptx2PngError::InconsistentImageSize { .. } => Stage::Inspect,

            Pptx2PngError::WorkDirFailed { .. } | Pptx2PngError::OutputWriteFailed { .. } => {
                Stage::Output
            }

            Pptx2PngError::InvalidPadding { .. } => Stage::Padding,
            Pptx2PngError::InvalidConfig(_) => Stage::Config,
            Pptx2PngError::Internal(_) => Stage::Internal,
        }
    }

    pub(crate) fn xml(part: impl Into<String>, detail: impl fmt::Display) -> Self {
        Pptx2PngError::InvalidXml {
            part: part.into(),
            detail: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_failed_display() {
        let e = Pptx2PngError::RendererFailed {
            program: PathBuf::from("soffice"),
            code: Some(77),
            stderr: "source file could not be loaded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("soffice"), "got: {msg}");
        assert!(msg.contains("77"), "got: {msg}");
        assert_eq!(e.stage(), Stage::Rasterize);
    }

    #[test]
    fn page_count_mismatch_display() {
        let e = Pptx2PngError::PageCountMismatch {
            expected: 4,
            actual: 3,
        };
        assert!(e.to_string().contains("3 images"));
        assert!(e.to_string().contains("4 slides"));
    }

    #[test]
    fn input_errors_map_to_input_stage() {
        let e = Pptx2PngError::NotAPptx {
            path: PathBuf::from("deck.pdf"),
            magic: *b"%PDF",
        };
        assert_eq!(e.stage(), Stage::Input);
        assert_eq!(e.stage().to_string(), "input");
    }

    #[test]
    fn invalid_xml_helper() {
        let e = Pptx2PngError::xml("ppt/slides/slide3.xml", "unexpected EOF");
        assert_eq!(e.stage(), Stage::Deck);
        assert!(e.to_string().contains("slide3.xml"));
        assert!(e.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn empty_deck_is_deck_stage() {
        let e = Pptx2PngError::EmptyDeck {
            path: PathBuf::from("empty.pptx"),
        };
        assert_eq!(e.stage(), Stage::Deck);
    }
}
