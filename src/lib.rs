//! # edgequake-pptx2png
//!
//! Render PowerPoint decks to PNG images and flag slides whose content
//! overflows the canvas.
//!
//! ## Why this crate?
//!
//! A text box that runs past the slide edge looks fine in the editor and is
//! silently clipped everywhere else: in exports, in print, in screenshots fed
//! to other tools. Nothing in the file says "this overflows", and checking by
//! hand does not scale. This crate finds those slides mechanically: it
//! enlarges a private copy of the deck with a solid padding band, renders it,
//! and looks for anything that is not padding colour inside the band.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .pptx
//!  │
//!  ├─ 1. Input     validate path + ZIP magic
//!  ├─ 2. Deck      read canvas, slide order and shape trees (zip + quick-xml)
//!  ├─ 3. Geometry  dpi that fits the target box; pad px → EMU
//!  ├─ 4. Padding   enlarged copy: pad bands under the original content
//!  ├─ 5. Render    soffice → PDF → pdfium PNGs (spawn_blocking), re-ordered 1..N
//!  ├─ 6. Inspect   dpi-adaptive test of the four margins of every render
//!  └─ 7. Output    overflow report + the original deck rendered to PNG
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pptx2png::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().max_size(1600, 900).build()?;
//!     let output = convert("talk.pptx", "ppt-preview", &config).await?;
//!     if let Some(warning) = output.overflow.as_ref().and_then(|r| r.warning_text()) {
//!         eprintln!("{}", warning);
//!     }
//!     println!("{} slides at {} dpi", output.slide_paths.len(), output.dpi);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pptx2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pptx2png = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! The default [`LibreOfficeRasterizer`] needs `soffice` (LibreOffice) and a
//! pdfium shared library (`PDFIUM_LIB_PATH` or the system loader). Any other
//! renderer can be plugged in through [`ConversionConfigBuilder::rasterizer`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod deck;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PaddingSpec, ToleranceBreakpoints};
pub use convert::{check_overflow, convert, convert_from_bytes, convert_sync, inspect_deck};
pub use deck::{Deck, Package, Rect, Rgb, Shape, Slide};
pub use error::{Pptx2PngError, Stage};
pub use output::{ConversionOutput, ConversionStats, DeckMetadata, OverflowReport, SlideOverflow};
pub use pipeline::geometry::Side;
pub use pipeline::inspect::{MarginReport, ToleranceProfile};
pub use pipeline::render::{LibreOfficeRasterizer, Rasterizer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
