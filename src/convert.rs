//! Conversion entry points.
//!
//! ## Two passes over the deck
//!
//! [`convert`] renders the deck twice. The first pass renders an *enlarged*
//! copy (original canvas centred in a solid padding band) purely to find
//! slides whose content spills past the canvas; the second renders the
//! untouched original into the output directory. The original file is never
//! modified: the enlarged copy lives in a private work directory that is
//! deleted afterwards, unless overflow was found and its renders are needed
//! as evidence.
//!
//! Use [`check_overflow`] to run only the first pass.

use crate::config::ConversionConfig;
use crate::deck::{Deck, Package};
use crate::error::{Pptx2PngError, Stage};
use crate::output::{ConversionOutput, ConversionStats, DeckMetadata, OverflowReport, SlideOverflow};
use crate::pipeline::inspect::{self, ToleranceProfile};
use crate::pipeline::{geometry, input, pad, render};
use crate::pipeline::render::{LibreOfficeRasterizer, Rasterizer};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Check a deck for overflow, then render it to `output_dir`.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`     : path to a `.pptx` file
/// * `output_dir`: created if missing; receives `<prefix>-<n>.png`
/// * `config`    : conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` whenever every stage succeeded. Overflowing slides
/// are reported in `output.overflow`, they are not an error.
///
/// # Errors
/// Any stage failure is fatal; `err.stage()` names the stage.
pub async fn convert(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pptx2PngError> {
    let total_start = Instant::now();
    let output_dir = output_dir.as_ref();

    // ── Step 1: Load deck ────────────────────────────────────────────────
    let (deck_path, package, deck) = load(input.as_ref(), config).await?;
    let dpi = resolve_dpi(&deck, config);
    info!(
        "Deck {} has {} slides at {:.2}in x {:.2}in, rendering at {} dpi",
        deck_path.display(),
        deck.slide_count(),
        deck.width_inches(),
        deck.height_inches(),
        dpi
    );

    // ── Step 2: Overflow check ───────────────────────────────────────────
    let check_start = Instant::now();
    let overflow = if config.check_overflow {
        Some(detect_overflow(package, &deck, dpi, config).await?)
    } else {
        debug!("Overflow check disabled");
        None
    };
    let check_duration_ms = check_start.elapsed().as_millis() as u64;

    // ── Step 3: Render the original deck ─────────────────────────────────
    let render_start = Instant::now();
    notify_start(config, Stage::Rasterize);
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| Pptx2PngError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source,
        })?;
    let slide_paths = render::rasterize(
        rasterizer_for(config),
        &deck_path,
        output_dir,
        dpi,
        &config.file_prefix,
    )
    .await?;
    expect_pages(&deck, &slide_paths)?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    notify_complete(config, Stage::Rasterize, render_duration_ms);
    info!(
        "Rendered {} slides to {} in {}ms",
        slide_paths.len(),
        output_dir.display(),
        render_duration_ms
    );

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let overflowing_slides = overflow.as_ref().map_or(0, |r| r.overflowing.len());
    let stats = ConversionStats {
        total_slides: deck.slide_count(),
        overflowing_slides,
        check_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(stats.total_slides, overflowing_slides);
    }

    Ok(ConversionOutput {
        dpi,
        slide_paths,
        overflow,
        stats,
    })
}

/// Run only the overflow check; nothing is written outside the work
/// directory.
///
/// Runs regardless of `config.check_overflow`.
pub async fn check_overflow(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<OverflowReport, Pptx2PngError> {
    let (_, package, deck) = load(input.as_ref(), config).await?;
    let dpi = resolve_dpi(&deck, config);
    let report = detect_overflow(package, &deck, dpi, config).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(deck.slide_count(), report.overflowing.len());
    }
    Ok(report)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pptx2PngError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pptx2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, output_dir, config))
}

/// Convert `.pptx` bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed on return.
pub async fn convert_from_bytes(
    bytes: &[u8],
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pptx2PngError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("pptx2png-input-")
        .suffix(".pptx")
        .tempfile()
        .map_err(|source| Pptx2PngError::WorkDirFailed { source })?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|source| Pptx2PngError::OutputWriteFailed {
            path: tmp.path().to_path_buf(),
            source,
        })?;
    convert(tmp.path(), output_dir, config).await
}

/// Read canvas facts without rendering anything.
///
/// Does not need LibreOffice or pdfium.
pub async fn inspect_deck(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DeckMetadata, Pptx2PngError> {
    let (path, _, deck) = load(input.as_ref(), config).await?;
    let dpi = resolve_dpi(&deck, config);
    let (width_px, height_px) = geometry::rendered_size(deck.width, deck.height, dpi);
    Ok(DeckMetadata {
        path,
        slide_count: deck.slide_count(),
        width_emu: deck.width,
        height_emu: deck.height,
        width_in: deck.width_inches(),
        height_in: deck.height_inches(),
        dpi,
        width_px,
        height_px,
    })
}

// ── Stages ───────────────────────────────────────────────────────────────

/// Validate the input and parse it into a [`Deck`].
async fn load(
    input: &Path,
    config: &ConversionConfig,
) -> Result<(PathBuf, Package, Deck), Pptx2PngError> {
    notify_start(config, Stage::Input);
    let deck_path = input::resolve_input(input)?;
    notify_complete(config, Stage::Input, 0);

    let start = Instant::now();
    notify_start(config, Stage::Deck);
    let path = deck_path.clone();
    let (package, deck) = tokio::task::spawn_blocking(move || {
        let package = Package::open(&path)?;
        let deck = package.deck()?;
        Ok::<_, Pptx2PngError>((package, deck))
    })
    .await
    .map_err(|e| Pptx2PngError::Internal(format!("Deck task panicked: {}", e)))??;

    if deck.slides.is_empty() {
        return Err(Pptx2PngError::EmptyDeck { path: deck_path });
    }
    notify_complete(config, Stage::Deck, start.elapsed().as_millis() as u64);
    Ok((deck_path, package, deck))
}

fn resolve_dpi(deck: &Deck, config: &ConversionConfig) -> u32 {
    config.dpi.unwrap_or_else(|| {
        geometry::resolution_for_deck(deck, config.max_width_px, config.max_height_px)
    })
}

/// Pad, render and inspect a private copy of the deck.
async fn detect_overflow(
    package: Package,
    deck: &Deck,
    dpi: u32,
    config: &ConversionConfig,
) -> Result<OverflowReport, Pptx2PngError> {
    let pad_px = config.padding.width_px;
    let pad_emu = geometry::pixels_to_emu(pad_px, dpi);
    if pad_emu <= 0 {
        return Err(Pptx2PngError::InvalidPadding { pad_px, dpi });
    }

    // ── Work directory ───────────────────────────────────────────────────
    let mut builder = tempfile::Builder::new();
    builder.prefix("pptx2png-");
    let work = match &config.work_dir_parent {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    }
    .map_err(|source| Pptx2PngError::WorkDirFailed { source })?;
    debug!("Overflow work directory: {}", work.path().display());

    // ── Enlarge and save the padded copy ─────────────────────────────────
    let start = Instant::now();
    notify_start(config, Stage::Padding);
    let padded = pad::enlarge(deck, pad_emu, &config.padding)?;
    let ratios = padded.pad_ratios();
    let padded_path = work.path().join("padded.pptx");
    {
        let padded_deck = padded.deck.clone();
        let dest = padded_path.clone();
        tokio::task::spawn_blocking(move || package.with_deck(&padded_deck)?.save(&dest))
            .await
            .map_err(|e| Pptx2PngError::Internal(format!("Padding task panicked: {}", e)))??;
    }
    notify_complete(config, Stage::Padding, start.elapsed().as_millis() as u64);
    info!(
        "Padded deck by {}px ({} EMU) to {}x{} EMU",
        pad_px, pad_emu, padded.width, padded.height
    );

    // ── Render the padded copy ───────────────────────────────────────────
    let start = Instant::now();
    notify_start(config, Stage::Rasterize);
    let renders_dir = work.path().join("renders");
    tokio::fs::create_dir_all(&renders_dir)
        .await
        .map_err(|source| Pptx2PngError::OutputWriteFailed {
            path: renders_dir.clone(),
            source,
        })?;
    let pages = render::rasterize(
        rasterizer_for(config),
        &padded_path,
        &renders_dir,
        dpi,
        &config.file_prefix,
    )
    .await?;
    expect_pages(deck, &pages)?;
    notify_complete(config, Stage::Rasterize, start.elapsed().as_millis() as u64);

    // ── Inspect the padding band ─────────────────────────────────────────
    let start = Instant::now();
    notify_start(config, Stage::Inspect);
    let verdicts = inspect::inspect_images(
        &pages,
        ratios,
        dpi,
        &config.padding,
        &config.tolerance,
        config.concurrency,
        config.progress_callback.as_ref(),
    )
    .await?;
    notify_complete(config, Stage::Inspect, start.elapsed().as_millis() as u64);

    let overflowing: Vec<SlideOverflow> = verdicts
        .iter()
        .filter(|v| v.overflows())
        .map(|v| SlideOverflow {
            slide: v.slide,
            image_path: pages[v.slide - 1].clone(),
            margins: v.dirty_margins().copied().collect(),
        })
        .collect();

    let evidence_dir = if !overflowing.is_empty() || config.keep_work_dir {
        Some(work.keep())
    } else {
        None
    };

    if overflowing.is_empty() {
        info!("No overflow in {} slides", verdicts.len());
    } else {
        warn!(
            "{} of {} slides overflow their canvas",
            overflowing.len(),
            verdicts.len()
        );
    }

    Ok(OverflowReport {
        dpi,
        pad_px,
        pad_emu,
        tolerance: ToleranceProfile::for_dpi(dpi, &config.tolerance),
        slides_checked: verdicts.len(),
        overflowing,
        evidence_dir,
    })
}

fn rasterizer_for(config: &ConversionConfig) -> Arc<dyn Rasterizer> {
    match &config.rasterizer {
        Some(r) => Arc::clone(r),
        None => Arc::new(LibreOfficeRasterizer::from_config(config)),
    }
}

fn expect_pages(deck: &Deck, pages: &[PathBuf]) -> Result<(), Pptx2PngError> {
    if pages.len() != deck.slide_count() {
        return Err(Pptx2PngError::PageCountMismatch {
            expected: deck.slide_count(),
            actual: pages.len(),
        });
    }
    Ok(())
}

fn notify_start(config: &ConversionConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn notify_complete(config: &ConversionConfig, stage: Stage, elapsed_ms: u64) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, elapsed_ms);
    }
}
