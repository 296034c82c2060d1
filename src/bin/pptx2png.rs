//! CLI binary for edgequake-pptx2png.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pptx2png::{
    check_overflow, convert, inspect_deck, ConversionConfig, ConversionProgressCallback,
    OverflowReport, ProgressCallback, Rgb, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner naming the running stage, switching to a bar
/// while the padded renders are inspected.
struct CliProgressCallback {
    bar: ProgressBar,
    bar_active: AtomicBool,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening deck…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            bar_active: AtomicBool::new(false),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        if self.bar_active.swap(true, Ordering::SeqCst) {
            return;
        }
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Checking");
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Input => "Checking input…",
        Stage::Deck => "Reading deck…",
        Stage::Padding => "Padding slides…",
        Stage::Rasterize => "Rendering (LibreOffice + pdfium)…",
        Stage::Inspect => "Inspecting margins…",
        Stage::Config | Stage::Output | Stage::Internal => "Working…",
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if !self.bar_active.load(Ordering::SeqCst) {
            self.bar.set_prefix("Working");
        }
        self.bar.set_message(stage_label(stage));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        if matches!(stage, Stage::Rasterize | Stage::Inspect | Stage::Padding) {
            self.bar.println(format!(
                "  {} {:<10} {}",
                green("✓"),
                stage.to_string(),
                dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
            ));
        }
    }

    fn on_slide_checked(&self, slide: usize, total: usize, overflowing: bool) {
        self.activate_bar(total);
        if overflowing {
            self.bar.println(format!(
                "  {} Slide {:>3}/{:<3}  {}",
                yellow("⚠"),
                slide,
                total,
                yellow("content overflows the canvas"),
            ));
        }
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_slides: usize, overflowing_slides: usize) {
        self.bar.finish_and_clear();
        if overflowing_slides == 0 {
            eprintln!(
                "{} {} slides checked, no overflow",
                green("✔"),
                bold(&total_slides.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides overflow",
                yellow("⚠"),
                bold(&overflowing_slides.to_string()),
                total_slides
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render to ./ppt-preview, checking for overflow first
  pptx2png talk.pptx

  # Custom target box and output directory
  pptx2png talk.pptx -o out --width 1920 --height 1080

  # Only check for overflow, keep the padded renders for inspection
  pptx2png --check-only --keep-work-dir talk.pptx

  # Canvas size and resolution, no rendering
  pptx2png --inspect-only talk.pptx

  # Machine-readable report
  pptx2png --json talk.pptx > report.json

HOW THE OVERFLOW CHECK WORKS:
  A copy of the deck is enlarged by a solid band (default 100 px of
  #C8C8C8) on every side, rendered, and each band is compared against the
  band colour. Anything else inside the band is content drawn past the
  original slide edge. The original deck is never modified.

ENVIRONMENT VARIABLES:
  PPTX2PNG_SOFFICE   LibreOffice executable (default: soffice on PATH)
  PDFIUM_LIB_PATH    pdfium shared library (file or directory)
  RUST_LOG           Override the log filter (e.g. edgequake_pptx2png=trace)
"#;

/// Render PowerPoint decks to PNG and flag slides that overflow their canvas.
#[derive(Parser, Debug)]
#[command(
    name = "pptx2png",
    version,
    about = "Render PowerPoint decks to PNG and flag slides that overflow their canvas",
    long_about = "Render every slide of a .pptx deck to PNG images sized to fit a target box. \
Before rendering, slides whose content extends past the slide canvas are detected and \
reported together with padded renders that show the overflow.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the .pptx deck.
    input: PathBuf,

    /// Directory receiving slide-1.png, slide-2.png, …
    #[arg(short, long, env = "PPTX2PNG_OUTPUT", default_value = "ppt-preview")]
    output: PathBuf,

    /// Maximum image width in pixels.
    #[arg(long, env = "PPTX2PNG_WIDTH", default_value_t = 1600,
          value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Maximum image height in pixels.
    #[arg(long, env = "PPTX2PNG_HEIGHT", default_value_t = 900,
          value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Fixed rendering DPI (overrides the value derived from --width/--height).
    #[arg(long, env = "PPTX2PNG_DPI",
          value_parser = clap::value_parser!(u32).range(1..=1200))]
    dpi: Option<u32>,

    /// Width of the overflow padding band in pixels.
    #[arg(long, env = "PPTX2PNG_PAD_PX", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..))]
    pad_px: u32,

    /// Padding band colour as RRGGBB.
    #[arg(long, env = "PPTX2PNG_PAD_COLOR", default_value = "C8C8C8", value_parser = parse_color)]
    pad_color: Rgb,

    /// Skip the overflow check and only render.
    #[arg(long, conflicts_with = "check_only")]
    no_overflow_check: bool,

    /// Run the overflow check without rendering the deck to the output directory.
    #[arg(long)]
    check_only: bool,

    /// Keep the work directory (padded deck and renders) even without overflow.
    #[arg(long, env = "PPTX2PNG_KEEP_WORK_DIR")]
    keep_work_dir: bool,

    /// LibreOffice executable.
    #[arg(long, env = "PPTX2PNG_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// pdfium shared library (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Number of padded renders inspected concurrently.
    #[arg(short, long, env = "PPTX2PNG_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Output structured JSON instead of text.
    #[arg(long, env = "PPTX2PNG_JSON")]
    json: bool,

    /// Print canvas size and resolution only, no rendering.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PPTX2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PPTX2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and overflow warnings.
    #[arg(short, long, env = "PPTX2PNG_QUIET")]
    quiet: bool,
}

fn parse_color(s: &str) -> std::result::Result<Rgb, String> {
    Rgb::from_hex(s).ok_or_else(|| format!("expected RRGGBB hex colour, got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect_deck(&cli.input, &config)
            .await
            .context("Failed to inspect deck")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            println!("File:         {}", meta.path.display());
            println!("Slides:       {}", meta.slide_count);
            println!(
                "Canvas:       {:.3}in x {:.3}in ({} x {} EMU)",
                meta.width_in, meta.height_in, meta.width_emu, meta.height_emu
            );
            println!("DPI:          {}", meta.dpi);
            println!("Image size:   {} x {} px", meta.width_px, meta.height_px);
        }
        return Ok(());
    }

    // ── Check-only mode ──────────────────────────────────────────────────
    if cli.check_only {
        let report = check_overflow(&cli.input, &config)
            .await
            .with_context(|| format!("Overflow check of {} failed", cli.input.display()))?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            print_report(&report, cli.quiet);
        }
        return Ok(());
    }

    // ── Full conversion ──────────────────────────────────────────────────
    let output = convert(&cli.input, &cli.output, &config)
        .await
        .with_context(|| format!("Conversion of {} failed", cli.input.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    if let Some(ref report) = output.overflow {
        print_report(report, cli.quiet);
    }
    if !cli.quiet {
        let first = format!("{}-1.png", config.file_prefix);
        let second = format!("{}-2.png", config.file_prefix);
        println!(
            "Saved rendered slides ({}, {}, etc.) to {}",
            first,
            second,
            bold(&cli.output.display().to_string())
        );
        eprintln!(
            "   {} slides at {} dpi  —  {}ms total",
            dim(&output.stats.total_slides.to_string()),
            output.dpi,
            output.stats.total_duration_ms,
        );
    }

    Ok(())
}

/// The overflow warning is printed even with `--quiet`; it is the result.
fn print_report(report: &OverflowReport, quiet: bool) {
    match report.warning_text() {
        Some(text) => eprintln!("{}", yellow(&text)),
        None if !quiet => eprintln!(
            "{} No slide content overflows the canvas ({} slides at {} dpi)",
            green("✔"),
            report.slides_checked,
            report.dpi
        ),
        None => {}
    }
    if let (Some(dir), false) = (&report.evidence_dir, quiet) {
        eprintln!("{} Work directory kept at {}", cyan("◆"), dir.display());
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_size(cli.width, cli.height)
        .pad_px(cli.pad_px)
        .pad_color(cli.pad_color)
        .check_overflow(!cli.no_overflow_check)
        .keep_work_dir(cli.keep_work_dir)
        .soffice_path(&cli.soffice);

    if let Some(dpi) = cli.dpi {
        builder = builder.dpi(dpi);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["pptx2png", "deck.pptx"]);
        assert_eq!(cli.output, PathBuf::from("ppt-preview"));
        assert_eq!((cli.width, cli.height), (1600, 900));
        assert_eq!(cli.pad_color, Rgb(200, 200, 200));
        let config = build_config(&cli, None).unwrap();
        assert!(config.check_overflow);
        assert_eq!(config.dpi, None);
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from([
            "pptx2png",
            "deck.pptx",
            "--width",
            "800",
            "--height",
            "600",
            "--dpi",
            "96",
            "--pad-px",
            "40",
            "--pad-color",
            "#00ff00",
            "--no-overflow-check",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!((config.max_width_px, config.max_height_px), (800, 600));
        assert_eq!(config.dpi, Some(96));
        assert_eq!(config.padding.width_px, 40);
        assert_eq!(config.padding.color, Rgb(0, 255, 0));
        assert!(!config.check_overflow);
    }

    #[test]
    fn bad_colour_is_rejected() {
        assert!(Cli::try_parse_from(["pptx2png", "d.pptx", "--pad-color", "grey"]).is_err());
    }

    #[test]
    fn check_only_conflicts_with_no_check() {
        assert!(Cli::try_parse_from([
            "pptx2png",
            "d.pptx",
            "--check-only",
            "--no-overflow-check"
        ])
        .is_err());
    }
}
