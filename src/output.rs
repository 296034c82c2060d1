//! Result types returned by the conversion entry points.
//!
//! Everything here is `Serialize` so the CLI can print a run as JSON
//! (`--json`) and callers can persist or forward it unchanged.

use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::pipeline::inspect::{MarginReport, ToleranceProfile};

/// One slide whose content reaches into the padding band.
#[derive(Debug, Clone, Serialize)]
pub struct SlideOverflow {
    /// 1-based slide index.
    pub slide: usize,
    /// The padded render showing the overflow.
    pub image_path: PathBuf,
    /// The margins that failed, in left/right/top/bottom order.
    pub margins: Vec<MarginReport>,
}

/// Outcome of the overflow check.
#[derive(Debug, Clone, Serialize)]
pub struct OverflowReport {
    pub dpi: u32,
    /// Padding band width in rendered pixels.
    pub pad_px: u32,
    /// Padding band width in EMU.
    pub pad_emu: i64,
    pub tolerance: ToleranceProfile,
    pub slides_checked: usize,
    /// Overflowing slides in ascending order.
    pub overflowing: Vec<SlideOverflow>,
    /// Directory holding the padded deck and its renders, when it was kept.
    pub evidence_dir: Option<PathBuf>,
}

impl OverflowReport {
    pub fn failing_slides(&self) -> Vec<usize> {
        self.overflowing.iter().map(|s| s.slide).collect()
    }

    pub fn has_overflow(&self) -> bool {
        !self.overflowing.is_empty()
    }

    /// Human-readable warning, or `None` when every slide fits its canvas.
    pub fn warning_text(&self) -> Option<String> {
        if !self.has_overflow() {
            return None;
        }
        let indices = self
            .failing_slides()
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        let mut text = format!(
            "WARNING: Slides with content overflowing original canvas (1-based indexing): {}\n",
            indices
        );
        text.push_str("Rendered images with padding for visual inspection:\n");
        for s in &self.overflowing {
            let sides = s
                .margins
                .iter()
                .map(|m| m.side.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(text, "  slide {}: {} ({})", s.slide, s.image_path.display(), sides);
        }
        text.push_str("Please also check other slides for potential issues.");
        Some(text)
    }
}

/// Timing and size counters for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub total_slides: usize,
    pub overflowing_slides: usize,
    pub check_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Canvas facts about a deck, available without rendering it.
#[derive(Debug, Clone, Serialize)]
pub struct DeckMetadata {
    pub path: PathBuf,
    pub slide_count: usize,
    /// Canvas in EMU.
    pub width_emu: i64,
    pub height_emu: i64,
    pub width_in: f64,
    pub height_in: f64,
    /// Resolution the configured target box yields for this canvas.
    pub dpi: u32,
    /// Rendered size at `dpi`.
    pub width_px: u32,
    pub height_px: u32,
}

/// Everything a conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub dpi: u32,
    /// Rendered original slides, `slide_paths[i]` is slide `i + 1`. Empty for
    /// check-only runs.
    pub slide_paths: Vec<PathBuf>,
    /// `None` when the overflow check was disabled.
    pub overflow: Option<OverflowReport>,
    pub stats: ConversionStats,
}
