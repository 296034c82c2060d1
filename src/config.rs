//! Configuration types for deck rendering and overflow detection.
//!
//! All behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across threads, log them, and diff two runs to
//! understand why their verdicts differ.
//!
//! # Why are the thresholds configurable?
//! The padding width, padding colour and tolerance breakpoints were tuned
//! against LibreOffice's anti-aliasing. A different rasterizer (or a deck
//! with a grey theme that collides with the padding colour) may need other
//! values, so they live here instead of in module constants.

use crate::deck::Rgb;
use crate::error::Pptx2PngError;
use crate::pipeline::render::Rasterizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a render / overflow-check run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pptx2png::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .max_size(1920, 1080)
///     .pad_px(80)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Width of the box the rendered slides must fit in, in pixels. Default: 1600.
    pub max_width_px: u32,

    /// Height of the box the rendered slides must fit in, in pixels. Default: 900.
    pub max_height_px: u32,

    /// Fixed render resolution. `None` (default) derives it from the box.
    pub dpi: Option<u32>,

    /// Padding band added around the canvas for the overflow check.
    pub padding: PaddingSpec,

    /// How strict the margin inspection is at each resolution.
    pub tolerance: ToleranceBreakpoints,

    /// Run the overflow check before rendering. Default: true.
    pub check_overflow: bool,

    /// LibreOffice executable. Default: `soffice` (looked up on `PATH`).
    pub soffice_path: PathBuf,

    /// Explicit pdfium shared library. `None` uses `PDFIUM_LIB_PATH`, then the
    /// system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// File-name prefix of the rendered images (`<prefix>-<n>.png`). Default: `slide`.
    pub file_prefix: String,

    /// Number of rendered images inspected at once. Default: available CPUs.
    ///
    /// Margin inspection is pure CPU work on the blocking pool; more workers
    /// than cores only adds memory pressure from decoded images.
    pub concurrency: usize,

    /// Keep the work directory (padded deck and renders) even when no slide
    /// overflows. Default: false.
    pub keep_work_dir: bool,

    /// Where the work directory is created. `None` uses the system temp dir.
    pub work_dir_parent: Option<PathBuf>,

    /// Pre-constructed rasterizer. Takes precedence over the LibreOffice
    /// pipeline configured by `soffice_path` / `pdfium_lib_path`.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Receives stage and per-slide events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_width_px: 1600,
            max_height_px: 900,
            dpi: None,
            padding: PaddingSpec::default(),
            tolerance: ToleranceBreakpoints::default(),
            check_overflow: true,
            soffice_path: PathBuf::from("soffice"),
            pdfium_lib_path: None,
            file_prefix: "slide".to_string(),
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            keep_work_dir: false,
            work_dir_parent: None,
            rasterizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_width_px", &self.max_width_px)
            .field("max_height_px", &self.max_height_px)
            .field("dpi", &self.dpi)
            .field("padding", &self.padding)
            .field("tolerance", &self.tolerance)
            .field("check_overflow", &self.check_overflow)
            .field("soffice_path", &self.soffice_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("file_prefix", &self.file_prefix)
            .field("concurrency", &self.concurrency)
            .field("keep_work_dir", &self.keep_work_dir)
            .field("work_dir_parent", &self.work_dir_parent)
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width_px = px;
        self
    }

    pub fn max_height(mut self, px: u32) -> Self {
        self.config.max_height_px = px;
        self
    }

    /// Both sides of the target box at once.
    pub fn max_size(self, width_px: u32, height_px: u32) -> Self {
        self.max_width(width_px).max_height(height_px)
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = Some(dpi.clamp(1, 1200));
        self
    }

    pub fn padding(mut self, padding: PaddingSpec) -> Self {
        self.config.padding = padding;
        self
    }

    pub fn pad_px(mut self, px: u32) -> Self {
        self.config.padding.width_px = px;
        self
    }

    pub fn pad_color(mut self, color: Rgb) -> Self {
        self.config.padding.color = color;
        self
    }

    pub fn tolerance(mut self, tolerance: ToleranceBreakpoints) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn check_overflow(mut self, v: bool) -> Self {
        self.config.check_overflow = v;
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn keep_work_dir(mut self, v: bool) -> Self {
        self.config.keep_work_dir = v;
        self
    }

    pub fn work_dir_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir_parent = Some(dir.into());
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pptx2PngError> {
        let c = &self.config;
        if c.max_width_px == 0 || c.max_height_px == 0 {
            return Err(Pptx2PngError::InvalidConfig(format!(
                "Target size must be positive, got {}x{}",
                c.max_width_px, c.max_height_px
            )));
        }
        if c.padding.width_px == 0 {
            return Err(Pptx2PngError::InvalidConfig(
                "Padding width must be ≥ 1 px".into(),
            ));
        }
        if c.file_prefix.is_empty()
            || c.file_prefix.contains(['/', '\\'])
            || c.file_prefix.ends_with(|ch: char| ch.is_ascii_digit())
        {
            return Err(Pptx2PngError::InvalidConfig(format!(
                "File prefix must be a non-empty name not ending in a digit, got {:?}",
                c.file_prefix
            )));
        }
        c.tolerance.validate()?;
        Ok(self.config)
    }
}

// ── Thresholds ───────────────────────────────────────────────────────────

/// The padding band used by the overflow check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddingSpec {
    /// Band width in rendered pixels, on every side. Default: 100.
    pub width_px: u32,
    /// Band colour. Default: `(200, 200, 200)`.
    ///
    /// A light grey that is rare as slide content yet distinct from the white
    /// default background, so content bleeding into the band stands out.
    pub color: Rgb,
}

impl Default for PaddingSpec {
    fn default() -> Self {
        Self {
            width_px: 100,
            color: Rgb(200, 200, 200),
        }
    }
}

/// Resolution breakpoints of the margin inspection.
///
/// | dpi                                | channel tolerance                      | max mismatch      |
/// |------------------------------------|----------------------------------------|-------------------|
/// | `dpi >= exact_dpi`                 | 0                                      | `exact_mismatch`  |
/// | `medium_dpi <= dpi < exact_dpi`    | `round((exact_dpi - dpi) / dpi_per_level)`, clamped | `medium_mismatch` |
/// | `dpi < medium_dpi`                 | same formula                           | `coarse_mismatch` |
///
/// Low resolutions blur edges more, so anti-aliased pixels drift further
/// from the pad colour and more of them are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBreakpoints {
    /// At or above this dpi pixels must match exactly. Default: 300.
    pub exact_dpi: u32,
    /// Boundary between the medium and coarse mismatch allowance. Default: 200.
    pub medium_dpi: u32,
    /// dpi below `exact_dpi` per unit of channel tolerance. Default: 25.
    pub dpi_per_level: f64,
    /// Default: 1.
    pub min_channel_tol: u8,
    /// Default: 10.
    pub max_channel_tol: u8,
    /// Default: 0.01.
    pub exact_mismatch: f64,
    /// Default: 0.02.
    pub medium_mismatch: f64,
    /// Default: 0.03.
    pub coarse_mismatch: f64,
}

impl Default for ToleranceBreakpoints {
    fn default() -> Self {
        Self {
            exact_dpi: 300,
            medium_dpi: 200,
            dpi_per_level: 25.0,
            min_channel_tol: 1,
            max_channel_tol: 10,
            exact_mismatch: 0.01,
            medium_mismatch: 0.02,
            coarse_mismatch: 0.03,
        }
    }
}

impl ToleranceBreakpoints {
    /// Reject breakpoints that would make tolerance grow with resolution.
    pub fn validate(&self) -> Result<(), Pptx2PngError> {
        let invalid = |msg: String| Err(Pptx2PngError::InvalidConfig(msg));
        if self.medium_dpi > self.exact_dpi {
            return invalid(format!(
                "medium_dpi ({}) must not exceed exact_dpi ({})",
                self.medium_dpi, self.exact_dpi
            ));
        }
        if !(self.dpi_per_level.is_finite() && self.dpi_per_level > 0.0) {
            return invalid(format!(
                "dpi_per_level must be positive, got {}",
                self.dpi_per_level
            ));
        }
        if self.min_channel_tol > self.max_channel_tol {
            return invalid(format!(
                "min_channel_tol ({}) exceeds max_channel_tol ({})",
                self.min_channel_tol, self.max_channel_tol
            ));
        }
        let fractions = [
            self.exact_mismatch,
            self.medium_mismatch,
            self.coarse_mismatch,
        ];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return invalid("mismatch fractions must lie in [0, 1]".into());
        }
        if !(self.exact_mismatch <= self.medium_mismatch
            && self.medium_mismatch <= self.coarse_mismatch)
        {
            return invalid("mismatch fractions must not decrease with resolution".into());
        }
        Ok(())
    }
}
