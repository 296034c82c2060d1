//! Margin inspection: decide from a padded render whether a slide overflows.
//!
//! Each rendered image shows the enlarged canvas: the original slide in the
//! centre, surrounded by a solid band of padding colour. Anything else found
//! inside that band was drawn by the slide past its original edge.
//!
//! ## Why a tolerance at all?
//!
//! Renderers anti-alias the edge between the band and the slide, and at low
//! dpi that blur reaches several pixels into the band. The inspection
//! therefore compares every channel against the pad colour with a small
//! tolerance and allows a small fraction of mismatching pixels per margin.
//! Both widen as the resolution drops (see [`ToleranceProfile::for_dpi`]).
//!
//! ## Why shrink the band by one pixel?
//!
//! The innermost row/column of the band is where the pad meets the slide and
//! where dpi rounding lands; it is excluded from every margin
//! (`floor(extent * ratio) - 1`). Only that inner edge is excluded: the outer
//! image border is inspected in full.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use image::RgbImage;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{PaddingSpec, ToleranceBreakpoints};
use crate::deck::Rgb;
use crate::error::Pptx2PngError;
use crate::pipeline::geometry::Side;
use crate::pipeline::pad::PadRatios;
use crate::progress::ProgressCallback;

/// Per-dpi strictness of the margin test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToleranceProfile {
    /// Largest per-channel distance from the pad colour still counted as a match.
    pub channel_tol: u8,
    /// Largest fraction of non-matching pixels a clean margin may contain.
    pub max_mismatch: f64,
}

impl ToleranceProfile {
    pub fn for_dpi(dpi: u32, breakpoints: &ToleranceBreakpoints) -> Self {
        let channel_tol = if dpi >= breakpoints.exact_dpi {
            0
        } else {
            let levels = (f64::from(breakpoints.exact_dpi - dpi) / breakpoints.dpi_per_level).round();
            levels.clamp(
                f64::from(breakpoints.min_channel_tol),
                f64::from(breakpoints.max_channel_tol),
            ) as u8
        };

        let max_mismatch = if dpi >= breakpoints.exact_dpi {
            breakpoints.exact_mismatch
        } else if dpi >= breakpoints.medium_dpi {
            breakpoints.medium_mismatch
        } else {
            breakpoints.coarse_mismatch
        };

        Self {
            channel_tol,
            max_mismatch,
        }
    }

    fn matches(&self, pixel: [u8; 3], pad: [u8; 3]) -> bool {
        pixel
            .iter()
            .zip(pad.iter())
            .all(|(p, c)| p.abs_diff(*c) <= self.channel_tol)
    }
}

/// Inspected thickness of one band: `floor(extent * ratio) - 1`, never
/// negative and never past the image.
pub fn margin_extent(extent: u32, ratio: f64) -> u32 {
    let band = (f64::from(extent) * ratio).floor() as i64 - 1;
    band.clamp(0, i64::from(extent)) as u32
}

/// A rendered page and the 1-based slide it shows.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub slide: usize,
    pub pixels: RgbImage,
}

impl RenderedImage {
    /// Decode a rendered page from disk.
    pub fn load(path: &Path, slide: usize) -> Result<Self, Pptx2PngError> {
        let pixels = image::open(path)
            .map_err(|e| Pptx2PngError::ImageLoadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?
            .to_rgb8();
        Ok(Self { slide, pixels })
    }
}

/// Verdict for one margin of one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarginReport {
    pub side: Side,
    /// Fraction of inspected pixels that do not match the pad colour.
    pub mismatch: f64,
    pub clean: bool,
}

/// All four margins of one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideVerdict {
    pub slide: usize,
    pub margins: Vec<MarginReport>,
}

impl SlideVerdict {
    pub fn overflows(&self) -> bool {
        self.margins.iter().any(|m| !m.clean)
    }

    pub fn dirty_margins(&self) -> impl Iterator<Item = &MarginReport> {
        self.margins.iter().filter(|m| !m.clean)
    }
}

/// Check the four margins of a single image.
pub fn inspect_image(
    image: &RenderedImage,
    ratios: PadRatios,
    profile: &ToleranceProfile,
    pad_color: Rgb,
) -> Result<SlideVerdict, Pptx2PngError> {
    let (width, height) = image.pixels.dimensions();
    if width == 0 || height == 0 {
        return Err(Pptx2PngError::InconsistentImageSize {
            slide: image.slide,
            width,
            height,
        });
    }

    let band_x = margin_extent(width, ratios.width);
    let band_y = margin_extent(height, ratios.height);
    let pad = pad_color.channels();

    let margins = Side::ALL
        .iter()
        .map(|&side| {
            // (x0, y0, w, h) of the margin.
            let (x0, y0, w, h) = match side {
                Side::Left => (0, 0, band_x, height),
                Side::Right => (width - band_x, 0, band_x, height),
                Side::Top => (0, 0, width, band_y),
                Side::Bottom => (0, height - band_y, width, band_y),
            };
            let mismatch = mismatch_fraction(&image.pixels, (x0, y0, w, h), pad, profile);
            MarginReport {
                side,
                mismatch,
                clean: mismatch <= profile.max_mismatch,
            }
        })
        .collect::<Vec<_>>();

    trace!(slide = image.slide, band_x, band_y, ?margins, "Inspected margins");
    Ok(SlideVerdict {
        slide: image.slide,
        margins,
    })
}

/// Fraction of pixels inside `region` that are not pad colour. An empty
/// region has nothing to mismatch.
fn mismatch_fraction(
    pixels: &RgbImage,
    (x0, y0, w, h): (u32, u32, u32, u32),
    pad: [u8; 3],
    profile: &ToleranceProfile,
) -> f64 {
    let total = u64::from(w) * u64::from(h);
    if total == 0 {
        return 0.0;
    }
    let mut dirty = 0u64;
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            if !profile.matches(pixels.get_pixel(x, y).0, pad) {
                dirty += 1;
            }
        }
    }
    dirty as f64 / total as f64
}

/// Failing 1-based slide indices of a set of in-memory renders, ascending.
pub fn inspect(
    images: &[RenderedImage],
    ratios: PadRatios,
    dpi: u32,
    padding: &PaddingSpec,
    breakpoints: &ToleranceBreakpoints,
) -> Result<Vec<usize>, Pptx2PngError> {
    let profile = ToleranceProfile::for_dpi(dpi, breakpoints);
    let mut failing = Vec::new();
    for image in images {
        if inspect_image(image, ratios, &profile, padding.color)?.overflows() {
            failing.push(image.slide);
        }
    }
    failing.sort_unstable();
    Ok(failing)
}

/// Load and inspect ordered page images (`paths[i]` is slide `i + 1`).
///
/// Images are decoded and inspected on the blocking pool, at most
/// `concurrency` at a time; verdicts come back in slide order.
pub async fn inspect_images(
    paths: &[PathBuf],
    ratios: PadRatios,
    dpi: u32,
    padding: &PaddingSpec,
    breakpoints: &ToleranceBreakpoints,
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<SlideVerdict>, Pptx2PngError> {
    let profile = ToleranceProfile::for_dpi(dpi, breakpoints);
    let pad_color = padding.color;
    let total = paths.len();
    debug!(
        dpi,
        channel_tol = profile.channel_tol,
        max_mismatch = profile.max_mismatch,
        images = total,
        "Inspecting padded renders"
    );

    let results: Vec<Result<SlideVerdict, Pptx2PngError>> =
        stream::iter(paths.iter().cloned().enumerate().map(|(idx, path)| {
            let progress = progress.cloned();
            async move {
                let slide = idx + 1;
                let verdict = tokio::task::spawn_blocking(move || {
                    let image = RenderedImage::load(&path, slide)?;
                    inspect_image(&image, ratios, &profile, pad_color)
                })
                .await
                .map_err(|e| Pptx2PngError::Internal(format!("Inspect task panicked: {}", e)))??;

                if let Some(cb) = progress {
                    cb.on_slide_checked(slide, total, verdict.overflows());
                }
                Ok(verdict)
            }
        }))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb as Px;

    const PAD: Rgb = Rgb(200, 200, 200);
    const WHITE: Px<u8> = Px([255, 255, 255]);

    /// 100×80 render with a 10 px band: ratios 0.1 / 0.125, so every margin is
    /// inspected 9 px deep.
    fn padded_render(slide: usize) -> RenderedImage {
        let mut pixels = RgbImage::from_pixel(100, 80, Px(PAD.channels()));
        for y in 10..70 {
            for x in 10..90 {
                pixels.put_pixel(x, y, WHITE);
            }
        }
        RenderedImage { slide, pixels }
    }

    fn ratios() -> PadRatios {
        PadRatios {
            width: 0.1,
            height: 0.125,
        }
    }

    fn verdict(image: &RenderedImage, dpi: u32) -> SlideVerdict {
        let profile = ToleranceProfile::for_dpi(dpi, &ToleranceBreakpoints::default());
        inspect_image(image, ratios(), &profile, PAD).unwrap()
    }

    #[test]
    fn tolerance_breakpoints() {
        let bp = ToleranceBreakpoints::default();
        let at = |dpi| ToleranceProfile::for_dpi(dpi, &bp);
        assert_eq!(at(300).channel_tol, 0);
        assert_eq!(at(300).max_mismatch, 0.01);
        assert_eq!(at(600).channel_tol, 0);
        assert_eq!(at(299).channel_tol, 1);
        assert_eq!(at(250).channel_tol, 2);
        assert_eq!(at(250).max_mismatch, 0.02);
        assert_eq!(at(200).max_mismatch, 0.02);
        assert_eq!(at(150).channel_tol, 6);
        assert_eq!(at(150).max_mismatch, 0.03);
        assert_eq!(at(72).channel_tol, 9);
        assert_eq!(at(10).channel_tol, 10);
    }

    #[test]
    fn tolerance_never_grows_with_dpi() {
        let bp = ToleranceBreakpoints::default();
        let mut previous = ToleranceProfile::for_dpi(72, &bp);
        for dpi in 73..=600 {
            let current = ToleranceProfile::for_dpi(dpi, &bp);
            assert!(current.channel_tol <= previous.channel_tol, "dpi {dpi}");
            assert!(current.max_mismatch <= previous.max_mismatch, "dpi {dpi}");
            previous = current;
        }
    }

    #[test]
    fn margin_extent_shrinks_by_one() {
        assert_eq!(margin_extent(100, 0.1), 9);
        assert_eq!(margin_extent(1000, 0.0999), 98);
        assert_eq!(margin_extent(5, 0.1), 0);
        assert_eq!(margin_extent(0, 0.5), 0);
    }

    #[test]
    fn clean_render_passes_at_every_dpi() {
        let image = padded_render(1);
        for dpi in [72, 150, 200, 300, 600] {
            let v = verdict(&image, dpi);
            assert!(!v.overflows(), "dpi {dpi}: {v:?}");
            assert!(v.margins.iter().all(|m| m.mismatch == 0.0));
        }
    }

    #[test]
    fn innermost_band_column_is_ignored() {
        // Column 9 is the band's inner edge: excluded.
        let mut image = padded_render(1);
        for y in 10..70 {
            image.pixels.put_pixel(9, y, WHITE);
        }
        assert!(!verdict(&image, 300).overflows());

        // One column further out is inspected.
        let mut image = padded_render(1);
        for y in 10..70 {
            image.pixels.put_pixel(8, y, WHITE);
        }
        let v = verdict(&image, 300);
        assert!(v.overflows());
        let dirty: Vec<_> = v.dirty_margins().map(|m| m.side).collect();
        assert_eq!(dirty, [Side::Left]);
    }

    #[test]
    fn outer_border_is_inspected() {
        let mut image = padded_render(1);
        for x in 0..100 {
            image.pixels.put_pixel(x, 79, WHITE);
        }
        let v = verdict(&image, 300);
        let dirty: Vec<_> = v.dirty_margins().map(|m| m.side).collect();
        // The bottom row crosses the left and right bands too.
        assert!(dirty.contains(&Side::Bottom));
    }

    #[test]
    fn mismatch_fraction_threshold_is_inclusive() {
        // Left margin is 9 × 80 = 720 px; 1 % is 7.2 px.
        let mut image = padded_render(1);
        for y in 20..27 {
            image.pixels.put_pixel(0, y, WHITE);
        }
        assert!(!verdict(&image, 300).overflows());

        image.pixels.put_pixel(0, 27, WHITE);
        assert!(verdict(&image, 300).overflows());
    }

    #[test]
    fn anti_aliasing_within_channel_tolerance_matches() {
        let mut image = padded_render(1);
        // Whole left margin drifts by 6: tolerated at 150 dpi (tol 6), not at 300.
        for y in 0..80 {
            for x in 0..9 {
                image.pixels.put_pixel(x, y, Px([206, 194, 200]));
            }
        }
        assert!(!verdict(&image, 150).overflows());
        assert!(verdict(&image, 300).overflows());
    }

    #[test]
    fn zero_sized_image_is_an_error() {
        let image = RenderedImage {
            slide: 3,
            pixels: RgbImage::new(0, 0),
        };
        let profile = ToleranceProfile::for_dpi(300, &ToleranceBreakpoints::default());
        let err = inspect_image(&image, ratios(), &profile, PAD).unwrap_err();
        assert!(matches!(err, Pptx2PngError::InconsistentImageSize { slide: 3, .. }));
    }

    #[test]
    fn inspect_returns_ascending_failures() {
        let mut dirty = padded_render(3);
        for y in 0..80 {
            dirty.pixels.put_pixel(95, y, Px([255, 0, 0]));
        }
        let mut also_dirty = padded_render(1);
        for x in 0..100 {
            also_dirty.pixels.put_pixel(x, 2, Px([0, 0, 0]));
        }
        let images = vec![dirty, padded_render(2), also_dirty];
        let failing = inspect(
            &images,
            ratios(),
            150,
            &PaddingSpec::default(),
            &ToleranceBreakpoints::default(),
        )
        .unwrap();
        assert_eq!(failing, [1, 3]);
    }

    #[tokio::test]
    async fn images_on_disk_keep_slide_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for slide in 1..=4 {
            let mut image = padded_render(slide);
            if slide == 2 {
                for y in 0..80 {
                    image.pixels.put_pixel(1, y, Px([0, 0, 255]));
                }
            }
            let path = dir.path().join(format!("slide-{slide}.png"));
            image.pixels.save(&path).unwrap();
            paths.push(path);
        }

        let verdicts = inspect_images(
            &paths,
            ratios(),
            96,
            &PaddingSpec::default(),
            &ToleranceBreakpoints::default(),
            2,
            None,
        )
        .await
        .unwrap();
        let slides: Vec<_> = verdicts.iter().map(|v| v.slide).collect();
        assert_eq!(slides, [1, 2, 3, 4]);
        let failing: Vec<_> = verdicts.iter().filter(|v| v.overflows()).map(|v| v.slide).collect();
        assert_eq!(failing, [2]);
    }

    #[tokio::test]
    async fn unreadable_image_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slide-1.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = inspect_images(
            &[path],
            ratios(),
            96,
            &PaddingSpec::default(),
            &ToleranceBreakpoints::default(),
            1,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Pptx2PngError::ImageLoadFailed { .. }));
    }
}
