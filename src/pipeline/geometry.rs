//! Resolution and unit arithmetic.
//!
//! The deck canvas is measured in EMU, the target box and padding in pixels.
//! Everything that crosses between the two goes through this module so the
//! rounding rules live in one place:
//!
//! - dpi is rounded to the nearest integer (and never below 1);
//! - pixel → EMU conversion floors, so the padding band is never wider in
//!   EMU than the requested pixel width at the chosen dpi.

use serde::{Deserialize, Serialize};

use crate::deck::{Deck, EMU_PER_INCH};

/// One of the four padding bands around the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    /// Padding rectangles are inserted, and margins reported, in this order.
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dpi at which a `width_in × height_in` canvas fits inside a
/// `max_width_px × max_height_px` box.
///
/// `round(min(max_w / width_in, max_h / height_in))`, at least 1. Box sizes
/// are validated by the config builder; non-positive canvas sizes are
/// rejected when the deck is read.
pub fn compute_resolution(
    width_in: f64,
    height_in: f64,
    max_width_px: u32,
    max_height_px: u32,
) -> u32 {
    let by_width = f64::from(max_width_px) / width_in;
    let by_height = f64::from(max_height_px) / height_in;
    let dpi = by_width.min(by_height).round();
    if dpi.is_finite() && dpi >= 1.0 {
        dpi as u32
    } else {
        1
    }
}

/// [`compute_resolution`] for a deck's EMU canvas.
pub fn resolution_for_deck(deck: &Deck, max_width_px: u32, max_height_px: u32) -> u32 {
    compute_resolution(
        deck.width_inches(),
        deck.height_inches(),
        max_width_px,
        max_height_px,
    )
}

/// `floor(px * 914400 / dpi)`, in integer arithmetic.
pub fn pixels_to_emu(px: u32, dpi: u32) -> i64 {
    i64::from(px) * EMU_PER_INCH / i64::from(dpi.max(1))
}

/// Pixels covered by `emu` at `dpi`, rounded to nearest.
pub fn emu_to_pixels(emu: i64, dpi: u32) -> u32 {
    let px = (emu as f64 * f64::from(dpi) / EMU_PER_INCH as f64).round();
    if px <= 0.0 {
        0
    } else {
        px as u32
    }
}

/// Pixel size of a rendered `width × height` EMU canvas at `dpi`.
pub fn rendered_size(width: i64, height: i64, dpi: u32) -> (u32, u32) {
    (emu_to_pixels(width, dpi), emu_to_pixels(height, dpi))
}
