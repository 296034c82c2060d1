//! Deck padding: enlarge every slide by a solid band on all four sides.
//!
//! ## How the enlarged slide is built
//!
//! For a canvas `W × H` and band width `p` (EMU) the new canvas is
//! `W1 × H1 = (W + 2p) × (H + 2p)`. Each slide's shape tree is rebuilt as a
//! fresh layer list:
//!
//! ```text
//! group props ─ pad left ─ pad right ─ pad top ─ pad bottom ─ original 1 … N
//! (bottom)                                                     (shifted by p, p)
//! ```
//!
//! The pads sit above the mandatory group properties and below every piece of
//! original content, so anything the deck draws outside its canvas paints
//! *over* the band, which is exactly what the inspector looks for.
//!
//! The original deck is never touched; a new [`Deck`] is returned.

use tracing::{debug, warn};

use crate::config::PaddingSpec;
use crate::deck::{Deck, Rect, Shape};
use crate::error::Pptx2PngError;
use crate::pipeline::geometry::Side;

/// An enlarged copy of a deck.
#[derive(Debug, Clone)]
pub struct PaddedDeck {
    pub deck: Deck,
    /// Band width in EMU.
    pub pad_emu: i64,
    /// New canvas width in EMU (`original + 2 * pad_emu`).
    pub width: i64,
    /// New canvas height in EMU.
    pub height: i64,
}

/// Fraction of the enlarged canvas each band occupies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadRatios {
    /// `pad / new_width`, applied to the image width.
    pub width: f64,
    /// `pad / new_height`, applied to the image height.
    pub height: f64,
}

impl PaddedDeck {
    pub fn pad_ratios(&self) -> PadRatios {
        PadRatios {
            width: self.pad_emu as f64 / self.width as f64,
            height: self.pad_emu as f64 / self.height as f64,
        }
    }
}

/// The four band rectangles of a `width × height` (already enlarged) canvas,
/// in [`Side::ALL`] order.
pub fn band_frames(width: i64, height: i64, pad: i64) -> [(Side, Rect); 4] {
    [
        (Side::Left, Rect::new(0, 0, pad, height)),
        (Side::Right, Rect::new(width - pad, 0, pad, height)),
        (Side::Top, Rect::new(0, 0, width, pad)),
        (Side::Bottom, Rect::new(0, height - pad, width, pad)),
    ]
}

fn band_name(side: Side) -> &'static str {
    match side {
        Side::Left => "Overflow Pad Left",
        Side::Right => "Overflow Pad Right",
        Side::Top => "Overflow Pad Top",
        Side::Bottom => "Overflow Pad Bottom",
    }
}

/// Enlarge `deck` by `pad_emu` on every side, filling the band with
/// `padding.color`.
pub fn enlarge(deck: &Deck, pad_emu: i64, padding: &PaddingSpec) -> Result<PaddedDeck, Pptx2PngError> {
    if pad_emu <= 0 {
        return Err(Pptx2PngError::Internal(format!(
            "padding must be positive, got {} EMU",
            pad_emu
        )));
    }

    let width = deck.width + 2 * pad_emu;
    let height = deck.height + 2 * pad_emu;
    let bands = band_frames(width, height, pad_emu);

    let mut slides = Vec::with_capacity(deck.slides.len());
    for (index, slide) in deck.slides.iter().enumerate() {
        let mut next_id = slide.max_shape_id();
        let mut layers: Vec<Shape> = Vec::with_capacity(slide.shapes.len() + bands.len());

        for (side, frame) in bands {
            next_id += 1;
            layers.push(Shape::rectangle(next_id, band_name(side), frame, padding.color));
        }

        for shape in &slide.shapes {
            if shape.frame.is_none() {
                warn!(
                    slide = index + 1,
                    shape = %shape.name,
                    kind = ?shape.kind,
                    "Shape has no resolvable position; left unshifted"
                );
            }
            layers.push(shape.translated(pad_emu, pad_emu));
        }

        slides.push(slide.with_shapes(layers));
    }

    debug!(
        slides = slides.len(),
        pad_emu,
        width,
        height,
        "Enlarged deck canvas"
    );

    Ok(PaddedDeck {
        deck: Deck {
            width,
            height,
            slides,
        },
        pad_emu,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{Rgb, Slide, EMU_PER_INCH};
    use crate::pipeline::geometry::pixels_to_emu;

    fn deck_with(shapes: Vec<Shape>) -> Deck {
        let mut deck = Deck::new(10 * EMU_PER_INCH, EMU_PER_INCH * 15 / 2);
        let mut slide = Slide::new("ppt/slides/slide1.xml");
        for s in shapes {
            slide.push(s);
        }
        deck.slides.push(slide);
        deck
    }

    fn boxed(id: u32, left: i64, top: i64) -> Shape {
        Shape::rectangle(id, format!("Box {id}"), Rect::new(left, top, EMU_PER_INCH, EMU_PER_INCH), Rgb(0, 0, 255))
    }

    #[test]
    fn canvas_grows_by_twice_the_pad() {
        let deck = deck_with(vec![boxed(2, 0, 0)]);
        for (px, dpi) in [(100, 150), (100, 72), (37, 300), (1, 96)] {
            let pad = pixels_to_emu(px, dpi);
            let padded = enlarge(&deck, pad, &PaddingSpec::default()).unwrap();
            assert_eq!(padded.width, deck.width + 2 * pad);
            assert_eq!(padded.height, deck.height + 2 * pad);
            assert_eq!(padded.deck.width, padded.width);
            assert_eq!(padded.deck.height, padded.height);
        }
    }

    #[test]
    fn bands_sit_below_original_content() {
        let deck = deck_with(vec![boxed(2, 0, 0), boxed(7, 100, 100)]);
        let padded = enlarge(&deck, 1000, &PaddingSpec::default()).unwrap();
        let shapes = &padded.deck.slides[0].shapes;
        assert_eq!(shapes.len(), 6);

        let names: Vec<_> = shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Overflow Pad Left",
                "Overflow Pad Right",
                "Overflow Pad Top",
                "Overflow Pad Bottom",
                "Box 2",
                "Box 7",
            ]
        );
        // Fresh ids above the largest existing one.
        let ids: Vec<_> = shapes.iter().map(|s| s.id).collect();
        assert_eq!(ids, [8, 9, 10, 11, 2, 7]);
        assert!(shapes[..4].iter().all(|s| s.fill == Some(Rgb(200, 200, 200))));
    }

    #[test]
    fn band_geometry() {
        let deck = deck_with(vec![]);
        let pad = 5000;
        let padded = enlarge(&deck, pad, &PaddingSpec::default()).unwrap();
        let (w, h) = (padded.width, padded.height);
        let frames: Vec<_> = padded.deck.slides[0].shapes.iter().map(|s| s.frame.unwrap()).collect();
        assert_eq!(frames[0], Rect::new(0, 0, pad, h));
        assert_eq!(frames[1], Rect::new(w - pad, 0, pad, h));
        assert_eq!(frames[2], Rect::new(0, 0, w, pad));
        assert_eq!(frames[3], Rect::new(0, h - pad, w, pad));
    }

    #[test]
    fn originals_are_shifted_into_the_centre() {
        let deck = deck_with(vec![boxed(2, -EMU_PER_INCH / 5, 0)]);
        let pad = 609_600;
        let padded = enlarge(&deck, pad, &PaddingSpec::default()).unwrap();
        let moved = padded.deck.slides[0].shapes[4].frame.unwrap();
        assert_eq!(moved.left, pad - EMU_PER_INCH / 5);
        assert_eq!(moved.top, pad);
        // The source deck is unchanged.
        assert_eq!(deck.slides[0].shapes[0].frame.unwrap().left, -EMU_PER_INCH / 5);
    }

    #[test]
    fn ratios_match_canvas() {
        let deck = deck_with(vec![]);
        let padded = enlarge(&deck, 609_600, &PaddingSpec::default()).unwrap();
        let r = padded.pad_ratios();
        assert!((r.width - 609_600.0 / (10.0 * 914_400.0 + 1_219_200.0)).abs() < 1e-12);
        assert!((r.height - 609_600.0 / (7.5 * 914_400.0 + 1_219_200.0)).abs() < 1e-12);
    }

    #[test]
    fn non_positive_pad_is_rejected() {
        let deck = deck_with(vec![]);
        assert!(enlarge(&deck, 0, &PaddingSpec::default()).is_err());
    }
}
