//! Pipeline stages for overflow detection and slide rendering.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different rasterizer backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ geometry ──▶ pad ──▶ render ──▶ inspect
//! (path)    (dpi, EMU)   (deck)  (PNGs)     (margins)
//! ```
//!
//! 1. [`input`]   : validate the user-supplied path is a readable `.pptx`
//! 2. [`geometry`]: pick a render dpi for the target pixel box and convert
//!    the pixel padding width to EMU
//! 3. [`pad`]     : enlarge every slide by a solid padding band, shifting the
//!    original content to the centre
//! 4. [`render`]  : rasterise the deck through an external renderer and put
//!    the page images into a deterministic 1..N order
//! 5. [`inspect`] : measure how much of each padding band is *not* padding
//!    colour and flag slides above the tolerance

pub mod geometry;
pub mod input;
pub mod inspect;
pub mod pad;
pub mod render;
