//! In-memory model of a PowerPoint deck.
//!
//! A [`Deck`] is an ordered list of [`Slide`]s sharing one canvas size. Each
//! slide keeps its shape tree as an explicit, ordered list of layers:
//!
//! ```text
//! <p:spTree>
//!   nvGrpSpPr + grpSpPr     mandatory group properties (bottom layer)
//!   shape 1 … shape N        z-order, front-most last
//!   extLst                   optional, always last
//! </p:spTree>
//! ```
//!
//! Transformations build a new layer list and serialise the whole tree
//! afresh ([`Slide::to_xml`]); nothing is ever spliced into a live XML tree,
//! so z-order is exactly the order of [`Slide::shapes`].
//!
//! All lengths are EMU (English Metric Units, 914 400 per inch), the native
//! unit of OOXML.

mod inherit;
pub mod package;
pub(crate) mod xml;

pub use package::Package;

use serde::{Deserialize, Serialize};

/// EMU per inch.
pub const EMU_PER_INCH: i64 = 914_400;

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Upper-case `RRGGBB`, the form DrawingML's `srgbClr/@val` uses.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// Parse `RRGGBB` (an optional leading `#` is accepted).
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn channels(&self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

/// Axis-aligned frame of a shape, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.top + self.height
    }

    /// The same frame moved by `(dx, dy)`.
    pub fn translate(self, dx: i64, dy: i64) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            ..self
        }
    }
}

/// The XML element a shape was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// `p:sp`: auto shape, text box, placeholder.
    Shape,
    /// `p:grpSp`
    Group,
    /// `p:graphicFrame`: table, chart, SmartArt, OLE object.
    GraphicFrame,
    /// `p:cxnSp`
    Connector,
    /// `p:pic`
    Picture,
    /// `p:contentPart`: ink.
    ContentPart,
    /// `mc:AlternateContent` wrapping one of the above.
    AlternateContent,
    /// Any other shape-tree child; carried through untouched.
    Other,
}

impl ShapeKind {
    pub(crate) fn from_local_name(name: &[u8]) -> Self {
        match name {
            b"sp" => ShapeKind::Shape,
            b"grpSp" => ShapeKind::Group,
            b"graphicFrame" => ShapeKind::GraphicFrame,
            b"cxnSp" => ShapeKind::Connector,
            b"pic" => ShapeKind::Picture,
            b"contentPart" => ShapeKind::ContentPart,
            b"AlternateContent" => ShapeKind::AlternateContent,
            _ => ShapeKind::Other,
        }
    }
}

/// `p:ph` reference of a placeholder shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaceholderRef {
    /// `@type`; absent means `obj`.
    pub kind: Option<String>,
    /// `@idx`; absent means 0.
    pub idx: Option<u32>,
}

/// A single entry of a slide's shape tree.
#[derive(Debug, Clone)]
pub struct Shape {
    /// `cNvPr/@id`
    pub id: u32,
    /// `cNvPr/@name`
    pub name: String,
    pub kind: ShapeKind,
    pub placeholder: Option<PlaceholderRef>,
    /// Position and size. `None` when neither the shape nor its layout or
    /// master declares a frame.
    pub frame: Option<Rect>,
    /// Solid `srgbClr` fill from `spPr`, when present.
    pub fill: Option<Rgb>,
    /// Frame as declared in `source`; `None` when the XML has no `xfrm`.
    pub(crate) declared_frame: Option<Rect>,
    /// Original element XML; `None` for shapes synthesised by this crate.
    pub(crate) source: Option<Vec<u8>>,
}

impl Shape {
    /// A solid rectangle without outline, synthesised from scratch.
    pub fn rectangle(id: u32, name: impl Into<String>, frame: Rect, fill: Rgb) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ShapeKind::Shape,
            placeholder: None,
            frame: Some(frame),
            fill: Some(fill),
            declared_frame: None,
            source: None,
        }
    }

    /// The same shape moved by `(dx, dy)`. Shapes without a frame are
    /// returned unchanged.
    pub fn translated(&self, dx: i64, dy: i64) -> Self {
        let mut shape = self.clone();
        shape.frame = self.frame.map(|f| f.translate(dx, dy));
        shape
    }
}

/// One slide: its part name plus the ordered layers of its shape tree.
#[derive(Debug, Clone)]
pub struct Slide {
    /// Package part name, e.g. `ppt/slides/slide1.xml`.
    pub part_name: String,
    /// Shapes in z-order (front-most last).
    pub shapes: Vec<Shape>,
    /// Everything up to and including the `<p:spTree>` start tag.
    pub(crate) prologue: Vec<u8>,
    /// `nvGrpSpPr` + `grpSpPr`: the mandatory bottom layer of the tree.
    pub(crate) group_props: Vec<u8>,
    /// `p:extLst` of the shape tree, if any.
    pub(crate) tree_ext: Vec<u8>,
    /// Everything from the `</p:spTree>` end tag onwards.
    pub(crate) epilogue: Vec<u8>,
    /// Largest `cNvPr/@id` anywhere in the slide, including group children.
    pub(crate) max_id: u32,
}

impl Slide {
    /// An empty slide with a minimal `p:sld` skeleton.
    pub fn new(part_name: impl Into<String>) -> Self {
        Self {
            part_name: part_name.into(),
            shapes: Vec::new(),
            prologue: xml::EMPTY_SLIDE_PROLOGUE.as_bytes().to_vec(),
            group_props: xml::EMPTY_GROUP_PROPS.as_bytes().to_vec(),
            tree_ext: Vec::new(),
            epilogue: xml::EMPTY_SLIDE_EPILOGUE.as_bytes().to_vec(),
            max_id: 1,
        }
    }

    /// Append a shape on top of the current z-order.
    pub fn push(&mut self, shape: Shape) -> &mut Self {
        self.shapes.push(shape);
        self
    }

    /// A copy of this slide with its shape layers replaced.
    pub fn with_shapes(&self, shapes: Vec<Shape>) -> Self {
        Self {
            part_name: self.part_name.clone(),
            shapes,
            prologue: self.prologue.clone(),
            group_props: self.group_props.clone(),
            tree_ext: self.tree_ext.clone(),
            epilogue: self.epilogue.clone(),
            max_id: self.max_id,
        }
    }

    /// Largest shape id in use; new shapes must be numbered above it.
    pub fn max_shape_id(&self) -> u32 {
        self.shapes
            .iter()
            .map(|s| s.id)
            .fold(self.max_id, u32::max)
    }

    /// Serialise the slide part.
    pub fn to_xml(&self) -> Result<Vec<u8>, crate::error::Pptx2PngError> {
        xml::write_slide(self)
    }
}

/// A slide deck: canvas size plus slides in presentation order.
#[derive(Debug, Clone)]
pub struct Deck {
    /// Canvas width in EMU.
    pub width: i64,
    /// Canvas height in EMU.
    pub height: i64,
    pub slides: Vec<Slide>,
}

impl Deck {
    pub fn new(width: i64, height: i64) -> Self {
        Self {
            width,
            height,
            slides: Vec::new(),
        }
    }

    pub fn width_inches(&self) -> f64 {
        self.width as f64 / EMU_PER_INCH as f64
    }

    pub fn height_inches(&self) -> f64 {
        self.height as f64 / EMU_PER_INCH as f64
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}
