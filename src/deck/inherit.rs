//! Placeholder frame inheritance.
//!
//! A placeholder on a slide may omit `a:xfrm`; PowerPoint then positions it
//! like the matching placeholder on the slide layout, and failing that on the
//! slide master. The padding transformer needs a concrete frame to shift, so
//! the inherited one is resolved here when the deck is read.
//!
//! Matching: layout placeholder by `idx`, then by type; master placeholder by
//! base type (`ctrTitle` → `title`, date / footer / slide number keep their
//! own type, every content type → `body`).

use std::collections::HashMap;

use tracing::trace;

use super::{xml, Package, PlaceholderRef, Rect, Shape, Slide};
use crate::error::Pptx2PngError;

/// Resolves inherited frames, parsing each layout and master at most once.
pub(super) struct FrameResolver<'a> {
    package: &'a Package,
    trees: HashMap<String, Vec<Shape>>,
}

impl<'a> FrameResolver<'a> {
    pub(super) fn new(package: &'a Package) -> Self {
        Self {
            package,
            trees: HashMap::new(),
        }
    }

    /// Fill in `frame` for every placeholder on `slide` that has none.
    pub(super) fn resolve(&mut self, slide: &mut Slide) -> Result<(), Pptx2PngError> {
        if !slide.shapes.iter().any(needs_frame) {
            return Ok(());
        }

        let layout = self.package.related_part(&slide.part_name, "slideLayout")?;
        let master = match &layout {
            Some(layout) => self.package.related_part(layout, "slideMaster")?,
            None => None,
        };
        for part in layout.iter().chain(master.iter()) {
            self.load(part)?;
        }

        let layout_shapes = self.shapes_of(layout.as_deref());
        let master_shapes = self.shapes_of(master.as_deref());

        for shape in slide.shapes.iter_mut().filter(|s| needs_frame(s)) {
            let Some(ph) = &shape.placeholder else {
                continue;
            };
            shape.frame = from_layout(ph, layout_shapes).or_else(|| from_master(ph, master_shapes));
            trace!(
                slide = %slide.part_name,
                shape = %shape.name,
                frame = ?shape.frame,
                "Resolved inherited placeholder frame"
            );
        }
        Ok(())
    }

    fn load(&mut self, part: &str) -> Result<(), Pptx2PngError> {
        if self.trees.contains_key(part) {
            return Ok(());
        }
        let shapes = match self.package.part(part) {
            Some(data) => xml::parse_slide(part, data)?.shapes,
            None => Vec::new(),
        };
        self.trees.insert(part.to_string(), shapes);
        Ok(())
    }

    fn shapes_of(&self, part: Option<&str>) -> &[Shape] {
        part.and_then(|p| self.trees.get(p))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn needs_frame(shape: &Shape) -> bool {
    shape.frame.is_none() && shape.placeholder.is_some()
}

/// `@type` with its schema default.
fn placeholder_type(ph: &PlaceholderRef) -> &str {
    ph.kind.as_deref().unwrap_or("obj")
}

/// The master placeholder type a layout or slide placeholder falls back to.
fn base_type(kind: &str) -> &str {
    match kind {
        "title" | "ctrTitle" => "title",
        "dt" | "ftr" | "sldNum" => kind,
        _ => "body",
    }
}

fn framed_placeholders(shapes: &[Shape]) -> impl Iterator<Item = (&PlaceholderRef, Rect)> {
    shapes
        .iter()
        .filter_map(|s| Some((s.placeholder.as_ref()?, s.frame?)))
}

fn from_layout(ph: &PlaceholderRef, layout: &[Shape]) -> Option<Rect> {
    let by_idx = ph.idx.and_then(|idx| {
        framed_placeholders(layout)
            .find(|(candidate, _)| candidate.idx == Some(idx))
            .map(|(_, frame)| frame)
    });
    by_idx.or_else(|| {
        framed_placeholders(layout)
            .find(|(candidate, _)| placeholder_type(candidate) == placeholder_type(ph))
            .map(|(_, frame)| frame)
    })
}

fn from_master(ph: &PlaceholderRef, master: &[Shape]) -> Option<Rect> {
    let wanted = base_type(placeholder_type(ph));
    framed_placeholders(master)
        .find(|(candidate, _)| placeholder_type(candidate) == wanted)
        .map(|(_, frame)| frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::package::tests::two_slide_package;
    use crate::deck::ShapeKind;

    fn placeholder(kind: Option<&str>, idx: Option<u32>, frame: Option<Rect>) -> Shape {
        let mut ph = String::from("<p:ph");
        if let Some(kind) = kind {
            ph.push_str(&format!(r#" type="{}""#, kind));
        }
        if let Some(idx) = idx {
            ph.push_str(&format!(r#" idx="{}""#, idx));
        }
        ph.push_str("/>");
        let xfrm = frame
            .map(|f| {
                format!(
                    r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
                    f.left, f.top, f.width, f.height
                )
            })
            .unwrap_or_default();
        let source = format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Placeholder"/><p:cNvSpPr/><p:nvPr>{}</p:nvPr></p:nvSpPr><p:spPr>{}</p:spPr></p:sp>"#,
            ph, xfrm
        );
        xml::parse_shape("test", ShapeKind::Shape, source.as_bytes()).unwrap()
    }

    #[test]
    fn base_types() {
        assert_eq!(base_type("ctrTitle"), "title");
        assert_eq!(base_type("sldNum"), "sldNum");
        assert_eq!(base_type("subTitle"), "body");
        assert_eq!(base_type("obj"), "body");
    }

    #[test]
    fn layout_match_prefers_idx() {
        let layout = vec![
            placeholder(Some("body"), Some(1), Some(Rect::new(1, 1, 1, 1))),
            placeholder(None, Some(2), Some(Rect::new(2, 2, 2, 2))),
        ];
        let ph = PlaceholderRef {
            kind: Some("body".into()),
            idx: Some(2),
        };
        assert_eq!(from_layout(&ph, &layout), Some(Rect::new(2, 2, 2, 2)));

        let by_type = PlaceholderRef {
            kind: Some("body".into()),
            idx: Some(9),
        };
        assert_eq!(from_layout(&by_type, &layout), Some(Rect::new(1, 1, 1, 1)));
    }

    #[test]
    fn master_match_uses_base_type() {
        let master = vec![
            placeholder(Some("title"), None, Some(Rect::new(5, 5, 5, 5))),
            placeholder(Some("body"), Some(1), Some(Rect::new(6, 6, 6, 6))),
        ];
        let title = PlaceholderRef {
            kind: Some("ctrTitle".into()),
            idx: None,
        };
        let subtitle = PlaceholderRef {
            kind: Some("subTitle".into()),
            idx: Some(1),
        };
        assert_eq!(from_master(&title, &master), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(from_master(&subtitle, &master), Some(Rect::new(6, 6, 6, 6)));
        // Unframed candidates never match.
        let unframed = vec![placeholder(Some("title"), None, None)];
        assert_eq!(from_master(&title, &unframed), None);
    }

    #[test]
    fn resolves_through_layout_and_master_parts() {
        let layout_xml = {
            let mut layout = Slide::new("ppt/slideLayouts/slideLayout1.xml");
            // Layout title has no frame of its own; its body does.
            layout.push(placeholder(Some("title"), None, None));
            layout.push(placeholder(None, Some(1), Some(Rect::new(10, 20, 30, 40))));
            layout.to_xml().unwrap()
        };
        let master_xml = {
            let mut master = Slide::new("ppt/slideMasters/slideMaster1.xml");
            master.push(placeholder(Some("title"), None, Some(Rect::new(1, 2, 3, 4))));
            master.to_xml().unwrap()
        };
        let slide_xml = {
            let mut slide = Slide::new("ppt/slides/slide1.xml");
            slide.push(placeholder(Some("ctrTitle"), None, None));
            slide.push(placeholder(None, Some(1), None));
            slide.push(placeholder(Some("pic"), Some(7), None));
            slide.to_xml().unwrap()
        };

        let rel = |kind: &str, target: &str| {
            format!(
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/{}" Target="{}"/></Relationships>"#,
                kind, target
            )
            .into_bytes()
        };

        let base = two_slide_package();
        let mut parts: Vec<(String, Vec<u8>)> = base
            .part_names()
            .filter(|n| *n != "ppt/slides/slide1.xml")
            .map(|n| (n.to_string(), base.part(n).unwrap().to_vec()))
            .collect();
        parts.push(("ppt/slides/slide1.xml".into(), slide_xml));
        parts.push((
            "ppt/slides/_rels/slide1.xml.rels".into(),
            rel("slideLayout", "../slideLayouts/slideLayout1.xml"),
        ));
        parts.push(("ppt/slideLayouts/slideLayout1.xml".into(), layout_xml));
        parts.push((
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels".into(),
            rel("slideMaster", "../slideMasters/slideMaster1.xml"),
        ));
        parts.push(("ppt/slideMasters/slideMaster1.xml".into(), master_xml));

        let deck = Package::from_parts(parts).deck().unwrap();
        let slide = deck
            .slides
            .iter()
            .find(|s| s.part_name == "ppt/slides/slide1.xml")
            .unwrap();
        assert_eq!(slide.shapes[0].frame, Some(Rect::new(1, 2, 3, 4)));
        assert_eq!(slide.shapes[1].frame, Some(Rect::new(10, 20, 30, 40)));
        // No layout idx 7, no master "body": left without a frame.
        assert_eq!(slide.shapes[2].frame, None);
    }
}
