//! Streaming XML access to the PresentationML parts the pipeline touches.
//!
//! Every part is scanned once with a `quick_xml::Reader`, recording the byte
//! span of each element of interest (`reader.buffer_position()` before and
//! after the event). Writing back is span splicing: only the elements whose
//! values changed are re-rendered, everything else is copied byte-for-byte.
//! That keeps unknown extensions, namespaces and formatting intact without a
//! full DOM.

use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{PlaceholderRef, Rect, Rgb, Shape, ShapeKind, Slide};
use crate::error::Pptx2PngError;

// ── Skeleton for slides built from scratch ───────────────────────────────

pub(crate) const EMPTY_SLIDE_PROLOGUE: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
    "<p:cSld><p:spTree>"
);

pub(crate) const EMPTY_GROUP_PROPS: &str = concat!(
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#,
    r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
);

pub(crate) const EMPTY_SLIDE_EPILOGUE: &str =
    "</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>";

// ── Slides ────────────────────────────────────────────────────────────────

/// Split a slide (or layout / master) part into prologue, the layers of its
/// shape tree, and epilogue.
pub(crate) fn parse_slide(part_name: &str, data: &[u8]) -> Result<Slide, Pptx2PngError> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut tree_depth: Option<usize> = None;
    let mut prologue_end = None;
    let mut epilogue_start = None;
    let mut open_child: Option<(usize, Vec<u8>)> = None;
    let mut children: Vec<(Vec<u8>, Range<usize>)> = Vec::new();
    let mut max_id = 0u32;

    loop {
        buf.clear();
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Pptx2PngError::xml(part_name, e))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                match tree_depth {
                    None if name.as_ref() == b"spTree" => {
                        tree_depth = Some(depth);
                        prologue_end = Some(after);
                    }
                    Some(t) if depth == t + 1 => {
                        open_child = Some((before, name.as_ref().to_vec()));
                    }
                    _ => {}
                }
                if tree_depth.is_some() && name.as_ref() == b"cNvPr" {
                    max_id = max_id.max(numeric_attr(&e, b"id").unwrap_or(0) as u32);
                }
            }
            Event::Empty(e) => {
                if let Some(t) = tree_depth {
                    let name = e.local_name();
                    if depth == t {
                        children.push((name.as_ref().to_vec(), before..after));
                    }
                    if name.as_ref() == b"cNvPr" {
                        max_id = max_id.max(numeric_attr(&e, b"id").unwrap_or(0) as u32);
                    }
                }
            }
            Event::End(_) => {
                if let Some(t) = tree_depth {
                    if depth == t {
                        epilogue_start = Some(before);
                        break;
                    }
                    if depth == t + 1 {
                        if let Some((start, name)) = open_child.take() {
                            children.push((name, start..after));
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let prologue_end =
        prologue_end.ok_or_else(|| Pptx2PngError::xml(part_name, "no <p:spTree> element"))?;
    let epilogue_start = epilogue_start
        .ok_or_else(|| Pptx2PngError::xml(part_name, "unterminated <p:spTree> element"))?;

    let mut group_props = Vec::new();
    let mut tree_ext = Vec::new();
    let mut shapes = Vec::new();
    for (name, span) in children {
        let bytes = &data[span];
        match name.as_slice() {
            b"nvGrpSpPr" | b"grpSpPr" => group_props.extend_from_slice(bytes),
            b"extLst" => tree_ext.extend_from_slice(bytes),
            other => shapes.push(parse_shape(
                part_name,
                ShapeKind::from_local_name(other),
                bytes,
            )?),
        }
    }

    Ok(Slide {
        part_name: part_name.to_string(),
        shapes,
        prologue: data[..prologue_end].to_vec(),
        group_props,
        tree_ext,
        epilogue: data[epilogue_start..].to_vec(),
        max_id,
    })
}

/// Serialise a slide from its layers.
pub(crate) fn write_slide(slide: &Slide) -> Result<Vec<u8>, Pptx2PngError> {
    let mut out = Vec::with_capacity(
        slide.prologue.len() + slide.epilogue.len() + slide.group_props.len() + 512,
    );
    out.extend_from_slice(&slide.prologue);
    out.extend_from_slice(&slide.group_props);
    for shape in &slide.shapes {
        out.extend_from_slice(&write_shape(&slide.part_name, shape)?);
    }
    out.extend_from_slice(&slide.tree_ext);
    out.extend_from_slice(&slide.epilogue);
    Ok(out)
}

// ── Shapes ────────────────────────────────────────────────────────────────

/// What one pass over a shape element collects.
#[derive(Default)]
struct ShapeScan {
    id: Option<u32>,
    name: Option<String>,
    placeholder: Option<PlaceholderRef>,
    fill: Option<Rgb>,
    off: Option<(i64, i64)>,
    ext: Option<(i64, i64)>,
}

impl ShapeScan {
    fn visit(&mut self, parent: &[Vec<u8>], e: &BytesStart<'_>) {
        let name = e.local_name();
        match name.as_ref() {
            // [S, nv*Pr, cNvPr]
            b"cNvPr" if parent.len() == 2 && self.id.is_none() => {
                self.id = numeric_attr(e, b"id").map(|v| v as u32);
                self.name = text_attr(e, b"name");
            }
            // [S, nv*Pr, nvPr, ph]
            b"ph" if parent.len() == 3 && parent[2].as_slice() == b"nvPr" => {
                self.placeholder = Some(PlaceholderRef {
                    kind: text_attr(e, b"type"),
                    idx: numeric_attr(e, b"idx").map(|v| v as u32),
                });
            }
            b"off" if is_shape_xfrm(parent) && self.off.is_none() => {
                if let (Some(x), Some(y)) = (numeric_attr(e, b"x"), numeric_attr(e, b"y")) {
                    self.off = Some((x, y));
                }
            }
            b"ext" if is_shape_xfrm(parent) && self.ext.is_none() => {
                if let (Some(cx), Some(cy)) = (numeric_attr(e, b"cx"), numeric_attr(e, b"cy")) {
                    self.ext = Some((cx, cy));
                }
            }
            // [S, spPr, solidFill, srgbClr]
            b"srgbClr"
                if parent.len() == 3
                    && parent[1].as_slice() == b"spPr"
                    && parent[2].as_slice() == b"solidFill"
                    && self.fill.is_none() =>
            {
                self.fill = text_attr(e, b"val").and_then(|v| Rgb::from_hex(&v));
            }
            _ => {}
        }
    }
}

/// Read the identity, frame and fill of a single shape-tree child.
pub(crate) fn parse_shape(
    part_name: &str,
    kind: ShapeKind,
    source: &[u8],
) -> Result<Shape, Pptx2PngError> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut scan = ShapeScan::default();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| Pptx2PngError::xml(part_name, e))?
        {
            Event::Start(e) => {
                scan.visit(own_path(&path), &e);
                path.push(e.local_name().as_ref().to_vec());
            }
            Event::Empty(e) => scan.visit(own_path(&path), &e),
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let declared = match (scan.off, scan.ext) {
        (Some((x, y)), Some((cx, cy))) => Some(Rect::new(x, y, cx, cy)),
        _ => None,
    };

    Ok(Shape {
        id: scan.id.unwrap_or(0),
        name: scan.name.unwrap_or_default(),
        kind,
        placeholder: scan.placeholder,
        frame: declared,
        fill: scan.fill,
        declared_frame: declared,
        source: Some(source.to_vec()),
    })
}

fn write_shape(part_name: &str, shape: &Shape) -> Result<Vec<u8>, Pptx2PngError> {
    let Some(source) = &shape.source else {
        return Ok(rectangle_xml(shape).into_bytes());
    };
    match (shape.frame, shape.declared_frame) {
        (Some(frame), Some(declared)) if frame != declared => {
            relocate(part_name, source, declared, frame)
        }
        (Some(frame), None) => materialize_frame(part_name, source, frame),
        _ => Ok(source.clone()),
    }
}

/// Markup for a synthesised solid rectangle without outline.
fn rectangle_xml(shape: &Shape) -> String {
    let frame = shape.frame.unwrap_or(Rect::new(0, 0, 0, 0));
    let fill = match shape.fill {
        Some(rgb) => format!(r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, rgb.hex()),
        None => "<a:noFill/>".to_string(),
    };
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>{fill}<a:ln><a:noFill/></a:ln></p:spPr>"#,
            r#"<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp>"#
        ),
        id = shape.id,
        name = quick_xml::escape::escape(shape.name.as_str()),
        x = frame.left,
        y = frame.top,
        cx = frame.width,
        cy = frame.height,
        fill = fill,
    )
}

/// Move (and if needed resize) every own `xfrm` of a shape so its declared
/// frame becomes `to`. Alternate-content branches are all moved.
fn relocate(
    part_name: &str,
    source: &[u8],
    from: Rect,
    to: Rect,
) -> Result<Vec<u8>, Pptx2PngError> {
    let dx = to.left - from.left;
    let dy = to.top - from.top;
    let resized = (to.width, to.height) != (from.width, from.height);

    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut edits: Vec<(Range<usize>, Vec<u8>)> = Vec::new();

    loop {
        buf.clear();
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Pptx2PngError::xml(part_name, e))?;
        let after = reader.buffer_position() as usize;

        let (e, empty) = match event {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(_) => {
                path.pop();
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        if is_shape_xfrm(own_path(&path)) {
            match e.local_name().as_ref() {
                b"off" => {
                    let x = numeric_attr(&e, b"x").unwrap_or(0) + dx;
                    let y = numeric_attr(&e, b"y").unwrap_or(0) + dy;
                    let markup = render_start(part_name, &e, empty, &[("x", x), ("y", y)])?;
                    edits.push((before..after, markup));
                }
                b"ext" if resized => {
                    let markup = render_start(
                        part_name,
                        &e,
                        empty,
                        &[("cx", to.width), ("cy", to.height)],
                    )?;
                    edits.push((before..after, markup));
                }
                _ => {}
            }
        }
        if !empty {
            path.push(e.local_name().as_ref().to_vec());
        }
    }

    Ok(splice(source, edits))
}

/// Give a shape that has no `xfrm` of its own an explicit one as the first
/// child of its `spPr`.
fn materialize_frame(
    part_name: &str,
    source: &[u8],
    frame: Rect,
) -> Result<Vec<u8>, Pptx2PngError> {
    let xfrm = format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        frame.left, frame.top, frame.width, frame.height
    );

    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut edits: Vec<(Range<usize>, Vec<u8>)> = Vec::new();

    loop {
        buf.clear();
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Pptx2PngError::xml(part_name, e))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                if own_path(&path).len() == 1 && e.local_name().as_ref() == b"spPr" {
                    edits.push((after..after, xfrm.clone().into_bytes()));
                }
                path.push(e.local_name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                if own_path(&path).len() == 1 && e.local_name().as_ref() == b"spPr" {
                    let mut markup = render_start(part_name, &e, false, &[])?;
                    markup.extend_from_slice(xfrm.as_bytes());
                    markup.extend_from_slice(b"</");
                    markup.extend_from_slice(e.name().as_ref());
                    markup.push(b'>');
                    edits.push((before..after, markup));
                }
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if edits.is_empty() {
        tracing::debug!(part = part_name, "Shape has no spPr; frame left implicit");
    }
    Ok(splice(source, edits))
}

/// Strip the `mc:AlternateContent / mc:Choice|mc:Fallback` wrapper so both
/// branches are addressed like a plain shape.
fn own_path(path: &[Vec<u8>]) -> &[Vec<u8>] {
    if path.len() >= 3
        && path[0].as_slice() == b"AlternateContent"
        && matches!(path[1].as_slice(), b"Choice" | b"Fallback")
    {
        &path[2..]
    } else {
        path
    }
}

/// `true` when `parent` is the shape's own transform: `[S, xfrm]` (graphic
/// frames, content parts) or `[S, spPr|grpSpPr, xfrm]`.
fn is_shape_xfrm(parent: &[Vec<u8>]) -> bool {
    match parent {
        [_, xfrm] => xfrm.as_slice() == b"xfrm",
        [_, props, xfrm] => {
            matches!(props.as_slice(), b"spPr" | b"grpSpPr") && xfrm.as_slice() == b"xfrm"
        }
        _ => false,
    }
}

// ── Presentation part ─────────────────────────────────────────────────────

/// `p:sldSz` of `ppt/presentation.xml` as `(cx, cy)` in EMU.
pub(crate) fn read_slide_size(part_name: &str, data: &[u8]) -> Result<(i64, i64), Pptx2PngError> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| Pptx2PngError::xml(part_name, e))?
        {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sldSz" => {
                let cx = numeric_attr(&e, b"cx").unwrap_or(0);
                let cy = numeric_attr(&e, b"cy").unwrap_or(0);
                return Ok((cx, cy));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Err(Pptx2PngError::xml(part_name, "no <p:sldSz> element"))
}

/// Rewrite `p:sldSz` with a new canvas size, leaving the rest of the part
/// untouched.
pub(crate) fn write_slide_size(
    part_name: &str,
    data: &[u8],
    width: i64,
    height: i64,
) -> Result<Vec<u8>, Pptx2PngError> {
    let size = [("cx", width), ("cy", height)];
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Pptx2PngError::xml(part_name, e))?;
        let after = reader.buffer_position() as usize;
        let markup = match event {
            Event::Empty(e) if e.local_name().as_ref() == b"sldSz" => {
                render_start(part_name, &e, true, &size)?
            }
            Event::Start(e) if e.local_name().as_ref() == b"sldSz" => {
                render_start(part_name, &e, false, &size)?
            }
            Event::Eof => break,
            _ => continue,
        };
        return Ok(splice(data, vec![(before..after, markup)]));
    }
    Err(Pptx2PngError::xml(part_name, "no <p:sldSz> element"))
}

/// Relationship ids of `p:sldIdLst`, in presentation order.
pub(crate) fn slide_rel_ids(part_name: &str, data: &[u8]) -> Result<Vec<String>, Pptx2PngError> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut ids = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| Pptx2PngError::xml(part_name, e))?
        {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sldId" => {
                // The relationship id is the namespaced `r:id`, not the numeric `id`.
                let rid = e.attributes().flatten().find_map(|a| {
                    (a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
                        .then(|| String::from_utf8_lossy(&a.value).into_owned())
                });
                match rid {
                    Some(rid) => ids.push(rid),
                    None => return Err(Pptx2PngError::xml(part_name, "<p:sldId> without r:id")),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(ids)
}

// ── Relationships ─────────────────────────────────────────────────────────

/// One `Relationship` of a `.rels` part.
#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// `true` when the relationship type URI ends with `/<kind>`.
    pub fn is(&self, kind: &str) -> bool {
        self.rel_type
            .rsplit('/')
            .next()
            .is_some_and(|last| last == kind)
    }
}

pub(crate) fn parse_rels(part_name: &str, data: &[u8]) -> Result<Vec<Relationship>, Pptx2PngError> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut rels = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| Pptx2PngError::xml(part_name, e))?
        {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = text_attr(&e, b"Id");
                let rel_type = text_attr(&e, b"Type");
                let target = text_attr(&e, b"Target");
                let external = text_attr(&e, b"TargetMode").is_some_and(|m| m == "External");
                if let (Some(id), Some(rel_type), Some(target)) = (id, rel_type, target) {
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn text_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn numeric_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<i64> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| std::str::from_utf8(&a.value).ok()?.trim().parse().ok())
}

/// Re-render a start (or empty) tag, replacing the listed attributes.
fn render_start(
    part_name: &str,
    e: &BytesStart<'_>,
    empty: bool,
    updates: &[(&str, i64)],
) -> Result<Vec<u8>, Pptx2PngError> {
    let mut out = Vec::with_capacity(64);
    out.push(b'<');
    out.extend_from_slice(e.name().as_ref());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Pptx2PngError::xml(part_name, err))?;
        out.push(b' ');
        out.extend_from_slice(attr.key.as_ref());
        match updates.iter().find(|(k, _)| attr.key.as_ref() == k.as_bytes()) {
            Some((_, value)) => out.extend_from_slice(format!("=\"{}\"", value).as_bytes()),
            None => {
                let quote = if attr.value.contains(&b'"') { b'\'' } else { b'"' };
                out.push(b'=');
                out.push(quote);
                out.extend_from_slice(&attr.value);
                out.push(quote);
            }
        }
    }
    out.extend_from_slice(if empty { b"/>" } else { b">" });
    Ok(out)
}

/// Apply non-overlapping `(span, replacement)` edits to `source`.
fn splice(source: &[u8], mut edits: Vec<(Range<usize>, Vec<u8>)>) -> Vec<u8> {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = Vec::with_capacity(source.len() + edits.len() * 64);
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.extend_from_slice(&source[cursor..span.start]);
        out.extend_from_slice(&replacement);
        cursor = span.end;
    }
    out.extend_from_slice(&source[cursor..]);
    out
}
