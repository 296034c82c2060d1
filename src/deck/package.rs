//! `.pptx` package access: the ZIP container and its part graph.
//!
//! A [`Package`] holds every part of the archive in memory, in archive
//! order. Reading a [`Deck`] follows the OPC relationship graph
//! (`_rels/.rels` → presentation → `sldIdLst` → slides); writing one back
//! replaces only the slide parts and the canvas size, every other part is
//! copied byte-for-byte.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::inherit::FrameResolver;
use super::xml::{self, Relationship};
use super::Deck;
use crate::error::Pptx2PngError;

const DEFAULT_PRESENTATION_PART: &str = "ppt/presentation.xml";

/// An opened `.pptx` archive.
#[derive(Debug, Clone)]
pub struct Package {
    path: PathBuf,
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Read every part of the archive at `path`.
    pub fn open(path: &Path) -> Result<Self, Pptx2PngError> {
        let corrupt = |detail: String| Pptx2PngError::CorruptDeck {
            path: path.to_path_buf(),
            detail,
        };

        let file = File::open(path).map_err(|e| corrupt(e.to_string()))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| corrupt(e.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| corrupt(format!("{}: {}", name, e)))?;
            parts.push((name, data));
        }

        debug!(path = %path.display(), parts = parts.len(), "Opened deck package");
        Ok(Self {
            path: path.to_path_buf(),
            parts,
        })
    }

    /// Build a package from in-memory parts, e.g. a deck assembled in code.
    pub fn from_parts<N: Into<String>>(parts: impl IntoIterator<Item = (N, Vec<u8>)>) -> Self {
        Self {
            path: PathBuf::new(),
            parts: parts.into_iter().map(|(n, d)| (n.into(), d)).collect(),
        }
    }

    /// Where the package was read from (empty for in-memory packages).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    fn require(&self, name: &str) -> Result<&[u8], Pptx2PngError> {
        self.part(name).ok_or_else(|| Pptx2PngError::MissingPart {
            part: name.to_string(),
        })
    }

    // ── Relationship graph ───────────────────────────────────────────────

    /// Relationships of `part`; a part without a `.rels` has none.
    pub(crate) fn relationships(&self, part: &str) -> Result<Vec<Relationship>, Pptx2PngError> {
        let rels_name = rels_part_name(part);
        match self.part(&rels_name) {
            Some(data) => xml::parse_rels(&rels_name, data),
            None => Ok(Vec::new()),
        }
    }

    /// First internal target of `part` whose relationship type ends in `kind`.
    pub(crate) fn related_part(
        &self,
        part: &str,
        kind: &str,
    ) -> Result<Option<String>, Pptx2PngError> {
        Ok(self
            .relationships(part)?
            .into_iter()
            .find(|r| !r.external && r.is(kind))
            .map(|r| resolve_target(part, &r.target)))
    }

    fn presentation_part(&self) -> Result<String, Pptx2PngError> {
        Ok(self
            .related_part("", "officeDocument")?
            .unwrap_or_else(|| DEFAULT_PRESENTATION_PART.to_string()))
    }

    // ── Deck ─────────────────────────────────────────────────────────────

    /// Parse the canvas size and every slide, in presentation order.
    ///
    /// Placeholders that carry no frame of their own get the frame of the
    /// matching layout or master placeholder.
    pub fn deck(&self) -> Result<Deck, Pptx2PngError> {
        let presentation = self.presentation_part()?;
        let data = self.require(&presentation)?;

        let (width, height) = xml::read_slide_size(&presentation, data)?;
        if width <= 0 || height <= 0 {
            return Err(Pptx2PngError::InvalidCanvas { width, height });
        }

        let rels: HashMap<String, Relationship> = self
            .relationships(&presentation)?
            .into_iter()
            .filter(|r| !r.external)
            .map(|r| (r.id.clone(), r))
            .collect();

        let mut resolver = FrameResolver::new(self);
        let mut deck = Deck::new(width, height);
        for rid in xml::slide_rel_ids(&presentation, data)? {
            let rel = rels.get(&rid).ok_or_else(|| Pptx2PngError::MissingPart {
                part: format!("{} (relationship {})", rels_part_name(&presentation), rid),
            })?;
            let part_name = resolve_target(&presentation, &rel.target);
            let mut slide = xml::parse_slide(&part_name, self.require(&part_name)?)?;
            resolver.resolve(&mut slide)?;
            deck.slides.push(slide);
        }

        debug!(
            slides = deck.slides.len(),
            width_in = deck.width_inches(),
            height_in = deck.height_inches(),
            "Parsed deck"
        );
        Ok(deck)
    }

    /// A copy of this package with `deck`'s slides and canvas size written in.
    pub fn with_deck(&self, deck: &Deck) -> Result<Package, Pptx2PngError> {
        let presentation = self.presentation_part()?;
        let mut parts = self.parts.clone();

        for slide in &deck.slides {
            let slot = parts
                .iter_mut()
                .find(|(n, _)| *n == slide.part_name)
                .ok_or_else(|| Pptx2PngError::MissingPart {
                    part: slide.part_name.clone(),
                })?;
            slot.1 = slide.to_xml()?;
        }

        let slot = parts
            .iter_mut()
            .find(|(n, _)| *n == presentation)
            .ok_or_else(|| Pptx2PngError::MissingPart {
                part: presentation.clone(),
            })?;
        slot.1 = xml::write_slide_size(&presentation, &slot.1, deck.width, deck.height)?;

        Ok(Package {
            path: PathBuf::new(),
            parts,
        })
    }

    /// Serialise the archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Pptx2PngError> {
        let zip_err = |e: zip::result::ZipError| Pptx2PngError::Internal(format!("ZIP write: {}", e));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in &self.parts {
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            writer.start_file(name.as_str(), options).map_err(zip_err)?;
            writer
                .write_all(data)
                .map_err(|e| Pptx2PngError::Internal(format!("ZIP write {}: {}", name, e)))?;
        }
        Ok(writer.finish().map_err(zip_err)?.into_inner())
    }

    /// Write the archive to `dest`.
    pub fn save(&self, dest: &Path) -> Result<(), Pptx2PngError> {
        let bytes = self.to_bytes()?;
        std::fs::write(dest, bytes).map_err(|source| Pptx2PngError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source,
        })?;
        debug!(path = %dest.display(), "Wrote deck package");
        Ok(())
    }
}

/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`; the package
/// itself (`""`) → `_rels/.rels`.
pub(crate) fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target relative to the part that owns it.
pub(crate) fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match base_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
