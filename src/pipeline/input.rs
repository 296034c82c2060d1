//! Input resolution: validate a user-supplied deck path before any work.
//!
//! ## Why sniff the magic bytes?
//!
//! A `.pptx` is a ZIP container, so it must start with `PK\x03\x04`. Checking
//! this up front turns "renamed PDF" or "legacy binary .ppt" into a clear
//! [`Pptx2PngError::NotAPptx`] instead of a ZIP error from deep inside the
//! deck reader, and it happens before the renderer is ever spawned.

use crate::error::Pptx2PngError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Local-file-header signature every ZIP archive starts with.
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Resolve `path` to a readable `.pptx` file.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<PathBuf, Pptx2PngError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(Pptx2PngError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            let read = f.read(&mut magic).unwrap_or(0);
            if read < magic.len() || magic != ZIP_MAGIC {
                return Err(Pptx2PngError::NotAPptx { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pptx2PngError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pptx2PngError::FileNotFound { path });
        }
    }

    debug!("Resolved local deck: {}", path.display());
    Ok(path)
}
