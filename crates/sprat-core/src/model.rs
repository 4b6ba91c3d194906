use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpratError};

/// An input image together with its placed rectangle inside the atlas.
///
/// `w`/`h` are the packed dimensions (post-trim, post-scale); the trim
/// offsets record how much transparent margin was removed from each edge so
/// downstream tools can reconstruct the original extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub path: String,
    pub w: u32,
    pub h: u32,
    pub x: u32,
    pub y: u32,
    pub trim_left: u32,
    pub trim_top: u32,
    pub trim_right: u32,
    pub trim_bottom: u32,
}

impl Sprite {
    pub fn new(path: impl Into<String>, w: u32, h: u32) -> Self {
        Self {
            path: path.into(),
            w,
            h,
            x: 0,
            y: 0,
            trim_left: 0,
            trim_top: 0,
            trim_right: 0,
            trim_bottom: 0,
        }
    }

    /// Footprint used during packing: `(w + padding, h + padding)`.
    /// Fails on overflow rather than wrapping.
    pub fn padded_size(&self, padding: u32) -> Result<(u32, u32)> {
        let w = self.w.checked_add(padding).ok_or(SpratError::Overflow {
            what: "padded width",
            path: self.path.clone(),
        })?;
        let h = self.h.checked_add(padding).ok_or(SpratError::Overflow {
            what: "padded height",
            path: self.path.clone(),
        })?;
        Ok((w, h))
    }
}

/// Result of a layout run: atlas extent, scale and the placed sprites in the
/// order produced by the winning placement attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasLayout {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub sprites: Vec<Sprite>,
}

/// Change fingerprint of an input file. Participates in cache signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub file_size: u64,
    pub mtime_ticks: u64,
}

impl ImageMeta {
    /// Stats `path` and captures its byte size and mtime (nanoseconds since
    /// the Unix epoch; pre-epoch clamps to zero).
    pub fn probe(path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        let mtime_ticks = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Ok(Self {
            file_size: meta.len(),
            mtime_ticks,
        })
    }
}

/// A filesystem input to measure and place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    /// Path used for filesystem access.
    pub file_path: PathBuf,
    /// Identifier carried through the layout text and caches.
    pub path: String,
    pub meta: ImageMeta,
}

impl ImageSource {
    pub fn probe(file_path: PathBuf) -> std::io::Result<Self> {
        let meta = ImageMeta::probe(&file_path)?;
        let path = file_path.to_string_lossy().into_owned();
        Ok(Self {
            file_path,
            path,
            meta,
        })
    }
}
