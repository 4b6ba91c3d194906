//! Image meta reader: intrinsic dimensions plus, when trimming, the opaque
//! bounding box scanned from the alpha channel.

use std::path::Path;

use image::{ImageReader, RgbaImage};

use crate::error::{Result, SpratError};

/// Measured dimensions of one input. With trimming, `w`/`h` are the opaque
/// box and the four offsets reconstruct the intrinsic extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub w: u32,
    pub h: u32,
    pub trim_left: u32,
    pub trim_top: u32,
    pub trim_right: u32,
    pub trim_bottom: u32,
}

impl Measurement {
    fn untrimmed(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            trim_left: 0,
            trim_top: 0,
            trim_right: 0,
            trim_bottom: 0,
        }
    }
}

fn decode_error(path: &Path, reason: impl ToString) -> SpratError {
    SpratError::ImageDecode {
        path: path.to_string_lossy().into_owned(),
        reason: reason.to_string(),
    }
}

/// Measures `path`. Without trimming only the header is read; with trimming
/// the image is decoded to RGBA and the alpha channel scanned.
pub fn measure(path: &Path, trim: bool) -> Result<Measurement> {
    if !trim {
        let (w, h) = image::image_dimensions(path).map_err(|e| decode_error(path, e))?;
        if w == 0 || h == 0 {
            return Err(decode_error(path, "image has a zero dimension"));
        }
        return Ok(Measurement::untrimmed(w, h));
    }

    let img = ImageReader::open(path)
        .map_err(|e| decode_error(path, e))?
        .decode()
        .map_err(|e| decode_error(path, e))?;
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return Err(decode_error(path, "image has a zero dimension"));
    }

    match trim_bounds(&rgba) {
        Some((min_x, min_y, max_x, max_y)) => Ok(Measurement {
            w: max_x - min_x + 1,
            h: max_y - min_y + 1,
            trim_left: min_x,
            trim_top: min_y,
            trim_right: (w - 1) - max_x,
            trim_bottom: (h - 1) - max_y,
        }),
        // Fully transparent: degenerate to a 1x1 cell whose trim offsets
        // still reconstruct the intrinsic size.
        None => Ok(Measurement {
            w: 1,
            h: 1,
            trim_left: 0,
            trim_top: 0,
            trim_right: w - 1,
            trim_bottom: h - 1,
        }),
    }
}

/// Inclusive opaque bounding box `(min_x, min_y, max_x, max_y)`, or `None`
/// when every pixel is fully transparent.
///
/// Scans top rows downward and bottom rows upward first, then narrows the
/// left/right bounds only inside the vertical stripe found, so typical
/// sprites touch far fewer pixels than a full-image scan.
fn trim_bounds(rgba: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = rgba.dimensions();
    let opaque = |x: u32, y: u32| rgba.get_pixel(x, y)[3] != 0;

    let mut min_y = 0;
    let mut top_hit_x = None;
    'top: for y in 0..h {
        for x in 0..w {
            if opaque(x, y) {
                min_y = y;
                top_hit_x = Some(x);
                break 'top;
            }
        }
    }
    let top_hit_x = top_hit_x?;

    let mut max_y = min_y;
    let mut bottom_hit_x = top_hit_x;
    'bottom: for y in (min_y..h).rev() {
        for x in (0..w).rev() {
            if opaque(x, y) {
                max_y = y;
                bottom_hit_x = x;
                break 'bottom;
            }
        }
    }

    let left_search_end = top_hit_x.min(bottom_hit_x);
    let mut min_x = left_search_end;
    'left: for x in 0..=left_search_end {
        for y in min_y..=max_y {
            if opaque(x, y) {
                min_x = x;
                break 'left;
            }
        }
    }

    let right_search_start = top_hit_x.max(bottom_hit_x);
    let mut max_x = right_search_start;
    'right: for x in (right_search_start..w).rev() {
        for y in min_y..=max_y {
            if opaque(x, y) {
                max_x = x;
                break 'right;
            }
        }
    }

    Some((min_x, min_y, max_x, max_y))
}
