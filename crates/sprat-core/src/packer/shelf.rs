//! Shelf kernel: left-to-right rows, closing a shelf when the next sprite
//! would overrun the row width. Fastest kernel, lowest density; used by the
//! fast mode and as a cross-check in the compact search.

use crate::model::Sprite;

use super::padded;

/// Packs sprites (in slice order) into rows of at most `max_row_width`.
/// Returns `(widest row reached, sum of shelf heights)`, or `None` when a
/// sprite is wider than the row or arithmetic overflows.
pub fn pack(sprites: &mut [Sprite], max_row_width: u32, padding: u32) -> Option<(u32, u32)> {
    if max_row_width == 0 {
        return None;
    }

    let mut x = 0u32;
    let mut y = 0u32;
    let mut row_height = 0u32;
    let mut atlas_width = 0u32;

    for sprite in sprites.iter_mut() {
        let (w, h) = padded(sprite, padding)?;
        if w == 0 || h == 0 || w > max_row_width {
            return None;
        }

        let mut candidate_x = x.checked_add(w)?;
        if x > 0 && candidate_x > max_row_width {
            y = y.checked_add(row_height)?;
            x = 0;
            row_height = 0;
            candidate_x = w;
        }

        sprite.x = x;
        sprite.y = y;
        x = candidate_x;
        row_height = row_height.max(h);
        atlas_width = atlas_width.max(x);
    }

    let total_height = y.checked_add(row_height)?;
    (atlas_width > 0 && total_height > 0).then_some((atlas_width, total_height))
}
