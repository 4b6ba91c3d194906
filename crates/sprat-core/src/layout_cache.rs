//! Two-tier layout cache.
//!
//! `<base>.layout.<signature>` stores the exact output text for a full
//! signature; `<base>.seed.<signature>` stores placed rectangles under the
//! weaker seed signature and warm-starts later runs. Both families use the
//! temp-then-rename protocol so concurrent invocations never observe a
//! partial file.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::write_atomic;
use crate::error::Result;
use crate::model::Sprite;
use crate::text::{Scanner, push_quoted};

pub const OUTPUT_CACHE_VERSION: u32 = 1;
pub const SEED_CACHE_VERSION: u32 = 1;

const OUTPUT_CACHE_TAG: &str = "spratlayout_output_cache";
const SEED_CACHE_TAG: &str = "spratlayout_seed_cache";

pub fn output_cache_path(base: &Path, signature: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".layout.");
    name.push(signature);
    PathBuf::from(name)
}

pub fn seed_cache_path(base: &Path, signature: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".seed.");
    name.push(signature);
    PathBuf::from(name)
}

/// Returns the cached output text when the header and signature match.
pub fn load_output_cache(path: &Path, expected_signature: &str) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let mut lines = contents.splitn(3, '\n');
    let header = lines.next()?;
    if header != format!("{OUTPUT_CACHE_TAG} {OUTPUT_CACHE_VERSION}") {
        return None;
    }
    if lines.next()? != expected_signature {
        return None;
    }
    Some(lines.next().unwrap_or_default().to_string())
}

pub fn save_output_cache(path: &Path, signature: &str, output: &str) -> Result<()> {
    let mut body = format!("{OUTPUT_CACHE_TAG} {OUTPUT_CACHE_VERSION}\n{signature}\n");
    body.push_str(output);
    write_atomic(path, body.as_bytes())
}

/// A placed rectangle recorded in the seed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntry {
    pub path: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub trim_left: u32,
    pub trim_top: u32,
    pub trim_right: u32,
    pub trim_bottom: u32,
}

/// A previously computed layout reused as a warm-start hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedLayout {
    pub signature: String,
    pub padding: u32,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub entries: Vec<SeedEntry>,
}

impl SeedLayout {
    pub fn from_sprites(
        signature: String,
        padding: u32,
        atlas_width: u32,
        atlas_height: u32,
        sprites: &[Sprite],
    ) -> Self {
        let entries = sprites
            .iter()
            .map(|s| SeedEntry {
                path: s.path.clone(),
                x: s.x,
                y: s.y,
                w: s.w,
                h: s.h,
                trim_left: s.trim_left,
                trim_top: s.trim_top,
                trim_right: s.trim_right,
                trim_bottom: s.trim_bottom,
            })
            .collect();
        Self {
            signature,
            padding,
            atlas_width,
            atlas_height,
            entries,
        }
    }
}

pub fn load_seed_cache(path: &Path, expected_signature: &str) -> Option<SeedLayout> {
    let contents = fs::read_to_string(path).ok()?;
    let mut lines = contents.lines();

    if lines.next()? != format!("{SEED_CACHE_TAG} {SEED_CACHE_VERSION}") {
        return None;
    }
    let signature = lines.next()?.trim().to_string();
    if signature != expected_signature {
        return None;
    }

    let mut sc = Scanner::new(lines.next()?);
    let padding = sc.u32()?;
    let atlas_width = sc.u32()?;
    let atlas_height = sc.u32()?;
    let count = sc.u64()? as usize;
    if count == 0 || atlas_width == 0 || atlas_height == 0 {
        return None;
    }

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let mut sc = Scanner::new(lines.next()?);
        entries.push(SeedEntry {
            path: sc.quoted()?,
            x: sc.u32()?,
            y: sc.u32()?,
            w: sc.u32()?,
            h: sc.u32()?,
            trim_left: sc.u32()?,
            trim_top: sc.u32()?,
            trim_right: sc.u32()?,
            trim_bottom: sc.u32()?,
        });
    }

    Some(SeedLayout {
        signature,
        padding,
        atlas_width,
        atlas_height,
        entries,
    })
}

pub fn save_seed_cache(path: &Path, seed: &SeedLayout) -> Result<()> {
    if seed.signature.is_empty()
        || seed.entries.is_empty()
        || seed.atlas_width == 0
        || seed.atlas_height == 0
    {
        return Ok(());
    }

    let mut body = format!(
        "{SEED_CACHE_TAG} {SEED_CACHE_VERSION}\n{}\n{} {} {} {}\n",
        seed.signature,
        seed.padding,
        seed.atlas_width,
        seed.atlas_height,
        seed.entries.len(),
    );
    for entry in &seed.entries {
        push_quoted(&mut body, &entry.path);
        let _ = writeln!(
            body,
            " {} {} {} {} {} {} {} {}",
            entry.x,
            entry.y,
            entry.w,
            entry.h,
            entry.trim_left,
            entry.trim_top,
            entry.trim_right,
            entry.trim_bottom,
        );
    }
    write_atomic(path, body.as_bytes())
}

/// Attempts to reuse a seed layout directly: every current sprite must have
/// a matching path with unchanged dimensions and trim, stay inside the
/// padded bounds, and no two padded rectangles may overlap. Returns the
/// placed sprites and the atlas extent; sprites come back in the seed's
/// recorded order so reuse reproduces the producing run's output bytes.
pub fn try_apply_seed(
    seed: &SeedLayout,
    padding: u32,
    width_upper: u32,
    height_upper: u32,
    sprites: &[Sprite],
) -> Option<(Vec<Sprite>, u32, u32)> {
    if seed.entries.len() != sprites.len() {
        return None;
    }

    let mut by_path = std::collections::HashMap::with_capacity(sprites.len());
    for sprite in sprites {
        if by_path.insert(sprite.path.as_str(), sprite).is_some() {
            return None;
        }
    }

    struct Span {
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
    }
    let mut spans: Vec<Span> = Vec::with_capacity(sprites.len());

    let mut placed = Vec::with_capacity(sprites.len());
    let mut atlas_width = 0u32;
    let mut atlas_height = 0u32;
    let mut seen = std::collections::HashSet::with_capacity(sprites.len());

    for entry in &seed.entries {
        if !seen.insert(entry.path.as_str()) {
            return None;
        }
        let sprite = *by_path.get(entry.path.as_str())?;
        if entry.w != sprite.w
            || entry.h != sprite.h
            || entry.trim_left != sprite.trim_left
            || entry.trim_top != sprite.trim_top
            || entry.trim_right != sprite.trim_right
            || entry.trim_bottom != sprite.trim_bottom
        {
            return None;
        }

        let padded_w = sprite.w.checked_add(padding)?;
        let padded_h = sprite.h.checked_add(padding)?;
        let x1 = entry.x.checked_add(padded_w)?;
        let y1 = entry.y.checked_add(padded_h)?;
        if x1 > width_upper || y1 > height_upper {
            return None;
        }

        let mut s = sprite.clone();
        s.x = entry.x;
        s.y = entry.y;
        placed.push(s);
        spans.push(Span {
            x0: entry.x,
            y0: entry.y,
            x1,
            y1,
        });
        atlas_width = atlas_width.max(x1);
        atlas_height = atlas_height.max(y1);
    }
    if atlas_width == 0 || atlas_height == 0 {
        return None;
    }

    // Overlap sweep on x-sorted spans: a later span can only intersect while
    // its left edge is inside the current span.
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| spans[i].x0);
    for i in 0..order.len() {
        let a = &spans[order[i]];
        for j in (i + 1)..order.len() {
            let b = &spans[order[j]];
            if b.x0 >= a.x1 {
                break;
            }
            if a.y0 < b.y1 && b.y0 < a.y1 {
                return None;
            }
        }
    }

    Some((placed, atlas_width, atlas_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("spratlayout_x.cache");
        let path = output_cache_path(&base, "abc123");
        save_output_cache(&path, "abc123", "atlas 4,4\nscale 1.00000000\n").unwrap();
        assert_eq!(
            load_output_cache(&path, "abc123").as_deref(),
            Some("atlas 4,4\nscale 1.00000000\n")
        );
        assert!(load_output_cache(&path, "other").is_none());
    }

    fn seed_of(entries: Vec<SeedEntry>, padding: u32, w: u32, h: u32) -> SeedLayout {
        SeedLayout {
            signature: "sig".into(),
            padding,
            atlas_width: w,
            atlas_height: h,
            entries,
        }
    }

    fn entry(path: &str, x: u32, y: u32, w: u32, h: u32) -> SeedEntry {
        SeedEntry {
            path: path.into(),
            x,
            y,
            w,
            h,
            trim_left: 0,
            trim_top: 0,
            trim_right: 0,
            trim_bottom: 0,
        }
    }

    #[test]
    fn seed_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("spratlayout_y.cache");
        let path = seed_cache_path(&base, "sig");
        let seed = seed_of(vec![entry("a.png", 0, 0, 8, 8), entry("b.png", 8, 0, 4, 4)], 0, 12, 8);
        save_seed_cache(&path, &seed).unwrap();
        assert_eq!(load_seed_cache(&path, "sig"), Some(seed));
        assert!(load_seed_cache(&path, "nope").is_none());
    }

    #[test]
    fn apply_accepts_a_clean_seed() {
        let seed = seed_of(vec![entry("a", 0, 0, 8, 8), entry("b", 8, 0, 4, 4)], 0, 12, 8);
        let sprites = vec![Sprite::new("a", 8, 8), Sprite::new("b", 4, 4)];
        let (placed, w, h) = try_apply_seed(&seed, 0, 100, 100, &sprites).unwrap();
        assert_eq!((w, h), (12, 8));
        assert_eq!((placed[1].x, placed[1].y), (8, 0));
    }

    #[test]
    fn apply_rejects_changed_dimensions() {
        let seed = seed_of(vec![entry("a", 0, 0, 8, 8)], 0, 8, 8);
        let sprites = vec![Sprite::new("a", 9, 8)];
        assert!(try_apply_seed(&seed, 0, 100, 100, &sprites).is_none());
    }

    #[test]
    fn apply_rejects_overlaps() {
        let seed = seed_of(vec![entry("a", 0, 0, 8, 8), entry("b", 4, 4, 8, 8)], 0, 12, 12);
        let sprites = vec![Sprite::new("a", 8, 8), Sprite::new("b", 8, 8)];
        assert!(try_apply_seed(&seed, 0, 100, 100, &sprites).is_none());
    }

    #[test]
    fn apply_respects_padded_bounds() {
        let seed = seed_of(vec![entry("a", 0, 0, 8, 8)], 2, 10, 10);
        let sprites = vec![Sprite::new("a", 8, 8)];
        assert!(try_apply_seed(&seed, 2, 10, 10, &sprites).is_some());
        assert!(try_apply_seed(&seed, 2, 9, 10, &sprites).is_none());
    }
}
