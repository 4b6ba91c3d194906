//! Per-input image-meta cache: one text file per input source so repeated
//! runs over unchanged inputs skip decoding entirely.
//!
//! File grammar (`spratlayout_cache 2` header, then one entry per line):
//! `"path" trim size mtime w h trim_left trim_top trim_right trim_bottom cached_at`
//! Writes go to a sibling `.tmp` and are renamed into place; readers treat a
//! missing file as empty.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SpratError};
use crate::text::{Scanner, push_quoted};

pub const CACHE_MAX_AGE_SECS: u64 = 3600;
pub const MAX_LAYOUT_CACHE_FILES: usize = 16;
pub const MAX_SEED_CACHE_FILES: usize = 8;

const IMAGE_CACHE_HEADER: &str = "spratlayout_cache 2";
const MAX_SANE_DIMENSION: u32 = 100_000;
const MAX_CACHE_ENTRIES: usize = 10_000;

/// Measurement snapshot for one `(path, trim flag)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCacheEntry {
    pub file_size: u64,
    pub mtime_ticks: u64,
    pub w: u32,
    pub h: u32,
    pub trim_left: u32,
    pub trim_top: u32,
    pub trim_right: u32,
    pub trim_bottom: u32,
    pub cached_at: u64,
}

/// Cache key: source path plus the trim flag the measurement was taken with.
pub type ImageCacheKey = (String, bool);

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The dedicated cache directory, `<system-tempdir>/sprat/`. Falls back to
/// the bare temp dir when the subdirectory cannot be created.
pub fn default_cache_root() -> PathBuf {
    let root = std::env::temp_dir().join("sprat");
    if fs::create_dir_all(&root).is_ok() {
        root
    } else {
        std::env::temp_dir()
    }
}

/// Image-cache file for one input identity (folder or list file):
/// `spratlayout_<hash>.cache` under the cache root.
pub fn image_cache_path(root: &Path, input_identity: &Path) -> PathBuf {
    let canonical = input_identity
        .canonicalize()
        .unwrap_or_else(|_| input_identity.to_path_buf());
    let mut hasher = DefaultHasher::new();
    hasher.write(canonical.to_string_lossy().as_bytes());
    root.join(format!("spratlayout_{:x}.cache", hasher.finish()))
}

fn sane_dims(w: u32, h: u32) -> bool {
    w > 0 && h > 0 && w <= MAX_SANE_DIMENSION && h <= MAX_SANE_DIMENSION
}

/// Loads the cache, tolerating a missing or malformed file (empty map).
pub fn load_image_cache(path: &Path) -> HashMap<ImageCacheKey, ImageCacheEntry> {
    let mut out = HashMap::new();
    let Ok(contents) = fs::read_to_string(path) else {
        return out;
    };
    let mut lines = contents.lines();
    if lines.next() != Some(IMAGE_CACHE_HEADER) {
        return out;
    }
    for line in lines {
        let mut sc = Scanner::new(line);
        let Some(entry_path) = sc.quoted() else {
            continue;
        };
        let parsed = (|| {
            let trim = sc.u32()? != 0;
            let entry = ImageCacheEntry {
                file_size: sc.u64()?,
                mtime_ticks: sc.u64()?,
                w: sc.u32()?,
                h: sc.u32()?,
                trim_left: sc.u32()?,
                trim_top: sc.u32()?,
                trim_right: sc.u32()?,
                trim_bottom: sc.u32()?,
                cached_at: sc.u64()?,
            };
            Some((trim, entry))
        })();
        if let Some((trim, entry)) = parsed {
            if sane_dims(entry.w, entry.h) {
                out.insert((entry_path, trim), entry);
            }
        }
    }
    out
}

/// Writes the cache atomically (temp then rename). Entries are written in
/// key order so identical contents produce identical files.
pub fn save_image_cache(
    path: &Path,
    entries: &HashMap<ImageCacheKey, ImageCacheEntry>,
) -> Result<()> {
    if entries.len() > MAX_CACHE_ENTRIES {
        return Err(SpratError::CacheIo(format!(
            "image cache exceeds {MAX_CACHE_ENTRIES} entries"
        )));
    }

    let mut keys: Vec<&ImageCacheKey> = entries.keys().collect();
    keys.sort();

    let mut body = String::new();
    body.push_str(IMAGE_CACHE_HEADER);
    body.push('\n');
    for key in keys {
        let entry = &entries[key];
        if !sane_dims(entry.w, entry.h) {
            continue;
        }
        push_quoted(&mut body, &key.0);
        let _ = write!(
            body,
            " {} {} {} {} {} {} {} {} {} {}\n",
            u8::from(key.1),
            entry.file_size,
            entry.mtime_ticks,
            entry.w,
            entry.h,
            entry.trim_left,
            entry.trim_top,
            entry.trim_right,
            entry.trim_bottom,
            entry.cached_at,
        );
    }

    write_atomic(path, body.as_bytes())
}

/// Temp-then-rename write shared by every cache family.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).map_err(|e| SpratError::CacheIo(e.to_string()))?;
    if let Err(first) = fs::rename(&tmp, path) {
        // Some platforms refuse to rename over an existing file.
        let _ = fs::remove_file(path);
        if fs::rename(&tmp, path).is_err() {
            let _ = fs::remove_file(&tmp);
            return Err(SpratError::CacheIo(first.to_string()));
        }
    }
    Ok(())
}

/// Evicts entries past the age limit or stamped in the future.
pub fn prune_stale_entries(
    entries: &mut HashMap<ImageCacheKey, ImageCacheEntry>,
    now_unix: u64,
    max_age_secs: u64,
) {
    entries.retain(|_, e| {
        e.cached_at > 0 && e.cached_at <= now_unix && now_unix - e.cached_at <= max_age_secs
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cached_at: u64) -> ImageCacheEntry {
        ImageCacheEntry {
            file_size: 100,
            mtime_ticks: 7,
            w: 32,
            h: 16,
            trim_left: 1,
            trim_top: 2,
            trim_right: 3,
            trim_bottom: 4,
            cached_at,
        }
    }

    #[test]
    fn round_trip_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spratlayout_test.cache");
        let mut entries = HashMap::new();
        entries.insert(("img a.png".to_string(), true), entry(50));
        entries.insert(("b\"quoted\".png".to_string(), false), entry(60));
        save_image_cache(&path, &entries).unwrap();
        let loaded = load_image_cache(&path);
        assert_eq!(loaded, entries);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_image_cache(&dir.path().join("nope.cache")).is_empty());
    }

    #[test]
    fn stale_and_future_entries_are_pruned() {
        let mut entries = HashMap::new();
        entries.insert(("fresh".to_string(), false), entry(990));
        entries.insert(("old".to_string(), false), entry(10));
        entries.insert(("future".to_string(), false), entry(5000));
        prune_stale_entries(&mut entries, 1000, 100);
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key(&("fresh".to_string(), false)));
    }

    #[test]
    fn nonsensical_dimensions_are_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spratlayout_bad.cache");
        let body = format!("{IMAGE_CACHE_HEADER}\n\"z.png\" 0 1 1 0 0 0 0 0 0 5\n");
        fs::write(&path, body).unwrap();
        assert!(load_image_cache(&path).is_empty());
    }
}
