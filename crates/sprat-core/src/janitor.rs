//! Cache janitor: deletes leftover `.tmp` files, evicts cache files past
//! the age limit, and keeps only the N most recently modified files per
//! family. The temp directory is treated as eventually consistent; every
//! failure here is swallowed with at most a debug note.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

const LAYOUT_GROUP_SUFFIX: &str = ".layout.";
const SEED_GROUP_SUFFIX: &str = ".seed.";

/// True when the file is missing, unreadable, or older than `max_age_secs`.
/// An mtime in the future counts as fresh.
pub fn is_stale(path: &Path, max_age_secs: u64) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return true;
    };
    let Ok(mtime) = meta.modified() else {
        return true;
    };
    match SystemTime::now().duration_since(mtime) {
        Ok(age) => age.as_secs() > max_age_secs,
        Err(_) => false,
    }
}

fn prune_group(base: &Path, suffix: &str, max_age_secs: u64, max_files_to_keep: usize) {
    if max_files_to_keep == 0 {
        return;
    }
    let Some(parent) = base.parent() else {
        return;
    };
    let Some(base_name) = base.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return;
    };
    let prefix = format!("{base_name}{suffix}");
    let Ok(dir) = fs::read_dir(parent) else {
        return;
    };

    let now = SystemTime::now();
    let mut keep: Vec<(PathBuf, SystemTime)> = Vec::new();

    for entry in dir.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) {
            continue;
        }
        if name.ends_with(".tmp") {
            let _ = fs::remove_file(&path);
            continue;
        }
        let Ok(mtime) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        let expired = now
            .duration_since(mtime)
            .map(|age| age.as_secs() > max_age_secs)
            .unwrap_or(false);
        if expired {
            debug!(path = %path.display(), "removing expired cache file");
            let _ = fs::remove_file(&path);
            continue;
        }
        keep.push((path, mtime));
    }

    if keep.len() <= max_files_to_keep {
        return;
    }
    keep.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (path, _) in keep.drain(max_files_to_keep..) {
        let _ = fs::remove_file(&path);
    }
}

/// Prunes the layout and seed families derived from one base cache path.
pub fn prune_cache_family(
    base: &Path,
    max_age_secs: u64,
    max_layout_files: usize,
    max_seed_files: usize,
) {
    prune_group(base, LAYOUT_GROUP_SUFFIX, max_age_secs, max_layout_files);
    prune_group(base, SEED_GROUP_SUFFIX, max_age_secs, max_seed_files);
}

/// Prunes every cache family found under the cache root, including families
/// left behind by inputs that no longer exist.
pub fn prune_all_cache_families(
    root: &Path,
    max_age_secs: u64,
    max_layout_files: usize,
    max_seed_files: usize,
) {
    let Ok(dir) = fs::read_dir(root) else {
        return;
    };

    let mut bases = std::collections::HashSet::new();
    for entry in dir.flatten() {
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("spratlayout_") {
            continue;
        }
        let marker = name
            .find(".cache.layout.")
            .or_else(|| name.find(".cache.seed."));
        let Some(marker) = marker else {
            continue;
        };
        bases.insert(root.join(&name[..marker + ".cache".len()]));
    }

    for base in bases {
        prune_cache_family(&base, max_age_secs, max_layout_files, max_seed_files);
    }
}

/// Removes flat `spratlayout_*.cache*` files written by earlier releases
/// straight into the temp directory.
pub fn remove_legacy_cache_files(temp_root: &Path, active_root: &Path) {
    if temp_root == active_root {
        return;
    }
    let Ok(dir) = fs::read_dir(temp_root) else {
        return;
    };
    for entry in dir.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("spratlayout_") && name.contains(".cache") {
            let _ = fs::remove_file(&path);
        }
    }
}
