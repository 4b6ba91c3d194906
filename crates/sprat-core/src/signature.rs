//! Content-derived signatures keying the persistent caches.
//!
//! A signature hashes the resolved options plus the multiset of
//! `(path, byte size, mtime)` fingerprints, so any input or option change
//! produces a different cache key. The seed signature omits padding: a run
//! with a different padding can still warm-start from the same seed family.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use crate::config::LayoutConfig;
use crate::model::ImageSource;

fn source_parts(cfg: &LayoutConfig, sources: &[ImageSource]) -> Vec<String> {
    let mut parts: Vec<String> = sources
        .iter()
        .map(|s| format!("{}|{}|{}", s.path, s.meta.file_size, s.meta.mtime_ticks))
        .collect();
    if !cfg.preserve_source_order {
        parts.sort();
    }
    parts
}

fn hash_hex(canonical: &str) -> String {
    let mut hasher = DefaultHasher::new();
    hasher.write(canonical.as_bytes());
    format!("{:x}", hasher.finish())
}

fn build(cfg: &LayoutConfig, sources: &[ImageSource], include_padding: bool) -> String {
    let mut canonical = format!(
        "{}|{}|{}|{}|{}",
        cfg.profile,
        cfg.mode.as_str(),
        cfg.objective.as_str(),
        cfg.max_width.unwrap_or(0),
        cfg.max_height.unwrap_or(0),
    );
    if include_padding {
        canonical.push_str(&format!("|{}", cfg.padding));
    }
    canonical.push_str(&format!(
        "|{}|{}|{}|{}",
        cfg.max_combinations,
        cfg.scale,
        u8::from(cfg.trim_transparent),
        u8::from(cfg.preserve_source_order),
    ));
    for part in source_parts(cfg, sources) {
        canonical.push('\n');
        canonical.push_str(&part);
    }
    hash_hex(&canonical)
}

/// Signature of the exact output: every option and every fingerprint.
pub fn layout_signature(cfg: &LayoutConfig, sources: &[ImageSource]) -> String {
    build(cfg, sources, true)
}

/// Weaker signature keying the warm-start seed; identical to the layout
/// signature except that padding is left out.
pub fn seed_signature(cfg: &LayoutConfig, sources: &[ImageSource]) -> String {
    build(cfg, sources, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageMeta;
    use std::path::PathBuf;

    fn source(path: &str, size: u64, mtime: u64) -> ImageSource {
        ImageSource {
            file_path: PathBuf::from(path),
            path: path.into(),
            meta: ImageMeta {
                file_size: size,
                mtime_ticks: mtime,
            },
        }
    }

    #[test]
    fn padding_changes_layout_but_not_seed_signature() {
        let sources = [source("a.png", 10, 1), source("b.png", 20, 2)];
        let base = LayoutConfig::default();
        let padded = LayoutConfig {
            padding: 4,
            ..base.clone()
        };
        assert_ne!(
            layout_signature(&base, &sources),
            layout_signature(&padded, &sources)
        );
        assert_eq!(
            seed_signature(&base, &sources),
            seed_signature(&padded, &sources)
        );
    }

    #[test]
    fn fingerprint_changes_invalidate() {
        let cfg = LayoutConfig::default();
        let a = [source("a.png", 10, 1)];
        let touched = [source("a.png", 10, 2)];
        let grown = [source("a.png", 11, 1)];
        assert_ne!(layout_signature(&cfg, &a), layout_signature(&cfg, &touched));
        assert_ne!(layout_signature(&cfg, &a), layout_signature(&cfg, &grown));
    }

    #[test]
    fn source_order_is_ignored_unless_preserved() {
        let ab = [source("a.png", 1, 1), source("b.png", 2, 2)];
        let ba = [source("b.png", 2, 2), source("a.png", 1, 1)];
        let cfg = LayoutConfig::default();
        assert_eq!(layout_signature(&cfg, &ab), layout_signature(&cfg, &ba));

        let ordered = LayoutConfig {
            preserve_source_order: true,
            ..cfg
        };
        assert_ne!(
            layout_signature(&ordered, &ab),
            layout_signature(&ordered, &ba)
        );
    }
}
