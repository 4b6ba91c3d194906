//! End-to-end layout pipeline: caches in front, search in the middle,
//! canonical text out. Mirrors the CLI contract: the same bytes go to
//! stdout and into the layout cache.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::cache::{
    self, CACHE_MAX_AGE_SECS, ImageCacheEntry, MAX_LAYOUT_CACHE_FILES, MAX_SEED_CACHE_FILES,
};
use crate::config::{LayoutConfig, Objective};
use crate::error::{Result, SpratError};
use crate::janitor;
use crate::layout_cache::{self, SeedLayout};
use crate::measure;
use crate::model::{AtlasLayout, ImageSource, Sprite};
use crate::output;
use crate::search;
use crate::signature;

/// One layout invocation.
pub struct LayoutRequest {
    pub sources: Vec<ImageSource>,
    pub config: LayoutConfig,
    /// List-file inputs: a source that cannot be measured is fatal instead
    /// of skipped.
    pub strict_sources: bool,
    /// Canonical identity of the input set (folder or list file); keys the
    /// image-cache filename.
    pub input_identity: PathBuf,
    /// Cache directory override; `None` uses `<system-tempdir>/sprat/`.
    pub cache_root: Option<PathBuf>,
}

pub struct LayoutOutcome {
    /// Canonical layout text, exactly as written to the output cache.
    pub text: String,
    /// Structured layout; `None` when served from the output cache.
    pub layout: Option<AtlasLayout>,
    pub cache_hit: bool,
}

fn scale_dimension(value: u32, scale: f64) -> Option<u32> {
    let scaled = f64::from(value) * scale;
    if !scaled.is_finite() || scaled > f64::from(u32::MAX) {
        return None;
    }
    Some((scaled.round() as u32).max(1))
}

pub fn run(request: LayoutRequest) -> Result<LayoutOutcome> {
    let LayoutRequest {
        sources,
        config: cfg,
        strict_sources,
        input_identity,
        cache_root,
    } = request;

    cfg.validate()?;
    if sources.is_empty() {
        return Err(SpratError::Empty);
    }

    let using_default_root = cache_root.is_none();
    let root = cache_root.unwrap_or_else(cache::default_cache_root);
    if using_default_root {
        janitor::remove_legacy_cache_files(&std::env::temp_dir(), &root);
    }
    janitor::prune_all_cache_families(
        &root,
        CACHE_MAX_AGE_SECS,
        MAX_LAYOUT_CACHE_FILES,
        MAX_SEED_CACHE_FILES,
    );
    let base_cache_path = cache::image_cache_path(&root, &input_identity);

    let layout_sig = signature::layout_signature(&cfg, &sources);
    let seed_sig = signature::seed_signature(&cfg, &sources);
    let output_path = layout_cache::output_cache_path(&base_cache_path, &layout_sig);
    let seed_path = layout_cache::seed_cache_path(&base_cache_path, &seed_sig);

    if !janitor::is_stale(&output_path, CACHE_MAX_AGE_SECS) {
        if let Some(text) = layout_cache::load_output_cache(&output_path, &layout_sig) {
            debug!(signature = %layout_sig, "serving layout from the output cache");
            return Ok(LayoutOutcome {
                text,
                layout: None,
                cache_hit: true,
            });
        }
    }

    let now = cache::now_unix();
    let mut entries = cache::load_image_cache(&base_cache_path);
    cache::prune_stale_entries(&mut entries, now, CACHE_MAX_AGE_SECS);

    let mut sprites: Vec<Sprite> = Vec::with_capacity(sources.len());
    for source in &sources {
        let key = (source.path.clone(), cfg.trim_transparent);
        if let Some(entry) = entries.get_mut(&key) {
            if entry.file_size == source.meta.file_size
                && entry.mtime_ticks == source.meta.mtime_ticks
            {
                let mut sprite = Sprite::new(source.path.clone(), entry.w, entry.h);
                sprite.trim_left = entry.trim_left;
                sprite.trim_top = entry.trim_top;
                sprite.trim_right = entry.trim_right;
                sprite.trim_bottom = entry.trim_bottom;
                sprites.push(sprite);
                entry.cached_at = now;
                continue;
            }
        }

        match measure::measure(&source.file_path, cfg.trim_transparent) {
            Ok(m) => {
                let mut sprite = Sprite::new(source.path.clone(), m.w, m.h);
                sprite.trim_left = m.trim_left;
                sprite.trim_top = m.trim_top;
                sprite.trim_right = m.trim_right;
                sprite.trim_bottom = m.trim_bottom;
                sprites.push(sprite);
                entries.insert(
                    key,
                    ImageCacheEntry {
                        file_size: source.meta.file_size,
                        mtime_ticks: source.meta.mtime_ticks,
                        w: m.w,
                        h: m.h,
                        trim_left: m.trim_left,
                        trim_top: m.trim_top,
                        trim_right: m.trim_right,
                        trim_bottom: m.trim_bottom,
                        cached_at: now,
                    },
                );
            }
            Err(err) if strict_sources => return Err(err),
            Err(err) => {
                warn!(path = %source.path, error = %err, "skipping unreadable image");
            }
        }
    }

    if let Err(err) = cache::save_image_cache(&base_cache_path, &entries) {
        warn!(error = %err, "failed to write the image cache");
    }

    if sprites.is_empty() {
        return Err(SpratError::InvalidInput("no valid images found".into()));
    }

    if cfg.scale != 1.0 {
        for sprite in &mut sprites {
            sprite.w = scale_dimension(sprite.w, cfg.scale).ok_or(SpratError::Overflow {
                what: "scaled width",
                path: sprite.path.clone(),
            })?;
            sprite.h = scale_dimension(sprite.h, cfg.scale).ok_or(SpratError::Overflow {
                what: "scaled height",
                path: sprite.path.clone(),
            })?;
        }
    }

    let bounds = search::compute_bounds(&sprites, &cfg)?;

    // Seed reuse: apply directly when the padding matches and every check
    // passes; otherwise keep the atlas width (widened by any padding delta)
    // as a search hint. Failures here are silent.
    let mut applied: Option<(Vec<Sprite>, u32, u32)> = None;
    let mut hint_width: Option<u32> = None;
    if !janitor::is_stale(&seed_path, CACHE_MAX_AGE_SECS) {
        if let Some(seed) = layout_cache::load_seed_cache(&seed_path, &seed_sig) {
            if seed.padding == cfg.padding {
                applied = layout_cache::try_apply_seed(
                    &seed,
                    cfg.padding,
                    bounds.width_upper,
                    bounds.height_upper,
                    &sprites,
                );
            }
            if applied.is_none() {
                let mut width = seed.atlas_width;
                if cfg.padding > seed.padding {
                    width = width.saturating_add(cfg.padding - seed.padding);
                }
                hint_width = Some(width);
            } else {
                debug!(signature = %seed_sig, "reusing seed layout");
            }
        }
    }

    let (placed, mut atlas_width, mut atlas_height, best_gpu, best_space) = match applied {
        Some((placed, width, height)) => (placed, width, height, None, None),
        None => {
            let result = search::search(&sprites, &cfg, hint_width)?;
            (
                result.sprites,
                result.width,
                result.height,
                result.best_gpu,
                result.best_space,
            )
        }
    };

    // Padding inflates the packing target; recompute the tight extent.
    if cfg.padding > 0 {
        let (width, height) = search::tight_bounds(&placed)?;
        atlas_width = width;
        atlas_height = height;
    }

    let seed = SeedLayout::from_sprites(
        seed_sig.clone(),
        cfg.padding,
        atlas_width,
        atlas_height,
        &placed,
    );
    if let Err(err) = layout_cache::save_seed_cache(&seed_path, &seed) {
        warn!(error = %err, "failed to write the seed cache");
    }

    let text = output::encode_layout(
        atlas_width,
        atlas_height,
        cfg.scale,
        cfg.trim_transparent,
        &placed,
    );
    if let Err(err) = layout_cache::save_output_cache(&output_path, &layout_sig, &text) {
        warn!(error = %err, "failed to write the output cache");
    }

    // The compact search tracked both objectives; prewarm the cache entry
    // the flipped objective would have produced.
    if let (Some(gpu), Some(space)) = (&best_gpu, &best_space) {
        let other_cfg = LayoutConfig {
            objective: cfg.objective.flipped(),
            ..cfg.clone()
        };
        let other_sig = signature::layout_signature(&other_cfg, &sources);
        if other_sig != layout_sig {
            let other = match other_cfg.objective {
                Objective::Gpu => gpu,
                Objective::Space => space,
            };
            let (mut width, mut height) = (other.width, other.height);
            if cfg.padding > 0 {
                if let Ok(tight) = search::tight_bounds(&other.sprites) {
                    (width, height) = tight;
                }
            }
            let other_text = output::encode_layout(
                width,
                height,
                other_cfg.scale,
                other_cfg.trim_transparent,
                &other.sprites,
            );
            let other_path = layout_cache::output_cache_path(&base_cache_path, &other_sig);
            let _ = layout_cache::save_output_cache(&other_path, &other_sig, &other_text);
        }
    }

    janitor::prune_cache_family(
        &base_cache_path,
        CACHE_MAX_AGE_SECS,
        MAX_LAYOUT_CACHE_FILES,
        MAX_SEED_CACHE_FILES,
    );

    Ok(LayoutOutcome {
        text,
        layout: Some(AtlasLayout {
            width: atlas_width,
            height: atlas_height,
            scale: cfg.scale,
            sprites: placed,
        }),
        cache_hit: false,
    })
}
