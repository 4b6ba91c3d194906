//! Search orchestrator: explores a bounded space of
//! (sort order, heuristic, width) combinations per mode, ranks candidates
//! under the configured objective, and parallelizes the compact width sweep
//! across a fixed worker pool.
//!
//! Every kernel invocation works on its own sprite-list copy; the only
//! shared mutable state during a search is the atomic combination budget.
//! Per-worker bests are merged in worker order with the same strict
//! comparator, so the selected layout does not depend on scheduling.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::config::{LayoutConfig, Mode, Objective, RectHeuristic, SortOrder};
use crate::error::{Result, SpratError};
use crate::model::Sprite;
use crate::packer::{self, COMPACT_SORT_ORDERS, guillotine, maxrects, shelf};

/// Indices into the pre-sorted lists used by the guided width sweep:
/// height, area, max side. A subset of the seed sweep, ordered by how
/// often they win.
const GUIDED_SORT_INDICES: [usize; 3] = [2, 0, 1];

const SEED_HEURISTICS: [RectHeuristic; 3] = [
    RectHeuristic::BestShortSideFit,
    RectHeuristic::BestAreaFit,
    RectHeuristic::BottomLeft,
];

const GUIDED_HEURISTICS: [RectHeuristic; 2] = [
    RectHeuristic::BestShortSideFit,
    RectHeuristic::BestAreaFit,
];

/// Offsets (in units of the derived step) probed around each width anchor.
const WIDTH_OFFSET_MULTIPLIERS: [i64; 11] = [0, -1, 1, -2, 2, -4, 4, -8, 8, -12, 12];

/// A complete placement attempt that packed every sprite.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub width: u32,
    pub height: u32,
    pub area: u64,
    pub sprites: Vec<Sprite>,
}

impl Candidate {
    fn new(width: u32, height: u32, sprites: Vec<Sprite>) -> Self {
        Self {
            width,
            height,
            area: u64::from(width) * u64::from(height),
            sprites,
        }
    }

    fn metrics(&self) -> Metrics {
        Metrics {
            width: self.width,
            height: self.height,
            area: self.area,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Metrics {
    width: u32,
    height: u32,
    area: u64,
}

impl Metrics {
    fn of(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            area: u64::from(width) * u64::from(height),
        }
    }
}

/// Strict "candidate beats best" comparator.
///
/// GPU: lower max side, then lower area, then lower |w - h|, then lower w.
/// SPACE: lower area, then lower max side, then lower |w - h|, then lower w.
fn prefers(objective: Objective, candidate: Metrics, best: Metrics) -> bool {
    let c_max = candidate.width.max(candidate.height);
    let b_max = best.width.max(best.height);
    let c_aspect = candidate.width.abs_diff(candidate.height);
    let b_aspect = best.width.abs_diff(best.height);

    match objective {
        Objective::Gpu => {
            if c_max != b_max {
                return c_max < b_max;
            }
            if candidate.area != best.area {
                return candidate.area < best.area;
            }
            if c_aspect != b_aspect {
                return c_aspect < b_aspect;
            }
            candidate.width < best.width
        }
        Objective::Space => {
            if candidate.area != best.area {
                return candidate.area < best.area;
            }
            if c_max != b_max {
                return c_max < b_max;
            }
            if c_aspect != b_aspect {
                return c_aspect < b_aspect;
            }
            candidate.width < best.width
        }
    }
}

/// Best candidate under each objective, tracked simultaneously so a single
/// search can also feed the opposite-objective prewarm cache.
#[derive(Debug, Default)]
struct BestPair {
    gpu: Option<Candidate>,
    space: Option<Candidate>,
}

impl BestPair {
    fn consider(&mut self, candidate: Candidate) {
        if candidate.width == 0 || candidate.height == 0 {
            return;
        }
        let metrics = candidate.metrics();
        let better_gpu = self
            .gpu
            .as_ref()
            .map_or(true, |best| prefers(Objective::Gpu, metrics, best.metrics()));
        let better_space = self
            .space
            .as_ref()
            .map_or(true, |best| prefers(Objective::Space, metrics, best.metrics()));
        if better_gpu && better_space {
            self.space = Some(candidate.clone());
            self.gpu = Some(candidate);
        } else if better_gpu {
            self.gpu = Some(candidate);
        } else if better_space {
            self.space = Some(candidate);
        }
    }

    fn merge(&mut self, other: BestPair) {
        if let Some(c) = other.gpu {
            self.consider(c);
        }
        if let Some(c) = other.space {
            self.consider(c);
        }
    }

    fn is_empty(&self) -> bool {
        self.gpu.is_none() && self.space.is_none()
    }
}

/// Global cap on kernel invocations. `fetch_add` plus a post-read compare;
/// in-flight invocations are never interrupted.
struct Budget {
    limit: u64,
    used: AtomicU64,
}

impl Budget {
    fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    /// Claims one invocation; false once the cap has been reached.
    fn consume(&self) -> bool {
        let previous = self.used.fetch_add(1, Ordering::Relaxed);
        self.limit == 0 || previous < self.limit
    }

    fn exhausted(&self) -> bool {
        self.limit != 0 && self.used.load(Ordering::Relaxed) >= self.limit
    }
}

/// Padded aggregate dimensions of the input set, with the effective search
/// bounds after applying the configured caps.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PackBounds {
    pub widest: u32,
    pub tallest: u32,
    pub total_area: u64,
    pub width_upper: u32,
    pub height_upper: u32,
}

pub(crate) fn compute_bounds(sprites: &[Sprite], cfg: &LayoutConfig) -> Result<PackBounds> {
    let mut widest = 0u32;
    let mut tallest = 0u32;
    let mut sum_width = 0u32;
    let mut sum_height = 0u32;
    let mut total_area = 0u64;

    for sprite in sprites {
        let (pw, ph) = sprite.padded_size(cfg.padding)?;
        let sprite_area = u64::from(pw)
            .checked_mul(u64::from(ph))
            .ok_or(SpratError::Overflow {
                what: "padded area",
                path: sprite.path.clone(),
            })?;
        total_area = total_area
            .checked_add(sprite_area)
            .ok_or(SpratError::Overflow {
                what: "total area",
                path: sprite.path.clone(),
            })?;
        widest = widest.max(pw);
        tallest = tallest.max(ph);
        sum_width = sum_width.checked_add(pw).ok_or(SpratError::Overflow {
            what: "summed width",
            path: sprite.path.clone(),
        })?;
        sum_height = sum_height.checked_add(ph).ok_or(SpratError::Overflow {
            what: "summed height",
            path: sprite.path.clone(),
        })?;
    }

    let mut width_upper = sum_width;
    let mut height_upper = sum_height;
    if let Some(cap) = cfg.max_width {
        width_upper = width_upper.min(cap);
    }
    if let Some(cap) = cfg.max_height {
        height_upper = height_upper.min(cap);
    }
    if widest > width_upper || tallest > height_upper {
        return Err(SpratError::InvalidConfig(
            "sprite dimensions exceed the atlas limits".into(),
        ));
    }

    Ok(PackBounds {
        widest,
        tallest,
        total_area,
        width_upper,
        height_upper,
    })
}

/// Width needed for a roughly square atlas: `ceil(sqrt(total area))`.
fn area_root_width(total_area: u64) -> Result<u32> {
    if total_area == 0 {
        return Ok(0);
    }
    let root = (total_area as f64).sqrt().ceil();
    if root > f64::from(u32::MAX) {
        return Err(SpratError::InvalidConfig(
            "total sprite area exceeds the addressable atlas width".into(),
        ));
    }
    Ok(root as u32)
}

fn next_power_of_two(v: u32) -> Result<u32> {
    v.checked_next_power_of_two()
        .ok_or_else(|| SpratError::InvalidConfig("power-of-two dimension overflow".into()))
}

/// Tight atlas extent: max `x + w` and `y + h` across placed sprites.
pub(crate) fn tight_bounds(sprites: &[Sprite]) -> Result<(u32, u32)> {
    let mut width = 0u32;
    let mut height = 0u32;
    for sprite in sprites {
        let x1 = sprite.x.checked_add(sprite.w).ok_or(SpratError::Overflow {
            what: "placed right edge",
            path: sprite.path.clone(),
        })?;
        let y1 = sprite.y.checked_add(sprite.h).ok_or(SpratError::Overflow {
            what: "placed bottom edge",
            path: sprite.path.clone(),
        })?;
        width = width.max(x1);
        height = height.max(y1);
    }
    if width == 0 || height == 0 {
        return Err(SpratError::NoFit);
    }
    Ok((width, height))
}

/// Outcome of one search. The compact mode also reports the best candidate
/// under each objective for prewarming.
#[derive(Debug)]
pub struct SearchResult {
    pub width: u32,
    pub height: u32,
    pub sprites: Vec<Sprite>,
    pub best_gpu: Option<Candidate>,
    pub best_space: Option<Candidate>,
}

/// Runs the mode-appropriate search. `seed_hint_width` is a warm-start
/// width from a previous run; it is only a hint and is ignored when out of
/// range.
pub fn search(
    sprites: &[Sprite],
    cfg: &LayoutConfig,
    seed_hint_width: Option<u32>,
) -> Result<SearchResult> {
    if sprites.is_empty() {
        return Err(SpratError::Empty);
    }
    let bounds = compute_bounds(sprites, cfg)?;

    match cfg.mode {
        Mode::Fast => {
            let (placed, width, height) = fast_search(sprites, cfg, &bounds, seed_hint_width)?;
            Ok(SearchResult {
                width,
                height,
                sprites: placed,
                best_gpu: None,
                best_space: None,
            })
        }
        Mode::Pot => {
            let (placed, width, height) = pot_search(sprites, cfg, &bounds)?;
            Ok(SearchResult {
                width,
                height,
                sprites: placed,
                best_gpu: None,
                best_space: None,
            })
        }
        Mode::Compact => compact_search(sprites, cfg, &bounds, seed_hint_width),
    }
}

/// FAST: descending-height shelf pass at an area-derived width, widening one
/// pixel at a time on failure.
fn fast_search(
    sprites: &[Sprite],
    cfg: &LayoutConfig,
    bounds: &PackBounds,
    seed_hint_width: Option<u32>,
) -> Result<(Vec<Sprite>, u32, u32)> {
    let mut target_width = bounds.widest.max(area_root_width(bounds.total_area)?);
    target_width = target_width.min(bounds.width_upper);
    if let Some(hint) = seed_hint_width {
        if hint > target_width && hint <= bounds.width_upper {
            target_width = hint;
        }
    }

    let mut sorted = sprites.to_vec();
    packer::sort_sprites(&mut sorted, SortOrder::HeightDesc);

    for width in target_width..=bounds.width_upper {
        let mut trial = sorted.clone();
        let Some((packed_w, packed_h)) = shelf::pack(&mut trial, width, cfg.padding) else {
            continue;
        };
        if packed_h > bounds.height_upper {
            continue;
        }
        return Ok((trial, packed_w, packed_h));
    }
    Err(SpratError::NoFit)
}

/// POT: find the smallest square side any sort order can pack, then sweep
/// every power-of-two rectangle whose area does not exceed that square,
/// keeping the winner under the configured objective.
fn pot_search(
    sprites: &[Sprite],
    cfg: &LayoutConfig,
    bounds: &PackBounds,
) -> Result<(Vec<Sprite>, u32, u32)> {
    let min_pot_width = next_power_of_two(bounds.widest)?;
    let min_pot_height = next_power_of_two(bounds.tallest)?;

    let mut side = min_pot_width.max(min_pot_height);
    let mut best = loop {
        if cfg.max_width.is_some_and(|cap| side > cap)
            || cfg.max_height.is_some_and(|cap| side > cap)
        {
            return Err(SpratError::NoFit);
        }
        let mut packed = None;
        for order in COMPACT_SORT_ORDERS {
            let mut trial = sprites.to_vec();
            packer::sort_sprites(&mut trial, order);
            if guillotine::try_pack(&mut trial, side, side, cfg.padding) {
                packed = Some(Candidate::new(side, side, trial));
                break;
            }
        }
        if let Some(candidate) = packed {
            break candidate;
        }
        side = side
            .checked_mul(2)
            .ok_or_else(|| SpratError::InvalidConfig("atlas dimensions overflow".into()))?;
    };
    let max_candidate_area = best.area;

    let mut pot_widths = Vec::new();
    let mut w = min_pot_width;
    while u64::from(w) <= max_candidate_area {
        pot_widths.push(w);
        match w.checked_mul(2) {
            Some(next) => w = next,
            None => break,
        }
    }
    let mut pot_heights = Vec::new();
    let mut h = min_pot_height;
    while u64::from(h) <= max_candidate_area {
        pot_heights.push(h);
        match h.checked_mul(2) {
            Some(next) => h = next,
            None => break,
        }
    }

    for &w in &pot_widths {
        for &h in &pot_heights {
            let metrics = Metrics::of(w, h);
            if metrics.area > max_candidate_area {
                continue;
            }
            if cfg.max_width.is_some_and(|cap| w > cap) || cfg.max_height.is_some_and(|cap| h > cap)
            {
                continue;
            }
            if !prefers(cfg.objective, metrics, best.metrics()) {
                continue;
            }
            for order in COMPACT_SORT_ORDERS {
                let mut trial = sprites.to_vec();
                packer::sort_sprites(&mut trial, order);
                if guillotine::try_pack(&mut trial, w, h, cfg.padding) {
                    best = Candidate::new(w, h, trial);
                    break;
                }
            }
        }
    }

    debug!(width = best.width, height = best.height, "pot search settled");
    Ok((best.sprites, best.width, best.height))
}

/// Builds the guided list of candidate widths: the anchors themselves plus
/// stepped offsets around each, clamped to `[widest, width_upper]`,
/// de-duplicated and sorted ascending.
fn width_candidates(
    anchors: [u32; 3],
    extra: Option<u32>,
    widest: u32,
    width_upper: u32,
) -> Vec<u32> {
    let mut seen = std::collections::HashSet::new();
    let mut widths = Vec::new();
    let mut add = |width: i64| {
        if width < i64::from(widest) || width > i64::from(width_upper) {
            return;
        }
        let width = width as u32;
        if seen.insert(width) {
            widths.push(width);
        }
    };

    for anchor in anchors {
        add(i64::from(anchor));
    }
    if let Some(width) = extra {
        add(i64::from(width));
    }

    let range = i64::from(width_upper.saturating_sub(widest)).max(1);
    let step = (range / 24).max(8);
    for anchor in anchors {
        for mul in WIDTH_OFFSET_MULTIPLIERS {
            add(i64::from(anchor) + mul * step);
        }
    }

    widths.sort_unstable();
    widths
}

/// Contiguous near-even partition of the width list, one slice per worker.
fn partition(widths: &[u32], worker_count: usize) -> Vec<&[u32]> {
    (0..worker_count)
        .map(|i| {
            let begin = widths.len() * i / worker_count;
            let end = widths.len() * (i + 1) / worker_count;
            &widths[begin..end]
        })
        .collect()
}

fn evaluate_maxrects_chunk(
    widths: &[u32],
    sorted: &[Vec<Sprite>],
    padding: u32,
    height_upper: u32,
    budget: &Budget,
) -> BestPair {
    let mut local = BestPair::default();
    'widths: for &width in widths {
        for sort_idx in GUIDED_SORT_INDICES {
            let list = &sorted[sort_idx];
            for heuristic in GUIDED_HEURISTICS {
                if !budget.consume() {
                    break 'widths;
                }
                let mut trial = list.clone();
                let Some((used_w, used_h)) =
                    maxrects::pack(&mut trial, width, height_upper, padding, heuristic)
                else {
                    continue;
                };
                local.consider(Candidate::new(used_w, used_h, trial));
            }
        }
    }
    local
}

fn evaluate_shelf_chunk(
    widths: &[u32],
    sorted: &[Vec<Sprite>],
    padding: u32,
    height_upper: u32,
    budget: &Budget,
) -> BestPair {
    let mut local = BestPair::default();
    'widths: for &width in widths {
        for sort_idx in GUIDED_SORT_INDICES {
            if !budget.consume() {
                break 'widths;
            }
            let mut trial = sorted[sort_idx].clone();
            let Some((shelf_w, shelf_h)) = shelf::pack(&mut trial, width, padding) else {
                continue;
            };
            if shelf_h > height_upper {
                continue;
            }
            local.consider(Candidate::new(shelf_w, shelf_h, trial));
        }
    }
    local
}

/// COMPACT: seed sweep at an area-derived width, then a guided width sweep
/// (MaxRects, then shelf as a cross-check) parallelized across workers.
fn compact_search(
    sprites: &[Sprite],
    cfg: &LayoutConfig,
    bounds: &PackBounds,
    seed_hint_width: Option<u32>,
) -> Result<SearchResult> {
    let budget = Budget::new(cfg.max_combinations);
    let padding = cfg.padding;

    let sorted: Vec<Vec<Sprite>> = COMPACT_SORT_ORDERS
        .iter()
        .map(|&order| {
            let mut list = sprites.to_vec();
            packer::sort_sprites(&mut list, order);
            list
        })
        .collect();

    let fast_target = bounds
        .widest
        .max(area_root_width(bounds.total_area)?)
        .min(bounds.width_upper)
        .max(bounds.widest);
    let mut seed_width = fast_target;
    let hint = seed_hint_width
        .filter(|&width| width >= bounds.widest && width <= bounds.width_upper);
    if let Some(width) = hint {
        seed_width = width;
    }

    let mut best = BestPair::default();

    // Seed sweep: every sort order and heuristic at the seed width.
    'seed: for list in &sorted {
        for heuristic in SEED_HEURISTICS {
            if !budget.consume() {
                break 'seed;
            }
            let mut trial = list.clone();
            let Some((used_w, used_h)) =
                maxrects::pack(&mut trial, seed_width, bounds.height_upper, padding, heuristic)
            else {
                continue;
            };
            best.consider(Candidate::new(used_w, used_h, trial));
        }
    }

    if best.is_empty() {
        return Err(SpratError::NoFit);
    }

    let widths = width_candidates(
        [seed_width, fast_target, bounds.widest],
        hint,
        bounds.widest,
        bounds.width_upper,
    );
    debug!(
        candidates = widths.len(),
        seed_width, fast_target, "compact width sweep"
    );

    if !budget.exhausted() && !widths.is_empty() {
        let host_threads = std::thread::available_parallelism().map_or(1, |n| n.get());
        let requested = if cfg.threads > 0 {
            cfg.threads
        } else {
            host_threads
        };
        let worker_count = requested.min(widths.len()).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .map_err(|e| SpratError::InvalidConfig(format!("worker pool: {e}")))?;

        let chunks = partition(&widths, worker_count);
        let maxrects_bests: Vec<BestPair> = pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| {
                    evaluate_maxrects_chunk(chunk, &sorted, padding, bounds.height_upper, &budget)
                })
                .collect()
        });
        for pair in maxrects_bests {
            best.merge(pair);
        }

        // Shelf cross-check at the same widths; a shelf layout occasionally
        // beats MaxRects under the GPU shape rule.
        if !budget.exhausted() {
            let shelf_bests: Vec<BestPair> = pool.install(|| {
                chunks
                    .par_iter()
                    .map(|chunk| {
                        evaluate_shelf_chunk(chunk, &sorted, padding, bounds.height_upper, &budget)
                    })
                    .collect()
            });
            for pair in shelf_bests {
                best.merge(pair);
            }
        }
    }

    let BestPair { gpu, space } = best;
    let selected = match cfg.objective {
        Objective::Gpu => gpu.clone().or_else(|| space.clone()),
        Objective::Space => space.clone().or_else(|| gpu.clone()),
    }
    .ok_or(SpratError::NoFit)?;

    Ok(SearchResult {
        width: selected.width,
        height: selected.height,
        sprites: selected.sprites,
        best_gpu: gpu,
        best_space: space,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_objective_prefers_square_shapes() {
        let squarish = Metrics::of(32, 32);
        let wide = Metrics::of(64, 16);
        assert!(prefers(Objective::Gpu, squarish, wide));
        assert!(!prefers(Objective::Gpu, wide, squarish));
    }

    #[test]
    fn space_objective_prefers_smaller_area() {
        let tight = Metrics::of(16, 32);
        let loose = Metrics::of(32, 32);
        assert!(prefers(Objective::Space, tight, loose));
        assert!(!prefers(Objective::Space, loose, tight));
    }

    #[test]
    fn ranking_is_a_strict_order() {
        let m = Metrics::of(20, 20);
        assert!(!prefers(Objective::Gpu, m, m));
        assert!(!prefers(Objective::Space, m, m));
    }

    #[test]
    fn budget_caps_consumption() {
        let budget = Budget::new(2);
        assert!(budget.consume());
        assert!(budget.consume());
        assert!(!budget.consume());
        assert!(budget.exhausted());
    }

    #[test]
    fn unlimited_budget_never_exhausts() {
        let budget = Budget::new(0);
        for _ in 0..100 {
            assert!(budget.consume());
        }
        assert!(!budget.exhausted());
    }

    #[test]
    fn width_candidates_are_sorted_and_bounded() {
        let widths = width_candidates([40, 60, 20], Some(55), 20, 100);
        assert!(!widths.is_empty());
        let mut prev = 0;
        for &w in &widths {
            assert!((20..=100).contains(&w));
            assert!(w > prev);
            prev = w;
        }
        assert!(widths.contains(&55));
    }

    #[test]
    fn partition_covers_every_width() {
        let widths: Vec<u32> = (0..10).collect();
        let chunks = partition(&widths, 3);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, widths.len());
        assert_eq!(chunks.len(), 3);
    }
}
