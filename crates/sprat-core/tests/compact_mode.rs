use rand::{Rng, SeedableRng};
use sprat_core::prelude::*;
use sprat_core::search::search;

fn random_sprites(seed: u64, count: u32, max_side: u32) -> Vec<Sprite> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let w = rng.gen_range(2..=max_side);
            let h = rng.gen_range(2..=max_side);
            Sprite::new(format!("r{i}.png"), w, h)
        })
        .collect()
}

fn compact_config() -> LayoutConfig {
    LayoutConfig::builder().mode(Mode::Compact).build()
}

fn assert_valid(result: &SearchResult, padding: u32) {
    for s in &result.sprites {
        assert!(s.x + s.w <= result.width);
        assert!(s.y + s.h <= result.height);
    }
    for i in 0..result.sprites.len() {
        for j in (i + 1)..result.sprites.len() {
            let a = &result.sprites[i];
            let b = &result.sprites[j];
            let overlap = !(a.x + a.w + padding <= b.x
                || b.x + b.w + padding <= a.x
                || a.y + a.h + padding <= b.y
                || b.y + b.h + padding <= a.y);
            assert!(!overlap, "padded overlap between {a:?} and {b:?}");
        }
    }
}

#[test]
fn places_everything_disjointly() {
    let sprites = random_sprites(42, 80, 48);
    let result = search(&sprites, &compact_config(), None).unwrap();
    assert_eq!(result.sprites.len(), sprites.len());
    assert_valid(&result, 0);
    assert!(result.best_gpu.is_some());
    assert!(result.best_space.is_some());
}

#[test]
fn same_options_give_identical_layouts() {
    let sprites = random_sprites(9, 60, 40);
    let cfg = LayoutConfig {
        threads: 2,
        ..compact_config()
    };
    let a = search(&sprites, &cfg, None).unwrap();
    let b = search(&sprites, &cfg, None).unwrap();
    assert_eq!((a.width, a.height), (b.width, b.height));
    assert_eq!(a.sprites, b.sprites);
}

#[test]
fn thread_count_does_not_change_the_winning_metrics() {
    let sprites = random_sprites(1234, 70, 36);
    for objective in [Objective::Gpu, Objective::Space] {
        let mut results = Vec::new();
        for threads in [1usize, 2, 4] {
            let cfg = LayoutConfig {
                threads,
                objective,
                ..compact_config()
            };
            let r = search(&sprites, &cfg, None).unwrap();
            assert_valid(&r, 0);
            results.push((r.width, r.height));
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }
}

#[test]
fn space_objective_never_loses_area_to_gpu() {
    let sprites = random_sprites(77, 50, 32);
    let gpu_cfg = LayoutConfig {
        objective: Objective::Gpu,
        ..compact_config()
    };
    let space_cfg = LayoutConfig {
        objective: Objective::Space,
        ..compact_config()
    };
    let gpu = search(&sprites, &gpu_cfg, None).unwrap();
    let space = search(&sprites, &space_cfg, None).unwrap();
    let gpu_area = u64::from(gpu.width) * u64::from(gpu.height);
    let space_area = u64::from(space.width) * u64::from(space.height);
    assert!(space_area <= gpu_area);
    assert!(gpu.width.max(gpu.height) <= space.width.max(space.height));
}

#[test]
fn padding_never_shrinks_the_atlas() {
    let sprites = random_sprites(5, 30, 24);
    let bare = search(&sprites, &compact_config(), None).unwrap();
    let padded_cfg = LayoutConfig {
        padding: 3,
        ..compact_config()
    };
    let padded = search(&sprites, &padded_cfg, None).unwrap();
    assert_valid(&padded, 3);
    let bare_area = u64::from(bare.width) * u64::from(bare.height);
    let padded_area = u64::from(padded.width) * u64::from(padded.height);
    assert!(padded_area >= bare_area);
}

#[test]
fn a_tiny_budget_still_produces_a_layout() {
    let sprites = random_sprites(3, 40, 30);
    let cfg = LayoutConfig {
        max_combinations: 4,
        ..compact_config()
    };
    let result = search(&sprites, &cfg, None).unwrap();
    assert_valid(&result, 0);
}

#[test]
fn an_exhausted_budget_fails_with_no_fit() {
    // One combination: the seed-width attempt (width 6, height cap 4)
    // cannot hold two 4x4 sprites, and the budget blocks every retry.
    let cfg = LayoutConfig {
        max_combinations: 1,
        max_height: Some(4),
        ..compact_config()
    };
    let sprites = vec![Sprite::new("a.png", 4, 4), Sprite::new("b.png", 4, 4)];
    match search(&sprites, &cfg, None) {
        Err(SpratError::NoFit) => {}
        other => panic!("expected NoFit, got {other:?}"),
    }
}

#[test]
fn single_sprite_compact() {
    let sprites = vec![Sprite::new("only.png", 12, 7)];
    let result = search(&sprites, &compact_config(), None).unwrap();
    assert_eq!((result.width, result.height), (12, 7));
    assert_eq!((result.sprites[0].x, result.sprites[0].y), (0, 0));
}
