use rand::{Rng, SeedableRng};
use sprat_core::prelude::*;
use sprat_core::search::search;

fn is_pow2(v: u32) -> bool {
    v != 0 && (v & (v - 1)) == 0
}

fn assert_disjoint_and_contained(result: &SearchResult, padding: u32) {
    for s in &result.sprites {
        assert!(s.x + s.w <= result.width, "{s:?} exceeds width {}", result.width);
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

fn pot_config(objective: Objective) -> LayoutConfig {
    LayoutConfig::builder()
        .mode(Mode::Pot)
        .objective(objective)
        .build()
}

#[test]
fn two_tens_pack_into_a_tall_pot_rectangle() {
    // 16x16 cannot hold two 10x10 cells under guillotine splits; the space
    // objective settles on 16x32.
    let sprites = vec![Sprite::new("a.png", 10, 10), Sprite::new("b.png", 10, 10)];
    let result = search(&sprites, &pot_config(Objective::Space), None).unwrap();
    assert_eq!((result.width, result.height), (16, 32));
    assert_eq!((result.sprites[0].x, result.sprites[0].y), (0, 0));
    assert_eq!((result.sprites[1].x, result.sprites[1].y), (0, 10));
}

#[test]
fn sides_are_powers_of_two() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut sprites = Vec::new();
    for i in 0..40u32 {
        let w = rng.gen_range(3..=50);
        let h = rng.gen_range(3..=50);
        sprites.push(Sprite::new(format!("r{i}.png"), w, h));
    }
    for objective in [Objective::Gpu, Objective::Space] {
        let result = search(&sprites, &pot_config(objective), None).unwrap();
        assert!(is_pow2(result.width), "width {} not pow2", result.width);
        assert!(is_pow2(result.height), "height {} not pow2", result.height);
        assert_eq!(result.sprites.len(), sprites.len());
        assert_disjoint_and_contained(&result, 0);
    }
}

#[test]
fn gpu_objective_never_reports_a_longer_side_than_space() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let mut sprites = Vec::new();
    for i in 0..25u32 {
        let w = rng.gen_range(8..=40);
        let h = rng.gen_range(8..=40);
        sprites.push(Sprite::new(format!("s{i}.png"), w, h));
    }
    let gpu = search(&sprites, &pot_config(Objective::Gpu), None).unwrap();
    let space = search(&sprites, &pot_config(Objective::Space), None).unwrap();
    assert!(gpu.width.max(gpu.height) <= space.width.max(space.height));
    let gpu_area = u64::from(gpu.width) * u64::from(gpu.height);
    let space_area = u64::from(space.width) * u64::from(space.height);
    assert!(space_area <= gpu_area);
}

#[test]
fn caps_can_make_pot_unsolvable() {
    let cfg = LayoutConfig::builder()
        .mode(Mode::Pot)
        .max_width(Some(16))
        .max_height(Some(16))
        .build();
    let sprites = vec![Sprite::new("a.png", 10, 10), Sprite::new("b.png", 10, 10)];
    match search(&sprites, &cfg, None) {
        Err(SpratError::NoFit) => {}
        other => panic!("expected NoFit, got {other:?}"),
    }
}

#[test]
fn padding_separates_pot_placements() {
    let cfg = LayoutConfig::builder()
        .mode(Mode::Pot)
        .objective(Objective::Space)
        .padding(3)
        .build();
    let sprites = vec![
        Sprite::new("a.png", 10, 10),
        Sprite::new("b.png", 10, 10),
        Sprite::new("c.png", 10, 10),
    ];
    let result = search(&sprites, &cfg, None).unwrap();
    assert_disjoint_and_contained(&result, 3);
}
