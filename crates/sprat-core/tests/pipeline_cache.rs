use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use sprat_core::pipeline::{self, LayoutRequest};
use sprat_core::prelude::*;

struct Fixture {
    _dir: tempfile::TempDir,
    images: PathBuf,
    cache: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let cache = dir.path().join("cache");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&cache).unwrap();
        Self {
            _dir: dir,
            images,
            cache,
        }
    }

    fn add_image(&self, name: &str, w: u32, h: u32) -> PathBuf {
        let img = RgbaImage::from_pixel(w, h, Rgba([100, 150, 200, 255]));
        let path = self.images.join(name);
        img.save(&path).unwrap();
        path
    }

    fn sources(&self) -> Vec<ImageSource> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.images)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        paths.sort();
        paths
            .into_iter()
            .map(|p| ImageSource::probe(p).unwrap())
            .collect()
    }

    fn request(&self, config: LayoutConfig) -> LayoutRequest {
        LayoutRequest {
            sources: self.sources(),
            config,
            strict_sources: false,
            input_identity: self.images.clone(),
            cache_root: Some(self.cache.clone()),
        }
    }
}

fn fast_config() -> LayoutConfig {
    LayoutConfig::builder().mode(Mode::Fast).build()
}

#[test]
fn single_image_end_to_end() {
    let fx = Fixture::new();
    fx.add_image("img.png", 32, 16);
    let outcome = pipeline::run(fx.request(fast_config())).unwrap();
    assert!(!outcome.cache_hit);
    let expected = format!(
        "atlas 32,16\nscale 1.00000000\nsprite \"{}\" 0,0 32,16\n",
        fx.images.join("img.png").display()
    );
    assert_eq!(outcome.text, expected);
    let layout = outcome.layout.unwrap();
    assert_eq!((layout.width, layout.height), (32, 16));
}

#[test]
fn second_run_is_served_from_the_output_cache() {
    let fx = Fixture::new();
    fx.add_image("a.png", 24, 24);
    fx.add_image("b.png", 24, 24);

    let first = pipeline::run(fx.request(fast_config())).unwrap();
    assert!(!first.cache_hit);
    let second = pipeline::run(fx.request(fast_config())).unwrap();
    assert!(second.cache_hit);
    assert_eq!(first.text, second.text);
}

#[test]
fn runs_are_deterministic() {
    let fx = Fixture::new();
    for i in 0..12 {
        fx.add_image(&format!("s{i:02}.png"), 8 + i, 20 - i);
    }
    let cfg = LayoutConfig::builder().mode(Mode::Compact).threads(2).build();

    let first = pipeline::run(fx.request(cfg.clone())).unwrap();
    // Remove every cache file so the second run recomputes from scratch.
    for entry in fs::read_dir(&fx.cache).unwrap() {
        let path = entry.unwrap().path();
        if path.is_file() {
            fs::remove_file(path).unwrap();
        }
    }
    let second = pipeline::run(fx.request(cfg)).unwrap();
    assert!(!second.cache_hit);
    assert_eq!(first.text, second.text);
}

#[test]
fn touching_an_input_invalidates_the_caches() {
    let fx = Fixture::new();
    let target = fx.add_image("a.png", 16, 16);
    fx.add_image("b.png", 16, 16);

    let first = pipeline::run(fx.request(fast_config())).unwrap();
    assert!(!first.cache_hit);

    // Grow the file: the byte-size fingerprint changes.
    let img = RgbaImage::from_pixel(40, 16, Rgba([1, 2, 3, 255]));
    img.save(&target).unwrap();

    let second = pipeline::run(fx.request(fast_config())).unwrap();
    assert!(!second.cache_hit, "stale cache served after input change");
    assert_ne!(first.text, second.text);
}

#[test]
fn seed_reuse_reproduces_the_output_bytes() {
    let fx = Fixture::new();
    for i in 0..6 {
        fx.add_image(&format!("p{i}.png"), 10 + 3 * i, 14);
    }
    let cfg = LayoutConfig::builder().mode(Mode::Compact).build();

    let first = pipeline::run(fx.request(cfg.clone())).unwrap();

    // Drop only the output cache; the seed file stays and must carry run B.
    for entry in fs::read_dir(&fx.cache).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if name.contains(".cache.layout.") {
            fs::remove_file(path).unwrap();
        }
    }

    let second = pipeline::run(fx.request(cfg)).unwrap();
    assert!(!second.cache_hit);
    assert_eq!(first.text, second.text);
}

#[test]
fn padding_is_tightened_out_of_the_reported_extent() {
    let fx = Fixture::new();
    fx.add_image("a.png", 10, 10);
    fx.add_image("b.png", 10, 10);
    fx.add_image("c.png", 10, 10);
    let cfg = LayoutConfig::builder().mode(Mode::Fast).padding(2).build();

    let outcome = pipeline::run(fx.request(cfg)).unwrap();
    let layout = outcome.layout.unwrap();
    let max_right = layout.sprites.iter().map(|s| s.x + s.w).max().unwrap();
    let max_bottom = layout.sprites.iter().map(|s| s.y + s.h).max().unwrap();
    assert_eq!(layout.width, max_right);
    assert_eq!(layout.height, max_bottom);
    // Adjacent sprites keep at least the padding distance on one axis.
    for i in 0..layout.sprites.len() {
        for j in (i + 1)..layout.sprites.len() {
            let a = &layout.sprites[i];
            let b = &layout.sprites[j];
            let separated = a.x + a.w + 2 <= b.x
                || b.x + b.w + 2 <= a.x
                || a.y + a.h + 2 <= b.y
                || b.y + b.h + 2 <= a.y;
            assert!(separated, "{a:?} and {b:?} closer than the padding");
        }
    }
}

#[test]
fn trim_flows_through_to_the_layout_text() {
    let fx = Fixture::new();
    let mut img = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 0]));
    for y in 6..24 {
        for x in 4..24 {
            img.put_pixel(x, y, Rgba([5, 6, 7, 255]));
        }
    }
    img.save(fx.images.join("art.png")).unwrap();

    let cfg = LayoutConfig::builder()
        .mode(Mode::Fast)
        .trim_transparent(true)
        .build();
    let outcome = pipeline::run(fx.request(cfg)).unwrap();
    let layout = outcome.layout.unwrap();
    let sprite = &layout.sprites[0];
    assert_eq!((sprite.w, sprite.h), (20, 18));
    assert_eq!(
        (
            sprite.trim_left,
            sprite.trim_top,
            sprite.trim_right,
            sprite.trim_bottom
        ),
        (4, 6, 8, 8)
    );
    assert!(outcome.text.contains("0,0 20,18 4,6 8,8"));
}

#[test]
fn unreadable_image_is_skipped_in_directory_mode_and_fatal_in_strict_mode() {
    let fx = Fixture::new();
    fx.add_image("good.png", 8, 8);
    fs::write(fx.images.join("bad.png"), b"garbage").unwrap();

    // Strict first: the failure aborts before any output cache is written.
    let mut strict = fx.request(fast_config());
    strict.strict_sources = true;
    assert!(pipeline::run(strict).is_err());

    let lenient = pipeline::run(fx.request(fast_config())).unwrap();
    let layout = lenient.layout.unwrap();
    assert_eq!(layout.sprites.len(), 1);
}

#[test]
fn compact_run_prewarms_the_flipped_objective() {
    let fx = Fixture::new();
    for i in 0..5 {
        fx.add_image(&format!("w{i}.png"), 12 + i, 9 + 2 * i);
    }
    let gpu_cfg = LayoutConfig::builder()
        .mode(Mode::Compact)
        .objective(Objective::Gpu)
        .build();
    let space_cfg = LayoutConfig::builder()
        .mode(Mode::Compact)
        .objective(Objective::Space)
        .build();

    let first = pipeline::run(fx.request(gpu_cfg)).unwrap();
    assert!(!first.cache_hit);

    // The space-objective run must now be a pure cache hit.
    let second = pipeline::run(fx.request(space_cfg)).unwrap();
    assert!(second.cache_hit);
}

fn count_files_with(dir: &Path, fragment: &str) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .contains(fragment)
        })
        .count()
}

#[test]
fn cache_files_land_in_the_configured_root() {
    let fx = Fixture::new();
    fx.add_image("a.png", 6, 6);
    pipeline::run(fx.request(fast_config())).unwrap();
    assert_eq!(count_files_with(&fx.cache, ".cache.layout."), 1);
    assert_eq!(count_files_with(&fx.cache, ".cache.seed."), 1);
    assert_eq!(count_files_with(&fx.cache, ".tmp"), 0);
}
