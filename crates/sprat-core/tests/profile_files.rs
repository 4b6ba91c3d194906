use std::fs;

use sprat_core::prelude::*;
use sprat_core::profile::{self, Overrides};

#[test]
fn loads_profiles_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spratprofiles.cfg");
    fs::write(
        &path,
        "; shipping presets\n\
         [profile desktop]\n\
         mode = compact\n\
         optimize = gpu\n\
         max_width = 4096\n\
         max_height = 4096\n\
         max_combinations = 2000\n\
         padding = 2\n\
         trim_transparent = yes\n\
         threads = 8\n",
    )
    .unwrap();

    let profiles = profile::load_profiles(&path).unwrap();
    assert_eq!(profiles.len(), 1);
    let cfg = profile::resolve(Some(&profiles[0]), &Overrides::default()).unwrap();
    assert_eq!(cfg.profile, "desktop");
    assert_eq!(cfg.mode, Mode::Compact);
    assert_eq!(cfg.max_width, Some(4096));
    assert_eq!(cfg.max_combinations, 2000);
    assert_eq!(cfg.padding, 2);
    assert!(cfg.trim_transparent);
    assert_eq!(cfg.threads, 8);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(profile::load_profiles(&dir.path().join("absent.cfg")).is_err());
}

#[test]
fn malformed_file_reports_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spratprofiles.cfg");
    fs::write(&path, "[profile a]\nmode = compact\npadding = lots\n").unwrap();
    let err = profile::load_profiles(&path).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("line"), "unexpected error: {message}");
}

#[test]
fn no_profile_falls_back_to_the_fast_defaults() {
    let cfg = profile::resolve(None, &Overrides::default()).unwrap();
    assert_eq!(cfg.profile, "fast");
    assert_eq!(cfg.mode, Mode::Fast);
    assert_eq!(cfg.objective, Objective::Gpu);
    assert_eq!(cfg.padding, 0);
    assert_eq!(cfg.scale, 1.0);
    assert!(!cfg.trim_transparent);
}
