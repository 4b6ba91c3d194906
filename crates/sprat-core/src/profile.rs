//! Named profiles: a plain-text config file maps profile names to preset
//! options, merged with command-line overrides into a `LayoutConfig`.
//!
//! Format: `#`/`;` comments, `[profile NAME]` sections, `key = value`
//! lines. Duplicate profile names are rejected. Search order for the file:
//! explicit path, then `$HOME/.config/sprat/spratprofiles.cfg`, then a
//! config next to the executable, then the compiled-in global path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{LayoutConfig, Mode, Objective, ResolutionReference};
use crate::error::{Result, SpratError};

pub const PROFILES_CONFIG_FILENAME: &str = "spratprofiles.cfg";
pub const USER_PROFILES_CONFIG_RELPATH: &str = ".config/sprat/spratprofiles.cfg";
pub const GLOBAL_PROFILES_CONFIG_PATH: &str = "/etc/sprat/spratprofiles.cfg";

/// Name used in signatures when no profile was requested.
pub const DEFAULT_PROFILE_NAME: &str = "fast";

/// Target of a resolution rescale: an explicit size, or "same as source"
/// (a no-op rescale used to pin assets at their authored resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetResolution {
    Source,
    Explicit(u32, u32),
}

/// One `[profile NAME]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub name: String,
    pub mode: Mode,
    pub objective: Objective,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub padding: Option<u32>,
    pub max_combinations: Option<u64>,
    pub scale: Option<f64>,
    pub trim_transparent: Option<bool>,
    pub threads: Option<usize>,
    pub source_resolution: Option<(u32, u32)>,
    pub target_resolution: Option<TargetResolution>,
    pub resolution_reference: Option<ResolutionReference>,
}

impl ProfileDefinition {
    fn new(name: String) -> Self {
        Self {
            name,
            mode: Mode::Compact,
            objective: Objective::Gpu,
            max_width: None,
            max_height: None,
            padding: None,
            max_combinations: None,
            scale: None,
            trim_transparent: None,
            threads: None,
            source_resolution: None,
            target_resolution: None,
            resolution_reference: None,
        }
    }
}

fn invalid(line_number: usize, message: impl std::fmt::Display) -> SpratError {
    SpratError::InvalidOption(format!("{message} at line {line_number}"))
}

fn parse_positive_u32(value: &str) -> Option<u32> {
    value.parse().ok().filter(|&v| v > 0)
}

/// Parses `WxH` into a positive pair.
pub fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    if h.contains('x') {
        return None;
    }
    Some((parse_positive_u32(w)?, parse_positive_u32(h)?))
}

/// Parses a scale factor: positive, finite, at most 1.
pub fn parse_scale_factor(value: &str) -> Option<f64> {
    let parsed: f64 = value.parse().ok()?;
    (parsed.is_finite() && parsed > 0.0 && parsed <= 1.0).then_some(parsed)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses a profiles config from text. At least one profile is required.
pub fn parse_profiles(text: &str) -> Result<Vec<ProfileDefinition>> {
    let mut profiles: Vec<ProfileDefinition> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut current: Option<ProfileDefinition> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            if let Some(done) = current.take() {
                profiles.push(done);
            }
            let mut words = header.split_whitespace();
            match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("profile") => {}
                Some(other) => {
                    return Err(invalid(line_number, format!("unsupported section '{other}'")));
                }
                None => return Err(invalid(line_number, "empty section header")),
            }
            let Some(name) = words.next() else {
                return Err(invalid(line_number, "missing profile name"));
            };
            if let Some(extra) = words.next() {
                return Err(invalid(
                    line_number,
                    format!("unexpected token '{extra}' in profile header"),
                ));
            }
            if !seen.insert(name.to_string()) {
                return Err(invalid(line_number, format!("duplicate profile '{name}'")));
            }
            current = Some(ProfileDefinition::new(name.to_string()));
            continue;
        }

        let Some(profile) = current.as_mut() else {
            return Err(invalid(line_number, "entry outside of profile section"));
        };
        let Some((key, value)) = line.split_once('=') else {
            return Err(invalid(line_number, format!("invalid line '{line}'")));
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if key.is_empty() {
            return Err(invalid(line_number, "empty key"));
        }
        if value.is_empty() {
            return Err(invalid(line_number, format!("empty value for key '{key}'")));
        }

        match key.as_str() {
            "mode" => {
                profile.mode = value
                    .parse()
                    .map_err(|_| invalid(line_number, format!("invalid mode '{value}'")))?;
            }
            "optimize" => {
                profile.objective = value.parse().map_err(|_| {
                    invalid(line_number, format!("invalid optimize target '{value}'"))
                })?;
            }
            "max_width" | "default_max_width" => {
                profile.max_width = Some(
                    parse_positive_u32(value)
                        .ok_or_else(|| invalid(line_number, format!("invalid max_width '{value}'")))?,
                );
            }
            "max_height" | "default_max_height" => {
                profile.max_height = Some(parse_positive_u32(value).ok_or_else(|| {
                    invalid(line_number, format!("invalid max_height '{value}'"))
                })?);
            }
            "padding" => {
                profile.padding = Some(value.parse().map_err(|_| {
                    invalid(line_number, format!("invalid padding '{value}'"))
                })?);
            }
            "max_combinations" => {
                profile.max_combinations = Some(value.parse().map_err(|_| {
                    invalid(line_number, format!("invalid max_combinations '{value}'"))
                })?);
            }
            "scale" => {
                profile.scale = Some(parse_scale_factor(value).ok_or_else(|| {
                    invalid(line_number, format!("invalid scale '{value}'"))
                })?);
            }
            "trim_transparent" => {
                profile.trim_transparent = Some(parse_bool(value).ok_or_else(|| {
                    invalid(line_number, format!("invalid trim_transparent '{value}'"))
                })?);
            }
            "threads" => {
                let parsed: usize = value.parse().map_err(|_| {
                    invalid(line_number, format!("invalid threads '{value}'"))
                })?;
                if parsed == 0 {
                    return Err(invalid(line_number, format!("invalid threads '{value}'")));
                }
                profile.threads = Some(parsed);
            }
            "source_resolution" => {
                profile.source_resolution = Some(parse_resolution(value).ok_or_else(|| {
                    invalid(line_number, format!("invalid source_resolution '{value}'"))
                })?);
            }
            "target_resolution" => {
                profile.target_resolution = Some(if value.eq_ignore_ascii_case("source") {
                    TargetResolution::Source
                } else {
                    let (w, h) = parse_resolution(value).ok_or_else(|| {
                        invalid(line_number, format!("invalid target_resolution '{value}'"))
                    })?;
                    TargetResolution::Explicit(w, h)
                });
            }
            "resolution_reference" => {
                profile.resolution_reference = Some(value.parse().map_err(|_| {
                    invalid(
                        line_number,
                        format!("invalid resolution reference '{value}'"),
                    )
                })?);
            }
            other => {
                return Err(invalid(line_number, format!("unknown key '{other}'")));
            }
        }
    }

    if let Some(done) = current.take() {
        profiles.push(done);
    }
    if profiles.is_empty() {
        return Err(SpratError::InvalidOption("no profiles defined".into()));
    }
    Ok(profiles)
}

pub fn load_profiles(path: &Path) -> Result<Vec<ProfileDefinition>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| SpratError::InvalidInput(format!("failed to open '{}': {e}", path.display())))?;
    parse_profiles(&text)
}

/// Config file candidates in search order. `home` and `exe_dir` come from
/// the caller so the lookup stays testable.
pub fn candidate_config_paths(
    explicit: Option<&Path>,
    home: Option<&Path>,
    exe_dir: Option<&Path>,
) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut candidates = Vec::new();
    if let Some(home) = home {
        candidates.push(home.join(USER_PROFILES_CONFIG_RELPATH));
    }
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(PROFILES_CONFIG_FILENAME));
    }
    candidates.push(PathBuf::from(GLOBAL_PROFILES_CONFIG_PATH));
    candidates
}

/// Command-line overrides; every field beats the profile value one-for-one.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub mode: Option<Mode>,
    pub objective: Option<Objective>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub padding: Option<u32>,
    pub max_combinations: Option<u64>,
    pub scale: Option<f64>,
    pub trim_transparent: Option<bool>,
    pub threads: Option<usize>,
    pub source_resolution: Option<(u32, u32)>,
    pub target_resolution: Option<TargetResolution>,
    pub resolution_reference: Option<ResolutionReference>,
}

/// Merges a profile (optional) with command-line overrides into the final
/// configuration, applying the resolution rescale.
///
/// When both resolutions are present, `scale` is multiplied by
/// `max(sx, sy)` (reference = largest) or `min(sx, sy)` (smallest) where
/// `sx`/`sy` are the per-axis target/source ratios.
pub fn resolve(profile: Option<&ProfileDefinition>, overrides: &Overrides) -> Result<LayoutConfig> {
    let defaults = LayoutConfig::default();
    let mut cfg = LayoutConfig {
        profile: profile
            .map(|p| p.name.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string()),
        mode: overrides
            .mode
            .or(profile.map(|p| p.mode))
            .unwrap_or(defaults.mode),
        objective: overrides
            .objective
            .or(profile.map(|p| p.objective))
            .unwrap_or(defaults.objective),
        max_width: overrides.max_width.or(profile.and_then(|p| p.max_width)),
        max_height: overrides.max_height.or(profile.and_then(|p| p.max_height)),
        padding: overrides
            .padding
            .or(profile.and_then(|p| p.padding))
            .unwrap_or(defaults.padding),
        max_combinations: overrides
            .max_combinations
            .or(profile.and_then(|p| p.max_combinations))
            .unwrap_or(defaults.max_combinations),
        scale: overrides
            .scale
            .or(profile.and_then(|p| p.scale))
            .unwrap_or(defaults.scale),
        trim_transparent: overrides
            .trim_transparent
            .or(profile.and_then(|p| p.trim_transparent))
            .unwrap_or(defaults.trim_transparent),
        preserve_source_order: false,
        threads: overrides
            .threads
            .or(profile.and_then(|p| p.threads))
            .unwrap_or(defaults.threads),
    };

    let source_resolution = overrides
        .source_resolution
        .or(profile.and_then(|p| p.source_resolution));
    let target_resolution = overrides
        .target_resolution
        .or(profile.and_then(|p| p.target_resolution));
    let reference = overrides
        .resolution_reference
        .or(profile.and_then(|p| p.resolution_reference))
        .unwrap_or(ResolutionReference::Largest);

    let target = match (source_resolution, target_resolution) {
        (None, None) => None,
        // "target = source" without a source resolution is a no-op.
        (None, Some(TargetResolution::Source)) => None,
        (Some(source), Some(TargetResolution::Source)) => Some((source, source)),
        (Some(source), Some(TargetResolution::Explicit(w, h))) => Some((source, (w, h))),
        _ => {
            return Err(SpratError::InvalidOption(
                "source and target resolutions must be provided together".into(),
            ));
        }
    };
    if let Some(((sw, sh), (tw, th))) = target {
        let sx = f64::from(tw) / f64::from(sw);
        let sy = f64::from(th) / f64::from(sh);
        let resolution_scale = match reference {
            ResolutionReference::Largest => sx.max(sy),
            ResolutionReference::Smallest => sx.min(sy),
        };
        cfg.scale *= resolution_scale;
    }

    cfg.validate()?;
    Ok(cfg)
}
