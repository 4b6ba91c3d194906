use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser};
use tracing::debug;

use sprat_core::config::{Mode, Objective, ResolutionReference};
use sprat_core::error::SpratError;
use sprat_core::pipeline::{self, LayoutRequest};
use sprat_core::profile::{self, Overrides, ProfileDefinition, TargetResolution};

mod input;

#[derive(Parser, Debug)]
#[command(
    name = "spratlayout",
    about = "Compute a sprite-atlas layout and print it as layout text",
    version,
    author
)]
struct Cli {
    /// Image folder, list file, (compressed) tar archive, or '-' for a tar
    /// stream on stdin
    input: String,

    /// Named profile from the profiles config
    #[arg(long, help_heading = "Profiles")]
    profile: Option<String>,
    /// Profiles config path (overrides the default search locations)
    #[arg(long, value_name = "PATH", help_heading = "Profiles")]
    profiles_config: Option<PathBuf>,

    /// Layout mode
    #[arg(long, value_parser = parse_mode, value_name = "compact|pot|fast", help_heading = "Layout")]
    mode: Option<Mode>,
    /// Candidate objective: gpu minimizes the longer side, space the area
    #[arg(long = "optimize", value_parser = parse_objective, value_name = "gpu|space", help_heading = "Layout")]
    optimize: Option<Objective>,
    /// Atlas width cap in pixels
    #[arg(long, value_parser = parse_positive_u32, help_heading = "Layout")]
    max_width: Option<u32>,
    /// Atlas height cap in pixels
    #[arg(long, value_parser = parse_positive_u32, help_heading = "Layout")]
    max_height: Option<u32>,
    /// Blank pixels between adjacent sprites
    #[arg(long, help_heading = "Layout")]
    padding: Option<u32>,
    /// Cap on kernel invocations per search (0 = unlimited)
    #[arg(long, help_heading = "Layout")]
    max_combinations: Option<u64>,

    /// Authored resolution of the inputs, as WxH
    #[arg(long, value_parser = parse_resolution_arg, value_name = "WxH", help_heading = "Scaling")]
    source_resolution: Option<(u32, u32)>,
    /// Resolution to rescale for: WxH, or 'source' for a no-op rescale
    #[arg(long, value_parser = parse_target_resolution, value_name = "WxH|source", help_heading = "Scaling")]
    target_resolution: Option<TargetResolution>,
    /// Axis ratio that wins when source/target aspect ratios differ
    #[arg(long, value_parser = parse_resolution_reference, value_name = "largest|smallest", help_heading = "Scaling")]
    resolution_reference: Option<ResolutionReference>,
    /// Scale factor in (0, 1]; multiplied with any resolution-derived scale
    #[arg(long, value_parser = parse_scale, value_name = "F", help_heading = "Scaling")]
    scale: Option<f64>,

    /// Record opaque bounding boxes and pack the trimmed sizes
    #[arg(long, overrides_with = "no_trim_transparent", help_heading = "Layout")]
    trim_transparent: bool,
    /// Disable transparent trimming (overrides the profile)
    #[arg(long, overrides_with = "trim_transparent", help_heading = "Layout")]
    no_trim_transparent: bool,

    /// Worker threads for the compact search (default: host parallelism)
    #[arg(long, value_parser = parse_positive_usize, help_heading = "Layout")]
    threads: Option<usize>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, help_heading = "Logging")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(short, long, default_value_t = false, help_heading = "Logging")]
    quiet: bool,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::from_str(s).map_err(|_| format!("invalid mode '{s}'"))
}

fn parse_objective(s: &str) -> Result<Objective, String> {
    Objective::from_str(s).map_err(|_| format!("invalid optimize target '{s}'"))
}

fn parse_resolution_reference(s: &str) -> Result<ResolutionReference, String> {
    ResolutionReference::from_str(s).map_err(|_| format!("invalid resolution reference '{s}'"))
}

fn parse_positive_u32(s: &str) -> Result<u32, String> {
    s.parse()
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| format!("expected a positive integer, got '{s}'"))
}

fn parse_positive_usize(s: &str) -> Result<usize, String> {
    s.parse()
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| format!("expected a positive integer, got '{s}'"))
}

fn parse_resolution_arg(s: &str) -> Result<(u32, u32), String> {
    profile::parse_resolution(s).ok_or_else(|| format!("invalid resolution '{s}' (expected WxH)"))
}

fn parse_target_resolution(s: &str) -> Result<TargetResolution, String> {
    if s.eq_ignore_ascii_case("source") {
        return Ok(TargetResolution::Source);
    }
    profile::parse_resolution(s)
        .map(|(w, h)| TargetResolution::Explicit(w, h))
        .ok_or_else(|| format!("invalid resolution '{s}' (expected WxH or 'source')"))
}

fn parse_scale(s: &str) -> Result<f64, String> {
    profile::parse_scale_factor(s)
        .ok_or_else(|| format!("invalid scale '{s}' (expected a number in (0, 1])"))
}

fn main() -> anyhow::Result<()> {
    // Every failure, including a misparsed option, exits with code 1;
    // help and version output exit with 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };
    init_tracing_with_level(cli.quiet, cli.verbose);
    run(&cli)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let selected_profile = load_selected_profile(cli)?;

    let trim_transparent = if cli.trim_transparent {
        Some(true)
    } else if cli.no_trim_transparent {
        Some(false)
    } else {
        None
    };
    let overrides = Overrides {
        mode: cli.mode,
        objective: cli.optimize,
        max_width: cli.max_width,
        max_height: cli.max_height,
        padding: cli.padding,
        max_combinations: cli.max_combinations,
        scale: cli.scale,
        trim_transparent,
        threads: cli.threads,
        source_resolution: cli.source_resolution,
        target_resolution: cli.target_resolution,
        resolution_reference: cli.resolution_reference,
    };
    let config = profile::resolve(selected_profile.as_ref(), &overrides)?;
    debug!(?config, "resolved layout options");

    let inputs = input::collect(&cli.input)?;
    if inputs.sources.is_empty() {
        bail!("no valid images found in '{}'", cli.input);
    }

    let mut config = config;
    config.preserve_source_order = inputs.preserve_order;

    let outcome = pipeline::run(LayoutRequest {
        sources: inputs.sources,
        config,
        strict_sources: inputs.strict,
        input_identity: inputs.input_identity.clone(),
        cache_root: None,
    })?;

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    lock.write_all(outcome.text.as_bytes())
        .context("write layout to stdout")?;
    Ok(())
}

/// Loads and selects the requested profile, if any. The config file is
/// searched in order: explicit path, `$HOME/.config/sprat/spratprofiles.cfg`,
/// a config next to the executable, then the compiled-in global path.
fn load_selected_profile(cli: &Cli) -> anyhow::Result<Option<ProfileDefinition>> {
    let Some(name) = cli.profile.as_deref() else {
        return Ok(None);
    };

    let home = dirs::home_dir();
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()));
    let candidates = profile::candidate_config_paths(
        cli.profiles_config.as_deref(),
        home.as_deref(),
        exe_dir.as_deref(),
    );

    let mut tried = Vec::new();
    for candidate in &candidates {
        if !candidate.is_file() {
            tried.push(candidate.display().to_string());
            continue;
        }
        let profiles = profile::load_profiles(candidate)
            .with_context(|| format!("failed to load profile config {}", candidate.display()))?;
        let available: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        return match profiles.iter().position(|p| p.name == name) {
            Some(idx) => Ok(Some(profiles[idx].clone())),
            None => Err(SpratError::InvalidProfile {
                name: name.into(),
                reason: format!("available profiles: {}", available.join(", ")),
            }
            .into()),
        };
    }
    bail!("failed to load profile config; tried: {}", tried.join(", "));
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "warn".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
