use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Search modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Power-of-two atlas via the guillotine tree.
    Pot,
    /// Guided MaxRects search over width candidates (densest, slowest).
    Compact,
    /// Single shelf pass at an area-derived width.
    Fast,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Pot => "pot",
            Mode::Compact => "compact",
            Mode::Fast => "fast",
        }
    }
}

impl FromStr for Mode {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pot" => Ok(Self::Pot),
            "compact" => Ok(Self::Compact),
            "fast" => Ok(Self::Fast),
            _ => Err(()),
        }
    }
}

/// Scoring rule for choosing between candidate layouts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    /// Minimize the longer side (texture-unit friendly shapes).
    Gpu,
    /// Minimize total area.
    Space,
}

impl Objective {
    pub fn as_str(self) -> &'static str {
        match self {
            Objective::Gpu => "gpu",
            Objective::Space => "space",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Objective::Gpu => Objective::Space,
            Objective::Space => Objective::Gpu,
        }
    }
}

impl FromStr for Objective {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpu" => Ok(Self::Gpu),
            "space" => Ok(Self::Space),
            _ => Err(()),
        }
    }
}

/// Which axis ratio wins when a source/target resolution pair disagrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionReference {
    Largest,
    Smallest,
}

impl FromStr for ResolutionReference {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "largest" => Ok(Self::Largest),
            "smallest" => Ok(Self::Smallest),
            _ => Err(()),
        }
    }
}

/// Sorting orders tried by the search. All descending, with documented
/// tie-breaks (see `packer::sort_sprites`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    AreaDesc,
    MaxSideDesc,
    HeightDesc,
    WidthDesc,
    PerimeterDesc,
}

impl FromStr for SortOrder {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "area_desc" => Ok(Self::AreaDesc),
            "max_side_desc" => Ok(Self::MaxSideDesc),
            "height_desc" => Ok(Self::HeightDesc),
            "width_desc" => Ok(Self::WidthDesc),
            "perimeter_desc" => Ok(Self::PerimeterDesc),
            _ => Err(()),
        }
    }
}

/// MaxRects free-rectangle selection heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RectHeuristic {
    BestShortSideFit,
    BestAreaFit,
    BottomLeft,
}

impl FromStr for RectHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            _ => Err(()),
        }
    }
}

/// Fully resolved layout options: a profile merged with command-line
/// overrides. This is what the search and the cache signatures consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Profile name carried into cache signatures.
    pub profile: String,
    pub mode: Mode,
    pub objective: Objective,
    /// Atlas width cap; `None` leaves the width unbounded.
    pub max_width: Option<u32>,
    /// Atlas height cap; `None` leaves the height unbounded.
    pub max_height: Option<u32>,
    /// Blank pixels added to each sprite footprint before packing.
    pub padding: u32,
    /// Upper bound on kernel invocations per search; 0 disables the cap.
    pub max_combinations: u64,
    /// Dimension multiplier applied after measurement.
    pub scale: f64,
    pub trim_transparent: bool,
    /// Keep the source list order in signatures (list-file inputs).
    pub preserve_source_order: bool,
    /// Worker threads for the compact width search; 0 uses the host's
    /// available parallelism.
    pub threads: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            profile: "fast".into(),
            mode: Mode::Fast,
            objective: Objective::Gpu,
            max_width: None,
            max_height: None,
            padding: 0,
            max_combinations: 0,
            scale: 1.0,
            trim_transparent: false,
            preserve_source_order: false,
            threads: 0,
        }
    }
}

impl LayoutConfig {
    pub fn builder() -> LayoutConfigBuilder {
        LayoutConfigBuilder::new()
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SpratError;

        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(SpratError::InvalidConfig(format!(
                "scale must be a positive finite number (got {})",
                self.scale
            )));
        }
        if self.max_width == Some(0) || self.max_height == Some(0) {
            return Err(SpratError::InvalidConfig(
                "atlas dimension caps must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for `LayoutConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct LayoutConfigBuilder {
    cfg: LayoutConfig,
}

impl LayoutConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: LayoutConfig::default(),
        }
    }
    pub fn profile(mut self, name: impl Into<String>) -> Self {
        self.cfg.profile = name.into();
        self
    }
    pub fn mode(mut self, v: Mode) -> Self {
        self.cfg.mode = v;
        self
    }
    pub fn objective(mut self, v: Objective) -> Self {
        self.cfg.objective = v;
        self
    }
    pub fn max_width(mut self, v: Option<u32>) -> Self {
        self.cfg.max_width = v;
        self
    }
    pub fn max_height(mut self, v: Option<u32>) -> Self {
        self.cfg.max_height = v;
        self
    }
    pub fn padding(mut self, v: u32) -> Self {
        self.cfg.padding = v;
        self
    }
    pub fn max_combinations(mut self, v: u64) -> Self {
        self.cfg.max_combinations = v;
        self
    }
    pub fn scale(mut self, v: f64) -> Self {
        self.cfg.scale = v;
        self
    }
    pub fn trim_transparent(mut self, v: bool) -> Self {
        self.cfg.trim_transparent = v;
        self
    }
    pub fn preserve_source_order(mut self, v: bool) -> Self {
        self.cfg.preserve_source_order = v;
        self
    }
    pub fn threads(mut self, v: usize) -> Self {
        self.cfg.threads = v;
        self
    }
    pub fn build(self) -> LayoutConfig {
        self.cfg
    }
}
