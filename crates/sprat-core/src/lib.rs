//! Layout engine for the sprat sprite-atlas toolchain.
//!
//! - Kernels: guillotine tree (power-of-two search), MaxRects
//!   (BSSF/BAF/BL, compact search), shelf (fast mode and cross-checks)
//! - Search: bounded exploration of (sort order, heuristic, width)
//!   combinations per mode, ranked under a GPU or SPACE objective, with the
//!   compact width sweep parallelized across a fixed worker pool
//! - Caches: per-input image-meta cache plus a two-tier layout/seed cache,
//!   all keyed by content-derived signatures and written atomically
//!
//! Quick example:
//! ```ignore
//! use sprat_core::prelude::*;
//! # fn main() -> sprat_core::Result<()> {
//! let sprites = vec![Sprite::new("a.png", 64, 32), Sprite::new("b.png", 40, 40)];
//! let cfg = LayoutConfig::builder().mode(Mode::Compact).build();
//! let result = sprat_core::search::search(&sprites, &cfg, None)?;
//! println!("atlas {}x{}", result.width, result.height);
//! # Ok(()) }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod janitor;
pub mod layout_cache;
pub mod measure;
pub mod model;
pub mod output;
pub mod packer;
pub mod pipeline;
pub mod profile;
pub mod search;
pub mod signature;

mod text;

pub use config::*;
pub use error::*;
pub use model::*;

/// Convenience prelude for common types and functions.
/// Importing `sprat_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{
        LayoutConfig, LayoutConfigBuilder, Mode, Objective, RectHeuristic, ResolutionReference,
        SortOrder,
    };
    pub use crate::error::{Result, SpratError};
    pub use crate::model::{AtlasLayout, ImageMeta, ImageSource, Sprite};
    pub use crate::output::{encode_layout, parse_layout};
    pub use crate::pipeline::{LayoutOutcome, LayoutRequest};
    pub use crate::profile::{Overrides, ProfileDefinition, TargetResolution};
    pub use crate::search::{Candidate, SearchResult};
}
