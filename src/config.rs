//! TOML configuration for a leaf cleaning run.
//!
//! ```toml
//! source_axis_distance = 1000.0
//! target_roi_pattern = "PTV"
//! gantry_convention = "negated"
//!
//! [closure]
//! policy = "midpoint_gap"
//! gap = 1.0
//!
//! [leaf_bank]
//! lookup = "fixed_slots"
//! first_control_point = 2
//! subsequent_control_points = 0
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use crate::error::{CleanerError, CleanerResult};
use crate::processing::closure::ClosurePolicy;
use crate::processing::control_points::LeafBankLookup;
use crate::processing::transform::{GantryConvention, DEFAULT_SAD};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanerConfig {
    /// Source-to-axis distance in mm.
    pub source_axis_distance: f64,
    /// ROIs whose name contains this string are treated as target.
    pub target_roi_pattern: String,
    pub gantry_convention: GantryConvention,
    pub closure: ClosurePolicy,
    pub leaf_bank: LeafBankLookup,
    /// Evaluate control points on the rayon thread pool.
    pub parallel: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            source_axis_distance: DEFAULT_SAD,
            target_roi_pattern: "PTV".to_string(),
            gantry_convention: GantryConvention::default(),
            closure: ClosurePolicy::default(),
            leaf_bank: LeafBankLookup::default(),
            parallel: true,
        }
    }
}

impl CleanerConfig {
    pub fn from_toml_str(s: &str) -> CleanerResult<Self> {
        let config: CleanerConfig =
            toml::from_str(s).map_err(|e| CleanerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {:?}", path))?;
        let config =
            Self::from_toml_str(&raw).with_context(|| format!("in config {:?}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> CleanerResult<()> {
        if !(self.source_axis_distance.is_finite() && self.source_axis_distance > 0.0) {
            return Err(CleanerError::InvalidConfig(format!(
                "source_axis_distance must be positive, got {}",
                self.source_axis_distance
            )));
        }
        if self.target_roi_pattern.is_empty() {
            return Err(CleanerError::InvalidConfig(
                "target_roi_pattern must not be empty".into(),
            ));
        }
        self.closure.validate()
    }
}
