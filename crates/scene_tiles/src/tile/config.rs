//! Tile tree construction settings.

use serde::{Deserialize, Serialize};

use super::data::RefineType;
use crate::error::{TileError, TileResult};

/// Settings for building and spatially merging a tile tree.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TilingConfig {
  /// Largest direct child count before a tile is split by octants.
  /// At least 8, so one octant split always brings a tile under the limit.
  pub max_children: usize,
  /// Geometric error per unit of bounding-sphere radius.
  pub geometric_error_scale: f32,
  /// Refine mode of tiles introduced by spatial merging.
  pub synthetic_refine: RefineType,
  /// Build sibling subtrees on the rayon pool.
  pub parallel: bool,
}

impl TilingConfig {
  /// Smallest accepted `max_children`.
  pub const MIN_CHILDREN: usize = 8;

  pub const DEFAULT: Self = Self {
    max_children: 8,
    geometric_error_scale: 2.0,
    synthetic_refine: RefineType::Add,
    parallel: true,
  };

  pub fn with_max_children(mut self, max_children: usize) -> Self {
    self.max_children = max_children;
    self
  }

  pub fn with_geometric_error_scale(mut self, scale: f32) -> Self {
    self.geometric_error_scale = scale;
    self
  }

  pub fn with_synthetic_refine(mut self, refine: RefineType) -> Self {
    self.synthetic_refine = refine;
    self
  }

  pub fn with_parallel(mut self, parallel: bool) -> Self {
    self.parallel = parallel;
    self
  }

  pub fn validate(&self) -> TileResult<()> {
    if self.max_children < Self::MIN_CHILDREN {
      return Err(TileError::InvalidConfig(format!(
        "max_children must be at least {}, got {}",
        Self::MIN_CHILDREN,
        self.max_children
      )));
    }
    if !self.geometric_error_scale.is_finite() || self.geometric_error_scale < 0.0 {
      return Err(TileError::InvalidConfig(format!(
        "geometric_error_scale must be finite and non-negative, got {}",
        self.geometric_error_scale
      )));
    }
    Ok(())
  }
}

impl Default for TilingConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_valid() {
    assert!(TilingConfig::default().validate().is_ok());
    assert_eq!(TilingConfig::default().max_children, 8);
  }

  #[test]
  fn test_rejects_small_branching() {
    let err = TilingConfig::default().with_max_children(4).validate().unwrap_err();
    assert!(matches!(err, TileError::InvalidConfig(_)));
  }

  #[test]
  fn test_rejects_bad_scale() {
    assert!(TilingConfig::default().with_geometric_error_scale(f32::NAN).validate().is_err());
    assert!(TilingConfig::default().with_geometric_error_scale(-1.0).validate().is_err());
    assert!(TilingConfig::default().with_geometric_error_scale(0.0).validate().is_ok());
  }

  #[test]
  fn test_deserializes_from_json() {
    let json = r#"{
      "max_children": 16,
      "geometric_error_scale": 1.5,
      "synthetic_refine": "Replace",
      "parallel": false
    }"#;
    let config: TilingConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.max_children, 16);
    assert_eq!(config.synthetic_refine, RefineType::Replace);
    assert!(config.validate().is_ok());
  }
}
