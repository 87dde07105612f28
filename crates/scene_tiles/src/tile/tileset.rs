//! Persisted tile set: root tile plus scene-wide geometric error.

use serde::{Deserialize, Serialize};

use super::builder::TileBuilder;
use super::config::TilingConfig;
use super::data::TileData;
use crate::error::{TileError, TileResult};
use crate::scene::Scene;

/// Shape of a built tile tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TilingStats {
  pub tile_count: usize,
  /// Tiles introduced by spatial merging.
  pub synthetic_tiles: usize,
  /// Tiles discarded during construction for lacking valid bounds.
  pub dropped_tiles: usize,
  /// Levels in the deepest branch.
  pub max_depth: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileSet {
  root: TileData,
  geometric_error: f32,
  #[serde(skip)]
  dropped_tiles: usize,
}

impl TileSet {
  pub fn new(root: TileData, geometric_error: f32) -> Self {
    Self {
      root,
      geometric_error,
      dropped_tiles: 0,
    }
  }

  /// Build and merge the tile tree of `scene`. The set's error starts at the
  /// root tile's error.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "tile::TileSet::build"))]
  pub fn build(scene: &Scene, config: &TilingConfig) -> TileResult<Self> {
    let builder = TileBuilder::new(scene, *config)?;
    let root = builder.build_scene()?;
    Ok(Self {
      geometric_error: root.geometric_error,
      root,
      dropped_tiles: builder.dropped_tiles(),
    })
  }

  #[inline]
  pub fn tile_data(&self) -> &TileData {
    &self.root
  }

  #[inline]
  pub fn tile_data_mut(&mut self) -> &mut TileData {
    &mut self.root
  }

  /// Replace the whole tree.
  pub fn set_tile_data(&mut self, root: TileData) {
    self.root = root;
  }

  #[inline]
  pub fn geometric_error(&self) -> f32 {
    self.geometric_error
  }

  pub fn set_geometric_error(&mut self, geometric_error: f32) -> TileResult<()> {
    if !geometric_error.is_finite() || geometric_error < 0.0 {
      return Err(TileError::InvalidConfig(format!(
        "geometric error must be finite and non-negative, got {geometric_error}"
      )));
    }
    self.geometric_error = geometric_error;
    Ok(())
  }

  pub fn into_tile_data(self) -> TileData {
    self.root
  }

  pub fn stats(&self) -> TilingStats {
    let mut stats = TilingStats {
      dropped_tiles: self.dropped_tiles,
      max_depth: self.root.tree_depth(),
      ..Default::default()
    };
    self.root.visit(&mut |tile, _| {
      stats.tile_count += 1;
      if tile.is_synthetic() {
        stats.synthetic_tiles += 1;
      }
    });
    stats
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::box_row_scene;

  #[test]
  fn test_build_nine_boxes() {
    let (scene, _) = box_row_scene(9, 2.0, 1);
    let tileset = TileSet::build(&scene, &TilingConfig::default()).unwrap();

    assert_eq!(tileset.geometric_error(), tileset.tile_data().geometric_error);
    let stats = tileset.stats();
    assert_eq!(stats.tile_count, 12);
    assert_eq!(stats.synthetic_tiles, 2);
    assert_eq!(stats.dropped_tiles, 0);
    assert_eq!(stats.max_depth, 3);
  }

  #[test]
  fn test_set_geometric_error_validates() {
    let (scene, _) = box_row_scene(1, 2.0, 1);
    let mut tileset = TileSet::build(&scene, &TilingConfig::default()).unwrap();
    tileset.set_geometric_error(500.0).unwrap();
    assert_eq!(tileset.geometric_error(), 500.0);
    assert!(tileset.set_geometric_error(-1.0).is_err());
    assert!(tileset.set_geometric_error(f32::INFINITY).is_err());
    assert_eq!(tileset.geometric_error(), 500.0);
  }

  #[test]
  fn test_set_tile_data_replaces_root() {
    let (scene, _) = box_row_scene(2, 2.0, 1);
    let mut tileset = TileSet::build(&scene, &TilingConfig::default()).unwrap();
    let replacement = tileset.tile_data().children[0].clone();
    tileset.set_tile_data(replacement.clone());
    assert_eq!(tileset.tile_data(), &replacement);
  }

  #[test]
  fn test_serialized_tileset() {
    let (scene, _) = box_row_scene(3, 2.0, 1);
    let tileset = TileSet::build(&scene, &TilingConfig::default()).unwrap();
    let json = serde_json::to_value(&tileset).unwrap();
    assert_eq!(json["root"]["children"].as_array().unwrap().len(), 3);
    assert!(json["geometric_error"].as_f64().unwrap() > 0.0);

    let back: TileSet = serde_json::from_value(json).unwrap();
    assert_eq!(back.tile_data().all_node_ids(), tileset.tile_data().all_node_ids());
  }
}
