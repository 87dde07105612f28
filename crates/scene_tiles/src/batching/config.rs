//! Batching and instancing thresholds.

use serde::{Deserialize, Serialize};

use crate::error::{TileError, TileResult};

/// Parameters of [`super::run_batched_and_instanced`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchingConfig {
  /// Meshes with fewer vertices are never instanced.
  pub instanced_min_vertex_count: usize,
  /// Decimal places kept when comparing vertex attributes for instancing.
  pub instanced_vertex_compare_decimal_places: i32,
  /// Vertex budget of one batched mesh.
  pub batched_max_vertex_count: usize,
  /// Tile-tree depth (root = 0) at which batching cells start.
  pub batched_tile_node_depth: usize,
  /// Tree-node levels below a cell root folded into the same cell.
  pub batched_octree_node_reserve_depth: usize,
  /// Pack cells and key meshes on the rayon pool.
  pub parallel: bool,
  /// Pack the meshes of all render bodies of one node together before
  /// regular batching.
  #[serde(default)]
  pub merge_node_bodies: bool,
}

impl BatchingConfig {
  /// Accepted range of `instanced_vertex_compare_decimal_places`.
  pub const DECIMAL_PLACES: std::ops::RangeInclusive<i32> = -6..=9;

  pub const DEFAULT: Self = Self {
    instanced_min_vertex_count: 24,
    instanced_vertex_compare_decimal_places: 4,
    batched_max_vertex_count: 65_536,
    batched_tile_node_depth: 1,
    batched_octree_node_reserve_depth: 2,
    parallel: true,
    merge_node_bodies: false,
  };

  pub fn with_instanced_min_vertex_count(mut self, count: usize) -> Self {
    self.instanced_min_vertex_count = count;
    self
  }

  pub fn with_decimal_places(mut self, places: i32) -> Self {
    self.instanced_vertex_compare_decimal_places = places;
    self
  }

  pub fn with_batched_max_vertex_count(mut self, count: usize) -> Self {
    self.batched_max_vertex_count = count;
    self
  }

  pub fn with_batched_tile_node_depth(mut self, depth: usize) -> Self {
    self.batched_tile_node_depth = depth;
    self
  }

  pub fn with_reserve_depth(mut self, depth: usize) -> Self {
    self.batched_octree_node_reserve_depth = depth;
    self
  }

  pub fn with_parallel(mut self, parallel: bool) -> Self {
    self.parallel = parallel;
    self
  }

  pub fn with_merge_node_bodies(mut self, merge: bool) -> Self {
    self.merge_node_bodies = merge;
    self
  }

  pub fn validate(&self) -> TileResult<()> {
    if self.batched_max_vertex_count == 0 {
      return Err(TileError::InvalidConfig(
        "batched_max_vertex_count must be positive".into(),
      ));
    }
    if !Self::DECIMAL_PLACES.contains(&self.instanced_vertex_compare_decimal_places) {
      return Err(TileError::InvalidConfig(format!(
        "instanced_vertex_compare_decimal_places must be in {:?}, got {}",
        Self::DECIMAL_PLACES,
        self.instanced_vertex_compare_decimal_places
      )));
    }
    Ok(())
  }
}

impl Default for BatchingConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}
