//! Tile tree nodes.
//!
//! Each [`TileData`] owns its children by value. There are no parent links;
//! restructuring a level means replacing a `children` vector.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::bounds::BoundingVolume;
use crate::ids::TileId;

/// Content flag: the tile stands for a model-tree node.
pub const TREE_NODE_FLAG: u32 = 0x0001;
/// Content flag: the tile draws render bodies.
pub const RENDER_BODY_FLAG: u32 = 0x0002;

/// Whether refined children replace or add to this tile's own content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefineType {
  Replace,
  #[default]
  Add,
}

impl RefineType {
  /// Persisted value (`Replace = 1`, `Add = 2`).
  #[inline]
  pub fn to_raw(self) -> u32 {
    match self {
      RefineType::Replace => 1,
      RefineType::Add => 2,
    }
  }

  pub fn from_raw(raw: u32) -> Option<Self> {
    match raw {
      1 => Some(RefineType::Replace),
      2 => Some(RefineType::Add),
      _ => None,
    }
  }
}

/// Coarse render body standing in for finer bodies deeper in the tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEnvelope {
  pub render_body_id: u64,
  pub child_render_body_ids: Vec<u64>,
}

/// Render bodies drawn by a tile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderBodyContent {
  pub lod_render_body_ids: Vec<u64>,
  pub envelopes: Vec<TileEnvelope>,
}

/// What a tile draws. Synthetic tiles have neither part.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileContent {
  pub tree_node_id: Option<u64>,
  pub render_bodies: Option<RenderBodyContent>,
}

/// Flat, bit-mask form of [`TileContent`] used by persisted tile sets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTileContent {
  pub bit_mask: u32,
  pub tree_node_id: u64,
  pub lod_render_body_ids: Vec<u64>,
  pub envelopes: Vec<TileEnvelope>,
}

impl TileContent {
  pub fn tree_node(tree_node_id: u64) -> Self {
    Self {
      tree_node_id: Some(tree_node_id),
      render_bodies: None,
    }
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.tree_node_id.is_none() && self.render_bodies.is_none()
  }

  /// Own render body ids, empty when the tile draws nothing.
  pub fn render_body_ids(&self) -> &[u64] {
    self
      .render_bodies
      .as_ref()
      .map(|c| c.lod_render_body_ids.as_slice())
      .unwrap_or(&[])
  }

  pub fn bit_mask(&self) -> u32 {
    let mut mask = 0;
    if self.tree_node_id.is_some() {
      mask |= TREE_NODE_FLAG;
    }
    if self.render_bodies.is_some() {
      mask |= RENDER_BODY_FLAG;
    }
    mask
  }

  pub fn to_raw(&self) -> RawTileContent {
    let bodies = self.render_bodies.clone().unwrap_or_default();
    RawTileContent {
      bit_mask: self.bit_mask(),
      tree_node_id: self.tree_node_id.unwrap_or(0),
      lod_render_body_ids: bodies.lod_render_body_ids,
      envelopes: bodies.envelopes,
    }
  }

  /// Fields whose flag is clear are ignored.
  pub fn from_raw(raw: RawTileContent) -> Self {
    Self {
      tree_node_id: (raw.bit_mask & TREE_NODE_FLAG != 0).then_some(raw.tree_node_id),
      render_bodies: (raw.bit_mask & RENDER_BODY_FLAG != 0).then(|| RenderBodyContent {
        lod_render_body_ids: raw.lod_render_body_ids,
        envelopes: raw.envelopes,
      }),
    }
  }
}

/// Node of the tile tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileData {
  pub id: TileId,
  /// Encloses own content and every descendant's volume.
  pub bounding_volume: BoundingVolume,
  /// Never below any child's error.
  pub geometric_error: f32,
  pub refine: RefineType,
  pub content: TileContent,
  pub children: Vec<TileData>,
  /// Construction-time only.
  #[serde(skip)]
  pub local_transform: Mat4,
  /// Construction-time only.
  #[serde(skip)]
  pub name: String,
}

impl TileData {
  /// Tile with the given content, no volume yet.
  pub fn new(content: TileContent) -> Self {
    Self {
      id: TileId::new(),
      bounding_volume: BoundingVolume::EMPTY,
      geometric_error: 0.0,
      refine: RefineType::Add,
      content,
      children: Vec::new(),
      local_transform: Mat4::IDENTITY,
      name: String::new(),
    }
  }

  /// Content-less tile grouping `children`. Volume is their union, error
  /// their maximum.
  pub fn synthetic(refine: RefineType, children: Vec<TileData>) -> Self {
    let mut tile = Self::new(TileContent::default());
    tile.refine = refine;
    tile.children = children;
    tile.update_bounding_volume_and_geometric_error(&BoundingVolume::EMPTY, 0.0);
    tile
  }

  /// True for tiles introduced by spatial merging.
  #[inline]
  pub fn is_synthetic(&self) -> bool {
    self.content.tree_node_id.is_none()
  }

  #[inline]
  pub fn is_bounding_volume_valid(&self) -> bool {
    self.bounding_volume.is_valid()
  }

  /// Largest geometric error among direct children.
  pub fn max_child_error(&self) -> f32 {
    self
      .children
      .iter()
      .map(|c| c.geometric_error)
      .fold(0.0, f32::max)
  }

  /// Recompute the volume from `own` and the children's volumes, then the
  /// error as `scale * radius`, never below any child's error.
  ///
  /// Synthetic tiles take the children's maximum only. An invalid result
  /// zeroes the error.
  pub fn update_bounding_volume_and_geometric_error(&mut self, own: &BoundingVolume, scale: f32) {
    self.bounding_volume = self
      .children
      .iter()
      .fold(*own, |acc, child| acc.merge(&child.bounding_volume));

    if !self.bounding_volume.is_valid() {
      self.geometric_error = 0.0;
      return;
    }

    let children_error = self.max_child_error();
    self.geometric_error = if self.is_synthetic() {
      children_error
    } else {
      (scale * self.bounding_volume.radius()).max(children_error)
    };
  }

  /// Tree-node ids in pre-order. Synthetic tiles contribute nothing.
  pub fn all_node_ids(&self) -> Vec<u64> {
    let mut ids = Vec::new();
    self.visit(&mut |tile, _| {
      if let Some(id) = tile.content.tree_node_id {
        ids.push(id);
      }
    });
    ids
  }

  /// Levels in the deepest branch; a lone tile has depth 1.
  pub fn tree_depth(&self) -> usize {
    1 + self.children.iter().map(TileData::tree_depth).max().unwrap_or(0)
  }

  pub fn tile_count(&self) -> usize {
    1 + self.children.iter().map(TileData::tile_count).sum::<usize>()
  }

  /// Pre-order walk with the depth of each tile (root = 0).
  pub fn visit<F: FnMut(&TileData, usize)>(&self, f: &mut F) {
    fn walk<F: FnMut(&TileData, usize)>(tile: &TileData, depth: usize, f: &mut F) {
      f(tile, depth);
      for child in &tile.children {
        walk(child, depth + 1, f);
      }
    }
    walk(self, 0, f);
  }

  /// Give every tile a fresh id in pre-order.
  pub fn reassign_ids(&mut self) {
    self.id = TileId::new();
    for child in &mut self.children {
      child.reassign_ids();
    }
  }
}

#[cfg(test)]
#[path = "data_test.rs"]
mod data_test;
