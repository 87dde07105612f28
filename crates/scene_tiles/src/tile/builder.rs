//! Tile tree construction from the model tree.
//!
//! Sibling subtrees are independent, so they are built on the rayon pool when
//! [`TilingConfig::parallel`] is set. Children are collected in input order and
//! ids are handed out in a final sequential pass, so the output is the same
//! either way.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Mat4;
use rayon::prelude::*;

use super::config::TilingConfig;
use super::data::{RefineType, RenderBodyContent, TileContent, TileData, TileEnvelope};
use crate::bounds::{BoundingBox, BoundingVolume};
use crate::error::{TileError, TileResult};
use crate::scene::{MeshOccurrence, Scene};

/// Flat node description for building a tile tree without a scene.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeInfo {
  pub name: String,
  pub id: u64,
  /// When set, must match the id of the enclosing `NodeInfo`.
  pub parent_id: Option<u64>,
  /// Node-local box of the node's own geometry.
  pub bounding_box: Option<BoundingBox>,
  pub local_transform: Mat4,
  pub children: Vec<NodeInfo>,
}

impl NodeInfo {
  pub fn new(id: u64, name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      id,
      parent_id: None,
      bounding_box: None,
      local_transform: Mat4::IDENTITY,
      children: Vec::new(),
    }
  }

  pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
    self.bounding_box = Some(bounding_box);
    self
  }

  pub fn with_local_transform(mut self, transform: Mat4) -> Self {
    self.local_transform = transform;
    self
  }

  /// Append a child, recording this node as its parent.
  pub fn with_child(mut self, mut child: NodeInfo) -> Self {
    child.parent_id = Some(self.id);
    self.children.push(child);
    self
  }
}

/// Per-scene lookups shared by every recursive call.
struct SceneContext {
  transforms: BTreeMap<u64, Mat4>,
  occurrences: BTreeMap<u64, Vec<MeshOccurrence>>,
}

impl SceneContext {
  fn collect(scene: &Scene) -> TileResult<Self> {
    let transforms = scene.world_transforms()?;
    let mut occurrences: BTreeMap<u64, Vec<MeshOccurrence>> = BTreeMap::new();
    for occurrence in scene.mesh_occurrences()? {
      occurrences
        .entry(occurrence.tree_node_id)
        .or_default()
        .push(occurrence);
    }
    Ok(Self {
      transforms,
      occurrences,
    })
  }
}

/// Builds [`TileData`] trees from a [`Scene`].
pub struct TileBuilder<'a> {
  scene: &'a Scene,
  config: TilingConfig,
  dropped: AtomicUsize,
}

impl<'a> TileBuilder<'a> {
  pub fn new(scene: &'a Scene, config: TilingConfig) -> TileResult<Self> {
    config.validate()?;
    Ok(Self {
      scene,
      config,
      dropped: AtomicUsize::new(0),
    })
  }

  #[inline]
  pub fn config(&self) -> &TilingConfig {
    &self.config
  }

  /// Tiles discarded so far for lacking valid bounds.
  pub fn dropped_tiles(&self) -> usize {
    self.dropped.load(Ordering::Relaxed)
  }

  /// Tile subtree mirroring `node_id` and its descendants, before spatial
  /// merging. `None` when nothing under the node has valid bounds.
  pub fn build_from_tree_node(&self, node_id: u64) -> TileResult<Option<TileData>> {
    let context = SceneContext::collect(self.scene)?;
    let mut tile = self.build_node(&context, node_id)?;
    if let Some(tile) = tile.as_mut() {
      tile.reassign_ids();
    }
    Ok(tile)
  }

  /// Merged tile tree over every root of the scene. Several roots get a
  /// synthetic tile above them.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "tile::build_scene"))]
  pub fn build_scene(&self) -> TileResult<TileData> {
    let context = SceneContext::collect(self.scene)?;

    let tiles = {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("build_tiles").entered();
      self.build_children(self.scene.roots(), |&root| self.build_node(&context, root))?
    };

    let root = self.finish(tiles)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
      tiles = root.tile_count(),
      depth = root.tree_depth(),
      dropped = self.dropped_tiles(),
      "tile tree built"
    );

    Ok(root)
  }

  /// Merged tile tree from a flat node description. Only tree-node content
  /// is produced.
  #[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, name = "tile::build_from_node_info")
  )]
  pub fn build_from_node_info(&self, info: &NodeInfo) -> TileResult<TileData> {
    let tile = self.build_info(info, Mat4::IDENTITY)?;
    self.finish(tile.into_iter().collect())
  }

  /// Wrap several tops, merge by space and number the tree.
  fn finish(&self, mut tiles: Vec<TileData>) -> TileResult<TileData> {
    let mut root = match tiles.len() {
      0 => return Err(TileError::EmptyTileTree),
      1 => tiles.swap_remove(0),
      _ => TileData::synthetic(self.config.synthetic_refine, tiles),
    };

    {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("merge_children_by_space").entered();
      root.merge_children_by_space(&self.config);
    }

    root.reassign_ids();
    Ok(root)
  }

  /// Build child tiles in input order, dropping the ones without bounds.
  fn build_children<T, F>(&self, items: &[T], build: F) -> TileResult<Vec<TileData>>
  where
    T: Sync,
    F: Fn(&T) -> TileResult<Option<TileData>> + Sync + Send,
  {
    let built: Vec<Option<TileData>> = if self.config.parallel {
      items.par_iter().map(&build).collect::<TileResult<_>>()?
    } else {
      items.iter().map(&build).collect::<TileResult<_>>()?
    };
    Ok(built.into_iter().flatten().collect())
  }

  fn build_node(&self, context: &SceneContext, node_id: u64) -> TileResult<Option<TileData>> {
    let node = self.scene.tree_node(node_id)?;
    let children = self.build_children(&node.children, |&child| self.build_node(context, child))?;

    let world = context
      .transforms
      .get(&node_id)
      .copied()
      .unwrap_or(Mat4::IDENTITY);

    let mut content = TileContent::tree_node(node_id);
    let mut own_box = BoundingBox::EMPTY;
    let mut refine = RefineType::Add;

    if let Some(model_id) = node.model_id {
      let model = self.scene.model(model_id)?;
      own_box = match model.bounding_box {
        Some(local) => local.transformed(&world),
        None => self.geometry_box(context, node_id)?,
      };

      if !model.render_body_ids.is_empty() {
        let envelopes = self.envelopes(&model.render_body_ids, &children)?;
        if !children.is_empty() && envelopes.len() == model.render_body_ids.len() {
          refine = RefineType::Replace;
        }
        content.render_bodies = Some(RenderBodyContent {
          lod_render_body_ids: model.render_body_ids.clone(),
          envelopes,
        });
      }
    }

    let mut tile = TileData::new(content);
    tile.name = node.name.clone();
    tile.local_transform = node.local_transform;
    tile.refine = refine;
    tile.children = children;
    Ok(self.finish_tile(tile, &own_box))
  }

  fn build_info(&self, info: &NodeInfo, parent_world: Mat4) -> TileResult<Option<TileData>> {
    let world = parent_world * info.local_transform;
    for child in &info.children {
      if let Some(parent_id) = child.parent_id {
        if parent_id != info.id {
          return Err(TileError::Inconsistent(format!(
            "node {} declares parent {parent_id} but is listed under {}",
            child.id, info.id
          )));
        }
      }
    }
    let children = self.build_children(&info.children, |child| self.build_info(child, world))?;

    let own_box = info
      .bounding_box
      .map(|local| local.transformed(&world))
      .unwrap_or(BoundingBox::EMPTY);

    let mut tile = TileData::new(TileContent::tree_node(info.id));
    tile.name = info.name.clone();
    tile.local_transform = info.local_transform;
    tile.children = children;
    Ok(self.finish_tile(tile, &own_box))
  }

  /// Compute bounds and error; `None` (counted as dropped) when invalid.
  fn finish_tile(&self, mut tile: TileData, own_box: &BoundingBox) -> Option<TileData> {
    let own = BoundingVolume::build_from_bounding_box(own_box);
    tile.update_bounding_volume_and_geometric_error(&own, self.config.geometric_error_scale);
    if tile.is_bounding_volume_valid() {
      return Some(tile);
    }

    self.dropped.fetch_add(1, Ordering::Relaxed);
    #[cfg(feature = "tracing")]
    tracing::debug!(
      node = ?tile.content.tree_node_id,
      name = %tile.name,
      "dropping tile without valid bounds"
    );
    None
  }

  /// World box of every vertex drawn at `node_id`.
  fn geometry_box(&self, context: &SceneContext, node_id: u64) -> TileResult<BoundingBox> {
    let mut aabb = BoundingBox::EMPTY;
    for occurrence in context.occurrences.get(&node_id).into_iter().flatten() {
      for position in self.scene.occurrence_positions(occurrence)? {
        aabb.encapsulate(position);
      }
    }
    Ok(aabb)
  }

  /// Envelopes of `body_ids`, keeping only approximated bodies that some
  /// descendant tile actually draws.
  fn envelopes(&self, body_ids: &[u64], children: &[TileData]) -> TileResult<Vec<TileEnvelope>> {
    let mut descendant_bodies = BTreeSet::new();
    for child in children {
      child.visit(&mut |tile, _| {
        descendant_bodies.extend(tile.content.render_body_ids().iter().copied())
      });
    }

    let mut envelopes = Vec::new();
    for &body_id in body_ids {
      let body = self.scene.render_body(body_id)?;
      if !body.is_envelope() {
        continue;
      }
      let kept: Vec<u64> = body
        .envelope_of
        .iter()
        .copied()
        .filter(|id| descendant_bodies.contains(id))
        .collect();

      #[cfg(feature = "tracing")]
      if kept.len() < body.envelope_of.len() {
        tracing::debug!(
          render_body = body_id,
          discarded = body.envelope_of.len() - kept.len(),
          "envelope references bodies outside its subtree"
        );
      }

      if !kept.is_empty() {
        envelopes.push(TileEnvelope {
          render_body_id: body_id,
          child_render_body_ids: kept,
        });
      }
    }
    Ok(envelopes)
  }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod builder_test;
