//! Batch planning over the tile tree.
//!
//! The tile tree is cut into cells: every tile at the starting depth roots a
//! cell that absorbs tree-node tiles up to the reserve depth below it, so one
//! batch never spans more than a bounded region. Inside a cell, meshes are
//! grouped by material key and packed greedily under the vertex budget.
//! With node merging on, the meshes one node draws with the same key are
//! packed as one unit, so a node's bodies land in the same merged mesh
//! whenever they fit the budget together.

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::catalog::{MeshCandidate, MeshCatalog};
use super::records::{BatchedRenderMeshInfo, MaterialKey, RenderGeometryRangeInfo};
use crate::error::{TileError, TileResult};
use crate::tile::TileData;

/// Meshes that will share one merged buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchGroup {
  pub material_key: MaterialKey,
  /// One record per mesh; ranges are offsets into the merged buffer.
  pub infos: Vec<BatchedRenderMeshInfo>,
  pub vertex_count: usize,
  pub index_count: usize,
}

impl BatchGroup {
  fn new(material_key: MaterialKey) -> Self {
    Self {
      material_key,
      infos: Vec::new(),
      vertex_count: 0,
      index_count: 0,
    }
  }

  /// A group of one is left as it is.
  #[inline]
  pub fn is_singleton(&self) -> bool {
    self.infos.len() == 1
  }

  fn push(&mut self, candidate: &MeshCandidate, vertex_count: usize) -> TileResult<()> {
    let to_u32 = |value: usize| {
      u32::try_from(value).map_err(|_| TileError::InvalidRange {
        render_mesh_id: candidate.render_mesh_id,
        reason: format!("offset {value} does not fit a 32-bit index"),
      })
    };
    let range = RenderGeometryRangeInfo {
      render_geometry_id: candidate.render_geometry_id,
      vertex_buffer_id: candidate.vertex_buffer_id,
      vertex_index_min: to_u32(self.vertex_count)?,
      vertex_index_max: to_u32(self.vertex_count + vertex_count - 1)?,
      index_min: to_u32(self.index_count)?,
      index_max: to_u32(self.index_count + candidate.index_count - 1)?,
    };
    self.infos.push(BatchedRenderMeshInfo {
      tree_node_id: candidate.tree_node_id,
      render_body_id: candidate.render_body_id,
      render_mesh_id: candidate.render_mesh_id,
      baked_transform: candidate.world_transform,
      ranges: vec![range],
    });
    self.vertex_count += vertex_count;
    self.index_count += candidate.index_count;
    Ok(())
  }
}

/// Plan batch groups for the candidates in `catalog`.
///
/// `batched_tile_node_depth` counts tile levels from the root (0), synthetic
/// tiles included; a branch ending above it roots a cell at its leaf, and
/// content of tiles above it forms one extra cell. `reserve_depth` counts
/// tree-node tiles only. Groups come out in cell pre-order, then material
/// key order, whether cells are packed on the rayon pool or not.
#[cfg_attr(
  feature = "tracing",
  tracing::instrument(skip_all, name = "batching::calculate_render_mesh_batched_data")
)]
pub fn calculate_render_mesh_batched_data(
  tile_root: &TileData,
  catalog: &MeshCatalog,
  batched_tile_node_depth: usize,
  batched_max_vertex_count: usize,
  reserve_depth: usize,
  merge_node_bodies: bool,
  parallel: bool,
) -> TileResult<Vec<BatchGroup>> {
  let cells = {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("collect_cells").entered();
    let mut cells = vec![Vec::new()];
    collect_cells(tile_root, 0, batched_tile_node_depth, reserve_depth, &mut cells);
    cells
  };

  #[cfg(feature = "tracing")]
  let _span = tracing::info_span!("pack_cells", cells = cells.len()).entered();

  let pack =
    |cell: &Vec<u64>| pack_cell(cell, catalog, batched_max_vertex_count, merge_node_bodies);
  let packed: Vec<Vec<BatchGroup>> = if parallel {
    cells.par_iter().map(pack).collect::<TileResult<_>>()?
  } else {
    cells.iter().map(pack).collect::<TileResult<_>>()?
  };
  Ok(packed.into_iter().flatten().collect())
}

/// Split the tree into cells of tree-node ids. `cells[0]` holds the content
/// of tiles above the starting depth.
fn collect_cells(
  tile: &TileData,
  depth: usize,
  target_depth: usize,
  reserve_depth: usize,
  cells: &mut Vec<Vec<u64>>,
) {
  if depth < target_depth && !tile.children.is_empty() {
    if let Some(node_id) = tile.content.tree_node_id {
      cells[0].push(node_id);
    }
    for child in &tile.children {
      collect_cells(child, depth + 1, target_depth, reserve_depth, cells);
    }
    return;
  }

  cells.push(Vec::new());
  let cell = cells.len() - 1;
  gather_cell(tile, 0, reserve_depth, cell, cells);
}

fn gather_cell(
  tile: &TileData,
  level: usize,
  reserve_depth: usize,
  cell: usize,
  cells: &mut Vec<Vec<u64>>,
) {
  if let Some(node_id) = tile.content.tree_node_id {
    cells[cell].push(node_id);
  }
  for child in &tile.children {
    // Synthetic tiles are pass-through.
    let child_level = if child.is_synthetic() { level } else { level + 1 };
    if child_level > reserve_depth {
      cells.push(Vec::new());
      let next = cells.len() - 1;
      gather_cell(child, 0, reserve_depth, next, cells);
    } else {
      gather_cell(child, child_level, reserve_depth, cell, cells);
    }
  }
}

fn pack_cell(
  cell: &[u64],
  catalog: &MeshCatalog,
  max_vertex_count: usize,
  merge_node_bodies: bool,
) -> TileResult<Vec<BatchGroup>> {
  // Units of meshes per material key, in cell order.
  let mut by_material: BTreeMap<&MaterialKey, Vec<Vec<&MeshCandidate>>> = BTreeMap::new();
  for &node_id in cell {
    let mut node_units: BTreeMap<&MaterialKey, usize> = BTreeMap::new();
    for candidate in catalog.candidates_of(node_id) {
      let units = by_material.entry(&candidate.material_key).or_default();
      match node_units.get(&candidate.material_key) {
        Some(&unit) if merge_node_bodies => units[unit].push(candidate),
        _ => {
          node_units.insert(&candidate.material_key, units.len());
          units.push(vec![candidate]);
        }
      }
    }
  }

  let mut groups = Vec::new();
  for (material_key, units) in by_material {
    let mut current = BatchGroup::new(material_key.clone());
    for unit in units {
      let members: Vec<(&MeshCandidate, usize)> = unit
        .into_iter()
        .map(|c| (c, catalog.vertex_count(c.render_mesh_id).unwrap_or(c.vertex_count)))
        .collect();
      let total: usize = members.iter().map(|&(_, count)| count).sum();

      if members.len() > 1 && total <= max_vertex_count {
        if current.vertex_count + total > max_vertex_count {
          let full = std::mem::replace(&mut current, BatchGroup::new(material_key.clone()));
          groups.push(full);
        }
        for (candidate, vertex_count) in members {
          current.push(candidate, vertex_count)?;
        }
        continue;
      }

      if members.len() > 1 {
        // A node too large for one batch is packed on its own.
        let mut node_group = BatchGroup::new(material_key.clone());
        pack_greedy(&members, material_key, max_vertex_count, &mut node_group, &mut groups)?;
        if !node_group.infos.is_empty() {
          groups.push(node_group);
        }
        continue;
      }

      pack_greedy(&members, material_key, max_vertex_count, &mut current, &mut groups)?;
    }
    if !current.infos.is_empty() {
      groups.push(current);
    }
  }
  Ok(groups)
}

/// Append meshes to `current` one at a time, closing it whenever the next
/// mesh would overflow the budget. An over-budget mesh goes alone.
fn pack_greedy(
  members: &[(&MeshCandidate, usize)],
  material_key: &MaterialKey,
  max_vertex_count: usize,
  current: &mut BatchGroup,
  groups: &mut Vec<BatchGroup>,
) -> TileResult<()> {
  for &(candidate, vertex_count) in members {
    if vertex_count > max_vertex_count {
      let mut alone = BatchGroup::new(material_key.clone());
      alone.push(candidate, vertex_count)?;
      groups.push(alone);
      continue;
    }

    if current.vertex_count + vertex_count > max_vertex_count {
      let full = std::mem::replace(current, BatchGroup::new(material_key.clone()));
      groups.push(full);
    }
    current.push(candidate, vertex_count)?;
  }
  Ok(())
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod planner_test;
