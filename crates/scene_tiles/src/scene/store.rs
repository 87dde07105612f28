//! In-memory scene holding every object the tiler and batcher read or rewrite.

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};

use super::node::{Model, ModelTreeNode};
use super::render::{
  RenderBody, RenderGeometry, RenderMesh, RenderMethod, VertexBuffer, VertexMaterialInfo,
};
use crate::batching::{BatchedMesh, InstancedMesh};
use crate::error::{ObjectKind, TileError, TileResult};

/// One render mesh reached through a tree node and render body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshOccurrence {
  pub tree_node_id: u64,
  pub render_body_id: u64,
  pub render_mesh_id: u64,
  /// Node world transform followed by the body matrix.
  pub world_transform: Mat4,
  /// Listed among the body's face meshes.
  pub is_face: bool,
}

/// World-space triangle attributed to the tree node that draws it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeTriangle {
  pub tree_node_id: u64,
  pub render_mesh_id: u64,
  pub positions: [Vec3; 3],
}

/// Owner of the model tree and all render objects, keyed by id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
  roots: Vec<u64>,
  nodes: BTreeMap<u64, ModelTreeNode>,
  models: BTreeMap<u64, Model>,
  render_bodies: BTreeMap<u64, RenderBody>,
  render_meshes: BTreeMap<u64, RenderMesh>,
  render_geometries: BTreeMap<u64, RenderGeometry>,
  vertex_buffers: BTreeMap<u64, VertexBuffer>,
  subset_materials: BTreeMap<(u64, u64), Vec<VertexMaterialInfo>>,
  batched_meshes: BTreeMap<u64, BatchedMesh>,
  instanced_meshes: BTreeMap<u64, InstancedMesh>,
  next_id: u64,
}

/// Insert into an id map, rejecting duplicates.
fn insert_unique<T>(
  map: &mut BTreeMap<u64, T>,
  kind: ObjectKind,
  id: u64,
  value: T,
) -> TileResult<()> {
  if map.contains_key(&id) {
    return Err(TileError::DuplicateId { kind, id });
  }
  map.insert(id, value);
  Ok(())
}

impl Scene {
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  fn reserve_id(&mut self, id: u64) {
    self.next_id = self.next_id.max(id.saturating_add(1));
  }

  /// Fresh id not used by any object inserted so far.
  pub fn allocate_id(&mut self) -> u64 {
    let id = self.next_id.max(1);
    self.next_id = id + 1;
    id
  }

  // =========================================================================
  // Model tree
  // =========================================================================

  pub fn add_root(&mut self, node: ModelTreeNode) -> TileResult<()> {
    let id = node.id;
    insert_unique(&mut self.nodes, ObjectKind::TreeNode, id, node)?;
    self.reserve_id(id);
    self.roots.push(id);
    Ok(())
  }

  pub fn add_child(&mut self, parent_id: u64, node: ModelTreeNode) -> TileResult<()> {
    if !self.nodes.contains_key(&parent_id) {
      return Err(TileError::missing(ObjectKind::TreeNode, parent_id));
    }
    let id = node.id;
    insert_unique(&mut self.nodes, ObjectKind::TreeNode, id, node)?;
    self.reserve_id(id);
    if let Some(parent) = self.nodes.get_mut(&parent_id) {
      parent.children.push(id);
    }
    Ok(())
  }

  #[inline]
  pub fn roots(&self) -> &[u64] {
    &self.roots
  }

  pub fn tree_node(&self, id: u64) -> TileResult<&ModelTreeNode> {
    self.nodes.get(&id).ok_or(TileError::missing(ObjectKind::TreeNode, id))
  }

  pub fn tree_node_count(&self) -> usize {
    self.nodes.len()
  }

  // =========================================================================
  // Render objects
  // =========================================================================

  pub fn insert_model(&mut self, model: Model) -> TileResult<()> {
    let id = model.id;
    insert_unique(&mut self.models, ObjectKind::Model, id, model)?;
    self.reserve_id(id);
    Ok(())
  }

  pub fn insert_render_body(&mut self, body: RenderBody) -> TileResult<()> {
    let id = body.id;
    insert_unique(&mut self.render_bodies, ObjectKind::RenderBody, id, body)?;
    self.reserve_id(id);
    Ok(())
  }

  pub fn insert_render_mesh(&mut self, mesh: RenderMesh) -> TileResult<()> {
    let id = mesh.id;
    insert_unique(&mut self.render_meshes, ObjectKind::RenderMesh, id, mesh)?;
    self.reserve_id(id);
    Ok(())
  }

  pub fn insert_render_geometry(&mut self, geometry: RenderGeometry) -> TileResult<()> {
    let id = geometry.id;
    insert_unique(&mut self.render_geometries, ObjectKind::RenderGeometry, id, geometry)?;
    self.reserve_id(id);
    Ok(())
  }

  pub fn insert_vertex_buffer(&mut self, buffer: VertexBuffer) -> TileResult<()> {
    let id = buffer.id;
    insert_unique(&mut self.vertex_buffers, ObjectKind::VertexBuffer, id, buffer)?;
    self.reserve_id(id);
    Ok(())
  }

  /// Override the materials of `render_mesh_id` when drawn at `tree_node_id`.
  pub fn set_subset_materials(
    &mut self,
    tree_node_id: u64,
    render_mesh_id: u64,
    infos: Vec<VertexMaterialInfo>,
  ) {
    self.subset_materials.insert((tree_node_id, render_mesh_id), infos);
  }

  pub fn subset_materials(
    &self,
    tree_node_id: u64,
    render_mesh_id: u64,
  ) -> Option<&[VertexMaterialInfo]> {
    self
      .subset_materials
      .get(&(tree_node_id, render_mesh_id))
      .map(Vec::as_slice)
  }

  pub fn model(&self, id: u64) -> TileResult<&Model> {
    self.models.get(&id).ok_or(TileError::missing(ObjectKind::Model, id))
  }

  pub fn render_body(&self, id: u64) -> TileResult<&RenderBody> {
    self
      .render_bodies
      .get(&id)
      .ok_or(TileError::missing(ObjectKind::RenderBody, id))
  }

  pub fn render_mesh(&self, id: u64) -> TileResult<&RenderMesh> {
    self
      .render_meshes
      .get(&id)
      .ok_or(TileError::missing(ObjectKind::RenderMesh, id))
  }

  pub fn render_mesh_mut(&mut self, id: u64) -> TileResult<&mut RenderMesh> {
    self
      .render_meshes
      .get_mut(&id)
      .ok_or(TileError::missing(ObjectKind::RenderMesh, id))
  }

  pub fn render_geometry(&self, id: u64) -> TileResult<&RenderGeometry> {
    self
      .render_geometries
      .get(&id)
      .ok_or(TileError::missing(ObjectKind::RenderGeometry, id))
  }

  pub fn vertex_buffer(&self, id: u64) -> TileResult<&VertexBuffer> {
    self
      .vertex_buffers
      .get(&id)
      .ok_or(TileError::missing(ObjectKind::VertexBuffer, id))
  }

  pub fn render_meshes(&self) -> impl Iterator<Item = &RenderMesh> {
    self.render_meshes.values()
  }

  pub fn render_geometries(&self) -> impl Iterator<Item = &RenderGeometry> {
    self.render_geometries.values()
  }

  pub fn vertex_buffers(&self) -> impl Iterator<Item = &VertexBuffer> {
    self.vertex_buffers.values()
  }

  pub(crate) fn remove_render_geometry(&mut self, id: u64) -> TileResult<RenderGeometry> {
    self
      .render_geometries
      .remove(&id)
      .ok_or(TileError::missing(ObjectKind::RenderGeometry, id))
  }

  pub(crate) fn remove_vertex_buffer(&mut self, id: u64) -> TileResult<VertexBuffer> {
    self
      .vertex_buffers
      .remove(&id)
      .ok_or(TileError::missing(ObjectKind::VertexBuffer, id))
  }

  // =========================================================================
  // Batched / instanced objects
  // =========================================================================

  pub fn batched_mesh(&self, id: u64) -> TileResult<&BatchedMesh> {
    self
      .batched_meshes
      .get(&id)
      .ok_or(TileError::missing(ObjectKind::BatchedMesh, id))
  }

  pub fn instanced_mesh(&self, id: u64) -> TileResult<&InstancedMesh> {
    self
      .instanced_meshes
      .get(&id)
      .ok_or(TileError::missing(ObjectKind::InstancedMesh, id))
  }

  pub fn batched_meshes(&self) -> impl Iterator<Item = &BatchedMesh> {
    self.batched_meshes.values()
  }

  pub fn instanced_meshes(&self) -> impl Iterator<Item = &InstancedMesh> {
    self.instanced_meshes.values()
  }

  pub(crate) fn insert_batched_mesh(&mut self, mesh: BatchedMesh) -> TileResult<()> {
    let id = mesh.id;
    insert_unique(&mut self.batched_meshes, ObjectKind::BatchedMesh, id, mesh)?;
    self.reserve_id(id);
    Ok(())
  }

  pub(crate) fn insert_instanced_mesh(&mut self, mesh: InstancedMesh) -> TileResult<()> {
    let id = mesh.id;
    insert_unique(&mut self.instanced_meshes, ObjectKind::InstancedMesh, id, mesh)?;
    self.reserve_id(id);
    Ok(())
  }

  /// Take every batched and instanced object out of the scene.
  pub(crate) fn take_optimized(&mut self) -> (Vec<BatchedMesh>, Vec<InstancedMesh>) {
    (
      std::mem::take(&mut self.batched_meshes).into_values().collect(),
      std::mem::take(&mut self.instanced_meshes).into_values().collect(),
    )
  }

  /// True when batching or instancing has been applied and not reverted.
  pub fn is_optimized(&self) -> bool {
    !self.batched_meshes.is_empty() || !self.instanced_meshes.is_empty()
  }

  // =========================================================================
  // Derived queries
  // =========================================================================

  /// Pre-order node ids from every root. Fails on dangling child ids or
  /// nodes reachable twice.
  pub fn pre_order(&self) -> TileResult<Vec<u64>> {
    let mut order = Vec::with_capacity(self.nodes.len());
    let mut seen = std::collections::BTreeSet::new();
    let mut stack: Vec<u64> = self.roots.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
      let node = self.tree_node(id)?;
      if !seen.insert(id) {
        return Err(TileError::Inconsistent(format!("tree node {id} is reachable twice")));
      }
      order.push(id);
      stack.extend(node.children.iter().rev().copied());
    }
    Ok(order)
  }

  /// World transform of every reachable node.
  pub fn world_transforms(&self) -> TileResult<BTreeMap<u64, Mat4>> {
    let mut transforms = BTreeMap::new();
    let mut parents: BTreeMap<u64, Mat4> = BTreeMap::new();
    for &root in &self.roots {
      parents.insert(root, Mat4::IDENTITY);
    }
    for id in self.pre_order()? {
      let node = self.tree_node(id)?;
      let parent_world = parents.get(&id).copied().unwrap_or(Mat4::IDENTITY);
      let world = node
        .world_transform
        .unwrap_or(parent_world * node.local_transform);
      for &child in &node.children {
        parents.insert(child, world);
      }
      transforms.insert(id, world);
    }
    Ok(transforms)
  }

  /// Every (node, body, mesh) reachable from the roots, in tree pre-order.
  pub fn mesh_occurrences(&self) -> TileResult<Vec<MeshOccurrence>> {
    let transforms = self.world_transforms()?;
    let mut occurrences = Vec::new();
    for id in self.pre_order()? {
      let node = self.tree_node(id)?;
      let Some(model_id) = node.model_id else {
        continue;
      };
      let node_world = transforms.get(&id).copied().unwrap_or(Mat4::IDENTITY);
      for &body_id in &self.model(model_id)?.render_body_ids {
        let body = self.render_body(body_id)?;
        let world_transform = node_world * body.matrix_or_identity();
        let face_count = body.face_mesh_ids.len();
        for (i, render_mesh_id) in body.all_mesh_ids().enumerate() {
          occurrences.push(MeshOccurrence {
            tree_node_id: id,
            render_body_id: body_id,
            render_mesh_id,
            world_transform,
            is_face: i < face_count,
          });
        }
      }
    }
    Ok(occurrences)
  }

  /// World-space positions of every indexed vertex of one occurrence, in
  /// index order, whichever render method draws it.
  pub fn occurrence_positions(&self, occurrence: &MeshOccurrence) -> TileResult<Vec<Vec3>> {
    let mesh = self.render_mesh(occurrence.render_mesh_id)?;
    let mut positions = Vec::new();

    match mesh.render_method {
      RenderMethod::Common => {
        for &geometry_id in &mesh.render_geometry_ids {
          let geometry = self.render_geometry(geometry_id)?;
          let buffer = self.vertex_buffer(geometry.vertex_buffer_id)?;
          let transform = &occurrence.world_transform;
          gather_positions(mesh.id, &geometry.indices, buffer, transform, &mut positions)?;
        }
      }
      RenderMethod::Batched => {
        let batched_id = mesh.batched_mesh_id.ok_or_else(|| {
          TileError::Inconsistent(format!(
            "render mesh {} is batched without a batched mesh",
            mesh.id
          ))
        })?;
        let batched = self.batched_mesh(batched_id)?;
        let info = batched
          .infos
          .iter()
          .find(|info| {
            info.render_mesh_id == mesh.id && info.tree_node_id == occurrence.tree_node_id
          })
          .ok_or_else(|| {
            TileError::Inconsistent(format!(
              "batched mesh {batched_id} has no record for render mesh {}",
              mesh.id
            ))
          })?;
        let geometry = self.render_geometry(batched.render_geometry_id)?;
        let buffer = self.vertex_buffer(batched.vertex_buffer_id)?;
        for range in &info.ranges {
          let start = range.index_min as usize;
          let end = range.index_max as usize + 1;
          let indices = geometry.indices.get(start..end).ok_or_else(|| TileError::InvalidRange {
            render_mesh_id: mesh.id,
            reason: format!("indices {start}..{end} exceed merged buffer"),
          })?;
          gather_positions(mesh.id, indices, buffer, &Mat4::IDENTITY, &mut positions)?;
        }
      }
      RenderMethod::Instanced => {
        let instanced_id = mesh.instanced_mesh_id.ok_or_else(|| {
          TileError::Inconsistent(format!(
            "render mesh {} is instanced without an instanced mesh",
            mesh.id
          ))
        })?;
        let instanced = self.instanced_mesh(instanced_id)?;
        let info = instanced
          .infos
          .iter()
          .find(|info| info.render_mesh_id == mesh.id)
          .ok_or_else(|| {
            TileError::Inconsistent(format!(
              "instanced mesh {instanced_id} has no record for render mesh {}",
              mesh.id
            ))
          })?;
        let geometry = self.render_geometry(instanced.render_geometry_id)?;
        let buffer = self.vertex_buffer(instanced.vertex_buffer_id)?;
        let transform = &info.instanced_matrix;
        gather_positions(mesh.id, &geometry.indices, buffer, transform, &mut positions)?;
      }
    }
    Ok(positions)
  }

  /// Every face triangle in world space, attributed to its tree node.
  pub fn node_triangles(&self) -> TileResult<Vec<NodeTriangle>> {
    let mut triangles = Vec::new();
    for occurrence in self.mesh_occurrences()?.into_iter().filter(|o| o.is_face) {
      let positions = self.occurrence_positions(&occurrence)?;
      triangles.extend(positions.chunks_exact(3).map(|corners| NodeTriangle {
        tree_node_id: occurrence.tree_node_id,
        render_mesh_id: occurrence.render_mesh_id,
        positions: [corners[0], corners[1], corners[2]],
      }));
    }
    Ok(triangles)
  }

  /// Draw calls needed for the scene as it stands: one per common render
  /// mesh plus one per batched or instanced object.
  pub fn draw_call_count(&self) -> usize {
    let common = self
      .render_meshes
      .values()
      .filter(|mesh| mesh.render_method == RenderMethod::Common)
      .count();
    common + self.batched_meshes.len() + self.instanced_meshes.len()
  }
}

fn gather_positions(
  render_mesh_id: u64,
  indices: &[u32],
  buffer: &VertexBuffer,
  transform: &Mat4,
  out: &mut Vec<Vec3>,
) -> TileResult<()> {
  out.reserve(indices.len());
  for &index in indices {
    let vertex = buffer.vertices.get(index as usize).ok_or_else(|| TileError::InvalidRange {
      render_mesh_id,
      reason: format!("index {index} outside vertex buffer {}", buffer.id),
    })?;
    out.push(transform.transform_point3(vertex.position));
  }
  Ok(())
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
