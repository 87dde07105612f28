//! Bookkeeping records kept alongside batched and instanced meshes.
//!
//! The records hold every original id, range and transform, so the rewrite
//! can be undone without loss.

use std::cmp::Ordering;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::scene::{RenderGeometry, VertexBuffer, VertexMaterialInfo};

/// Where one original render geometry now lives inside a merged buffer.
///
/// Both ranges are inclusive. Indices inside `[index_min, index_max]` are
/// absolute positions in the merged vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderGeometryRangeInfo {
  /// Original render geometry id.
  pub render_geometry_id: u64,
  /// Original vertex buffer id.
  pub vertex_buffer_id: u64,
  pub vertex_index_min: u32,
  pub vertex_index_max: u32,
  pub index_min: u32,
  pub index_max: u32,
}

impl RenderGeometryRangeInfo {
  #[inline]
  pub fn vertex_count(&self) -> usize {
    (self.vertex_index_max as usize + 1).saturating_sub(self.vertex_index_min as usize)
  }

  #[inline]
  pub fn index_count(&self) -> usize {
    (self.index_max as usize + 1).saturating_sub(self.index_min as usize)
  }
}

/// One render mesh folded into a batched mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchedRenderMeshInfo {
  pub tree_node_id: u64,
  pub render_body_id: u64,
  pub render_mesh_id: u64,
  /// World transform baked into the merged vertices.
  pub baked_transform: Mat4,
  pub ranges: Vec<RenderGeometryRangeInfo>,
}

/// One occurrence of a shared instanced geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstancedRenderMeshInfo {
  pub tree_node_id: u64,
  pub render_body_id: u64,
  pub render_mesh_id: u64,
  /// Original render geometry id of this occurrence.
  pub render_geometry_id: u64,
  /// Original vertex buffer id of this occurrence.
  pub vertex_buffer_id: u64,
  /// World transform of this occurrence.
  pub instanced_matrix: Mat4,
}

/// Geometry and vertex buffer a rewrite took out of the scene, kept as they
/// were so reverting puts back the exact same data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetachedGeometry {
  pub geometry: RenderGeometry,
  pub vertex_buffer: VertexBuffer,
}

impl DetachedGeometry {
  #[inline]
  pub fn id(&self) -> u64 {
    self.geometry.id
  }
}

/// Ordered material ids of a mesh's subsets.
///
/// Ordered by length first, then lexicographically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialKey(pub SmallVec<[u64; 4]>);

impl MaterialKey {
  pub fn single(material_id: u64) -> Self {
    let mut ids = SmallVec::new();
    ids.push(material_id);
    Self(ids)
  }

  pub fn from_ids<I: IntoIterator<Item = u64>>(ids: I) -> Self {
    Self(ids.into_iter().collect())
  }

  #[inline]
  pub fn ids(&self) -> &[u64] {
    &self.0
  }
}

impl Ord for MaterialKey {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .0
      .len()
      .cmp(&other.0.len())
      .then_with(|| self.0.as_slice().cmp(other.0.as_slice()))
  }
}

impl PartialOrd for MaterialKey {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

/// Merged mesh drawn with one call, vertices in world space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchedMesh {
  pub id: u64,
  pub render_geometry_id: u64,
  pub vertex_buffer_id: u64,
  pub material_key: MaterialKey,
  pub infos: Vec<BatchedRenderMeshInfo>,
  /// Material sub-ranges of the merged geometry, member by member.
  #[serde(default)]
  pub subsets: Vec<VertexMaterialInfo>,
  /// Original local geometry of every member.
  #[serde(default)]
  pub detached: Vec<DetachedGeometry>,
}

impl BatchedMesh {
  /// Subsets drawn with `material_id`.
  pub fn subsets_of(&self, material_id: u64) -> impl Iterator<Item = &VertexMaterialInfo> {
    self.subsets.iter().filter(move |s| s.material_id == material_id)
  }
}

/// Shared geometry drawn once per occurrence transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstancedMesh {
  pub id: u64,
  pub render_geometry_id: u64,
  pub vertex_buffer_id: u64,
  pub infos: Vec<InstancedRenderMeshInfo>,
  /// Own geometry of every member except the one whose geometry is shared.
  #[serde(default)]
  pub detached: Vec<DetachedGeometry>,
}
