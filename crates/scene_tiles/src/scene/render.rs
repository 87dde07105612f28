//! Render bodies, meshes, geometries and vertex buffers.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Group of meshes drawn together for one model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderBody {
  pub id: u64,
  pub name: String,
  pub face_mesh_ids: Vec<u64>,
  pub line_mesh_ids: Vec<u64>,
  pub point_mesh_ids: Vec<u64>,
  /// Transform applied after the node's world transform.
  pub matrix: Option<Mat4>,
  /// Finer render bodies this body approximates at a distance.
  pub envelope_of: Vec<u64>,
}

impl RenderBody {
  pub fn new(id: u64) -> Self {
    Self {
      id,
      name: String::new(),
      face_mesh_ids: Vec::new(),
      line_mesh_ids: Vec::new(),
      point_mesh_ids: Vec::new(),
      matrix: None,
      envelope_of: Vec::new(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_face_meshes(mut self, ids: impl Into<Vec<u64>>) -> Self {
    self.face_mesh_ids = ids.into();
    self
  }

  pub fn with_line_meshes(mut self, ids: impl Into<Vec<u64>>) -> Self {
    self.line_mesh_ids = ids.into();
    self
  }

  pub fn with_point_meshes(mut self, ids: impl Into<Vec<u64>>) -> Self {
    self.point_mesh_ids = ids.into();
    self
  }

  pub fn with_matrix(mut self, matrix: Mat4) -> Self {
    self.matrix = Some(matrix);
    self
  }

  pub fn with_envelope_of(mut self, ids: impl Into<Vec<u64>>) -> Self {
    self.envelope_of = ids.into();
    self
  }

  #[inline]
  pub fn is_envelope(&self) -> bool {
    !self.envelope_of.is_empty()
  }

  /// Face, line and point meshes in that order.
  pub fn all_mesh_ids(&self) -> impl Iterator<Item = u64> + '_ {
    self
      .face_mesh_ids
      .iter()
      .chain(&self.line_mesh_ids)
      .chain(&self.point_mesh_ids)
      .copied()
  }

  /// Body matrix, identity when absent.
  #[inline]
  pub fn matrix_or_identity(&self) -> Mat4 {
    self.matrix.unwrap_or(Mat4::IDENTITY)
  }
}

/// Role of a render mesh. Raw values match the persisted scene format.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMeshType {
  #[default]
  Main = 1,
  Auxiliary = 2,
  Pmi = 3,
}

/// How a render mesh reaches the GPU.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMethod {
  /// Own geometry, own draw call.
  #[default]
  Common = 1,
  /// Folded into a [`crate::batching::BatchedMesh`].
  Batched = 2,
  /// Drawn through a [`crate::batching::InstancedMesh`].
  Instanced = 3,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderMesh {
  pub id: u64,
  pub mesh_type: RenderMeshType,
  pub render_geometry_ids: Vec<u64>,
  pub material_id: u64,
  pub render_method: RenderMethod,
  pub batched_mesh_id: Option<u64>,
  pub instanced_mesh_id: Option<u64>,
}

impl RenderMesh {
  pub fn new(id: u64, render_geometry_id: u64, material_id: u64) -> Self {
    Self {
      id,
      mesh_type: RenderMeshType::Main,
      render_geometry_ids: vec![render_geometry_id],
      material_id,
      render_method: RenderMethod::Common,
      batched_mesh_id: None,
      instanced_mesh_id: None,
    }
  }

  pub fn with_type(mut self, mesh_type: RenderMeshType) -> Self {
    self.mesh_type = mesh_type;
    self
  }

  pub fn with_geometries(mut self, ids: impl Into<Vec<u64>>) -> Self {
    self.render_geometry_ids = ids.into();
    self
  }

  #[inline]
  pub fn first_geometry_id(&self) -> Option<u64> {
    self.render_geometry_ids.first().copied()
  }
}

/// Triangle index list over one vertex buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderGeometry {
  pub id: u64,
  pub vertex_buffer_id: u64,
  pub indices: Vec<u32>,
}

impl RenderGeometry {
  pub fn new(id: u64, vertex_buffer_id: u64, indices: impl Into<Vec<u32>>) -> Self {
    Self {
      id,
      vertex_buffer_id,
      indices: indices.into(),
    }
  }

  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }
}

/// Single vertex as stored by the scene library.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexData {
  pub position: Vec3,
  pub normal: Vec3,
  pub uv: Vec2,
  pub color: [u8; 3],
  pub opacity: u8,
}

impl VertexData {
  pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
    Self {
      position,
      normal,
      uv,
      color: [255; 3],
      opacity: 255,
    }
  }

  pub fn with_color(mut self, color: [u8; 3], opacity: u8) -> Self {
    self.color = color;
    self.opacity = opacity;
    self
  }

  /// Position by `transform`, normal by `normal_matrix`.
  #[inline]
  pub fn transformed(&self, transform: &Mat4, normal_matrix: &glam::Mat3) -> Self {
    Self {
      position: transform.transform_point3(self.position),
      normal: *normal_matrix * self.normal,
      ..*self
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexBuffer {
  pub id: u64,
  pub vertices: Vec<VertexData>,
}

impl VertexBuffer {
  pub fn new(id: u64, vertices: impl Into<Vec<VertexData>>) -> Self {
    Self {
      id,
      vertices: vertices.into(),
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.vertices.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty()
  }
}

/// Per-node material override for a vertex/index sub-range of a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexMaterialInfo {
  pub vertex_start: u32,
  pub vertex_end: u32,
  pub index_start: u32,
  pub index_end: u32,
  pub material_id: u64,
}
