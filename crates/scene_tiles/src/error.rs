//! Error types shared by tiling, batching and reversal.
//!
//! Every fallible operation returns [`TileResult`]. Boundary callers that speak
//! the scene library's numeric status codes use [`TileError::result_code`] or
//! [`ResultCode::from_result`].

use std::fmt;

use thiserror::Error;

/// Kind of scene object referenced by an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
  TreeNode,
  Model,
  RenderBody,
  RenderMesh,
  RenderGeometry,
  VertexBuffer,
  BatchedMesh,
  InstancedMesh,
}

impl fmt::Display for ObjectKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ObjectKind::TreeNode => "tree node",
      ObjectKind::Model => "model",
      ObjectKind::RenderBody => "render body",
      ObjectKind::RenderMesh => "render mesh",
      ObjectKind::RenderGeometry => "render geometry",
      ObjectKind::VertexBuffer => "vertex buffer",
      ObjectKind::BatchedMesh => "batched mesh",
      ObjectKind::InstancedMesh => "instanced mesh",
    };
    f.write_str(name)
  }
}

/// Errors produced while building tiles or rewriting render meshes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TileError {
  /// A configuration value is outside its accepted range.
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  /// Two scene objects of the same kind share an id.
  #[error("duplicate {kind} id {id}")]
  DuplicateId {
    /// Kind of the colliding object.
    kind: ObjectKind,
    /// The colliding id.
    id: u64,
  },

  /// A referenced scene object does not exist.
  #[error("{kind} {id} not found")]
  MissingObject {
    /// Kind of the missing object.
    kind: ObjectKind,
    /// The dangling id.
    id: u64,
  },

  /// No node in the scene produced a valid bounding volume.
  #[error("tile tree is empty: no node has valid bounding geometry")]
  EmptyTileTree,

  /// Batching/instancing was requested on a scene that already carries it.
  #[error("scene already contains batched or instanced meshes; revert first")]
  AlreadyOptimized,

  /// A batched record points outside its merged buffer.
  #[error("render mesh {render_mesh_id}: invalid geometry range ({reason})")]
  InvalidRange {
    /// Render mesh the record belongs to.
    render_mesh_id: u64,
    /// What is wrong with the range.
    reason: String,
  },

  /// A record carries a transform that cannot be inverted.
  #[error("render mesh {render_mesh_id}: transform is singular or not finite")]
  InvalidTransform {
    /// Render mesh the record belongs to.
    render_mesh_id: u64,
  },

  /// Bookkeeping records disagree with the scene.
  #[error("inconsistent batching records: {0}")]
  Inconsistent(String),
}

/// Result type for tiling and batching operations.
pub type TileResult<T> = Result<T, TileError>;

impl TileError {
  /// Shorthand for [`TileError::MissingObject`].
  pub fn missing(kind: ObjectKind, id: u64) -> Self {
    TileError::MissingObject { kind, id }
  }

  /// Numeric status code for this error.
  pub fn result_code(&self) -> ResultCode {
    match self {
      TileError::InvalidConfig(_) => ResultCode::InputError,
      TileError::DuplicateId { .. } | TileError::EmptyTileTree | TileError::AlreadyOptimized => {
        ResultCode::SceneError
      }
      TileError::MissingObject { kind, .. } => match kind {
        ObjectKind::TreeNode => ResultCode::ModelTreeError,
        ObjectKind::Model => ResultCode::ModelError,
        _ => ResultCode::MeshError,
      },
      TileError::InvalidRange { .. } | TileError::InvalidTransform { .. } => ResultCode::MeshError,
      TileError::Inconsistent(_) => ResultCode::GeneralError,
    }
  }
}

/// Numeric status codes shared with the host scene library.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
  NoError = 0,
  GeneralError = 1,
  InitialError = 2,
  InputError = 3,
  SceneError = 100,
  ModelTreeError = 200,
  ModelError = 300,
  MeshError = 400,
}

impl ResultCode {
  /// Status code of an operation result.
  pub fn from_result<T>(result: &TileResult<T>) -> Self {
    match result {
      Ok(_) => ResultCode::NoError,
      Err(err) => err.result_code(),
    }
  }

  /// Raw numeric value.
  #[inline]
  pub fn raw(self) -> u32 {
    self as u32
  }

  /// True for [`ResultCode::NoError`].
  #[inline]
  pub fn succeeded(self) -> bool {
    self == ResultCode::NoError
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_result_codes_match_wire_values() {
    assert_eq!(ResultCode::NoError.raw(), 0);
    assert_eq!(ResultCode::InputError.raw(), 3);
    assert_eq!(ResultCode::SceneError.raw(), 100);
    assert_eq!(ResultCode::ModelTreeError.raw(), 200);
    assert_eq!(ResultCode::ModelError.raw(), 300);
    assert_eq!(ResultCode::MeshError.raw(), 400);
  }

  #[test]
  fn test_missing_object_code_depends_on_kind() {
    assert_eq!(
      TileError::missing(ObjectKind::TreeNode, 1).result_code(),
      ResultCode::ModelTreeError
    );
    assert_eq!(TileError::missing(ObjectKind::Model, 1).result_code(), ResultCode::ModelError);
    assert_eq!(
      TileError::missing(ObjectKind::VertexBuffer, 1).result_code(),
      ResultCode::MeshError
    );
  }

  #[test]
  fn test_from_result() {
    let ok: TileResult<u32> = Ok(3);
    assert!(ResultCode::from_result(&ok).succeeded());

    let err: TileResult<u32> = Err(TileError::InvalidTransform { render_mesh_id: 9 });
    assert_eq!(ResultCode::from_result(&err), ResultCode::MeshError);
  }

  #[test]
  fn test_display_mentions_ids() {
    let err = TileError::DuplicateId {
      kind: ObjectKind::RenderMesh,
      id: 42,
    };
    assert_eq!(err.to_string(), "duplicate render mesh id 42");
  }
}
