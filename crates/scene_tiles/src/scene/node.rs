//! Model-tree nodes and the models they reference.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::bounds::BoundingBox;

/// Node of the product structure tree.
///
/// Children are stored by id; the owning [`super::Scene`] keeps the nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelTreeNode {
  pub id: u64,
  pub name: String,
  /// Transform relative to the parent node.
  pub local_transform: Mat4,
  /// Explicit world transform. Overrides `parent_world * local_transform`.
  pub world_transform: Option<Mat4>,
  /// Model drawn at this node, if any.
  pub model_id: Option<u64>,
  pub children: Vec<u64>,
}

impl ModelTreeNode {
  pub fn new(id: u64, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
      local_transform: Mat4::IDENTITY,
      world_transform: None,
      model_id: None,
      children: Vec::new(),
    }
  }

  pub fn with_local_transform(mut self, transform: Mat4) -> Self {
    self.local_transform = transform;
    self
  }

  pub fn with_world_transform(mut self, transform: Mat4) -> Self {
    self.world_transform = Some(transform);
    self
  }

  pub fn with_model(mut self, model_id: u64) -> Self {
    self.model_id = Some(model_id);
    self
  }

  #[inline]
  pub fn has_model(&self) -> bool {
    self.model_id.is_some()
  }
}

/// Renderable part referenced by tree nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
  pub id: u64,
  pub name: String,
  /// Node-local box around the model's geometry, when the importer supplied one.
  pub bounding_box: Option<BoundingBox>,
  pub render_body_ids: Vec<u64>,
}

impl Model {
  pub fn new(id: u64, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
      bounding_box: None,
      render_body_ids: Vec::new(),
    }
  }

  pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
    self.bounding_box = Some(bounding_box);
    self
  }

  pub fn with_render_bodies(mut self, ids: impl Into<Vec<u64>>) -> Self {
    self.render_body_ids = ids.into();
    self
  }
}
