//! Candidate meshes for batching and instancing.
//!
//! Built once per run: the vertex count of every reachable mesh and the list
//! of meshes each tree node may contribute. Instancing removes what it takes
//! before the batching planner reads the catalog.

use std::collections::{BTreeMap, BTreeSet};

use glam::Mat4;
use indexmap::IndexMap;

use super::records::MaterialKey;
use crate::error::TileResult;
use crate::scene::{MeshOccurrence, RenderMeshType, RenderMethod, Scene};

/// A render mesh that may be folded into a batch or an instance group.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshCandidate {
  pub tree_node_id: u64,
  pub render_body_id: u64,
  pub render_mesh_id: u64,
  pub render_geometry_id: u64,
  pub vertex_buffer_id: u64,
  pub vertex_count: usize,
  pub index_count: usize,
  pub material_key: MaterialKey,
  pub world_transform: Mat4,
}

#[derive(Clone, Debug, Default)]
pub struct MeshCatalog {
  mesh_vertex_counts: BTreeMap<u64, usize>,
  /// Candidates in scene pre-order, keyed by render mesh id.
  candidates: IndexMap<u64, MeshCandidate>,
  by_node: BTreeMap<u64, Vec<u64>>,
}

/// How often each id is referenced.
fn reference_counts<I: IntoIterator<Item = u64>>(ids: I) -> BTreeMap<u64, usize> {
  let mut counts = BTreeMap::new();
  for id in ids {
    *counts.entry(id).or_insert(0) += 1;
  }
  counts
}

impl MeshCatalog {
  #[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, name = "batching::MeshCatalog::collect")
  )]
  pub fn collect(scene: &Scene) -> TileResult<Self> {
    let occurrences = scene.mesh_occurrences()?;
    let mesh_refs = reference_counts(occurrences.iter().map(|o| o.render_mesh_id));
    let geometry_refs = reference_counts(
      scene
        .render_meshes()
        .flat_map(|m| m.render_geometry_ids.iter().copied()),
    );
    let buffer_refs = reference_counts(scene.render_geometries().map(|g| g.vertex_buffer_id));

    let mut catalog = Self::default();
    let mut skipped = 0usize;
    for occurrence in &occurrences {
      let mesh = scene.render_mesh(occurrence.render_mesh_id)?;
      let mut vertex_count = 0;
      for &geometry_id in &mesh.render_geometry_ids {
        let geometry = scene.render_geometry(geometry_id)?;
        vertex_count += scene.vertex_buffer(geometry.vertex_buffer_id)?.len();
      }
      catalog.mesh_vertex_counts.insert(mesh.id, vertex_count);

      let eligible = occurrence.is_face
        && mesh.mesh_type == RenderMeshType::Main
        && mesh.render_method == RenderMethod::Common
        && mesh.render_geometry_ids.len() == 1
        && mesh_refs.get(&mesh.id) == Some(&1);
      if !eligible {
        skipped += 1;
        continue;
      }

      match Self::eligible_candidate(scene, occurrence, &geometry_refs, &buffer_refs)? {
        Some(candidate) => catalog.push(candidate),
        None => skipped += 1,
      }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(candidates = catalog.len(), skipped, "mesh catalog collected");
    #[cfg(not(feature = "tracing"))]
    let _ = skipped;

    Ok(catalog)
  }

  /// Candidate for an eligible occurrence, `None` when its buffers are shared,
  /// its index list is not a clean triangle list or its transform cannot be
  /// inverted.
  fn eligible_candidate(
    scene: &Scene,
    occurrence: &MeshOccurrence,
    geometry_refs: &BTreeMap<u64, usize>,
    buffer_refs: &BTreeMap<u64, usize>,
  ) -> TileResult<Option<MeshCandidate>> {
    let mesh = scene.render_mesh(occurrence.render_mesh_id)?;
    let Some(geometry_id) = mesh.first_geometry_id() else {
      return Ok(None);
    };
    let geometry = scene.render_geometry(geometry_id)?;
    let buffer = scene.vertex_buffer(geometry.vertex_buffer_id)?;

    let exclusive = geometry_refs.get(&geometry.id) == Some(&1)
      && buffer_refs.get(&buffer.id) == Some(&1);
    let triangles = !geometry.indices.is_empty()
      && geometry.indices.len() % 3 == 0
      && geometry.indices.iter().all(|&i| (i as usize) < buffer.len());
    let transform = &occurrence.world_transform;
    let invertible = transform.is_finite() && transform.determinant() != 0.0;
    if !exclusive || !triangles || !invertible {
      return Ok(None);
    }

    let material_key = match scene.subset_materials(occurrence.tree_node_id, mesh.id) {
      Some(subsets) if !subsets.is_empty() => {
        MaterialKey::from_ids(subsets.iter().map(|s| s.material_id))
      }
      _ => MaterialKey::single(mesh.material_id),
    };

    Ok(Some(MeshCandidate {
      tree_node_id: occurrence.tree_node_id,
      render_body_id: occurrence.render_body_id,
      render_mesh_id: mesh.id,
      render_geometry_id: geometry.id,
      vertex_buffer_id: buffer.id,
      vertex_count: buffer.len(),
      index_count: geometry.indices.len(),
      material_key,
      world_transform: occurrence.world_transform,
    }))
  }

  fn push(&mut self, candidate: MeshCandidate) {
    self
      .by_node
      .entry(candidate.tree_node_id)
      .or_default()
      .push(candidate.render_mesh_id);
    self.candidates.insert(candidate.render_mesh_id, candidate);
  }

  /// Vertex count of any reachable render mesh, eligible or not.
  #[inline]
  pub fn vertex_count(&self, render_mesh_id: u64) -> Option<usize> {
    self.mesh_vertex_counts.get(&render_mesh_id).copied()
  }

  pub fn candidate(&self, render_mesh_id: u64) -> Option<&MeshCandidate> {
    self.candidates.get(&render_mesh_id)
  }

  /// All candidates in scene pre-order.
  pub fn candidates(&self) -> impl Iterator<Item = &MeshCandidate> {
    self.candidates.values()
  }

  /// Candidates drawn at one tree node, in body order.
  pub fn candidates_of(&self, tree_node_id: u64) -> impl Iterator<Item = &MeshCandidate> {
    self
      .by_node
      .get(&tree_node_id)
      .into_iter()
      .flatten()
      .filter_map(|id| self.candidates.get(id))
  }

  /// Drop meshes taken by another stage.
  pub fn remove(&mut self, render_mesh_ids: &BTreeSet<u64>) {
    self.candidates.retain(|id, _| !render_mesh_ids.contains(id));
    for ids in self.by_node.values_mut() {
      ids.retain(|id| !render_mesh_ids.contains(id));
    }
    self.by_node.retain(|_, ids| !ids.is_empty());
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.candidates.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.candidates.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{ObjectKind, TileError};
  use crate::scene::{ModelTreeNode, VertexMaterialInfo};
  use crate::test_utils::{add_box_node, box_row_scene};

  #[test]
  fn test_box_row_candidates() {
    let (scene, boxes) = box_row_scene(3, 2.0, 4);
    let catalog = MeshCatalog::collect(&scene).unwrap();

    assert_eq!(catalog.len(), 3);
    let candidate = catalog.candidate(boxes[1].mesh).unwrap();
    assert_eq!(candidate.vertex_count, 8);
    assert_eq!(candidate.index_count, 36);
    assert_eq!(candidate.material_key, MaterialKey::single(4));
    assert_eq!(candidate.tree_node_id, boxes[1].node);
    assert_eq!(catalog.vertex_count(boxes[1].mesh), Some(8));

    let order: Vec<u64> = catalog.candidates().map(|c| c.render_mesh_id).collect();
    assert_eq!(order, boxes.iter().map(|b| b.mesh).collect::<Vec<_>>());
  }

  #[test]
  fn test_subset_materials_define_key() {
    let (mut scene, boxes) = box_row_scene(1, 2.0, 4);
    let subset = |material_id| VertexMaterialInfo {
      vertex_start: 0,
      vertex_end: 7,
      index_start: 0,
      index_end: 17,
      material_id,
    };
    scene.set_subset_materials(boxes[0].node, boxes[0].mesh, vec![subset(8), subset(9)]);

    let catalog = MeshCatalog::collect(&scene).unwrap();
    assert_eq!(
      catalog.candidate(boxes[0].mesh).unwrap().material_key,
      MaterialKey::from_ids([8, 9])
    );
  }

  #[test]
  fn test_shared_mesh_is_not_a_candidate() {
    let (mut scene, boxes) = box_row_scene(1, 2.0, 4);
    // Second node drawing the same model.
    let node = scene.allocate_id();
    scene
      .add_child(1, ModelTreeNode::new(node, "copy").with_model(boxes[0].model))
      .unwrap();

    let catalog = MeshCatalog::collect(&scene).unwrap();
    assert!(catalog.is_empty());
    assert_eq!(catalog.vertex_count(boxes[0].mesh), Some(8));
  }

  #[test]
  fn test_shared_vertex_buffer_is_not_a_candidate() {
    let (mut scene, boxes) = box_row_scene(1, 2.0, 4);
    let geometry = scene.allocate_id();
    scene
      .insert_render_geometry(crate::scene::RenderGeometry::new(
        geometry,
        boxes[0].vertex_buffer,
        [0, 1, 2],
      ))
      .unwrap();
    let catalog = MeshCatalog::collect(&scene).unwrap();
    assert!(catalog.candidate(boxes[0].mesh).is_none());
  }

  #[test]
  fn test_non_main_mesh_skipped() {
    let mut scene = crate::scene::Scene::new();
    scene.add_root(ModelTreeNode::new(1, "root")).unwrap();
    let pmi = add_box_node(&mut scene, 1, Mat4::IDENTITY, 1, 0.0);
    scene.render_mesh_mut(pmi.mesh).unwrap().mesh_type = RenderMeshType::Pmi;

    let catalog = MeshCatalog::collect(&scene).unwrap();
    assert!(catalog.is_empty());
    assert_eq!(catalog.vertex_count(pmi.mesh), Some(8));
  }

  #[test]
  fn test_singular_transform_is_not_a_candidate() {
    let mut scene = crate::scene::Scene::new();
    scene.add_root(ModelTreeNode::new(1, "root")).unwrap();
    let flat_scale = Mat4::from_scale(glam::Vec3::new(1.0, 0.0, 1.0));
    let flat = add_box_node(&mut scene, 1, flat_scale, 1, 0.0);
    let catalog = MeshCatalog::collect(&scene).unwrap();
    assert!(catalog.candidate(flat.mesh).is_none());
  }

  #[test]
  fn test_dangling_geometry_fails_collect() {
    let (mut scene, boxes) = box_row_scene(2, 2.0, 4);
    scene.render_mesh_mut(boxes[1].mesh).unwrap().render_geometry_ids.push(9_999);

    assert_eq!(
      MeshCatalog::collect(&scene).unwrap_err(),
      TileError::missing(ObjectKind::RenderGeometry, 9_999)
    );
  }

  #[test]
  fn test_dangling_vertex_buffer_fails_collect() {
    let (mut scene, boxes) = box_row_scene(1, 2.0, 4);
    let geometry = scene.allocate_id();
    scene
      .insert_render_geometry(crate::scene::RenderGeometry::new(geometry, 9_998, [0, 1, 2]))
      .unwrap();
    scene.render_mesh_mut(boxes[0].mesh).unwrap().render_geometry_ids.push(geometry);

    assert!(matches!(
      MeshCatalog::collect(&scene),
      Err(TileError::MissingObject { id: 9_998, .. })
    ));
  }

  #[test]
  fn test_remove_drops_candidates() {
    let (scene, boxes) = box_row_scene(3, 2.0, 4);
    let mut catalog = MeshCatalog::collect(&scene).unwrap();
    catalog.remove(&BTreeSet::from([boxes[0].mesh, boxes[2].mesh]));

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.candidates_of(boxes[0].node).count(), 0);
    assert_eq!(catalog.candidates_of(boxes[1].node).count(), 1);
  }
}
