//! Rewriting a scene with batched and instanced meshes, and undoing it.
//!
//! Both directions work on a copy of the scene and swap it in only when the
//! whole pass succeeded, so a failure never leaves a half-rewritten scene.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Mat3, Mat4};
use web_time::Instant;

use super::catalog::MeshCatalog;
use super::config::BatchingConfig;
use super::instancing::{InstanceGroup, InstancingDetector};
use super::planner::{calculate_render_mesh_batched_data, BatchGroup};
use super::records::{
  BatchedMesh, DetachedGeometry, InstancedMesh, InstancedRenderMeshInfo, RenderGeometryRangeInfo,
};
use crate::error::{TileError, TileResult};
use crate::scene::{
  RenderGeometry, RenderMethod, Scene, VertexBuffer, VertexData, VertexMaterialInfo,
};
use crate::tile::TileData;

/// Outcome of [`run_batched_and_instanced`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchingReport {
  pub instanced_groups: usize,
  pub instanced_render_meshes: usize,
  pub batched_groups: usize,
  pub batched_render_meshes: usize,
  /// Planned groups of one mesh, left untouched.
  pub singleton_groups: usize,
  pub draw_calls_before: usize,
  pub draw_calls_after: usize,
  pub total_us: u64,
}

/// Outcome of [`revert_batched_and_instanced`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RevertReport {
  pub batched_meshes: usize,
  pub instanced_meshes: usize,
  pub restored_render_meshes: usize,
  pub draw_calls_after: usize,
  pub total_us: u64,
}

/// Inverse-transpose of the upper 3x3, used to carry normals.
#[inline]
fn normal_matrix(transform: &Mat4) -> Mat3 {
  Mat3::from_mat4(*transform).inverse().transpose()
}

fn check_transform(render_mesh_id: u64, transform: &Mat4) -> TileResult<()> {
  if transform.is_finite() && transform.determinant() != 0.0 {
    Ok(())
  } else {
    Err(TileError::InvalidTransform { render_mesh_id })
  }
}

/// Replace congruent meshes by instanced meshes, then merge what remains
/// into batched meshes planned over `tile_root`.
///
/// Instancing runs first; a mesh it takes is never batched. Batched vertices
/// are baked into world space, and every geometry taken out of the scene is
/// kept on the batched or instanced mesh that replaced it. Fails with
/// [`TileError::AlreadyOptimized`] on a scene that still carries batched or
/// instanced meshes.
#[cfg_attr(
  feature = "tracing",
  tracing::instrument(skip_all, name = "batching::run_batched_and_instanced")
)]
pub fn run_batched_and_instanced(
  scene: &mut Scene,
  tile_root: &TileData,
  config: &BatchingConfig,
) -> TileResult<BatchingReport> {
  let start = Instant::now();
  config.validate()?;
  if scene.is_optimized() {
    return Err(TileError::AlreadyOptimized);
  }

  let mut work = scene.clone();
  let mut report = BatchingReport {
    draw_calls_before: work.draw_call_count(),
    ..Default::default()
  };
  let mut catalog = MeshCatalog::collect(&work)?;

  let instance_groups = InstancingDetector::from_config(config).detect(&work, &catalog)?;
  let mut instanced = BTreeSet::new();
  for group in &instance_groups {
    apply_instance_group(&mut work, group)?;
    instanced.extend(group.members.iter().map(|m| m.render_mesh_id));
    report.instanced_groups += 1;
    report.instanced_render_meshes += group.members.len();
  }
  catalog.remove(&instanced);

  let batch_groups = calculate_render_mesh_batched_data(
    tile_root,
    &catalog,
    config.batched_tile_node_depth,
    config.batched_max_vertex_count,
    config.batched_octree_node_reserve_depth,
    config.merge_node_bodies,
    config.parallel,
  )?;
  for group in &batch_groups {
    if group.is_singleton() {
      report.singleton_groups += 1;
      continue;
    }
    apply_batch_group(&mut work, group)?;
    report.batched_groups += 1;
    report.batched_render_meshes += group.infos.len();
  }

  report.draw_calls_after = work.draw_call_count();
  *scene = work;
  report.total_us = start.elapsed().as_micros() as u64;

  #[cfg(feature = "tracing")]
  tracing::info!(
    instanced_groups = report.instanced_groups,
    batched_groups = report.batched_groups,
    draw_calls_before = report.draw_calls_before,
    draw_calls_after = report.draw_calls_after,
    total_us = report.total_us,
    "scene batched"
  );

  Ok(report)
}

fn apply_instance_group(scene: &mut Scene, group: &InstanceGroup) -> TileResult<()> {
  let representative = group.representative();
  let id = scene.allocate_id();

  let infos: Vec<InstancedRenderMeshInfo> = group
    .members
    .iter()
    .map(|member| InstancedRenderMeshInfo {
      tree_node_id: member.tree_node_id,
      render_body_id: member.render_body_id,
      render_mesh_id: member.render_mesh_id,
      render_geometry_id: member.render_geometry_id,
      vertex_buffer_id: member.vertex_buffer_id,
      instanced_matrix: member.world_transform,
    })
    .collect();

  let mut detached = Vec::with_capacity(group.members.len() - 1);
  for member in &group.members[1..] {
    detached.push(DetachedGeometry {
      geometry: scene.remove_render_geometry(member.render_geometry_id)?,
      vertex_buffer: scene.remove_vertex_buffer(member.vertex_buffer_id)?,
    });
  }
  for member in &group.members {
    let mesh = scene.render_mesh_mut(member.render_mesh_id)?;
    mesh.render_method = RenderMethod::Instanced;
    mesh.instanced_mesh_id = Some(id);
    mesh.render_geometry_ids = vec![representative.render_geometry_id];
  }

  scene.insert_instanced_mesh(InstancedMesh {
    id,
    render_geometry_id: representative.render_geometry_id,
    vertex_buffer_id: representative.vertex_buffer_id,
    infos,
    detached,
  })
}

/// Shift a member's material subsets to its place in the merged buffer. A
/// member without subsets gets one covering its whole range.
fn merged_subsets(
  render_mesh_id: u64,
  range: &RenderGeometryRangeInfo,
  own: &[VertexMaterialInfo],
  material_id: u64,
) -> TileResult<Vec<VertexMaterialInfo>> {
  if own.is_empty() {
    return Ok(vec![VertexMaterialInfo {
      vertex_start: range.vertex_index_min,
      vertex_end: range.vertex_index_max,
      index_start: range.index_min,
      index_end: range.index_max,
      material_id,
    }]);
  }

  own
    .iter()
    .map(|subset| {
      let inside = subset.vertex_start <= subset.vertex_end
        && subset.index_start <= subset.index_end
        && (subset.vertex_end as usize) < range.vertex_count()
        && (subset.index_end as usize) < range.index_count();
      if !inside {
        return Err(TileError::InvalidRange {
          render_mesh_id,
          reason: format!(
            "subset {}..={} / {}..={} of material {} exceeds its geometry",
            subset.vertex_start,
            subset.vertex_end,
            subset.index_start,
            subset.index_end,
            subset.material_id
          ),
        });
      }
      Ok(VertexMaterialInfo {
        vertex_start: subset.vertex_start + range.vertex_index_min,
        vertex_end: subset.vertex_end + range.vertex_index_min,
        index_start: subset.index_start + range.index_min,
        index_end: subset.index_end + range.index_min,
        material_id: subset.material_id,
      })
    })
    .collect()
}

fn apply_batch_group(scene: &mut Scene, group: &BatchGroup) -> TileResult<()> {
  let id = scene.allocate_id();
  let geometry_id = scene.allocate_id();
  let vertex_buffer_id = scene.allocate_id();

  let mut vertices: Vec<VertexData> = Vec::with_capacity(group.vertex_count);
  let mut indices: Vec<u32> = Vec::with_capacity(group.index_count);
  let mut subsets = Vec::with_capacity(group.infos.len());
  let mut detached = Vec::with_capacity(group.infos.len());

  for info in &group.infos {
    let material_id = scene.render_mesh(info.render_mesh_id)?.material_id;
    let own_subsets = scene
      .subset_materials(info.tree_node_id, info.render_mesh_id)
      .map(<[VertexMaterialInfo]>::to_vec)
      .unwrap_or_default();

    for range in &info.ranges {
      subsets.extend(merged_subsets(info.render_mesh_id, range, &own_subsets, material_id)?);
      let geometry = scene.remove_render_geometry(range.render_geometry_id)?;
      let buffer = scene.remove_vertex_buffer(range.vertex_buffer_id)?;
      if vertices.len() != range.vertex_index_min as usize || buffer.len() != range.vertex_count() {
        return Err(TileError::InvalidRange {
          render_mesh_id: info.render_mesh_id,
          reason: format!(
            "planned vertices {}..={} do not match buffer {} of {} vertices",
            range.vertex_index_min,
            range.vertex_index_max,
            buffer.id,
            buffer.len()
          ),
        });
      }

      let normals = normal_matrix(&info.baked_transform);
      vertices.extend(
        buffer
          .vertices
          .iter()
          .map(|vertex| vertex.transformed(&info.baked_transform, &normals)),
      );
      indices.extend(geometry.indices.iter().map(|&i| i + range.vertex_index_min));
      detached.push(DetachedGeometry {
        geometry,
        vertex_buffer: buffer,
      });
    }

    let mesh = scene.render_mesh_mut(info.render_mesh_id)?;
    mesh.render_method = RenderMethod::Batched;
    mesh.batched_mesh_id = Some(id);
    mesh.render_geometry_ids = vec![geometry_id];
  }

  scene.insert_vertex_buffer(VertexBuffer::new(vertex_buffer_id, vertices))?;
  scene.insert_render_geometry(RenderGeometry::new(geometry_id, vertex_buffer_id, indices))?;
  scene.insert_batched_mesh(BatchedMesh {
    id,
    render_geometry_id: geometry_id,
    vertex_buffer_id,
    material_key: group.material_key.clone(),
    infos: group.infos.clone(),
    subsets,
    detached,
  })
}

/// Restore every batched and instanced render mesh to its own geometry and
/// vertex buffer under the original ids.
///
/// Kept originals are put back unchanged. A record without them is rebuilt
/// from the merged buffer through the inverse of its transform. Any record
/// without a usable range or transform fails the whole call and leaves the
/// scene untouched. A scene with nothing to revert is a no-op.
#[cfg_attr(
  feature = "tracing",
  tracing::instrument(skip_all, name = "batching::revert_batched_and_instanced")
)]
pub fn revert_batched_and_instanced(scene: &mut Scene) -> TileResult<RevertReport> {
  let start = Instant::now();
  let mut work = scene.clone();
  let (batched, instanced) = work.take_optimized();
  let mut report = RevertReport {
    batched_meshes: batched.len(),
    instanced_meshes: instanced.len(),
    ..Default::default()
  };

  for mesh in &batched {
    report.restored_render_meshes += revert_batched_mesh(&mut work, mesh)?;
  }
  for mesh in &instanced {
    report.restored_render_meshes += revert_instanced_mesh(&mut work, mesh)?;
  }

  report.draw_calls_after = work.draw_call_count();
  *scene = work;
  report.total_us = start.elapsed().as_micros() as u64;

  #[cfg(feature = "tracing")]
  tracing::info!(
    restored = report.restored_render_meshes,
    total_us = report.total_us,
    "scene batching reverted"
  );

  Ok(report)
}

fn revert_batched_mesh(scene: &mut Scene, batched: &BatchedMesh) -> TileResult<usize> {
  if batched.infos.is_empty() {
    return Err(TileError::Inconsistent(format!(
      "batched mesh {} has no records",
      batched.id
    )));
  }
  let merged_geometry = scene.remove_render_geometry(batched.render_geometry_id)?;
  let merged_buffer = scene.remove_vertex_buffer(batched.vertex_buffer_id)?;
  let kept: BTreeMap<u64, &DetachedGeometry> =
    batched.detached.iter().map(|d| (d.id(), d)).collect();

  for info in &batched.infos {
    let render_mesh_id = info.render_mesh_id;
    check_transform(render_mesh_id, &info.baked_transform)?;
    let mesh = scene.render_mesh(render_mesh_id)?;
    if mesh.render_method != RenderMethod::Batched || mesh.batched_mesh_id != Some(batched.id) {
      return Err(TileError::Inconsistent(format!(
        "render mesh {render_mesh_id} does not point back to batched mesh {}",
        batched.id
      )));
    }
    if info.ranges.is_empty() {
      return Err(TileError::InvalidRange {
        render_mesh_id,
        reason: "no ranges recorded".to_string(),
      });
    }

    let inverse = info.baked_transform.inverse();
    // Normals were baked with the inverse-transpose; its inverse-transpose is
    // the plain upper 3x3.
    let normals_back = Mat3::from_mat4(info.baked_transform).transpose();
    let invalid = |reason: String| TileError::InvalidRange { render_mesh_id, reason };

    let mut restored_geometry_ids = Vec::with_capacity(info.ranges.len());
    for range in &info.ranges {
      let (vmin, vmax) = (range.vertex_index_min, range.vertex_index_max);
      let (imin, imax) = (range.index_min as usize, range.index_max as usize);
      if vmin > vmax || imin > imax {
        return Err(invalid(format!("inverted range {vmin}..={vmax}, {imin}..={imax}")));
      }
      let merged_vertices = merged_buffer
        .vertices
        .get(vmin as usize..=vmax as usize)
        .ok_or_else(|| invalid(format!("vertices {vmin}..={vmax} exceed merged buffer")))?;
      let merged_indices = merged_geometry
        .indices
        .get(imin..=imax)
        .ok_or_else(|| invalid(format!("indices {imin}..={imax} exceed merged geometry")))?;
      if merged_indices.len() % 3 != 0 {
        return Err(invalid(format!("{} indices do not form triangles", merged_indices.len())));
      }

      let indices = merged_indices
        .iter()
        .map(|&i| {
          if (vmin..=vmax).contains(&i) {
            Ok(i - vmin)
          } else {
            Err(invalid(format!("index {i} outside vertices {vmin}..={vmax}")))
          }
        })
        .collect::<TileResult<Vec<u32>>>()?;

      let (geometry, buffer) = match kept.get(&range.render_geometry_id) {
        Some(original) => {
          let matches = original.vertex_buffer.id == range.vertex_buffer_id
            && original.geometry.vertex_buffer_id == range.vertex_buffer_id
            && original.vertex_buffer.len() == range.vertex_count()
            && original.geometry.indices == indices;
          if !matches {
            return Err(invalid(format!(
              "kept geometry {} does not match its range",
              range.render_geometry_id
            )));
          }
          (original.geometry.clone(), original.vertex_buffer.clone())
        }
        None => {
          let vertices: Vec<VertexData> = merged_vertices
            .iter()
            .map(|vertex| vertex.transformed(&inverse, &normals_back))
            .collect();
          (
            RenderGeometry::new(range.render_geometry_id, range.vertex_buffer_id, indices),
            VertexBuffer::new(range.vertex_buffer_id, vertices),
          )
        }
      };

      scene.insert_vertex_buffer(buffer)?;
      scene.insert_render_geometry(geometry)?;
      restored_geometry_ids.push(range.render_geometry_id);
    }

    let mesh = scene.render_mesh_mut(render_mesh_id)?;
    mesh.render_method = RenderMethod::Common;
    mesh.batched_mesh_id = None;
    mesh.render_geometry_ids = restored_geometry_ids;
  }
  Ok(batched.infos.len())
}

fn revert_instanced_mesh(scene: &mut Scene, instanced: &InstancedMesh) -> TileResult<usize> {
  let shared_geometry = scene.render_geometry(instanced.render_geometry_id)?.clone();
  let shared_buffer = scene.vertex_buffer(instanced.vertex_buffer_id)?.clone();
  if shared_geometry.vertex_buffer_id != shared_buffer.id {
    return Err(TileError::Inconsistent(format!(
      "instanced mesh {} geometry does not use its vertex buffer",
      instanced.id
    )));
  }
  if !instanced
    .infos
    .iter()
    .any(|info| info.render_geometry_id == instanced.render_geometry_id)
  {
    return Err(TileError::Inconsistent(format!(
      "instanced mesh {} has no record owning its shared geometry",
      instanced.id
    )));
  }
  let kept: BTreeMap<u64, &DetachedGeometry> =
    instanced.detached.iter().map(|d| (d.id(), d)).collect();

  for info in &instanced.infos {
    let render_mesh_id = info.render_mesh_id;
    check_transform(render_mesh_id, &info.instanced_matrix)?;
    let mesh = scene.render_mesh(render_mesh_id)?;
    if mesh.render_method != RenderMethod::Instanced
      || mesh.instanced_mesh_id != Some(instanced.id)
    {
      return Err(TileError::Inconsistent(format!(
        "render mesh {render_mesh_id} does not point back to instanced mesh {}",
        instanced.id
      )));
    }

    if info.render_geometry_id == instanced.render_geometry_id {
      if info.vertex_buffer_id != instanced.vertex_buffer_id {
        return Err(TileError::Inconsistent(format!(
          "render mesh {render_mesh_id} owns the shared geometry but not its vertex buffer"
        )));
      }
    } else if let Some(original) = kept.get(&info.render_geometry_id) {
      if original.vertex_buffer.id != info.vertex_buffer_id
        || original.geometry.vertex_buffer_id != info.vertex_buffer_id
      {
        return Err(TileError::Inconsistent(format!(
          "kept geometry {} of render mesh {render_mesh_id} does not use vertex buffer {}",
          info.render_geometry_id, info.vertex_buffer_id
        )));
      }
      scene.insert_vertex_buffer(original.vertex_buffer.clone())?;
      scene.insert_render_geometry(original.geometry.clone())?;
    } else {
      scene.insert_vertex_buffer(VertexBuffer::new(
        info.vertex_buffer_id,
        shared_buffer.vertices.clone(),
      ))?;
      scene.insert_render_geometry(RenderGeometry::new(
        info.render_geometry_id,
        info.vertex_buffer_id,
        shared_geometry.indices.clone(),
      ))?;
    }

    let mesh = scene.render_mesh_mut(render_mesh_id)?;
    mesh.render_method = RenderMethod::Common;
    mesh.instanced_mesh_id = None;
    mesh.render_geometry_ids = vec![info.render_geometry_id];
  }
  Ok(instanced.infos.len())
}

#[cfg(test)]
#[path = "apply_test.rs"]
mod apply_test;
