//! Detection of congruent meshes drawn at different transforms.
//!
//! Meshes are compared on their node-local vertex data, rounded to a fixed
//! number of decimal places, so the same part exported twice with tiny float
//! noise still matches. Colours and indices compare exactly.

use indexmap::IndexMap;
use rayon::prelude::*;

use super::catalog::{MeshCandidate, MeshCatalog};
use super::config::BatchingConfig;
use super::records::MaterialKey;
use crate::error::TileResult;
use crate::scene::Scene;

/// Rounded vertex and index data of one geometry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalGeometryKey {
  pub positions: Vec<[i64; 3]>,
  pub normals: Vec<[i64; 3]>,
  pub uvs: Vec<[i64; 2]>,
  pub colors: Vec<[u8; 4]>,
  pub indices: Vec<u32>,
}

/// Meshes that will share the first member's geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceGroup {
  pub material_key: MaterialKey,
  /// Scene pre-order; the first member is the representative.
  pub members: Vec<MeshCandidate>,
}

impl InstanceGroup {
  #[inline]
  pub fn representative(&self) -> &MeshCandidate {
    &self.members[0]
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstancingDetector {
  pub min_vertex_count: usize,
  pub decimal_places: i32,
  pub parallel: bool,
}

impl InstancingDetector {
  pub fn new(min_vertex_count: usize, decimal_places: i32) -> Self {
    Self {
      min_vertex_count,
      decimal_places,
      parallel: true,
    }
  }

  pub fn from_config(config: &BatchingConfig) -> Self {
    Self {
      min_vertex_count: config.instanced_min_vertex_count,
      decimal_places: config.instanced_vertex_compare_decimal_places,
      parallel: config.parallel,
    }
  }

  #[inline]
  fn round(&self, value: f32, scale: f64) -> i64 {
    (value as f64 * scale).round() as i64
  }

  /// Canonical key of a candidate's geometry.
  pub fn canonical_key(
    &self,
    scene: &Scene,
    candidate: &MeshCandidate,
  ) -> TileResult<CanonicalGeometryKey> {
    let geometry = scene.render_geometry(candidate.render_geometry_id)?;
    let buffer = scene.vertex_buffer(candidate.vertex_buffer_id)?;
    let scale = 10f64.powi(self.decimal_places);

    let mut key = CanonicalGeometryKey {
      positions: Vec::with_capacity(buffer.len()),
      normals: Vec::with_capacity(buffer.len()),
      uvs: Vec::with_capacity(buffer.len()),
      colors: Vec::with_capacity(buffer.len()),
      indices: geometry.indices.clone(),
    };
    for vertex in &buffer.vertices {
      key.positions.push(vertex.position.to_array().map(|c| self.round(c, scale)));
      key.normals.push(vertex.normal.to_array().map(|c| self.round(c, scale)));
      key.uvs.push(vertex.uv.to_array().map(|c| self.round(c, scale)));
      let [r, g, b] = vertex.color;
      key.colors.push([r, g, b, vertex.opacity]);
    }
    Ok(key)
  }

  /// Groups of two or more candidates with equal material key and canonical
  /// geometry, in order of first occurrence.
  #[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, name = "batching::InstancingDetector::detect")
  )]
  pub fn detect(&self, scene: &Scene, catalog: &MeshCatalog) -> TileResult<Vec<InstanceGroup>> {
    let eligible: Vec<&MeshCandidate> = catalog
      .candidates()
      .filter(|c| c.vertex_count >= self.min_vertex_count)
      .collect();

    let keys: Vec<CanonicalGeometryKey> = if self.parallel {
      eligible
        .par_iter()
        .map(|c| self.canonical_key(scene, c))
        .collect::<TileResult<_>>()?
    } else {
      eligible
        .iter()
        .map(|c| self.canonical_key(scene, c))
        .collect::<TileResult<_>>()?
    };

    let mut grouped: IndexMap<(MaterialKey, CanonicalGeometryKey), Vec<MeshCandidate>> =
      IndexMap::new();
    for (candidate, key) in eligible.into_iter().zip(keys) {
      grouped
        .entry((candidate.material_key.clone(), key))
        .or_default()
        .push(candidate.clone());
    }

    let groups: Vec<InstanceGroup> = grouped
      .into_iter()
      .filter(|(_, members)| members.len() >= 2)
      .map(|((material_key, _), members)| InstanceGroup { material_key, members })
      .collect();

    #[cfg(feature = "tracing")]
    tracing::debug!(groups = groups.len(), "instance groups detected");

    Ok(groups)
  }
}

impl Default for InstancingDetector {
  fn default() -> Self {
    Self::from_config(&BatchingConfig::DEFAULT)
  }
}

#[cfg(test)]
#[path = "instancing_test.rs"]
mod instancing_test;
