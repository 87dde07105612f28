//! Octant subdivision and overlap ranking.
//!
//! Octant bits: X (bit 0), Y (bit 1), Z (bit 2). A set bit selects the upper
//! half of that axis, matching the child order of an octree cell.

use glam::Vec3;

use super::aabb::BoundingBox;
use super::volume::BoundingVolume;

/// Lower and upper bound of octant `index` within `[min, max]` split at `mid`.
#[inline]
fn octant_box(min: Vec3, mid: Vec3, max: Vec3, index: usize) -> BoundingBox {
  let pick = |bit: usize, lo: f32, m: f32, hi: f32| {
    if index & bit == 0 {
      (lo, m)
    } else {
      (m, hi)
    }
  };
  let (x0, x1) = pick(1, min.x, mid.x, max.x);
  let (y0, y1) = pick(2, min.y, mid.y, max.y);
  let (z0, z1) = pick(4, min.z, mid.z, max.z);
  BoundingBox::new(Vec3::new(x0, y0, z0), Vec3::new(x1, y1, z1))
}

/// Split a volume into its 8 octants at the midpoint of each axis.
///
/// An invalid volume splits into 8 empty volumes.
pub fn break_bounding_volume_to_8_pieces(volume: &BoundingVolume) -> [BoundingVolume; 8] {
  if !volume.is_valid() {
    return [BoundingVolume::EMPTY; 8];
  }
  let aabb = volume.to_bounding_box();
  let mid = aabb.center();
  std::array::from_fn(|i| {
    BoundingVolume::build_from_bounding_box(&octant_box(aabb.min, mid, aabb.max, i))
  })
}

/// Length of the overlap between `[min1, max1]` and `[min2, max2]`; zero when disjoint.
#[inline]
pub fn get_intersection_of_two_region(min1: f32, max1: f32, min2: f32, max2: f32) -> f32 {
  (max1.min(max2) - min1.max(min2)).max(0.0)
}

/// Product of the per-axis overlaps of two boxes.
pub fn overlap_volume(a: &BoundingBox, b: &BoundingBox) -> f32 {
  if !a.is_valid() || !b.is_valid() {
    return 0.0;
  }
  (0..3)
    .map(|axis| {
      get_intersection_of_two_region(a.min[axis], a.max[axis], b.min[axis], b.max[axis])
    })
    .product()
}

/// Overlap score of a child box against one piece.
///
/// An axis on which the child is flat scores 1 when the child lies inside the
/// piece's interval and 0 otherwise, so flat geometry still finds its octant.
fn match_score(child: &BoundingBox, piece: &BoundingBox) -> f32 {
  (0..3)
    .map(|axis| {
      let (cmin, cmax) = (child.min[axis], child.max[axis]);
      let (pmin, pmax) = (piece.min[axis], piece.max[axis]);
      if cmax - cmin <= 0.0 {
        if cmin >= pmin && cmin <= pmax {
          1.0
        } else {
          0.0
        }
      } else {
        get_intersection_of_two_region(cmin, cmax, pmin, pmax)
      }
    })
    .product()
}

/// Index of the piece with the largest overlap with `volume`.
///
/// Ties, including no overlap at all, go to the lowest index.
pub fn find_match_piece_index(volume: &BoundingVolume, pieces: &[BoundingVolume; 8]) -> usize {
  let child = volume.to_bounding_box();
  if !child.is_valid() {
    return 0;
  }

  let mut best_index = 0;
  let mut best_score = f32::NEG_INFINITY;
  for (index, piece) in pieces.iter().enumerate() {
    let score = match_score(&child, &piece.to_bounding_box());
    if score > best_score {
      best_score = score;
      best_index = index;
    }
  }
  best_index
}

#[cfg(test)]
#[path = "octant_test.rs"]
mod octant_test;
