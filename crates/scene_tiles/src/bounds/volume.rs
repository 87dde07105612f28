//! Oriented box + sphere bounding volume.
//!
//! Both shapes always describe the same region. Volumes are built from
//! axis-aligned boxes and merged through them, so the box axes stay world
//! aligned; enclosure is guaranteed, tightness is not.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::aabb::BoundingBox;

/// Box given by a center and three half-extent axis vectors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientedBoundingBox {
  pub center: Vec3,
  pub axis_x: Vec3,
  pub axis_y: Vec3,
  pub axis_z: Vec3,
}

impl OrientedBoundingBox {
  pub const ZERO: Self = Self {
    center: Vec3::ZERO,
    axis_x: Vec3::ZERO,
    axis_y: Vec3::ZERO,
    axis_z: Vec3::ZERO,
  };

  /// World-aligned box with the given half extents.
  pub fn axis_aligned(center: Vec3, half_extents: Vec3) -> Self {
    Self {
      center,
      axis_x: Vec3::new(half_extents.x, 0.0, 0.0),
      axis_y: Vec3::new(0.0, half_extents.y, 0.0),
      axis_z: Vec3::new(0.0, 0.0, half_extents.z),
    }
  }

  /// Per-axis reach of the box from its center.
  #[inline]
  pub fn reach(&self) -> Vec3 {
    self.axis_x.abs() + self.axis_y.abs() + self.axis_z.abs()
  }

  /// Axis-aligned box enclosing this box.
  #[inline]
  pub fn to_bounding_box(&self) -> BoundingBox {
    let reach = self.reach();
    BoundingBox::new(self.center - reach, self.center + reach)
  }

  pub fn is_finite(&self) -> bool {
    self.center.is_finite()
      && self.axis_x.is_finite()
      && self.axis_y.is_finite()
      && self.axis_z.is_finite()
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
  pub center: Vec3,
  /// Negative for an empty sphere.
  pub radius: f32,
}

/// Oriented box and sphere enclosing the same region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingVolume {
  pub obb: OrientedBoundingBox,
  pub sphere: BoundingSphere,
}

impl BoundingVolume {
  /// Volume enclosing nothing. Never valid.
  pub const EMPTY: Self = Self {
    obb: OrientedBoundingBox::ZERO,
    sphere: BoundingSphere {
      center: Vec3::ZERO,
      radius: -1.0,
    },
  };

  /// Build a volume that encloses `aabb`.
  ///
  /// Half extents are widened by a few ulps when rounding of `center ± half`
  /// would otherwise cut into the input box. Invalid boxes, and boxes too
  /// close to `f32::MAX` to be padded, give [`BoundingVolume::EMPTY`].
  pub fn build_from_bounding_box(aabb: &BoundingBox) -> Self {
    if !aabb.is_valid() {
      return Self::EMPTY;
    }

    let center = aabb.center();
    let mut half = aabb.half_extents();
    let magnitude = center.abs().max(half).max_element().max(f32::MIN_POSITIVE);
    let mut step = magnitude * f32::EPSILON;
    loop {
      if !half.is_finite() {
        return Self::EMPTY;
      }
      let obb = OrientedBoundingBox::axis_aligned(center, half);
      if obb.to_bounding_box().contains(aabb) {
        return Self {
          obb,
          sphere: BoundingSphere {
            center,
            radius: half.length(),
          },
        };
      }
      half += Vec3::splat(step);
      step *= 2.0;
    }
  }

  /// Finite geometry with a non-negative radius.
  pub fn is_valid(&self) -> bool {
    self.obb.is_finite()
      && self.sphere.center.is_finite()
      && self.sphere.radius.is_finite()
      && self.sphere.radius >= 0.0
  }

  /// Axis-aligned box enclosing the oriented box. Empty when invalid.
  pub fn to_bounding_box(&self) -> BoundingBox {
    if !self.is_valid() {
      return BoundingBox::EMPTY;
    }
    self.obb.to_bounding_box()
  }

  #[inline]
  pub fn center(&self) -> Vec3 {
    self.obb.center
  }

  #[inline]
  pub fn radius(&self) -> f32 {
    self.sphere.radius
  }

  /// Volume enclosing both operands. An invalid operand is ignored.
  pub fn merge(&self, other: &BoundingVolume) -> BoundingVolume {
    match (self.is_valid(), other.is_valid()) {
      (true, true) => {
        let aabb = self.to_bounding_box().merge(&other.to_bounding_box());
        Self::build_from_bounding_box(&aabb)
      }
      (true, false) => *self,
      (false, true) => *other,
      (false, false) => Self::EMPTY,
    }
  }

  /// True when `other`'s box lies inside this volume's box.
  pub fn encloses(&self, other: &BoundingVolume) -> bool {
    self.to_bounding_box().contains(&other.to_bounding_box())
  }
}

impl Default for BoundingVolume {
  fn default() -> Self {
    Self::EMPTY
  }
}

/// Free-function form of [`BoundingVolume::merge`].
#[inline]
pub fn merge_bounding_volumes(a: &BoundingVolume, b: &BoundingVolume) -> BoundingVolume {
  a.merge(b)
}

#[cfg(test)]
#[path = "volume_test.rs"]
mod volume_test;
