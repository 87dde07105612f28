//! Axis-aligned bounding box in scene units.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Single-precision axis-aligned bounding box.
///
/// An inverted box ([`BoundingBox::EMPTY`]) is the identity for
/// [`BoundingBox::merge`] and [`BoundingBox::encapsulate`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  /// Minimum corner (inclusive).
  pub min: Vec3,
  /// Maximum corner (inclusive).
  pub max: Vec3,
}

impl BoundingBox {
  /// Inverted box, ready for encapsulation.
  pub const EMPTY: Self = Self {
    min: Vec3::INFINITY,
    max: Vec3::NEG_INFINITY,
  };

  /// Create a new AABB from min and max corners.
  pub fn new(min: Vec3, max: Vec3) -> Self {
    Self { min, max }
  }

  /// Create a new AABB from center and half-extents.
  pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
    Self {
      min: center - half_extents,
      max: center + half_extents,
    }
  }

  /// Smallest box containing every point. Empty input gives [`BoundingBox::EMPTY`].
  pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
    let mut aabb = Self::EMPTY;
    for point in points {
      aabb.encapsulate(point);
    }
    aabb
  }

  /// Expand to include a point.
  #[inline]
  pub fn encapsulate(&mut self, point: Vec3) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }

  /// Smallest box containing both boxes. Invalid operands are ignored.
  pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
    match (self.is_valid(), other.is_valid()) {
      (true, true) => BoundingBox {
        min: self.min.min(other.min),
        max: self.max.max(other.max),
      },
      (true, false) => *self,
      (false, true) => *other,
      (false, false) => Self::EMPTY,
    }
  }

  /// Finite and `min <= max` on all axes. A single point is valid.
  #[inline]
  pub fn is_valid(&self) -> bool {
    self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
  }

  /// Get the size of the AABB (max - min).
  #[inline]
  pub fn size(&self) -> Vec3 {
    self.max - self.min
  }

  /// Half of [`BoundingBox::size`].
  #[inline]
  pub fn half_extents(&self) -> Vec3 {
    (self.max - self.min) * 0.5
  }

  /// Get the center of the AABB.
  #[inline]
  pub fn center(&self) -> Vec3 {
    (self.min + self.max) * 0.5
  }

  /// Enclosed volume; zero for flat or invalid boxes.
  pub fn volume(&self) -> f32 {
    if !self.is_valid() {
      return 0.0;
    }
    let size = self.size();
    size.x * size.y * size.z
  }

  /// The 8 corners, indexed with the octant bit convention
  /// (bit 0 = max X, bit 1 = max Y, bit 2 = max Z).
  pub fn corners(&self) -> [Vec3; 8] {
    std::array::from_fn(|i| {
      Vec3::new(
        if i & 1 == 0 { self.min.x } else { self.max.x },
        if i & 2 == 0 { self.min.y } else { self.max.y },
        if i & 4 == 0 { self.min.z } else { self.max.z },
      )
    })
  }

  /// Axis-aligned box around this box after an affine transform.
  pub fn transformed(&self, transform: &Mat4) -> BoundingBox {
    if !self.is_valid() {
      return Self::EMPTY;
    }
    Self::from_points(self.corners().iter().map(|c| transform.transform_point3(*c)))
  }

  /// True when `other` lies entirely inside this box (boundaries included).
  pub fn contains(&self, other: &BoundingBox) -> bool {
    self.is_valid()
      && other.is_valid()
      && self.min.cmple(other.min).all()
      && self.max.cmpge(other.max).all()
  }

  /// Check if this AABB contains a point.
  #[inline]
  pub fn contains_point(&self, point: Vec3) -> bool {
    self.min.cmple(point).all() && self.max.cmpge(point).all()
  }
}

impl Default for BoundingBox {
  fn default() -> Self {
    Self::EMPTY
  }
}
