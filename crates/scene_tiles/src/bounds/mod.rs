//! Bounding-volume math used by tile construction.
//!
//! All operations are pure. Everything above this module depends on it.
//!
//! # Module Structure
//!
//! - [`aabb`]: `BoundingBox` - axis-aligned box
//! - [`volume`]: `BoundingVolume` - oriented box + sphere pair
//! - [`octant`]: 8-way split, overlap, best-octant matching

pub mod aabb;
pub mod octant;
pub mod volume;

pub use aabb::BoundingBox;
pub use octant::{
  break_bounding_volume_to_8_pieces, find_match_piece_index, get_intersection_of_two_region,
  overlap_volume,
};
pub use volume::{merge_bounding_volumes, BoundingSphere, BoundingVolume, OrientedBoundingBox};
