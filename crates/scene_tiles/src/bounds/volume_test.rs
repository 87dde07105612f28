use super::*;

// =========================================================================
// build_from_bounding_box
// =========================================================================

#[test]
fn test_build_unit_box() {
  let aabb = BoundingBox::new(Vec3::ZERO, Vec3::splat(2.0));
  let volume = BoundingVolume::build_from_bounding_box(&aabb);

  assert!(volume.is_valid());
  assert_eq!(volume.center(), Vec3::ONE);
  assert!((volume.radius() - 3.0_f32.sqrt()).abs() < 1e-5);
  assert!((volume.obb.axis_x.x - 1.0).abs() < 1e-5);
  assert_eq!(volume.obb.axis_x.y, 0.0);
  assert_eq!(volume.obb.axis_y.x, 0.0);
}

/// Rounding of center ± half must never shrink the volume below its input.
#[test]
fn test_build_never_smaller_than_input() {
  let boxes = [
    BoundingBox::new(Vec3::splat(0.1), Vec3::splat(0.7)),
    BoundingBox::new(Vec3::new(1.0e6, -3.3, 7.1), Vec3::new(1.0e6 + 0.3, 9.9, 7.1)),
    BoundingBox::new(Vec3::splat(-12345.678), Vec3::splat(-12345.671)),
    BoundingBox::new(Vec3::new(0.333_333, 0.1, 0.2), Vec3::new(0.666_667, 0.3, 0.9)),
  ];
  for aabb in boxes {
    let volume = BoundingVolume::build_from_bounding_box(&aabb);
    assert!(volume.to_bounding_box().contains(&aabb), "{aabb:?} not enclosed");
    for corner in aabb.corners() {
      let distance = corner.distance(volume.sphere.center);
      assert!(distance <= volume.radius() * (1.0 + 1e-6), "sphere misses {corner:?}");
    }
  }
}

#[test]
fn test_point_box_builds_zero_radius_volume() {
  let aabb = BoundingBox::new(Vec3::splat(3.0), Vec3::splat(3.0));
  let volume = BoundingVolume::build_from_bounding_box(&aabb);
  assert!(volume.is_valid());
  assert!(volume.radius() >= 0.0);
  assert!(volume.to_bounding_box().contains(&aabb));
}

#[test]
fn test_invalid_box_builds_empty_volume() {
  let volume = BoundingVolume::build_from_bounding_box(&BoundingBox::EMPTY);
  assert_eq!(volume, BoundingVolume::EMPTY);
  assert!(!volume.is_valid());
  assert!(!BoundingVolume::default().is_valid());
}

#[test]
fn test_nan_radius_is_invalid() {
  let unit = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
  let mut volume = BoundingVolume::build_from_bounding_box(&unit);
  volume.sphere.radius = f32::NAN;
  assert!(!volume.is_valid());
}

// =========================================================================
// merge
// =========================================================================

#[test]
fn test_merge_encloses_both() {
  let a = BoundingVolume::build_from_bounding_box(&BoundingBox::new(Vec3::ZERO, Vec3::ONE));
  let b = BoundingVolume::build_from_bounding_box(&BoundingBox::new(
    Vec3::new(5.0, -2.0, 0.5),
    Vec3::new(6.0, -1.0, 3.0),
  ));

  let merged = merge_bounding_volumes(&a, &b);
  assert!(merged.encloses(&a));
  assert!(merged.encloses(&b));
  assert!(merged.radius() >= a.radius());
  assert!(merged.radius() >= b.radius());
}

#[test]
fn test_merge_ignores_invalid_operand() {
  let a = BoundingVolume::build_from_bounding_box(&BoundingBox::new(Vec3::ZERO, Vec3::ONE));
  assert_eq!(a.merge(&BoundingVolume::EMPTY), a);
  assert_eq!(BoundingVolume::EMPTY.merge(&a), a);
  assert_eq!(
    BoundingVolume::EMPTY.merge(&BoundingVolume::EMPTY),
    BoundingVolume::EMPTY
  );
}

#[test]
fn test_merge_is_symmetric() {
  let a = BoundingVolume::build_from_bounding_box(&BoundingBox::new(Vec3::ZERO, Vec3::ONE));
  let far = BoundingBox::new(Vec3::splat(4.0), Vec3::splat(9.0));
  let b = BoundingVolume::build_from_bounding_box(&far);
  assert_eq!(a.merge(&b), b.merge(&a));
}

#[test]
fn test_serialized_shape() {
  let cube = BoundingBox::new(Vec3::ZERO, Vec3::splat(2.0));
  let volume = BoundingVolume::build_from_bounding_box(&cube);
  let json = serde_json::to_value(volume).unwrap();
  assert!(json.get("obb").is_some());
  assert!(json["sphere"].get("radius").is_some());
}
