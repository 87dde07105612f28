use glam::Vec3;

use super::*;
use crate::bounds::{BoundingBox, BoundingVolume};
use crate::tile::data::TileContent;

fn leaf(node_id: u64, min: Vec3, max: Vec3) -> TileData {
  let mut tile = TileData::new(TileContent::tree_node(node_id));
  let own = BoundingVolume::build_from_bounding_box(&BoundingBox::new(min, max));
  tile.update_bounding_volume_and_geometric_error(&own, 2.0);
  tile
}

fn parent_of(children: Vec<TileData>) -> TileData {
  let mut parent = TileData::new(TileContent::tree_node(0));
  parent.children = children;
  parent.update_bounding_volume_and_geometric_error(&BoundingVolume::EMPTY, 2.0);
  parent
}

fn assert_invariants(tile: &TileData, max_children: usize) {
  assert!(tile.children.len() <= max_children, "fan-out {}", tile.children.len());
  for child in &tile.children {
    assert!(
      tile.bounding_volume.encloses(&child.bounding_volume),
      "parent volume does not enclose child"
    );
    assert!(child.geometric_error <= tile.geometric_error);
    assert_invariants(child, max_children);
  }
}

fn sorted_node_ids(tile: &TileData) -> Vec<u64> {
  let mut ids = tile.all_node_ids();
  ids.sort_unstable();
  ids
}

/// 9 boxes in a row exceed the branching threshold of 8.
#[test]
fn test_nine_siblings_split_into_two_levels() {
  let children = (0..9)
    .map(|i| {
      let x = i as f32 * 2.0;
      leaf(i + 1, Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    })
    .collect();
  let mut root = parent_of(children);
  root.merge_children_by_space(&TilingConfig::default());

  assert_eq!(root.children.len(), 2);
  assert!(root.children.iter().all(TileData::is_synthetic));
  assert_eq!(root.tree_depth(), 3);
  assert_eq!(sorted_node_ids(&root), (0..=9).collect::<Vec<_>>());
  assert_invariants(&root, 8);
}

#[test]
fn test_under_threshold_is_untouched() {
  let children: Vec<_> = (0..8)
    .map(|i| {
      let x = i as f32 * 2.0;
      leaf(i + 1, Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    })
    .collect();
  let mut root = parent_of(children.clone());
  root.merge_children_by_space(&TilingConfig::default());
  assert_eq!(root.children, children);
}

/// One child per octant stays unwrapped; the crowded octant gets a wrapper.
#[test]
fn test_single_child_buckets_are_not_wrapped() {
  let mut children: Vec<_> = (0..8u64)
    .map(|i| {
      let base = Vec3::new(
        if i & 1 == 0 { 0.5 } else { 2.5 },
        if i & 2 == 0 { 0.5 } else { 2.5 },
        if i & 4 == 0 { 0.5 } else { 2.5 },
      );
      leaf(i + 1, base, base + Vec3::ONE)
    })
    .collect();
  children.push(leaf(9, Vec3::splat(0.2), Vec3::splat(0.4)));

  let mut root = parent_of(children);
  root.merge_children_by_space(&TilingConfig::default());

  assert_eq!(root.children.len(), 8);
  let synthetic: Vec<_> = root.children.iter().filter(|c| c.is_synthetic()).collect();
  assert_eq!(synthetic.len(), 1);
  assert_eq!(sorted_node_ids(synthetic[0]), vec![1, 9]);
  assert_invariants(&root, 8);
}

#[test]
fn test_synthetic_refine_follows_config() {
  let children = (0..9)
    .map(|i| {
      let x = i as f32 * 2.0;
      leaf(i + 1, Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    })
    .collect();
  let mut root = parent_of(children);
  root.merge_children_by_space(&TilingConfig::default().with_synthetic_refine(RefineType::Replace));
  assert!(root.children.iter().all(|c| c.refine == RefineType::Replace));
}

/// Octants cannot separate identical boxes; they are grouped in order instead.
#[test]
fn test_coincident_children_are_chunked() {
  let children = (0..20)
    .map(|i| leaf(i + 1, Vec3::ZERO, Vec3::ONE))
    .collect();
  let mut root = parent_of(children);
  root.merge_children_by_space(&TilingConfig::default());

  assert_eq!(root.children.len(), 3);
  assert_eq!(root.all_node_ids(), (0..=20).collect::<Vec<_>>());
  assert_invariants(&root, 8);
}

#[test]
fn test_large_fan_out_is_bounded_everywhere() {
  let children = (0..1000u64)
    .map(|i| {
      let p = Vec3::new((i % 10) as f32, ((i / 10) % 10) as f32, (i / 100) as f32) * 3.0;
      leaf(i + 1, p, p + Vec3::ONE)
    })
    .collect();
  let mut root = parent_of(children);
  root.merge_children_by_space(&TilingConfig::default());

  assert_invariants(&root, 8);
  assert_eq!(root.all_node_ids().len(), 1001);
  assert!(root.tree_depth() <= 8, "depth {}", root.tree_depth());
}

#[test]
fn test_nested_levels_are_merged_bottom_up() {
  let grandchildren = (0..12)
    .map(|i| {
      let x = i as f32 * 2.0;
      leaf(100 + i, Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    })
    .collect();
  let middle = {
    let mut tile = TileData::new(TileContent::tree_node(50));
    tile.children = grandchildren;
    tile.update_bounding_volume_and_geometric_error(&BoundingVolume::EMPTY, 2.0);
    tile
  };
  let mut root = parent_of(vec![middle]);
  root.merge_children_by_space(&TilingConfig::default());

  assert!(root.children[0].children.len() <= 8);
  assert_invariants(&root, 8);
}
