//! Spatial merge of over-full tiles into octant buckets.

use smallvec::SmallVec;

use super::config::TilingConfig;
use super::data::{RefineType, TileData};
use crate::bounds::{break_bounding_volume_to_8_pieces, find_match_piece_index};

type Bucket = SmallVec<[TileData; 4]>;

impl TileData {
  /// Bound the fan-out of every tile in this subtree to
  /// `config.max_children`.
  ///
  /// Works bottom-up. An over-full tile's children are bucketed by best
  /// matching octant of the tile's own volume; buckets with two or more
  /// children become synthetic tiles, single children are kept as they are.
  /// Synthetic tiles are merged again, so depth grows with the log of the
  /// child count.
  pub fn merge_children_by_space(&mut self, config: &TilingConfig) {
    for child in &mut self.children {
      child.merge_children_by_space(config);
    }
    let max_children = config.max_children.max(TilingConfig::MIN_CHILDREN);
    self.split_over_full(max_children, config.synthetic_refine);
    self.enclose_children();
  }

  fn split_over_full(&mut self, max_children: usize, refine: RefineType) {
    if self.children.len() <= max_children {
      return;
    }

    let pieces = break_bounding_volume_to_8_pieces(&self.bounding_volume);
    let mut buckets: [Bucket; 8] = Default::default();
    for child in self.children.drain(..) {
      let index = find_match_piece_index(&child.bounding_volume, &pieces);
      buckets[index].push(child);
    }

    let occupied = buckets.iter().filter(|b| !b.is_empty()).count();
    if occupied <= 1 {
      // Coincident children: octants cannot separate them, group in order.
      let children: Vec<TileData> = buckets.into_iter().flatten().collect();
      self.children = chunk_in_order(children, max_children, refine);
      self.split_over_full(max_children, refine);
      return;
    }

    for bucket in buckets {
      match bucket.len() {
        0 => {}
        1 => self.children.extend(bucket),
        _ => {
          let mut synthetic = TileData::synthetic(refine, bucket.into_vec());
          synthetic.split_over_full(max_children, refine);
          synthetic.enclose_children();
          self.children.push(synthetic);
        }
      }
    }
  }

  /// Grow the volume, if needed, so it still encloses every child after
  /// children were rebuilt.
  fn enclose_children(&mut self) {
    for child in &self.children {
      if !self.bounding_volume.encloses(&child.bounding_volume) {
        self.bounding_volume = self.bounding_volume.merge(&child.bounding_volume);
      }
    }
  }
}

fn chunk_in_order(
  children: Vec<TileData>,
  max_children: usize,
  refine: RefineType,
) -> Vec<TileData> {
  let mut grouped = Vec::with_capacity(children.len().div_ceil(max_children));
  let mut iter = children.into_iter().peekable();
  while iter.peek().is_some() {
    let mut chunk: Vec<TileData> = iter.by_ref().take(max_children).collect();
    if chunk.len() == 1 {
      grouped.append(&mut chunk);
    } else {
      grouped.push(TileData::synthetic(refine, chunk));
    }
  }
  grouped
}

#[cfg(test)]
#[path = "merge_test.rs"]
mod merge_test;
