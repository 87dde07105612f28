//! scene_tiles - LOD tile trees and draw-call reduction for CAD scenes
//!
//! This crate turns an in-memory model tree into a hierarchical tile set
//! suitable for streaming, then rewrites the scene's render meshes so it can
//! be drawn with fewer calls.
//!
//! # Features
//!
//! - **Tile trees**: one tile per model tree node with an oriented box and
//!   sphere, geometric error growing toward the root
//! - **Spatial merging**: over-full tiles are split by octant into synthetic
//!   tiles so no tile has more than `max_children` children
//! - **Batching**: meshes sharing a material inside a bounded region are
//!   merged into one world-space buffer under a vertex budget
//! - **Instancing**: congruent geometry drawn at different transforms shares
//!   one buffer
//! - **Reversal**: both rewrites keep every original id, range, transform
//!   and buffer, so undoing them restores the scene exactly
//!
//! # Example
//!
//! ```ignore
//! use scene_tiles::{process_scene, BatchingConfig, Scene, TilingConfig};
//!
//! let mut scene: Scene = load_scene();
//! let tiling = TilingConfig::default();
//! let (tiles, report) = process_scene(&mut scene, &tiling, &BatchingConfig::default())?;
//!
//! println!("{} tiles, {} -> {} draw calls",
//!     tiles.stats().tile_count, report.draw_calls_before, report.draw_calls_after);
//! ```

pub mod error;
pub mod ids;

pub use error::{ObjectKind, ResultCode, TileError, TileResult};
pub use ids::TileId;

// Bounding-volume math
pub mod bounds;
pub use bounds::{BoundingBox, BoundingVolume};

// Scene objects consumed and rewritten
pub mod scene;
pub use scene::Scene;

// Tile tree construction and spatial merging
pub mod tile;
pub use tile::{NodeInfo, RefineType, TileBuilder, TileContent, TileData, TileSet, TilingConfig};

// Batching and instancing of render meshes
pub mod batching;
pub use batching::{
  revert_batched_and_instanced, run_batched_and_instanced, BatchingConfig, BatchingReport,
  RevertReport,
};

// One-call entry point
pub mod pipeline;
pub use pipeline::{process_scene, process_scene_timed, ProcessingStats};

// Test fixtures
#[cfg(test)]
pub(crate) mod test_utils;
