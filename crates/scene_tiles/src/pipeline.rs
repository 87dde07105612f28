//! One-call scene processing: tile tree first, then draw-call reduction.
//!
//! ```text
//! ┌───────┐     ┌─────────────┐     ┌─────────────────────────┐
//! │ Scene ├────►│ TileSet     ├────►│ run_batched_and_        │
//! └───────┘     │   ::build   │     │   instanced             │
//!               └─────────────┘     └─────────────────────────┘
//!                 tile tree           scene rewritten in place
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let tiling = TilingConfig::default();
//! let (tiles, report) = process_scene(&mut scene, &tiling, &BatchingConfig::default())?;
//! // Persist `tiles`; `scene` now draws with `report.draw_calls_after` calls.
//! ```

use web_time::Instant;

use crate::batching::{run_batched_and_instanced, BatchingConfig, BatchingReport};
use crate::error::TileResult;
use crate::scene::Scene;
use crate::tile::{TileSet, TilingConfig};

/// Build the tile set of `scene`, then batch and instance its meshes over
/// that tree.
///
/// Both configurations are validated before any work starts. On error the
/// scene is left as it was.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "pipeline::process_scene"))]
pub fn process_scene(
  scene: &mut Scene,
  tiling: &TilingConfig,
  batching: &BatchingConfig,
) -> TileResult<(TileSet, BatchingReport)> {
  tiling.validate()?;
  batching.validate()?;

  let tile_set = TileSet::build(scene, tiling)?;
  let report = run_batched_and_instanced(scene, tile_set.tile_data(), batching)?;
  Ok((tile_set, report))
}

/// Process a scene and return timing statistics.
pub fn process_scene_timed(
  scene: &mut Scene,
  tiling: &TilingConfig,
  batching: &BatchingConfig,
) -> TileResult<(TileSet, BatchingReport, ProcessingStats)> {
  let start = Instant::now();
  tiling.validate()?;
  batching.validate()?;

  let tile_set = TileSet::build(scene, tiling)?;
  let tiling_us = start.elapsed().as_micros() as u64;

  let report = run_batched_and_instanced(scene, tile_set.tile_data(), batching)?;
  let total_us = start.elapsed().as_micros() as u64;

  let stats = ProcessingStats {
    tile_count: tile_set.stats().tile_count,
    draw_calls_saved: report.draw_calls_before.saturating_sub(report.draw_calls_after),
    tiling_us,
    batching_us: report.total_us,
    total_us,
  };

  Ok((tile_set, report, stats))
}

/// Statistics from scene processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
  /// Tiles in the built tree, synthetic ones included.
  pub tile_count: usize,
  pub draw_calls_saved: usize,
  /// Time spent building the tile set, in microseconds.
  pub tiling_us: u64,
  /// Time spent batching and instancing, in microseconds.
  pub batching_us: u64,
  /// Total processing time in microseconds.
  pub total_us: u64,
}
