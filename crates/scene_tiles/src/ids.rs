//! Process-scoped tile identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counter for generating unique TileIds.
static TILE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque tile identifier.
///
/// Generated atomically - guaranteed unique within process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct TileId(u64);

impl TileId {
  /// Generate a new unique TileId.
  pub fn new() -> Self {
    Self(TILE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  /// Wrap a raw value (e.g. one read back from a persisted tile set).
  pub fn from_raw(raw: u64) -> Self {
    Self(raw)
  }

  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for TileId {
  fn default() -> Self {
    Self::new()
  }
}
