//! Tile tree: per-node tiles with bounds and geometric error, spatially
//! merged so no tile has more than [`TilingConfig::max_children`] children.
//!
//! # Module Structure
//!
//! - [`data`]: `TileData`, `TileContent`, `RefineType`
//! - [`config`]: `TilingConfig`
//! - [`builder`]: `TileBuilder` - model tree to tile tree
//! - [`merge`]: `TileData::merge_children_by_space`
//! - [`tileset`]: `TileSet` container

pub mod builder;
pub mod config;
pub mod data;
pub mod merge;
pub mod tileset;

pub use builder::{NodeInfo, TileBuilder};
pub use config::TilingConfig;
pub use data::{
  RawTileContent, RefineType, RenderBodyContent, TileContent, TileData, TileEnvelope,
  RENDER_BODY_FLAG, TREE_NODE_FLAG,
};
pub use tileset::{TileSet, TilingStats};
