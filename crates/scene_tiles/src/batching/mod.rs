//! Draw-call reduction: instancing of congruent meshes and batching of the
//! rest, both reversible.
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌─────────┐     ┌───────┐
//! │ MeshCatalog ├────►│ Instancing ├────►│ Planner ├────►│ Apply │
//! └─────────────┘     └────────────┘     └─────────┘     └───────┘
//!   candidates        InstanceGroup       BatchGroup     scene rewrite
//! ```
//!
//! # Module Structure
//!
//! - [`config`]: `BatchingConfig`
//! - [`records`]: bookkeeping records and the batched / instanced objects
//! - [`catalog`]: `MeshCatalog` - eligible meshes and vertex counts
//! - [`instancing`]: `InstancingDetector` - congruent geometry groups
//! - [`planner`]: `calculate_render_mesh_batched_data` - cells and packing
//! - [`apply`]: `run_batched_and_instanced` / `revert_batched_and_instanced`

pub mod apply;
pub mod catalog;
pub mod config;
pub mod instancing;
pub mod planner;
pub mod records;

pub use apply::{
  revert_batched_and_instanced, run_batched_and_instanced, BatchingReport, RevertReport,
};
pub use catalog::{MeshCandidate, MeshCatalog};
pub use config::BatchingConfig;
pub use instancing::{CanonicalGeometryKey, InstanceGroup, InstancingDetector};
pub use planner::{calculate_render_mesh_batched_data, BatchGroup};
pub use records::{
  BatchedMesh, BatchedRenderMeshInfo, DetachedGeometry, InstancedMesh, InstancedRenderMeshInfo,
  MaterialKey, RenderGeometryRangeInfo,
};
