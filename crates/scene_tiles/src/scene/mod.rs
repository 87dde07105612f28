//! Scene objects consumed by the tiler and rewritten by the batcher.
//!
//! The importer that fills a [`Scene`] lives elsewhere; this module only holds
//! already-deserialized data and answers the queries the tiling and batching
//! stages need (world transforms, mesh occurrences, node triangles).

pub mod node;
pub mod render;
pub mod store;

pub use node::{Model, ModelTreeNode};
pub use render::{
  RenderBody, RenderGeometry, RenderMesh, RenderMeshType, RenderMethod, VertexBuffer, VertexData,
  VertexMaterialInfo,
};
pub use store::{MeshOccurrence, NodeTriangle, Scene};
