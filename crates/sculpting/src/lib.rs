//! Brush-driven mesh sculpting for Relief.
//!
//! This crate applies localized, brush-shaped edits to a surface under
//! continuous pointer input:
//! - Displacement, smoothing, plane and grab-style tools
//! - Mask, color and face-set painting
//! - Mirror and radial symmetry, tiling, axis locks and mirror clipping
//! - Dynamic topology on half-edge meshes
//! - Replayable stroke logs
//!
//! # Architecture
//!
//! Three mesh representations sit behind one closed enum, [`SculptMesh`]:
//! a static indexed mesh, a multiresolution grid hierarchy and a dynamic
//! half-edge mesh. Every accessor dispatches on the variant, so the
//! per-vertex loops never go through a vtable.
//!
//! ## Key Components
//!
//! - **Mesh**: uniform vertex/edge/face queries over the three representations
//! - **Spatial**: node-gather, bounds and raycast contract plus the default tree
//! - **Neighbors / Boundary**: one-ring iteration and cached boundary classes
//! - **Brush Test / Area**: tip shapes and the view-binned normal/center estimate
//! - **Stroke**: per-stroke cache and symmetry passes
//! - **Actions**: strength table and per-tool actions producing proxy buffers
//! - **Proxy**: merge of the buffers into the mesh
//! - **Session**: orchestrates sample → topology → passes → merge

pub mod actions;
pub mod area;
pub mod attributes;
pub mod boundary;
pub mod brush;
pub mod brush_test;
pub mod collaborators;
pub mod dyntopo;
pub mod error;
pub mod face_sets;
pub mod flood_fill;
pub mod islands;
pub mod mesh;
pub mod neighbors;
pub mod proxy;
pub mod query;
pub mod replay;
pub mod session;
pub mod spatial;
pub mod stroke;
pub mod types;
pub mod undo;

#[cfg(test)]
mod test_fixtures;

pub use attributes::{OrigData, VertexAttributes};
pub use brush::{Brush, FalloffCurve};
pub use brush_test::{BrushTest, TipFrame};
pub use collaborators::{
    AutoMasking, BrushChannels, BrushDefaults, BrushSolver, ChannelInput, DeformTarget,
    TextureSampler,
};
pub use error::{Result, SculptError};
pub use islands::{ConnectedComponents, FakeNeighbors};
pub use mesh::{
    DynamicMesh, EdgeRef, FaceRef, GridHierarchy, IndexedMesh, RepresentationKind, SculptMesh,
    VertexRef,
};
pub use proxy::{ProxyBuffer, ProxyData};
pub use replay::ReplayLog;
pub use session::{SculptSession, StrokeSummary};
pub use spatial::{Aabb, BoundsKind, NodeDirty, NodeId, NodeTree, RayHit, SpatialIndex};
pub use stroke::{StrokeCache, StrokeSample, SymmetryPass};
pub use types::{BoundaryKind, FalloffShape, SculptPlane, ToolId, UndoDataKind};
pub use undo::{MemoryUndoLog, UndoLog, UndoNode};

pub use relief_config::SculptSettings;
