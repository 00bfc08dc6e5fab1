//! Element types of the dynamic half-edge mesh.

use glam::{Vec3, Vec4};

use crate::mesh::indexed::EdgeFlags;

/// Type-safe vertex identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u32);

/// Type-safe half-edge identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalfEdgeId(pub u32);

/// Type-safe face identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub u32);

/// A vertex with its sculpt attributes
#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: VertexId,
    pub position: Vec3,
    pub normal: Vec3,
    pub mask: f32,
    pub color: Vec4,
    /// Hidden directly or because every surrounding face set is hidden
    pub hidden: bool,
    /// One outgoing half-edge (None for isolated or welded-away vertices)
    pub outgoing_half_edge: Option<HalfEdgeId>,
}

/// A directed half of an edge, always owned by a face
#[derive(Debug, Clone)]
pub struct HalfEdge {
    pub id: HalfEdgeId,
    /// The vertex this half-edge leaves from
    pub origin: VertexId,
    /// The opposite half-edge (None on the mesh boundary)
    pub twin: Option<HalfEdgeId>,
    /// Next half-edge around the face (counter-clockwise)
    pub next: HalfEdgeId,
    /// Previous half-edge around the face
    pub prev: HalfEdgeId,
    pub face: FaceId,
    /// Seam/sharp marks, mirrored on the twin
    pub flags: EdgeFlags,
}

/// A triangle
#[derive(Debug, Clone)]
pub struct Face {
    pub id: FaceId,
    /// One half-edge on the border of this face
    pub half_edge: HalfEdgeId,
    pub normal: Vec3,
    /// Signed face-set id, negative when hidden
    pub face_set: i32,
}
