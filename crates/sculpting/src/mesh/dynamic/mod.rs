//! Dynamic half-edge triangle mesh.
//!
//! The representation dynamic topology rewrites during a stroke. Vertex ids
//! are arena indices and stay stable across edge splits; every split
//! invalidates outstanding edge and face references.

mod construction;
mod subdivide;
mod topology;
mod types;

use std::collections::HashMap;

pub use subdivide::SubdivideResult;
pub use types::{Face, FaceId, HalfEdge, HalfEdgeId, Vertex, VertexId};

/// Half-edge mesh with per-vertex sculpt attributes
#[derive(Debug, Clone)]
pub struct DynamicMesh {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) half_edges: Vec<HalfEdge>,
    pub(crate) faces: Vec<Face>,
    /// Map from (origin, destination) vertex pair to half-edge
    pub(crate) edge_map: HashMap<(VertexId, VertexId), HalfEdgeId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;
    use glam::Vec3;

    #[test]
    fn test_single_triangle() {
        let mesh = DynamicMesh::from_triangles(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(0.5, 1.0, 0.0)],
            &[0, 1, 2],
        )
        .unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.face_vertices(0).len(), 3);
        assert_eq!(mesh.vertex_faces(0).as_slice(), &[0]);
    }

    #[test]
    fn test_plane_is_valid() {
        let mesh = test_fixtures::dynamic_plane(4);
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.face_count(), 18);
    }
}
