//! Topology queries for DynamicMesh.

use glam::Vec3;
use smallvec::SmallVec;

use super::types::{Face, FaceId, HalfEdge, HalfEdgeId, Vertex, VertexId};
use super::DynamicMesh;
use crate::error::{Result, SculptError};
use crate::mesh::FaceList;
use crate::mesh::indexed::EdgeFlags;
use crate::neighbors::NeighborIter;

/// Half-edges around a vertex in radial order.
///
/// `outgoing` lists every half-edge leaving the vertex. On the mesh boundary
/// one neighbor is only reachable through an incoming half-edge without a
/// twin; that half-edge is `trailing`.
#[derive(Debug, Clone, Default)]
pub struct VertexRing {
    pub outgoing: SmallVec<[HalfEdgeId; 8]>,
    pub trailing: Option<HalfEdgeId>,
}

impl DynamicMesh {
    pub fn vertex(&self, v: u32) -> &Vertex {
        &self.vertices[v as usize]
    }

    pub fn vertex_mut(&mut self, v: u32) -> &mut Vertex {
        &mut self.vertices[v as usize]
    }

    pub fn half_edge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.half_edges[id.0 as usize]
    }

    pub fn face(&self, f: u32) -> &Face {
        &self.faces[f as usize]
    }

    pub fn face_mut(&mut self, f: u32) -> &mut Face {
        &mut self.faces[f as usize]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn half_edge_count(&self) -> usize {
        self.half_edges.len()
    }

    /// Whether the vertex is part of any face
    pub fn is_live_vertex(&self, v: u32) -> bool {
        self.vertices[v as usize].outgoing_half_edge.is_some()
    }

    pub fn half_edge_dest(&self, id: HalfEdgeId) -> VertexId {
        self.half_edge(self.half_edge(id).next).origin
    }

    /// Both endpoints of the edge a half-edge belongs to
    pub fn edge_endpoints(&self, he: u32) -> [u32; 2] {
        let id = HalfEdgeId(he);
        [self.half_edge(id).origin.0, self.half_edge_dest(id).0]
    }

    pub fn find_half_edge(&self, from: VertexId, to: VertexId) -> Option<HalfEdgeId> {
        self.edge_map.get(&(from, to)).copied()
    }

    /// Number of faces on the edge of a half-edge (1 on the boundary)
    pub fn edge_face_count(&self, he: u32) -> u32 {
        if self.half_edges[he as usize].twin.is_some() {
            2
        } else {
            1
        }
    }

    pub fn edge_flags(&self, he: u32) -> EdgeFlags {
        self.half_edges[he as usize].flags
    }

    /// Mark the edge between two vertices on both half-edges
    pub fn set_edge_flags(&mut self, a: VertexId, b: VertexId, flags: EdgeFlags) -> bool {
        let mut found = false;
        for key in [(a, b), (b, a)] {
            if let Some(&he) = self.edge_map.get(&key) {
                self.half_edges[he.0 as usize].flags = flags;
                found = true;
            }
        }
        found
    }

    /// Walk the disk cycle of a vertex in both directions.
    ///
    /// The forward walk goes `prev → twin`; if it runs into the boundary the
    /// walk restarts backward with `twin → next` so open fans are complete.
    pub fn vertex_ring(&self, v: u32) -> VertexRing {
        let mut ring = VertexRing::default();
        let Some(start) = self.vertices[v as usize].outgoing_half_edge else {
            return ring;
        };

        let mut forward: SmallVec<[HalfEdgeId; 8]> = SmallVec::new();
        let mut current = start;
        let mut closed = false;
        loop {
            forward.push(current);
            let prev = self.half_edge(current).prev;
            match self.half_edge(prev).twin {
                Some(twin) if twin == start => {
                    closed = true;
                    break;
                }
                Some(twin) => {
                    if forward.contains(&twin) {
                        closed = true;
                        break;
                    }
                    current = twin;
                }
                None => {
                    ring.trailing = Some(prev);
                    break;
                }
            }
        }

        if !closed {
            let mut backward: SmallVec<[HalfEdgeId; 8]> = SmallVec::new();
            let mut current = start;
            while let Some(twin) = self.half_edge(current).twin {
                let next = self.half_edge(twin).next;
                if next == start || forward.contains(&next) || backward.contains(&next) {
                    break;
                }
                backward.push(next);
                current = next;
            }
            ring.outgoing.extend(backward.into_iter().rev());
        }
        ring.outgoing.extend(forward);
        ring
    }

    /// Faces around a vertex in radial order
    pub fn vertex_faces(&self, v: u32) -> FaceList {
        self.vertex_ring(v)
            .outgoing
            .iter()
            .map(|&he| self.half_edge(he).face.0)
            .collect()
    }

    /// Neighbor vertices paired with the half-edge that connects them
    pub fn vertex_neighbor_edges(&self, v: u32) -> SmallVec<[(u32, u32); 8]> {
        let ring = self.vertex_ring(v);
        let mut out: SmallVec<[(u32, u32); 8]> = ring
            .outgoing
            .iter()
            .map(|&he| (self.half_edge_dest(he).0, he.0))
            .collect();
        if let Some(he) = ring.trailing {
            out.push((self.half_edge(he).origin.0, he.0));
        }
        out
    }

    /// Radial one-ring, skipping neighbors hidden by their face sets
    pub(crate) fn collect_neighbors(&self, v: u32, out: &mut NeighborIter) {
        for (other, he) in self.vertex_neighbor_edges(v) {
            if self.vertices[other as usize].hidden {
                continue;
            }
            out.push_real(other, Some(he));
        }
    }

    pub fn is_boundary_vertex(&self, v: u32) -> bool {
        let ring = self.vertex_ring(v);
        ring.outgoing.is_empty() || ring.trailing.is_some()
    }

    pub fn face_half_edges(&self, f: u32) -> [HalfEdgeId; 3] {
        let first = self.faces[f as usize].half_edge;
        let second = self.half_edge(first).next;
        let third = self.half_edge(second).next;
        [first, second, third]
    }

    pub fn face_vertices(&self, f: u32) -> FaceList {
        self.face_half_edges(f)
            .iter()
            .map(|&he| self.half_edge(he).origin.0)
            .collect()
    }

    pub fn face_positions(&self, f: u32) -> [Vec3; 3] {
        self.face_half_edges(f)
            .map(|he| self.vertices[self.half_edge(he).origin.0 as usize].position)
    }

    pub fn triangles(&self) -> Vec<[u32; 3]> {
        (0..self.faces.len() as u32)
            .map(|f| self.face_half_edges(f).map(|he| self.half_edge(he).origin.0))
            .collect()
    }

    pub fn recalc_all_normals(&mut self) {
        for f in 0..self.faces.len() as u32 {
            self.update_face_normal(f);
        }
        for v in 0..self.vertices.len() as u32 {
            self.update_vertex_normal(v);
        }
    }

    /// Recompute normals of the given vertices and the faces around them
    pub fn recalc_normals(&mut self, vertices: &[u32]) {
        for &v in vertices {
            for f in self.vertex_faces(v) {
                self.update_face_normal(f);
            }
        }
        for &v in vertices {
            self.update_vertex_normal(v);
        }
    }

    fn update_face_normal(&mut self, f: u32) {
        let [p0, p1, p2] = self.face_positions(f);
        self.faces[f as usize].normal = (p1 - p0).cross(p2 - p0).normalize_or_zero();
    }

    fn update_vertex_normal(&mut self, v: u32) {
        let normal: Vec3 = self
            .vertex_faces(v)
            .iter()
            .map(|&f| self.faces[f as usize].normal)
            .sum();
        let normal = normal.normalize_or_zero();
        if normal != Vec3::ZERO {
            self.vertices[v as usize].normal = normal;
        }
    }

    /// Check twin symmetry, face cycles and outgoing pointers
    pub fn validate(&self) -> Result<()> {
        for v in &self.vertices {
            if let Some(he) = v.outgoing_half_edge {
                if self.half_edge(he).origin != v.id {
                    return Err(SculptError::InvalidTopology(format!(
                        "vertex {:?}: outgoing {:?} has origin {:?}",
                        v.id,
                        he,
                        self.half_edge(he).origin
                    )));
                }
            }
        }
        for he in &self.half_edges {
            if self.half_edge(he.next).prev != he.id || self.half_edge(he.prev).next != he.id {
                return Err(SculptError::InvalidTopology(format!(
                    "half-edge {:?}: broken next/prev cycle",
                    he.id
                )));
            }
            if self.half_edge(he.next).face != he.face {
                return Err(SculptError::InvalidTopology(format!(
                    "half-edge {:?}: next leaves face {:?}",
                    he.id, he.face
                )));
            }
            if let Some(twin) = he.twin {
                let back = self.half_edge(twin);
                if back.twin != Some(he.id) {
                    return Err(SculptError::InvalidTopology(format!(
                        "half-edge {:?}: twin {:?} does not point back",
                        he.id, twin
                    )));
                }
                if back.origin != self.half_edge_dest(he.id) {
                    return Err(SculptError::InvalidTopology(format!(
                        "half-edge {:?}: twin {:?} has the wrong origin",
                        he.id, twin
                    )));
                }
            }
        }
        for face in &self.faces {
            let [a, _, c] = self.face_half_edges(face.id.0);
            if self.half_edge(c).next != a {
                return Err(SculptError::InvalidTopology(format!(
                    "face {:?} is not a triangle",
                    face.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_fixtures;

    #[test]
    fn test_interior_ring_is_closed() {
        let mesh = test_fixtures::dynamic_plane(3);
        // Center vertex of a 3x3 vertex plane
        let ring = mesh.vertex_ring(4);
        assert!(ring.trailing.is_none());
        assert_eq!(ring.outgoing.len(), 6);
        assert!(!mesh.is_boundary_vertex(4));
    }

    #[test]
    fn test_boundary_ring_walks_both_ways() {
        let mesh = test_fixtures::dynamic_plane(3);
        for v in [0u32, 1, 2, 3, 5, 6, 7, 8] {
            assert!(mesh.is_boundary_vertex(v));
            let neighbors = mesh.vertex_neighbor_edges(v);
            let faces = mesh.vertex_faces(v);
            // An open fan has one more neighbor than faces
            assert_eq!(neighbors.len(), faces.len() + 1, "vertex {}", v);
        }
    }

    #[test]
    fn test_neighbor_edges_touch_vertex() {
        let mesh = test_fixtures::dynamic_plane(3);
        for v in 0..mesh.vertex_count() as u32 {
            for (other, he) in mesh.vertex_neighbor_edges(v) {
                let ends = mesh.edge_endpoints(he);
                assert!(ends.contains(&v) && ends.contains(&other));
            }
        }
    }

    #[test]
    fn test_hidden_neighbors_are_skipped() {
        let mut mesh = test_fixtures::dynamic_plane(3);
        mesh.vertex_mut(0).hidden = true;
        let mut iter = crate::neighbors::NeighborIter::new(
            crate::mesh::RepresentationKind::DynamicMesh,
        );
        mesh.collect_neighbors(1, &mut iter);
        assert!(iter.indices().all(|v| v != 0));
    }
}
