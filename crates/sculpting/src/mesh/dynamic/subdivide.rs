//! Edge splitting for dynamic topology.

use glam::Vec3;
use smallvec::SmallVec;
use tracing::trace;

use super::types::{Face, FaceId, HalfEdge, HalfEdgeId, Vertex, VertexId};
use super::DynamicMesh;
use crate::mesh::indexed::EdgeFlags;

/// Upper bound on split passes per call, each pass can halve edge lengths
const MAX_SUBDIVIDE_PASSES: usize = 8;

/// What one subdivision call changed
#[derive(Debug, Clone, Default)]
pub struct SubdivideResult {
    /// Vertices created by splits
    pub new_vertices: Vec<u32>,
    /// Pre-existing vertices whose one-ring changed
    pub touched_vertices: Vec<u32>,
    pub new_faces: Vec<u32>,
}

impl SubdivideResult {
    pub fn is_empty(&self) -> bool {
        self.new_vertices.is_empty()
    }
}

impl DynamicMesh {
    fn add_vertex(&mut self, position: Vec3, normal: Vec3) -> VertexId {
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(Vertex {
            id,
            position,
            normal,
            mask: 0.0,
            color: glam::Vec4::ONE,
            hidden: false,
            outgoing_half_edge: None,
        });
        id
    }

    /// Split an edge at its midpoint, turning each adjacent triangle into two.
    ///
    /// For edge v0→v1 in triangle (v0, v1, v2) the result is (v0, mid, v2)
    /// and (mid, v1, v2); the twin triangle (v1, v0, v3) becomes (v1, mid, v3)
    /// and (mid, v0, v3). New faces inherit the face set of the face they
    /// were cut from, the new vertex interpolates mask, color and normal.
    pub fn split_edge(&mut self, edge_id: HalfEdgeId) -> (VertexId, SmallVec<[FaceId; 2]>) {
        // Gather
        let he = self.half_edge(edge_id).clone();
        let v0_id = he.origin;
        let face_id = he.face;
        let next_id = he.next;
        let prev_id = he.prev;
        let v1_id = self.half_edge(next_id).origin;
        let v2_id = self.half_edge(prev_id).origin;
        let twin_data = he.twin.map(|tid| {
            let twin = self.half_edge(tid);
            let v3 = self.half_edge(twin.prev).origin;
            (tid, twin.face, twin.next, twin.prev, v3)
        });

        trace!(
            "split_edge: v0={:?} v1={:?} v2={:?} face={:?} twin={:?}",
            v0_id, v1_id, v2_id, face_id, he.twin
        );

        let v0 = &self.vertices[v0_id.0 as usize];
        let v1 = &self.vertices[v1_id.0 as usize];
        let mid_pos = (v0.position + v1.position) * 0.5;
        let mid_normal = (v0.normal + v1.normal).normalize_or_zero();
        let mid_mask = (v0.mask + v1.mask) * 0.5;
        let mid_color = (v0.color + v1.color) * 0.5;
        let mid_hidden = v0.hidden && v1.hidden;

        // Create elements
        let mid_id = self.add_vertex(mid_pos, mid_normal);
        {
            let mid = &mut self.vertices[mid_id.0 as usize];
            mid.mask = mid_mask;
            mid.color = mid_color;
            mid.hidden = mid_hidden;
        }

        let base = self.half_edges.len() as u32;
        let he_mid_v2 = HalfEdgeId(base);
        let he_mid_v1 = HalfEdgeId(base + 1);
        let he_v2_mid = HalfEdgeId(base + 2);
        let he_mid_v3 = HalfEdgeId(base + 3);
        let he_mid_v0 = HalfEdgeId(base + 4);
        let he_v3_mid = HalfEdgeId(base + 5);
        let he_v0_mid = edge_id;
        let he_v1_v2 = next_id;

        let face = &self.faces[face_id.0 as usize];
        let (face_normal, face_set) = (face.normal, face.face_set);
        let new_face = FaceId(self.faces.len() as u32);
        self.faces.push(Face {
            id: new_face,
            half_edge: he_mid_v1,
            normal: face_normal,
            face_set,
        });
        let twin_new_face = twin_data.map(|(_, twin_face, ..)| {
            let twin = &self.faces[twin_face.0 as usize];
            let (normal, face_set) = (twin.normal, twin.face_set);
            let id = FaceId(self.faces.len() as u32);
            self.faces.push(Face {
                id,
                half_edge: he_mid_v0,
                normal,
                face_set,
            });
            id
        });

        let interior = EdgeFlags::default();
        self.half_edges.push(HalfEdge {
            id: he_mid_v2,
            origin: mid_id,
            twin: Some(he_v2_mid),
            next: prev_id,
            prev: he_v0_mid,
            face: face_id,
            flags: interior,
        });
        self.half_edges.push(HalfEdge {
            id: he_mid_v1,
            origin: mid_id,
            twin: None,
            next: he_v1_v2,
            prev: he_v2_mid,
            face: new_face,
            flags: he.flags,
        });
        self.half_edges.push(HalfEdge {
            id: he_v2_mid,
            origin: v2_id,
            twin: Some(he_mid_v2),
            next: he_mid_v1,
            prev: he_v1_v2,
            face: new_face,
            flags: interior,
        });

        if let (Some((twin_id, twin_face, twin_next, twin_prev, v3_id)), Some(twin_new_face)) =
            (twin_data, twin_new_face)
        {
            self.half_edges.push(HalfEdge {
                id: he_mid_v3,
                origin: mid_id,
                twin: Some(he_v3_mid),
                next: twin_prev,
                prev: twin_id,
                face: twin_face,
                flags: interior,
            });
            self.half_edges.push(HalfEdge {
                id: he_mid_v0,
                origin: mid_id,
                twin: None,
                next: twin_next,
                prev: he_v3_mid,
                face: twin_new_face,
                flags: he.flags,
            });
            self.half_edges.push(HalfEdge {
                id: he_v3_mid,
                origin: v3_id,
                twin: Some(he_mid_v3),
                next: he_mid_v0,
                prev: twin_next,
                face: twin_new_face,
                flags: interior,
            });
        }

        // Relink existing half-edges
        self.half_edges[he_v0_mid.0 as usize].next = he_mid_v2;
        self.half_edges[he_v1_v2.0 as usize].face = new_face;
        self.half_edges[he_v1_v2.0 as usize].next = he_v2_mid;
        self.half_edges[he_v1_v2.0 as usize].prev = he_mid_v1;
        self.half_edges[prev_id.0 as usize].prev = he_mid_v2;

        if let (Some((twin_id, _, twin_next, twin_prev, _)), Some(twin_new_face)) =
            (twin_data, twin_new_face)
        {
            self.half_edges[twin_id.0 as usize].next = he_mid_v3;
            self.half_edges[twin_next.0 as usize].face = twin_new_face;
            self.half_edges[twin_next.0 as usize].next = he_v3_mid;
            self.half_edges[twin_next.0 as usize].prev = he_mid_v0;
            self.half_edges[twin_prev.0 as usize].prev = he_mid_v3;

            self.half_edges[he_mid_v1.0 as usize].twin = Some(twin_id);
            self.half_edges[twin_id.0 as usize].twin = Some(he_mid_v1);
            self.half_edges[he_v0_mid.0 as usize].twin = Some(he_mid_v0);
            self.half_edges[he_mid_v0.0 as usize].twin = Some(he_v0_mid);
        } else {
            self.half_edges[he_v0_mid.0 as usize].twin = None;
        }

        // Auxiliary maps and face anchors
        self.vertices[mid_id.0 as usize].outgoing_half_edge = Some(he_mid_v2);
        self.edge_map.remove(&(v0_id, v1_id));
        self.edge_map.insert((v0_id, mid_id), he_v0_mid);
        self.edge_map.insert((mid_id, v2_id), he_mid_v2);
        self.edge_map.insert((mid_id, v1_id), he_mid_v1);
        self.edge_map.insert((v2_id, mid_id), he_v2_mid);
        self.faces[face_id.0 as usize].half_edge = he_v0_mid;

        let mut new_faces: SmallVec<[FaceId; 2]> = SmallVec::new();
        new_faces.push(new_face);
        if let Some((twin_id, twin_face, _, _, v3_id)) = twin_data {
            self.edge_map.remove(&(v1_id, v0_id));
            self.edge_map.insert((v1_id, mid_id), twin_id);
            self.edge_map.insert((mid_id, v3_id), he_mid_v3);
            self.edge_map.insert((mid_id, v0_id), he_mid_v0);
            self.edge_map.insert((v3_id, mid_id), he_v3_mid);
            self.faces[twin_face.0 as usize].half_edge = twin_id;
        }
        if let Some(id) = twin_new_face {
            new_faces.push(id);
        }

        trace!("split_edge: created {:?}, {} new faces", mid_id, new_faces.len());
        (mid_id, new_faces)
    }

    /// Split every edge longer than `max_length` with both ends inside the sphere.
    ///
    /// Runs repeated passes (longest edges first) until no long edge is left
    /// or the pass limit is hit.
    pub fn subdivide_long_edges(
        &mut self,
        center: Vec3,
        radius: f32,
        max_length: f32,
    ) -> SubdivideResult {
        let mut result = SubdivideResult::default();
        let radius_sq = radius * radius;
        let max_sq = max_length * max_length;

        for _ in 0..MAX_SUBDIVIDE_PASSES {
            let mut candidates: Vec<(f32, HalfEdgeId)> = self
                .half_edges
                .iter()
                .filter(|he| he.twin.is_none_or(|twin| he.id < twin))
                .filter_map(|he| {
                    let a = self.vertices[he.origin.0 as usize].position;
                    let b = self.vertices[self.half_edge_dest(he.id).0 as usize].position;
                    let inside = a.distance_squared(center) <= radius_sq
                        && b.distance_squared(center) <= radius_sq;
                    let len_sq = a.distance_squared(b);
                    (inside && len_sq > max_sq).then_some((len_sq, he.id))
                })
                .collect();
            if candidates.is_empty() {
                break;
            }
            candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

            for (_, he_id) in candidates {
                // An earlier split in this pass may have shortened this half-edge
                let a = self.vertices[self.half_edge(he_id).origin.0 as usize].position;
                let b = self.vertices[self.half_edge_dest(he_id).0 as usize].position;
                if a.distance_squared(b) <= max_sq {
                    continue;
                }
                let ends = self.edge_endpoints(he_id.0);
                let (mid, faces) = self.split_edge(he_id);
                result.new_vertices.push(mid.0);
                result.new_faces.extend(faces.iter().map(|f| f.0));
                for v in ends {
                    if !result.touched_vertices.contains(&v) {
                        result.touched_vertices.push(v);
                    }
                }
            }
        }

        // Opposite corners gained a neighbor too
        let mut opposite = Vec::new();
        for &mid in &result.new_vertices {
            for (other, _) in self.vertex_neighbor_edges(mid) {
                if !result.new_vertices.contains(&other)
                    && !result.touched_vertices.contains(&other)
                    && !opposite.contains(&other)
                {
                    opposite.push(other);
                }
            }
        }
        result.touched_vertices.extend(opposite);

        let mut changed = result.touched_vertices.clone();
        changed.extend_from_slice(&result.new_vertices);
        self.recalc_normals(&changed);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;

    #[test]
    fn test_split_interior_edge() {
        let mut mesh = test_fixtures::dynamic_plane(3);
        let faces_before = mesh.face_count();
        let he = mesh.find_half_edge(VertexId(0), VertexId(4)).unwrap();
        let (mid, new_faces) = mesh.split_edge(he);
        assert_eq!(new_faces.len(), 2);
        assert_eq!(mesh.face_count(), faces_before + 2);
        assert!(mesh.validate().is_ok());
        let p = mesh.vertex(mid.0).position;
        assert!((p - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-6);
        assert_eq!(mesh.vertex_faces(mid.0).len(), 4);
    }

    #[test]
    fn test_split_boundary_edge() {
        let mut mesh = test_fixtures::dynamic_plane(3);
        let he = mesh.find_half_edge(VertexId(0), VertexId(1)).unwrap();
        let (mid, new_faces) = mesh.split_edge(he);
        assert_eq!(new_faces.len(), 1);
        assert!(mesh.validate().is_ok());
        assert!(mesh.is_boundary_vertex(mid.0));
    }

    #[test]
    fn test_split_keeps_face_sets() {
        let mut mesh = test_fixtures::dynamic_plane(3);
        for f in 0..mesh.face_count() as u32 {
            mesh.face_mut(f).face_set = 7;
        }
        let he = mesh.find_half_edge(VertexId(0), VertexId(4)).unwrap();
        mesh.split_edge(he);
        assert!(mesh.faces().iter().all(|f| f.face_set == 7));
    }

    #[test]
    fn test_subdivide_long_edges_in_radius() {
        let mut mesh = test_fixtures::dynamic_plane(3);
        let center = Vec3::new(1.0, 1.0, 0.0);
        let result = mesh.subdivide_long_edges(center, 1.5, 0.8);
        assert!(!result.is_empty());
        assert!(mesh.validate().is_ok());
        // No edge with both ends inside the sphere stays long
        for he in 0..mesh.half_edge_count() as u32 {
            let [a, b] = mesh.edge_endpoints(he);
            let pa = mesh.vertex(a).position;
            let pb = mesh.vertex(b).position;
            if pa.distance(center) <= 1.5 && pb.distance(center) <= 1.5 {
                assert!(pa.distance(pb) <= 0.8 + 1e-5);
            }
        }
    }

    #[test]
    fn test_subdivide_outside_radius_is_noop() {
        let mut mesh = test_fixtures::dynamic_plane(3);
        let result = mesh.subdivide_long_edges(Vec3::new(10.0, 10.0, 0.0), 0.5, 0.1);
        assert!(result.is_empty());
    }
}
