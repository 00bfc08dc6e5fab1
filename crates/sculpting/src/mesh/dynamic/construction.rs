//! Construction methods for DynamicMesh.

use std::collections::HashMap;

use glam::{Vec3, Vec4};

use super::types::{Face, FaceId, HalfEdge, HalfEdgeId, Vertex, VertexId};
use super::DynamicMesh;
use crate::error::{Result, SculptError};
use crate::mesh::indexed::{EdgeFlags, IndexedMesh};

impl DynamicMesh {
    /// Build from a triangle soup.
    ///
    /// Positionally identical vertices are welded first so seams duplicated
    /// for texturing do not turn into open boundaries. Welded-away vertices
    /// keep their slot but have no outgoing half-edge.
    pub fn from_triangles(positions: Vec<Vec3>, indices: &[u32]) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(SculptError::InvalidTopology(
                "Index count not divisible by 3".to_string(),
            ));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(SculptError::VertexOutOfRange {
                face: indices.iter().position(|&i| i == bad).unwrap_or(0) / 3,
                vertex: bad,
                count: positions.len(),
            });
        }

        let quantize = |p: Vec3| -> [i64; 3] {
            [
                (p.x * 1_000_000.0) as i64,
                (p.y * 1_000_000.0) as i64,
                (p.z * 1_000_000.0) as i64,
            ]
        };
        let mut position_to_canonical: HashMap<[i64; 3], u32> = HashMap::new();
        let canonical_map: Vec<u32> = positions
            .iter()
            .enumerate()
            .map(|(i, &p)| *position_to_canonical.entry(quantize(p)).or_insert(i as u32))
            .collect();

        let welded = canonical_map
            .iter()
            .enumerate()
            .filter(|&(i, &c)| c as usize != i)
            .count();
        if welded > 0 {
            tracing::debug!(
                "DynamicMesh::from_triangles: welded {} duplicate vertices ({} unique of {})",
                welded,
                position_to_canonical.len(),
                positions.len()
            );
        }

        let triangles: Vec<[u32; 3]> = indices
            .chunks(3)
            .map(|tri| {
                [
                    canonical_map[tri[0] as usize],
                    canonical_map[tri[1] as usize],
                    canonical_map[tri[2] as usize],
                ]
            })
            .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
            .collect();
        if triangles.is_empty() {
            return Err(SculptError::NoFaces);
        }

        let count = positions.len();
        let face_sets = vec![1; triangles.len()];
        Self::build(
            positions,
            vec![0.0; count],
            vec![Vec4::ONE; count],
            &triangles,
            &face_sets,
        )
    }

    /// Triangulate an indexed mesh, carrying masks, colors, face sets and edge marks
    pub fn from_indexed(mesh: &IndexedMesh) -> Result<Self> {
        let mut triangles = Vec::new();
        let mut face_sets = Vec::new();
        for f in 0..mesh.face_count() as u32 {
            let verts = mesh.face_vertices(f);
            for i in 1..verts.len() - 1 {
                triangles.push([verts[0], verts[i], verts[i + 1]]);
                face_sets.push(mesh.face_sets()[f as usize]);
            }
        }

        let mut dynamic = Self::build(
            mesh.positions().to_vec(),
            mesh.masks().to_vec(),
            mesh.colors().to_vec(),
            &triangles,
            &face_sets,
        )?;
        for (v, &hidden) in mesh.hidden().iter().enumerate() {
            dynamic.vertices[v].hidden = hidden;
        }
        for (e, &[a, b]) in mesh.edges().iter().enumerate() {
            let flags = mesh.edge_flags(e as u32);
            if flags != EdgeFlags::default() {
                dynamic.set_edge_flags(VertexId(a), VertexId(b), flags);
            }
        }
        Ok(dynamic)
    }

    pub(crate) fn build(
        positions: Vec<Vec3>,
        masks: Vec<f32>,
        colors: Vec<Vec4>,
        triangles: &[[u32; 3]],
        face_sets: &[i32],
    ) -> Result<Self> {
        let mut vertices: Vec<Vertex> = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| Vertex {
                id: VertexId(i as u32),
                position,
                normal: Vec3::Z,
                mask: masks[i],
                color: colors[i],
                hidden: false,
                outgoing_half_edge: None,
            })
            .collect();

        let mut half_edges: Vec<HalfEdge> = Vec::with_capacity(triangles.len() * 3);
        let mut faces: Vec<Face> = Vec::with_capacity(triangles.len());
        let mut edge_map: HashMap<(VertexId, VertexId), HalfEdgeId> = HashMap::new();

        for (tri_index, tri) in triangles.iter().enumerate() {
            let ids = tri.map(VertexId);
            let face_id = FaceId(tri_index as u32);
            let base = half_edges.len() as u32;
            let he = [HalfEdgeId(base), HalfEdgeId(base + 1), HalfEdgeId(base + 2)];

            for k in 0..3 {
                let origin = ids[k];
                let dest = ids[(k + 1) % 3];
                if edge_map.contains_key(&(origin, dest)) {
                    return Err(SculptError::NonManifoldEdge(origin.0, dest.0));
                }
                half_edges.push(HalfEdge {
                    id: he[k],
                    origin,
                    twin: None,
                    next: he[(k + 1) % 3],
                    prev: he[(k + 2) % 3],
                    face: face_id,
                    flags: EdgeFlags::default(),
                });
                let vertex = &mut vertices[origin.0 as usize];
                if vertex.outgoing_half_edge.is_none() {
                    vertex.outgoing_half_edge = Some(he[k]);
                }
                if let Some(&twin) = edge_map.get(&(dest, origin)) {
                    half_edges[he[k].0 as usize].twin = Some(twin);
                    half_edges[twin.0 as usize].twin = Some(he[k]);
                }
                edge_map.insert((origin, dest), he[k]);
            }

            let [p0, p1, p2] = tri.map(|v| positions[v as usize]);
            faces.push(Face {
                id: face_id,
                half_edge: he[0],
                normal: (p1 - p0).cross(p2 - p0).normalize_or_zero(),
                face_set: face_sets[tri_index],
            });
        }

        let mut mesh = Self {
            vertices,
            half_edges,
            faces,
            edge_map,
        };
        mesh.recalc_all_normals();
        Ok(mesh)
    }
}
