//! Static indexed polygon mesh.
//!
//! Polygons are stored as `(loop_start, loop_count)` spans into per-corner
//! vertex and edge arrays. A vertex-to-face map is always built; a
//! vertex-to-edge map sorted in disk-cycle order is built on request and,
//! when present, drives neighbor iteration so the ring order is stable.

use std::collections::HashMap;

use glam::{Vec2, Vec3, Vec4};
use tracing::debug;

use crate::error::{Result, SculptError};
use crate::neighbors::NeighborIter;

/// Per-edge marks used by boundary classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeFlags {
    pub sharp: bool,
    pub seam: bool,
}

/// One polygon as a span of corners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poly {
    pub loop_start: u32,
    pub loop_count: u32,
}

impl Poly {
    pub fn corners(&self) -> std::ops::Range<usize> {
        self.loop_start as usize..(self.loop_start + self.loop_count) as usize
    }
}

/// Indexed polygon mesh with per-vertex sculpt attributes
#[derive(Debug, Clone)]
pub struct IndexedMesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    masks: Vec<f32>,
    colors: Vec<Vec4>,
    hidden: Vec<bool>,
    polys: Vec<Poly>,
    corner_verts: Vec<u32>,
    corner_edges: Vec<u32>,
    corner_uvs: Option<Vec<Vec2>>,
    edges: Vec<[u32; 2]>,
    edge_flags: Vec<EdgeFlags>,
    edge_face_count: Vec<u32>,
    edge_lookup: HashMap<(u32, u32), u32>,
    face_sets: Vec<i32>,
    vert_to_face: Vec<Vec<u32>>,
    vert_to_edge: Option<Vec<Vec<u32>>>,
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

impl IndexedMesh {
    /// Build from positions and polygons given as vertex index lists.
    ///
    /// Every face starts in face set 1 (visible).
    pub fn from_polygons(positions: Vec<Vec3>, faces: &[Vec<u32>]) -> Result<Self> {
        if faces.is_empty() {
            return Err(SculptError::NoFaces);
        }
        let vertex_count = positions.len();

        let mut polys = Vec::with_capacity(faces.len());
        let mut corner_verts = Vec::new();
        let mut corner_edges = Vec::new();
        let mut edges: Vec<[u32; 2]> = Vec::new();
        let mut edge_face_count: Vec<u32> = Vec::new();
        let mut edge_lookup: HashMap<(u32, u32), u32> = HashMap::new();
        let mut vert_to_face = vec![Vec::new(); vertex_count];

        for (face_index, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(SculptError::DegenerateFace(face_index));
            }
            for (i, &v) in face.iter().enumerate() {
                if v as usize >= vertex_count {
                    return Err(SculptError::VertexOutOfRange {
                        face: face_index,
                        vertex: v,
                        count: vertex_count,
                    });
                }
                if face[..i].contains(&v) {
                    return Err(SculptError::DegenerateFace(face_index));
                }
            }

            polys.push(Poly {
                loop_start: corner_verts.len() as u32,
                loop_count: face.len() as u32,
            });
            for (i, &v) in face.iter().enumerate() {
                let next = face[(i + 1) % face.len()];
                let edge = *edge_lookup.entry(edge_key(v, next)).or_insert_with(|| {
                    edges.push([v.min(next), v.max(next)]);
                    edge_face_count.push(0);
                    (edges.len() - 1) as u32
                });
                edge_face_count[edge as usize] += 1;
                corner_verts.push(v);
                corner_edges.push(edge);
                vert_to_face[v as usize].push(face_index as u32);
            }
        }

        let edge_count = edges.len();
        let mut mesh = Self {
            normals: vec![Vec3::Z; vertex_count],
            masks: vec![0.0; vertex_count],
            colors: vec![Vec4::ONE; vertex_count],
            hidden: vec![false; vertex_count],
            positions,
            polys,
            corner_verts,
            corner_edges,
            corner_uvs: None,
            edges,
            edge_flags: vec![EdgeFlags::default(); edge_count],
            edge_face_count,
            edge_lookup,
            face_sets: vec![1; faces.len()],
            vert_to_face,
            vert_to_edge: None,
        };
        mesh.recalc_all_normals();

        debug!(
            "IndexedMesh: {} vertices, {} edges, {} faces",
            mesh.vertex_count(),
            mesh.edge_count(),
            mesh.face_count()
        );
        Ok(mesh)
    }

    /// Build from a flat triangle index list
    pub fn from_triangles(positions: Vec<Vec3>, indices: &[u32]) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(SculptError::InvalidTopology(
                "Index count not divisible by 3".to_string(),
            ));
        }
        let faces: Vec<Vec<u32>> = indices.chunks(3).map(|tri| tri.to_vec()).collect();
        Self::from_polygons(positions, &faces)
    }

    /// Build the disk-cycle ordered vertex-to-edge map
    pub fn with_vertex_edge_map(mut self) -> Self {
        self.build_vertex_edge_map();
        self
    }

    pub fn build_vertex_edge_map(&mut self) {
        let map = (0..self.vertex_count() as u32)
            .map(|v| self.disk_cycle_edges(v))
            .collect();
        self.vert_to_edge = Some(map);
    }

    pub fn has_vertex_edge_map(&self) -> bool {
        self.vert_to_edge.is_some()
    }

    /// Edges around `v`, walked face to face.
    ///
    /// The walk starts on an open edge when there is one so a boundary fan is
    /// visited end to end. Edges a non-manifold fan leaves unreached are
    /// appended afterwards.
    fn disk_cycle_edges(&self, v: u32) -> Vec<u32> {
        let faces = &self.vert_to_face[v as usize];
        let mut around: Vec<(u32, u32, u32)> = Vec::with_capacity(faces.len());
        for &f in faces {
            if let Some(c) = self.corner_of(f, v) {
                let poly = self.polys[f as usize];
                let prev = self.prev_corner(poly, c);
                around.push((f, self.corner_edges[prev], self.corner_edges[c]));
            }
        }

        let mut all_edges: Vec<u32> = Vec::new();
        for &(_, a, b) in &around {
            for e in [a, b] {
                if !all_edges.contains(&e) {
                    all_edges.push(e);
                }
            }
        }

        let start = all_edges
            .iter()
            .copied()
            .find(|&e| self.edge_face_count[e as usize] < 2)
            .or_else(|| all_edges.first().copied());
        let Some(start) = start else {
            return Vec::new();
        };

        let mut ordered = vec![start];
        let mut used_faces = vec![false; around.len()];
        let mut current = start;
        loop {
            let step = around.iter().enumerate().find_map(|(i, &(_, a, b))| {
                if used_faces[i] {
                    None
                } else if a == current {
                    Some((i, b))
                } else if b == current {
                    Some((i, a))
                } else {
                    None
                }
            });
            let Some((i, next)) = step else { break };
            used_faces[i] = true;
            if ordered.contains(&next) {
                break;
            }
            ordered.push(next);
            current = next;
        }

        for e in all_edges {
            if !ordered.contains(&e) {
                ordered.push(e);
            }
        }
        ordered
    }

    /// Attach per-corner UVs, one per loop
    pub fn set_corner_uvs(&mut self, uvs: Vec<Vec2>) -> Result<()> {
        if uvs.len() != self.corner_verts.len() {
            return Err(SculptError::InvalidTopology(format!(
                "{} UVs for {} corners",
                uvs.len(),
                self.corner_verts.len()
            )));
        }
        self.corner_uvs = Some(uvs);
        Ok(())
    }

    /// Mark the edge between two vertices, returns false if no such edge
    pub fn set_edge_flags(&mut self, a: u32, b: u32, flags: EdgeFlags) -> bool {
        match self.find_edge(a, b) {
            Some(e) => {
                self.edge_flags[e as usize] = flags;
                true
            }
            None => false,
        }
    }

    pub fn find_edge(&self, a: u32, b: u32) -> Option<u32> {
        self.edge_lookup.get(&edge_key(a, b)).copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.polys.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn normals_mut(&mut self) -> &mut [Vec3] {
        &mut self.normals
    }

    pub fn masks(&self) -> &[f32] {
        &self.masks
    }

    pub fn masks_mut(&mut self) -> &mut [f32] {
        &mut self.masks
    }

    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut [Vec4] {
        &mut self.colors
    }

    pub fn hidden(&self) -> &[bool] {
        &self.hidden
    }

    pub fn hidden_mut(&mut self) -> &mut [bool] {
        &mut self.hidden
    }

    pub fn polys(&self) -> &[Poly] {
        &self.polys
    }

    pub fn corner_verts(&self) -> &[u32] {
        &self.corner_verts
    }

    pub fn corner_uvs(&self) -> Option<&[Vec2]> {
        self.corner_uvs.as_deref()
    }

    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    pub fn edge_flags(&self, e: u32) -> EdgeFlags {
        self.edge_flags[e as usize]
    }

    /// Number of faces using an edge
    pub fn edge_face_count(&self, e: u32) -> u32 {
        self.edge_face_count[e as usize]
    }

    pub fn face_sets(&self) -> &[i32] {
        &self.face_sets
    }

    pub fn face_sets_mut(&mut self) -> &mut [i32] {
        &mut self.face_sets
    }

    pub fn vertex_faces(&self, v: u32) -> &[u32] {
        &self.vert_to_face[v as usize]
    }

    pub fn vertex_edges(&self, v: u32) -> Option<&[u32]> {
        self.vert_to_edge.as_ref().map(|map| map[v as usize].as_slice())
    }

    pub fn face_vertices(&self, f: u32) -> &[u32] {
        &self.corner_verts[self.polys[f as usize].corners()]
    }

    /// Corner index of `v` within face `f`
    pub fn corner_of(&self, f: u32, v: u32) -> Option<usize> {
        self.polys[f as usize]
            .corners()
            .find(|&c| self.corner_verts[c] == v)
    }

    fn prev_corner(&self, poly: Poly, c: usize) -> usize {
        let start = poly.loop_start as usize;
        let len = poly.loop_count as usize;
        start + (c - start + len - 1) % len
    }

    fn next_corner(&self, poly: Poly, c: usize) -> usize {
        let start = poly.loop_start as usize;
        let len = poly.loop_count as usize;
        start + (c - start + 1) % len
    }

    pub(crate) fn collect_neighbors(&self, v: u32, out: &mut NeighborIter) {
        if let Some(map) = &self.vert_to_edge {
            for &e in &map[v as usize] {
                let [a, b] = self.edges[e as usize];
                let other = if a == v { b } else { a };
                out.push_real(other, Some(e));
            }
            return;
        }

        for &f in &self.vert_to_face[v as usize] {
            let poly = self.polys[f as usize];
            let Some(c) = self.corner_of(f, v) else {
                continue;
            };
            let prev = self.prev_corner(poly, c);
            let next = self.next_corner(poly, c);
            out.push_real(self.corner_verts[prev], Some(self.corner_edges[prev]));
            out.push_real(self.corner_verts[next], Some(self.corner_edges[c]));
        }
    }

    /// Newell normal of a polygon, not normalized
    pub fn poly_normal(&self, f: u32) -> Vec3 {
        let verts = self.face_vertices(f);
        let mut normal = Vec3::ZERO;
        for (i, &v) in verts.iter().enumerate() {
            let a = self.positions[v as usize];
            let b = self.positions[verts[(i + 1) % verts.len()] as usize];
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal
    }

    pub fn poly_center(&self, f: u32) -> Vec3 {
        let verts = self.face_vertices(f);
        let sum: Vec3 = verts.iter().map(|&v| self.positions[v as usize]).sum();
        sum / verts.len() as f32
    }

    pub fn recalc_all_normals(&mut self) {
        let all: Vec<u32> = (0..self.vertex_count() as u32).collect();
        self.recalc_normals(&all);
    }

    /// Recompute vertex normals from adjacent face normals
    pub fn recalc_normals(&mut self, vertices: &[u32]) {
        for &v in vertices {
            let normal: Vec3 = self.vert_to_face[v as usize]
                .iter()
                .map(|&f| self.poly_normal(f).normalize_or_zero())
                .sum();
            let normal = normal.normalize_or_zero();
            if normal != Vec3::ZERO {
                self.normals[v as usize] = normal;
            }
        }
    }

    /// Fan triangulation of every polygon
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        let mut tris = Vec::with_capacity(self.corner_verts.len());
        for f in 0..self.face_count() as u32 {
            let verts = self.face_vertices(f);
            for i in 1..verts.len() - 1 {
                tris.push([verts[0], verts[i], verts[i + 1]]);
            }
        }
        tris
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;

    #[test]
    fn test_from_polygons_builds_shared_edges() {
        let mesh = test_fixtures::unit_square();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.edge_count(), 5);
        let diagonal = mesh.find_edge(0, 2).unwrap();
        assert_eq!(mesh.edge_face_count(diagonal), 2);
    }

    #[test]
    fn test_rejects_bad_faces() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        assert!(matches!(
            IndexedMesh::from_polygons(positions.clone(), &[vec![0, 1]]),
            Err(SculptError::DegenerateFace(0))
        ));
        assert!(matches!(
            IndexedMesh::from_polygons(positions.clone(), &[vec![0, 1, 7]]),
            Err(SculptError::VertexOutOfRange { vertex: 7, .. })
        ));
        assert!(matches!(
            IndexedMesh::from_polygons(positions, &[]),
            Err(SculptError::NoFaces)
        ));
    }

    #[test]
    fn test_flat_normals_point_up() {
        let mesh = test_fixtures::unit_square();
        for n in mesh.normals() {
            assert!((n.z - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_disk_cycle_is_connected() {
        let mesh = test_fixtures::grid_plane(3).with_vertex_edge_map();
        // Center vertex of a 3x3 vertex grid
        let center = 4;
        let edges = mesh.vertex_edges(center).unwrap();
        assert_eq!(edges.len(), 4);
        // Consecutive edges share a face around the center
        for pair in edges.windows(2) {
            let shares_face = mesh.vertex_faces(center).iter().any(|&f| {
                let verts = mesh.face_vertices(f);
                pair.iter().all(|&e| {
                    let [a, b] = mesh.edges()[e as usize];
                    verts.contains(&a) && verts.contains(&b)
                })
            });
            assert!(shares_face);
        }
    }

    #[test]
    fn test_boundary_disk_cycle_starts_open() {
        let mesh = test_fixtures::grid_plane(3).with_vertex_edge_map();
        let edges = mesh.vertex_edges(1).unwrap();
        assert_eq!(edges.len(), 3);
        assert_eq!(mesh.edge_face_count(edges[0]), 1);
        assert_eq!(mesh.edge_face_count(edges[2]), 1);
    }

    #[test]
    fn test_triangles_fan() {
        let mesh = test_fixtures::grid_plane(2);
        assert_eq!(mesh.triangles().len(), 2);
    }
}
