//! Topology abstraction over the three mesh representations.
//!
//! Generic code never touches a representation directly. It holds tagged
//! [`VertexRef`]/[`EdgeRef`]/[`FaceRef`] handles and routes every query
//! through [`SculptMesh`], a closed three-way variant matched exhaustively
//! in each accessor.
//!
//! Accessors do not bounds-check beyond slice indexing: a reference is only
//! valid for the representation that produced it, and dynamic topology
//! invalidates every outstanding reference.

pub mod dynamic;
pub mod grids;
pub mod indexed;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub use dynamic::{DynamicMesh, SubdivideResult};
pub use grids::{CoarseAdjacency, GridCoord, GridHierarchy, GridKey};
pub use indexed::{EdgeFlags, IndexedMesh, Poly};

use crate::neighbors::NeighborIter;
use crate::spatial::Aabb;

/// Which backend is active for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepresentationKind {
    IndexedMesh,
    GridHierarchy,
    DynamicMesh,
}

/// Tagged vertex handle, `index` is meaningful only within its representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexRef {
    pub kind: RepresentationKind,
    pub index: u32,
}

/// Tagged edge handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeRef {
    pub kind: RepresentationKind,
    pub index: u32,
}

/// Tagged face handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceRef {
    pub kind: RepresentationKind,
    pub index: u32,
}

impl VertexRef {
    pub fn new(kind: RepresentationKind, index: u32) -> Self {
        Self { kind, index }
    }
}

impl EdgeRef {
    pub fn new(kind: RepresentationKind, index: u32) -> Self {
        Self { kind, index }
    }
}

impl FaceRef {
    pub fn new(kind: RepresentationKind, index: u32) -> Self {
        Self { kind, index }
    }
}

/// Small list of face indices around a vertex
pub type FaceList = SmallVec<[u32; 8]>;

/// A render triangle and the face it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshTriangle {
    pub verts: [u32; 3],
    pub face: u32,
}

/// The active mesh representation
#[derive(Debug, Clone)]
pub enum SculptMesh {
    Indexed(IndexedMesh),
    Grids(GridHierarchy),
    Dynamic(DynamicMesh),
}

impl SculptMesh {
    pub fn kind(&self) -> RepresentationKind {
        match self {
            SculptMesh::Indexed(_) => RepresentationKind::IndexedMesh,
            SculptMesh::Grids(_) => RepresentationKind::GridHierarchy,
            SculptMesh::Dynamic(_) => RepresentationKind::DynamicMesh,
        }
    }

    /// Size of the dense vertex index space.
    ///
    /// For grids this counts every grid element, duplicates included.
    pub fn vertex_count(&self) -> usize {
        match self {
            SculptMesh::Indexed(mesh) => mesh.vertex_count(),
            SculptMesh::Grids(grids) => grids.element_count(),
            SculptMesh::Dynamic(mesh) => mesh.vertex_count(),
        }
    }

    pub fn face_count(&self) -> usize {
        match self {
            SculptMesh::Indexed(mesh) => mesh.face_count(),
            SculptMesh::Grids(grids) => grids.base().face_count(),
            SculptMesh::Dynamic(mesh) => mesh.face_count(),
        }
    }

    /// Number of edge ids. Grids expose no edges.
    pub fn edge_count(&self) -> usize {
        match self {
            SculptMesh::Indexed(mesh) => mesh.edge_count(),
            SculptMesh::Grids(_) => 0,
            SculptMesh::Dynamic(mesh) => mesh.half_edge_count(),
        }
    }

    pub fn index_to_vertex(&self, index: u32) -> VertexRef {
        VertexRef::new(self.kind(), index)
    }

    pub fn vertex_to_index(&self, vertex: VertexRef) -> u32 {
        debug_assert_eq!(vertex.kind, self.kind());
        vertex.index
    }

    pub fn edge_ref(&self, index: u32) -> EdgeRef {
        EdgeRef::new(self.kind(), index)
    }

    pub fn face_ref(&self, index: u32) -> FaceRef {
        FaceRef::new(self.kind(), index)
    }

    /// False only for grid elements that duplicate another element's point
    pub fn is_unique(&self, v: u32) -> bool {
        match self {
            SculptMesh::Grids(grids) => grids.is_canonical(v),
            SculptMesh::Indexed(_) => true,
            SculptMesh::Dynamic(mesh) => mesh.is_live_vertex(v),
        }
    }

    pub fn co(&self, v: u32) -> Vec3 {
        match self {
            SculptMesh::Indexed(mesh) => mesh.positions()[v as usize],
            SculptMesh::Grids(grids) => grids.co(v),
            SculptMesh::Dynamic(mesh) => mesh.vertex(v).position,
        }
    }

    /// Write a coordinate. Grid writes are stitched to every duplicate.
    pub fn set_co(&mut self, v: u32, co: Vec3) {
        match self {
            SculptMesh::Indexed(mesh) => mesh.positions_mut()[v as usize] = co,
            SculptMesh::Grids(grids) => grids.set_co(v, co),
            SculptMesh::Dynamic(mesh) => mesh.vertex_mut(v).position = co,
        }
    }

    pub fn normal(&self, v: u32) -> Vec3 {
        match self {
            SculptMesh::Indexed(mesh) => mesh.normals()[v as usize],
            SculptMesh::Grids(grids) => grids.normal(v),
            SculptMesh::Dynamic(mesh) => mesh.vertex(v).normal,
        }
    }

    pub fn mask(&self, v: u32) -> f32 {
        match self {
            SculptMesh::Indexed(mesh) => mesh.masks()[v as usize],
            SculptMesh::Grids(grids) => grids.mask(v),
            SculptMesh::Dynamic(mesh) => mesh.vertex(v).mask,
        }
    }

    pub fn set_mask(&mut self, v: u32, mask: f32) {
        match self {
            SculptMesh::Indexed(mesh) => mesh.masks_mut()[v as usize] = mask,
            SculptMesh::Grids(grids) => grids.set_mask(v, mask),
            SculptMesh::Dynamic(mesh) => mesh.vertex_mut(v).mask = mask,
        }
    }

    pub fn color(&self, v: u32) -> Vec4 {
        match self {
            SculptMesh::Indexed(mesh) => mesh.colors()[v as usize],
            SculptMesh::Grids(grids) => grids.color(v),
            SculptMesh::Dynamic(mesh) => mesh.vertex(v).color,
        }
    }

    pub fn set_color(&mut self, v: u32, color: Vec4) {
        match self {
            SculptMesh::Indexed(mesh) => mesh.colors_mut()[v as usize] = color,
            SculptMesh::Grids(grids) => grids.set_color(v, color),
            SculptMesh::Dynamic(mesh) => mesh.vertex_mut(v).color = color,
        }
    }

    pub fn visible(&self, v: u32) -> bool {
        match self {
            SculptMesh::Indexed(mesh) => !mesh.hidden()[v as usize],
            SculptMesh::Grids(grids) => !grids.hidden(v),
            SculptMesh::Dynamic(mesh) => !mesh.vertex(v).hidden,
        }
    }

    pub fn set_visible(&mut self, v: u32, visible: bool) {
        match self {
            SculptMesh::Indexed(mesh) => mesh.hidden_mut()[v as usize] = !visible,
            SculptMesh::Grids(grids) => grids.set_hidden(v, !visible),
            SculptMesh::Dynamic(mesh) => mesh.vertex_mut(v).hidden = !visible,
        }
    }

    /// Signed face-set id of a face
    pub fn face_set(&self, f: u32) -> i32 {
        match self {
            SculptMesh::Indexed(mesh) => mesh.face_sets()[f as usize],
            SculptMesh::Grids(grids) => grids.base().face_sets()[f as usize],
            SculptMesh::Dynamic(mesh) => mesh.face(f).face_set,
        }
    }

    pub fn set_face_set(&mut self, f: u32, face_set: i32) {
        match self {
            SculptMesh::Indexed(mesh) => mesh.face_sets_mut()[f as usize] = face_set,
            SculptMesh::Grids(grids) => grids.base_mut().face_sets_mut()[f as usize] = face_set,
            SculptMesh::Dynamic(mesh) => mesh.face_mut(f).face_set = face_set,
        }
    }

    /// Faces touching a vertex. A grid element reports the base face it lies in.
    pub fn vertex_faces(&self, v: u32) -> FaceList {
        match self {
            SculptMesh::Indexed(mesh) => mesh.vertex_faces(v).iter().copied().collect(),
            SculptMesh::Grids(grids) => std::iter::once(grids.face_of(v)).collect(),
            SculptMesh::Dynamic(mesh) => mesh.vertex_faces(v),
        }
    }

    /// Corner vertices of a face. Grids return nothing (base vertices are not elements).
    pub fn face_vertices(&self, f: u32) -> FaceList {
        match self {
            SculptMesh::Indexed(mesh) => mesh.face_vertices(f).iter().copied().collect(),
            SculptMesh::Grids(_) => FaceList::new(),
            SculptMesh::Dynamic(mesh) => mesh.face_vertices(f),
        }
    }

    /// Vertices whose face-set state depends on face `f`: its corners, or
    /// on grids every element of the face's grids
    pub fn face_elements(&self, f: u32) -> Vec<u32> {
        match self {
            SculptMesh::Grids(grids) => grids.face_elements(f),
            _ => self.face_vertices(f).to_vec(),
        }
    }

    /// Endpoints of an edge, `None` on grids
    pub fn edge_verts(&self, e: EdgeRef) -> Option<[VertexRef; 2]> {
        let kind = self.kind();
        let pair = match self {
            SculptMesh::Indexed(mesh) => Some(mesh.edges()[e.index as usize]),
            SculptMesh::Grids(_) => None,
            SculptMesh::Dynamic(mesh) => Some(mesh.edge_endpoints(e.index)),
        }?;
        Some([VertexRef::new(kind, pair[0]), VertexRef::new(kind, pair[1])])
    }

    /// The endpoint of `e` that is not `v`
    pub fn edge_other_vertex(&self, e: EdgeRef, v: VertexRef) -> Option<VertexRef> {
        let [a, b] = self.edge_verts(e)?;
        if a == v {
            Some(b)
        } else if b == v {
            Some(a)
        } else {
            None
        }
    }

    /// Append the real one-ring of `v` to `out`
    pub(crate) fn collect_neighbors(&self, v: u32, include_duplicates: bool, out: &mut NeighborIter) {
        match self {
            SculptMesh::Indexed(mesh) => mesh.collect_neighbors(v, out),
            SculptMesh::Grids(grids) => grids.collect_neighbors(v, include_duplicates, out),
            SculptMesh::Dynamic(mesh) => mesh.collect_neighbors(v, out),
        }
    }

    /// Recompute normals after `vertices` moved.
    ///
    /// Normals of the surrounding vertices read the moved positions too, so
    /// they are refreshed along with the moved ones.
    pub fn update_normals(&mut self, vertices: &[u32]) {
        let affected = self.normal_dependents(vertices);
        match self {
            SculptMesh::Indexed(mesh) => mesh.recalc_normals(&affected),
            SculptMesh::Grids(grids) => grids.recalc_normals(&affected),
            SculptMesh::Dynamic(mesh) => mesh.recalc_normals(&affected),
        }
    }

    /// `vertices` plus every vertex whose normal depends on their positions:
    /// the corners of their faces, or on grids the elements whose central
    /// differences reach them
    fn normal_dependents(&self, vertices: &[u32]) -> Vec<u32> {
        let mut out = vertices.to_vec();
        for &v in vertices {
            match self {
                SculptMesh::Grids(_) => {
                    let mut ring = NeighborIter::new(self.kind());
                    self.collect_neighbors(v, false, &mut ring);
                    out.extend(ring.indices());
                }
                _ => {
                    for f in self.vertex_faces(v) {
                        out.extend_from_slice(&self.face_vertices(f));
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Vertices iteration visits, one per distinct point
    pub fn unique_vertices(&self) -> Vec<u32> {
        (0..self.vertex_count() as u32)
            .filter(|&v| self.is_unique(v))
            .collect()
    }

    /// Triangles over unique vertex ids with the face each one came from,
    /// used for raycasts and area sampling
    pub fn triangles(&self) -> Vec<MeshTriangle> {
        match self {
            SculptMesh::Indexed(mesh) => {
                let mut tris = Vec::with_capacity(mesh.corner_verts().len());
                for f in 0..mesh.face_count() as u32 {
                    let verts = mesh.face_vertices(f);
                    for i in 1..verts.len() - 1 {
                        tris.push(MeshTriangle {
                            verts: [verts[0], verts[i], verts[i + 1]],
                            face: f,
                        });
                    }
                }
                tris
            }
            SculptMesh::Grids(grids) => {
                let gs = grids.key().grid_size;
                let per_grid = 2 * (gs - 1) * (gs - 1);
                let area = grids.key().grid_area as u32;
                grids
                    .triangles()
                    .into_iter()
                    .enumerate()
                    .map(|(i, verts)| MeshTriangle {
                        verts,
                        face: grids.face_of((i / per_grid) as u32 * area),
                    })
                    .collect()
            }
            SculptMesh::Dynamic(mesh) => mesh
                .triangles()
                .into_iter()
                .enumerate()
                .map(|(f, verts)| MeshTriangle {
                    verts,
                    face: f as u32,
                })
                .collect(),
        }
    }

    pub fn bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        for v in 0..self.vertex_count() as u32 {
            if self.is_unique(v) {
                bounds.include_point(self.co(v));
            }
        }
        bounds
    }

    pub fn as_dynamic(&self) -> Option<&DynamicMesh> {
        match self {
            SculptMesh::Dynamic(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_dynamic_mut(&mut self) -> Option<&mut DynamicMesh> {
        match self {
            SculptMesh::Dynamic(mesh) => Some(mesh),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;

    #[test]
    fn test_refs_round_trip_through_index() {
        let mesh = SculptMesh::Indexed(test_fixtures::unit_square());
        let v = mesh.index_to_vertex(2);
        assert_eq!(v.kind, RepresentationKind::IndexedMesh);
        assert_eq!(mesh.vertex_to_index(v), 2);
    }

    #[test]
    fn test_grid_edge_queries_are_neutral() {
        let mesh = SculptMesh::Grids(test_fixtures::quad_grids(3));
        assert_eq!(mesh.edge_count(), 0);
        assert!(mesh.edge_verts(mesh.edge_ref(0)).is_none());
    }

    #[test]
    fn test_edge_other_vertex() {
        let mesh = SculptMesh::Indexed(test_fixtures::unit_square());
        let e = mesh.edge_ref(0);
        let [a, b] = mesh.edge_verts(e).unwrap();
        assert_eq!(mesh.edge_other_vertex(e, a), Some(b));
        assert_eq!(mesh.edge_other_vertex(e, b), Some(a));
    }

    #[test]
    fn test_triangles_know_their_face() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(3));
        let tris = mesh.triangles();
        assert_eq!(tris.len(), 8);
        assert_eq!(tris[0].face, 0);
        assert_eq!(tris[7].face, 3);

        let grids = SculptMesh::Grids(test_fixtures::quad_grids(3));
        let tris = grids.triangles();
        // 16 grids, 2x2 cells, 2 triangles per cell
        assert_eq!(tris.len(), 16 * 8);
        assert!(tris.iter().all(|t| t.face < 4));
    }

    #[test]
    fn test_set_visible_all_kinds() {
        for mut mesh in [
            SculptMesh::Indexed(test_fixtures::unit_square()),
            SculptMesh::Grids(test_fixtures::quad_grids(3)),
            SculptMesh::Dynamic(test_fixtures::dynamic_plane(2)),
        ] {
            assert!(mesh.visible(0));
            mesh.set_visible(0, false);
            assert!(!mesh.visible(0));
        }
    }

    #[test]
    fn test_mask_and_color_all_kinds() {
        for mut mesh in [
            SculptMesh::Indexed(test_fixtures::unit_square()),
            SculptMesh::Grids(test_fixtures::quad_grids(3)),
            SculptMesh::Dynamic(test_fixtures::dynamic_plane(2)),
        ] {
            mesh.set_mask(1, 0.5);
            assert!((mesh.mask(1) - 0.5).abs() < 1e-6);
            mesh.set_color(1, Vec4::new(1.0, 0.0, 0.0, 1.0));
            assert_eq!(mesh.color(1), Vec4::new(1.0, 0.0, 0.0, 1.0));
        }
    }

    #[test]
    fn test_update_normals_refreshes_surrounding_vertices() {
        let grid_interior = {
            let grids = test_fixtures::quad_grids(3);
            grids.element(GridCoord { grid: 0, x: 1, y: 1 })
        };
        for (mut mesh, moved) in [
            (SculptMesh::Indexed(test_fixtures::grid_plane(3)), 4),
            (SculptMesh::Grids(test_fixtures::quad_grids(3)), grid_interior),
            (SculptMesh::Dynamic(test_fixtures::dynamic_plane(3)), 4),
        ] {
            mesh.set_co(moved, mesh.co(moved) + Vec3::Z);
            mesh.update_normals(&[moved]);

            let mut reference = mesh.clone();
            let all: Vec<u32> = (0..reference.vertex_count() as u32).collect();
            reference.update_normals(&all);

            let mut tilted = 0;
            for v in 0..mesh.vertex_count() as u32 {
                assert!((mesh.normal(v) - reference.normal(v)).length() < 1e-5, "vertex {v}");
                if v != moved && mesh.normal(v).z < 1.0 - 1e-4 {
                    tilted += 1;
                }
            }
            assert!(tilted > 0);
        }
    }
}
