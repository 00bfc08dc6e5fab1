//! Per-vertex one-ring iteration.
//!
//! Results live in a [`SmallVec`] that only spills to the heap for vertices
//! with unusually high valence. Real neighbors are deduplicated by vertex;
//! grid duplicates (when requested) and the synthetic fake neighbor are
//! appended after them and never deduplicated.

use smallvec::SmallVec;

use crate::islands::FakeNeighbors;
use crate::mesh::{EdgeRef, RepresentationKind, SculptMesh, VertexRef};

/// Inline capacity before the neighbor list moves to the heap
pub const NEIGHBOR_INLINE_CAPACITY: usize = 12;

/// How a neighbor entry relates to the queried vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborKind {
    /// Connected by a real edge (or grid adjacency)
    Real,
    /// Another grid element at the same limit-surface point
    Duplicate,
    /// Synthetic bridge to the nearest vertex of another island
    Fake,
}

/// One entry of a one-ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub vertex: VertexRef,
    /// Connecting edge, `None` for grids and fake neighbors
    pub edge: Option<EdgeRef>,
    pub kind: NeighborKind,
}

impl Neighbor {
    pub fn index(&self) -> u32 {
        self.vertex.index
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind == NeighborKind::Duplicate
    }
}

/// Ordered neighbor set of one vertex
#[derive(Debug, Clone)]
pub struct NeighborIter {
    kind: RepresentationKind,
    items: SmallVec<[Neighbor; NEIGHBOR_INLINE_CAPACITY]>,
    num_real: usize,
}

impl NeighborIter {
    pub fn new(kind: RepresentationKind) -> Self {
        Self {
            kind,
            items: SmallVec::new(),
            num_real: 0,
        }
    }

    /// Add a real neighbor unless it is already present
    pub(crate) fn push_real(&mut self, vertex: u32, edge: Option<u32>) {
        debug_assert_eq!(self.num_real, self.items.len());
        if self.items.iter().any(|n| n.vertex.index == vertex) {
            return;
        }
        self.items.push(Neighbor {
            vertex: VertexRef::new(self.kind, vertex),
            edge: edge.map(|e| EdgeRef::new(self.kind, e)),
            kind: NeighborKind::Real,
        });
        self.num_real += 1;
    }

    pub(crate) fn push_duplicate(&mut self, vertex: u32) {
        self.items.push(Neighbor {
            vertex: VertexRef::new(self.kind, vertex),
            edge: None,
            kind: NeighborKind::Duplicate,
        });
    }

    pub(crate) fn push_fake(&mut self, vertex: u32) {
        self.items.push(Neighbor {
            vertex: VertexRef::new(self.kind, vertex),
            edge: None,
            kind: NeighborKind::Fake,
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Neighbor> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Neighbor] {
        &self.items
    }

    /// Real neighbors only, in representation order
    pub fn real(&self) -> &[Neighbor] {
        &self.items[..self.num_real]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the list outgrew its inline storage
    pub fn spilled(&self) -> bool {
        self.items.spilled()
    }

    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.items.iter().map(|n| n.vertex.index)
    }
}

impl<'a> IntoIterator for &'a NeighborIter {
    type Item = &'a Neighbor;
    type IntoIter = std::slice::Iter<'a, Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// One-ring of `vertex`, plus its fake neighbor when bridging is enabled
pub fn vertex_neighbors(
    mesh: &SculptMesh,
    fake: Option<&FakeNeighbors>,
    vertex: VertexRef,
    include_duplicates: bool,
) -> NeighborIter {
    let v = mesh.vertex_to_index(vertex);
    let mut iter = NeighborIter::new(mesh.kind());
    mesh.collect_neighbors(v, include_duplicates, &mut iter);
    if let Some(other) = fake.and_then(|fake| fake.get(v)) {
        iter.push_fake(other);
    }
    iter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::SculptMesh;
    use crate::test_fixtures;

    fn assert_no_duplicates(mesh: &SculptMesh) {
        for v in 0..mesh.vertex_count() as u32 {
            if !mesh.is_unique(v) {
                continue;
            }
            let iter = vertex_neighbors(mesh, None, mesh.index_to_vertex(v), false);
            let indices: Vec<u32> = iter.indices().collect();
            for (i, a) in indices.iter().enumerate() {
                assert!(!indices[i + 1..].contains(a), "vertex {} lists {} twice", v, a);
                assert_ne!(*a, v);
            }
            for n in iter.real() {
                if let Some(edge) = n.edge {
                    let ends = mesh.edge_verts(edge).unwrap();
                    assert!(ends.contains(&mesh.index_to_vertex(v)));
                    assert!(ends.contains(&n.vertex));
                }
            }
        }
    }

    #[test]
    fn test_no_duplicates_indexed() {
        assert_no_duplicates(&SculptMesh::Indexed(test_fixtures::grid_plane(4)));
        assert_no_duplicates(&SculptMesh::Indexed(
            test_fixtures::grid_plane(4).with_vertex_edge_map(),
        ));
    }

    #[test]
    fn test_no_duplicates_grids() {
        assert_no_duplicates(&SculptMesh::Grids(test_fixtures::quad_grids(4)));
    }

    #[test]
    fn test_no_duplicates_dynamic() {
        assert_no_duplicates(&SculptMesh::Dynamic(test_fixtures::dynamic_plane(4)));
    }

    #[test]
    fn test_vemap_and_face_paths_agree_on_set() {
        let plain = SculptMesh::Indexed(test_fixtures::grid_plane(4));
        let vemap = SculptMesh::Indexed(test_fixtures::grid_plane(4).with_vertex_edge_map());
        for v in 0..plain.vertex_count() as u32 {
            let mut a: Vec<u32> = vertex_neighbors(&plain, None, plain.index_to_vertex(v), false)
                .indices()
                .collect();
            let mut b: Vec<u32> = vertex_neighbors(&vemap, None, vemap.index_to_vertex(v), false)
                .indices()
                .collect();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_fake_neighbor_is_appended_last() {
        let mesh = SculptMesh::Indexed(test_fixtures::two_islands(0.1));
        let mut fake = FakeNeighbors::new(mesh.vertex_count());
        fake.link(1, 4);
        let iter = vertex_neighbors(&mesh, Some(&fake), mesh.index_to_vertex(1), false);
        let last = iter.as_slice().last().unwrap();
        assert_eq!(last.kind, NeighborKind::Fake);
        assert_eq!(last.index(), 4);
        assert!(last.edge.is_none());
        assert_eq!(iter.real().len(), iter.len() - 1);
    }

    #[test]
    fn test_high_valence_spills() {
        let mut iter = NeighborIter::new(RepresentationKind::IndexedMesh);
        for v in 0..(NEIGHBOR_INLINE_CAPACITY as u32 + 4) {
            iter.push_real(v, None);
        }
        iter.push_real(0, None);
        assert!(iter.spilled());
        assert_eq!(iter.len(), NEIGHBOR_INLINE_CAPACITY + 4);
    }
}
