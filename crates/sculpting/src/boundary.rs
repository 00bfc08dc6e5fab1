//! Boundary and corner classification, and valence.
//!
//! Results are cached per vertex in [`VertexAttributes`] and recomputed only
//! when the vertex is flagged stale. Indexed and dynamic meshes classify
//! from the faces and edges around the vertex; grid elements classify from
//! the base-mesh element they overlay.

use smallvec::SmallVec;

use crate::attributes::VertexAttributes;
use crate::face_sets;
use crate::mesh::indexed::EdgeFlags;
use crate::mesh::{CoarseAdjacency, EdgeRef, IndexedMesh, SculptMesh};
use crate::neighbors::NeighborIter;
use crate::types::BoundaryKind;

/// Per-kind counts of the marked edges around one vertex
#[derive(Debug, Default)]
struct EdgeTally {
    open: u32,
    seam: u32,
    sharp: u32,
}

impl EdgeTally {
    fn add(&mut self, face_count: u32, flags: EdgeFlags) {
        if face_count < 2 {
            self.open += 1;
        }
        if flags.seam {
            self.seam += 1;
        }
        if flags.sharp {
            self.sharp += 1;
        }
    }

    /// Boundary where any marked edge touches the vertex, corner where the
    /// marked edges do not continue straight through it
    fn classify(&self) -> (BoundaryKind, BoundaryKind) {
        let mut boundary = BoundaryKind::NONE;
        let mut corner = BoundaryKind::NONE;
        for (count, kind) in [
            (self.open, BoundaryKind::MESH),
            (self.seam, BoundaryKind::SEAM),
            (self.sharp, BoundaryKind::SHARP),
        ] {
            if count > 0 {
                boundary |= kind;
            }
            if count > 2 {
                corner |= kind;
            }
        }
        (boundary, corner)
    }
}

fn distinct_face_sets(sets: impl Iterator<Item = i32>) -> usize {
    let mut seen: SmallVec<[i32; 8]> = SmallVec::new();
    for fs in sets {
        let fs = fs.abs();
        if !seen.contains(&fs) {
            seen.push(fs);
        }
    }
    seen.len()
}

fn face_set_kinds(distinct: usize, on_mesh_boundary: bool) -> (BoundaryKind, BoundaryKind) {
    let boundary = if distinct > 1 {
        BoundaryKind::FACE_SET
    } else {
        BoundaryKind::NONE
    };
    let corner = if distinct > 2 || (distinct > 1 && on_mesh_boundary) {
        BoundaryKind::FACE_SET
    } else {
        BoundaryKind::NONE
    };
    (boundary, corner)
}

fn classify_indexed(mesh: &IndexedMesh, v: u32) -> (BoundaryKind, BoundaryKind) {
    let mut tally = EdgeTally::default();
    let mut neighbors = NeighborIter::new(crate::mesh::RepresentationKind::IndexedMesh);
    mesh.collect_neighbors(v, &mut neighbors);
    for n in neighbors.real() {
        if let Some(e) = n.edge {
            tally.add(mesh.edge_face_count(e.index), mesh.edge_flags(e.index));
        }
    }
    // A vertex in a single face is a corner even with only two open edges
    let (mut boundary, mut corner) = tally.classify();
    if tally.open > 0 && mesh.vertex_faces(v).len() == 1 {
        corner |= BoundaryKind::MESH;
    }

    let sets = mesh
        .vertex_faces(v)
        .iter()
        .map(|&f| mesh.face_sets()[f as usize]);
    let (fs_boundary, fs_corner) = face_set_kinds(distinct_face_sets(sets), tally.open > 0);
    boundary |= fs_boundary;
    corner |= fs_corner;

    if let Some(uvs) = mesh.corner_uvs() {
        let mut seen: SmallVec<[glam::Vec2; 8]> = SmallVec::new();
        for &f in mesh.vertex_faces(v) {
            if let Some(c) = mesh.corner_of(f, v) {
                let uv = uvs[c];
                if !seen.iter().any(|s| (*s - uv).length_squared() < 1e-10) {
                    seen.push(uv);
                }
            }
        }
        if seen.len() > 1 {
            boundary |= BoundaryKind::UV;
        }
        if seen.len() > 2 {
            corner |= BoundaryKind::UV;
        }
    }
    (boundary, corner)
}

fn classify_dynamic(mesh: &crate::mesh::DynamicMesh, v: u32) -> (BoundaryKind, BoundaryKind) {
    let mut tally = EdgeTally::default();
    for (_, he) in mesh.vertex_neighbor_edges(v) {
        tally.add(mesh.edge_face_count(he), mesh.edge_flags(he));
    }
    let (mut boundary, mut corner) = tally.classify();
    let faces = mesh.vertex_faces(v);
    if tally.open > 0 && faces.len() == 1 {
        corner |= BoundaryKind::MESH;
    }
    let sets = faces.iter().map(|&f| mesh.face(f).face_set);
    let (fs_boundary, fs_corner) = face_set_kinds(distinct_face_sets(sets), tally.open > 0);
    (boundary | fs_boundary, corner | fs_corner)
}

fn classify_base_edge(base: &IndexedMesh, a: u32, b: u32) -> BoundaryKind {
    let Some(e) = base.find_edge(a, b) else {
        return BoundaryKind::NONE;
    };
    let mut kind = BoundaryKind::NONE;
    if base.edge_face_count(e) < 2 {
        kind |= BoundaryKind::MESH;
    }
    let flags = base.edge_flags(e);
    if flags.seam {
        kind |= BoundaryKind::SEAM;
    }
    if flags.sharp {
        kind |= BoundaryKind::SHARP;
    }
    kind
}

/// Compute `(boundary, corner)` kinds without touching the cache
pub fn compute_boundary(mesh: &SculptMesh, v: u32) -> (BoundaryKind, BoundaryKind) {
    match mesh {
        SculptMesh::Indexed(indexed) => classify_indexed(indexed, v),
        SculptMesh::Dynamic(dynamic) => classify_dynamic(dynamic, v),
        SculptMesh::Grids(grids) => {
            let mut boundary = match grids.coarse_adjacency(v) {
                CoarseAdjacency::None => return (BoundaryKind::NONE, BoundaryKind::NONE),
                CoarseAdjacency::Vertex(base_v) => {
                    let (boundary, corner) = classify_indexed(grids.base(), base_v);
                    return (boundary, corner);
                }
                CoarseAdjacency::Edge(a, b) => classify_base_edge(grids.base(), a, b),
            };
            if !face_sets::vertex_has_unique_face_set(mesh, v) {
                boundary |= BoundaryKind::FACE_SET;
            }
            (boundary, BoundaryKind::NONE)
        }
    }
}

fn ensure(mesh: &SculptMesh, attrs: &VertexAttributes, v: u32) -> (BoundaryKind, BoundaryKind) {
    if let Some(cached) = attrs.cached_boundary(v) {
        return cached;
    }
    let (boundary, corner) = compute_boundary(mesh, v);
    attrs.store_boundary(v, boundary, corner);
    (boundary, corner)
}

/// Whether the vertex lies on a boundary of any of `kinds`
pub fn vertex_is_boundary(
    mesh: &SculptMesh,
    attrs: &VertexAttributes,
    v: u32,
    kinds: BoundaryKind,
) -> bool {
    ensure(mesh, attrs, v).0.intersects(kinds)
}

/// Corner kinds of the vertex, restricted to `kinds`
pub fn vertex_is_corner(
    mesh: &SculptMesh,
    attrs: &VertexAttributes,
    v: u32,
    kinds: BoundaryKind,
) -> BoundaryKind {
    ensure(mesh, attrs, v).1 & kinds
}

/// Whether an edge lies on a boundary of any of `kinds`.
///
/// Grids have no edges and always answer false.
pub fn edge_is_boundary(mesh: &SculptMesh, e: EdgeRef, kinds: BoundaryKind) -> bool {
    let kind = match mesh {
        SculptMesh::Grids(_) => return false,
        SculptMesh::Indexed(indexed) => {
            let mut kind = BoundaryKind::NONE;
            if indexed.edge_face_count(e.index) < 2 {
                kind |= BoundaryKind::MESH;
            }
            let flags = indexed.edge_flags(e.index);
            if flags.seam {
                kind |= BoundaryKind::SEAM;
            }
            if flags.sharp {
                kind |= BoundaryKind::SHARP;
            }
            let [a, b] = indexed.edges()[e.index as usize];
            let faces: SmallVec<[u32; 2]> = indexed
                .vertex_faces(a)
                .iter()
                .copied()
                .filter(|&f| indexed.face_vertices(f).contains(&b))
                .collect();
            if distinct_face_sets(faces.iter().map(|&f| indexed.face_sets()[f as usize])) > 1 {
                kind |= BoundaryKind::FACE_SET;
            }
            kind
        }
        SculptMesh::Dynamic(dynamic) => {
            let he = crate::mesh::dynamic::HalfEdgeId(e.index);
            let half_edge = dynamic.half_edge(he);
            let mut kind = BoundaryKind::NONE;
            match half_edge.twin {
                None => kind |= BoundaryKind::MESH,
                Some(twin) => {
                    let a = dynamic.face(half_edge.face.0).face_set.abs();
                    let b = dynamic.face(dynamic.half_edge(twin).face.0).face_set.abs();
                    if a != b {
                        kind |= BoundaryKind::FACE_SET;
                    }
                }
            }
            if half_edge.flags.seam {
                kind |= BoundaryKind::SEAM;
            }
            if half_edge.flags.sharp {
                kind |= BoundaryKind::SHARP;
            }
            kind
        }
    };
    kind.intersects(kinds)
}

/// Real neighbor count, cached
pub fn valence(mesh: &SculptMesh, attrs: &VertexAttributes, v: u32) -> u32 {
    if let Some(valence) = attrs.cached_valence(v) {
        return valence;
    }
    let mut iter = NeighborIter::new(mesh.kind());
    mesh.collect_neighbors(v, false, &mut iter);
    let valence = iter.real().len() as u32;
    attrs.store_valence(v, valence);
    valence
}

/// Invalidate the boundary cache of `v`, and of its neighbors when face-set
/// boundaries moved
pub fn mark_need_boundary(
    mesh: &SculptMesh,
    attrs: &VertexAttributes,
    v: u32,
    include_neighbors: bool,
) {
    attrs.mark_need_boundary(v);
    if include_neighbors {
        let mut iter = NeighborIter::new(mesh.kind());
        mesh.collect_neighbors(v, true, &mut iter);
        for n in &iter {
            attrs.mark_need_boundary(n.index());
        }
    }
}
