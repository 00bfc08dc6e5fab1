//! Face-set queries and mutators.
//!
//! A face set is a signed id per face: the magnitude names the set and the
//! sign carries visibility (positive visible, negative hidden). Every
//! mutator here keeps `abs(face_set)` intact when it only toggles
//! visibility, and never hands out 0 as an in-use id.
//!
//! Grid elements answer per-face queries with the base face that owns their
//! grid. Uniqueness on grids follows the coarse base-mesh adjacency the
//! element overlays.

use crate::mesh::{CoarseAdjacency, IndexedMesh, SculptMesh};

/// Id reported when there is no face set
pub const FACE_SET_NONE: i32 = 0;

/// Face set of the face under the cursor, or [`FACE_SET_NONE`]
pub fn active_face_set(mesh: &SculptMesh, active_face: Option<u32>) -> i32 {
    match active_face {
        Some(f) if (f as usize) < mesh.face_count() => mesh.face_set(f),
        _ => FACE_SET_NONE,
    }
}

/// One past the largest face-set id in use
pub fn face_set_next_available(mesh: &SculptMesh) -> i32 {
    let max = (0..mesh.face_count() as u32)
        .map(|f| mesh.face_set(f).abs())
        .max()
        .unwrap_or(0);
    max + 1
}

fn with_visibility(face_set: i32, visible: bool) -> i32 {
    if visible {
        face_set.abs()
    } else {
        -face_set.abs()
    }
}

/// Show or hide every face of one set; returns whether anything changed
pub fn face_set_visibility_set(mesh: &mut SculptMesh, face_set: i32, visible: bool) -> bool {
    let target = face_set.abs();
    let mut changed = false;
    for f in 0..mesh.face_count() as u32 {
        let current = mesh.face_set(f);
        if current.abs() == target {
            let next = with_visibility(current, visible);
            if next != current {
                mesh.set_face_set(f, next);
                changed = true;
            }
        }
    }
    changed
}

/// Swap visible and hidden sets
pub fn face_sets_visibility_invert(mesh: &mut SculptMesh) {
    for f in 0..mesh.face_count() as u32 {
        let current = mesh.face_set(f);
        mesh.set_face_set(f, -current);
    }
}

/// Show or hide every face; faces without a set are moved to set 1 first
pub fn face_sets_visibility_all_set(mesh: &mut SculptMesh, visible: bool) {
    for f in 0..mesh.face_count() as u32 {
        let mut current = mesh.face_set(f);
        if current == FACE_SET_NONE {
            current = 1;
        }
        mesh.set_face_set(f, with_visibility(current, visible));
    }
}

pub fn vertex_any_face_set_visible(mesh: &SculptMesh, v: u32) -> bool {
    mesh.vertex_faces(v).iter().any(|&f| mesh.face_set(f) > 0)
}

pub fn vertex_all_face_sets_visible(mesh: &SculptMesh, v: u32) -> bool {
    mesh.vertex_faces(v).iter().all(|&f| mesh.face_set(f) > 0)
}

/// Assign `face_set` to every visible face around the vertex
pub fn vertex_face_set_set(mesh: &mut SculptMesh, v: u32, face_set: i32) {
    for f in mesh.vertex_faces(v) {
        if mesh.face_set(f) > 0 {
            mesh.set_face_set(f, face_set.abs());
        }
    }
}

/// Shift the id of every visible face around the vertex
pub fn vertex_face_set_increase(mesh: &mut SculptMesh, v: u32, increase: i32) {
    for f in mesh.vertex_faces(v) {
        let current = mesh.face_set(f);
        if current > 0 {
            mesh.set_face_set(f, current + increase);
        }
    }
}

/// Largest visible face set around the vertex, [`FACE_SET_NONE`] if all are hidden
pub fn vertex_face_set_get(mesh: &SculptMesh, v: u32) -> i32 {
    let mut face_set = FACE_SET_NONE;
    for f in mesh.vertex_faces(v) {
        let current = mesh.face_set(f);
        if current > face_set {
            face_set = current.abs();
        }
    }
    face_set
}

pub fn vertex_has_face_set(mesh: &SculptMesh, v: u32, face_set: i32) -> bool {
    mesh.vertex_faces(v)
        .iter()
        .any(|&f| mesh.face_set(f) == face_set)
}

/// Whether every face around the vertex carries the same signed face set
pub fn vertex_has_unique_face_set(mesh: &SculptMesh, v: u32) -> bool {
    match mesh {
        SculptMesh::Grids(grids) => match grids.coarse_adjacency(v) {
            CoarseAdjacency::None => true,
            CoarseAdjacency::Vertex(base_v) => unique_face_set_in_base(grids.base(), base_v),
            CoarseAdjacency::Edge(a, b) => unique_face_set_for_base_edge(grids.base(), a, b),
        },
        _ => {
            let faces = mesh.vertex_faces(v);
            let mut iter = faces.iter().map(|&f| mesh.face_set(f));
            match iter.next() {
                Some(first) => iter.all(|fs| fs == first),
                None => true,
            }
        }
    }
}

fn unique_face_set_in_base(base: &IndexedMesh, v: u32) -> bool {
    let faces = base.vertex_faces(v);
    let sets = base.face_sets();
    faces
        .first()
        .is_none_or(|&first| faces.iter().all(|&f| sets[f as usize] == sets[first as usize]))
}

/// Whether the two faces sharing base edge `(a, b)` are in the same set.
///
/// Both sides are compared by magnitude, so hiding one side of an edge does
/// not turn it into a face-set boundary.
fn unique_face_set_for_base_edge(base: &IndexedMesh, a: u32, b: u32) -> bool {
    let sets = base.face_sets();
    let mut on_edge = base
        .vertex_faces(a)
        .iter()
        .filter(|&&f| base.face_vertices(f).contains(&b));
    match (on_edge.next(), on_edge.next()) {
        (Some(&p1), Some(&p2)) => sets[p1 as usize].abs() == sets[p2 as usize].abs(),
        _ => true,
    }
}

/// Derive vertex visibility from face sets: a vertex is hidden when every
/// face around it is hidden
pub fn sync_face_sets_to_vertices(mesh: &mut SculptMesh) {
    match mesh {
        SculptMesh::Grids(grids) => {
            let count = grids.element_count() as u32;
            for e in 0..count {
                if !grids.is_canonical(e) {
                    continue;
                }
                let visible = grids
                    .coincident(e)
                    .iter()
                    .any(|&m| grids.base().face_sets()[grids.face_of(m) as usize] > 0);
                grids.set_hidden(e, !visible);
            }
        }
        _ => {
            for v in 0..mesh.vertex_count() as u32 {
                if mesh.vertex_faces(v).is_empty() {
                    continue;
                }
                let visible = vertex_any_face_set_visible(mesh, v);
                mesh.set_visible(v, visible);
            }
        }
    }
}

/// Derive face-set visibility from vertices: a face is hidden when any of
/// its vertices is hidden
pub fn sync_vertices_to_face_sets(mesh: &mut SculptMesh) {
    let mut hidden = vec![false; mesh.face_count()];
    match mesh {
        SculptMesh::Grids(grids) => {
            for e in 0..grids.element_count() as u32 {
                if grids.hidden(e) {
                    hidden[grids.face_of(e) as usize] = true;
                }
            }
        }
        _ => {
            for (f, slot) in hidden.iter_mut().enumerate() {
                *slot = mesh
                    .face_vertices(f as u32)
                    .iter()
                    .any(|&v| !mesh.visible(v));
            }
        }
    }
    for (f, hide) in hidden.into_iter().enumerate() {
        let current = mesh.face_set(f as u32);
        mesh.set_face_set(f as u32, with_visibility(current, !hide));
    }
}
