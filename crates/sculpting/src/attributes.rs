//! Per-vertex cached state that persists across strokes.
//!
//! Flags live in atomics so lazily recomputed caches (boundary, corner,
//! valence) can be filled from shared references inside parallel loops.
//! The original-data snapshot is only written between parallel sections.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Vec3, Vec4};

use crate::mesh::SculptMesh;
use crate::types::BoundaryKind;
use crate::types::vertex_flags::{
    BOUNDARY_SHIFT, CORNER_SHIFT, INITIAL, NEED_BOUNDARY, NEED_VALENCE,
};

/// Vertex data captured before its first modification in a stroke
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrigData {
    pub co: Vec3,
    pub no: Vec3,
    pub mask: f32,
    pub color: Vec4,
}

impl Default for OrigData {
    fn default() -> Self {
        Self {
            co: Vec3::ZERO,
            no: Vec3::Z,
            mask: 0.0,
            color: Vec4::ONE,
        }
    }
}

/// Stamp meaning "never captured"
const NO_STROKE: u32 = 0;

/// Flags, valence and original-data snapshot for every vertex index
#[derive(Debug)]
pub struct VertexAttributes {
    flags: Vec<AtomicU32>,
    valence: Vec<AtomicU32>,
    orig: Vec<OrigData>,
    orig_stamp: Vec<u32>,
}

impl VertexAttributes {
    pub fn new(count: usize) -> Self {
        Self {
            flags: (0..count).map(|_| AtomicU32::new(INITIAL)).collect(),
            valence: (0..count).map(|_| AtomicU32::new(0)).collect(),
            orig: vec![OrigData::default(); count],
            orig_stamp: vec![NO_STROKE; count],
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Grow to `count` vertices, new slots start stale and uncaptured
    pub fn resize(&mut self, count: usize) {
        if count <= self.flags.len() {
            return;
        }
        let extra = count - self.flags.len();
        self.flags.extend((0..extra).map(|_| AtomicU32::new(INITIAL)));
        self.valence.extend((0..extra).map(|_| AtomicU32::new(0)));
        self.orig.resize(count, OrigData::default());
        self.orig_stamp.resize(count, NO_STROKE);
    }

    pub fn flags(&self, v: u32) -> u32 {
        self.flags[v as usize].load(Ordering::Relaxed)
    }

    fn set_bits(&self, v: u32, bits: u32) {
        self.flags[v as usize].fetch_or(bits, Ordering::Relaxed);
    }

    fn clear_bits(&self, v: u32, bits: u32) {
        self.flags[v as usize].fetch_and(!bits, Ordering::Relaxed);
    }

    /// Invalidate cached boundary/corner classification
    pub fn mark_need_boundary(&self, v: u32) {
        self.set_bits(v, NEED_BOUNDARY);
    }

    pub fn mark_need_valence(&self, v: u32) {
        self.set_bits(v, NEED_VALENCE);
    }

    /// Invalidate every cache of every vertex
    pub fn mark_all_stale(&self) {
        for flags in &self.flags {
            flags.fetch_or(INITIAL, Ordering::Relaxed);
        }
    }

    pub fn needs_boundary(&self, v: u32) -> bool {
        self.flags(v) & NEED_BOUNDARY != 0
    }

    /// Cached `(boundary, corner)` kinds, `None` when stale
    pub fn cached_boundary(&self, v: u32) -> Option<(BoundaryKind, BoundaryKind)> {
        let flags = self.flags(v);
        if flags & NEED_BOUNDARY != 0 {
            return None;
        }
        Some((
            BoundaryKind((flags >> BOUNDARY_SHIFT) as u8),
            BoundaryKind((flags >> CORNER_SHIFT) as u8),
        ))
    }

    pub fn store_boundary(&self, v: u32, boundary: BoundaryKind, corner: BoundaryKind) {
        let keep = self.flags(v) & NEED_VALENCE;
        let packed = keep
            | (u32::from(boundary.0) << BOUNDARY_SHIFT)
            | (u32::from(corner.0) << CORNER_SHIFT);
        self.flags[v as usize].store(packed, Ordering::Relaxed);
    }

    /// Cached valence, `None` when stale
    pub fn cached_valence(&self, v: u32) -> Option<u32> {
        if self.flags(v) & NEED_VALENCE != 0 {
            None
        } else {
            Some(self.valence[v as usize].load(Ordering::Relaxed))
        }
    }

    pub fn store_valence(&self, v: u32, valence: u32) {
        self.valence[v as usize].store(valence, Ordering::Relaxed);
        self.clear_bits(v, NEED_VALENCE);
    }

    /// Capture the vertex's data unless it was already captured this stroke.
    ///
    /// Returns whether a snapshot was taken.
    pub fn check_origdata(&mut self, mesh: &SculptMesh, v: u32, stroke_id: u32) -> bool {
        let slot = v as usize;
        if self.orig_stamp[slot] == stroke_id {
            return false;
        }
        self.orig[slot] = OrigData {
            co: mesh.co(v),
            no: mesh.normal(v),
            mask: mesh.mask(v),
            color: mesh.color(v),
        };
        self.orig_stamp[slot] = stroke_id;
        true
    }

    /// Snapshot, falling back to the live data for uncaptured vertices
    pub fn orig(&self, mesh: &SculptMesh, v: u32, stroke_id: u32) -> OrigData {
        if self.orig_stamp[v as usize] == stroke_id {
            self.orig[v as usize]
        } else {
            OrigData {
                co: mesh.co(v),
                no: mesh.normal(v),
                mask: mesh.mask(v),
                color: mesh.color(v),
            }
        }
    }

    pub fn is_captured(&self, v: u32, stroke_id: u32) -> bool {
        self.orig_stamp[v as usize] == stroke_id
    }

    /// Vertices captured during `stroke_id`
    pub fn captured(&self, stroke_id: u32) -> impl Iterator<Item = (u32, &OrigData)> + '_ {
        self.orig_stamp
            .iter()
            .zip(&self.orig)
            .enumerate()
            .filter(move |(_, (stamp, _))| **stamp == stroke_id)
            .map(|(v, (_, data))| (v as u32, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;

    #[test]
    fn test_new_vertices_start_stale() {
        let attrs = VertexAttributes::new(3);
        assert!(attrs.needs_boundary(0));
        assert!(attrs.cached_boundary(0).is_none());
        assert!(attrs.cached_valence(2).is_none());
    }

    #[test]
    fn test_boundary_cache_round_trip() {
        let attrs = VertexAttributes::new(2);
        attrs.store_boundary(1, BoundaryKind::MESH | BoundaryKind::SEAM, BoundaryKind::MESH);
        let (boundary, corner) = attrs.cached_boundary(1).unwrap();
        assert!(boundary.contains(BoundaryKind::SEAM));
        assert_eq!(corner, BoundaryKind::MESH);
        // Valence stays stale until stored
        assert!(attrs.cached_valence(1).is_none());
        attrs.mark_need_boundary(1);
        assert!(attrs.cached_boundary(1).is_none());
    }

    #[test]
    fn test_valence_cache_survives_boundary_store() {
        let attrs = VertexAttributes::new(1);
        attrs.store_valence(0, 6);
        attrs.store_boundary(0, BoundaryKind::NONE, BoundaryKind::NONE);
        assert_eq!(attrs.cached_valence(0), Some(6));
        attrs.mark_need_valence(0);
        assert_eq!(attrs.cached_valence(0), None);
    }

    #[test]
    fn test_origdata_captured_once_per_stroke() {
        let mut mesh = SculptMesh::Indexed(test_fixtures::unit_square());
        let mut attrs = VertexAttributes::new(mesh.vertex_count());
        let before = mesh.co(0);
        assert!(attrs.check_origdata(&mesh, 0, 1));
        mesh.set_co(0, Vec3::new(5.0, 5.0, 5.0));
        assert!(!attrs.check_origdata(&mesh, 0, 1));
        assert_eq!(attrs.orig(&mesh, 0, 1).co, before);
        // A new stroke recaptures
        assert!(attrs.check_origdata(&mesh, 0, 2));
        assert_eq!(attrs.orig(&mesh, 0, 2).co, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(attrs.captured(2).count(), 1);
    }

    #[test]
    fn test_resize_keeps_existing() {
        let mut attrs = VertexAttributes::new(1);
        attrs.store_valence(0, 3);
        attrs.resize(4);
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs.cached_valence(0), Some(3));
        assert!(attrs.needs_boundary(3));
    }
}
