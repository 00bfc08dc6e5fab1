//! Undo records pushed before a node's data is first written in a stroke.
//!
//! The engine only produces records. Storage, grouping and redo belong to
//! the [`UndoLog`] implementation; [`MemoryUndoLog`] is the in-process one.

use glam::{Vec3, Vec4};
use tracing::debug;

use crate::mesh::SculptMesh;
use crate::spatial::{NodeId, SpatialIndex};
use crate::types::UndoDataKind;

/// Pre-modification snapshot of one node's data of one kind
#[derive(Debug, Clone, PartialEq)]
pub struct UndoNode {
    pub stroke_id: u32,
    /// `None` for whole-mesh geometry records
    pub node: Option<NodeId>,
    pub kind: UndoDataKind,
    pub vertices: Vec<u32>,
    pub coords: Vec<Vec3>,
    pub masks: Vec<f32>,
    pub colors: Vec<Vec4>,
    /// `(face, signed face set)` pairs
    pub face_sets: Vec<(u32, i32)>,
    /// Vertex count at capture time
    pub vertex_count: usize,
}

impl UndoNode {
    /// Snapshot the data of `kind` owned by `node`
    pub fn capture<S: SpatialIndex + ?Sized>(
        mesh: &SculptMesh,
        spatial: &S,
        node: NodeId,
        kind: UndoDataKind,
        stroke_id: u32,
    ) -> Self {
        let vertices = spatial.node_vertices(node).to_vec();
        let mut record = Self {
            stroke_id,
            node: Some(node),
            kind,
            vertices: Vec::new(),
            coords: Vec::new(),
            masks: Vec::new(),
            colors: Vec::new(),
            face_sets: Vec::new(),
            vertex_count: mesh.vertex_count(),
        };
        match kind {
            UndoDataKind::Coords => {
                record.coords = vertices.iter().map(|&v| mesh.co(v)).collect();
            }
            UndoDataKind::Mask => {
                record.masks = vertices.iter().map(|&v| mesh.mask(v)).collect();
            }
            UndoDataKind::Color => {
                record.colors = vertices.iter().map(|&v| mesh.color(v)).collect();
            }
            UndoDataKind::FaceSets => {
                let mut faces: Vec<u32> = spatial
                    .node_triangles(node)
                    .iter()
                    .map(|tri| tri.face)
                    .collect();
                faces.sort_unstable();
                faces.dedup();
                record.face_sets = faces.into_iter().map(|f| (f, mesh.face_set(f))).collect();
            }
            UndoDataKind::Geometry => {}
        }
        record.vertices = vertices;
        record
    }

    /// Marker for a topology change; the log owns the actual geometry copy
    pub fn geometry(mesh: &SculptMesh, stroke_id: u32) -> Self {
        Self {
            stroke_id,
            node: None,
            kind: UndoDataKind::Geometry,
            vertices: Vec::new(),
            coords: Vec::new(),
            masks: Vec::new(),
            colors: Vec::new(),
            face_sets: Vec::new(),
            vertex_count: mesh.vertex_count(),
        }
    }
}

/// Receiver of undo records
pub trait UndoLog: Send {
    fn begin_stroke(&mut self, _stroke_id: u32) {}

    /// Called before the first write of `record.kind` to `record.node` in a stroke
    fn push_node(&mut self, record: UndoNode);

    fn end_stroke(&mut self, _stroke_id: u32) {}
}

/// Undo log that keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryUndoLog {
    records: Vec<UndoNode>,
    open_stroke: Option<u32>,
    closed: Vec<u32>,
}

impl MemoryUndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[UndoNode] {
        &self.records
    }

    pub fn records_for(&self, stroke_id: u32) -> impl Iterator<Item = &UndoNode> + '_ {
        self.records.iter().filter(move |r| r.stroke_id == stroke_id)
    }

    /// Strokes that have been closed, oldest first
    pub fn closed_strokes(&self) -> &[u32] {
        &self.closed
    }

    pub fn open_stroke(&self) -> Option<u32> {
        self.open_stroke
    }

    /// Write the stroke's snapshots back into the mesh.
    ///
    /// Records are replayed newest first so the oldest snapshot of a
    /// vertex wins. Geometry records are skipped; vertices that no longer
    /// exist are ignored. Returns the number of records applied.
    pub fn restore(&self, mesh: &mut SculptMesh, stroke_id: u32) -> usize {
        let count = mesh.vertex_count() as u32;
        let faces = mesh.face_count() as u32;
        let mut applied = 0;
        for record in self.records.iter().rev().filter(|r| r.stroke_id == stroke_id) {
            match record.kind {
                UndoDataKind::Coords => {
                    for (&v, &co) in record.vertices.iter().zip(&record.coords) {
                        if v < count {
                            mesh.set_co(v, co);
                        }
                    }
                }
                UndoDataKind::Mask => {
                    for (&v, &mask) in record.vertices.iter().zip(&record.masks) {
                        if v < count {
                            mesh.set_mask(v, mask);
                        }
                    }
                }
                UndoDataKind::Color => {
                    for (&v, &color) in record.vertices.iter().zip(&record.colors) {
                        if v < count {
                            mesh.set_color(v, color);
                        }
                    }
                }
                UndoDataKind::FaceSets => {
                    for &(f, face_set) in &record.face_sets {
                        if f < faces {
                            mesh.set_face_set(f, face_set);
                        }
                    }
                }
                UndoDataKind::Geometry => continue,
            }
            applied += 1;
        }
        if applied > 0 {
            let all: Vec<u32> = (0..count).collect();
            mesh.update_normals(&all);
        }
        debug!("MemoryUndoLog: restored {} records of stroke {}", applied, stroke_id);
        applied
    }
}

impl UndoLog for MemoryUndoLog {
    fn begin_stroke(&mut self, stroke_id: u32) {
        self.open_stroke = Some(stroke_id);
    }

    fn push_node(&mut self, record: UndoNode) {
        self.records.push(record);
    }

    fn end_stroke(&mut self, stroke_id: u32) {
        if self.open_stroke == Some(stroke_id) {
            self.open_stroke = None;
        }
        self.closed.push(stroke_id);
    }
}
