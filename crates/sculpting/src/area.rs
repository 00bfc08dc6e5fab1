//! Weighted surface normal and center under the brush.
//!
//! Samples are binned by whether they face the viewer so a brush on a thin
//! shell does not average the two sides into nothing. The front bin wins
//! whenever it has samples.

use glam::Vec3;
use rayon::prelude::*;

use crate::attributes::VertexAttributes;
use crate::brush_test::BrushTest;
use crate::mesh::SculptMesh;
use crate::spatial::{NodeId, SpatialIndex, closest_point_on_triangle};
use crate::types::FalloffShape;

/// Inputs of one area estimate
#[derive(Debug, Clone, Copy)]
pub struct AreaParams {
    pub location: Vec3,
    pub view_normal: Vec3,
    pub radius: f32,
    pub normal_radius_factor: f32,
    /// Already scaled by pressure when the brush asks for it
    pub area_radius_factor: f32,
    pub shape: FalloffShape,
    /// Sample the stroke's original coordinates and normals
    pub use_original: bool,
    pub stroke_id: u32,
    /// Returned as the center when no sample lands in the area volume
    pub fallback_center: Vec3,
    /// Returned as the normal when no sample lands in the normal volume
    pub fallback_normal: Vec3,
    pub min_nodes_per_task: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AreaMode {
    Normal,
    Center,
    Both,
}

impl AreaMode {
    fn normals(self) -> bool {
        self != AreaMode::Center
    }

    fn centers(self) -> bool {
        self != AreaMode::Normal
    }
}

/// Front (index 0) and back (index 1) partial sums
#[derive(Debug, Clone, Copy, Default)]
struct AreaAccum {
    cos: [Vec3; 2],
    count_co: [u32; 2],
    nos: [Vec3; 2],
    count_no: [u32; 2],
}

impl AreaAccum {
    fn merge(mut self, other: Self) -> Self {
        for i in 0..2 {
            self.cos[i] += other.cos[i];
            self.count_co[i] += other.count_co[i];
            self.nos[i] += other.nos[i];
            self.count_no[i] += other.count_no[i];
        }
        self
    }

    fn center(&self) -> Option<Vec3> {
        (0..2)
            .find(|&i| self.count_co[i] > 0)
            .map(|i| self.cos[i] / self.count_co[i] as f32)
    }

    fn normal(&self) -> Option<Vec3> {
        (0..2)
            .filter(|&i| self.count_no[i] > 0)
            .map(|i| self.nos[i].normalize_or_zero())
            .find(|n| *n != Vec3::ZERO)
    }
}

fn smoothstep_weight(dist_sq: f32, radius: f32) -> f32 {
    let p = 1.0 - dist_sq.sqrt() / radius;
    (3.0 * p * p - 2.0 * p * p * p).clamp(0.0, 1.0)
}

struct Volumes {
    normal: BrushTest,
    area: BrushTest,
}

impl Volumes {
    fn new(params: &AreaParams) -> Self {
        let test = |factor: f32| {
            BrushTest::new(
                params.shape,
                params.location,
                params.radius * factor,
                params.view_normal,
                None,
            )
        };
        Self {
            normal: test(params.normal_radius_factor),
            area: test(params.area_radius_factor),
        }
    }

    fn accumulate(&self, acc: &mut AreaAccum, mode: AreaMode, co: Vec3, no: Vec3, view_normal: Vec3) {
        let normal_hit = if mode.normals() { self.normal.test(co) } else { None };
        let area_hit = if mode.centers() { self.area.test(co) } else { None };
        if normal_hit.is_none() && area_hit.is_none() {
            return;
        }
        let flip = usize::from(view_normal.dot(no) <= 0.0);

        if let Some(dist_sq) = area_hit {
            let afactor = smoothstep_weight(dist_sq, self.area.radius);
            let weighted = self.area.location + (co - self.area.location) * (1.0 - afactor);
            acc.cos[flip] += weighted;
            acc.count_co[flip] += 1;
        }
        if let Some(dist_sq) = normal_hit {
            let nfactor = smoothstep_weight(dist_sq, self.normal.radius);
            acc.nos[flip] += no * nfactor;
            acc.count_no[flip] += 1;
        }
    }
}

fn node_accum<S: SpatialIndex + ?Sized>(
    mesh: &SculptMesh,
    attrs: &VertexAttributes,
    spatial: &S,
    node: NodeId,
    params: &AreaParams,
    volumes: &Volumes,
    mode: AreaMode,
) -> AreaAccum {
    let mut acc = AreaAccum::default();
    if let SculptMesh::Dynamic(_) = mesh {
        // Triangles stay valid while edges around them are being split
        for tri in spatial.node_triangles(node) {
            let [a, b, c] = tri.verts.map(|v| mesh.co(v));
            let no = (b - a).cross(c - a).normalize_or_zero();
            let co = closest_point_on_triangle(params.location, a, b, c);
            volumes.accumulate(&mut acc, mode, co, no, params.view_normal);
        }
        return acc;
    }

    for &v in spatial.node_vertices(node) {
        if !mesh.visible(v) {
            continue;
        }
        let (co, no) = if params.use_original {
            let orig = attrs.orig(mesh, v, params.stroke_id);
            (orig.co, orig.no)
        } else {
            (mesh.co(v), mesh.normal(v))
        };
        volumes.accumulate(&mut acc, mode, co, no, params.view_normal);
    }
    acc
}

fn reduce<S: SpatialIndex + ?Sized>(
    mesh: &SculptMesh,
    attrs: &VertexAttributes,
    spatial: &S,
    nodes: &[NodeId],
    params: &AreaParams,
    mode: AreaMode,
) -> AreaAccum {
    let volumes = Volumes::new(params);
    nodes
        .par_iter()
        .with_min_len(params.min_nodes_per_task)
        .map(|&node| node_accum(mesh, attrs, spatial, node, params, &volumes, mode))
        .reduce(AreaAccum::default, AreaAccum::merge)
}

/// View-facing weighted normal, or the fallback normal
pub fn calc_area_normal<S: SpatialIndex + ?Sized>(
    mesh: &SculptMesh,
    attrs: &VertexAttributes,
    spatial: &S,
    nodes: &[NodeId],
    params: &AreaParams,
) -> Vec3 {
    reduce(mesh, attrs, spatial, nodes, params, AreaMode::Normal)
        .normal()
        .unwrap_or(params.fallback_normal)
}

/// View-facing weighted center, or the fallback center
pub fn calc_area_center<S: SpatialIndex + ?Sized>(
    mesh: &SculptMesh,
    attrs: &VertexAttributes,
    spatial: &S,
    nodes: &[NodeId],
    params: &AreaParams,
) -> Vec3 {
    reduce(mesh, attrs, spatial, nodes, params, AreaMode::Center)
        .center()
        .unwrap_or(params.fallback_center)
}

/// Both estimates from a single pass, as `(normal, center)`
pub fn calc_area_normal_and_center<S: SpatialIndex + ?Sized>(
    mesh: &SculptMesh,
    attrs: &VertexAttributes,
    spatial: &S,
    nodes: &[NodeId],
    params: &AreaParams,
) -> (Vec3, Vec3) {
    let acc = reduce(mesh, attrs, spatial, nodes, params, AreaMode::Both);
    (
        acc.normal().unwrap_or(params.fallback_normal),
        acc.center().unwrap_or(params.fallback_center),
    )
}
