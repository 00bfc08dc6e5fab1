//! Per-stroke state.
//!
//! A [`StrokeCache`] holds the invariants captured when a stroke starts,
//! the variants refreshed by every pointer sample, and the frame of the
//! symmetry pass currently being dispatched. Worker threads only read it;
//! the controlling thread mutates it between parallel sections.

pub mod symmetry;

use std::collections::HashSet;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec2, Vec3};
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::brush::Brush;
use crate::brush_test::TipFrame;
use crate::collaborators::{BrushChannels, ChannelInput, channel};
use crate::islands::FakeNeighbors;
use crate::mesh::SculptMesh;
use crate::neighbors::vertex_neighbors;
use crate::spatial::{Aabb, NodeId};
use crate::types::{ToolId, UndoDataKind};

pub use symmetry::SymmetryPass;

/// Bits of [`StrokeSample::flags`]
pub mod sample_flags {
    /// Invert the brush direction (modifier key)
    pub const INVERT: u32 = 1 << 0;
    /// Pen eraser end
    pub const PEN_FLIP: u32 = 1 << 1;
}

/// One pointer sample, in the fixed layout of the replay log.
///
/// The ray is in object space; the engine finds the brush location by
/// casting it against the mesh.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StrokeSample {
    pub timestamp_ms: u64,
    pub ray_origin: [f32; 3],
    pub ray_direction: [f32; 3],
    pub pressure: f32,
    pub tilt: [f32; 2],
    pub flags: u32,
}

impl StrokeSample {
    pub fn new(origin: Vec3, direction: Vec3, pressure: f32) -> Self {
        Self {
            timestamp_ms: 0,
            ray_origin: origin.to_array(),
            ray_direction: direction.to_array(),
            pressure,
            tilt: [0.0; 2],
            flags: 0,
        }
    }

    /// Sample looking straight down -Z at `(x, y)`
    pub fn from_above(x: f32, y: f32, pressure: f32) -> Self {
        Self::new(Vec3::new(x, y, 10.0), Vec3::NEG_Z, pressure)
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_tilt(mut self, tilt: Vec2) -> Self {
        self.tilt = tilt.to_array();
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn origin(&self) -> Vec3 {
        Vec3::from_array(self.ray_origin)
    }

    pub fn direction(&self) -> Vec3 {
        Vec3::from_array(self.ray_direction)
    }

    pub fn is_inverted(&self) -> bool {
        self.flags & sample_flags::INVERT != 0
    }

    pub fn is_pen_flip(&self) -> bool {
        self.flags & sample_flags::PEN_FLIP != 0
    }
}

/// Trailing point and smoothed orientation along the stroke path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RakeData {
    /// How far the follow point trails the brush
    pub follow_dist: f32,
    pub follow_co: Vec3,
    /// Smoothed rotation from +X to the travel direction
    pub rotation: Quat,
    /// Travel angle in the XY plane of the rotation frame
    pub angle: f32,
}

impl RakeData {
    /// Blend factor toward the newest travel direction
    const ROTATION_BLEND: f32 = 0.25;

    pub fn new(location: Vec3, follow_dist: f32) -> Self {
        Self {
            follow_dist,
            follow_co: location,
            rotation: Quat::IDENTITY,
            angle: 0.0,
        }
    }

    /// Drag the follow point after `location` and turn toward the travel direction
    pub fn update(&mut self, location: Vec3, normal: Vec3) {
        let travel = location - self.follow_co;
        let dist = travel.length();
        if dist > self.follow_dist && dist > 0.0 {
            self.follow_co = self.follow_co.lerp(location, (dist - self.follow_dist) / dist);
        }
        let travel = (travel - normal * travel.dot(normal)).normalize_or_zero();
        if travel == Vec3::ZERO {
            return;
        }
        let target = Quat::from_rotation_arc(Vec3::X, travel);
        self.rotation = self.rotation.slerp(target, Self::ROTATION_BLEND).normalize();
        self.angle = travel.y.atan2(travel.x);
    }
}

/// Neighbor indices of every vertex, real neighbors then the fake one
pub type NeighborTable = Vec<SmallVec<[u32; 8]>>;

/// Grab deltas shorter than this are treated as no movement
const GRAB_DELTA_EPSILON: f32 = 1e-10;

/// Frame and accumulators of the stroke in progress.
///
/// Only the controlling thread mutates the cache, with one exception: the
/// layer tool's per-vertex displacement accumulator is written through
/// `&self` from inside node loops. Each slot is an atomic owned by the
/// single node holding that vertex, so parallel writers never share one.
#[derive(Debug)]
pub struct StrokeCache {
    pub stroke_id: u32,
    pub tool: ToolId,
    /// Samples that produced a dab
    pub sample_count: u32,
    pub first_time: bool,
    pub last_timestamp_ms: u64,

    pub pressure: f32,
    pub tilt: Vec2,
    pub invert: bool,
    pub pen_flip: bool,
    /// Brush alpha after channel mapping, before squaring
    pub root_alpha: f32,
    pub initial_radius: f32,
    pub radius: f32,
    pub radius_squared: f32,
    /// Strength of the current sample, before feathering
    pub bstrength: f32,
    /// Symmetry feather of the current sample
    pub feather: f32,
    pub autosmooth_factor: f32,
    pub stroke_distance: f32,
    pub speed: f32,

    pub true_location: Vec3,
    pub location: Vec3,
    pub true_last_location: Vec3,
    pub last_location: Vec3,
    /// Points toward the viewer
    pub true_view_normal: Vec3,
    pub view_normal: Vec3,
    pub true_initial_location: Vec3,
    pub initial_location: Vec3,
    pub true_initial_normal: Vec3,
    pub initial_normal: Vec3,
    pub true_gravity_direction: Vec3,
    pub gravity_direction: Vec3,

    pub orig_grab_location: Vec3,
    pub old_grab_location: Vec3,
    pub grab_delta: Vec3,
    pub grab_delta_symmetry: Vec3,
    /// Last non-zero grab delta, for orienting square tips while still
    pub last_grab_delta: Vec3,
    pub dial_reference: Option<Vec3>,
    /// Rotate tool angle around the sculpt normal
    pub vertex_rotation: f32,
    pub rake: RakeData,

    pub pass: SymmetryPass,
    pub tile_pass: u32,
    /// Tile translation of the current pass
    pub plane_offset: Vec3,
    pub sculpt_normal: Vec3,
    pub sculpt_normal_symm: Vec3,
    pub last_center: Vec3,
    /// World to brush-local (square tips)
    pub brush_local: Mat4,
    /// Brush-local to world
    pub brush_local_inv: Mat4,

    /// Id painted by the face-set tool this stroke
    pub face_set_draw: i32,
    /// Union of the bounds redrawn this stroke
    pub redraw: Aabb,

    layer_displacement: Vec<AtomicU32>,
    undo_pushed: HashSet<(Option<NodeId>, UndoDataKind)>,
    neighbor_cache: OnceLock<NeighborTable>,
}

impl StrokeCache {
    pub fn new(stroke_id: u32, tool: ToolId, vertex_count: usize) -> Self {
        Self {
            stroke_id,
            tool,
            sample_count: 0,
            first_time: true,
            last_timestamp_ms: 0,
            pressure: 1.0,
            tilt: Vec2::ZERO,
            invert: false,
            pen_flip: false,
            root_alpha: 1.0,
            initial_radius: 0.0,
            radius: 0.0,
            radius_squared: 0.0,
            bstrength: 0.0,
            feather: 1.0,
            autosmooth_factor: 0.0,
            stroke_distance: 0.0,
            speed: 0.0,
            true_location: Vec3::ZERO,
            location: Vec3::ZERO,
            true_last_location: Vec3::ZERO,
            last_location: Vec3::ZERO,
            true_view_normal: Vec3::Z,
            view_normal: Vec3::Z,
            true_initial_location: Vec3::ZERO,
            initial_location: Vec3::ZERO,
            true_initial_normal: Vec3::Z,
            initial_normal: Vec3::Z,
            true_gravity_direction: Vec3::Z,
            gravity_direction: Vec3::Z,
            orig_grab_location: Vec3::ZERO,
            old_grab_location: Vec3::ZERO,
            grab_delta: Vec3::ZERO,
            grab_delta_symmetry: Vec3::ZERO,
            last_grab_delta: Vec3::ZERO,
            dial_reference: None,
            vertex_rotation: 0.0,
            rake: RakeData::new(Vec3::ZERO, 0.0),
            pass: SymmetryPass::IDENTITY,
            tile_pass: 0,
            plane_offset: Vec3::ZERO,
            sculpt_normal: Vec3::ZERO,
            sculpt_normal_symm: Vec3::ZERO,
            last_center: Vec3::ZERO,
            brush_local: Mat4::IDENTITY,
            brush_local_inv: Mat4::IDENTITY,
            face_set_draw: 1,
            redraw: Aabb::empty(),
            layer_displacement: (0..vertex_count).map(|_| AtomicU32::new(0)).collect(),
            undo_pushed: HashSet::new(),
            neighbor_cache: OnceLock::new(),
        }
    }

    /// Capture the invariants from the first located sample
    pub fn init_invariants(
        &mut self,
        sample: &StrokeSample,
        location: Vec3,
        normal: Vec3,
        gravity_up: Vec3,
    ) {
        let view = -sample.direction().normalize_or_zero();
        self.true_view_normal = if view == Vec3::ZERO { Vec3::Z } else { view };
        self.view_normal = self.true_view_normal;
        self.true_initial_location = location;
        self.initial_location = location;
        self.true_initial_normal = normal;
        self.initial_normal = normal;
        self.true_location = location;
        self.true_last_location = location;
        self.orig_grab_location = location;
        self.old_grab_location = location;
        let gravity = gravity_up.normalize_or_zero();
        self.true_gravity_direction = if gravity == Vec3::ZERO { Vec3::Z } else { gravity };
        self.gravity_direction = self.true_gravity_direction;
        self.invert = sample.is_inverted();
        self.pen_flip = sample.is_pen_flip();
        self.last_timestamp_ms = sample.timestamp_ms;
        self.rake = RakeData::new(location, 0.0);
    }

    /// Refresh pressure, radius and locations from a new sample.
    ///
    /// `location` is the surface hit (or the stroke origin for tools that
    /// keep it) and `grab_location` the ray projected onto the view plane
    /// through the previous location.
    pub fn update_variants(
        &mut self,
        brush: &Brush,
        sample: &StrokeSample,
        location: Vec3,
        grab_location: Vec3,
        channels: &dyn BrushChannels,
    ) {
        let pressure = sample.pressure.clamp(0.0, 1.0);
        self.pressure = pressure;
        self.tilt = Vec2::from_array(sample.tilt);
        self.invert = sample.is_inverted();
        self.pen_flip = sample.is_pen_flip();

        let travelled = if self.first_time {
            0.0
        } else {
            location.distance(self.true_location)
        };
        let dt = sample.timestamp_ms.saturating_sub(self.last_timestamp_ms);
        self.speed = if dt > 0 { travelled / dt as f32 } else { 0.0 };
        self.last_timestamp_ms = sample.timestamp_ms;
        self.stroke_distance += travelled;

        let input = ChannelInput {
            pressure,
            tilt: self.tilt,
            angle: self.rake.angle,
            random: golden_sequence(self.sample_count),
            stroke_distance: self.stroke_distance,
            speed: self.speed,
        };
        self.root_alpha = channels
            .resolve(channel::STRENGTH, &input)
            .unwrap_or(brush.alpha);
        self.autosmooth_factor = channels
            .resolve(channel::AUTOSMOOTH, &input)
            .unwrap_or(brush.autosmooth_factor);
        let radius = channels
            .resolve(channel::RADIUS, &input)
            .unwrap_or_else(|| brush.effective_radius(pressure));
        if self.first_time || !brush.anchored {
            self.radius = radius;
        }
        if self.first_time {
            self.initial_radius = self.radius;
        }
        self.radius_squared = self.radius * self.radius;

        self.update_grab_delta(grab_location);

        self.true_last_location = self.true_location;
        self.true_location = if self.tool.keeps_stroke_origin() {
            self.orig_grab_location
        } else {
            location
        };
        if self.tool == ToolId::Rotate {
            self.update_dial(grab_location);
        }
        self.rake.update(self.true_location, self.true_view_normal);
    }

    fn update_grab_delta(&mut self, grab_location: Vec3) {
        if self.first_time {
            self.orig_grab_location = grab_location;
            self.old_grab_location = grab_location;
            self.grab_delta = Vec3::ZERO;
            return;
        }
        let delta = grab_location - self.old_grab_location;
        if self.tool.accumulates_grab_delta() {
            self.grab_delta += delta;
        } else if delta.length_squared() > GRAB_DELTA_EPSILON {
            self.grab_delta = delta;
        } else {
            self.grab_delta = Vec3::ZERO;
        }
        if self.grab_delta.length_squared() > GRAB_DELTA_EPSILON {
            self.last_grab_delta = self.grab_delta;
        }
        self.old_grab_location = grab_location;
    }

    /// Signed angle swept around the stroke origin in the view plane
    fn update_dial(&mut self, grab_location: Vec3) {
        let n = self.true_view_normal;
        let offset = grab_location - self.true_initial_location;
        let offset = offset - n * offset.dot(n);
        let min_len = 1e-3 * self.radius.max(1e-3);
        match self.dial_reference {
            None if offset.length() > min_len => self.dial_reference = Some(offset),
            Some(reference) if offset.length() > min_len => {
                let angle = reference.cross(offset).dot(n).atan2(reference.dot(offset));
                self.vertex_rotation = angle;
            }
            _ => {}
        }
    }

    /// Mirror and rotate the stroke frame into `pass`
    pub fn calc_brushdata_symm(&mut self, pass: SymmetryPass) {
        self.pass = pass;
        self.tile_pass = 0;
        self.plane_offset = Vec3::ZERO;
        self.location = pass.apply(self.true_location);
        self.last_location = pass.apply(self.true_last_location);
        self.grab_delta_symmetry = pass.apply(self.grab_delta);
        self.view_normal = pass.apply(self.true_view_normal);
        self.initial_location = pass.apply(self.true_initial_location);
        self.initial_normal = pass.apply(self.true_initial_normal);
        self.gravity_direction = pass.apply(self.true_gravity_direction);
        trace!(
            "calc_brushdata_symm: mirror {} radial {:?}/{}",
            pass.mirror, pass.radial_axis, pass.radial_index
        );
    }

    /// Shift the current pass by a tile offset
    pub fn apply_tile(&mut self, index: u32, offset: Vec3) {
        self.location += offset - self.plane_offset;
        self.plane_offset = offset;
        self.tile_pass = index;
    }

    /// Unmirrored, unrotated, untiled pass
    pub fn is_main_symmetry_pass(&self) -> bool {
        self.pass.mirror == 0 && self.pass.radial_index == 0 && self.tile_pass == 0
    }

    /// First sample of the stroke, before any grab delta exists
    pub fn is_first_brush_step(&self) -> bool {
        self.first_time
    }

    /// -1 when the pass mirrors an odd number of axes
    pub fn mirror_sign(&self) -> f32 {
        if self.pass.mirror.count_ones() % 2 == 1 { -1.0 } else { 1.0 }
    }

    /// Build the square-tip frame from a surface normal and origin.
    ///
    /// The X axis follows the stroke: the grab delta, then the last
    /// non-zero grab delta, then the view direction, then whichever world
    /// axis is least aligned with `normal`.
    pub fn update_brush_local_mat(
        &mut self,
        normal: Vec3,
        origin: Vec3,
        tip_scale_x: f32,
        depth_scale: f32,
        roundness: f32,
    ) -> TipFrame {
        let normal = normal.normalize_or_zero();
        let candidates = [
            self.grab_delta_symmetry,
            self.pass.apply(self.last_grab_delta),
            self.view_normal,
        ];
        let mut x_axis = candidates
            .iter()
            .map(|d| normal.cross(*d))
            .find(|x| x.length_squared() > 1e-12)
            .unwrap_or_else(|| normal.cross(least_aligned_axis(normal)))
            .normalize_or_zero();
        if x_axis == Vec3::ZERO {
            x_axis = Vec3::X;
        }
        let y_axis = normal.cross(x_axis);

        let world = Mat4::from_cols(
            (x_axis * self.radius * tip_scale_x).extend(0.0),
            (y_axis * self.radius).extend(0.0),
            (normal * self.radius * depth_scale).extend(0.0),
            origin.extend(1.0),
        );
        if world.determinant().abs() < 1e-12 {
            warn!(
                "update_brush_local_mat: degenerate frame (radius {}), using identity",
                self.radius
            );
            self.brush_local = Mat4::IDENTITY;
            self.brush_local_inv = Mat4::IDENTITY;
        } else {
            self.brush_local_inv = world;
            self.brush_local = world.inverse();
        }
        TipFrame {
            local: self.brush_local,
            roundness,
        }
    }

    pub fn layer_displacement(&self, v: u32) -> f32 {
        self.layer_displacement
            .get(v as usize)
            .map_or(0.0, |bits| f32::from_bits(bits.load(Ordering::Relaxed)))
    }

    /// Each vertex belongs to exactly one node, so node loops never share a slot
    pub fn set_layer_displacement(&self, v: u32, value: f32) {
        if let Some(bits) = self.layer_displacement.get(v as usize) {
            bits.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Record an undo push; false when this node and kind were already pushed
    pub fn mark_undo_pushed(&mut self, node: Option<NodeId>, kind: UndoDataKind) -> bool {
        self.undo_pushed.insert((node, kind))
    }

    /// Neighbor table built on first use; a racing builder's table is dropped
    pub fn neighbor_table(&self, mesh: &SculptMesh, fake: Option<&FakeNeighbors>) -> &NeighborTable {
        if let Some(table) = self.neighbor_cache.get() {
            return table;
        }
        let built = build_neighbor_table(mesh, fake);
        self.neighbor_cache.get_or_init(move || built)
    }

    /// Forget index-based per-stroke caches after a topology change
    pub fn topology_changed(&mut self, vertex_count: usize) {
        self.neighbor_cache = OnceLock::new();
        if self.layer_displacement.len() < vertex_count {
            self.layer_displacement
                .resize_with(vertex_count, || AtomicU32::new(0));
        }
    }
}

fn least_aligned_axis(normal: Vec3) -> Vec3 {
    let abs = normal.abs();
    if abs.x <= abs.y && abs.x <= abs.z {
        Vec3::X
    } else if abs.y <= abs.z {
        Vec3::Y
    } else {
        Vec3::Z
    }
}

/// Low-discrepancy value in `0..1` for the `n`th sample
fn golden_sequence(n: u32) -> f32 {
    const GOLDEN: f64 = 0.618_033_988_749_895;
    ((n as f64 + 1.0) * GOLDEN).fract() as f32
}

fn build_neighbor_table(mesh: &SculptMesh, fake: Option<&FakeNeighbors>) -> NeighborTable {
    (0..mesh.vertex_count() as u32)
        .map(|v| {
            if !mesh.is_unique(v) {
                return SmallVec::new();
            }
            vertex_neighbors(mesh, fake, mesh.index_to_vertex(v), false)
                .indices()
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::BrushDefaults;
    use crate::test_fixtures;

    fn started(tool: ToolId) -> StrokeCache {
        let mut cache = StrokeCache::new(1, tool, 4);
        let sample = StrokeSample::from_above(0.0, 0.0, 1.0);
        cache.init_invariants(&sample, Vec3::ZERO, Vec3::Z, Vec3::Z);
        cache
    }

    #[test]
    fn test_sample_layout() {
        assert_eq!(std::mem::size_of::<StrokeSample>(), 48);
        let sample = StrokeSample::from_above(1.0, 2.0, 0.5)
            .with_flags(sample_flags::INVERT)
            .with_timestamp(16);
        assert!(sample.is_inverted());
        assert!(!sample.is_pen_flip());
        let bytes = bytemuck::bytes_of(&sample);
        let back: StrokeSample = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, sample);
    }

    #[test]
    fn test_invariants_face_the_viewer() {
        let cache = started(ToolId::Draw);
        assert_eq!(cache.true_view_normal, Vec3::Z);
        assert_eq!(cache.true_initial_location, Vec3::ZERO);
    }

    #[test]
    fn test_grab_delta_accumulates_for_grab() {
        let brush = Brush::grab();
        let mut cache = started(ToolId::Grab);
        let sample = StrokeSample::from_above(0.0, 0.0, 1.0);
        cache.update_variants(&brush, &sample, Vec3::ZERO, Vec3::ZERO, &BrushDefaults);
        cache.first_time = false;
        cache.update_variants(&brush, &sample, Vec3::X, Vec3::new(0.1, 0.0, 0.0), &BrushDefaults);
        cache.update_variants(&brush, &sample, Vec3::X, Vec3::new(0.3, 0.0, 0.0), &BrushDefaults);
        assert!((cache.grab_delta - Vec3::new(0.3, 0.0, 0.0)).length() < 1e-6);
        // Grab keeps the brush at the stroke origin
        assert_eq!(cache.true_location, Vec3::ZERO);
    }

    #[test]
    fn test_grab_delta_per_sample_for_snake_hook() {
        let brush = Brush::snake_hook();
        let mut cache = started(ToolId::SnakeHook);
        let sample = StrokeSample::from_above(0.0, 0.0, 1.0);
        cache.update_variants(&brush, &sample, Vec3::ZERO, Vec3::ZERO, &BrushDefaults);
        cache.first_time = false;
        let a = Vec3::new(0.1, 0.0, 0.0);
        let b = Vec3::new(0.3, 0.0, 0.0);
        cache.update_variants(&brush, &sample, a, a, &BrushDefaults);
        cache.update_variants(&brush, &sample, b, b, &BrushDefaults);
        assert!((cache.grab_delta - Vec3::new(0.2, 0.0, 0.0)).length() < 1e-6);
        assert_eq!(cache.true_location, b);
        // Standing still clears the delta but keeps the last direction
        cache.update_variants(&brush, &sample, b, b, &BrushDefaults);
        assert_eq!(cache.grab_delta, Vec3::ZERO);
        assert!((cache.last_grab_delta - Vec3::new(0.2, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_pressure_scales_radius() {
        let brush = Brush {
            pressure_radius: true,
            radius: 2.0,
            ..Brush::draw()
        };
        let mut cache = started(ToolId::Draw);
        let sample = StrokeSample::from_above(0.0, 0.0, 0.0);
        cache.update_variants(&brush, &sample, Vec3::ZERO, Vec3::ZERO, &BrushDefaults);
        assert!((cache.radius - 1.0).abs() < 1e-6);
        assert!((cache.radius_squared - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_brushdata_symm_mirrors_frame() {
        let mut cache = started(ToolId::Draw);
        cache.true_location = Vec3::new(0.5, 0.2, 0.0);
        cache.grab_delta = Vec3::new(1.0, 1.0, 0.0);
        cache.calc_brushdata_symm(SymmetryPass {
            mirror: 1,
            ..SymmetryPass::IDENTITY
        });
        assert_eq!(cache.location, Vec3::new(-0.5, 0.2, 0.0));
        assert_eq!(cache.grab_delta_symmetry, Vec3::new(-1.0, 1.0, 0.0));
        assert!(!cache.is_main_symmetry_pass());
        assert_eq!(cache.mirror_sign(), -1.0);

        cache.calc_brushdata_symm(SymmetryPass::IDENTITY);
        assert!(cache.is_main_symmetry_pass());
        cache.apply_tile(1, Vec3::X);
        assert!(!cache.is_main_symmetry_pass());
        assert_eq!(cache.location, Vec3::new(1.5, 0.2, 0.0));
    }

    #[test]
    fn test_brush_local_mat_maps_tip_to_unit() {
        let mut cache = started(ToolId::ClayStrips);
        cache.radius = 2.0;
        cache.grab_delta_symmetry = Vec3::X;
        let tip = cache.update_brush_local_mat(Vec3::Z, Vec3::ZERO, 1.0, 1.0, 0.5);
        // Stroke along X puts the tip X axis along +Y (normal × delta)
        let local = tip.local.transform_point3(Vec3::new(0.0, 2.0, 0.0));
        assert!((local - Vec3::X).length() < 1e-5);
        let round_trip = cache.brush_local_inv.transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!((round_trip - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_brush_local_mat_falls_back_when_still() {
        let mut cache = started(ToolId::ClayStrips);
        cache.radius = 1.0;
        // No delta and the view looks straight down the normal
        let tip = cache.update_brush_local_mat(Vec3::Z, Vec3::ZERO, 1.0, 1.0, 1.0);
        assert!(tip.local.determinant().abs() > 1e-6);

        cache.radius = 0.0;
        let tip = cache.update_brush_local_mat(Vec3::Z, Vec3::ZERO, 1.0, 1.0, 1.0);
        assert_eq!(tip.local, Mat4::IDENTITY);
    }

    #[test]
    fn test_rotate_dial_angle() {
        let brush = Brush::rotate();
        let mut cache = started(ToolId::Rotate);
        cache.radius = 1.0;
        let sample = StrokeSample::from_above(0.0, 0.0, 1.0);
        cache.update_variants(&brush, &sample, Vec3::ZERO, Vec3::ZERO, &BrushDefaults);
        cache.first_time = false;
        cache.update_variants(&brush, &sample, Vec3::ZERO, Vec3::X, &BrushDefaults);
        cache.update_variants(&brush, &sample, Vec3::ZERO, Vec3::Y, &BrushDefaults);
        assert!((cache.vertex_rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_rake_turns_toward_travel() {
        let mut rake = RakeData::new(Vec3::ZERO, 0.0);
        for i in 1..=40 {
            rake.update(Vec3::new(0.0, i as f32 * 0.1, 0.0), Vec3::Z);
        }
        assert!((rake.follow_co - Vec3::new(0.0, 4.0, 0.0)).length() < 1e-4);
        assert!((rake.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        let heading = rake.rotation * Vec3::X;
        assert!((heading - Vec3::Y).length() < 1e-2);
    }

    #[test]
    fn test_layer_displacement_slots() {
        let mut cache = StrokeCache::new(1, ToolId::Layer, 2);
        cache.set_layer_displacement(1, 0.25);
        assert!((cache.layer_displacement(1) - 0.25).abs() < 1e-6);
        assert_eq!(cache.layer_displacement(5), 0.0);
        cache.topology_changed(6);
        cache.set_layer_displacement(5, 0.5);
        assert!((cache.layer_displacement(5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_undo_push_once_per_node_and_kind() {
        let mut cache = StrokeCache::new(1, ToolId::Draw, 0);
        assert!(cache.mark_undo_pushed(Some(0), UndoDataKind::Coords));
        assert!(!cache.mark_undo_pushed(Some(0), UndoDataKind::Coords));
        assert!(cache.mark_undo_pushed(Some(0), UndoDataKind::Mask));
    }

    #[test]
    fn test_neighbor_table_built_once() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(3));
        let cache = StrokeCache::new(1, ToolId::Smooth, mesh.vertex_count());
        let first = cache.neighbor_table(&mesh, None) as *const NeighborTable;
        let second = cache.neighbor_table(&mesh, None) as *const NeighborTable;
        assert_eq!(first, second);
        let mut center: Vec<u32> = cache.neighbor_table(&mesh, None)[4].to_vec();
        center.sort_unstable();
        assert_eq!(center, vec![1, 3, 5, 7]);
    }
}
