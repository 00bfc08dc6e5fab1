//! Seams to systems outside the sculpt core.
//!
//! Auto-masking, brush parameter mapping, texture sampling, physics-style
//! solvers and deform targets are opaque to the engine. It only calls
//! through these traits, so every implementation must be `Send + Sync` to
//! be usable from the parallel node loops.

use glam::{Vec2, Vec3};

use crate::mesh::SculptMesh;
use crate::stroke::StrokeCache;

/// Extra per-vertex strength multiplier in `0..=1`
pub trait AutoMasking: Send + Sync {
    fn factor(&self, cache: &StrokeCache, mesh: &SculptMesh, v: u32) -> f32;
}

/// Input state a channel mapping may read
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelInput {
    pub pressure: f32,
    pub tilt: Vec2,
    /// Travel direction angle in radians
    pub angle: f32,
    /// Deterministic per-sample value in `0..1`
    pub random: f32,
    /// World distance travelled since the stroke began
    pub stroke_distance: f32,
    /// World units per millisecond
    pub speed: f32,
}

/// Channel names resolved every sample
pub mod channel {
    /// Overrides the brush alpha
    pub const STRENGTH: &str = "strength";
    /// Overrides the pressure-mapped radius
    pub const RADIUS: &str = "radius";
    /// Overrides the autosmooth factor
    pub const AUTOSMOOTH: &str = "autosmooth";
}

/// Maps a named channel to a value for the current input.
///
/// `None` keeps the brush's own value.
pub trait BrushChannels: Send + Sync {
    fn resolve(&self, channel: &str, input: &ChannelInput) -> Option<f32>;
}

/// Channel mapping that never overrides the brush
#[derive(Debug, Clone, Copy, Default)]
pub struct BrushDefaults;

impl BrushChannels for BrushDefaults {
    fn resolve(&self, _channel: &str, _input: &ChannelInput) -> Option<f32> {
        None
    }
}

/// Brush texture lookup returning a strength multiplier
pub trait TextureSampler: Send + Sync {
    fn sample(&self, position: Vec3, cache: &StrokeCache) -> f32;
}

/// Solver behind the pose, boundary and cloth tools.
pub trait BrushSolver: Send + Sync {
    /// Called once when a stroke using the solver starts
    fn begin_stroke(&mut self, _mesh: &SculptMesh, _cache: &StrokeCache) {}

    /// Displacement of `v` relative to its proxy base, already weighted by `fade`
    fn displacement(
        &self,
        mesh: &SculptMesh,
        cache: &StrokeCache,
        v: u32,
        orig_co: Vec3,
        fade: f32,
    ) -> Vec3;

    /// Whether combined positions go to the solver instead of the mesh
    fn accepts_positions(&self) -> bool {
        false
    }

    /// Receive the combined positions of one sample
    fn accept_positions(&mut self, _positions: &[(u32, Vec3)]) {}

    fn end_stroke(&mut self) {}
}

/// Dependent deform data (shape keys, deformed coordinate caches) that must
/// follow the offsets written by each sample
pub trait DeformTarget: Send + Sync {
    fn apply_offsets(&mut self, offsets: &[(u32, Vec3)]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brush_defaults_never_override() {
        let input = ChannelInput {
            pressure: 0.5,
            ..Default::default()
        };
        assert_eq!(BrushDefaults.resolve(channel::STRENGTH, &input), None);
        assert_eq!(BrushDefaults.resolve(channel::RADIUS, &input), None);
    }
}
