//! Brush influence volume predicates.
//!
//! Every test rejects clipped points first. The returned distance depends
//! on the test: `sphere` is linear, the `_sq` variants are squared world
//! distances, and `cube` is normalized to the tip size.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::types::FalloffShape;

/// Which predicate [`BrushTest::test`] dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushTestKind {
    SphereSq,
    CircleSq,
    CubeSq,
}

/// World-to-tip transform of a square-tip brush
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TipFrame {
    /// Maps world space into a frame where the tip spans -1..1
    pub local: Mat4,
    /// 1 is round, 0 is square
    pub roundness: f32,
}

/// Influence volume of one brush pass
#[derive(Debug, Clone)]
pub struct BrushTest {
    pub kind: BrushTestKind,
    pub location: Vec3,
    pub radius: f32,
    pub radius_squared: f32,
    /// Plane normal for the tube test
    pub view_normal: Vec3,
    pub tip: Option<TipFrame>,
    /// Points with `plane.xyz · co + plane.w < 0` are clipped
    pub clip_planes: Vec<Vec4>,
}

impl BrushTest {
    /// Tube shapes use the circle test, square tips the cube test,
    /// everything else the sphere test
    pub fn new(
        shape: FalloffShape,
        location: Vec3,
        radius: f32,
        view_normal: Vec3,
        tip: Option<TipFrame>,
    ) -> Self {
        let kind = match (shape, tip) {
            (FalloffShape::Tube, _) => BrushTestKind::CircleSq,
            (FalloffShape::Sphere, Some(_)) => BrushTestKind::CubeSq,
            (FalloffShape::Sphere, None) => BrushTestKind::SphereSq,
        };
        Self {
            kind,
            location,
            radius,
            radius_squared: radius * radius,
            view_normal,
            tip,
            clip_planes: Vec::new(),
        }
    }

    pub fn with_clip_planes(mut self, planes: Vec<Vec4>) -> Self {
        self.clip_planes = planes;
        self
    }

    fn clipped(&self, co: Vec3) -> bool {
        self.clip_planes
            .iter()
            .any(|plane| plane.truncate().dot(co) + plane.w < 0.0)
    }

    /// Run the selected predicate, returning the squared world distance
    pub fn test(&self, co: Vec3) -> Option<f32> {
        match self.kind {
            BrushTestKind::SphereSq => self.sphere_sq(co),
            BrushTestKind::CircleSq => self.circle_sq(co),
            BrushTestKind::CubeSq => self.cube_sq(co),
        }
    }

    /// Linear distance inside the sphere
    pub fn sphere(&self, co: Vec3) -> Option<f32> {
        self.sphere_sq(co).map(f32::sqrt)
    }

    /// Squared distance inside the sphere
    pub fn sphere_sq(&self, co: Vec3) -> Option<f32> {
        if self.clipped(co) {
            return None;
        }
        let dist_sq = co.distance_squared(self.location);
        (dist_sq <= self.radius_squared).then_some(dist_sq)
    }

    /// Inside test without clipping or distance
    pub fn sphere_fast(&self, co: Vec3) -> bool {
        co.distance_squared(self.location) <= self.radius_squared
    }

    /// Squared distance measured in the view plane (infinite depth)
    pub fn circle_sq(&self, co: Vec3) -> Option<f32> {
        if self.clipped(co) {
            return None;
        }
        let offset = co - self.location;
        let projected = offset - self.view_normal * offset.dot(self.view_normal);
        let dist_sq = projected.length_squared();
        (dist_sq <= self.radius_squared).then_some(dist_sq)
    }

    fn cube_distance(&self, co: Vec3, bound_depth: bool) -> Option<f32> {
        let tip = self.tip?;
        if self.clipped(co) {
            return None;
        }
        let local = tip.local.transform_point3(co).abs();
        let side = 1.0;
        let constant_side = (1.0 - tip.roundness) * side;
        let falloff_side = tip.roundness * side;

        if local.x > side || local.y > side || (bound_depth && local.z > side) {
            return None;
        }
        let dist = if local.x.min(local.y) > constant_side {
            // Corner: distance to the center of the rounding circle
            (Vec2::new(local.x, local.y) - Vec2::splat(constant_side)).length() / falloff_side
        } else if local.x.max(local.y) > constant_side {
            // Edge: distance to the inner square
            (local.x.max(local.y) - constant_side) / falloff_side
        } else {
            0.0
        };
        Some(dist)
    }

    /// Normalized distance inside the rounded square tip
    pub fn cube(&self, co: Vec3) -> Option<f32> {
        self.cube_distance(co, true).filter(|&dist| dist <= 1.0)
    }

    /// Squared world distance inside the rounded square tip
    pub fn cube_sq(&self, co: Vec3) -> Option<f32> {
        self.cube(co).map(|d| (d * self.radius) * (d * self.radius))
    }

    /// Linear world distance inside the tip extruded along its depth axis.
    ///
    /// Only the square bounds reject; points in a rounded-off corner report
    /// a distance past the radius.
    pub fn thru_cube_sq(&self, co: Vec3) -> Option<f32> {
        self.cube_distance(co, false).map(|d| d * self.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::SQRT_2;

    fn tip_at(location: Vec3, radius: f32, roundness: f32) -> TipFrame {
        let world = Mat4::from_translation(location) * Mat4::from_scale(Vec3::splat(radius));
        TipFrame {
            local: world.inverse(),
            roundness,
        }
    }

    #[test]
    fn test_sphere_variants() {
        let test = BrushTest::new(FalloffShape::Sphere, Vec3::ZERO, 2.0, Vec3::Z, None);
        assert_eq!(test.kind, BrushTestKind::SphereSq);
        let co = Vec3::new(1.0, 1.0, 0.0);
        assert!((test.sphere(co).unwrap() - 2f32.sqrt()).abs() < 1e-5);
        assert!((test.sphere_sq(co).unwrap() - 2.0).abs() < 1e-5);
        assert!(test.sphere_fast(co));
        assert!(test.sphere(Vec3::new(3.0, 0.0, 0.0)).is_none());
        assert!(!test.sphere_fast(Vec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn test_circle_ignores_depth() {
        let test = BrushTest::new(FalloffShape::Tube, Vec3::ZERO, 1.0, Vec3::Z, None);
        assert_eq!(test.kind, BrushTestKind::CircleSq);
        let dist = test.test(Vec3::new(0.5, 0.0, 50.0)).unwrap();
        assert!((dist - 0.25).abs() < 1e-5);
        assert!(test.sphere_sq(Vec3::new(0.5, 0.0, 50.0)).is_none());
    }

    #[test]
    fn test_clip_planes_override() {
        let test = BrushTest::new(FalloffShape::Sphere, Vec3::ZERO, 1.0, Vec3::Z, None)
            .with_clip_planes(vec![Vec4::new(1.0, 0.0, 0.0, 0.0)]);
        assert!(test.sphere_sq(Vec3::new(0.5, 0.0, 0.0)).is_some());
        assert!(test.sphere_sq(Vec3::new(-0.5, 0.0, 0.0)).is_none());
        assert!(test.circle_sq(Vec3::new(-0.5, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_square_tip_regions() {
        let tip = tip_at(Vec3::ZERO, 1.0, 0.5);
        let test = BrushTest::new(FalloffShape::Sphere, Vec3::ZERO, 1.0, Vec3::Z, Some(tip));
        assert_eq!(test.kind, BrushTestKind::CubeSq);
        // Inner square is flat
        assert!(test.cube(Vec3::new(0.4, 0.4, 0.0)).unwrap().abs() < 1e-6);
        // Edge region ramps along one axis
        let edge = test.cube(Vec3::new(0.75, 0.1, 0.0)).unwrap();
        assert!((edge - 0.5).abs() < 1e-5);
        // Far corner lies outside the rounding
        assert!(test.cube(Vec3::new(0.99, 0.99, 0.0)).is_none());
        // Outside the depth bound only the through test accepts
        assert!(test.cube(Vec3::new(0.2, 0.2, 3.0)).is_none());
        assert!(test.thru_cube_sq(Vec3::new(0.2, 0.2, 3.0)).is_some());
        // The through test keeps rounded-off corners and reports them past the radius
        let corner = test.thru_cube_sq(Vec3::new(0.99, 0.99, 5.0)).unwrap();
        assert!((corner - 0.49 * SQRT_2 / 0.5).abs() < 1e-4);
        assert!(test.thru_cube_sq(Vec3::new(1.01, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_square_tip_is_square_at_zero_roundness() {
        let tip = tip_at(Vec3::ZERO, 1.0, 0.0);
        let test = BrushTest::new(FalloffShape::Sphere, Vec3::ZERO, 1.0, Vec3::Z, Some(tip));
        assert!(test.cube(Vec3::new(0.99, 0.99, 0.0)).is_some());
        assert!(test.cube(Vec3::new(1.01, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_cube_sq_scales_by_radius() {
        let tip = tip_at(Vec3::ZERO, 2.0, 1.0);
        let test = BrushTest::new(FalloffShape::Sphere, Vec3::ZERO, 2.0, Vec3::Z, Some(tip));
        let dist_sq = test.cube_sq(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!((dist_sq - 1.0).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn prop_round_tip_matches_sphere(
            x in -2.0f32..2.0,
            y in -2.0f32..2.0,
            radius in 0.1f32..3.0,
        ) {
            let location = Vec3::new(0.3, -0.2, 1.0);
            let tip = tip_at(location, radius, 1.0);
            let cube = BrushTest::new(FalloffShape::Sphere, location, radius, Vec3::Z, Some(tip));
            let sphere = BrushTest::new(FalloffShape::Sphere, location, radius, Vec3::Z, None);
            let co = location + Vec3::new(x, y, 0.0) * radius;
            let normalized = Vec2::new(x, y).length();
            // Classification may differ only on the rim itself
            prop_assume!((normalized - 1.0).abs() > 1e-3);

            let a = sphere.sphere(co).map(|d| d / radius);
            let b = cube.cube(co);
            prop_assert_eq!(a.is_some(), b.is_some());
            if let (Some(a), Some(b)) = (a, b) {
                prop_assert!((a - b).abs() < 1e-4);
            }
        }
    }
}
