//! Mirror, radial and tiling passes of one pointer sample.

use glam::{Quat, Vec3};
use relief_config::SculptSettings;
use tracing::trace;

use crate::spatial::Aabb;

/// Whether mirror combination `i` runs under the symmetry bits `symm`.
///
/// Besides requiring `i` to be a subset of `symm`, the XY combination is
/// skipped for XZ symmetry, and XY/XZ are skipped for YZ symmetry.
pub fn is_symmetry_iteration_valid(i: u8, symm: u8) -> bool {
    i == 0 || (symm & i != 0 && (symm != 5 || i != 3) && (symm != 6 || (i != 3 && i != 5)))
}

/// Negate the components named by the mirror bits
pub fn flip_v3(v: Vec3, symm: u8) -> Vec3 {
    let mut out = v;
    if symm & 1 != 0 {
        out.x = -out.x;
    }
    if symm & 2 != 0 {
        out.y = -out.y;
    }
    if symm & 4 != 0 {
        out.z = -out.z;
    }
    out
}

/// One invocation of the brush action under a mirror and radial transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetryPass {
    /// Mirror bits applied to the stroke frame
    pub mirror: u8,
    /// Radial axis (0 = X), `None` for the unrotated pass
    pub radial_axis: Option<usize>,
    /// Radial repeat index, 0 for the unrotated pass
    pub radial_index: u32,
    /// Rotation angle around `radial_axis`
    pub angle: f32,
}

impl SymmetryPass {
    pub const IDENTITY: Self = Self {
        mirror: 0,
        radial_axis: None,
        radial_index: 0,
        angle: 0.0,
    };

    /// The untransformed pass that computes the area normal and center
    pub fn is_identity(&self) -> bool {
        self.mirror == 0 && self.radial_index == 0
    }

    /// Radial rotation of this pass
    pub fn rotation(&self) -> Quat {
        match self.radial_axis {
            Some(axis) => Quat::from_axis_angle(axis_vector(axis), self.angle),
            None => Quat::IDENTITY,
        }
    }

    /// Mirror then rotate a point or direction
    pub fn apply(&self, v: Vec3) -> Vec3 {
        self.rotation() * flip_v3(v, self.mirror)
    }
}

fn axis_vector(axis: usize) -> Vec3 {
    match axis {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    }
}

/// Every pass of one sample, pass 0 first.
///
/// For each valid mirror combination the plain mirrored pass comes first,
/// followed by its radial copies around X, Y and Z.
pub fn symmetry_passes(settings: &SculptSettings) -> Vec<SymmetryPass> {
    let symm = settings.symmetry;
    let mut passes = Vec::new();
    for i in 0..=symm {
        if !is_symmetry_iteration_valid(i, symm) {
            continue;
        }
        passes.push(SymmetryPass {
            mirror: i,
            ..SymmetryPass::IDENTITY
        });
        for (axis, &count) in settings.radial_symmetry.iter().enumerate() {
            for r in 1..count {
                passes.push(SymmetryPass {
                    mirror: i,
                    radial_axis: Some(axis),
                    radial_index: r,
                    angle: std::f32::consts::TAU * r as f32 / count as f32,
                });
            }
        }
    }
    trace!("symmetry_passes: {} passes for symmetry {}", passes.len(), symm);
    passes
}

fn calc_overlap(pass: &SymmetryPass, location: Vec3, radius: f32) -> f32 {
    let mirror = pass.apply(location);
    let dist_sq = mirror.distance_squared(location);
    if dist_sq <= 4.0 * radius * radius {
        (2.0 * radius - dist_sq.sqrt()) / (2.0 * radius)
    } else {
        0.0
    }
}

/// Strength scale that keeps overlapping mirrored dabs from adding up
pub fn calc_symmetry_feather(settings: &SculptSettings, true_location: Vec3, radius: f32) -> f32 {
    if !settings.symmetry_feather || radius <= 0.0 {
        return 1.0;
    }
    let overlap: f32 = symmetry_passes(settings)
        .iter()
        .map(|pass| calc_overlap(pass, true_location, radius))
        .sum();
    if overlap > 0.0 { 1.0 / overlap } else { 1.0 }
}

/// Offsets of the repeated dabs covering `bounds` along the tiled axes.
///
/// The untiled position is not included; callers run it first.
pub fn tile_offsets(settings: &SculptSettings, bounds: &Aabb, location: Vec3, radius: f32) -> Vec<Vec3> {
    let step = Vec3::from(settings.tile_offset);
    let mut start = [0i32; 3];
    let mut end = [0i32; 3];
    for dim in 0..3 {
        if settings.tile[dim] && step[dim] > 0.0 {
            start[dim] = ((bounds.min[dim] - location[dim] - radius) / step[dim]) as i32;
            end[dim] = ((bounds.max[dim] - location[dim] + radius) / step[dim]) as i32;
        }
    }

    let mut offsets = Vec::new();
    for x in start[0]..=end[0] {
        for y in start[1]..=end[1] {
            for z in start[2]..=end[2] {
                if x == 0 && y == 0 && z == 0 {
                    continue;
                }
                offsets.push(Vec3::new(x as f32, y as f32, z as f32) * step);
            }
        }
    }
    trace!("tile_offsets: {} tiles", offsets.len());
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_validity_table() {
        // X only
        assert!(is_symmetry_iteration_valid(0, 1));
        assert!(is_symmetry_iteration_valid(1, 1));
        // XZ skips XY
        assert!(!is_symmetry_iteration_valid(3, 5));
        assert!(is_symmetry_iteration_valid(5, 5));
        assert!(is_symmetry_iteration_valid(4, 5));
        // YZ skips XY and XZ
        assert!(!is_symmetry_iteration_valid(3, 6));
        assert!(!is_symmetry_iteration_valid(5, 6));
        assert!(is_symmetry_iteration_valid(6, 6));
        // XYZ runs all eight
        assert!((0..=7).all(|i| is_symmetry_iteration_valid(i, 7)));
    }

    #[test]
    fn test_flip() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(flip_v3(v, 0), v);
        assert_eq!(flip_v3(v, 1), Vec3::new(-1.0, 2.0, 3.0));
        assert_eq!(flip_v3(v, 6), Vec3::new(1.0, -2.0, -3.0));
    }

    #[test]
    fn test_passes_start_with_identity() {
        let settings = SculptSettings {
            symmetry: 1,
            radial_symmetry: [1, 1, 4],
            ..Default::default()
        };
        let passes = symmetry_passes(&settings);
        // (identity + 3 radial) for mirror 0 and mirror 1
        assert_eq!(passes.len(), 8);
        assert!(passes[0].is_identity());
        assert_eq!(passes[1].radial_axis, Some(2));
        assert!((passes[2].angle - std::f32::consts::PI).abs() < 1e-5);
        assert_eq!(passes[4].mirror, 1);
        assert!(passes.iter().skip(1).all(|p| !p.is_identity()));
    }

    #[test]
    fn test_radial_pass_rotates() {
        let pass = SymmetryPass {
            mirror: 0,
            radial_axis: Some(2),
            radial_index: 1,
            angle: std::f32::consts::FRAC_PI_2,
        };
        let out = pass.apply(Vec3::X);
        assert!((out - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_feather() {
        let mut settings = SculptSettings::default();
        assert!((calc_symmetry_feather(&settings, Vec3::ZERO, 1.0) - 1.0).abs() < 1e-6);
        settings.symmetry_feather = true;
        // On the mirror plane both copies overlap completely
        assert!((calc_symmetry_feather(&settings, Vec3::ZERO, 1.0) - 0.5).abs() < 1e-6);
        // Far from the plane only the original counts
        let far = calc_symmetry_feather(&settings, Vec3::new(5.0, 0.0, 0.0), 1.0);
        assert!((far - 1.0).abs() < 1e-6);
        // Half a radius away: 1 + (2 - 1) / 2
        let near = calc_symmetry_feather(&settings, Vec3::new(0.5, 0.0, 0.0), 1.0);
        assert!((near - 1.0 / 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_tile_offsets() {
        let settings = SculptSettings {
            tile: [true, false, false],
            tile_offset: [1.0, 1.0, 1.0],
            ..Default::default()
        };
        let bounds = Aabb::new(Vec3::new(-2.0, -1.0, 0.0), Vec3::new(2.0, 1.0, 0.0));
        let offsets = tile_offsets(&settings, &bounds, Vec3::ZERO, 0.5);
        // start = (-2 - 0.5) as i32 = -2, end = 2
        assert_eq!(offsets.len(), 4);
        assert!(offsets.contains(&Vec3::new(-2.0, 0.0, 0.0)));
        assert!(!offsets.contains(&Vec3::ZERO));
        assert!(tile_offsets(&SculptSettings::default(), &bounds, Vec3::ZERO, 0.5).is_empty());
    }
}
