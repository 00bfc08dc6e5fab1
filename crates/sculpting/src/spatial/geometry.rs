//! Triangle primitives used by raycasts and area sampling.

use glam::Vec3;

const EPSILON: f32 = 1e-6;

/// Distance and barycentric coordinates of a ray hit
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    pub t: f32,
    /// Weight of the second corner
    pub u: f32,
    /// Weight of the third corner
    pub v: f32,
}

/// Moller-Trumbore intersection, hits behind the origin are rejected
pub fn ray_triangle_intersection(
    origin: Vec3,
    direction: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let pvec = direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    if t < EPSILON {
        return None;
    }
    Some(TriangleHit { t, u, v })
}

/// Closest point to `p` on triangle `(a, b, c)`, by Voronoi region
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_hits_triangle() {
        let hit = ray_triangle_intersection(
            Vec3::new(0.25, 0.25, 1.0),
            Vec3::NEG_Z,
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        )
        .unwrap();
        assert!((hit.t - 1.0).abs() < 1e-5);
        assert!((hit.u - 0.25).abs() < 1e-5);
        assert!((hit.v - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_ray_misses_outside_and_behind() {
        let miss = ray_triangle_intersection(
            Vec3::new(2.0, 2.0, 1.0),
            Vec3::NEG_Z,
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        );
        assert!(miss.is_none());
        let behind =
            ray_triangle_intersection(Vec3::new(0.2, 0.2, 1.0), Vec3::Z, Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!(behind.is_none());
    }

    #[test]
    fn test_closest_point_regions() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        // Inside projects straight down
        let p = closest_point_on_triangle(Vec3::new(0.2, 0.2, 3.0), a, b, c);
        assert!((p - Vec3::new(0.2, 0.2, 0.0)).length() < 1e-5);
        // Vertex region
        let p = closest_point_on_triangle(Vec3::new(-1.0, -1.0, 0.0), a, b, c);
        assert!(p.length() < 1e-5);
        // Edge region of the hypotenuse
        let p = closest_point_on_triangle(Vec3::new(1.0, 1.0, 0.0), a, b, c);
        assert!((p - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-5);
    }
}
