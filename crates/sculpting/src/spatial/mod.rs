//! Spatial partition contract.
//!
//! The engine consumes its spatial index through [`SpatialIndex`]: gather
//! nodes whose bounds pass a predicate, read a node's vertices and
//! triangles, track per-node dirty state, and cast rays. [`NodeTree`] is the
//! implementation sessions use by default.

mod geometry;
mod tree;

use glam::Vec3;

pub use geometry::{TriangleHit, closest_point_on_triangle, ray_triangle_intersection};
pub use tree::{NodeTree, TreeConfig};

use crate::mesh::{MeshTriangle, SculptMesh};

/// Index of a leaf node
pub type NodeId = u32;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// Whether the box touches an infinite cylinder of `radius` around the
    /// line through `center` along `axis` (unit length)
    pub fn intersects_tube(&self, center: Vec3, axis: Vec3, radius: f32) -> bool {
        // Conservative: test the box's bounding sphere against the line
        let half = self.size().length() * 0.5;
        let offset = self.center() - center;
        let perpendicular = offset - axis * offset.dot(axis);
        perpendicular.length() <= radius + half
    }

    /// Entry distance of a ray, `None` if it misses
    pub fn ray_entry(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let inv = direction.recip();
        let t0 = (self.min - origin) * inv;
        let t1 = (self.max - origin) * inv;
        let near = t0.min(t1).max_element();
        let far = t0.max(t1).min_element();
        if far >= near.max(0.0) {
            Some(near.max(0.0))
        } else {
            None
        }
    }

    /// Octant of `point` relative to the box center (0-7)
    fn octant_for_point(&self, point: Vec3) -> usize {
        let center = self.center();
        let mut index = 0;
        if point.x >= center.x {
            index |= 1;
        }
        if point.y >= center.y {
            index |= 2;
        }
        if point.z >= center.z {
            index |= 4;
        }
        index
    }
}

/// Per-node dirty bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeDirty(pub u8);

impl NodeDirty {
    pub const NONE: Self = Self(0);
    /// Needs to be redrawn
    pub const REDRAW: Self = Self(1 << 0);
    /// Current bounds are stale
    pub const BOUNDS: Self = Self(1 << 1);
    pub const NORMALS: Self = Self(1 << 2);
    pub const MASK: Self = Self(1 << 3);
    pub const COLOR: Self = Self(1 << 4);
    pub const VISIBILITY: Self = Self(1 << 5);
    pub const FACE_SETS: Self = Self(1 << 6);
    pub const TOPOLOGY: Self = Self(1 << 7);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for NodeDirty {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for NodeDirty {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Which set of node bounds a query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsKind {
    Current,
    /// Bounds stored when the stroke started
    Original,
}

/// Closest ray hit against the mesh surface
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub node: NodeId,
    pub triangle: MeshTriangle,
    /// Triangle corner closest to the hit point
    pub vertex: u32,
    /// Distance along the ray
    pub depth: f32,
    pub position: Vec3,
}

/// Node-gather, bounds and raycast contract of the spatial partition
pub trait SpatialIndex: Send + Sync {
    fn node_count(&self) -> usize;

    /// Leaf nodes whose bounds of the given kind pass `predicate`
    fn gather_nodes(&self, kind: BoundsKind, predicate: &dyn Fn(&Aabb) -> bool) -> Vec<NodeId>;

    /// Unique vertices owned by a node
    fn node_vertices(&self, node: NodeId) -> &[u32];

    /// Triangles owned by a node
    fn node_triangles(&self, node: NodeId) -> &[MeshTriangle];

    fn node_bounds(&self, node: NodeId, kind: BoundsKind) -> Aabb;

    /// Node owning a vertex; grid duplicates resolve through their canonical element
    fn vertex_node(&self, v: u32) -> Option<NodeId>;

    fn node_mark_dirty(&mut self, node: NodeId, flags: NodeDirty);

    fn node_dirty(&self, node: NodeId) -> NodeDirty;

    /// Refit nodes flagged [`NodeDirty::BOUNDS`] and clear redraw state.
    ///
    /// Returns the union of the bounds of every node that needed a redraw.
    fn update_bounds(&mut self, mesh: &SculptMesh) -> Aabb;

    /// Copy current bounds into the original bounds
    fn store_original_bounds(&mut self);

    /// Rebuild after a topology change
    fn rebuild(&mut self, mesh: &SculptMesh);

    /// Closest surface hit along a ray
    fn raycast(&self, mesh: &SculptMesh, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }
        let nodes = self.gather_nodes(BoundsKind::Current, &|bounds| {
            bounds.ray_entry(origin, direction).is_some()
        });

        let mut best: Option<RayHit> = None;
        for node in nodes {
            for tri in self.node_triangles(node) {
                let [a, b, c] = tri.verts.map(|v| mesh.co(v));
                let Some(hit) = ray_triangle_intersection(origin, direction, a, b, c) else {
                    continue;
                };
                if best.is_some_and(|best| best.depth <= hit.t) {
                    continue;
                }
                let position = origin + direction * hit.t;
                let vertex = tri
                    .verts
                    .into_iter()
                    .min_by(|&x, &y| {
                        mesh.co(x)
                            .distance_squared(position)
                            .total_cmp(&mesh.co(y).distance_squared(position))
                    })
                    .unwrap_or(tri.verts[0]);
                best = Some(RayHit {
                    node,
                    triangle: *tri,
                    vertex,
                    depth: hit.t,
                    position,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_include_and_contains() {
        let mut bounds = Aabb::empty();
        assert!(bounds.is_empty());
        bounds.include_point(Vec3::ZERO);
        bounds.include_point(Vec3::ONE);
        assert!(!bounds.is_empty());
        assert!(bounds.contains_point(Vec3::splat(0.5)));
        assert!(!bounds.contains_point(Vec3::splat(1.5)));
        assert_eq!(bounds.center(), Vec3::splat(0.5));
    }

    #[test]
    fn test_aabb_sphere_and_tube() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(bounds.intersects_sphere(Vec3::new(1.5, 0.5, 0.5), 0.6));
        assert!(!bounds.intersects_sphere(Vec3::new(3.0, 0.5, 0.5), 0.6));
        // A tube along Z far above the box in Z still hits it
        assert!(bounds.intersects_tube(Vec3::new(0.5, 0.5, 100.0), Vec3::Z, 0.1));
        assert!(!bounds.intersects_tube(Vec3::new(5.0, 0.5, 0.0), Vec3::Z, 0.1));
    }

    #[test]
    fn test_ray_entry() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let t = bounds.ray_entry(Vec3::new(0.5, 0.5, 5.0), Vec3::NEG_Z).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
        assert!(bounds.ray_entry(Vec3::new(0.5, 0.5, 5.0), Vec3::Z).is_none());
        // Origin inside the box
        assert_eq!(bounds.ray_entry(Vec3::splat(0.5), Vec3::X), Some(0.0));
    }

    #[test]
    fn test_node_dirty_bits() {
        let mut dirty = NodeDirty::NONE;
        assert!(dirty.is_empty());
        dirty |= NodeDirty::REDRAW | NodeDirty::BOUNDS;
        assert!(dirty.contains(NodeDirty::REDRAW));
        assert!(!dirty.contains(NodeDirty::MASK));
    }
}
