//! Octant-split leaf partition of the mesh.

use glam::Vec3;
use tracing::debug;

use super::{Aabb, BoundsKind, NodeDirty, NodeId, SpatialIndex};
use crate::mesh::{MeshTriangle, SculptMesh};

/// Configuration for tree construction.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Leaves split while they hold more vertices than this
    pub max_vertices_per_node: usize,
    /// Maximum split depth
    pub max_depth: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_vertices_per_node: 128,
            max_depth: 10,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    vertices: Vec<u32>,
    triangles: Vec<MeshTriangle>,
    bounds: Aabb,
    orig_bounds: Aabb,
    dirty: NodeDirty,
}

/// Leaf nodes covering every unique vertex exactly once
#[derive(Debug, Clone)]
pub struct NodeTree {
    config: TreeConfig,
    nodes: Vec<Node>,
    vertex_node: Vec<Option<NodeId>>,
}

impl NodeTree {
    pub fn build(mesh: &SculptMesh) -> Self {
        Self::with_config(mesh, TreeConfig::default())
    }

    pub fn with_config(mesh: &SculptMesh, config: TreeConfig) -> Self {
        let mut tree = Self {
            config,
            nodes: Vec::new(),
            vertex_node: Vec::new(),
        };
        tree.rebuild(mesh);
        tree
    }

    fn split(
        &mut self,
        mesh: &SculptMesh,
        vertices: Vec<u32>,
        bounds: Aabb,
        depth: u32,
        leaves: &mut Vec<Vec<u32>>,
    ) {
        if vertices.len() <= self.config.max_vertices_per_node
            || depth >= self.config.max_depth
            || bounds.size().max_element() <= f32::EPSILON
        {
            leaves.push(vertices);
            return;
        }

        let mut octants: [Vec<u32>; 8] = Default::default();
        for v in vertices {
            octants[bounds.octant_for_point(mesh.co(v))].push(v);
        }
        // Coincident points cannot be separated by splitting
        if octants.iter().filter(|o| !o.is_empty()).count() == 1 {
            if let Some(only) = octants.into_iter().find(|o| !o.is_empty()) {
                leaves.push(only);
            }
            return;
        }
        for octant in octants {
            if octant.is_empty() {
                continue;
            }
            let mut child = Aabb::empty();
            for &v in &octant {
                child.include_point(mesh.co(v));
            }
            self.split(mesh, octant, child, depth + 1, leaves);
        }
    }

    fn compute_bounds(mesh: &SculptMesh, node: &Node) -> Aabb {
        let mut bounds = Aabb::empty();
        for &v in &node.vertices {
            bounds.include_point(mesh.co(v));
        }
        for tri in &node.triangles {
            for v in tri.verts {
                bounds.include_point(mesh.co(v));
            }
        }
        bounds
    }

    fn resolve(mesh: &SculptMesh, v: u32) -> u32 {
        match mesh {
            SculptMesh::Grids(grids) => grids.canonical(v),
            _ => v,
        }
    }

    /// Total vertex count over all nodes
    pub fn len(&self) -> usize {
        self.nodes.iter().map(|n| n.vertices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpatialIndex for NodeTree {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn gather_nodes(&self, kind: BoundsKind, predicate: &dyn Fn(&Aabb) -> bool) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                let bounds = match kind {
                    BoundsKind::Current => &node.bounds,
                    BoundsKind::Original => &node.orig_bounds,
                };
                !bounds.is_empty() && predicate(bounds)
            })
            .map(|(i, _)| i as NodeId)
            .collect()
    }

    fn node_vertices(&self, node: NodeId) -> &[u32] {
        &self.nodes[node as usize].vertices
    }

    fn node_triangles(&self, node: NodeId) -> &[MeshTriangle] {
        &self.nodes[node as usize].triangles
    }

    fn node_bounds(&self, node: NodeId, kind: BoundsKind) -> Aabb {
        let node = &self.nodes[node as usize];
        match kind {
            BoundsKind::Current => node.bounds,
            BoundsKind::Original => node.orig_bounds,
        }
    }

    fn vertex_node(&self, v: u32) -> Option<NodeId> {
        self.vertex_node.get(v as usize).copied().flatten()
    }

    fn node_mark_dirty(&mut self, node: NodeId, flags: NodeDirty) {
        self.nodes[node as usize].dirty |= flags;
    }

    fn node_dirty(&self, node: NodeId) -> NodeDirty {
        self.nodes[node as usize].dirty
    }

    fn update_bounds(&mut self, mesh: &SculptMesh) -> Aabb {
        let mut redraw = Aabb::empty();
        for i in 0..self.nodes.len() {
            let dirty = self.nodes[i].dirty;
            if dirty.contains(NodeDirty::BOUNDS) {
                self.nodes[i].bounds = Self::compute_bounds(mesh, &self.nodes[i]);
            }
            if dirty.contains(NodeDirty::REDRAW) {
                redraw = redraw.union(&self.nodes[i].bounds);
            }
            self.nodes[i].dirty = NodeDirty::NONE;
        }
        redraw
    }

    fn store_original_bounds(&mut self) {
        for node in &mut self.nodes {
            node.orig_bounds = node.bounds;
        }
    }

    fn rebuild(&mut self, mesh: &SculptMesh) {
        let vertices = mesh.unique_vertices();
        let mut bounds = Aabb::empty();
        for &v in &vertices {
            bounds.include_point(mesh.co(v));
        }

        let mut leaves = Vec::new();
        if !vertices.is_empty() {
            self.split(mesh, vertices, bounds, 0, &mut leaves);
        }

        let count = mesh.vertex_count();
        let mut vertex_node = vec![None; count];
        let mut nodes: Vec<Node> = leaves
            .into_iter()
            .enumerate()
            .map(|(i, vertices)| {
                for &v in &vertices {
                    vertex_node[v as usize] = Some(i as NodeId);
                }
                Node {
                    vertices,
                    triangles: Vec::new(),
                    bounds: Aabb::empty(),
                    orig_bounds: Aabb::empty(),
                    dirty: NodeDirty::NONE,
                }
            })
            .collect();
        for v in 0..count as u32 {
            if vertex_node[v as usize].is_none() {
                vertex_node[v as usize] = vertex_node[Self::resolve(mesh, v) as usize];
            }
        }

        for tri in mesh.triangles() {
            if let Some(node) = vertex_node[tri.verts[0] as usize] {
                nodes[node as usize].triangles.push(tri);
            }
        }
        for node in &mut nodes {
            node.bounds = Self::compute_bounds(mesh, node);
            node.orig_bounds = node.bounds;
        }

        debug!(
            "NodeTree::rebuild: {} nodes over {} vertices",
            nodes.len(),
            count
        );
        self.nodes = nodes;
        self.vertex_node = vertex_node;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;

    fn small_tree(mesh: &SculptMesh) -> NodeTree {
        NodeTree::with_config(
            mesh,
            TreeConfig {
                max_vertices_per_node: 4,
                max_depth: 8,
            },
        )
    }

    #[test]
    fn test_every_unique_vertex_in_one_node() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(6));
        let tree = small_tree(&mesh);
        assert!(tree.node_count() > 1);
        assert_eq!(tree.len(), 36);
        for v in 0..36 {
            let node = tree.vertex_node(v).unwrap();
            assert!(tree.node_vertices(node).contains(&v));
        }
    }

    #[test]
    fn test_grid_duplicates_resolve_to_canonical_node() {
        let mesh = SculptMesh::Grids(test_fixtures::quad_grids(3));
        let tree = small_tree(&mesh);
        let SculptMesh::Grids(grids) = &mesh else {
            unreachable!()
        };
        for v in 0..mesh.vertex_count() as u32 {
            assert_eq!(tree.vertex_node(v), tree.vertex_node(grids.canonical(v)));
        }
    }

    #[test]
    fn test_gather_sphere() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(6));
        let tree = small_tree(&mesh);
        let center = Vec3::new(0.0, 0.0, 0.0);
        let nodes = tree.gather_nodes(BoundsKind::Current, &|b| b.intersects_sphere(center, 0.5));
        assert!(!nodes.is_empty());
        assert!(nodes.len() < tree.node_count());
        assert!(nodes.iter().any(|&n| tree.node_vertices(n).contains(&0)));
    }

    #[test]
    fn test_update_bounds_refits_dirty_nodes() {
        let mut mesh = SculptMesh::Indexed(test_fixtures::grid_plane(3));
        let mut tree = NodeTree::build(&mesh);
        mesh.set_co(0, Vec3::new(0.0, 0.0, 2.0));
        let node = tree.vertex_node(0).unwrap();
        tree.node_mark_dirty(node, NodeDirty::BOUNDS | NodeDirty::REDRAW);
        let redraw = tree.update_bounds(&mesh);
        assert!((redraw.max.z - 2.0).abs() < 1e-6);
        assert!((tree.node_bounds(node, BoundsKind::Original).max.z).abs() < 1e-6);
        assert!(tree.node_dirty(node).is_empty());
    }

    #[test]
    fn test_raycast_hits_top_face() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(3));
        let tree = NodeTree::build(&mesh);
        let hit = tree
            .raycast(&mesh, Vec3::new(1.9, 1.9, 5.0), Vec3::NEG_Z)
            .unwrap();
        assert!((hit.depth - 5.0).abs() < 1e-5);
        assert_eq!(hit.vertex, 8);
        assert_eq!(hit.triangle.face, 3);
        assert!(tree.raycast(&mesh, Vec3::new(5.0, 5.0, 5.0), Vec3::NEG_Z).is_none());
    }
}
