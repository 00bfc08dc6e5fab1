//! Point queries answered through the spatial index.

use rayon::prelude::*;

use glam::Vec3;

use crate::mesh::SculptMesh;
use crate::spatial::{BoundsKind, SpatialIndex};

/// Closest visible vertex to `location` no farther than `max_distance`
/// that also passes `filter`.
///
/// Nodes are searched in parallel; ties resolve to the lower index so the
/// result does not depend on reduction order.
pub fn nearest_vertex<S, F>(
    mesh: &SculptMesh,
    spatial: &S,
    location: Vec3,
    max_distance: f32,
    min_nodes_per_task: usize,
    filter: F,
) -> Option<u32>
where
    S: SpatialIndex + ?Sized,
    F: Fn(u32) -> bool + Sync,
{
    let max_sq = if max_distance == f32::MAX {
        f32::MAX
    } else {
        max_distance * max_distance
    };
    let nodes = spatial.gather_nodes(BoundsKind::Current, &|b| {
        b.intersects_sphere(location, max_distance)
    });
    if nodes.is_empty() {
        return None;
    }

    nodes
        .par_iter()
        .with_min_len(min_nodes_per_task)
        .filter_map(|&node| {
            spatial
                .node_vertices(node)
                .iter()
                .filter(|&&v| mesh.visible(v) && filter(v))
                .map(|&v| (mesh.co(v).distance_squared(location), v))
                .filter(|(d, _)| *d <= max_sq)
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        })
        .reduce_with(|a, b| {
            if b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)).is_lt() {
                b
            } else {
                a
            }
        })
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{NodeTree, TreeConfig};
    use crate::test_fixtures;

    #[test]
    fn test_nearest_vertex_on_plane() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(6));
        let tree = NodeTree::with_config(
            &mesh,
            TreeConfig {
                max_vertices_per_node: 4,
                max_depth: 8,
            },
        );
        let found = nearest_vertex(&mesh, &tree, Vec3::new(2.1, 2.9, 0.3), 1.0, 1, |_| true);
        assert_eq!(found, Some(3 * 6 + 2));
    }

    #[test]
    fn test_nearest_vertex_respects_radius_and_filter() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(3));
        let tree = NodeTree::build(&mesh);
        assert_eq!(
            nearest_vertex(&mesh, &tree, Vec3::new(10.0, 10.0, 0.0), 1.0, 1, |_| true),
            None
        );
        let found = nearest_vertex(&mesh, &tree, Vec3::ZERO, 5.0, 1, |v| v != 0);
        // Equidistant candidates resolve to the lower index
        assert_eq!(found, Some(1));
    }

    #[test]
    fn test_nearest_vertex_skips_hidden() {
        let mut mesh = SculptMesh::Indexed(test_fixtures::grid_plane(3));
        mesh.set_visible(0, false);
        let tree = NodeTree::build(&mesh);
        let found = nearest_vertex(&mesh, &tree, Vec3::ZERO, f32::MAX, 1, |_| true);
        assert_eq!(found, Some(1));
    }
}
