//! Breadth-first walk over vertex connectivity.

use std::collections::VecDeque;

use crate::islands::FakeNeighbors;
use crate::mesh::SculptMesh;
use crate::neighbors::vertex_neighbors;
use crate::query::nearest_vertex;
use crate::spatial::SpatialIndex;
use crate::stroke::symmetry::{flip_v3, is_symmetry_iteration_valid};

/// Queue plus visited bitmap. Seeds count as visited.
#[derive(Debug, Clone)]
pub struct FloodFill {
    queue: VecDeque<u32>,
    visited: Vec<bool>,
}

impl FloodFill {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: vec![false; vertex_count],
        }
    }

    pub fn add_initial(&mut self, v: u32) {
        if !self.visited[v as usize] {
            self.visited[v as usize] = true;
            self.queue.push_back(v);
        }
    }

    /// Seed `v` and the vertex nearest to each mirrored copy of it.
    ///
    /// Mirrored seeds are only searched when `radius > 0`; `f32::MAX`
    /// searches the whole mesh.
    pub fn add_initial_with_symmetry<S: SpatialIndex + ?Sized>(
        &mut self,
        mesh: &SculptMesh,
        spatial: &S,
        symmetry: u8,
        v: u32,
        radius: f32,
    ) {
        for i in 0..=symmetry {
            if !is_symmetry_iteration_valid(i, symmetry) {
                continue;
            }
            let seed = if i == 0 {
                Some(v)
            } else if radius > 0.0 {
                let location = flip_v3(mesh.co(v), i);
                nearest_vertex(mesh, spatial, location, radius, 1, |_| true)
            } else {
                None
            };
            if let Some(seed) = seed {
                self.add_initial(seed);
            }
        }
    }

    pub fn is_visited(&self, v: u32) -> bool {
        self.visited[v as usize]
    }

    /// Run `visit(from, to, is_duplicate)` on every reachable visible
    /// vertex. Returning `false` stops the walk from expanding past `to`.
    pub fn execute<F>(&mut self, mesh: &SculptMesh, fake: Option<&FakeNeighbors>, mut visit: F)
    where
        F: FnMut(u32, u32, bool) -> bool,
    {
        while let Some(from) = self.queue.pop_front() {
            let ring = vertex_neighbors(mesh, fake, mesh.index_to_vertex(from), true);
            for neighbor in &ring {
                let to = neighbor.index();
                if self.visited[to as usize] || !mesh.visible(to) {
                    continue;
                }
                self.visited[to as usize] = true;
                if visit(from, to, neighbor.is_duplicate()) {
                    self.queue.push_back(to);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::islands::ConnectedComponents;
    use crate::spatial::NodeTree;
    use crate::test_fixtures;
    use glam::Vec3;

    #[test]
    fn test_fill_covers_plane() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(4));
        let mut flood = FloodFill::new(mesh.vertex_count());
        flood.add_initial(0);
        let mut visits = 0;
        flood.execute(&mesh, None, |_, _, _| {
            visits += 1;
            true
        });
        assert_eq!(visits, 15);
        assert!((0..16).all(|v| flood.is_visited(v)));
    }

    #[test]
    fn test_callback_prunes() {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(4));
        let mut flood = FloodFill::new(mesh.vertex_count());
        flood.add_initial(0);
        flood.execute(&mesh, None, |_, to, _| mesh.co(to).x < 1.5);
        // Column 2 is reached but never expanded, so column 3 stays unvisited
        assert!(flood.is_visited(2));
        assert!(!flood.is_visited(3));
    }

    #[test]
    fn test_hidden_vertices_block() {
        let mut mesh = SculptMesh::Indexed(test_fixtures::two_islands(0.1));
        mesh.set_visible(1, false);
        mesh.set_visible(3, false);
        let mut flood = FloodFill::new(mesh.vertex_count());
        flood.add_initial(0);
        flood.execute(&mesh, None, |_, _, _| true);
        assert!(!flood.is_visited(1));
        assert!(!flood.is_visited(2));
    }

    #[test]
    fn test_fake_edge_bridges_islands_once() {
        let mut mesh = SculptMesh::Indexed(test_fixtures::two_islands(0.1));
        // Keep a single pair within reach
        mesh.set_co(7, Vec3::new(1.6, 1.0, 0.0));
        let tree = NodeTree::build(&mesh);
        let components = ConnectedComponents::build(&mesh);
        let fake = FakeNeighbors::build(&mesh, &tree, &components, 0.15, 1);
        assert_eq!(fake.link_count(), 1);

        let mut flood = FloodFill::new(mesh.vertex_count());
        flood.add_initial(0);
        let mut crossings = Vec::new();
        flood.execute(&mesh, Some(&fake), |from, to, _| {
            if components.get(from) != components.get(to) {
                crossings.push((from, to));
            }
            true
        });
        assert_eq!(crossings, vec![(1, 4)]);
        assert!((0..8).all(|v| flood.is_visited(v)));
    }

    #[test]
    fn test_symmetric_seeds() {
        let mesh = SculptMesh::Indexed(test_fixtures::centered_plane(5));
        let tree = NodeTree::build(&mesh);
        let mut flood = FloodFill::new(mesh.vertex_count());
        // (-1, 0) mirrors onto (1, 0)
        flood.add_initial_with_symmetry(&mesh, &tree, 1, 10, f32::MAX);
        assert!(flood.is_visited(10));
        assert!(flood.is_visited(14));
        let mut plain = FloodFill::new(mesh.vertex_count());
        plain.add_initial_with_symmetry(&mesh, &tree, 1, 10, 0.0);
        assert!(!plain.is_visited(14));
    }
}
