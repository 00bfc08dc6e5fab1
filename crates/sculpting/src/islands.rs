//! Connected components and the fake-neighbor overlay bridging them.

use std::collections::VecDeque;

use tracing::debug;

use crate::mesh::SculptMesh;
use crate::neighbors::NeighborIter;
use crate::query::nearest_vertex;
use crate::spatial::SpatialIndex;

/// Component id of vertices no island claimed (dead dynamic-mesh slots)
pub const NO_COMPONENT: u32 = u32::MAX;

/// Island id per vertex index
#[derive(Debug, Clone)]
pub struct ConnectedComponents {
    ids: Vec<u32>,
    count: u32,
}

impl ConnectedComponents {
    /// Flood every island from its lowest unvisited vertex
    pub fn build(mesh: &SculptMesh) -> Self {
        let n = mesh.vertex_count();
        let mut ids = vec![NO_COMPONENT; n];
        let mut queue = VecDeque::new();
        let mut count = 0;

        for seed in 0..n as u32 {
            if !mesh.is_unique(seed) || ids[seed as usize] != NO_COMPONENT {
                continue;
            }
            ids[seed as usize] = count;
            queue.push_back(seed);
            while let Some(v) = queue.pop_front() {
                let mut ring = NeighborIter::new(mesh.kind());
                mesh.collect_neighbors(v, false, &mut ring);
                for to in ring.indices() {
                    if ids[to as usize] == NO_COMPONENT {
                        ids[to as usize] = count;
                        queue.push_back(to);
                    }
                }
            }
            count += 1;
        }

        // Grid duplicates share their canonical element's island
        if let SculptMesh::Grids(grids) = mesh {
            for v in 0..n {
                if ids[v] == NO_COMPONENT {
                    ids[v] = ids[grids.canonical(v as u32) as usize];
                }
            }
        }

        debug!(
            "ConnectedComponents::build: {} islands over {} vertices",
            count, n
        );
        Self { ids, count }
    }

    pub fn get(&self, v: u32) -> u32 {
        self.ids[v as usize]
    }

    /// Number of islands
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// At most one synthetic neighbor per vertex, always stored on both ends
#[derive(Debug, Clone)]
pub struct FakeNeighbors {
    slots: Vec<Option<u32>>,
    max_distance: f32,
}

impl FakeNeighbors {
    /// Empty overlay for `count` vertices
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
            max_distance: 0.0,
        }
    }

    /// Link every vertex to the nearest free vertex of another island
    /// within `max_distance`
    pub fn build<S: SpatialIndex + ?Sized>(
        mesh: &SculptMesh,
        spatial: &S,
        components: &ConnectedComponents,
        max_distance: f32,
        min_nodes_per_task: usize,
    ) -> Self {
        let mut fake = Self::new(mesh.vertex_count());
        fake.max_distance = max_distance;

        for v in 0..mesh.vertex_count() as u32 {
            if !mesh.is_unique(v) || fake.get(v).is_some() {
                continue;
            }
            let island = components.get(v);
            let slots = &fake.slots;
            let found = nearest_vertex(
                mesh,
                spatial,
                mesh.co(v),
                max_distance,
                min_nodes_per_task,
                |other| components.get(other) != island && slots[other as usize].is_none(),
            );
            if let Some(other) = found {
                fake.link(v, other);
            }
        }

        debug!(
            "FakeNeighbors::build: {} links within {}",
            fake.link_count(),
            max_distance
        );
        fake
    }

    /// Pair two vertices, replacing nothing already linked
    pub fn link(&mut self, a: u32, b: u32) {
        self.slots[a as usize] = Some(b);
        self.slots[b as usize] = Some(a);
    }

    pub fn get(&self, v: u32) -> Option<u32> {
        self.slots.get(v as usize).copied().flatten()
    }

    /// Distance the overlay was built for
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// Number of bridged pairs
    pub fn link_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count() / 2
    }
}
