//! Multiresolution grid hierarchy.
//!
//! Every corner of every base polygon owns one `grid_size × grid_size` grid.
//! Grid `(0, 0)` sits on the polygon center, `(gs-1, 0)` on the midpoint of
//! the edge leaving the corner, `(0, gs-1)` on the midpoint of the edge
//! entering it and `(gs-1, gs-1)` on the corner vertex itself. Elements on
//! grid borders describe the same surface point as elements of adjacent
//! grids; those duplicates are grouped under one canonical element so
//! neighbor queries and iteration can treat the point once.
//!
//! Positions are bilinear over the base polygon. Evaluating a smooth limit
//! surface is the job of whoever builds the hierarchy, not of the engine.

use std::collections::HashMap;

use glam::{Vec3, Vec4};
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{Result, SculptError};
use crate::mesh::indexed::IndexedMesh;
use crate::neighbors::NeighborIter;

/// Grid dimensions shared by all grids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridKey {
    pub grid_size: usize,
    pub grid_area: usize,
}

/// Position of an element inside its grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCoord {
    pub grid: u32,
    pub x: u32,
    pub y: u32,
}

/// What part of the base mesh an element overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseAdjacency {
    /// Strictly inside one base face
    None,
    /// On a base vertex
    Vertex(u32),
    /// On the interior of a base edge
    Edge(u32, u32),
}

/// Topological identity of a grid element, equal keys mean the same point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ElementKey {
    Corner(u32),
    /// Edge `(lo, hi)` and the step count measured from `lo`
    EdgePoint(u32, u32, u32),
    /// Face, spoke toward the midpoint entering corner `spoke`, step from the center
    Spoke(u32, u32, u32),
    FaceCenter(u32),
    Interior(u32),
}

type Group = SmallVec<[u32; 4]>;

/// Per-corner grids over an indexed base mesh
#[derive(Debug, Clone)]
pub struct GridHierarchy {
    base: IndexedMesh,
    key: GridKey,
    grid_face: Vec<u32>,
    grid_corner: Vec<u32>,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    masks: Vec<f32>,
    colors: Vec<Vec4>,
    hidden: Vec<bool>,
    canonical: Vec<u32>,
    duplicates: HashMap<u32, Group>,
    coarse: Vec<CoarseAdjacency>,
}

impl GridHierarchy {
    /// Build one grid per base-mesh corner
    pub fn from_base(base: IndexedMesh, grid_size: usize) -> Result<Self> {
        if grid_size < 2 {
            return Err(SculptError::InvalidGridSize(grid_size));
        }
        let key = GridKey {
            grid_size,
            grid_area: grid_size * grid_size,
        };
        let m = (grid_size - 1) as u32;

        let grid_count = base.corner_verts().len();
        let element_count = grid_count * key.grid_area;
        let mut grid_face = Vec::with_capacity(grid_count);
        let mut grid_corner = Vec::with_capacity(grid_count);
        let mut positions = Vec::with_capacity(element_count);
        let mut coarse = Vec::with_capacity(element_count);
        let mut canonical = Vec::with_capacity(element_count);
        let mut first_by_key: HashMap<ElementKey, u32> = HashMap::new();
        let mut duplicates: HashMap<u32, Group> = HashMap::new();

        for f in 0..base.face_count() as u32 {
            let verts = base.face_vertices(f).to_vec();
            let n = verts.len();
            let center = base.poly_center(f);
            for c in 0..n {
                let v_cur = verts[c];
                let v_next = verts[(c + 1) % n];
                let v_prev = verts[(c + n - 1) % n];
                let p_cur = base.positions()[v_cur as usize];
                let e_next = (p_cur + base.positions()[v_next as usize]) * 0.5;
                let e_prev = (base.positions()[v_prev as usize] + p_cur) * 0.5;

                let grid = grid_face.len() as u32;
                grid_face.push(f);
                grid_corner.push(c as u32);

                for y in 0..=m {
                    for x in 0..=m {
                        let u = x as f32 / m as f32;
                        let v = y as f32 / m as f32;
                        positions.push(
                            center * (1.0 - u) * (1.0 - v)
                                + e_next * u * (1.0 - v)
                                + e_prev * (1.0 - u) * v
                                + p_cur * u * v,
                        );

                        let element = grid * key.grid_area as u32 + y * grid_size as u32 + x;
                        let element_key = if x == m && y == m {
                            ElementKey::Corner(v_cur)
                        } else if x == m {
                            edge_point(v_cur, v_next, m - y, m)
                        } else if y == m {
                            edge_point(v_cur, v_prev, m - x, m)
                        } else if x == 0 && y == 0 {
                            ElementKey::FaceCenter(f)
                        } else if x == 0 {
                            ElementKey::Spoke(f, c as u32, y)
                        } else if y == 0 {
                            ElementKey::Spoke(f, ((c + 1) % n) as u32, x)
                        } else {
                            ElementKey::Interior(element)
                        };

                        coarse.push(match element_key {
                            ElementKey::Corner(vertex) => CoarseAdjacency::Vertex(vertex),
                            ElementKey::EdgePoint(lo, hi, _) => CoarseAdjacency::Edge(lo, hi),
                            _ => CoarseAdjacency::None,
                        });

                        let first = *first_by_key.entry(element_key).or_insert(element);
                        canonical.push(first);
                        if first != element {
                            duplicates
                                .entry(first)
                                .or_insert_with(|| SmallVec::from_slice(&[first]))
                                .push(element);
                        }
                    }
                }
            }
        }

        // Coincident elements share one position exactly
        for (&first, group) in &duplicates {
            let p = positions[first as usize];
            for &member in group.iter() {
                positions[member as usize] = p;
            }
        }

        let mut grids = Self {
            base,
            key,
            grid_face,
            grid_corner,
            normals: vec![Vec3::Z; element_count],
            masks: vec![0.0; element_count],
            colors: vec![Vec4::ONE; element_count],
            hidden: vec![false; element_count],
            positions,
            canonical,
            duplicates,
            coarse,
        };
        let all: Vec<u32> = (0..element_count as u32).collect();
        grids.recalc_normals(&all);

        debug!(
            "GridHierarchy: {} grids of {}x{}, {} elements, {} shared points",
            grid_count,
            grid_size,
            grid_size,
            element_count,
            grids.duplicates.len()
        );
        Ok(grids)
    }

    pub fn key(&self) -> GridKey {
        self.key
    }

    pub fn base(&self) -> &IndexedMesh {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut IndexedMesh {
        &mut self.base
    }

    pub fn grid_count(&self) -> usize {
        self.grid_face.len()
    }

    pub fn element_count(&self) -> usize {
        self.positions.len()
    }

    pub fn coord(&self, element: u32) -> GridCoord {
        let area = self.key.grid_area as u32;
        let gs = self.key.grid_size as u32;
        let local = element % area;
        GridCoord {
            grid: element / area,
            x: local % gs,
            y: local / gs,
        }
    }

    pub fn element(&self, coord: GridCoord) -> u32 {
        coord.grid * self.key.grid_area as u32 + coord.y * self.key.grid_size as u32 + coord.x
    }

    /// Base face a grid element lies in
    pub fn face_of(&self, element: u32) -> u32 {
        self.grid_face[(element / self.key.grid_area as u32) as usize]
    }

    /// Corner of the base face the element's grid belongs to
    pub fn corner_of(&self, element: u32) -> u32 {
        self.grid_corner[(element / self.key.grid_area as u32) as usize]
    }

    pub fn canonical(&self, element: u32) -> u32 {
        self.canonical[element as usize]
    }

    pub fn is_canonical(&self, element: u32) -> bool {
        self.canonical[element as usize] == element
    }

    /// All elements at the same point as `element`, canonical first
    pub fn coincident(&self, element: u32) -> &[u32] {
        let first = self.canonical(element);
        match self.duplicates.get(&first) {
            Some(group) => group.as_slice(),
            None => std::slice::from_ref(&self.canonical[element as usize]),
        }
    }

    /// Every element of the grids of base face `f`, with the duplicates
    /// that other faces' grids hold along its border
    pub fn face_elements(&self, f: u32) -> Vec<u32> {
        let area = self.key.grid_area as u32;
        let mut out = Vec::new();
        for (grid, _) in self.grid_face.iter().enumerate().filter(|(_, face)| **face == f) {
            let start = grid as u32 * area;
            for element in start..start + area {
                out.extend_from_slice(self.coincident(element));
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn coarse_adjacency(&self, element: u32) -> CoarseAdjacency {
        self.coarse[element as usize]
    }

    pub fn co(&self, element: u32) -> Vec3 {
        self.positions[element as usize]
    }

    pub fn set_co(&mut self, element: u32, co: Vec3) {
        let first = self.canonical(element);
        match self.duplicates.get(&first) {
            Some(group) => {
                for &member in group.iter() {
                    self.positions[member as usize] = co;
                }
            }
            None => self.positions[element as usize] = co,
        }
    }

    pub fn normal(&self, element: u32) -> Vec3 {
        self.normals[element as usize]
    }

    pub fn mask(&self, element: u32) -> f32 {
        self.masks[element as usize]
    }

    pub fn set_mask(&mut self, element: u32, mask: f32) {
        for member in self.coincident(element).to_vec() {
            self.masks[member as usize] = mask;
        }
    }

    pub fn color(&self, element: u32) -> Vec4 {
        self.colors[element as usize]
    }

    pub fn set_color(&mut self, element: u32, color: Vec4) {
        for member in self.coincident(element).to_vec() {
            self.colors[member as usize] = color;
        }
    }

    pub fn hidden(&self, element: u32) -> bool {
        self.hidden[element as usize]
    }

    pub fn set_hidden(&mut self, element: u32, hidden: bool) {
        for member in self.coincident(element).to_vec() {
            self.hidden[member as usize] = hidden;
        }
    }

    /// Four-connected neighbors across every coincident element, as canonical ids
    pub(crate) fn collect_neighbors(
        &self,
        element: u32,
        include_duplicates: bool,
        out: &mut NeighborIter,
    ) {
        let own = self.canonical(element);
        let m = self.key.grid_size as i64 - 1;
        for &member in self.coincident(element) {
            let GridCoord { grid, x, y } = self.coord(member);
            for (dx, dy) in [(1i64, 0i64), (-1, 0), (0, 1), (0, -1)] {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if !(0..=m).contains(&nx) || !(0..=m).contains(&ny) {
                    continue;
                }
                let neighbor = self.canonical(self.element(GridCoord {
                    grid,
                    x: nx as u32,
                    y: ny as u32,
                }));
                if neighbor != own {
                    out.push_real(neighbor, None);
                }
            }
        }

        if include_duplicates {
            for &member in self.coincident(element) {
                if member != element {
                    out.push_duplicate(member);
                }
            }
        }
    }

    fn clamped_co(&self, grid: u32, x: i64, y: i64) -> Vec3 {
        let m = self.key.grid_size as i64 - 1;
        self.co(self.element(GridCoord {
            grid,
            x: x.clamp(0, m) as u32,
            y: y.clamp(0, m) as u32,
        }))
    }

    /// Recompute normals from grid-space central differences
    pub fn recalc_normals(&mut self, elements: &[u32]) {
        for &element in elements {
            let first = self.canonical(element);
            let GridCoord { grid, x, y } = self.coord(first);
            let (x, y) = (x as i64, y as i64);
            let du = self.clamped_co(grid, x + 1, y) - self.clamped_co(grid, x - 1, y);
            let dv = self.clamped_co(grid, x, y + 1) - self.clamped_co(grid, x, y - 1);
            let normal = dv.cross(du).normalize_or_zero();
            if normal == Vec3::ZERO {
                continue;
            }
            for member in self.coincident(first).to_vec() {
                self.normals[member as usize] = normal;
            }
        }
    }

    /// Two triangles per grid cell, over canonical ids
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        let gs = self.key.grid_size as u32;
        let mut tris = Vec::with_capacity(self.grid_count() * ((gs - 1) * (gs - 1) * 2) as usize);
        for grid in 0..self.grid_count() as u32 {
            for y in 0..gs - 1 {
                for x in 0..gs - 1 {
                    let at = |x, y| self.canonical(self.element(GridCoord { grid, x, y }));
                    let a = at(x, y);
                    let b = at(x + 1, y);
                    let c = at(x + 1, y + 1);
                    let d = at(x, y + 1);
                    tris.push([a, d, c]);
                    tris.push([a, c, b]);
                }
            }
        }
        tris
    }
}

fn edge_point(from: u32, to: u32, steps_from_from: u32, m: u32) -> ElementKey {
    if from < to {
        ElementKey::EdgePoint(from, to, steps_from_from)
    } else {
        ElementKey::EdgePoint(to, from, 2 * m - steps_from_from)
    }
}
