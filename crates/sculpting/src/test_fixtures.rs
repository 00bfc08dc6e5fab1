//! Small meshes shared by the unit tests.

use glam::Vec3;

use crate::mesh::{DynamicMesh, GridHierarchy, IndexedMesh};

/// Square of side 2 centered at the origin, split into two triangles
pub fn unit_square() -> IndexedMesh {
    let positions = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ];
    IndexedMesh::from_polygons(positions, &[vec![0, 1, 2], vec![0, 2, 3]]).unwrap()
}

/// The same square with a center vertex, four triangles fanned around it
pub fn centered_square() -> IndexedMesh {
    let positions = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::ZERO,
    ];
    IndexedMesh::from_polygons(
        positions,
        &[vec![0, 1, 4], vec![1, 2, 4], vec![2, 3, 4], vec![3, 0, 4]],
    )
    .unwrap()
}

fn plane_positions(n: usize) -> Vec<Vec3> {
    let mut positions = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            positions.push(Vec3::new(i as f32, j as f32, 0.0));
        }
    }
    positions
}

/// `n × n` vertices at integer coordinates, `(n-1)²` quads facing +Z.
///
/// Vertex `(i, j)` has index `j * n + i`.
pub fn grid_plane(n: usize) -> IndexedMesh {
    let mut faces = Vec::new();
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let a = (j * n + i) as u32;
            let b = a + 1;
            let c = b + n as u32;
            let d = a + n as u32;
            faces.push(vec![a, b, c, d]);
        }
    }
    IndexedMesh::from_polygons(plane_positions(n), &faces).unwrap()
}

/// Grid hierarchy over a 3x3 vertex plane (four base quads)
pub fn quad_grids(grid_size: usize) -> GridHierarchy {
    GridHierarchy::from_base(grid_plane(3), grid_size).unwrap()
}

/// Triangulated version of [`grid_plane`], each quad split along `a → c`
pub fn dynamic_plane(n: usize) -> DynamicMesh {
    let mut indices = Vec::new();
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let a = (j * n + i) as u32;
            let b = a + 1;
            let c = b + n as u32;
            let d = a + n as u32;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    DynamicMesh::from_triangles(plane_positions(n), &indices).unwrap()
}

/// Two unit squares side by side on the X axis, `gap` apart.
///
/// Vertices 0..4 form island A, 4..8 island B. Vertex 1 and 4 face each other.
pub fn two_islands(gap: f32) -> IndexedMesh {
    let x = 1.0 + gap;
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(x, 0.0, 0.0),
        Vec3::new(x + 1.0, 0.0, 0.0),
        Vec3::new(x + 1.0, 1.0, 0.0),
        Vec3::new(x, 1.0, 0.0),
    ];
    IndexedMesh::from_polygons(positions, &[vec![0, 1, 2, 3], vec![4, 5, 6, 7]]).unwrap()
}

/// Plane of `n × n` vertices centered on the origin, spacing `2 / (n - 1)`
pub fn centered_plane(n: usize) -> IndexedMesh {
    let step = 2.0 / (n - 1) as f32;
    let positions = plane_positions(n)
        .into_iter()
        .map(|p| Vec3::new(p.x * step - 1.0, p.y * step - 1.0, 0.0))
        .collect();
    let mut faces = Vec::new();
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let a = (j * n + i) as u32;
            faces.push(vec![a, a + 1, a + 1 + n as u32, a + n as u32]);
        }
    }
    IndexedMesh::from_polygons(positions, &faces).unwrap()
}
