//! Per-node displacement buffers and their merge into the mesh.
//!
//! Brush actions never write mesh storage. Every symmetry pass appends a
//! [`ProxyBuffer`] per touched node; after the last pass of a sample the
//! buffers are summed onto their base, clipped, and written back in one
//! sequential step. Buffers are consumed by the merge.

use std::collections::HashMap;

use glam::{Vec3, Vec4};
use rayon::prelude::*;
use relief_config::SculptSettings;
use tracing::{debug, trace};

use crate::attributes::VertexAttributes;
use crate::collaborators::{BrushSolver, DeformTarget};
use crate::mesh::SculptMesh;
use crate::spatial::{NodeDirty, NodeId, SpatialIndex};
use crate::stroke::StrokeCache;

/// Per-vertex values aligned with the node's vertex list
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyData {
    /// Coordinate offsets
    Co(Vec<Vec3>),
    /// Mask deltas
    Mask(Vec<f32>),
    /// Color deltas
    Color(Vec<Vec4>),
    /// Vertices whose faces take the stroke's face set
    FaceSet(Vec<bool>),
}

/// Output of one brush action on one node
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyBuffer {
    pub node: NodeId,
    pub data: ProxyData,
}

/// Buffers of one sample, grouped by node
pub type ProxyMap = HashMap<NodeId, Vec<ProxyBuffer>>;

/// Append buffers to the map of the current sample
pub fn collect_proxies(map: &mut ProxyMap, buffers: Vec<ProxyBuffer>) {
    for buffer in buffers {
        map.entry(buffer.node).or_default().push(buffer);
    }
}

/// Apply axis locks and mirror clipping to a proposed coordinate.
///
/// A locked axis keeps `current`. A clipped axis whose current value lies
/// within tolerance of the mirror plane snaps to 0.
pub fn clip(settings: &SculptSettings, current: Vec3, proposed: Vec3) -> Vec3 {
    let mut out = proposed;
    for axis in 0..3 {
        if settings.lock[axis] {
            out[axis] = current[axis];
        } else if settings.clip[axis] && current[axis].abs() <= settings.clip_tolerance[axis] {
            out[axis] = 0.0;
        }
    }
    out
}

/// Coordinates written by one merge, for normals and deform targets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombineResult {
    /// `(vertex, offset)` of every moved vertex
    pub offsets: Vec<(u32, Vec3)>,
    pub nodes: Vec<NodeId>,
    /// Positions went to the solver instead of the mesh
    pub redirected: bool,
}

/// Merge every buffer into the mesh and mark the touched nodes dirty.
///
/// Coordinates are computed per node in parallel, then written
/// sequentially. When `solver` accepts positions the coordinates go to it
/// and the mesh is left alone.
pub fn combine_proxies<S: SpatialIndex + ?Sized>(
    mesh: &mut SculptMesh,
    attrs: &VertexAttributes,
    spatial: &mut S,
    settings: &SculptSettings,
    cache: &StrokeCache,
    proxies: ProxyMap,
    solver: Option<&mut dyn BrushSolver>,
) -> CombineResult {
    let mut nodes: Vec<NodeId> = proxies.keys().copied().collect();
    nodes.sort_unstable();
    if nodes.is_empty() {
        return CombineResult::default();
    }
    let use_orig = cache.tool.uses_original_proxy_base();

    let positions: Vec<(u32, Vec3, Vec3)> = {
        let mesh = &*mesh;
        let spatial = &*spatial;
        nodes
            .par_iter()
            .with_min_len(settings.min_nodes_per_task)
            .flat_map_iter(|node| {
                let buffers = &proxies[node];
                let vertices = spatial.node_vertices(*node);
                let co_buffers: Vec<&[Vec3]> = buffers
                    .iter()
                    .filter_map(|b| match &b.data {
                        ProxyData::Co(offsets) => Some(offsets.as_slice()),
                        _ => None,
                    })
                    .collect();
                let mut out = Vec::new();
                if co_buffers.is_empty() {
                    return out.into_iter();
                }
                for (i, &v) in vertices.iter().enumerate() {
                    if !mesh.visible(v) {
                        continue;
                    }
                    let current = mesh.co(v);
                    let base = if use_orig {
                        attrs.orig(mesh, v, cache.stroke_id).co
                    } else {
                        current
                    };
                    let sum: Vec3 = co_buffers.iter().filter_map(|b| b.get(i)).sum();
                    let next = clip(settings, current, base + sum);
                    if next != current {
                        out.push((v, current, next));
                    }
                }
                out.into_iter()
            })
            .collect()
    };

    let mut result = CombineResult {
        offsets: positions.iter().map(|&(v, old, new)| (v, new - old)).collect(),
        nodes: nodes.clone(),
        redirected: false,
    };
    match solver {
        Some(solver) if solver.accepts_positions() => {
            let targets: Vec<(u32, Vec3)> = positions.iter().map(|&(v, _, new)| (v, new)).collect();
            solver.accept_positions(&targets);
            result.redirected = true;
        }
        _ => {
            for &(v, _, new) in &positions {
                mesh.set_co(v, new);
            }
        }
    }

    for (&node, buffers) in &proxies {
        let vertices = spatial.node_vertices(node).to_vec();
        let mut dirty = NodeDirty::REDRAW;
        for buffer in buffers {
            match &buffer.data {
                ProxyData::Co(_) => dirty |= NodeDirty::BOUNDS | NodeDirty::NORMALS,
                ProxyData::Mask(deltas) => {
                    apply_masks(mesh, &vertices, deltas);
                    dirty |= NodeDirty::MASK;
                }
                ProxyData::Color(deltas) => {
                    apply_colors(mesh, &vertices, deltas);
                    dirty |= NodeDirty::COLOR;
                }
                ProxyData::FaceSet(marked) => {
                    apply_face_sets(mesh, &vertices, marked, cache.face_set_draw);
                    dirty |= NodeDirty::FACE_SETS;
                }
            }
        }
        spatial.node_mark_dirty(node, dirty);
    }

    trace!(
        "combine_proxies: {} nodes, {} vertices moved",
        result.nodes.len(),
        result.offsets.len()
    );
    result
}

fn apply_masks(mesh: &mut SculptMesh, vertices: &[u32], deltas: &[f32]) {
    for (&v, &delta) in vertices.iter().zip(deltas) {
        if delta != 0.0 && mesh.visible(v) {
            mesh.set_mask(v, (mesh.mask(v) + delta).clamp(0.0, 1.0));
        }
    }
}

fn apply_colors(mesh: &mut SculptMesh, vertices: &[u32], deltas: &[Vec4]) {
    for (&v, &delta) in vertices.iter().zip(deltas) {
        if delta != Vec4::ZERO && mesh.visible(v) {
            mesh.set_color(v, (mesh.color(v) + delta).clamp(Vec4::ZERO, Vec4::ONE));
        }
    }
}

fn apply_face_sets(mesh: &mut SculptMesh, vertices: &[u32], marked: &[bool], face_set: i32) {
    for (&v, _) in vertices.iter().zip(marked).filter(|(_, m)| **m) {
        for f in mesh.vertex_faces(v) {
            if mesh.face_set(f) > 0 {
                mesh.set_face_set(f, face_set.abs());
            }
        }
    }
}

/// Finish a merge: refresh normals around moved vertices, flag their
/// nodes and forward the offsets to a dependent deform target
pub fn flush_stroke_deform<S: SpatialIndex + ?Sized>(
    mesh: &mut SculptMesh,
    spatial: &mut S,
    result: &CombineResult,
    target: Option<&mut dyn DeformTarget>,
) {
    if result.offsets.is_empty() || result.redirected {
        return;
    }
    let moved: Vec<u32> = result.offsets.iter().map(|&(v, _)| v).collect();
    mesh.update_normals(&moved);
    for &node in &result.nodes {
        spatial.node_mark_dirty(node, NodeDirty::BOUNDS | NodeDirty::NORMALS | NodeDirty::REDRAW);
    }
    if let Some(target) = target {
        target.apply_offsets(&result.offsets);
    }
    debug!("flush_stroke_deform: {} vertices", moved.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{BoundsKind, NodeTree};
    use crate::test_fixtures;
    use crate::types::ToolId;

    fn setup() -> (SculptMesh, VertexAttributes, NodeTree) {
        let mesh = SculptMesh::Indexed(test_fixtures::grid_plane(3));
        let attrs = VertexAttributes::new(mesh.vertex_count());
        let tree = NodeTree::build(&mesh);
        (mesh, attrs, tree)
    }

    fn offsets_for(tree: &NodeTree, offset: impl Fn(u32) -> Vec3) -> ProxyMap {
        let mut map = ProxyMap::new();
        for node in tree.gather_nodes(BoundsKind::Current, &|_| true) {
            let data = tree.node_vertices(node).iter().map(|&v| offset(v)).collect();
            collect_proxies(
                &mut map,
                vec![ProxyBuffer {
                    node,
                    data: ProxyData::Co(data),
                }],
            );
        }
        map
    }

    #[test]
    fn test_zero_proxy_is_idempotent() {
        let (mut mesh, attrs, mut tree) = setup();
        let before: Vec<Vec3> = (0..9).map(|v| mesh.co(v)).collect();
        let cache = StrokeCache::new(1, ToolId::Draw, 9);
        let proxies = offsets_for(&tree, |_| Vec3::ZERO);
        let result = combine_proxies(
            &mut mesh,
            &attrs,
            &mut tree,
            &SculptSettings::without_symmetry(),
            &cache,
            proxies,
            None,
        );
        assert!(result.offsets.is_empty());
        for v in 0..9 {
            assert_eq!(mesh.co(v), before[v as usize]);
        }
    }

    #[test]
    fn test_passes_sum() {
        let (mut mesh, attrs, mut tree) = setup();
        let cache = StrokeCache::new(1, ToolId::Draw, 9);
        let mut proxies = offsets_for(&tree, |_| Vec3::Z * 0.25);
        for (node, buffers) in offsets_for(&tree, |_| Vec3::Z * 0.5) {
            proxies.entry(node).or_default().extend(buffers);
        }
        combine_proxies(
            &mut mesh,
            &attrs,
            &mut tree,
            &SculptSettings::without_symmetry(),
            &cache,
            proxies,
            None,
        );
        assert!((mesh.co(4).z - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_original_base_does_not_compound() {
        let (mut mesh, mut attrs, mut tree) = setup();
        let cache = StrokeCache::new(3, ToolId::Grab, 9);
        for v in 0..9 {
            attrs.check_origdata(&mesh, v, 3);
        }
        let settings = SculptSettings::without_symmetry();
        for _ in 0..2 {
            let proxies = offsets_for(&tree, |_| Vec3::X * 0.5);
            combine_proxies(&mut mesh, &attrs, &mut tree, &settings, &cache, proxies, None);
        }
        assert!((mesh.co(0).x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clip_and_lock() {
        let settings = SculptSettings {
            lock: [false, false, true],
            clip: [true, false, false],
            clip_tolerance: [0.01, 0.01, 0.01],
            ..SculptSettings::without_symmetry()
        };
        let out = clip(&settings, Vec3::new(0.005, 1.0, 2.0), Vec3::new(0.3, 1.5, 9.0));
        assert_eq!(out, Vec3::new(0.0, 1.5, 2.0));
        // Away from the seam the proposed value is kept
        let out = clip(&settings, Vec3::new(0.5, 1.0, 2.0), Vec3::new(0.3, 1.5, 9.0));
        assert_eq!(out, Vec3::new(0.3, 1.5, 2.0));
    }

    #[test]
    fn test_mask_color_and_face_set_buffers() {
        let (mut mesh, attrs, mut tree) = setup();
        let mut cache = StrokeCache::new(1, ToolId::Mask, 9);
        cache.face_set_draw = 4;
        let mut map = ProxyMap::new();
        for node in tree.gather_nodes(BoundsKind::Current, &|_| true) {
            let len = tree.node_vertices(node).len();
            let marked = tree.node_vertices(node).iter().map(|&v| v == 0).collect();
            collect_proxies(
                &mut map,
                vec![
                    ProxyBuffer {
                        node,
                        data: ProxyData::Mask(vec![0.7; len]),
                    },
                    ProxyBuffer {
                        node,
                        data: ProxyData::Mask(vec![0.7; len]),
                    },
                    ProxyBuffer {
                        node,
                        data: ProxyData::Color(vec![Vec4::new(-2.0, 0.0, 0.0, 0.0); len]),
                    },
                    ProxyBuffer {
                        node,
                        data: ProxyData::FaceSet(marked),
                    },
                ],
            );
        }
        let result = combine_proxies(
            &mut mesh,
            &attrs,
            &mut tree,
            &SculptSettings::without_symmetry(),
            &cache,
            map,
            None,
        );
        assert!(result.offsets.is_empty());
        assert!((mesh.mask(3) - 1.0).abs() < 1e-6);
        assert_eq!(mesh.color(3).x, 0.0);
        assert_eq!(mesh.face_set(0), 4);
        let node = tree.vertex_node(0).unwrap();
        assert!(tree.node_dirty(node).contains(NodeDirty::FACE_SETS));
    }

    #[derive(Default)]
    struct Recorder(Vec<(u32, Vec3)>);

    impl DeformTarget for Recorder {
        fn apply_offsets(&mut self, offsets: &[(u32, Vec3)]) {
            self.0.extend_from_slice(offsets);
        }
    }

    #[test]
    fn test_flush_forwards_offsets() {
        let (mut mesh, attrs, mut tree) = setup();
        let cache = StrokeCache::new(1, ToolId::Draw, 9);
        let proxies = offsets_for(&tree, |v| if v == 4 { Vec3::Z } else { Vec3::ZERO });
        let result = combine_proxies(
            &mut mesh,
            &attrs,
            &mut tree,
            &SculptSettings::without_symmetry(),
            &cache,
            proxies,
            None,
        );
        let mut recorder = Recorder::default();
        flush_stroke_deform(&mut mesh, &mut tree, &result, Some(&mut recorder));
        assert_eq!(recorder.0, vec![(4, Vec3::Z)]);
        // The raised center tilts every vertex of the faces around it
        let expected = Vec3::new(0.0, -1.0, 2.0).normalize();
        assert!((mesh.normal(1) - expected).length() < 1e-3);
        assert!(mesh.normal(0).z < 1.0 - 1e-4);
    }
}
