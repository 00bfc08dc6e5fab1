//! Dynamic topology step run before the brush action.
//!
//! Only dynamic meshes are rewritten. After a split every index-keyed cache
//! is stale, so the caller must also drop its island and fake-neighbor data.

use relief_config::SculptSettings;
use tracing::debug;

use crate::attributes::VertexAttributes;
use crate::boundary::mark_need_boundary;
use crate::mesh::{SculptMesh, SubdivideResult};
use crate::spatial::SpatialIndex;
use crate::stroke::StrokeCache;
use crate::types::UndoDataKind;
use crate::undo::{UndoLog, UndoNode};

/// Reach of the subdivision relative to the brush radius
pub const DYNTOPO_RADIUS_SCALE: f32 = 1.25;

/// Subdivide long edges around the current pass location.
///
/// Returns `None` when nothing changed: dynamic topology is off, the tool
/// does not allow it, the mesh is not dynamic, or no edge was long enough.
pub fn topology_update<S: SpatialIndex + ?Sized>(
    mesh: &mut SculptMesh,
    attrs: &mut VertexAttributes,
    spatial: &mut S,
    cache: &mut StrokeCache,
    settings: &SculptSettings,
    undo: Option<&mut dyn UndoLog>,
) -> Option<SubdivideResult> {
    if !settings.dynamic_topology || !cache.tool.has_dyntopo() {
        return None;
    }
    if mesh.as_dynamic().is_none() {
        return None;
    }
    if cache.mark_undo_pushed(None, UndoDataKind::Geometry) {
        if let Some(undo) = undo {
            undo.push_node(UndoNode::geometry(mesh, cache.stroke_id));
        }
    }

    let radius = cache.radius * DYNTOPO_RADIUS_SCALE;
    let result = mesh
        .as_dynamic_mut()?
        .subdivide_long_edges(cache.location, radius, settings.detail_size);
    if result.is_empty() {
        return None;
    }

    let count = mesh.vertex_count();
    attrs.resize(count);
    for &v in result.touched_vertices.iter().chain(&result.new_vertices) {
        mark_need_boundary(mesh, attrs, v, true);
    }
    cache.topology_changed(count);
    spatial.rebuild(mesh);

    debug!(
        "topology_update: {} new vertices, {} touched, {} total",
        result.new_vertices.len(),
        result.touched_vertices.len(),
        count
    );
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::NodeTree;
    use crate::test_fixtures;
    use crate::types::ToolId;
    use crate::undo::MemoryUndoLog;
    use glam::Vec3;

    fn settings() -> SculptSettings {
        SculptSettings {
            dynamic_topology: true,
            detail_size: 0.6,
            ..SculptSettings::without_symmetry()
        }
    }

    fn cache(tool: ToolId, count: usize) -> StrokeCache {
        let mut cache = StrokeCache::new(1, tool, count);
        cache.location = Vec3::new(1.0, 1.0, 0.0);
        cache.radius = 1.0;
        cache
    }

    #[test]
    fn test_subdivides_under_brush() {
        let mut mesh = SculptMesh::Dynamic(test_fixtures::dynamic_plane(3));
        let mut attrs = VertexAttributes::new(mesh.vertex_count());
        let mut tree = NodeTree::build(&mesh);
        let mut cache = cache(ToolId::Draw, mesh.vertex_count());
        let mut log = MemoryUndoLog::new();

        let result = topology_update(
            &mut mesh,
            &mut attrs,
            &mut tree,
            &mut cache,
            &settings(),
            Some(&mut log),
        )
        .unwrap();
        assert!(!result.new_vertices.is_empty());
        assert_eq!(attrs.len(), mesh.vertex_count());
        for &v in &result.new_vertices {
            assert!(tree.vertex_node(v).is_some());
        }
        assert_eq!(log.records().len(), 1);
        assert_eq!(log.records()[0].kind, UndoDataKind::Geometry);

        // The geometry record is pushed once per stroke
        cache.radius = 2.0;
        topology_update(&mut mesh, &mut attrs, &mut tree, &mut cache, &settings(), Some(&mut log));
        assert_eq!(log.records().len(), 1);
    }

    #[test]
    fn test_skipped_for_static_meshes_and_tools() {
        let mut mesh = SculptMesh::Indexed(test_fixtures::grid_plane(3));
        let mut attrs = VertexAttributes::new(mesh.vertex_count());
        let mut tree = NodeTree::build(&mesh);
        let mut c = cache(ToolId::Draw, mesh.vertex_count());
        assert!(topology_update(&mut mesh, &mut attrs, &mut tree, &mut c, &settings(), None).is_none());

        let mut mesh = SculptMesh::Dynamic(test_fixtures::dynamic_plane(3));
        let mut attrs = VertexAttributes::new(mesh.vertex_count());
        let mut tree = NodeTree::build(&mesh);
        let mut c = cache(ToolId::Grab, mesh.vertex_count());
        let before = mesh.vertex_count();
        assert!(topology_update(&mut mesh, &mut attrs, &mut tree, &mut c, &settings(), None).is_none());
        assert_eq!(mesh.vertex_count(), before);
    }
}
