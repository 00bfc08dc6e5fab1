//! Sculpt session orchestration.
//!
//! A [`SculptSession`] owns the mesh, its spatial index and the derived
//! per-vertex caches, and drives strokes through them:
//! 1. Pointer sample → surface location and stroke variants
//! 2. Dynamic topology (dynamic meshes only)
//! 3. Symmetry and tile passes → per-node proxy buffers
//! 4. Proxy merge → mesh, normals, node bounds and redraw region
//!
//! Every consumed sample is appended to the stroke's [`ReplayLog`] so the
//! stroke can be re-driven exactly.

use glam::{Vec3, Vec4};
use relief_config::SculptSettings;
use tracing::{debug, trace, warn};

use crate::actions::{
    ActionContext, PlaneInputs, brush_strength, brush_tip_frame, calc_brush_plane,
    do_autosmooth, do_brush_action, do_gravity, gather_brush_nodes, update_sculpt_normal,
};
use crate::attributes::{OrigData, VertexAttributes};
use crate::boundary::mark_need_boundary;
use crate::brush::Brush;
use crate::brush_test::BrushTest;
use crate::collaborators::{
    AutoMasking, BrushChannels, BrushDefaults, BrushSolver, DeformTarget, TextureSampler,
};
use crate::dyntopo::topology_update;
use crate::error::{Result, SculptError};
use crate::face_sets;
use crate::flood_fill::FloodFill;
use crate::islands::{ConnectedComponents, FakeNeighbors};
use crate::mesh::SculptMesh;
use crate::proxy::{ProxyMap, collect_proxies, combine_proxies, flush_stroke_deform};
use crate::query;
use crate::replay::ReplayLog;
use crate::spatial::{Aabb, BoundsKind, NodeDirty, NodeTree, RayHit, SpatialIndex};
use crate::stroke::symmetry::{calc_symmetry_feather, symmetry_passes, tile_offsets};
use crate::stroke::{StrokeCache, StrokeSample, SymmetryPass};
use crate::types::ToolId;
use crate::undo::{UndoLog, UndoNode};

/// Result of ending a stroke.
#[derive(Debug, Clone)]
pub struct StrokeSummary {
    pub stroke_id: u32,
    /// Samples that produced a dab
    pub samples: u32,
    /// Union of the node bounds redrawn during the stroke
    pub redraw: Aabb,
    /// Every sample the stroke consumed
    pub replay: ReplayLog,
}

/// State tracked during an active stroke.
struct ActiveStroke {
    cache: StrokeCache,
    log: ReplayLog,
}

/// Mesh, spatial index and derived caches plus the stroke in progress.
pub struct SculptSession<S: SpatialIndex = NodeTree> {
    mesh: SculptMesh,
    attrs: VertexAttributes,
    spatial: S,
    brush: Brush,
    settings: SculptSettings,
    components: Option<ConnectedComponents>,
    fake: Option<FakeNeighbors>,
    fake_enabled: bool,
    undo: Option<Box<dyn UndoLog>>,
    auto_masking: Option<Box<dyn AutoMasking>>,
    channels: Box<dyn BrushChannels>,
    texture: Option<Box<dyn TextureSampler>>,
    solver: Option<Box<dyn BrushSolver>>,
    deform_target: Option<Box<dyn DeformTarget>>,
    stroke: Option<ActiveStroke>,
    next_stroke_id: u32,
}

impl SculptSession<NodeTree> {
    /// Create a session, building the default node tree over `mesh`.
    pub fn new(mesh: SculptMesh) -> Self {
        let spatial = NodeTree::build(&mesh);
        Self::with_spatial(mesh, spatial)
    }
}

impl<S: SpatialIndex> SculptSession<S> {
    /// Create a session around an already built spatial index.
    pub fn with_spatial(mesh: SculptMesh, spatial: S) -> Self {
        let attrs = VertexAttributes::new(mesh.vertex_count());
        Self {
            mesh,
            attrs,
            spatial,
            brush: Brush::draw(),
            settings: SculptSettings::default(),
            components: None,
            fake: None,
            fake_enabled: false,
            undo: None,
            auto_masking: None,
            channels: Box::new(BrushDefaults),
            texture: None,
            solver: None,
            deform_target: None,
            stroke: None,
            next_stroke_id: 1,
        }
    }

    pub fn mesh(&self) -> &SculptMesh {
        &self.mesh
    }

    pub fn attributes(&self) -> &VertexAttributes {
        &self.attrs
    }

    pub fn spatial(&self) -> &S {
        &self.spatial
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn settings(&self) -> &SculptSettings {
        &self.settings
    }

    /// Set the brush. Rejected while a stroke is active.
    pub fn set_brush(&mut self, brush: Brush) -> Result<()> {
        if self.stroke.is_some() {
            return Err(SculptError::StrokeAlreadyActive);
        }
        brush.validate()?;
        self.brush = brush;
        Ok(())
    }

    /// Set the scene settings. Rejected while a stroke is active.
    pub fn set_settings(&mut self, settings: SculptSettings) -> Result<()> {
        if self.stroke.is_some() {
            return Err(SculptError::StrokeAlreadyActive);
        }
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_undo_log(&mut self, undo: Box<dyn UndoLog>) {
        self.undo = Some(undo);
    }

    pub fn set_auto_masking(&mut self, auto_masking: Option<Box<dyn AutoMasking>>) {
        self.auto_masking = auto_masking;
    }

    pub fn set_channels(&mut self, channels: Box<dyn BrushChannels>) {
        self.channels = channels;
    }

    pub fn set_texture(&mut self, texture: Option<Box<dyn TextureSampler>>) {
        self.texture = texture;
    }

    pub fn set_solver(&mut self, solver: Option<Box<dyn BrushSolver>>) {
        self.solver = solver;
    }

    pub fn set_deform_target(&mut self, target: Option<Box<dyn DeformTarget>>) {
        self.deform_target = target;
    }

    // Vertex and face writes outside strokes

    pub fn set_mask(&mut self, v: u32, mask: f32) {
        self.mesh.set_mask(v, mask);
        self.mark_vertex_dirty(v, NodeDirty::MASK | NodeDirty::REDRAW);
    }

    pub fn set_color(&mut self, v: u32, color: Vec4) {
        self.mesh.set_color(v, color);
        self.mark_vertex_dirty(v, NodeDirty::COLOR | NodeDirty::REDRAW);
    }

    pub fn set_visible(&mut self, v: u32, visible: bool) {
        self.mesh.set_visible(v, visible);
        self.mark_vertex_dirty(v, NodeDirty::VISIBILITY | NodeDirty::REDRAW);
    }

    /// Set a face's face set and invalidate the boundary cache around it
    pub fn set_face_set(&mut self, f: u32, face_set: i32) {
        self.mesh.set_face_set(f, face_set);
        for v in self.mesh.face_elements(f) {
            mark_need_boundary(&self.mesh, &self.attrs, v, true);
            self.mark_vertex_dirty(v, NodeDirty::FACE_SETS | NodeDirty::REDRAW);
        }
    }

    fn mark_vertex_dirty(&mut self, v: u32, flags: NodeDirty) {
        if let Some(node) = self.spatial.vertex_node(v) {
            self.spatial.node_mark_dirty(node, flags);
        }
    }

    fn mark_all_dirty(&mut self, flags: NodeDirty) {
        for node in self.spatial.gather_nodes(BoundsKind::Current, &|_| true) {
            self.spatial.node_mark_dirty(node, flags);
        }
    }

    /// Refit dirty nodes and return the region that needs a redraw
    pub fn update_bounds(&mut self) -> Aabb {
        self.spatial.update_bounds(&self.mesh)
    }

    // Face sets

    pub fn face_set_visibility_set(&mut self, face_set: i32, visible: bool) -> bool {
        let changed = face_sets::face_set_visibility_set(&mut self.mesh, face_set, visible);
        if changed {
            self.visibility_changed();
        }
        changed
    }

    pub fn face_sets_visibility_invert(&mut self) {
        face_sets::face_sets_visibility_invert(&mut self.mesh);
        self.visibility_changed();
    }

    pub fn face_sets_visibility_all_set(&mut self, visible: bool) {
        face_sets::face_sets_visibility_all_set(&mut self.mesh, visible);
        self.visibility_changed();
    }

    pub fn sync_face_sets_to_vertices(&mut self) {
        face_sets::sync_face_sets_to_vertices(&mut self.mesh);
        self.visibility_changed();
    }

    pub fn sync_vertices_to_face_sets(&mut self) {
        face_sets::sync_vertices_to_face_sets(&mut self.mesh);
        self.visibility_changed();
    }

    pub fn vertex_face_set_set(&mut self, v: u32, face_set: i32) {
        face_sets::vertex_face_set_set(&mut self.mesh, v, face_set);
        mark_need_boundary(&self.mesh, &self.attrs, v, true);
        self.mark_vertex_dirty(v, NodeDirty::FACE_SETS | NodeDirty::REDRAW);
    }

    pub fn vertex_face_set_increase(&mut self, v: u32, increase: i32) {
        face_sets::vertex_face_set_increase(&mut self.mesh, v, increase);
        mark_need_boundary(&self.mesh, &self.attrs, v, true);
        self.mark_vertex_dirty(v, NodeDirty::FACE_SETS | NodeDirty::REDRAW);
    }

    fn visibility_changed(&mut self) {
        self.attrs.mark_all_stale();
        self.mark_all_dirty(NodeDirty::VISIBILITY | NodeDirty::FACE_SETS | NodeDirty::REDRAW);
    }

    // Queries

    /// Closest visible vertex within `max_distance`
    pub fn nearest_vertex(&self, location: Vec3, max_distance: f32) -> Option<u32> {
        query::nearest_vertex(
            &self.mesh,
            &self.spatial,
            location,
            max_distance,
            self.settings.min_nodes_per_task,
            |_| true,
        )
    }

    pub fn raycast(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        self.spatial.raycast(&self.mesh, origin, direction)
    }

    /// Walk outward from `seed` and its mirrored copies.
    ///
    /// Mirrored seeds are searched within `symmetric_radius`; 0 seeds only
    /// `seed`. Fake-neighbor edges are followed while enabled.
    pub fn flood_fill<F>(&self, seed: u32, symmetric_radius: f32, visit: F) -> FloodFill
    where
        F: FnMut(u32, u32, bool) -> bool,
    {
        let mut fill = FloodFill::new(self.mesh.vertex_count());
        fill.add_initial_with_symmetry(
            &self.mesh,
            &self.spatial,
            self.settings.symmetry,
            seed,
            symmetric_radius,
        );
        fill.execute(&self.mesh, self.active_fake(), visit);
        fill
    }

    /// Island ids, built on first use and kept until topology changes
    pub fn connected_components_ensure(&mut self) -> &ConnectedComponents {
        let mesh = &self.mesh;
        self.components.get_or_insert_with(|| {
            let components = ConnectedComponents::build(mesh);
            debug!(
                "connected_components_ensure: {} islands over {} vertices",
                components.count(),
                components.len()
            );
            components
        })
    }

    /// Fake-neighbor overlay for `max_distance`, rebuilt only when the
    /// distance changes
    pub fn fake_neighbors_ensure(&mut self, max_distance: f32) -> &FakeNeighbors {
        let stale = self
            .fake
            .as_ref()
            .is_none_or(|fake| fake.max_distance() != max_distance);
        if stale {
            let mesh = &self.mesh;
            let components = self
                .components
                .get_or_insert_with(|| ConnectedComponents::build(mesh));
            self.fake = Some(FakeNeighbors::build(
                mesh,
                &self.spatial,
                components,
                max_distance,
                self.settings.min_nodes_per_task,
            ));
        }
        let count = self.mesh.vertex_count();
        self.fake.get_or_insert_with(|| FakeNeighbors::new(count))
    }

    /// Follow fake-neighbor edges at the settings' distance
    pub fn fake_neighbors_enable(&mut self) {
        self.fake_enabled = true;
        if self.settings.uses_fake_neighbors() {
            self.fake_neighbors_ensure(self.settings.fake_neighbor_distance);
        }
    }

    /// Stop following fake-neighbor edges, keeping the overlay
    pub fn fake_neighbors_disable(&mut self) {
        self.fake_enabled = false;
    }

    pub fn fake_neighbors_free(&mut self) {
        self.fake_enabled = false;
        self.fake = None;
    }

    fn active_fake(&self) -> Option<&FakeNeighbors> {
        if self.fake_enabled {
            self.fake.as_ref()
        } else {
            None
        }
    }

    // Strokes

    pub fn is_stroke_active(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn stroke_cache(&self) -> Option<&StrokeCache> {
        self.stroke.as_ref().map(|s| &s.cache)
    }

    /// Region redrawn so far by the active stroke
    pub fn redraw_region(&self) -> Option<Aabb> {
        self.stroke.as_ref().map(|s| s.cache.redraw)
    }

    /// Samples consumed so far by the active stroke
    pub fn replay_log(&self) -> Option<&ReplayLog> {
        self.stroke.as_ref().map(|s| &s.log)
    }

    /// Start a stroke at the surface under `sample` and apply its first dab.
    ///
    /// Returns `Ok(false)` without starting when the sample misses the mesh.
    pub fn begin_stroke(&mut self, sample: StrokeSample) -> Result<bool> {
        if self.stroke.is_some() {
            return Err(SculptError::StrokeAlreadyActive);
        }
        let Some(hit) = self.raycast(sample.origin(), sample.direction()) else {
            debug!("begin_stroke: sample missed the mesh");
            return Ok(false);
        };

        let stroke_id = self.next_stroke_id;
        self.next_stroke_id = self.next_stroke_id.wrapping_add(1).max(1);
        let tool = self.brush.tool;
        let mut cache = StrokeCache::new(stroke_id, tool, self.mesh.vertex_count());
        cache.init_invariants(
            &sample,
            hit.position,
            self.mesh.normal(hit.vertex),
            Vec3::from(self.settings.gravity_direction),
        );
        if tool == ToolId::DrawFaceSets {
            cache.face_set_draw = face_sets::face_set_next_available(&self.mesh);
        }

        self.spatial.store_original_bounds();
        if self.fake_enabled && self.settings.uses_fake_neighbors() {
            self.fake_neighbors_ensure(self.settings.fake_neighbor_distance);
        }
        if let Some(undo) = self.undo.as_mut() {
            undo.begin_stroke(stroke_id);
        }
        if tool.is_solver_driven() {
            match self.solver.as_mut() {
                Some(solver) => solver.begin_stroke(&self.mesh, &cache),
                None => warn!("begin_stroke: {:?} has no solver, its dabs do nothing", tool),
            }
        }

        debug!(
            "begin_stroke: stroke {} with {:?} at {:?}",
            stroke_id, tool, hit.position
        );
        self.stroke = Some(ActiveStroke {
            cache,
            log: ReplayLog::new(stroke_id),
        });
        self.update_sample(sample)?;
        Ok(true)
    }

    /// Feed one pointer sample to the active stroke.
    ///
    /// Returns whether it produced a dab; samples off the surface are
    /// skipped unless the tool works off-surface.
    pub fn update_sample(&mut self, sample: StrokeSample) -> Result<bool> {
        let Some(mut stroke) = self.stroke.take() else {
            warn!("update_sample: no active stroke");
            return Err(SculptError::NoActiveStroke);
        };
        stroke.log.push(sample);

        let applied = match self.locate(&stroke.cache, &sample) {
            Some((location, grab_location)) => {
                stroke.cache.update_variants(
                    &self.brush,
                    &sample,
                    location,
                    grab_location,
                    self.channels.as_ref(),
                );
                self.apply_sample(&mut stroke.cache);
                stroke.cache.first_time = false;
                stroke.cache.sample_count += 1;
                true
            }
            None => {
                trace!("update_sample: sample missed the surface");
                false
            }
        };
        self.stroke = Some(stroke);
        Ok(applied)
    }

    /// Finish the active stroke
    pub fn end_stroke(&mut self) -> Result<StrokeSummary> {
        let stroke = self.stroke.take().ok_or(SculptError::NoActiveStroke)?;
        let stroke_id = stroke.cache.stroke_id;
        self.close_collaborators(stroke_id);
        debug!(
            "end_stroke: stroke {} after {} dabs",
            stroke_id, stroke.cache.sample_count
        );
        Ok(StrokeSummary {
            stroke_id,
            samples: stroke.cache.sample_count,
            redraw: stroke.cache.redraw,
            replay: stroke.log,
        })
    }

    /// Abandon the active stroke and put back every value it changed.
    ///
    /// Coordinates, masks and colors come back from the stroke's original
    /// data. Dynamic topology changes stay; the undo log owns those.
    /// Returns the number of restored vertices.
    pub fn cancel_stroke(&mut self) -> Result<usize> {
        let stroke = self.stroke.take().ok_or(SculptError::NoActiveStroke)?;
        let stroke_id = stroke.cache.stroke_id;
        let restored = self.restore_original(stroke_id);
        self.close_collaborators(stroke_id);
        debug!(
            "cancel_stroke: stroke {} restored {} vertices",
            stroke_id, restored
        );
        Ok(restored)
    }

    /// Write the original data captured during `stroke_id` back into the mesh
    pub fn restore_original(&mut self, stroke_id: u32) -> usize {
        let count = self.mesh.vertex_count() as u32;
        let captured: Vec<(u32, OrigData)> = self
            .attrs
            .captured(stroke_id)
            .filter(|(v, _)| *v < count)
            .map(|(v, orig)| (v, *orig))
            .collect();
        let mut restored = Vec::with_capacity(captured.len());
        for (v, orig) in captured {
            self.mesh.set_co(v, orig.co);
            self.mesh.set_mask(v, orig.mask);
            self.mesh.set_color(v, orig.color);
            restored.push(v);
        }
        if !restored.is_empty() {
            self.mesh.update_normals(&restored);
            self.mark_all_dirty(
                NodeDirty::BOUNDS
                    | NodeDirty::NORMALS
                    | NodeDirty::MASK
                    | NodeDirty::COLOR
                    | NodeDirty::REDRAW,
            );
            self.spatial.update_bounds(&self.mesh);
        }
        restored.len()
    }

    /// Re-drive a recorded stroke from its samples
    pub fn replay(&mut self, log: &ReplayLog) -> Result<Option<StrokeSummary>> {
        if self.stroke.is_some() {
            return Err(SculptError::StrokeAlreadyActive);
        }
        for &sample in log.samples() {
            if self.stroke.is_some() {
                self.update_sample(sample)?;
            } else {
                self.begin_stroke(sample)?;
            }
        }
        if self.stroke.is_some() {
            self.end_stroke().map(Some)
        } else {
            Ok(None)
        }
    }

    fn close_collaborators(&mut self, stroke_id: u32) {
        if let Some(undo) = self.undo.as_mut() {
            undo.end_stroke(stroke_id);
        }
        if self.brush.tool.is_solver_driven() {
            if let Some(solver) = self.solver.as_mut() {
                solver.end_stroke();
            }
        }
    }

    /// Surface location and view-plane grab location of a sample
    fn locate(&self, cache: &StrokeCache, sample: &StrokeSample) -> Option<(Vec3, Vec3)> {
        let origin = sample.origin();
        let direction = sample.direction();
        let grab = ray_plane(
            origin,
            direction,
            cache.true_initial_location,
            cache.true_view_normal,
        )
        .unwrap_or(cache.true_location);
        match self.raycast(origin, direction) {
            Some(hit) => Some((hit.position, grab)),
            None if self.brush.tool.continues_off_surface() => Some((grab, grab)),
            None => None,
        }
    }

    /// Run every pass of one sample and merge the result into the mesh
    fn apply_sample(&mut self, cache: &mut StrokeCache) {
        let passes = symmetry_passes(&self.settings);
        cache.feather = calc_symmetry_feather(&self.settings, cache.true_location, cache.radius);

        if self.settings.dynamic_topology {
            self.update_topology(cache, &passes);
        }

        let bounds = self.mesh.bounds();
        let mut proxies = ProxyMap::new();
        for &pass in &passes {
            cache.calc_brushdata_symm(pass);
            self.run_pass(cache, &mut proxies);
            let tiles = tile_offsets(&self.settings, &bounds, cache.location, cache.radius);
            for (i, offset) in tiles.into_iter().enumerate() {
                cache.apply_tile(i as u32 + 1, offset);
                trace!("apply_sample: tile {} offset {:?}", i + 1, offset);
                self.run_pass(cache, &mut proxies);
            }
        }
        if proxies.is_empty() {
            return;
        }

        let tool = self.brush.tool;
        let solver = if tool.is_solver_driven() {
            solver_mut(&mut self.solver)
        } else {
            None
        };
        let result = combine_proxies(
            &mut self.mesh,
            &self.attrs,
            &mut self.spatial,
            &self.settings,
            cache,
            proxies,
            solver,
        );
        flush_stroke_deform(
            &mut self.mesh,
            &mut self.spatial,
            &result,
            target_mut(&mut self.deform_target),
        );
        if tool == ToolId::DrawFaceSets {
            for &node in &result.nodes {
                for &v in self.spatial.node_vertices(node) {
                    mark_need_boundary(&self.mesh, &self.attrs, v, true);
                }
            }
        }
        let redraw = self.spatial.update_bounds(&self.mesh);
        cache.redraw = cache.redraw.union(&redraw);
        debug!(
            "apply_sample: {:?} dab {} touched {} nodes, moved {} vertices",
            tool,
            cache.sample_count,
            result.nodes.len(),
            result.offsets.len()
        );
    }

    /// Subdivide around every mirrored location before any action reads
    /// node vertex lists
    fn update_topology(&mut self, cache: &mut StrokeCache, passes: &[SymmetryPass]) {
        let mut changed = false;
        for &pass in passes {
            cache.calc_brushdata_symm(pass);
            changed |= topology_update(
                &mut self.mesh,
                &mut self.attrs,
                &mut self.spatial,
                cache,
                &self.settings,
                undo_mut(&mut self.undo),
            )
            .is_some();
        }
        if changed {
            self.components = None;
            if let Some(fake) = self.fake.take() {
                if self.fake_enabled {
                    self.fake_neighbors_ensure(fake.max_distance());
                }
            }
        }
    }

    /// One symmetry or tile pass: gather, snapshot, orient, act
    fn run_pass(&mut self, cache: &mut StrokeCache, proxies: &mut ProxyMap) {
        let nodes = gather_brush_nodes(&self.spatial, &self.brush, cache);
        if nodes.is_empty() {
            trace!("run_pass: no nodes under the brush");
            return;
        }

        let kind = self.brush.tool.undo_kind();
        for &node in &nodes {
            if cache.mark_undo_pushed(Some(node), kind) {
                if let Some(undo) = self.undo.as_mut() {
                    undo.push_node(UndoNode::capture(
                        &self.mesh,
                        &self.spatial,
                        node,
                        kind,
                        cache.stroke_id,
                    ));
                }
            }
            for &v in self.spatial.node_vertices(node) {
                self.attrs.check_origdata(&self.mesh, v, cache.stroke_id);
            }
        }

        let tool = self.brush.tool;
        let (area_normal, area_center) = {
            let inputs = PlaneInputs {
                mesh: &self.mesh,
                attrs: &self.attrs,
                spatial: &self.spatial,
                brush: &self.brush,
                settings: &self.settings,
                nodes: &nodes,
            };
            if tool.uses_brush_plane() {
                calc_brush_plane(&inputs, cache)
            } else {
                if tool.needs_sculpt_normal() {
                    update_sculpt_normal(&inputs, cache);
                }
                (cache.sculpt_normal_symm, cache.location)
            }
        };

        let bstrength = brush_strength(&self.brush, cache, cache.feather);
        cache.bstrength = bstrength;
        let tip = brush_tip_frame(&self.brush, cache, bstrength, area_normal, area_center);
        let cache: &StrokeCache = cache;

        let ctx = ActionContext {
            mesh: &self.mesh,
            attrs: &self.attrs,
            spatial: &self.spatial,
            brush: &self.brush,
            cache,
            settings: &self.settings,
            fake: self.active_fake(),
            auto_masking: self.auto_masking.as_deref(),
            texture: self.texture.as_deref(),
            solver: self.solver.as_deref(),
            test: BrushTest::new(
                self.brush.falloff_shape,
                cache.location,
                cache.radius,
                cache.view_normal,
                tip,
            ),
            bstrength,
            area_normal,
            area_center,
        };
        collect_proxies(proxies, do_brush_action(&ctx, &nodes));
        if cache.autosmooth_factor > 0.0 && tool != ToolId::Smooth {
            collect_proxies(proxies, do_autosmooth(&ctx, &nodes));
        }
        if self.settings.uses_gravity() {
            collect_proxies(proxies, do_gravity(&ctx, &nodes));
        }
    }
}

fn undo_mut(undo: &mut Option<Box<dyn UndoLog>>) -> Option<&mut dyn UndoLog> {
    match undo {
        Some(log) => Some(log.as_mut()),
        None => None,
    }
}

fn solver_mut(solver: &mut Option<Box<dyn BrushSolver>>) -> Option<&mut dyn BrushSolver> {
    match solver {
        Some(solver) => Some(solver.as_mut()),
        None => None,
    }
}

fn target_mut(target: &mut Option<Box<dyn DeformTarget>>) -> Option<&mut dyn DeformTarget> {
    match target {
        Some(target) => Some(target.as_mut()),
        None => None,
    }
}

/// Intersection of a ray with the plane through `point`
fn ray_plane(origin: Vec3, direction: Vec3, point: Vec3, normal: Vec3) -> Option<Vec3> {
    let denom = direction.dot(normal);
    if denom.abs() < 1e-8 {
        return None;
    }
    let t = (point - origin).dot(normal) / denom;
    Some(origin + direction * t)
}
