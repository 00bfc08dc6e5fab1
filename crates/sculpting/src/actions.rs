//! Brush strength, node gathering and the per-tool actions.
//!
//! Each tool has a fixed entry in [`TOOL_TABLE`]: a strength formula and an
//! action that turns one gathered node into a [`ProxyBuffer`]. Actions only
//! read the mesh; the proxy merge writes it.

use std::f32::consts::{PI, SQRT_2};

use glam::{Quat, Vec3, Vec4};
use rayon::prelude::*;
use relief_config::SculptSettings;
use tracing::trace;

use crate::area::{AreaParams, calc_area_center, calc_area_normal, calc_area_normal_and_center};
use crate::attributes::{OrigData, VertexAttributes};
use crate::boundary::vertex_is_boundary;
use crate::brush::Brush;
use crate::brush_test::{BrushTest, TipFrame};
use crate::collaborators::{AutoMasking, BrushSolver, TextureSampler};
use crate::islands::FakeNeighbors;
use crate::mesh::SculptMesh;
use crate::neighbors::vertex_neighbors;
use crate::proxy::{ProxyBuffer, ProxyData};
use crate::spatial::{BoundsKind, NodeId, SpatialIndex};
use crate::stroke::StrokeCache;
use crate::types::{BoundaryKind, FalloffShape, SculptPlane, ToolId};

/// Terms shared by every strength formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrengthInput {
    /// Brush alpha before squaring
    pub root_alpha: f32,
    /// Product of the brush direction, invert and pen-flip signs
    pub flip: f32,
    /// Pressure term, 1 when the brush ignores pressure
    pub pressure: f32,
    /// Dab overlap factor
    pub overlap: f32,
    /// Symmetry feather
    pub feather: f32,
}

impl StrengthInput {
    fn alpha(&self) -> f32 {
        self.root_alpha * self.root_alpha
    }

    /// `α · flip · p · ov · f`
    fn signed(&self) -> f32 {
        self.alpha() * self.flip * self.pressure * self.overlap * self.feather
    }

    /// `α · flip · p · (1 + ov) / 2 · f`
    fn signed_half_overlap(&self) -> f32 {
        self.alpha() * self.flip * self.pressure * 0.5 * (1.0 + self.overlap) * self.feather
    }
}

/// Everything an action reads while processing nodes in parallel
pub struct ActionContext<'a> {
    pub mesh: &'a SculptMesh,
    pub attrs: &'a VertexAttributes,
    pub spatial: &'a dyn SpatialIndex,
    pub brush: &'a Brush,
    pub cache: &'a StrokeCache,
    pub settings: &'a SculptSettings,
    pub fake: Option<&'a FakeNeighbors>,
    pub auto_masking: Option<&'a dyn AutoMasking>,
    pub texture: Option<&'a dyn TextureSampler>,
    pub solver: Option<&'a dyn BrushSolver>,
    pub test: BrushTest,
    /// Sample strength with feathering applied
    pub bstrength: f32,
    pub area_normal: Vec3,
    pub area_center: Vec3,
}

type StrengthFn = fn(&StrengthInput) -> f32;
type ActionFn = fn(&ActionContext<'_>, NodeId) -> Option<ProxyBuffer>;

/// Strength formula and action of one tool
#[derive(Clone, Copy)]
pub struct ToolEntry {
    pub strength: StrengthFn,
    pub action: ActionFn,
}

/// Indexed by `ToolId as usize`
pub static TOOL_TABLE: [ToolEntry; 25] = [
    // Draw
    ToolEntry {
        strength: |s| s.signed(),
        action: do_draw,
    },
    // DrawSharp
    ToolEntry {
        strength: |s| s.signed(),
        action: do_draw,
    },
    // Clay
    ToolEntry {
        strength: |s| 0.25 * s.signed_half_overlap(),
        action: do_clay,
    },
    // ClayStrips
    ToolEntry {
        strength: |s| 0.3 * s.signed(),
        action: do_clay_strips,
    },
    // Layer
    ToolEntry {
        strength: |s| s.signed(),
        action: do_layer,
    },
    // Inflate
    ToolEntry {
        strength: |s| if s.flip > 0.0 { 0.25 * s.signed() } else { 0.125 * s.signed() },
        action: do_inflate,
    },
    // Blob
    ToolEntry {
        strength: |s| s.signed(),
        action: do_crease,
    },
    // Crease
    ToolEntry {
        strength: |s| s.signed(),
        action: do_crease,
    },
    // Smooth
    ToolEntry {
        strength: |s| s.flip * s.pressure * s.feather * s.alpha(),
        action: do_smooth,
    },
    // Flatten
    ToolEntry {
        strength: plane_strength,
        action: do_flatten,
    },
    // Fill
    ToolEntry {
        strength: plane_strength,
        action: do_flatten,
    },
    // Scrape
    ToolEntry {
        strength: plane_strength,
        action: do_flatten,
    },
    // Pinch
    ToolEntry {
        strength: |s| if s.flip > 0.0 { s.signed() } else { 0.25 * s.signed() },
        action: do_pinch,
    },
    // Grab
    ToolEntry {
        strength: |s| s.root_alpha * s.feather,
        action: do_grab,
    },
    // SnakeHook
    ToolEntry {
        strength: |s| s.root_alpha * s.feather,
        action: do_snake_hook,
    },
    // Thumb
    ToolEntry {
        strength: |s| s.alpha() * s.pressure * s.feather,
        action: do_thumb,
    },
    // Nudge
    ToolEntry {
        strength: |s| s.alpha() * s.pressure * 0.5 * (1.0 + s.overlap) * s.feather,
        action: do_thumb,
    },
    // Rotate
    ToolEntry {
        strength: |s| s.alpha() * s.pressure * s.feather,
        action: do_rotate,
    },
    // ElasticDeform
    ToolEntry {
        strength: |s| s.root_alpha * s.feather,
        action: do_elastic_deform,
    },
    // Pose
    ToolEntry {
        strength: |s| s.root_alpha * s.feather,
        action: do_solver,
    },
    // Boundary
    ToolEntry {
        strength: |s| s.root_alpha * s.feather,
        action: do_solver,
    },
    // Cloth
    ToolEntry {
        strength: |s| 10.0 * s.signed(),
        action: do_solver,
    },
    // Mask
    ToolEntry {
        strength: |s| s.signed_half_overlap(),
        action: do_mask,
    },
    // Paint
    ToolEntry {
        strength: |s| s.alpha() * s.pressure * s.pressure * s.overlap * s.feather,
        action: do_paint,
    },
    // DrawFaceSets
    ToolEntry {
        strength: |s| s.alpha() * s.pressure * s.overlap * s.feather,
        action: do_draw_face_sets,
    },
];

fn plane_strength(s: &StrengthInput) -> f32 {
    if s.flip > 0.0 {
        s.signed_half_overlap()
    } else {
        0.5 * s.signed()
    }
}

/// Scalar strength of the current sample
pub fn brush_strength(brush: &Brush, cache: &StrokeCache, feather: f32) -> f32 {
    let sign = |negative: bool| if negative { -1.0 } else { 1.0 };
    let input = StrengthInput {
        root_alpha: cache.root_alpha,
        flip: sign(brush.subtract) * sign(cache.invert) * sign(cache.pen_flip),
        pressure: brush.strength_pressure(cache.pressure),
        // Samples are not spaced, so dabs never overlap
        overlap: 1.0,
        feather,
    };
    (TOOL_TABLE[brush.tool as usize].strength)(&input)
}

/// Front-face attenuation: `max(view · normal, 0)` when enabled
pub fn frontface(brush: &Brush, view_normal: Vec3, normal: Vec3) -> f32 {
    if brush.frontface {
        view_normal.dot(normal).max(0.0)
    } else {
        1.0
    }
}

fn hardness_remap(len: f32, radius: f32, hardness: f32) -> f32 {
    let p = len / radius;
    if p < hardness {
        0.0
    } else if hardness >= 1.0 {
        radius
    } else {
        (p - hardness) / (1.0 - hardness) * radius
    }
}

/// Per-vertex weight in `0..=1` before the sample strength is applied
pub fn brush_strength_factor(
    ctx: &ActionContext<'_>,
    co: Vec3,
    len: f32,
    normal: Vec3,
    v: u32,
) -> f32 {
    let radius = ctx.cache.radius;
    if radius <= 0.0 {
        return 0.0;
    }
    let final_len = hardness_remap(len, radius, ctx.brush.hardness);
    let texture = ctx.texture.map_or(1.0, |t| t.sample(co, ctx.cache));
    let mask = if ctx.brush.tool == ToolId::Mask { 0.0 } else { ctx.mesh.mask(v) };
    let automask = ctx
        .auto_masking
        .map_or(1.0, |a| a.factor(ctx.cache, ctx.mesh, v));
    texture
        * ctx.brush.falloff.evaluate(final_len / radius)
        * frontface(ctx.brush, ctx.cache.view_normal, normal)
        * (1.0 - mask)
        * automask
}

/// Leaf nodes the current pass can touch
pub fn gather_brush_nodes(spatial: &dyn SpatialIndex, brush: &Brush, cache: &StrokeCache) -> Vec<NodeId> {
    let kind = if brush.tool.needs_original() {
        BoundsKind::Original
    } else {
        BoundsKind::Current
    };
    if brush.tool.affects_all_nodes() {
        return spatial.gather_nodes(kind, &|_| true);
    }
    let mut scale = 1.0;
    if brush.uses_cube_tip() || brush.tool == ToolId::ClayStrips {
        scale *= SQRT_2;
    }
    if brush.original_normal {
        scale = f32::max(scale, 2.0);
    }
    let radius = cache.radius * scale;
    let location = cache.location;
    let nodes = match brush.falloff_shape {
        FalloffShape::Sphere => {
            spatial.gather_nodes(kind, &|b| b.intersects_sphere(location, radius))
        }
        FalloffShape::Tube => {
            let axis = cache.view_normal;
            spatial.gather_nodes(kind, &|b| b.intersects_tube(location, axis, radius))
        }
    };
    trace!("gather_brush_nodes: {} nodes within {}", nodes.len(), radius);
    nodes
}

/// Area estimate inputs for the current pass
pub fn area_params(brush: &Brush, cache: &StrokeCache, settings: &SculptSettings) -> AreaParams {
    let pressure = if brush.area_radius_pressure { cache.pressure } else { 1.0 };
    AreaParams {
        location: cache.location,
        view_normal: cache.view_normal,
        radius: cache.radius,
        normal_radius_factor: brush.normal_radius_factor,
        area_radius_factor: brush.area_radius_factor * pressure,
        shape: brush.falloff_shape,
        use_original: brush.tool.needs_original(),
        stroke_id: cache.stroke_id,
        fallback_center: cache.location,
        fallback_normal: if cache.sculpt_normal == Vec3::ZERO {
            cache.view_normal
        } else {
            cache.sculpt_normal
        },
        min_nodes_per_task: settings.min_nodes_per_task,
    }
}

fn project_on_view_plane(n: Vec3, view: Vec3) -> Vec3 {
    let projected = (n - view * n.dot(view)).normalize_or_zero();
    if projected == Vec3::ZERO { n } else { projected }
}

fn plane_axis(plane: SculptPlane, view: Vec3) -> Option<Vec3> {
    match plane {
        SculptPlane::View => Some(view),
        SculptPlane::X => Some(Vec3::X),
        SculptPlane::Y => Some(Vec3::Y),
        SculptPlane::Z => Some(Vec3::Z),
        SculptPlane::Area => None,
    }
}

/// Inputs of the normal and plane estimates
pub struct PlaneInputs<'a> {
    pub mesh: &'a SculptMesh,
    pub attrs: &'a VertexAttributes,
    pub spatial: &'a dyn SpatialIndex,
    pub brush: &'a Brush,
    pub settings: &'a SculptSettings,
    pub nodes: &'a [NodeId],
}

/// Refresh the sculpt normal on the main pass, or mirror it into this one.
///
/// The main pass recomputes on the first step, whenever the tool follows
/// the surface, or when no normal exists yet.
pub fn update_sculpt_normal(inputs: &PlaneInputs<'_>, cache: &mut StrokeCache) {
    let brush = inputs.brush;
    let tool = brush.tool;
    // An anchored thumb re-derives its normal like an ordinary brush
    let keeps_normal = tool.is_grab_like() && !(tool == ToolId::Thumb && brush.anchored);
    let update_normal = !brush.original_normal && !keeps_normal;

    if cache.is_main_symmetry_pass()
        && (cache.is_first_brush_step() || update_normal || cache.sculpt_normal == Vec3::ZERO)
    {
        let mut normal = match plane_axis(brush.sculpt_plane, cache.true_view_normal) {
            Some(axis) => axis,
            None => calc_area_normal(
                inputs.mesh,
                inputs.attrs,
                inputs.spatial,
                inputs.nodes,
                &area_params(brush, cache, inputs.settings),
            ),
        };
        if brush.falloff_shape == FalloffShape::Tube {
            normal = project_on_view_plane(normal, cache.true_view_normal);
        }
        cache.sculpt_normal = normal;
        cache.sculpt_normal_symm = normal;
    } else {
        cache.sculpt_normal_symm = cache.pass.apply(cache.sculpt_normal);
    }
}

/// Working plane `(normal, center)` of the plane tools.
///
/// The main pass computes it and stores it in the cache; other passes
/// mirror the stored plane and shift it by the tile offset.
pub fn calc_brush_plane(inputs: &PlaneInputs<'_>, cache: &mut StrokeCache) -> (Vec3, Vec3) {
    let brush = inputs.brush;
    if !cache.is_main_symmetry_pass() {
        let normal = cache.pass.apply(cache.sculpt_normal);
        let center = cache.pass.apply(cache.last_center) + cache.plane_offset;
        return (normal, center);
    }

    let params = area_params(brush, cache, inputs.settings);
    let (mut normal, center) = match plane_axis(brush.sculpt_plane, cache.view_normal) {
        Some(axis) => {
            let center =
                calc_area_center(inputs.mesh, inputs.attrs, inputs.spatial, inputs.nodes, &params);
            (axis, center)
        }
        None => calc_area_normal_and_center(
            inputs.mesh,
            inputs.attrs,
            inputs.spatial,
            inputs.nodes,
            &params,
        ),
    };
    if brush.sculpt_plane == SculptPlane::Area && brush.falloff_shape == FalloffShape::Tube {
        normal = project_on_view_plane(normal, cache.view_normal);
    }

    let keep = brush.original_normal && !cache.is_first_brush_step();
    let normal = if keep {
        cache.sculpt_normal
    } else {
        cache.sculpt_normal = normal;
        normal
    };
    let center = if keep {
        cache.last_center
    } else {
        cache.last_center = center;
        center
    };
    cache.sculpt_normal_symm = normal;
    (normal, center)
}

/// Signed radius used by the clay tools: negative while subtracting
fn signed_radius(cache: &StrokeCache, bstrength: f32) -> f32 {
    if bstrength < 0.0 { -cache.radius } else { cache.radius }
}

fn clay_strips_plane_center(brush: &Brush, cache: &StrokeCache, bstrength: f32, normal: Vec3, center: Vec3) -> Vec3 {
    center + normal * signed_radius(cache, bstrength) * (0.25 + brush.plane_offset)
}

/// Square-tip frame of the current pass, `None` for round brushes
pub fn brush_tip_frame(
    brush: &Brush,
    cache: &mut StrokeCache,
    bstrength: f32,
    area_normal: Vec3,
    area_center: Vec3,
) -> Option<TipFrame> {
    if brush.tool == ToolId::ClayStrips {
        let center = clay_strips_plane_center(brush, cache, bstrength, area_normal, area_center);
        let origin = center - area_normal * signed_radius(cache, bstrength) * 0.7;
        return Some(cache.update_brush_local_mat(
            area_normal,
            origin,
            brush.tip_scale_x,
            1.25,
            brush.tip_roundness,
        ));
    }
    if !brush.uses_cube_tip() {
        return None;
    }
    let normal = if cache.sculpt_normal_symm == Vec3::ZERO {
        area_normal
    } else {
        cache.sculpt_normal_symm
    };
    let origin = cache.location;
    Some(cache.update_brush_local_mat(normal, origin, brush.tip_scale_x, 1.0, brush.tip_roundness))
}

/// Run the tool's action over `nodes` in parallel
pub fn do_brush_action(ctx: &ActionContext<'_>, nodes: &[NodeId]) -> Vec<ProxyBuffer> {
    let action = TOOL_TABLE[ctx.brush.tool as usize].action;
    let buffers: Vec<ProxyBuffer> = nodes
        .par_iter()
        .with_min_len(ctx.settings.min_nodes_per_task)
        .filter_map(|&node| action(ctx, node))
        .collect();
    trace!(
        "do_brush_action: {:?} strength {} touched {}/{} nodes",
        ctx.brush.tool,
        ctx.bstrength,
        buffers.len(),
        nodes.len()
    );
    buffers
}

/// Extra smoothing after the main action
pub fn do_autosmooth(ctx: &ActionContext<'_>, nodes: &[NodeId]) -> Vec<ProxyBuffer> {
    let mut strength = ctx.cache.autosmooth_factor;
    if ctx.brush.pressure_strength {
        strength *= ctx.cache.pressure;
    }
    nodes
        .par_iter()
        .with_min_len(ctx.settings.min_nodes_per_task)
        .filter_map(|&node| smooth_node(ctx, node, strength))
        .collect()
}

/// Pull vertices against the gravity "up" direction
pub fn do_gravity(ctx: &ActionContext<'_>, nodes: &[NodeId]) -> Vec<ProxyBuffer> {
    let offset =
        -ctx.cache.gravity_direction * ctx.cache.radius_squared * ctx.settings.gravity_factor;
    nodes
        .par_iter()
        .with_min_len(ctx.settings.min_nodes_per_task)
        .filter_map(|&node| co_action(ctx, node, |s| offset * s.factor))
        .collect()
}

/// One vertex inside the brush volume
struct VertexSample {
    v: u32,
    /// Slot in the node's vertex list
    index: usize,
    /// Coordinate the test ran against
    co: Vec3,
    current: Vec3,
    orig: OrigData,
    /// Falloff weight
    factor: f32,
    /// `bstrength · factor`
    fade: f32,
}

/// Visit every visible vertex of `node` inside the brush volume.
///
/// Tools that work on original data test the original coordinate. Tools
/// not bounded by the radius skip the test and only weigh mask and
/// auto-masking.
fn for_each_vertex(ctx: &ActionContext<'_>, node: NodeId, mut f: impl FnMut(&VertexSample)) {
    let tool = ctx.brush.tool;
    let use_orig = tool.needs_original();
    let unbounded = tool.affects_all_nodes();
    for (index, &v) in ctx.spatial.node_vertices(node).iter().enumerate() {
        if !ctx.mesh.visible(v) {
            continue;
        }
        let current = ctx.mesh.co(v);
        let orig = ctx.attrs.orig(ctx.mesh, v, ctx.cache.stroke_id);
        let (co, normal) = if use_orig {
            (orig.co, orig.no)
        } else {
            (current, ctx.mesh.normal(v))
        };
        let factor = if unbounded {
            let automask = ctx
                .auto_masking
                .map_or(1.0, |a| a.factor(ctx.cache, ctx.mesh, v));
            (1.0 - ctx.mesh.mask(v)) * automask
        } else {
            let Some(dist_sq) = ctx.test.test(co) else {
                continue;
            };
            brush_strength_factor(ctx, co, dist_sq.sqrt(), normal, v)
        };
        f(&VertexSample {
            v,
            index,
            co,
            current,
            orig,
            factor,
            fade: ctx.bstrength * factor,
        });
    }
}

/// Coordinate proxy from a per-vertex offset, `None` when nothing is inside
fn co_action(
    ctx: &ActionContext<'_>,
    node: NodeId,
    offset: impl Fn(&VertexSample) -> Vec3,
) -> Option<ProxyBuffer> {
    let mut buffer = vec![Vec3::ZERO; ctx.spatial.node_vertices(node).len()];
    let mut touched = false;
    for_each_vertex(ctx, node, |s| {
        buffer[s.index] = offset(s);
        touched = true;
    });
    touched.then(|| ProxyBuffer {
        node,
        data: ProxyData::Co(buffer),
    })
}

fn do_draw(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let offset = ctx.cache.sculpt_normal_symm * ctx.cache.radius;
    co_action(ctx, node, |s| offset * s.fade)
}

fn do_inflate(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let radius = ctx.cache.radius;
    co_action(ctx, node, |s| ctx.mesh.normal(s.v) * radius * s.fade)
}

fn do_layer(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let height = ctx.brush.height;
    co_action(ctx, node, |s| {
        let prev = ctx.cache.layer_displacement(s.v);
        let limit = 1.0 - ctx.mesh.mask(s.v);
        let disp = (prev + s.factor * ctx.bstrength * (1.05 - prev.abs())).clamp(-limit, limit);
        ctx.cache.set_layer_displacement(s.v, disp);
        let target = s.orig.co + s.orig.no * height * disp;
        (target - s.current) * s.factor.abs()
    })
}

/// Component of `v` perpendicular to `normal`
fn project_perpendicular(v: Vec3, normal: Vec3) -> Vec3 {
    let len_sq = normal.length_squared();
    if len_sq == 0.0 {
        return v;
    }
    v - normal * (v.dot(normal) / len_sq)
}

fn do_crease(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let cache = ctx.cache;
    let normal = cache.sculpt_normal_symm;
    let offset = normal * cache.radius * ctx.bstrength;

    let mut correction = ctx.brush.crease_pinch_factor * ctx.brush.crease_pinch_factor;
    let alpha = cache.root_alpha;
    if alpha > 0.0 {
        correction /= alpha * alpha;
    }
    // Crease always pinches and blob always relaxes, whatever the direction
    let mut flipped = if ctx.bstrength < 0.0 {
        -correction * ctx.bstrength
    } else {
        correction * ctx.bstrength
    };
    if ctx.brush.tool == ToolId::Blob {
        flipped = -flipped;
    }
    let tube = ctx.brush.falloff_shape == FalloffShape::Tube;

    co_action(ctx, node, |s| {
        let mut pinch = ctx.test.location - s.co;
        if tube {
            pinch = project_perpendicular(pinch, cache.view_normal);
        }
        let pinch = project_perpendicular(pinch * s.factor * flipped, normal);
        pinch + offset * s.factor
    })
}

/// Average of the neighbors a vertex smooths toward.
///
/// Boundary vertices only follow other boundary vertices; vertices with two
/// or fewer neighbors stay put.
fn neighbor_average(ctx: &ActionContext<'_>, v: u32) -> Vec3 {
    let mesh = ctx.mesh;
    let current = mesh.co(v);
    let table = ctx.cache.neighbor_table(mesh, ctx.fake);
    let live;
    let neighbors: &[u32] = match table.get(v as usize) {
        Some(list) => list.as_slice(),
        None => {
            live = vertex_neighbors(mesh, ctx.fake, mesh.index_to_vertex(v), false)
                .indices()
                .collect::<Vec<u32>>();
            live.as_slice()
        }
    };
    if neighbors.len() <= 2 {
        return current;
    }
    let is_boundary = vertex_is_boundary(mesh, ctx.attrs, v, BoundaryKind::MESH);
    let mut sum = Vec3::ZERO;
    let mut total = 0;
    for &n in neighbors {
        if is_boundary && !vertex_is_boundary(mesh, ctx.attrs, n, BoundaryKind::MESH) {
            continue;
        }
        sum += mesh.co(n);
        total += 1;
    }
    if total == 0 { current } else { sum / total as f32 }
}

fn smooth_node(ctx: &ActionContext<'_>, node: NodeId, strength: f32) -> Option<ProxyBuffer> {
    let strength = strength.clamp(0.0, 1.0);
    if strength == 0.0 {
        return None;
    }
    co_action(ctx, node, |s| {
        let average = neighbor_average(ctx, s.v);
        (average - s.current) * s.factor * strength
    })
}

fn do_smooth(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    smooth_node(ctx, node, ctx.bstrength)
}

fn plane_trim(ctx: &ActionContext<'_>, val: Vec3) -> bool {
    match ctx.brush.plane_trim {
        Some(trim) => val.length_squared() <= ctx.cache.radius_squared * trim * trim,
        None => true,
    }
}

/// Signed distance of `co` above the plane through `center`
fn plane_side(co: Vec3, normal: Vec3, center: Vec3) -> f32 {
    (co - center).dot(normal)
}

fn do_flatten(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let tool = ctx.brush.tool;
    let flip = tool != ToolId::Flatten && ctx.bstrength < 0.0;
    let (strength, radius) = if flip {
        (-ctx.bstrength, -ctx.cache.radius)
    } else {
        (ctx.bstrength, ctx.cache.radius)
    };
    let normal = ctx.area_normal;
    let center = ctx.area_center + normal * radius * ctx.brush.plane_offset;
    let side_sign = if flip { -1.0 } else { 1.0 };

    let mut buffer = vec![Vec3::ZERO; ctx.spatial.node_vertices(node).len()];
    let mut touched = false;
    for_each_vertex(ctx, node, |s| {
        let side = plane_side(s.co, normal, center) * side_sign;
        let keep = match tool {
            ToolId::Fill => side <= 0.0,
            ToolId::Scrape => side > 0.0,
            _ => true,
        };
        if !keep {
            return;
        }
        let val = -normal * plane_side(s.co, normal, center);
        if !plane_trim(ctx, val) {
            return;
        }
        buffer[s.index] = val * strength * s.factor;
        touched = true;
    });
    touched.then(|| ProxyBuffer {
        node,
        data: ProxyData::Co(buffer),
    })
}

fn do_clay(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let normal = ctx.area_normal;
    let mut displace = (ctx.cache.initial_radius * (0.25 + ctx.brush.plane_offset)).abs();
    if ctx.bstrength < 0.0 {
        displace = -displace;
    }
    let center = ctx.area_center + normal * displace;
    let strength = ctx.bstrength.abs();
    co_action(ctx, node, |s| {
        let val = -normal * plane_side(s.co, normal, center);
        val * strength * s.factor
    })
}

fn do_clay_strips(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let cache = ctx.cache;
    // The stroke direction orients the strip; there is none on the first step
    if cache.is_first_brush_step() || cache.grab_delta_symmetry == Vec3::ZERO {
        return None;
    }
    let normal = ctx.area_normal;
    let center = clay_strips_plane_center(ctx.brush, cache, ctx.bstrength, normal, ctx.area_center);
    let side_sign = if ctx.bstrength < 0.0 { -1.0 } else { 1.0 };

    let mut buffer = vec![Vec3::ZERO; ctx.spatial.node_vertices(node).len()];
    let mut touched = false;
    for_each_vertex(ctx, node, |s| {
        if plane_side(s.co, normal, center) * side_sign > 0.0 {
            return;
        }
        let val = -normal * plane_side(s.co, normal, center);
        if !plane_trim(ctx, val) {
            return;
        }
        buffer[s.index] = val * s.fade;
        touched = true;
    });
    touched.then(|| ProxyBuffer {
        node,
        data: ProxyData::Co(buffer),
    })
}

fn do_pinch(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let normal = ctx.area_normal;
    let tube = ctx.brush.falloff_shape == FalloffShape::Tube;
    co_action(ctx, node, |s| {
        let mut disp = project_perpendicular(ctx.test.location - s.co, normal);
        if tube {
            disp = project_perpendicular(disp, ctx.cache.view_normal);
        }
        disp * s.fade
    })
}

fn do_grab(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let delta = ctx.cache.grab_delta_symmetry;
    co_action(ctx, node, |s| delta * s.fade)
}

fn do_snake_hook(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let delta = ctx.cache.grab_delta_symmetry;
    co_action(ctx, node, |s| delta * s.fade)
}

/// Thumb and nudge: the grab delta flattened onto the surface plane
fn do_thumb(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let normal = ctx.cache.sculpt_normal_symm;
    let cono = normal.cross(ctx.cache.grab_delta_symmetry).cross(normal);
    co_action(ctx, node, |s| cono * s.fade)
}

fn do_rotate(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let cache = ctx.cache;
    let axis = cache.sculpt_normal_symm.normalize_or_zero();
    if axis == Vec3::ZERO {
        return None;
    }
    let angle = cache.vertex_rotation * cache.mirror_sign();
    let location = cache.location;
    co_action(ctx, node, |s| {
        let rot = Quat::from_axis_angle(axis, angle * s.fade);
        rot * (s.orig.co - location) + location - s.orig.co
    })
}

/// Regularized Kelvinlet grab, normalized so the brush center moves by
/// exactly `force`
pub fn kelvinlet_grab(r: Vec3, force: Vec3, radius: f32, poisson_ratio: f32) -> Vec3 {
    let a = 1.0 / (4.0 * PI);
    let b = a / (4.0 * (1.0 - poisson_ratio));
    let eps = radius.max(f32::EPSILON);
    let r_e = (r.length_squared() + eps * eps).sqrt();
    let r_e3 = r_e * r_e * r_e;
    let u = force * ((a - b) / r_e + a * eps * eps / (2.0 * r_e3)) + r * (b / r_e3 * r.dot(force));
    let center = (3.0 * a - 2.0 * b) / (2.0 * eps);
    u / center
}

fn do_elastic_deform(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let cache = ctx.cache;
    let delta = cache.grab_delta_symmetry;
    let location = cache.location;
    let nu = ctx.brush.elastic_volume_preservation;
    co_action(ctx, node, |s| {
        kelvinlet_grab(s.orig.co - location, delta, cache.radius, nu) * ctx.bstrength * s.factor
    })
}

fn do_solver(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let solver = ctx.solver?;
    co_action(ctx, node, |s| {
        solver.displacement(ctx.mesh, ctx.cache, s.v, s.orig.co, s.fade)
    })
}

fn do_mask(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let mut deltas = vec![0.0; ctx.spatial.node_vertices(node).len()];
    let mut touched = false;
    for_each_vertex(ctx, node, |s| {
        deltas[s.index] = s.fade;
        touched = true;
    });
    touched.then(|| ProxyBuffer {
        node,
        data: ProxyData::Mask(deltas),
    })
}

fn do_paint(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let color = Vec4::from_array(ctx.brush.color);
    let mut deltas = vec![Vec4::ZERO; ctx.spatial.node_vertices(node).len()];
    let mut touched = false;
    for_each_vertex(ctx, node, |s| {
        deltas[s.index] = (color - ctx.mesh.color(s.v)) * s.fade.clamp(0.0, 1.0);
        touched = true;
    });
    touched.then(|| ProxyBuffer {
        node,
        data: ProxyData::Color(deltas),
    })
}

/// Fade below which a vertex does not take the drawn face set
const FACE_SET_DRAW_THRESHOLD: f32 = 0.05;

fn do_draw_face_sets(ctx: &ActionContext<'_>, node: NodeId) -> Option<ProxyBuffer> {
    let mut marked = vec![false; ctx.spatial.node_vertices(node).len()];
    let mut touched = false;
    for_each_vertex(ctx, node, |s| {
        if s.fade > FACE_SET_DRAW_THRESHOLD {
            marked[s.index] = true;
            touched = true;
        }
    });
    touched.then(|| ProxyBuffer {
        node,
        data: ProxyData::FaceSet(marked),
    })
}
