//! Core sculpting types.
//!
//! Tool identifiers with their fixed capability sets, brush shape enums,
//! boundary classification bits and per-vertex flag bits.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Sculpt tool identifier.
///
/// The set is closed: strength formulas and actions are looked up from a
/// static table keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ToolId {
    /// Offset along the sculpt normal
    #[default]
    Draw = 0,
    /// Draw evaluated against original coordinates
    DrawSharp = 1,
    /// Build up toward an offset plane
    Clay = 2,
    /// Clay with a square tip
    ClayStrips = 3,
    /// Raise to a fixed height above the original surface
    Layer = 4,
    /// Move along each vertex's own normal
    Inflate = 5,
    /// Inflate combined with a pinch
    Blob = 6,
    /// Pinch toward the stroke line while offsetting
    Crease = 7,
    /// Laplacian smoothing toward the neighbor average
    Smooth = 8,
    /// Project onto the area plane
    Flatten = 9,
    /// Flatten only vertices below the plane
    Fill = 10,
    /// Flatten only vertices above the plane
    Scrape = 11,
    /// Pull toward the brush center in the brush plane
    Pinch = 12,
    /// Move original coordinates by the grab delta
    Grab = 13,
    /// Drag current coordinates along the stroke
    SnakeHook = 14,
    /// Grab delta projected onto the surface plane
    Thumb = 15,
    /// Push along the surface in the stroke direction
    Nudge = 16,
    /// Rotate original coordinates around the sculpt normal
    Rotate = 17,
    /// Kelvinlet regularized grab
    ElasticDeform = 18,
    /// Skeleton-style deformation from an external solver
    Pose = 19,
    /// Boundary deformation from an external solver
    Boundary = 20,
    /// Cloth simulation from an external solver
    Cloth = 21,
    /// Paint the mask layer
    Mask = 22,
    /// Paint vertex colors
    Paint = 23,
    /// Paint face-set ids
    DrawFaceSets = 24,
}

impl ToolId {
    /// Every tool, in id order
    pub const ALL: [ToolId; 25] = [
        ToolId::Draw,
        ToolId::DrawSharp,
        ToolId::Clay,
        ToolId::ClayStrips,
        ToolId::Layer,
        ToolId::Inflate,
        ToolId::Blob,
        ToolId::Crease,
        ToolId::Smooth,
        ToolId::Flatten,
        ToolId::Fill,
        ToolId::Scrape,
        ToolId::Pinch,
        ToolId::Grab,
        ToolId::SnakeHook,
        ToolId::Thumb,
        ToolId::Nudge,
        ToolId::Rotate,
        ToolId::ElasticDeform,
        ToolId::Pose,
        ToolId::Boundary,
        ToolId::Cloth,
        ToolId::Mask,
        ToolId::Paint,
        ToolId::DrawFaceSets,
    ];

    /// Tools that evaluate brush tests and falloff against original data
    pub fn needs_original(self) -> bool {
        matches!(
            self,
            ToolId::Grab
                | ToolId::Rotate
                | ToolId::Thumb
                | ToolId::Layer
                | ToolId::DrawSharp
                | ToolId::ElasticDeform
                | ToolId::Smooth
                | ToolId::Paint
                | ToolId::Boundary
                | ToolId::Pose
        )
    }

    /// Tools whose proxies are added to the original coordinate, not the current one
    pub fn uses_original_proxy_base(self) -> bool {
        matches!(
            self,
            ToolId::Grab
                | ToolId::Rotate
                | ToolId::Thumb
                | ToolId::ElasticDeform
                | ToolId::Boundary
                | ToolId::Pose
        )
    }

    /// Tools that need the sculpt normal updated before their action runs
    pub fn needs_sculpt_normal(self) -> bool {
        matches!(
            self,
            ToolId::Blob
                | ToolId::Crease
                | ToolId::Draw
                | ToolId::DrawSharp
                | ToolId::Cloth
                | ToolId::Layer
                | ToolId::Nudge
                | ToolId::Rotate
                | ToolId::ElasticDeform
                | ToolId::Thumb
        )
    }

    /// Tools that derive their working plane from the area normal and center
    pub fn uses_brush_plane(self) -> bool {
        matches!(
            self,
            ToolId::Clay
                | ToolId::ClayStrips
                | ToolId::Flatten
                | ToolId::Fill
                | ToolId::Scrape
                | ToolId::Pinch
        )
    }

    /// Tools whose brush location stays at the stroke origin
    pub fn keeps_stroke_origin(self) -> bool {
        matches!(
            self,
            ToolId::Grab | ToolId::Thumb | ToolId::ElasticDeform | ToolId::Rotate
        )
    }

    /// Tools whose grab delta sums over the whole stroke instead of one sample
    pub fn accumulates_grab_delta(self) -> bool {
        matches!(
            self,
            ToolId::Grab | ToolId::Thumb | ToolId::ElasticDeform | ToolId::Pose | ToolId::Boundary
        )
    }

    /// Tools that keep working when the pointer leaves the surface
    pub fn continues_off_surface(self) -> bool {
        self.keeps_stroke_origin() || self.accumulates_grab_delta()
    }

    /// Tools not bounded by the brush radius
    pub fn affects_all_nodes(self) -> bool {
        matches!(self, ToolId::ElasticDeform | ToolId::Pose | ToolId::Boundary)
    }

    /// Tools that keep the stroke's sculpt normal instead of re-deriving it per sample
    pub fn is_grab_like(self) -> bool {
        matches!(
            self,
            ToolId::Grab | ToolId::Thumb | ToolId::ElasticDeform | ToolId::SnakeHook
        )
    }

    /// Tools whose action is provided by an external [`BrushSolver`](crate::collaborators::BrushSolver)
    pub fn is_solver_driven(self) -> bool {
        matches!(self, ToolId::Pose | ToolId::Boundary | ToolId::Cloth)
    }

    /// Tools during which dynamic topology may subdivide the mesh
    pub fn has_dyntopo(self) -> bool {
        !matches!(
            self,
            ToolId::Grab
                | ToolId::Rotate
                | ToolId::Cloth
                | ToolId::Thumb
                | ToolId::Layer
                | ToolId::DrawSharp
                | ToolId::ElasticDeform
                | ToolId::Boundary
                | ToolId::Pose
                | ToolId::DrawFaceSets
                | ToolId::Paint
                | ToolId::Mask
        )
    }

    /// Which kind of data the undo log must capture before this tool writes
    pub fn undo_kind(self) -> UndoDataKind {
        match self {
            ToolId::Mask => UndoDataKind::Mask,
            ToolId::Paint => UndoDataKind::Color,
            ToolId::DrawFaceSets => UndoDataKind::FaceSets,
            _ => UndoDataKind::Coords,
        }
    }
}

/// Shape of the brush influence volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FalloffShape {
    /// Distance measured in 3D
    #[default]
    Sphere,
    /// Distance measured in the view plane (infinite depth)
    Tube,
}

/// Source of the sculpt normal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SculptPlane {
    /// Toward the viewer
    View,
    X,
    Y,
    Z,
    /// Area normal under the brush
    #[default]
    Area,
}

/// Undo data kinds the undo collaborator distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UndoDataKind {
    Coords,
    Mask,
    Color,
    FaceSets,
    Geometry,
}

/// Set of boundary (or corner) kinds a vertex or edge participates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundaryKind(pub u8);

impl BoundaryKind {
    pub const NONE: Self = Self(0);
    pub const MESH: Self = Self(1 << 0);
    pub const FACE_SET: Self = Self(1 << 1);
    pub const SEAM: Self = Self(1 << 2);
    pub const SHARP: Self = Self(1 << 3);
    pub const UV: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BoundaryKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BoundaryKind {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for BoundaryKind {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Per-vertex cached flag bits.
///
/// Boundary and corner kinds are packed into the upper bytes so a single
/// atomic word carries the whole lazily computed state.
pub mod vertex_flags {
    /// Boundary/corner bits are stale
    pub const NEED_BOUNDARY: u32 = 1 << 0;
    /// Cached valence is stale
    pub const NEED_VALENCE: u32 = 1 << 1;
    /// Shift of the [`BoundaryKind`](super::BoundaryKind) byte
    pub const BOUNDARY_SHIFT: u32 = 8;
    /// Shift of the corner [`BoundaryKind`](super::BoundaryKind) byte
    pub const CORNER_SHIFT: u32 = 16;
    /// Flags every vertex starts with
    pub const INITIAL: u32 = NEED_BOUNDARY | NEED_VALENCE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_ids_are_dense() {
        for (i, tool) in ToolId::ALL.iter().enumerate() {
            assert_eq!(*tool as usize, i);
        }
    }

    #[test]
    fn test_original_proxy_base_implies_needs_original() {
        for tool in ToolId::ALL {
            if tool.uses_original_proxy_base() {
                assert!(tool.needs_original(), "{:?}", tool);
            }
        }
    }

    #[test]
    fn test_off_surface_tools() {
        assert!(ToolId::Grab.continues_off_surface());
        assert!(ToolId::Pose.continues_off_surface());
        assert!(!ToolId::Pose.keeps_stroke_origin());
        assert!(!ToolId::Draw.continues_off_surface());
        assert!(ToolId::ElasticDeform.affects_all_nodes());
    }

    #[test]
    fn test_undo_kinds() {
        assert_eq!(ToolId::Mask.undo_kind(), UndoDataKind::Mask);
        assert_eq!(ToolId::Paint.undo_kind(), UndoDataKind::Color);
        assert_eq!(ToolId::DrawFaceSets.undo_kind(), UndoDataKind::FaceSets);
        assert_eq!(ToolId::Draw.undo_kind(), UndoDataKind::Coords);
    }

    #[test]
    fn test_boundary_kind_ops() {
        let kind = BoundaryKind::MESH | BoundaryKind::SEAM;
        assert!(kind.contains(BoundaryKind::MESH));
        assert!(!kind.contains(BoundaryKind::FACE_SET));
        assert!(kind.intersects(BoundaryKind::SEAM | BoundaryKind::UV));
        assert!((kind & BoundaryKind::UV).is_empty());
    }
}
