//! Brush parameters and presets.
//!
//! A [`Brush`] is plain serializable data. Everything stroke-dependent
//! (pressure-mapped radius, symmetry-transformed frames) lives in the
//! stroke cache instead.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SculptError};
use crate::types::{FalloffShape, SculptPlane, ToolId};

/// Falloff curve for brush influence.
///
/// Determines how brush strength decreases from center to edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FalloffCurve {
    /// Linear falloff: strength = 1 - distance/radius
    Linear = 0,
    /// Smooth falloff: hermite interpolation
    #[default]
    Smooth = 1,
    /// Sharp falloff: quadratic decay
    Sharp = 2,
    /// Constant: full strength within radius
    Constant = 3,
    /// Sphere: spherical falloff (sqrt-based)
    Sphere = 4,
    /// Root: square root of the linear falloff
    Root = 5,
    /// Inverse square: t(2 - t), flat center with a soft rim
    InverseSquare = 6,
}

impl FalloffCurve {
    /// Calculate falloff strength at a given normalized distance (0.0 = center, 1.0 = edge).
    pub fn evaluate(&self, normalized_distance: f32) -> f32 {
        let d = normalized_distance.clamp(0.0, 1.0);
        let t = 1.0 - d;
        match self {
            FalloffCurve::Linear => t,
            // Hermite smoothstep: 3t² - 2t³
            FalloffCurve::Smooth => t * t * (3.0 - 2.0 * t),
            FalloffCurve::Sharp => t * t,
            FalloffCurve::Constant => 1.0,
            FalloffCurve::Sphere => (1.0 - d * d).max(0.0).sqrt(),
            FalloffCurve::Root => t.sqrt(),
            FalloffCurve::InverseSquare => t * (2.0 - t),
        }
    }
}

/// Brush configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Brush {
    /// Display name
    pub name: String,
    /// Which action the brush runs
    pub tool: ToolId,
    /// Strength multiplier (0.0 to 1.0, some tools allow more)
    pub alpha: f32,
    /// Base radius in object units
    pub radius: f32,
    /// Falloff curve
    pub falloff: FalloffCurve,
    /// Sphere or view-aligned tube
    pub falloff_shape: FalloffShape,
    /// Fraction of the radius at full strength before the curve starts
    pub hardness: f32,
    /// 1 is a round tip, 0 a square one
    pub tip_roundness: f32,
    /// Stretch of the tip along the stroke direction
    pub tip_scale_x: f32,
    /// Radius scale used when sampling the area normal
    pub normal_radius_factor: f32,
    /// Radius scale used when sampling the area center
    pub area_radius_factor: f32,
    /// Scale the area radius by pressure
    pub area_radius_pressure: bool,
    /// Where the sculpt normal comes from
    pub sculpt_plane: SculptPlane,
    /// Subtract instead of add (the brush's own invert)
    pub subtract: bool,
    /// Attenuate vertices facing away from the view
    pub frontface: bool,
    /// Keep the sculpt normal from the first dab
    pub original_normal: bool,
    /// Radius follows the drag distance from the first sample
    pub anchored: bool,
    /// Whether pressure scales strength
    pub pressure_strength: bool,
    /// Whether pressure scales radius
    pub pressure_radius: bool,
    /// Smoothing strength applied after each dab
    pub autosmooth_factor: f32,
    /// Offset of the working plane, in radius fractions
    pub plane_offset: f32,
    /// Leave vertices farther than this (radius fraction) from the plane alone
    pub plane_trim: Option<f32>,
    /// Layer height in object units
    pub height: f32,
    /// Pinch strength of crease and blob
    pub crease_pinch_factor: f32,
    /// Poisson ratio of the elastic grab
    pub elastic_volume_preservation: f32,
    /// Paint color (RGBA)
    pub color: [f32; 4],
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            name: "Draw".to_string(),
            tool: ToolId::Draw,
            alpha: 0.5,
            radius: 0.25,
            falloff: FalloffCurve::Smooth,
            falloff_shape: FalloffShape::Sphere,
            hardness: 0.0,
            tip_roundness: 1.0,
            tip_scale_x: 1.0,
            normal_radius_factor: 0.5,
            area_radius_factor: 0.5,
            area_radius_pressure: false,
            sculpt_plane: SculptPlane::Area,
            subtract: false,
            frontface: false,
            original_normal: false,
            anchored: false,
            pressure_strength: true,
            pressure_radius: false,
            autosmooth_factor: 0.0,
            plane_offset: 0.0,
            plane_trim: None,
            height: 0.5,
            crease_pinch_factor: 0.5,
            elastic_volume_preservation: 0.4,
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl Brush {
    fn preset(name: &str, tool: ToolId) -> Self {
        Self {
            name: name.to_string(),
            tool,
            ..Default::default()
        }
    }

    /// Default preset for any tool
    pub fn for_tool(tool: ToolId) -> Self {
        match tool {
            ToolId::Draw => Self::draw(),
            ToolId::DrawSharp => Self::draw_sharp(),
            ToolId::Clay => Self::clay(),
            ToolId::ClayStrips => Self::clay_strips(),
            ToolId::Layer => Self::layer(),
            ToolId::Inflate => Self::inflate(),
            ToolId::Blob => Self::blob(),
            ToolId::Crease => Self::crease(),
            ToolId::Smooth => Self::smooth(),
            ToolId::Flatten => Self::flatten(),
            ToolId::Fill => Self::fill(),
            ToolId::Scrape => Self::scrape(),
            ToolId::Pinch => Self::pinch(),
            ToolId::Grab => Self::grab(),
            ToolId::SnakeHook => Self::snake_hook(),
            ToolId::Thumb => Self::thumb(),
            ToolId::Nudge => Self::nudge(),
            ToolId::Rotate => Self::rotate(),
            ToolId::ElasticDeform => Self::elastic_deform(),
            ToolId::Pose => Self::pose(),
            ToolId::Boundary => Self::boundary(),
            ToolId::Cloth => Self::cloth(),
            ToolId::Mask => Self::mask(),
            ToolId::Paint => Self::paint(),
            ToolId::DrawFaceSets => Self::draw_face_sets(),
        }
    }

    pub fn draw() -> Self {
        Self::preset("Draw", ToolId::Draw)
    }

    pub fn draw_sharp() -> Self {
        Self {
            falloff: FalloffCurve::Sharp,
            ..Self::preset("Draw Sharp", ToolId::DrawSharp)
        }
    }

    pub fn clay() -> Self {
        Self {
            sculpt_plane: SculptPlane::Area,
            ..Self::preset("Clay", ToolId::Clay)
        }
    }

    pub fn clay_strips() -> Self {
        Self {
            tip_roundness: 0.18,
            alpha: 0.6,
            normal_radius_factor: 1.55,
            plane_trim: Some(0.5),
            ..Self::preset("Clay Strips", ToolId::ClayStrips)
        }
    }

    pub fn layer() -> Self {
        Self {
            height: 0.05,
            ..Self::preset("Layer", ToolId::Layer)
        }
    }

    pub fn inflate() -> Self {
        Self {
            alpha: 0.3,
            ..Self::preset("Inflate", ToolId::Inflate)
        }
    }

    pub fn blob() -> Self {
        Self::preset("Blob", ToolId::Blob)
    }

    pub fn crease() -> Self {
        Self {
            falloff: FalloffCurve::Sharp,
            ..Self::preset("Crease", ToolId::Crease)
        }
    }

    pub fn smooth() -> Self {
        Self {
            alpha: 0.3,
            ..Self::preset("Smooth", ToolId::Smooth)
        }
    }

    pub fn flatten() -> Self {
        Self {
            alpha: 0.4,
            ..Self::preset("Flatten", ToolId::Flatten)
        }
    }

    pub fn fill() -> Self {
        Self {
            alpha: 0.4,
            area_radius_factor: 1.0,
            ..Self::preset("Fill", ToolId::Fill)
        }
    }

    pub fn scrape() -> Self {
        Self {
            alpha: 0.4,
            area_radius_factor: 1.0,
            ..Self::preset("Scrape", ToolId::Scrape)
        }
    }

    pub fn pinch() -> Self {
        Self {
            alpha: 0.4,
            falloff: FalloffCurve::Sharp,
            ..Self::preset("Pinch", ToolId::Pinch)
        }
    }

    pub fn grab() -> Self {
        Self {
            alpha: 1.0,
            pressure_strength: false,
            ..Self::preset("Grab", ToolId::Grab)
        }
    }

    pub fn snake_hook() -> Self {
        Self {
            alpha: 1.0,
            pressure_strength: false,
            ..Self::preset("Snake Hook", ToolId::SnakeHook)
        }
    }

    pub fn thumb() -> Self {
        Self::preset("Thumb", ToolId::Thumb)
    }

    pub fn nudge() -> Self {
        Self::preset("Nudge", ToolId::Nudge)
    }

    pub fn rotate() -> Self {
        Self {
            alpha: 1.0,
            ..Self::preset("Rotate", ToolId::Rotate)
        }
    }

    pub fn elastic_deform() -> Self {
        Self {
            alpha: 1.0,
            pressure_strength: false,
            ..Self::preset("Elastic Deform", ToolId::ElasticDeform)
        }
    }

    pub fn pose() -> Self {
        Self {
            alpha: 1.0,
            ..Self::preset("Pose", ToolId::Pose)
        }
    }

    pub fn boundary() -> Self {
        Self {
            alpha: 1.0,
            ..Self::preset("Boundary", ToolId::Boundary)
        }
    }

    pub fn cloth() -> Self {
        Self::preset("Cloth", ToolId::Cloth)
    }

    pub fn mask() -> Self {
        Self {
            alpha: 1.0,
            ..Self::preset("Mask", ToolId::Mask)
        }
    }

    pub fn paint() -> Self {
        Self {
            alpha: 1.0,
            ..Self::preset("Paint", ToolId::Paint)
        }
    }

    pub fn draw_face_sets() -> Self {
        Self {
            alpha: 1.0,
            ..Self::preset("Draw Face Sets", ToolId::DrawFaceSets)
        }
    }

    /// Whether the square-tip brush test applies
    pub fn uses_cube_tip(&self) -> bool {
        self.tip_roundness != 1.0 || self.tip_scale_x != 1.0
    }

    /// Get effective radius based on pressure.
    pub fn effective_radius(&self, pressure: f32) -> f32 {
        if self.pressure_radius {
            self.radius * (0.5 + 0.5 * pressure)
        } else {
            self.radius
        }
    }

    /// Pressure term of the strength formulas
    pub fn strength_pressure(&self, pressure: f32) -> f32 {
        if self.pressure_strength { pressure } else { 1.0 }
    }

    /// Reject values the strength and test math cannot handle
    pub fn validate(&self) -> Result<()> {
        let invalid = |field, reason: String| Err(SculptError::InvalidBrush { field, reason });
        if self.radius <= 0.0 {
            return invalid("radius", format!("{} must be positive", self.radius));
        }
        if !(0.0..=1.0).contains(&self.hardness) {
            return invalid("hardness", format!("{} is outside 0..=1", self.hardness));
        }
        if !(0.0..=1.0).contains(&self.tip_roundness) {
            return invalid("tip_roundness", format!("{} is outside 0..=1", self.tip_roundness));
        }
        if self.tip_scale_x <= 0.0 {
            return invalid("tip_scale_x", format!("{} must be positive", self.tip_scale_x));
        }
        if self.normal_radius_factor <= 0.0 || self.area_radius_factor <= 0.0 {
            return invalid("area_radius_factor", "radius factors must be positive".to_string());
        }
        if !(0.0..0.99).contains(&self.elastic_volume_preservation) {
            return invalid(
                "elastic_volume_preservation",
                format!("{} is outside 0..0.99", self.elastic_volume_preservation),
            );
        }
        Ok(())
    }
}
