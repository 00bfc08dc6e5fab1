//! Error type for the sculpt engine.
//!
//! Hot-path accessors never return errors; only construction, stroke
//! lifecycle misuse, settings loading and replay decoding do.

use relief_config::ConfigError;

/// Errors raised by fallible sculpt operations
#[derive(Debug, thiserror::Error)]
pub enum SculptError {
    #[error("Mesh has no faces")]
    NoFaces,
    #[error("Face {face} references vertex {vertex} but the mesh has {count} vertices")]
    VertexOutOfRange { face: usize, vertex: u32, count: usize },
    #[error("Face {0} has fewer than 3 corners")]
    DegenerateFace(usize),
    #[error("Invalid mesh topology: {0}")]
    InvalidTopology(String),
    #[error("Non-manifold edge between vertices {0} and {1}")]
    NonManifoldEdge(u32, u32),
    #[error("Grid size must be at least 2, got {0}")]
    InvalidGridSize(usize),
    #[error("Invalid brush {field}: {reason}")]
    InvalidBrush { field: &'static str, reason: String },
    #[error("No stroke is active")]
    NoActiveStroke,
    #[error("A stroke is already active")]
    StrokeAlreadyActive,
    #[error("Replay log of {len} bytes is not a multiple of the {record} byte record")]
    ReplayLength { len: usize, record: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SculptError>;
