//! Error types.
//!
//! Fatal precondition violations surface as [`EngineError`]. GPU backends
//! report [`GpuError`]; texture loads reject with [`TextureError`], which is
//! `Clone` so one failed load can be handed to every coalesced waiter.

use thiserror::Error;

use crate::render::ProgramId;
use crate::scene::NodeId;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum EngineError {
    // ------------------------------------------------------------------------
    // Scene graph
    // ------------------------------------------------------------------------
    #[error("node {0} does not exist in this scene")]
    NodeNotFound(NodeId),

    #[error("node id {0} is already registered")]
    DuplicateNode(NodeId),

    /// Self-parenting, or a parent that is already a descendant.
    #[error("node {parent} cannot become the parent of {child}")]
    InvalidParent { child: NodeId, parent: NodeId },

    #[error("node {0} is not a camera")]
    NotACamera(NodeId),

    // ------------------------------------------------------------------------
    // Camera & math
    // ------------------------------------------------------------------------
    #[error("projection-view matrix is not invertible")]
    SingularMatrix,

    #[error("camera distance must be positive and finite, got {0}")]
    InvalidCameraDistance(f32),

    // ------------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------------
    #[error("no draw command registered for program {0}")]
    MissingDrawCommand(ProgramId),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------
    #[error("scene serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpuError {
    #[error("shader program failed to compile: {0}")]
    Compile(String),

    #[error("unknown gpu program handle {0}")]
    UnknownProgram(u32),

    #[error("unknown gpu texture handle {0}")]
    UnknownTexture(u32),

    #[error("texture data is {actual} bytes, expected {expected} for {width}x{height} RGBA8")]
    InvalidTextureData {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextureError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("failed to upload {url}: {source}")]
    Upload {
        url: String,
        #[source]
        source: GpuError,
    },
}
