//! GPU batch-rendering and shader-composition core.
//!
//! Two subsystems cooperate here. The shader side assembles program
//! variants on demand from a base source plus an ordered list of
//! [`ShaderAddition`]s and feature flags, caching every compiled
//! variant under a canonical key so toggling render options between
//! previously seen states never recompiles. The batching side
//! accumulates per-frame draw data (vertices, textures) into CPU
//! mirrored buffers and flushes them in as few draw calls as possible,
//! packing textures into sub-batch entries bounded by the per-draw
//! texture unit budget.
//!
//! All GPU work goes through the [`GpuDriver`] capability trait;
//! nothing in the crate touches a graphics API directly.

pub mod batch;
pub mod driver;
pub mod error;
pub mod layout;
pub mod shader;

pub use batch::{
    BatchConfig, BatchCore, BatchEntry, Lighting, PointLight, PointLightBatcher, Quad,
    QuadBatcher, QuadOptions, SelfShadow, StripBatcher, StripVertex, TileQuad, TileSpriteBatcher,
    TileSpriteOptions, TriangleBatcher, INDEX_SPACE,
};
pub use driver::{
    BufferHandle, CompilePoll, DrawCall, DrawContext, DrawRecord, GpuDriver, HeadlessDriver,
    PendingProgram, ProgramHandle, ProgramSubmit, TextureHandle, VaoHandle,
};
pub use error::{BatchError, ConfigError, ShaderError};
pub use layout::{AttributeType, BufferUsage, VertexAttribute, VertexBufferLayout};
pub use shader::{
    InjectionPoint, ProgramConfig, ProgramManager, ProgramSuite, ShaderAddition, ShaderBase,
    UniformValue,
};
