use thiserror::Error;

/// Errors raised while validating a batch handler configuration.
/// These are fatal: a handler cannot be constructed from a bad config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("batch handler configuration is missing a name")]
    MissingName,

    #[error("batch handler `{handler}` has no vertex attributes in its layout")]
    EmptyLayout { handler: String },

    #[error("batch handler `{handler}` must define vertices and indices per instance")]
    MissingGeometry { handler: String },
}

/// Errors raised while synthesizing or compiling a shader variant.
/// A failure poisons the cache key that produced it; the same
/// configuration is never recompiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    #[error("shader `{shader}` failed to compile: {log}")]
    Compile { shader: String, log: String },

    #[error("addition `{addition}` targets slot `{slot}`, which is not present in shader `{shader}`")]
    MissingSlot {
        shader: String,
        addition: String,
        slot: &'static str,
    },

    #[error("shader `{shader}` contains unrecognized slot marker `{marker}`")]
    UnknownSlot { shader: String, marker: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// A single strip submission larger than one batch can ever hold.
    /// Raised before any vertex data is written, so accumulated state
    /// is left untouched and the caller may split the strip and retry.
    #[error("strip of {vertices} vertices exceeds the batch capacity of {capacity}")]
    StripTooLong { vertices: usize, capacity: usize },

    /// A triangle index referring past the end of the submitted vertex
    /// list. Raised before any buffer write.
    #[error("triangle index {index} is out of bounds for {vertices} submitted vertices")]
    IndexOutOfBounds { index: u16, vertices: usize },
}
