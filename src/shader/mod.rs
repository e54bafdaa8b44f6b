pub mod addition;
pub mod additions;
pub mod config;
pub mod program;
pub mod template;
pub mod uniform;

pub use addition::{InjectionPoint, ShaderAddition};
pub use config::{ProgramConfig, ShaderBase};
pub use program::{ProgramManager, ProgramSuite};
pub use uniform::UniformValue;

/// Base vertex source shared by the quad-family handlers.
pub const QUAD_VERTEX_SOURCE: &str = include_str!("glsl/quad.vert");

/// Base fragment source shared by the quad-family handlers.
pub const QUAD_FRAGMENT_SOURCE: &str = include_str!("glsl/quad.frag");

/// Base sources for flat-shaded triangle rendering.
pub const FLAT_VERTEX_SOURCE: &str = include_str!("glsl/flat.vert");
pub const FLAT_FRAGMENT_SOURCE: &str = include_str!("glsl/flat.frag");

/// Base sources for point-light quads.
pub const POINTLIGHT_VERTEX_SOURCE: &str = include_str!("glsl/pointlight.vert");
pub const POINTLIGHT_FRAGMENT_SOURCE: &str = include_str!("glsl/pointlight.frag");
