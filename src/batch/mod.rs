pub mod config;
pub mod core;
pub mod light;
pub mod quad;
pub mod strip;
pub mod tile;
pub mod tri;

pub use config::BatchConfig;
pub use core::{BatchCore, BatchEntry, INDEX_SPACE};
pub use light::{PointLight, PointLightBatcher};
pub use quad::{Lighting, Quad, QuadBatcher, QuadOptions, SelfShadow};
pub use strip::{StripBatcher, StripVertex};
pub use tile::{TileQuad, TileSpriteBatcher, TileSpriteOptions};
pub use tri::TriangleBatcher;
