#![allow(dead_code)]

use batchwork::{HeadlessDriver, Quad, TextureHandle};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn driver(max_texture_units: u32) -> HeadlessDriver {
    init_logging();
    HeadlessDriver::new(max_texture_units)
}

pub fn quad() -> Quad {
    Quad::axis_aligned(0.0, 0.0, 32.0, 32.0)
}

pub fn texture(id: u64) -> TextureHandle {
    TextureHandle(id)
}
