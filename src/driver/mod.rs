//! The capability surface the batching core draws through.
//!
//! Everything GPU-specific sits behind [`GpuDriver`]: program
//! compilation (possibly parallel, resolved through a non-blocking
//! poll), buffer and VAO creation, partial vertex uploads, uniform
//! pushes and indexed draws. The core never touches a graphics API
//! directly, so the whole engine can run against the recording
//! [`HeadlessDriver`] in tests.

mod headless;

pub use headless::{CompiledProgram, DrawRecord, HeadlessDriver, VaoRecord};

use crate::error::ShaderError;
use crate::layout::VertexBufferLayout;
use crate::shader::UniformValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VaoHandle(pub u32);

/// Identity of a texture resource. The core only ever compares these;
/// two handles naming the same underlying image merely cost extra draw
/// calls, they can never render incorrectly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Token for a compile still in flight on the driver side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingProgram(pub u32);

/// Result of submitting shader sources for compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramSubmit {
    Ready(ProgramHandle),
    Pending(PendingProgram),
}

/// Result of polling an in-flight compile. Never blocks; a pending
/// compile always eventually resolves to `Ready` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilePoll {
    Ready(ProgramHandle),
    Pending,
    Failed(ShaderError),
}

/// One indexed draw over a contiguous run of a batch's index buffer.
#[derive(Debug)]
pub struct DrawCall<'a> {
    pub program: ProgramHandle,
    pub vao: VaoHandle,
    /// Textures bound to units `0..textures.len()` for this call.
    pub textures: &'a [TextureHandle],
    pub index_count: u32,
    pub first_index_byte: u32,
}

pub trait GpuDriver {
    /// The number of texture units one draw call may address.
    fn max_texture_units(&self) -> u32;

    /// Compile a program, or begin a parallel compile and hand back a
    /// token to poll. An immediate source rejection is an error.
    fn submit_program(
        &mut self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramSubmit, ShaderError>;

    /// Check on a parallel compile started by [`GpuDriver::submit_program`].
    fn poll_program(&mut self, pending: PendingProgram) -> CompilePoll;

    fn create_index_buffer(&mut self, indices: &[u16], dynamic: bool) -> BufferHandle;

    fn update_index_buffer(&mut self, buffer: BufferHandle, indices: &[u16]);

    fn create_vertex_buffer(&mut self, byte_capacity: usize) -> BufferHandle;

    /// Upload `bytes` to the start of `buffer`. Callers pass exactly the
    /// occupied range, never the full capacity.
    fn upload_vertex_range(&mut self, buffer: BufferHandle, bytes: &[u8]);

    fn create_vao(
        &mut self,
        program: ProgramHandle,
        index_buffer: Option<BufferHandle>,
        layouts: &[VertexBufferLayout],
    ) -> VaoHandle;

    /// Push one uniform value. Names absent from the program's uniform
    /// table are silently ignored; deliberate mismatches between shader
    /// variants rely on this.
    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue);

    fn draw(&mut self, call: DrawCall<'_>);
}

/// Per-flush drawing state threaded into `batch` and `run` calls.
pub struct DrawContext<'a> {
    pub driver: &'a mut dyn GpuDriver,
    /// Snap vertex positions to whole pixels in the vertex stage.
    pub round_pixels: bool,
}

impl<'a> DrawContext<'a> {
    pub fn new(driver: &'a mut dyn GpuDriver) -> Self {
        Self {
            driver,
            round_pixels: false,
        }
    }

    pub fn with_round_pixels(mut self, round_pixels: bool) -> Self {
        self.round_pixels = round_pixels;
        self
    }
}
