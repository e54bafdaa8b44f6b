use std::collections::HashMap;

use crate::driver::{
    BufferHandle, CompilePoll, DrawCall, GpuDriver, PendingProgram, ProgramHandle, ProgramSubmit,
    TextureHandle, VaoHandle,
};
use crate::error::ShaderError;
use crate::layout::VertexBufferLayout;
use crate::shader::UniformValue;

/// A driver that records every operation instead of talking to a GPU.
///
/// Handles are sequential, uploads and draws are kept verbatim, and
/// compilation can be scripted to stay pending for a number of polls or
/// to fail when a source contains a marker string. No rasterization
/// happens anywhere.
#[derive(Default)]
pub struct HeadlessDriver {
    max_texture_units: u32,
    compile_latency: u32,
    fail_marker: Option<String>,
    next_handle: u32,
    pending: HashMap<u32, PendingCompile>,
    programs: Vec<CompiledProgram>,
    buffers: HashMap<u32, BufferRecord>,
    vaos: Vec<VaoRecord>,
    vertex_uploads: Vec<(BufferHandle, usize)>,
    index_updates: Vec<(BufferHandle, Vec<u16>)>,
    uniforms: Vec<(ProgramHandle, String, UniformValue)>,
    draws: Vec<DrawRecord>,
}

#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub handle: ProgramHandle,
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
}

#[derive(Debug, Clone)]
struct PendingCompile {
    name: String,
    vertex_source: String,
    fragment_source: String,
    polls_remaining: u32,
}

#[derive(Debug, Clone)]
enum BufferRecord {
    Index { dynamic: bool, indices: Vec<u16> },
    Vertex { byte_capacity: usize },
}

/// One recorded VAO creation.
#[derive(Debug, Clone)]
pub struct VaoRecord {
    pub program: ProgramHandle,
    pub index_buffer: Option<BufferHandle>,
    pub layouts: Vec<VertexBufferLayout>,
}

/// One recorded draw call, textures copied out of the borrowed slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    pub program: ProgramHandle,
    pub vao: VaoHandle,
    pub textures: Vec<TextureHandle>,
    pub index_count: u32,
    pub first_index_byte: u32,
}

impl HeadlessDriver {
    pub fn new(max_texture_units: u32) -> Self {
        Self {
            max_texture_units,
            ..Self::default()
        }
    }

    /// Make every subsequent compile resolve only after `polls` calls
    /// to `poll_program`.
    pub fn with_compile_latency(mut self, polls: u32) -> Self {
        self.compile_latency = polls;
        self
    }

    /// Make compiles whose source contains `marker` fail.
    pub fn fail_when_source_contains(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn compiled_programs(&self) -> &[CompiledProgram] {
        &self.programs
    }

    pub fn compile_count(&self) -> usize {
        self.programs.len()
    }

    pub fn vertex_uploads(&self) -> &[(BufferHandle, usize)] {
        &self.vertex_uploads
    }

    pub fn index_updates(&self) -> &[(BufferHandle, Vec<u16>)] {
        &self.index_updates
    }

    pub fn uniform_events(&self) -> &[(ProgramHandle, String, UniformValue)] {
        &self.uniforms
    }

    /// The uniform events pushed to one specific program.
    pub fn uniforms_for(&self, program: ProgramHandle) -> Vec<(&str, &UniformValue)> {
        self.uniforms
            .iter()
            .filter(|(p, _, _)| *p == program)
            .map(|(_, name, value)| (name.as_str(), value))
            .collect()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn vaos(&self) -> &[VaoRecord] {
        &self.vaos
    }

    pub fn index_buffer_contents(&self, buffer: BufferHandle) -> Option<&[u16]> {
        match self.buffers.get(&buffer.0) {
            Some(BufferRecord::Index { indices, .. }) => Some(indices),
            _ => None,
        }
    }

    pub fn index_buffer_is_dynamic(&self, buffer: BufferHandle) -> Option<bool> {
        match self.buffers.get(&buffer.0) {
            Some(BufferRecord::Index { dynamic, .. }) => Some(*dynamic),
            _ => None,
        }
    }

    pub fn clear_records(&mut self) {
        self.vertex_uploads.clear();
        self.index_updates.clear();
        self.uniforms.clear();
        self.draws.clear();
    }

    fn next(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn source_rejected(&self, vertex_source: &str, fragment_source: &str) -> bool {
        match &self.fail_marker {
            Some(marker) => vertex_source.contains(marker) || fragment_source.contains(marker),
            None => false,
        }
    }

    fn finish_compile(
        &mut self,
        name: String,
        vertex_source: String,
        fragment_source: String,
    ) -> ProgramHandle {
        let handle = ProgramHandle(self.next());
        self.programs.push(CompiledProgram {
            handle,
            name,
            vertex_source,
            fragment_source,
        });
        handle
    }
}

impl GpuDriver for HeadlessDriver {
    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn submit_program(
        &mut self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramSubmit, ShaderError> {
        if self.compile_latency > 0 {
            let token = self.next();
            self.pending.insert(
                token,
                PendingCompile {
                    name: name.to_string(),
                    vertex_source: vertex_source.to_string(),
                    fragment_source: fragment_source.to_string(),
                    polls_remaining: self.compile_latency,
                },
            );
            return Ok(ProgramSubmit::Pending(PendingProgram(token)));
        }

        if self.source_rejected(vertex_source, fragment_source) {
            return Err(ShaderError::Compile {
                shader: name.to_string(),
                log: "source rejected by headless driver".to_string(),
            });
        }

        Ok(ProgramSubmit::Ready(self.finish_compile(
            name.to_string(),
            vertex_source.to_string(),
            fragment_source.to_string(),
        )))
    }

    fn poll_program(&mut self, pending: PendingProgram) -> CompilePoll {
        let Some(compile) = self.pending.get_mut(&pending.0) else {
            return CompilePoll::Failed(ShaderError::Compile {
                shader: String::new(),
                log: "unknown pending program token".to_string(),
            });
        };

        if compile.polls_remaining > 1 {
            compile.polls_remaining -= 1;
            return CompilePoll::Pending;
        }

        let compile = self.pending.remove(&pending.0).expect("checked above");
        if self.source_rejected(&compile.vertex_source, &compile.fragment_source) {
            return CompilePoll::Failed(ShaderError::Compile {
                shader: compile.name,
                log: "source rejected by headless driver".to_string(),
            });
        }
        CompilePoll::Ready(self.finish_compile(
            compile.name,
            compile.vertex_source,
            compile.fragment_source,
        ))
    }

    fn create_index_buffer(&mut self, indices: &[u16], dynamic: bool) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.buffers.insert(
            handle.0,
            BufferRecord::Index {
                dynamic,
                indices: indices.to_vec(),
            },
        );
        handle
    }

    fn update_index_buffer(&mut self, buffer: BufferHandle, indices: &[u16]) {
        if let Some(BufferRecord::Index {
            indices: stored, ..
        }) = self.buffers.get_mut(&buffer.0)
        {
            *stored = indices.to_vec();
        }
        self.index_updates.push((buffer, indices.to_vec()));
    }

    fn create_vertex_buffer(&mut self, byte_capacity: usize) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.buffers
            .insert(handle.0, BufferRecord::Vertex { byte_capacity });
        handle
    }

    fn upload_vertex_range(&mut self, buffer: BufferHandle, bytes: &[u8]) {
        if let Some(BufferRecord::Vertex { byte_capacity }) = self.buffers.get(&buffer.0) {
            debug_assert!(
                bytes.len() <= *byte_capacity,
                "upload of {} bytes exceeds buffer capacity {}",
                bytes.len(),
                byte_capacity
            );
        }
        self.vertex_uploads.push((buffer, bytes.len()));
    }

    fn create_vao(
        &mut self,
        program: ProgramHandle,
        index_buffer: Option<BufferHandle>,
        layouts: &[VertexBufferLayout],
    ) -> VaoHandle {
        let handle = VaoHandle(self.next());
        self.vaos.push(VaoRecord {
            program,
            index_buffer,
            layouts: layouts.to_vec(),
        });
        handle
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue) {
        self.uniforms
            .push((program, name.to_string(), value.clone()));
    }

    fn draw(&mut self, call: DrawCall<'_>) {
        self.draws.push(DrawRecord {
            program: call.program,
            vao: call.vao,
            textures: call.textures.to_vec(),
            index_count: call.index_count,
            first_index_byte: call.first_index_byte,
        });
    }
}
