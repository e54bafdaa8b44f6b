use crate::batch::config::BatchConfig;
use crate::batch::core::BatchCore;
use crate::batch::quad::{set_round_pixels, set_viewport_uniforms};
use crate::driver::{DrawContext, GpuDriver, TextureHandle};
use crate::error::BatchError;
use crate::layout::{VertexAttribute, VertexBufferLayout};
use crate::shader::{additions, QUAD_FRAGMENT_SOURCE, QUAD_VERTEX_SOURCE};

/// One vertex of a textured triangle strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    /// Packed 0xAABBGGRR.
    pub tint: u32,
}

/// Batches variable-length textured triangle strips (rope-like shapes).
///
/// Consecutive strips accumulated into one draw call are joined with
/// two degenerate vertices, which collapse to zero-area triangles and
/// are never visible. One vertex counts as one instance, so the 16-bit
/// index cap bounds the total vertex count per batch.
pub struct StripBatcher {
    core: BatchCore,
}

impl StripBatcher {
    pub fn new(
        driver: &mut dyn GpuDriver,
        overrides: Option<&BatchConfig>,
    ) -> Result<Self, BatchError> {
        let merged = BatchConfig::merged(&Self::default_config(), overrides)?;
        let core = BatchCore::new(driver, &merged, |instances| {
            (0..instances).map(|i| i as u16).collect()
        })?;
        Ok(Self { core })
    }

    pub fn default_config() -> BatchConfig {
        BatchConfig {
            name: "StripBatcher".to_string(),
            vertices_per_instance: 1,
            indices_per_instance: 1,
            vertex_source: QUAD_VERTEX_SOURCE.to_string(),
            fragment_source: QUAD_FRAGMENT_SOURCE.to_string(),
            vertex_layout: Some(VertexBufferLayout::new(vec![
                VertexAttribute::floats("inPosition", 2),
                VertexAttribute::floats("inTexCoord", 2),
                VertexAttribute::floats("inTintEffect", 1),
                VertexAttribute::normalized_u8("inTint", 4),
            ])),
            shader_additions: vec![
                additions::get_tex_coord_out(),
                additions::define_tex_count(1),
                additions::get_texture(),
                additions::apply_tint(),
            ],
            ..BatchConfig::default()
        }
    }

    pub fn core(&self) -> &BatchCore {
        &self.core
    }

    pub fn program_manager(&mut self) -> &mut crate::shader::ProgramManager {
        &mut self.core.programs
    }

    /// Append one strip.
    ///
    /// A strip larger than the whole batch can hold is rejected before
    /// any vertex is written, leaving accumulated state intact so the
    /// caller may split the submission. A strip that does not fit the
    /// remaining space flushes the batch first.
    pub fn batch(
        &mut self,
        ctx: &mut DrawContext<'_>,
        texture: TextureHandle,
        vertices: &[StripVertex],
        tint_fill: bool,
    ) -> Result<(), BatchError> {
        let capacity = self.core.instances_per_batch() as usize;
        if vertices.len() > capacity {
            return Err(BatchError::StripTooLong {
                vertices: vertices.len(),
                capacity,
            });
        }
        if vertices.is_empty() {
            return Ok(());
        }

        let mut link = !self.core.is_empty()
            && self.core.current_single_texture() == Some(texture);
        let needed = vertices.len() + if link { 2 } else { 0 };
        if self.core.instance_count() as usize + needed > capacity {
            self.run(ctx)?;
            link = false;
        }

        let tint_effect = if tint_fill { 1.0 } else { 0.0 };

        if link {
            // Repeat the previous strip's tail and this strip's head so
            // the triangles between them are degenerate.
            self.core.repeat_last_vertex();
            self.core.finish_instance();
            self.write_vertex(&vertices[0], tint_effect);
            self.core.finish_instance();
        }

        self.core.require_single(texture);
        for vertex in vertices {
            self.write_vertex(vertex, tint_effect);
            self.core.finish_instance();
        }

        if self.core.is_full() {
            self.run(ctx)?;
        }
        Ok(())
    }

    pub fn run(&mut self, ctx: &mut DrawContext<'_>) -> Result<(), BatchError> {
        if self.core.is_empty() {
            return Ok(());
        }
        set_round_pixels(&mut self.core, ctx);
        self.core.flush(ctx)
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        set_viewport_uniforms(&mut self.core, width, height);
    }

    fn write_vertex(&mut self, vertex: &StripVertex, tint_effect: f32) {
        self.core.push_f32(vertex.position[0]);
        self.core.push_f32(vertex.position[1]);
        self.core.push_f32(vertex.uv[0]);
        self.core.push_f32(vertex.uv[1]);
        self.core.push_f32(tint_effect);
        self.core.push_u32(vertex.tint);
    }
}
