use crate::batch::config::BatchConfig;
use crate::batch::core::BatchCore;
use crate::batch::quad::{generate_quad_indices, set_round_pixels, set_viewport_uniforms};
use crate::driver::{DrawContext, GpuDriver};
use crate::error::BatchError;
use crate::layout::{VertexAttribute, VertexBufferLayout};
use crate::shader::{POINTLIGHT_FRAGMENT_SOURCE, POINTLIGHT_VERTEX_SOURCE};

/// One point light: a fixed-format quad instance covering the light's
/// extent, with the light geometry carried per vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub center: [f32; 2],
    pub radius: f32,
    /// Attenuation shaping factor; larger values harden the edge.
    pub falloff: f32,
    pub intensity: f32,
    /// Packed 0xAABBGGRR.
    pub color: u32,
}

/// Batches point-light quads. No textures are involved, so sub-batch
/// entries only split when the instance capacity is reached.
pub struct PointLightBatcher {
    core: BatchCore,
}

impl PointLightBatcher {
    pub fn new(
        driver: &mut dyn GpuDriver,
        overrides: Option<&BatchConfig>,
    ) -> Result<Self, BatchError> {
        let merged = BatchConfig::merged(&Self::default_config(), overrides)?;
        let mut core = BatchCore::new(driver, &merged, generate_quad_indices)?;
        core.programs.set_uniform("uCamera", [0.0, 0.0, 0.0, 1.0]);
        Ok(Self { core })
    }

    pub fn default_config() -> BatchConfig {
        BatchConfig {
            name: "PointLightBatcher".to_string(),
            vertices_per_instance: 4,
            indices_per_instance: 6,
            vertex_source: POINTLIGHT_VERTEX_SOURCE.to_string(),
            fragment_source: POINTLIGHT_FRAGMENT_SOURCE.to_string(),
            vertex_layout: Some(VertexBufferLayout::new(vec![
                VertexAttribute::floats("inPosition", 2),
                VertexAttribute::floats("inLightPosition", 2),
                VertexAttribute::floats("inRadius", 1),
                VertexAttribute::floats("inFalloff", 1),
                VertexAttribute::floats("inIntensity", 1),
                VertexAttribute::normalized_u8("inColor", 4),
            ])),
            ..BatchConfig::default()
        }
    }

    pub fn core(&self) -> &BatchCore {
        &self.core
    }

    pub fn program_manager(&mut self) -> &mut crate::shader::ProgramManager {
        &mut self.core.programs
    }

    /// Camera state the fragment stage maps light positions with:
    /// scroll x, scroll y, rotation, zoom.
    pub fn set_camera(&mut self, camera: [f32; 4]) {
        self.core.programs.set_uniform("uCamera", camera);
    }

    pub fn batch(
        &mut self,
        ctx: &mut DrawContext<'_>,
        light: &PointLight,
    ) -> Result<(), BatchError> {
        let [x, y] = light.center;
        let r = light.radius;

        // Strip order: bottom-left, top-left, bottom-right, top-right.
        let corners = [
            [x - r, y + r],
            [x - r, y - r],
            [x + r, y + r],
            [x + r, y - r],
        ];

        for corner in corners {
            self.core.push_f32(corner[0]);
            self.core.push_f32(corner[1]);
            self.core.push_f32(x);
            self.core.push_f32(y);
            self.core.push_f32(light.radius);
            self.core.push_f32(light.falloff);
            self.core.push_f32(light.intensity);
            self.core.push_u32(light.color);
        }
        self.core.finish_instance();

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
}
