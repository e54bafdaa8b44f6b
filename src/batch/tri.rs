use std::collections::HashMap;

use crate::batch::config::BatchConfig;
use crate::batch::core::BatchCore;
use crate::batch::quad::{set_round_pixels, set_viewport_uniforms, DEFAULT_MAX_LIGHTS};
use crate::driver::{DrawContext, GpuDriver};
use crate::error::BatchError;
use crate::layout::{VertexAttribute, VertexBufferLayout};
use crate::shader::{
    additions, InjectionPoint, ShaderAddition, FLAT_FRAGMENT_SOURCE, FLAT_VERTEX_SOURCE,
};

/// Diffuse lighting over flat geometry; every surface faces the camera.
fn apply_flat_lighting(disable: bool) -> ShaderAddition {
    ShaderAddition::new("ApplyFlatLighting")
        .with_tag("lighting")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::FragmentBody,
            "\
    vec3 normal = vec3(0.0, 0.0, 1.0);
    vec3 litColor = uAmbientLightColor * fragColor.rgb;
    for (int i = 0; i < LIGHT_COUNT; i++)
    {
        if (i >= uLightCount)
        {
            break;
        }
        Light light = uLights[i];
        vec3 lightDir = vec3((light.position.xy - gl_FragCoord.xy) / uCamera.w, light.position.z);
        float diffuseFactor = max(dot(normal, normalize(lightDir)), 0.0);
        float distToSurf = length(lightDir);
        float radius = light.radius / uCamera.w;
        float attenuation = clamp(1.0 - distToSurf * distToSurf / (radius * radius), 0.0, 1.0);
        litColor += light.color * diffuseFactor * attenuation * light.intensity * fragColor.rgb;
    }
    fragColor = vec4(litColor, fragColor.a);",
        )
}

/// Batches arbitrary indexed triangle soup with per-vertex color.
///
/// One instance is one triangle. Within a pass, submitted vertices are
/// de-duplicated through an index map so shared corners are stored
/// once; when either the triangle capacity or the 16-bit vertex space
/// would overflow, the accumulated pass is drawn and a new one begins.
/// The index buffer is dynamic and uploaded with each flush.
pub struct TriangleBatcher {
    core: BatchCore,
    vertex_count: u32,
    lit: bool,
}

impl TriangleBatcher {
    pub fn new(
        driver: &mut dyn GpuDriver,
        overrides: Option<&BatchConfig>,
    ) -> Result<Self, BatchError> {
        let merged = BatchConfig::merged(&Self::default_config(), overrides)?;
        let core = BatchCore::new(driver, &merged, |_| Vec::new())?;
        debug_assert!(
            core.instances_per_batch() >= 3,
            "a pass must hold at least one full triangle"
        );
        Ok(Self {
            core,
            vertex_count: 0,
            lit: false,
        })
    }

    pub fn default_config() -> BatchConfig {
        BatchConfig {
            name: "TriangleBatcher".to_string(),
            vertices_per_instance: 1,
            indices_per_instance: 3,
            vertex_source: FLAT_VERTEX_SOURCE.to_string(),
            fragment_source: FLAT_FRAGMENT_SOURCE.to_string(),
            index_buffer_dynamic: Some(true),
            vertex_layout: Some(VertexBufferLayout::new(vec![
                VertexAttribute::floats("inPosition", 2),
                VertexAttribute::normalized_u8("inTint", 4),
            ])),
            shader_additions: vec![
                additions::define_lights(DEFAULT_MAX_LIGHTS, true),
                apply_flat_lighting(true),
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

    /// Toggle per-pass lighting. Changing it mid-accumulation draws the
    /// pending pass first so one draw call never mixes variants.
    pub fn set_lighting(
        &mut self,
        ctx: &mut DrawContext<'_>,
        lit: bool,
    ) -> Result<(), BatchError> {
        if lit == self.lit {
            return Ok(());
        }
        self.run(ctx)?;
        for addition in self.core.programs.get_additions_by_tag_mut("lighting") {
            addition.disable = !lit;
        }
        self.lit = lit;
        Ok(())
    }

    /// Append indexed triangles. `indices` refers into `vertices` and
    /// `colors`; its length must be a multiple of three.
    pub fn batch(
        &mut self,
        ctx: &mut DrawContext<'_>,
        vertices: &[[f32; 2]],
        colors: &[u32],
        indices: &[u16],
    ) -> Result<(), BatchError> {
        debug_assert_eq!(indices.len() % 3, 0, "triangle list length");

        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(BatchError::IndexOutOfBounds {
                index: bad,
                vertices: vertices.len(),
            });
        }

        let capacity = self.core.instances_per_batch();

        // Caller index -> vertex slot in the current pass. Valid only
        // until the pass is drawn.
        let mut remap: HashMap<u16, u16> = HashMap::new();

        for triangle in indices.chunks_exact(3) {
            let fresh = fresh_vertex_count(&remap, triangle);
            if self.vertex_count + fresh > capacity || self.core.is_full() {
                self.run(ctx)?;
                remap.clear();
            }

            for &caller_index in triangle {
                let slot = match remap.get(&caller_index) {
                    Some(&slot) => slot,
                    None => {
                        let slot = self.vertex_count as u16;
                        let position = vertices[caller_index as usize];
                        let color = colors
                            .get(caller_index as usize)
                            .copied()
                            .unwrap_or(0xffffffff);
                        self.core.push_f32(position[0]);
                        self.core.push_f32(position[1]);
                        self.core.push_u32(color);
                        self.vertex_count += 1;
                        remap.insert(caller_index, slot);
                        slot
                    }
                };
                self.core.push_index(slot);
            }
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
        let result = self.core.flush(ctx);
        self.vertex_count = 0;
        result
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        set_viewport_uniforms(&mut self.core, width, height);
    }
}

fn fresh_vertex_count(remap: &HashMap<u16, u16>, triangle: &[u16]) -> u32 {
    let mut fresh = 0;
    for (i, &index) in triangle.iter().enumerate() {
        if remap.contains_key(&index) {
            continue;
        }
        if triangle[..i].contains(&index) {
            continue;
        }
        fresh += 1;
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_count_ignores_known_and_repeated_indices() {
        let mut remap = HashMap::new();
        remap.insert(0u16, 0u16);
        // 0 is known, 1 is new, the second 1 repeats within the triangle.
        assert_eq!(fresh_vertex_count(&remap, &[0, 1, 1]), 1);
        assert_eq!(fresh_vertex_count(&remap, &[2, 3, 4]), 3);
    }
}
