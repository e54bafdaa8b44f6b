use glam::Mat4;

use crate::batch::config::BatchConfig;
use crate::batch::core::BatchCore;
use crate::driver::{DrawContext, GpuDriver, TextureHandle};
use crate::error::BatchError;
use crate::layout::{VertexAttribute, VertexBufferLayout};
use crate::shader::{additions, QUAD_FRAGMENT_SOURCE, QUAD_VERTEX_SOURCE};

pub(crate) const DEFAULT_MAX_LIGHTS: u32 = 8;

bitflags::bitflags! {
    /// Which shader-variant-affecting options the current program
    /// configuration reflects. A mismatch against the incoming batch
    /// call forces an early flush before the configuration changes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct OptionFlags: u32 {
        const MULTI_TEXTURE = 1 << 0;
        const LIGHTING = 1 << 1;
        const SELF_SHADOW = 1 << 2;
        const SMOOTH_PIXEL_ART = 1 << 3;
        const WRAP_FRAME = 1 << 4;
        const CLAMP_FRAME = 1 << 5;
    }
}

impl Default for OptionFlags {
    fn default() -> Self {
        OptionFlags::empty()
    }
}

/// Self-shadowing parameters for lit quads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelfShadow {
    pub penumbra: f32,
    /// Texel brightness treated as a flat, fully lit surface.
    pub diffuse_flat_threshold: f32,
}

/// Lighting options for one batched quad. Defining this activates the
/// lighting shader variant and dual-texture batching; multi-texturing
/// is disabled while lighting is on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub normal_map: TextureHandle,
    /// Rotation of the normal map, in radians.
    pub rotation: f32,
    pub self_shadow: Option<SelfShadow>,
}

/// Per-call render options for the quad family.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuadOptions {
    pub multi_texturing: bool,
    pub smooth_pixel_art: bool,
    pub lighting: Option<Lighting>,
}

/// One quad instance: four corner positions, a frame rectangle in
/// texture space, and per-corner tints packed as 0xAABBGGRR.
#[derive(Debug, Clone, Copy)]
pub struct Quad {
    pub top_left: [f32; 2],
    pub bottom_left: [f32; 2],
    pub top_right: [f32; 2],
    pub bottom_right: [f32; 2],
    /// u, v, width, height of the texture frame (0-1).
    pub frame: [f32; 4],
    /// Blend towards a solid fill of the tint instead of multiplying.
    pub tint_fill: bool,
    pub tint_top_left: u32,
    pub tint_bottom_left: u32,
    pub tint_top_right: u32,
    pub tint_bottom_right: u32,
}

impl Quad {
    pub fn axis_aligned(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            top_left: [x, y],
            bottom_left: [x, y + height],
            top_right: [x + width, y],
            bottom_right: [x + width, y + height],
            frame: [0.0, 0.0, 1.0, 1.0],
            tint_fill: false,
            tint_top_left: 0xffffffff,
            tint_bottom_left: 0xffffffff,
            tint_top_right: 0xffffffff,
            tint_bottom_right: 0xffffffff,
        }
    }

    pub fn with_frame(mut self, frame: [f32; 4]) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_tint(mut self, tint: u32) -> Self {
        self.tint_top_left = tint;
        self.tint_bottom_left = tint;
        self.tint_top_right = tint;
        self.tint_bottom_right = tint;
        self
    }
}

/// Element indices for quads drawn as a triangle strip: each quad's
/// first and last vertices repeat, forming degenerate triangles that
/// stitch consecutive quads together without being drawn.
pub(crate) fn generate_quad_indices(instances: u32) -> Vec<u16> {
    let mut indices = Vec::with_capacity(instances as usize * 6);
    for i in 0..instances {
        let base = (i * 4) as u16;
        indices.extend_from_slice(&[base, base, base + 1, base + 2, base + 3, base + 3]);
    }
    indices
}

pub(crate) fn texture_unit_indices(count: u32) -> Vec<i32> {
    (0..count as i32).collect()
}

/// The option state machine shared by the quad-family handlers. Tracks
/// what the program configuration currently reflects and edits it when
/// a batch call arrives with different options.
#[derive(Debug, Default)]
pub(crate) struct QuadShaderState {
    applied: OptionFlags,
    applied_rotation: f32,
    applied_shadow: Option<SelfShadow>,
}

impl QuadShaderState {
    pub(crate) fn applied(&self) -> OptionFlags {
        self.applied
    }

    pub(crate) fn needs_reconfig(&self, flags: OptionFlags, options: &QuadOptions) -> bool {
        if flags != self.applied {
            return true;
        }
        match &options.lighting {
            Some(lighting) => {
                lighting.rotation != self.applied_rotation
                    || lighting.self_shadow != self.applied_shadow
            }
            None => false,
        }
    }

    /// Rewrite the shader configuration for `flags`. The caller has
    /// already flushed, so no accumulated instance sees the edit.
    pub(crate) fn apply(&mut self, core: &mut BatchCore, flags: OptionFlags, options: &QuadOptions) {
        let changed = flags ^ self.applied;
        let programs = &mut core.programs;

        if changed.contains(OptionFlags::LIGHTING) {
            let lit = flags.contains(OptionFlags::LIGHTING);
            for addition in programs.get_additions_by_tag_mut("lighting") {
                addition.disable = !lit;
            }
            if lit {
                programs.set_uniform("uNormSampler", 1i32);
            }
        }

        if changed.contains(OptionFlags::SMOOTH_PIXEL_ART) {
            if let Some(addition) = programs.get_addition_mut("SmoothPixelArt") {
                addition.disable = !flags.contains(OptionFlags::SMOOTH_PIXEL_ART);
            }
        }

        if changed.contains(OptionFlags::WRAP_FRAME) {
            if let Some(addition) = programs.get_addition_mut("TexCoordFrameWrap") {
                addition.disable = !flags.contains(OptionFlags::WRAP_FRAME);
            }
        }

        if changed.contains(OptionFlags::CLAMP_FRAME) {
            if let Some(addition) = programs.get_addition_mut("TexCoordFrameClamp") {
                addition.disable = !flags.contains(OptionFlags::CLAMP_FRAME);
            }
        }

        // Texture resolution data is required by smoothing and clamping.
        let needs_tex_res =
            flags.intersects(OptionFlags::SMOOTH_PIXEL_ART | OptionFlags::CLAMP_FRAME);
        if let Some(addition) = programs.get_addition_mut("GetTexRes") {
            addition.disable = !needs_tex_res;
        }

        if changed.contains(OptionFlags::SELF_SHADOW) {
            if flags.contains(OptionFlags::SELF_SHADOW) {
                programs.add_feature("SELF_SHADOW");
            } else {
                programs.remove_feature("SELF_SHADOW");
            }
        }

        if changed.contains(OptionFlags::MULTI_TEXTURE) {
            let units = if flags.contains(OptionFlags::MULTI_TEXTURE) {
                core.max_textures_per_batch()
            } else {
                1
            };
            core.programs
                .replace_addition("DefineTexCount", additions::define_tex_count(units));
        }

        self.applied_rotation = 0.0;
        self.applied_shadow = None;
        if let Some(lighting) = &options.lighting {
            core.programs
                .set_uniform("uNormalMapRotation", lighting.rotation);
            self.applied_rotation = lighting.rotation;
            if let Some(shadow) = lighting.self_shadow {
                core.programs.set_uniform("uPenumbra", shadow.penumbra);
                core.programs
                    .set_uniform("uDiffuseFlatThreshold", shadow.diffuse_flat_threshold);
                self.applied_shadow = Some(shadow);
            }
        }

        self.applied = flags;
    }
}

pub(crate) fn quad_option_flags(options: &QuadOptions) -> OptionFlags {
    let mut flags = OptionFlags::empty();
    if let Some(lighting) = &options.lighting {
        // Lighting pairs the diffuse and normal map in fixed units, so
        // multi-texturing is suspended while it is active.
        flags |= OptionFlags::LIGHTING;
        if lighting.self_shadow.is_some() {
            flags |= OptionFlags::SELF_SHADOW;
        }
    } else if options.multi_texturing {
        flags |= OptionFlags::MULTI_TEXTURE;
    }
    if options.smooth_pixel_art {
        flags |= OptionFlags::SMOOTH_PIXEL_ART;
    }
    flags
}

/// Batches textured, tinted quads, four vertices and six strip indices
/// per instance.
pub struct QuadBatcher {
    core: BatchCore,
    state: QuadShaderState,
}

impl QuadBatcher {
    pub fn new(
        driver: &mut dyn GpuDriver,
        overrides: Option<&BatchConfig>,
    ) -> Result<Self, BatchError> {
        let merged = BatchConfig::merged(&Self::default_config(), overrides)?;
        let core = build_quad_core(driver, &merged)?;
        Ok(Self {
            core,
            state: QuadShaderState::default(),
        })
    }

    pub fn default_config() -> BatchConfig {
        BatchConfig {
            name: "QuadBatcher".to_string(),
            vertices_per_instance: 4,
            indices_per_instance: 6,
            vertex_source: QUAD_VERTEX_SOURCE.to_string(),
            fragment_source: QUAD_FRAGMENT_SOURCE.to_string(),
            vertex_layout: Some(VertexBufferLayout::new(vec![
                VertexAttribute::floats("inPosition", 2),
                VertexAttribute::floats("inTexCoord", 2),
                VertexAttribute::floats("inTexId", 1),
                VertexAttribute::floats("inTintEffect", 1),
                VertexAttribute::normalized_u8("inTint", 4),
            ])),
            shader_additions: vec![
                additions::get_tex_coord_out(),
                additions::get_tex_res(true),
                additions::smooth_pixel_art(true),
                additions::define_tex_count(1),
                additions::get_texture(),
                additions::apply_tint(),
                additions::define_lights(DEFAULT_MAX_LIGHTS, true),
                additions::out_inverse_rotation(true),
                additions::get_normal_from_map(true),
                additions::apply_lighting(true),
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

    /// Append one quad. After the vertex data is fully written, a batch
    /// that reached capacity is flushed before the call returns.
    pub fn batch(
        &mut self,
        ctx: &mut DrawContext<'_>,
        texture: TextureHandle,
        quad: &Quad,
        options: &QuadOptions,
    ) -> Result<(), BatchError> {
        let flags = quad_option_flags(options);
        if self.state.needs_reconfig(flags, options) {
            self.run(ctx)?;
            self.state.apply(&mut self.core, flags, options);
        }

        let tex_id = match &options.lighting {
            Some(lighting) => {
                self.core.require_pair(texture, lighting.normal_map);
                0.0
            }
            None if options.multi_texturing => self.core.assign_unit(texture) as f32,
            None => {
                self.core.require_single(texture);
                0.0
            }
        };

        write_quad_vertices(&mut self.core, quad, tex_id);
        self.core.finish_instance();

        if self.core.is_full() {
            self.run(ctx)?;
        }
        Ok(())
    }

    /// Draw then empty the current batch. No-op when empty.
    pub fn run(&mut self, ctx: &mut DrawContext<'_>) -> Result<(), BatchError> {
        if self.core.is_empty() {
            return Ok(());
        }
        set_round_pixels(&mut self.core, ctx);
        self.core.flush(ctx)
    }

    /// React to a change in the per-draw-call texture unit budget.
    /// Shrinking below the units already committed to the in-progress
    /// entry flushes first, so no claimed texture is dropped.
    pub fn update_texture_count(
        &mut self,
        ctx: &mut DrawContext<'_>,
        count: Option<u32>,
    ) -> Result<(), BatchError> {
        let multi = self.state.applied().contains(OptionFlags::MULTI_TEXTURE);
        update_texture_budget(&mut self.core, ctx, count, multi)?;
        Ok(())
    }

    /// Refresh viewport-dependent uniforms.
    pub fn resize(&mut self, width: f32, height: f32) {
        set_viewport_uniforms(&mut self.core, width, height);
    }
}

pub(crate) fn build_quad_core(
    driver: &mut dyn GpuDriver,
    merged: &BatchConfig,
) -> Result<BatchCore, BatchError> {
    let mut core = BatchCore::new(driver, merged, generate_quad_indices)?;
    if let Some(max_lights) = merged.max_lights {
        let disabled = core
            .programs
            .get_addition("DefineLights")
            .map(|a| a.disable)
            .unwrap_or(true);
        core.programs.replace_addition(
            "DefineLights",
            additions::define_lights(max_lights, disabled),
        );
    }
    // The sampler array addresses texture units, not textures, so it is
    // seeded once and survives every program swap through the pool.
    let units = core.max_textures_per_batch();
    core.programs
        .set_uniform("uMainSampler[0]", texture_unit_indices(units));
    Ok(core)
}

pub(crate) fn set_round_pixels(core: &mut BatchCore, ctx: &DrawContext<'_>) {
    core.programs.set_uniform(
        "uRoundPixels",
        if ctx.round_pixels { 1.0f32 } else { 0.0f32 },
    );
}

pub(crate) fn set_viewport_uniforms(core: &mut BatchCore, width: f32, height: f32) {
    core.programs.set_uniform("uResolution", [width, height]);
    core.programs.set_uniform(
        "uProjectionMatrix",
        Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0),
    );
}

/// Clamp and apply a new texture unit budget. Returns the new count if
/// it changed. `multi_texture_active` decides whether the sampler
/// addition must be regenerated immediately.
pub(crate) fn update_texture_budget(
    core: &mut BatchCore,
    ctx: &mut DrawContext<'_>,
    count: Option<u32>,
    multi_texture_active: bool,
) -> Result<Option<u32>, BatchError> {
    let hardware = ctx.driver.max_texture_units().max(1);
    let new_count = count.unwrap_or(hardware).clamp(1, hardware);
    if new_count == core.max_textures_per_batch() {
        return Ok(None);
    }

    if new_count < core.current_entry_units() && !core.is_empty() {
        set_round_pixels(core, ctx);
        core.flush(ctx)?;
    }

    log::info!(
        "batch handler `{}`: texture units {} -> {}",
        core.name(),
        core.max_textures_per_batch(),
        new_count
    );
    core.set_max_textures(new_count);

    if multi_texture_active {
        core.programs
            .replace_addition("DefineTexCount", additions::define_tex_count(new_count));
    }
    core.programs
        .set_uniform("uMainSampler[0]", texture_unit_indices(new_count));

    Ok(Some(new_count))
}

/// Write the four vertices of one quad in strip order: bottom-left,
/// top-left, bottom-right, top-right.
pub(crate) fn write_quad_vertices(core: &mut BatchCore, quad: &Quad, tex_id: f32) {
    let [u, v, w, h] = quad.frame;
    let tint_effect = if quad.tint_fill { 1.0 } else { 0.0 };

    let corners = [
        (quad.bottom_left, [u, v + h], quad.tint_bottom_left),
        (quad.top_left, [u, v], quad.tint_top_left),
        (quad.bottom_right, [u + w, v + h], quad.tint_bottom_right),
        (quad.top_right, [u + w, v], quad.tint_top_right),
    ];

    for (position, uv, tint) in corners {
        core.push_f32(position[0]);
        core.push_f32(position[1]);
        core.push_f32(uv[0]);
        core.push_f32(uv[1]);
        core.push_f32(tex_id);
        core.push_f32(tint_effect);
        core.push_u32(tint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_indices_form_degenerate_strips() {
        let indices = generate_quad_indices(2);
        assert_eq!(indices, vec![0, 0, 1, 2, 3, 3, 4, 4, 5, 6, 7, 7]);
    }

    #[test]
    fn lighting_suspends_multi_texturing() {
        let options = QuadOptions {
            multi_texturing: true,
            smooth_pixel_art: false,
            lighting: Some(Lighting {
                normal_map: TextureHandle(9),
                rotation: 0.0,
                self_shadow: None,
            }),
        };
        let flags = quad_option_flags(&options);
        assert!(flags.contains(OptionFlags::LIGHTING));
        assert!(!flags.contains(OptionFlags::MULTI_TEXTURE));
    }

    #[test]
    fn unit_index_list_matches_budget() {
        assert_eq!(texture_unit_indices(4), vec![0, 1, 2, 3]);
    }
}
