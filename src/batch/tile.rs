use crate::batch::config::BatchConfig;
use crate::batch::core::BatchCore;
use crate::batch::quad::{
    build_quad_core, quad_option_flags, set_round_pixels, set_viewport_uniforms,
    update_texture_budget, OptionFlags, QuadOptions, QuadShaderState, DEFAULT_MAX_LIGHTS,
};
use crate::driver::{DrawContext, GpuDriver, TextureHandle};
use crate::error::BatchError;
use crate::layout::{VertexAttribute, VertexBufferLayout};
use crate::shader::{additions, QUAD_FRAGMENT_SOURCE, QUAD_VERTEX_SOURCE};

/// Per-call render options for tile sprites: the quad options plus
/// frame wrapping and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TileSpriteOptions {
    pub quad: QuadOptions,
    /// Wrap the sampled coordinate inside the frame, for repeating
    /// tile sprites.
    pub wrap_frame: bool,
    /// Clamp sampling half a texel inside the frame, preventing bleed
    /// from linear filtering at tile edges.
    pub clamp_frame: bool,
}

/// One tile-sprite instance. Unlike a plain quad, each corner carries
/// its own (possibly distorted) sampling coordinate, and the frame
/// rectangle rides along per vertex so the fragment stage can wrap and
/// clamp against it.
#[derive(Debug, Clone, Copy)]
pub struct TileQuad {
    pub top_left: [f32; 2],
    pub bottom_left: [f32; 2],
    pub top_right: [f32; 2],
    pub bottom_right: [f32; 2],
    pub uv_top_left: [f32; 2],
    pub uv_bottom_left: [f32; 2],
    pub uv_top_right: [f32; 2],
    pub uv_bottom_right: [f32; 2],
    /// u, v, width, height of the texture frame (0-1).
    pub frame: [f32; 4],
    /// Handler-specific datum, e.g. a rotation code for tile normal
    /// mapping.
    pub texture_datum: f32,
    pub tint_fill: bool,
    pub tint_top_left: u32,
    pub tint_bottom_left: u32,
    pub tint_top_right: u32,
    pub tint_bottom_right: u32,
}

fn tile_option_flags(options: &TileSpriteOptions) -> OptionFlags {
    let mut flags = quad_option_flags(&options.quad);
    if options.wrap_frame {
        flags |= OptionFlags::WRAP_FRAME;
    }
    if options.clamp_frame {
        flags |= OptionFlags::CLAMP_FRAME;
    }
    flags
}

/// Batches tile sprites and tiles: the quad contract plus frame-aware
/// sampling so texture borders behave under wrapping and filtering.
pub struct TileSpriteBatcher {
    core: BatchCore,
    state: QuadShaderState,
}

impl TileSpriteBatcher {
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
            name: "TileSpriteBatcher".to_string(),
            vertices_per_instance: 4,
            indices_per_instance: 6,
            vertex_source: QUAD_VERTEX_SOURCE.to_string(),
            fragment_source: QUAD_FRAGMENT_SOURCE.to_string(),
            vertex_layout: Some(VertexBufferLayout::new(vec![
                VertexAttribute::floats("inPosition", 2),
                VertexAttribute::floats("inTexCoord", 2),
                VertexAttribute::floats("inFrame", 4),
                VertexAttribute::floats("inTexId", 1),
                VertexAttribute::floats("inTexDatum", 1),
                VertexAttribute::floats("inTintEffect", 1),
                VertexAttribute::normalized_u8("inTint", 4),
            ])),
            shader_additions: vec![
                additions::out_frame(),
                additions::get_tex_coord_out(),
                additions::get_tex_res(true),
                additions::tex_coord_frame_wrap(true),
                additions::tex_coord_frame_clamp(true),
                additions::smooth_pixel_art(true),
                additions::define_tex_count(1),
                additions::get_texture(),
                additions::apply_tint(),
                additions::define_lights(DEFAULT_MAX_LIGHTS, true),
                additions::rotation_datum(true),
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

    pub fn batch(
        &mut self,
        ctx: &mut DrawContext<'_>,
        texture: TextureHandle,
        tile: &TileQuad,
        options: &TileSpriteOptions,
    ) -> Result<(), BatchError> {
        let flags = tile_option_flags(options);
        if self.state.needs_reconfig(flags, &options.quad) {
            self.run(ctx)?;
            self.state.apply(&mut self.core, flags, &options.quad);
            // The per-vertex rotation datum only matters to lighting.
            if let Some(addition) = self.core.programs.get_addition_mut("RotationDatum") {
                addition.disable = !flags.contains(OptionFlags::LIGHTING);
            }
        }

        let tex_id = match &options.quad.lighting {
            Some(lighting) => {
                self.core.require_pair(texture, lighting.normal_map);
                0.0
            }
            None if options.quad.multi_texturing => self.core.assign_unit(texture) as f32,
            None => {
                self.core.require_single(texture);
                0.0
            }
        };

        self.write_instance(tile, tex_id);
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

    pub fn update_texture_count(
        &mut self,
        ctx: &mut DrawContext<'_>,
        count: Option<u32>,
    ) -> Result<(), BatchError> {
        let multi = self.state.applied().contains(OptionFlags::MULTI_TEXTURE);
        update_texture_budget(&mut self.core, ctx, count, multi)?;
        Ok(())
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        set_viewport_uniforms(&mut self.core, width, height);
    }

    fn write_instance(&mut self, tile: &TileQuad, tex_id: f32) {
        let [u, v, w, h] = tile.frame;
        let tint_effect = if tile.tint_fill { 1.0 } else { 0.0 };

        let corners = [
            (tile.bottom_left, tile.uv_bottom_left, tile.tint_bottom_left),
            (tile.top_left, tile.uv_top_left, tile.tint_top_left),
            (
                tile.bottom_right,
                tile.uv_bottom_right,
                tile.tint_bottom_right,
            ),
            (tile.top_right, tile.uv_top_right, tile.tint_top_right),
        ];

        for (position, uv, tint) in corners {
            self.core.push_f32(position[0]);
            self.core.push_f32(position[1]);
            self.core.push_f32(uv[0]);
            self.core.push_f32(uv[1]);
            self.core.push_f32(u);
            self.core.push_f32(v);
            self.core.push_f32(w);
            self.core.push_f32(h);
            self.core.push_f32(tex_id);
            self.core.push_f32(tile.texture_datum);
            self.core.push_f32(tint_effect);
            self.core.push_u32(tint);
        }
    }

}
