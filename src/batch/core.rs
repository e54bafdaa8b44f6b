use std::collections::HashMap;

use crate::batch::config::BatchConfig;
use crate::driver::{BufferHandle, DrawCall, DrawContext, GpuDriver, TextureHandle};
use crate::error::{BatchError, ConfigError};
use crate::shader::ProgramManager;

/// Vertices addressable through a 16-bit index buffer. Every handler's
/// instance capacity is capped against this.
pub const INDEX_SPACE: u32 = 65536;

const BYTES_PER_INDEX: u32 = 2;

/// A sub-batch: a contiguous run of instances sharing one pool of
/// textures, drawn with a single call. Entries are append-only during
/// accumulation and read-only during a flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchEntry {
    /// Instance offset of this entry within the batch.
    pub start: u32,
    /// Number of instances in this entry.
    pub count: u32,
    /// Number of texture units consumed.
    pub unit: u32,
    /// Textures bound to units `0..unit` for this entry's draw call.
    pub textures: Vec<TextureHandle>,
}

/// Shared accumulation state for every batch handler: the CPU-mirrored
/// vertex buffer, the sub-batch entry list, texture-unit bookkeeping
/// and the handler's program manager.
///
/// Per frame a handler moves Empty -> Accumulating -> (Full -> flush ->
/// Empty); a render-option change mid-accumulation flushes early so one
/// draw call never mixes shader variants.
pub struct BatchCore {
    name: String,
    vertices_per_instance: u32,
    indices_per_instance: u32,
    instances_per_batch: u32,
    bytes_per_instance: u32,
    words_per_instance: usize,
    max_textures_per_batch: u32,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_buffer_dynamic: bool,
    vertex_data: Vec<u32>,
    index_mirror: Vec<u16>,
    instance_count: u32,
    current_entry: BatchEntry,
    entries: Vec<BatchEntry>,
    unit_lookup: HashMap<TextureHandle, u32>,
    pub programs: ProgramManager,
}

impl BatchCore {
    /// Build the core from a merged configuration. `generate_indices`
    /// receives the final instance capacity and produces the element
    /// index data for it.
    pub fn new(
        driver: &mut dyn GpuDriver,
        config: &BatchConfig,
        generate_indices: impl FnOnce(u32) -> Vec<u16>,
    ) -> Result<Self, BatchError> {
        if config.name.is_empty() {
            return Err(ConfigError::MissingName.into());
        }
        if config.vertices_per_instance == 0 || config.indices_per_instance == 0 {
            return Err(ConfigError::MissingGeometry {
                handler: config.name.clone(),
            }
            .into());
        }
        let layout = match &config.vertex_layout {
            Some(layout) if !layout.attributes.is_empty() => layout,
            _ => {
                return Err(ConfigError::EmptyLayout {
                    handler: config.name.clone(),
                }
                .into())
            }
        };

        let vertices_per_instance = config.vertices_per_instance;
        let index_limit = INDEX_SPACE / vertices_per_instance;
        let target = config.instances_per_batch.unwrap_or(index_limit);
        let instances_per_batch = target.min(index_limit).max(1);

        let stride = layout.stride();
        let bytes_per_instance = stride * vertices_per_instance;
        let hardware_units = driver.max_texture_units().max(1);
        let max_textures_per_batch = config
            .max_textures_per_batch
            .unwrap_or(hardware_units)
            .clamp(1, hardware_units);

        let index_buffer_dynamic = config.index_buffer_dynamic.unwrap_or(false);
        let index_data = generate_indices(instances_per_batch);
        let index_buffer = driver.create_index_buffer(&index_data, index_buffer_dynamic);
        let vertex_buffer =
            driver.create_vertex_buffer((instances_per_batch * bytes_per_instance) as usize);

        let mut programs = ProgramManager::new(vec![layout.clone()], Some(index_buffer));
        programs.set_base_shader(&config.name, &config.vertex_source, &config.fragment_source);
        for addition in &config.shader_additions {
            programs.add_addition(addition.clone());
        }
        for feature in &config.shader_features {
            programs.add_feature(feature);
        }

        log::debug!(
            "batch handler `{}`: {} instances per batch, {} bytes per instance, {} texture units",
            config.name,
            instances_per_batch,
            bytes_per_instance,
            max_textures_per_batch
        );

        Ok(Self {
            name: config.name.clone(),
            vertices_per_instance,
            indices_per_instance: config.indices_per_instance,
            instances_per_batch,
            bytes_per_instance,
            words_per_instance: (bytes_per_instance / 4) as usize,
            max_textures_per_batch,
            vertex_buffer,
            index_buffer,
            index_buffer_dynamic,
            vertex_data: Vec::with_capacity(
                (instances_per_batch * bytes_per_instance / 4) as usize,
            ),
            index_mirror: Vec::new(),
            instance_count: 0,
            current_entry: BatchEntry::default(),
            entries: Vec::new(),
            unit_lookup: HashMap::new(),
            programs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn instances_per_batch(&self) -> u32 {
        self.instances_per_batch
    }

    pub fn vertices_per_instance(&self) -> u32 {
        self.vertices_per_instance
    }

    pub fn indices_per_instance(&self) -> u32 {
        self.indices_per_instance
    }

    pub fn bytes_per_instance(&self) -> u32 {
        self.bytes_per_instance
    }

    pub fn max_textures_per_batch(&self) -> u32 {
        self.max_textures_per_batch
    }

    pub(crate) fn set_max_textures(&mut self, count: u32) {
        self.max_textures_per_batch = count.max(1);
    }

    pub fn is_empty(&self) -> bool {
        self.instance_count == 0
    }

    pub fn is_full(&self) -> bool {
        self.instance_count == self.instances_per_batch
    }

    /// Units already committed to the in-progress sub-batch entry.
    pub fn current_entry_units(&self) -> u32 {
        self.current_entry.unit
    }

    pub(crate) fn current_single_texture(&self) -> Option<TextureHandle> {
        self.current_entry.textures.first().copied()
    }

    #[inline]
    pub fn push_f32(&mut self, value: f32) {
        self.vertex_data.push(value.to_bits());
    }

    #[inline]
    pub fn push_u32(&mut self, value: u32) {
        self.vertex_data.push(value);
    }

    /// Duplicate the most recently written vertex. Strip handlers use
    /// this for degenerate stitching.
    pub(crate) fn repeat_last_vertex(&mut self) {
        let words = self.words_per_instance;
        let len = self.vertex_data.len();
        debug_assert!(len >= words, "no vertex written yet");
        for i in len - words..len {
            let word = self.vertex_data[i];
            self.vertex_data.push(word);
        }
    }

    pub(crate) fn push_index(&mut self, index: u16) {
        self.index_mirror.push(index);
    }

    /// Resolve a texture to a unit within the current entry, opening a
    /// new entry when the unit budget is exhausted. Reusing a texture
    /// already in the entry costs one map lookup, never a scan.
    pub fn assign_unit(&mut self, texture: TextureHandle) -> u32 {
        if let Some(&unit) = self.unit_lookup.get(&texture) {
            return unit;
        }
        if self.current_entry.unit == self.max_textures_per_batch {
            self.push_current_entry();
        }
        let unit = self.current_entry.unit;
        self.current_entry.textures.push(texture);
        self.current_entry.unit += 1;
        self.unit_lookup.insert(texture, unit);
        unit
    }

    /// Single-texture mode: every instance in an entry shares exactly
    /// one texture, so any texture change breaks the entry.
    pub fn require_single(&mut self, texture: TextureHandle) {
        match self.current_entry.textures.first() {
            Some(&bound) if bound == texture => {}
            Some(_) => {
                self.push_current_entry();
                self.current_entry.textures.push(texture);
                self.current_entry.unit = 1;
            }
            None => {
                self.current_entry.textures.push(texture);
                self.current_entry.unit = 1;
            }
        }
    }

    /// Dual-texture mode: the diffuse and normal map pair must both
    /// match, by handle equality, to stay in the same entry.
    pub fn require_pair(&mut self, diffuse: TextureHandle, normal: TextureHandle) {
        let matches = self.current_entry.textures.len() == 2
            && self.current_entry.textures[0] == diffuse
            && self.current_entry.textures[1] == normal;
        if matches {
            return;
        }
        if !self.current_entry.textures.is_empty() {
            self.push_current_entry();
        }
        self.current_entry.textures.push(diffuse);
        self.current_entry.textures.push(normal);
        self.current_entry.unit = 2;
    }

    /// Count a fully written instance. Callers check `is_full` after
    /// this, so a partially written instance can never be flushed.
    pub fn finish_instance(&mut self) {
        debug_assert!(
            self.instance_count < self.instances_per_batch,
            "instance written past batch capacity"
        );
        self.instance_count += 1;
        self.current_entry.count += 1;
    }

    fn push_current_entry(&mut self) {
        self.unit_lookup.clear();
        if self.current_entry.count == 0 {
            // Nothing was drawn against these textures; reuse the entry.
            self.current_entry.textures.clear();
            self.current_entry.unit = 0;
            return;
        }
        let next = BatchEntry {
            start: self.instance_count,
            ..BatchEntry::default()
        };
        self.entries.push(std::mem::replace(&mut self.current_entry, next));
    }

    /// Upload the occupied buffer range and issue one draw call per
    /// sub-batch entry, then reset to empty.
    ///
    /// If the program variant is still compiling in parallel, the draw
    /// is skipped and the accumulated data dropped; the next frame's
    /// attempt is expected to succeed. A synthesis or compile failure
    /// also resets accumulation before propagating.
    pub fn flush(&mut self, ctx: &mut DrawContext<'_>) -> Result<(), BatchError> {
        if self.instance_count == 0 {
            return Ok(());
        }

        self.push_current_entry();

        if !self.index_buffer_dynamic {
            debug_assert_eq!(
                self.vertex_data.len() * 4,
                (self.instance_count * self.bytes_per_instance) as usize,
                "vertex mirror out of step with instance count"
            );
        }

        ctx.driver
            .upload_vertex_range(self.vertex_buffer, bytemuck::cast_slice(&self.vertex_data));

        if self.index_buffer_dynamic && !self.index_mirror.is_empty() {
            ctx.driver
                .update_index_buffer(self.index_buffer, &self.index_mirror);
        }

        let handles = match self.programs.get_current_program_suite(ctx.driver) {
            Ok(Some(suite)) => Some((suite.program, suite.vao)),
            Ok(None) => None,
            Err(err) => {
                self.reset();
                return Err(err.into());
            }
        };
        let Some((program, vao)) = handles else {
            log::debug!(
                "batch handler `{}`: program variant still compiling, dropping {} instances",
                self.name,
                self.instance_count
            );
            self.reset();
            return Ok(());
        };

        self.programs.apply_uniforms(ctx.driver, program);

        let bytes_per_index_per_instance = self.indices_per_instance * BYTES_PER_INDEX;
        for entry in &self.entries {
            ctx.driver.draw(DrawCall {
                program,
                vao,
                textures: &entry.textures,
                index_count: entry.count * self.indices_per_instance,
                first_index_byte: entry.start * bytes_per_index_per_instance,
            });
        }

        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.instance_count = 0;
        self.vertex_data.clear();
        self.index_mirror.clear();
        self.entries.clear();
        self.unit_lookup.clear();
        self.current_entry = BatchEntry::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HeadlessDriver;
    use crate::layout::{VertexAttribute, VertexBufferLayout};

    fn config(instances: Option<u32>) -> BatchConfig {
        BatchConfig {
            name: "TestBatch".to_string(),
            vertices_per_instance: 4,
            indices_per_instance: 6,
            vertex_source: "void main () {}".to_string(),
            fragment_source: "void main () {}".to_string(),
            vertex_layout: Some(VertexBufferLayout::new(vec![VertexAttribute::floats(
                "inPosition",
                2,
            )])),
            instances_per_batch: instances,
            ..BatchConfig::default()
        }
    }

    fn core(driver: &mut HeadlessDriver, instances: Option<u32>) -> BatchCore {
        BatchCore::new(driver, &config(instances), |_| Vec::new()).unwrap()
    }

    #[test]
    fn capacity_is_capped_by_index_space() {
        let mut driver = HeadlessDriver::new(16);
        // 65536 / 4 vertices per instance.
        assert_eq!(core(&mut driver, None).instances_per_batch(), 16384);
        assert_eq!(core(&mut driver, Some(100_000)).instances_per_batch(), 16384);
        assert_eq!(core(&mut driver, Some(512)).instances_per_batch(), 512);
    }

    #[test]
    fn unit_assignment_reuses_and_packs() {
        let mut driver = HeadlessDriver::new(2);
        let mut core = core(&mut driver, Some(16));

        let t1 = TextureHandle(1);
        let t2 = TextureHandle(2);
        let t3 = TextureHandle(3);

        assert_eq!(core.assign_unit(t1), 0);
        assert_eq!(core.assign_unit(t2), 1);
        // Reuse never consumes a new unit.
        assert_eq!(core.assign_unit(t1), 0);
        core.finish_instance();

        // Third texture exhausts the 2-unit budget and opens an entry.
        assert_eq!(core.assign_unit(t3), 0);
        assert_eq!(core.current_entry_units(), 1);
        assert_eq!(core.entries.len(), 1);
        assert_eq!(core.entries[0].textures, vec![t1, t2]);
    }

    #[test]
    fn single_mode_breaks_entries_on_texture_change() {
        let mut driver = HeadlessDriver::new(16);
        let mut core = core(&mut driver, Some(16));

        core.require_single(TextureHandle(7));
        core.finish_instance();
        core.require_single(TextureHandle(7));
        core.finish_instance();
        assert!(core.entries.is_empty());

        core.require_single(TextureHandle(8));
        core.finish_instance();
        assert_eq!(core.entries.len(), 1);
        assert_eq!(core.entries[0].count, 2);
    }

    #[test]
    fn pair_mode_requires_both_handles_to_match() {
        let mut driver = HeadlessDriver::new(16);
        let mut core = core(&mut driver, Some(16));

        let diffuse = TextureHandle(1);
        let normal = TextureHandle(2);
        core.require_pair(diffuse, normal);
        core.finish_instance();
        core.require_pair(diffuse, normal);
        core.finish_instance();
        assert!(core.entries.is_empty());

        core.require_pair(diffuse, TextureHandle(3));
        core.finish_instance();
        assert_eq!(core.entries.len(), 1);
    }
}
