use std::collections::HashMap;

use crate::driver::{BufferHandle, CompilePoll, GpuDriver, PendingProgram, ProgramHandle, ProgramSubmit, VaoHandle};
use crate::error::ShaderError;
use crate::layout::VertexBufferLayout;
use crate::shader::addition::ShaderAddition;
use crate::shader::config::ProgramConfig;
use crate::shader::uniform::UniformValue;

/// A compiled shader program with everything needed to draw with it:
/// the program handle, the VAO binding its buffers, and a deep copy of
/// the configuration that produced it (kept for diagnostics, never
/// reused for compilation).
#[derive(Debug, Clone)]
pub struct ProgramSuite {
    pub program: ProgramHandle,
    pub vao: VaoHandle,
    pub config: ProgramConfig,
}

/// Owns a mutable working [`ProgramConfig`], a cache of compiled
/// program suites keyed by the config's canonical key, and a pool of
/// uniform values that persists across program swaps.
///
/// Once a suite is cached under a key it is never recompiled; toggling
/// options back and forth between previously seen states is free after
/// the first occurrence of each state.
pub struct ProgramManager {
    layouts: Vec<VertexBufferLayout>,
    index_buffer: Option<BufferHandle>,
    config: ProgramConfig,
    programs: HashMap<String, ProgramSuite>,
    pending: HashMap<String, PendingProgram>,
    poisoned: HashMap<String, ShaderError>,
    uniforms: HashMap<String, UniformValue>,
}

impl ProgramManager {
    /// `layouts` and `index_buffer` are fixed for the manager's
    /// lifetime; every cached suite's VAO is built from them.
    pub fn new(layouts: Vec<VertexBufferLayout>, index_buffer: Option<BufferHandle>) -> Self {
        Self {
            layouts,
            index_buffer,
            config: ProgramConfig::default(),
            programs: HashMap::new(),
            pending: HashMap::new(),
            poisoned: HashMap::new(),
            uniforms: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Replace the base entry of the working configuration. Sources are
    /// not validated here; compile errors surface when the program is
    /// actually built.
    pub fn set_base_shader(&mut self, name: &str, vertex_source: &str, fragment_source: &str) {
        let base = &mut self.config.base;
        base.name = name.to_string();
        base.vertex_source = vertex_source.to_string();
        base.fragment_source = fragment_source.to_string();
    }

    pub fn add_addition(&mut self, addition: ShaderAddition) {
        self.config.additions.push(addition);
    }

    pub fn insert_addition(&mut self, index: usize, addition: ShaderAddition) {
        let index = index.min(self.config.additions.len());
        self.config.additions.insert(index, addition);
    }

    pub fn remove_addition(&mut self, name: &str) {
        self.config.additions.retain(|a| a.name() != name);
    }

    /// Swap the addition with the given name for a new one, keeping its
    /// position. Does nothing if no addition holds that name.
    pub fn replace_addition(&mut self, name: &str, addition: ShaderAddition) {
        if let Some(slot) = self.config.additions.iter_mut().find(|a| a.name() == name) {
            *slot = addition;
        }
    }

    pub fn get_addition(&self, name: &str) -> Option<&ShaderAddition> {
        self.config.additions.iter().find(|a| a.name() == name)
    }

    pub fn get_addition_mut(&mut self, name: &str) -> Option<&mut ShaderAddition> {
        self.config.additions.iter_mut().find(|a| a.name() == name)
    }

    pub fn get_additions_by_tag(&self, tag: &str) -> Vec<&ShaderAddition> {
        self.config
            .additions
            .iter()
            .filter(|a| a.has_tag(tag))
            .collect()
    }

    pub fn get_additions_by_tag_mut(&mut self, tag: &str) -> Vec<&mut ShaderAddition> {
        self.config
            .additions
            .iter_mut()
            .filter(|a| a.has_tag(tag))
            .collect()
    }

    pub fn get_addition_index(&self, name: &str) -> Option<usize> {
        self.config.additions.iter().position(|a| a.name() == name)
    }

    /// Idempotent: adding a feature twice keeps a single entry.
    pub fn add_feature(&mut self, feature: &str) {
        if !self.config.features.iter().any(|f| f == feature) {
            self.config.features.push(feature.to_string());
        }
    }

    pub fn remove_feature(&mut self, feature: &str) {
        self.config.features.retain(|f| f != feature);
    }

    pub fn clear_features(&mut self) {
        self.config.features.clear();
    }

    /// Clear base sources, additions and features in place, keeping the
    /// same configuration object identity for callers holding on to it.
    pub fn reset_current_config(&mut self) {
        self.config.base.name.clear();
        self.config.base.vertex_source.clear();
        self.config.base.fragment_source.clear();
        self.config.additions.clear();
        self.config.features.clear();
    }

    /// Set a uniform value shared by every program this manager owns.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        self.uniforms.insert(name.to_string(), value.into());
    }

    /// Unused uniforms are not harmful, but they cost push time every
    /// flush and confuse debugging, so callers drop what they no longer
    /// need.
    pub fn remove_uniform(&mut self, name: &str) {
        self.uniforms.remove(name);
    }

    pub fn clear_uniforms(&mut self) {
        self.uniforms.clear();
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    /// Push every pooled uniform to `program`. Names the program does
    /// not declare are silently ignored by the driver.
    pub fn apply_uniforms(&self, driver: &mut dyn GpuDriver, program: ProgramHandle) {
        for (name, value) in &self.uniforms {
            driver.set_uniform(program, name, value);
        }
    }

    /// Return the suite for the current configuration, compiling it on
    /// first sight.
    ///
    /// `Ok(None)` means a parallel compile is still in flight; nothing
    /// is cached and the caller polls again on a later frame. An error
    /// poisons the key: the same configuration reports the same error
    /// on every subsequent call without recompiling.
    pub fn get_current_program_suite(
        &mut self,
        driver: &mut dyn GpuDriver,
    ) -> Result<Option<&ProgramSuite>, ShaderError> {
        let key = self.config.canonical_key();

        if let Some(err) = self.poisoned.get(&key) {
            return Err(err.clone());
        }

        if !self.programs.contains_key(&key) {
            let compiled = if let Some(&token) = self.pending.get(&key) {
                match driver.poll_program(token) {
                    CompilePoll::Pending => return Ok(None),
                    CompilePoll::Failed(err) => {
                        self.pending.remove(&key);
                        self.poisoned.insert(key, err.clone());
                        return Err(err);
                    }
                    CompilePoll::Ready(program) => {
                        self.pending.remove(&key);
                        program
                    }
                }
            } else {
                let (vertex, fragment) = match self.config.assemble() {
                    Ok(sources) => sources,
                    Err(err) => {
                        self.poisoned.insert(key, err.clone());
                        return Err(err);
                    }
                };
                log::debug!(
                    "compiling shader variant `{}` ({} additions, {} features)",
                    key,
                    self.config.additions.iter().filter(|a| !a.disable).count(),
                    self.config.features.len()
                );
                match driver.submit_program(&self.config.base.name, &vertex, &fragment) {
                    Err(err) => {
                        self.poisoned.insert(key, err.clone());
                        return Err(err);
                    }
                    Ok(ProgramSubmit::Pending(token)) => {
                        self.pending.insert(key, token);
                        return Ok(None);
                    }
                    Ok(ProgramSubmit::Ready(program)) => program,
                }
            };

            let vao = driver.create_vao(compiled, self.index_buffer, &self.layouts);
            self.programs.insert(
                key.clone(),
                ProgramSuite {
                    program: compiled,
                    vao,
                    config: self.config.clone(),
                },
            );
        }

        Ok(self.programs.get(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::addition::InjectionPoint;

    fn manager() -> ProgramManager {
        ProgramManager::new(Vec::new(), None)
    }

    fn addition(name: &str) -> ShaderAddition {
        ShaderAddition::new(name).with_snippet(InjectionPoint::FragmentBody, name)
    }

    #[test]
    fn additions_edit_by_name() {
        let mut manager = manager();
        manager.add_addition(addition("GetTexture"));
        manager.add_addition(addition("ApplyTint"));
        manager.insert_addition(1, addition("SmoothPixelArt"));

        assert_eq!(manager.get_addition_index("SmoothPixelArt"), Some(1));
        assert_eq!(manager.get_addition_index("ApplyTint"), Some(2));
        assert!(manager.get_addition("GetTexture").is_some());

        manager.replace_addition("SmoothPixelArt", addition("Replacement"));
        assert!(manager.get_addition("SmoothPixelArt").is_none());
        assert_eq!(manager.get_addition_index("Replacement"), Some(1));

        manager.remove_addition("Replacement");
        assert_eq!(manager.get_addition_index("ApplyTint"), Some(1));
    }

    #[test]
    fn tags_filter_additions() {
        let mut manager = manager();
        manager.add_addition(addition("DefineLights").with_tag("lighting"));
        manager.add_addition(addition("ApplyTint"));
        manager.add_addition(addition("ApplyLighting").with_tag("lighting"));

        let tagged = manager.get_additions_by_tag("lighting");
        assert_eq!(tagged.len(), 2);

        for a in manager.get_additions_by_tag_mut("lighting") {
            a.disable = true;
        }
        assert!(manager.get_addition("DefineLights").unwrap().disable);
        assert!(!manager.get_addition("ApplyTint").unwrap().disable);
    }

    #[test]
    fn features_are_idempotent() {
        let mut manager = manager();
        manager.add_feature("LIGHTING");
        manager.add_feature("LIGHTING");
        assert_eq!(manager.config().features.len(), 1);

        manager.remove_feature("LIGHTING");
        assert!(manager.config().features.is_empty());
    }

    #[test]
    fn reset_clears_in_place() {
        let mut manager = manager();
        manager.set_base_shader("Quad", "v", "f");
        manager.add_addition(addition("GetTexture"));
        manager.add_feature("LIGHTING");

        manager.reset_current_config();

        assert!(manager.config().base.name.is_empty());
        assert!(manager.config().base.vertex_source.is_empty());
        assert!(manager.config().additions.is_empty());
        assert!(manager.config().features.is_empty());
    }

    #[test]
    fn uniform_pool_is_editable() {
        let mut manager = manager();
        manager.set_uniform("uResolution", [800.0, 600.0]);
        assert_eq!(
            manager.uniform("uResolution"),
            Some(&UniformValue::Vec2([800.0, 600.0]))
        );

        manager.remove_uniform("uResolution");
        assert!(manager.uniform("uResolution").is_none());
    }
}
