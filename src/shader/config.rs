use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use crate::error::ShaderError;
use crate::shader::addition::{InjectionPoint, ShaderAddition};
use crate::shader::template;

/// The base entry of a program configuration: a named pair of raw
/// vertex and fragment sources carrying slot markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderBase {
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
}

/// The working description a compiled program variant is derived from.
///
/// Addition order is significant: it decides the concatenation order of
/// injected source, so two configurations holding the same additions in
/// different orders are distinct variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramConfig {
    pub base: ShaderBase,
    pub additions: Vec<ShaderAddition>,
    pub features: Vec<String>,
}

impl ProgramConfig {
    /// The cache key for the current state: base identity, sorted
    /// features, and the ordered non-disabled additions with their
    /// content fingerprints. Reparametrizing a snippet in place (for
    /// example a baked light count) therefore produces a fresh key.
    pub fn canonical_key(&self) -> String {
        let mut key = String::with_capacity(64);
        key.push_str(&self.base.name);

        let mut hasher = DefaultHasher::new();
        self.base.vertex_source.hash(&mut hasher);
        self.base.fragment_source.hash(&mut hasher);
        let _ = write!(key, "#{:016x};", hasher.finish());

        let mut features: Vec<&str> = self.features.iter().map(String::as_str).collect();
        features.sort_unstable();
        features.dedup();
        for feature in features {
            key.push_str(feature);
            key.push(',');
        }
        key.push(';');

        for addition in self.additions.iter().filter(|a| !a.disable) {
            key.push_str(addition.name());
            let _ = write!(key, "#{:016x},", addition.fingerprint());
        }

        key
    }

    /// Synthesize the final vertex and fragment sources for the current
    /// state. Pure and deterministic; failures poison the variant.
    pub fn assemble(&self) -> Result<(String, String), ShaderError> {
        let vertex = template::assemble_stage(
            &self.base.name,
            &self.base.vertex_source,
            &InjectionPoint::VERTEX,
            &self.additions,
            &self.features,
        )?;
        let fragment = template::assemble_stage(
            &self.base.name,
            &self.base.fragment_source,
            &InjectionPoint::FRAGMENT,
            &self.additions,
            &self.features,
        )?;
        Ok((vertex, fragment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ShaderBase {
        ShaderBase {
            name: "Quad".to_string(),
            vertex_source: "void main () {}".to_string(),
            fragment_source: "void main () {}".to_string(),
        }
    }

    fn addition(name: &str) -> ShaderAddition {
        ShaderAddition::new(name).with_snippet(InjectionPoint::FragmentBody, name)
    }

    #[test]
    fn identical_configs_share_a_key() {
        let a = ProgramConfig {
            base: base(),
            additions: vec![addition("Tint"), addition("Texture")],
            features: vec!["LIGHTING".to_string()],
        };
        let b = a.clone();
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn addition_order_changes_the_key() {
        let forward = ProgramConfig {
            base: base(),
            additions: vec![addition("Tint"), addition("Texture")],
            features: Vec::new(),
        };
        let reversed = ProgramConfig {
            base: base(),
            additions: vec![addition("Texture"), addition("Tint")],
            features: Vec::new(),
        };
        assert_ne!(forward.canonical_key(), reversed.canonical_key());
    }

    #[test]
    fn disabled_additions_leave_the_key() {
        let enabled = ProgramConfig {
            base: base(),
            additions: vec![addition("Tint")],
            features: Vec::new(),
        };
        let disabled = ProgramConfig {
            base: base(),
            additions: vec![addition("Tint").with_disable(true)],
            features: Vec::new(),
        };
        let empty = ProgramConfig {
            base: base(),
            additions: Vec::new(),
            features: Vec::new(),
        };
        assert_ne!(enabled.canonical_key(), disabled.canonical_key());
        assert_eq!(disabled.canonical_key(), empty.canonical_key());
    }

    #[test]
    fn feature_order_does_not_change_the_key() {
        let a = ProgramConfig {
            base: base(),
            additions: Vec::new(),
            features: vec!["A".to_string(), "B".to_string()],
        };
        let b = ProgramConfig {
            base: base(),
            additions: Vec::new(),
            features: vec!["B".to_string(), "A".to_string()],
        };
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn reparametrized_snippet_changes_the_key() {
        let mut config = ProgramConfig {
            base: base(),
            additions: vec![ShaderAddition::new("DefineLights")
                .with_snippet(InjectionPoint::FragmentDefine, "#define LIGHT_COUNT 4")],
            features: Vec::new(),
        };
        let before = config.canonical_key();
        config.additions[0].set_snippet(InjectionPoint::FragmentDefine, "#define LIGHT_COUNT 8");
        assert_ne!(before, config.canonical_key());
    }
}
