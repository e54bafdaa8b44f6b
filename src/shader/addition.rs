use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A named point in a base shader source where addition snippets are
/// spliced in. Base sources mark these with `#pragma slot(<name>)`
/// lines; see [`crate::shader::template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InjectionPoint {
    /// Extension directives at the very top of the fragment shader.
    Extensions,
    /// Global declarations in the vertex shader.
    VertexHeader,
    /// Statements inside the vertex shader's `main`.
    VertexBody,
    /// Preprocessor defines near the top of the fragment shader.
    FragmentDefine,
    /// Global declarations in the fragment shader.
    FragmentHeader,
    /// Statements inside the fragment shader's `main`.
    FragmentBody,
}

impl InjectionPoint {
    pub const ALL: [InjectionPoint; 6] = [
        InjectionPoint::Extensions,
        InjectionPoint::VertexHeader,
        InjectionPoint::VertexBody,
        InjectionPoint::FragmentDefine,
        InjectionPoint::FragmentHeader,
        InjectionPoint::FragmentBody,
    ];

    /// The slots expanded while assembling the vertex stage.
    pub const VERTEX: [InjectionPoint; 2] =
        [InjectionPoint::VertexHeader, InjectionPoint::VertexBody];

    /// The slots expanded while assembling the fragment stage.
    pub const FRAGMENT: [InjectionPoint; 4] = [
        InjectionPoint::Extensions,
        InjectionPoint::FragmentDefine,
        InjectionPoint::FragmentHeader,
        InjectionPoint::FragmentBody,
    ];

    /// The marker name used inside `#pragma slot(...)`.
    pub const fn marker(self) -> &'static str {
        match self {
            InjectionPoint::Extensions => "extensions",
            InjectionPoint::VertexHeader => "vertexHeader",
            InjectionPoint::VertexBody => "vertexBody",
            InjectionPoint::FragmentDefine => "fragmentDefine",
            InjectionPoint::FragmentHeader => "fragmentHeader",
            InjectionPoint::FragmentBody => "fragmentBody",
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.marker() == marker)
    }
}

/// A named, reusable fragment of shader source.
///
/// Additions are value objects: once built they are only ever mutated
/// through the `disable` flag, or through [`ShaderAddition::set_snippet`]
/// when a compile-time constant baked into a snippet (such as a light
/// count) has to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderAddition {
    name: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    snippets: Vec<(InjectionPoint, String)>,
}

impl ShaderAddition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tags: Vec::new(),
            disable: false,
            snippets: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn with_snippet(mut self, slot: InjectionPoint, source: &str) -> Self {
        self.set_snippet(slot, source);
        self
    }

    pub fn with_disable(mut self, disable: bool) -> Self {
        self.disable = disable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn snippet(&self, slot: InjectionPoint) -> Option<&str> {
        self.snippets
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, source)| source.as_str())
    }

    /// Replace (or insert) the snippet for one slot. This is the only
    /// sanctioned post-construction edit besides `disable`.
    pub fn set_snippet(&mut self, slot: InjectionPoint, source: impl Into<String>) {
        let source = source.into();
        match self.snippets.iter_mut().find(|(s, _)| *s == slot) {
            Some((_, existing)) => *existing = source,
            None => self.snippets.push((slot, source)),
        }
    }

    pub fn snippets(&self) -> impl Iterator<Item = (InjectionPoint, &str)> {
        self.snippets
            .iter()
            .map(|(slot, source)| (*slot, source.as_str()))
    }

    /// Content fingerprint used by the program cache key. Two additions
    /// with the same name but different snippet text must not collide.
    pub(crate) fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (slot, source) in &self.snippets {
            slot.marker().hash(&mut hasher);
            source.hash(&mut hasher);
        }
        hasher.finish()
    }
}
