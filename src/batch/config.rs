use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::{VertexAttribute, VertexBufferLayout};
use crate::shader::ShaderAddition;

/// Construction record for a batch handler.
///
/// Every built-in handler ships a complete default config; callers may
/// pass a partial override whose set fields win field-by-field. Array
/// fields are deep-copied during the merge, never aliased, and support
/// name-keyed `*_remove` / `*_add` override lists. Unrecognized keys in
/// a JSON record are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchConfig {
    pub name: String,
    /// 0 means "take the default".
    pub vertices_per_instance: u32,
    pub indices_per_instance: u32,
    pub vertex_source: String,
    pub fragment_source: String,
    pub vertex_layout: Option<VertexBufferLayout>,
    /// Requested instance capacity; always clamped against the 16-bit
    /// index space during handler construction.
    pub instances_per_batch: Option<u32>,
    pub max_textures_per_batch: Option<u32>,
    pub max_lights: Option<u32>,
    pub index_buffer_dynamic: Option<bool>,
    pub shader_additions: Vec<ShaderAddition>,
    pub shader_features: Vec<String>,
    /// Override-only: attributes appended to the resolved layout.
    pub vertex_layout_add: Vec<VertexAttribute>,
    /// Override-only: attribute names dropped from the resolved layout.
    pub vertex_layout_remove: Vec<String>,
    /// Override-only: additions appended to the resolved list.
    pub shader_additions_add: Vec<ShaderAddition>,
    /// Override-only: addition names dropped from the resolved list.
    pub shader_additions_remove: Vec<String>,
}

impl BatchConfig {
    /// Parse a configuration record. Unknown keys are ignored and
    /// missing keys fall back to their unset state, to be filled from
    /// the handler's defaults during the merge.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deep-copy merge of a complete default config with an optional
    /// override. The result is validated: a handler cannot be built
    /// without a name, a layout, or its per-instance geometry.
    pub fn merged(defaults: &BatchConfig, overrides: Option<&BatchConfig>) -> Result<BatchConfig, ConfigError> {
        let mut merged = defaults.clone();

        if let Some(overrides) = overrides {
            if !overrides.name.is_empty() {
                merged.name = overrides.name.clone();
            }
            if overrides.vertices_per_instance != 0 {
                merged.vertices_per_instance = overrides.vertices_per_instance;
            }
            if overrides.indices_per_instance != 0 {
                merged.indices_per_instance = overrides.indices_per_instance;
            }
            if !overrides.vertex_source.is_empty() {
                merged.vertex_source = overrides.vertex_source.clone();
            }
            if !overrides.fragment_source.is_empty() {
                merged.fragment_source = overrides.fragment_source.clone();
            }
            if let Some(layout) = &overrides.vertex_layout {
                merged.vertex_layout = Some(layout.clone());
            }
            if overrides.instances_per_batch.is_some() {
                merged.instances_per_batch = overrides.instances_per_batch;
            }
            if overrides.max_textures_per_batch.is_some() {
                merged.max_textures_per_batch = overrides.max_textures_per_batch;
            }
            if overrides.max_lights.is_some() {
                merged.max_lights = overrides.max_lights;
            }
            if overrides.index_buffer_dynamic.is_some() {
                merged.index_buffer_dynamic = overrides.index_buffer_dynamic;
            }
            if !overrides.shader_additions.is_empty() {
                merged.shader_additions = overrides.shader_additions.clone();
            }
            if !overrides.shader_features.is_empty() {
                merged.shader_features = overrides.shader_features.clone();
            }

            if let Some(layout) = &mut merged.vertex_layout {
                layout
                    .attributes
                    .retain(|attr| !overrides.vertex_layout_remove.contains(&attr.name));
                layout
                    .attributes
                    .extend(overrides.vertex_layout_add.iter().cloned());
            }

            merged
                .shader_additions
                .retain(|addition| !overrides.shader_additions_remove.iter().any(|n| n == addition.name()));
            merged
                .shader_additions
                .extend(overrides.shader_additions_add.iter().cloned());
        }

        if merged.name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        if merged.vertices_per_instance == 0 || merged.indices_per_instance == 0 {
            return Err(ConfigError::MissingGeometry {
                handler: merged.name,
            });
        }
        match &merged.vertex_layout {
            Some(layout) if !layout.attributes.is_empty() => {}
            _ => {
                return Err(ConfigError::EmptyLayout {
                    handler: merged.name,
                })
            }
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::additions;

    fn defaults() -> BatchConfig {
        BatchConfig {
            name: "QuadBatcher".to_string(),
            vertices_per_instance: 4,
            indices_per_instance: 6,
            vertex_source: "v".to_string(),
            fragment_source: "f".to_string(),
            vertex_layout: Some(VertexBufferLayout::new(vec![
                VertexAttribute::floats("inPosition", 2),
                VertexAttribute::floats("inTexCoord", 2),
                VertexAttribute::normalized_u8("inTint", 4),
            ])),
            shader_additions: vec![additions::get_tex_coord_out(), additions::apply_tint()],
            ..BatchConfig::default()
        }
    }

    #[test]
    fn override_wins_field_by_field() {
        let overrides = BatchConfig {
            name: "CustomQuads".to_string(),
            instances_per_batch: Some(512),
            ..BatchConfig::default()
        };

        let merged = BatchConfig::merged(&defaults(), Some(&overrides)).unwrap();

        assert_eq!(merged.name, "CustomQuads");
        assert_eq!(merged.instances_per_batch, Some(512));
        // Untouched fields keep the defaults.
        assert_eq!(merged.vertices_per_instance, 4);
        assert_eq!(merged.vertex_source, "v");
    }

    #[test]
    fn merge_copies_arrays_instead_of_aliasing() {
        let base = defaults();
        let merged = BatchConfig::merged(&base, None).unwrap();
        assert_eq!(merged.shader_additions, base.shader_additions);
        assert_eq!(merged.vertex_layout, base.vertex_layout);
    }

    #[test]
    fn add_remove_lists_edit_by_name() {
        let overrides = BatchConfig {
            vertex_layout_remove: vec!["inTexCoord".to_string()],
            vertex_layout_add: vec![VertexAttribute::floats("inCustom", 3)],
            shader_additions_remove: vec!["ApplyTint".to_string()],
            shader_additions_add: vec![additions::smooth_pixel_art(true)],
            ..BatchConfig::default()
        };

        let merged = BatchConfig::merged(&defaults(), Some(&overrides)).unwrap();

        let layout = merged.vertex_layout.unwrap();
        let names: Vec<&str> = layout.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["inPosition", "inTint", "inCustom"]);

        let additions: Vec<&str> = merged.shader_additions.iter().map(|a| a.name()).collect();
        assert_eq!(additions, ["GetTexCoordOut", "SmoothPixelArt"]);
    }

    #[test]
    fn missing_name_is_fatal() {
        let mut nameless = defaults();
        nameless.name.clear();
        assert_eq!(
            BatchConfig::merged(&nameless, None),
            Err(ConfigError::MissingName)
        );
    }

    #[test]
    fn unknown_json_keys_are_ignored() {
        let config = BatchConfig::from_json(
            r#"{
                "name": "FromRecord",
                "instancesPerBatch": 64,
                "someFutureKey": { "nested": true }
            }"#,
        )
        .unwrap();
        assert_eq!(config.name, "FromRecord");
        assert_eq!(config.instances_per_batch, Some(64));
    }
}
