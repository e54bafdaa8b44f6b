//! Deterministic assembly of final shader source from a base template
//! and an ordered list of additions.
//!
//! Base sources mark injection points with lines of the form
//! `#pragma slot(<name>)`. Assembly replaces each marker with the
//! snippets every enabled addition contributes to that slot, in
//! addition order, and injects feature flags as `#define FEATURE_<F>`
//! lines directly after the `#version` directive.

use crate::error::ShaderError;
use crate::shader::addition::{InjectionPoint, ShaderAddition};

/// Expand one stage of a base source. `stage_slots` lists the slots
/// that may legally appear in this stage; a snippet aimed at a slot
/// whose marker is absent from the source is a composition error.
pub(crate) fn assemble_stage(
    shader_name: &str,
    source: &str,
    stage_slots: &[InjectionPoint],
    additions: &[ShaderAddition],
    features: &[String],
) -> Result<String, ShaderError> {
    let mut defines: Vec<&str> = features.iter().map(String::as_str).collect();
    defines.sort_unstable();
    defines.dedup();

    let mut out = String::with_capacity(source.len() + 256);
    let mut seen: Vec<InjectionPoint> = Vec::new();
    let mut features_emitted = defines.is_empty();

    if !features_emitted && !source.trim_start().starts_with("#version") {
        emit_feature_defines(&mut out, &defines);
        features_emitted = true;
    }

    for line in source.lines() {
        if let Some(marker) = parse_marker(line) {
            let slot = InjectionPoint::from_marker(marker)
                .filter(|slot| stage_slots.contains(slot))
                .ok_or_else(|| ShaderError::UnknownSlot {
                    shader: shader_name.to_string(),
                    marker: marker.to_string(),
                })?;
            seen.push(slot);
            for addition in additions.iter().filter(|a| !a.disable) {
                if let Some(snippet) = addition.snippet(slot) {
                    out.push_str(snippet);
                    if !snippet.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
            continue;
        }

        out.push_str(line);
        out.push('\n');

        if !features_emitted && line.trim_start().starts_with("#version") {
            emit_feature_defines(&mut out, &defines);
            features_emitted = true;
        }
    }

    for &slot in stage_slots {
        if seen.contains(&slot) {
            continue;
        }
        let orphan = additions
            .iter()
            .filter(|a| !a.disable)
            .find(|a| a.snippet(slot).is_some());
        if let Some(addition) = orphan {
            return Err(ShaderError::MissingSlot {
                shader: shader_name.to_string(),
                addition: addition.name().to_string(),
                slot: slot.marker(),
            });
        }
    }

    Ok(out)
}

fn parse_marker(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("#pragma slot(")?
        .strip_suffix(')')
}

fn emit_feature_defines(out: &mut String, defines: &[&str]) {
    for feature in defines {
        out.push_str("#define FEATURE_");
        out.push_str(feature);
        out.push('\n');
    }
}
