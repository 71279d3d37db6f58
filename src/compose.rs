//! Bundle composition engine
//!
//! Pure, I/O-free merging of already-loaded bundles. `compose` applies
//! overlays left to right: later bundles take precedence over earlier ones.
//! Composing the same ordered sequence always yields an identical result;
//! the only order sensitivity is the explicit overlay order itself.
//!
//! Per-field rules:
//! - session: recursive map merge, overlay wins on non-map conflicts
//! - providers/tools/hooks: merged by module identifier, new entries appended
//! - agents: merged by name with the same entry rules as module lists
//! - context: union, overlay replaces on key collision; keys are namespaced
//!   with the contributing bundle's name to avoid collisions
//! - instruction: replaced only by a non-empty overlay instruction
//! - name/version/description: overlay wins if non-empty

use serde_yaml::{Mapping, Value};

use crate::bundle::Bundle;

/// Recursively merge two mappings. For each overlay key: if both sides hold
/// mappings the merge recurses, otherwise the overlay value wins. Keys unique
/// to the base are retained, so `deep_merge(base, {})` equals `base`.
pub fn deep_merge(base: &Mapping, overlay: &Mapping) -> Mapping {
    let mut out = base.clone();
    for (key, value) in overlay {
        let merged = match (out.get(key), value) {
            (Some(Value::Mapping(b)), Value::Mapping(o)) => Value::Mapping(deep_merge(b, o)),
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Module identifier of a descriptor entry, when the entry is well-formed.
pub fn module_id(entry: &Value) -> Option<&str> {
    entry.as_mapping()?.get("module")?.as_str()
}

/// Merge two module lists keyed by module identifier.
///
/// Overlay entries sharing an identifier with a base entry are merged in
/// place (config deep-merged, other fields overlay-wins); entries with a new
/// identifier are appended in overlay order. Entries without an identifier
/// are appended as-is and left for the validator to flag.
pub fn merge_module_lists(base: &[Value], overlay: &[Value]) -> Vec<Value> {
    let mut out = base.to_vec();
    for entry in overlay {
        let position = module_id(entry)
            .and_then(|id| out.iter().position(|existing| module_id(existing) == Some(id)));
        match position {
            Some(pos) => out[pos] = merge_descriptor(&out[pos], entry),
            None => out.push(entry.clone()),
        }
    }
    out
}

/// Merge two descriptor mappings: `config` fields deep-merge, every other
/// field takes the overlay's value. Non-mapping descriptors resolve to the
/// overlay wholesale.
fn merge_descriptor(base: &Value, overlay: &Value) -> Value {
    let (Some(base_map), Some(overlay_map)) = (base.as_mapping(), overlay.as_mapping()) else {
        return overlay.clone();
    };

    let mut out = base_map.clone();
    for (key, value) in overlay_map {
        let merged = match (key.as_str(), out.get(key), value) {
            (Some("config"), Some(Value::Mapping(b)), Value::Mapping(o)) => {
                Value::Mapping(deep_merge(b, o))
            }
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    Value::Mapping(out)
}

/// Compose a base bundle with overlays, later overlays taking precedence.
///
/// Produces a new bundle; the inputs stay valid and untouched. As each
/// overlay is merged its namespace -> base-path pair is recorded (first
/// write wins) for later mention resolution.
pub fn compose(base: &Bundle, overlays: &[&Bundle]) -> Bundle {
    let mut result = base.clone();

    if !base.name.is_empty() && !result.source_base_paths.contains_key(&base.name) {
        if let Some(path) = &base.base_path {
            result
                .source_base_paths
                .insert(base.name.clone(), path.clone());
        }
    }

    // Namespace this bundle's own context keys before overlays join in
    result.context = namespaced_context(&base.name, &result.context);

    for other in overlays {
        if !other.name.is_empty() && !result.source_base_paths.contains_key(&other.name) {
            if let Some(path) = &other.base_path {
                result
                    .source_base_paths
                    .insert(other.name.clone(), path.clone());
            }
        }

        if !other.name.is_empty() {
            result.name = other.name.clone();
        }
        if !other.version.is_empty() {
            result.version = other.version.clone();
        }
        if !other.description.is_empty() {
            result.description = other.description.clone();
        }

        result.session = match (&result.session, &other.session) {
            (Value::Mapping(b), Value::Mapping(o)) => Value::Mapping(deep_merge(b, o)),
            (_, Value::Null) => result.session.clone(),
            (_, overlay) => overlay.clone(),
        };

        result.providers = merge_module_lists(&result.providers, &other.providers);
        result.tools = merge_module_lists(&result.tools, &other.tools);
        result.hooks = merge_module_lists(&result.hooks, &other.hooks);

        for (name, descriptor) in &other.agents {
            let merged = match result.agents.get(name) {
                Some(existing) => merge_descriptor(existing, descriptor),
                None => descriptor.clone(),
            };
            result.agents.insert(name.clone(), merged);
        }

        for (key, path) in namespaced_context(&other.name, &other.context) {
            result.context.insert(key, path);
        }

        if let Some(instruction) = &other.instruction {
            if !instruction.is_empty() {
                result.instruction = Some(instruction.clone());
            }
        }
        // A mention marked required by any composed bundle stays required
        result.mentions_required = result.mentions_required || other.mentions_required;

        if other.base_path.is_some() {
            result.base_path = other.base_path.clone();
        }
    }

    result
}

/// Prefix bare context keys with the contributing bundle's name so several
/// bundles can each contribute a `philosophy` entry without clobbering.
fn namespaced_context(
    name: &str,
    context: &std::collections::BTreeMap<String, std::path::PathBuf>,
) -> std::collections::BTreeMap<String, std::path::PathBuf> {
    context
        .iter()
        .map(|(key, path)| {
            let key = if !name.is_empty() && !key.contains(':') {
                format!("{name}:{key}")
            } else {
                key.clone()
            };
            (key, path.clone())
        })
        .collect()
}

impl Bundle {
    /// Compose this bundle with others (later overrides earlier).
    pub fn compose(&self, others: &[&Bundle]) -> Bundle {
        compose(self, others)
    }
}
