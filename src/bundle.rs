//! Bundle data model - the core composable unit.
//!
//! A bundle carries the mount-plan sections (session, providers, tools, hooks,
//! agents), its resources (context files, instruction text), and the loader
//! bookkeeping used for mention resolution (base path, namespace map). Bundles
//! are never mutated after construction: composition builds new values.
//!
//! Nested configuration stays in `serde_yaml::Value` / `Mapping` so the
//! validator can inspect malformed sections instead of losing them at parse
//! time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{MountplanError, Result};
use crate::frontmatter::value_kind;

/// Composable unit of agent-runtime configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    /// Bundle name (namespace for mentions)
    pub name: String,
    /// Bundle version string
    pub version: String,
    /// Optional description
    pub description: String,
    /// References to bundles merged in before this one, in declared order
    pub includes: Vec<String>,

    /// Session config (orchestrator, context manager); Null when absent
    pub session: Value,
    /// Provider module descriptors
    pub providers: Vec<Value>,
    /// Tool module descriptors
    pub tools: Vec<Value>,
    /// Hook module descriptors
    pub hooks: Vec<Value>,

    /// Agent name -> agent descriptor
    pub agents: BTreeMap<String, Value>,
    /// Context name -> file path
    pub context: BTreeMap<String, PathBuf>,
    /// System instruction from the definition body
    pub instruction: Option<String>,
    /// When set, unresolvable mentions in this bundle's instruction are
    /// load errors instead of warnings
    pub mentions_required: bool,

    /// Directory the bundle was loaded from
    pub base_path: Option<PathBuf>,
    /// Namespace -> base path for every bundle merged in, consumed by the
    /// mention resolver
    pub source_base_paths: BTreeMap<String, PathBuf>,
}

impl Bundle {
    /// Build a bundle from a parsed definition header.
    ///
    /// The instruction body is attached separately by the loader.
    pub fn from_header(header: &Mapping, base_path: Option<&Path>) -> Result<Self> {
        let meta = header
            .get(Value::from("bundle"))
            .and_then(Value::as_mapping);

        let name = meta
            .and_then(|m| m.get(Value::from("name")))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let version = meta
            .and_then(|m| m.get(Value::from("version")))
            .map(scalar_to_string)
            .unwrap_or_else(|| "1.0.0".to_string());
        let description = meta
            .and_then(|m| m.get(Value::from("description")))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Bundle {
            name,
            version,
            description,
            includes: parse_includes(header.get(Value::from("includes"))),
            session: header
                .get(Value::from("session"))
                .cloned()
                .unwrap_or(Value::Null),
            providers: parse_module_list(header.get(Value::from("providers"))),
            tools: parse_module_list(header.get(Value::from("tools"))),
            hooks: parse_module_list(header.get(Value::from("hooks"))),
            agents: parse_agents(header.get(Value::from("agents")))?,
            context: parse_context(header.get(Value::from("context")), base_path)?,
            instruction: None,
            mentions_required: parse_mentions_flag(header.get(Value::from("mentions"))),
            base_path: base_path.map(Path::to_path_buf),
            source_base_paths: BTreeMap::new(),
        })
    }

    /// Resolve a context file by name: the registered context map first, then
    /// the conventional `context/` directory under the bundle root.
    pub fn resolve_context_path(&self, name: &str) -> Option<PathBuf> {
        if let Some(path) = self.context.get(name) {
            return Some(path.clone());
        }
        let base = self.base_path.as_deref()?;
        let path = construct_context_path(base, name);
        path.exists().then_some(path)
    }
}

/// Path to a context file under the bundle root: `<base>/context/<name>[.md]`.
pub fn construct_context_path(base: &Path, name: &str) -> PathBuf {
    if name.ends_with(".md") {
        base.join("context").join(name)
    } else {
        base.join("context").join(format!("{name}.md"))
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Includes may be plain reference strings or `{bundle: "<ref>"}` maps.
fn parse_includes(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Sequence(items)) = value else {
        return Vec::new();
    };

    let mut includes = Vec::new();
    for item in items {
        match item {
            Value::String(s) => includes.push(s.clone()),
            Value::Mapping(m) => {
                if let Some(Value::String(s)) = m.get(Value::from("bundle")) {
                    includes.push(s.clone());
                } else {
                    debug!("skipping include without a 'bundle' key: {item:?}");
                }
            }
            other => debug!("skipping malformed include entry: {other:?}"),
        }
    }
    includes
}

/// Module lists stay as raw values so the validator can report malformed
/// entries with their position.
fn parse_module_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Sequence(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Agents: a map of name -> descriptor, plus an optional `include:` list of
/// names that expands to minimal `{name: <name>}` descriptors.
fn parse_agents(value: Option<&Value>) -> Result<BTreeMap<String, Value>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(v) => v,
    };
    let Some(mapping) = value.as_mapping() else {
        return Err(MountplanError::bundle_load(format!(
            "'agents' must be a mapping, got {}",
            value_kind(value)
        )));
    };

    let mut agents = BTreeMap::new();
    if let Some(Value::Sequence(names)) = mapping.get(Value::from("include")) {
        for name in names.iter().filter_map(Value::as_str) {
            let mut descriptor = Mapping::new();
            descriptor.insert(Value::from("name"), Value::from(name));
            agents.insert(name.to_string(), Value::Mapping(descriptor));
        }
    }
    for (key, entry) in mapping {
        let Some(key) = key.as_str() else { continue };
        if key != "include" {
            agents.insert(key.to_string(), entry.clone());
        }
    }
    Ok(agents)
}

/// Context: a map of name -> file reference, plus an optional `include:` list
/// resolved against the bundle's `context/` directory. Names in the include
/// list may carry a `namespace:` prefix which is stripped for the path part.
fn parse_context(
    value: Option<&Value>,
    base_path: Option<&Path>,
) -> Result<BTreeMap<String, PathBuf>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(v) => v,
    };
    let Some(mapping) = value.as_mapping() else {
        return Err(MountplanError::bundle_load(format!(
            "'context' must be a mapping, got {}",
            value_kind(value)
        )));
    };

    let mut context = BTreeMap::new();
    if let Some(Value::Sequence(names)) = mapping.get(Value::from("include")) {
        if let Some(base) = base_path {
            for name in names.iter().filter_map(Value::as_str) {
                let path_part = name.split_once(':').map_or(name, |(_, rest)| rest);
                context.insert(name.to_string(), construct_context_path(base, path_part));
            }
        }
    }
    for (key, entry) in mapping {
        let Some(key) = key.as_str() else { continue };
        if key == "include" {
            continue;
        }
        if let Some(rel) = entry.as_str() {
            let path = match base_path {
                Some(base) => base.join(rel),
                None => PathBuf::from(rel),
            };
            context.insert(key.to_string(), path);
        }
    }
    Ok(context)
}

/// `mentions: required` (or `mentions: {required: true}`) marks the bundle's
/// own mentions as hard dependencies.
fn parse_mentions_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => s == "required",
        Some(Value::Mapping(m)) => m
            .get(Value::from("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        _ => false,
    }
}
