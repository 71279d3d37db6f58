//! Mount plan projection
//!
//! The mount plan is the include-free, execution-ready slice of a composed
//! bundle: `session`, `providers`, `tools`, `hooks`, and `agents`. Context
//! entries and mentions are not carried as sections - they are folded into
//! the rendered instruction, which feeds whatever instruction channel the
//! consuming runtime exposes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;
use tracing::warn;

use crate::bundle::Bundle;
use crate::error::Result;
use crate::fsio;
use crate::mentions::{ContentDeduplicator, MentionResolver, format_context_block, load_mentions};

/// Execution-ready configuration handed to the external runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MountPlan {
    pub session: Value,
    pub providers: Vec<Value>,
    pub tools: Vec<Value>,
    pub hooks: Vec<Value>,
    pub agents: BTreeMap<String, Value>,
}

impl MountPlan {
    /// Project a composed bundle. Pure: same bundle, same plan.
    pub fn from_bundle(bundle: &Bundle) -> Self {
        Self {
            session: bundle.session.clone(),
            providers: bundle.providers.clone(),
            tools: bundle.tools.clone(),
            hooks: bundle.hooks.clone(),
            agents: bundle.agents.clone(),
        }
    }

    /// Export as JSON, with empty sections omitted.
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        let mut map = serde_json::Map::new();
        if self.session.is_mapping() {
            map.insert("session".to_string(), serde_json::to_value(&self.session)?);
        }
        if !self.providers.is_empty() {
            map.insert(
                "providers".to_string(),
                serde_json::to_value(&self.providers)?,
            );
        }
        if !self.tools.is_empty() {
            map.insert("tools".to_string(), serde_json::to_value(&self.tools)?);
        }
        if !self.hooks.is_empty() {
            map.insert("hooks".to_string(), serde_json::to_value(&self.hooks)?);
        }
        if !self.agents.is_empty() {
            map.insert("agents".to_string(), serde_json::to_value(&self.agents)?);
        }
        Ok(serde_json::Value::Object(map))
    }
}

/// Render the instruction channel for a composed bundle: the instruction
/// body, the accumulated context files, and the content pulled in by
/// mentions, deduplicated and prepended as an attributed context block.
///
/// Missing context files are skipped with a warning (the validator already
/// reports them); mention failures follow the bundle's `mentions_required`
/// flag. Returns `None` when the bundle carries no instruction or context.
pub async fn render_instruction(bundle: &Bundle) -> Result<Option<String>> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(instruction) = &bundle.instruction {
        if !instruction.is_empty() {
            parts.push(instruction.clone());
        }
    }

    for (name, path) in &bundle.context {
        if !path.exists() {
            warn!(context = %name, path = %path.display(), "context file missing, skipping");
            continue;
        }
        let content = fsio::read_with_retry(path).await?;
        parts.push(format!("# Context: {name}\n\n{content}"));
    }

    if parts.is_empty() {
        return Ok(None);
    }
    let combined = parts.join("\n\n---\n\n");

    let resolver = MentionResolver::from_bundle(bundle);
    let mut deduplicator = ContentDeduplicator::new();
    load_mentions(
        &combined,
        &resolver,
        &mut deduplicator,
        bundle.mentions_required,
    )
    .await?;

    let block = format_context_block(deduplicator.unique_files());
    if block.is_empty() {
        Ok(Some(combined))
    } else {
        Ok(Some(format!("{block}\n\n---\n\n{combined}")))
    }
}
