//! Bundle validation
//!
//! Structural checks over a composed bundle, separating blocking errors from
//! recoverable warnings. `validate_completeness` adds the stricter rules for
//! bundles intended for direct execution; partial/composable bundles are
//! only ever held to the structural rules.

use serde_yaml::Value;

use crate::bundle::Bundle;
use crate::error::{MountplanError, Result};
use crate::frontmatter::value_kind;

/// Result of a validation pass. Built fresh per call.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.valid = false;
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Structural validation: required fields, module list shape, session shape,
/// agent entries. Context files that do not exist on disk are warnings.
pub fn validate(bundle: &Bundle) -> ValidationResult {
    let mut result = ValidationResult::new();

    if bundle.name.is_empty() {
        result.add_error("bundle must have a name");
    }

    for (list_name, modules) in [
        ("providers", &bundle.providers),
        ("tools", &bundle.tools),
        ("hooks", &bundle.hooks),
    ] {
        for (index, entry) in modules.iter().enumerate() {
            validate_module_entry(list_name, index, entry, &mut result);
        }
    }

    if !bundle.session.is_null() && !bundle.session.is_mapping() {
        result.add_error(format!(
            "session: must be a map, got {}",
            value_kind(&bundle.session)
        ));
    }

    for (name, agent) in &bundle.agents {
        if !agent.is_mapping() {
            result.add_error(format!(
                "agents.{name}: must be a map, got {}",
                value_kind(agent)
            ));
        }
    }

    for (name, path) in &bundle.context {
        if !path.exists() {
            result.add_warning(format!(
                "context.{name}: path does not exist: {}",
                path.display()
            ));
        }
    }

    result
}

fn validate_module_entry(
    list_name: &str,
    index: usize,
    entry: &Value,
    result: &mut ValidationResult,
) {
    let Some(mapping) = entry.as_mapping() else {
        result.add_error(format!(
            "{list_name}[{index}]: must be a map, got {}",
            value_kind(entry)
        ));
        return;
    };

    if mapping.get("module").is_none() {
        result.add_error(format!(
            "{list_name}[{index}]: missing required 'module' field"
        ));
    }

    if let Some(config) = mapping.get("config") {
        if !config.is_mapping() {
            result.add_error(format!(
                "{list_name}[{index}]: 'config' must be a map, got {}",
                value_kind(config)
            ));
        }
    }
}

/// Completeness validation for bundles intended for direct execution:
/// structural rules plus a session with both an execution-strategy selector
/// and a context-manager selector, and at least one provider.
pub fn validate_completeness(bundle: &Bundle) -> ValidationResult {
    let mut result = validate(bundle);

    match bundle.session.as_mapping() {
        None => result.add_error("session: required for executable bundles"),
        Some(session) => {
            if session.get("orchestrator").is_none() {
                result.add_error("session.orchestrator: required for executable bundles");
            }
            if session.get("context").is_none() {
                result.add_error("session.context: required for executable bundles");
            }
        }
    }

    if bundle.providers.is_empty() {
        result.add_error("providers: at least one provider is required for executable bundles");
    }

    result
}

/// Validate and raise `BundleValidation` on errors, for callers that opt
/// into raise-on-error behavior. Warnings never raise.
pub fn validate_or_raise(bundle: &Bundle) -> Result<()> {
    let result = validate(bundle);
    if result.valid {
        Ok(())
    } else {
        Err(MountplanError::BundleValidation {
            message: result.errors.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_bundle() -> Bundle {
        Bundle {
            name: "demo".to_string(),
            ..Bundle::default()
        }
    }

    fn modules(yaml: &str) -> Vec<Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_minimal_bundle() {
        let result = validate(&named_bundle());
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_missing_name_is_error() {
        let result = validate(&Bundle::default());
        assert!(!result.valid);
        assert!(result.errors[0].contains("name"));
    }

    #[test]
    fn test_missing_module_field_identifies_position() {
        let mut bundle = named_bundle();
        bundle.tools = modules("[{module: fs}, {config: {}}]");
        let result = validate(&bundle);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("tools[1]"));
        assert!(result.errors[0].contains("'module'"));
    }

    #[test]
    fn test_non_map_entry_is_error() {
        let mut bundle = named_bundle();
        bundle.providers = modules("[just-a-string]");
        let result = validate(&bundle);
        assert!(result.errors[0].contains("providers[0]"));
        assert!(result.errors[0].contains("must be a map"));
    }

    #[test]
    fn test_scalar_config_is_error() {
        let mut bundle = named_bundle();
        bundle.hooks = modules("[{module: logger, config: [a, b]}]");
        let result = validate(&bundle);
        assert!(result.errors[0].contains("hooks[0]"));
        assert!(result.errors[0].contains("'config' must be a map"));
    }

    #[test]
    fn test_non_map_session_is_error() {
        let mut bundle = named_bundle();
        bundle.session = Value::from("loop");
        let result = validate(&bundle);
        assert!(result.errors[0].contains("session"));
    }

    #[test]
    fn test_non_map_agent_is_error() {
        let mut bundle = named_bundle();
        bundle
            .agents
            .insert("broken".to_string(), Value::from("nope"));
        let result = validate(&bundle);
        assert!(result.errors[0].contains("agents.broken"));
    }

    #[test]
    fn test_missing_context_file_is_warning_only() {
        let mut bundle = named_bundle();
        bundle
            .context
            .insert("ghost".to_string(), "/no/such/file.md".into());
        let result = validate(&bundle);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("context.ghost"));
    }

    #[test]
    fn test_completeness_requires_session_selectors() {
        let mut bundle = named_bundle();
        bundle.providers = modules("[{module: provider-anthropic}]");
        bundle.session = Value::Mapping(serde_yaml::from_str("orchestrator: loop").unwrap());

        // Structurally fine, not complete: context selector missing
        assert!(validate(&bundle).valid);
        let result = validate_completeness(&bundle);
        assert!(!result.valid);
        assert!(result.errors[0].contains("session.context"));
    }

    #[test]
    fn test_completeness_requires_a_provider() {
        let mut bundle = named_bundle();
        bundle.session =
            Value::Mapping(serde_yaml::from_str("orchestrator: loop\ncontext: sliding").unwrap());
        let result = validate_completeness(&bundle);
        assert!(!result.valid);
        assert!(result.errors[0].contains("providers"));
    }

    #[test]
    fn test_complete_bundle_passes() {
        let mut bundle = named_bundle();
        bundle.providers = modules("[{module: provider-anthropic}]");
        bundle.session =
            Value::Mapping(serde_yaml::from_str("orchestrator: loop\ncontext: sliding").unwrap());
        assert!(validate_completeness(&bundle).valid);
    }

    #[test]
    fn test_validate_or_raise() {
        assert!(validate_or_raise(&named_bundle()).is_ok());
        let err = validate_or_raise(&Bundle::default()).unwrap_err();
        assert!(matches!(err, MountplanError::BundleValidation { .. }));
    }
}
