//! Parse bundle definition files: YAML frontmatter header plus markdown body.
//!
//! A `bundle.md` carries its structured header between the first `---` pair;
//! everything after the closing delimiter is the instruction body. A file
//! without a frontmatter block is all body with an empty header.

use serde_yaml::{Mapping, Value};

use crate::error::{MountplanError, Result};

/// Split content into the header mapping and the body text.
///
/// Fails with `BundleLoad` when a frontmatter block is present but is not
/// valid YAML or not a mapping.
pub fn parse_frontmatter(content: &str) -> Result<(Mapping, String)> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.first().map(|l| l.trim()) != Some("---") {
        return Ok((Mapping::new(), content.to_string()));
    }

    let Some(end) = lines[1..].iter().position(|l| l.trim() == "---") else {
        return Err(MountplanError::bundle_load(
            "unterminated frontmatter block (missing closing '---')",
        ));
    };
    let end = end + 1;

    let header_str = lines[1..end].join("\n");
    let body = lines[end + 1..].join("\n");

    let header: Value = serde_yaml::from_str(&header_str)?;
    let mapping = match header {
        Value::Null => Mapping::new(),
        Value::Mapping(m) => m,
        other => {
            return Err(MountplanError::bundle_load(format!(
                "frontmatter must be a mapping, got {}",
                value_kind(&other)
            )));
        }
    };

    Ok((mapping, body))
}

/// Human-readable kind name for a YAML value, used in error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_and_body() {
        let content = "---\nbundle:\n  name: demo\n---\nThe instruction body.\n";
        let (header, body) = parse_frontmatter(content).unwrap();
        assert!(header.contains_key(Value::String("bundle".into())));
        assert_eq!(body.trim(), "The instruction body.");
    }

    #[test]
    fn test_no_frontmatter_is_all_body() {
        let (header, body) = parse_frontmatter("just instructions\n").unwrap();
        assert!(header.is_empty());
        assert_eq!(body.trim(), "just instructions");
    }

    #[test]
    fn test_empty_frontmatter_block() {
        let (header, body) = parse_frontmatter("---\n---\nbody\n").unwrap();
        assert!(header.is_empty());
        assert_eq!(body.trim(), "body");
    }

    #[test]
    fn test_unterminated_frontmatter_fails() {
        assert!(parse_frontmatter("---\nbundle:\n  name: demo\n").is_err());
    }

    #[test]
    fn test_non_mapping_frontmatter_fails() {
        let err = parse_frontmatter("---\n- a\n- b\n---\nbody\n").unwrap_err();
        assert!(err.to_string().contains("mapping"));
    }
}
