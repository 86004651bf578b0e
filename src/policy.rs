//! KDL parsing for rule documents.
//!
//! A rule document is a flat list of `rule` nodes; order in the document is
//! the evaluation order:
//!
//! ```kdl
//! rule "info/*" roles="*" methods="read" actions="*"
//! rule "managed/user/*" roles="registration" methods="create" actions="*" check="self-registration-enabled"
//! rule "*" roles="cert" methods="" actions=""
//! ```

use kdl::KdlDocument;

use crate::errors::ConfigError;
use crate::types::RuleDef;

/// Parse a KDL document string into rule definitions, preserving order.
pub fn parse_rule_document(source: &str) -> Result<Vec<RuleDef>, ConfigError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| ConfigError::KdlParse(e.to_string()))?;

    let mut defs = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "rule" => {
                let pattern = first_string_arg(node).ok_or_else(|| {
                    ConfigError::InvalidRule(
                        "rule node requires a pattern argument (e.g. rule \"info/*\")".into(),
                    )
                })?;

                if node.children().is_some() {
                    return Err(ConfigError::InvalidRule(format!(
                        "rule `{pattern}` must not have children (use roles=/methods=/actions=/check= properties)"
                    )));
                }
                for entry in node.entries() {
                    if let Some(name) = entry.name() {
                        match name.value() {
                            "roles" | "methods" | "actions" | "check" => {}
                            other => {
                                return Err(ConfigError::InvalidRule(format!(
                                    "unexpected property `{other}` on rule `{pattern}`"
                                )));
                            }
                        }
                    }
                }

                let roles = required_property(node, "roles", &pattern)?;
                let methods = required_property(node, "methods", &pattern)?;
                let actions = required_property(node, "actions", &pattern)?;
                let check = node
                    .get("check")
                    .map(|e| e.value())
                    .and_then(|v| v.as_string())
                    .map(str::to_string);

                defs.push(RuleDef {
                    pattern,
                    roles,
                    methods,
                    actions,
                    check,
                });
            }
            other => {
                // Ignore comments and unknown top-level nodes with a warning
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(defs)
}

fn required_property(node: &kdl::KdlNode, key: &str, pattern: &str) -> Result<String, ConfigError> {
    node.get(key)
        .map(|e| e.value())
        .and_then(|v| v.as_string())
        .map(str::to_string)
        .ok_or_else(|| {
            ConfigError::InvalidRule(format!(
                "rule `{pattern}` missing `{key}` property (use \"*\", \"\" or a comma-separated list)"
            ))
        })
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &kdl::KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_rule() {
        let defs = parse_rule_document(
            r#"rule "info/*" roles="registration,authorized" methods="read" actions="*""#,
        )
        .unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].pattern, "info/*");
        assert_eq!(defs[0].roles, "registration,authorized");
        assert_eq!(defs[0].methods, "read");
        assert_eq!(defs[0].actions, "*");
        assert!(defs[0].check.is_none());
    }

    #[test]
    fn test_parse_rule_with_check() {
        let defs = parse_rule_document(
            r#"rule "workflow/taskinstance/*" roles="authorized" methods="action" actions="complete" check="is-my-task""#,
        )
        .unwrap();
        assert_eq!(defs[0].check.as_deref(), Some("is-my-task"));
    }

    #[test]
    fn test_parse_preserves_document_order() {
        let defs = parse_rule_document(
            r#"
rule "info/*" roles="*" methods="read" actions="*"
rule "*" roles="admin" methods="*" actions="*"
rule "*" roles="cert" methods="" actions=""
"#,
        )
        .unwrap();
        let patterns: Vec<&str> = defs.iter().map(|d| d.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["info/*", "*", "*"]);
        assert_eq!(defs[2].methods, "");
    }

    #[test]
    fn test_parse_missing_pattern() {
        let err = parse_rule_document(r#"rule roles="*" methods="*" actions="*""#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule(_)));
    }

    #[test]
    fn test_parse_missing_roles() {
        let err = parse_rule_document(r#"rule "info/*" methods="read" actions="*""#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule(_)));
    }

    #[test]
    fn test_parse_missing_methods() {
        let err = parse_rule_document(r#"rule "info/*" roles="*" actions="*""#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule(_)));
    }

    #[test]
    fn test_parse_non_string_property_value() {
        // roles=1 is a valid KDL entry but not a string value.
        let err = parse_rule_document(r#"rule "info/*" roles=1 methods="read" actions="*""#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule(_)));
    }

    #[test]
    fn test_parse_unexpected_property() {
        let err = parse_rule_document(
            r#"rule "info/*" roles="*" methods="read" actions="*" priority="1""#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule(_)));
    }

    #[test]
    fn test_parse_rejects_children() {
        let err = parse_rule_document(
            r#"
rule "info/*" roles="*" methods="read" actions="*" {
    note "nope"
}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule(_)));
    }

    #[test]
    fn test_parse_unknown_node_is_ignored() {
        let defs = parse_rule_document(
            r#"
version "1"
rule "info/*" roles="*" methods="read" actions="*"
"#,
        )
        .unwrap();
        assert_eq!(defs.len(), 1);
    }

    #[test]
    fn test_parse_invalid_kdl() {
        let err = parse_rule_document(r#"rule "unterminated"#).unwrap_err();
        assert!(matches!(err, ConfigError::KdlParse(_)));
    }
}
