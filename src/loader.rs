//! Loading and compiling rule sets.
//!
//! Compilation is where configuration errors surface: malformed patterns,
//! empty role lists and unknown predicate names all fail here, before any
//! request is evaluated. A failed load applies nothing; the caller keeps
//! whatever rule set it had and decides whether to abort startup or stay on
//! the last known good configuration.

use std::path::Path;

use crate::errors::ConfigError;
use crate::policy::parse_rule_document;
use crate::predicate::PredicateRegistry;
use crate::types::{AllowSet, ResourcePattern, RuleDef};
use crate::{CompiledRule, NamedPredicate, RuleSet};

/// Load all `.kdl` rule files from the given directory (in sorted filename
/// order) and compile them into a single immutable `RuleSet`.
pub fn load_rules(dir: &Path, registry: &PredicateRegistry) -> Result<RuleSet, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::InvalidRule(format!(
            "rules directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    let mut defs = Vec::new();
    let mut file_count = 0;

    for entry in entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| ConfigError::RuleLoad {
                path: path.display().to_string(),
                source,
            })?;
        defs.extend(parse_rule_document(&contents)?);
        file_count += 1;
    }

    let rules = compile_rules(defs, registry)?;

    tracing::info!(
        files = file_count,
        rules = rules.len(),
        "Loaded access rules"
    );

    Ok(rules)
}

/// Compile ordered rule definitions into a `RuleSet`, resolving predicate
/// names against `registry`.
///
/// Validation is all-or-nothing: the first bad rule aborts the whole
/// compile, so a rule set can never be partially applied.
pub fn compile_rules(
    defs: Vec<RuleDef>,
    registry: &PredicateRegistry,
) -> Result<RuleSet, ConfigError> {
    let mut rules = Vec::with_capacity(defs.len());

    for (index, def) in defs.into_iter().enumerate() {
        if def.pattern.is_empty() {
            return Err(ConfigError::InvalidRule(format!(
                "rule {index}: pattern must not be empty"
            )));
        }

        let roles = AllowSet::parse(&def.roles);
        if roles.is_empty() {
            return Err(ConfigError::InvalidRule(format!(
                "rule {index} (`{}`): roles must be \"*\" or a non-empty list",
                def.pattern
            )));
        }

        // Predicate names resolve now, not at first use: a misconfigured
        // rule must fail the load, never silently no-op at request time.
        let check = match def.check {
            None => None,
            Some(name) => {
                let predicate = registry.resolve(&name).ok_or_else(|| {
                    ConfigError::UnknownPredicate {
                        rule: index,
                        name: name.clone(),
                    }
                })?;
                Some(NamedPredicate { name, predicate })
            }
        };

        rules.push(CompiledRule {
            pattern: ResourcePattern::parse(&def.pattern),
            roles,
            methods: AllowSet::parse(&def.methods),
            actions: AllowSet::parse(&def.actions),
            check,
        });
    }

    Ok(RuleSet::new(rules))
}
