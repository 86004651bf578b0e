use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while loading or compiling a rule set.
///
/// Any of these aborts the load; a rule set is never partially applied.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to load rule file `{path}`")]
    #[diagnostic(
        code(routegate::rule_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    RuleLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule: {0}")]
    #[diagnostic(
        code(routegate::invalid_rule),
        help("Each rule needs a non-empty pattern plus `roles`, `methods` and `actions` values (\"*\", \"\" or a comma-separated list)")
    )]
    InvalidRule(String),

    #[error("Rule {rule} references unknown predicate `{name}`")]
    #[diagnostic(
        code(routegate::unknown_predicate),
        help("Register the predicate in the PredicateRegistry before compiling the rule set")
    )]
    UnknownPredicate { rule: usize, name: String },

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(routegate::kdl_parse),
        help("Check your KDL file syntax against https://kdl.dev")
    )]
    KdlParse(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(routegate::io))]
    Io(#[from] std::io::Error),
}

/// Failure of a collaborator call made from inside a custom predicate.
///
/// A missing record is not an error: `ResourceReader::read` reports it as
/// `Ok(None)`. These variants cover the backend actually failing.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("timed out")]
    Timeout,
}

/// A custom predicate could not produce a yes/no answer.
///
/// The evaluator treats this as "this rule denies" and keeps evaluating
/// later rules; the failure itself goes to the audit sink, never to the
/// caller of `authorize`.
#[derive(Debug, Error)]
pub enum PredicateError {
    #[error("collaborator call failed: {0}")]
    Read(#[from] ReadError),

    #[error("{0}")]
    Other(String),
}
