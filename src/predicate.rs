//! The extension seam for dynamic authorization logic.
//!
//! Rules cover what static pattern/role/method/action matching can express;
//! anything needing external context (ownership, feature flags, workflow
//! assignment) goes through a named [`Predicate`] resolved from the
//! [`PredicateRegistry`]. Names are resolved when the rule set is compiled,
//! so a misconfigured rule fails the load instead of becoming a silent
//! bypass at request time.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{PredicateError, ReadError};
use crate::types::{Decision, EvaluationContext};

/// A named boolean check invoked when a rule's static conditions match.
///
/// A predicate may read external state through injected collaborators, but
/// must not mutate anything: it is being asked a yes/no question, nothing
/// more. Returning `Err` counts as deny for the rule under evaluation.
pub trait Predicate: Send + Sync {
    fn check(&self, ctx: &EvaluationContext) -> Result<bool, PredicateError>;
}

impl<F> Predicate for F
where
    F: Fn(&EvaluationContext) -> Result<bool, PredicateError> + Send + Sync,
{
    fn check(&self, ctx: &EvaluationContext) -> Result<bool, PredicateError> {
        self(ctx)
    }
}

/// Registry mapping predicate names to implementations.
///
/// Populated by the embedding application before any rule set referencing
/// the names is compiled.
#[derive(Default, Clone)]
pub struct PredicateRegistry {
    by_name: HashMap<String, Arc<dyn Predicate>>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, predicate: Arc<dyn Predicate>) {
        self.by_name.insert(name.to_string(), predicate);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Predicate>> {
        self.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PredicateRegistry")
            .field("predicates", &names)
            .finish()
    }
}

/// Read access to domain objects, used only from inside predicates.
///
/// The engine itself never calls this; it is injected into the predicates
/// that need it. A missing record is `Ok(None)` / an empty result list,
/// not an error. Implementations own their timeouts; a timeout surfaces
/// as [`ReadError::Timeout`], which the evaluator turns into a deny.
pub trait ResourceReader: Send + Sync {
    fn read(&self, resource_id: &str) -> Result<Option<Value>, ReadError>;

    fn query(&self, resource_id: &str, params: &Value) -> Result<Vec<Value>, ReadError>;
}

/// Observability channel for decisions and predicate failures.
///
/// Fire-and-forget: implementations must not block or fail the decision
/// path. Both methods default to no-ops.
pub trait AuditSink: Send + Sync {
    /// Outcome of one evaluation (called once per evaluated request).
    fn record_decision(&self, _ctx: &EvaluationContext, _decision: &Decision) {}

    /// A predicate's collaborator call failed; the rule at `rule` was
    /// treated as denying and evaluation continued.
    fn record_predicate_failure(
        &self,
        _ctx: &EvaluationContext,
        _rule: usize,
        _predicate: &str,
        _error: &PredicateError,
    ) {
    }
}

/// Audit sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AuditSink for NullSink {}

/// Audit sink that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record_decision(&self, ctx: &EvaluationContext, decision: &Decision) {
        tracing::debug!(
            resource_id = %ctx.resource_id,
            method = ctx.method.as_deref().unwrap_or("-"),
            ?decision,
            "access decision"
        );
    }

    fn record_predicate_failure(
        &self,
        ctx: &EvaluationContext,
        rule: usize,
        predicate: &str,
        error: &PredicateError,
    ) {
        tracing::warn!(
            resource_id = %ctx.resource_id,
            rule,
            predicate,
            %error,
            "predicate failed; treating rule as denying"
        );
    }
}
