//! routegate - request-time authorization evaluator
//!
//! Given an incoming operation (resource id, method, optional action, caller
//! role set), routegate decides whether it is permitted by matching it against
//! an ordered list of declarative access rules. Evaluation is first-match-wins
//! over a whitelist: rules are independent permission grants, and the default
//! outcome is deny.
//!
//! Rules that need context a static rule cannot express (ownership, feature
//! flags, workflow assignment) name a predicate in a [`PredicateRegistry`];
//! predicate names are resolved when the rule set is compiled, so a bad
//! reference fails the load rather than a request.
//!
//! ```
//! use std::sync::Arc;
//! use routegate::{
//!     compile_rules, evaluate, EvaluationContext, PredicateRegistry, RuleDef,
//!     NullSink,
//! };
//!
//! let defs = vec![
//!     RuleDef {
//!         pattern: "info/*".into(),
//!         roles: "*".into(),
//!         methods: "read".into(),
//!         actions: "*".into(),
//!         check: None,
//!     },
//! ];
//! let rules = compile_rules(defs, &PredicateRegistry::new()).unwrap();
//!
//! let ctx = EvaluationContext::new("info/ping", Default::default(), Some("read"));
//! assert!(evaluate(&rules, &ctx, &NullSink).is_allowed());
//! ```
//!
//! The rule set is immutable after compilation and safe for concurrent reads;
//! hosts reload by compiling a new `RuleSet` and swapping an `Arc<RuleSet>`,
//! never by mutating in place.

pub mod engine;
pub mod errors;
pub mod facade;
pub mod loader;
pub mod policy;
pub mod predicate;
pub mod predicates;
pub mod types;

pub use engine::evaluate;
pub use errors::{ConfigError, PredicateError, ReadError};
pub use facade::{authorize, AccessRequest, Origin};
pub use loader::{compile_rules, load_rules};
pub use policy::parse_rule_document;
pub use predicate::{
    AuditSink, NullSink, Predicate, PredicateRegistry, ResourceReader, TracingSink,
};
pub use types::{
    AllowSet, Decision, DenyReason, EvaluationContext, ResourcePattern, RuleDef, SecurityContext,
};

use std::sync::Arc;

/// One compiled authorization clause: parsed pattern and value sets, plus
/// the resolved predicate if the rule names one.
pub struct CompiledRule {
    pub pattern: ResourcePattern,
    pub roles: AllowSet,
    pub methods: AllowSet,
    pub actions: AllowSet,
    pub check: Option<NamedPredicate>,
}

/// A predicate together with the name it was registered under, kept for
/// audit output.
#[derive(Clone)]
pub struct NamedPredicate {
    pub name: String,
    pub predicate: Arc<dyn Predicate>,
}

impl std::fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRule")
            .field("pattern", &self.pattern)
            .field("roles", &self.roles)
            .field("methods", &self.methods)
            .field("actions", &self.actions)
            .field("check", &self.check.as_ref().map(|c| c.name.as_str()))
            .finish()
    }
}

/// An ordered, immutable rule set, compiled once at configuration load and
/// shared read-only across evaluations.
///
/// Order is a first-class part of the configuration contract: evaluation is
/// first-match-wins, so specific or high-priority rules must precede broad
/// catch-alls.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub(crate) fn new(rules: Vec<CompiledRule>) -> Self {
        RuleSet { rules }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
