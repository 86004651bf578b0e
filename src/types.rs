use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pattern matched against an incoming request's resource identifier.
///
/// Three forms: the universal wildcard `*`, an exact identifier, or a
/// prefix pattern ending in `/*`. Comparison is a literal, case-sensitive
/// string check, with no path normalization, no traversal resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePattern {
    /// `*` matches every resource id, including the empty string.
    Any,
    /// An exact resource id.
    Exact(String),
    /// A pattern that ended in `/*`; stores the prefix with its trailing `/`.
    /// Matches ids equal to the prefix or starting with it. Note `managed/*`
    /// matches `managed/user` but not `managed`.
    Prefix(String),
}

impl ResourcePattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            ResourcePattern::Any
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            ResourcePattern::Prefix(format!("{prefix}/"))
        } else {
            ResourcePattern::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, resource_id: &str) -> bool {
        match self {
            ResourcePattern::Any => true,
            ResourcePattern::Exact(id) => resource_id == id,
            ResourcePattern::Prefix(prefix) => resource_id.starts_with(prefix.as_str()),
        }
    }
}

impl std::fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourcePattern::Any => write!(f, "*"),
            ResourcePattern::Exact(id) => write!(f, "{id}"),
            ResourcePattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// An allowed-value set for one rule dimension (roles, methods or actions).
///
/// Parsed from the configuration's comma-separated form. `*` means any
/// value; an empty string means the empty set, which matches nothing;
/// this is how a rule expresses "no methods/actions permitted here".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowSet {
    /// `*` means any value passes.
    Any,
    /// Explicit members; may be empty (deny-by-omission).
    Values(HashSet<String>),
}

impl AllowSet {
    pub fn parse(source: &str) -> Self {
        if source == "*" {
            return AllowSet::Any;
        }
        let values = source
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        AllowSet::Values(values)
    }

    /// Exact membership check for a single value.
    pub fn permits(&self, value: &str) -> bool {
        match self {
            AllowSet::Any => true,
            AllowSet::Values(values) => values.contains(value),
        }
    }

    /// True if any of the caller's roles is allowed (logical OR across roles).
    pub fn intersects(&self, roles: &HashSet<String>) -> bool {
        match self {
            AllowSet::Any => true,
            AllowSet::Values(values) => roles.iter().any(|r| values.contains(r)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AllowSet::Any => false,
            AllowSet::Values(values) => values.is_empty(),
        }
    }
}

/// One authorization clause as it appears in configuration.
///
/// `roles`, `methods` and `actions` are comma-separated lists, `*` for any
/// value, or `""` for none. `check` optionally names a predicate in the
/// registry for authorization logic beyond static matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub pattern: String,
    pub roles: String,
    pub methods: String,
    pub actions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
}

/// Identity attributes of an authenticated caller, as resolved by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub user_id: String,
    pub username: String,
    /// Already-resolved role names; the engine does no identity resolution.
    pub roles: HashSet<String>,
}

/// Per-request input to rule evaluation. Immutable once constructed;
/// carries no cross-request state.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Identifier of the target resource, e.g. `managed/user/bd12`.
    pub resource_id: String,
    /// The caller's roles; empty for an unauthenticated caller.
    pub roles: HashSet<String>,
    /// Request method (read/create/update/delete/action/query/patch);
    /// `None` when no method applies, which auto-satisfies that dimension.
    pub method: Option<String>,
    /// Action parameter; empty when the request carries none, which
    /// auto-satisfies that dimension.
    pub action: String,
    /// Request parameters. Only predicates look at these.
    pub params: Value,
    /// Request body/value. Only predicates look at this.
    pub value: Value,
    /// Security attributes for predicates that compare against the caller.
    pub security: Option<SecurityContext>,
}

impl EvaluationContext {
    /// Minimal context: everything beyond id/roles/method left empty.
    pub fn new(resource_id: &str, roles: HashSet<String>, method: Option<&str>) -> Self {
        EvaluationContext {
            resource_id: resource_id.to_string(),
            roles,
            method: method.map(str::to_string),
            action: String::new(),
            params: Value::Null,
            value: Value::Null,
            security: None,
        }
    }
}

/// Why an evaluation denied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No rule in the set granted the request. This is the normal deny
    /// outcome, distinct from a matched-but-predicate-denied rule only in
    /// the audit channel.
    NoMatchingRule,
}

/// Outcome of an authorization check.
///
/// Rule identity is carried for the audit channel; hosts should surface
/// only a generic denial to callers, never which rule or predicate denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Granted by the rule at this index in the rule set.
    AllowedBy { rule: usize },
    /// Granted without consulting rules: the request did not cross the
    /// guarded boundary (internal origin or no security context).
    AllowedTrusted,
    /// No rule granted the request.
    Denied { reason: DenyReason },
}

impl Decision {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied { .. })
    }
}
