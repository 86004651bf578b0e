//! Entry point consumed by the host request pipeline.
//!
//! The façade decides whether a request crosses the guarded boundary at
//! all, builds the evaluation context, and delegates to the engine. It only
//! renders the decision; rejecting the operation (status codes, error
//! bodies) stays with the host, which keeps the engine transport-agnostic.

use serde_json::Value;

use crate::engine::evaluate;
use crate::predicate::AuditSink;
use crate::types::{Decision, EvaluationContext, SecurityContext};
use crate::RuleSet;

/// Where a request entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Came through the network-facing boundary this engine guards.
    External,
    /// System-originated (scheduler, internal service call). Trusted by
    /// construction; rules are not consulted.
    Internal,
}

/// An incoming operation as seen by the host pipeline.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub resource_id: String,
    /// `None` when no method applies to this request.
    pub method: Option<String>,
    /// Request parameters; the action, if any, rides in `params["_action"]`.
    pub params: Value,
    /// Request body/value, available to predicates.
    pub value: Value,
    pub origin: Origin,
    /// `None` means no identifiable caller; such requests are trusted.
    pub security: Option<SecurityContext>,
}

impl AccessRequest {
    pub fn new(resource_id: &str, method: Option<&str>) -> Self {
        AccessRequest {
            resource_id: resource_id.to_string(),
            method: method.map(str::to_string),
            params: Value::Null,
            value: Value::Null,
            origin: Origin::External,
            security: None,
        }
    }
}

/// Decide whether `request` is permitted under `rules`.
///
/// Requests of internal origin, or without a security context, bypass rule
/// evaluation entirely and are allowed. Everything else is evaluated
/// first-match-wins; see [`evaluate`](crate::engine::evaluate).
pub fn authorize(rules: &RuleSet, request: &AccessRequest, audit: &dyn AuditSink) -> Decision {
    let security = match (&request.origin, &request.security) {
        (Origin::External, Some(security)) => security,
        _ => {
            tracing::debug!(
                resource_id = %request.resource_id,
                "request did not cross the guarded boundary, allowing"
            );
            return Decision::AllowedTrusted;
        }
    };

    let ctx = EvaluationContext {
        resource_id: request.resource_id.clone(),
        roles: security.roles.clone(),
        method: request.method.clone(),
        action: action_param(&request.params),
        params: request.params.clone(),
        value: request.value.clone(),
        security: Some(security.clone()),
    };

    tracing::debug!(resource_id = %ctx.resource_id, "access check for external request");
    evaluate(rules, &ctx, audit)
}

/// Action parameter, or empty when the request carries none.
///
/// A present but non-string action is rendered to its JSON form so it goes
/// through set membership as a concrete value; mapping it to the absent
/// sentinel would auto-satisfy action-constrained rules.
fn action_param(params: &Value) -> String {
    match params.get("_action") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(action)) => action.clone(),
        Some(other) => other.to_string(),
    }
}
