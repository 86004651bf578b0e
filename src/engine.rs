//! First-match-wins evaluation of a compiled rule set.

use crate::predicate::AuditSink;
use crate::types::{Decision, DenyReason, EvaluationContext};
use crate::RuleSet;

/// Evaluate `ctx` against `rules`, in rule-set order.
///
/// Each rule is an independent permission grant: the first rule whose
/// pattern, roles, method and action all match, and whose predicate (if
/// any) answers yes, allows the request. A rule whose predicate denies or
/// fails does not stop evaluation; a later, independently matching rule can
/// still grant. If no rule grants, the request is denied.
///
/// A predicate failure is reported to `audit` and treated as a deny for
/// that rule only; no error escapes through the decision path.
pub fn evaluate(rules: &RuleSet, ctx: &EvaluationContext, audit: &dyn AuditSink) -> Decision {
    for (index, rule) in rules.rules().iter().enumerate() {
        if !rule.pattern.matches(&ctx.resource_id) {
            continue;
        }
        if !rule.roles.intersects(&ctx.roles) {
            continue;
        }
        // A request without a method or action does not constrain that
        // dimension; otherwise the rule's set must permit the value.
        if let Some(method) = &ctx.method {
            if !rule.methods.permits(method) {
                continue;
            }
        }
        if !ctx.action.is_empty() && !rule.actions.permits(&ctx.action) {
            continue;
        }

        match &rule.check {
            None => {
                let decision = Decision::AllowedBy { rule: index };
                audit.record_decision(ctx, &decision);
                return decision;
            }
            Some(named) => match named.predicate.check(ctx) {
                Ok(true) => {
                    let decision = Decision::AllowedBy { rule: index };
                    audit.record_decision(ctx, &decision);
                    return decision;
                }
                Ok(false) => continue,
                Err(error) => {
                    // Reporting belongs to the sink; the engine only denies.
                    audit.record_predicate_failure(ctx, index, &named.name, &error);
                    continue;
                }
            },
        }
    }

    let decision = Decision::Denied {
        reason: DenyReason::NoMatchingRule,
    };
    audit.record_decision(ctx, &decision);
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PredicateError, ReadError};
    use crate::loader::compile_rules;
    use crate::predicate::{NullSink, PredicateRegistry};
    use crate::types::RuleDef;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn def(pattern: &str, roles: &str, methods: &str, actions: &str) -> RuleDef {
        RuleDef {
            pattern: pattern.into(),
            roles: roles.into(),
            methods: methods.into(),
            actions: actions.into(),
            check: None,
        }
    }

    fn with_check(mut d: RuleDef, name: &str) -> RuleDef {
        d.check = Some(name.into());
        d
    }

    fn roles(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Audit sink that captures predicate failures for assertions.
    #[derive(Default)]
    struct CapturingSink {
        failures: Mutex<Vec<(usize, String)>>,
    }

    impl AuditSink for CapturingSink {
        fn record_predicate_failure(
            &self,
            _ctx: &EvaluationContext,
            rule: usize,
            predicate: &str,
            _error: &PredicateError,
        ) {
            self.failures
                .lock()
                .unwrap()
                .push((rule, predicate.to_string()));
        }
    }

    fn info_and_admin_rules() -> crate::RuleSet {
        compile_rules(
            vec![
                def("info/*", "*", "read", "*"),
                def("*", "admin", "*", "*"),
            ],
            &PredicateRegistry::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_anonymous_read_allowed_by_first_rule() {
        let rules = info_and_admin_rules();
        let ctx = EvaluationContext::new("info/health", roles(&[]), Some("read"));
        assert_eq!(
            evaluate(&rules, &ctx, &NullSink),
            Decision::AllowedBy { rule: 0 }
        );
    }

    #[test]
    fn test_anonymous_delete_denied() {
        let rules = info_and_admin_rules();
        let ctx = EvaluationContext::new("info/health", roles(&[]), Some("delete"));
        assert_eq!(
            evaluate(&rules, &ctx, &NullSink),
            Decision::Denied {
                reason: DenyReason::NoMatchingRule
            }
        );
    }

    #[test]
    fn test_admin_delete_allowed_by_catch_all() {
        let rules = info_and_admin_rules();
        let ctx = EvaluationContext::new("secret/x", roles(&["admin"]), Some("delete"));
        assert_eq!(
            evaluate(&rules, &ctx, &NullSink),
            Decision::AllowedBy { rule: 1 }
        );
    }

    #[test]
    fn test_empty_method_set_matches_nothing() {
        let rules = compile_rules(
            vec![def("*", "cert", "", "")],
            &PredicateRegistry::new(),
        )
        .unwrap();
        let ctx = EvaluationContext::new("managed/user/1", roles(&["cert"]), Some("read"));
        assert!(!evaluate(&rules, &ctx, &NullSink).is_allowed());
    }

    #[test]
    fn test_absent_method_auto_satisfies() {
        let rules = compile_rules(
            vec![def("*", "cert", "", "")],
            &PredicateRegistry::new(),
        )
        .unwrap();
        // No method on the request: the empty methods set does not reject.
        let ctx = EvaluationContext::new("managed/user/1", roles(&["cert"]), None);
        assert_eq!(
            evaluate(&rules, &ctx, &NullSink),
            Decision::AllowedBy { rule: 0 }
        );
    }

    #[test]
    fn test_absent_action_auto_satisfies() {
        let rules = compile_rules(
            vec![def("authentication", "user", "action", "reauthenticate")],
            &PredicateRegistry::new(),
        )
        .unwrap();

        // Request with no action passes the action dimension.
        let ctx = EvaluationContext::new("authentication", roles(&["user"]), Some("action"));
        assert!(evaluate(&rules, &ctx, &NullSink).is_allowed());

        // A concrete action must be a member.
        let mut ctx = EvaluationContext::new("authentication", roles(&["user"]), Some("action"));
        ctx.action = "login".into();
        assert!(!evaluate(&rules, &ctx, &NullSink).is_allowed());
        ctx.action = "reauthenticate".into();
        assert!(evaluate(&rules, &ctx, &NullSink).is_allowed());
    }

    #[test]
    fn test_first_match_wins_over_later_predicate() {
        // Rule 0 allows unconditionally; rule 1's predicate would also allow
        // but must never be consulted.
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut registry = PredicateRegistry::new();
        registry.register(
            "counted",
            Arc::new(move |_: &EvaluationContext| -> Result<bool, PredicateError> {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }),
        );

        let rules = compile_rules(
            vec![
                def("doc/*", "user", "read", "*"),
                with_check(def("doc/*", "user", "read", "*"), "counted"),
            ],
            &registry,
        )
        .unwrap();

        let ctx = EvaluationContext::new("doc/a", roles(&["user"]), Some("read"));
        assert_eq!(
            evaluate(&rules, &ctx, &NullSink),
            Decision::AllowedBy { rule: 0 }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_predicate_deny_falls_through_to_later_rule() {
        let mut registry = PredicateRegistry::new();
        registry.register(
            "never",
            Arc::new(|_: &EvaluationContext| -> Result<bool, PredicateError> { Ok(false) }),
        );

        let rules = compile_rules(
            vec![
                with_check(def("doc/*", "user", "read", "*"), "never"),
                def("doc/*", "user", "read", "*"),
            ],
            &registry,
        )
        .unwrap();

        let ctx = EvaluationContext::new("doc/a", roles(&["user"]), Some("read"));
        assert_eq!(
            evaluate(&rules, &ctx, &NullSink),
            Decision::AllowedBy { rule: 1 }
        );
    }

    #[test]
    fn test_predicate_deny_with_no_later_rule_is_no_match() {
        let mut registry = PredicateRegistry::new();
        registry.register(
            "never",
            Arc::new(|_: &EvaluationContext| -> Result<bool, PredicateError> { Ok(false) }),
        );

        let rules = compile_rules(
            vec![with_check(def("*", "user", "*", "*"), "never")],
            &registry,
        )
        .unwrap();

        let ctx = EvaluationContext::new("doc/a", roles(&["user"]), Some("read"));
        assert_eq!(
            evaluate(&rules, &ctx, &NullSink),
            Decision::Denied {
                reason: DenyReason::NoMatchingRule
            }
        );
    }

    #[test]
    fn test_predicate_failure_denies_rule_and_hits_audit() {
        let mut registry = PredicateRegistry::new();
        registry.register(
            "broken",
            Arc::new(|_: &EvaluationContext| -> Result<bool, PredicateError> {
                Err(PredicateError::Read(ReadError::Timeout))
            }),
        );

        let rules = compile_rules(
            vec![
                with_check(def("doc/*", "user", "read", "*"), "broken"),
                def("doc/*", "user", "read", "*"),
            ],
            &registry,
        )
        .unwrap();

        let sink = CapturingSink::default();
        let ctx = EvaluationContext::new("doc/a", roles(&["user"]), Some("read"));
        // The failure denies rule 0 but rule 1 still grants.
        assert_eq!(
            evaluate(&rules, &ctx, &sink),
            Decision::AllowedBy { rule: 1 }
        );
        let failures = sink.failures.lock().unwrap();
        assert_eq!(failures.as_slice(), &[(0, "broken".to_string())]);
    }

    #[test]
    fn test_empty_rule_set_denies() {
        let rules = compile_rules(vec![], &PredicateRegistry::new()).unwrap();
        let ctx = EvaluationContext::new("anything", roles(&["admin"]), Some("read"));
        assert!(!evaluate(&rules, &ctx, &NullSink).is_allowed());
    }
}
