//! Stock predicates covering the common dynamic checks: ownership,
//! query-shape restrictions, feature-flag gating and workflow assignment.
//!
//! Each constructor returns an `Arc<dyn Predicate>` ready to be registered
//! under whatever name the rule configuration uses. Predicates that need
//! domain data take a [`ResourceReader`]; the reader's failures propagate
//! as [`PredicateError`](crate::errors::PredicateError) and become a deny
//! for the rule under evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::errors::PredicateError;
use crate::predicate::{Predicate, ResourceReader};
use crate::types::{EvaluationContext, SecurityContext};

/// Allow only when the request targets the caller's own data.
///
/// A user id may arrive in up to three places: embedded in a
/// `managed/user/<id>` resource id, as `params.userId`, or as
/// `value.userId`. Any disagreement between them denies outright, and the
/// resolved id must equal the caller's.
pub fn own_data_only() -> Arc<dyn Predicate> {
    Arc::new(
        |ctx: &EvaluationContext| -> Result<bool, PredicateError> {
            let Some(security) = &ctx.security else {
                return Ok(false);
            };

            let mut user_id = ctx
                .resource_id
                .strip_prefix("managed/user/")
                .filter(|id| !id.is_empty());

            if let Some(param_id) = ctx.params.get("userId").and_then(Value::as_str) {
                if user_id.is_some_and(|id| id != param_id) {
                    return Ok(false);
                }
                user_id = Some(param_id);
            }

            if let Some(value_id) = ctx.value.get("userId").and_then(Value::as_str) {
                if user_id.is_some_and(|id| id != value_id) {
                    return Ok(false);
                }
                user_id = Some(value_id);
            }

            Ok(user_id == Some(security.user_id.as_str()))
        },
    )
}

/// Deny raw query expressions, allowing only parameterized queries.
pub fn disallow_query_expression() -> Arc<dyn Predicate> {
    Arc::new(
        |ctx: &EvaluationContext| -> Result<bool, PredicateError> {
            Ok(ctx.params.get("_queryExpression").is_none())
        },
    )
}

/// Allow a `query` request only when the requested `_queryId` is in the
/// whitelist for that exact resource id.
pub fn is_query_one_of(allowed: HashMap<String, Vec<String>>) -> Arc<dyn Predicate> {
    Arc::new(
        move |ctx: &EvaluationContext| -> Result<bool, PredicateError> {
            if ctx.method.as_deref() != Some("query") {
                return Ok(false);
            }
            let Some(query_id) = ctx.params.get("_queryId").and_then(Value::as_str) else {
                return Ok(false);
            };
            Ok(allowed
                .get(&ctx.resource_id)
                .is_some_and(|ids| ids.iter().any(|id| id == query_id)))
        },
    )
}

/// Gate a rule on a boolean flag in the `config/ui/configuration` object.
///
/// A missing configuration object or flag reads as disabled.
pub fn ui_flag_enabled(reader: Arc<dyn ResourceReader>, flag: &str) -> Arc<dyn Predicate> {
    let flag = flag.to_string();
    Arc::new(
        move |_ctx: &EvaluationContext| -> Result<bool, PredicateError> {
            let config = reader.read("config/ui/configuration")?;
            Ok(config
                .as_ref()
                .and_then(|c| c.get("configuration"))
                .and_then(|c| c.get(&flag))
                .and_then(Value::as_bool)
                .unwrap_or(false))
        },
    )
}

/// Allow only the assignee of the targeted workflow task.
pub fn is_my_task(reader: Arc<dyn ResourceReader>) -> Arc<dyn Predicate> {
    Arc::new(
        move |ctx: &EvaluationContext| -> Result<bool, PredicateError> {
            let Some(security) = &ctx.security else {
                return Ok(false);
            };
            let Some(task_id) = workflow_entity_id(&ctx.resource_id) else {
                return Ok(false);
            };
            let task = reader.read(&format!("workflow/taskinstance/{task_id}"))?;
            Ok(task.as_ref().and_then(|t| t.get("assignee")).and_then(Value::as_str)
                == Some(security.username.as_str()))
        },
    )
}

/// Allow callers who are a candidate for the targeted workflow task,
/// either personally or through one of their roles.
pub fn is_user_candidate_for_task(reader: Arc<dyn ResourceReader>) -> Arc<dyn Predicate> {
    Arc::new(
        move |ctx: &EvaluationContext| -> Result<bool, PredicateError> {
            let Some(security) = &ctx.security else {
                return Ok(false);
            };
            let Some(task_id) = workflow_entity_id(&ctx.resource_id) else {
                return Ok(false);
            };

            let by_user = json!({
                "_queryId": "filtered-query",
                "taskCandidateUser": security.username,
            });
            if contains_task(&reader.query("workflow/taskinstance", &by_user)?, task_id) {
                return Ok(true);
            }

            let mut role_list: Vec<&str> = security.roles.iter().map(String::as_str).collect();
            role_list.sort_unstable();
            let by_group = json!({
                "_queryId": "filtered-query",
                "taskCandidateGroup": role_list.join(","),
            });
            Ok(contains_task(
                &reader.query("workflow/taskinstance", &by_group)?,
                task_id,
            ))
        },
    )
}

/// Allow starting a process instance only for a definition on the
/// caller's process list.
///
/// The definition id rides in the request body as `_processDefinitionId`;
/// a missing or non-string id denies.
pub fn is_allowed_to_start_process(reader: Arc<dyn ResourceReader>) -> Arc<dyn Predicate> {
    Arc::new(
        move |ctx: &EvaluationContext| -> Result<bool, PredicateError> {
            let Some(security) = &ctx.security else {
                return Ok(false);
            };
            let Some(definition_id) = ctx
                .value
                .get("_processDefinitionId")
                .and_then(Value::as_str)
            else {
                return Ok(false);
            };
            process_on_users_list(reader.as_ref(), security, definition_id)
        },
    )
}

/// Allow access to a `workflow/processdefinition/<id>` resource only when
/// the definition is on the caller's process list.
pub fn is_one_of_my_workflows(reader: Arc<dyn ResourceReader>) -> Arc<dyn Predicate> {
    Arc::new(
        move |ctx: &EvaluationContext| -> Result<bool, PredicateError> {
            let Some(security) = &ctx.security else {
                return Ok(false);
            };
            let Some(definition_id) = workflow_entity_id(&ctx.resource_id) else {
                return Ok(false);
            };
            process_on_users_list(reader.as_ref(), security, definition_id)
        },
    )
}

/// Whether `definition_id` appears in the caller's processes-for-user list.
fn process_on_users_list(
    reader: &dyn ResourceReader,
    security: &SecurityContext,
    definition_id: &str,
) -> Result<bool, PredicateError> {
    let params = json!({
        "_queryId": "query-processes-for-user",
        "userId": security.user_id,
    });
    let processes = reader.query("endpoint/getprocessesforuser", &params)?;
    Ok(processes
        .iter()
        .any(|p| p.get("_id").and_then(Value::as_str) == Some(definition_id)))
}

/// Entity id from a `workflow/<kind>/<id>` resource id.
fn workflow_entity_id(resource_id: &str) -> Option<&str> {
    resource_id.split('/').nth(2).filter(|id| !id.is_empty())
}

fn contains_task(results: &[Value], task_id: &str) -> bool {
    results
        .iter()
        .any(|r| r.get("_id").and_then(Value::as_str) == Some(task_id))
}
