//! The Invariant Evaluator (§4.5) — the only checker that calls into
//! `conform-pathexpr`. Constraints are wrapped as `<relative_path>.all(<expr>)`
//! and evaluated once per element against the whole resource.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use conform_models::{ConstraintSeverity, StructureDefinition};
use conform_pathexpr::Expression;
use serde_json::Value;

use crate::result::{Issue, IssueCode, IssueSeverity};

const CACHE_LIMIT: usize = 1000;

/// Compiled-expression cache shared across calls. Bounded by wholesale
/// eviction rather than per-entry LRU bookkeeping — constraint expressions
/// are drawn from a small, finite set of loaded schemas in practice, so the
/// cache rarely approaches the limit.
#[derive(Default)]
pub struct ExpressionCache {
    inner: RwLock<HashMap<String, Arc<Expression>>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile_cached(&self, text: &str) -> Result<Arc<Expression>, conform_pathexpr::Error> {
        if let Some(cached) = self.inner.read().expect("cache lock poisoned").get(text) {
            return Ok(cached.clone());
        }
        let compiled = Arc::new(conform_pathexpr::compile(text)?);
        let mut guard = self.inner.write().expect("cache lock poisoned");
        if guard.len() >= CACHE_LIMIT {
            guard.clear();
        }
        guard.insert(text.to_string(), compiled.clone());
        Ok(compiled)
    }
}

pub fn check(
    resource: &Value,
    resource_type: &str,
    schema: &StructureDefinition,
    cache: &ExpressionCache,
    issues: &mut Vec<Issue>,
) {
    let Some(snapshot) = schema.snapshot.as_ref() else {
        return;
    };

    for element in &snapshot.element {
        let Some(constraints) = element.constraint.as_ref() else {
            continue;
        };
        for constraint in constraints {
            if let Some(source) = &constraint.source {
                if source != &schema.url {
                    continue;
                }
            }
            let Some(expr_text) = constraint.expression.as_deref() else {
                continue;
            };

            let relative_path = element
                .path
                .strip_prefix(resource_type)
                .and_then(|rest| rest.strip_prefix('.'));

            if let Some(relative) = relative_path {
                let segments: Vec<&str> = relative.split('.').collect();
                if !path_exists(resource, &segments) {
                    continue;
                }
            }

            let eval_text = match relative_path {
                None => expr_text.to_string(),
                Some(relative) => format!("{relative}.all({expr_text})"),
            };

            let compiled = match cache.compile_cached(&eval_text) {
                Ok(compiled) => compiled,
                Err(e) => {
                    issues.push(
                        Issue::warning(
                            IssueCode::Processing,
                            format!("{}: failed to compile constraint '{}': {e}", element.path, constraint.key),
                        )
                        .with_path(element.path.clone()),
                    );
                    continue;
                }
            };

            let outcome = match conform_pathexpr::evaluate(&compiled, std::slice::from_ref(resource)) {
                Ok(collection) => conform_pathexpr::truthy(&collection),
                Err(e) => {
                    issues.push(
                        Issue::warning(
                            IssueCode::Processing,
                            format!("{}: failed to evaluate constraint '{}': {e}", element.path, constraint.key),
                        )
                        .with_path(element.path.clone()),
                    );
                    continue;
                }
            };

            if !outcome {
                let severity = match constraint.severity {
                    ConstraintSeverity::Error => IssueSeverity::Error,
                    ConstraintSeverity::Warning => IssueSeverity::Warning,
                };
                issues.push(
                    Issue::new(
                        severity,
                        IssueCode::Invariant,
                        format!("{}: {}", constraint.key, constraint.human),
                    )
                    .with_path(element.path.clone()),
                );
            }
        }
    }
}

/// Whether `segments` resolves to a present, non-null value under `value`,
/// probing the first item of any array ancestor and accepting a `[x]`
/// polymorphic segment as satisfied by any concrete variant key.
fn path_exists(value: &Value, segments: &[&str]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return !value.is_null();
    };
    match value {
        Value::Array(items) => items.first().map(|item| path_exists(item, segments)).unwrap_or(false),
        Value::Object(map) => {
            if let Some(base) = head.strip_suffix("[x]") {
                map.iter().any(|(k, v)| {
                    k.starts_with(base) && k.len() > base.len() && path_exists(v, rest)
                })
            } else {
                map.get(*head).map(|v| path_exists(v, rest)).unwrap_or(false)
            }
        }
        _ => false,
    }
}
