//! The universal `ele-1` constraint ("every element must have a value or
//! children") is checked by a dedicated scan rather than routed through the
//! path-expression engine (§4.5) — it applies everywhere, so compiling and
//! evaluating an expression per node would be pure overhead.

use serde_json::Value;

use crate::result::{Issue, IssueCode};

pub fn check(resource: &Value, resource_type: &str, issues: &mut Vec<Issue>) {
    scan(resource, resource_type, true, issues);
}

fn scan(value: &Value, path: &str, is_root: bool, issues: &mut Vec<Issue>) {
    match value {
        Value::Object(map) => {
            if !is_root {
                let empty = map.is_empty();
                let only_id = map.len() == 1 && map.contains_key("id");
                if empty || only_id {
                    issues.push(
                        Issue::error(
                            IssueCode::Invariant,
                            format!("{path}: ele-1 — element must have a value or children"),
                        )
                        .with_path(path),
                    );
                    return;
                }
            }
            for (key, child) in map {
                if key == "resourceType" || key.starts_with('_') {
                    continue;
                }
                let child_path = format!("{path}.{key}");
                scan(child, &child_path, false, issues);
            }
        }
        Value::Array(items) => {
            for item in items {
                scan(item, path, false, issues);
            }
        }
        Value::String(s) => {
            if !is_root && s.is_empty() {
                issues.push(
                    Issue::error(
                        IssueCode::Invariant,
                        format!("{path}: ele-1 — element must have a value or children"),
                    )
                    .with_path(path),
                );
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_nested_object_is_flagged() {
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "name": [{}]}),
            "Patient",
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::Invariant);
    }

    #[test]
    fn object_with_only_id_is_flagged() {
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "name": [{"id": "x"}]}),
            "Patient",
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn empty_string_value_is_flagged() {
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "name": [{"family": ""}]}),
            "Patient",
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn well_formed_resource_has_no_ele1_issues() {
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "name": [{"family": "Shepard"}]}),
            "Patient",
            &mut issues,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn root_is_exempt() {
        let mut issues = Vec::new();
        check(&json!({"resourceType": "Patient"}), "Patient", &mut issues);
        assert!(issues.is_empty());
    }
}
