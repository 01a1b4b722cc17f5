//! Structural walker (§4.3): recurses through the resource tree, checking
//! every present element against its resolved definition and reporting
//! missing required elements and unknown elements.

use conform_models::StructureDefinition;
use serde_json::{Map, Value};

use crate::cancel::CancelToken;
use crate::element_index::{resolve, ElementIndex, Resolution};
use crate::options::ValidatorOptions;
use crate::registry::Registry;
use crate::result::{Issue, IssueCode};

pub fn walk(
    resource_type: &str,
    resource: &Value,
    schema: &StructureDefinition,
    registry: &Registry,
    options: &ValidatorOptions,
    cancel: &CancelToken,
    issues: &mut Vec<Issue>,
) {
    let Some(snapshot) = schema.snapshot.as_ref() else {
        return;
    };
    let index = ElementIndex::new(snapshot);
    let mut stop = false;
    walk_node(resource, resource_type, &index, registry, options, cancel, issues, &mut stop);
}

fn walk_node(
    value: &Value,
    path: &str,
    index: &ElementIndex,
    registry: &Registry,
    options: &ValidatorOptions,
    cancel: &CancelToken,
    issues: &mut Vec<Issue>,
    stop: &mut bool,
) {
    let Some(obj) = value.as_object() else {
        return;
    };

    for (key, child_value) in obj {
        if *stop || cancel.is_cancelled() {
            *stop = true;
            return;
        }
        if key == "resourceType" || key.starts_with('_') {
            continue;
        }
        let child_path = format!("{path}.{key}");
        match resolve(registry, index, &child_path) {
            Resolution::Unknown => {
                issues.push(
                    Issue::error(IssueCode::Structure, format!("unknown element '{child_path}'"))
                        .with_path(child_path),
                );
                note_error(options, issues, stop);
            }
            resolution => {
                let Some(def) = resolution.element().cloned() else {
                    continue;
                };
                let count = match child_value {
                    Value::Array(items) => items.len(),
                    Value::Null => 0,
                    _ => 1,
                };
                check_cardinality(def.min(), def.max(), count, &child_path, issues);
                note_error(options, issues, stop);

                match child_value {
                    Value::Array(items) => {
                        for item in items {
                            if *stop {
                                break;
                            }
                            walk_leaf(item, &child_path, &def, index, registry, options, cancel, issues, stop);
                        }
                    }
                    other => walk_leaf(other, &child_path, &def, index, registry, options, cancel, issues, stop),
                }
            }
        }
    }

    for child_def in index.children_of(path) {
        let Some(name) = child_def.path.rsplit('.').next() else {
            continue;
        };
        if name.ends_with("[x]") {
            let base = &name[..name.len() - 3];
            if !has_choice_variant(obj, base) && child_def.min() > 0 {
                issues.push(
                    Issue::error(
                        IssueCode::Required,
                        format!("element '{path}.{base}[x]' requires at least one occurrence"),
                    )
                    .with_path(format!("{path}.{name}")),
                );
            }
            continue;
        }
        if !obj.contains_key(name) && child_def.min() > 0 {
            issues.push(
                Issue::error(
                    IssueCode::Required,
                    format!("element '{path}.{name}' requires at least 1 occurrence, found 0"),
                )
                .with_path(format!("{path}.{name}")),
            );
        }
    }
}

fn has_choice_variant(obj: &Map<String, Value>, base: &str) -> bool {
    obj.keys()
        .any(|k| k.starts_with(base) && k.len() > base.len() && k.as_bytes()[base.len()].is_ascii_uppercase())
}

fn walk_leaf(
    value: &Value,
    path: &str,
    def: &conform_models::ElementDefinition,
    index: &ElementIndex,
    registry: &Registry,
    options: &ValidatorOptions,
    cancel: &CancelToken,
    issues: &mut Vec<Issue>,
    stop: &mut bool,
) {
    if value.is_null() {
        return;
    }

    let type_codes = def.type_codes();
    if type_codes.iter().any(|t| *t == "Resource") {
        if !options.skip_contained_validation {
            pivot_contained(value, path, registry, options, cancel, issues, stop);
        }
        return;
    }

    if let Some(type_code) = type_codes.first() {
        if let Err(message) = crate::primitive::check(type_code, value) {
            issues.push(Issue::error(IssueCode::Value, format!("{path}: {message}")).with_path(path));
            note_error(options, issues, stop);
        }
    }

    if value.is_object() {
        walk_node(value, path, index, registry, options, cancel, issues, stop);
    }
}

fn pivot_contained(
    value: &Value,
    path: &str,
    registry: &Registry,
    options: &ValidatorOptions,
    cancel: &CancelToken,
    issues: &mut Vec<Issue>,
    stop: &mut bool,
) {
    let Some(contained_type) = value.get("resourceType").and_then(|v| v.as_str()) else {
        issues.push(
            Issue::error(IssueCode::NotFound, format!("{path}: contained resource has no resourceType"))
                .with_path(path),
        );
        return;
    };
    let Some(sub_schema) = registry.resolve_type(contained_type) else {
        issues.push(
            Issue::error(
                IssueCode::NotFound,
                format!("{path}: no schema registered for contained type '{contained_type}'"),
            )
            .with_path(path),
        );
        return;
    };
    let Some(sub_snapshot) = sub_schema.snapshot.as_ref() else {
        return;
    };
    let sub_index = ElementIndex::new(sub_snapshot);
    walk_node(value, contained_type, &sub_index, registry, options, cancel, issues, stop);
}

fn check_cardinality(min: u32, max: Option<u32>, count: usize, path: &str, issues: &mut Vec<Issue>) {
    if count < min as usize {
        issues.push(
            Issue::error(
                IssueCode::Required,
                format!("element '{path}' requires at least {min} occurrence(s), found {count}"),
            )
            .with_path(path),
        );
    }
    if let Some(max) = max {
        if count > max as usize {
            issues.push(
                Issue::error(
                    IssueCode::Structure,
                    format!("element '{path}' allows at most {max} occurrence(s), found {count}"),
                )
                .with_path(path),
            );
        }
    }
}

fn note_error(options: &ValidatorOptions, issues: &[Issue], stop: &mut bool) {
    if options.max_errors > 0 {
        let blocking = issues.iter().filter(|i| i.is_blocking()).count() as u32;
        if blocking >= options.max_errors {
            *stop = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient_schema() -> StructureDefinition {
        serde_json::from_value(json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/Patient",
            "name": "Patient",
            "kind": "resource",
            "abstract": false,
            "type": "Patient",
            "snapshot": {"element": [
                {"path": "Patient"},
                {"path": "Patient.active", "type": [{"code": "boolean"}]},
                {"path": "Patient.birthDate", "min": 1, "max": "1", "type": [{"code": "date"}]}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn unknown_element_is_reported_as_structure_error() {
        let schema = patient_schema();
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        walk(
            "Patient",
            &json!({"resourceType": "Patient", "bogus": true}),
            &schema,
            &registry,
            &options,
            &CancelToken::new(),
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.code == IssueCode::Structure));
    }

    #[test]
    fn missing_required_element_is_reported() {
        let schema = patient_schema();
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        walk(
            "Patient",
            &json!({"resourceType": "Patient", "active": true}),
            &schema,
            &registry,
            &options,
            &CancelToken::new(),
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.code == IssueCode::Required));
    }

    #[test]
    fn well_formed_resource_produces_no_issues() {
        let schema = patient_schema();
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        walk(
            "Patient",
            &json!({"resourceType": "Patient", "active": true, "birthDate": "1990-01-01"}),
            &schema,
            &registry,
            &options,
            &CancelToken::new(),
            &mut issues,
        );
        assert!(issues.is_empty());
    }
}
