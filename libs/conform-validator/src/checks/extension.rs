//! Extension checker (§4.8): enforces the url + value[x]-xor-nested shape,
//! resolves the extension's own schema when registered, and dispatches its
//! declared `value[x]` type to the primitive checker.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::element_index::{
    capitalized_type_name, is_complex_type_code, resolve, type_code_for_suffix, ElementIndex, Resolution,
};
use crate::options::ValidatorOptions;
use crate::registry::Registry;
use crate::result::{Issue, IssueCode};

static SIMPLE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap());

pub fn check(
    resource: &Value,
    resource_type: &str,
    registry: &Registry,
    options: &ValidatorOptions,
    issues: &mut Vec<Issue>,
) {
    walk(resource, resource_type, registry, options, issues);
}

fn walk(value: &Value, path: &str, registry: &Registry, options: &ValidatorOptions, issues: &mut Vec<Issue>) {
    match value {
        Value::Object(map) => {
            for key in ["extension", "modifierExtension"] {
                if let Some(Value::Array(entries)) = map.get(key) {
                    for (i, entry) in entries.iter().enumerate() {
                        check_one(entry, &format!("{path}.{key}[{i}]"), registry, options, issues);
                    }
                }
            }
            for (key, child) in map {
                if key == "extension" || key == "modifierExtension" || key.starts_with('_') {
                    continue;
                }
                walk(child, &format!("{path}.{key}"), registry, options, issues);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, path, registry, options, issues);
            }
        }
        _ => {}
    }
}

fn check_one(extension: &Value, path: &str, registry: &Registry, options: &ValidatorOptions, issues: &mut Vec<Issue>) {
    let Some(obj) = extension.as_object() else {
        issues.push(Issue::error(IssueCode::Extension, "extension entry must be an object").with_path(path));
        return;
    };

    let url = obj.get("url").and_then(|u| u.as_str());
    match url {
        None => issues.push(Issue::error(IssueCode::Extension, "extension is missing required 'url'").with_path(path)),
        Some(url) if !is_valid_extension_url(url) => issues.push(
            Issue::error(IssueCode::Extension, format!("'{url}' is not a valid extension url")).with_path(path),
        ),
        _ => {}
    }

    let has_value = has_value_choice(obj);
    let has_nested = matches!(obj.get("extension"), Some(Value::Array(entries)) if !entries.is_empty());
    if has_value == has_nested {
        issues.push(
            Issue::error(IssueCode::Extension, "extension must have exactly one of value[x] or nested extension")
                .with_path(path),
        );
    }

    if has_nested {
        if let Some(Value::Array(nested)) = obj.get("extension") {
            for (i, child) in nested.iter().enumerate() {
                check_one(child, &format!("{path}.extension[{i}]"), registry, options, issues);
            }
        }
    }

    let Some(url) = url else {
        return;
    };
    match registry.get(url) {
        Some(sd) => {
            if sd.type_name != "Extension" {
                issues.push(
                    Issue::error(IssueCode::Extension, format!("'{url}' does not resolve to an Extension schema"))
                        .with_path(path),
                );
                return;
            }
            if has_value {
                if let Some(snapshot) = sd.snapshot.as_ref() {
                    let index = ElementIndex::new(snapshot);
                    check_value_type(obj, &index, registry, options, path, issues);
                }
            }
        }
        None if options.strict_mode => {
            issues.push(Issue::warning(IssueCode::Extension, format!("unknown extension url '{url}'")));
        }
        None => {}
    }
}

fn has_value_choice(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|k| k.starts_with("value") && k.len() > "value".len())
}

fn check_value_type(
    obj: &Map<String, Value>,
    index: &ElementIndex,
    registry: &Registry,
    options: &ValidatorOptions,
    path: &str,
    issues: &mut Vec<Issue>,
) {
    let Some(def) = index.get_element("Extension.value[x]") else {
        return;
    };
    let allowed = def.type_codes();
    if allowed.is_empty() {
        return;
    }

    for (key, value) in obj {
        let Some(suffix) = key.strip_prefix("value") else {
            continue;
        };
        if suffix.is_empty() {
            continue;
        }
        let type_code = type_code_for_suffix(suffix);
        if !allowed.contains(&type_code.as_str()) {
            issues.push(
                Issue::error(
                    IssueCode::Extension,
                    format!("value type '{type_code}' is not among the allowed types {allowed:?}"),
                )
                .with_path(path),
            );
            return;
        }
        if is_complex_type_code(&type_code) {
            check_complex_value(value, &type_code, registry, options, path, issues);
        } else if let Err(message) = crate::primitive::check(&type_code, value) {
            issues.push(Issue::error(IssueCode::Value, format!("{path}: {message}")).with_path(path));
        }
    }
}

/// Expands a complex-typed `value[x]` (`valueCodeableConcept`, `valueHumanName`,
/// ...) field by field against its own registered schema, the same shape the
/// structural walker gives ordinary elements.
fn check_complex_value(
    value: &Value,
    type_code: &str,
    registry: &Registry,
    options: &ValidatorOptions,
    path: &str,
    issues: &mut Vec<Issue>,
) {
    let type_name = capitalized_type_name(type_code);
    let Some(schema) = registry.resolve_type(&type_name) else {
        return;
    };
    let Some(snapshot) = schema.snapshot.as_ref() else {
        return;
    };
    let index = ElementIndex::new(snapshot);
    walk_complex_fields(value, &type_name, &index, registry, options, path, issues);
}

fn walk_complex_fields(
    value: &Value,
    type_path: &str,
    index: &ElementIndex,
    registry: &Registry,
    options: &ValidatorOptions,
    path: &str,
    issues: &mut Vec<Issue>,
) {
    let Some(obj) = value.as_object() else {
        return;
    };

    for (key, child) in obj {
        if key.starts_with('_') {
            continue;
        }
        let field_type_path = format!("{type_path}.{key}");
        match resolve(registry, index, &field_type_path) {
            Resolution::Unknown => {
                if options.strict_mode {
                    issues.push(
                        Issue::warning(
                            IssueCode::Structure,
                            format!("unknown field '{key}' on extension value type '{type_path}'"),
                        )
                        .with_path(format!("{path}.{key}")),
                    );
                }
            }
            resolution => {
                let Some(def) = resolution.element().cloned() else {
                    continue;
                };
                match child {
                    Value::Array(items) => {
                        for (i, item) in items.iter().enumerate() {
                            check_complex_field(item, &def, &field_type_path, index, registry, options, &format!("{path}.{key}[{i}]"), issues);
                        }
                    }
                    other => check_complex_field(other, &def, &field_type_path, index, registry, options, &format!("{path}.{key}"), issues),
                }
            }
        }
    }

    for child_def in index.children_of(type_path) {
        let Some(name) = child_def.path.rsplit('.').next() else {
            continue;
        };
        if name.ends_with("[x]") || child_def.min() == 0 {
            continue;
        }
        if !obj.contains_key(name) {
            issues.push(
                Issue::error(
                    IssueCode::Required,
                    format!("element '{type_path}.{name}' requires at least 1 occurrence, found 0"),
                )
                .with_path(format!("{path}.{name}")),
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn check_complex_field(
    value: &Value,
    def: &conform_models::ElementDefinition,
    field_type_path: &str,
    index: &ElementIndex,
    registry: &Registry,
    options: &ValidatorOptions,
    path: &str,
    issues: &mut Vec<Issue>,
) {
    if value.is_null() {
        return;
    }
    if let Some(type_code) = def.type_codes().first() {
        if let Err(message) = crate::primitive::check(type_code, value) {
            issues.push(Issue::error(IssueCode::Value, format!("{path}: {message}")).with_path(path));
        }
    }
    if value.is_object() {
        walk_complex_fields(value, field_type_path, index, registry, options, path, issues);
    }
}

fn is_valid_extension_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("urn:") || SIMPLE_ID_RE.is_match(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extension_without_url_is_flagged() {
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "extension": [{"valueString": "x"}]}),
            "Patient",
            &registry,
            &options,
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.code == IssueCode::Extension));
    }

    #[test]
    fn value_and_nested_extension_together_is_invalid() {
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "extension": [{
                "url": "http://example.org/fhir/StructureDefinition/x",
                "valueString": "x",
                "extension": [{"url": "nested", "valueString": "y"}]
            }]}),
            "Patient",
            &registry,
            &options,
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.code == IssueCode::Extension));
    }

    #[test]
    fn well_formed_extension_is_accepted() {
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "extension": [{
                "url": "http://example.org/fhir/StructureDefinition/x",
                "valueString": "x"
            }]}),
            "Patient",
            &registry,
            &options,
            &mut issues,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn unknown_url_in_strict_mode_warns() {
        let registry = Registry::new();
        let options = ValidatorOptions::default().with_strict_mode(true);
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "extension": [{
                "url": "http://example.org/fhir/StructureDefinition/unregistered",
                "valueString": "x"
            }]}),
            "Patient",
            &registry,
            &options,
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.code == IssueCode::Extension && i.severity == crate::result::IssueSeverity::Warning));
    }

    #[test]
    fn complex_typed_value_is_expanded_field_by_field() {
        let registry = Registry::new();
        registry
            .load_single(&serde_json::to_vec(&json!({
                "resourceType": "StructureDefinition",
                "url": "http://example.org/fhir/StructureDefinition/x",
                "name": "x",
                "kind": "complex-type",
                "abstract": false,
                "type": "Extension",
                "snapshot": {"element": [
                    {"path": "Extension"},
                    {"path": "Extension.value[x]", "type": [{"code": "CodeableConcept"}]}
                ]}
            )))
            .unwrap())
            .unwrap();
        registry
            .load_single(&serde_json::to_vec(&json!({
                "resourceType": "StructureDefinition",
                "url": "http://hl7.org/fhir/StructureDefinition/CodeableConcept",
                "name": "CodeableConcept",
                "kind": "complex-type",
                "abstract": false,
                "type": "CodeableConcept",
                "snapshot": {"element": [
                    {"path": "CodeableConcept"},
                    {"path": "CodeableConcept.text", "type": [{"code": "string"}]}
                ]}
            )))
            .unwrap())
            .unwrap();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "extension": [{
                "url": "http://example.org/fhir/StructureDefinition/x",
                "valueCodeableConcept": {"text": 5}
            }]}),
            "Patient",
            &registry,
            &options,
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.code == IssueCode::Value));
    }

    #[test]
    fn unknown_field_on_complex_value_is_flagged_in_strict_mode() {
        let registry = Registry::new();
        registry
            .load_single(&serde_json::to_vec(&json!({
                "resourceType": "StructureDefinition",
                "url": "http://example.org/fhir/StructureDefinition/x",
                "name": "x",
                "kind": "complex-type",
                "abstract": false,
                "type": "Extension",
                "snapshot": {"element": [
                    {"path": "Extension"},
                    {"path": "Extension.value[x]", "type": [{"code": "CodeableConcept"}]}
                ]}
            )))
            .unwrap())
            .unwrap();
        registry
            .load_single(&serde_json::to_vec(&json!({
                "resourceType": "StructureDefinition",
                "url": "http://hl7.org/fhir/StructureDefinition/CodeableConcept",
                "name": "CodeableConcept",
                "kind": "complex-type",
                "abstract": false,
                "type": "CodeableConcept",
                "snapshot": {"element": [
                    {"path": "CodeableConcept"},
                    {"path": "CodeableConcept.text", "type": [{"code": "string"}]}
                ]}
            )))
            .unwrap())
            .unwrap();
        let options = ValidatorOptions::default().with_strict_mode(true);
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "extension": [{
                "url": "http://example.org/fhir/StructureDefinition/x",
                "valueCodeableConcept": {"bogus": "x"}
            }]}),
            "Patient",
            &registry,
            &options,
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.code == IssueCode::Structure));
    }
}
