//! Reference checker (§4.7): classifies `Reference.reference` strings and
//! enforces declared target types against `targetProfile`.

use std::collections::HashSet;

use conform_models::StructureDefinition;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::result::{Issue, IssueCode, IssueSeverity};

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z]+)/([A-Za-z0-9.\-]+)$").unwrap());
static ABSOLUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://.+/([A-Za-z]+)/([A-Za-z0-9.\-]+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    Contained(String),
    Relative { type_name: String, id: String },
    Absolute { type_name: String, id: String },
    UrnUuid(String),
    UrnOid(String),
    Canonical { url: String, version: Option<String> },
    Invalid,
}

pub fn classify(reference: &str) -> ReferenceKind {
    if let Some(id) = reference.strip_prefix('#') {
        return ReferenceKind::Contained(id.to_string());
    }
    if let Some(rest) = reference.strip_prefix("urn:uuid:") {
        return ReferenceKind::UrnUuid(rest.to_string());
    }
    if let Some(rest) = reference.strip_prefix("urn:oid:") {
        return ReferenceKind::UrnOid(rest.to_string());
    }
    if reference.starts_with("http://") || reference.starts_with("https://") {
        if let Some(caps) = ABSOLUTE_RE.captures(reference) {
            return ReferenceKind::Absolute {
                type_name: caps[1].to_string(),
                id: caps[2].to_string(),
            };
        }
        let (url, version) = match reference.split_once('|') {
            Some((u, v)) => (u.to_string(), Some(v.to_string())),
            None => (reference.to_string(), None),
        };
        return ReferenceKind::Canonical { url, version };
    }
    if let Some(caps) = RELATIVE_RE.captures(reference) {
        return ReferenceKind::Relative {
            type_name: caps[1].to_string(),
            id: caps[2].to_string(),
        };
    }
    ReferenceKind::Invalid
}

pub fn check(resource: &Value, resource_type: &str, schema: &StructureDefinition, issues: &mut Vec<Issue>) {
    let Some(snapshot) = schema.snapshot.as_ref() else {
        return;
    };
    let contained_ids = extract_contained_ids(resource);

    for element in &snapshot.element {
        if !element.type_codes().contains(&"Reference") {
            continue;
        }
        let Some(relative) = element.path.strip_prefix(resource_type).and_then(|s| s.strip_prefix('.')) else {
            continue;
        };
        let segments: Vec<&str> = relative.split('.').collect();

        let mut refs = Vec::new();
        collect_reference_strings(resource, resource_type, &segments, &mut refs);

        let target_profiles: Vec<&str> = element
            .types
            .as_ref()
            .map(|types| {
                types
                    .iter()
                    .filter(|t| t.code == "Reference")
                    .flat_map(|t| t.target_profile.as_deref().unwrap_or_default())
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default();

        for (reference_str, path) in refs {
            match classify(&reference_str) {
                ReferenceKind::Invalid => {
                    issues.push(
                        Issue::error(IssueCode::Value, format!("'{reference_str}' is not a recognized reference format"))
                            .with_path(path),
                    );
                }
                ReferenceKind::Contained(id) => {
                    if !contained_ids.contains(&id) {
                        issues.push(
                            Issue::new(
                                IssueSeverity::Error,
                                IssueCode::NotFound,
                                format!("contained resource '#{id}' not found"),
                            )
                            .with_path(path),
                        );
                    }
                }
                ReferenceKind::Relative { type_name, .. } | ReferenceKind::Absolute { type_name, .. } => {
                    check_target_type(&type_name, &target_profiles, &path, issues);
                }
                ReferenceKind::UrnUuid(_) | ReferenceKind::UrnOid(_) | ReferenceKind::Canonical { .. } => {}
            }
        }
    }
}

fn check_target_type(type_name: &str, target_profiles: &[&str], path: &str, issues: &mut Vec<Issue>) {
    if target_profiles.is_empty() {
        return;
    }
    let allowed = target_profiles
        .iter()
        .any(|p| p.ends_with(&format!("/{type_name}")) || p.ends_with("/Resource") || *p == "Resource");
    if !allowed {
        issues.push(
            Issue::error(
                IssueCode::Value,
                format!("reference target type '{type_name}' is not among the allowed target profiles"),
            )
            .with_path(path),
        );
    }
}

fn collect_reference_strings(value: &Value, path: &str, segments: &[&str], out: &mut Vec<(String, String)>) {
    let Some((head, rest)) = segments.split_first() else {
        if let Some(r) = value.get("reference").and_then(|v| v.as_str()) {
            out.push((r.to_string(), format!("{path}.reference")));
        }
        return;
    };
    match value {
        Value::Array(items) => {
            for item in items {
                collect_reference_strings(item, path, segments, out);
            }
        }
        Value::Object(map) => {
            if let Some(base) = head.strip_suffix("[x]") {
                for (k, v) in map {
                    if k.starts_with(base) && k.len() > base.len() {
                        collect_reference_strings(v, &format!("{path}.{k}"), rest, out);
                    }
                }
            } else if let Some(v) = map.get(*head) {
                collect_reference_strings(v, &format!("{path}.{head}"), rest, out);
            }
        }
        _ => {}
    }
}

fn extract_contained_ids(resource: &Value) -> HashSet<String> {
    resource
        .get("contained")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|r| r.get("id").and_then(|i| i.as_str()).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation_schema() -> StructureDefinition {
        serde_json::from_value(json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/Observation",
            "name": "Observation",
            "kind": "resource",
            "abstract": false,
            "type": "Observation",
            "snapshot": {"element": [
                {"path": "Observation"},
                {"path": "Observation.subject", "type": [{"code": "Reference", "targetProfile": ["http://hl7.org/fhir/StructureDefinition/Patient"]}]}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn missing_contained_reference_is_not_found() {
        let schema = observation_schema();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Observation", "subject": {"reference": "#missing"}}),
            "Observation",
            &schema,
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::NotFound);
        assert_eq!(issues[0].location_path.as_ref().unwrap()[0], "Observation.subject.reference");
    }

    #[test]
    fn malformed_reference_is_a_value_error() {
        let schema = observation_schema();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Observation", "subject": {"reference": "not a reference"}}),
            "Observation",
            &schema,
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::Value);
    }

    #[test]
    fn disallowed_target_type_is_flagged() {
        let schema = observation_schema();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Observation", "subject": {"reference": "Practitioner/1"}}),
            "Observation",
            &schema,
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::Value);
    }

    #[test]
    fn allowed_relative_reference_is_accepted() {
        let schema = observation_schema();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Observation", "subject": {"reference": "Patient/1"}}),
            "Observation",
            &schema,
            &mut issues,
        );
        assert!(issues.is_empty());
    }
}
