//! Terminology binding checker (§4.6): looks up coded values against a
//! `TerminologyService`'s loaded value sets, tri-stating the outcome as
//! in-set / not-in-set / set-unknown and mapping severity from binding
//! strength.

use std::collections::{HashMap, HashSet};

use conform_models::{BindingStrength, CodeSystem, StructureDefinition, ValueSet, ValueSetInclude};
use serde_json::Value;

use crate::error::Result;
use crate::result::{Issue, IssueCode, IssueSeverity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    InSet,
    NotInSet,
    SetUnknown,
}

/// An embedded or file-loaded collection of value sets and code systems,
/// keyed by canonical URL with any `|version` suffix stripped.
#[derive(Default)]
pub struct TerminologyService {
    value_sets: HashMap<String, ValueSet>,
    code_systems: HashMap<String, CodeSystem>,
}

impl TerminologyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a Bundle-shaped byte stream and registers every `ValueSet` and
    /// `CodeSystem` entry found.
    pub fn from_bundle(bytes: &[u8]) -> Result<Self> {
        let envelope: Value = serde_json::from_slice(bytes)?;
        let entries = envelope.get("entry").and_then(|e| e.as_array()).cloned().unwrap_or_default();

        let mut service = Self::default();
        for entry in entries {
            let Some(resource) = entry.get("resource") else {
                continue;
            };
            match resource.get("resourceType").and_then(|v| v.as_str()) {
                Some("ValueSet") => {
                    if let Ok(vs) = serde_json::from_value::<ValueSet>(resource.clone()) {
                        service.value_sets.insert(strip_version(&vs.url), vs);
                    }
                }
                Some("CodeSystem") => {
                    if let Ok(cs) = serde_json::from_value::<CodeSystem>(resource.clone()) {
                        service.code_systems.insert(strip_version(&cs.url), cs);
                    }
                }
                _ => continue,
            }
        }
        Ok(service)
    }

    pub fn lookup(&self, value_set_url: &str, code: &str) -> Lookup {
        let key = strip_version(value_set_url);
        let Some(value_set) = self.value_sets.get(&key) else {
            return Lookup::SetUnknown;
        };
        let Some(compose) = value_set.compose.as_ref() else {
            return Lookup::SetUnknown;
        };

        let mut any_known = false;
        for include in &compose.include {
            let Some(codes) = self.include_codes(include) else {
                continue;
            };
            any_known = true;
            if codes.contains(code) {
                return Lookup::InSet;
            }
        }
        if any_known {
            Lookup::NotInSet
        } else {
            Lookup::SetUnknown
        }
    }

    fn include_codes(&self, include: &ValueSetInclude) -> Option<HashSet<String>> {
        if let Some(concepts) = &include.concept {
            return Some(concepts.iter().map(|c| c.code.clone()).collect());
        }
        if let Some(filters) = &include.filter {
            let mut codes = HashSet::new();
            for filter in filters {
                match filter.op.as_str() {
                    "=" => {
                        codes.insert(filter.value.clone());
                    }
                    "in" => codes.extend(filter.value.split(',').map(|s| s.trim().to_string())),
                    _ => {} // operators outside "=" and "in" are out of scope (§4.6)
                }
            }
            return Some(codes);
        }
        if let Some(system) = &include.system {
            return self
                .code_systems
                .get(&strip_version(system))
                .map(|cs| cs.all_codes().into_iter().map(str::to_string).collect());
        }
        None
    }
}

fn strip_version(url: &str) -> String {
    url.split('|').next().unwrap_or(url).to_string()
}

pub fn check(
    resource: &Value,
    resource_type: &str,
    schema: &StructureDefinition,
    service: Option<&TerminologyService>,
    issues: &mut Vec<Issue>,
) {
    let Some(service) = service else {
        return;
    };
    let Some(snapshot) = schema.snapshot.as_ref() else {
        return;
    };

    for element in &snapshot.element {
        let Some(binding) = element.binding.as_ref() else {
            continue;
        };
        if !matches!(binding.strength, BindingStrength::Required | BindingStrength::Extensible) {
            continue;
        }
        let Some(value_set_url) = binding.value_set.as_deref() else {
            continue;
        };
        let Some(relative) = element.path.strip_prefix(resource_type).and_then(|s| s.strip_prefix('.')) else {
            continue;
        };
        let segments: Vec<&str> = relative.split('.').collect();

        let mut found = Vec::new();
        collect_values(resource, resource_type, &segments, &mut found);

        for (value, path) in found {
            for (_system, code) in extract_codes(&value) {
                match service.lookup(value_set_url, &code) {
                    Lookup::InSet => {}
                    Lookup::NotInSet => {
                        let severity = if binding.strength == BindingStrength::Required {
                            IssueSeverity::Error
                        } else {
                            IssueSeverity::Warning
                        };
                        issues.push(
                            Issue::new(
                                severity,
                                IssueCode::CodeInvalid,
                                format!("code '{code}' is not in value set '{value_set_url}'"),
                            )
                            .with_path(path.clone()),
                        );
                    }
                    Lookup::SetUnknown => {
                        issues.push(
                            Issue::warning(
                                IssueCode::CodeInvalid,
                                format!("value set '{value_set_url}' could not be resolved"),
                            )
                            .with_path(path.clone()),
                        );
                    }
                }
            }
        }
    }
}

fn collect_values(value: &Value, path: &str, segments: &[&str], out: &mut Vec<(Value, String)>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push((value.clone(), path.to_string()));
        return;
    };
    match value {
        Value::Array(items) => {
            for item in items {
                collect_values(item, path, segments, out);
            }
        }
        Value::Object(map) => {
            if let Some(base) = head.strip_suffix("[x]") {
                for (k, v) in map {
                    if k.starts_with(base) && k.len() > base.len() {
                        collect_values(v, &format!("{path}.{k}"), rest, out);
                    }
                }
            } else if let Some(v) = map.get(*head) {
                collect_values(v, &format!("{path}.{head}"), rest, out);
            }
        }
        _ => {}
    }
}

fn extract_codes(value: &Value) -> Vec<(Option<String>, String)> {
    match value {
        Value::String(s) => vec![(None, s.clone())],
        Value::Object(map) => {
            if let Some(Value::Array(codings)) = map.get("coding") {
                codings
                    .iter()
                    .filter_map(|coding| {
                        let code = coding.get("code")?.as_str()?.to_string();
                        let system = coding.get("system").and_then(|s| s.as_str()).map(str::to_string);
                        Some((system, code))
                    })
                    .collect()
            } else if let Some(code) = map.get("code").and_then(|c| c.as_str()) {
                let system = map.get("system").and_then(|s| s.as_str()).map(str::to_string);
                vec![(system, code.to_string())]
            } else {
                vec![]
            }
        }
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn marital_status_bundle() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [{"resource": {
                "resourceType": "ValueSet",
                "url": "http://example.org/fhir/ValueSet/marital-status",
                "compose": {"include": [{
                    "system": "http://example.org/fhir/CodeSystem/marital-status",
                    "concept": [{"code": "M"}, {"code": "S"}]
                }]}
            }}]
        }))
        .unwrap()
    }

    fn schema_with_binding() -> StructureDefinition {
        serde_json::from_value(json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/Patient",
            "name": "Patient",
            "kind": "resource",
            "abstract": false,
            "type": "Patient",
            "snapshot": {"element": [
                {"path": "Patient"},
                {
                    "path": "Patient.maritalStatus",
                    "binding": {"strength": "required", "valueSet": "http://example.org/fhir/ValueSet/marital-status"}
                }
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn code_outside_value_set_is_an_error_for_required_binding() {
        let service = TerminologyService::from_bundle(&marital_status_bundle()).unwrap();
        let schema = schema_with_binding();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "maritalStatus": {"coding": [{"code": "X"}]}}),
            "Patient",
            &schema,
            Some(&service),
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
    }

    #[test]
    fn code_inside_value_set_is_accepted() {
        let service = TerminologyService::from_bundle(&marital_status_bundle()).unwrap();
        let schema = schema_with_binding();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "maritalStatus": {"coding": [{"code": "M"}]}}),
            "Patient",
            &schema,
            Some(&service),
            &mut issues,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn unresolved_value_set_is_a_warning() {
        let service = TerminologyService::new();
        let schema = schema_with_binding();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Patient", "maritalStatus": {"coding": [{"code": "M"}]}}),
            "Patient",
            &schema,
            Some(&service),
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
    }
}
