//! Bundle envelope checker (§4.9): the `bdl-1` through `bdl-12` rules, plus
//! recursive per-entry validation of each wrapped resource.

use std::collections::HashMap;

use conform_models::BundleType;
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::checks::invariant::ExpressionCache;
use crate::checks::terminology::TerminologyService;
use crate::options::ValidatorOptions;
use crate::registry::Registry;
use crate::result::{Issue, IssueCode};

#[allow(clippy::too_many_arguments)]
pub fn check(
    resource: &Value,
    registry: &Registry,
    options: &ValidatorOptions,
    cache: &ExpressionCache,
    terminology_service: Option<&TerminologyService>,
    cancel: &CancelToken,
    issues: &mut Vec<Issue>,
) {
    let Some(obj) = resource.as_object() else {
        return;
    };

    let Some(bundle_type_str) = obj.get("type").and_then(|t| t.as_str()) else {
        issues.push(Issue::error(IssueCode::Required, "Bundle.type is required").with_path("Bundle.type"));
        return;
    };
    let Some(bundle_type) = serde_json::from_value::<BundleType>(Value::String(bundle_type_str.to_string())).ok()
    else {
        issues.push(
            Issue::error(IssueCode::Value, format!("'{bundle_type_str}' is not a recognized Bundle.type"))
                .with_path("Bundle.type"),
        );
        return;
    };

    let entries: Vec<Value> = obj.get("entry").and_then(|e| e.as_array()).cloned().unwrap_or_default();

    if obj.contains_key("total") && !matches!(bundle_type, BundleType::Searchset | BundleType::History) {
        issues.push(bdl_issue("bdl-1", "Bundle.total is only permitted for searchset or history bundles", "Bundle.total"));
    }

    for (i, entry) in entries.iter().enumerate() {
        check_entry_rules(entry, &format!("Bundle.entry[{i}]"), bundle_type, issues);
    }

    if !matches!(bundle_type, BundleType::History) {
        check_duplicate_full_urls(&entries, issues);
    }

    if matches!(bundle_type, BundleType::Document) {
        let identifier_ok = obj
            .get("identifier")
            .map(|identifier| {
                non_empty_str(identifier.get("system")) && non_empty_str(identifier.get("value"))
            })
            .unwrap_or(false);
        if !identifier_ok {
            issues.push(bdl_issue(
                "bdl-9",
                "a document Bundle requires identifier.system and identifier.value",
                "Bundle.identifier",
            ));
        }
        if !non_empty_str(obj.get("timestamp")) {
            issues.push(bdl_issue("bdl-10", "a document Bundle requires timestamp", "Bundle.timestamp"));
        }
        if first_entry_resource_type(&entries) != Some("Composition") {
            issues.push(bdl_issue(
                "bdl-11",
                "the first entry of a document Bundle must be a Composition",
                "Bundle.entry[0]",
            ));
        }
    }

    if matches!(bundle_type, BundleType::Message) && first_entry_resource_type(&entries) != Some("MessageHeader") {
        issues.push(bdl_issue(
            "bdl-12",
            "the first entry of a message Bundle must be a MessageHeader",
            "Bundle.entry[0]",
        ));
    }

    for (i, entry) in entries.iter().enumerate() {
        if cancel.is_cancelled() {
            return;
        }
        if let Some(inner) = entry.get("resource") {
            validate_entry_resource(
                inner,
                &format!("Bundle.entry[{i}]"),
                registry,
                options,
                cache,
                terminology_service,
                cancel,
                issues,
            );
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> bool {
    value.and_then(|v| v.as_str()).map(|s| !s.is_empty()).unwrap_or(false)
}

fn first_entry_resource_type(entries: &[Value]) -> Option<&str> {
    entries.first()?.get("resource")?.get("resourceType")?.as_str()
}

fn check_entry_rules(entry: &Value, path: &str, bundle_type: BundleType, issues: &mut Vec<Issue>) {
    let has_resource = entry.get("resource").is_some();
    let has_request = entry.get("request").is_some();
    let has_response = entry.get("response").is_some();
    let has_search = entry.get("search").is_some();

    if has_search && !matches!(bundle_type, BundleType::Searchset) {
        issues.push(bdl_issue("bdl-2", "entry.search is only permitted in searchset bundles", &format!("{path}.search")));
    }

    let request_required = matches!(bundle_type, BundleType::Transaction | BundleType::Batch | BundleType::History);
    if request_required && !has_request {
        issues.push(bdl_issue("bdl-3", "entry.request is required for this bundle type", path));
    } else if !request_required && has_request {
        issues.push(bdl_issue(
            "bdl-3",
            "entry.request is not permitted for this bundle type",
            &format!("{path}.request"),
        ));
    }

    let response_required =
        matches!(bundle_type, BundleType::TransactionResponse | BundleType::BatchResponse | BundleType::History);
    if response_required && !has_response {
        issues.push(bdl_issue("bdl-4", "entry.response is required for this bundle type", path));
    } else if !response_required && has_response {
        issues.push(bdl_issue(
            "bdl-4",
            "entry.response is not permitted for this bundle type",
            &format!("{path}.response"),
        ));
    }

    if !has_resource && !has_request && !has_response {
        issues.push(bdl_issue("bdl-5", "entry must have at least one of resource, request, or response", path));
    }

    if let Some(full_url) = entry.get("fullUrl").and_then(|f| f.as_str()) {
        if full_url.contains("/_history/") {
            issues.push(bdl_issue("bdl-8", "fullUrl must not contain /_history/", &format!("{path}.fullUrl")));
        }
    }

    if let Some(request) = entry.get("request") {
        let method = request.get("method").and_then(|m| m.as_str());
        if !matches!(method, Some("GET" | "HEAD" | "POST" | "PUT" | "DELETE" | "PATCH")) {
            issues.push(
                Issue::error(IssueCode::Value, "entry.request.method must be one of GET/HEAD/POST/PUT/DELETE/PATCH")
                    .with_path(format!("{path}.request.method")),
            );
        }
        if request.get("url").and_then(|u| u.as_str()).is_none() {
            issues.push(Issue::error(IssueCode::Required, "entry.request.url is required").with_path(format!("{path}.request.url")));
        }
    }
    if let Some(response) = entry.get("response") {
        if response.get("status").and_then(|s| s.as_str()).is_none() {
            issues.push(
                Issue::error(IssueCode::Required, "entry.response.status is required")
                    .with_path(format!("{path}.response.status")),
            );
        }
    }
    if let Some(search) = entry.get("search") {
        if let Some(mode) = search.get("mode").and_then(|m| m.as_str()) {
            if !matches!(mode, "match" | "include" | "outcome") {
                issues.push(
                    Issue::error(IssueCode::Value, format!("'{mode}' is not a recognized search.mode"))
                        .with_path(format!("{path}.search.mode")),
                );
            }
        }
        if let Some(score) = search.get("score").and_then(|s| s.as_f64()) {
            if !(0.0..=1.0).contains(&score) {
                issues.push(
                    Issue::error(IssueCode::Value, "search.score must be within [0, 1]")
                        .with_path(format!("{path}.search.score")),
                );
            }
        }
    }
}

/// bdl-7: `fullUrl` must be unique, but each entry's effective identity also
/// folds in its own resource's `meta.versionId` — two entries with the same
/// `fullUrl` but different version ids are distinct history entries, not a
/// collision.
fn check_duplicate_full_urls(entries: &[Value], issues: &mut Vec<Issue>) {
    let mut seen: HashMap<String, ()> = HashMap::new();
    for entry in entries {
        let Some(full_url) = entry.get("fullUrl").and_then(|f| f.as_str()) else {
            continue;
        };
        let version_id = entry
            .get("resource")
            .and_then(|r| r.get("meta"))
            .and_then(|m| m.get("versionId"))
            .and_then(|v| v.as_str());
        let key = match version_id {
            Some(v) => format!("{full_url}&{v}"),
            None => full_url.to_string(),
        };
        if seen.insert(key, ()).is_some() {
            issues.push(bdl_issue("bdl-7", &format!("duplicate fullUrl '{full_url}'"), "Bundle.entry"));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn validate_entry_resource(
    value: &Value,
    path: &str,
    registry: &Registry,
    options: &ValidatorOptions,
    cache: &ExpressionCache,
    terminology_service: Option<&TerminologyService>,
    cancel: &CancelToken,
    issues: &mut Vec<Issue>,
) {
    let Some(resource_type) = value.get("resourceType").and_then(|t| t.as_str()) else {
        issues.push(Issue::error(IssueCode::NotFound, "entry.resource is missing resourceType").with_path(path));
        return;
    };
    let Some(schema) = registry.resolve_type(resource_type) else {
        issues.push(
            Issue::error(IssueCode::NotFound, format!("no schema registered for type '{resource_type}'"))
                .with_path(path),
        );
        return;
    };

    super::walker::walk(resource_type, value, &schema, registry, options, cancel, issues);
    super::ele1::check(value, resource_type, issues);
    if options.validate_constraints {
        super::invariant::check(value, resource_type, &schema, cache, issues);
    }
    if options.validate_terminology {
        super::terminology::check(value, resource_type, &schema, terminology_service, issues);
    }
    if options.validate_extensions {
        super::extension::check(value, resource_type, registry, options, issues);
    }
    if resource_type == "Bundle" {
        check(value, registry, options, cache, terminology_service, cancel, issues);
    }
}

fn bdl_issue(rule: &str, message: &str, path: &str) -> Issue {
    Issue::error(IssueCode::Invariant, format!("{rule}: {message}")).with_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transaction_entry_without_request_is_flagged() {
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Bundle", "type": "transaction", "entry": [
                {"resource": {"resourceType": "Patient"}}
            ]}),
            &registry,
            &options,
            &ExpressionCache::new(),
            None,
            &CancelToken::new(),
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.diagnostics.starts_with("bdl-3")));
    }

    #[test]
    fn searchset_entry_request_is_rejected() {
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Bundle", "type": "searchset", "entry": [
                {"resource": {"resourceType": "Patient"}, "request": {"method": "GET", "url": "Patient"}}
            ]}),
            &registry,
            &options,
            &ExpressionCache::new(),
            None,
            &CancelToken::new(),
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.diagnostics.starts_with("bdl-3")));
    }

    #[test]
    fn duplicate_full_url_is_flagged() {
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Bundle", "type": "collection", "entry": [
                {"fullUrl": "urn:uuid:1", "resource": {"resourceType": "Patient"}},
                {"fullUrl": "urn:uuid:1", "resource": {"resourceType": "Patient"}}
            ]}),
            &registry,
            &options,
            &ExpressionCache::new(),
            None,
            &CancelToken::new(),
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.diagnostics.starts_with("bdl-7")));
    }

    #[test]
    fn document_bundle_requires_leading_composition() {
        let registry = Registry::new();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({
                "resourceType": "Bundle",
                "type": "document",
                "identifier": {"system": "urn:ietf:rfc:3986", "value": "urn:uuid:1"},
                "timestamp": "2020-01-01T00:00:00Z",
                "entry": [{"resource": {"resourceType": "Patient"}}]
            }),
            &registry,
            &options,
            &ExpressionCache::new(),
            None,
            &CancelToken::new(),
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.diagnostics.starts_with("bdl-11")));
    }

    #[test]
    fn entry_resource_runs_the_invariant_pass() {
        let registry = Registry::new();
        registry
            .load_single(&serde_json::to_vec(&json!({
                "resourceType": "StructureDefinition",
                "url": "http://hl7.org/fhir/StructureDefinition/Patient",
                "name": "Patient",
                "kind": "resource",
                "abstract": false,
                "type": "Patient",
                "snapshot": {"element": [
                    {"path": "Patient"},
                    {
                        "path": "Patient.contact",
                        "constraint": [{
                            "key": "pat-1",
                            "severity": "error",
                            "human": "contact must have at least one of name, telecom, or address",
                            "expression": "name.exists() or telecom.exists() or address.exists()"
                        }]
                    }
                ]}
            )))
            .unwrap())
            .unwrap();
        let options = ValidatorOptions::default();
        let mut issues = Vec::new();
        check(
            &json!({"resourceType": "Bundle", "type": "collection", "entry": [
                {"resource": {"resourceType": "Patient", "contact": [{}]}}
            ]}),
            &registry,
            &options,
            &ExpressionCache::new(),
            None,
            &CancelToken::new(),
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.diagnostics.starts_with("pat-1")));
    }
}
