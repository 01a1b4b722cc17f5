//! The top-level `Validator`: ties every check into the fixed pass order
//! from §5 (structure → primitives → ele-1 → constraints → terminology →
//! references → extensions → bundle), short-circuiting on cancellation
//! between passes.

use std::sync::Arc;

use serde_json::Value;

use crate::cancel::CancelToken;
use crate::checks::invariant::ExpressionCache;
use crate::checks::{bundle, ele1, extension, invariant, reference, terminology, walker};
use crate::options::ValidatorOptions;
use crate::registry::Registry;
use crate::checks::terminology::TerminologyService;
use crate::result::{Issue, IssueCode, ValidationResult};

/// A caller-supplied hook for asserting that an absolute or canonical
/// reference resolves. The engine ships no network implementation of its
/// own (resolving external references is out of scope, §1); callers that
/// care wire one in.
pub trait ReferenceResolver: Send + Sync {
    fn resolves(&self, reference: &str) -> bool;
}

pub struct Validator {
    registry: Arc<Registry>,
    options: ValidatorOptions,
    cache: ExpressionCache,
    terminology_service: Option<TerminologyService>,
    reference_resolver: Option<Box<dyn ReferenceResolver>>,
}

impl Validator {
    pub fn new(registry: Arc<Registry>, options: ValidatorOptions) -> Self {
        Self {
            registry,
            options,
            cache: ExpressionCache::new(),
            terminology_service: None,
            reference_resolver: None,
        }
    }

    pub fn with_terminology_service(mut self, service: TerminologyService) -> Self {
        self.terminology_service = Some(service);
        self
    }

    pub fn with_reference_resolver(mut self, resolver: Box<dyn ReferenceResolver>) -> Self {
        self.reference_resolver = Some(resolver);
        self
    }

    /// Parses `bytes` as JSON and validates the resulting tree.
    pub fn validate(&self, cancel: &CancelToken, bytes: &[u8]) -> ValidationResult {
        let tree: Value = match serde_json::from_slice(bytes) {
            Ok(tree) => tree,
            Err(e) => return ValidationResult::fatal(Issue::fatal(IssueCode::Invalid, format!("malformed resource bytes: {e}"))),
        };
        self.validate_parsed(cancel, &tree)
    }

    /// Validates an already-parsed resource tree.
    pub fn validate_parsed(&self, cancel: &CancelToken, tree: &Value) -> ValidationResult {
        let Some(resource_type) = tree.get("resourceType").and_then(|v| v.as_str()) else {
            return ValidationResult::fatal(Issue::fatal(IssueCode::NotFound, "resource has no string-valued resourceType"));
        };

        let schema = match &self.options.profile_url {
            Some(url) => match self.registry.require_profile(url) {
                Ok(sd) => sd,
                Err(e) => return ValidationResult::fatal(Issue::fatal(IssueCode::NotFound, e.to_string())),
            },
            None => match self.registry.require_type(resource_type) {
                Ok(sd) => sd,
                Err(e) => return ValidationResult::fatal(Issue::fatal(IssueCode::NotFound, e.to_string())),
            },
        };

        let mut issues = Vec::new();

        if cancel.is_cancelled() {
            return ValidationResult::from_issues(issues);
        }
        walker::walk(resource_type, tree, &schema, &self.registry, &self.options, cancel, &mut issues);
        if cancel.is_cancelled() {
            return ValidationResult::from_issues(issues);
        }

        ele1::check(tree, resource_type, &mut issues);
        if cancel.is_cancelled() {
            return ValidationResult::from_issues(issues);
        }

        if self.options.validate_constraints {
            invariant::check(tree, resource_type, &schema, &self.cache, &mut issues);
        }
        if cancel.is_cancelled() {
            return ValidationResult::from_issues(issues);
        }

        if self.options.validate_terminology {
            terminology::check(tree, resource_type, &schema, self.terminology_service.as_ref(), &mut issues);
        }
        if cancel.is_cancelled() {
            return ValidationResult::from_issues(issues);
        }

        if self.options.validate_references {
            reference::check(tree, resource_type, &schema, &mut issues);
            if let Some(resolver) = self.reference_resolver.as_deref() {
                check_external_references(tree, resolver, &mut issues);
            }
        }
        if cancel.is_cancelled() {
            return ValidationResult::from_issues(issues);
        }

        if self.options.validate_extensions {
            extension::check(tree, resource_type, &self.registry, &self.options, &mut issues);
        }
        if cancel.is_cancelled() {
            return ValidationResult::from_issues(issues);
        }

        if resource_type == "Bundle" {
            bundle::check(
                tree,
                &self.registry,
                &self.options,
                &self.cache,
                self.terminology_service.as_ref(),
                cancel,
                &mut issues,
            );
        }

        ValidationResult::from_issues(issues)
    }
}

/// Walks every `Reference.reference` string in the tree and asks the
/// resolver to confirm it resolves, warning (never erroring — the engine
/// has no authority over the resolver's reachability) when it says no.
fn check_external_references(value: &Value, resolver: &dyn ReferenceResolver, issues: &mut Vec<Issue>) {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("reference").and_then(|r| r.as_str()) {
                if (reference.starts_with("http://") || reference.starts_with("https://")) && !resolver.resolves(reference) {
                    issues.push(Issue::warning(IssueCode::NotFound, format!("reference '{reference}' did not resolve")));
                }
            }
            for v in map.values() {
                check_external_references(v, resolver, issues);
            }
        }
        Value::Array(items) => {
            for item in items {
                check_external_references(item, resolver, issues);
            }
        }
        _ => {}
    }
}

pub fn new_validator(registry: Arc<Registry>, options: ValidatorOptions) -> Validator {
    Validator::new(registry, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient_schema_bytes() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/Patient",
            "name": "Patient",
            "kind": "resource",
            "abstract": false,
            "type": "Patient",
            "snapshot": {"element": [
                {"path": "Patient"},
                {"path": "Patient.active", "type": [{"code": "boolean"}]}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn unknown_resource_type_is_fatal() {
        let registry = Arc::new(Registry::new());
        let validator = Validator::new(registry, ValidatorOptions::default());
        let cancel = CancelToken::new();
        let result = validator.validate(&cancel, br#"{"resourceType": "Widget"}"#);
        assert!(!result.valid);
        assert_eq!(result.issues[0].severity, crate::result::IssueSeverity::Fatal);
    }

    #[test]
    fn a_well_formed_resource_validates_cleanly() {
        let registry = Arc::new(Registry::new());
        registry.load_single(&patient_schema_bytes()).unwrap();
        let validator = Validator::new(registry, ValidatorOptions::default());
        let cancel = CancelToken::new();
        let result = validator.validate(&cancel, br#"{"resourceType": "Patient", "active": true}"#);
        assert!(result.valid, "unexpected issues: {:?}", result.issues);
    }

    #[test]
    fn cancellation_short_circuits_remaining_passes() {
        let registry = Arc::new(Registry::new());
        registry.load_single(&patient_schema_bytes()).unwrap();
        let validator = Validator::new(registry, ValidatorOptions::default());
        let cancel = CancelToken::new();
        cancel.cancel();
        let tree: Value = serde_json::from_slice(br#"{"resourceType": "Patient", "active": true}"#).unwrap();
        let result = validator.validate_parsed(&cancel, &tree);
        assert!(result.issues.is_empty());
    }
}
