//! End-to-end scenarios exercising the full fixed pass order through the
//! public `Validator` surface, plus the cross-cutting properties the engine
//! is expected to hold regardless of which checker produced an issue.

use std::sync::Arc;

use conform_validator::{new_validator, CancelToken, IssueCode, Registry, ValidatorOptions};
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
            {"path": "Patient.id", "type": [{"code": "id"}]},
            {"path": "Patient.active", "type": [{"code": "boolean"}]},
            {"path": "Patient.name", "max": "*", "type": [{"code": "HumanName"}]},
            {"path": "Patient.gender", "type": [{"code": "code"}]},
            {"path": "Patient.birthDate", "type": [{"code": "date"}]},
            {"path": "Patient.multipleBirthInteger", "type": [{"code": "integer"}]},
            {
                "path": "Patient.contact",
                "max": "*",
                "constraint": [{
                    "key": "pat-1",
                    "severity": "error",
                    "human": "contact must have at least one of name, telecom, address, or organization",
                    "expression": "name.exists() or telecom.exists() or address.exists() or organization.exists()"
                }]
            },
            {"path": "Patient.contact.name", "type": [{"code": "HumanName"}]},
            {"path": "Patient.contact.relationship", "max": "*", "type": [{"code": "CodeableConcept"}]}
        ]}
    }))
    .unwrap()
}

fn human_name_schema_bytes() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "resourceType": "StructureDefinition",
        "url": "http://hl7.org/fhir/StructureDefinition/HumanName",
        "name": "HumanName",
        "kind": "complex-type",
        "abstract": false,
        "type": "HumanName",
        "snapshot": {"element": [
            {"path": "HumanName"},
            {"path": "HumanName.family", "type": [{"code": "string"}]},
            {"path": "HumanName.given", "max": "*", "type": [{"code": "string"}]}
        ]}
    }))
    .unwrap()
}

fn codeable_concept_schema_bytes() -> Vec<u8> {
    serde_json::to_vec(&json!({
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
    }))
    .unwrap()
}

fn observation_schema_bytes() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "resourceType": "StructureDefinition",
        "url": "http://hl7.org/fhir/StructureDefinition/Observation",
        "name": "Observation",
        "kind": "resource",
        "abstract": false,
        "type": "Observation",
        "snapshot": {"element": [
            {"path": "Observation"},
            {"path": "Observation.id", "type": [{"code": "id"}]},
            {
                "path": "Observation.subject",
                "type": [{"code": "Reference", "targetProfile": ["http://hl7.org/fhir/StructureDefinition/Patient"]}]
            }
        ]}
    }))
    .unwrap()
}

fn registry_with_patient_and_observation() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry.load_single(&patient_schema_bytes()).unwrap();
    registry.load_single(&human_name_schema_bytes()).unwrap();
    registry.load_single(&codeable_concept_schema_bytes()).unwrap();
    registry.load_single(&observation_schema_bytes()).unwrap();
    registry
}

// S1 — a well-formed Patient validates cleanly.
#[test]
fn s1_valid_patient() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    let result = validator.validate(
        &cancel,
        br#"{"resourceType":"Patient","id":"p1","active":true,"name":[{"family":"Doe","given":["John"]}],"gender":"male","birthDate":"1990-01-01"}"#,
    );
    assert!(result.valid, "unexpected issues: {:?}", result.issues);
}

// S2 — a contact with only a relationship coding violates pat-1.
#[test]
fn s2_pat1_violation() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    let result = validator.validate(
        &cancel,
        br#"{"resourceType":"Patient","id":"p1","contact":[{"relationship":[{"text":"friend"}]}]}"#,
    );
    let pat1 = result
        .issues
        .iter()
        .find(|i| i.code == IssueCode::Invariant && i.diagnostics.contains("pat-1"))
        .expect("expected a pat-1 invariant issue");
    assert_eq!(pat1.expression_path.as_ref().unwrap()[0], "Patient.contact");
}

// S3 — three malformed primitives each report a distinct value error.
#[test]
fn s3_invalid_primitives() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    let result = validator.validate(
        &cancel,
        br#"{"resourceType":"Patient","id":"p","active":"yes","birthDate":"not-a-date","multipleBirthInteger":"three"}"#,
    );
    let value_paths: Vec<&str> = result
        .issues
        .iter()
        .filter(|i| i.code == IssueCode::Value)
        .map(|i| i.location_path.as_ref().unwrap()[0].as_str())
        .collect();
    assert!(value_paths.contains(&"Patient.active"));
    assert!(value_paths.contains(&"Patient.birthDate"));
    assert!(value_paths.contains(&"Patient.multipleBirthInteger"));
    assert_eq!(value_paths.len(), 3);
}

// S4 — a document Bundle missing identifier, timestamp, and a leading
// Composition trips bdl-9, bdl-10, and bdl-11 each exactly once.
#[test]
fn s4_document_bundle_missing_envelope_fields() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    let result = validator.validate(
        &cancel,
        br#"{"resourceType":"Bundle","type":"document","entry":[{"resource":{"resourceType":"Patient","id":"p1"}}]}"#,
    );
    for rule in ["bdl-9", "bdl-10", "bdl-11"] {
        let count = result.issues.iter().filter(|i| i.diagnostics.starts_with(rule)).count();
        assert_eq!(count, 1, "expected exactly one {rule} issue, found {count}");
    }
}

// S5 — two entries sharing a fullUrl but differing by meta.versionId are not
// a bdl-7 collision.
#[test]
fn s5_bdl7_versionid_tiebreaker() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    let result = validator.validate(
        &cancel,
        br#"{"resourceType":"Bundle","type":"collection","entry":[
            {"fullUrl":"http://x/Patient/1","resource":{"resourceType":"Patient","id":"1","meta":{"versionId":"1"}}},
            {"fullUrl":"http://x/Patient/1","resource":{"resourceType":"Patient","id":"1","meta":{"versionId":"2"}}}
        ]}"#,
    );
    assert!(!result.issues.iter().any(|i| i.diagnostics.starts_with("bdl-7")));
}

// S6 — a contained reference with no contained array is not-found.
#[test]
fn s6_contained_reference_miss() {
    let registry = registry_with_patient_and_observation();
    let options = ValidatorOptions::default().with_references(true);
    let validator = new_validator(registry, options);
    let cancel = CancelToken::new();
    let result = validator.validate(
        &cancel,
        br#"{"resourceType":"Observation","id":"o1","subject":{"reference":"#missing"}}"#,
    );
    let not_found: Vec<_> = result.issues.iter().filter(|i| i.code == IssueCode::NotFound).collect();
    assert_eq!(not_found.len(), 1);
    assert_eq!(not_found[0].location_path.as_ref().unwrap()[0], "Observation.subject.reference");
}

// Universal property 1 — parse purity: validating the same bytes twice
// yields identical issue multisets.
#[test]
fn parse_purity() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let bytes = br#"{"resourceType":"Patient","id":"p1","contact":[{"relationship":[{"text":"friend"}]}]}"#;
    let first = validator.validate(&CancelToken::new(), bytes);
    let second = validator.validate(&CancelToken::new(), bytes);
    assert_eq!(first.issues, second.issues);
}

// Universal property 2 — result monotonicity: adding a violating field
// strictly grows the error count.
#[test]
fn result_monotonicity_on_violating_field() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    let before = validator.validate(&cancel, br#"{"resourceType":"Patient","id":"p1","active":true}"#);
    let after = validator.validate(&cancel, br#"{"resourceType":"Patient","id":"p1","active":true,"birthDate":"not-a-date"}"#);
    assert!(after.error_count() > before.error_count());
}

// Universal property 3 — registry idempotence: loading the same bundle
// twice leaves the registry observably identical.
#[test]
fn registry_idempotence() {
    let registry = Registry::new();
    let bundle = json!({"resourceType": "Bundle", "type": "collection", "entry": [
        {"resource": serde_json::from_slice::<serde_json::Value>(&patient_schema_bytes()).unwrap()}
    ]});
    let bytes = serde_json::to_vec(&bundle).unwrap();
    registry.load_bundle(&bytes).unwrap();
    let first_list = registry.list();
    registry.load_bundle(&bytes).unwrap();
    let second_list = registry.list();
    assert_eq!(first_list, second_list);
}

// Universal property 6 — cancellation safety: a token signaled before the
// call returns an empty issue list.
#[test]
fn cancellation_before_call_returns_empty() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = validator.validate(
        &cancel,
        br#"{"resourceType":"Patient","id":"p1","contact":[{"relationship":[{"text":"friend"}]}]}"#,
    );
    assert!(result.issues.is_empty());
}

// Universal property 8 — ele-1 coverage: an empty mapping produces exactly
// one ele-1 issue at its path.
#[test]
fn ele1_coverage_for_empty_nested_object() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    let result = validator.validate(&cancel, br#"{"resourceType":"Patient","id":"p1","name":[{}]}"#);
    let ele1_hits: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.diagnostics.contains("ele-1") && i.location_path.as_ref().unwrap()[0] == "Patient.name")
        .collect();
    assert_eq!(ele1_hits.len(), 1);
}

// Universal property 9 — bundle duplicate detection: two entries with
// identical fullUrl and no versionId differentiation produce exactly one
// bdl-7 issue.
#[test]
fn bundle_duplicate_detection() {
    let registry = registry_with_patient_and_observation();
    let validator = new_validator(registry, ValidatorOptions::default());
    let cancel = CancelToken::new();
    let result = validator.validate(
        &cancel,
        br#"{"resourceType":"Bundle","type":"collection","entry":[
            {"fullUrl":"urn:uuid:1","resource":{"resourceType":"Patient","id":"1"}},
            {"fullUrl":"urn:uuid:1","resource":{"resourceType":"Patient","id":"2"}}
        ]}"#,
    );
    let bdl7_count = result.issues.iter().filter(|i| i.diagnostics.starts_with("bdl-7")).count();
    assert_eq!(bdl7_count, 1);
}
