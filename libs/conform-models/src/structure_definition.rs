//! Version-agnostic model for `StructureDefinition` — the schema resource
//! the registry indexes and the walker validates against.

use super::complex::{PublicationStatus, StructureDefinitionKind, TypeDerivationRule};
use super::element_definition::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A machine-readable description of a resource or data type, as an
/// ordered sequence of element definitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructureDefinition {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Canonical URL identifying this schema.
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PublicationStatus>,

    /// `primitive-type | complex-type | resource | logical`.
    pub kind: StructureDefinitionKind,

    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,

    /// The type this schema describes, e.g. `Patient` or `HumanName`.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Canonical URL of the schema this one derives from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<TypeDerivationRule>,

    /// Element definitions. Always present after registration — the
    /// registry rejects schemas with neither a snapshot nor any elements.
    #[serde(default)]
    pub snapshot: Option<Snapshot>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "StructureDefinition".to_string()
}

impl StructureDefinition {
    /// Canonical URL a complex-type descent or a `Reference`/choice-type
    /// lookup should use to resolve `type_name` against the registry.
    pub fn canonical_url_for_type(type_name: &str) -> String {
        format!("http://hl7.org/fhir/StructureDefinition/{type_name}")
    }

    pub fn is_resource_kind(&self) -> bool {
        matches!(self.kind, StructureDefinitionKind::Resource)
    }

    /// `true` for URLs the registry treats as profiles rather than base
    /// resource definitions (per the `/profile/` convention in §4.1).
    pub fn is_profile_url(url: &str) -> bool {
        url.contains("/profile/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_structure_definition() {
        let sd: StructureDefinition = serde_json::from_value(json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/Patient",
            "name": "Patient",
            "kind": "resource",
            "abstract": false,
            "type": "Patient",
        }))
        .unwrap();
        assert_eq!(sd.name, "Patient");
        assert!(sd.is_resource_kind());
        assert!(!sd.is_abstract);
    }

    #[test]
    fn canonical_url_for_type_uses_hl7_base() {
        assert_eq!(
            StructureDefinition::canonical_url_for_type("HumanName"),
            "http://hl7.org/fhir/StructureDefinition/HumanName"
        );
    }

    #[test]
    fn profile_url_detection_matches_profile_segment() {
        assert!(StructureDefinition::is_profile_url(
            "http://example.org/fhir/profile/my-patient"
        ));
        assert!(!StructureDefinition::is_profile_url(
            "http://hl7.org/fhir/StructureDefinition/Patient"
        ));
    }
}
