//! Schema registry: ingests schema bundles and indexes them by canonical
//! URL and by resource type name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use conform_models::StructureDefinition;

use crate::error::{Error, Result};

/// Schemas are registered once and read concurrently thereafter; writers
/// take an exclusive lock, same shape as the donor's expanded-context cache.
#[derive(Default)]
pub struct Registry {
    by_url: RwLock<HashMap<String, Arc<StructureDefinition>>>,
    by_type: RwLock<HashMap<String, Arc<StructureDefinition>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an envelope of entries and registers every `StructureDefinition`
    /// entry found. Per-entry parse failures are skipped, not propagated.
    pub fn load_bundle(&self, bytes: &[u8]) -> Result<usize> {
        let envelope: serde_json::Value = serde_json::from_slice(bytes)?;
        let entries = envelope
            .get("entry")
            .and_then(|e| e.as_array())
            .cloned()
            .unwrap_or_default();

        let mut count = 0;
        for entry in entries {
            let Some(resource) = entry.get("resource") else {
                continue;
            };
            if resource.get("resourceType").and_then(|v| v.as_str()) != Some("StructureDefinition")
            {
                continue;
            }
            let Ok(sd) = serde_json::from_value::<StructureDefinition>(resource.clone()) else {
                continue;
            };
            self.register(sd);
            count += 1;
        }
        Ok(count)
    }

    /// Parses and registers a single schema.
    pub fn load_single(&self, bytes: &[u8]) -> Result<usize> {
        let sd: StructureDefinition = serde_json::from_slice(bytes)?;
        self.register(sd);
        Ok(1)
    }

    fn register(&self, sd: StructureDefinition) {
        let sd = Arc::new(sd);

        self.by_url
            .write()
            .expect("registry lock poisoned")
            .insert(sd.url.clone(), sd.clone());

        if sd.is_resource_kind() && !StructureDefinition::is_profile_url(&sd.url) {
            let mut by_type = self.by_type.write().expect("registry lock poisoned");
            let is_canonical = sd.url == StructureDefinition::canonical_url_for_type(&sd.type_name);
            match by_type.get(&sd.type_name) {
                Some(existing) if !is_canonical => {
                    let existing_is_canonical =
                        existing.url == StructureDefinition::canonical_url_for_type(&sd.type_name);
                    if !existing_is_canonical {
                        by_type.insert(sd.type_name.clone(), sd);
                    }
                }
                _ => {
                    by_type.insert(sd.type_name.clone(), sd);
                }
            }
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<StructureDefinition>> {
        self.by_url.read().expect("registry lock poisoned").get(url).cloned()
    }

    pub fn get_by_type(&self, type_name: &str) -> Option<Arc<StructureDefinition>> {
        self.by_type
            .read()
            .expect("registry lock poisoned")
            .get(type_name)
            .cloned()
    }

    /// Schema for `type_name`, preferring its canonical base definition.
    pub fn resolve_type(&self, type_name: &str) -> Option<Arc<StructureDefinition>> {
        self.get(&StructureDefinition::canonical_url_for_type(type_name))
            .or_else(|| self.get_by_type(type_name))
    }

    pub fn require_type(&self, type_name: &str) -> Result<Arc<StructureDefinition>> {
        self.resolve_type(type_name)
            .ok_or_else(|| Error::UnknownResourceType(type_name.to_string()))
    }

    pub fn require_profile(&self, url: &str) -> Result<Arc<StructureDefinition>> {
        self.get(url).ok_or_else(|| Error::UnknownProfile(url.to_string()))
    }

    pub fn list(&self) -> Vec<String> {
        self.by_url.read().expect("registry lock poisoned").keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient_sd_bytes() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/Patient",
            "name": "Patient",
            "kind": "resource",
            "abstract": false,
            "type": "Patient",
            "snapshot": {"element": [{"path": "Patient", "min": 0, "max": "*"}]}
        }))
        .unwrap()
    }

    #[test]
    fn load_single_registers_by_url_and_type() {
        let registry = Registry::new();
        registry.load_single(&patient_sd_bytes()).unwrap();
        assert!(registry.get("http://hl7.org/fhir/StructureDefinition/Patient").is_some());
        assert!(registry.get_by_type("Patient").is_some());
    }

    #[test]
    fn profile_urls_are_excluded_from_the_type_index() {
        let registry = Registry::new();
        let bytes = serde_json::to_vec(&json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/fhir/profile/my-patient",
            "name": "MyPatient",
            "kind": "resource",
            "abstract": false,
            "type": "Patient",
        }))
        .unwrap();
        registry.load_single(&bytes).unwrap();
        assert!(registry.get_by_type("Patient").is_none());
        assert!(registry.get("http://example.org/fhir/profile/my-patient").is_some());
    }

    #[test]
    fn loading_the_same_bundle_twice_is_idempotent() {
        let registry = Registry::new();
        let bundle = json!({"resourceType": "Bundle", "type": "collection", "entry": [
            {"resource": serde_json::from_slice::<serde_json::Value>(&patient_sd_bytes()).unwrap()}
        ]});
        let bytes = serde_json::to_vec(&bundle).unwrap();
        let first = registry.load_bundle(&bytes).unwrap();
        let second = registry.load_bundle(&bytes).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(registry.list().len(), 1);
    }
}
