//! Version-agnostic model for `CodeSystem` — the full code-system resource
//! the terminology checker's file-loaded variant can include wholesale.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeSystem {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept: Option<Vec<CodeSystemConcept>>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "CodeSystem".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeSystemConcept {
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Nested hierarchy; the registry flattens this when it builds the
    /// membership set (§4.6 treats a code-system inclusion as "all codes").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept: Option<Vec<CodeSystemConcept>>,
}

impl CodeSystem {
    /// All codes in this system, hierarchy flattened.
    pub fn all_codes(&self) -> Vec<&str> {
        fn collect<'a>(concepts: &'a [CodeSystemConcept], out: &mut Vec<&'a str>) {
            for c in concepts {
                out.push(c.code.as_str());
                if let Some(children) = &c.concept {
                    collect(children, out);
                }
            }
        }
        let mut out = Vec::new();
        if let Some(concepts) = &self.concept {
            collect(concepts, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn all_codes_flattens_nested_hierarchy() {
        let cs: CodeSystem = serde_json::from_value(json!({
            "resourceType": "CodeSystem",
            "url": "http://example.org/fhir/CodeSystem/x",
            "concept": [
                {"code": "a", "concept": [{"code": "a1"}]},
                {"code": "b"}
            ]
        }))
        .unwrap();
        assert_eq!(cs.all_codes(), vec!["a", "a1", "b"]);
    }
}
