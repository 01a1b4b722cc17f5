//! Version-agnostic model for `ElementDefinition` (the entries of a
//! `StructureDefinition`'s `snapshot`).

use super::complex::BindingStrength;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Defines a single element (a dotted path) within a resource or data type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    /// Dotted path, e.g. `Patient.name`. The terminal segment may be
    /// `<name>[x]` for a polymorphic ("choice") element.
    pub path: String,

    /// Minimum cardinality. Absent is treated as zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,

    /// Maximum cardinality: a decimal string, or `"*"` for unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,

    /// Ordered list of type references.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<TypeRef>>,

    /// Terminology binding, if this element carries coded values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<ElementBinding>,

    /// Path-expression invariants attached to this element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Vec<ElementConstraint>>,

    /// Whether implementations must support this element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_support: Option<bool>,

    /// Whether this element modifies the meaning of its siblings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_modifier: Option<bool>,

    /// Whether this element is part of the resource's summary view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_summary: Option<bool>,

    /// Everything else — including `fixed<Type>` / `pattern<Type>` keys,
    /// which are type-suffixed on the wire and picked apart by
    /// [`ElementDefinition::fixed_value`] / [`ElementDefinition::pattern_value`].
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

/// A type reference within an [`ElementDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    /// Type code: a primitive name, a complex type name, or `Reference` / `Resource`.
    pub code: String,

    /// Profile URLs the referenced type must conform to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Vec<String>>,

    /// For `Reference`/`canonical` types: allowed target profile URLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_profile: Option<Vec<String>>,
}

impl TypeRef {
    pub fn simple(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            profile: None,
            target_profile: None,
        }
    }
}

/// Terminology binding on an element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementBinding {
    pub strength: BindingStrength,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
}

/// A single path-expression invariant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementConstraint {
    /// Stable identifier, e.g. `pat-1`.
    pub key: String,

    pub severity: ConstraintSeverity,

    /// Human-readable description shown in diagnostics.
    pub human: String,

    /// The path-expression to evaluate. Absent constraints are kept
    /// (for round-tripping) but skipped by the invariant evaluator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Canonical URL of the profile that owns this constraint, if it is
    /// not the element's declaring schema itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintSeverity {
    Error,
    Warning,
}

impl ElementDefinition {
    /// Parent path: everything before the last `.`, or `None` at the root.
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rfind('.').map(|pos| &self.path[..pos])
    }

    /// True if `self.path` is a direct or transitive descendant of `parent_path`.
    pub fn is_descendant_of(&self, parent_path: &str) -> bool {
        self.path.starts_with(parent_path)
            && self.path.len() > parent_path.len()
            && self.path.as_bytes().get(parent_path.len()) == Some(&b'.')
    }

    /// True for a polymorphic element (`value[x]`-shaped path).
    pub fn is_choice_type(&self) -> bool {
        self.path.ends_with("[x]")
    }

    /// Type codes declared on this element, in order.
    pub fn type_codes(&self) -> Vec<&str> {
        self.types
            .as_ref()
            .map(|types| types.iter().map(|t| t.code.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn min(&self) -> u32 {
        self.min.unwrap_or(0)
    }

    /// `None` means unbounded (`max == "*"`).
    pub fn max(&self) -> Option<u32> {
        match self.max.as_deref() {
            None => None,
            Some("*") => None,
            Some(n) => n.parse().ok(),
        }
    }

    pub fn must_support(&self) -> bool {
        self.must_support.unwrap_or(false)
    }

    pub fn is_modifier(&self) -> bool {
        self.is_modifier.unwrap_or(false)
    }

    /// The value of the single `fixed<Type>` key, if present, along with
    /// the type suffix it was encoded under (e.g. `("String", value)`).
    pub fn fixed_value(&self) -> Option<(&str, &Value)> {
        find_suffixed(&self.extensions, "fixed")
    }

    /// The value of the single `pattern<Type>` key, if present.
    pub fn pattern_value(&self) -> Option<(&str, &Value)> {
        find_suffixed(&self.extensions, "pattern")
    }
}

fn find_suffixed<'a>(map: &'a HashMap<String, Value>, prefix: &str) -> Option<(&'a str, &'a Value)> {
    map.iter().find_map(|(k, v)| {
        k.strip_prefix(prefix)
            .filter(|suffix| !suffix.is_empty())
            .map(|suffix| (suffix, v))
    })
}

/// A schema's ordered element list, as captured in `snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Snapshot {
    pub element: Vec<ElementDefinition>,
}

impl Snapshot {
    pub fn get_element(&self, path: &str) -> Option<&ElementDefinition> {
        self.element.iter().find(|e| e.path == path)
    }

    /// Direct children of `parent_path` (one segment deeper, not grandchildren).
    pub fn children_of(&self, parent_path: &str) -> Vec<&ElementDefinition> {
        let expected_depth = parent_path.matches('.').count() + 1;
        self.element
            .iter()
            .filter(|e| {
                e.is_descendant_of(parent_path) && e.path.matches('.').count() == expected_depth
            })
            .collect()
    }
}
