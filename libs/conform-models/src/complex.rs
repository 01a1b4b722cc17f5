//! Small shared value types referenced by several resource kinds.
//!
//! These mirror the handful of complex datatypes that `StructureDefinition`,
//! `ValueSet` and `CodeSystem` all embed — kept in one module so each resource
//! file can `use super::complex::*;` the way sibling resource modules do.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Publication lifecycle status shared by conformance resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublicationStatus {
    Draft,
    Active,
    Retired,
    Unknown,
}

/// Strength of a terminology binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrength {
    Required,
    Extensible,
    Preferred,
    Example,
}

/// How a profile's element definitions relate to its base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeDerivationRule {
    Specialization,
    Constraint,
}

/// The structural kind a `StructureDefinition` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureDefinitionKind {
    PrimitiveType,
    ComplexType,
    Resource,
    Logical,
}

/// Contact details for the publisher of a conformance resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telecom: Option<Vec<Value>>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

/// A context of use the resource's content is intended to support.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageContext {
    pub code: Value,

    #[serde(flatten)]
    pub value: HashMap<String, Value>,
}
