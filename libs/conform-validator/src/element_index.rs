//! Maps a resource path to its element definition: direct hits, choice-type
//! synthesis, and complex-type descent (§4.2).

use std::borrow::Cow;
use std::collections::HashMap;

use conform_models::{ElementDefinition, Snapshot, StructureDefinition, TypeRef};

use crate::registry::Registry;

/// Indexes a single schema's snapshot for O(1) path lookup.
pub struct ElementIndex<'a> {
    by_path: HashMap<&'a str, &'a ElementDefinition>,
    children_by_parent: HashMap<&'a str, Vec<&'a ElementDefinition>>,
}

impl<'a> ElementIndex<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        let mut by_path = HashMap::new();
        let mut children_by_parent: HashMap<&'a str, Vec<&'a ElementDefinition>> = HashMap::new();

        for element in &snapshot.element {
            by_path.insert(element.path.as_str(), element);
            if let Some(parent) = element.parent_path() {
                children_by_parent.entry(parent).or_default().push(element);
            }
        }

        Self {
            by_path,
            children_by_parent,
        }
    }

    pub fn get_element(&self, path: &str) -> Option<&'a ElementDefinition> {
        self.by_path.get(path).copied()
    }

    pub fn children_of(&self, parent_path: &str) -> &[&'a ElementDefinition] {
        self.children_by_parent
            .get(parent_path)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// The outcome of resolving a concrete resource path to an element definition.
pub enum Resolution<'a> {
    /// A direct hit in the schema's own index.
    Direct(&'a ElementDefinition),
    /// A choice element (`value[x]`), synthesized with a single concrete type.
    Choice(ElementDefinition),
    /// Resolved by descending into a complex type's own schema.
    Descended(ElementDefinition),
    Unknown,
}

impl<'a> Resolution<'a> {
    pub fn element(&self) -> Option<&ElementDefinition> {
        match self {
            Resolution::Direct(e) => Some(e),
            Resolution::Choice(e) | Resolution::Descended(e) => Some(e),
            Resolution::Unknown => None,
        }
    }
}

/// Resolves `path` within `index` using only direct-hit and choice-type
/// synthesis (no complex-type descent) — used both as the top-level first
/// two steps and to type ancestors during descent.
fn resolve_shallow<'a>(index: &ElementIndex<'a>, path: &str) -> Option<Cow<'a, ElementDefinition>> {
    if let Some(e) = index.get_element(path) {
        return Some(Cow::Borrowed(e));
    }

    let (parent, last) = match path.rfind('.') {
        Some(pos) => (Some(&path[..pos]), &path[pos + 1..]),
        None => (None, path),
    };

    // Try every uppercase boundary in the final segment, leftmost (longest
    // suffix) first, looking for a declared `<base>[x]` choice element.
    for (i, c) in last.char_indices() {
        if i == 0 || !c.is_uppercase() {
            continue;
        }
        let base = &last[..i];
        let suffix = &last[i..];
        let candidate = match parent {
            Some(p) => format!("{p}.{base}[x]"),
            None => format!("{base}[x]"),
        };
        if let Some(choice_element) = index.get_element(&candidate) {
            let mut synthesized = choice_element.clone();
            synthesized.path = path.to_string();
            synthesized.types = Some(vec![TypeRef::simple(type_code_for_suffix(suffix))]);
            return Some(Cow::Owned(synthesized));
        }
    }

    None
}

pub(crate) fn type_code_for_suffix(suffix: &str) -> String {
    let mut chars = suffix.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Registry lookups and canonical URLs are built from the type's own
/// capitalization (`Quantity`, `HumanName`). Choice synthesis lowercases the
/// leading letter for primitive dispatch (`type_code_for_suffix`), so descent
/// has to undo that before consulting the registry.
pub(crate) fn capitalized_type_name(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

const PRIMITIVE_TYPE_CODES: &[&str] = &[
    "boolean", "integer", "positiveInt", "unsignedInt", "decimal", "string", "markdown", "uri",
    "url", "canonical", "code", "id", "oid", "uuid", "date", "dateTime", "instant", "time",
    "base64Binary", "xhtml",
];

pub(crate) fn is_complex_type_code(code: &str) -> bool {
    !PRIMITIVE_TYPE_CODES.contains(&code) && code != "Reference" && code != "Resource"
}

/// Full path resolution (§4.2 steps 1-3): direct hit, choice synthesis, or
/// recursive complex-type descent through the registry.
pub fn resolve<'a>(registry: &Registry, index: &ElementIndex<'a>, path: &str) -> Resolution<'a> {
    if let Some(e) = index.get_element(path) {
        return Resolution::Direct(e);
    }
    if let Some(Cow::Owned(synthesized)) = resolve_shallow(index, path) {
        return Resolution::Choice(synthesized);
    }

    // Complex-type descent: walk ancestor prefixes, longest first.
    let mut ancestor_end = path.rfind('.');
    while let Some(end) = ancestor_end {
        let ancestor = &path[..end];
        if let Some(ancestor_def) = resolve_shallow(index, ancestor) {
            for type_ref in ancestor_def.types.clone().unwrap_or_default() {
                if !is_complex_type_code(&type_ref.code) {
                    continue;
                }
                let type_name = capitalized_type_name(&type_ref.code);
                let Some(sub_schema) = registry.resolve_type(&type_name) else {
                    continue;
                };
                let Some(sub_snapshot) = sub_schema.snapshot.as_ref() else {
                    continue;
                };
                let sub_index = ElementIndex::new(sub_snapshot);
                let suffix = &path[end..]; // includes leading '.'
                let sub_path = format!("{}{}", type_name, suffix);
                match resolve(registry, &sub_index, &sub_path) {
                    Resolution::Unknown => continue,
                    other => {
                        if let Some(mut resolved) = other.element().cloned() {
                            resolved.path = path.to_string();
                            return Resolution::Descended(resolved);
                        }
                    }
                }
            }
        }
        ancestor_end = ancestor.rfind('.');
    }

    Resolution::Unknown
}

#[allow(dead_code)]
pub fn type_name_for_resource(sd: &StructureDefinition) -> &str {
    &sd.type_name
}
