//! The runtime value shape: every expression evaluates to a collection of
//! JSON values, never a bare scalar.

use serde_json::Value;

pub type Collection = Vec<Value>;

/// Truthiness of a collection, per the evaluation rule: empty is false, a
/// single boolean is its own value, anything else (including a single
/// non-boolean item or more than one item) is true.
pub fn truthy(collection: &[Value]) -> bool {
    match collection {
        [] => false,
        [Value::Bool(b)] => *b,
        _ => true,
    }
}

pub fn single_bool(collection: &[Value]) -> Option<bool> {
    match collection {
        [Value::Bool(b)] => Some(*b),
        _ => None,
    }
}

pub fn of(value: Value) -> Collection {
    vec![value]
}

pub fn empty() -> Collection {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_is_false() {
        assert!(!truthy(&empty()));
    }

    #[test]
    fn single_boolean_passes_through() {
        assert!(truthy(&of(Value::Bool(true))));
        assert!(!truthy(&of(Value::Bool(false))));
    }

    #[test]
    fn single_non_boolean_is_true() {
        assert!(truthy(&of(Value::String("x".into()))));
    }

    #[test]
    fn multiple_items_is_true() {
        let collection = vec![Value::Bool(false), Value::Bool(false)];
        assert!(truthy(&collection));
    }
}
