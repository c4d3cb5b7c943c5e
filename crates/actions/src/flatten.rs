//! Path-joined flattening of nested JSON.
//!
//! `{"tts": {"check": true, "text": "hi"}}` flattens to
//! `{"tts.check": true, "tts.text": "hi"}`. Array elements use their index
//! as the path segment. Empty objects and arrays are kept as leaf values so
//! that [`Flattener::unflatten`] can restore them.
//!
//! Unflattening has to guess whether a level was an array: a level whose
//! keys are exactly `"0"`, `"1"`, ... `"n-1"` becomes an array. An object
//! that genuinely used such keys comes back as an array.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub const DEFAULT_SEPARATOR: &str = ".";

/// Flattens and unflattens JSON using a fixed path separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flattener {
    separator: String,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl Flattener {
    /// An empty separator falls back to `"."`.
    pub fn new(separator: impl Into<String>) -> Self {
        let separator = separator.into();
        Self {
            separator: if separator.is_empty() {
                DEFAULT_SEPARATOR.to_string()
            } else {
                separator
            },
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Flatten `value` into a single-level map of path-joined keys.
    ///
    /// A scalar at the top level is stored under the empty key.
    pub fn flatten(&self, value: &Value) -> Map<String, Value> {
        let mut out = Map::new();
        match value {
            Value::Object(_) | Value::Array(_) if !is_empty_container(value) => {
                self.flatten_into(value, None, &mut out);
            }
            Value::Object(_) | Value::Array(_) => {}
            scalar => {
                out.insert(String::new(), scalar.clone());
            }
        }
        out
    }

    fn flatten_into(&self, value: &Value, prefix: Option<&str>, out: &mut Map<String, Value>) {
        let join = |segment: &str| match prefix {
            Some(p) => format!("{p}{}{segment}", self.separator),
            None => segment.to_string(),
        };
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    self.flatten_into(child, Some(&join(key)), out);
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for (index, child) in items.iter().enumerate() {
                    self.flatten_into(child, Some(&join(&index.to_string())), out);
                }
            }
            leaf => {
                out.insert(prefix.unwrap_or_default().to_string(), leaf.clone());
            }
        }
    }

    /// Rebuild a nested value from path-joined keys.
    ///
    /// Values that are already nested are kept as they are. When a key is
    /// both a leaf and a prefix of other keys, the nested keys win.
    pub fn unflatten(&self, flat: &Map<String, Value>) -> Value {
        if flat.len() == 1 {
            if let Some(scalar) = flat.get("") {
                return scalar.clone();
            }
        }

        let mut root = Node::default();
        for (key, value) in flat {
            let segments: Vec<&str> = key.split(self.separator.as_str()).collect();
            root.insert(&segments, value.clone());
        }
        root.into_value()
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

// ── Unflatten tree ──────────────────────────────────────────────────

enum Node {
    Leaf(Value),
    Branch(BTreeMap<String, Node>),
}

impl Default for Node {
    fn default() -> Self {
        Node::Branch(BTreeMap::new())
    }
}

impl Node {
    fn insert(&mut self, segments: &[&str], value: Value) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        if !matches!(self, Node::Branch(_)) {
            *self = Node::default();
        }
        let Node::Branch(children) = self else {
            return;
        };
        if rest.is_empty() {
            match children.get(*head) {
                // A deeper key already claimed this path.
                Some(Node::Branch(existing)) if !existing.is_empty() => {}
                _ => {
                    children.insert(head.to_string(), Node::Leaf(value));
                }
            }
        } else {
            children.entry(head.to_string()).or_default().insert(rest, value);
        }
    }

    fn into_value(self) -> Value {
        match self {
            Node::Leaf(value) => value,
            Node::Branch(children) => {
                if let Some(items) = as_contiguous_indices(&children) {
                    let mut slots: Vec<Option<Node>> = (0..items).map(|_| None).collect();
                    for (key, child) in children {
                        if let Ok(index) = key.parse::<usize>() {
                            slots[index] = Some(child);
                        }
                    }
                    Value::Array(
                        slots
                            .into_iter()
                            .map(|slot| slot.map(Node::into_value).unwrap_or(Value::Null))
                            .collect(),
                    )
                } else {
                    Value::Object(
                        children
                            .into_iter()
                            .map(|(key, child)| (key, child.into_value()))
                            .collect(),
                    )
                }
            }
        }
    }
}

/// `Some(n)` when the keys are exactly the canonical indices `0..n`.
fn as_contiguous_indices(children: &BTreeMap<String, Node>) -> Option<usize> {
    if children.is_empty() {
        return None;
    }
    let mut seen = vec![false; children.len()];
    for key in children.keys() {
        let index: usize = key.parse().ok()?;
        if index.to_string() != *key || index >= seen.len() {
            return None;
        }
        seen[index] = true;
    }
    seen.iter().all(|s| *s).then_some(children.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(value: Value) {
        let f = Flattener::default();
        let flat = f.flatten(&value);
        assert_eq!(f.unflatten(&flat), value, "flattened as {flat:?}");
    }

    #[test]
    fn flat_object_round_trips() {
        round_trip(json!({"id": 1, "name": "x", "on": true, "gone": null}));
    }

    #[test]
    fn two_level_object_round_trips() {
        round_trip(json!({
            "id": 4,
            "tts": {"check": "true", "text": "thanks {nickname}"},
            "overlay": {"check": false, "src": "a.gif", "duration": 5}
        }));
    }

    #[test]
    fn array_of_primitives_round_trips() {
        round_trip(json!({"keys": ["a", "b", "c"], "weights": [1, 2.5]}));
    }

    #[test]
    fn array_of_objects_round_trips() {
        round_trip(json!({"steps": [{"key": "w", "hold": 100}, {"key": "s"}]}));
    }

    #[test]
    fn flatten_joins_paths() {
        let flat = Flattener::default().flatten(&json!({"tts": {"check": true}, "k": [{"x": 1}]}));
        assert_eq!(flat.get("tts.check"), Some(&json!(true)));
        assert_eq!(flat.get("k.0.x"), Some(&json!(1)));
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn empty_containers_are_kept() {
        round_trip(json!({"tags": [], "meta": {}, "nested": {"list": []}}));
    }

    #[test]
    fn custom_separator() {
        let f = Flattener::new("/");
        let flat = f.flatten(&json!({"tts": {"text": "a.b"}}));
        assert_eq!(flat.get("tts/text"), Some(&json!("a.b")));
        assert_eq!(f.unflatten(&flat), json!({"tts": {"text": "a.b"}}));
    }

    #[test]
    fn non_contiguous_numeric_keys_stay_an_object() {
        let f = Flattener::default();
        let flat: Map<String, Value> =
            serde_json::from_value(json!({"slots.0": "a", "slots.2": "c"})).unwrap();
        assert_eq!(f.unflatten(&flat), json!({"slots": {"0": "a", "2": "c"}}));

        let padded: Map<String, Value> =
            serde_json::from_value(json!({"slots.00": "a", "slots.1": "b"})).unwrap();
        assert_eq!(f.unflatten(&padded), json!({"slots": {"00": "a", "1": "b"}}));
    }

    #[test]
    fn already_nested_values_pass_through() {
        let f = Flattener::default();
        let flat: Map<String, Value> =
            serde_json::from_value(json!({"id": 2, "tts": {"check": true, "text": "hi"}})).unwrap();
        assert_eq!(f.unflatten(&flat), json!({"id": 2, "tts": {"check": true, "text": "hi"}}));
    }

    #[test]
    fn nested_keys_win_over_conflicting_leaf() {
        let f = Flattener::default();
        let flat: Map<String, Value> =
            serde_json::from_value(json!({"tts": "broken", "tts.text": "hi"})).unwrap();
        assert_eq!(f.unflatten(&flat), json!({"tts": {"text": "hi"}}));
    }

    #[test]
    fn top_level_scalar_round_trips() {
        round_trip(json!("just text"));
    }
}
