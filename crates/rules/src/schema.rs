//! Stored rule records and evaluator results.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use streamcue_core::value::{coerce_string, is_truthy};

/// A user-authored rule, as persisted by the rule store.
///
/// Flags are kept as raw JSON because records are written by a form UI:
/// `isActive` only disables on a literal `false`, and `bypassChecks`
/// follows truthiness. Every field tolerates `null` and mistyped values,
/// so a record is only rejected when it is not an object at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass_checks: Option<Value>,
    #[serde(default, deserialize_with = "lenient_key", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_key", skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<Value>,
    /// Referenced action bundle ids (numbers or numeric strings). Anything
    /// other than an array references nothing.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub actions: Value,
}

/// Scalars become their string form; anything else is an empty name.
fn lenient_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(coerce_string).unwrap_or_default())
}

/// Predicate names must be strings; other values leave the slot unset.
fn lenient_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(name)) => Ok(Some(name)),
        _ => Ok(None),
    }
}

impl Rule {
    /// Only an explicit `false` deactivates a rule.
    pub fn is_active(&self) -> bool {
        !matches!(self.is_active, Some(Value::Bool(false)))
    }

    pub fn bypasses_checks(&self) -> bool {
        self.bypass_checks.as_ref().is_some_and(is_truthy)
    }

    /// The referenced action ids, empty when `actions` is not an array.
    pub fn action_ids(&self) -> &[Value] {
        match &self.actions {
            Value::Array(ids) => ids,
            _ => &[],
        }
    }

    /// Dedup key: the rule id, or its position in the stored list when absent.
    pub fn match_key(&self, index: usize) -> MatchKey {
        match self.id.as_ref().and_then(coerce_string) {
            Some(id) => MatchKey::Id(id),
            None => MatchKey::Index(index),
        }
    }
}

/// Parse a raw store payload into rules.
///
/// A non-array payload yields no rules. Entries that are not objects are
/// skipped.
pub fn parse_rules(raw: Value) -> Vec<Rule> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Null => return Vec::new(),
        _ => {
            warn!("rule payload is not an array, ignoring");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Rule>(item) {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed rule record");
                None
            }
        })
        .collect()
}

// ── Match result ────────────────────────────────────────────────────

/// Key under which a matched rule is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Id(String),
    Index(usize),
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKey::Id(id) => write!(f, "{id}"),
            MatchKey::Index(i) => write!(f, "#{i}"),
        }
    }
}

/// Matched rules for one (family, event) pair, in stored order,
/// at most one entry per key.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    entries: IndexMap<MatchKey, Rule>,
}

impl MatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a match. A repeated key replaces the earlier rule in place.
    pub(crate) fn insert(&mut self, key: MatchKey, rule: Rule) {
        self.entries.insert(key, rule);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &MatchKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &MatchKey) -> Option<&Rule> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &MatchKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MatchKey, &Rule)> {
        self.entries.iter()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.entries.into_values().collect()
    }
}
