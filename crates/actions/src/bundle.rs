//! Nested action bundles and the fixed table of action kinds.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use streamcue_core::value::{coerce_id, is_true_flag};

// ── Action kinds ────────────────────────────────────────────────────

/// Side-effecting action kinds, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Minecraft,
    Tts,
    Overlay,
    Keypress,
    FetchForm,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Minecraft,
        ActionKind::Tts,
        ActionKind::Overlay,
        ActionKind::Keypress,
        ActionKind::FetchForm,
    ];

    /// Key of this kind's section in a bundle.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Minecraft => "minecraft",
            ActionKind::Tts => "tts",
            ActionKind::Overlay => "overlay",
            ActionKind::Keypress => "keypress",
            ActionKind::FetchForm => "fetchForm",
        }
    }

    /// Fields that must be present on the section before the kind may fire.
    pub fn verify_fields(&self) -> &'static [&'static str] {
        match self {
            ActionKind::Minecraft => &["command"],
            ActionKind::Tts => &["text"],
            ActionKind::Overlay => &["src"],
            ActionKind::Keypress => &["key"],
            ActionKind::FetchForm => &["value"],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Bundle ──────────────────────────────────────────────────────────

/// One stored action record in nested form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionBundle {
    /// Coerced from `body["id"]`.
    #[serde(skip)]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ActionBundle {
    /// Wrap an unflattened record. Non-object values yield an empty bundle.
    pub fn from_value(value: Value) -> Self {
        let body = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let id = body.get("id").and_then(coerce_id);
        Self { id, body }
    }

    /// The section for `kind`, when it is an object.
    pub fn section(&self, kind: ActionKind) -> Option<&Map<String, Value>> {
        self.body.get(kind.as_str()).and_then(Value::as_object)
    }

    /// The section for `kind` if it is enabled and carries every verify field.
    ///
    /// `check` must be `true` or `"true"`. A verify field passes when its key
    /// is present, whatever its value.
    pub fn enabled_section(&self, kind: ActionKind) -> Option<&Map<String, Value>> {
        let section = self.section(kind)?;
        let checked = section.get("check").is_some_and(is_true_flag);
        let verified = kind
            .verify_fields()
            .iter()
            .all(|field| section.contains_key(*field));
        (checked && verified).then_some(section)
    }

    /// Kinds that would fire for this bundle, in dispatch order.
    pub fn enabled_kinds(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| self.enabled_section(*kind).is_some())
            .collect()
    }
}
