use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CoreError;
use crate::value::{coerce_bool, coerce_id, coerce_number, coerce_string, number_to_value};

/// Unique identifier for one received event (log correlation only).
pub type EventId = Uuid;

// ── Event family ──────────────────────────────────────────────

/// Event families that carry their own rule list and predicate sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventFamily {
    Chat,
    Gift,
    Bits,
    Likes,
    Follow,
}

impl EventFamily {
    pub const ALL: [EventFamily; 5] = [
        EventFamily::Chat,
        EventFamily::Gift,
        EventFamily::Bits,
        EventFamily::Likes,
        EventFamily::Follow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventFamily::Chat => "chat",
            EventFamily::Gift => "gift",
            EventFamily::Bits => "bits",
            EventFamily::Likes => "likes",
            EventFamily::Follow => "follow",
        }
    }
}

impl fmt::Display for EventFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(EventFamily::Chat),
            "gift" => Ok(EventFamily::Gift),
            "bits" => Ok(EventFamily::Bits),
            "likes" => Ok(EventFamily::Likes),
            "follow" => Ok(EventFamily::Follow),
            other => Err(CoreError::UnknownFamily(other.to_string())),
        }
    }
}

// ── Platform ──────────────────────────────────────────────────

/// Streaming platform an event was received from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "tiktok")]
    TikTok,
    Twitch,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::TikTok => "tiktok",
            Platform::Twitch => "twitch",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tiktok" => Ok(Platform::TikTok),
            "twitch" => Ok(Platform::Twitch),
            other => Err(CoreError::UnknownPlatform(other.to_string())),
        }
    }
}

// ── Payload ───────────────────────────────────────────────────

/// Canonical event payload.
///
/// Every field is optional because each family only fills its own subset.
/// Deserialization is lenient: numeric strings become numbers, `"true"`
/// becomes `true`, and unknown keys are kept in `extra` so templates can
/// still reference them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Map<String, Value>")]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_count")]
    pub diamond_count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_count")]
    pub repeat_count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_count")]
    pub bits_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_count")]
    pub like_count: Option<f64>,
    pub is_subscriber: bool,
    pub is_moderator: bool,
    pub is_new_gifter: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emotes: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys lifted out of the raw map into typed fields.
const KNOWN_KEYS: &[&str] = &[
    "uniqueId",
    "nickname",
    "comment",
    "giftId",
    "giftName",
    "diamondCount",
    "repeatCount",
    "bitsAmount",
    "likeCount",
    "isSubscriber",
    "isModerator",
    "isNewGifter",
    "emotes",
];

impl From<Map<String, Value>> for Payload {
    fn from(mut map: Map<String, Value>) -> Self {
        let mut take = |key: &str| map.remove(key);

        let unique_id = take("uniqueId").as_ref().and_then(coerce_string);
        let nickname = take("nickname").as_ref().and_then(coerce_string);
        let comment = take("comment").as_ref().and_then(coerce_string);
        let gift_id = take("giftId").as_ref().and_then(coerce_id);
        let gift_name = take("giftName").as_ref().and_then(coerce_string);
        let diamond_count = take("diamondCount").as_ref().and_then(coerce_number);
        let repeat_count = take("repeatCount").as_ref().and_then(coerce_number);
        let bits_amount = take("bitsAmount").as_ref().and_then(coerce_number);
        let like_count = take("likeCount").as_ref().and_then(coerce_number);
        let flag = |v: Option<Value>| v.as_ref().and_then(coerce_bool).unwrap_or(false);
        let is_subscriber = flag(take("isSubscriber"));
        let is_moderator = flag(take("isModerator"));
        let is_new_gifter = flag(take("isNewGifter"));
        let emotes = match take("emotes") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(Value::Object(obj)) if obj.is_empty() => Vec::new(),
            Some(Value::String(s)) if s.is_empty() => Vec::new(),
            Some(other) => vec![other],
        };

        debug_assert!(KNOWN_KEYS.iter().all(|k| !map.contains_key(*k)));

        Self {
            unique_id,
            nickname,
            comment,
            gift_id,
            gift_name,
            diamond_count,
            repeat_count,
            bits_amount,
            like_count,
            is_subscriber,
            is_moderator,
            is_new_gifter,
            emotes,
            extra: map,
        }
    }
}

impl Payload {
    /// Build a payload from an arbitrary JSON value. Only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Ok(Self::from(map)),
            other => Err(CoreError::Payload(format!(
                "payload must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Stable per-user key: `uniqueId`, falling back to `nickname`.
    pub fn user_key(&self) -> Option<&str> {
        self.unique_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.nickname.as_deref().filter(|s| !s.is_empty()))
    }

    /// Whether the event carries emote content.
    pub fn has_emotes(&self) -> bool {
        !self.emotes.is_empty()
    }

    /// Whether the event looks like a gift (has a gift id or name).
    pub fn is_gift_shaped(&self) -> bool {
        self.gift_id.is_some() || self.gift_name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Serialize for template rendering and outbound payloads.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn serialize_count<S: Serializer>(count: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match count {
        Some(n) => number_to_value(*n).serialize(s),
        None => s.serialize_none(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Event ─────────────────────────────────────────────────────

/// A canonical live-interaction event, created by the router from an
/// adapter payload and consumed once.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventFamily,
    pub platform: Platform,
    /// Name the adapter surfaced the event under (e.g. `message`, `cheer`).
    pub original_name: String,
    pub payload: Payload,
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        event_type: EventFamily,
        platform: Platform,
        original_name: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            platform,
            original_name: original_name.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}
