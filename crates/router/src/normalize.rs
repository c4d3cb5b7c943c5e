//! Event-name classification and payload normalization.
//!
//! TikTok payloads already use the canonical field names. Twitch chat
//! clients deliver `{channel, tags, message}` style objects, which are
//! remapped so the evaluator always sees `comment` and `uniqueId`.

use serde_json::{Map, Value};
use tracing::warn;

use streamcue_core::{CoreError, EventFamily, Payload, Platform};

/// Map an adapter event name to its rule family.
///
/// Names outside the routable set (`share`, `member`, `raid`, ...) are `None`.
pub fn classify(event_name: &str) -> Option<EventFamily> {
    match event_name {
        "chat" | "message" => Some(EventFamily::Chat),
        "gift" => Some(EventFamily::Gift),
        "cheer" | "bits" => Some(EventFamily::Bits),
        "like" | "likes" => Some(EventFamily::Likes),
        "follow" => Some(EventFamily::Follow),
        _ => None,
    }
}

/// Turn a raw adapter payload into the canonical payload for `family`.
pub fn normalize(platform: Platform, family: EventFamily, raw: Value) -> Result<Payload, CoreError> {
    let Value::Object(map) = raw else {
        return Payload::from_value(raw);
    };
    let map = match platform {
        Platform::TikTok => lift_tiktok_user(map),
        Platform::Twitch => remap_twitch(map),
    };

    let mut payload = Payload::from(map);
    if family == EventFamily::Chat {
        payload.comment.get_or_insert_with(String::new);
        payload.unique_id.get_or_insert_with(String::new);
    }
    Ok(payload)
}

/// Newer connector versions nest the sender under `user`.
fn lift_tiktok_user(mut map: Map<String, Value>) -> Map<String, Value> {
    let Some(Value::Object(user)) = map.get("user").cloned() else {
        return map;
    };
    for key in ["uniqueId", "nickname", "isSubscriber", "isModerator", "isNewGifter"] {
        if !map.contains_key(key) {
            if let Some(value) = user.get(key) {
                map.insert(key.to_string(), value.clone());
            }
        }
    }
    map
}

fn remap_twitch(mut map: Map<String, Value>) -> Map<String, Value> {
    let tags = match map.remove("tags").or_else(|| map.remove("userstate")) {
        Some(Value::Object(tags)) => tags,
        Some(other) => {
            warn!(kind = json_kind(&other), "ignoring non-object twitch tags");
            Map::new()
        }
        None => Map::new(),
    };
    let tag = |key: &str| tags.get(key).filter(|v| !v.is_null());

    if let Some(message) = map.remove("message") {
        map.entry("comment").or_insert(message);
    }

    let unique_id = tag("username")
        .or_else(|| tag("login"))
        .cloned()
        .or_else(|| map.remove("username"))
        .or_else(|| map.remove("user_login"));
    if let Some(id) = unique_id {
        map.entry("uniqueId").or_insert(id);
    }

    let nickname = tag("display-name")
        .cloned()
        .or_else(|| map.remove("displayName"))
        .or_else(|| map.remove("user_name"));
    if let Some(nick) = nickname {
        map.entry("nickname").or_insert(nick);
    }

    if let Some(sub) = tag("subscriber") {
        map.entry("isSubscriber").or_insert(sub.clone());
    }
    if let Some(moderator) = tag("mod") {
        map.entry("isModerator").or_insert(moderator.clone());
    }

    let emotes = twitch_emotes(tag("emotes"));
    if !emotes.is_empty() {
        map.insert("emotes".into(), Value::Array(emotes));
    }

    let bits = tag("bits").cloned().or_else(|| map.remove("bits"));
    if let Some(bits) = bits {
        map.entry("bitsAmount").or_insert(bits);
    }

    map
}

/// Twitch sends emotes as `{emoteId: ["start-end", ...]}` or a
/// `"id:0-4/id2:6-8"` string. Either becomes a list of emote ids.
fn twitch_emotes(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Object(map)) => map.keys().map(|k| Value::String(k.clone())).collect(),
        Some(Value::String(s)) if !s.is_empty() => s
            .split('/')
            .filter_map(|part| part.split(':').next())
            .filter(|id| !id.is_empty())
            .map(|id| Value::String(id.to_string()))
            .collect(),
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        _ => "scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification_table() {
        assert_eq!(classify("chat"), Some(EventFamily::Chat));
        assert_eq!(classify("message"), Some(EventFamily::Chat));
        assert_eq!(classify("gift"), Some(EventFamily::Gift));
        assert_eq!(classify("cheer"), Some(EventFamily::Bits));
        assert_eq!(classify("like"), Some(EventFamily::Likes));
        assert_eq!(classify("follow"), Some(EventFamily::Follow));
        assert_eq!(classify("raid"), None);
        assert_eq!(classify("share"), None);
        assert_eq!(classify("Chat"), None);
    }

    #[test]
    fn twitch_chat_is_remapped() {
        let raw = json!({
            "channel": "#streamer",
            "message": "!go north",
            "tags": {
                "username": "viewer1",
                "display-name": "Viewer1",
                "subscriber": true,
                "mod": false,
                "emotes": {"25": ["0-4"]}
            }
        });
        let payload = normalize(Platform::Twitch, EventFamily::Chat, raw).unwrap();
        assert_eq!(payload.comment.as_deref(), Some("!go north"));
        assert_eq!(payload.unique_id.as_deref(), Some("viewer1"));
        assert_eq!(payload.nickname.as_deref(), Some("Viewer1"));
        assert!(payload.is_subscriber);
        assert!(!payload.is_moderator);
        assert_eq!(payload.emotes, vec![json!("25")]);
        assert_eq!(payload.extra.get("channel"), Some(&json!("#streamer")));
    }

    #[test]
    fn twitch_chat_without_emotes_has_none() {
        let raw = json!({"message": "hi", "tags": {"username": "a", "emotes": null}});
        let payload = normalize(Platform::Twitch, EventFamily::Chat, raw).unwrap();
        assert!(!payload.has_emotes());
    }

    #[test]
    fn twitch_emote_string_form() {
        let raw = json!({"message": "Kappa hi", "tags": {"username": "a", "emotes": "25:0-4/1902:6-10"}});
        let payload = normalize(Platform::Twitch, EventFamily::Chat, raw).unwrap();
        assert_eq!(payload.emotes, vec![json!("25"), json!("1902")]);
    }

    #[test]
    fn twitch_cheer_maps_bits() {
        let raw = json!({"message": "cheer100", "userstate": {"username": "b", "bits": "100"}});
        let payload = normalize(Platform::Twitch, EventFamily::Bits, raw).unwrap();
        assert_eq!(payload.bits_amount, Some(100.0));
        assert_eq!(payload.unique_id.as_deref(), Some("b"));
    }

    #[test]
    fn chat_always_has_comment_and_unique_id() {
        let payload = normalize(Platform::Twitch, EventFamily::Chat, json!({})).unwrap();
        assert_eq!(payload.comment.as_deref(), Some(""));
        assert_eq!(payload.unique_id.as_deref(), Some(""));
    }

    #[test]
    fn tiktok_payload_passes_through() {
        let raw = json!({"uniqueId": "fan", "giftId": 5655, "giftName": "Rose", "diamondCount": 1});
        let payload = normalize(Platform::TikTok, EventFamily::Gift, raw).unwrap();
        assert_eq!(payload.gift_id, Some(5655));
        assert_eq!(payload.diamond_count, Some(1.0));
    }

    #[test]
    fn tiktok_nested_user_is_lifted() {
        let raw = json!({"comment": "hi", "user": {"uniqueId": "fan", "nickname": "Fan"}});
        let payload = normalize(Platform::TikTok, EventFamily::Chat, raw).unwrap();
        assert_eq!(payload.unique_id.as_deref(), Some("fan"));
        assert_eq!(payload.nickname.as_deref(), Some("Fan"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(normalize(Platform::TikTok, EventFamily::Chat, json!("hi")).is_err());
    }
}
