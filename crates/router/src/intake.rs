//! JSON-lines intake: feed adapters from a byte stream.
//!
//! Each line is one object carrying the platform, the adapter event name,
//! and the raw payload fields:
//!
//! ```json
//! {"platform": "tiktok", "event": "chat", "uniqueId": "fan", "comment": "!go"}
//! ```
//!
//! A nested `data` or `payload` object is used as the payload when present.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use streamcue_core::Platform;

use crate::adapter::ChannelAdapter;
use crate::error::RouterError;

/// Well-known field names for the event name (tried in order).
const EVENT_NAME_KEYS: &[&str] = &["event", "eventName", "event_name", "type"];

/// Well-known field names for a nested payload.
const PAYLOAD_KEYS: &[&str] = &["data", "payload"];

/// One parsed intake line.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeLine {
    pub platform: Platform,
    pub event_name: String,
    pub payload: Value,
}

/// Parse a single intake line.
///
/// Rejects lines that are not JSON objects, have no platform or event
/// name, or name an unknown platform.
pub fn parse_line(line: &str) -> Result<IntakeLine, RouterError> {
    let json: Value = serde_json::from_str(line)
        .map_err(|e| RouterError::Parse(format!("invalid JSON: {e}")))?;
    let Value::Object(mut obj) = json else {
        return Err(RouterError::Parse("line is not a JSON object".into()));
    };

    let platform = match obj.remove("platform") {
        Some(Value::String(p)) => p.parse::<Platform>()?,
        _ => return Err(RouterError::Parse("missing \"platform\"".into())),
    };

    let event_key = EVENT_NAME_KEYS
        .iter()
        .find(|k| obj.get(**k).is_some_and(Value::is_string))
        .ok_or_else(|| RouterError::Parse("missing event name".into()))?;
    let event_name = match obj.remove(*event_key) {
        Some(Value::String(name)) => name,
        _ => return Err(RouterError::Parse("missing event name".into())),
    };

    let nested = PAYLOAD_KEYS
        .iter()
        .find(|k| obj.get(**k).is_some_and(Value::is_object))
        .and_then(|k| obj.remove(*k));
    let payload = nested.unwrap_or(Value::Object(obj));

    Ok(IntakeLine {
        platform,
        event_name,
        payload,
    })
}

/// Counters for one intake run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStats {
    pub lines: usize,
    /// Lines handed to at least one subscriber.
    pub emitted: usize,
    pub rejected: usize,
    /// Valid lines for an event name nobody subscribes to.
    pub undelivered: usize,
}

/// Read lines until EOF, emitting each into the adapter for its platform.
///
/// Bad lines are logged and counted, never fatal. Emitting waits for
/// subscriber queue space, so a slow pipeline slows the read loop down.
pub async fn pump<R>(
    reader: R,
    adapters: &HashMap<Platform, Arc<ChannelAdapter>>,
) -> Result<IntakeStats, RouterError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IntakeStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;

        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(line = stats.lines, error = %e, "rejecting intake line");
                stats.rejected += 1;
                continue;
            }
        };
        let Some(adapter) = adapters.get(&parsed.platform) else {
            warn!(platform = %parsed.platform, "no adapter for platform");
            stats.rejected += 1;
            continue;
        };

        let delivered = adapter.emit(&parsed.event_name, parsed.payload).await;
        if delivered == 0 {
            debug!(platform = %parsed.platform, event = %parsed.event_name, "no subscriber for intake line");
            stats.undelivered += 1;
            continue;
        }
        debug!(platform = %parsed.platform, event = %parsed.event_name, delivered, "intake line emitted");
        stats.emitted += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flat_line() {
        let line = parse_line(r#"{"platform": "tiktok", "event": "chat", "comment": "hi"}"#).unwrap();
        assert_eq!(line.platform, Platform::TikTok);
        assert_eq!(line.event_name, "chat");
        assert_eq!(line.payload, json!({"comment": "hi"}));
    }

    #[test]
    fn reads_alternative_keys_and_nested_payload() {
        let line = parse_line(r#"{"platform": "Twitch", "eventName": "cheer", "data": {"bits": 100}}"#).unwrap();
        assert_eq!(line.platform, Platform::Twitch);
        assert_eq!(line.event_name, "cheer");
        assert_eq!(line.payload, json!({"bits": 100}));
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(parse_line("not json").is_err());
        assert!(parse_line("[1]").is_err());
        assert!(parse_line(r#"{"event": "chat"}"#).is_err());
        assert!(parse_line(r#"{"platform": "youtube", "event": "chat"}"#).is_err());
        assert!(parse_line(r#"{"platform": "tiktok"}"#).is_err());
    }

    #[tokio::test]
    async fn pump_emits_into_matching_adapter() {
        let tiktok = Arc::new(ChannelAdapter::for_platform(Platform::TikTok));
        let adapters = HashMap::from([(Platform::TikTok, tiktok.clone())]);
        let mut rx = crate::adapter::PlatformAdapter::subscribe(&*tiktok, "like");

        let input = concat!(
            "{\"platform\": \"tiktok\", \"event\": \"like\", \"likeCount\": 5}\n",
            "\n",
            "garbage\n",
            "{\"platform\": \"twitch\", \"event\": \"message\"}\n",
        );
        let stats = pump(input.as_bytes(), &adapters).await.unwrap();

        assert_eq!(
            stats,
            IntakeStats {
                lines: 3,
                emitted: 1,
                rejected: 2,
                undelivered: 0
            }
        );
        assert_eq!(rx.recv().await.unwrap(), json!({"likeCount": 5}));
    }

    #[tokio::test]
    async fn pump_waits_for_slow_subscribers() {
        let tiktok = Arc::new(ChannelAdapter::with_capacity(Platform::TikTok, &["chat"], 2));
        let adapters = HashMap::from([(Platform::TikTok, tiktok.clone())]);
        let mut rx = crate::adapter::PlatformAdapter::subscribe(&*tiktok, "chat");

        let consumer = tokio::spawn(async move {
            let mut seen = 0;
            while rx.recv().await.is_some() {
                seen += 1;
                tokio::task::yield_now().await;
            }
            seen
        });

        let input: String = (0..100)
            .map(|i| format!("{{\"platform\": \"tiktok\", \"event\": \"chat\", \"comment\": \"{i}\"}}\n"))
            .collect();
        let stats = pump(input.as_bytes(), &adapters).await.unwrap();
        tiktok.close();

        assert_eq!(stats.emitted, 100);
        assert_eq!(consumer.await.unwrap(), 100);
    }

    #[tokio::test]
    async fn lines_without_subscribers_are_counted() {
        let tiktok = Arc::new(ChannelAdapter::for_platform(Platform::TikTok));
        let adapters = HashMap::from([(Platform::TikTok, tiktok)]);
        let stats = pump(&b"{\"platform\": \"tiktok\", \"event\": \"gift\"}\n"[..], &adapters)
            .await
            .unwrap();
        assert_eq!(stats.undelivered, 1);
        assert_eq!(stats.emitted, 0);
    }
}
