use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;

use streamcue_core::{EventFamily, Payload};

use super::StateTable;
use crate::error::MiddlewareError;
use crate::pipeline::MiddlewareSpec;
use crate::traits::{Middleware, MiddlewareContext, MiddlewareOutcome};

fn default_window_ms() -> u64 {
    5_000
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdenticalParams {
    #[serde(default = "default_window_ms")]
    window_ms: u64,
}

#[derive(Default)]
struct LastSeen {
    signature: String,
    at: Option<Instant>,
}

/// Suppresses a user repeating the same content within a time window.
#[derive(Default)]
pub struct PreventIdenticalPrevious {
    state: StateTable<LastSeen>,
}

/// What makes two events from the same user "identical".
fn content_signature(family: EventFamily, data: &Payload) -> String {
    let content = match family {
        EventFamily::Chat => data.comment.clone().unwrap_or_default(),
        EventFamily::Gift => match (data.gift_id, data.gift_name.as_deref()) {
            (Some(id), _) => id.to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => String::new(),
        },
        EventFamily::Bits => data.bits_amount.map(|n| n.to_string()).unwrap_or_default(),
        EventFamily::Likes => data.like_count.map(|n| n.to_string()).unwrap_or_default(),
        EventFamily::Follow => String::new(),
    };
    format!("{family}:{content}")
}

#[async_trait]
impl Middleware for PreventIdenticalPrevious {
    async fn handle(
        &self,
        spec: &MiddlewareSpec,
        ctx: &MiddlewareContext,
    ) -> Result<MiddlewareOutcome, MiddlewareError> {
        let params: IdenticalParams = spec.params()?;
        let Some(user) = ctx.user_key() else {
            return Ok(MiddlewareOutcome::pass());
        };
        let window = Duration::from_millis(params.window_ms);
        let signature = content_signature(ctx.event_type, &ctx.data);
        let now = Instant::now();

        let expired = |last: &LastSeen| last.at.map_or(true, |at| now.duration_since(at) >= window);
        let repeated = self.state.with_slot(spec.key(), &user, expired, |last| {
            let repeated = last.signature == signature
                && last.at.is_some_and(|at| now.duration_since(at) < window);
            last.signature = signature;
            last.at = Some(now);
            repeated
        });

        if repeated {
            return Ok(MiddlewareOutcome::block("identical to previous event"));
        }
        Ok(MiddlewareOutcome::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use streamcue_core::Platform;

    fn chat(data: Value) -> MiddlewareContext {
        MiddlewareContext {
            event_type: EventFamily::Chat,
            original_event_name: "chat".into(),
            platform: Platform::TikTok,
            data: Payload::from_value(data).unwrap(),
        }
    }

    async fn passes(m: &PreventIdenticalPrevious, spec: &MiddlewareSpec, data: Value) -> bool {
        m.handle(spec, &chat(data)).await.unwrap().should_continue
    }

    #[tokio::test(start_paused = true)]
    async fn repeat_within_window_is_blocked() {
        let m = PreventIdenticalPrevious::default();
        let spec = MiddlewareSpec::new("preventIdenticalPrevious").with_param("windowMs", json!(1000));
        let event = json!({"uniqueId": "a", "comment": "!go"});

        assert!(passes(&m, &spec, event.clone()).await);
        assert!(!passes(&m, &spec, event.clone()).await);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(passes(&m, &spec, event).await);
    }

    #[tokio::test(start_paused = true)]
    async fn different_content_or_user_passes() {
        let m = PreventIdenticalPrevious::default();
        let spec = MiddlewareSpec::new("preventIdenticalPrevious");

        assert!(passes(&m, &spec, json!({"uniqueId": "a", "comment": "one"})).await);
        assert!(passes(&m, &spec, json!({"uniqueId": "a", "comment": "two"})).await);
        assert!(passes(&m, &spec, json!({"uniqueId": "b", "comment": "two"})).await);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_keep_separate_state() {
        let m = PreventIdenticalPrevious::default();
        let first = MiddlewareSpec::new("preventIdenticalPrevious").with_id("first");
        let second = MiddlewareSpec::new("preventIdenticalPrevious").with_id("second");
        let event = json!({"uniqueId": "a", "comment": "hi"});

        assert!(passes(&m, &first, event.clone()).await);
        assert!(passes(&m, &second, event).await);
    }

    #[tokio::test]
    async fn anonymous_events_pass() {
        let m = PreventIdenticalPrevious::default();
        let spec = MiddlewareSpec::new("preventIdenticalPrevious");
        assert!(passes(&m, &spec, json!({"comment": "hi"})).await);
        assert!(passes(&m, &spec, json!({"comment": "hi"})).await);
    }
}
