use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;

use super::StateTable;
use crate::error::MiddlewareError;
use crate::pipeline::MiddlewareSpec;
use crate::traits::{Middleware, MiddlewareContext, MiddlewareOutcome};

fn default_max_events() -> usize {
    5
}

fn default_window_ms() -> u64 {
    60_000
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitParams {
    #[serde(default = "default_max_events")]
    max_events: usize,
    #[serde(default = "default_window_ms")]
    window_ms: u64,
}

/// Sliding-window rate limit per user. Blocked events do not count
/// against the window.
#[derive(Default)]
pub struct RateLimitByUser {
    state: StateTable<VecDeque<Instant>>,
}

#[async_trait]
impl Middleware for RateLimitByUser {
    async fn handle(
        &self,
        spec: &MiddlewareSpec,
        ctx: &MiddlewareContext,
    ) -> Result<MiddlewareOutcome, MiddlewareError> {
        let params: RateLimitParams = spec.params()?;
        if params.max_events == 0 {
            return Err(MiddlewareError::Params {
                kind: spec.kind.clone(),
                message: "maxEvents must be at least 1".into(),
            });
        }
        let Some(user) = ctx.user_key() else {
            return Ok(MiddlewareOutcome::pass());
        };
        let window = Duration::from_millis(params.window_ms);
        let now = Instant::now();

        let expired = |seen: &VecDeque<Instant>| {
            seen.back().map_or(true, |t| now.duration_since(*t) >= window)
        };
        let allowed = self.state.with_slot(spec.key(), &user, expired, |seen| {
            while seen.front().is_some_and(|t| now.duration_since(*t) >= window) {
                seen.pop_front();
            }
            if seen.len() >= params.max_events {
                return false;
            }
            seen.push_back(now);
            true
        });

        if allowed {
            Ok(MiddlewareOutcome::pass())
        } else {
            Ok(MiddlewareOutcome::block(format!(
                "more than {} events in {}ms",
                params.max_events, params.window_ms
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use streamcue_core::{EventFamily, Payload, Platform};

    fn ctx(user: &str) -> MiddlewareContext {
        MiddlewareContext {
            event_type: EventFamily::Likes,
            original_event_name: "like".into(),
            platform: Platform::TikTok,
            data: Payload::from_value(json!({"uniqueId": user, "likeCount": 1})).unwrap(),
        }
    }

    fn spec() -> MiddlewareSpec {
        MiddlewareSpec::new("rateLimitByUser")
            .with_param("maxEvents", json!(2))
            .with_param("windowMs", json!(1000))
    }

    async fn passes(m: &RateLimitByUser, spec: &MiddlewareSpec, user: &str) -> bool {
        m.handle(spec, &ctx(user)).await.unwrap().should_continue
    }

    #[tokio::test(start_paused = true)]
    async fn limits_within_window() {
        let m = RateLimitByUser::default();
        let spec = spec();
        assert!(passes(&m, &spec, "a").await);
        assert!(passes(&m, &spec, "a").await);
        assert!(!passes(&m, &spec, "a").await);
        assert!(passes(&m, &spec, "b").await);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let m = RateLimitByUser::default();
        let spec = spec();
        assert!(passes(&m, &spec, "a").await);
        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(passes(&m, &spec, "a").await);
        assert!(!passes(&m, &spec, "a").await);

        // First event leaves the window, second is still inside it.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(passes(&m, &spec, "a").await);
        assert!(!passes(&m, &spec, "a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_users_are_swept_after_the_window() {
        let m = RateLimitByUser {
            state: StateTable::with_sweep_threshold(8),
        };
        let spec = spec();
        for i in 0..8 {
            assert!(passes(&m, &spec, &format!("burst{i}")).await);
        }
        assert!(passes(&m, &spec, "steady").await);
        assert_eq!(m.state.len(spec.key()), 9);

        tokio::time::advance(Duration::from_millis(1500)).await;
        for i in 0..100 {
            assert!(passes(&m, &spec, &format!("later{i}")).await);
        }
        assert!(m.state.len(spec.key()) < 100);

        // A swept user starts a fresh window.
        assert!(passes(&m, &spec, "burst0").await);
        assert!(passes(&m, &spec, "burst0").await);
        assert!(!passes(&m, &spec, "burst0").await);
    }

    #[tokio::test]
    async fn zero_max_events_is_rejected() {
        let m = RateLimitByUser::default();
        let spec = MiddlewareSpec::new("rateLimitByUser").with_param("maxEvents", json!(0));
        assert!(m.handle(&spec, &ctx("a")).await.is_err());
    }
}
