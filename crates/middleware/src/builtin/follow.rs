use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;

use streamcue_core::EventFamily;

use super::StateTable;
use crate::error::MiddlewareError;
use crate::pipeline::MiddlewareSpec;
use crate::traits::{Middleware, MiddlewareContext, MiddlewareOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowParams {
    /// Forget a follow after this long. Unset means never.
    #[serde(default)]
    window_ms: Option<u64>,
}

/// Blocks repeated follow events from the same user (unfollow/refollow spam).
#[derive(Default)]
pub struct PreventDuplicateFollow {
    state: StateTable<Option<Instant>>,
}

#[async_trait]
impl Middleware for PreventDuplicateFollow {
    async fn handle(
        &self,
        spec: &MiddlewareSpec,
        ctx: &MiddlewareContext,
    ) -> Result<MiddlewareOutcome, MiddlewareError> {
        if ctx.event_type != EventFamily::Follow {
            return Ok(MiddlewareOutcome::pass());
        }
        let params: FollowParams = spec.params()?;
        let Some(user) = ctx.user_key() else {
            return Ok(MiddlewareOutcome::pass());
        };
        let now = Instant::now();
        let window = params.window_ms.map(Duration::from_millis);

        // Without a window a follow is remembered for good.
        let expired = |followed_at: &Option<Instant>| match (*followed_at, window) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(at), Some(window)) => now.duration_since(at) >= window,
        };
        let duplicate = self.state.with_slot(spec.key(), &user, expired, |followed_at| {
            let duplicate = match (*followed_at, window) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(at), Some(window)) => now.duration_since(at) < window,
            };
            if !duplicate {
                *followed_at = Some(now);
            }
            duplicate
        });

        if duplicate {
            return Ok(MiddlewareOutcome::block("user already followed"));
        }
        Ok(MiddlewareOutcome::pass())
    }
}
