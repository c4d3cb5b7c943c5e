//! Middleware trait and the values passed through it.

use async_trait::async_trait;
use serde::Serialize;

use streamcue_core::{Event, EventFamily, Payload, Platform};

use crate::error::MiddlewareError;
use crate::pipeline::MiddlewareSpec;

/// What a middleware sees about the event under inspection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewareContext {
    pub event_type: EventFamily,
    pub original_event_name: String,
    pub platform: Platform,
    pub data: Payload,
}

impl MiddlewareContext {
    pub fn from_event(event: &Event) -> Self {
        Self {
            event_type: event.event_type,
            original_event_name: event.original_name.clone(),
            platform: event.platform,
            data: event.payload.clone(),
        }
    }

    /// Per-user key for state tables, lowercased so `Viewer` and `viewer` share state.
    pub fn user_key(&self) -> Option<String> {
        self.data.user_key().map(str::to_lowercase)
    }
}

/// A single middleware's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareOutcome {
    pub should_continue: bool,
    pub reason: Option<String>,
    /// Stop running the rest of the chain and let the event through.
    pub skip_all_middlewares: bool,
}

impl MiddlewareOutcome {
    pub fn pass() -> Self {
        Self {
            should_continue: true,
            reason: None,
            skip_all_middlewares: false,
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            should_continue: false,
            reason: Some(reason.into()),
            skip_all_middlewares: false,
        }
    }

    pub fn force_pass(reason: impl Into<String>) -> Self {
        Self {
            should_continue: true,
            reason: Some(reason.into()),
            skip_all_middlewares: true,
        }
    }
}

/// A pluggable pre-filter, registered under a type string.
///
/// Implementations own whatever state they need and key it by
/// [`MiddlewareSpec::key`], so two chain entries of the same type never
/// share state.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect one event under the given chain entry's parameters.
    async fn handle(
        &self,
        spec: &MiddlewareSpec,
        ctx: &MiddlewareContext,
    ) -> Result<MiddlewareOutcome, MiddlewareError>;
}
