//! Runs the handler of every enabled action kind in a bundle.
//!
//! The dispatcher is stateless per call. For each kind in the fixed table
//! it checks the section's `check` flag and verify fields, then runs the
//! bound handler. Handler failures are logged and never reach siblings or
//! later events.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use streamcue_core::{DispatchMode, EventFamily, Payload};

use crate::background::Background;
use crate::bundle::{ActionBundle, ActionKind};
use crate::handlers::{standard_handlers, ActionHandler, HandlerInput};
use crate::targets::Targets;
use crate::templating::TemplateRenderer;

/// Dispatches action bundles to per-kind handlers.
#[derive(Clone)]
pub struct ActionDispatcher {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
    mode: DispatchMode,
    background: Background,
}

impl ActionDispatcher {
    /// A dispatcher with the standard handler for every kind.
    pub fn new(targets: &Targets, mode: DispatchMode) -> Self {
        let renderer = Arc::new(TemplateRenderer::new());
        Self::with_handlers(standard_handlers(targets, renderer), mode)
    }

    /// A dispatcher with custom handlers. Kinds without a handler never fire;
    /// a later handler for the same kind replaces an earlier one.
    pub fn with_handlers(handlers: Vec<Arc<dyn ActionHandler>>, mode: DispatchMode) -> Self {
        let handlers = handlers.into_iter().map(|h| (h.kind(), h)).collect();
        Self {
            handlers,
            mode,
            background: Background::new(),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// The set spawned handlers run in. Drain it before shutdown.
    pub fn background(&self) -> &Background {
        &self.background
    }

    /// Run every enabled kind of `bundle` for `event`.
    ///
    /// Returns the kinds whose handler was started, in dispatch order. Kinds
    /// skipped by [`ActionHandler::applies`] are not included. In
    /// [`DispatchMode::Spawned`] handlers run as detached tasks; in
    /// [`DispatchMode::Awaited`] they have all finished when this returns.
    pub async fn dispatch(
        &self,
        bundle: &ActionBundle,
        event: &Payload,
        event_type: EventFamily,
    ) -> Vec<ActionKind> {
        let bundle = Arc::new(bundle.clone());
        let payload = Arc::new(event.clone());
        let mut fired = Vec::new();

        for kind in ActionKind::ALL {
            let Some(section) = bundle.enabled_section(kind) else {
                if bundle.section(kind).is_some() {
                    debug!(%kind, bundle_id = ?bundle.id, "action kind not enabled or missing fields");
                }
                continue;
            };
            let Some(handler) = self.handlers.get(&kind).cloned() else {
                warn!(%kind, "no handler bound for action kind");
                continue;
            };

            let input = HandlerInput {
                section: section.clone(),
                bundle: bundle.clone(),
                payload: payload.clone(),
                event_type,
            };
            if !handler.applies(&input) {
                debug!(%kind, bundle_id = ?bundle.id, %event_type, "action suppressed by handler policy");
                continue;
            }
            fired.push(kind);

            match self.mode {
                DispatchMode::Spawned => self.background.spawn(run_handler(handler, input)),
                DispatchMode::Awaited => run_handler(handler, input).await,
            }
        }

        fired
    }

    /// Dispatch several bundles for the same event, in order.
    pub async fn dispatch_all(
        &self,
        bundles: &[ActionBundle],
        event: &Payload,
        event_type: EventFamily,
    ) -> Vec<ActionKind> {
        let mut fired = Vec::new();
        for bundle in bundles {
            fired.extend(self.dispatch(bundle, event, event_type).await);
        }
        fired
    }
}

async fn run_handler(handler: Arc<dyn ActionHandler>, input: HandlerInput) {
    let kind = handler.kind();
    let start = tokio::time::Instant::now();
    match handler.handle(&input).await {
        Ok(()) => {
            info!(
                %kind,
                bundle_id = ?input.bundle.id,
                event_type = %input.event_type,
                duration_ms = start.elapsed().as_millis() as u64,
                "action delivered"
            );
        }
        Err(e) => {
            warn!(
                %kind,
                bundle_id = ?input.bundle.id,
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "action failed"
            );
        }
    }
}
