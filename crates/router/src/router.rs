//! The event router: one pipeline run per canonical event.
//!
//! A run is: middleware chain, rule fetch, evaluation, then resolve and
//! dispatch for every matched rule. Runs are independent. A failed run
//! (store unavailable, say) is logged and the router keeps listening.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use streamcue_actions::{ActionDispatcher, ActionKind, ActionResolver};
use streamcue_core::{DispatchMode, Event, EventId, Platform};
use streamcue_middleware::{MiddlewareContext, MiddlewarePipeline, PipelineVerdict};
use streamcue_rules::{MatchKey, RuleEvaluator, RuleStore};

use crate::adapter::PlatformAdapter;
use crate::error::RouterError;
use crate::normalize::{classify, normalize};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A middleware stopped the event before evaluation.
    Blocked { by: String },
    /// Rules were evaluated (possibly with no matches).
    Evaluated,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub event_id: EventId,
    pub outcome: RunOutcome,
    pub matched: Vec<MatchKey>,
    /// Action kinds whose handler was started, across all matched rules.
    pub fired: Vec<ActionKind>,
}

/// Drives canonical events through middleware, rules and actions.
pub struct EventRouter {
    rules: Arc<dyn RuleStore>,
    evaluator: RuleEvaluator,
    middleware: Arc<MiddlewarePipeline>,
    resolver: ActionResolver,
    dispatcher: ActionDispatcher,
}

impl EventRouter {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        evaluator: RuleEvaluator,
        middleware: Arc<MiddlewarePipeline>,
        resolver: ActionResolver,
        dispatcher: ActionDispatcher,
    ) -> Self {
        Self {
            rules,
            evaluator,
            middleware,
            resolver,
            dispatcher,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.dispatcher.mode()
    }

    /// Run the full pipeline for one event and wait for it.
    ///
    /// With [`DispatchMode::Awaited`] every handler has finished when this
    /// returns.
    pub async fn handle(&self, event: Event) -> Result<RunReport, RouterError> {
        let family = event.event_type;
        let ctx = MiddlewareContext::from_event(&event);

        match self.middleware.run(&ctx).await {
            PipelineVerdict::Blocked { by, reason } => {
                debug!(event_id = %event.id, %family, by = %by, reason = ?reason, "event blocked");
                return Ok(RunReport {
                    event_id: event.id,
                    outcome: RunOutcome::Blocked { by },
                    matched: Vec::new(),
                    fired: Vec::new(),
                });
            }
            PipelineVerdict::ForcePass { by } => {
                debug!(event_id = %event.id, %family, by = %by, "middleware chain skipped");
            }
            PipelineVerdict::Continue => {}
        }

        let rules = self.rules.rules_for(family).await?;
        let matches = self.evaluator.evaluate(&rules, &event.payload, family);
        let matched: Vec<MatchKey> = matches.keys().cloned().collect();
        if !matched.is_empty() {
            debug!(event_id = %event.id, %family, matched = matched.len(), "rules matched");
        }

        let mut fired = Vec::new();
        for (key, rule) in matches.iter() {
            let bundles = self.resolver.resolve_value(&rule.actions).await?;
            if bundles.is_empty() {
                debug!(rule = %key, "matched rule has no resolvable actions");
                continue;
            }
            fired.extend(
                self.dispatcher
                    .dispatch_all(&bundles, &event.payload, family)
                    .await,
            );
        }

        Ok(RunReport {
            event_id: event.id,
            outcome: RunOutcome::Evaluated,
            matched,
            fired,
        })
    }

    /// Classify and normalize a raw adapter payload, then run it.
    ///
    /// Unroutable names and malformed payloads are logged and dropped. In
    /// spawned mode the run is detached and this returns `None`
    /// immediately; in awaited mode the run's report is returned.
    pub async fn route(self: &Arc<Self>, platform: Platform, event_name: &str, raw: Value) -> Option<RunReport> {
        let Some(family) = classify(event_name) else {
            warn!(%platform, event_name, "unroutable event, ignoring");
            return None;
        };
        let payload = match normalize(platform, family, raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%platform, event_name, error = %e, "dropping malformed payload");
                return None;
            }
        };
        let event = Event::new(family, platform, event_name, payload);

        match self.mode() {
            DispatchMode::Spawned => {
                let router = Arc::clone(self);
                self.dispatcher.background().spawn(async move {
                    router.run_logged(event).await;
                });
                None
            }
            DispatchMode::Awaited => self.run_logged(event).await,
        }
    }

    /// Wait for detached event runs and their handlers, up to `timeout`.
    ///
    /// Returns how many tasks were still running at the deadline and got
    /// aborted. A no-op in awaited mode.
    pub async fn drain(&self, timeout: Duration) -> usize {
        self.dispatcher.background().drain(timeout).await
    }

    async fn run_logged(&self, event: Event) -> Option<RunReport> {
        let event_id = event.id;
        let family = event.event_type;
        match self.handle(event).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(%event_id, %family, error = %e, "event run aborted");
                None
            }
        }
    }

    /// Subscribe to every event name of `adapter`, one listener task each.
    ///
    /// Listeners end when the adapter closes. In awaited mode a listener
    /// takes its next event only after the previous run finished.
    pub fn attach(self: &Arc<Self>, adapter: &dyn PlatformAdapter) -> Vec<JoinHandle<()>> {
        let platform = adapter.platform();
        let names = adapter.event_names();
        info!(%platform, events = names.len(), "attaching adapter");

        names
            .into_iter()
            .map(|name| {
                let mut rx = adapter.subscribe(&name);
                let router = Arc::clone(self);
                tokio::spawn(async move {
                    while let Some(raw) = rx.recv().await {
                        router.route(platform, &name, raw).await;
                    }
                    debug!(%platform, event_name = %name, "adapter stream ended");
                })
            })
            .collect()
    }
}
