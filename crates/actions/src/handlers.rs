//! One handler per action kind.
//!
//! Handlers receive the kind's section of the bundle, the whole bundle,
//! and the triggering event. They write to their target and return; any
//! error is reported back to the dispatcher, which logs it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use streamcue_core::value::{coerce_number, coerce_string};
use streamcue_core::{EventFamily, Payload};

use crate::bundle::{ActionBundle, ActionKind};
use crate::error::ActionError;
use crate::targets::{
    CommandRelay, KeySimulator, OverlayPresenter, OverlayRequest, SpeechPlayer, SpeechRequest, Targets,
};
use crate::templating::TemplateRenderer;

/// Everything a handler gets for one run.
#[derive(Debug, Clone)]
pub struct HandlerInput {
    pub section: Map<String, Value>,
    pub bundle: Arc<ActionBundle>,
    pub payload: Arc<Payload>,
    pub event_type: EventFamily,
}

impl HandlerInput {
    fn text(&self, field: &str) -> Option<String> {
        self.section.get(field).and_then(coerce_string)
    }

    fn number(&self, field: &str) -> Option<f64> {
        self.section.get(field).and_then(coerce_number)
    }

    fn required_text(&self, kind: ActionKind, field: &str) -> Result<String, ActionError> {
        self.text(field)
            .ok_or_else(|| ActionError::Config(format!("{kind}.{field} is not a scalar value")))
    }
}

/// A side-effecting handler bound to one action kind.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn kind(&self) -> ActionKind;

    /// Event-level policy checked before the handler is started. A handler
    /// that does not apply is neither run nor reported as fired.
    fn applies(&self, _input: &HandlerInput) -> bool {
        true
    }

    async fn handle(&self, input: &HandlerInput) -> Result<(), ActionError>;
}

/// The standard handler for every kind, bound to `targets`.
pub fn standard_handlers(targets: &Targets, renderer: Arc<TemplateRenderer>) -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(MinecraftHandler {
            relay: targets.commands.clone(),
            renderer: renderer.clone(),
        }),
        Arc::new(TtsHandler {
            player: targets.speech.clone(),
            renderer: renderer.clone(),
        }),
        Arc::new(OverlayHandler {
            presenter: targets.overlay.clone(),
            renderer,
        }),
        Arc::new(KeypressHandler {
            keys: targets.keys.clone(),
        }),
        Arc::new(FetchFormHandler {
            client: targets.http.clone(),
        }),
    ]
}

// ── minecraft ───────────────────────────────────────────────────────

pub struct MinecraftHandler {
    relay: Arc<dyn CommandRelay>,
    renderer: Arc<TemplateRenderer>,
}

#[async_trait]
impl ActionHandler for MinecraftHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Minecraft
    }

    async fn handle(&self, input: &HandlerInput) -> Result<(), ActionError> {
        let template = input.required_text(self.kind(), "command")?;
        let command = self.renderer.render(&template, &input.payload.to_value())?;
        self.relay.send_command(&command).await
    }
}

// ── tts ─────────────────────────────────────────────────────────────

/// Speaks the rendered text. Skipped for events carrying emotes; gift
/// events interrupt current playback.
pub struct TtsHandler {
    player: Arc<dyn SpeechPlayer>,
    renderer: Arc<TemplateRenderer>,
}

#[async_trait]
impl ActionHandler for TtsHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Tts
    }

    fn applies(&self, input: &HandlerInput) -> bool {
        !input.payload.has_emotes()
    }

    async fn handle(&self, input: &HandlerInput) -> Result<(), ActionError> {
        let template = input.required_text(self.kind(), "text")?;
        let request = SpeechRequest {
            text: self.renderer.render(&template, &input.payload.to_value())?,
            interrupt: input.payload.is_gift_shaped(),
            voice: input.text("voice"),
            volume: input.number("volume"),
        };
        self.player.speak(&request).await
    }
}

// ── overlay ─────────────────────────────────────────────────────────

pub struct OverlayHandler {
    presenter: Arc<dyn OverlayPresenter>,
    renderer: Arc<TemplateRenderer>,
}

#[async_trait]
impl ActionHandler for OverlayHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Overlay
    }

    async fn handle(&self, input: &HandlerInput) -> Result<(), ActionError> {
        let content = match input.text("content") {
            Some(template) => Some(self.renderer.render(&template, &input.payload.to_value())?),
            None => None,
        };
        let request = OverlayRequest {
            src: input.required_text(self.kind(), "src")?,
            content,
            duration: input.number("duration"),
            volume: input.number("volume"),
        };
        self.presenter.present(&request).await
    }
}

// ── keypress ────────────────────────────────────────────────────────

pub struct KeypressHandler {
    keys: Arc<dyn KeySimulator>,
}

#[async_trait]
impl ActionHandler for KeypressHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Keypress
    }

    async fn handle(&self, input: &HandlerInput) -> Result<(), ActionError> {
        let key = input.required_text(self.kind(), "key")?;
        self.keys.press(&key).await
    }
}

// ── fetchForm ───────────────────────────────────────────────────────

/// Single outbound GET to the section's `value`. Never retried.
pub struct FetchFormHandler {
    client: reqwest::Client,
}

#[async_trait]
impl ActionHandler for FetchFormHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::FetchForm
    }

    async fn handle(&self, input: &HandlerInput) -> Result<(), ActionError> {
        let url = input.required_text(self.kind(), "value")?;
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        response.error_for_status()?;
        info!(url = %url, %status, "fetchForm call completed");
        Ok(())
    }
}
