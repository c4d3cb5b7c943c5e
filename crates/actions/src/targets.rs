//! Dispatch targets: the one-way channels action handlers write to.
//!
//! Each channel is its own trait so a deployment can bind, say, a local
//! speech engine while leaving the others on webhooks. Two implementations
//! ship here:
//!
//! - [`WebhookTarget`]: POSTs a JSON body to a configured URL
//! - [`LogTarget`]: logs what would have been sent

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use streamcue_core::config::DispatchConfig;

use crate::error::ActionError;

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    pub text: String,
    /// Play now, cutting off whatever is being spoken.
    pub interrupt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRequest {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

// ── Channel traits ──────────────────────────────────────────────────

/// Relays a game/server command (e.g. a Minecraft RCON bridge).
#[async_trait]
pub trait CommandRelay: Send + Sync {
    async fn send_command(&self, command: &str) -> Result<(), ActionError>;
}

#[async_trait]
pub trait SpeechPlayer: Send + Sync {
    async fn speak(&self, request: &SpeechRequest) -> Result<(), ActionError>;
}

#[async_trait]
pub trait OverlayPresenter: Send + Sync {
    async fn present(&self, request: &OverlayRequest) -> Result<(), ActionError>;
}

#[async_trait]
pub trait KeySimulator: Send + Sync {
    async fn press(&self, key: &str) -> Result<(), ActionError>;
}

/// The bound target for every channel, plus the shared HTTP client used
/// for outbound form calls.
#[derive(Clone)]
pub struct Targets {
    pub commands: Arc<dyn CommandRelay>,
    pub speech: Arc<dyn SpeechPlayer>,
    pub overlay: Arc<dyn OverlayPresenter>,
    pub keys: Arc<dyn KeySimulator>,
    pub http: reqwest::Client,
}

impl Targets {
    /// Every channel logs only.
    pub fn log_only() -> Self {
        let log = Arc::new(LogTarget);
        Self {
            commands: log.clone(),
            speech: log.clone(),
            overlay: log.clone(),
            keys: log,
            http: reqwest::Client::new(),
        }
    }

    /// Webhook targets for configured URLs, log-only for the rest. Every
    /// webhook sends the configured extra headers.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, ActionError> {
        let http = reqwest::Client::new();
        let mut targets = Self::log_only();
        targets.http = http.clone();

        if let Some(url) = &config.command_relay_url {
            targets.commands = Arc::new(WebhookTarget::new("command-relay", url, config.webhook_headers.clone(), http.clone())?);
        }
        if let Some(url) = &config.speech_url {
            targets.speech = Arc::new(WebhookTarget::new("speech", url, config.webhook_headers.clone(), http.clone())?);
        }
        if let Some(url) = &config.overlay_url {
            targets.overlay = Arc::new(WebhookTarget::new("overlay", url, config.webhook_headers.clone(), http.clone())?);
        }
        if let Some(url) = &config.keypress_url {
            targets.keys = Arc::new(WebhookTarget::new("keypress", url, config.webhook_headers.clone(), http)?);
        }
        Ok(targets)
    }
}

// ── Log target ──────────────────────────────────────────────────────

/// Target for unconfigured channels.
#[derive(Debug, Default)]
pub struct LogTarget;

#[async_trait]
impl CommandRelay for LogTarget {
    async fn send_command(&self, command: &str) -> Result<(), ActionError> {
        info!(command, "command (no relay configured)");
        Ok(())
    }
}

#[async_trait]
impl SpeechPlayer for LogTarget {
    async fn speak(&self, request: &SpeechRequest) -> Result<(), ActionError> {
        info!(text = %request.text, interrupt = request.interrupt, "speech (no player configured)");
        Ok(())
    }
}

#[async_trait]
impl OverlayPresenter for LogTarget {
    async fn present(&self, request: &OverlayRequest) -> Result<(), ActionError> {
        info!(src = %request.src, content = ?request.content, "overlay (no presenter configured)");
        Ok(())
    }
}

#[async_trait]
impl KeySimulator for LogTarget {
    async fn press(&self, key: &str) -> Result<(), ActionError> {
        info!(key, "keypress (no simulator configured)");
        Ok(())
    }
}

// ── Webhook target ──────────────────────────────────────────────────

/// Delivers channel requests as JSON POST bodies.
///
/// Environment variable references (`${VAR_NAME}`) in the URL and header
/// values are resolved at construction time.
#[derive(Debug)]
pub struct WebhookTarget {
    channel: String,
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

impl WebhookTarget {
    pub fn new(
        channel: impl Into<String>,
        url: &str,
        headers: HashMap<String, String>,
        client: reqwest::Client,
    ) -> Result<Self, ActionError> {
        let url = resolve_env_vars(url)?;
        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in &headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }
        Ok(Self {
            channel: channel.into(),
            url,
            headers: resolved_headers,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, body: Value) -> Result<(), ActionError> {
        let mut request = self.client.post(&self.url).json(&body);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ActionError::Target(format!(
                "{} webhook returned {status}: {body_text}",
                self.channel
            )));
        }

        tracing::debug!(channel = %self.channel, url = %self.url, %status, "webhook delivered");
        Ok(())
    }
}

#[async_trait]
impl CommandRelay for WebhookTarget {
    async fn send_command(&self, command: &str) -> Result<(), ActionError> {
        self.post(json!({ "command": command })).await
    }
}

#[async_trait]
impl SpeechPlayer for WebhookTarget {
    async fn speak(&self, request: &SpeechRequest) -> Result<(), ActionError> {
        self.post(serde_json::to_value(request).unwrap_or(Value::Null)).await
    }
}

#[async_trait]
impl OverlayPresenter for WebhookTarget {
    async fn present(&self, request: &OverlayRequest) -> Result<(), ActionError> {
        self.post(serde_json::to_value(request).unwrap_or(Value::Null)).await
    }
}

#[async_trait]
impl KeySimulator for WebhookTarget {
    async fn press(&self, key: &str) -> Result<(), ActionError> {
        self.post(json!({ "key": key })).await
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, ActionError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(ActionError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| ActionError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_resolve_in_url_and_headers() {
        std::env::set_var("CUE_TARGET_HOST", "relay.local");
        std::env::set_var("CUE_TARGET_TOKEN", "s3cret");
        let headers = HashMap::from([("Authorization".to_string(), "Bearer ${CUE_TARGET_TOKEN}".to_string())]);
        let target = WebhookTarget::new(
            "command-relay",
            "http://${CUE_TARGET_HOST}/cmd",
            headers,
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(target.url(), "http://relay.local/cmd");
        assert_eq!(target.headers["Authorization"], "Bearer s3cret");
        std::env::remove_var("CUE_TARGET_HOST");
        std::env::remove_var("CUE_TARGET_TOKEN");
    }

    #[test]
    fn missing_env_var_is_a_config_error() {
        let result = resolve_env_vars("http://${CUE_DEFINITELY_NOT_SET_991}/x");
        match result {
            Err(ActionError::Config(msg)) => assert!(msg.contains("CUE_DEFINITELY_NOT_SET_991")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn unclosed_reference_is_rejected() {
        assert!(resolve_env_vars("http://${OPEN/x").is_err());
        assert_eq!(resolve_env_vars("http://plain/x").unwrap(), "http://plain/x");
    }

    #[test]
    fn speech_request_serializes_camel_case() {
        let request = SpeechRequest {
            text: "hi".into(),
            interrupt: true,
            voice: None,
            volume: Some(0.5),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"text": "hi", "interrupt": true, "volume": 0.5})
        );
    }

    #[test]
    fn from_config_without_urls_is_log_only() {
        assert!(Targets::from_config(&DispatchConfig::default()).is_ok());
    }

    #[test]
    fn from_config_rejects_unresolved_header_vars() {
        let config = DispatchConfig {
            speech_url: Some("http://localhost:9/speak".into()),
            webhook_headers: HashMap::from([(
                "Authorization".to_string(),
                "Bearer ${CUE_UNSET_HEADER_TOKEN}".to_string(),
            )]),
            ..Default::default()
        };
        assert!(Targets::from_config(&config).is_err());
    }
}
