//! Ordered middleware chain and its YAML configuration.
//!
//! The chain file is either a bare list or a `middlewares:` mapping:
//!
//! ```yaml
//! middlewares:
//!   - type: whitelist
//!     users: [streamer]
//!   - type: rateLimitByUser
//!     id: chat-limit
//!     maxEvents: 3
//!     windowMs: 10000
//!   - type: contentFilter
//!     enabled: false
//!     keywords: [spam]
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::MiddlewareError;
use crate::registry::MiddlewareRegistry;
use crate::traits::{MiddlewareContext, MiddlewareOutcome};

fn default_enabled() -> bool {
    true
}

// ── Chain entry ─────────────────────────────────────────────────────

/// One chain entry: a registered `type`, the shared `enabled` flag and
/// the type's own parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiddlewareSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// State key; defaults to `type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl MiddlewareSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            enabled: true,
            id: None,
            params: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Key under which middleware state for this entry is stored.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.kind)
    }

    /// Deserialize this entry's parameters into the middleware's own type.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, MiddlewareError> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            MiddlewareError::Params {
                kind: self.kind.clone(),
                message: e.to_string(),
            }
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChainFile {
    List(Vec<MiddlewareSpec>),
    Wrapped { middlewares: Vec<MiddlewareSpec> },
}

// ── Verdict ─────────────────────────────────────────────────────────

/// Result of running the whole chain over one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineVerdict {
    /// Every enabled middleware let the event through.
    Continue,
    /// A middleware stopped the event.
    Blocked { by: String, reason: Option<String> },
    /// An allow-list style middleware ended the chain early.
    ForcePass { by: String },
}

impl PipelineVerdict {
    pub fn should_continue(&self) -> bool {
        !matches!(self, PipelineVerdict::Blocked { .. })
    }
}

// ── Pipeline ────────────────────────────────────────────────────────

/// Runs an ordered chain of middleware entries against each event.
pub struct MiddlewarePipeline {
    registry: Arc<MiddlewareRegistry>,
    chain: Vec<MiddlewareSpec>,
}

impl MiddlewarePipeline {
    pub fn new(registry: Arc<MiddlewareRegistry>, chain: Vec<MiddlewareSpec>) -> Self {
        for spec in &chain {
            if !registry.contains(&spec.kind) {
                warn!(kind = %spec.kind, "middleware type not registered, entry will be skipped");
            }
        }
        Self { registry, chain }
    }

    /// A pipeline with no entries; every event continues.
    pub fn empty(registry: Arc<MiddlewareRegistry>) -> Self {
        Self::new(registry, Vec::new())
    }

    /// Parse a chain from YAML text.
    pub fn from_yaml_str(
        registry: Arc<MiddlewareRegistry>,
        yaml: &str,
    ) -> Result<Self, MiddlewareError> {
        if yaml.trim().is_empty() {
            return Ok(Self::empty(registry));
        }
        let chain = match serde_yaml::from_str::<ChainFile>(yaml)? {
            ChainFile::List(chain) => chain,
            ChainFile::Wrapped { middlewares } => middlewares,
        };
        Ok(Self::new(registry, chain))
    }

    /// Load a chain from a YAML file. A missing file yields an empty chain.
    pub fn load(registry: Arc<MiddlewareRegistry>, path: &Path) -> Result<Self, MiddlewareError> {
        let yaml = match std::fs::read_to_string(path) {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no middleware config found, running without middleware");
                return Ok(Self::empty(registry));
            }
            Err(e) => return Err(e.into()),
        };
        let pipeline = Self::from_yaml_str(registry, &yaml)?;
        info!(
            path = %path.display(),
            entries = pipeline.chain.len(),
            enabled = pipeline.enabled_count(),
            "loaded middleware chain"
        );
        Ok(pipeline)
    }

    pub fn chain(&self) -> &[MiddlewareSpec] {
        &self.chain
    }

    pub fn enabled_count(&self) -> usize {
        self.chain.iter().filter(|s| s.enabled).count()
    }

    /// Run every enabled entry in order.
    ///
    /// Stops at the first block or the first `skip_all_middlewares`.
    /// Unregistered types are skipped. A middleware that errors is logged
    /// and treated as a pass.
    pub async fn run(&self, ctx: &MiddlewareContext) -> PipelineVerdict {
        for spec in self.chain.iter().filter(|s| s.enabled) {
            let Some(handler) = self.registry.get(&spec.kind) else {
                warn!(kind = %spec.kind, "skipping unregistered middleware");
                continue;
            };

            let outcome = match handler.handle(spec, ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(kind = %spec.kind, entry = spec.key(), error = %e, "middleware failed, letting event through");
                    MiddlewareOutcome::pass()
                }
            };

            if !outcome.should_continue {
                debug!(
                    kind = %spec.kind,
                    entry = spec.key(),
                    event_type = %ctx.event_type,
                    reason = outcome.reason.as_deref().unwrap_or(""),
                    "event blocked by middleware"
                );
                return PipelineVerdict::Blocked {
                    by: spec.key().to_string(),
                    reason: outcome.reason,
                };
            }
            if outcome.skip_all_middlewares {
                debug!(kind = %spec.kind, entry = spec.key(), "middleware forced pass");
                return PipelineVerdict::ForcePass {
                    by: spec.key().to_string(),
                };
            }
        }
        PipelineVerdict::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use streamcue_core::{EventFamily, Payload, Platform};

    fn ctx(data: Value) -> MiddlewareContext {
        MiddlewareContext {
            event_type: EventFamily::Chat,
            original_event_name: "chat".into(),
            platform: Platform::TikTok,
            data: Payload::from_value(data).unwrap(),
        }
    }

    fn registry() -> Arc<MiddlewareRegistry> {
        Arc::new(MiddlewareRegistry::with_builtins())
    }

    #[test]
    fn parses_list_and_wrapped_forms() {
        let list = "- type: blockUser\n  users: [troll]\n";
        let wrapped = "middlewares:\n  - type: blockUser\n    enabled: false\n    users: [troll]\n";

        let a = MiddlewarePipeline::from_yaml_str(registry(), list).unwrap();
        let b = MiddlewarePipeline::from_yaml_str(registry(), wrapped).unwrap();
        assert_eq!(a.chain().len(), 1);
        assert!(a.chain()[0].enabled);
        assert_eq!(a.chain()[0].params["users"], json!(["troll"]));
        assert!(!b.chain()[0].enabled);
        assert_eq!(b.enabled_count(), 0);
    }

    #[test]
    fn spec_key_defaults_to_type() {
        let spec = MiddlewareSpec::new("rateLimitByUser");
        assert_eq!(spec.key(), "rateLimitByUser");
        assert_eq!(spec.with_id("gifts").key(), "gifts");
    }

    #[tokio::test]
    async fn empty_chain_continues() {
        let pipeline = MiddlewarePipeline::empty(registry());
        assert_eq!(pipeline.run(&ctx(json!({}))).await, PipelineVerdict::Continue);
    }

    #[tokio::test]
    async fn block_stops_the_chain() {
        let chain = vec![
            MiddlewareSpec::new("blockUser").with_param("users", json!(["troll"])),
            MiddlewareSpec::new("whitelist").with_param("users", json!(["troll"])),
        ];
        let pipeline = MiddlewarePipeline::new(registry(), chain);
        let verdict = pipeline.run(&ctx(json!({"uniqueId": "troll"}))).await;
        assert!(matches!(verdict, PipelineVerdict::Blocked { ref by, .. } if by == "blockUser"));
        assert!(!verdict.should_continue());
    }

    #[tokio::test]
    async fn whitelist_skips_remaining_middlewares() {
        let chain = vec![
            MiddlewareSpec::new("whitelist").with_param("users", json!(["streamer"])),
            MiddlewareSpec::new("blockUser").with_param("users", json!(["streamer"])),
        ];
        let pipeline = MiddlewarePipeline::new(registry(), chain);
        let verdict = pipeline.run(&ctx(json!({"uniqueId": "streamer"}))).await;
        assert_eq!(verdict, PipelineVerdict::ForcePass { by: "whitelist".into() });
    }

    #[tokio::test]
    async fn disabled_and_unknown_entries_are_skipped() {
        let chain = vec![
            MiddlewareSpec::new("blockUser").with_param("users", json!(["troll"])).disabled(),
            MiddlewareSpec::new("noSuchMiddleware"),
        ];
        let pipeline = MiddlewarePipeline::new(registry(), chain);
        assert_eq!(
            pipeline.run(&ctx(json!({"uniqueId": "troll"}))).await,
            PipelineVerdict::Continue
        );
    }

    #[tokio::test]
    async fn bad_params_fail_open() {
        let chain = vec![MiddlewareSpec::new("blockUser").with_param("users", json!("troll"))];
        let pipeline = MiddlewarePipeline::new(registry(), chain);
        assert_eq!(
            pipeline.run(&ctx(json!({"uniqueId": "troll"}))).await,
            PipelineVerdict::Continue
        );
    }

    #[test]
    fn missing_file_is_an_empty_chain() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MiddlewarePipeline::load(registry(), &dir.path().join("none.yml")).unwrap();
        assert!(pipeline.chain().is_empty());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = MiddlewarePipeline::from_yaml_str(registry(), "type: [unclosed");
        assert!(matches!(result, Err(MiddlewareError::Yaml(_))));
    }
}
