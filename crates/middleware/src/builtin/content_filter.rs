use async_trait::async_trait;
use serde::Deserialize;

use crate::error::MiddlewareError;
use crate::pipeline::MiddlewareSpec;
use crate::traits::{Middleware, MiddlewareContext, MiddlewareOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Block comments containing any keyword.
    #[default]
    Block,
    /// Block comments containing none of the keywords.
    Allow,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentFilterParams {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    mode: FilterMode,
    #[serde(default)]
    case_sensitive: bool,
}

/// Keyword filter over the event's comment. Events without a comment pass.
pub struct ContentFilter;

#[async_trait]
impl Middleware for ContentFilter {
    async fn handle(
        &self,
        spec: &MiddlewareSpec,
        ctx: &MiddlewareContext,
    ) -> Result<MiddlewareOutcome, MiddlewareError> {
        let params: ContentFilterParams = spec.params()?;
        let Some(comment) = ctx.data.comment.as_deref() else {
            return Ok(MiddlewareOutcome::pass());
        };
        if params.keywords.is_empty() {
            return Ok(MiddlewareOutcome::pass());
        }

        let fold = |s: &str| if params.case_sensitive { s.to_string() } else { s.to_lowercase() };
        let text = fold(comment);
        let hit = params
            .keywords
            .iter()
            .find(|k| !k.is_empty() && text.contains(&fold(k)));

        Ok(match (params.mode, hit) {
            (FilterMode::Block, Some(keyword)) => {
                MiddlewareOutcome::block(format!("comment contains blocked keyword '{keyword}'"))
            }
            (FilterMode::Allow, None) => MiddlewareOutcome::block("comment contains no allowed keyword"),
            _ => MiddlewareOutcome::pass(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use streamcue_core::{EventFamily, Payload, Platform};

    fn ctx(data: Value) -> MiddlewareContext {
        MiddlewareContext {
            event_type: EventFamily::Chat,
            original_event_name: "chat".into(),
            platform: Platform::Twitch,
            data: Payload::from_value(data).unwrap(),
        }
    }

    async fn passes(spec: &MiddlewareSpec, comment: Value) -> bool {
        ContentFilter
            .handle(spec, &ctx(json!({"comment": comment})))
            .await
            .unwrap()
            .should_continue
    }

    #[tokio::test]
    async fn block_mode_is_case_insensitive_by_default() {
        let spec = MiddlewareSpec::new("contentFilter").with_param("keywords", json!(["spam"]));
        assert!(!passes(&spec, json!("buy SPAM now")).await);
        assert!(passes(&spec, json!("hello")).await);
    }

    #[tokio::test]
    async fn case_sensitive_block() {
        let spec = MiddlewareSpec::new("contentFilter")
            .with_param("keywords", json!(["spam"]))
            .with_param("caseSensitive", json!(true));
        assert!(passes(&spec, json!("SPAM")).await);
        assert!(!passes(&spec, json!("spam")).await);
    }

    #[tokio::test]
    async fn allow_mode_requires_a_keyword() {
        let spec = MiddlewareSpec::new("contentFilter")
            .with_param("keywords", json!(["!go", "!stop"]))
            .with_param("mode", json!("allow"));
        assert!(passes(&spec, json!("!go north")).await);
        assert!(!passes(&spec, json!("just chatting")).await);
    }

    #[tokio::test]
    async fn events_without_comment_pass() {
        let spec = MiddlewareSpec::new("contentFilter")
            .with_param("keywords", json!(["x"]))
            .with_param("mode", json!("allow"));
        let outcome = ContentFilter.handle(&spec, &ctx(json!({"giftName": "Rose"}))).await.unwrap();
        assert!(outcome.should_continue);
    }
}
