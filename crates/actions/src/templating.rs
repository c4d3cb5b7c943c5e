//! Placeholder substitution for user-authored action text.
//!
//! Action text uses single-brace placeholders such as
//! `"thanks {nickname} for {giftName}"`. Placeholders are rewritten to
//! minijinja expressions and rendered against the event payload, so the
//! full `{{ expr }}` syntax (filters included) works as well. Unknown
//! names render as empty strings.
//!
//! Templates are arbitrary strings, so a fresh
//! [`minijinja::Environment`] is created per render call.

use minijinja::UndefinedBehavior;
use serde_json::Value;

use crate::error::ActionError;

/// Renders action text templates with the event payload as context.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.add_filter("round", round_filter);
        env
    }

    /// Render `template` against `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Template`] when the rewritten template does
    /// not parse or fails to evaluate.
    pub fn render(&self, template: &str, payload: &Value) -> Result<String, ActionError> {
        if !template.contains('{') {
            return Ok(template.to_string());
        }
        let env = Self::build_env();
        env.render_str(&expand_placeholders(template), payload)
            .map_err(|e| ActionError::Template(e.to_string()))
    }

    /// Check that a template parses.
    pub fn validate(&self, template: &str) -> Result<(), ActionError> {
        let env = Self::build_env();
        env.template_from_str(&expand_placeholders(template))
            .map_err(|e| ActionError::Template(e.to_string()))?;
        Ok(())
    }
}

/// Rewrite `{name}` into `{{ name }}`. Existing `{{ }}` / `{% %}` blocks
/// and braces that do not wrap a plain identifier path are left alone.
fn expand_placeholders(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if tail.starts_with("{{") || tail.starts_with("{%") || tail.starts_with("{#") {
            let close = if tail.starts_with("{{") {
                "}}"
            } else if tail.starts_with("{%") {
                "%}"
            } else {
                "#}"
            };
            match tail[2..].find(close) {
                Some(end) => {
                    let block_len = 2 + end + close.len();
                    out.push_str(&tail[..block_len]);
                    rest = &tail[block_len..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
            continue;
        }

        match tail[1..].find('}') {
            Some(end) if is_placeholder_path(&tail[1..1 + end]) => {
                out.push_str("{{ ");
                out.push_str(&tail[1..1 + end]);
                out.push_str(" }}");
                rest = &tail[end + 2..];
            }
            _ => {
                // A literal brace: emit it so minijinja prints it verbatim.
                out.push_str("{{ '{' }}");
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder_path(name: &str) -> bool {
    let mut segments = name.split('.');
    !name.is_empty()
        && segments.all(|seg| {
            let mut chars = seg.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}
