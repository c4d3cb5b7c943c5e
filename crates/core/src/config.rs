use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

// ── Dispatch mode ─────────────────────────────────────────────

/// How handler runs (and router event runs) are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Detached `tokio::spawn` per run; nothing awaits completion.
    #[default]
    Spawned,
    /// Every run is awaited inline. Used by tests and replay tooling.
    Awaited,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Spawned => f.write_str("spawned"),
            DispatchMode::Awaited => f.write_str("awaited"),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spawned" | "spawn" => Ok(DispatchMode::Spawned),
            "awaited" | "await" | "sync" => Ok(DispatchMode::Awaited),
            other => Err(CoreError::Config(format!("invalid dispatch mode: {other}"))),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub store: StoreConfig,
    pub middleware: MiddlewareConfigFile,
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `STREAMCUE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("STREAMCUE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            store: StoreConfig::from_env_profiled(p),
            middleware: MiddlewareConfigFile::from_env_profiled(p),
            dispatch: DispatchConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  store:       data_dir={}, separator={:?}",
            self.store.data_dir.display(),
            self.store.flatten_separator
        );
        tracing::info!("  middleware:  path={}", self.middleware.path.display());
        tracing::info!("  dispatch:    mode={}", self.dispatch.mode);
        tracing::info!(
            "  targets:     relay={}, speech={}, overlay={}, keypress={}, headers={}",
            configured(&self.dispatch.command_relay_url),
            configured(&self.dispatch.speech_url),
            configured(&self.dispatch.overlay_url),
            configured(&self.dispatch.keypress_url),
            self.dispatch.webhook_headers.len(),
        );
    }
}

fn configured(url: &Option<String>) -> &'static str {
    if url.is_some() { "webhook" } else { "log-only" }
}

// ── Store ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory holding `rules/<family>.json` and `actions.json`.
    pub data_dir: PathBuf,
    /// Path separator used in flattened action records.
    pub flatten_separator: String,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
            flatten_separator: profiled_env_or(p, "FLATTEN_SEPARATOR", "."),
        }
    }
}

// ── Middleware ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfigFile {
    /// YAML file listing the middleware chain.
    pub path: PathBuf,
}

impl MiddlewareConfigFile {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: PathBuf::from(profiled_env_or(p, "MIDDLEWARE_CONFIG", "data/middleware.yml")),
        }
    }
}

// ── Dispatch ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    pub command_relay_url: Option<String>,
    pub speech_url: Option<String>,
    pub overlay_url: Option<String>,
    pub keypress_url: Option<String>,
    /// Extra headers sent by every webhook target. Values may reference
    /// `${VAR}` environment variables.
    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,
}

impl DispatchConfig {
    fn from_env_profiled(p: &str) -> Self {
        let raw_mode = profiled_env_or(p, "DISPATCH_MODE", "spawned");
        let mode = raw_mode.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to spawned dispatch");
            DispatchMode::Spawned
        });
        Self {
            mode,
            command_relay_url: profiled_env_opt(p, "COMMAND_RELAY_URL"),
            speech_url: profiled_env_opt(p, "SPEECH_URL"),
            overlay_url: profiled_env_opt(p, "OVERLAY_URL"),
            keypress_url: profiled_env_opt(p, "KEYPRESS_URL"),
            webhook_headers: profiled_env_opt(p, "WEBHOOK_HEADERS")
                .map(|raw| parse_headers(&raw))
                .unwrap_or_default(),
        }
    }
}

/// Parse `Name: value; Other: value` into a header map.
///
/// Entries without a `:` or with an empty name are skipped with a warning.
pub fn parse_headers(raw: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                headers.insert(name.trim().to_string(), value.trim().to_string());
            }
            _ => tracing::warn!(entry = part, "ignoring malformed WEBHOOK_HEADERS entry"),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_mode_parses_aliases() {
        assert_eq!("Awaited".parse::<DispatchMode>().unwrap(), DispatchMode::Awaited);
        assert_eq!("sync".parse::<DispatchMode>().unwrap(), DispatchMode::Awaited);
        assert_eq!("spawn".parse::<DispatchMode>().unwrap(), DispatchMode::Spawned);
        assert!("later".parse::<DispatchMode>().is_err());
    }

    #[test]
    fn profiled_keys_take_precedence() {
        std::env::set_var("CUETEST_DATA_DIR", "/srv/cue");
        let store = StoreConfig::from_env_profiled("CUETEST");
        assert_eq!(store.data_dir, PathBuf::from("/srv/cue"));
        std::env::remove_var("CUETEST_DATA_DIR");
    }

    #[test]
    fn webhook_headers_parse() {
        let headers = parse_headers("Authorization: Bearer ${TOKEN}; X-Source:cue;; broken");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["Authorization"], "Bearer ${TOKEN}");
        assert_eq!(headers["X-Source"], "cue");
        assert!(parse_headers("").is_empty());
    }

    #[test]
    fn profile_label_defaults() {
        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        let cfg = Config::for_profile("prod");
        assert_eq!(cfg.profile_label(), "PROD");
    }
}
