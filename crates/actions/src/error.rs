use streamcue_rules::StoreError;

/// Errors raised while resolving or running actions.
///
/// None of these cross the dispatch boundary: the dispatcher logs them.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Target error: {0}")]
    Target(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Action store error: {0}")]
    Store(#[from] StoreError),
}
