/// Errors that can occur while reading the rule or action store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse/serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
