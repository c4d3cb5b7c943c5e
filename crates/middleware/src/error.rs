use thiserror::Error;

#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("Invalid parameters for {kind}: {message}")]
    Params { kind: String, message: String },

    #[error("Failed to read middleware config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Middleware error: {0}")]
    Other(String),
}
