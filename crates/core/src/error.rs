use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Unknown event family: {0}")]
    UnknownFamily(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
}
