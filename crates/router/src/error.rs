use thiserror::Error;

use streamcue_actions::ActionError;
use streamcue_core::CoreError;
use streamcue_rules::StoreError;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("intake parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("rule store error: {0}")]
    Store(#[from] StoreError),

    #[error("action error: {0}")]
    Action(#[from] ActionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
