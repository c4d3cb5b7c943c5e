//! Read-only access to stored rules and action records.
//!
//! The pipeline never writes through these traits. Implementations are
//! expected to be eventually consistent: each call returns whatever the
//! backing store holds at that moment.

mod error;
mod file;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use streamcue_core::EventFamily;

use crate::schema::Rule;

pub use self::error::StoreError;
pub use self::file::FileStore;
pub use self::memory::MemoryStore;

/// One action record as stored: a single-level map of path-joined keys.
pub type FlatRecord = Map<String, Value>;

/// Source of the rule list for each event family.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules currently stored for `family`, in stored order.
    async fn rules_for(&self, family: EventFamily) -> Result<Vec<Rule>, StoreError>;
}

/// Source of flattened action bundle records.
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Every stored action record, in stored order.
    async fn all_actions(&self) -> Result<Vec<FlatRecord>, StoreError>;
}
