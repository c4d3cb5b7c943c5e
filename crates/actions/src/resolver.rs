//! Maps rule action references to stored action bundles.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use streamcue_core::value::coerce_id;
use streamcue_rules::ActionStore;

use crate::bundle::ActionBundle;
use crate::error::ActionError;
use crate::flatten::Flattener;

/// Resolves action ids against the action store.
#[derive(Clone)]
pub struct ActionResolver {
    store: Arc<dyn ActionStore>,
    flattener: Flattener,
}

impl ActionResolver {
    pub fn new(store: Arc<dyn ActionStore>, flattener: Flattener) -> Self {
        Self { store, flattener }
    }

    pub fn flattener(&self) -> &Flattener {
        &self.flattener
    }

    /// Resolve a raw id list as stored on a rule. Anything but an array
    /// resolves to nothing.
    pub async fn resolve_value(&self, ids: &Value) -> Result<Vec<ActionBundle>, ActionError> {
        match ids {
            Value::Array(ids) => self.resolve(ids).await,
            _ => Ok(Vec::new()),
        }
    }

    /// Bundles whose id is in `ids`, in store order.
    ///
    /// Ids are compared as integers, so `3`, `3.0` and `"3"` all refer to
    /// the same bundle. Ids with no stored bundle are dropped.
    pub async fn resolve(&self, ids: &[Value]) -> Result<Vec<ActionBundle>, ActionError> {
        let wanted: HashSet<i64> = ids.iter().filter_map(coerce_id).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.store.all_actions().await?;
        let bundles: Vec<ActionBundle> = records
            .iter()
            .map(|record| ActionBundle::from_value(self.flattener.unflatten(record)))
            .filter(|bundle| bundle.id.is_some_and(|id| wanted.contains(&id)))
            .collect();

        if bundles.len() < wanted.len() {
            debug!(
                requested = wanted.len(),
                found = bundles.len(),
                "some action ids have no stored bundle"
            );
        }
        Ok(bundles)
    }
}
