//! In-process store, mutable from the embedding application.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use streamcue_core::EventFamily;

use super::{ActionStore, FlatRecord, RuleStore, StoreError};
use crate::schema::Rule;

/// Rules and action records held in memory.
#[derive(Default)]
pub struct MemoryStore {
    rules: RwLock<HashMap<EventFamily, Vec<Rule>>>,
    actions: RwLock<Vec<FlatRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rule list for a family.
    pub fn set_rules(&self, family: EventFamily, rules: Vec<Rule>) {
        self.rules
            .write()
            .expect("rules lock poisoned")
            .insert(family, rules);
    }

    /// Replace all action records.
    pub fn set_actions(&self, actions: Vec<FlatRecord>) {
        *self.actions.write().expect("actions lock poisoned") = actions;
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn rules_for(&self, family: EventFamily) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .rules
            .read()
            .expect("rules lock poisoned")
            .get(&family)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ActionStore for MemoryStore {
    async fn all_actions(&self) -> Result<Vec<FlatRecord>, StoreError> {
        Ok(self.actions.read().expect("actions lock poisoned").clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_family_is_empty() {
        let store = MemoryStore::new();
        assert!(store.rules_for(EventFamily::Gift).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_rules_replaces_list() {
        let store = MemoryStore::new();
        let rules = crate::schema::parse_rules(json!([{"id": 1}, {"id": 2}]));
        store.set_rules(EventFamily::Chat, rules);
        assert_eq!(store.rules_for(EventFamily::Chat).await.unwrap().len(), 2);

        store.set_rules(EventFamily::Chat, Vec::new());
        assert!(store.rules_for(EventFamily::Chat).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn actions_round_trip() {
        let store = MemoryStore::new();
        let record = json!({"id": 1, "tts.check": true}).as_object().unwrap().clone();
        store.set_actions(vec![record.clone()]);
        assert_eq!(store.all_actions().await.unwrap(), vec![record]);
    }
}
