//! Name-keyed role and comparator predicates, one set per event family.
//!
//! Predicates are pure: they read the rule operands and the event payload
//! and return a boolean. Missing payload fields and malformed operands
//! evaluate to `false`.
//!
//! The library is owned by the composition root and shared behind an
//! `Arc`. [`PredicateLibrary::update_rules`] merges new predicates into a
//! family; nothing is ever removed.

mod builtin;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use streamcue_core::{EventFamily, Payload};

use crate::schema::Rule;

/// Role predicate: does the event's sender hold the role?
pub type RoleCheck = Arc<dyn Fn(&Payload) -> bool + Send + Sync>;

/// Comparator predicate: does the event satisfy the rule's operands?
pub type ComparatorCheck = Arc<dyn Fn(&Rule, &Payload) -> bool + Send + Sync>;

/// Role and comparator predicates registered for one family.
#[derive(Clone, Default)]
pub struct PredicateSet {
    role_checks: HashMap<String, RoleCheck>,
    comparator_checks: HashMap<String, ComparatorCheck>,
}

impl PredicateSet {
    fn merge(&mut self, update: PredicateUpdate) {
        self.role_checks.extend(update.role_checks);
        self.comparator_checks.extend(update.comparator_checks);
    }
}

/// Additions to merge into a family's predicate set.
#[derive(Default)]
pub struct PredicateUpdate {
    role_checks: HashMap<String, RoleCheck>,
    comparator_checks: HashMap<String, ComparatorCheck>,
}

impl PredicateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Payload) -> bool + Send + Sync + 'static,
    {
        self.role_checks.insert(name.into(), Arc::new(check));
        self
    }

    pub fn comparator<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Rule, &Payload) -> bool + Send + Sync + 'static,
    {
        self.comparator_checks.insert(name.into(), Arc::new(check));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.role_checks.is_empty() && self.comparator_checks.is_empty()
    }
}

/// Process-wide predicate registry keyed by event family.
pub struct PredicateLibrary {
    families: RwLock<HashMap<EventFamily, PredicateSet>>,
    /// Lookups of unknown families or unregistered keys.
    unknown_keys: AtomicU64,
}

impl PredicateLibrary {
    /// A library with no families registered.
    pub fn empty() -> Self {
        Self {
            families: RwLock::new(HashMap::new()),
            unknown_keys: AtomicU64::new(0),
        }
    }

    /// A library preloaded with the built-in checks for every family.
    pub fn with_builtins() -> Self {
        let library = Self::empty();
        for family in EventFamily::ALL {
            library.update_rules(family, builtin::for_family(family));
        }
        library
    }

    /// Merge predicates into a family, creating the family if needed.
    ///
    /// Existing names are replaced, never removed. Takes effect for every
    /// evaluation that starts after this call returns.
    pub fn update_rules(&self, family: EventFamily, update: PredicateUpdate) {
        if update.is_empty() {
            return;
        }
        let roles = update.role_checks.len();
        let comparators = update.comparator_checks.len();
        self.families
            .write()
            .expect("predicate library lock poisoned")
            .entry(family)
            .or_default()
            .merge(update);
        debug!(%family, roles, comparators, "merged predicate update");
    }

    pub fn has_family(&self, family: EventFamily) -> bool {
        self.families
            .read()
            .expect("predicate library lock poisoned")
            .contains_key(&family)
    }

    pub fn role_check(&self, family: EventFamily, name: &str) -> Option<RoleCheck> {
        self.families
            .read()
            .expect("predicate library lock poisoned")
            .get(&family)
            .and_then(|set| set.role_checks.get(name).cloned())
    }

    pub fn comparator_check(&self, family: EventFamily, name: &str) -> Option<ComparatorCheck> {
        self.families
            .read()
            .expect("predicate library lock poisoned")
            .get(&family)
            .and_then(|set| set.comparator_checks.get(name).cloned())
    }

    /// Registered role names for a family, sorted.
    pub fn role_names(&self, family: EventFamily) -> Vec<String> {
        let guard = self.families.read().expect("predicate library lock poisoned");
        let mut names: Vec<String> = guard
            .get(&family)
            .map(|set| set.role_checks.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Registered comparator names for a family, sorted.
    pub fn comparator_names(&self, family: EventFamily) -> Vec<String> {
        let guard = self.families.read().expect("predicate library lock poisoned");
        let mut names: Vec<String> = guard
            .get(&family)
            .map(|set| set.comparator_checks.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of unknown-family or unregistered-key lookups seen so far.
    pub fn unknown_key_count(&self) -> u64 {
        self.unknown_keys.load(Ordering::Relaxed)
    }

    pub(crate) fn record_unknown(&self, family: &str, slot: &'static str, name: &str) {
        self.unknown_keys.fetch_add(1, Ordering::Relaxed);
        warn!(family, slot, name, "unregistered predicate, treating as no match");
    }
}

impl Default for PredicateLibrary {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> Payload {
        Payload::from_value(v).unwrap()
    }

    #[test]
    fn builtins_cover_every_family() {
        let library = PredicateLibrary::with_builtins();
        for family in EventFamily::ALL {
            assert!(library.has_family(family));
            assert!(library.role_check(family, "any").is_some());
            assert!(library.comparator_check(family, "any").is_some());
        }
    }

    #[test]
    fn update_merges_without_removing() {
        let library = PredicateLibrary::with_builtins();
        let before = library.role_names(EventFamily::Chat);

        library.update_rules(
            EventFamily::Chat,
            PredicateUpdate::new().role("vip", |p: &Payload| {
                p.extra.get("isVip").and_then(|v| v.as_bool()).unwrap_or(false)
            }),
        );

        let after = library.role_names(EventFamily::Chat);
        assert!(after.contains(&"vip".to_string()));
        for name in before {
            assert!(after.contains(&name));
        }

        let vip = library.role_check(EventFamily::Chat, "vip").unwrap();
        assert!(vip(&payload(json!({"isVip": true}))));
        assert!(!vip(&payload(json!({}))));
    }

    #[test]
    fn update_only_touches_its_family() {
        let library = PredicateLibrary::with_builtins();
        library.update_rules(
            EventFamily::Gift,
            PredicateUpdate::new().comparator("always", |_: &Rule, _: &Payload| true),
        );
        assert!(library.comparator_check(EventFamily::Gift, "always").is_some());
        assert!(library.comparator_check(EventFamily::Chat, "always").is_none());
    }

    #[test]
    fn empty_library_knows_no_family() {
        let library = PredicateLibrary::empty();
        assert!(!library.has_family(EventFamily::Chat));
        assert!(library.role_check(EventFamily::Chat, "any").is_none());
    }

    #[test]
    fn unknown_lookups_are_counted() {
        let library = PredicateLibrary::empty();
        library.record_unknown("chat", "role", "vip");
        library.record_unknown("chat", "comparator", "regex");
        assert_eq!(library.unknown_key_count(), 2);
    }
}
