//! Rule evaluation against a single canonical event.
//!
//! Rules are walked in stored order. A rule matches when it is active and
//! either bypasses checks or passes both its role and comparator predicate.
//! Configuration drift (unknown family, unregistered predicate name)
//! degrades to "no match" and is counted on the predicate library.

use std::sync::Arc;

use tracing::debug;

use streamcue_core::{EventFamily, Payload};

use crate::predicates::PredicateLibrary;
use crate::schema::{MatchResult, Rule};

// ── Rule evaluator ──────────────────────────────────────────────────

/// Evaluates stored rules against event payloads using a shared
/// [`PredicateLibrary`].
#[derive(Clone)]
pub struct RuleEvaluator {
    library: Arc<PredicateLibrary>,
}

impl RuleEvaluator {
    pub fn new(library: Arc<PredicateLibrary>) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &Arc<PredicateLibrary> {
        &self.library
    }

    /// Evaluate rules for an event type given by name.
    ///
    /// Unknown names produce an empty result.
    pub fn evaluate_named(&self, rules: &[Rule], event: &Payload, event_type: &str) -> MatchResult {
        match event_type.parse::<EventFamily>() {
            Ok(family) => self.evaluate(rules, event, family),
            Err(_) => {
                self.library.record_unknown(event_type, "family", event_type);
                MatchResult::new()
            }
        }
    }

    /// Select the rules that apply to `event`.
    ///
    /// Matches are keyed by rule id (or list index when the id is absent),
    /// so the result never holds two entries for the same rule.
    pub fn evaluate(&self, rules: &[Rule], event: &Payload, family: EventFamily) -> MatchResult {
        let mut result = MatchResult::new();

        if rules.is_empty() {
            return result;
        }
        if !self.library.has_family(family) {
            self.library.record_unknown(family.as_str(), "family", family.as_str());
            return result;
        }

        for (index, rule) in rules.iter().enumerate() {
            if !rule.is_active() {
                continue;
            }

            let key = rule.match_key(index);

            if rule.bypasses_checks() {
                debug!(%family, rule = %key, "rule matched (bypass)");
                result.insert(key, rule.clone());
                continue;
            }

            if !self.role_passes(family, rule, event) {
                continue;
            }
            if !self.comparator_passes(family, rule, event) {
                continue;
            }

            debug!(%family, rule = %key, name = %rule.name, "rule matched");
            result.insert(key, rule.clone());
        }

        result
    }

    fn role_passes(&self, family: EventFamily, rule: &Rule, event: &Payload) -> bool {
        let Some(name) = rule.role.as_deref() else {
            return false;
        };
        match self.library.role_check(family, name) {
            Some(check) => check(event),
            None => {
                self.library.record_unknown(family.as_str(), "role", name);
                false
            }
        }
    }

    fn comparator_passes(&self, family: EventFamily, rule: &Rule, event: &Payload) -> bool {
        let Some(name) = rule.comparator.as_deref() else {
            return false;
        };
        match self.library.comparator_check(family, name) {
            Some(check) => check(rule, event),
            None => {
                self.library.record_unknown(family.as_str(), "comparator", name);
                false
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
