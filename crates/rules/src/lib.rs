//! Rule matching for live-interaction events.
//!
//! This crate provides:
//! - Per-family role and comparator predicate sets, extensible at runtime
//! - The rule evaluator producing deduplicated match results
//! - Read-only rule and action store traits with memory and file backends

pub mod evaluator;
pub mod predicates;
pub mod schema;
pub mod store;

pub use evaluator::RuleEvaluator;
pub use predicates::{PredicateLibrary, PredicateUpdate};
pub use schema::{parse_rules, MatchKey, MatchResult, Rule};
pub use store::{ActionStore, FileStore, FlatRecord, MemoryStore, RuleStore, StoreError};
