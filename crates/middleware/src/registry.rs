//! Type-string registry of middleware handlers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::builtin;
use crate::traits::Middleware;

/// Maps a middleware `type` to its handler.
///
/// Owned by the composition root and shared behind an `Arc`. Registration
/// is additive; a second registration under the same type replaces the
/// handler for subsequent lookups. Keys are matched exactly.
#[derive(Default)]
pub struct MiddlewareRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Middleware>>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in middleware registered.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtin::register_all(&registry);
        registry
    }

    pub fn register(&self, kind: impl Into<String>, handler: Arc<dyn Middleware>) {
        let kind = kind.into();
        debug!(kind = %kind, "registered middleware");
        self.handlers
            .write()
            .expect("middleware registry lock poisoned")
            .insert(kind, handler);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Middleware>> {
        self.handlers
            .read()
            .expect("middleware registry lock poisoned")
            .get(kind)
            .cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers
            .read()
            .expect("middleware registry lock poisoned")
            .contains_key(kind)
    }

    /// Registered types, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .handlers
            .read()
            .expect("middleware registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::RateLimitByUser;

    #[test]
    fn lookup_returns_the_registered_handler() {
        let registry = MiddlewareRegistry::new();
        let handler: Arc<dyn Middleware> = Arc::new(RateLimitByUser::default());
        registry.register("rateLimitByUser", handler.clone());

        let found = registry.get("rateLimitByUser").unwrap();
        assert!(Arc::ptr_eq(&found, &handler));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let registry = MiddlewareRegistry::new();
        registry.register("rateLimitByUser", Arc::new(RateLimitByUser::default()));
        assert!(registry.get("ratelimitbyuser").is_none());
        assert!(registry.get("RateLimitByUser").is_none());
    }

    #[test]
    fn builtins_are_registered() {
        let registry = MiddlewareRegistry::with_builtins();
        assert_eq!(
            registry.kinds(),
            vec![
                "blockUser",
                "contentFilter",
                "preventDuplicateFollow",
                "preventIdenticalPrevious",
                "rateLimitByUser",
                "whitelist",
            ]
        );
    }
}
