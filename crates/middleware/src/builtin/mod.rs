//! Built-in middlewares.
//!
//! | type | blocks when |
//! |------|-------------|
//! | `preventIdenticalPrevious` | same user repeats the same content within `windowMs` |
//! | `blockUser` | sender is listed in `users` |
//! | `rateLimitByUser` | sender exceeded `maxEvents` in the last `windowMs` |
//! | `preventDuplicateFollow` | sender already followed (within `windowMs`, if set) |
//! | `contentFilter` | comment hits (`block`) or misses (`allow`) every keyword |
//! | `whitelist` | never; listed users skip the rest of the chain |

mod content_filter;
mod follow;
mod identical;
mod rate_limit;
mod users;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

pub use content_filter::{ContentFilter, FilterMode};
pub use follow::PreventDuplicateFollow;
pub use identical::PreventIdenticalPrevious;
pub use rate_limit::RateLimitByUser;
pub use users::{BlockUser, Whitelist};

use crate::registry::MiddlewareRegistry;

/// Register every built-in under its type string.
pub fn register_all(registry: &MiddlewareRegistry) {
    registry.register("preventIdenticalPrevious", Arc::new(PreventIdenticalPrevious::default()));
    registry.register("blockUser", Arc::new(BlockUser));
    registry.register("rateLimitByUser", Arc::new(RateLimitByUser::default()));
    registry.register("preventDuplicateFollow", Arc::new(PreventDuplicateFollow::default()));
    registry.register("contentFilter", Arc::new(ContentFilter));
    registry.register("whitelist", Arc::new(Whitelist));
}

/// Slots an entry may hold before the first sweep for expired state.
const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

/// Per-entry, per-user state private to one middleware.
///
/// A user's slot lives until a sweep finds it expired. Sweeps run when a new
/// user arrives at an entry holding `next_sweep` slots; afterwards the
/// next sweep point is twice what survived, so the cost stays amortized.
pub(crate) struct StateTable<T> {
    entries: Mutex<HashMap<String, EntrySlots<T>>>,
    sweep_threshold: usize,
}

struct EntrySlots<T> {
    slots: HashMap<String, T>,
    next_sweep: usize,
}

impl<T> Default for StateTable<T> {
    fn default() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }
}

impl<T> StateTable<T> {
    pub(crate) fn with_sweep_threshold(sweep_threshold: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            sweep_threshold: sweep_threshold.max(1),
        }
    }

    /// Slots currently held for `entry`, expired or not.
    #[cfg(test)]
    pub(crate) fn len(&self, entry: &str) -> usize {
        let guard = self.entries.lock().expect("middleware state lock poisoned");
        guard.get(entry).map_or(0, |e| e.slots.len())
    }
}

impl<T: Default> StateTable<T> {
    /// Run `f` against the state slot for (`entry`, `user`), creating it if
    /// needed. `is_expired` must only hold for slots that behave exactly like
    /// a fresh default slot.
    pub(crate) fn with_slot<R>(
        &self,
        entry: &str,
        user: &str,
        is_expired: impl Fn(&T) -> bool,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        let threshold = self.sweep_threshold;
        let mut guard = self.entries.lock().expect("middleware state lock poisoned");
        let state = guard.entry(entry.to_string()).or_insert_with(|| EntrySlots {
            slots: HashMap::new(),
            next_sweep: threshold,
        });

        if !state.slots.contains_key(user) && state.slots.len() >= state.next_sweep {
            let before = state.slots.len();
            state.slots.retain(|_, slot| !is_expired(slot));
            state.next_sweep = threshold.max(state.slots.len() * 2);
            debug!(entry, before, kept = state.slots.len(), "swept expired middleware state");
        }

        let slot = state.slots.entry(user.to_string()).or_default();
        f(slot)
    }
}

pub(crate) fn lowercase_all(users: &[String]) -> Vec<String> {
    users.iter().map(|u| u.to_lowercase()).collect()
}
