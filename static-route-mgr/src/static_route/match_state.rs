//! The reference count pinning a matched nexthop-table entry against
//! deletion while requests derived from it are still in flight (§4.4,
//! "three-phase asynchronous teardown").

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Attached to a nexthop-table entry for as long as this subsystem cares
/// about it. `unregistered` is set once `RemoveMatchCondition` has been
/// issued (Phase A); the state itself isn't torn down until the refcount
/// also reaches zero, whichever of Phase B or Phase C observes that last.
#[derive(Default)]
pub struct StaticRouteMatchState {
    refcount: AtomicUsize,
    unregistered: AtomicBool,
}

impl StaticRouteMatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) -> usize {
        self.refcount.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the refcount after decrementing. Panics on underflow: a
    /// decrement with no matching prior increment is an invariant breach,
    /// not a recoverable error.
    pub fn decrement(&self) -> usize {
        let prev = self.refcount.fetch_sub(1, Ordering::SeqCst);
        assert!(prev > 0, "static route match state refcount underflow");
        prev - 1
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::SeqCst)
    }

    pub fn mark_unregistered(&self) {
        self.unregistered.store(true, Ordering::SeqCst);
    }

    pub fn is_unregistered(&self) -> bool {
        self.unregistered.load(Ordering::SeqCst)
    }

    /// Once unregistered with no outstanding references, the state can be
    /// detached from its entry and dropped -- Phase B if the refcount was
    /// already zero when `DELETE_STATIC_ROUTE_DONE` arrived, Phase C if a
    /// later `NEXTHOP_*` completion was the one that dropped the last ref.
    pub fn is_deletable(&self) -> bool {
        self.is_unregistered() && self.refcount() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_deletable_while_referenced() {
        let state = StaticRouteMatchState::new();
        state.increment();
        state.mark_unregistered();
        assert!(!state.is_deletable());
    }

    #[test]
    fn deletable_once_last_ref_drops_after_unregister() {
        let state = StaticRouteMatchState::new();
        state.increment();
        state.mark_unregistered();
        state.decrement();
        assert!(state.is_deletable());
    }

    #[test]
    fn not_deletable_before_unregister_even_with_zero_refs() {
        let state = StaticRouteMatchState::new();
        assert!(!state.is_deletable());
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn decrement_below_zero_panics() {
        let state = StaticRouteMatchState::new();
        state.decrement();
    }
}
