//! The condition-match / condition-listener contract this subsystem is
//! built on top of: a partitioned table publishes entry events to whatever
//! has registered an interest in it, and unregistering is itself
//! asynchronous -- the listener only confirms via a completion callback
//! once every in-flight event for that match has drained (§4.6, Phase A).
//!
//! The real listener lives in the routing-instance/DB infrastructure this
//! crate is wired into. [`TestConditionListener`] is an in-memory stand-in
//! used by this crate's own tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ipnet::Ipv4Net;

use crate::table::RouteEntry;

/// An update to a single prefix in a matched table. `entry: None` means the
/// prefix was deleted outright, not just emptied of paths.
#[derive(Clone, Debug)]
pub struct EntryEvent {
    pub prefix: Ipv4Net,
    pub entry: Option<RouteEntry>,
}

/// Something registered against a table partition to receive its entry
/// events. [`crate::static_route::StaticRouteMatch`] is this crate's only
/// implementor.
pub trait ConditionMatch: Send + Sync {
    fn table_name(&self) -> &str;
    fn handle_event(&self, event: EntryEvent);
}

/// Registers and unregisters [`ConditionMatch`]es against table partitions
/// by name. `remove_match_condition` does not take effect synchronously --
/// `done_cb` fires only once the listener guarantees no further event for
/// `m` will be dispatched.
pub trait ConditionListener: Send + Sync {
    fn add_match_condition(&self, table_name: &str, m: Arc<dyn ConditionMatch>);
    fn remove_match_condition(
        &self,
        table_name: &str,
        m: Arc<dyn ConditionMatch>,
        done_cb: Box<dyn FnOnce() + Send>,
    );
}

/// A condition listener that dispatches events synchronously but defers
/// unregister completions until [`Self::drain`] is called, so tests can
/// observe the crate's teardown state machine one phase at a time.
#[derive(Default)]
pub struct TestConditionListener {
    registrations: Mutex<HashMap<String, Vec<Arc<dyn ConditionMatch>>>>,
    pending_done: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl TestConditionListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every match currently registered on `table_name`.
    pub fn publish(&self, table_name: &str, event: EntryEvent) {
        let matches = self
            .registrations
            .lock()
            .unwrap()
            .get(table_name)
            .cloned()
            .unwrap_or_default();
        for m in matches {
            m.handle_event(event.clone());
        }
    }

    /// Runs every completion callback queued by `remove_match_condition`
    /// since the last drain, in FIFO order.
    pub fn drain(&self) {
        let callbacks = std::mem::take(&mut *self.pending_done.lock().unwrap());
        for cb in callbacks {
            cb();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending_done.lock().unwrap().len()
    }
}

impl ConditionListener for TestConditionListener {
    fn add_match_condition(&self, table_name: &str, m: Arc<dyn ConditionMatch>) {
        self.registrations
            .lock()
            .unwrap()
            .entry(table_name.to_string())
            .or_default()
            .push(m);
    }

    fn remove_match_condition(
        &self,
        table_name: &str,
        m: Arc<dyn ConditionMatch>,
        done_cb: Box<dyn FnOnce() + Send>,
    ) {
        if let Some(matches) = self.registrations.lock().unwrap().get_mut(table_name) {
            matches.retain(|existing| !Arc::ptr_eq(existing, &m));
        }
        self.pending_done.lock().unwrap().push(done_cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMatch {
        events_seen: AtomicUsize,
    }

    impl ConditionMatch for CountingMatch {
        fn table_name(&self) -> &str {
            "nexthop"
        }

        fn handle_event(&self, _event: EntryEvent) {
            self.events_seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn publish_reaches_registered_match() {
        let listener = TestConditionListener::new();
        let m = Arc::new(CountingMatch {
            events_seen: AtomicUsize::new(0),
        });
        listener.add_match_condition("nexthop", m.clone());
        listener.publish(
            "nexthop",
            EntryEvent {
                prefix: "10.0.0.0/24".parse().unwrap(),
                entry: None,
            },
        );
        assert_eq!(m.events_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_defers_done_callback_until_drain() {
        let listener = TestConditionListener::new();
        let m: Arc<dyn ConditionMatch> = Arc::new(CountingMatch {
            events_seen: AtomicUsize::new(0),
        });
        listener.add_match_condition("nexthop", m.clone());
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        listener.remove_match_condition(
            "nexthop",
            m,
            Box::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        listener.drain();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_events_dispatched_once_unregistered() {
        let listener = TestConditionListener::new();
        let m = Arc::new(CountingMatch {
            events_seen: AtomicUsize::new(0),
        });
        listener.add_match_condition("nexthop", m.clone());
        listener.remove_match_condition("nexthop", m.clone(), Box::new(|| {}));
        listener.publish(
            "nexthop",
            EntryEvent {
                prefix: "10.0.0.0/24".parse().unwrap(),
                entry: None,
            },
        );
        assert_eq!(m.events_seen.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
