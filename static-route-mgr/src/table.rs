//! The IPv4-unicast table partition abstraction both the nexthop route and
//! the synthesized static route live in (§4.6, "db_table domain"). The
//! `static_route` domain is the only writer of a synthesized route's table;
//! it only ever reads the nexthop route's table.

use std::collections::BTreeMap;
use std::sync::Mutex;

use ipnet::Ipv4Net;

use crate::path::Path;

/// One routing-table entry: every path currently installed for a prefix.
#[derive(Clone, Debug, Default)]
pub struct RouteEntry {
    pub paths: Vec<Path>,
}

impl RouteEntry {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// A single IPv4-unicast table partition. `add`/`delete` mutate a prefix's
/// path list; `notify` schedules the best-path re-evaluation and downstream
/// listener callbacks a real table would run asynchronously -- the in-memory
/// implementation below runs it synchronously, which is sufficient for a
/// single-threaded test harness.
pub trait RoutingTable: Send + Sync {
    fn find(&self, prefix: Ipv4Net) -> Option<RouteEntry>;
    fn add(&self, prefix: Ipv4Net, path: Path);
    fn delete(&self, prefix: Ipv4Net, path_id: std::net::Ipv4Addr);
    fn notify(&self, prefix: Ipv4Net);
}

/// An in-memory table partition, standing in for the real partitioned RIB
/// this subsystem is wired into (§4.6 names the real thing a collaborator,
/// not something this crate owns).
#[derive(Default)]
pub struct InMemoryTable {
    entries: Mutex<BTreeMap<Ipv4Net, RouteEntry>>,
    notifications: Mutex<Vec<Ipv4Net>>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns every prefix `notify` was called for, in order.
    /// Test-only: lets a test assert a synthesized route was (or wasn't)
    /// re-notified without requiring a running best-path selection loop.
    pub fn drain_notifications(&self) -> Vec<Ipv4Net> {
        std::mem::take(&mut self.notifications.lock().unwrap())
    }
}

impl RoutingTable for InMemoryTable {
    fn find(&self, prefix: Ipv4Net) -> Option<RouteEntry> {
        self.entries.lock().unwrap().get(&prefix).cloned()
    }

    fn add(&self, prefix: Ipv4Net, path: Path) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(prefix).or_default();
        if let Some(existing) = entry
            .paths
            .iter_mut()
            .find(|p| p.path_id() == path.path_id())
        {
            *existing = path;
        } else {
            entry.paths.push(path);
        }
    }

    fn delete(&self, prefix: Ipv4Net, path_id: std::net::Ipv4Addr) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&prefix) {
            entry.paths.retain(|p| p.path_id() != path_id);
            if entry.paths.is_empty() {
                entries.remove(&prefix);
            }
        }
    }

    fn notify(&self, prefix: Ipv4Net) {
        self.notifications.lock().unwrap().push(prefix);
    }
}
