//! `StaticRouteMatch`: the per-prefix condition match that watches a
//! nexthop route and stitches its feasible, plateau-best paths into a
//! synthesized static route (§4.1-4.3, grounded directly on
//! `StaticRoute::AddStaticRoute`/`Match`/`SetNexthopRoute` in the routing
//! instance this crate's static-route manager is modeled on).

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use ipnet::Ipv4Net;

use crate::attr::{ext_community_route_target_list, AttrDb, ExtCommunityDb};
use crate::condition::{ConditionMatch, EntryEvent};
use crate::path::Path;
use crate::rd::RouteDistinguisher;
use crate::route_target::RouteTarget;
use crate::tracing::{static_debug, static_trace};

use super::request::StaticRouteRequest;

/// The outcome of re-running path selection: the new set of synthesized
/// paths keyed by path_id, and whether anything actually changed relative
/// to what was already installed (so a no-op rerun skips `NotifyRoute`).
pub struct StitchOutcome {
    pub paths: BTreeMap<Ipv4Addr, Path>,
    pub changed: bool,
}

/// `AddStaticRoute`: the ECMP-plateau path-selection algorithm.
///
/// Walks `nexthop_paths` in stored (best-to-worst) order, stopping at the
/// first path that's infeasible or strictly worse-ranked than the best
/// feasible path -- the plateau of paths this route ECMPs over. Within the
/// plateau, paths sharing forwarding info (nexthop + label) are deduped to
/// one. Each surviving path's route-target list is spliced to
/// `desired_route_targets`, and a replicated path's source RD is
/// overridden from `default_instance_rd` when one is supplied. A
/// synthesized path's stale flag carries over from whatever was previously
/// installed under the same path_id, regardless of whether its attributes
/// changed underneath it.
pub fn add_static_route(
    nexthop_paths: &[Path],
    existing: &BTreeMap<Ipv4Addr, Path>,
    desired_route_targets: &BTreeSet<RouteTarget>,
    default_instance_rd: Option<RouteDistinguisher>,
    attr_db: &AttrDb,
    extcomm_db: &ExtCommunityDb,
) -> StitchOutcome {
    let mut plateau: Vec<&Path> = Vec::new();
    let mut best_rank = None;
    for path in nexthop_paths {
        if !path.is_feasible() {
            break;
        }
        match best_rank {
            None => {
                best_rank = Some(path.rank);
                plateau.push(path);
            }
            Some(rank) if path.rank == rank => plateau.push(path),
            Some(_) => break,
        }
    }

    let mut seen_forwarding: BTreeSet<(Ipv4Addr, u32)> = BTreeSet::new();
    let mut new_paths = BTreeMap::new();
    for path in plateau {
        let forwarding = (path.nexthop(), path.label);
        if !seen_forwarding.insert(forwarding) {
            continue;
        }

        let mut attr = match ext_community_route_target_list(
            extcomm_db,
            &path.attr.ext_community,
            desired_route_targets,
        ) {
            Some(list) => attr_db.replace_ext_community_and_locate(&path.attr, list),
            None => path.attr.clone(),
        };
        if path.is_replicated() {
            if let Some(rd) = default_instance_rd {
                attr = attr_db.replace_source_rd_and_locate(&attr, rd);
            }
        }

        let path_id = path.path_id();
        let mut synthesized = Path::new(attr, path.label, path.source.clone()).with_rank(path.rank);
        if let Some(old) = existing.get(&path_id) {
            synthesized.set_stale(old.is_stale());
        }
        new_paths.insert(path_id, synthesized);
    }

    let changed = new_paths.len() != existing.len()
        || new_paths.iter().any(|(path_id, new_path)| match existing.get(path_id) {
            None => true,
            Some(old_path) => {
                !Arc::ptr_eq(&old_path.attr, &new_path.attr) || old_path.label != new_path.label
            }
        });

    StitchOutcome {
        paths: new_paths,
        changed,
    }
}

/// A single static-route prefix's condition match against the routing
/// instance's nexthop table. Owns the currently-synthesized path set and
/// the refcounted match state pinning the matched nexthop entry.
pub struct StaticRouteMatch {
    pub prefix: Ipv4Net,
    nexthop_table_name: String,
    /// The nexthop address this match is watching for
    /// (`is_nexthop_route`/`Match` in the routing instance this is modeled
    /// on: an entry event is only this match's concern when its prefix
    /// equals this address). Mutable because a config-driven nexthop change
    /// is applied in place rather than by tearing down and recreating the
    /// match (see `DESIGN.md`).
    nexthop: Mutex<Ipv4Addr>,
    route_targets: Mutex<BTreeSet<RouteTarget>>,
    synthesized: Mutex<BTreeMap<Ipv4Addr, Path>>,
    /// How this match turns a nexthop-table entry event into a request on
    /// the `static_route` domain's queue. Set by
    /// [`crate::static_route::manager::StaticRouteManager`] at construction
    /// time to a closure that enqueues onto itself -- kept as a callback
    /// rather than a back-reference to the manager to avoid an `Arc` cycle.
    enqueue: Arc<dyn Fn(StaticRouteRequest) + Send + Sync>,
}

impl StaticRouteMatch {
    pub fn new(
        prefix: Ipv4Net,
        nexthop_table_name: impl Into<String>,
        nexthop: Ipv4Addr,
        route_targets: BTreeSet<RouteTarget>,
        enqueue: Arc<dyn Fn(StaticRouteRequest) + Send + Sync>,
    ) -> Self {
        Self {
            prefix,
            nexthop_table_name: nexthop_table_name.into(),
            nexthop: Mutex::new(nexthop),
            route_targets: Mutex::new(route_targets),
            synthesized: Mutex::new(BTreeMap::new()),
            enqueue,
        }
    }

    pub fn nexthop(&self) -> Ipv4Addr {
        *self.nexthop.lock().unwrap()
    }

    /// Re-points this match at a new nexthop address in place, e.g. after a
    /// `NexthopChanged` config reconciliation.
    pub fn set_nexthop(&self, nexthop: Ipv4Addr) {
        *self.nexthop.lock().unwrap() = nexthop;
    }

    pub fn route_targets(&self) -> BTreeSet<RouteTarget> {
        self.route_targets.lock().unwrap().clone()
    }

    /// `UpdateRtargetList`: an RT-only config change never has to touch the
    /// nexthop condition match, only the route-target list and the
    /// synthesized attributes it's spliced into.
    pub fn update_route_targets(&self, route_targets: BTreeSet<RouteTarget>) {
        *self.route_targets.lock().unwrap() = route_targets;
    }

    pub fn synthesized_paths(&self) -> BTreeMap<Ipv4Addr, Path> {
        self.synthesized.lock().unwrap().clone()
    }

    /// Re-runs path selection against `nexthop_paths` and installs the
    /// result, returning whether anything changed.
    pub fn add_static_route(
        &self,
        nexthop_paths: &[Path],
        default_instance_rd: Option<RouteDistinguisher>,
        attr_db: &AttrDb,
        extcomm_db: &ExtCommunityDb,
    ) -> bool {
        let desired = self.route_targets();
        let mut existing = self.synthesized.lock().unwrap();
        let outcome = add_static_route(
            nexthop_paths,
            &existing,
            &desired,
            default_instance_rd,
            attr_db,
            extcomm_db,
        );
        static_trace!(
            prefix = %self.prefix,
            paths = outcome.paths.len(),
            changed = outcome.changed,
            "re-ran static route path selection"
        );
        *existing = outcome.paths;
        outcome.changed
    }

    /// `RemoveStaticRoute`: the nexthop route is gone, so nothing is
    /// feasible any more. Clears every synthesized path and reports
    /// whether there was anything to clear.
    pub fn remove_static_route(&self) -> bool {
        let mut existing = self.synthesized.lock().unwrap();
        if existing.is_empty() {
            return false;
        }
        static_debug!(prefix = %self.prefix, "nexthop route gone, clearing synthesized paths");
        existing.clear();
        true
    }
}

impl ConditionMatch for StaticRouteMatch {
    fn table_name(&self) -> &str {
        &self.nexthop_table_name
    }

    /// Translates a raw nexthop-table event into a
    /// [`StaticRouteRequest`] keyed by this match's own static-route
    /// prefix and hands it to the manager's queue. This is the only thing
    /// a `db_table`-domain event ever does here -- it never mutates a
    /// synthesized path itself.
    ///
    /// Every match registered on a table sees every event published to it
    /// (registration in this crate is table-wide, not per-address -- see
    /// `DESIGN.md`), so this is also where `is_nexthop_route`/`Match`'s
    /// gate lives: an event whose prefix isn't this match's nexthop address
    /// is not this match's concern and is dropped here, including deletes
    /// of entries this match never saw in the first place.
    fn handle_event(&self, event: EntryEvent) {
        if event.prefix.addr() != self.nexthop() {
            return;
        }
        let req = match event.entry {
            Some(_) => StaticRouteRequest::NexthopAddChg { prefix: self.prefix },
            None => StaticRouteRequest::NexthopDelete { prefix: self.prefix },
        };
        (self.enqueue)(req);
    }
}
