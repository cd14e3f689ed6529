//! `StaticRouteManager`: owns every configured prefix's
//! [`StaticRouteMatch`], drives config application, and is the single
//! consumer of the `static_route` domain's request queue (§4.4-4.6).

use std::collections::{BTreeMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use ipnet::Ipv4Net;

use crate::attr::{AttrDb, ExtCommunityDb};
use crate::condition::ConditionListener;
use crate::config::{compare_static_route_cfg, ConfigChange, StaticRouteConfig};
use crate::rd::RouteDistinguisher;
use crate::route_target::parse_route_targets;
use crate::table::RoutingTable;
use crate::tracing::{static_debug, static_info};

use super::match_::StaticRouteMatch;
use super::match_state::StaticRouteMatchState;
use super::request::StaticRouteRequest;

struct StaticRouteEntry {
    match_: Arc<StaticRouteMatch>,
    state: Arc<StaticRouteMatchState>,
    /// The last config record applied to this prefix, kept so a subsequent
    /// reconciliation pass can classify the change via
    /// [`compare_static_route_cfg`] instead of re-deriving it from scratch.
    config: StaticRouteConfig,
    nexthop_net: Ipv4Net,
    /// Path ids currently installed in `output_table` for this prefix, kept
    /// so a shrinking path set can be diffed against the table instead of
    /// requiring a full clear-then-reinsert on every re-stitch.
    installed: Vec<Ipv4Addr>,
}

pub struct StaticRouteManager {
    nexthop_table_name: String,
    nexthop_table: Arc<dyn RoutingTable>,
    output_table: Arc<dyn RoutingTable>,
    condition_listener: Arc<dyn ConditionListener>,
    attr_db: Arc<AttrDb>,
    extcomm_db: Arc<ExtCommunityDb>,
    /// The L3VPN default-instance primary's RD, used to override the
    /// source RD of replicated paths (§4.2). `None` in a routing instance
    /// that has no default-instance primary to borrow one from.
    default_instance_rd: Option<RouteDistinguisher>,
    entries: Mutex<BTreeMap<Ipv4Net, StaticRouteEntry>>,
    queue: Mutex<VecDeque<StaticRouteRequest>>,
    wake: Mutex<Option<tokio::sync::mpsc::UnboundedSender<()>>>,
}

impl StaticRouteManager {
    pub fn new(
        nexthop_table_name: impl Into<String>,
        nexthop_table: Arc<dyn RoutingTable>,
        output_table: Arc<dyn RoutingTable>,
        condition_listener: Arc<dyn ConditionListener>,
        attr_db: Arc<AttrDb>,
        extcomm_db: Arc<ExtCommunityDb>,
    ) -> Self {
        Self {
            nexthop_table_name: nexthop_table_name.into(),
            nexthop_table,
            output_table,
            condition_listener,
            attr_db,
            extcomm_db,
            default_instance_rd: None,
            entries: Mutex::new(BTreeMap::new()),
            queue: Mutex::new(VecDeque::new()),
            wake: Mutex::new(None),
        }
    }

    pub fn with_default_instance_rd(mut self, rd: RouteDistinguisher) -> Self {
        self.default_instance_rd = Some(rd);
        self
    }

    pub fn static_route_map(&self) -> Vec<Ipv4Net> {
        self.entries.lock().unwrap().keys().copied().collect()
    }

    /// `LocateStaticRoutePrefix`: finds the match for `config.prefix`,
    /// creating it (and registering its condition match) if this is the
    /// first time the prefix has been configured. If the prefix is already
    /// configured, classifies the change via [`compare_static_route_cfg`]
    /// (§4.2, §4.5 step 3) and applies exactly what changed -- a
    /// `NoChange` config is a pure no-op, never a spurious re-stitch.
    pub fn locate_static_route_prefix(
        self: &Arc<Self>,
        config: &StaticRouteConfig,
    ) -> Arc<StaticRouteMatch> {
        enum Existing {
            MidTeardown(Arc<StaticRouteMatch>),
            Changed(Arc<StaticRouteMatch>, ConfigChange),
        }

        let existing = {
            let entries = self.entries.lock().unwrap();
            entries.get(&config.prefix).map(|entry| {
                // §4.5 step 2: a match still unwinding Phase A/B/C is left
                // alone; a later reconciliation pass re-adds it once
                // teardown completes.
                if entry.state.is_unregistered() {
                    Existing::MidTeardown(entry.match_.clone())
                } else {
                    Existing::Changed(
                        entry.match_.clone(),
                        compare_static_route_cfg(&entry.config, config),
                    )
                }
            })
        };

        match existing {
            Some(Existing::MidTeardown(m)) => return m,
            Some(Existing::Changed(m, ConfigChange::NoChange)) => return m,
            Some(Existing::Changed(m, change)) => {
                if change == ConfigChange::NexthopChanged {
                    m.set_nexthop(config.nexthop);
                }
                m.update_route_targets(parse_route_targets(&config.route_targets));
                {
                    let mut entries = self.entries.lock().unwrap();
                    if let Some(entry) = entries.get_mut(&config.prefix) {
                        entry.config = config.clone();
                        if change == ConfigChange::NexthopChanged {
                            entry.nexthop_net = Ipv4Net::new(config.nexthop, 32)
                                .expect("a /32 host mask is always valid for an Ipv4Addr");
                        }
                    }
                }
                self.enqueue(StaticRouteRequest::NexthopAddChg {
                    prefix: config.prefix,
                });
                return m;
            }
            None => {}
        }

        let route_targets = parse_route_targets(&config.route_targets);
        let nexthop_net = Ipv4Net::new(config.nexthop, 32)
            .expect("a /32 host mask is always valid for an Ipv4Addr");
        let weak_self = Arc::downgrade(self);
        let enqueue: Arc<dyn Fn(StaticRouteRequest) + Send + Sync> = Arc::new(move |req| {
            if let Some(mgr) = weak_self.upgrade() {
                mgr.enqueue(req);
            }
        });
        let m = Arc::new(StaticRouteMatch::new(
            config.prefix,
            self.nexthop_table_name.clone(),
            config.nexthop,
            route_targets,
            enqueue,
        ));
        self.entries.lock().unwrap().insert(
            config.prefix,
            StaticRouteEntry {
                match_: m.clone(),
                state: Arc::new(StaticRouteMatchState::new()),
                config: config.clone(),
                nexthop_net,
                installed: Vec::new(),
            },
        );

        self.condition_listener
            .add_match_condition(&self.nexthop_table_name, m.clone());
        static_info!(prefix = %config.prefix, nexthop = %config.nexthop, "registered static route");
        m
    }

    /// `RemoveStaticRoutePrefix`: Phase A. Issues `RemoveMatchCondition`;
    /// the entry stays in the map, marked for teardown, until the listener
    /// confirms via [`Self::delete_static_route_done`].
    pub fn remove_static_route_prefix(self: &Arc<Self>, prefix: Ipv4Net) {
        let match_ = {
            let entries = self.entries.lock().unwrap();
            entries.get(&prefix).map(|e| e.match_.clone())
        };
        let Some(match_) = match_ else {
            return;
        };
        let mgr = self.clone();
        self.condition_listener.remove_match_condition(
            &self.nexthop_table_name,
            match_,
            Box::new(move || mgr.enqueue(StaticRouteRequest::DeleteStaticRouteDone { prefix })),
        );
    }

    /// Phase B: marks the match state unregistered and, if no request
    /// still holds a reference to it, finishes the teardown immediately.
    /// If a request is still in flight, Phase C finishes it instead once
    /// that request's processing drops the last reference.
    fn delete_static_route_done(self: &Arc<Self>, prefix: Ipv4Net) {
        let deletable = {
            let entries = self.entries.lock().unwrap();
            match entries.get(&prefix) {
                Some(entry) => {
                    entry.state.mark_unregistered();
                    entry.state.is_deletable()
                }
                None => return,
            }
        };
        if deletable {
            self.finish_teardown(prefix);
        }
    }

    fn finish_teardown(&self, prefix: Ipv4Net) {
        let removed = self.entries.lock().unwrap().remove(&prefix);
        if let Some(entry) = removed {
            for path_id in &entry.installed {
                self.output_table.delete(prefix, *path_id);
            }
            self.output_table.notify(prefix);
            static_debug!(prefix = %prefix, "static route prefix fully torn down");
        }
    }

    pub fn flush_static_route_config(self: &Arc<Self>) {
        let prefixes = self.static_route_map();
        for prefix in prefixes {
            self.remove_static_route_prefix(prefix);
        }
    }

    /// `ProcessStaticRouteConfig`: initial application of a config set with
    /// no prior state to merge against.
    pub fn process_static_route_config(self: &Arc<Self>, configs: &[StaticRouteConfig]) {
        for config in configs {
            self.locate_static_route_prefix(config);
        }
    }

    /// `UpdateStaticRouteConfig`: merge-joins `configs` against the
    /// currently configured prefixes. Prefixes no longer present are torn
    /// down (Phase A); prefixes still present are reconciled through
    /// [`Self::locate_static_route_prefix`], which classifies the change via
    /// [`compare_static_route_cfg`] and applies only what changed. A
    /// changed nexthop is applied in place, since this subsystem registers
    /// its condition match at the table level rather than per nexthop
    /// address (see `DESIGN.md`) -- there is no re-subscription race to
    /// resolve.
    pub fn update_static_route_config(self: &Arc<Self>, configs: &[StaticRouteConfig]) {
        let desired: BTreeMap<Ipv4Net, &StaticRouteConfig> =
            configs.iter().map(|c| (c.prefix, c)).collect();

        let stale: Vec<Ipv4Net> = self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|prefix| !desired.contains_key(prefix))
            .copied()
            .collect();
        for prefix in stale {
            self.remove_static_route_prefix(prefix);
        }

        for config in configs {
            self.locate_static_route_prefix(config);
        }
    }

    /// Schedules a request on the `static_route` domain's queue. A
    /// `NexthopAddChg`/`NexthopDelete` increments its entry's refcount
    /// immediately -- while it sits here unprocessed it still pins the
    /// match state against a concurrently-issued Phase A/B teardown.
    pub fn enqueue(&self, req: StaticRouteRequest) {
        if matches!(
            req,
            StaticRouteRequest::NexthopAddChg { .. } | StaticRouteRequest::NexthopDelete { .. }
        ) {
            if let Some(entry) = self.entries.lock().unwrap().get(&req.prefix()) {
                entry.state.increment();
            }
        }
        self.queue.lock().unwrap().push_back(req);
        if let Some(wake) = &*self.wake.lock().unwrap() {
            let _ = wake.send(());
        }
    }

    /// Lets `task.rs` arrange for the event loop to wake up and drain the
    /// queue whenever a request is enqueued from outside it (e.g. a
    /// `db_table`-domain dispatch landing on a different task). Unset,
    /// `enqueue` is a plain in-process push -- callers drive `drain_queue`
    /// themselves, which is how this crate's own tests use the manager.
    pub fn set_wake(&self, wake: tokio::sync::mpsc::UnboundedSender<()>) {
        *self.wake.lock().unwrap() = Some(wake);
    }

    /// Drains and processes every queued request in FIFO order. Models the
    /// `static_route` domain's single consumer; `task.rs` drives this same
    /// method from a real `tokio::mpsc` receiver in production wiring.
    pub fn drain_queue(self: &Arc<Self>) {
        loop {
            let req = self.queue.lock().unwrap().pop_front();
            match req {
                Some(req) => self.handle_request(req),
                None => break,
            }
        }
    }

    fn handle_request(self: &Arc<Self>, req: StaticRouteRequest) {
        match req {
            StaticRouteRequest::NexthopAddChg { prefix } => self.process_nexthop_event(prefix),
            StaticRouteRequest::NexthopDelete { prefix } => self.process_nexthop_delete(prefix),
            StaticRouteRequest::DeleteStaticRouteDone { prefix } => {
                self.delete_static_route_done(prefix)
            }
        }
    }

    fn process_nexthop_event(self: &Arc<Self>, prefix: Ipv4Net) {
        let found = {
            let entries = self.entries.lock().unwrap();
            entries
                .get(&prefix)
                .map(|entry| (entry.nexthop_net, entry.match_.clone()))
        };
        let Some((nexthop_net, match_)) = found else {
            self.finish_in_flight_request(prefix);
            return;
        };
        let nexthop_entry = self.nexthop_table.find(nexthop_net).unwrap_or_default();
        let changed = match_.add_static_route(
            &nexthop_entry.paths,
            self.default_instance_rd,
            &self.attr_db,
            &self.extcomm_db,
        );
        if changed {
            self.sync_output_table(prefix, &match_);
        }
        self.finish_in_flight_request(prefix);
    }

    fn process_nexthop_delete(self: &Arc<Self>, prefix: Ipv4Net) {
        let match_ = {
            let entries = self.entries.lock().unwrap();
            entries.get(&prefix).map(|e| e.match_.clone())
        };
        if let Some(match_) = match_ {
            if match_.remove_static_route() {
                self.sync_output_table(prefix, &match_);
            }
        }
        self.finish_in_flight_request(prefix);
    }

    /// Reconciles `output_table`'s installed paths for `prefix` with
    /// `match_`'s current synthesized set, deleting path ids that dropped
    /// out and upserting everything still present, then notifies.
    fn sync_output_table(&self, prefix: Ipv4Net, match_: &StaticRouteMatch) {
        let desired = match_.synthesized_paths();
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(&prefix) else {
            return;
        };
        for stale_id in entry.installed.iter().filter(|id| !desired.contains_key(id)) {
            self.output_table.delete(prefix, *stale_id);
        }
        for path in desired.values() {
            self.output_table.add(prefix, path.clone());
        }
        entry.installed = desired.keys().copied().collect();
        self.output_table.notify(prefix);
    }

    /// Phase C: the last reference to a match state unregistered earlier
    /// under Phase A/B finishes the teardown here instead.
    fn finish_in_flight_request(self: &Arc<Self>, prefix: Ipv4Net) {
        let finish = {
            let entries = self.entries.lock().unwrap();
            match entries.get(&prefix) {
                Some(entry) => {
                    entry.state.decrement();
                    entry.state.is_deletable()
                }
                None => false,
            }
        };
        if finish {
            self.finish_teardown(prefix);
        }
    }

    /// `NotifyAllRoutes`: re-run path selection for every configured
    /// prefix, e.g. after the routing instance this manager belongs to has
    /// finished initial setup.
    pub fn notify_all_routes(self: &Arc<Self>) {
        let prefixes = self.static_route_map();
        for prefix in prefixes {
            self.enqueue(StaticRouteRequest::NexthopAddChg { prefix });
        }
        self.drain_queue();
    }
}
