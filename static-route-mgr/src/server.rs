//! The collaborator surface a routing instance hands a
//! [`crate::static_route::manager::StaticRouteManager`]: the shared
//! attribute databases, the condition listener, and the two table
//! partitions it stitches between (§4.6).

use std::sync::Arc;

use crate::attr::{AttrDb, ExtCommunityDb};
use crate::condition::ConditionListener;
use crate::rd::RouteDistinguisher;
use crate::static_route::manager::StaticRouteManager;
use crate::table::RoutingTable;

/// Bundles the per-server-wide interning databases and condition listener
/// a routing instance's static-route manager is built against. A real
/// deployment has exactly one of these per BGP server; this crate's tests
/// construct one per test with in-memory table/listener doubles.
pub struct BgpServer {
    pub attr_db: Arc<AttrDb>,
    pub extcomm_db: Arc<ExtCommunityDb>,
    pub condition_listener: Arc<dyn ConditionListener>,
}

impl BgpServer {
    pub fn new(condition_listener: Arc<dyn ConditionListener>) -> Self {
        Self {
            attr_db: Arc::new(AttrDb::new()),
            extcomm_db: Arc::new(ExtCommunityDb::new()),
            condition_listener,
        }
    }

    /// `InsertStaticRouteMgr`: instantiates the manager for one routing
    /// instance's static-route table, wired against this server's shared
    /// databases and listener.
    pub fn insert_static_route_mgr(
        &self,
        nexthop_table_name: impl Into<String>,
        nexthop_table: Arc<dyn RoutingTable>,
        output_table: Arc<dyn RoutingTable>,
        default_instance_rd: Option<RouteDistinguisher>,
    ) -> Arc<StaticRouteManager> {
        let mgr = StaticRouteManager::new(
            nexthop_table_name,
            nexthop_table,
            output_table,
            self.condition_listener.clone(),
            self.attr_db.clone(),
            self.extcomm_db.clone(),
        );
        let mgr = match default_instance_rd {
            Some(rd) => mgr.with_default_instance_rd(rd),
            None => mgr,
        };
        Arc::new(mgr)
    }

    /// `RemoveStaticRouteMgr`: flushes every configured prefix so the
    /// manager's condition matches unregister cleanly before the routing
    /// instance it belongs to is torn down. Dropping the last `Arc` then
    /// releases the manager itself once Phase A/B/C teardown completes.
    pub fn remove_static_route_mgr(&self, mgr: &Arc<StaticRouteManager>) {
        mgr.flush_static_route_config();
    }
}
