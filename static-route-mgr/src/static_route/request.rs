//! The work-queue request type the `static_route` domain's single consumer
//! drains, and the queue itself (§4.4, §5.1).

use ipnet::Ipv4Net;

/// A unit of work enqueued onto the `static_route` domain. `config`-domain
/// events and `db_table`-domain entry events both funnel through here so
/// that everything touching a synthesized route's paths happens on the one
/// consumer that's allowed to mutate them.
#[derive(Clone, Debug)]
pub enum StaticRouteRequest {
    /// The nexthop route's entry was added or changed; re-run path
    /// selection against its current path list.
    NexthopAddChg { prefix: Ipv4Net },
    /// The nexthop route's entry was deleted outright.
    NexthopDelete { prefix: Ipv4Net },
    /// Phase B: `RemoveMatchCondition` has completed for this prefix.
    DeleteStaticRouteDone { prefix: Ipv4Net },
}

impl StaticRouteRequest {
    pub fn prefix(&self) -> Ipv4Net {
        match self {
            StaticRouteRequest::NexthopAddChg { prefix }
            | StaticRouteRequest::NexthopDelete { prefix }
            | StaticRouteRequest::DeleteStaticRouteDone { prefix } => *prefix,
        }
    }
}
