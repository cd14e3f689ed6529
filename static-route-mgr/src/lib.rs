//! Stitches operator-configured static IPv4 routes to a dynamically
//! discovered nexthop route: watches a routing instance's nexthop table
//! for the address each static route points at, and whenever a feasible
//! path shows up there, synthesizes a route out of it carrying the
//! static route's own route targets.
//!
//! Module map:
//! - [`config`] -- validated operator input (`StaticRouteConfig`).
//! - [`path`], [`table`], [`attr`] -- the path/table/attribute-set model
//!   this subsystem reads and writes.
//! - [`route_target`], [`rd`] -- extended-community and route-distinguisher
//!   parsing.
//! - [`condition`] -- the condition-match/listener contract against the
//!   nexthop table.
//! - [`static_route`] -- the match and manager that actually do the work.
//! - [`task`] -- the `config`/`static_route` task domains as channels plus
//!   an event loop.
//! - [`server`] -- the per-BGP-server collaborator bundle a routing
//!   instance builds a manager against.
//!
//! Error handling: the one recoverable boundary is building a
//! [`config::StaticRouteConfig`] from raw operator input, which returns
//! [`error::StaticRouteError`]. Everything downstream either no-ops (no
//! feasible nexthop yet) or panics on an invariant breach -- there is no
//! `Result` return past config validation.

pub mod attr;
pub mod condition;
pub mod config;
pub mod error;
pub mod path;
pub mod rd;
pub mod route_target;
pub mod server;
pub mod static_route;
pub mod table;
pub mod task;

mod tracing;
