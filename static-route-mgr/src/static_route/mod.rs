//! The static-route matcher and manager: the part of this crate that
//! actually stitches operator-configured prefixes onto nexthop routes
//! (§4).

mod match_;
mod match_state;
mod request;

pub mod manager;

pub use match_::{add_static_route, StaticRouteMatch, StitchOutcome};
pub use match_state::StaticRouteMatchState;
pub use request::StaticRouteRequest;
