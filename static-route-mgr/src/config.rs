//! Validated operator input: a single static route's destination, nexthop,
//! and desired route-target list. Building one is this crate's one
//! recoverable-error boundary (§3).

use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;

use crate::error::StaticRouteError;

/// A single `static-route <prefix> nexthop <addr> [route-target ...]`
/// configuration stanza, already validated.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StaticRouteConfig {
    pub prefix: Ipv4Net,
    pub nexthop: Ipv4Addr,
    pub route_targets: Vec<String>,
}

impl StaticRouteConfig {
    /// Parses and validates raw operator strings. Route-target strings are
    /// kept verbatim here and only parsed (with malformed tokens dropped)
    /// downstream in [`crate::route_target::parse_route_targets`], matching
    /// the source's split between config validation and RT-list resolution.
    pub fn new(
        prefix: &str,
        nexthop: &str,
        route_targets: Vec<String>,
    ) -> Result<Self, StaticRouteError> {
        let prefix: Ipv4Net = prefix
            .parse()
            .map_err(|_| StaticRouteError::InvalidPrefix(prefix.to_string()))?;
        let nexthop = Ipv4Addr::from_str(nexthop)
            .map_err(|_| StaticRouteError::InvalidNexthop(nexthop.to_string()))?;
        Ok(Self {
            prefix,
            nexthop,
            route_targets,
        })
    }
}

/// `CompareStaticRouteCfg`: whether two configs for the same prefix differ
/// only in route targets, only in nexthop, or are identical. Distinguishing
/// the two matters because an RT-only change never has to re-resolve the
/// nexthop condition match (§4.1).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConfigChange {
    NoChange,
    RouteTargetsOnly,
    NexthopChanged,
}

pub fn compare_static_route_cfg(old: &StaticRouteConfig, new: &StaticRouteConfig) -> ConfigChange {
    debug_assert_eq!(old.prefix, new.prefix);
    if old.nexthop != new.nexthop {
        ConfigChange::NexthopChanged
    } else if old.route_targets != new.route_targets {
        ConfigChange::RouteTargetsOnly
    } else {
        ConfigChange::NoChange
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_prefix() {
        let err = StaticRouteConfig::new("not-a-prefix", "10.0.0.1", vec![]).unwrap_err();
        assert_eq!(err, StaticRouteError::InvalidPrefix("not-a-prefix".into()));
    }

    #[test]
    fn rejects_invalid_nexthop() {
        let err = StaticRouteConfig::new("10.1.1.0/24", "garbage", vec![]).unwrap_err();
        assert_eq!(err, StaticRouteError::InvalidNexthop("garbage".into()));
    }

    #[test]
    fn compares_nexthop_change_over_rtarget_change() {
        let a = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec!["target:1:1".into()])
            .unwrap();
        let b = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.2", vec!["target:1:1".into()])
            .unwrap();
        assert_eq!(compare_static_route_cfg(&a, &b), ConfigChange::NexthopChanged);
    }

    #[test]
    fn detects_rtarget_only_change() {
        let a = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec!["target:1:1".into()])
            .unwrap();
        let b = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec!["target:1:2".into()])
            .unwrap();
        assert_eq!(
            compare_static_route_cfg(&a, &b),
            ConfigChange::RouteTargetsOnly
        );
    }
}
