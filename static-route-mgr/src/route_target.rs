//! Route-target parsing and the extended-community value it maps to.
//!
//! Canonical route-target strings come in two forms: `target:asn:value` for
//! the two-octet-AS-specific extended community, and `target:ip:value` for
//! the IPv4-address-specific one. Tokens that don't parse are dropped by the
//! caller, not rejected here -- see [`crate::config::StaticRouteConfig`].

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

const TYPE_TWO_OCTET_AS: u8 = 0x00;
const TYPE_IPV4_ADDRESS: u8 = 0x01;
const SUBTYPE_ROUTE_TARGET: u8 = 0x02;

/// A single 8-octet BGP extended-community value: 2 bytes of type/subtype
/// plus 6 bytes of payload. Route targets are one flavor of this; the crate
/// only ever constructs or compares route-target-shaped values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ExtCommunityValue {
    pub high_type: u8,
    pub low_type: u8,
    pub val: [u8; 6],
}

impl fmt::Display for ExtCommunityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.high_type {
            TYPE_TWO_OCTET_AS => {
                let asn = u16::from_be_bytes([self.val[0], self.val[1]]);
                let val =
                    u32::from_be_bytes([self.val[2], self.val[3], self.val[4], self.val[5]]);
                write!(f, "target:{asn}:{val}")
            }
            TYPE_IPV4_ADDRESS => {
                let ip = Ipv4Addr::new(self.val[0], self.val[1], self.val[2], self.val[3]);
                let val = u16::from_be_bytes([self.val[4], self.val[5]]);
                write!(f, "target:{ip}:{val}")
            }
            _ => write!(f, "target:unknown"),
        }
    }
}

/// A parsed route target, ordered so a [`RouteTargetList`] can dedup via a
/// `BTreeSet`/`BTreeMap` the way the source's `std::set<RouteTarget>` does.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RouteTarget(ExtCommunityValue);

impl RouteTarget {
    pub fn ext_community(&self) -> ExtCommunityValue {
        self.0
    }
}

impl FromStr for RouteTarget {
    type Err = ();

    /// Accepts `target:<asn>:<value>` or `target:<ipv4>:<value>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let kind = parts.next().ok_or(())?;
        if kind != "target" {
            return Err(());
        }
        let middle = parts.next().ok_or(())?;
        let value = parts.next().ok_or(())?;
        if parts.next().is_some() {
            return Err(());
        }

        if let Ok(asn) = middle.parse::<u16>() {
            let val: u32 = value.parse().map_err(|_| ())?;
            let mut ecv = ExtCommunityValue {
                high_type: TYPE_TWO_OCTET_AS,
                low_type: SUBTYPE_ROUTE_TARGET,
                val: [0; 6],
            };
            ecv.val[0..2].copy_from_slice(&asn.to_be_bytes());
            ecv.val[2..6].copy_from_slice(&val.to_be_bytes());
            return Ok(RouteTarget(ecv));
        }
        if let Ok(ip) = middle.parse::<Ipv4Addr>() {
            let val: u16 = value.parse().map_err(|_| ())?;
            let mut ecv = ExtCommunityValue {
                high_type: TYPE_IPV4_ADDRESS,
                low_type: SUBTYPE_ROUTE_TARGET,
                val: [0; 6],
            };
            ecv.val[0..4].copy_from_slice(&ip.octets());
            ecv.val[4..6].copy_from_slice(&val.to_be_bytes());
            return Ok(RouteTarget(ecv));
        }
        Err(())
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parse a list of route-target strings, silently dropping malformed tokens
/// (logged at `warn`, per the crate's error-handling design -- this is not a
/// `Result`-surfacing error).
pub fn parse_route_targets(rtargets: &[String]) -> std::collections::BTreeSet<RouteTarget> {
    let mut set = std::collections::BTreeSet::new();
    for s in rtargets {
        match s.parse::<RouteTarget>() {
            Ok(rt) => {
                set.insert(rt);
            }
            Err(()) => {
                crate::tracing::static_warn!(rtarget = %s, "dropping malformed route-target string");
            }
        }
    }
    set
}
