//! A minimal, value-semantics attribute set and the two interning databases
//! the static-route manager leans on: [`AttrDb`] for whole attribute sets and
//! [`ExtCommunityDb`] for extended-community lists. Both dedup by value so
//! that unchanged rewrites collapse to identity, letting callers skip
//! no-op path churn with a pointer comparison (§9, "Attribute interning").

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use crate::rd::RouteDistinguisher;
use crate::route_target::{ExtCommunityValue, RouteTarget};

/// An extended-community list, in insertion order. Equality (and therefore
/// interning identity) is order-sensitive, matching the source's use of a
/// flat `ExtCommunity::ExtCommunityList` vector rather than a set.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct ExtCommunityList(pub Vec<ExtCommunityValue>);

impl ExtCommunityList {
    pub fn from_route_targets(rtargets: &BTreeSet<RouteTarget>) -> Self {
        ExtCommunityList(rtargets.iter().map(|rt| rt.ext_community()).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The subset of a BGP path attribute set this subsystem cares about: the
/// nexthop it stitches on, the extended-community list it rewrites, and the
/// route distinguisher it overwrites for replicated paths.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BgpAttr {
    pub nexthop: Ipv4Addr,
    pub ext_community: ExtCommunityList,
    pub source_rd: Option<RouteDistinguisher>,
}

impl BgpAttr {
    pub fn new(nexthop: Ipv4Addr) -> Self {
        Self {
            nexthop,
            ext_community: ExtCommunityList::default(),
            source_rd: None,
        }
    }
}

/// Value-semantics hash-cons for [`BgpAttr`]. Two equal attribute sets
/// always get back the same `Arc`, so `Arc::ptr_eq` is a valid no-op check.
#[derive(Default)]
pub struct AttrDb {
    table: Mutex<HashMap<BgpAttr, Arc<BgpAttr>>>,
}

impl AttrDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locate(&self, attr: BgpAttr) -> Arc<BgpAttr> {
        let mut table = self.table.lock().unwrap();
        if let Some(existing) = table.get(&attr) {
            return existing.clone();
        }
        let arc = Arc::new(attr.clone());
        table.insert(attr, arc.clone());
        arc
    }

    /// `ReplaceExtCommunityAndLocate`: produce an attribute set identical to
    /// `attr` except for its extended-community list, interned.
    pub fn replace_ext_community_and_locate(
        &self,
        attr: &Arc<BgpAttr>,
        ext_community: ExtCommunityList,
    ) -> Arc<BgpAttr> {
        if attr.ext_community == ext_community {
            return attr.clone();
        }
        self.locate(BgpAttr {
            ext_community,
            ..(**attr).clone()
        })
    }

    /// `ReplaceSourceRdAndLocate`: produce an attribute set identical to
    /// `attr` except for its source route distinguisher, interned.
    pub fn replace_source_rd_and_locate(
        &self,
        attr: &Arc<BgpAttr>,
        rd: RouteDistinguisher,
    ) -> Arc<BgpAttr> {
        if attr.source_rd == Some(rd) {
            return attr.clone();
        }
        self.locate(BgpAttr {
            source_rd: Some(rd),
            ..(**attr).clone()
        })
    }
}

/// Value-semantics hash-cons for [`ExtCommunityList`], used to splice a new
/// route-target list into an attribute's existing extended communities
/// while leaving every non-route-target community untouched.
#[derive(Default)]
pub struct ExtCommunityDb {
    table: Mutex<HashMap<ExtCommunityList, Arc<ExtCommunityList>>>,
}

impl ExtCommunityDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn locate(&self, list: ExtCommunityList) -> Arc<ExtCommunityList> {
        let mut table = self.table.lock().unwrap();
        if let Some(existing) = table.get(&list) {
            return existing.clone();
        }
        let arc = Arc::new(list.clone());
        table.insert(list, arc.clone());
        arc
    }

    /// `ReplaceRTargetAndLocate`: splice `desired` route targets into
    /// `current`, replacing the route-target sub-communities but preserving
    /// every other extended community untouched.
    pub fn replace_rtarget_and_locate(
        &self,
        current: &ExtCommunityList,
        desired: &BTreeSet<RouteTarget>,
    ) -> ExtCommunityList {
        const SUBTYPE_ROUTE_TARGET: u8 = 0x02;
        let mut kept: Vec<ExtCommunityValue> = current
            .0
            .iter()
            .filter(|v| v.low_type != SUBTYPE_ROUTE_TARGET)
            .copied()
            .collect();
        kept.extend(desired.iter().map(|rt| rt.ext_community()));
        ExtCommunityList(kept)
    }

    pub fn intern(&self, list: ExtCommunityList) -> Arc<ExtCommunityList> {
        self.locate(list)
    }
}

/// `ExtCommunityRouteTargetList`: returns `None` when the desired route
/// target list is empty, so callers reuse the original attribute verbatim
/// instead of interning a spurious copy (§4.1).
pub fn ext_community_route_target_list(
    extcomm_db: &ExtCommunityDb,
    current: &ExtCommunityList,
    desired: &BTreeSet<RouteTarget>,
) -> Option<ExtCommunityList> {
    if desired.is_empty() {
        return None;
    }
    Some(extcomm_db.replace_rtarget_and_locate(current, desired))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_db_interns_equal_values() {
        let db = AttrDb::new();
        let a = db.locate(BgpAttr::new("10.0.0.1".parse().unwrap()));
        let b = db.locate(BgpAttr::new("10.0.0.1".parse().unwrap()));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn attr_db_distinguishes_different_values() {
        let db = AttrDb::new();
        let a = db.locate(BgpAttr::new("10.0.0.1".parse().unwrap()));
        let b = db.locate(BgpAttr::new("10.0.0.2".parse().unwrap()));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn empty_route_target_list_reuses_original() {
        let extcomm_db = ExtCommunityDb::new();
        let current = ExtCommunityList::default();
        let desired = BTreeSet::new();
        assert!(ext_community_route_target_list(&extcomm_db, &current, &desired).is_none());
    }

    #[test]
    fn replace_rtarget_preserves_non_rt_communities() {
        let extcomm_db = ExtCommunityDb::new();
        let soo = ExtCommunityValue {
            high_type: 0x00,
            low_type: 0x03,
            val: [0, 100, 0, 0, 0, 1],
        };
        let current = ExtCommunityList(vec![soo]);
        let mut desired = BTreeSet::new();
        desired.insert("target:64512:1".parse().unwrap());
        let updated = extcomm_db.replace_rtarget_and_locate(&current, &desired);
        assert!(updated.0.contains(&soo));
        assert_eq!(updated.0.len(), 2);
    }
}
