//! End-to-end scenarios for stitching a configured static route onto a
//! dynamically discovered nexthop route, driven entirely through the
//! in-memory table/listener doubles this crate ships for its own testing.

use std::sync::Arc;

use static_route_mgr::attr::BgpAttr;
use static_route_mgr::condition::TestConditionListener;
use static_route_mgr::config::StaticRouteConfig;
use static_route_mgr::path::{Path, PathSource};
use static_route_mgr::server::BgpServer;
use static_route_mgr::table::{InMemoryTable, RoutingTable};

fn setup() -> (
    Arc<BgpServer>,
    Arc<InMemoryTable>,
    Arc<InMemoryTable>,
    Arc<TestConditionListener>,
) {
    let listener = Arc::new(TestConditionListener::new());
    let server = Arc::new(BgpServer::new(listener.clone()));
    let nexthop_table = Arc::new(InMemoryTable::new());
    let output_table = Arc::new(InMemoryTable::new());
    (server, nexthop_table, output_table, listener)
}

fn primary(nexthop: &str, label: u32) -> Path {
    let attr = Arc::new(BgpAttr::new(nexthop.parse().unwrap()));
    Path::new(attr, label, PathSource::Primary)
}

#[test]
fn basic_stitch_onto_a_single_feasible_path() {
    let (server, nexthop_table, output_table, _listener) = setup();
    let mgr = server.insert_static_route_mgr(
        "inet.0",
        nexthop_table.clone(),
        output_table.clone(),
        None,
    );

    let config = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec![]).unwrap();
    mgr.process_static_route_config(&[config.clone()]);

    let nexthop_net = "192.0.2.1/32".parse().unwrap();
    nexthop_table.add(nexthop_net, primary("192.0.2.1", 100));
    mgr.notify_all_routes();

    let entry = output_table.find(config.prefix).expect("route installed");
    assert_eq!(entry.paths.len(), 1);
    assert_eq!(output_table.drain_notifications(), vec![config.prefix]);
}

#[test]
fn ecmp_plateau_stitches_every_equally_ranked_path() {
    let (server, nexthop_table, output_table, _listener) = setup();
    let mgr = server.insert_static_route_mgr(
        "inet.0",
        nexthop_table.clone(),
        output_table.clone(),
        None,
    );
    let config = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec![]).unwrap();
    mgr.process_static_route_config(&[config.clone()]);

    let nexthop_net = "192.0.2.1/32".parse().unwrap();
    nexthop_table.add(nexthop_net, primary("192.0.2.1", 100));
    nexthop_table.add(nexthop_net, primary("192.0.2.2", 100));
    mgr.notify_all_routes();

    let entry = output_table.find(config.prefix).unwrap();
    assert_eq!(entry.paths.len(), 2);
}

#[test]
fn rtarget_only_change_restitches_without_losing_the_path() {
    let (server, nexthop_table, output_table, _listener) = setup();
    let mgr = server.insert_static_route_mgr(
        "inet.0",
        nexthop_table.clone(),
        output_table.clone(),
        None,
    );
    let initial = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec![]).unwrap();
    mgr.process_static_route_config(&[initial.clone()]);
    nexthop_table.add("192.0.2.1/32".parse().unwrap(), primary("192.0.2.1", 100));
    mgr.notify_all_routes();

    let updated = StaticRouteConfig::new(
        "10.1.1.0/24",
        "192.0.2.1",
        vec!["target:64512:1".to_string()],
    )
    .unwrap();
    mgr.update_static_route_config(&[updated.clone()]);
    mgr.drain_queue();

    let entry = output_table.find(updated.prefix).unwrap();
    assert_eq!(entry.paths.len(), 1);
    assert_eq!(entry.paths[0].attr.ext_community.0.len(), 1);
}

#[test]
fn nexthop_change_re_resolves_against_the_new_address() {
    let (server, nexthop_table, output_table, _listener) = setup();
    let mgr = server.insert_static_route_mgr(
        "inet.0",
        nexthop_table.clone(),
        output_table.clone(),
        None,
    );
    let initial = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec![]).unwrap();
    mgr.process_static_route_config(&[initial.clone()]);
    nexthop_table.add("192.0.2.1/32".parse().unwrap(), primary("192.0.2.1", 100));
    mgr.notify_all_routes();
    assert_eq!(output_table.find(initial.prefix).unwrap().paths.len(), 1);

    nexthop_table.add("192.0.2.9/32".parse().unwrap(), primary("192.0.2.9", 200));
    let moved = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.9", vec![]).unwrap();
    mgr.update_static_route_config(&[moved.clone()]);
    mgr.drain_queue();

    let entry = output_table.find(moved.prefix).unwrap();
    assert_eq!(entry.paths.len(), 1);
    assert!(entry.paths[0].nexthop() == "192.0.2.9".parse().unwrap());
}

#[test]
fn removing_the_prefix_mid_stitch_tears_down_through_all_three_phases() {
    let (server, nexthop_table, output_table, listener) = setup();
    let mgr = server.insert_static_route_mgr(
        "inet.0",
        nexthop_table.clone(),
        output_table.clone(),
        None,
    );
    let config = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec![]).unwrap();
    mgr.process_static_route_config(&[config.clone()]);
    nexthop_table.add("192.0.2.1/32".parse().unwrap(), primary("192.0.2.1", 100));
    mgr.notify_all_routes();
    assert!(output_table.find(config.prefix).is_some());
    assert!(mgr.static_route_map().contains(&config.prefix));

    // Phase A: config removes the prefix outright.
    mgr.update_static_route_config(&[]);
    mgr.drain_queue();
    // The entry survives until the listener confirms unregistration.
    assert!(mgr.static_route_map().contains(&config.prefix));

    // Phase B: the listener's done callback fires.
    listener.drain();
    mgr.drain_queue();

    assert!(!mgr.static_route_map().contains(&config.prefix));
    assert!(output_table.find(config.prefix).is_none());
}

#[test]
fn two_prefixes_on_one_table_do_not_cross_react() {
    let (server, nexthop_table, output_table, listener) = setup();
    let mgr = server.insert_static_route_mgr(
        "inet.0",
        nexthop_table.clone(),
        output_table.clone(),
        None,
    );
    let a = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec![]).unwrap();
    let b = StaticRouteConfig::new("10.2.2.0/24", "192.0.2.9", vec![]).unwrap();
    mgr.process_static_route_config(&[a.clone(), b.clone()]);

    nexthop_table.add("192.0.2.1/32".parse().unwrap(), primary("192.0.2.1", 100));
    nexthop_table.add("192.0.2.9/32".parse().unwrap(), primary("192.0.2.9", 100));
    mgr.notify_all_routes();
    assert!(output_table.find(a.prefix).is_some());
    assert!(output_table.find(b.prefix).is_some());

    // Both matches are registered on the same table, so this event reaches
    // both -- only the one actually watching 192.0.2.1 should react.
    listener.publish(
        "inet.0",
        static_route_mgr::condition::EntryEvent {
            prefix: "192.0.2.1/32".parse().unwrap(),
            entry: None,
        },
    );
    mgr.drain_queue();

    assert!(output_table.find(a.prefix).is_none(), "a's nexthop withdrawn");
    assert!(
        output_table.find(b.prefix).is_some(),
        "b's route must survive an unrelated nexthop's withdrawal"
    );
}

#[test]
fn replicated_path_picks_up_the_default_instance_rd() {
    let (server, nexthop_table, output_table, _listener) = setup();
    let default_rd = "65000:100".parse().unwrap();
    let mgr = server.insert_static_route_mgr(
        "inet.0",
        nexthop_table.clone(),
        output_table.clone(),
        Some(default_rd),
    );
    let config = StaticRouteConfig::new("10.1.1.0/24", "192.0.2.1", vec![]).unwrap();
    mgr.process_static_route_config(&[config.clone()]);

    let replicated = Path::new(
        Arc::new(BgpAttr::new("192.0.2.1".parse().unwrap())),
        100,
        PathSource::Replicated {
            source_instance: "blue".into(),
        },
    );
    nexthop_table.add("192.0.2.1/32".parse().unwrap(), replicated);
    mgr.notify_all_routes();

    let entry = output_table.find(config.prefix).unwrap();
    assert_eq!(entry.paths[0].attr.source_rd, Some(default_rd));
}
