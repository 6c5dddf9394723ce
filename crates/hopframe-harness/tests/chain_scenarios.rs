//! End-to-end scenarios on a linear 10-node chain.
//!
//! Node `i` hears only nodes `i - 1` and `i + 1`, so unicast must relay
//! through every intermediate node and floods propagate hop by hop. The
//! chain spans 9 hops, which needs a hop budget above the protocol default
//! of 5; the cluster config raises it and tightens the jitter window so
//! the virtual runs stay short.

#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use hopframe_core::NodeConfig;
use hopframe_harness::Cluster;
use hopframe_proto::{Message, MessageType};

/// Opt-in engine logging for debugging failing runs: `RUST_LOG=debug`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn chain_config() -> NodeConfig {
    NodeConfig {
        ttl_default: 12,
        delay_min_ms: 1,
        delay_max_ms: 20,
        route_sync_interval_ms: 1_000,
        route_check_interval_ms: 500,
        route_expired_ms: 10_000,
        ..NodeConfig::default()
    }
}

/// Build a 10-node chain and run routing until the table settles.
fn converged_chain() -> Cluster {
    init_logging();
    let cluster = Cluster::chain(10, &chain_config());
    cluster.init_all();
    cluster.run_for(30_000);
    cluster
}

#[test]
fn route_tables_converge_across_the_chain() {
    let cluster = converged_chain();

    // The far end is 9 hops away, through the immediate neighbour.
    let far = cluster.node(0).route(9).unwrap();
    assert_eq!(far.metric, 9);
    assert_eq!(far.next_hop, 1);

    // And symmetrically from the other end.
    let back = cluster.node(9).route(0).unwrap();
    assert_eq!(back.metric, 9);
    assert_eq!(back.next_hop, 8);

    // Every node knows every destination at the chain distance.
    for node in 0..10usize {
        for dst in 0..10u8 {
            let entry = cluster.node(node).route(dst).unwrap();
            assert_eq!(
                entry.metric,
                dst.abs_diff(node as u8),
                "node {node} has wrong metric for {dst}"
            );
        }
    }
}

#[test]
fn unicast_relays_through_the_chain_exactly_once() {
    let cluster = converged_chain();

    cluster.node(0).send(9, &b"hello"[..]).unwrap();
    cluster.run_for(1_000);

    assert_eq!(cluster.recv_log(9), vec![(0, Bytes::from_static(b"hello"))]);
    for other in 0..9 {
        assert!(cluster.recv_log(other).is_empty(), "node {other} should not deliver");
    }

    // Every intermediate node forwarded exactly once.
    for relay in 1..9 {
        assert_eq!(cluster.node(relay).stats().forwarded, 1, "node {relay} forward count");
    }
}

#[test]
fn broadcast_floods_everyone_exactly_once() {
    let cluster = converged_chain();

    cluster.node(0).broadcast(&b"ping"[..]).unwrap();
    cluster.run_for(5_000);

    assert!(cluster.recv_log(0).is_empty(), "originator must not hear itself");
    for node in 1..10 {
        assert_eq!(
            cluster.recv_log(node),
            vec![(0, Bytes::from_static(b"ping"))],
            "node {node} delivery"
        );
    }
}

#[test]
fn sync_time_carries_the_originator_timestamp() {
    let cluster = converged_chain();

    let sent_ts = cluster.node(0).sync_time().unwrap();
    cluster.run_for(5_000);

    assert!(cluster.sync_log(0).is_empty());
    for node in 1..10 {
        assert_eq!(cluster.sync_log(node), vec![sent_ts], "node {node} time sync");
    }
}

#[test]
fn route_debug_traces_the_full_path_both_ways() {
    let cluster = converged_chain();

    cluster.node(0).send_route_debug(9, true).unwrap();
    cluster.run_for(1_000);

    assert_eq!(
        cluster.debug_log(9),
        vec![(0, Bytes::from_static(b"0>1>2>3>4>5>6>7>8>9"))]
    );
    assert_eq!(
        cluster.debug_log(0),
        vec![(9, Bytes::from_static(b"9<8<7<6<5<4<3<2<1<0"))]
    );
}

#[test]
fn corrupted_frames_never_reach_the_callback() {
    let cluster = Cluster::new(2, &chain_config());

    let msg = Message {
        kind: MessageType::UserData,
        ttl: 5,
        src: 0,
        dst: 1,
        seq: 7,
        ts: 0x1234,
        next_hop: 1,
        data: Bytes::from_static(b"payload"),
    };
    let bytes = msg.serialize().unwrap();

    // Flipping any single byte must be caught before dispatch.
    for at in 0..bytes.len() {
        let mut corrupt = bytes.clone();
        corrupt[at] ^= 0x01;
        assert!(Message::deserialize(&corrupt).is_err(), "flip at {at} parsed");
        cluster.node(1).receive(&corrupt, 0);
    }
    assert!(cluster.recv_log(1).is_empty());
    assert_eq!(cluster.node(1).stats().parse_errors, bytes.len() as u64);

    // The intact frame still goes through.
    cluster.node(1).receive(&bytes, 0);
    assert_eq!(cluster.recv_log(1), vec![(0, Bytes::from_static(b"payload"))]);
}

#[test]
fn flood_radius_is_bounded_by_the_hop_budget() {
    // Default hop budget of 5 on a longer chain: the flood dies at node 5.
    let config = NodeConfig {
        delay_min_ms: 1,
        delay_max_ms: 20,
        ..NodeConfig::default()
    };
    let cluster = Cluster::chain(8, &config);
    cluster.init_all();
    cluster.run_for(100);

    cluster.node(0).broadcast(&b"edge"[..]).unwrap();
    cluster.run_for(5_000);

    for node in 1..=5 {
        assert_eq!(cluster.recv_log(node).len(), 1, "node {node} within radius");
    }
    for node in 6..8 {
        assert!(cluster.recv_log(node).is_empty(), "node {node} beyond radius");
    }
}

#[test]
fn full_mesh_flood_delivers_once_despite_cross_refloods() {
    let config = NodeConfig {
        delay_min_ms: 1,
        delay_max_ms: 20,
        ..NodeConfig::default()
    };
    let cluster = Cluster::new(5, &config);
    cluster.init_all();
    cluster.run_for(100);

    cluster.node(2).broadcast(&b"storm"[..]).unwrap();
    cluster.run_for(5_000);

    assert!(cluster.recv_log(2).is_empty());
    for node in [0usize, 1, 3, 4] {
        assert_eq!(cluster.recv_log(node), vec![(2, Bytes::from_static(b"storm"))]);
        // The duplicate refloods from the other nodes were all dropped.
        assert!(cluster.node(node).stats().dropped_duplicate > 0, "node {node} saw no dups");
    }
}
