use std::cmp::Ordering;

use crate::cluster::{better_candidate, candidate_score};
use crate::types::{NetworkQuality, NodeId, NodeRole, NodeStatus};

fn status(cpu: f64, mem: f64, battery: Option<f64>, quality: NetworkQuality) -> NodeStatus {
    NodeStatus {
        node_id: NodeId::from_string("n"),
        role: NodeRole::Replica,
        connected_clients: 0,
        cpu,
        mem,
        battery,
        net_quality: quality,
        avg_rtt_ms: 10.0,
        loss_percent: 0.0,
        uptime_seconds: 60,
    }
}

#[test]
fn test_perfect_node_scores_one() {
    let score = candidate_score(&status(0.0, 0.0, None, NetworkQuality::Excellent));
    assert!((score - 1.0).abs() < 1e-9);
}

#[test]
fn test_weights_sum_as_specified() {
    // cpu term only: 0.3, mem term only: 0.2, net: 0.3, battery: 0.2.
    let loaded = candidate_score(&status(1.0, 1.0, Some(0.0), NetworkQuality::Critical));
    assert!(loaded.abs() < 1e-9);

    let cpu_only = candidate_score(&status(0.0, 1.0, Some(0.0), NetworkQuality::Critical));
    assert!((cpu_only - 0.3).abs() < 1e-9);

    let battery_only = candidate_score(&status(1.0, 1.0, Some(1.0), NetworkQuality::Critical));
    assert!((battery_only - 0.2).abs() < 1e-9);
}

#[test]
fn test_missing_battery_counts_full() {
    let mobile = candidate_score(&status(0.5, 0.5, Some(0.4), NetworkQuality::Good));
    let mains = candidate_score(&status(0.5, 0.5, None, NetworkQuality::Good));
    assert!(mains > mobile);
    assert!((mains - mobile - 0.2 * 0.6).abs() < 1e-9);
}

#[test]
fn test_out_of_range_inputs_are_clamped() {
    let score = candidate_score(&status(-2.0, 7.0, Some(9.0), NetworkQuality::Excellent));
    assert!((0.0..=1.0).contains(&score));
}

#[test]
fn test_higher_score_beats() {
    let a = NodeId::from_string("zzz");
    let b = NodeId::from_string("aaa");
    assert_eq!(better_candidate((0.9, &a), (0.8, &b)), Ordering::Greater);
    assert_eq!(better_candidate((0.8, &a), (0.9, &b)), Ordering::Less);
}

#[test]
fn test_score_tie_breaks_to_lowest_id() {
    let low = NodeId::from_string("aaa");
    let high = NodeId::from_string("bbb");
    assert_eq!(better_candidate((0.8, &low), (0.8, &high)), Ordering::Greater);
    assert_eq!(better_candidate((0.8, &high), (0.8, &low)), Ordering::Less);
    assert_eq!(better_candidate((0.8, &low), (0.8, &low)), Ordering::Equal);
}
