use crate::session::HeartbeatMonitor;

#[test]
fn test_fresh_monitor_is_healthy() {
    let monitor = HeartbeatMonitor::new(5.0, 2, 100.0);
    assert!(monitor.is_healthy(100.0));
    assert_eq!(monitor.missed(104.9), 0);
}

#[test]
fn test_one_missed_interval_still_healthy() {
    let monitor = HeartbeatMonitor::new(5.0, 2, 100.0);
    // One full interval missed: degraded but alive.
    assert_eq!(monitor.missed(105.1), 1);
    assert!(monitor.is_healthy(105.1));
}

#[test]
fn test_two_missed_intervals_is_unhealthy() {
    let monitor = HeartbeatMonitor::new(5.0, 2, 100.0);
    assert_eq!(monitor.missed(110.1), 2);
    assert!(!monitor.is_healthy(110.1));
}

#[test]
fn test_heartbeat_restores_health() {
    let mut monitor = HeartbeatMonitor::new(5.0, 2, 100.0);
    assert!(!monitor.is_healthy(111.0));

    monitor.note_seen(111.0);
    assert!(monitor.is_healthy(111.5));
    assert_eq!(monitor.last_seen(), 111.0);
}

#[test]
fn test_out_of_order_heartbeat_does_not_rewind() {
    let mut monitor = HeartbeatMonitor::new(5.0, 2, 100.0);
    monitor.note_seen(110.0);
    monitor.note_seen(104.0);
    assert_eq!(monitor.last_seen(), 110.0);
}
