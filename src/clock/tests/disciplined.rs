use crate::clock::DisciplinedClock;

// ===== Construction =====

#[test]
fn test_new_clock_is_zeroed() {
    let clock = DisciplinedClock::new();
    assert!(clock.offset().abs() < f64::EPSILON);
    assert!(clock.drift().abs() < f64::EPSILON);
    assert_eq!(clock.sample_count(), 0);
    assert!(clock.last_rtt().is_none());
}

// ===== Probe fusion =====

#[test]
fn test_first_probe_applies_ema_to_zero() {
    // Coordinator 1000.05 s ahead, zero RTT: offset_meas = 1000.05.
    let mut clock = DisciplinedClock::new();
    assert!(clock.submit_probe(0.0, 1000.05, 1000.05, 0.0));

    // EMA with α = 0.1 from the initial 0 estimate.
    assert!((clock.offset() - 100.005).abs() < 1e-9);
    assert!((clock.projected(0.0) - 100.005).abs() < 1e-9);
}

#[test]
fn test_offset_converges_within_a_millisecond() {
    // Repeated identical probes must close the gap geometrically.
    let mut clock = DisciplinedClock::new();
    for _ in 0..200 {
        clock.submit_probe(0.0, 1000.05, 1000.05, 0.0);
    }
    assert!((clock.projected(0.0) - 1000.05).abs() < 0.001);
}

#[test]
fn test_ema_step_is_bounded() {
    // |new − old| ≤ α·|meas − old| for every accepted probe.
    let mut clock = DisciplinedClock::new();
    let measurements = [0.5, 0.3, 0.9, 0.1, 0.7];

    for (i, meas) in measurements.iter().enumerate() {
        let old = clock.offset();
        #[allow(clippy::cast_precision_loss)]
        let t = i as f64;
        // Exchange constructed so offset_meas == meas and rtt == 10 ms.
        clock.submit_probe(t, t + meas + 0.005, t + meas + 0.005, t + 0.01);
        assert!((clock.offset() - old).abs() <= 0.1 * (meas - old).abs() + 1e-12);
    }
}

#[test]
fn test_rtt_zero_is_accepted() {
    let mut clock = DisciplinedClock::new();
    assert!(clock.submit_probe(5.0, 5.1, 5.1, 5.0));
    assert_eq!(clock.last_rtt(), Some(0.0));
    assert_eq!(clock.sample_count(), 1);
}

// ===== Rejection =====

#[test]
fn test_negative_rtt_leaves_state_unchanged() {
    let mut clock = DisciplinedClock::new();
    clock.submit_probe(0.0, 0.1, 0.1, 0.05);
    let before = clock.offset();

    // t3 − t2 exceeds t4 − t1: negative RTT.
    assert!(!clock.submit_probe(1.0, 1.1, 1.5, 1.2));
    assert!((clock.offset() - before).abs() < f64::EPSILON);
    assert_eq!(clock.sample_count(), 1);
}

#[test]
fn test_non_finite_probe_leaves_state_unchanged() {
    let mut clock = DisciplinedClock::new();
    clock.submit_probe(0.0, 0.1, 0.1, 0.05);
    let before = clock.offset();

    assert!(!clock.submit_probe(f64::NAN, 0.1, 0.1, 0.05));
    assert!(!clock.submit_probe(0.0, f64::INFINITY, 0.1, 0.05));
    assert!((clock.offset() - before).abs() < f64::EPSILON);
}

#[test]
fn test_all_equal_timestamps_do_not_poison() {
    let mut clock = DisciplinedClock::new();
    // Degenerate but finite exchange: rtt 0, offset 0. Accepted, harmless.
    assert!(clock.submit_probe(1.0, 1.0, 1.0, 1.0));
    assert!(clock.offset().is_finite());
    assert!(clock.drift().is_finite());
}

#[test]
fn test_outlier_rtt_is_rejected_after_history() {
    let mut clock = DisciplinedClock::new();
    // Build history around 10 ms RTT.
    for i in 0..6 {
        let t = f64::from(i);
        clock.submit_probe(t, t + 0.105, t + 0.105, t + 0.01);
    }
    let samples_before = clock.sample_count();

    // 500 ms RTT against a 10 ms median: well past 3×.
    assert!(!clock.submit_probe(10.0, 10.35, 10.35, 10.5));
    assert_eq!(clock.sample_count(), samples_before);
}

#[test]
fn test_zero_rtt_history_does_not_reject_small_rtts() {
    let mut clock = DisciplinedClock::new();
    // Loopback history: every RTT exactly zero.
    for i in 0..6 {
        let t = f64::from(i);
        clock.submit_probe(t, t + 0.1, t + 0.1, t);
    }

    // A 0.5 ms RTT is under the 1 ms threshold floor; must be accepted.
    assert!(clock.submit_probe(10.0, 10.1, 10.1, 10.0005));
}

// ===== Ring =====

#[test]
fn test_ring_never_exceeds_capacity() {
    let mut clock = DisciplinedClock::new();
    for i in 0..50 {
        let t = f64::from(i);
        clock.submit_probe(t, t + 0.105, t + 0.105, t + 0.01);
        assert!(clock.sample_count() <= 20);
    }
    assert_eq!(clock.sample_count(), 20);
}

// ===== Drift =====

#[test]
fn test_drift_unset_below_three_samples() {
    let mut clock = DisciplinedClock::new();
    clock.submit_probe(0.0, 0.105, 0.105, 0.01);
    clock.submit_probe(10.0, 10.115, 10.115, 10.01);
    assert!(clock.drift().abs() < f64::EPSILON);
}

#[test]
fn test_drift_fits_on_third_sample() {
    // Offset grows 1 ms per second of local time.
    let mut clock = DisciplinedClock::new();
    for i in 0..3 {
        let t = f64::from(i) * 10.0;
        let offset = 0.1 + 0.001 * t;
        clock.submit_probe(t, t + offset + 0.005, t + offset + 0.005, t + 0.01);
    }

    assert!((clock.drift() - 0.001).abs() < 1e-4);
}

#[test]
fn test_drift_tracks_linear_skew() {
    let mut clock = DisciplinedClock::new();
    for i in 0..20 {
        let t = f64::from(i);
        let offset = 0.05 + 0.002 * t;
        clock.submit_probe(t, t + offset + 0.005, t + offset + 0.005, t + 0.01);
    }

    assert!((clock.drift() - 0.002).abs() < 1e-5);
}

#[test]
fn test_degenerate_window_leaves_drift_unchanged() {
    // All receive times identical: denominator below the guard.
    let mut clock = DisciplinedClock::new();
    for offset in [0.1, 0.2, 0.3, 0.4] {
        clock.submit_probe(0.0, offset, offset, 0.0);
    }
    assert!(clock.drift().abs() < f64::EPSILON);
}

// ===== Quick samples =====

#[test]
fn test_quick_sample_fuses_at_half_weight() {
    let mut clock = DisciplinedClock::new();
    assert!(clock.submit_quick(1000.0, 0.2));

    // α/2 = 0.05 against the initial zero.
    assert!((clock.offset() - 50.0).abs() < 1e-9);
    // Quick samples stay out of the drift ring.
    assert_eq!(clock.sample_count(), 0);
    assert_eq!(clock.last_rtt(), Some(0.2));
}

#[test]
fn test_quick_sample_rejects_garbage() {
    let mut clock = DisciplinedClock::new();
    assert!(!clock.submit_quick(f64::NAN, 0.1));
    assert!(!clock.submit_quick(1.0, -0.1));
    assert!(clock.offset().abs() < f64::EPSILON);
}

// ===== Reset / idempotence =====

#[test]
fn test_reset_then_probe_matches_fresh_instance() {
    let mut seasoned = DisciplinedClock::new();
    for i in 0..10 {
        let t = f64::from(i);
        seasoned.submit_probe(t, t + 0.2, t + 0.2, t + 0.01);
    }
    seasoned.reset();
    seasoned.submit_probe(0.0, 1000.05, 1000.05, 0.0);

    let mut fresh = DisciplinedClock::new();
    fresh.submit_probe(0.0, 1000.05, 1000.05, 0.0);

    assert!((seasoned.offset() - fresh.offset()).abs() < f64::EPSILON);
    assert!((seasoned.drift() - fresh.drift()).abs() < f64::EPSILON);
    assert_eq!(seasoned.sample_count(), fresh.sample_count());
}

// ===== Projection =====

#[test]
fn test_projection_is_monotone_between_updates() {
    let mut clock = DisciplinedClock::new();
    for i in 0..5 {
        let t = f64::from(i);
        clock.submit_probe(t, t + 0.105, t + 0.105, t + 0.01);
    }

    let mut previous = clock.projected(5.0);
    for step in 1..100 {
        let t = 5.0 + f64::from(step) * 0.01;
        let projected = clock.projected(t);
        assert!(projected >= previous);
        previous = projected;
    }
}

#[test]
fn test_convergence_under_simulated_jitter() {
    // A peer 500 s ahead, probed once per second across venue WiFi.
    let link = crate::testing::LinkSimulator::venue_wifi();
    let mut clock = DisciplinedClock::new();
    let true_offset = 500.0;
    let mut accepted = 0;

    let mut t = 0.0;
    for _ in 0..300 {
        t += 1.0;
        let Some((t1, t2, t3, t4)) = link.probe_exchange(t, true_offset) else {
            continue; // Lost probe: the next one supersedes it.
        };
        if clock.submit_probe(t1, t2, t3, t4) {
            accepted += 1;
        }
    }

    assert!(accepted > 200);
    // Per-sample error is half the path asymmetry (≤ 10 ms here); the EMA
    // grinds it down well below that.
    assert!((clock.offset() - true_offset).abs() < 0.05);
    assert!(clock.drift().abs() < 1e-3);
}

#[test]
fn test_stats_snapshot() {
    let mut clock = DisciplinedClock::new();
    clock.submit_probe(0.0, 0.105, 0.105, 0.01);
    clock.submit_probe(f64::NAN, 0.1, 0.1, 0.05);

    let stats = clock.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.sample_count, 1);
}
