use crate::buffer::adaptive::AdaptiveDepth;
use crate::types::NetworkQuality;

fn depth() -> AdaptiveDepth {
    AdaptiveDepth::new(30.0, 500.0)
}

#[test]
fn test_starts_at_good_band() {
    let depth = depth();
    assert!((depth.live_ms() - 80.0).abs() < f64::EPSILON);
    assert!((depth.target_ms() - 80.0).abs() < f64::EPSILON);
}

#[test]
fn test_target_follows_quality_table() {
    let mut depth = depth();
    // Saturate the EMA on excellent conditions.
    for i in 0..100 {
        depth.observe(5.0, 0.0, f64::from(i) * 0.2, 0.2);
    }
    assert_eq!(depth.quality(), NetworkQuality::Excellent);
    assert!((depth.target_ms() - 30.0).abs() < f64::EPSILON);
}

#[test]
fn test_raw_spike_does_not_flip_band() {
    let mut depth = depth();
    for i in 0..50 {
        depth.observe(5.0, 0.0, f64::from(i) * 0.2, 0.2);
    }
    assert_eq!(depth.quality(), NetworkQuality::Excellent);

    // One raw 60 ms sample nudges the EMA to ~10.5 ms: at worst one band
    // down, nowhere near the raw sample's Fair band.
    depth.observe(60.0, 0.0, 10.2, 0.2);
    assert!(depth.smoothed_rtt_ms().unwrap() < 12.0);
    assert!(depth.quality() <= NetworkQuality::Good);
}

#[test]
fn test_band_changes_only_after_smoothed_crossing() {
    let mut depth = depth();
    for i in 0..50 {
        depth.observe(45.0, 0.05, f64::from(i) * 0.2, 0.2);
    }
    assert_eq!(depth.quality(), NetworkQuality::Good);

    // Raw steps over 50 ms; the band flips once the EMA crosses.
    let mut flipped_at = None;
    for i in 0..60 {
        let t = 10.0 + f64::from(i) * 0.2;
        depth.observe(60.0, 0.05, t, 0.2);
        if depth.quality() == NetworkQuality::Fair {
            flipped_at = Some(i);
            break;
        }
    }
    let flipped_at = flipped_at.expect("band never flipped");
    // Not on the first raw sample.
    assert!(flipped_at > 0);
}

#[test]
fn test_widening_respects_slew_limit() {
    // Step from excellent to fair conditions and watch one second of slew.
    let mut depth = depth();
    for i in 0..100 {
        depth.observe(5.0, 0.0, f64::from(i) * 0.2, 0.2);
    }
    let settled = depth.live_ms();

    let mut t = 20.0;
    for _ in 0..5 {
        // One second in 200 ms steps.
        depth.observe(60.0, 0.0, t, 0.2);
        t += 0.2;
    }
    let after_one_second = depth.live_ms();
    // Max 10 % growth per second.
    assert!(after_one_second <= settled * 1.10 * 1.001);
    assert!(after_one_second > settled);
}

#[test]
fn test_slew_invariant_over_any_window() {
    let mut depth = depth();
    let mut t = 0.0;
    for _ in 0..200 {
        let before = depth.live_ms();
        depth.observe(150.0, 2.0, t, 0.2);
        let delta = (depth.live_ms() - before).abs();
        assert!(delta <= before * 0.10 * 0.2 + 1e-9);
        t += 0.2;
    }
}

#[test]
fn test_underrun_jumps_twenty_percent() {
    let mut depth = depth();
    let before = depth.live_ms();
    depth.note_underrun(1.0);
    assert!((depth.live_ms() - before * 1.2).abs() < 1e-9);
    assert_eq!(depth.underrun_count(), 1);
}

#[test]
fn test_underrun_jump_clamps_at_max() {
    let mut depth = AdaptiveDepth::new(30.0, 90.0);
    depth.note_underrun(1.0);
    depth.note_underrun(2.0);
    assert!((depth.live_ms() - 90.0).abs() < 1e-9);
}

#[test]
fn test_decay_held_for_five_seconds_after_underrun() {
    let mut depth = depth();
    // Push live depth above target via underruns at t = 10.
    depth.note_underrun(10.0);
    let bumped = depth.live_ms();
    assert!(bumped > depth.target_ms());

    // Within the hold-off the live depth must not decay.
    let mut t = 10.2;
    while t < 14.8 {
        depth.observe(30.0, 0.0, t, 0.2);
        assert!(depth.live_ms() >= bumped - 1e-9);
        t += 0.2;
    }

    // After five seconds decay resumes.
    let mut t = 15.2;
    for _ in 0..20 {
        depth.observe(30.0, 0.0, t, 0.2);
        t += 0.2;
    }
    assert!(depth.live_ms() < bumped);
}

#[test]
fn test_widening_ignores_holdoff() {
    let mut depth = depth();
    depth.note_underrun(10.0);
    // Conditions degrade right after an underrun: widening must proceed.
    let before = depth.live_ms();
    depth.observe(300.0, 10.0, 10.2, 0.2);
    depth.observe(300.0, 10.0, 10.4, 0.2);
    assert!(depth.live_ms() > before);
}

#[test]
fn test_pressure_raises_target_one_band() {
    let mut depth = depth();
    for i in 0..100 {
        depth.observe(30.0, 0.05, f64::from(i) * 0.2, 0.2);
    }
    assert_eq!(depth.quality(), NetworkQuality::Good);
    let normal_target = depth.target_ms();

    depth.set_pressure(true);
    depth.observe(30.0, 0.05, 30.0, 0.2);
    assert!((depth.target_ms() - NetworkQuality::Fair.buffer_target_ms()).abs() < f64::EPSILON);
    assert!(depth.target_ms() > normal_target);

    depth.set_pressure(false);
    depth.observe(30.0, 0.05, 30.2, 0.2);
    assert!((depth.target_ms() - normal_target).abs() < f64::EPSILON);
}

#[test]
fn test_non_finite_observation_is_ignored() {
    let mut depth = depth();
    let before = depth.live_ms();
    depth.observe(f64::NAN, 0.0, 1.0, 0.2);
    depth.observe(10.0, f64::INFINITY, 1.2, 0.2);
    assert!((depth.live_ms() - before).abs() < f64::EPSILON);
    assert!(depth.smoothed_rtt_ms().is_none());
}
