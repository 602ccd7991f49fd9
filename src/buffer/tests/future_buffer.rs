use crate::buffer::future_buffer::{AdmitResult, FutureBuffer};
use crate::types::{MediaAction, TrackState};

use super::frame;

fn playing_buffer(track: &str) -> FutureBuffer {
    let mut buffer = FutureBuffer::new(10.0, 512);
    buffer.apply_action(track, MediaAction::Load).unwrap();
    buffer.apply_action(track, MediaAction::Play).unwrap();
    buffer
}

// ===== Admission =====

#[test]
fn test_future_frame_is_queued() {
    let mut buffer = playing_buffer("a");
    assert_eq!(buffer.admit(frame("a", 1, 10.5), 10.0), AdmitResult::Queued);
    assert_eq!(buffer.depth("a"), 1);
}

#[test]
fn test_late_frame_is_dropped_with_lateness() {
    let mut buffer = playing_buffer("a");
    let result = buffer.admit(frame("a", 1, 9.8), 10.0);
    match result {
        AdmitResult::Late { by } => assert!((by - 0.2).abs() < 1e-9),
        other => panic!("expected Late, got {other:?}"),
    }
    assert_eq!(buffer.depth("a"), 0);
    assert_eq!(buffer.stats().late, 1);
}

#[test]
fn test_exactly_now_is_not_late() {
    let mut buffer = playing_buffer("a");
    assert_eq!(buffer.admit(frame("a", 1, 10.0), 10.0), AdmitResult::Queued);
    // And it is immediately due.
    let released = buffer.pop_due(10.0);
    assert_eq!(released.len(), 1);
}

#[test]
fn test_too_far_frame_is_dropped() {
    let mut buffer = playing_buffer("a");
    let result = buffer.admit(frame("a", 1, 25.0), 10.0);
    match result {
        AdmitResult::TooFar { lead } => assert!((lead - 15.0).abs() < 1e-9),
        other => panic!("expected TooFar, got {other:?}"),
    }
    assert_eq!(buffer.stats().too_far, 1);
}

#[test]
fn test_redelivered_frame_is_dropped() {
    let mut buffer = playing_buffer("a");
    assert_eq!(buffer.admit(frame("a", 5, 10.5), 10.0), AdmitResult::Queued);
    // Identical redelivery while still queued.
    assert_eq!(
        buffer.admit(frame("a", 5, 10.5), 10.0),
        AdmitResult::Duplicate
    );
    assert_eq!(buffer.depth("a"), 1);
}

#[test]
fn test_reordered_arrival_is_admitted() {
    // Lower sequences arriving after higher ones are exactly what the
    // buffer absorbs; only presentation order matters on release.
    let mut buffer = playing_buffer("a");
    assert_eq!(buffer.admit(frame("a", 2, 10.2), 10.0), AdmitResult::Queued);
    assert_eq!(buffer.admit(frame("a", 1, 10.1), 10.0), AdmitResult::Queued);
    assert_eq!(buffer.admit(frame("a", 3, 10.3), 10.0), AdmitResult::Queued);
    assert_eq!(buffer.depth("a"), 3);

    let released = buffer.pop_due(10.4);
    let sequences: Vec<u64> = released.iter().map(|f| f.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[test]
fn test_frame_behind_release_watermark_is_dropped() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 2, 10.0), 10.0);
    assert_eq!(buffer.pop_due(10.0).len(), 1);

    // Sequence 2 already went to the renderer; a redelivery of it or
    // anything older cannot be emitted in order any more.
    assert_eq!(
        buffer.admit(frame("a", 2, 10.5), 10.1),
        AdmitResult::Duplicate
    );
    assert_eq!(
        buffer.admit(frame("a", 1, 10.5), 10.1),
        AdmitResult::Duplicate
    );
    assert_eq!(buffer.stats().duplicate, 2);
}

#[test]
fn test_non_finite_timing_is_discarded() {
    let mut buffer = playing_buffer("a");
    let mut bad = frame("a", 1, f64::NAN);
    assert_eq!(buffer.admit(bad.clone(), 10.0), AdmitResult::Malformed);

    bad.presentation = 10.5;
    bad.duration = f64::INFINITY;
    assert_eq!(buffer.admit(bad, 10.0), AdmitResult::Malformed);

    assert_eq!(buffer.depth("a"), 0);
    assert_eq!(buffer.stats().malformed, 2);
}

#[test]
fn test_queue_pressure_over_threshold() {
    let mut buffer = FutureBuffer::new(10.0, 4);
    buffer.apply_action("a", MediaAction::Load).unwrap();
    for (i, presentation) in [10.10, 10.11, 10.12, 10.13].into_iter().enumerate() {
        assert_eq!(
            buffer.admit(frame("a", i as u64, presentation), 10.0),
            AdmitResult::Queued
        );
    }
    // Fifth frame crosses the threshold but is still queued, not dropped.
    assert_eq!(
        buffer.admit(frame("a", 4, 10.2), 10.0),
        AdmitResult::QueuedWithPressure
    );
    assert_eq!(buffer.depth("a"), 5);
    assert!(buffer.under_pressure());
}

// ===== Release =====

#[test]
fn test_release_in_presentation_order() {
    let mut buffer = playing_buffer("a");
    // Admit out of order.
    buffer.admit(frame("a", 3, 10.3), 10.0);
    buffer.admit(frame("a", 4, 10.1), 10.0);
    buffer.admit(frame("a", 5, 10.2), 10.0);

    let released = buffer.pop_due(10.4);
    let presentations: Vec<f64> = released.iter().map(|f| f.presentation).collect();
    assert_eq!(presentations, vec![10.1, 10.2, 10.3]);
}

#[test]
fn test_release_stops_at_future_frames() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 1, 10.1), 10.0);
    buffer.admit(frame("a", 2, 10.9), 10.0);

    let released = buffer.pop_due(10.5);
    assert_eq!(released.len(), 1);
    assert_eq!(buffer.depth("a"), 1);
}

#[test]
fn test_equal_presentation_ties_break_by_sequence() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 2, 10.1), 10.0);
    buffer.admit(frame("a", 7, 10.1), 10.0);

    let released = buffer.pop_due(10.2);
    let sequences: Vec<u64> = released.iter().map(|f| f.sequence).collect();
    assert_eq!(sequences, vec![2, 7]);
}

#[test]
fn test_paused_track_does_not_release() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 1, 10.1), 10.0);
    buffer.apply_action("a", MediaAction::Pause).unwrap();

    assert!(buffer.pop_due(10.5).is_empty());
    assert!(buffer.next_deadline().is_none());

    buffer.apply_action("a", MediaAction::Play).unwrap();
    assert_eq!(buffer.pop_due(10.5).len(), 1);
}

#[test]
fn test_next_deadline_is_earliest_playing_frame() {
    let mut buffer = playing_buffer("a");
    buffer.apply_action("b", MediaAction::Load).unwrap();
    buffer.apply_action("b", MediaAction::Play).unwrap();

    buffer.admit(frame("a", 1, 10.7), 10.0);
    buffer.admit(frame("b", 1, 10.3), 10.0);

    assert!((buffer.next_deadline().unwrap() - 10.3).abs() < 1e-9);
}

// ===== Underruns =====

#[test]
fn test_underrun_reported_once_until_new_frame() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 1, 10.0), 10.0);
    buffer.pop_due(10.0);

    // Past the released frame's coverage with nothing queued.
    assert_eq!(buffer.detect_underruns(10.1), vec!["a".to_string()]);
    // Not reported again until a frame arrives.
    assert!(buffer.detect_underruns(10.2).is_empty());

    buffer.admit(frame("a", 2, 10.5), 10.2);
    buffer.pop_due(10.5);
    assert_eq!(buffer.detect_underruns(10.6), vec!["a".to_string()]);
}

#[test]
fn test_no_underrun_while_covered() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 1, 10.0), 10.0);
    buffer.pop_due(10.0);

    // Frame covers until 10.02.
    assert!(buffer.detect_underruns(10.01).is_empty());
}

#[test]
fn test_no_underrun_before_first_release() {
    let mut buffer = playing_buffer("a");
    assert!(buffer.detect_underruns(10.0).is_empty());
}

// ===== State machine integration =====

#[test]
fn test_apply_action_on_unknown_track_fails() {
    let mut buffer = FutureBuffer::new(10.0, 512);
    assert!(buffer.apply_action("ghost", MediaAction::Pause).is_none());
}

#[test]
fn test_load_creates_ready_track() {
    let mut buffer = FutureBuffer::new(10.0, 512);
    assert_eq!(
        buffer.apply_action("a", MediaAction::Load),
        Some(TrackState::Ready)
    );
}

#[test]
fn test_stop_clears_queue() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 1, 10.5), 10.0);
    buffer.apply_action("a", MediaAction::Stop).unwrap();
    assert_eq!(buffer.depth("a"), 0);
    assert_eq!(buffer.track_state("a"), Some(TrackState::Stopped));
}

#[test]
fn test_unload_removes_track() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 1, 10.5), 10.0);
    buffer.apply_action("a", MediaAction::Unload).unwrap();
    assert!(buffer.track_state("a").is_none());
}

#[test]
fn test_invalid_transition_keeps_state_and_queue() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 1, 10.5), 10.0);

    assert!(buffer.apply_action("a", MediaAction::Load).is_none());
    assert_eq!(buffer.track_state("a"), Some(TrackState::Playing));
    assert_eq!(buffer.depth("a"), 1);
}

// ===== Loss accounting =====

#[test]
fn test_loss_percent_from_sequence_gaps() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 0, 10.1), 10.0);
    buffer.admit(frame("a", 1, 10.2), 10.0);
    // Sequences 2 and 3 never arrive.
    buffer.admit(frame("a", 4, 10.3), 10.0);

    // 3 of 5 expected: 40 % loss.
    assert!((buffer.loss_percent() - 40.0).abs() < 1e-9);
}

#[test]
fn test_loss_percent_empty_buffer_is_zero() {
    let buffer = FutureBuffer::new(10.0, 512);
    assert!(buffer.loss_percent().abs() < f64::EPSILON);
}

#[test]
fn test_flush_drops_everything() {
    let mut buffer = playing_buffer("a");
    buffer.admit(frame("a", 1, 10.5), 10.0);
    buffer.flush();
    assert_eq!(buffer.depth("a"), 0);
    assert!(buffer.track_state("a").is_none());
}
