//! Integration tests for scan sessions
//!
//! Sessions run against scripted cameras and decoders so that every exit path
//! (decode, cancel, device loss, open failure) can be driven deterministically
//! and the camera release checked afterwards.

mod common;

use common::*;
use rust_qr_scan::{
    DecodeResult, DeviceError, Frame, PixelFormat, PreviewMailbox, QrDecoder, ReplayOpener,
    ScanConfig, ScanSession, SessionError, SessionOutcome, SessionState,
};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> ScanConfig {
    ScanConfig::default()
        .frame_timeout(Duration::from_millis(20))
        .decode_budget(Duration::from_secs(2))
}

#[test]
fn test_decoded_frame_ends_session() {
    let frames = vec![
        blank_frame(120, 120, 1),
        blank_frame(120, 120, 2),
        blank_frame(120, 120, 3),
        qr_frame("HELLO-QR", PixelFormat::Rgb, 4),
    ];
    let (source, stats) = ScriptedSource::frames(frames, Duration::from_millis(10));

    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(QrDecoder::new())
        .config(fast_config())
        .build();
    session.start().unwrap();

    let outcome = session.await_outcome();
    assert_eq!(
        outcome,
        SessionOutcome::Success {
            text: "HELLO-QR".to_string()
        }
    );
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(stats.closes(), 1, "camera must be released exactly once");
}

#[test]
fn test_cancel_releases_camera() {
    let (source, stats) = ScriptedSource::new(Vec::new(), Duration::ZERO);
    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .config(fast_config())
        .build();
    session.start().unwrap();

    assert!(eventually(Duration::from_secs(2), || {
        session.state() == SessionState::Running
    }));
    assert!(eventually(Duration::from_secs(2), || {
        stats.next_frame_calls() > 0
    }));

    let cancelled_at = Instant::now();
    session.cancel();
    let outcome = session.await_outcome();
    let latency = cancelled_at.elapsed();

    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert!(
        latency < Duration::from_millis(500),
        "cancel took {:?}",
        latency
    );
    assert_eq!(stats.closes(), 1);
}

#[test]
fn test_cancel_is_idempotent() {
    let (source, stats) = ScriptedSource::new(Vec::new(), Duration::ZERO);
    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .config(fast_config())
        .build();
    session.start().unwrap();

    let token = session.cancel_token();
    token.cancel();
    token.cancel();
    session.cancel();
    assert_eq!(session.await_outcome(), SessionOutcome::Cancelled);

    // After termination further cancels change nothing
    token.cancel();
    session.cancel();
    assert!(token.is_terminated());
    assert_eq!(session.await_outcome(), SessionOutcome::Cancelled);
    assert_eq!(session.outcome(), Some(SessionOutcome::Cancelled));
    assert!(stats.closes() <= 1);
}

#[test]
fn test_cancel_before_start_never_opens() {
    let (source, stats) = ScriptedSource::new(Vec::new(), Duration::ZERO);
    let opener = ScriptedOpener::new(source);
    let opens = Arc::clone(&opener.opens);
    let mut session = ScanSession::builder(opener).config(fast_config()).build();

    session.cancel();
    assert_eq!(session.state(), SessionState::Terminated);
    session.start().unwrap();

    assert_eq!(session.await_outcome(), SessionOutcome::Cancelled);
    assert_eq!(opens.load(Ordering::SeqCst), 0);
    assert_eq!(stats.next_frame_calls(), 0);
}

#[test]
fn test_await_without_start_cancels() {
    let (source, _stats) = ScriptedSource::new(Vec::new(), Duration::ZERO);
    let mut session = ScanSession::builder(ScriptedOpener::new(source)).build();
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.outcome(), None);
    assert_eq!(session.await_outcome(), SessionOutcome::Cancelled);
}

#[test]
fn test_second_start_rejected() {
    let (source, _stats) = ScriptedSource::new(Vec::new(), Duration::ZERO);
    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .config(fast_config())
        .build();
    session.start().unwrap();
    assert!(matches!(session.start(), Err(SessionError::AlreadyStarted)));
    session.cancel();
    assert_eq!(session.await_outcome(), SessionOutcome::Cancelled);
}

#[test]
fn test_device_lost_mid_scan() {
    let steps = vec![
        Step::Frame(blank_frame(32, 32, 1)),
        Step::Timeout,
        Step::Frame(blank_frame(32, 32, 2)),
        Step::Lost,
        Step::Frame(blank_frame(32, 32, 3)),
    ];
    let (source, stats) = ScriptedSource::new(steps, Duration::ZERO);
    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(|_: &Frame| DecodeResult::NotFound)
        .config(fast_config())
        .build();
    session.start().unwrap();

    assert_eq!(session.await_outcome(), SessionOutcome::DeviceLost);
    assert_eq!(stats.next_frame_calls(), 4);
    assert_eq!(stats.calls_after_lost(), 0);
    assert_eq!(stats.closes(), 1);
}

#[test]
fn test_open_failure_is_device_unavailable() {
    for error in [
        DeviceError::NotFound {
            selector: "default".to_string(),
        },
        DeviceError::Busy {
            selector: "default".to_string(),
        },
        DeviceError::PermissionDenied {
            selector: "default".to_string(),
        },
    ] {
        let opener = ScriptedOpener::failing(error);
        let opens = Arc::clone(&opener.opens);
        let mut session = ScanSession::builder(opener).config(fast_config()).build();
        session.start().unwrap();

        let outcome = session.await_outcome();
        assert_eq!(outcome, SessionOutcome::DeviceUnavailable);
        assert!(outcome.is_fault());
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_latest_frame_wins() {
    // Frame 1 is slow to decode; 2 and 3 arrive meanwhile and are superseded
    // by 4, which carries the code.
    let frames = (1..=4).map(|seq| blank_frame(16, 16, seq)).collect();
    let (source, stats) = ScriptedSource::frames(frames, Duration::from_millis(25));
    let (decoder, seen) = ScriptedDecoder::new([
        (1, Reply::not_found().after(Duration::from_millis(300))),
        (2, Reply::decoded("stale-2")),
        (3, Reply::decoded("stale-3")),
        (4, Reply::decoded("fresh")),
    ]);

    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(decoder)
        .config(fast_config())
        .build();
    session.start().unwrap();

    assert_eq!(
        session.await_outcome(),
        SessionOutcome::Success {
            text: "fresh".to_string()
        }
    );
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![1, 4]);
    assert_eq!(stats.closes(), 1);
}

#[test]
fn test_decoder_sees_increasing_sequences() {
    let frames = (1..=12).map(|seq| blank_frame(16, 16, seq)).collect();
    let (source, _stats) = ScriptedSource::frames(frames, Duration::from_millis(2));
    let replies = (1..=12).map(|seq| (seq, Reply::not_found().after(Duration::from_millis(7))));
    let (decoder, seen) = ScriptedDecoder::new(replies);

    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(decoder)
        .config(fast_config())
        .build();
    session.start().unwrap();
    thread::sleep(Duration::from_millis(200));
    session.cancel();
    assert_eq!(session.await_outcome(), SessionOutcome::Cancelled);

    let seen = seen.lock().unwrap().clone();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "seen {:?}", seen);
}

#[test]
fn test_out_of_order_frames_dropped() {
    let frames = vec![
        blank_frame(16, 16, 5),
        blank_frame(16, 16, 3),
        blank_frame(16, 16, 5),
        blank_frame(16, 16, 6),
    ];
    let (source, _stats) = ScriptedSource::frames(frames, Duration::from_millis(5));
    let shown = Arc::new(Mutex::new(Vec::new()));
    let preview = {
        let shown = Arc::clone(&shown);
        move |frame: Arc<Frame>| shown.lock().unwrap().push(frame.sequence())
    };

    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(|_: &Frame| DecodeResult::NotFound)
        .preview(preview)
        .config(fast_config())
        .build();
    session.start().unwrap();
    assert!(eventually(Duration::from_secs(2), || {
        shown.lock().unwrap().len() >= 2
    }));
    session.cancel();
    session.await_outcome();

    assert_eq!(*shown.lock().unwrap(), vec![5, 6]);
}

#[test]
fn test_preview_gets_latest_frame() {
    let frames = (1..=6).map(|seq| blank_frame(16, 16, seq)).collect();
    let (source, _stats) = ScriptedSource::frames(frames, Duration::ZERO);
    let preview = PreviewMailbox::new();

    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(|_: &Frame| DecodeResult::NotFound)
        .preview(preview.clone())
        .config(fast_config())
        .build();
    session.start().unwrap();
    // Script is exhausted once the source starts timing out
    thread::sleep(Duration::from_millis(150));
    session.cancel();
    session.await_outcome();

    assert_eq!(preview.take_latest().map(|f| f.sequence()), Some(6));
    assert!(preview.take_latest().is_none());
}

#[test]
fn test_over_budget_decode_ignored() {
    let frames = vec![blank_frame(16, 16, 1)];
    let (source, _stats) = ScriptedSource::frames(frames, Duration::ZERO);
    let (decoder, _seen) =
        ScriptedDecoder::new([(1, Reply::decoded("late").after(Duration::from_millis(120)))]);

    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(decoder)
        .config(
            ScanConfig::default()
                .frame_timeout(Duration::from_millis(20))
                .decode_budget(Duration::from_millis(40)),
        )
        .build();
    session.start().unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(session.state(), SessionState::Running);
    session.cancel();
    assert_eq!(session.await_outcome(), SessionOutcome::Cancelled);
}

#[test]
fn test_slow_decode_does_not_hold_camera_after_cancel() {
    let frames = vec![blank_frame(16, 16, 1)];
    let (source, stats) = ScriptedSource::frames(frames, Duration::ZERO);
    let (decoder, seen) =
        ScriptedDecoder::new([(1, Reply::not_found().after(Duration::from_millis(1500)))]);

    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(decoder)
        .config(
            ScanConfig::default()
                .frame_timeout(Duration::from_millis(20))
                .decode_budget(Duration::from_millis(50)),
        )
        .build();
    session.start().unwrap();
    assert!(eventually(Duration::from_secs(2), || {
        seen.lock().unwrap().contains(&1)
    }));

    let cancelled_at = Instant::now();
    session.cancel();
    assert!(
        eventually(Duration::from_millis(200), || stats.closes() == 1),
        "camera still open {:?} after cancel",
        cancelled_at.elapsed()
    );
    assert_eq!(session.outcome(), None, "decode is still in flight");

    assert_eq!(session.await_outcome(), SessionOutcome::Cancelled);
    assert_eq!(stats.closes(), 1);
}

#[test]
fn test_decoder_panic_does_not_end_session() {
    let frames = vec![blank_frame(16, 16, 1), blank_frame(16, 16, 2)];
    let (source, stats) = ScriptedSource::frames(frames, Duration::from_millis(30));
    let decoder = |frame: &Frame| {
        if frame.sequence() == 1 {
            panic!("corrupt symbol");
        }
        DecodeResult::Decoded {
            text: "recovered".to_string(),
        }
    };

    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .decoder(decoder)
        .config(fast_config())
        .build();
    session.start().unwrap();
    assert_eq!(
        session.await_outcome(),
        SessionOutcome::Success {
            text: "recovered".to_string()
        }
    );
    assert_eq!(stats.closes(), 1);
}

#[test]
fn test_drop_running_session_releases_camera() {
    let (source, stats) = ScriptedSource::new(Vec::new(), Duration::ZERO);
    let mut session = ScanSession::builder(ScriptedOpener::new(source))
        .config(fast_config())
        .build();
    session.start().unwrap();
    assert!(eventually(Duration::from_secs(2), || {
        stats.next_frame_calls() > 0
    }));
    drop(session);
    assert_eq!(stats.closes(), 1);
}

#[test]
fn test_replay_session_decodes_image_frames() {
    let frames = vec![
        blank_frame(100, 100, 1),
        qr_frame("https://example.com/ticket/42", PixelFormat::Gray, 2),
    ];
    let opener = ReplayOpener::new(frames, Duration::from_millis(10)).looping(true);
    let mut session = ScanSession::builder(opener).config(fast_config()).build();
    session.start().unwrap();
    assert_eq!(
        session.await_outcome().text(),
        Some("https://example.com/ticket/42")
    );
}
