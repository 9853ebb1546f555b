//! End-to-end playback scenarios through the runtime: normalization, dedup,
//! coordination, and emitted player events.

use crate::helpers::{demo_runtime, is_player_load, structured, wait_for};
use reel::config::ReelConfig;
use reel::playback::{Phase, SuppressReason};
use reel::runtime::DropReason;
use reel::{Collaborators, EventSource, RuntimeEvent, ToolName};
use serde_json::json;
use std::time::{Duration, Instant};

const SHORT: Duration = Duration::from_secs(2);

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn dropped_reason(events: &[RuntimeEvent]) -> Option<DropReason> {
    events.iter().find_map(|event| match event {
        RuntimeEvent::ToolCallDropped { reason, .. } => Some(*reason),
        _ => None,
    })
}

#[tokio::test]
async fn pause_command_disguised_as_fetch_pauses_playback() {
    let (mut runtime, mut rx) = demo_runtime(&ReelConfig::default(), Collaborators::noop());
    let t0 = Instant::now();

    let emitted = runtime.handle_event_at(
        EventSource::Realtime,
        &structured("fetch_video", json!({"title": "Welcome Tour"})),
        t0,
    );
    assert!(emitted.contains(&RuntimeEvent::PhaseChanged {
        from: Phase::Idle,
        to: Phase::Conversation,
    }));
    assert!(emitted.contains(&RuntimeEvent::PhaseChanged {
        from: Phase::Conversation,
        to: Phase::VideoPlaying,
    }));
    let load = wait_for(&mut rx, SHORT, is_player_load).await.expect("player load");
    assert_eq!(
        load,
        RuntimeEvent::PlayerLoad {
            title: "Welcome Tour".into(),
            index: 0,
            url: "https://cdn.example.test/welcome.mp4".into(),
        }
    );

    runtime.report_player_position(42.5);
    let pause = json!({
        "event_type": "conversation_toolcall",
        "data": {"name": "fetch_video", "arguments": "{\"title\":\"pause\"}"}
    });
    let emitted = runtime.handle_event_at(EventSource::Realtime, &pause, t0 + secs(2.0));

    assert!(emitted.iter().any(|event| matches!(
        event,
        RuntimeEvent::ToolCallForwarded { call, .. } if call.name == ToolName::PauseVideo
    )));
    assert!(emitted.contains(&RuntimeEvent::PlayerPause));
    let session = runtime.session();
    assert_eq!(session.phase(), Phase::VideoPlaying);
    assert!((session.paused_position_seconds() - 42.5).abs() < f64::EPSILON);
    assert_eq!(
        session.suppression().map(|w| w.reason),
        Some(SuppressReason::Pause)
    );

    // The agent re-issues the fetch right after the pause.
    let echo = runtime.handle_event_at(
        EventSource::Broadcast,
        &structured("fetch_video", json!({"title": "Welcome Tour"})),
        t0 + secs(2.2),
    );
    assert_eq!(
        dropped_reason(&echo),
        Some(DropReason::Suppressed(SuppressReason::Pause))
    );
    assert!(!echo.contains(&RuntimeEvent::PlayerPlay));
}

#[tokio::test]
async fn re_requesting_current_video_resumes_in_place() {
    let (mut runtime, _rx) = demo_runtime(&ReelConfig::default(), Collaborators::noop());
    let t0 = Instant::now();
    let fetch = structured("fetch_video", json!({"title": "Reporting Basics"}));

    runtime.handle_event_at(EventSource::Realtime, &fetch, t0);
    runtime.report_player_position(17.0);
    runtime.handle_event_at(
        EventSource::Realtime,
        &structured("pause_video", json!({})),
        t0 + secs(1.0),
    );

    // After both the dedup and pause windows have elapsed.
    let emitted = runtime.handle_event_at(
        EventSource::Realtime,
        &structured("fetch_video", json!({"title": "reporting basics"})),
        t0 + secs(4.0),
    );
    assert!(emitted.contains(&RuntimeEvent::PlayerSeek { seconds: 17.0 }));
    assert!(emitted.contains(&RuntimeEvent::PlayerPlay));
    assert!(!emitted.iter().any(|e| matches!(e, RuntimeEvent::ErrorHidden)));
    assert!((runtime.session().paused_position_seconds() - 17.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn fetch_after_close_is_dropped_until_window_elapses() {
    let (mut runtime, mut rx) = demo_runtime(&ReelConfig::default(), Collaborators::noop());
    let t0 = Instant::now();
    let fetch = structured("fetch_video", json!({"title": "Team Settings"}));

    runtime.handle_event_at(EventSource::Realtime, &fetch, t0);
    wait_for(&mut rx, SHORT, is_player_load).await.expect("first load");

    let closed = runtime.handle_event_at(
        EventSource::Realtime,
        &structured("close_video", json!({})),
        t0 + secs(0.2),
    );
    assert!(closed.contains(&RuntimeEvent::PlayerClose));
    assert!(closed.contains(&RuntimeEvent::ErrorHidden));
    assert_eq!(runtime.session().phase(), Phase::Conversation);

    let too_soon = runtime.handle_event_at(EventSource::Broadcast, &fetch, t0 + secs(0.5));
    assert_eq!(
        dropped_reason(&too_soon),
        Some(DropReason::Suppressed(SuppressReason::Close))
    );
    assert_eq!(runtime.session().phase(), Phase::Conversation);

    let later = runtime.handle_event_at(EventSource::Broadcast, &fetch, t0 + secs(1.5));
    assert_eq!(dropped_reason(&later), None);
    assert_eq!(runtime.session().phase(), Phase::VideoPlaying);
    let load = wait_for(&mut rx, SHORT, is_player_load).await.expect("second load");
    assert!(matches!(load, RuntimeEvent::PlayerLoad { index: 2, .. }));
}

#[tokio::test]
async fn structured_and_transcript_duplicates_fire_once() {
    let (mut runtime, _rx) = demo_runtime(&ReelConfig::default(), Collaborators::noop());
    let t0 = Instant::now();

    let first = runtime.handle_event_at(
        EventSource::Realtime,
        &structured("fetch_video", json!({"title": "Welcome Tour"})),
        t0,
    );
    assert_eq!(dropped_reason(&first), None);

    let transcript = json!({
        "event_type": "application.transcription_ready",
        "data": {"transcript": [
            {"role": "assistant", "tool_calls": [
                {"function": {"name": "fetch_video", "arguments": "{\"title\": \"welcome tour\"}"}}
            ]}
        ]}
    });
    let second = runtime.handle_event_at(EventSource::Realtime, &transcript, t0 + secs(0.3));
    assert_eq!(dropped_reason(&second), Some(DropReason::Duplicate));
}

#[tokio::test]
async fn next_video_without_current_video_is_a_no_op() {
    let (mut runtime, _rx) = demo_runtime(&ReelConfig::default(), Collaborators::noop());
    let before = runtime.session().clone();

    let emitted = runtime.handle_event(EventSource::Broadcast, &structured("next_video", json!({})));
    assert_eq!(dropped_reason(&emitted), Some(DropReason::Ignored));
    assert_eq!(runtime.session(), &before);
}

#[tokio::test]
async fn next_video_wraps_around_the_catalog() {
    let (mut runtime, mut rx) = demo_runtime(&ReelConfig::default(), Collaborators::noop());
    let t0 = Instant::now();

    runtime.handle_event_at(
        EventSource::Realtime,
        &structured("fetch_video", json!({"title": "Team Settings"})),
        t0,
    );
    wait_for(&mut rx, SHORT, is_player_load).await.expect("first load");

    runtime.handle_event_at(
        EventSource::Realtime,
        &json!({"type": "tool_call", "name": "next_video"}),
        t0 + secs(0.1),
    );
    let load = wait_for(&mut rx, SHORT, is_player_load).await.expect("next load");
    assert!(matches!(load, RuntimeEvent::PlayerLoad { index: 0, .. }));
    assert_eq!(runtime.session().current_video().map(|v| v.index), Some(0));
}

#[tokio::test]
async fn trial_cta_closes_player_and_applies_overrides() {
    let (mut runtime, _rx) = demo_runtime(&ReelConfig::default(), Collaborators::noop());
    let t0 = Instant::now();

    runtime.handle_event_at(
        EventSource::Realtime,
        &structured("fetch_video", json!({"title": "Welcome Tour"})),
        t0,
    );
    let emitted = runtime.handle_event_at(
        EventSource::Broadcast,
        &structured(
            "show_trial_cta",
            json!({"title": "Try it free", "message": "14 days on us", "button": "Start"}),
        ),
        t0 + secs(0.1),
    );

    assert!(emitted.contains(&RuntimeEvent::PlayerClose));
    let overrides = emitted
        .iter()
        .find_map(|event| match event {
            RuntimeEvent::CtaRevealed(overrides) => Some(overrides.clone()),
            _ => None,
        })
        .expect("cta revealed");
    assert_eq!(overrides.title.as_deref(), Some("Try it free"));
    assert_eq!(overrides.message.as_deref(), Some("14 days on us"));
    assert_eq!(overrides.button_text.as_deref(), Some("Start"));
    assert_eq!(runtime.session().phase(), Phase::Conversation);
    assert!(runtime.session().suppression().is_none());
}

#[tokio::test]
async fn unknown_title_reports_error_and_keeps_session() {
    let (mut runtime, _rx) = demo_runtime(&ReelConfig::default(), Collaborators::noop());
    let emitted = runtime.handle_event(
        EventSource::Broadcast,
        &structured("fetch_video", json!({"title": "Quarterly Forecast"})),
    );
    assert!(emitted.iter().any(|event| matches!(
        event,
        RuntimeEvent::ErrorShown { message } if message.contains("Quarterly Forecast")
    )));
    assert_eq!(runtime.session().phase(), Phase::Idle);
    assert!(runtime.session().current_video().is_none());
}

#[tokio::test]
async fn close_reveals_cta_after_configured_delay() {
    let mut config = ReelConfig::default();
    config.playback.cta_reveal_delay_ms = 50;
    let (mut runtime, mut rx) = demo_runtime(&config, Collaborators::noop());

    let emitted = runtime.handle_event(EventSource::Realtime, &structured("close_video", json!({})));
    assert!(!emitted.iter().any(|e| matches!(e, RuntimeEvent::CtaRevealed(_))));

    let revealed = wait_for(&mut rx, SHORT, |e| matches!(e, RuntimeEvent::CtaRevealed(_))).await;
    assert!(revealed.is_some());
}

#[tokio::test]
async fn utterance_is_superseded_by_structured_call() {
    let mut config = ReelConfig::default();
    config.normalizer.utterance_fallback = true;
    let (mut runtime, _rx) = demo_runtime(&config, Collaborators::noop());
    let t0 = Instant::now();

    runtime.handle_event_at(
        EventSource::Realtime,
        &structured("fetch_video", json!({"title": "Welcome Tour"})),
        t0,
    );
    let utterance = json!({
        "event_type": "conversation.utterance",
        "properties": {"speech": "skip this one"}
    });
    let emitted = runtime.handle_event_at(EventSource::Realtime, &utterance, t0 + secs(0.4));
    assert_eq!(dropped_reason(&emitted), Some(DropReason::Superseded));
    assert_eq!(runtime.session().current_video().map(|v| v.index), Some(0));

    // Outside the window the utterance path is honored.
    let emitted = runtime.handle_event_at(EventSource::Realtime, &utterance, t0 + secs(3.0));
    assert_eq!(dropped_reason(&emitted), None);
    assert_eq!(runtime.session().current_video().map(|v| v.index), Some(1));
}
