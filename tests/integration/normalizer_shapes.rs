//! Normalizer behavior across every inbound event shape.

use crate::helpers::structured;
use reel::config::NormalizerConfig;
use reel::dedup::normalize_message;
use reel::tool_call::SourceKind;
use reel::{Normalizer, ToolCall, ToolName, canonical_json};
use serde_json::{Value, json};

fn with_fallback() -> Normalizer {
    Normalizer::new(NormalizerConfig {
        utterance_fallback: true,
    })
}

#[test]
fn command_title_in_structured_call_becomes_pause() {
    let event = json!({
        "event_type": "conversation_toolcall",
        "data": {"name": "fetch_video", "arguments": "{\"title\":\"pause\"}"}
    });
    let (call, source) = Normalizer::default()
        .normalize_with_source(&event)
        .expect("call");
    assert_eq!(call, ToolCall::control(ToolName::PauseVideo));
    assert_eq!(source, SourceKind::Structured);
    assert_eq!(
        canonical_json(Some(&call)),
        json!({"toolName": "pause_video", "toolArgs": {}})
    );
}

#[test]
fn malformed_events_are_canonical_none() {
    let normalizer = with_fallback();
    for event in [
        Value::Null,
        json!(42),
        json!("fetch_video"),
        json!([]),
        json!({}),
        json!({"event_type": "conversation.toolcall"}),
        json!({"event_type": "conversation.toolcall", "data": {"name": 7}}),
        json!({"type": "tool_call", "name": "launch_rocket", "arguments": {}}),
        json!({"type": "application.transcription_ready", "data": {"transcript": "oops"}}),
        json!({"event_type": "conversation.utterance", "properties": {"speech": ""}}),
    ] {
        let call = normalizer.normalize(&event);
        assert!(call.is_none(), "expected no call for {event}");
        assert_eq!(
            canonical_json(call.as_ref()),
            json!({"toolName": null, "toolArgs": null})
        );
    }
}

#[test]
fn every_shape_yields_the_same_canonical_call() {
    let expected = ToolCall::fetch("Team Settings");
    let shapes = [
        structured("fetch_video", json!({"title": "Team Settings"})),
        json!({
            "type": "conversation.tool_call",
            "properties": {"function": {"name": "fetch_video", "arguments": {"title": "Team Settings"}}}
        }),
        json!({
            "event_type": "application.transcription_ready",
            "data": {"transcript": [
                {"role": "user", "content": "show me team settings"},
                {"role": "assistant", "tool_calls": [
                    {"function": {"name": "fetch_video", "arguments": "{\"title\":\"Team Settings\"}"}}
                ]}
            ]}
        }),
        json!({"type": "tool_call", "name": "fetch_video", "arguments": "Team Settings"}),
        json!({"payload": {"message": {"tool_call": {"name": "fetch_video", "args": {"title": "Team Settings"}}}}}),
    ];

    let normalizer = Normalizer::default();
    for event in shapes {
        assert_eq!(
            normalizer.normalize(&event).as_ref(),
            Some(&expected),
            "shape {event}"
        );
    }
}

#[test]
fn normalizing_canonical_output_is_idempotent() {
    let normalizer = Normalizer::default();
    let first = normalizer
        .normalize(&structured("fetch_video", json!({"title": "'Please skip'"})))
        .expect("call");
    assert_eq!(first, ToolCall::control(ToolName::NextVideo));

    let canonical = canonical_json(Some(&first));
    let rewrapped = json!({
        "type": "tool_call",
        "name": canonical["toolName"],
        "arguments": canonical["toolArgs"],
    });
    assert_eq!(normalizer.normalize(&rewrapped), Some(first));
}

#[test]
fn polite_and_quoted_command_titles_are_reinterpreted() {
    let normalizer = Normalizer::default();
    for title in ["PAUSE", "\"pause\"", "Could you please pause the video?", "pause, please"] {
        let call = normalizer
            .normalize(&structured("fetch_video", json!({"title": title})))
            .expect("call");
        assert_eq!(call, ToolCall::control(ToolName::PauseVideo), "title {title:?}");
    }

    let descriptive = normalizer
        .normalize(&structured("fetch_video", json!({"title": "Pause Points in Reporting"})))
        .expect("call");
    assert_eq!(descriptive, ToolCall::fetch("Pause Points in Reporting"));
}

#[test]
fn transcript_uses_last_assistant_call() {
    let event = json!({
        "type": "application.transcription_ready",
        "transcript": [
            {"role": "assistant", "tool_calls": [{"function": {"name": "fetch_video", "arguments": {"title": "Welcome Tour"}}}]},
            {"role": "user", "content": "next one"},
            {"role": "assistant", "tool_calls": [
                {"function": {"name": "pause_video", "arguments": "{}"}},
                {"function": {"name": "next_video", "arguments": "{}"}}
            ]},
            {"role": "assistant", "content": "Here it is", "tool_calls": []}
        ]
    });
    let (call, source) = Normalizer::default()
        .normalize_with_source(&event)
        .expect("call");
    assert_eq!(call, ToolCall::control(ToolName::NextVideo));
    assert_eq!(source, SourceKind::Transcript);
}

#[test]
fn utterances_require_the_fallback_flag() {
    let event = json!({
        "event_type": "conversation.utterance",
        "properties": {"role": "user", "speech": "OK, skip this one"}
    });
    assert!(Normalizer::default().normalize(&event).is_none());

    let (call, source) = with_fallback().normalize_with_source(&event).expect("call");
    assert_eq!(call, ToolCall::control(ToolName::NextVideo));
    assert_eq!(source, SourceKind::Utterance);
}

#[test]
fn negated_utterances_never_produce_a_call() {
    let normalizer = with_fallback();
    for speech in [
        "Don't pause the video yet",
        "please do not close it",
        "I can't skip this",
        "never play that again",
        "don't pause the video, just skip it",
        "don't call pause_video()",
    ] {
        let event = json!({"event_type": "conversation.utterance", "data": {"speech": speech}});
        assert!(normalizer.normalize(&event).is_none(), "speech {speech:?}");
    }
}

#[test]
fn nested_typed_message_wins_over_outer_envelope() {
    let message = json!({
        "type": "realtime.message",
        "message": {"event_type": "conversation.tool_call", "data": {"name": "close_video"}}
    });
    let (call, source) = normalize_message(&Normalizer::default(), &message).expect("call");
    assert_eq!(call, ToolCall::control(ToolName::CloseVideo));
    assert_eq!(source, SourceKind::Structured);
}

#[test]
fn cta_arguments_survive_normalization() {
    let call = Normalizer::default()
        .normalize(&structured(
            "show_trial_cta",
            json!({"title": "Start your trial", "button_text": "Go"}),
        ))
        .expect("call");
    assert_eq!(call.name, ToolName::ShowTrialCta);
    assert_eq!(call.string_arg("title"), Some("Start your trial"));
    assert_eq!(call.string_arg("button_text"), Some("Go"));
}
