//! Realtime event deduplication.
//!
//! The realtime platform may deliver the same tool call several times (as a
//! structured call, inside the transcript, and again as speech). Only the
//! first copy inside the dedup window is forwarded.

use crate::tool_call::normalize::event_type;
use crate::tool_call::{Normalizer, SourceKind, ToolCall, ToolName};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Keys holding a nested message, checked before the outer event.
const NESTED_KEYS: &[&str] = &["data", "payload", "message"];

/// Identity of a forwarded call: tool name plus its normalized title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    #[must_use]
    pub fn for_call(call: &ToolCall) -> Self {
        let arg_key = if call.name == ToolName::FetchVideo {
            call.title().map(str::to_lowercase).unwrap_or_default()
        } else {
            String::new()
        };
        Self(format!("{}:{}", call.name.as_str(), arg_key))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to do with an inbound realtime message.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    /// First sighting inside the window: hand it to the coordinator.
    Forward(ToolCall, SourceKind),
    /// Same key already forwarded inside the window.
    Duplicate(DedupKey),
    /// Speech-derived call shadowed by a recent structured call.
    Superseded(DedupKey),
    /// The message carries no recognizable tool call.
    NoCall,
}

/// Normalize a message, preferring a nested event over the outer one.
///
/// Only nested objects that carry their own event type count as nested
/// events; untyped payloads are reached through the outer event.
#[must_use]
pub fn normalize_message(normalizer: &Normalizer, message: &Value) -> Option<(ToolCall, SourceKind)> {
    NESTED_KEYS
        .iter()
        .filter_map(|key| message.get(*key).filter(|v| v.is_object()))
        .filter(|nested| event_type(nested).is_some())
        .find_map(|nested| normalizer.normalize_with_source(nested))
        .or_else(|| normalizer.normalize_with_source(message))
}

/// Drops repeated tool calls arriving within a short window.
#[derive(Debug)]
pub struct EventDeduplicator {
    normalizer: Normalizer,
    window: Duration,
    last: Option<(DedupKey, Instant)>,
    last_structured_at: Option<Instant>,
}

impl EventDeduplicator {
    #[must_use]
    pub fn new(normalizer: Normalizer, window: Duration) -> Self {
        Self {
            normalizer,
            window,
            last: None,
            last_structured_at: None,
        }
    }

    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Normalize `message` and decide whether it should be forwarded.
    pub fn accept(&mut self, message: &Value, now: Instant) -> DedupOutcome {
        let Some((call, source)) = normalize_message(&self.normalizer, message) else {
            return DedupOutcome::NoCall;
        };
        let key = DedupKey::for_call(&call);

        if source == SourceKind::Utterance
            && let Some(at) = self.last_structured_at
            && self.within_window(at, now)
        {
            tracing::debug!(key = %key, "utterance call superseded by structured call");
            return DedupOutcome::Superseded(key);
        }

        if let Some((last_key, at)) = &self.last
            && *last_key == key
            && self.within_window(*at, now)
        {
            tracing::debug!(key = %key, source = source.as_str(), "dropping duplicate tool call");
            return DedupOutcome::Duplicate(key);
        }

        if source != SourceKind::Utterance {
            self.last_structured_at = Some(now);
        }
        self.last = Some((key, now));
        DedupOutcome::Forward(call, source)
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        self.last = None;
        self.last_structured_at = None;
    }

    fn within_window(&self, at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(at) < self.window
    }
}
