//! Event-shape classification and normalization.
//!
//! Inbound events are classified once into a [`ToolCallSource`] and then
//! resolved into a canonical [`ToolCall`]. Classification never fails loudly:
//! unknown shapes fall through to a bounded recursive search and, failing
//! that, to `None`.

use super::args::{coerce_arguments, command_in_title};
use super::{ToolCall, ToolName};
use crate::config::NormalizerConfig;
use crate::voice_command::parse_voice_command;
use serde_json::Value;

/// Maximum nesting depth explored when hunting for a wrapped tool call.
///
/// The recursive search only exists for producers that bury the call inside
/// arbitrary envelopes; it is not a general-purpose deserializer.
const MAX_SEARCH_DEPTH: usize = 6;

/// Keys that hold the event payload, in lookup order.
const PAYLOAD_KEYS: &[&str] = &["data", "properties"];

const STRUCTURED_TYPES: &[&str] = &[
    "conversation_toolcall",
    "conversation_tool_call",
    "conversation_function_call",
    "tool_call_requested",
];
const TRANSCRIPT_TYPE: &str = "application_transcription_ready";
const DIRECT_TYPE: &str = "tool_call";
const UTTERANCE_TYPE: &str = "conversation_utterance";

/// A tool name plus its raw, uncoerced arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCall<'a> {
    pub name: &'a str,
    pub arguments: Option<&'a Value>,
}

/// Where a tool call was found inside an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallSource<'a> {
    /// `conversation.tool_call`-style structured message.
    Structured(RawCall<'a>),
    /// Last assistant tool call in a `application.transcription_ready` transcript.
    Transcript(RawCall<'a>),
    /// `type: "tool_call"` with top-level `name`/`arguments`.
    Direct(RawCall<'a>),
    /// Freeform speech from a `conversation.utterance`.
    Utterance(&'a str),
    /// A call found by the recursive search.
    Legacy(RawCall<'a>),
}

/// Coarse origin of a normalized call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Structured,
    Transcript,
    Direct,
    Utterance,
    Legacy,
}

impl SourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Transcript => "transcript",
            Self::Direct => "direct",
            Self::Utterance => "utterance",
            Self::Legacy => "legacy",
        }
    }
}

impl ToolCallSource<'_> {
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Structured(_) => SourceKind::Structured,
            Self::Transcript(_) => SourceKind::Transcript,
            Self::Direct(_) => SourceKind::Direct,
            Self::Utterance(_) => SourceKind::Utterance,
            Self::Legacy(_) => SourceKind::Legacy,
        }
    }
}

/// Normalized event type: lower-cased with `.` and `-` replaced by `_`.
///
/// Reads `event_type`, then `type`, on the event and then on its payload.
#[must_use]
pub fn event_type(event: &Value) -> Option<String> {
    let raw = read_type(event).or_else(|| payload(event).and_then(read_type))?;
    let normalized = raw.trim().to_ascii_lowercase().replace(['.', '-'], "_");
    (!normalized.is_empty()).then_some(normalized)
}

fn read_type(value: &Value) -> Option<&str> {
    value
        .get("event_type")
        .and_then(Value::as_str)
        .or_else(|| value.get("type").and_then(Value::as_str))
}

fn payload(event: &Value) -> Option<&Value> {
    PAYLOAD_KEYS
        .iter()
        .find_map(|key| event.get(*key).filter(|v| v.is_object()))
}

/// Classify an inbound event into the shape its tool call was found in.
#[must_use]
pub fn classify(event: &Value) -> Option<ToolCallSource<'_>> {
    if !event.is_object() {
        return None;
    }

    match event_type(event).as_deref() {
        Some(kind) if STRUCTURED_TYPES.contains(&kind) => {
            structured_call(payload(event).unwrap_or(event)).map(ToolCallSource::Structured)
        }
        Some(TRANSCRIPT_TYPE) => transcript_call(event).map(ToolCallSource::Transcript),
        Some(DIRECT_TYPE) => direct_call(event)
            .map(ToolCallSource::Direct)
            .or_else(|| search_call(event, 0).map(ToolCallSource::Legacy)),
        Some(UTTERANCE_TYPE) => utterance_speech(event).map(ToolCallSource::Utterance),
        _ => search_call(event, 0).map(ToolCallSource::Legacy),
    }
}

fn structured_call(payload: &Value) -> Option<RawCall<'_>> {
    let function = payload
        .get("function")
        .filter(|f| f.get("name").and_then(Value::as_str).is_some())
        .or_else(|| find_function(payload, 0));

    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| function.and_then(|f| f.get("name")).and_then(Value::as_str))?;

    let arguments = payload
        .get("arguments")
        .or_else(|| payload.get("args"))
        .or_else(|| function.and_then(|f| f.get("arguments")));

    Some(RawCall { name, arguments })
}

/// Depth-bounded search for a `function: {name, ..}` object.
fn find_function(value: &Value, depth: usize) -> Option<&Value> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            if let Some(function) = map.get("function")
                && function.get("name").and_then(Value::as_str).is_some()
            {
                return Some(function);
            }
            map.values()
                .find_map(|child| find_function(child, depth + 1))
        }
        Value::Array(items) => items
            .iter()
            .rev()
            .find_map(|child| find_function(child, depth + 1)),
        _ => None,
    }
}

fn transcript_call(event: &Value) -> Option<RawCall<'_>> {
    let transcript = payload(event)
        .and_then(|p| p.get("transcript"))
        .or_else(|| event.get("transcript"))
        .and_then(Value::as_array)?;

    let tool_calls = transcript.iter().rev().find_map(|message| {
        let is_assistant = message.get("role").and_then(Value::as_str) == Some("assistant");
        let calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .filter(|calls| !calls.is_empty());
        if is_assistant { calls } else { None }
    })?;

    let last = tool_calls.last()?;
    let function = last.get("function").unwrap_or(last);
    let name = function.get("name").and_then(Value::as_str)?;
    Some(RawCall {
        name,
        arguments: function.get("arguments"),
    })
}

fn direct_call(event: &Value) -> Option<RawCall<'_>> {
    let name = event.get("name").and_then(Value::as_str)?;
    let arguments = event.get("arguments").or_else(|| event.get("args"));
    Some(RawCall { name, arguments })
}

fn utterance_speech(event: &Value) -> Option<&str> {
    payload(event)
        .and_then(|p| p.get("speech"))
        .or_else(|| event.get("speech"))
        .and_then(Value::as_str)
        .filter(|speech| !speech.trim().is_empty())
}

/// Depth-bounded search for any `{name, arguments}` or `function` object
/// whose name is a known tool. Arrays are walked newest-last-first so the
/// most recent call wins.
fn search_call(value: &Value, depth: usize) -> Option<RawCall<'_>> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            if let Some(name) = map.get("name").and_then(Value::as_str)
                && ToolName::parse(name).is_some()
            {
                let arguments = map.get("arguments").or_else(|| map.get("args"));
                return Some(RawCall { name, arguments });
            }
            if let Some(function) = map.get("function")
                && let Some(name) = function.get("name").and_then(Value::as_str)
                && ToolName::parse(name).is_some()
            {
                return Some(RawCall {
                    name,
                    arguments: function.get("arguments"),
                });
            }
            map.values().find_map(|child| search_call(child, depth + 1))
        }
        Value::Array(items) => items
            .iter()
            .rev()
            .find_map(|child| search_call(child, depth + 1)),
        _ => None,
    }
}

/// Turn a raw name/arguments pair into a canonical call.
///
/// Unknown names yield `None`. A `fetch_video` whose title is really a
/// playback command ("pause", "please skip") becomes that command.
#[must_use]
pub fn resolve_raw_call(raw: RawCall<'_>) -> Option<ToolCall> {
    let name = ToolName::parse(raw.name)?;
    let args = coerce_arguments(name, raw.arguments);
    Some(reinterpret_command_title(ToolCall::new(name, args)))
}

/// Replace a `fetch_video` carrying a command word as its title with the
/// matching control call.
#[must_use]
pub fn reinterpret_command_title(call: ToolCall) -> ToolCall {
    if call.name != ToolName::FetchVideo {
        return call;
    }
    match call.title().and_then(command_in_title) {
        Some(control) => {
            tracing::debug!(
                title = call.title().unwrap_or_default(),
                tool = %control,
                "fetch_video title is a playback command"
            );
            ToolCall::control(control)
        }
        None => call,
    }
}

/// Stateless event normalizer.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    #[must_use]
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize an arbitrary event into a canonical call.
    #[must_use]
    pub fn normalize(&self, event: &Value) -> Option<ToolCall> {
        self.normalize_with_source(event).map(|(call, _)| call)
    }

    /// Normalize an event and report which shape the call came from.
    #[must_use]
    pub fn normalize_with_source(&self, event: &Value) -> Option<(ToolCall, SourceKind)> {
        let source = classify(event)?;
        let kind = source.kind();
        let call = match source {
            ToolCallSource::Utterance(speech) => {
                if !self.config.utterance_fallback {
                    tracing::trace!("utterance fallback disabled; ignoring speech");
                    return None;
                }
                parse_voice_command(speech)?
            }
            ToolCallSource::Structured(raw)
            | ToolCallSource::Transcript(raw)
            | ToolCallSource::Direct(raw)
            | ToolCallSource::Legacy(raw) => resolve_raw_call(raw)?,
        };
        Some((call, kind))
    }
}
