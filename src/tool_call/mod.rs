//! Canonical tool calls and the normalizer that produces them.
//!
//! Every inbound event shape (structured tool calls, transcript-embedded
//! calls, direct fields, utterances, legacy nestings) is reduced to an
//! `Option<ToolCall>`. `None` is the canonical "no call" result: there is no
//! partially populated call.

pub mod args;
pub mod normalize;

pub use normalize::{Normalizer, SourceKind, ToolCallSource, classify};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of tools the playback UI understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    FetchVideo,
    PauseVideo,
    PlayVideo,
    NextVideo,
    CloseVideo,
    ShowTrialCta,
}

/// Spoken/typed keyword families for the playback controls, in match order.
pub(crate) const COMMAND_FAMILIES: &[(ToolName, &[&str])] = &[
    (ToolName::PauseVideo, &["pause", "hold on"]),
    (ToolName::PlayVideo, &["resume", "play"]),
    (ToolName::NextVideo, &["next", "skip"]),
    (ToolName::CloseVideo, &["close", "exit"]),
];

impl ToolName {
    /// Render the tool name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchVideo => "fetch_video",
            Self::PauseVideo => "pause_video",
            Self::PlayVideo => "play_video",
            Self::NextVideo => "next_video",
            Self::CloseVideo => "close_video",
            Self::ShowTrialCta => "show_trial_cta",
        }
    }

    /// Canonicalize a raw tool name.
    ///
    /// Case, surrounding whitespace, and `-`/space separators are ignored.
    /// Short aliases map onto the control tools (`pause`, `resume`/`play`,
    /// `next`/`skip`, `close`/`exit`). Anything outside the closed set is
    /// `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "fetch_video" => Some(Self::FetchVideo),
            "pause_video" | "pause" => Some(Self::PauseVideo),
            "play_video" | "resume" | "play" => Some(Self::PlayVideo),
            "next_video" | "next" | "skip" => Some(Self::NextVideo),
            "close_video" | "close" | "exit" => Some(Self::CloseVideo),
            "show_trial_cta" => Some(Self::ShowTrialCta),
            _ => None,
        }
    }

    /// Whether the tool takes a single `title` argument.
    #[must_use]
    pub fn takes_title(self) -> bool {
        matches!(self, Self::FetchVideo)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized tool call: one of the known tools plus an argument object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(rename = "toolName")]
    pub name: ToolName,
    #[serde(rename = "toolArgs")]
    pub args: Map<String, Value>,
}

impl ToolCall {
    #[must_use]
    pub fn new(name: ToolName, args: Map<String, Value>) -> Self {
        Self { name, args }
    }

    /// A control call carrying no arguments.
    #[must_use]
    pub fn control(name: ToolName) -> Self {
        Self {
            name,
            args: Map::new(),
        }
    }

    /// `fetch_video` for the given title.
    #[must_use]
    pub fn fetch(title: impl Into<String>) -> Self {
        let mut args = Map::new();
        args.insert("title".to_owned(), Value::String(title.into()));
        Self {
            name: ToolName::FetchVideo,
            args,
        }
    }

    /// The `title` argument, trimmed, if present and non-empty.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.string_arg("title")
    }

    /// A string argument, trimmed, if present and non-empty.
    #[must_use]
    pub fn string_arg(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Wire form of a normalization result: `{"toolName": .., "toolArgs": ..}`,
/// with both fields `null` when there is no call.
#[must_use]
pub fn canonical_json(call: Option<&ToolCall>) -> Value {
    match call {
        Some(call) => serde_json::json!({
            "toolName": call.name.as_str(),
            "toolArgs": Value::Object(call.args.clone()),
        }),
        None => serde_json::json!({"toolName": null, "toolArgs": null}),
    }
}
