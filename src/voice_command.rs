//! Playback command detection in freeform speech.
//!
//! Used only when the realtime platform sends a `conversation.utterance`
//! without a structured tool call and the utterance fallback is enabled.
//! The structured path always wins over anything found here.
//!
//! # Supported forms
//!
//! | Speech | Result |
//! |--------|--------|
//! | `fetch_video("Onboarding")` | `fetch_video {title: "Onboarding"}` |
//! | "let me pause the video" | `pause_video` |
//! | "hold on a second" | `pause_video` |
//! | "resume" / "play it" | `play_video` |
//! | "skip this one" / "next" | `next_video` |
//! | "close it" / "exit" | `close_video` |
//! | "don't pause" / "pause? not yet" | nothing |
//! | "don't pause, just skip it" | nothing |
//! | "don't call pause_video()" | nothing |

use crate::tool_call::args::coerce_arguments;
use crate::tool_call::normalize::reinterpret_command_title;
use crate::tool_call::{COMMAND_FAMILIES, ToolCall, ToolName};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// `identifier(arguments)`.
static FUNCTION_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_\-]*)\s*\(([^()]*)\)").expect("function call pattern is valid")
});

const NEGATIONS: &[&str] = &["not", "never", "no", "cannot"];

/// How many tokens before a keyword are checked for a negation.
const NEGATION_LOOKBEHIND: usize = 3;
/// How many tokens after a keyword are checked for "not yet".
const NOT_YET_LOOKAHEAD: usize = 4;

/// Extract a playback command from speech text.
///
/// Any negated command keyword (or negated function call) makes the whole
/// utterance yield nothing, even when another command appears un-negated.
#[must_use]
pub fn parse_voice_command(text: &str) -> Option<ToolCall> {
    if text.trim().is_empty() {
        return None;
    }

    if let Some((call, start, end)) = parse_function_call(text) {
        let before = speech_tokens(&text[..start]);
        let after = speech_tokens(&text[end..]);
        let before: Vec<&str> = before.split_whitespace().collect();
        let after: Vec<&str> = after.split_whitespace().collect();
        if negated_before(&before, before.len()) || not_yet_after(&after) {
            tracing::debug!(tool = %call.name, "negated function call in speech");
            return None;
        }
        return Some(call);
    }

    let normalized = speech_tokens(text);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let mut matched = None;
    for &(tool, keywords) in COMMAND_FAMILIES {
        for keyword in keywords.iter() {
            let phrase: Vec<&str> = keyword.split_whitespace().collect();
            for start in find_phrase(&tokens, &phrase) {
                let end = start + phrase.len();
                if negated_before(&tokens, start) || not_yet_after(&tokens[end..]) {
                    tracing::debug!(keyword, tool = %tool, "negated command in speech");
                    return None;
                }
                matched.get_or_insert(tool);
            }
        }
    }
    matched.map(ToolCall::control)
}

/// First known `name(args)` call in `text`, with its byte span.
fn parse_function_call(text: &str) -> Option<(ToolCall, usize, usize)> {
    FUNCTION_CALL_RE.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let name = ToolName::parse(caps.get(1)?.as_str())?;
        let inner = caps.get(2).map_or("", |m| m.as_str());
        let raw = Value::String(inner.to_owned());
        let args = coerce_arguments(name, Some(&raw));
        let call = reinterpret_command_title(ToolCall::new(name, args));
        Some((call, whole.start(), whole.end()))
    })
}

/// Lower-cased, contraction-expanded, punctuation-free speech.
fn speech_tokens(text: &str) -> String {
    let lower = text.to_lowercase().replace('\u{2019}', "'");
    strip_punctuation(&expand_contractions(&lower))
}

/// Start indices of every whole-word occurrence of `phrase` in `tokens`.
fn find_phrase(tokens: &[&str], phrase: &[&str]) -> Vec<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return Vec::new();
    }
    tokens
        .windows(phrase.len())
        .enumerate()
        .filter(|(_, window)| *window == phrase)
        .map(|(i, _)| i)
        .collect()
}

/// A negation within the few tokens before `start`.
fn negated_before(tokens: &[&str], start: usize) -> bool {
    tokens[start.saturating_sub(NEGATION_LOOKBEHIND)..start]
        .iter()
        .any(|t| NEGATIONS.contains(t))
}

/// "not yet" within the few tokens following a command.
fn not_yet_after(after: &[&str]) -> bool {
    after[..after.len().min(NOT_YET_LOOKAHEAD)]
        .windows(2)
        .any(|pair| pair == ["not", "yet"])
}

/// Lowercase letters, digits and single spaces only.
fn strip_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| if c == '_' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Expand the contractions that carry negation or precede a command so
/// "don't pause" is seen as "do not pause".
fn expand_contractions(text: &str) -> String {
    text.replace("can't", "cannot")
        .replace("won't", "will not")
        .replace("don't", "do not")
        .replace("doesn't", "does not")
        .replace("didn't", "did not")
        .replace("isn't", "is not")
        .replace("aren't", "are not")
        .replace("wasn't", "was not")
        .replace("shouldn't", "should not")
        .replace("wouldn't", "would not")
        .replace("couldn't", "could not")
        .replace("haven't", "have not")
        .replace("let's", "let us")
        .replace("it's", "it is")
        .replace("i'm", "i am")
        .replace("that's", "that is")
}
