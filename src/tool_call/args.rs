//! Argument coercion for tool calls.
//!
//! Producers send arguments as objects, JSON strings, double-encoded JSON,
//! `key:"value"` fragments, or a bare title. [`coerce_arguments`] walks that
//! cascade and always yields an object.

use super::{COMMAND_FAMILIES, ToolName};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// `key:"value"`, `key='value'`, `"key": "value"` fragments.
static KEY_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']?([A-Za-z_][A-Za-z0-9_]*)["']?\s*[:=]\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("key/value pattern is valid")
});

const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('`', '`'),
    ('\u{201c}', '\u{201d}'),
    ('\u{2018}', '\u{2019}'),
];

/// Keys some producers use instead of `title` for `fetch_video`.
const TITLE_KEY_ALIASES: &[&str] = &["video_title", "videoTitle", "video", "name"];

const POLITE_PREFIXES: &[&str] = &[
    "please",
    "can you",
    "could you",
    "would you",
    "will you",
    "kindly",
    "go ahead and",
    "let's",
    "lets",
];

/// Words allowed around a command keyword for a title to still read as that
/// command ("pause the video", "play it again", "skip this one").
const FILLER_WORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "it", "video", "clip", "playback", "now", "again", "please",
    "for", "me", "us", "right", "away", "current", "one",
];

/// Coerce a raw argument value into an argument object for `tool`.
///
/// Objects are used as-is; strings go through JSON, `key:"value"` and
/// bare-title parsing in that order. Anything else, including a missing
/// value, becomes `{}`.
#[must_use]
pub fn coerce_arguments(tool: ToolName, raw: Option<&Value>) -> Map<String, Value> {
    let mut args = match raw {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => coerce_string_arguments(tool, s),
        _ => Map::new(),
    };
    if tool.takes_title() {
        promote_title_alias(&mut args);
    }
    args
}

fn coerce_string_arguments(tool: ToolName, raw: &str) -> Map<String, Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => return map,
        Ok(Value::String(inner)) => {
            // Double-encoded objects arrive as a JSON string holding JSON.
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(inner.trim()) {
                return map;
            }
            return title_args(tool, &inner);
        }
        _ => {}
    }

    if let Some(pairs) = parse_key_value_pairs(trimmed) {
        return pairs;
    }

    title_args(tool, trimmed)
}

fn parse_key_value_pairs(raw: &str) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    for caps in KEY_VALUE_RE.captures_iter(raw) {
        let Some(key) = caps.get(1) else {
            continue;
        };
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str());
        map.insert(
            key.as_str().to_owned(),
            Value::String(value.trim().to_owned()),
        );
    }
    (!map.is_empty()).then_some(map)
}

fn title_args(tool: ToolName, raw: &str) -> Map<String, Value> {
    let mut map = Map::new();
    if !tool.takes_title() {
        return map;
    }
    let title = strip_wrapping_quotes(raw);
    if !title.is_empty() {
        map.insert("title".to_owned(), Value::String(title.to_owned()));
    }
    map
}

fn promote_title_alias(args: &mut Map<String, Value>) {
    if args.get("title").and_then(Value::as_str).is_some() {
        return;
    }
    let alias = TITLE_KEY_ALIASES
        .iter()
        .find_map(|key| args.get(*key).and_then(Value::as_str))
        .map(str::to_owned);
    if let Some(title) = alias {
        args.insert("title".to_owned(), Value::String(title));
    }
}

/// Strip one layer of matching wrapping quotes (straight, curly, backtick,
/// or backslash-escaped) and surrounding whitespace.
#[must_use]
pub fn strip_wrapping_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix("\\\"")
        .and_then(|s| s.strip_suffix("\\\""))
    {
        return inner.trim();
    }
    for &(open, close) in QUOTE_PAIRS {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    trimmed
}

/// Lower-case a title and strip quotes, polite prefixes, and trailing
/// punctuation so it can be compared against command keywords.
#[must_use]
pub fn clean_command_text(raw: &str) -> String {
    let lowered = strip_wrapping_quotes(raw).to_lowercase().replace('\u{2019}', "'");
    let mut rest = lowered
        .trim()
        .trim_end_matches(['.', '!', '?', ',', ';', ':'])
        .trim();

    loop {
        let stripped = POLITE_PREFIXES
            .iter()
            .find_map(|prefix| strip_leading_phrase(rest, prefix));
        match stripped {
            Some(next) => rest = next,
            None => break,
        }
    }

    let rest = match rest.strip_suffix("please") {
        Some(head) if head.is_empty() || head.ends_with([' ', ',']) => {
            head.trim_end_matches([' ', ','])
        }
        _ => rest,
    };
    strip_wrapping_quotes(rest).to_owned()
}

fn strip_leading_phrase<'a>(text: &'a str, phrase: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(phrase)?;
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() || c == ',' => {
            Some(rest.trim_start_matches([' ', ',']).trim_start())
        }
        Some(_) => None,
    }
}

/// Detect a playback control disguised as a `fetch_video` title.
///
/// Matches when the cleaned title equals a command keyword, or contains one
/// with only filler words around it. Descriptive titles never match.
#[must_use]
pub fn command_in_title(title: &str) -> Option<ToolName> {
    let cleaned = clean_command_text(title);
    if cleaned.is_empty() {
        return None;
    }
    let core = cleaned
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|token| !token.is_empty() && !FILLER_WORDS.contains(token))
        .collect::<Vec<_>>()
        .join(" ");

    COMMAND_FAMILIES
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|keyword| *keyword == cleaned || *keyword == core)
        })
        .map(|(name, _)| *name)
}
