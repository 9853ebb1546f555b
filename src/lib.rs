//! Reel: tool-call normalization and playback coordination for
//! AI-narrated video demos.
//!
//! A realtime conversational agent drives a video player through tool calls
//! (`fetch_video`, `pause_video`, `play_video`, `next_video`, `close_video`,
//! `show_trial_cta`). Those calls arrive in many shapes and often more than
//! once; this crate turns them into a single ordered stream of player
//! actions.
//!
//! # Architecture
//!
//! - **Normalizer** ([`tool_call`]): classifies any inbound event and
//!   reduces it to an `Option<ToolCall>`
//! - **Speech fallback** ([`voice_command`]): best-effort command extraction
//!   from utterances
//! - **Deduplicator** ([`dedup`]): drops repeats from the realtime channel
//! - **Coordinator** ([`playback`]): pure state machine producing effects
//! - **Runtime** ([`runtime`]): owns the session and applies effects
//! - **Host** ([`host`]): versioned JSON envelopes over channels or stdio

pub mod catalog;
pub mod config;
pub mod dedup;
pub mod error;
pub mod host;
pub mod playback;
pub mod runtime;
pub mod storage;
pub mod tool_call;
pub mod tracking;
pub mod voice_command;

pub use catalog::{CatalogEntry, ResolvedVideo, VideoCatalog};
pub use config::ReelConfig;
pub use error::{ReelError, Result};
pub use playback::{PlaybackCoordinator, PlaybackEffect, PlaybackSession};
pub use runtime::{Collaborators, EventSource, PlaybackRuntime, RuntimeEvent};
pub use tool_call::{Normalizer, ToolCall, ToolName, canonical_json};
