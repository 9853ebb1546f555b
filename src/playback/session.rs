//! Owned playback session state.
//!
//! A session is only ever changed by
//! [`PlaybackCoordinator::handle_tool_call`](super::PlaybackCoordinator::handle_tool_call),
//! which takes it by value and hands back the next one.

use crate::catalog::ResolvedVideo;
use serde::Serialize;
use std::time::Instant;

/// Where the UI is in the conversation/video cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Conversation,
    VideoPlaying,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Conversation => "conversation",
            Self::VideoPlaying => "video_playing",
        }
    }
}

/// The local action that opened a suppression window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    Close,
    Pause,
    Resume,
}

/// `fetch_video` calls are dropped until `until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionWindow {
    pub until: Instant,
    pub reason: SuppressReason,
}

impl SuppressionWindow {
    #[must_use]
    pub fn is_active(&self, now: Instant) -> bool {
        now < self.until
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSession {
    pub(crate) phase: Phase,
    pub(crate) current_video: Option<ResolvedVideo>,
    pub(crate) paused_position_seconds: f64,
    pub(crate) suppression: Option<SuppressionWindow>,
}

impl PlaybackSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn current_video(&self) -> Option<&ResolvedVideo> {
        self.current_video.as_ref()
    }

    #[must_use]
    pub fn paused_position_seconds(&self) -> f64 {
        self.paused_position_seconds
    }

    #[must_use]
    pub fn suppression(&self) -> Option<&SuppressionWindow> {
        self.suppression.as_ref()
    }

    /// The suppression window still in force at `now`, if any.
    #[must_use]
    pub fn active_suppression(&self, now: Instant) -> Option<&SuppressionWindow> {
        self.suppression.as_ref().filter(|w| w.is_active(now))
    }

    /// Move out of `Idle` once the conversation is live. Other phases are kept.
    pub fn begin_conversation(&mut self) {
        if self.phase == Phase::Idle {
            self.phase = Phase::Conversation;
        }
    }
}
