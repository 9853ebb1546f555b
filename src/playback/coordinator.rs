//! The playback state machine.
//!
//! [`PlaybackCoordinator::handle_tool_call`] is a pure transition: given a
//! session, a canonical call, and the current moment it returns the next
//! session plus the effects the runtime must apply. It never fails; misses
//! become a [`PlaybackEffect::ShowError`] and invalid control calls are
//! logged no-ops.

use super::session::{Phase, PlaybackSession, SuppressReason, SuppressionWindow};
use crate::catalog::{ResolvedVideo, VideoCatalog};
use crate::config::PlaybackConfig;
use crate::tool_call::{ToolCall, ToolName};
use serde::Serialize;
use std::time::{Duration, Instant};

/// The inputs a transition needs from outside the session.
#[derive(Debug, Clone, Copy)]
pub struct Moment {
    pub now: Instant,
    /// Last known player position in seconds, if the player reported one.
    pub player_position: Option<f64>,
}

impl Moment {
    #[must_use]
    pub fn at(now: Instant) -> Self {
        Self {
            now,
            player_position: None,
        }
    }

    #[must_use]
    pub fn with_position(mut self, seconds: f64) -> Self {
        self.player_position = Some(seconds);
        self
    }
}

/// Optional caller-supplied copy for the trial CTA.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CtaOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
}

impl CtaOverrides {
    #[must_use]
    pub fn from_call(call: &ToolCall) -> Self {
        Self {
            title: call.string_arg("title").map(str::to_owned),
            message: call.string_arg("message").map(str::to_owned),
            button_text: ["button_text", "button", "buttonText"]
                .iter()
                .find_map(|key| call.string_arg(key))
                .map(str::to_owned),
        }
    }
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEffect {
    /// Resolve `source` to a playable URL and load it (autoplays).
    LoadVideo {
        title: String,
        index: usize,
        source: String,
    },
    Seek {
        seconds: f64,
    },
    Play,
    Pause,
    ClosePlayer,
    ShowError {
        message: String,
    },
    HideError,
    RevealCta {
        delay: Duration,
        overrides: CtaOverrides,
    },
    TrackFetch {
        title: String,
        index: usize,
    },
}

/// How a call was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// A `fetch_video` dropped inside a suppression window.
    Suppressed(SuppressReason),
    /// A control call whose precondition did not hold.
    Ignored,
    /// The requested title is not in the catalog.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: PlaybackSession,
    pub effects: Vec<PlaybackEffect>,
    pub outcome: Outcome,
}

impl Transition {
    fn unchanged(session: PlaybackSession, outcome: Outcome) -> Self {
        Self {
            session,
            effects: Vec::new(),
            outcome,
        }
    }

    fn applied(session: PlaybackSession, effects: Vec<PlaybackEffect>) -> Self {
        Self {
            session,
            effects,
            outcome: Outcome::Applied,
        }
    }
}

/// Applies canonical tool calls to a session against one catalog.
#[derive(Debug, Clone, Default)]
pub struct PlaybackCoordinator {
    config: PlaybackConfig,
    catalog: VideoCatalog,
}

impl PlaybackCoordinator {
    #[must_use]
    pub fn new(config: PlaybackConfig, catalog: VideoCatalog) -> Self {
        Self { config, catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &VideoCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Compute the next session and its effects for `call`.
    #[must_use]
    pub fn handle_tool_call(
        &self,
        session: PlaybackSession,
        call: &ToolCall,
        moment: Moment,
    ) -> Transition {
        match call.name {
            ToolName::FetchVideo => match call.title() {
                Some(title) => self.fetch(session, title, moment),
                None => {
                    tracing::warn!("fetch_video without a title; ignoring");
                    Transition::unchanged(session, Outcome::Ignored)
                }
            },
            ToolName::PauseVideo => self.pause(session, moment),
            ToolName::PlayVideo => self.resume(session, moment),
            ToolName::NextVideo => self.next(session, moment),
            ToolName::CloseVideo => self.close(session, moment),
            ToolName::ShowTrialCta => Self::show_trial_cta(session, call),
        }
    }

    fn fetch(&self, mut session: PlaybackSession, title: &str, moment: Moment) -> Transition {
        if let Some(window) = session.active_suppression(moment.now) {
            let reason = window.reason;
            tracing::debug!(title, reason = ?reason, "fetch_video suppressed");
            return Transition::unchanged(session, Outcome::Suppressed(reason));
        }

        let Some(resolved) = self.catalog.resolve(title) else {
            tracing::warn!(title, "fetch_video title not in catalog");
            let message = format!("Sorry, I couldn't find a video called \"{title}\".");
            return Transition {
                session,
                effects: vec![PlaybackEffect::ShowError { message }],
                outcome: Outcome::Unresolved,
            };
        };

        let track = PlaybackEffect::TrackFetch {
            title: resolved.title.clone(),
            index: resolved.index,
        };

        if session.phase == Phase::VideoPlaying
            && session.current_video.as_ref() == Some(&resolved)
        {
            tracing::debug!(title = %resolved.title, "same video requested; resuming in place");
            let mut effects = Vec::with_capacity(3);
            if session.paused_position_seconds > 0.0 {
                effects.push(PlaybackEffect::Seek {
                    seconds: session.paused_position_seconds,
                });
            }
            effects.push(PlaybackEffect::Play);
            effects.push(track);
            return Transition::applied(session, effects);
        }

        let source = self
            .catalog
            .get(resolved.index)
            .map(|entry| entry.source.clone())
            .unwrap_or_default();
        let load = PlaybackEffect::LoadVideo {
            title: resolved.title.clone(),
            index: resolved.index,
            source,
        };
        session.paused_position_seconds = 0.0;
        session.phase = Phase::VideoPlaying;
        session.current_video = Some(resolved);
        Transition::applied(session, vec![PlaybackEffect::HideError, load, track])
    }

    fn pause(&self, mut session: PlaybackSession, moment: Moment) -> Transition {
        if session.phase != Phase::VideoPlaying {
            tracing::warn!(phase = session.phase.as_str(), "pause_video with no video playing");
            return Transition::unchanged(session, Outcome::Ignored);
        }
        if let Some(position) = moment.player_position.filter(|p| p.is_finite() && *p >= 0.0) {
            session.paused_position_seconds = position;
        }
        session.suppression = Some(self.window(moment.now, SuppressReason::Pause));
        Transition::applied(session, vec![PlaybackEffect::Pause])
    }

    fn resume(&self, mut session: PlaybackSession, moment: Moment) -> Transition {
        if session.phase != Phase::VideoPlaying {
            tracing::warn!(phase = session.phase.as_str(), "play_video with no video loaded");
            return Transition::unchanged(session, Outcome::Ignored);
        }
        let mut effects = Vec::with_capacity(2);
        if session.paused_position_seconds > 0.0 {
            effects.push(PlaybackEffect::Seek {
                seconds: session.paused_position_seconds,
            });
        }
        effects.push(PlaybackEffect::Play);
        session.suppression = Some(self.window(moment.now, SuppressReason::Resume));
        Transition::applied(session, effects)
    }

    fn next(&self, session: PlaybackSession, moment: Moment) -> Transition {
        let Some(current) = session.current_video.as_ref() else {
            tracing::warn!("next_video with no current video");
            return Transition::unchanged(session, Outcome::Ignored);
        };
        let Some(ResolvedVideo { title, .. }) = self.catalog.next_after(current.index) else {
            tracing::warn!("next_video with an empty catalog");
            return Transition::unchanged(session, Outcome::Ignored);
        };
        self.fetch(session, &title, moment)
    }

    fn close(&self, mut session: PlaybackSession, moment: Moment) -> Transition {
        let mut effects = Vec::with_capacity(3);
        effects.push(PlaybackEffect::HideError);
        if session.phase == Phase::VideoPlaying {
            effects.push(PlaybackEffect::ClosePlayer);
        }
        effects.push(PlaybackEffect::RevealCta {
            delay: self.config.cta_reveal_delay(),
            overrides: CtaOverrides::default(),
        });

        session.paused_position_seconds = 0.0;
        session.phase = Phase::Conversation;
        session.suppression = Some(SuppressionWindow {
            until: moment.now + self.config.close_suppression(),
            reason: SuppressReason::Close,
        });
        Transition::applied(session, effects)
    }

    fn show_trial_cta(mut session: PlaybackSession, call: &ToolCall) -> Transition {
        let mut effects = Vec::with_capacity(2);
        if session.phase == Phase::VideoPlaying {
            effects.push(PlaybackEffect::ClosePlayer);
            session.paused_position_seconds = 0.0;
            session.phase = Phase::Conversation;
        }
        effects.push(PlaybackEffect::RevealCta {
            delay: Duration::ZERO,
            overrides: CtaOverrides::from_call(call),
        });
        Transition::applied(session, effects)
    }

    fn window(&self, now: Instant, reason: SuppressReason) -> SuppressionWindow {
        SuppressionWindow {
            until: now + self.config.suppression_window(),
            reason,
        }
    }
}
