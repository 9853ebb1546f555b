//! The playback runtime: one session, one consumer.
//!
//! Inbound realtime messages and server broadcasts are normalized, realtime
//! ones are deduplicated, and every surviving call is run through the
//! [`PlaybackCoordinator`]. Effects become [`RuntimeEvent`]s on a broadcast
//! channel; URL resolution, tracking and delayed CTA reveals run as detached
//! tasks tied to the current session's cancellation token.

use crate::catalog::VideoCatalog;
use crate::config::ReelConfig;
use crate::dedup::{DedupKey, DedupOutcome, EventDeduplicator, normalize_message};
use crate::error::Result;
use crate::playback::{
    CtaOverrides, Moment, Outcome, Phase, PlaybackCoordinator, PlaybackEffect, PlaybackSession,
    SuppressReason,
};
use crate::storage::{HttpSigningStorage, NoSigningStorage, VideoStorage, playable_url};
use crate::tool_call::{Normalizer, SourceKind, ToolCall};
use crate::tracking::{FetchRecord, HttpTracker, NoopTracker, Tracker};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Which channel delivered an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// Low-latency client-observed realtime channel.
    Realtime,
    /// Server-relayed broadcast derived from webhooks.
    Broadcast,
}

impl EventSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Broadcast => "broadcast",
        }
    }
}

/// Why a tool call did not reach the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Duplicate,
    Superseded,
    Suppressed(SuppressReason),
    Ignored,
}

impl DropReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Superseded => "superseded",
            Self::Suppressed(_) => "suppressed",
            Self::Ignored => "ignored",
        }
    }
}

/// Events that describe what the player and UI should do "right now".
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// A resolved, playable URL for the current video.
    PlayerLoad {
        title: String,
        index: usize,
        url: String,
    },
    PlayerPlay,
    PlayerPause,
    PlayerSeek {
        seconds: f64,
    },
    PlayerClose,
    ErrorShown {
        message: String,
    },
    ErrorHidden,
    CtaRevealed(CtaOverrides),
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    /// A normalized call handed to the coordinator (for UI/telemetry).
    ToolCallForwarded {
        call: ToolCall,
        source: SourceKind,
        origin: EventSource,
    },
    /// A normalized call that was dropped before changing anything.
    ToolCallDropped {
        key: String,
        reason: DropReason,
        origin: EventSource,
    },
}

/// Storage and tracking backends used by the runtime.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn VideoStorage>,
    pub tracker: Arc<dyn Tracker>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

impl Collaborators {
    /// No signing backend and no tracking.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            storage: Arc::new(NoSigningStorage),
            tracker: Arc::new(NoopTracker),
        }
    }

    /// HTTP backends for whichever endpoints are configured.
    ///
    /// # Errors
    ///
    /// Returns a config error if a configured endpoint is not a valid URL.
    pub fn from_config(config: &ReelConfig) -> Result<Self> {
        let storage: Arc<dyn VideoStorage> = match HttpSigningStorage::from_config(&config.storage)? {
            Some(storage) => Arc::new(storage),
            None => Arc::new(NoSigningStorage),
        };
        let tracker: Arc<dyn Tracker> = match HttpTracker::from_config(&config.tracking)? {
            Some(tracker) => Arc::new(tracker),
            None => Arc::new(NoopTracker),
        };
        Ok(Self { storage, tracker })
    }
}

/// Owns the playback session and applies coordinator effects.
pub struct PlaybackRuntime {
    coordinator: PlaybackCoordinator,
    dedup: EventDeduplicator,
    session: PlaybackSession,
    player_position: Option<f64>,
    collaborators: Collaborators,
    signed_url_ttl: Duration,
    load_generation: Arc<AtomicU64>,
    session_token: CancellationToken,
    events: broadcast::Sender<RuntimeEvent>,
}

impl PlaybackRuntime {
    #[must_use]
    pub fn new(
        config: &ReelConfig,
        collaborators: Collaborators,
        events: broadcast::Sender<RuntimeEvent>,
    ) -> Self {
        let normalizer = Normalizer::new(config.normalizer.clone());
        Self {
            coordinator: PlaybackCoordinator::new(config.playback.clone(), VideoCatalog::empty()),
            dedup: EventDeduplicator::new(normalizer, config.dedup.window()),
            session: PlaybackSession::new(),
            player_position: None,
            collaborators,
            signed_url_ttl: Duration::from_secs(config.storage.signed_url_ttl_secs),
            load_generation: Arc::new(AtomicU64::new(0)),
            session_token: CancellationToken::new(),
            events,
        }
    }

    #[must_use]
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    #[must_use]
    pub fn catalog(&self) -> &VideoCatalog {
        self.coordinator.catalog()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    /// Replace the catalog and start a fresh session.
    ///
    /// Background work from the previous session is cancelled and any
    /// pending video load is discarded.
    pub fn start_session(&mut self, catalog: VideoCatalog) -> Vec<RuntimeEvent> {
        let mut emitted = Vec::new();
        self.session_token.cancel();
        self.session_token = CancellationToken::new();
        self.load_generation.fetch_add(1, Ordering::SeqCst);

        let previous = self.session.phase();
        if previous == Phase::VideoPlaying {
            self.emit(RuntimeEvent::PlayerClose, &mut emitted);
        }
        tracing::info!(videos = catalog.len(), "starting playback session");
        self.coordinator = PlaybackCoordinator::new(self.coordinator.config().clone(), catalog);
        self.session = PlaybackSession::new();
        self.player_position = None;
        self.dedup.reset();
        if previous != Phase::Idle {
            self.emit(
                RuntimeEvent::PhaseChanged {
                    from: previous,
                    to: Phase::Idle,
                },
                &mut emitted,
            );
        }
        emitted
    }

    /// Record the player's latest reported position, in seconds.
    pub fn report_player_position(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.player_position = Some(seconds);
        } else {
            tracing::warn!(seconds, "ignoring invalid player position");
        }
    }

    /// Stop background work for the current session.
    pub fn shutdown(&self) {
        self.session_token.cancel();
    }

    /// Handle one inbound message; returns the events emitted synchronously.
    pub fn handle_event(&mut self, origin: EventSource, message: &Value) -> Vec<RuntimeEvent> {
        self.handle_event_at(origin, message, Instant::now())
    }

    /// [`handle_event`](Self::handle_event) at an explicit instant.
    pub fn handle_event_at(
        &mut self,
        origin: EventSource,
        message: &Value,
        now: Instant,
    ) -> Vec<RuntimeEvent> {
        let mut emitted = Vec::new();

        let (call, source) = match origin {
            EventSource::Realtime => {
                self.enter_conversation(&mut emitted);
                match self.dedup.accept(message, now) {
                    DedupOutcome::Forward(call, source) => (call, source),
                    DedupOutcome::Duplicate(key) => {
                        self.emit_dropped(key, DropReason::Duplicate, origin, &mut emitted);
                        return emitted;
                    }
                    DedupOutcome::Superseded(key) => {
                        self.emit_dropped(key, DropReason::Superseded, origin, &mut emitted);
                        return emitted;
                    }
                    DedupOutcome::NoCall => return emitted,
                }
            }
            EventSource::Broadcast => match normalize_message(self.dedup.normalizer(), message) {
                Some(found) => found,
                None => return emitted,
            },
        };

        tracing::info!(
            tool = %call.name,
            source = source.as_str(),
            origin = origin.as_str(),
            "tool call forwarded"
        );
        self.emit(
            RuntimeEvent::ToolCallForwarded {
                call: call.clone(),
                source,
                origin,
            },
            &mut emitted,
        );

        let moment = Moment {
            now,
            player_position: self.player_position,
        };
        let before = self.session.phase();
        let session = std::mem::take(&mut self.session);
        let transition = self.coordinator.handle_tool_call(session, &call, moment);
        self.session = transition.session;

        match transition.outcome {
            Outcome::Suppressed(reason) => {
                self.emit_dropped(
                    DedupKey::for_call(&call),
                    DropReason::Suppressed(reason),
                    origin,
                    &mut emitted,
                );
            }
            Outcome::Ignored => {
                self.emit_dropped(DedupKey::for_call(&call), DropReason::Ignored, origin, &mut emitted);
            }
            Outcome::Applied | Outcome::Unresolved => {}
        }

        for effect in transition.effects {
            // Reported positions belong to the source that was on screen.
            if matches!(effect, PlaybackEffect::LoadVideo { .. } | PlaybackEffect::ClosePlayer) {
                self.player_position = None;
            }
            self.apply(effect, &mut emitted);
        }

        let after = self.session.phase();
        if after != before {
            self.emit(RuntimeEvent::PhaseChanged { from: before, to: after }, &mut emitted);
        }
        emitted
    }

    /// Snapshot for `session.status`.
    #[must_use]
    pub fn status(&self) -> Value {
        let now = Instant::now();
        let suppression = self.session.active_suppression(now).map(|w| {
            serde_json::json!({
                "reason": w.reason,
                "remaining_ms": u64::try_from(w.until.saturating_duration_since(now).as_millis())
                    .unwrap_or(u64::MAX),
            })
        });
        serde_json::json!({
            "phase": self.session.phase(),
            "current_video": self.session.current_video(),
            "paused_position_seconds": self.session.paused_position_seconds(),
            "suppression": suppression,
            "catalog_size": self.catalog().len(),
        })
    }

    fn enter_conversation(&mut self, emitted: &mut Vec<RuntimeEvent>) {
        let before = self.session.phase();
        self.session.begin_conversation();
        if self.session.phase() != before {
            self.emit(
                RuntimeEvent::PhaseChanged {
                    from: before,
                    to: self.session.phase(),
                },
                emitted,
            );
        }
    }

    fn apply(&self, effect: PlaybackEffect, emitted: &mut Vec<RuntimeEvent>) {
        match effect {
            PlaybackEffect::LoadVideo {
                title,
                index,
                source,
            } => self.spawn_load(title, index, source),
            PlaybackEffect::Seek { seconds } => self.emit(RuntimeEvent::PlayerSeek { seconds }, emitted),
            PlaybackEffect::Play => self.emit(RuntimeEvent::PlayerPlay, emitted),
            PlaybackEffect::Pause => self.emit(RuntimeEvent::PlayerPause, emitted),
            PlaybackEffect::ClosePlayer => {
                // A load still resolving must not reopen a closed player.
                self.load_generation.fetch_add(1, Ordering::SeqCst);
                self.emit(RuntimeEvent::PlayerClose, emitted);
            }
            PlaybackEffect::ShowError { message } => {
                self.emit(RuntimeEvent::ErrorShown { message }, emitted);
            }
            PlaybackEffect::HideError => self.emit(RuntimeEvent::ErrorHidden, emitted),
            PlaybackEffect::RevealCta { delay, overrides } => {
                if delay.is_zero() {
                    self.emit(RuntimeEvent::CtaRevealed(overrides), emitted);
                } else {
                    self.spawn_cta_reveal(delay, overrides);
                }
            }
            PlaybackEffect::TrackFetch { title, index } => self.spawn_tracking(title, index),
        }
    }

    fn spawn_load(&self, title: String, index: usize, source: String) {
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.load_generation);
        let storage = Arc::clone(&self.collaborators.storage);
        let events = self.events.clone();
        let ttl = self.signed_url_ttl;
        let token = self.session_token.clone();

        spawn_detached("load_video", async move {
            let resolved = tokio::select! {
                _ = token.cancelled() => return,
                resolved = playable_url(storage.as_ref(), &source, ttl) => resolved,
            };
            match resolved {
                Ok(url) => {
                    if current.load(Ordering::SeqCst) == generation {
                        let _ = events.send(RuntimeEvent::PlayerLoad { title, index, url });
                    } else {
                        tracing::debug!(title = %title, "discarding stale video load");
                    }
                }
                Err(e) => {
                    tracing::warn!(title = %title, error = %e, "failed to resolve playable URL");
                }
            }
        });
    }

    fn spawn_cta_reveal(&self, delay: Duration, overrides: CtaOverrides) {
        let events = self.events.clone();
        let token = self.session_token.clone();
        spawn_detached("reveal_cta", async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(RuntimeEvent::CtaRevealed(overrides));
                }
            }
        });
    }

    fn spawn_tracking(&self, title: String, index: usize) {
        let tracker = Arc::clone(&self.collaborators.tracker);
        spawn_detached("track_fetch", async move {
            let record = FetchRecord::new(title, index);
            if let Err(e) = tracker.record_fetch(&record).await {
                tracing::warn!(title = %record.title, error = %e, "failed to record fetch_video");
            }
        });
    }

    fn emit_dropped(
        &self,
        key: DedupKey,
        reason: DropReason,
        origin: EventSource,
        emitted: &mut Vec<RuntimeEvent>,
    ) {
        tracing::debug!(key = %key, reason = reason.as_str(), origin = origin.as_str(), "tool call dropped");
        self.emit(
            RuntimeEvent::ToolCallDropped {
                key: key.as_str().to_owned(),
                reason,
                origin,
            },
            emitted,
        );
    }

    fn emit(&self, event: RuntimeEvent, emitted: &mut Vec<RuntimeEvent>) {
        let _ = self.events.send(event.clone());
        emitted.push(event);
    }
}

impl Drop for PlaybackRuntime {
    fn drop(&mut self) {
        self.session_token.cancel();
    }
}

fn spawn_detached<F>(task: &'static str, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => tracing::warn!(task, "no async runtime; skipping background task"),
    }
}
