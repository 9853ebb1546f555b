//! Host command channel and router for the player shell.

use crate::catalog::{CatalogEntry, VideoCatalog};
use crate::config::ReelConfig;
use crate::error::{ReelError, Result};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use crate::runtime::{Collaborators, EventSource, PlaybackRuntime, RuntimeEvent};
use crate::tool_call::canonical_json;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, oneshot};

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<ResponseEnvelope>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostCommandClient {
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate().map_err(|e| {
            ReelError::Host(format!(
                "invalid host command envelope {}: {}",
                envelope.request_id, e
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| ReelError::Channel(format!("failed to send host command request: {e}")))?;

        response_rx
            .await
            .map_err(|e| ReelError::Channel(format!("host command response dropped: {e}")))
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }
}

pub struct HostCommandServer {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
    runtime: PlaybackRuntime,
}

#[must_use]
pub fn command_channel(
    request_capacity: usize,
    event_capacity: usize,
    config: &ReelConfig,
    collaborators: Collaborators,
) -> (HostCommandClient, HostCommandServer) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    let (event_tx, _event_rx) = broadcast::channel(event_capacity.max(1));
    let (runtime_tx, _runtime_rx) = broadcast::channel(event_capacity.max(1));
    let runtime = PlaybackRuntime::new(config, collaborators, runtime_tx);

    (
        HostCommandClient {
            request_tx,
            event_tx: event_tx.clone(),
        },
        HostCommandServer {
            request_rx,
            event_tx,
            runtime,
        },
    )
}

impl HostCommandServer {
    /// Route requests until every client is dropped.
    ///
    /// Runtime events, including those produced later by background tasks,
    /// are bridged onto the envelope broadcast for the lifetime of the loop.
    pub async fn run(mut self) {
        let bridge = spawn_event_bridge(self.runtime.subscribe(), self.event_tx.clone());

        while let Some(request) = self.request_rx.recv().await {
            let request_id = request.envelope.request_id.clone();
            let response = self.route(&request.envelope).unwrap_or_else(|e| {
                tracing::warn!(request_id = %request_id, error = %e, "host command failed");
                ResponseEnvelope::error(request_id, e.to_string())
            });
            let _ = request.response_tx.send(response);
        }

        self.runtime.shutdown();
        bridge.abort();
    }

    #[must_use]
    pub fn runtime(&self) -> &PlaybackRuntime {
        &self.runtime
    }

    /// Route a command envelope to the playback runtime.
    pub fn route(&mut self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        match envelope.command {
            CommandName::HostPing => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({"pong": true}),
            )),
            CommandName::HostVersion => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({
                    "contract_version": crate::host::contract::EVENT_VERSION,
                    "package_version": env!("CARGO_PKG_VERSION"),
                    "channel": "reel_host_v1"
                }),
            )),
            CommandName::SessionStart => self.handle_session_start(envelope),
            CommandName::SessionStatus => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                self.runtime.status(),
            )),
            CommandName::RealtimeEvent => Ok(self.handle_message(envelope, EventSource::Realtime)),
            CommandName::BroadcastEvent => Ok(self.handle_message(envelope, EventSource::Broadcast)),
            CommandName::PlayerPosition => self.handle_player_position(envelope),
            CommandName::RuntimeStop => {
                self.runtime.shutdown();
                Ok(ResponseEnvelope::ok(
                    envelope.request_id.clone(),
                    serde_json::json!({"stopping": true}),
                ))
            }
        }
    }

    fn handle_session_start(&mut self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let payload = parse_session_start(&envelope.payload)?;
        let catalog = VideoCatalog::new(payload.videos)?;
        let videos = catalog.len();
        self.runtime.start_session(catalog);

        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"accepted": true, "videos": videos}),
        ))
    }

    fn handle_message(&mut self, envelope: &CommandEnvelope, origin: EventSource) -> ResponseEnvelope {
        let emitted = self.runtime.handle_event(origin, &envelope.payload);

        let forwarded = emitted.iter().find_map(|event| match event {
            RuntimeEvent::ToolCallForwarded { call, .. } => Some(call),
            _ => None,
        });
        let dropped = emitted.iter().find_map(|event| match event {
            RuntimeEvent::ToolCallDropped { reason, .. } => Some(reason.as_str()),
            _ => None,
        });

        ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({
                "accepted": true,
                "tool_call": canonical_json(forwarded),
                "dropped": dropped,
            }),
        )
    }

    fn handle_player_position(&mut self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let seconds = parse_position(&envelope.payload)?;
        self.runtime.report_player_position(seconds);
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"accepted": true, "seconds": seconds}),
        ))
    }
}

fn spawn_event_bridge(
    mut runtime_rx: broadcast::Receiver<RuntimeEvent>,
    event_tx: broadcast::Sender<EventEnvelope>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match runtime_rx.recv().await {
                Ok(event) => {
                    let (name, payload) = map_runtime_event(&event);
                    let envelope =
                        EventEnvelope::new(uuid::Uuid::new_v4().to_string(), name, payload);
                    let _ = event_tx.send(envelope);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "runtime event bridge lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Wire name and payload for a runtime event.
#[must_use]
pub fn map_runtime_event(event: &RuntimeEvent) -> (&'static str, serde_json::Value) {
    match event {
        RuntimeEvent::PlayerLoad { title, index, url } => (
            "player.load",
            serde_json::json!({"title": title, "index": index, "url": url}),
        ),
        RuntimeEvent::PlayerPlay => ("player.play", serde_json::json!({})),
        RuntimeEvent::PlayerPause => ("player.pause", serde_json::json!({})),
        RuntimeEvent::PlayerSeek { seconds } => {
            ("player.seek", serde_json::json!({"seconds": seconds}))
        }
        RuntimeEvent::PlayerClose => ("player.close", serde_json::json!({})),
        RuntimeEvent::ErrorShown { message } => {
            ("ui.error.show", serde_json::json!({"message": message}))
        }
        RuntimeEvent::ErrorHidden => ("ui.error.hide", serde_json::json!({})),
        RuntimeEvent::CtaRevealed(overrides) => (
            "ui.cta.reveal",
            serde_json::to_value(overrides).unwrap_or_else(|_| serde_json::json!({})),
        ),
        RuntimeEvent::PhaseChanged { from, to } => (
            "playback.phase_changed",
            serde_json::json!({"from": from.as_str(), "to": to.as_str()}),
        ),
        RuntimeEvent::ToolCallForwarded {
            call,
            source,
            origin,
        } => {
            let mut payload = canonical_json(Some(call));
            payload["source"] = serde_json::json!(source.as_str());
            payload["origin"] = serde_json::json!(origin.as_str());
            ("tool_call.forwarded", payload)
        }
        RuntimeEvent::ToolCallDropped {
            key,
            reason,
            origin,
        } => {
            let mut payload = serde_json::json!({
                "key": key,
                "reason": reason.as_str(),
                "origin": origin.as_str(),
            });
            if let crate::runtime::DropReason::Suppressed(window) = reason {
                payload["window"] = serde_json::json!(window);
            }
            ("tool_call.dropped", payload)
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionStartPayload {
    videos: Vec<CatalogEntry>,
}

fn parse_session_start(payload: &serde_json::Value) -> Result<SessionStartPayload> {
    serde_json::from_value(payload.clone()).map_err(|e| {
        ReelError::Host(format!(
            "session.start requires payload.videos as [{{title, source}}]: {e}"
        ))
    })
}

fn parse_position(payload: &serde_json::Value) -> Result<f64> {
    let Some(seconds) = payload.get("seconds").and_then(serde_json::Value::as_f64) else {
        return Err(ReelError::Host(
            "player.position requires numeric payload.seconds".to_owned(),
        ));
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ReelError::Host(format!(
            "player.position seconds must be non-negative, got {seconds}"
        )));
    }
    Ok(seconds)
}
