//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages from stdin,
//! dispatches them through the `HostCommandServer` router, and writes
//! `ResponseEnvelope` and `EventEnvelope` messages as newline-delimited
//! JSON to stdout.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::config::ReelConfig;
use crate::error::ReelError;
use crate::host::channel::{HostCommandClient, command_channel};
use crate::host::contract::{CommandEnvelope, CommandName, ResponseEnvelope};
use crate::runtime::Collaborators;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;

/// Default request channel capacity for the stdio bridge.
const REQUEST_CAPACITY: usize = 64;

/// Default event broadcast channel capacity for the stdio bridge.
const EVENT_CAPACITY: usize = 256;

/// Run the bridge on the process's stdin and stdout until stdin closes or a
/// `runtime.stop` command is received.
pub async fn run_stdio_bridge(config: &ReelConfig, collaborators: Collaborators) -> crate::Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    run_bridge(reader, writer, config, collaborators).await
}

/// Run the JSON bridge over any line reader and writer.
///
/// Three concurrent tasks operate in parallel:
///
/// 1. **Reader** -- reads newline-delimited JSON, dispatches each
///    `CommandEnvelope` through the host command client, and writes the
///    resulting `ResponseEnvelope`.
/// 2. **Event forwarder** -- receives broadcast `EventEnvelope` messages
///    from the server and writes them as JSON lines.
/// 3. **Server** -- runs the `HostCommandServer` router loop.
///
/// The bridge exits when the reader finishes (EOF or `runtime.stop`).
/// Dropping the client causes the server task to exit naturally.
pub async fn run_bridge<R, W>(
    reader: R,
    writer: W,
    config: &ReelConfig,
    collaborators: Collaborators,
) -> crate::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (client, server) = command_channel(REQUEST_CAPACITY, EVENT_CAPACITY, config, collaborators);
    let writer = Arc::new(Mutex::new(writer));

    let server_handle = tokio::spawn(server.run());

    let event_writer = Arc::clone(&writer);
    let mut event_rx = client.subscribe_events();
    let event_handle = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event_envelope) => match serde_json::to_string(&event_envelope) {
                    Ok(json) => {
                        let mut w = event_writer.lock().await;
                        if let Err(e) = write_line(&mut *w, &json).await {
                            tracing::warn!(
                                error = %e,
                                "failed to write event envelope; stopping event forwarder"
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize event envelope; skipping");
                    }
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event forwarder lagged; some events were dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    tracing::info!("event broadcast channel closed; stopping event forwarder");
                    break;
                }
            }
        }
    });

    let reader_result = run_reader(reader, client, Arc::clone(&writer)).await;

    // The client was dropped by `run_reader`; the server drains and exits.
    let _ = server_handle.await;
    event_handle.abort();
    let _ = event_handle.await;

    reader_result
}

/// Read line-by-line, dispatch each command, and write responses.
async fn run_reader<R, W>(
    mut reader: R,
    client: HostCommandClient,
    writer: Arc<Mutex<W>>,
) -> crate::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ReelError::Channel(format!("failed to read command line: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                write_response(&writer, &response).await?;
                continue;
            }
        };

        let request_id = envelope.request_id.clone();
        let is_stop = envelope.command == CommandName::RuntimeStop;

        let response = match client.send(envelope).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = %e, "host command dispatch failed");
                let id = if request_id.trim().is_empty() {
                    "dispatch-error".to_owned()
                } else {
                    request_id
                };
                ResponseEnvelope::error(id, format!("dispatch failed: {e}"))
            }
        };
        write_response(&writer, &response).await?;

        if is_stop {
            tracing::info!("runtime.stop received; shutting down bridge");
            break;
        }
    }

    Ok(())
}

async fn write_response<W>(writer: &Mutex<W>, response: &ResponseEnvelope) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)
        .map_err(|e| ReelError::Host(format!("failed to serialize response envelope: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut *w, &json).await
}

/// Write a single JSON line and flush.
async fn write_line<W>(writer: &mut W, json: &str) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| ReelError::Channel(format!("failed to write output: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| ReelError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ReelError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
