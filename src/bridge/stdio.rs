//! Newline-delimited JSON transport for the duplex bridge.
//!
//! Every line read is either a [`MethodCall`] for the native side or a
//! [`MethodResponse`] to a call the native side made to the app. Every
//! line written is the converse. Matching responses to outbound calls is
//! done by `request_id`.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::bridge::contract::{ErrorKind, Frame, MethodResponse};
use crate::bridge::inbound::{HostEvents, SchedulingClient, SchedulingControls, scheduling_channel};
use crate::bridge::outbound::{AppEndpoint, AppRequest};
use crate::error::{Result, WakeError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, oneshot};

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;
type PendingCalls = Arc<std::sync::Mutex<HashMap<String, oneshot::Sender<MethodResponse>>>>;

/// Request id used when a rejected line carries none of its own.
const PARSE_ERROR_ID: &str = "parse-error";

/// Run the bridge over stdin/stdout until stdin closes.
pub async fn run_stdio_bridge<H: SchedulingControls + HostEvents>(
    handler: Arc<H>,
    app: AppEndpoint,
    request_capacity: usize,
) -> Result<()> {
    run_bridge(
        tokio::io::stdin(),
        tokio::io::stdout(),
        handler,
        app,
        request_capacity,
    )
    .await
}

/// Run the bridge over any line-oriented byte stream pair.
///
/// Three kinds of task run concurrently:
///
/// 1. **Reader** -- parses incoming lines; calls are dispatched through the
///    scheduling router on their own task, responses complete the matching
///    outbound call.
/// 2. **App forwarder** -- writes native→app calls as JSON lines and
///    remembers them until their response arrives.
/// 3. **Server** -- the scheduling router loop.
///
/// Returns when the reader reaches EOF. Outbound calls still waiting at
/// that point are dropped, which their callers observe as `false`.
pub async fn run_bridge<R, W, H>(
    reader: R,
    writer: W,
    handler: Arc<H>,
    app: AppEndpoint,
    request_capacity: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    H: SchedulingControls + HostEvents,
{
    let (client, server) = scheduling_channel(request_capacity, handler);
    let writer: SharedWriter<W> = Arc::new(Mutex::new(BufWriter::new(writer)));
    let pending: PendingCalls = Arc::new(std::sync::Mutex::new(HashMap::new()));

    let server_handle = tokio::spawn(server.run());
    let forward_handle = tokio::spawn(forward_app_calls(
        app,
        Arc::clone(&writer),
        Arc::clone(&pending),
    ));

    let reader_result = run_reader(reader, client, Arc::clone(&writer), Arc::clone(&pending)).await;

    forward_handle.abort();
    let _ = forward_handle.await;
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
    let _ = server_handle.await;

    reader_result
}

async fn forward_app_calls<W>(mut app: AppEndpoint, writer: SharedWriter<W>, pending: PendingCalls)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(request) = app.recv().await {
        let json = match serde_json::to_string(&request.call) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize app call; dropping it");
                continue;
            }
        };
        let request_id = request.call.request_id.clone();
        track_app_call(request, &pending);

        let mut w = writer.lock().await;
        if let Err(e) = write_line(&mut w, &json).await {
            tracing::warn!(error = %e, "failed to write app call; stopping app forwarder");
            pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            break;
        }
    }
}

/// Remember an outbound call until its response arrives or its caller gives up.
///
/// A caller that timed out or whose budget expired drops its receiver; the
/// entry is removed then instead of waiting for a response that may never come.
fn track_app_call(request: AppRequest, pending: &PendingCalls) {
    let AppRequest {
        call,
        mut response_tx,
    } = request;
    let (relay_tx, relay_rx) = oneshot::channel();
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(call.request_id.clone(), relay_tx);

    let pending = Arc::clone(pending);
    tokio::spawn(async move {
        let response = tokio::select! {
            response = relay_rx => response.ok(),
            () = response_tx.closed() => {
                tracing::debug!(
                    method = %call.method,
                    request_id = %call.request_id,
                    "caller gave up on app call; forgetting it"
                );
                None
            }
        };
        if let Some(response) = response {
            if response_tx.send(response).is_err() {
                tracing::debug!(request_id = %call.request_id, "app response arrived after caller gave up");
            }
        }
        pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&call.request_id);
    });
}

async fn run_reader<R, W>(
    reader: R,
    client: SchedulingClient,
    writer: SharedWriter<W>,
    pending: PendingCalls,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| WakeError::Channel(format!("failed to read bridge input: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("bridge input closed (EOF); shutting down");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Frame>(trimmed) {
            Ok(Frame::Call(call)) => {
                let client = client.clone();
                let writer = Arc::clone(&writer);
                tokio::spawn(async move {
                    let request_id = call.request_id.clone();
                    let response = match client.send(call).await {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::warn!(error = %e, request_id = %request_id, "method call rejected");
                            MethodResponse::error(request_id, ErrorKind::Contract, e.to_string())
                        }
                    };
                    if let Err(e) = write_json(&writer, &response).await {
                        tracing::warn!(error = %e, "failed to write method response");
                    }
                });
            }
            Ok(Frame::Response(response)) => {
                let relay = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&response.request_id);
                match relay {
                    Some(relay) => {
                        if relay.send(response).is_err() {
                            tracing::debug!("app call was abandoned before its response");
                        }
                    }
                    None => tracing::debug!(
                        request_id = %response.request_id,
                        "response does not match any outstanding app call"
                    ),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse bridge frame");
                let request_id =
                    salvage_request_id(trimmed).unwrap_or_else(|| PARSE_ERROR_ID.to_owned());
                let response = MethodResponse::error(
                    request_id,
                    ErrorKind::Contract,
                    format!("failed to parse bridge frame: {e}"),
                );
                write_json(&writer, &response).await?;
            }
        }
    }

    Ok(())
}

/// The `request_id` of a line that is a JSON object but not a valid frame.
fn salvage_request_id(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value
        .get("request_id")?
        .as_str()
        .filter(|id| !id.trim().is_empty())
        .map(str::to_owned)
}

async fn write_json<W, T>(writer: &SharedWriter<W>, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let json = serde_json::to_string(value)
        .map_err(|e| WakeError::Contract(format!("failed to serialize bridge frame: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut w, &json).await
}

/// Write a single JSON line to the buffered writer and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut BufWriter<W>, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| WakeError::Channel(format!("failed to write bridge output: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| WakeError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| WakeError::Channel(format!("failed to flush bridge output: {e}")))?;
    Ok(())
}
