//! app→native method channel and router.
//!
//! Covers the scheduling controls the application layer calls and the
//! host harness channel a native shell uses to inject OS events.

use crate::bridge::contract::{
    ChannelName, ErrorKind, MethodCall, MethodName, MethodResponse,
};
use crate::error::{Result, WakeError};
use crate::wake::LifecycleEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Scheduling controls exposed to the application layer.
pub trait SchedulingControls: Send + Sync + 'static {
    /// Register the wake source and arm the first wake.
    fn register_wake_source(&self) -> Result<bool>;
    fn is_supported(&self) -> bool;
    /// `true` when an elevation request was issued (not when it was granted).
    fn request_exact_scheduling_permission(&self) -> bool;
    /// Re-arm on demand.
    fn schedule_wake_source(&self) -> Result<bool> {
        self.register_wake_source()
    }
    fn unregister_wake_source(&self) -> bool;
}

/// OS events a host shell can inject over the harness channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A scheduled wake fired. `budget_secs` set means a budgeted wake.
    FireWake { budget_secs: Option<u64> },
    BootCompleted,
    Lifecycle(LifecycleEvent),
    NotificationTapped { payload: String },
}

/// Receiver for injected OS events.
#[async_trait]
pub trait HostEvents: Send + Sync + 'static {
    async fn host_event(&self, event: HostEvent) -> Result<serde_json::Value> {
        Err(WakeError::Platform(format!(
            "host event {event:?} not supported"
        )))
    }
}

struct SchedulingRequest {
    call: MethodCall,
    response_tx: oneshot::Sender<MethodResponse>,
}

/// Sending half used by the transport.
#[derive(Clone)]
pub struct SchedulingClient {
    request_tx: mpsc::Sender<SchedulingRequest>,
}

impl SchedulingClient {
    pub async fn send(&self, call: MethodCall) -> Result<MethodResponse> {
        call.validate().map_err(|e| {
            WakeError::Contract(format!(
                "invalid method call envelope {}: {}",
                call.request_id, e
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(SchedulingRequest { call, response_tx })
            .await
            .map_err(|e| WakeError::Channel(format!("failed to send method call: {e}")))?;

        response_rx
            .await
            .map_err(|e| WakeError::Channel(format!("method response dropped: {e}")))
    }
}

pub struct SchedulingServer<H: SchedulingControls + HostEvents> {
    request_rx: mpsc::Receiver<SchedulingRequest>,
    handler: Arc<H>,
}

#[must_use]
pub fn scheduling_channel<H: SchedulingControls + HostEvents>(
    request_capacity: usize,
    handler: Arc<H>,
) -> (SchedulingClient, SchedulingServer<H>) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    (
        SchedulingClient { request_tx },
        SchedulingServer {
            request_rx,
            handler,
        },
    )
}

impl<H: SchedulingControls + HostEvents> SchedulingServer<H> {
    /// Serve calls until every client is dropped.
    ///
    /// Each call is routed on its own task: a harness call such as
    /// `fireWake` waits on the app, and the app's answer arrives through
    /// the same transport that delivers the next call.
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                let response = route(handler.as_ref(), &request.call).await;
                if request.response_tx.send(response).is_err() {
                    debug!("method caller went away before the response");
                }
            });
        }
    }
}

/// Route one call to the handler, folding errors into an error response.
pub async fn route<H: SchedulingControls + HostEvents>(handler: &H, call: &MethodCall) -> MethodResponse {
    if let Err(e) = call.validate() {
        return MethodResponse::error(call.request_id.clone(), ErrorKind::Contract, e.to_string());
    }
    let Some(method) = call.method_name() else {
        debug!(channel = %call.channel, method = %call.method, "method not implemented");
        return MethodResponse::not_implemented(call);
    };

    let result = match method.channel() {
        ChannelName::Scheduling => route_scheduling(handler, method),
        ChannelName::Host => route_host(handler, method, &call.arguments).await,
        // Outbound channels are served by the app, never here.
        ChannelName::NotificationCheck | ChannelName::NotificationActions => {
            return MethodResponse::not_implemented(call);
        }
    };

    match result {
        Ok(value) => MethodResponse::ok(call.request_id.clone(), value),
        Err(e) => {
            warn!(method = method.as_str(), request_id = %call.request_id, error = %e, "method call failed");
            MethodResponse::error(call.request_id.clone(), error_kind(&e), e.to_string())
        }
    }
}

fn route_scheduling<H: SchedulingControls>(handler: &H, method: MethodName) -> Result<serde_json::Value> {
    let value = match method {
        MethodName::RegisterWakeSource => handler.register_wake_source()?,
        MethodName::IsSupported => handler.is_supported(),
        MethodName::RequestExactSchedulingPermission => handler.request_exact_scheduling_permission(),
        MethodName::ScheduleWakeSource => handler.schedule_wake_source()?,
        MethodName::UnregisterWakeSource => handler.unregister_wake_source(),
        other => {
            return Err(WakeError::Contract(format!(
                "{} is not a scheduling method",
                other.as_str()
            )));
        }
    };
    Ok(serde_json::Value::Bool(value))
}

async fn route_host<H: HostEvents>(
    handler: &H,
    method: MethodName,
    arguments: &serde_json::Value,
) -> Result<serde_json::Value> {
    let event = match method {
        MethodName::Ping => return Ok(serde_json::json!({"pong": true})),
        MethodName::FireWake => HostEvent::FireWake {
            budget_secs: parse_budget_secs(arguments)?,
        },
        MethodName::BootCompleted => HostEvent::BootCompleted,
        MethodName::EnterForeground => HostEvent::Lifecycle(LifecycleEvent::EnteredForeground),
        MethodName::EnterBackground => HostEvent::Lifecycle(LifecycleEvent::EnteredBackground),
        MethodName::NotificationTapped => HostEvent::NotificationTapped {
            payload: parse_payload(arguments)?,
        },
        other => {
            return Err(WakeError::Contract(format!(
                "{} is not a host method",
                other.as_str()
            )));
        }
    };
    handler.host_event(event).await
}

fn error_kind(error: &WakeError) -> ErrorKind {
    match error {
        WakeError::Contract(_) => ErrorKind::InvalidArguments,
        _ => ErrorKind::Unavailable,
    }
}

fn parse_budget_secs(arguments: &serde_json::Value) -> Result<Option<u64>> {
    match arguments.get("budget_secs") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(raw) => match raw.as_u64() {
            Some(0) | None => Err(WakeError::Contract(
                "fireWake budget_secs must be a positive integer".to_owned(),
            )),
            Some(secs) => Ok(Some(secs)),
        },
    }
}

/// Tap payload, given either as the bare argument or as `arguments.payload`.
fn parse_payload(arguments: &serde_json::Value) -> Result<String> {
    arguments
        .as_str()
        .or_else(|| arguments.get("payload").and_then(serde_json::Value::as_str))
        .map(str::to_owned)
        .ok_or_else(|| {
            WakeError::Contract("notificationTapped requires a string payload".to_owned())
        })
}
