//! native→app method channel.
//!
//! The application layer may attach late or go away at any time. Calls
//! made while nothing is bound, calls the app fails, and calls that miss
//! the bounded wait all collapse to `false`; none of them is an error for
//! the native side.

use crate::actions::ActionForwarder;
use crate::bridge::contract::{ErrorKind, MethodCall, MethodName, MethodResponse};
use crate::error::{Result, WakeError};
use crate::wake::{CheckOperation, CheckResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

/// One native→app call awaiting the app's answer.
#[derive(Debug)]
pub struct AppRequest {
    pub call: MethodCall,
    pub response_tx: oneshot::Sender<MethodResponse>,
}

impl AppRequest {
    /// Answer the call; a caller that already gave up is ignored.
    pub fn respond(self, response: MethodResponse) {
        if self.response_tx.send(response).is_err() {
            debug!(method = %self.call.method, "app response arrived after caller gave up");
        }
    }
}

type Slot = Option<mpsc::Sender<AppRequest>>;

/// Owner side of the late binding: attaches and detaches the app.
#[derive(Debug)]
pub struct AppBinding {
    slot: watch::Sender<Slot>,
    capacity: usize,
}

impl AppBinding {
    /// Attach a new app endpoint, replacing any previous one.
    #[must_use]
    pub fn attach(&self) -> AppEndpoint {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.slot.send_replace(Some(tx));
        debug!("application layer attached");
        AppEndpoint { rx }
    }

    pub fn detach(&self) {
        self.slot.send_replace(None);
        debug!("application layer detached");
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.slot.borrow().as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// Native-side handle for calling into the app.
#[derive(Debug, Clone)]
pub struct AppCaller {
    slot: watch::Receiver<Slot>,
    timeout: Duration,
}

/// Create an unbound native→app channel.
#[must_use]
pub fn app_channel(capacity: usize, timeout: Duration) -> (AppBinding, AppCaller) {
    let (slot, rx) = watch::channel(None);
    (
        AppBinding {
            slot,
            capacity: capacity.max(1),
        },
        AppCaller { slot: rx, timeout },
    )
}

impl AppCaller {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call the app and wait (bounded) for its response.
    ///
    /// # Errors
    ///
    /// [`WakeError::ChannelUnbound`] when nothing is attached,
    /// [`WakeError::Timeout`] when the app does not answer in time.
    pub async fn call(&self, method: MethodName, arguments: serde_json::Value) -> Result<MethodResponse> {
        let Some(tx) = self.slot.borrow().clone() else {
            return Err(WakeError::ChannelUnbound);
        };

        let call = MethodCall::with_new_id(method, arguments);
        let request_id = call.request_id.clone();
        let (response_tx, response_rx) = oneshot::channel();

        let exchange = async move {
            tx.send(AppRequest { call, response_tx })
                .await
                .map_err(|_| WakeError::ChannelUnbound)?;
            response_rx
                .await
                .map_err(|e| WakeError::Channel(format!("app dropped call {request_id}: {e}")))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| WakeError::Timeout(self.timeout))?
    }

    /// Call the app and reduce the outcome to a boolean.
    pub async fn call_bool(&self, method: MethodName, arguments: serde_json::Value) -> bool {
        match self.call(method, arguments).await {
            Ok(response) if response.ok => response.as_bool(),
            Ok(response) => {
                warn!(
                    method = method.as_str(),
                    error = response.error.as_deref().unwrap_or_default(),
                    "app reported failure"
                );
                false
            }
            Err(WakeError::ChannelUnbound) => {
                debug!(method = method.as_str(), "app channel unbound; treating call as false");
                false
            }
            Err(e) => {
                warn!(method = method.as_str(), error = %e, "app call failed; treating as false");
                false
            }
        }
    }
}

#[async_trait]
impl CheckOperation for AppCaller {
    async fn check_notifications(&self) -> CheckResult {
        CheckResult::new(
            self.call_bool(MethodName::CheckNotifications, serde_json::Value::Null)
                .await,
        )
    }
}

#[async_trait]
impl ActionForwarder for AppCaller {
    async fn handle_notification_action(&self, payload: &str) -> bool {
        self.call_bool(
            MethodName::HandleNotificationAction,
            serde_json::Value::String(payload.to_owned()),
        )
        .await
    }
}

/// The application layer's half of the native→app channel.
#[derive(Debug)]
pub struct AppEndpoint {
    rx: mpsc::Receiver<AppRequest>,
}

impl AppEndpoint {
    pub async fn recv(&mut self) -> Option<AppRequest> {
        self.rx.recv().await
    }

    /// Answer every call with `app` until the native side goes away.
    pub async fn serve<A: AppLayer>(mut self, app: Arc<A>) {
        while let Some(request) = self.rx.recv().await {
            let response = answer(app.as_ref(), &request.call).await;
            request.respond(response);
        }
    }
}

/// What the application layer implements when served in-process.
#[async_trait]
pub trait AppLayer: Send + Sync + 'static {
    async fn check_notifications(&self) -> bool;
    async fn handle_notification_action(&self, payload: &str) -> bool;
}

async fn answer<A: AppLayer>(app: &A, call: &MethodCall) -> MethodResponse {
    let method = call
        .channel_name()
        .filter(|channel| channel.is_outbound())
        .and_then(|_| call.method_name());
    let value = match method {
        Some(MethodName::CheckNotifications) => app.check_notifications().await,
        Some(MethodName::HandleNotificationAction) => {
            let Some(payload) = call.arguments.as_str() else {
                return MethodResponse::error(
                    call.request_id.clone(),
                    ErrorKind::InvalidArguments,
                    "handleNotificationAction requires a string payload",
                );
            };
            app.handle_notification_action(payload).await
        }
        _ => return MethodResponse::not_implemented(call),
    };
    MethodResponse::ok(call.request_id.clone(), serde_json::Value::Bool(value))
}
