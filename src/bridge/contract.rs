//! Versioned method-call envelopes for the duplex bridge.
//!
//! Channel and method names travel as plain strings so that a call this
//! build does not know can still be answered with a `not_implemented`
//! response instead of failing to parse.

use crate::error::WakeError;
use serde::{Deserialize, Serialize};

/// Contract version for bridge envelopes.
pub const CONTRACT_VERSION: u32 = 1;

/// Logical channels carried over the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelName {
    /// app→native scheduling controls.
    #[serde(rename = "background_tasks")]
    Scheduling,
    /// native→app Check Operation.
    #[serde(rename = "background_notification_check")]
    NotificationCheck,
    /// native→app notification taps.
    #[serde(rename = "notification_actions")]
    NotificationActions,
    /// host shell→native OS event injection.
    #[serde(rename = "wake_host")]
    Host,
}

impl ChannelName {
    /// Render channel name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduling => "background_tasks",
            Self::NotificationCheck => "background_notification_check",
            Self::NotificationActions => "notification_actions",
            Self::Host => "wake_host",
        }
    }

    /// Parse a channel name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "background_tasks" => Some(Self::Scheduling),
            "background_notification_check" => Some(Self::NotificationCheck),
            "notification_actions" => Some(Self::NotificationActions),
            "wake_host" => Some(Self::Host),
            _ => None,
        }
    }

    /// Whether calls on this channel flow from native to the app.
    #[must_use]
    pub fn is_outbound(self) -> bool {
        matches!(self, Self::NotificationCheck | Self::NotificationActions)
    }
}

/// Every method the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodName {
    RegisterWakeSource,
    IsSupported,
    RequestExactSchedulingPermission,
    ScheduleWakeSource,
    UnregisterWakeSource,
    CheckNotifications,
    HandleNotificationAction,
    Ping,
    FireWake,
    BootCompleted,
    EnterForeground,
    EnterBackground,
    NotificationTapped,
}

impl MethodName {
    /// Render method name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegisterWakeSource => "registerWakeSource",
            Self::IsSupported => "isSupported",
            Self::RequestExactSchedulingPermission => "requestExactSchedulingPermission",
            Self::ScheduleWakeSource => "scheduleWakeSource",
            Self::UnregisterWakeSource => "unregisterWakeSource",
            Self::CheckNotifications => "checkNotifications",
            Self::HandleNotificationAction => "handleNotificationAction",
            Self::Ping => "ping",
            Self::FireWake => "fireWake",
            Self::BootCompleted => "bootCompleted",
            Self::EnterForeground => "enterForeground",
            Self::EnterBackground => "enterBackground",
            Self::NotificationTapped => "notificationTapped",
        }
    }

    /// Parse a method name from wire format, accepting legacy aliases.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "registerWakeSource" | "registerBackgroundTask" => Some(Self::RegisterWakeSource),
            "isSupported" => Some(Self::IsSupported),
            "requestExactSchedulingPermission" | "requestExactAlarmPermission" => {
                Some(Self::RequestExactSchedulingPermission)
            }
            "scheduleWakeSource" | "scheduleBackgroundTask" => Some(Self::ScheduleWakeSource),
            "unregisterWakeSource" => Some(Self::UnregisterWakeSource),
            "checkNotifications" => Some(Self::CheckNotifications),
            "handleNotificationAction" => Some(Self::HandleNotificationAction),
            "ping" => Some(Self::Ping),
            "fireWake" => Some(Self::FireWake),
            "bootCompleted" => Some(Self::BootCompleted),
            "enterForeground" => Some(Self::EnterForeground),
            "enterBackground" => Some(Self::EnterBackground),
            "notificationTapped" => Some(Self::NotificationTapped),
            _ => None,
        }
    }

    /// The channel this method belongs to.
    #[must_use]
    pub fn channel(self) -> ChannelName {
        match self {
            Self::RegisterWakeSource
            | Self::IsSupported
            | Self::RequestExactSchedulingPermission
            | Self::ScheduleWakeSource
            | Self::UnregisterWakeSource => ChannelName::Scheduling,
            Self::CheckNotifications => ChannelName::NotificationCheck,
            Self::HandleNotificationAction => ChannelName::NotificationActions,
            Self::Ping
            | Self::FireWake
            | Self::BootCompleted
            | Self::EnterForeground
            | Self::EnterBackground
            | Self::NotificationTapped => ChannelName::Host,
        }
    }

    /// Resolve a method as called on `channel`; methods of other channels do not resolve.
    #[must_use]
    pub fn resolve(channel: ChannelName, raw: &str) -> Option<Self> {
        Self::parse(raw).filter(|method| method.channel() == channel)
    }
}

/// A versioned method call in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub v: u32,
    pub request_id: String,
    pub channel: String,
    pub method: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl MethodCall {
    /// Build a v1 call for a known method on its own channel.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        method: MethodName,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            channel: method.channel().as_str().to_owned(),
            method: method.as_str().to_owned(),
            arguments,
        }
    }

    /// Build a call with a freshly generated request id.
    #[must_use]
    pub fn with_new_id(method: MethodName, arguments: serde_json::Value) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), method, arguments)
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != CONTRACT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, CONTRACT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn channel_name(&self) -> Option<ChannelName> {
        ChannelName::parse(&self.channel)
    }

    /// The method, if it is known on the channel it was sent on.
    #[must_use]
    pub fn method_name(&self) -> Option<MethodName> {
        self.channel_name()
            .and_then(|channel| MethodName::resolve(channel, &self.method))
    }
}

/// Error categories carried in failed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The receiving side has no handler for the method.
    NotImplemented,
    /// Arguments did not match what the method expects.
    InvalidArguments,
    /// The envelope itself was rejected.
    Contract,
    /// The handler is not currently able to serve the call.
    Unavailable,
}

/// A versioned response to one [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
}

impl MethodResponse {
    /// Build a successful response.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            ok: true,
            result,
            error: None,
            error_kind: None,
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error(request_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            ok: false,
            result: serde_json::Value::Null,
            error: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    /// Answer a call nobody handles.
    #[must_use]
    pub fn not_implemented(call: &MethodCall) -> Self {
        Self::error(
            call.request_id.clone(),
            ErrorKind::NotImplemented,
            format!("{} is not implemented on {}", call.method, call.channel),
        )
    }

    /// The result as a boolean; anything but `ok` with `true` is `false`.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        self.ok && self.result.as_bool().unwrap_or(false)
    }
}

/// One line on the wire: a call or a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Call(MethodCall),
    Response(MethodResponse),
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ContractError {}

impl From<ContractError> for WakeError {
    fn from(e: ContractError) -> Self {
        WakeError::Contract(e.to_string())
    }
}
