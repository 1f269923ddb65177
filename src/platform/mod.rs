//! OS-facing collaborators.
//!
//! The exact/inexact alarm scheduler, the exact-alarm settings surface, the
//! budgeted background-refresh scheduler and the notification center belong
//! to the OS. This module
//! only names the calls the core makes on them; native shells implement
//! the traits over the real platform APIs, and [`sim`] provides in-memory
//! stand-ins.

pub mod sim;

use crate::error::Result;
use crate::scheduler::WakeSourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Alarm-style deferred execution (exact and inexact).
pub trait AlarmService: Send + Sync {
    /// Arm an exact, idle-permitted alarm, replacing any alarm for `source`.
    ///
    /// Returns [`WakeError::PermissionDenied`](crate::WakeError::PermissionDenied)
    /// when exact scheduling is not currently authorised.
    fn set_exact(&self, source: &WakeSourceId, at: DateTime<Utc>) -> Result<()>;

    /// Arm an inexact alarm the OS may batch or delay, replacing any alarm for `source`.
    fn set_inexact(&self, source: &WakeSourceId, at: DateTime<Utc>) -> Result<()>;

    fn cancel(&self, source: &WakeSourceId);
}

/// The OS surface that owns the exact-scheduling grant.
pub trait ExactAlarmSettings: Send + Sync {
    /// Whether this OS version gates exact alarms behind a user grant at all.
    fn requires_grant(&self) -> bool;

    /// Live answer from the OS; may change at any time outside our control.
    fn can_schedule_exact(&self) -> bool;

    /// Launch the user-mediated settings flow. Returns once the flow is shown.
    fn open_exact_alarm_settings(&self) -> Result<()>;
}

/// Budgeted background refresh (earliest-begin requests).
pub trait BackgroundRefreshService: Send + Sync {
    /// Whether the OS version offers background refresh.
    fn is_available(&self) -> bool;

    /// Submit a refresh request for `source`, replacing any pending one.
    fn submit(&self, source: &WakeSourceId, earliest_begin: DateTime<Utc>) -> Result<()>;

    fn cancel(&self, source: &WakeSourceId);
}

/// The OS notification center, as far as wake handling touches it.
pub trait NotificationPresenter: Send + Sync {
    /// Ask the user to allow alerts, badges and sounds.
    ///
    /// Returns whether presentation is authorised. Asking again after the
    /// user answered only reports the standing decision.
    fn request_authorization(&self) -> Result<bool>;

    /// Remove the app icon badge.
    fn clear_badge(&self) -> Result<()>;
}

/// The platform primitives available to the process.
#[derive(Clone)]
pub enum PlatformBackends {
    Alarm {
        alarms: Arc<dyn AlarmService>,
        settings: Arc<dyn ExactAlarmSettings>,
    },
    Refresh {
        refresh: Arc<dyn BackgroundRefreshService>,
    },
    Unsupported,
}

impl PlatformBackends {
    /// Alarm backends where one OS object serves both alarm and settings calls.
    pub fn alarm<T>(service: Arc<T>) -> Self
    where
        T: AlarmService + ExactAlarmSettings + 'static,
    {
        Self::Alarm {
            alarms: Arc::clone(&service) as Arc<dyn AlarmService>,
            settings: service as Arc<dyn ExactAlarmSettings>,
        }
    }
}

impl std::fmt::Debug for PlatformBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Alarm { .. } => "Alarm",
            Self::Refresh { .. } => "Refresh",
            Self::Unsupported => "Unsupported",
        };
        f.debug_tuple("PlatformBackends").field(&name).finish()
    }
}

/// Target platform families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    /// Alarm scheduler with an exact-alarm grant.
    Android,
    /// Budgeted background refresh.
    Ios,
    /// Anything else; no deferred execution.
    Other,
}

impl PlatformKind {
    /// The platform this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "android" | "alarm" => Some(Self::Android),
            "ios" | "refresh" | "budgeted" => Some(Self::Ios),
            "other" | "none" => Some(Self::Other),
            _ => None,
        }
    }
}
