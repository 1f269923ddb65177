//! Wake Scheduler Adapter.
//!
//! A single [`WakeScheduler`] contract (`arm` / `cancel` / `is_supported`)
//! fronts the platform's deferred-execution primitive. Two backing
//! strategies exist:
//!
//! - [`alarm::AlarmWakeScheduler`]: exact alarm with inexact fallback.
//! - [`refresh::RefreshWakeScheduler`]: budgeted background refresh that
//!   only declares an earliest-begin time.
//!
//! The OS holds at most one pending request per source identifier, so
//! every `arm` replaces whatever was armed before.

pub mod alarm;
pub mod refresh;

use crate::error::{Result, WakeError};
use crate::permissions::PermissionGate;
use crate::platform::PlatformBackends;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use alarm::AlarmWakeScheduler;
pub use refresh::RefreshWakeScheduler;

/// Re-check interval used by every wake source (15 minutes).
pub const RECHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Opaque token identifying one wake source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WakeSourceId(String);

impl WakeSourceId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WakeSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How precisely the OS was asked to honour the fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exactness {
    Exact,
    BestEffort,
}

impl Exactness {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::BestEffort => "best_effort",
        }
    }
}

/// One armed wake as handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeRequest {
    pub source: WakeSourceId,
    /// The wake fires no earlier than this instant.
    pub earliest_fire: DateTime<Utc>,
    pub exactness: Exactness,
}

/// Which kind of OS primitive backs a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Alarm-style: unbounded handling window, no completion signal.
    Alarm,
    /// Background-refresh style: bounded budget with an expiration callback.
    Budgeted,
    /// No deferred-execution primitive on this platform.
    Unsupported,
}

/// Uniform contract over the platform's deferred-execution primitive.
pub trait WakeScheduler: Send + Sync {
    /// The source every request from this scheduler is filed under.
    fn source(&self) -> &WakeSourceId;

    fn kind(&self) -> SchedulerKind;

    /// Schedule exactly one wake no earlier than `now + interval`, replacing
    /// any wake already pending for this source.
    ///
    /// Exact-permission denial never surfaces here; the returned request's
    /// [`Exactness`] shows whether the schedule was degraded.
    fn arm(&self, interval: Duration) -> Result<WakeRequest>;

    /// Remove the pending wake, if any. No-op when nothing is pending.
    fn cancel(&self);

    /// Whether the platform offers a deferred-execution primitive at all.
    fn is_supported(&self) -> bool;
}

/// Wall-clock source used to compute fire times.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Compute `now + interval` for a new request.
pub(crate) fn fire_time(clock: &dyn Clock, interval: Duration) -> Result<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(interval)
        .map_err(|e| WakeError::Platform(format!("wake interval out of range: {e}")))?;
    clock
        .now()
        .checked_add_signed(delta)
        .ok_or_else(|| WakeError::Platform("wake fire time overflows the calendar".to_owned()))
}

/// Scheduler for platforms with no deferred-execution primitive.
#[derive(Debug)]
pub struct UnsupportedWakeScheduler {
    source: WakeSourceId,
}

impl UnsupportedWakeScheduler {
    #[must_use]
    pub fn new(source: WakeSourceId) -> Self {
        Self { source }
    }
}

impl WakeScheduler for UnsupportedWakeScheduler {
    fn source(&self) -> &WakeSourceId {
        &self.source
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Unsupported
    }

    fn arm(&self, _interval: Duration) -> Result<WakeRequest> {
        Err(WakeError::Platform(
            "no deferred-execution primitive on this platform".to_owned(),
        ))
    }

    fn cancel(&self) {}

    fn is_supported(&self) -> bool {
        false
    }
}

/// Pick the scheduling strategy matching the platform's primitives.
///
/// Returns the scheduler and, on alarm platforms, the Permission Gate it
/// consults so the bridge can drive elevation requests through it.
pub fn select_strategy(
    backends: PlatformBackends,
    source: WakeSourceId,
    clock: Arc<dyn Clock>,
    elevate_on_denial: bool,
) -> (Arc<dyn WakeScheduler>, Option<Arc<PermissionGate>>) {
    match backends {
        PlatformBackends::Alarm { alarms, settings } => {
            let gate = Arc::new(PermissionGate::new(settings, elevate_on_denial));
            let scheduler = AlarmWakeScheduler::new(source, alarms, Arc::clone(&gate), clock);
            (Arc::new(scheduler), Some(gate))
        }
        PlatformBackends::Refresh { refresh } => {
            (Arc::new(RefreshWakeScheduler::new(source, refresh, clock)), None)
        }
        PlatformBackends::Unsupported => (Arc::new(UnsupportedWakeScheduler::new(source)), None),
    }
}
