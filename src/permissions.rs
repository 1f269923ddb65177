//! Permission Gate for exact wake scheduling.
//!
//! The exact-alarm grant belongs to the OS and the user can revoke it at
//! any moment, so [`PermissionGate::check_capability`] always asks the OS
//! and nothing here caches the answer past a single decision.
//!
//! ## Elevation
//!
//! [`PermissionGate::request_elevation`] opens the OS settings flow and
//! returns immediately; the only observable effect is that a later
//! capability check may report [`SchedulingCapability::ExactAlarm`].
//! Denials seen while arming go through [`PermissionGate::on_exact_denied`],
//! which opens the flow at most once until a grant is observed.

use crate::platform::ExactAlarmSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// What kind of wake the OS will currently accept from us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingCapability {
    ExactAlarm,
    InexactOnly,
}

impl fmt::Display for SchedulingCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulingCapability::ExactAlarm => "exact_alarm",
            SchedulingCapability::InexactOnly => "inexact_only",
        };
        f.write_str(s)
    }
}

/// Snapshot of the exact-scheduling grant at one decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionState {
    pub granted: bool,
    pub capability: SchedulingCapability,
}

impl PermissionState {
    fn from_grant(granted: bool) -> Self {
        Self {
            granted,
            capability: if granted {
                SchedulingCapability::ExactAlarm
            } else {
                SchedulingCapability::InexactOnly
            },
        }
    }
}

/// Live view of the exact-scheduling permission plus the elevation flow.
pub struct PermissionGate {
    settings: Arc<dyn ExactAlarmSettings>,
    elevate_on_denial: bool,
    elevation_pending: AtomicBool,
    elevation_requests: AtomicUsize,
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("elevate_on_denial", &self.elevate_on_denial)
            .field(
                "elevation_pending",
                &self.elevation_pending.load(Ordering::SeqCst),
            )
            .finish_non_exhaustive()
    }
}

impl PermissionGate {
    pub fn new(settings: Arc<dyn ExactAlarmSettings>, elevate_on_denial: bool) -> Self {
        Self {
            settings,
            elevate_on_denial,
            elevation_pending: AtomicBool::new(false),
            elevation_requests: AtomicUsize::new(0),
        }
    }

    /// Ask the OS whether exact scheduling is allowed right now.
    ///
    /// On OS versions without a runtime grant this is always granted.
    pub fn check_capability(&self) -> PermissionState {
        let granted = !self.settings.requires_grant() || self.settings.can_schedule_exact();
        if granted && self.elevation_pending.swap(false, Ordering::SeqCst) {
            info!("exact scheduling permission granted");
        }
        PermissionState::from_grant(granted)
    }

    /// Open the OS settings flow for the exact-scheduling grant.
    ///
    /// Does nothing when the OS needs no grant or it is already held.
    pub fn request_elevation(&self) {
        if !self.settings.requires_grant() {
            debug!("exact scheduling needs no runtime grant on this platform");
            return;
        }
        if self.settings.can_schedule_exact() {
            debug!("exact scheduling already granted; no elevation needed");
            return;
        }
        self.open_settings();
    }

    /// Record that an exact schedule was refused and elevate if allowed.
    ///
    /// Repeated denials while a request is outstanding do not reopen the
    /// settings flow.
    pub fn on_exact_denied(&self) {
        if !self.elevate_on_denial {
            debug!("exact schedule denied; elevation on denial disabled");
            return;
        }
        if !self.settings.requires_grant() {
            return;
        }
        if self.elevation_pending.load(Ordering::SeqCst) {
            debug!("exact schedule denied; elevation already requested");
            return;
        }
        self.open_settings();
    }

    /// Number of times the settings flow has been opened.
    #[must_use]
    pub fn elevation_requests(&self) -> usize {
        self.elevation_requests.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn elevation_pending(&self) -> bool {
        self.elevation_pending.load(Ordering::SeqCst)
    }

    fn open_settings(&self) {
        match self.settings.open_exact_alarm_settings() {
            Ok(()) => {
                self.elevation_pending.store(true, Ordering::SeqCst);
                self.elevation_requests.fetch_add(1, Ordering::SeqCst);
                info!("requested exact scheduling permission");
            }
            Err(e) => warn!(error = %e, "failed to open exact scheduling settings"),
        }
    }
}
