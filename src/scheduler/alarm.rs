//! Alarm-backed wake scheduling.
//!
//! Exactness is requested first. A refused exact alarm degrades to an
//! inexact one and hands the denial to the Permission Gate; the caller
//! only ever sees the resulting [`Exactness`].

use super::{Clock, Exactness, SchedulerKind, WakeRequest, WakeScheduler, WakeSourceId, fire_time};
use crate::error::Result;
use crate::permissions::PermissionGate;
use crate::platform::AlarmService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct AlarmWakeScheduler {
    source: WakeSourceId,
    alarms: Arc<dyn AlarmService>,
    gate: Arc<PermissionGate>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AlarmWakeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmWakeScheduler")
            .field("source", &self.source)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl AlarmWakeScheduler {
    pub fn new(
        source: WakeSourceId,
        alarms: Arc<dyn AlarmService>,
        gate: Arc<PermissionGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            alarms,
            gate,
            clock,
        }
    }

    #[must_use]
    pub fn gate(&self) -> &Arc<PermissionGate> {
        &self.gate
    }

    fn request(&self, earliest_fire: chrono::DateTime<chrono::Utc>, exactness: Exactness) -> WakeRequest {
        WakeRequest {
            source: self.source.clone(),
            earliest_fire,
            exactness,
        }
    }
}

impl WakeScheduler for AlarmWakeScheduler {
    fn source(&self) -> &WakeSourceId {
        &self.source
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Alarm
    }

    fn arm(&self, interval: Duration) -> Result<WakeRequest> {
        let at = fire_time(self.clock.as_ref(), interval)?;

        if self.gate.check_capability().granted {
            match self.alarms.set_exact(&self.source, at) {
                Ok(()) => {
                    info!(source = %self.source, earliest_fire = %at, exactness = "exact", "wake armed");
                    return Ok(self.request(at, Exactness::Exact));
                }
                Err(e) if e.is_permission_denied() => {
                    warn!(source = %self.source, error = %e, "exact alarm refused; falling back to inexact");
                    self.gate.on_exact_denied();
                }
                Err(e) => {
                    warn!(source = %self.source, error = %e, "exact alarm failed; falling back to inexact");
                }
            }
        } else {
            debug!(source = %self.source, "exact scheduling not granted; arming inexact");
            self.gate.on_exact_denied();
        }

        self.alarms.set_inexact(&self.source, at)?;
        info!(source = %self.source, earliest_fire = %at, exactness = "best_effort", "wake armed");
        Ok(self.request(at, Exactness::BestEffort))
    }

    fn cancel(&self) {
        self.alarms.cancel(&self.source);
        debug!(source = %self.source, "wake cancelled");
    }

    fn is_supported(&self) -> bool {
        true
    }
}
