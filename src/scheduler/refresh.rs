//! Budgeted background-refresh wake scheduling.
//!
//! Only an earliest-begin time is declared; the OS decides when (and
//! whether) the refresh actually runs.

use super::{Clock, Exactness, SchedulerKind, WakeRequest, WakeScheduler, WakeSourceId, fire_time};
use crate::error::{Result, WakeError};
use crate::platform::BackgroundRefreshService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct RefreshWakeScheduler {
    source: WakeSourceId,
    refresh: Arc<dyn BackgroundRefreshService>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RefreshWakeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshWakeScheduler")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl RefreshWakeScheduler {
    pub fn new(
        source: WakeSourceId,
        refresh: Arc<dyn BackgroundRefreshService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            refresh,
            clock,
        }
    }
}

impl WakeScheduler for RefreshWakeScheduler {
    fn source(&self) -> &WakeSourceId {
        &self.source
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Budgeted
    }

    fn arm(&self, interval: Duration) -> Result<WakeRequest> {
        if !self.refresh.is_available() {
            return Err(WakeError::Platform(
                "background refresh is not available".to_owned(),
            ));
        }
        let earliest_begin = fire_time(self.clock.as_ref(), interval)?;
        self.refresh.submit(&self.source, earliest_begin)?;
        info!(
            source = %self.source,
            earliest_fire = %earliest_begin,
            exactness = "best_effort",
            "background refresh requested"
        );
        Ok(WakeRequest {
            source: self.source.clone(),
            earliest_fire: earliest_begin,
            exactness: Exactness::BestEffort,
        })
    }

    fn cancel(&self) {
        self.refresh.cancel(&self.source);
        debug!(source = %self.source, "background refresh cancelled");
    }

    fn is_supported(&self) -> bool {
        self.refresh.is_available()
    }
}
