use super::{
    CheckOperation, CheckOutcome, CompletionSink, LifecycleEvent, WakeBudget, WakePhase,
    WakeReport, WakeTrigger,
};
use crate::platform::NotificationPresenter;
use crate::scheduler::{WakeRequest, WakeScheduler};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs the per-wake state machine against one scheduler and one Check Operation.
pub struct WakeHandler {
    scheduler: Arc<dyn WakeScheduler>,
    check: Arc<dyn CheckOperation>,
    interval: Duration,
    /// Bound applied to a check when the OS imposes none.
    unbounded_timeout: Duration,
    presenter: Option<Arc<dyn NotificationPresenter>>,
}

impl std::fmt::Debug for WakeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeHandler")
            .field("source", self.scheduler.source())
            .field("interval", &self.interval)
            .field("unbounded_timeout", &self.unbounded_timeout)
            .finish_non_exhaustive()
    }
}

impl WakeHandler {
    pub fn new(
        scheduler: Arc<dyn WakeScheduler>,
        check: Arc<dyn CheckOperation>,
        interval: Duration,
        unbounded_timeout: Duration,
    ) -> Self {
        Self {
            scheduler,
            check,
            interval,
            unbounded_timeout,
            presenter: None,
        }
    }

    /// Drive the OS notification center on launch and foreground entry.
    #[must_use]
    pub fn with_presenter(mut self, presenter: Arc<dyn NotificationPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<dyn WakeScheduler> {
        &self.scheduler
    }

    /// Handle one OS entry into the process.
    pub async fn handle(&self, trigger: WakeTrigger) -> WakeReport {
        match trigger {
            WakeTrigger::Fired { budget, completion } => self.handle_fired(budget, completion).await,
            WakeTrigger::BootCompleted => {
                info!(source = %self.scheduler.source(), "boot completed; restoring wake");
                self.rearm_only()
            }
        }
    }

    /// React to an application lifecycle transition.
    pub async fn handle_lifecycle(&self, event: LifecycleEvent) -> WakeReport {
        debug!(source = %self.scheduler.source(), event = event.as_str(), "lifecycle event");
        match event {
            LifecycleEvent::Launched => {
                let report = self.rearm_only();
                self.request_notification_authorization();
                report
            }
            LifecycleEvent::EnteredBackground => self.rearm_only(),
            LifecycleEvent::EnteredForeground => {
                let mut phases = Vec::with_capacity(3);
                let (armed, arm_error) = self.rearm();
                phases.push(WakePhase::Rearmed);
                self.clear_badge();

                phases.push(WakePhase::Checking);
                let check = self.run_check(&WakeBudget::Unbounded).await;
                info!(
                    source = %self.scheduler.source(),
                    success = check.success(),
                    "foreground check finished"
                );
                phases.push(WakePhase::Completed);

                WakeReport {
                    phases,
                    armed,
                    arm_error,
                    check,
                    completion_reported: false,
                }
            }
        }
    }

    async fn handle_fired(
        &self,
        budget: WakeBudget,
        completion: Option<CompletionSink>,
    ) -> WakeReport {
        let mut phases = vec![WakePhase::Fired];
        info!(
            source = %self.scheduler.source(),
            bounded = budget.is_bounded(),
            "wake fired"
        );

        // Next wake must exist before any check work starts.
        let (armed, arm_error) = self.rearm();
        phases.push(WakePhase::Rearmed);

        phases.push(WakePhase::Checking);
        let check = self.run_check(&budget).await;

        let completion_reported = match completion {
            Some(sink) => {
                sink.complete(check.success());
                true
            }
            None => {
                if budget.is_bounded() {
                    warn!(
                        source = %self.scheduler.source(),
                        "budgeted wake finished without a completion sink"
                    );
                }
                false
            }
        };
        phases.push(WakePhase::Completed);

        info!(
            source = %self.scheduler.source(),
            outcome = ?check,
            success = check.success(),
            "wake completed"
        );

        WakeReport {
            phases,
            armed,
            arm_error,
            check,
            completion_reported,
        }
    }

    fn rearm_only(&self) -> WakeReport {
        let (armed, arm_error) = self.rearm();
        WakeReport {
            phases: vec![WakePhase::Rearmed, WakePhase::Completed],
            armed,
            arm_error,
            check: CheckOutcome::Skipped,
            completion_reported: false,
        }
    }

    fn request_notification_authorization(&self) {
        let Some(presenter) = &self.presenter else {
            return;
        };
        match presenter.request_authorization() {
            Ok(true) => debug!("notification presentation authorised"),
            Ok(false) => warn!("notification presentation not authorised; reminders stay silent"),
            Err(e) => warn!(error = %e, "failed to request notification authorisation"),
        }
    }

    fn clear_badge(&self) {
        let Some(presenter) = &self.presenter else {
            return;
        };
        if let Err(e) = presenter.clear_badge() {
            warn!(error = %e, "failed to clear notification badge");
        }
    }

    fn rearm(&self) -> (Option<WakeRequest>, Option<String>) {
        match self.scheduler.arm(self.interval) {
            Ok(request) => (Some(request), None),
            Err(e) => {
                warn!(source = %self.scheduler.source(), error = %e, "failed to arm next wake");
                (None, Some(e.to_string()))
            }
        }
    }

    async fn run_check(&self, budget: &WakeBudget) -> CheckOutcome {
        match budget {
            WakeBudget::Unbounded => {
                match tokio::time::timeout(self.unbounded_timeout, self.check.check_notifications())
                    .await
                {
                    Ok(result) => CheckOutcome::Completed {
                        success: result.success,
                    },
                    Err(_) => {
                        warn!(
                            source = %self.scheduler.source(),
                            timeout = ?self.unbounded_timeout,
                            "check did not finish in time"
                        );
                        CheckOutcome::TimedOut
                    }
                }
            }
            WakeBudget::Bounded { expired } => {
                tokio::select! {
                    biased;
                    _ = expired.cancelled() => {
                        warn!(source = %self.scheduler.source(), "wake budget expired before check finished");
                        CheckOutcome::Expired
                    }
                    result = self.check.check_notifications() => CheckOutcome::Completed {
                        success: result.success,
                    },
                }
            }
        }
    }
}
