//! Composition root for the wake scheduling core.
//!
//! [`WakeService`] owns one scheduler, its Permission Gate (alarm platforms
//! only), the Wake Handler, the Action Dispatcher and the native side of
//! the bridge. Native shells feed it OS events; the application layer
//! reaches it through [`SchedulingControls`].

use crate::actions::{ActionDispatcher, ActionForwarder, DispatchOutcome};
use crate::bridge::inbound::{HostEvent, HostEvents, SchedulingControls};
use crate::bridge::outbound::{AppBinding, AppCaller, app_channel};
use crate::config::WakeConfig;
use crate::error::{Result, WakeError};
use crate::permissions::PermissionGate;
use crate::platform::{NotificationPresenter, PlatformBackends};
use crate::scheduler::{Clock, SchedulerKind, SystemClock, WakeScheduler, WakeSourceId, select_strategy};
use crate::wake::{
    CheckOperation, CompletionSink, LifecycleEvent, WakeBudget, WakeHandler, WakeReport,
    WakeTrigger,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct WakeService {
    config: WakeConfig,
    scheduler: Arc<dyn WakeScheduler>,
    gate: Option<Arc<PermissionGate>>,
    handler: WakeHandler,
    dispatcher: ActionDispatcher,
    binding: AppBinding,
    caller: AppCaller,
    registered: AtomicBool,
}

impl std::fmt::Debug for WakeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeService")
            .field("source", self.scheduler.source())
            .field("kind", &self.scheduler.kind())
            .field("registered", &self.registered.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl WakeService {
    pub fn new(config: WakeConfig, backends: PlatformBackends) -> Self {
        Self::with_clock(config, backends, Arc::new(SystemClock))
    }

    pub fn with_clock(config: WakeConfig, backends: PlatformBackends, clock: Arc<dyn Clock>) -> Self {
        let source = WakeSourceId::new(config.schedule.source_id.clone());
        let (scheduler, gate) = select_strategy(
            backends,
            source,
            clock,
            config.permissions.elevate_on_denial,
        );
        let (binding, caller) =
            app_channel(config.bridge.app_capacity, config.check.call_timeout());

        let handler = WakeHandler::new(
            Arc::clone(&scheduler),
            Arc::new(caller.clone()) as Arc<dyn CheckOperation>,
            config.schedule.interval(),
            config.check.alarm_timeout(),
        );
        let dispatcher =
            ActionDispatcher::new(Arc::new(caller.clone()) as Arc<dyn ActionForwarder>);

        info!(
            source = %scheduler.source(),
            kind = ?scheduler.kind(),
            interval_secs = config.schedule.interval_secs,
            "wake service ready"
        );

        Self {
            config,
            scheduler,
            gate,
            handler,
            dispatcher,
            binding,
            caller,
            registered: AtomicBool::new(false),
        }
    }

    /// Attach the OS notification center driven on launch and foreground entry.
    #[must_use]
    pub fn with_presenter(mut self, presenter: Arc<dyn NotificationPresenter>) -> Self {
        self.handler = self.handler.with_presenter(presenter);
        self
    }

    #[must_use]
    pub fn config(&self) -> &WakeConfig {
        &self.config
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<dyn WakeScheduler> {
        &self.scheduler
    }

    #[must_use]
    pub fn gate(&self) -> Option<&Arc<PermissionGate>> {
        self.gate.as_ref()
    }

    /// Attach point for the application layer's end of the outbound channel.
    #[must_use]
    pub fn binding(&self) -> &AppBinding {
        &self.binding
    }

    #[must_use]
    pub fn caller(&self) -> &AppCaller {
        &self.caller
    }

    #[must_use]
    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// OS entry point for a fired wake.
    pub async fn on_wake_fired(
        &self,
        budget: WakeBudget,
        completion: Option<CompletionSink>,
    ) -> WakeReport {
        self.handler
            .handle(WakeTrigger::Fired { budget, completion })
            .await
    }

    /// OS entry point after device or process restart.
    pub async fn on_boot_completed(&self) -> WakeReport {
        let report = self.handler.handle(WakeTrigger::BootCompleted).await;
        if report.armed.is_some() {
            self.registered.store(true, Ordering::SeqCst);
        }
        report
    }

    pub async fn on_lifecycle(&self, event: LifecycleEvent) -> WakeReport {
        let report = self.handler.handle_lifecycle(event).await;
        if event == LifecycleEvent::Launched && report.armed.is_some() {
            self.registered.store(true, Ordering::SeqCst);
        }
        report
    }

    /// OS entry point for a tapped notification.
    pub async fn on_notification_tapped(&self, payload: &str) -> DispatchOutcome {
        self.dispatcher.dispatch(payload).await
    }

    /// Run one budgeted wake whose budget expires after `budget`.
    ///
    /// Returns the report and the value delivered through the completion sink.
    pub async fn run_budgeted_wake(&self, budget: Duration) -> (WakeReport, Option<bool>) {
        let expired = CancellationToken::new();
        let timer = tokio::spawn({
            let expired = expired.clone();
            async move {
                tokio::time::sleep(budget).await;
                expired.cancel();
            }
        });
        let (sink, completion_rx) = CompletionSink::channel();

        let report = self
            .on_wake_fired(WakeBudget::Bounded { expired }, Some(sink))
            .await;
        timer.abort();

        (report, completion_rx.await.ok())
    }

    fn host_budget(&self, budget_secs: Option<u64>) -> Option<Duration> {
        match (budget_secs, self.scheduler.kind()) {
            (Some(secs), _) => Some(Duration::from_secs(secs)),
            (None, SchedulerKind::Budgeted) => {
                Some(Duration::from_secs(self.config.host.refresh_budget_secs))
            }
            (None, _) => None,
        }
    }
}

impl SchedulingControls for WakeService {
    fn register_wake_source(&self) -> Result<bool> {
        if !self.scheduler.is_supported() {
            warn!(source = %self.scheduler.source(), "no deferred execution on this platform");
            return Ok(false);
        }
        let request = self.scheduler.arm(self.config.schedule.interval())?;
        self.registered.store(true, Ordering::SeqCst);
        info!(
            source = %request.source,
            exactness = request.exactness.as_str(),
            "wake source registered"
        );
        Ok(true)
    }

    fn is_supported(&self) -> bool {
        self.scheduler.is_supported()
    }

    fn request_exact_scheduling_permission(&self) -> bool {
        match &self.gate {
            Some(gate) => {
                gate.request_elevation();
                true
            }
            None => false,
        }
    }

    fn unregister_wake_source(&self) -> bool {
        self.scheduler.cancel();
        self.registered.store(false, Ordering::SeqCst);
        info!(source = %self.scheduler.source(), "wake source unregistered");
        true
    }
}

#[async_trait]
impl HostEvents for WakeService {
    async fn host_event(&self, event: HostEvent) -> Result<serde_json::Value> {
        match event {
            HostEvent::FireWake { budget_secs } => {
                let (report, completion) = match self.host_budget(budget_secs) {
                    Some(budget) => self.run_budgeted_wake(budget).await,
                    None => (self.on_wake_fired(WakeBudget::Unbounded, None).await, None),
                };
                Ok(serde_json::json!({
                    "report": encode(&report)?,
                    "completion": completion,
                }))
            }
            HostEvent::BootCompleted => encode(&self.on_boot_completed().await),
            HostEvent::Lifecycle(event) => encode(&self.on_lifecycle(event).await),
            HostEvent::NotificationTapped { payload } => {
                encode(&self.on_notification_tapped(&payload).await)
            }
        }
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| WakeError::Contract(format!("failed to encode host result: {e}")))
}
