//! Shared helpers for integration tests.

use async_trait::async_trait;
use reptitrack_wake::WakeConfig;
use reptitrack_wake::bridge::AppLayer;
use reptitrack_wake::platform::PlatformBackends;
use reptitrack_wake::platform::sim::{ManualClock, SimulatedAlarmService, SimulatedRefreshService};
use reptitrack_wake::scheduler::Clock;
use reptitrack_wake::service::WakeService;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Fixed start time for every simulated clock (2024-01-01T00:00:00Z).
pub(crate) const START_EPOCH_SECS: i64 = 1_704_067_200;

pub(crate) fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at_epoch_secs(START_EPOCH_SECS))
}

/// Service over a simulated alarm manager.
pub(crate) fn alarm_service(
    alarms: &Arc<SimulatedAlarmService>,
    clock: &Arc<ManualClock>,
) -> Arc<WakeService> {
    Arc::new(WakeService::with_clock(
        WakeConfig::default(),
        PlatformBackends::alarm(Arc::clone(alarms)),
        Arc::clone(clock) as Arc<dyn Clock>,
    ))
}

/// Service over a simulated background-refresh scheduler.
pub(crate) fn refresh_service(
    refresh: &Arc<SimulatedRefreshService>,
    clock: &Arc<ManualClock>,
) -> Arc<WakeService> {
    Arc::new(WakeService::with_clock(
        WakeConfig::default(),
        PlatformBackends::Refresh {
            refresh: Arc::clone(refresh) as Arc<dyn reptitrack_wake::platform::BackgroundRefreshService>,
        },
        Arc::clone(clock) as Arc<dyn Clock>,
    ))
}

/// Application layer stand-in with scripted answers.
#[derive(Default)]
pub(crate) struct ScriptedApp {
    pub(crate) check_fails: AtomicBool,
    pub(crate) block_checks: AtomicBool,
    pub(crate) checks: AtomicUsize,
    pub(crate) actions: Mutex<Vec<String>>,
    pub(crate) check_started: Notify,
}

impl ScriptedApp {
    pub(crate) fn blocking() -> Arc<Self> {
        let app = Self::default();
        app.block_checks.store(true, Ordering::SeqCst);
        Arc::new(app)
    }

    pub(crate) fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub(crate) fn actions(&self) -> Vec<String> {
        self.actions.lock().expect("actions lock").clone()
    }
}

#[async_trait]
impl AppLayer for ScriptedApp {
    async fn check_notifications(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.check_started.notify_one();
        if self.block_checks.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        !self.check_fails.load(Ordering::SeqCst)
    }

    async fn handle_notification_action(&self, payload: &str) -> bool {
        self.actions
            .lock()
            .expect("actions lock")
            .push(payload.to_owned());
        true
    }
}

/// Attach `app` to the service's outbound channel and serve it in the background.
pub(crate) fn attach_app(service: &WakeService, app: &Arc<ScriptedApp>) -> JoinHandle<()> {
    let endpoint = service.binding().attach();
    tokio::spawn(endpoint.serve(Arc::clone(app)))
}
