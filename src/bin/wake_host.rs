//! Headless wake host over stdin/stdout.
//!
//! Runs the wake core against a simulated OS scheduler and speaks the
//! bridge protocol as newline-delimited JSON: the application layer (or a
//! test driver) sends scheduling calls and answers `checkNotifications` /
//! `handleNotificationAction`; OS events can be injected on the
//! `wake_host` channel or arrive from the simulated scheduler's clock.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.
//!
//! Environment:
//! - `REPTITRACK_WAKE_CONFIG`: config file path (default: platform config dir)
//! - `REPTITRACK_WAKE_PLATFORM`: `android` (alarm, default), `ios` (refresh) or `none`
//! - `REPTITRACK_WAKE_DATA_DIR`: base for the default log directory
//!
//! Logs go to a daily file under `<data dir>/logs/` unless `logging.log_dir`
//! is set in the config.

use reptitrack_wake::bridge::stdio::run_stdio_bridge;
use reptitrack_wake::config::WakeConfig;
use reptitrack_wake::platform::sim::{
    SimulatedAlarmService, SimulatedNotificationCenter, SimulatedRefreshService,
};
use reptitrack_wake::platform::{NotificationPresenter, PlatformBackends, PlatformKind};
use reptitrack_wake::scheduler::{Clock, SystemClock};
use reptitrack_wake::service::WakeService;
use reptitrack_wake::wake::{LifecycleEvent, WakeBudget};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// The simulated OS table the poll loop fires from.
enum SimulatedOs {
    Alarm(Arc<SimulatedAlarmService>),
    Refresh(Arc<SimulatedRefreshService>),
    None,
}

impl SimulatedOs {
    fn for_platform(kind: PlatformKind) -> (Self, PlatformBackends) {
        match kind {
            PlatformKind::Android => {
                let alarms = Arc::new(SimulatedAlarmService::new());
                (Self::Alarm(Arc::clone(&alarms)), PlatformBackends::alarm(alarms))
            }
            PlatformKind::Ios => {
                let refresh = Arc::new(SimulatedRefreshService::new());
                (
                    Self::Refresh(Arc::clone(&refresh)),
                    PlatformBackends::Refresh { refresh },
                )
            }
            PlatformKind::Other => (Self::None, PlatformBackends::Unsupported),
        }
    }

    /// Fire every due request through the service.
    async fn fire_due(&self, service: &WakeService) {
        let now = SystemClock.now();
        match self {
            Self::Alarm(alarms) => {
                for request in alarms.take_due(now) {
                    tracing::info!(source = %request.source, "simulated alarm fired");
                    service.on_wake_fired(WakeBudget::Unbounded, None).await;
                }
            }
            Self::Refresh(refresh) => {
                let budget = Duration::from_secs(service.config().host.refresh_budget_secs);
                for request in refresh.take_due(now) {
                    tracing::info!(source = %request.source, "simulated background refresh started");
                    service.run_budgeted_wake(budget).await;
                }
            }
            Self::None => {}
        }
    }
}

fn load_config() -> anyhow::Result<WakeConfig> {
    let path = std::env::var_os("REPTITRACK_WAKE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(WakeConfig::default_config_path);
    let mut config = WakeConfig::load_or_default(&path)
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {e}", path.display()))?;
    config.logging.log_dir = Some(config.logging.log_dir_or_default());
    Ok(config)
}

fn platform_kind() -> anyhow::Result<PlatformKind> {
    match std::env::var("REPTITRACK_WAKE_PLATFORM") {
        Ok(raw) => PlatformKind::parse(&raw)
            .ok_or_else(|| anyhow::anyhow!("unknown REPTITRACK_WAKE_PLATFORM `{raw}`")),
        Err(_) => Ok(match PlatformKind::current() {
            PlatformKind::Other => PlatformKind::Android,
            native => native,
        }),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    let _log_guard = reptitrack_wake::logging::init(&config.logging);

    let kind = platform_kind()?;
    tracing::info!(platform = kind.as_str(), "wake-host starting");

    let poll_interval = Duration::from_secs(config.host.poll_interval_secs);
    let request_capacity = config.bridge.request_capacity;
    let (os, backends) = SimulatedOs::for_platform(kind);
    let notifications = Arc::new(SimulatedNotificationCenter::new());
    let service = Arc::new(
        WakeService::new(config, backends)
            .with_presenter(notifications as Arc<dyn NotificationPresenter>),
    );

    service.on_lifecycle(LifecycleEvent::Launched).await;

    let poll_service = Arc::clone(&service);
    let poll_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            os.fire_due(&poll_service).await;
        }
    });

    let app = service.binding().attach();
    let result = run_stdio_bridge(Arc::clone(&service), app, request_capacity).await;

    poll_handle.abort();
    let _ = poll_handle.await;

    result.map_err(|e| {
        tracing::error!(error = %e, "wake-host exited with error");
        anyhow::anyhow!("wake-host failed: {e}")
    })?;

    tracing::info!("wake-host shut down cleanly");
    Ok(())
}
