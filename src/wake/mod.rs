//! Wake Handler.
//!
//! The OS invokes the handler at an arbitrary future time. Each invocation
//! is a single task entry point ([`WakeHandler::handle`]) given the budget
//! the OS granted and, on platforms that need it, a [`CompletionSink`] to
//! report the Check Result through.
//!
//! Phases per wake: `Fired -> Rearmed -> Checking -> Completed`. The next
//! wake is armed before the Check Operation starts, so a stalled or killed
//! check can never stop scheduling.

mod handler;

pub use handler::WakeHandler;

use crate::scheduler::WakeRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handler state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakePhase {
    Fired,
    Rearmed,
    Checking,
    Completed,
}

/// Outcome of the application-layer Check Operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
}

impl CheckResult {
    pub const FAILED: Self = Self { success: false };

    #[must_use]
    pub fn new(success: bool) -> Self {
        Self { success }
    }
}

/// The application layer's "check reminders" operation.
///
/// Implementations must resolve to a result on every path; failures and
/// unbound channels are reported as `success = false`.
#[async_trait]
pub trait CheckOperation: Send + Sync {
    async fn check_notifications(&self) -> CheckResult;
}

/// One-shot completion signal back to the OS.
///
/// Consumed by [`CompletionSink::complete`], so a wake can report at most once.
#[derive(Debug)]
pub struct CompletionSink {
    tx: oneshot::Sender<bool>,
}

impl CompletionSink {
    /// Create a sink and the receiver the OS side waits on.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self, success: bool) {
        if self.tx.send(success).is_err() {
            debug!(success, "completion receiver dropped before wake completed");
        }
    }
}

/// Execution window the OS granted for one wake.
#[derive(Debug, Clone)]
pub enum WakeBudget {
    /// Alarm path: no OS deadline. The handler still bounds the check.
    Unbounded,
    /// Budgeted path: `expired` is cancelled when the OS expiration callback fires.
    Bounded { expired: CancellationToken },
}

impl WakeBudget {
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        matches!(self, Self::Bounded { .. })
    }
}

/// Why the handler was entered.
#[derive(Debug)]
pub enum WakeTrigger {
    /// A scheduled wake fired.
    Fired {
        budget: WakeBudget,
        completion: Option<CompletionSink>,
    },
    /// The device or process restarted; only the pending request is restored.
    BootCompleted,
}

/// Application lifecycle transitions that touch scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The app finished launching: register the wake source.
    Launched,
    /// The app moved to the background: re-arm.
    EnteredBackground,
    /// The app returned to the foreground: re-arm and check now.
    EnteredForeground,
}

impl LifecycleEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Launched => "launched",
            Self::EnteredBackground => "entered_background",
            Self::EnteredForeground => "entered_foreground",
        }
    }
}

/// How the Checking phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// No check ran (boot, launch, background entry).
    Skipped,
    /// The Check Operation resolved.
    Completed { success: bool },
    /// The OS budget expired first.
    Expired,
    /// The handler's own bound on an unbudgeted check elapsed.
    TimedOut,
}

impl CheckOutcome {
    /// The value reported to the OS; anything but a resolved check is `false`.
    #[must_use]
    pub fn success(self) -> bool {
        matches!(self, Self::Completed { success: true })
    }
}

/// What one handler invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeReport {
    /// Phases visited, in order.
    pub phases: Vec<WakePhase>,
    /// The request armed for the next wake, if arming succeeded.
    pub armed: Option<WakeRequest>,
    /// Arm failure message when the platform refused both exact and inexact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm_error: Option<String>,
    pub check: CheckOutcome,
    /// Whether a completion signal was sent to the OS.
    pub completion_reported: bool,
}
