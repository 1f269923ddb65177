//! In-memory OS simulators.
//!
//! Each simulator owns its own pending-request table, mirroring the fact
//! that the real tables live outside the process. Used by the test suites
//! and by `wake-host`, which polls [`SimulatedAlarmService::take_due`] /
//! [`SimulatedRefreshService::take_due`] to fire wakes.

use super::{AlarmService, BackgroundRefreshService, ExactAlarmSettings, NotificationPresenter};
use crate::error::{Result, WakeError};
use crate::scheduler::{Clock, Exactness, WakeRequest, WakeSourceId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type PendingTable = Mutex<HashMap<WakeSourceId, WakeRequest>>;

fn take_due_from(table: &PendingTable, now: DateTime<Utc>) -> Vec<WakeRequest> {
    let mut pending = lock(table);
    let due: Vec<WakeSourceId> = pending
        .values()
        .filter(|request| request.earliest_fire <= now)
        .map(|request| request.source.clone())
        .collect();
    due.iter().filter_map(|source| pending.remove(source)).collect()
}

/// Alarm manager with an exact-alarm grant that can be revoked at will.
#[derive(Debug)]
pub struct SimulatedAlarmService {
    pending: PendingTable,
    exact_granted: AtomicBool,
    requires_grant: AtomicBool,
    grant_on_settings: AtomicBool,
    failing: AtomicBool,
    settings_opened: AtomicUsize,
}

impl Default for SimulatedAlarmService {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAlarmService {
    /// A device that requires the grant and currently has it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            exact_granted: AtomicBool::new(true),
            requires_grant: AtomicBool::new(true),
            grant_on_settings: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            settings_opened: AtomicUsize::new(0),
        }
    }

    /// A device where exact scheduling has been refused.
    #[must_use]
    pub fn denied() -> Self {
        let sim = Self::new();
        sim.revoke_exact();
        sim
    }

    pub fn grant_exact(&self) {
        self.exact_granted.store(true, Ordering::SeqCst);
    }

    pub fn revoke_exact(&self) {
        self.exact_granted.store(false, Ordering::SeqCst);
    }

    /// Simulate an OS version with no runtime exact-alarm grant.
    pub fn set_requires_grant(&self, requires: bool) {
        self.requires_grant.store(requires, Ordering::SeqCst);
    }

    /// When set, opening the settings flow immediately grants exact scheduling.
    pub fn set_grant_on_settings(&self, grant: bool) {
        self.grant_on_settings.store(grant, Ordering::SeqCst);
    }

    /// Make every alarm call fail with a platform error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn settings_opened(&self) -> usize {
        self.settings_opened.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pending(&self, source: &WakeSourceId) -> Option<WakeRequest> {
        lock(&self.pending).get(source).cloned()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Remove and return every alarm whose fire time has passed.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<WakeRequest> {
        take_due_from(&self.pending, now)
    }

    fn exact_allowed(&self) -> bool {
        !self.requires_grant.load(Ordering::SeqCst) || self.exact_granted.load(Ordering::SeqCst)
    }

    fn store(&self, source: &WakeSourceId, at: DateTime<Utc>, exactness: Exactness) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WakeError::Platform("alarm service unavailable".to_owned()));
        }
        lock(&self.pending).insert(
            source.clone(),
            WakeRequest {
                source: source.clone(),
                earliest_fire: at,
                exactness,
            },
        );
        Ok(())
    }
}

impl AlarmService for SimulatedAlarmService {
    fn set_exact(&self, source: &WakeSourceId, at: DateTime<Utc>) -> Result<()> {
        if !self.exact_allowed() {
            return Err(WakeError::PermissionDenied(
                "exact alarm permission not granted".to_owned(),
            ));
        }
        self.store(source, at, Exactness::Exact)
    }

    fn set_inexact(&self, source: &WakeSourceId, at: DateTime<Utc>) -> Result<()> {
        self.store(source, at, Exactness::BestEffort)
    }

    fn cancel(&self, source: &WakeSourceId) {
        lock(&self.pending).remove(source);
    }
}

impl ExactAlarmSettings for SimulatedAlarmService {
    fn requires_grant(&self) -> bool {
        self.requires_grant.load(Ordering::SeqCst)
    }

    fn can_schedule_exact(&self) -> bool {
        self.exact_allowed()
    }

    fn open_exact_alarm_settings(&self) -> Result<()> {
        self.settings_opened.fetch_add(1, Ordering::SeqCst);
        if self.grant_on_settings.load(Ordering::SeqCst) {
            self.grant_exact();
        }
        Ok(())
    }
}

/// Background-refresh scheduler that only keeps earliest-begin requests.
#[derive(Debug)]
pub struct SimulatedRefreshService {
    pending: PendingTable,
    available: AtomicBool,
    failing: AtomicBool,
    submissions: AtomicUsize,
}

impl Default for SimulatedRefreshService {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRefreshService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            submissions: AtomicUsize::new(0),
        }
    }

    /// Simulate an OS version without background refresh.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make submissions fail with a platform error (e.g. refresh disabled by the user).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pending(&self, source: &WakeSourceId) -> Option<WakeRequest> {
        lock(&self.pending).get(source).cloned()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<WakeRequest> {
        take_due_from(&self.pending, now)
    }
}

impl BackgroundRefreshService for SimulatedRefreshService {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn submit(&self, source: &WakeSourceId, earliest_begin: DateTime<Utc>) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WakeError::Platform(
                "background refresh request rejected".to_owned(),
            ));
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        lock(&self.pending).insert(
            source.clone(),
            WakeRequest {
                source: source.clone(),
                earliest_fire: earliest_begin,
                exactness: Exactness::BestEffort,
            },
        );
        Ok(())
    }

    fn cancel(&self, source: &WakeSourceId) {
        lock(&self.pending).remove(source);
    }
}

/// Notification center with a scripted authorisation answer and a badge.
#[derive(Debug)]
pub struct SimulatedNotificationCenter {
    authorized: AtomicBool,
    failing: AtomicBool,
    authorization_requests: AtomicUsize,
    badge: AtomicUsize,
}

impl Default for SimulatedNotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNotificationCenter {
    /// A user who allows notifications when asked.
    #[must_use]
    pub fn new() -> Self {
        Self {
            authorized: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            authorization_requests: AtomicUsize::new(0),
            badge: AtomicUsize::new(0),
        }
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    /// Make every notification center call fail with a platform error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Show `count` on the app icon, as delivered notifications would.
    pub fn set_badge(&self, count: usize) {
        self.badge.store(count, Ordering::SeqCst);
    }

    #[must_use]
    pub fn badge(&self) -> usize {
        self.badge.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WakeError::Platform(
                "notification center unavailable".to_owned(),
            ));
        }
        Ok(())
    }
}

impl NotificationPresenter for SimulatedNotificationCenter {
    fn request_authorization(&self) -> Result<bool> {
        self.ensure_available()?;
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    fn clear_badge(&self) -> Result<()> {
        self.ensure_available()?;
        self.badge.store(0, Ordering::SeqCst);
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    #[must_use]
    pub fn at_epoch_secs(secs: i64) -> Self {
        Self::new(DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        let next = chrono::Duration::from_std(by)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta));
        if let Some(next) = next {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}
