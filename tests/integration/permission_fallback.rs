//! Exact-scheduling denial and elevation through the full service.

use crate::helpers::{alarm_service, clock};
use reptitrack_wake::bridge::SchedulingControls;
use reptitrack_wake::permissions::SchedulingCapability;
use reptitrack_wake::platform::sim::SimulatedAlarmService;
use reptitrack_wake::scheduler::Exactness;
use reptitrack_wake::wake::WakeBudget;
use std::sync::Arc;

#[test]
fn denied_permission_still_leaves_a_pending_request() {
    let alarms = Arc::new(SimulatedAlarmService::denied());
    let service = alarm_service(&alarms, &clock());

    assert!(service.register_wake_source().expect("register never fails on denial"));

    let pending = alarms
        .pending(service.scheduler().source())
        .expect("pending request");
    assert_eq!(pending.exactness, Exactness::BestEffort);
    assert_eq!(alarms.settings_opened(), 1);
}

#[tokio::test]
async fn revocation_between_wakes_degrades_without_stopping() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let source = service.scheduler().source().clone();

    service.register_wake_source().expect("register");
    assert_eq!(alarms.pending(&source).map(|r| r.exactness), Some(Exactness::Exact));

    alarms.revoke_exact();
    service.on_wake_fired(WakeBudget::Unbounded, None).await;
    assert_eq!(
        alarms.pending(&source).map(|r| r.exactness),
        Some(Exactness::BestEffort)
    );

    alarms.grant_exact();
    service.on_wake_fired(WakeBudget::Unbounded, None).await;
    assert_eq!(alarms.pending(&source).map(|r| r.exactness), Some(Exactness::Exact));
    assert_eq!(alarms.pending_count(), 1);
}

#[tokio::test]
async fn repeated_denials_open_settings_once_until_granted() {
    let alarms = Arc::new(SimulatedAlarmService::denied());
    let service = alarm_service(&alarms, &clock());

    for _ in 0..3 {
        service.on_boot_completed().await;
    }
    assert_eq!(alarms.settings_opened(), 1);

    let gate = service.gate().expect("alarm platforms have a gate");
    assert!(gate.elevation_pending());
    assert_eq!(
        gate.check_capability().capability,
        SchedulingCapability::InexactOnly
    );
}

#[test]
fn user_grant_from_settings_upgrades_the_next_arm() {
    let alarms = Arc::new(SimulatedAlarmService::denied());
    alarms.set_grant_on_settings(true);
    let service = alarm_service(&alarms, &clock());

    // The first arm is degraded; the settings flow it opens grants the permission.
    service.register_wake_source().expect("register");
    assert_eq!(
        alarms.pending(service.scheduler().source()).map(|r| r.exactness),
        Some(Exactness::BestEffort)
    );

    service.schedule_wake_source().expect("rearm");
    assert_eq!(
        alarms.pending(service.scheduler().source()).map(|r| r.exactness),
        Some(Exactness::Exact)
    );
}

#[test]
fn explicit_permission_request_reports_issued_not_granted() {
    let alarms = Arc::new(SimulatedAlarmService::denied());
    let service = alarm_service(&alarms, &clock());

    assert!(service.request_exact_scheduling_permission());
    assert_eq!(alarms.settings_opened(), 1);
    assert!(
        !service
            .gate()
            .expect("gate")
            .check_capability()
            .granted
    );
}

#[test]
fn older_os_without_grant_schedules_exact() {
    let alarms = Arc::new(SimulatedAlarmService::denied());
    alarms.set_requires_grant(false);
    let service = alarm_service(&alarms, &clock());

    service.register_wake_source().expect("register");
    assert_eq!(
        alarms.pending(service.scheduler().source()).map(|r| r.exactness),
        Some(Exactness::Exact)
    );
    assert!(service.request_exact_scheduling_permission());
    assert_eq!(alarms.settings_opened(), 0);
}
