//! Scheduling channel contract against a real service.

use crate::helpers::{ScriptedApp, alarm_service, attach_app, clock, refresh_service};
use reptitrack_wake::bridge::contract::{CONTRACT_VERSION, ErrorKind, MethodCall, MethodName};
use reptitrack_wake::bridge::inbound::{SchedulingClient, route, scheduling_channel};
use reptitrack_wake::platform::sim::{SimulatedAlarmService, SimulatedRefreshService};
use reptitrack_wake::service::WakeService;
use std::sync::Arc;

fn serve(service: &Arc<WakeService>) -> SchedulingClient {
    let (client, server) = scheduling_channel(8, Arc::clone(service));
    tokio::spawn(server.run());
    client
}

fn call(method: MethodName) -> MethodCall {
    MethodCall::with_new_id(method, serde_json::Value::Null)
}

fn raw(channel: &str, method: &str) -> MethodCall {
    MethodCall {
        v: CONTRACT_VERSION,
        request_id: "raw-1".to_owned(),
        channel: channel.to_owned(),
        method: method.to_owned(),
        arguments: serde_json::Value::Null,
    }
}

#[tokio::test]
async fn register_and_query_support_over_the_channel() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let client = serve(&service);

    let registered = client
        .send(call(MethodName::RegisterWakeSource))
        .await
        .expect("register");
    assert!(registered.as_bool());
    assert_eq!(alarms.pending_count(), 1);

    let supported = client
        .send(call(MethodName::IsSupported))
        .await
        .expect("isSupported");
    assert!(supported.as_bool());

    let cancelled = client
        .send(call(MethodName::UnregisterWakeSource))
        .await
        .expect("unregister");
    assert!(cancelled.as_bool());
    assert_eq!(alarms.pending_count(), 0);

    let still_supported = client
        .send(call(MethodName::IsSupported))
        .await
        .expect("isSupported");
    assert!(still_supported.as_bool());
}

#[tokio::test]
async fn legacy_method_names_are_accepted() {
    let alarms = Arc::new(SimulatedAlarmService::denied());
    let service = alarm_service(&alarms, &clock());
    let client = serve(&service);

    let register = client
        .send(raw("background_tasks", "registerBackgroundTask"))
        .await
        .expect("legacy register");
    assert!(register.as_bool());

    let permission = client
        .send(raw("background_tasks", "requestExactAlarmPermission"))
        .await
        .expect("legacy permission");
    assert!(permission.as_bool());
    assert!(alarms.settings_opened() >= 1);
}

#[tokio::test]
async fn permission_request_on_budgeted_platform_is_false() {
    let refresh = Arc::new(SimulatedRefreshService::new());
    let service = refresh_service(&refresh, &clock());
    let client = serve(&service);

    let response = client
        .send(call(MethodName::RequestExactSchedulingPermission))
        .await
        .expect("permission");
    assert!(response.ok);
    assert!(!response.as_bool());
}

#[tokio::test]
async fn unknown_method_answers_not_implemented() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let client = serve(&service);

    let response = client
        .send(raw("background_tasks", "cancelAll"))
        .await
        .expect("response");
    assert!(!response.ok);
    assert_eq!(response.error_kind, Some(ErrorKind::NotImplemented));
    assert_eq!(response.request_id, "raw-1");
}

#[tokio::test]
async fn unsupported_version_never_reaches_the_scheduler() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());

    let mut call = raw("background_tasks", "registerWakeSource");
    call.v = CONTRACT_VERSION + 1;
    let response = route(service.as_ref(), &call).await;

    assert!(!response.ok);
    assert_eq!(response.error_kind, Some(ErrorKind::Contract));
    assert_eq!(alarms.pending_count(), 0);
}

#[tokio::test]
async fn harness_fire_wake_runs_a_check_and_reports() {
    let refresh = Arc::new(SimulatedRefreshService::new());
    let service = refresh_service(&refresh, &clock());
    let app = Arc::new(ScriptedApp::default());
    let _app_task = attach_app(&service, &app);
    let client = serve(&service);

    let response = client
        .send(MethodCall::with_new_id(
            MethodName::FireWake,
            serde_json::json!({"budget_secs": 20}),
        ))
        .await
        .expect("fireWake");

    assert!(response.ok, "{:?}", response.error);
    assert_eq!(response.result["completion"], serde_json::json!(true));
    assert_eq!(
        response.result["report"]["check"],
        serde_json::json!({"status": "completed", "success": true})
    );
    assert_eq!(app.check_count(), 1);
    assert_eq!(refresh.pending_count(), 1);
}

#[tokio::test]
async fn harness_boot_completed_only_rearms() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let app = Arc::new(ScriptedApp::default());
    let _app_task = attach_app(&service, &app);
    let client = serve(&service);

    let response = client
        .send(call(MethodName::BootCompleted))
        .await
        .expect("bootCompleted");

    assert!(response.ok);
    assert_eq!(response.result["check"]["status"], "skipped");
    assert_eq!(alarms.pending_count(), 1);
    assert_eq!(app.check_count(), 0);
}

#[tokio::test]
async fn harness_notification_tap_returns_the_routed_intent() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let app = Arc::new(ScriptedApp::default());
    let _app_task = attach_app(&service, &app);
    let client = serve(&service);

    let response = client
        .send(MethodCall::with_new_id(
            MethodName::NotificationTapped,
            serde_json::json!({"payload": "smart_weight_xyz"}),
        ))
        .await
        .expect("notificationTapped");

    assert_eq!(
        response.result,
        serde_json::json!({
            "intent": {"kind": "weight", "context": "xyz"},
            "acknowledged": true
        })
    );
}
