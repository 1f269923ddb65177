//! Notification taps routed through the Action Dispatcher to the app.

use crate::helpers::{ScriptedApp, alarm_service, attach_app, clock};
use reptitrack_wake::actions::RoutedIntent;
use reptitrack_wake::platform::sim::SimulatedAlarmService;
use std::sync::Arc;

#[tokio::test]
async fn example_payloads_route_to_their_intents() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let app = Arc::new(ScriptedApp::default());
    let _app_task = attach_app(&service, &app);

    let cases = [
        (
            "smart_feeding_abc123",
            RoutedIntent::Feeding {
                context: "abc123".to_owned(),
            },
        ),
        (
            "smart_weight_xyz",
            RoutedIntent::Weight {
                context: "xyz".to_owned(),
            },
        ),
        (
            "reminder_complete_42",
            RoutedIntent::CompleteReminder {
                context: "42".to_owned(),
            },
        ),
        ("unknown_foo", RoutedIntent::Noop),
    ];

    for (payload, expected) in cases {
        let outcome = service.on_notification_tapped(payload).await;
        assert_eq!(outcome.intent, expected, "payload {payload}");
        assert_eq!(outcome.acknowledged, !expected.is_noop());
    }

    assert_eq!(
        app.actions(),
        vec![
            "smart_feeding_abc123".to_owned(),
            "smart_weight_xyz".to_owned(),
            "reminder_complete_42".to_owned(),
        ]
    );
    assert_eq!(service.dispatcher().ignored_count(), 1);
}

#[tokio::test]
async fn tap_before_app_attaches_is_not_acknowledged() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());

    let outcome = service.on_notification_tapped("smart_feeding_1").await;

    assert!(matches!(outcome.intent, RoutedIntent::Feeding { .. }));
    assert!(!outcome.acknowledged);
    assert_eq!(service.dispatcher().ignored_count(), 0);
}

#[tokio::test]
async fn taps_never_touch_scheduling() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let app = Arc::new(ScriptedApp::default());
    let _app_task = attach_app(&service, &app);

    service.on_notification_tapped("reminder_complete_7").await;
    service.on_notification_tapped("something_new_from_a_future_app").await;

    assert_eq!(alarms.pending_count(), 0);
    assert_eq!(app.check_count(), 0);
}
