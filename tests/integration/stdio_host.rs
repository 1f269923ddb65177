//! The NDJSON bridge driven the way a host shell drives the binary.

use crate::helpers::{alarm_service, clock, refresh_service};
use reptitrack_wake::bridge::contract::{
    ErrorKind, Frame, MethodCall, MethodName, MethodResponse,
};
use reptitrack_wake::bridge::stdio::run_bridge;
use reptitrack_wake::platform::sim::{SimulatedAlarmService, SimulatedRefreshService};
use reptitrack_wake::service::WakeService;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

/// The shell's end of a running bridge.
struct Shell {
    lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
    input: WriteHalf<DuplexStream>,
    bridge: JoinHandle<reptitrack_wake::Result<()>>,
}

impl Shell {
    fn start(service: &Arc<WakeService>) -> Self {
        let (shell_side, bridge_side) = tokio::io::duplex(64 * 1024);
        let (bridge_read, bridge_write) = tokio::io::split(bridge_side);
        let (shell_read, shell_write) = tokio::io::split(shell_side);

        let app = service.binding().attach();
        let bridge = tokio::spawn(run_bridge(
            bridge_read,
            bridge_write,
            Arc::clone(service),
            app,
            16,
        ));

        Self {
            lines: BufReader::new(shell_read).lines(),
            input: shell_write,
            bridge,
        }
    }

    async fn send_line(&mut self, line: &str) {
        self.input.write_all(line.as_bytes()).await.expect("write line");
        self.input.write_all(b"\n").await.expect("write newline");
        self.input.flush().await.expect("flush");
    }

    async fn send<T: serde::Serialize>(&mut self, frame: &T) {
        let json = serde_json::to_string(frame).expect("serialize frame");
        self.send_line(&json).await;
    }

    async fn next_frame(&mut self) -> Frame {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("bridge answered in time")
            .expect("read line")
            .expect("bridge output still open");
        serde_json::from_str(&line).expect("bridge writes valid frames")
    }

    async fn next_response(&mut self) -> MethodResponse {
        match self.next_frame().await {
            Frame::Response(response) => response,
            Frame::Call(call) => panic!("expected a response, got call {call:?}"),
        }
    }

    async fn close(mut self) {
        self.input.shutdown().await.expect("shutdown input");
        drop(self.input);
        let result = tokio::time::timeout(Duration::from_secs(5), self.bridge)
            .await
            .expect("bridge stops after EOF")
            .expect("bridge task");
        assert!(result.is_ok(), "bridge exits cleanly on EOF: {result:?}");
    }
}

#[tokio::test]
async fn ping_and_support_round_trip() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let mut shell = Shell::start(&service);

    shell
        .send(&MethodCall::new("p-1", MethodName::Ping, serde_json::Value::Null))
        .await;
    let pong = shell.next_response().await;
    assert_eq!(pong.request_id, "p-1");
    assert_eq!(pong.result, serde_json::json!({"pong": true}));

    shell
        .send(&MethodCall::new("s-1", MethodName::IsSupported, serde_json::Value::Null))
        .await;
    let supported = shell.next_response().await;
    assert_eq!(supported.request_id, "s-1");
    assert!(supported.as_bool());

    shell.close().await;
}

#[tokio::test]
async fn malformed_line_gets_a_parse_error_and_the_bridge_keeps_going() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let mut shell = Shell::start(&service);

    shell.send_line("{not json").await;
    let error = shell.next_response().await;
    assert_eq!(error.request_id, "parse-error");
    assert_eq!(error.error_kind, Some(ErrorKind::Contract));

    shell
        .send(&MethodCall::new(
            "r-1",
            MethodName::RegisterWakeSource,
            serde_json::Value::Null,
        ))
        .await;
    let registered = shell.next_response().await;
    assert!(registered.as_bool());
    assert_eq!(alarms.pending_count(), 1);

    shell.close().await;
}

#[tokio::test]
async fn envelope_missing_fields_is_answered_under_its_own_id() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let mut shell = Shell::start(&service);

    shell
        .send_line(r#"{"request_id":"no-version","channel":"background_tasks","method":"isSupported"}"#)
        .await;

    let response = shell.next_response().await;
    assert_eq!(response.request_id, "no-version");
    assert!(!response.ok);
    assert_eq!(response.error_kind, Some(ErrorKind::Contract));

    shell.close().await;
}

#[tokio::test]
async fn wrong_version_is_rejected_as_contract_error() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let mut shell = Shell::start(&service);

    let mut call = MethodCall::new("v-9", MethodName::IsSupported, serde_json::Value::Null);
    call.v = 9;
    shell.send(&call).await;

    let response = shell.next_response().await;
    assert_eq!(response.request_id, "v-9");
    assert!(!response.ok);
    assert_eq!(response.error_kind, Some(ErrorKind::Contract));

    shell.close().await;
}

#[tokio::test]
async fn fire_wake_asks_the_shell_app_to_check() {
    let refresh = Arc::new(SimulatedRefreshService::new());
    let service = refresh_service(&refresh, &clock());
    let mut shell = Shell::start(&service);

    shell
        .send(&MethodCall::new(
            "w-1",
            MethodName::FireWake,
            serde_json::json!({"budget_secs": 30}),
        ))
        .await;

    // The next wake is armed before the check is asked for.
    let check = match shell.next_frame().await {
        Frame::Call(call) => call,
        Frame::Response(response) => panic!("expected checkNotifications, got {response:?}"),
    };
    assert_eq!(check.method_name(), Some(MethodName::CheckNotifications));
    assert_eq!(refresh.pending_count(), 1);

    shell
        .send(&MethodResponse::ok(check.request_id.clone(), serde_json::json!(true)))
        .await;

    let fired = shell.next_response().await;
    assert_eq!(fired.request_id, "w-1");
    assert!(fired.ok, "{:?}", fired.error);
    assert_eq!(fired.result["completion"], serde_json::json!(true));
    assert_eq!(
        fired.result["report"]["phases"],
        serde_json::json!(["fired", "rearmed", "checking", "completed"])
    );

    shell.close().await;
}

#[tokio::test]
async fn shell_failing_the_check_reports_false() {
    let refresh = Arc::new(SimulatedRefreshService::new());
    let service = refresh_service(&refresh, &clock());
    let mut shell = Shell::start(&service);

    shell
        .send(&MethodCall::new("w-2", MethodName::FireWake, serde_json::json!({})))
        .await;

    let Frame::Call(check) = shell.next_frame().await else {
        panic!("expected checkNotifications");
    };
    shell
        .send(&MethodResponse::error(
            check.request_id.clone(),
            ErrorKind::Unavailable,
            "database locked",
        ))
        .await;

    let fired = shell.next_response().await;
    assert_eq!(fired.result["completion"], serde_json::json!(false));
    assert_eq!(refresh.pending_count(), 1);

    shell.close().await;
}

#[tokio::test]
async fn tap_is_forwarded_to_the_shell_app() {
    let alarms = Arc::new(SimulatedAlarmService::new());
    let service = alarm_service(&alarms, &clock());
    let mut shell = Shell::start(&service);

    shell
        .send(&MethodCall::new(
            "t-1",
            MethodName::NotificationTapped,
            serde_json::json!("reminder_complete_42"),
        ))
        .await;

    let Frame::Call(action) = shell.next_frame().await else {
        panic!("expected handleNotificationAction");
    };
    assert_eq!(action.method_name(), Some(MethodName::HandleNotificationAction));
    assert_eq!(action.arguments, serde_json::json!("reminder_complete_42"));

    shell
        .send(&MethodResponse::ok(action.request_id.clone(), serde_json::json!(true)))
        .await;

    let tapped = shell.next_response().await;
    assert_eq!(
        tapped.result,
        serde_json::json!({
            "intent": {"kind": "complete_reminder", "context": "42"},
            "acknowledged": true
        })
    );
    assert_eq!(alarms.pending_count(), 0);

    shell.close().await;
}
