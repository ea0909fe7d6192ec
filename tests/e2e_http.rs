//! End-to-end runs against mock HTTP servers

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tempfile::TempDir;

use firmware_monitor::config::TelegramConfig;
use firmware_monitor::monitor::{Monitor, MonitorOptions, RunOutcome};
use firmware_monitor::notify::TelegramNotifier;
use firmware_monitor::source::{HttpDeviceCatalog, IpswFirmwareSource};
use firmware_monitor::state::StateStore;
use firmware_monitor::version::Version;

const NOW: &str = "2026-10-19 08:00:00";
const TIMEOUT: Duration = Duration::from_secs(5);

fn build_monitor(server: &ServerGuard, store: StateStore) -> Monitor {
    let catalog =
        HttpDeviceCatalog::new(&format!("{}/devices.json", server.url()), TIMEOUT).unwrap();
    let firmware =
        IpswFirmwareSource::new(&server.url(), Version::parse("26.0").unwrap(), TIMEOUT).unwrap();
    let notifier = TelegramNotifier::new(
        &server.url(),
        Ok(TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "-10042".to_string(),
        }),
        TIMEOUT,
    )
    .unwrap();

    Monitor::new(
        Arc::new(catalog),
        Arc::new(firmware),
        Arc::new(notifier),
        store,
        MonitorOptions::default(),
    )
}

#[tokio::test]
async fn reports_new_signed_firmware_to_telegram() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("last_notified.json");
    fs::write(&path, r#"{"iPhone15,2": "17.0"}"#).unwrap();

    let catalog = server
        .mock("GET", "/devices.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"categories": [{"name": "iPhone", "devices": [
                {"id": "iPhone15,2", "name": "iPhone 14 Pro"}
            ]}]}"#,
        )
        .create_async()
        .await;

    let firmware = server
        .mock("GET", "/v4/device/iPhone15,2")
        .match_query(Matcher::UrlEncoded("type".into(), "ipsw".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"firmwares": [
                {"version": "26.0.1", "signed": true},
                {"version": "17.1", "signed": true},
                {"version": "17.0", "signed": true},
                {"version": "abc", "signed": true},
                {"version": "16.7.10", "signed": false}
            ]}"#,
        )
        .create_async()
        .await;

    let telegram = server
        .mock("POST", "/bot123:abc/sendMessage")
        .match_body(Matcher::PartialJson(json!({
            "chat_id": "-10042",
            "parse_mode": "HTML"
        })))
        .with_status(200)
        .with_body(r#"{"ok": true}"#)
        .create_async()
        .await;

    let monitor = build_monitor(&server, StateStore::new(&path));
    let RunOutcome::Completed(summary) = monitor.run_at(NOW).await else {
        panic!("expected completed run");
    };

    catalog.assert_async().await;
    firmware.assert_async().await;
    telegram.assert_async().await;

    assert!(summary.notified);
    assert!(summary.report.contains("iOS 17.1"));
    assert!(!summary.report.contains("iOS 17.0"));
    assert!(!summary.report.contains("abc"));

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, json!({"iPhone15,2": ["17.0", "17.1"]}));
}

#[tokio::test]
async fn catalog_failure_leaves_everything_untouched() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("last_notified.json");
    let original = r#"{"iPhone15,2": ["17.0"]}"#;
    fs::write(&path, original).unwrap();

    let catalog = server
        .mock("GET", "/devices.json")
        .with_status(502)
        .create_async()
        .await;
    let firmware = server
        .mock("GET", Matcher::Regex("^/v4/device/".to_string()))
        .expect(0)
        .create_async()
        .await;
    let telegram = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let monitor = build_monitor(&server, StateStore::new(&path));
    let outcome = monitor.run_at(NOW).await;

    catalog.assert_async().await;
    firmware.assert_async().await;
    telegram.assert_async().await;

    assert!(matches!(outcome, RunOutcome::Aborted(_)));
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[tokio::test]
async fn rejected_notification_still_saves_state() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("last_notified.json");

    server
        .mock("GET", "/devices.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"identifier": "iPhone14,2", "name": "iPhone 13 Pro"}]"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v4/device/iPhone14,2")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"firmwares": [{"version": "18.6.2", "signed": true}]}"#)
        .create_async()
        .await;
    let telegram = server
        .mock("POST", "/bot123:abc/sendMessage")
        .with_status(401)
        .with_body(r#"{"ok": false, "description": "Unauthorized"}"#)
        .create_async()
        .await;

    let monitor = build_monitor(&server, StateStore::new(&path));
    let RunOutcome::Completed(summary) = monitor.run_at(NOW).await else {
        panic!("expected completed run");
    };

    telegram.assert_async().await;
    assert!(!summary.notified);
    assert!(summary.saved);
    assert_eq!(
        StateStore::new(&path).load().unwrap().versions("iPhone14,2").len(),
        1
    );
}
