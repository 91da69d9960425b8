use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;

use super::*;
use crate::services::session::Registration;
use crate::services::status::SessionStatus;
use crate::state::test_helpers::{spawn_app, test_app_state};

type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_json(ws: &mut Client) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for status")
        .expect("stream ended")
        .expect("ws error");
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

async fn connect(addr: std::net::SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/auth/status/ws"))
        .await
        .unwrap();
    ws
}

#[test]
fn snapshot_json_shape() {
    let idle = StatusSnapshot { status: SessionStatus::Idle, seq: 0 };
    let v: Value = serde_json::from_str(&snapshot_json(&idle).unwrap()).unwrap();
    assert_eq!(v["state"], "idle");
    assert_eq!(v["seq"], 0);
    assert!(v.get("message").is_none());

    let err = StatusSnapshot { status: SessionStatus::Error("Invalid login credentials".into()), seq: 4 };
    let v: Value = serde_json::from_str(&snapshot_json(&err).unwrap()).unwrap();
    assert_eq!(v["state"], "error");
    assert_eq!(v["message"], "Invalid login credentials");
    assert_eq!(v["seq"], 4);
}

#[tokio::test]
async fn status_route_reports_current_snapshot() {
    let (state, h) = test_app_state();
    h.service.reset();
    let Json(snapshot) = current(State(state)).await;
    assert_eq!(snapshot, StatusSnapshot { status: SessionStatus::Idle, seq: 1 });
}

#[tokio::test]
async fn reset_route_returns_idle_over_http() {
    let (state, h) = test_app_state();
    let addr = spawn_app(state).await;

    let _ = h.service.authenticate("nobody@example.com", "pw").await;
    assert!(matches!(h.service.status().status, SessionStatus::Error(_)));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/auth/status/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "idle");
    assert_eq!(body["seq"], 2);
}

#[tokio::test]
async fn healthz_is_ok() {
    let (state, _h) = test_app_state();
    let addr = spawn_app(state).await;
    let resp = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn ws_sends_current_snapshot_then_changes() {
    let (state, h) = test_app_state();
    let addr = spawn_app(state).await;
    let mut ws = connect(addr).await;

    let first = next_json(&mut ws).await;
    assert_eq!(first["state"], "idle");
    assert_eq!(first["seq"], 0);

    h.service.reset();
    let second = next_json(&mut ws).await;
    assert_eq!(second["state"], "idle");
    assert_eq!(second["seq"], 1);
}

#[tokio::test]
async fn ws_reports_register_outcome() {
    let (state, h) = test_app_state();
    let addr = spawn_app(state).await;
    let mut ws = connect(addr).await;
    assert_eq!(next_json(&mut ws).await["state"], "idle");

    let registration = Registration {
        firstname: "Ada".into(),
        lastname: "Lovelace".into(),
        email: "ada@example.com".into(),
        password: "hunter22".into(),
        phonenumber: String::new(),
    };
    h.service.register(registration).await.unwrap();

    // Loading may be coalesced away; the terminal snapshot always arrives.
    let mut last = next_json(&mut ws).await;
    while last["state"] == "loading" {
        last = next_json(&mut ws).await;
    }
    assert_eq!(last["state"], "success");
    assert_eq!(last["message"], "Account created successfully!");
}
