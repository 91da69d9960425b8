//! Session status routes: snapshot, reset, and a websocket feed.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send the current snapshot
//! 2. Every status change → send the new snapshot
//! 3. Client close, socket error, or service shutdown → stop

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::services::status::StatusSnapshot;
use crate::state::AppState;

/// `GET /api/auth/status` — current status and its sequence number.
pub async fn current(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.session.status())
}

/// `POST /api/auth/status/reset` — back to `Idle`, dropping in-flight outcomes.
pub async fn reset(State(state): State<AppState>) -> Response {
    state.session.reset();
    (StatusCode::OK, Json(state.session.status())).into_response()
}

/// `GET /api/auth/status/ws` — push every status change to the client.
pub async fn watch_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let rx = state.session.subscribe();
    ws.on_upgrade(move |socket| run_ws(socket, rx))
}

async fn run_ws(mut socket: WebSocket, mut rx: watch::Receiver<StatusSnapshot>) {
    let initial = rx.borrow_and_update().clone();
    if send_snapshot(&mut socket, &initial).await.is_err() {
        return;
    }
    info!(seq = initial.seq, "status ws: client connected");

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if send_snapshot(&mut socket, &snapshot).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    info!("status ws: client disconnected");
}

pub(crate) fn snapshot_json(snapshot: &StatusSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(snapshot)
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: &StatusSnapshot) -> Result<(), ()> {
    let json = snapshot_json(snapshot).map_err(|e| debug!(error = %e, "status serialize failed"))?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| debug!(error = %e, "status ws send failed"))
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
