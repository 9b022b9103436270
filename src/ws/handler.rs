//! WebSocket endpoint: one connection, one lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::AppState;
use crate::relay::{ConnectionLifecycle, EventSink};

use super::types::{WsCommand, WsEvent};

/// Ping interval for keepalive.
const PING_INTERVAL_SECS: u64 = 30;

/// Fire-and-forget sender backing one connection's relays.
struct ConnectionSender {
    tx: mpsc::UnboundedSender<WsEvent>,
}

impl EventSink for ConnectionSender {
    fn emit(&self, event: &'static str, payload: Value) {
        // A closed connection drops the event; the lifecycle tears the
        // pumps down right after.
        let _ = self.tx.send(WsEvent::new(event, payload));
    }
}

/// WebSocket upgrade handler.
///
/// GET /ws
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!("connected: {conn_id}");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut event_rx) = mpsc::unbounded_channel();
    let sink = Arc::new(ConnectionSender { tx });

    let mut lifecycle =
        ConnectionLifecycle::connect(state.bus.clone(), state.probe.clone(), sink.clone());
    sink.emit("connected", Value::Null);

    // Drain relayed events and keepalives to the client.
    let send_task = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
        ping_interval.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!("failed to serialize event: {err}");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    let ping = serde_json::to_string(&WsEvent::new("ping", Value::Null))
                        .unwrap_or_default();
                    if sender.send(Message::Text(ping.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<WsCommand>(&text) {
                Ok(WsCommand::Auth { token }) => lifecycle.authenticate(&token).await,
                Ok(WsCommand::Logout) => lifecycle.logout(),
                Ok(WsCommand::Pong) => {}
                Err(err) => debug!("unparseable command from {conn_id}: {err}"),
            },
            Ok(Message::Close(_)) => {
                info!("closed by client: {conn_id}");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("socket error for {conn_id}: {err}");
                break;
            }
        }
    }

    lifecycle.disconnect();
    send_task.abort();
    info!("disconnected: {conn_id}");
}
