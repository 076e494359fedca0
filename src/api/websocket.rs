// SPDX-License-Identifier: GPL-3.0-only
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::api::handlers::ApiHandlers;
use crate::ui::StatusSnapshot;

/// Commands a UI client may send over the socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    Status,
    AcceptUpdate,
    DismissUpdate,
}

/// Everything the server pushes.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsEvent {
    Status(StatusSnapshot),
    Reply {
        success: bool,
        data: Option<serde_json::Value>,
        error: Option<String>,
    },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(handlers): State<Arc<ApiHandlers>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, handlers))
}

async fn handle_socket(socket: WebSocket, handlers: Arc<ApiHandlers>) {
    let (sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut send_task = tokio::spawn(async move {
        let mut sender = sender;
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sender.send(msg).await {
                error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    let mut push_task = tokio::spawn(push_snapshots(Arc::clone(&handlers), tx.clone()));

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = handle_command(&text, &handlers, &tx).await {
                        error!(error = %e, "Failed to handle WebSocket message");
                    }
                }
                Message::Close(_) => {
                    info!("WebSocket connection closed");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {}
        _ = (&mut recv_task) => {}
        _ = (&mut push_task) => {}
    };
    send_task.abort();
    recv_task.abort();
    push_task.abort();
}

fn encode(event: &WsEvent) -> anyhow::Result<Message> {
    Ok(Message::Text(serde_json::to_string(event)?))
}

/// Push a fresh snapshot whenever any state the UI renders changes, following
/// the current session across reloads.
async fn push_snapshots(handlers: Arc<ApiHandlers>, tx: mpsc::UnboundedSender<Message>) {
    let mut sessions = handlers.sessions();
    let mut permission = handlers.notifications().subscribe();

    loop {
        let current = sessions.borrow_and_update().clone();
        let Some(session) = current else {
            if sessions.changed().await.is_err() {
                return;
            }
            continue;
        };

        let mut prompt = session.update_notice().watch();
        let mut state = session.lifecycle().subscribe_state();
        let mut banner = session.banner();

        loop {
            let snapshot = StatusSnapshot::capture(&session, handlers.notifications());
            match encode(&WsEvent::Status(snapshot)) {
                Ok(msg) => {
                    if tx.send(msg).is_err() {
                        return;
                    }
                }
                Err(e) => error!(error = %e, "Failed to encode status snapshot"),
            }

            let same_session = tokio::select! {
                r = sessions.changed() => {
                    if r.is_err() {
                        return;
                    }
                    false
                }
                r = prompt.changed() => r.is_ok(),
                r = state.changed() => r.is_ok(),
                alive = banner.changed() => alive,
                r = permission.changed() => r.is_ok(),
            };
            if !same_session {
                debug!("Session replaced, following the new one");
                break;
            }
        }
    }
}

async fn handle_command(
    text: &str,
    handlers: &ApiHandlers,
    tx: &mpsc::UnboundedSender<Message>,
) -> anyhow::Result<()> {
    let command: WsCommand = match serde_json::from_str(text) {
        Ok(c) => c,
        Err(e) => {
            let reply = WsEvent::Reply {
                success: false,
                data: None,
                error: Some(format!("Invalid message format: {}", e)),
            };
            tx.send(encode(&reply)?)?;
            return Ok(());
        }
    };

    let result = match command {
        WsCommand::Status => handlers.snapshot().map(serde_json::to_value),
        WsCommand::AcceptUpdate => handlers
            .accept_update()
            .await
            .map(|json| serde_json::to_value(json.0.data)),
        WsCommand::DismissUpdate => handlers
            .dismiss_update()
            .await
            .map(|json| serde_json::to_value(json.0.data)),
    };

    let reply = match result {
        Ok(Ok(data)) => WsEvent::Reply {
            success: true,
            data: Some(data),
            error: None,
        },
        Ok(Err(e)) => WsEvent::Reply {
            success: false,
            data: None,
            error: Some(e.to_string()),
        },
        Err(status) => WsEvent::Reply {
            success: false,
            data: None,
            error: Some(status.to_string()),
        },
    };
    tx.send(encode(&reply)?)?;

    Ok(())
}
