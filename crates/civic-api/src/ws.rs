//! WebSocket observer connections.
//!
//! Each socket becomes an [`Observer`] in the registry. Outbound messages go
//! through a bounded queue drained by a writer task, so a slow client applies
//! backpressure to its own sends only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use civic_notify::{Observer, ObserverId, SendError, SendResult};

use crate::metrics;
use crate::state::AppState;

const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Registry handle for one WebSocket connection.
pub struct WsObserver {
    id: ObserverId,
    tx: mpsc::Sender<Message>,
}

impl WsObserver {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: ObserverId::new(),
            tx,
        }
    }
}

#[async_trait]
impl Observer for WsObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    async fn send_text(&self, text: &str) -> SendResult<()> {
        self.tx
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|_| SendError::Closed)
    }
}

/// Observer WebSocket endpoint.
pub async fn ws_notifications(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    metrics::record_ws_connection();
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let observer = Arc::new(WsObserver::new(tx.clone()));
    let id = state.registry.add(observer).await;

    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if tx.send(Message::Ping(Vec::new())).await.is_err() {
                    debug!(observer_id = %id, "Heartbeat failed, client disconnected");
                    break;
                }
            }
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_ws_message_received();
                        if tx.send(Message::Text(format!("Echo: {}", text))).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(observer_id = %id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    state.registry.remove(id).await;
    drop(tx);
    send_task.abort();
}
