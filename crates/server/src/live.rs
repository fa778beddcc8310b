// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Live recompute streaming for dashboards.
//!
//! Every recompute event the engine publishes is forwarded to connected
//! WebSocket clients. Events only say which tanks and towers changed; clients
//! fetch the figures themselves over HTTP.
//!
//! # Protocol
//!
//! - A `connected` message carrying the current sequence is sent first
//! - Each published event follows as a `recompute` message, in sequence order
//! - A client that falls behind the channel gets one `resync` message and
//!   must refetch every figure it displays
//! - Messages from the client are ignored

use crate::AppState;
use axum::{
    extract::{
        State as AxumState, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use crudeline::{RecomputeEvent, RecomputationTrigger};
use futures::{SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

/// Messages sent to live clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    /// Connection confirmation (sent on initial connect).
    Connected {
        /// Server timestamp (ISO 8601).
        timestamp: String,
        /// Latest sequence published before the client subscribed.
        sequence: u64,
    },
    /// Some tanks or towers must be recomputed.
    Recompute {
        #[serde(flatten)]
        event: RecomputeEvent,
    },
    /// The client missed events and must refetch everything.
    Resync {
        /// Number of events dropped for this client.
        missed: u64,
    },
}

impl LiveMessage {
    fn connected(trigger: &RecomputationTrigger) -> Self {
        Self::Connected {
            timestamp: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Iso8601::DEFAULT)
                .unwrap_or_else(|_| String::from("unknown")),
            sequence: trigger.current_sequence(),
        }
    }
}

/// Waits for the next message for a live client.
///
/// Returns `None` once the trigger has been dropped.
pub async fn next_message(rx: &mut broadcast::Receiver<RecomputeEvent>) -> Option<LiveMessage> {
    match rx.recv().await {
        Ok(event) => Some(LiveMessage::Recompute { event }),
        Err(RecvError::Lagged(missed)) => {
            warn!(missed, "Live client lagged behind recompute events");
            Some(LiveMessage::Resync { missed })
        }
        Err(RecvError::Closed) => None,
    }
}

/// Handles WebSocket upgrade requests for live recompute streaming.
pub async fn live_events_handler(
    ws: WebSocketUpgrade,
    AxumState(app_state): AxumState<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Streams recompute events to one client until it disconnects.
async fn handle_socket(socket: WebSocket, app_state: AppState) {
    info!("Client connected to live event stream");

    let (mut sender, mut receiver) = socket.split();
    let trigger: &RecomputationTrigger = app_state.engine.trigger();
    let mut rx: broadcast::Receiver<RecomputeEvent> = trigger.subscribe();

    // Subscribed first, so the reported sequence is never ahead of the stream.
    let connected: LiveMessage = LiveMessage::connected(trigger);

    if let Ok(json) = serde_json::to_string(&connected)
        && sender.send(Message::Text(json.into())).await.is_err()
    {
        warn!("Failed to send connection confirmation");
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = next_message(&mut rx).await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(?e, "Failed to serialize live message");
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(_) | Message::Binary(_)) => {
                    warn!("Received unexpected message from client, ignoring");
                }
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Err(e) => {
                    error!(?e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            debug!("Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!("Receive task completed");
            send_task.abort();
        }
    }

    info!("Client disconnected from live event stream");
}
