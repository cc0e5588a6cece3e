//! WebSocket connection lifecycle: read/write loops and relay hand-off.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use sketch_relay_rooms::{ConnectionId, InboundEvent, RelayClosed};

use crate::state::GatewayState;

/// Handle a new WebSocket connection until the client goes away.
pub async fn handle_ws_connection(state: Arc<GatewayState>, ws: WebSocket) {
    let conn_id = ConnectionId::new();
    info!(%conn_id, "New client connected");

    let (mut ws_tx, mut ws_rx) = ws.split();

    // Outbound frames from the relay for this connection
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<String>();

    if state.relay.connect(conn_id, Arc::new(event_tx)).is_err() {
        error!(%conn_id, "Relay is not running, closing connection");
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }

    #[cfg(feature = "metrics")]
    crate::metrics::record_ws_connect();

    // Spawn event sender task
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = event_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Main read loop
    while let Some(msg_result) = ws_rx.next().await {
        let text = match msg_result {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    warn!(%conn_id, %e, "Discarding non-UTF-8 binary frame");
                    continue;
                }
            },
            Ok(Message::Close(_)) => {
                debug!(%conn_id, "Client requested close");
                break;
            }
            Ok(_) => {
                // Axum handles ping/pong automatically
                continue;
            }
            Err(e) => {
                warn!(%conn_id, %e, "WebSocket error");
                break;
            }
        };

        if handle_frame(&state, conn_id, &text).is_err() {
            error!(%conn_id, "Relay is not running, closing connection");
            break;
        }
    }

    // Cleanup
    if state.relay.disconnect(conn_id).is_err() {
        debug!(%conn_id, "Relay already stopped");
    }
    // Let the writer flush frames the relay already queued; it ends once the
    // relay drops this connection's sink.
    if tokio::time::timeout(std::time::Duration::from_secs(5), &mut send_task)
        .await
        .is_err()
    {
        debug!(%conn_id, "Writer did not finish in time");
        send_task.abort();
    }

    #[cfg(feature = "metrics")]
    crate::metrics::record_ws_disconnect();

    info!(%conn_id, "Client disconnected");
}

/// Decode one inbound frame and hand it to the relay.
///
/// Undecodable frames are logged and dropped; only a stopped relay is an error.
pub fn handle_frame(
    state: &GatewayState,
    conn_id: ConnectionId,
    text: &str,
) -> Result<(), RelayClosed> {
    match InboundEvent::parse(text) {
        Ok(event) => {
            #[cfg(feature = "metrics")]
            crate::metrics::record_event(event.label());
            state.relay.dispatch(conn_id, event)
        }
        Err(e) => {
            warn!(%conn_id, %e, "Error parsing message");
            #[cfg(feature = "metrics")]
            crate::metrics::record_rejected_frame(e.reason());
            Ok(())
        }
    }
}
