//! WebSocket endpoint at `/ws`.
//!
//! Every text or binary frame a client sends is written back unchanged.
//! Pings are answered by the protocol layer.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
pub async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(echo)
}

/// Echo frames until the client closes the connection.
async fn echo(socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    debug!("websocket client connected");

    while let Some(msg_result) = receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "websocket receive error");
                break;
            }
        };

        let reply = match msg {
            Message::Text(text) => Message::Text(text),
            Message::Binary(data) => Message::Binary(data),
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        if sender.send(reply).await.is_err() {
            break;
        }
    }
    debug!("websocket client disconnected");
}
