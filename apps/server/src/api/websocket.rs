//! WebSocket 连接处理
//!
//! `/ws` 上的每个连接独立运行一个读-处理-回写循环，所有连接共用同一个设备会话。

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use super::AppState;
use super::stream::process_frame;

/// WebSocket 升级
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = state.register_connection();
    let (mut sender, mut receiver) = socket.split();

    tracing::info!("WebSocket client connected");

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("WebSocket binary frame is not UTF-8: {}", e);
                    break;
                },
            },
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                tracing::info!("WebSocket client requested close");
                break;
            },
            Err(e) => {
                tracing::warn!("WebSocket read error: {}", e);
                break;
            },
        };

        let event = match process_frame(&state, &text).await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("WebSocket frame rejected, closing: {}", e);
                break;
            },
        };

        if event.is_error() {
            tracing::debug!("WebSocket error event: {:?}", event.message);
        }

        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize WebSocket event: {}", e);
                continue;
            },
        };
        if let Err(e) = sender.send(Message::Text(json)).await {
            tracing::warn!("WebSocket write error: {}", e);
            break;
        }
    }

    tracing::info!("WebSocket client disconnected");
}
