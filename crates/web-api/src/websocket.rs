use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use risk_agent_orchestrator::AgentHandle;
use tokio::sync::broadcast::error::RecvError;

/// Streams agent events to the client as JSON text frames.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(agent): State<AgentHandle>) -> Response {
    ws.on_upgrade(|socket| websocket_connection(socket, agent))
}

async fn websocket_connection(mut socket: WebSocket, agent: AgentHandle) {
    let mut events = agent.subscribe_events();

    // Current status first so a fresh client doesn't wait for the next tick.
    let snapshot = serde_json::to_string(&agent.status()).unwrap_or_default();
    if socket.send(Message::Text(snapshot)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket client lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed");
}
