//! Manages the lifecycle of the robot's WebSocket connection.

use crate::state::AppState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use garlic_core::{frame::DiscoveryFrame, registry::FrameSink};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Write half of the socket, handed to the registry.
struct WsFrameSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.0.send(Message::Text(text.into())).await?;
        Ok(())
    }
}

/// Registers the connection, reads until it closes, then unregisters it.
#[instrument(name = "robot_connection", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (socket_tx, socket_rx) = socket.split();
    let connection = state
        .registry
        .register(Box::new(WsFrameSink(socket_tx)))
        .await;
    tracing::Span::current().record("connection_id", connection.id());
    info!("New robot WebSocket connection.");

    if let Err(e) = run_read_loop(&state, socket_rx).await {
        error!(error = ?e, "Robot connection terminated with error.");
    }

    state.registry.unregister(connection.id()).await;
    info!("Robot WebSocket connection closed.");
}

async fn run_read_loop(state: &AppState, mut socket_rx: SplitStream<WebSocket>) -> Result<()> {
    while let Some(msg_result) = socket_rx.next().await {
        match msg_result.context("Error receiving from robot WebSocket")? {
            Message::Text(text) => handle_text(state, text.as_str()).await,
            Message::Binary(_) => warn!("Ignoring binary message from robot."),
            Message::Close(_) => {
                info!("Robot sent close frame.");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
    Ok(())
}

/// Records motions the robot advertises; anything else is logged and dropped.
async fn handle_text(state: &AppState, text: &str) {
    match serde_json::from_str::<DiscoveryFrame>(text) {
        Ok(frame) if !frame.moves.is_empty() => {
            match state.moves.add_remote_moves(&frame.moves).await {
                Ok(added) => info!(advertised = frame.moves.len(), added, "Robot motions discovered."),
                Err(e) => error!(error = %e, "Failed to record robot motions."),
            }
        }
        _ => debug!(%text, "Ignoring message from robot."),
    }
}
