//! Tracks the single active robot connection.
//!
//! The robot dials in, so the server never knows where to reach it until it
//! does. The registry keeps at most one [`Connection`]; registering a new one
//! replaces the previous. Frames are written through a [`FrameSink`], which
//! the transport layer implements on top of its socket.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Write half of a robot connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSink: Send {
    /// Writes one text message.
    async fn send_text(&mut self, text: String) -> anyhow::Result<()>;
}

pub type ConnectionId = u64;

/// A registered connection. Cloning shares the underlying sink.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    sink: Arc<Mutex<Box<dyn FrameSink>>>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Writes one serialized frame. The sink lock is held per message, so
    /// concurrent senders never interleave partial messages.
    pub async fn send_text(&self, text: String) -> anyhow::Result<()> {
        self.sink.lock().await.send_text(text).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    slot: RwLock<Option<Connection>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `sink` the active connection, replacing any previous one.
    pub async fn register(&self, sink: Box<dyn FrameSink>) -> Connection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let connection = Connection {
            id,
            sink: Arc::new(Mutex::new(sink)),
        };
        let previous = self.slot.write().await.replace(connection.clone());
        if let Some(previous) = previous {
            info!(replaced = previous.id, connection = id, "Robot connection replaced");
        } else {
            info!(connection = id, "Robot connected");
        }
        connection
    }

    /// Clears the slot if `id` is still the active connection. A connection
    /// that was already replaced leaves its successor untouched.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut slot = self.slot.write().await;
        if slot.as_ref().is_some_and(|c| c.id == id) {
            *slot = None;
            info!(connection = id, "Robot disconnected");
            true
        } else {
            debug!(connection = id, "Stale connection closed");
            false
        }
    }

    pub async fn active(&self) -> Option<Connection> {
        self.slot.read().await.clone()
    }

    pub async fn status(&self) -> ConnectionStatus {
        if self.slot.read().await.is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::instruction::Command;

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.status().await, ConnectionStatus::Disconnected);

        let connection = registry.register(Box::new(MockFrameSink::new())).await;
        assert_eq!(registry.status().await, ConnectionStatus::Connected);
        assert_eq!(registry.active().await.unwrap().id(), connection.id());

        assert!(registry.unregister(connection.id()).await);
        assert!(registry.active().await.is_none());
    }

    #[tokio::test]
    async fn test_stale_unregister_keeps_newer_connection() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(Box::new(MockFrameSink::new())).await;
        let second = registry.register(Box::new(MockFrameSink::new())).await;
        assert_ne!(first.id(), second.id());

        assert!(!registry.unregister(first.id()).await);
        assert_eq!(registry.active().await.unwrap().id(), second.id());
    }

    #[tokio::test]
    async fn test_send_text_reaches_sink() {
        let mut sink = MockFrameSink::new();
        sink.expect_send_text()
            .withf(|text| text.contains("\"command\":\"say\"") && text.contains("\"content\":\"aGk=\""))
            .times(1)
            .returning(|_| Ok(()));

        let registry = ConnectionRegistry::new();
        let connection = registry.register(Box::new(sink)).await;
        let frame = Frame::new(Command::Say, b"hi", "", 0);
        connection.send_text(frame.to_json().unwrap()).await.unwrap();
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Connected).unwrap(),
            "\"connected\""
        );
    }
}
