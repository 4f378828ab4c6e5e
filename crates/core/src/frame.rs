//! JSON frames exchanged with the robot over the WebSocket.

use crate::instruction::Command;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// One outbound unit written to the robot connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub command: Command,
    /// Base64 of the payload bytes.
    pub content: String,
    pub name: String,
    /// Delay before execution, in milliseconds.
    pub delay: i64,
}

impl Frame {
    pub fn new(command: Command, payload: &[u8], name: impl Into<String>, delay: i64) -> Self {
        debug_assert!(command != Command::Action, "actions are decomposed before sending");
        Self {
            command,
            content: STANDARD.encode(payload),
            name: name.into(),
            delay,
        }
    }

    /// Decodes the base64 content back into bytes.
    pub fn payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.content)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Sent by the robot after connecting: names of the motions it ships with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DiscoveryFrame {
    #[serde(default)]
    pub moves: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wire_format() {
        let frame = Frame::new(Command::Move, b"abc", "wave", 2000);
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "command": "move",
                "content": "YWJj",
                "name": "wave",
                "delay": 2000
            })
        );
    }

    #[test]
    fn test_empty_payload_encodes_to_empty_string() {
        let frame = Frame::new(Command::Say, &[], "", 0);
        assert_eq!(frame.content, "");
        assert!(frame.payload().unwrap().is_empty());
    }

    #[test]
    fn test_discovery_frame() {
        let frame: DiscoveryFrame =
            serde_json::from_str(r#"{"moves": ["animations/Stand/Gestures/Hey_1", "bow"]}"#).unwrap();
        assert_eq!(frame.moves.len(), 2);

        let other: DiscoveryFrame = serde_json::from_str(r#"{"battery": 80}"#).unwrap();
        assert!(other.moves.is_empty());
    }
}
