//! Request and response bodies of the HTTP API.
//!
//! Records travel in the JSON layout of the store files; these types only
//! wrap them (`{"data": ...}`) or describe the control endpoints.

use garlic_core::registry::ConnectionStatus;
use serde::{Deserialize, Serialize};
use std::path::Path;
use utoipa::ToSchema;
use uuid::Uuid;

/// Envelope of every read endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Result of a write: what happened and to which record.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub id: Option<Uuid>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>, id: Uuid) -> Self {
        Self {
            message: message.into(),
            id: Some(id),
        }
    }
}

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct SendCommandPayload {
    /// Identifier of a move, action, audio clip, image, or of an action
    /// (or one of its items) inside a session.
    #[schema(value_type = String, format = Uuid)]
    pub item_id: Uuid,
}

#[derive(Serialize, ToSchema, Debug, Clone, Copy, PartialEq)]
pub struct StatusResponse {
    #[schema(value_type = String, example = "connected")]
    pub status: ConnectionStatus,
}

/// Multipart body of the upload endpoints. Only documents the form.
#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file_content: Vec<u8>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct UploadResponse {
    pub message: String,
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    /// Path of the stored file, to be put into a record's `FilePath`.
    pub filepath: String,
}

impl UploadResponse {
    pub fn new(id: Uuid, path: &Path) -> Self {
        Self {
            message: "file has been uploaded successfully".to_string(),
            id,
            filepath: path.to_string_lossy().into_owned(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_response_serialization() {
        let id = Uuid::nil();
        let with_id = MessageResponse::new("move has been created", id);
        assert_eq!(
            serde_json::to_value(&with_id).unwrap(),
            json!({"message": "move has been created", "id": "00000000-0000-0000-0000-000000000000"})
        );

        let without_id = MessageResponse {
            message: "ok".to_string(),
            id: None,
        };
        assert_eq!(serde_json::to_value(&without_id).unwrap(), json!({"message": "ok"}));
    }

    #[test]
    fn test_status_response_serialization() {
        let response = StatusResponse {
            status: ConnectionStatus::Disconnected,
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"status": "disconnected"})
        );
    }

    #[test]
    fn test_send_command_payload_deserialization() {
        let payload: SendCommandPayload =
            serde_json::from_str(r#"{"item_id": "6f1c1f5e-53a4-4a35-8c54-2a1f3e8d2f10"}"#).unwrap();
        assert_eq!(
            payload.item_id.to_string(),
            "6f1c1f5e-53a4-4a35-8c54-2a1f3e8d2f10"
        );

        assert!(serde_json::from_str::<SendCommandPayload>(r#"{"item_id": "42"}"#).is_err());
    }

    #[test]
    fn test_data_response_wraps_payload() {
        let response = DataResponse::new(vec!["Default", "Remote"]);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"data": ["Default", "Remote"]})
        );
    }

    #[test]
    fn test_upload_response_serialization() {
        let id = Uuid::new_v4();
        let response = UploadResponse::new(id, Path::new("data/uploads/a.mp3"));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["filepath"], "data/uploads/a.mp3");
        assert_eq!(value["id"], id.to_string());
    }
}
