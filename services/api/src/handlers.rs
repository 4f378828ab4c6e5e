//! Axum Handlers for the REST API
//!
//! Record CRUD is generic over [`Resource`], one instantiation per store.
//! The robot control and upload endpoints carry `utoipa` doc comments for
//! the OpenAPI document.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use garlic_core::{
    DeliveryError, ResolveError, StoreError, deliver,
    instruction::{Action, Move, Say, ShowImage},
    motions::MOTION_EXTENSION,
    session::Session,
    store::{Record, Store},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        DataResponse, ErrorResponse, MessageResponse, SendCommandPayload, StatusResponse,
        UploadForm, UploadResponse,
    },
    state::AppState,
};

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file_content";

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl ApiError {
    /// Maps well-known core errors to their status; anything else is a 500.
    fn classify(err: anyhow::Error) -> Self {
        if let Some(store_err) = err.downcast_ref::<StoreError>() {
            match store_err {
                StoreError::NotFound { .. } => return Self::NotFound(store_err.to_string()),
                StoreError::Validation { .. } => return Self::BadRequest(store_err.to_string()),
                _ => {}
            }
        }
        if let Some(ResolveError::NotFound(_)) = err.downcast_ref::<ResolveError>() {
            return Self::NotFound(err.to_string());
        }
        Self::InternalServerError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                warn!(%message, "Bad request");
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = format!("{err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::classify(err.into())
    }
}

/// A record kind served under `/api/<path>/`.
pub trait Resource: Record {
    fn store(state: &AppState) -> &Store<Self>;
}

impl Resource for Move {
    fn store(state: &AppState) -> &Store<Self> {
        &state.moves
    }
}

impl Resource for Say {
    fn store(state: &AppState) -> &Store<Self> {
        &state.audio
    }
}

impl Resource for ShowImage {
    fn store(state: &AppState) -> &Store<Self> {
        &state.images
    }
}

impl Resource for Action {
    fn store(state: &AppState) -> &Store<Self> {
        &state.actions
    }
}

impl Resource for Session {
    fn store(state: &AppState) -> &Store<Self> {
        &state.sessions
    }
}

pub async fn list_records<T: Resource>(
    State(state): State<Arc<AppState>>,
) -> Json<DataResponse<Vec<T>>> {
    Json(DataResponse::new(T::store(&state).list().await))
}

pub async fn get_record<T: Resource>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<T>>, ApiError> {
    let record = T::store(&state).get(id).await?;
    Ok(Json(DataResponse::new(record)))
}

pub async fn create_record<T: Resource>(
    State(state): State<Arc<AppState>>,
    Json(record): Json<T>,
) -> Result<impl IntoResponse, ApiError> {
    let id = T::store(&state).create(record).await?;
    info!(kind = T::KIND, %id, "Record created");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!("{} has been created", T::KIND), id)),
    ))
}

/// Replaces a record. The identifier in the path wins over the body's.
pub async fn update_record<T: Resource>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(mut record): Json<T>,
) -> Result<Json<MessageResponse>, ApiError> {
    record.set_id(id);
    T::store(&state).update(record).await?;
    Ok(Json(MessageResponse::new(
        format!("{} has been updated", T::KIND),
        id,
    )))
}

pub async fn delete_record<T: Resource>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    T::store(&state).delete(id).await?;
    info!(kind = T::KIND, %id, "Record deleted");
    Ok(Json(MessageResponse::new(
        format!("{} has been deleted", T::KIND),
        id,
    )))
}

/// Drops one action from the session that holds it.
pub async fn delete_session_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.sessions.delete_action(id).await?;
    info!(%id, "Session action deleted");
    Ok(Json(MessageResponse::new("action has been deleted", id)))
}

pub async fn list_groups<T: Resource>(
    State(state): State<Arc<AppState>>,
) -> Json<DataResponse<Vec<String>>> {
    Json(DataResponse::new(T::store(&state).groups().await))
}

/// Report whether the robot is connected.
#[utoipa::path(
    get,
    path = "/pepper/status",
    responses(
        (status = 200, description = "Connection status", body = StatusResponse)
    )
)]
pub async fn robot_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.registry.status().await,
    })
}

/// Resolve a stored item and send it to the robot.
#[utoipa::path(
    post,
    path = "/pepper/send_command",
    request_body = SendCommandPayload,
    responses(
        (status = 200, description = "Instruction delivered", body = MessageResponse),
        (status = 400, description = "The item cannot be sent", body = ErrorResponse),
        (status = 404, description = "No item with this ID", body = ErrorResponse),
        (status = 500, description = "Robot not connected or write failed", body = ErrorResponse)
    )
)]
pub async fn send_command(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendCommandPayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = payload.item_id;
    let instruction = state.resolver.resolve(id).await?;
    if instruction.is_nil() {
        return Err(ApiError::BadRequest(format!("item {id} is empty")));
    }
    if !instruction.is_valid() {
        return Err(ApiError::BadRequest(format!("item {id} is not valid")));
    }

    let frames = deliver(&instruction, &state.registry)
        .await
        .map_err(|e| match e {
            DeliveryError::Ambiguous(_) => ApiError::BadRequest(e.to_string()),
            other => ApiError::InternalServerError(other.into()),
        })?;
    info!(%id, command = %instruction.command(), frames, "Command sent");

    Ok(Json(MessageResponse::new("command has been sent", id)))
}

/// Upload an audio file.
#[utoipa::path(
    post,
    path = "/api/upload/audio",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file in the request", body = ErrorResponse)
    )
)]
pub async fn upload_audio(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    save_upload(&state, multipart, None).await
}

/// Upload an image.
#[utoipa::path(
    post,
    path = "/api/upload/image",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file in the request", body = ErrorResponse)
    )
)]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    save_upload(&state, multipart, None).await
}

/// Upload a motion file (`.qianim`).
#[utoipa::path(
    post,
    path = "/api/upload/move",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file, or not a motion file", body = ErrorResponse)
    )
)]
pub async fn upload_move(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    save_upload(&state, multipart, Some(MOTION_EXTENSION)).await
}

async fn save_upload(
    state: &AppState,
    mut multipart: Multipart,
    required_extension: Option<&str>,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if let Some(required) = required_extension {
            let extension = std::path::Path::new(&file_name)
                .extension()
                .and_then(|ext| ext.to_str());
            if extension != Some(required) {
                return Err(ApiError::BadRequest(format!(
                    "expected a .{required} file, got '{file_name}'"
                )));
            }
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let (id, path) = state.uploads.save(&file_name, &bytes).await?;
        return Ok(Json(UploadResponse::new(id, &path)));
    }

    Err(ApiError::BadRequest(format!(
        "multipart field '{UPLOAD_FIELD}' is missing"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn status_and_message(err: ApiError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, value["message"].as_str().unwrap_or_default().to_string())
    }

    #[tokio::test]
    async fn test_store_errors_map_to_status_codes() {
        let not_found = ApiError::from(StoreError::NotFound {
            kind: "move",
            key: "42".to_string(),
        });
        assert_eq!(
            status_and_message(not_found).await,
            (StatusCode::NOT_FOUND, "move '42' not found".to_string())
        );

        let invalid = ApiError::from(StoreError::Validation {
            kind: "audio",
            reason: "required fields are missing".to_string(),
        });
        assert_eq!(status_and_message(invalid).await.0, StatusCode::BAD_REQUEST);

        let duplicate = ApiError::from(StoreError::AlreadyExists {
            kind: "move",
            key: "wave".to_string(),
        });
        let (status, message) = status_and_message(duplicate).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "move 'wave' already exists");
    }

    #[tokio::test]
    async fn test_resolve_and_delivery_errors() {
        let unknown = ApiError::from(ResolveError::NotFound(Uuid::nil()));
        assert_eq!(status_and_message(unknown).await.0, StatusCode::NOT_FOUND);

        let offline = ApiError::from(DeliveryError::ConnectionUnavailable);
        let (status, message) = status_and_message(offline).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(message.contains("no robot connection"));
    }
}
