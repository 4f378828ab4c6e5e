//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the record API, the robot endpoints, static media and the
//! OpenAPI documentation.

use crate::{
    handlers::{self, Resource},
    models::{
        ErrorResponse, MessageResponse, SendCommandPayload, StatusResponse, UploadForm,
        UploadResponse,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{MethodRouter, delete, get, post},
};
use garlic_core::{
    instruction::{Action, Move, Say, ShowImage},
    session::Session,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Largest accepted upload.
const UPLOAD_LIMIT: usize = 64 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::robot_status,
        handlers::send_command,
        handlers::upload_audio,
        handlers::upload_image,
        handlers::upload_move,
    ),
    components(
        schemas(SendCommandPayload, StatusResponse, MessageResponse, UploadForm, UploadResponse, ErrorResponse)
    ),
    tags(
        (name = "Garlic API", description = "Composing and sending robot actions")
    )
)]
pub struct ApiDoc;

fn collection<T: Resource>() -> MethodRouter<Arc<AppState>> {
    get(handlers::list_records::<T>).post(handlers::create_record::<T>)
}

fn member<T: Resource>() -> MethodRouter<Arc<AppState>> {
    get(handlers::get_record::<T>)
        .put(handlers::update_record::<T>)
        .delete(handlers::delete_record::<T>)
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let data_dir = app_state.config.data_dir.clone();
    let assets_dir = app_state.config.assets_dir.clone();

    let api_router = Router::new()
        .route("/pepper/initiate", get(ws_handler))
        .route("/pepper/status", get(handlers::robot_status))
        .route("/pepper/send_command", post(handlers::send_command))
        .route("/api/moves/", collection::<Move>())
        .route("/api/moves/{id}", member::<Move>())
        .route("/api/audio/", collection::<Say>())
        .route("/api/audio/{id}", member::<Say>())
        .route("/api/images/", collection::<ShowImage>())
        .route("/api/images/{id}", member::<ShowImage>())
        .route("/api/actions/", collection::<Action>())
        .route("/api/actions/{id}", member::<Action>())
        .route("/api/sessions/", collection::<Session>())
        .route("/api/sessions/{id}", member::<Session>())
        .route(
            "/api/sessions/actions/{id}",
            delete(handlers::delete_session_action),
        )
        .route("/api/move_groups/", get(handlers::list_groups::<Move>))
        .route("/api/audio_groups/", get(handlers::list_groups::<Say>))
        .route("/api/image_groups/", get(handlers::list_groups::<ShowImage>))
        .route("/api/action_groups/", get(handlers::list_groups::<Action>))
        .route("/api/upload/audio", post(handlers::upload_audio))
        .route("/api/upload/image", post(handlers::upload_image))
        .route("/api/upload/move", post(handlers::upload_move))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Stateless routes: docs and static files.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest_service("/data", ServeDir::new(data_dir))
        .merge(api_router)
        .fallback_service(ServeDir::new(assets_dir))
}
