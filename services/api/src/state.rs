//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the record stores,
//! the robot connection registry and everything else the handlers share.

use crate::config::Config;
use anyhow::Context;
use garlic_core::{
    motions::seed_builtin_moves,
    registry::ConnectionRegistry,
    resolver::{InstructionSource, Resolver},
    session::SessionStore,
    store::{ActionStore, AudioStore, ImageStore, MoveStore},
    uploads::UploadDir,
};
use std::sync::Arc;
use tracing::info;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub moves: Arc<MoveStore>,
    pub audio: Arc<AudioStore>,
    pub images: Arc<ImageStore>,
    pub actions: Arc<ActionStore>,
    pub sessions: Arc<SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub resolver: Resolver,
    pub uploads: UploadDir,
    pub config: Arc<Config>,
}

impl AppState {
    /// Opens every store under the configured data directory and seeds the
    /// move store from the motion library on first start.
    pub async fn load(config: Config) -> anyhow::Result<Self> {
        let moves = Arc::new(
            MoveStore::load(config.store_path("moves.json"))
                .await
                .context("Failed to load moves")?,
        );
        let audio = Arc::new(
            AudioStore::load(config.store_path("audio.json"))
                .await
                .context("Failed to load audio")?,
        );
        let images = Arc::new(
            ImageStore::load(config.store_path("images.json"))
                .await
                .context("Failed to load images")?,
        );
        let actions = Arc::new(
            ActionStore::load(config.store_path("actions.json"))
                .await
                .context("Failed to load actions")?,
        );
        let sessions = Arc::new(
            SessionStore::load(config.store_path("sessions.json"))
                .await
                .context("Failed to load sessions")?,
        );

        seed_builtin_moves(&moves, &config.moves_dir)
            .await
            .context("Failed to seed built-in motions")?;

        let uploads = UploadDir::open(&config.uploads_dir)
            .await
            .with_context(|| format!("Failed to open {}", config.uploads_dir.display()))?;

        // Lookup order for `send_command`.
        let resolver = Resolver::new(vec![
            sessions.clone() as Arc<dyn InstructionSource>,
            moves.clone(),
            actions.clone(),
            audio.clone(),
            images.clone(),
        ]);

        let counts = (
            moves.len().await,
            audio.len().await,
            images.len().await,
            actions.len().await,
            sessions.len().await,
        );
        info!(
            moves = counts.0,
            audio = counts.1,
            images = counts.2,
            actions = counts.3,
            sessions = counts.4,
            "Stores loaded"
        );

        Ok(Self {
            moves,
            audio,
            images,
            actions,
            sessions,
            registry: Arc::new(ConnectionRegistry::new()),
            resolver,
            uploads,
            config: Arc::new(config),
        })
    }
}
