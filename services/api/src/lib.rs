//! Garlic API Library Crate
//!
//! This library contains the web service around `garlic-core`: configuration,
//! the application state, the HTTP handlers, the robot WebSocket and the
//! routing. The `garlic` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
