//! Robot WebSocket Connection
//!
//! The robot opens a WebSocket to `/pepper/initiate` and keeps it for the
//! whole run. Outbound frames go through the connection registry; the read
//! loop here only watches for motion discovery and for the socket closing.

pub mod session;

pub use session::ws_handler;
