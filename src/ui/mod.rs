//! HTTP/WebSocket bridge for presentation layers
//!
//! Observers read snapshots and issue start/stop/permission commands; they
//! never mutate monitor state directly.

pub mod handlers;
pub mod server;
pub mod websocket;

pub use server::{AppState, WebServer};
