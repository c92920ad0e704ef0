//! Agentable - HTTP and WebSocket surface
//!
//! Exposes the server wiring so the binary and integration tests share it:
//! - `api`: REST endpoints (runs, history, health, docs)
//! - `websocket`: per-run event stream
//! - `server`: configuration, service wiring, run loop

#![forbid(unsafe_code)]

pub mod api;
pub mod server;
pub mod websocket;
