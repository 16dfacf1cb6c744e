//! SSE push server
//!
//! An axum front end that exposes the orchestrator and the log hub as
//! `text/event-stream` endpoints.

pub mod config;
pub mod listener;
mod routes;
pub mod sse_adapter;

pub use config::PushServerConfig;
pub use listener::PushServer;
pub use sse_adapter::SseAdapter;
