//! Streaming log hub
//!
//! Tracks live log-viewer clients, fans log events out to them through
//! per-client filters, and evicts dead or stale clients on a heartbeat sweep.
//!
//! ```text
//!   broadcast(Log) ──► for each active client
//!                        filter? ── reject ──► filtered_out += 1
//!                          │ accept
//!                          ▼
//!                        mpsc::Sender<SseEvent>::try_send
//!                          │ full/closed ──► inactive (reaped by sweep)
//!                          ▼
//!                        ClientStream ──► axum Sse response
//! ```

pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod filter;
pub mod message;
pub mod store;

pub use client::ClientStream;
pub use config::HubConfig;
pub use control::{ControlErrorReason, ControlMessage, ControlResponse};
pub use error::HubError;
pub use filter::{ClientFilter, FilterInput, FilterSpec};
pub use message::{HubEvent, HubMessage, LogEvent};
pub use store::LogStreamHub;
