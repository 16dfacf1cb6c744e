//! Wire encoding

pub mod sse;

pub use sse::{SseEvent, SseEventKind};
