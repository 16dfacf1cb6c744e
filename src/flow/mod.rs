//! Flow control primitives
//!
//! Each orchestrator connection owns one [`RingBuffer`] (bounded outbound
//! queue) and one [`TokenBucket`] (send rate). The hub reuses the bucket
//! to throttle control messages.

pub mod ring_buffer;
pub mod token_bucket;

pub use ring_buffer::{RingBuffer, RingBufferStats};
pub use token_bucket::TokenBucket;
