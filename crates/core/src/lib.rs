//! relay-core: Wire protocol for the relay message broker
//!
//! This crate provides:
//! - The framed wire codec (5-byte header, JSON bodies)
//! - Protocol body types shared by the daemon, broker, and client

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod message;
pub mod wire;

// Re-exports
pub use message::{Ack, Publish, Record, Subscribe};
pub use wire::{
    read_frame, write_frame, Frame, FrameError, KIND_ACK, KIND_ERROR, KIND_MESSAGE, KIND_PUBLISH,
    KIND_SUBSCRIBE, MAX_BODY_LEN,
};
