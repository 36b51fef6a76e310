// src/broadcast/mod.rs

//! Live output broadcast.
//!
//! - [`frame`]: the tagged chunk type and its wire form.
//! - [`sink`]: the non-blocking `FrameSink` trait and the channel-backed
//!   implementation used by network subscribers.
//! - [`buffer`]: the append-only output buffer used for replay and download.
//! - [`registry`]: the fan-out registry tying buffer and subscribers together.

pub mod buffer;
pub mod frame;
pub mod registry;
pub mod sink;

pub use buffer::OutputBuffer;
pub use frame::Frame;
pub use registry::{OutputRegistry, SubscriberId, Subscription};
pub use sink::{ChannelSink, FrameSink, SinkError};
