// src/broadcast/sink.rs

//! Subscriber sink abstraction.
//!
//! The registry only ever needs to hand a frame to a subscriber without
//! waiting. Production code uses [`ChannelSink`], which feeds a bounded
//! queue drained by the subscriber's own connection task; tests can plug in
//! a recording implementation instead.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::Frame;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("subscriber disconnected")]
    Closed,

    #[error("subscriber is lagging ({queued} frames queued)")]
    Lagging { queued: usize },
}

/// Non-blocking destination for frames.
///
/// `try_write` is called while the registry lock is held, so it must never
/// wait. Any error means the subscriber is dropped.
pub trait FrameSink: Send {
    fn try_write(&mut self, frame: &Frame) -> Result<(), SinkError>;
}

/// Sink backed by a bounded mpsc queue.
///
/// A full queue is reported as [`SinkError::Lagging`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx }
    }
}

impl FrameSink for ChannelSink {
    fn try_write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(SinkError::Closed),
            Err(TrySendError::Full(_)) => Err(SinkError::Lagging {
                queued: self.tx.max_capacity(),
            }),
        }
    }
}
