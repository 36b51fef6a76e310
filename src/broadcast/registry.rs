// src/broadcast/registry.rs

//! Fan-out registry: the single write path for everything subscribers see.
//!
//! All three mutations (publish with remove-on-failure, registration with
//! replay, remove-all on termination) go through one mutex, which gives:
//! - emission order per subscriber, since chunks are handed out one at a time;
//! - no gap or duplicate between replay and live tail, since a subscriber is
//!   replayed and inserted while appends are excluded.
//!
//! Sinks never block (see [`FrameSink`]), so holding a `std::sync::Mutex`
//! across the writes is fine.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Frame, FrameSink, OutputBuffer};
use crate::types::StreamTag;

/// Unique identity of one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle returned to whoever registered a sink.
///
/// The owner keeps its connection open until [`Subscription::closed`]
/// resolves; that happens once the registry has dropped the sink, either
/// because a write failed, because the run ended, or because the owner
/// called [`OutputRegistry::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    closed: oneshot::Receiver<SubscriberId>,
    // Set once the signal has been consumed; the receiver must not be
    // polled again after that.
    released: bool,
}

impl Subscription {
    fn new(id: SubscriberId, closed: oneshot::Receiver<SubscriberId>) -> Self {
        Self {
            id,
            closed,
            released: false,
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Non-blocking check of the release signal.
    pub fn is_closed(&mut self) -> bool {
        if !self.released {
            self.released = !matches!(self.closed.try_recv(), Err(TryRecvError::Empty));
        }
        self.released
    }

    /// Wait until the registry has released this subscriber. Returns at once
    /// if [`Subscription::is_closed`] already saw the release.
    pub async fn closed(self) -> SubscriberId {
        if self.released {
            return self.id;
        }
        let id = self.id;
        self.closed.await.unwrap_or(id)
    }
}

struct Subscriber {
    sink: Box<dyn FrameSink>,
    done: oneshot::Sender<SubscriberId>,
}

#[derive(Default)]
struct RegistryInner {
    buffer: OutputBuffer,
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl RegistryInner {
    /// Drop the sink first so its queue drains to end-of-stream, then fire
    /// the release signal.
    fn release(&mut self, id: &SubscriberId) -> bool {
        match self.subscribers.remove(id) {
            Some(Subscriber { sink, done }) => {
                drop(sink);
                let _ = done.send(id.clone());
                true
            }
            None => false,
        }
    }
}

/// Output buffer plus the set of live subscribers.
#[derive(Default)]
pub struct OutputRegistry {
    inner: Mutex<RegistryInner>,
}

impl fmt::Debug for OutputRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("OutputRegistry")
            .field("buffered", &inner.buffer.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record (for `CmdOutput`) and fan out one frame.
    ///
    /// Subscribers whose write fails are removed before this returns; other
    /// subscribers are unaffected.
    pub fn publish(&self, frame: Frame) {
        if frame.data.is_empty() {
            return;
        }

        let mut inner = self.lock();
        if frame.tag == StreamTag::CmdOutput {
            inner.buffer.append(&frame.data);
        }

        let failed: Vec<_> = inner
            .subscribers
            .iter_mut()
            .filter_map(|(id, sub)| sub.sink.try_write(&frame).err().map(|e| (id.clone(), e)))
            .collect();

        for (id, err) in failed {
            warn!(subscriber = %id, tag = %frame.tag, error = %err, "failed to write to subscriber, closing");
            inner.release(&id);
        }
    }

    pub fn publish_output(&self, chunk: impl Into<Bytes>) {
        self.publish(Frame::output(chunk));
    }

    pub fn publish_progress(&self, line: impl Into<String>) {
        self.publish(Frame::progress(line));
    }

    /// Register a sink: replay the buffered output into it, then add it to
    /// the live set.
    ///
    /// If the replay itself fails the sink is never registered and the
    /// returned subscription is already closed.
    pub fn subscribe(&self, mut sink: Box<dyn FrameSink>) -> Subscription {
        let id = SubscriberId::generate();
        let (done, closed) = oneshot::channel();

        let mut inner = self.lock();
        let replayed = inner.buffer.len();
        if let Err(err) = replay(&inner.buffer, sink.as_mut()) {
            warn!(subscriber = %id, error = %err, "failed to write existing buffer to the new subscriber");
            let _ = done.send(id.clone());
            return Subscription::new(id, closed);
        }

        inner
            .subscribers
            .insert(id.clone(), Subscriber { sink, done });
        debug!(
            subscriber = %id,
            replayed,
            subscribers = inner.subscribers.len(),
            "subscriber registered"
        );

        Subscription::new(id, closed)
    }

    /// Replay the buffered output and immediately end the stream.
    ///
    /// Used when the run has already finished: nothing more will be
    /// published for it, so the subscriber should not linger.
    pub fn replay_and_close(&self, mut sink: Box<dyn FrameSink>) -> Subscription {
        let id = SubscriberId::generate();
        let (done, closed) = oneshot::channel();

        let inner = self.lock();
        if let Err(err) = replay(&inner.buffer, sink.as_mut()) {
            warn!(subscriber = %id, error = %err, "failed to write existing buffer to the new subscriber");
        }
        drop(sink);
        let _ = done.send(id.clone());
        debug!(subscriber = %id, replayed = inner.buffer.len(), "run already finished; replayed and closed");

        Subscription::new(id, closed)
    }

    /// Release one subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        self.lock().release(id)
    }

    /// Release every subscriber (end of run). Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let mut inner = self.lock();
        let ids: Vec<_> = inner.subscribers.keys().cloned().collect();
        for id in &ids {
            inner.release(id);
        }
        if !ids.is_empty() {
            info!(closed = ids.len(), "closed all subscribers");
        }
        ids.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Copy of everything buffered so far.
    pub fn output(&self) -> Bytes {
        Bytes::copy_from_slice(self.lock().buffer.as_bytes())
    }

    pub fn output_len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn clear_output(&self) {
        self.lock().buffer.clear();
    }
}

fn replay(buffer: &OutputBuffer, sink: &mut dyn FrameSink) -> Result<(), super::SinkError> {
    if buffer.is_empty() {
        return Ok(());
    }
    sink.try_write(&Frame::output(Bytes::copy_from_slice(buffer.as_bytes())))
}
