use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use installd::broadcast::{Frame, FrameSink, SinkError};
use installd::types::StreamTag;

#[derive(Debug, Default)]
struct HandleState {
    frames: Vec<Frame>,
    fail_with: Option<SinkError>,
    fail_after: Option<usize>,
    dropped: bool,
}

/// Test-side view of a [`RecordingSink`] that has been handed to the
/// registry.
#[derive(Debug, Clone, Default)]
pub struct SinkHandle {
    state: Arc<Mutex<HandleState>>,
}

impl SinkHandle {
    pub fn frames(&self) -> Vec<Frame> {
        self.state.lock().unwrap().frames.clone()
    }

    /// Every `cmdOutput` byte received, concatenated.
    pub fn output(&self) -> Bytes {
        let state = self.state.lock().unwrap();
        let mut out = BytesMut::new();
        for frame in state.frames.iter().filter(|f| f.tag == StreamTag::CmdOutput) {
            out.extend_from_slice(&frame.data);
        }
        out.freeze()
    }

    pub fn progress_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .frames
            .iter()
            .filter(|f| f.tag == StreamTag::Progress)
            .map(|f| String::from_utf8_lossy(&f.data).into_owned())
            .collect()
    }

    /// Frames in arrival order, with back-to-back `cmdOutput` frames joined
    /// so chunking by the pipe does not matter.
    pub fn timeline(&self) -> Vec<(StreamTag, String)> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<(StreamTag, String)> = Vec::new();
        for frame in state.frames.iter() {
            let text = String::from_utf8_lossy(&frame.data);
            if frame.tag == StreamTag::CmdOutput {
                if let Some((StreamTag::CmdOutput, joined)) = entries.last_mut() {
                    joined.push_str(&text);
                    continue;
                }
            }
            entries.push((frame.tag, text.into_owned()));
        }
        entries
    }

    /// Make every following write fail with `err`.
    pub fn fail_with(&self, err: SinkError) {
        self.state.lock().unwrap().fail_with = Some(err);
    }

    /// Accept `n` more writes, then fail with `SinkError::Closed`.
    pub fn fail_after(&self, n: usize) {
        let mut state = self.state.lock().unwrap();
        let recorded = state.frames.len();
        state.fail_after = Some(recorded + n);
    }

    /// True once the registry has dropped the sink.
    pub fn is_dropped(&self) -> bool {
        self.state.lock().unwrap().dropped
    }
}

/// A `FrameSink` that records every frame it accepts.
#[derive(Debug)]
pub struct RecordingSink {
    handle: SinkHandle,
}

impl RecordingSink {
    pub fn new() -> (Self, SinkHandle) {
        let handle = SinkHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }

    pub fn boxed() -> (Box<dyn FrameSink>, SinkHandle) {
        let (sink, handle) = Self::new();
        (Box::new(sink), handle)
    }
}

impl FrameSink for RecordingSink {
    fn try_write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        let mut state = self.handle.state.lock().unwrap();
        if let Some(err) = state.fail_with.clone() {
            return Err(err);
        }
        if state.fail_after.is_some_and(|limit| state.frames.len() >= limit) {
            return Err(SinkError::Closed);
        }
        state.frames.push(frame.clone());
        Ok(())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.handle.state.lock() {
            state.dropped = true;
        }
    }
}
