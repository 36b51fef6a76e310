// src/broadcast/frame.rs

use std::borrow::Cow;

use bytes::Bytes;
use serde::Serialize;

use crate::types::StreamTag;

/// One unit of fan-out: a tagged chunk of bytes.
///
/// `data` is a `Bytes` so the same chunk can be handed to every subscriber
/// without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: StreamTag,
    pub data: Bytes,
}

#[derive(Serialize)]
struct WireFrame<'a> {
    tag: StreamTag,
    data: Cow<'a, str>,
}

impl Frame {
    pub fn new(tag: StreamTag, data: impl Into<Bytes>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    pub fn output(data: impl Into<Bytes>) -> Self {
        Self::new(StreamTag::CmdOutput, data)
    }

    pub fn progress(line: impl Into<String>) -> Self {
        Self::new(StreamTag::Progress, line.into())
    }

    /// Text form sent on the live connection:
    /// `{"tag":"cmdOutput","data":"..."}`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&WireFrame {
            tag: self.tag,
            data: String::from_utf8_lossy(&self.data),
        })
    }
}
