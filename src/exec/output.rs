// src/exec/output.rs

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::broadcast::OutputRegistry;

const READ_CHUNK: usize = 8 * 1024;

/// Copy the installer's combined output into the registry until end-of-file.
///
/// This task is the only publisher of `CmdOutput` frames for a run, so
/// chunks reach the buffer and every subscriber in read order.
pub async fn pump_output<R>(run_id: u64, mut output: R, registry: Arc<OutputRegistry>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        match output.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let ready = take_complete_utf8(&mut pending);
                if !ready.is_empty() {
                    registry.publish_output(ready);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(run_id, error = %e, "failed to read installer output");
                break;
            }
        }
    }

    if !pending.is_empty() {
        registry.publish_output(pending);
    }
    debug!(run_id, "installer output stream closed");
}

/// Split off everything up to the last complete UTF-8 character.
///
/// An incomplete multi-byte sequence at the very end stays in `pending` for
/// the next read. Data that is not valid UTF-8 at all is passed through
/// unchanged.
fn take_complete_utf8(pending: &mut Vec<u8>) -> Vec<u8> {
    let held_back = incomplete_tail_len(pending);
    let tail = pending.split_off(pending.len() - held_back);
    std::mem::replace(pending, tail)
}

/// Length of a truncated multi-byte sequence at the end of `bytes`. Only the
/// last three bytes are inspected, so earlier invalid data has no effect.
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    let Some(lead) = (start..bytes.len())
        .rev()
        .find(|&i| bytes[i] & 0b1100_0000 != 0b1000_0000)
    else {
        return 0;
    };
    let expected = match bytes[lead] {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    };
    let present = bytes.len() - lead;
    if present < expected { present } else { 0 }
}
