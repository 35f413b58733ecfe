use bytes::{Buf, BytesMut};
use tracing::warn;

use crate::codec::{decode, DecodeResult, DEFAULT_MAX_PAYLOAD};
use crate::error::InvalidFrame;
use crate::message::Message;

const INITIAL_CAPACITY: usize = 8 * 1024;

/// Bytes received on one connection that do not yet form a complete frame.
///
/// Owned by the connection's read side. After a successful
/// [`drain`](Self::drain) the buffer is empty, holds a strict prefix of the
/// next frame, or starts with broken framing the next call reports.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    buf: BytesMut,
    max_payload: usize,
}

impl ReassemblyBuffer {
    pub fn new(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
            max_payload,
        }
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Buffered bytes, front first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything, e.g. on disconnect.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Decode the frame at the front without consuming it.
    pub fn peek(&self) -> DecodeResult {
        decode(&self.buf, self.max_payload)
    }

    /// Consume `n` bytes from the front.
    pub fn advance(&mut self, n: usize) {
        self.buf.advance(n.min(self.buf.len()));
    }

    /// Pop the next decodable message.
    ///
    /// Malformed frames are logged and skipped. `Ok(None)` means only a
    /// partial frame (or nothing) remains.
    pub fn next_message(&mut self) -> Result<Option<Message>, InvalidFrame> {
        loop {
            match self.peek() {
                DecodeResult::Complete(message, consumed) => {
                    self.advance(consumed);
                    return Ok(Some(message));
                }
                DecodeResult::Malformed { error, consumed } => {
                    warn!(%error, consumed, "dropping malformed frame");
                    self.advance(consumed);
                }
                DecodeResult::Incomplete => return Ok(None),
                DecodeResult::Invalid(reason) => return Err(reason),
            }
        }
    }

    /// Pop every complete message currently buffered.
    ///
    /// Messages ahead of broken framing are still returned; the broken bytes
    /// stay at the front and the next call reports them as `Err`. Callers
    /// must tear the connection down on `Err`.
    pub fn drain(&mut self) -> Result<Vec<Message>, InvalidFrame> {
        let mut messages = Vec::new();
        loop {
            match self.next_message() {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => return Ok(messages),
                Err(reason) if messages.is_empty() => return Err(reason),
                Err(_) => return Ok(messages),
            }
        }
    }
}

impl Default for ReassemblyBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}
