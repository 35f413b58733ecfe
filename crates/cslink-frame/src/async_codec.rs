//! `tokio_util::codec` adapter for use with `Framed` streams.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode, encode_into, DecodeResult, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
use crate::error::FrameError;
use crate::message::Message;

/// Decodes and encodes typed messages on an async byte stream.
///
/// Malformed payloads are skipped the same way the blocking reader skips
/// them.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_payload: usize,
}

impl MessageCodec {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, FrameError> {
        loop {
            match decode(src, self.max_payload) {
                DecodeResult::Complete(message, consumed) => {
                    src.advance(consumed);
                    return Ok(Some(message));
                }
                DecodeResult::Malformed { error, consumed } => {
                    warn!(%error, consumed, "dropping malformed frame");
                    src.advance(consumed);
                }
                DecodeResult::Incomplete => {
                    src.reserve(HEADER_SIZE);
                    return Ok(None);
                }
                DecodeResult::Invalid(reason) => return Err(reason.into()),
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        let start = dst.len();
        encode_into(&message, dst)?;
        let size = dst.len() - start - HEADER_SIZE;
        if size > self.max_payload {
            dst.truncate(start);
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload,
            });
        }
        Ok(())
    }
}
