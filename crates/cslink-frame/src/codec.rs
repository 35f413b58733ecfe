use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, FrameError, InvalidFrame, Result};
use crate::message::Message;

/// Frame header: magic (5) + type (1) + code (1) + length (4) = 11 bytes.
pub const HEADER_SIZE: usize = 11;

/// Magic bytes: ASCII "RTKCS".
pub const MAGIC: [u8; 5] = *b"RTKCS";

/// Default maximum payload size: 1 MiB. This is a status channel, not a data path.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

const TYPE_OFFSET: usize = 5;
const CODE_OFFSET: usize = 6;
const LENGTH_OFFSET: usize = 7;

/// Frame direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Request = 0,
    Response = 1,
    Notify = 2,
}

impl TryFrom<u8> for FrameType {
    type Error = InvalidFrame;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Request),
            1 => Ok(Self::Response),
            2 => Ok(Self::Notify),
            other => Err(InvalidFrame::UnknownType(other)),
        }
    }
}

/// Message kind carried in the header's code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageCode {
    GetConnStatus = 1,
    ClientStatus = 3,
    SendFile = 4,
    UpdateProgress = 5,
    Notify = 7,
    UpdateSystemInfo = 8,
    DeviceAuthNotify = 9,
}

impl MessageCode {
    /// Human-readable name for logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Self::GetConnStatus => "GET_CONN_STATUS",
            Self::ClientStatus => "CLIENT_STATUS",
            Self::SendFile => "SEND_FILE",
            Self::UpdateProgress => "UPDATE_PROGRESS",
            Self::Notify => "NOTIFY",
            Self::UpdateSystemInfo => "UPDATE_SYSTEM_INFO",
            Self::DeviceAuthNotify => "DEVICE_AUTH_NOTIFY",
        }
    }
}

impl TryFrom<u8> for MessageCode {
    type Error = InvalidFrame;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::GetConnStatus),
            3 => Ok(Self::ClientStatus),
            4 => Ok(Self::SendFile),
            5 => Ok(Self::UpdateProgress),
            7 => Ok(Self::Notify),
            8 => Ok(Self::UpdateSystemInfo),
            9 => Ok(Self::DeviceAuthNotify),
            other => Err(InvalidFrame::UnknownCode(other)),
        }
    }
}

/// A validated frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub frame_type: FrameType,
    pub code: MessageCode,
    pub payload_len: usize,
}

impl Header {
    /// Header plus payload.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len
    }
}

/// A raw frame: validated header fields plus an undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub code: MessageCode,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(frame_type: FrameType, code: MessageCode, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            code,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Decode the payload into its typed message.
    pub fn to_message(&self) -> std::result::Result<Message, DecodeError> {
        Message::from_parts(self.frame_type, self.code, &self.payload)
    }
}

/// Outcome of one decode attempt against buffered bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeResult {
    /// A full message and the number of bytes it occupied.
    Complete(Message, usize),
    /// More bytes are needed. Nothing was consumed.
    Incomplete,
    /// Framing is broken; the connection must be dropped.
    Invalid(InvalidFrame),
    /// A complete frame whose payload did not decode. Skip `consumed` bytes.
    Malformed { error: DecodeError, consumed: usize },
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Validate as much of a header as `src` holds.
///
/// Each field is checked as soon as its bytes are present, in wire order:
/// magic, type, code, then the declared length against `max_payload`.
/// Returns `Ok(None)` while the header is still partial.
pub fn parse_header(src: &[u8], max_payload: usize) -> std::result::Result<Option<Header>, InvalidFrame> {
    let seen = src.len().min(MAGIC.len());
    if src[..seen] != MAGIC[..seen] {
        return Err(InvalidFrame::BadMagic);
    }

    let Some(&type_byte) = src.get(TYPE_OFFSET) else {
        return Ok(None);
    };
    let frame_type = FrameType::try_from(type_byte)?;

    let Some(&code_byte) = src.get(CODE_OFFSET) else {
        return Ok(None);
    };
    let code = MessageCode::try_from(code_byte)?;

    let Some(len_bytes) = src.get(LENGTH_OFFSET..HEADER_SIZE) else {
        return Ok(None);
    };
    let payload_len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if payload_len > max_payload {
        return Err(InvalidFrame::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    Ok(Some(Header {
        frame_type,
        code,
        payload_len,
    }))
}

/// Write one frame into `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────┬──────┬───────────┬──────────────────┐
/// │ Magic (5B)   │ Type │ Code │ Length    │ Payload          │
/// │ "RTKCS"      │ (1B) │ (1B) │ (4B BE)   │ (Length bytes)   │
/// └──────────────┴──────┴──────┴───────────┴──────────────────┘
/// ```
pub fn encode_frame(
    frame_type: FrameType,
    code: MessageCode,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u8(frame_type as u8);
    dst.put_u8(code as u8);
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one raw frame, consuming it from `src` on success.
///
/// Returns `Ok(None)` without consuming anything while the frame is partial.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(header) = parse_header(src, max_payload)? else {
        return Ok(None);
    };
    if src.len() < header.frame_len() {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(header.payload_len).freeze();
    Ok(Some(Frame {
        frame_type: header.frame_type,
        code: header.code,
        payload,
    }))
}

/// Encode a typed message into a standalone frame.
///
/// The length field is computed from the encoded payload.
pub fn encode(message: &Message) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_into(message, &mut dst)?;
    Ok(dst.freeze())
}

/// Append a typed message frame to `dst`.
pub fn encode_into(message: &Message, dst: &mut BytesMut) -> Result<()> {
    let mut payload = BytesMut::new();
    message.encode_payload(&mut payload);
    encode_frame(message.frame_type(), message.code(), &payload, dst)
}

/// Try to decode one typed message from the front of `src`.
///
/// Never mutates its input: the caller advances past `consumed` bytes on
/// `Complete` and `Malformed`, waits for more input on `Incomplete`, and drops
/// the connection on `Invalid`.
pub fn decode(src: &[u8], max_payload: usize) -> DecodeResult {
    let header = match parse_header(src, max_payload) {
        Ok(Some(header)) => header,
        Ok(None) => return DecodeResult::Incomplete,
        Err(reason) => return DecodeResult::Invalid(reason),
    };

    let consumed = header.frame_len();
    let Some(payload) = src.get(HEADER_SIZE..consumed) else {
        return DecodeResult::Incomplete;
    };

    match Message::from_parts(header.frame_type, header.code, payload) {
        Ok(message) => DecodeResult::Complete(message, consumed),
        Err(error) => DecodeResult::Malformed { error, consumed },
    }
}
