//! RTKCS message framing for cslink.
//!
//! Every message travels in one frame:
//! - the 5-byte magic `RTKCS`
//! - a 1-byte frame type (request, response, notify)
//! - a 1-byte message code
//! - a 4-byte big-endian payload length
//!
//! Payloads are typed per (type, code) pair; see [`Message`]. Readers handle
//! partial input, so callers only ever see whole messages.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod buffer;
pub mod codec;
pub mod device;
pub mod error;
pub mod message;
pub mod reader;
mod wire;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::MessageCodec;
pub use buffer::ReassemblyBuffer;
pub use codec::{
    decode, decode_frame, encode, encode_frame, encode_into, parse_header, DecodeResult, Frame,
    FrameConfig, FrameType, Header, MessageCode, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
};
pub use device::DeviceAuthNotify;
pub use error::{ClientIdTooLong, DecodeError, FrameError, InvalidFrame, Result};
pub use message::{
    ClientId, ClientStatus, GetConnStatusRequest, GetConnStatusResponse, Message, MessagePayload,
    Notify, SendFileRequest, SendFileResponse, UpdateProgress, UpdateSystemInfo, CLIENT_ID_LEN,
};
pub use reader::MessageReader;
pub use wire::ADDR_LEN;
pub use writer::MessageWriter;
