//! Typed payloads, one per (frame type, code) pair.
//!
//! Every payload type owns its fields and its layout. The last field of a
//! payload may be open-ended UTF-16LE text; its length is whatever the frame
//! header leaves after the fixed fields.

use std::borrow::Cow;
use std::net::SocketAddrV4;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{FrameType, MessageCode};
use crate::device::DeviceAuthNotify;
use crate::error::{ClientIdTooLong, DecodeError};
use crate::wire::{put_addr, put_utf16, PayloadReader};

/// Width of the fixed client id field.
pub const CLIENT_ID_LEN: usize = 46;

/// A payload with a fixed place in the code table.
pub trait MessagePayload: Sized {
    /// Frame type this payload travels in.
    const FRAME_TYPE: FrameType;
    /// Code byte identifying this payload.
    const CODE: MessageCode;

    /// Append the payload bytes to `dst`.
    fn encode_payload(&self, dst: &mut BytesMut);

    /// Decode a whole payload. Never returns a partially filled value.
    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError>;

    /// The encoded payload as an owned buffer.
    fn payload_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode_payload(&mut dst);
        dst.freeze()
    }
}

/// The 46-byte client identifier, NUL padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId([u8; CLIENT_ID_LEN]);

impl ClientId {
    /// Wrap raw bytes as received on the wire.
    pub fn from_bytes(bytes: [u8; CLIENT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw field bytes.
    pub fn as_bytes(&self) -> &[u8; CLIENT_ID_LEN] {
        &self.0
    }

    /// The id as text, up to the first NUL.
    pub fn as_str(&self) -> Cow<'_, str> {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(CLIENT_ID_LEN);
        String::from_utf8_lossy(&self.0[..end])
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self([0; CLIENT_ID_LEN])
    }
}

impl TryFrom<&str> for ClientId {
    type Error = ClientIdTooLong;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let bytes = value.as_bytes();
        if bytes.len() > CLIENT_ID_LEN {
            return Err(ClientIdTooLong(bytes.len()));
        }
        let mut raw = [0u8; CLIENT_ID_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(raw))
    }
}

impl std::fmt::Debug for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ClientId").field(&self.as_str()).finish()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Ask the peer for its connection status. Empty payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetConnStatusRequest;

/// Connection status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetConnStatusResponse {
    pub status: u8,
}

/// A remote client's status changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    pub client_id: ClientId,
    pub status: u8,
    pub addr: SocketAddrV4,
    pub name: String,
}

/// Offer a file to a remote client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFileRequest {
    pub addr: SocketAddrV4,
    pub client_id: ClientId,
    pub size: u64,
    pub timestamp: u64,
    pub path: String,
}

/// Accept or reject a file offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFileResponse {
    pub status: u8,
    pub addr: SocketAddrV4,
    pub client_id: ClientId,
    pub size: u64,
    pub timestamp: u64,
    pub path: String,
}

impl SendFileResponse {
    pub const REJECT: u8 = 0;
    pub const ACCEPT: u8 = 1;

    pub fn accepted(&self) -> bool {
        self.status != Self::REJECT
    }
}

/// Transfer progress for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateProgress {
    pub addr: SocketAddrV4,
    pub client_id: ClientId,
    pub size: u64,
    pub sent: u64,
    pub timestamp: u64,
    pub path: String,
}

impl UpdateProgress {
    /// Whole-percent progress, clamped to 100.
    pub fn percent(&self) -> u8 {
        if self.size == 0 {
            return 100;
        }
        let pct = (u128::from(self.sent) * 100 / u128::from(self.size)).min(100);
        pct as u8
    }
}

/// Version string reported by a remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSystemInfo {
    pub addr: SocketAddrV4,
    pub version: String,
}

/// A user-facing notification: a code plus text parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notify {
    pub timestamp: u64,
    pub code: u8,
    pub params: Vec<String>,
}

impl MessagePayload for GetConnStatusRequest {
    const FRAME_TYPE: FrameType = FrameType::Request;
    const CODE: MessageCode = MessageCode::GetConnStatus;

    fn encode_payload(&self, _dst: &mut BytesMut) {}

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        PayloadReader::new(src).finish()?;
        Ok(Self)
    }
}

impl MessagePayload for GetConnStatusResponse {
    const FRAME_TYPE: FrameType = FrameType::Response;
    const CODE: MessageCode = MessageCode::GetConnStatus;

    fn encode_payload(&self, dst: &mut BytesMut) {
        dst.put_u8(self.status);
    }

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(src);
        let status = r.u8()?;
        r.finish()?;
        Ok(Self { status })
    }
}

impl MessagePayload for ClientStatus {
    const FRAME_TYPE: FrameType = FrameType::Notify;
    const CODE: MessageCode = MessageCode::ClientStatus;

    fn encode_payload(&self, dst: &mut BytesMut) {
        dst.put_slice(self.client_id.as_bytes());
        dst.put_u8(self.status);
        put_addr(dst, &self.addr);
        put_utf16(dst, &self.name);
    }

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(src);
        Ok(Self {
            client_id: ClientId(r.array()?),
            status: r.u8()?,
            addr: r.addr()?,
            name: r.utf16_rest()?,
        })
    }
}

impl MessagePayload for SendFileRequest {
    const FRAME_TYPE: FrameType = FrameType::Request;
    const CODE: MessageCode = MessageCode::SendFile;

    fn encode_payload(&self, dst: &mut BytesMut) {
        put_addr(dst, &self.addr);
        dst.put_slice(self.client_id.as_bytes());
        dst.put_u64(self.size);
        dst.put_u64(self.timestamp);
        put_utf16(dst, &self.path);
    }

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(src);
        Ok(Self {
            addr: r.addr()?,
            client_id: ClientId(r.array()?),
            size: r.u64()?,
            timestamp: r.u64()?,
            path: r.utf16_rest()?,
        })
    }
}

impl MessagePayload for SendFileResponse {
    const FRAME_TYPE: FrameType = FrameType::Response;
    const CODE: MessageCode = MessageCode::SendFile;

    fn encode_payload(&self, dst: &mut BytesMut) {
        dst.put_u8(self.status);
        put_addr(dst, &self.addr);
        dst.put_slice(self.client_id.as_bytes());
        dst.put_u64(self.size);
        dst.put_u64(self.timestamp);
        put_utf16(dst, &self.path);
    }

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(src);
        Ok(Self {
            status: r.u8()?,
            addr: r.addr()?,
            client_id: ClientId(r.array()?),
            size: r.u64()?,
            timestamp: r.u64()?,
            path: r.utf16_rest()?,
        })
    }
}

impl MessagePayload for UpdateProgress {
    const FRAME_TYPE: FrameType = FrameType::Notify;
    const CODE: MessageCode = MessageCode::UpdateProgress;

    fn encode_payload(&self, dst: &mut BytesMut) {
        put_addr(dst, &self.addr);
        dst.put_slice(self.client_id.as_bytes());
        dst.put_u64(self.size);
        dst.put_u64(self.sent);
        dst.put_u64(self.timestamp);
        put_utf16(dst, &self.path);
    }

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(src);
        Ok(Self {
            addr: r.addr()?,
            client_id: ClientId(r.array()?),
            size: r.u64()?,
            sent: r.u64()?,
            timestamp: r.u64()?,
            path: r.utf16_rest()?,
        })
    }
}

impl MessagePayload for UpdateSystemInfo {
    const FRAME_TYPE: FrameType = FrameType::Notify;
    const CODE: MessageCode = MessageCode::UpdateSystemInfo;

    fn encode_payload(&self, dst: &mut BytesMut) {
        put_addr(dst, &self.addr);
        put_utf16(dst, &self.version);
    }

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(src);
        Ok(Self {
            addr: r.addr()?,
            version: r.utf16_rest()?,
        })
    }
}

impl MessagePayload for Notify {
    const FRAME_TYPE: FrameType = FrameType::Notify;
    const CODE: MessageCode = MessageCode::Notify;

    fn encode_payload(&self, dst: &mut BytesMut) {
        dst.put_u64(self.timestamp);
        dst.put_u8(self.code);
        for param in &self.params {
            let mut text = BytesMut::new();
            put_utf16(&mut text, param);
            dst.put_u32(text.len() as u32);
            dst.put_slice(&text);
        }
    }

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(src);
        let timestamp = r.u64()?;
        let code = r.u8()?;
        let mut params = Vec::new();
        while r.remaining() > 0 {
            let len = r.u32()? as usize;
            params.push(crate::wire::decode_utf16(r.take(len)?)?);
        }
        Ok(Self {
            timestamp,
            code,
            params,
        })
    }
}

/// Any message in the code table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    GetConnStatusRequest(GetConnStatusRequest),
    GetConnStatusResponse(GetConnStatusResponse),
    ClientStatus(ClientStatus),
    SendFileRequest(SendFileRequest),
    SendFileResponse(SendFileResponse),
    UpdateProgress(UpdateProgress),
    UpdateSystemInfo(UpdateSystemInfo),
    Notify(Notify),
    DeviceAuthNotify(DeviceAuthNotify),
}

macro_rules! dispatch_payload {
    ($message:expr, $payload:ident => $body:expr) => {
        match $message {
            Message::GetConnStatusRequest($payload) => $body,
            Message::GetConnStatusResponse($payload) => $body,
            Message::ClientStatus($payload) => $body,
            Message::SendFileRequest($payload) => $body,
            Message::SendFileResponse($payload) => $body,
            Message::UpdateProgress($payload) => $body,
            Message::UpdateSystemInfo($payload) => $body,
            Message::Notify($payload) => $body,
            Message::DeviceAuthNotify($payload) => $body,
        }
    };
}

fn type_of<P: MessagePayload>(_: &P) -> FrameType {
    P::FRAME_TYPE
}

fn code_of<P: MessagePayload>(_: &P) -> MessageCode {
    P::CODE
}

impl Message {
    /// Frame type this message is sent with.
    pub fn frame_type(&self) -> FrameType {
        dispatch_payload!(self, p => type_of(p))
    }

    /// Code byte for this message.
    pub fn code(&self) -> MessageCode {
        dispatch_payload!(self, p => code_of(p))
    }

    /// Append the payload bytes to `dst`.
    pub fn encode_payload(&self, dst: &mut BytesMut) {
        dispatch_payload!(self, p => p.encode_payload(dst))
    }

    /// Decode the payload selected by a validated header.
    pub fn from_parts(
        frame_type: FrameType,
        code: MessageCode,
        payload: &[u8],
    ) -> Result<Self, DecodeError> {
        let message = match (code, frame_type) {
            (MessageCode::GetConnStatus, FrameType::Request) => {
                Self::GetConnStatusRequest(GetConnStatusRequest::decode_payload(payload)?)
            }
            (MessageCode::GetConnStatus, FrameType::Response) => {
                Self::GetConnStatusResponse(GetConnStatusResponse::decode_payload(payload)?)
            }
            (MessageCode::ClientStatus, FrameType::Notify) => Self::ClientStatus(ClientStatus::decode_payload(payload)?),
            (MessageCode::SendFile, FrameType::Request) => {
                Self::SendFileRequest(SendFileRequest::decode_payload(payload)?)
            }
            (MessageCode::SendFile, FrameType::Response) => {
                Self::SendFileResponse(SendFileResponse::decode_payload(payload)?)
            }
            (MessageCode::UpdateProgress, FrameType::Notify) => {
                Self::UpdateProgress(UpdateProgress::decode_payload(payload)?)
            }
            (MessageCode::UpdateSystemInfo, FrameType::Notify) => {
                Self::UpdateSystemInfo(UpdateSystemInfo::decode_payload(payload)?)
            }
            (MessageCode::Notify, FrameType::Notify) => Self::Notify(Notify::decode_payload(payload)?),
            (MessageCode::DeviceAuthNotify, FrameType::Notify) => {
                Self::DeviceAuthNotify(DeviceAuthNotify::decode_payload(payload)?)
            }
            (code, frame_type) => return Err(DecodeError::UnexpectedType { code, frame_type }),
        };
        Ok(message)
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Message {
                fn from(payload: $variant) -> Self {
                    Message::$variant(payload)
                }
            }
        )*
    };
}

impl_from_payload!(
    GetConnStatusRequest,
    GetConnStatusResponse,
    ClientStatus,
    SendFileRequest,
    SendFileResponse,
    UpdateProgress,
    UpdateSystemInfo,
    Notify,
    DeviceAuthNotify,
);

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::codec::{decode, encode, DecodeResult, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};

    fn addr() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(192, 168, 30, 1), 12345)
    }

    fn client_id() -> ClientId {
        ClientId::try_from("a3f1c2d4-5e6f-4708-9a1b-2c3d4e5f6a7b").unwrap()
    }

    fn roundtrip(message: Message) {
        let wire = encode(&message).unwrap();
        match decode(&wire, DEFAULT_MAX_PAYLOAD) {
            DecodeResult::Complete(decoded, consumed) => {
                assert_eq!(decoded, message);
                assert_eq!(consumed, wire.len());
            }
            other => panic!("expected Complete for {message:?}, got {other:?}"),
        }
    }

    #[test]
    fn every_message_kind_roundtrips() {
        let samples: Vec<Message> = vec![
            GetConnStatusRequest.into(),
            GetConnStatusResponse { status: 1 }.into(),
            ClientStatus {
                client_id: client_id(),
                status: 1,
                addr: addr(),
                name: "会議室のPC".to_string(),
            }
            .into(),
            SendFileRequest {
                addr: addr(),
                client_id: client_id(),
                size: 5 * 1024 * 1024 * 1024,
                timestamp: 1_700_000_000_000,
                path: "C:\\Users\\me\\Documents\\résumé.pdf".to_string(),
            }
            .into(),
            SendFileResponse {
                status: SendFileResponse::ACCEPT,
                addr: addr(),
                client_id: client_id(),
                size: 42,
                timestamp: 7,
                path: "/home/me/notes.txt".to_string(),
            }
            .into(),
            UpdateProgress {
                addr: addr(),
                client_id: client_id(),
                size: 1000,
                sent: 250,
                timestamp: 99,
                path: "photo 📷.jpg".to_string(),
            }
            .into(),
            UpdateSystemInfo {
                addr: addr(),
                version: "3.2.1-beta".to_string(),
            }
            .into(),
            Notify {
                timestamp: 1_700_000_000_123,
                code: 4,
                params: vec!["Ünïcødé".to_string(), String::new(), "second".to_string()],
            }
            .into(),
            DeviceAuthNotify::MacAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]).into(),
        ];

        for message in samples {
            roundtrip(message);
        }
    }

    #[test]
    fn empty_text_fields_roundtrip() {
        roundtrip(
            ClientStatus {
                client_id: ClientId::default(),
                status: 0,
                addr: addr(),
                name: String::new(),
            }
            .into(),
        );
        roundtrip(
            UpdateSystemInfo {
                addr: addr(),
                version: String::new(),
            }
            .into(),
        );
        roundtrip(
            Notify {
                timestamp: 0,
                code: 0,
                params: Vec::new(),
            }
            .into(),
        );
    }

    #[test]
    fn send_file_request_layout() {
        let request = SendFileRequest {
            addr: addr(),
            client_id: client_id(),
            size: 0x0102_0304_0506_0708,
            timestamp: 0x1112_1314_1516_1718,
            path: "a".to_string(),
        };
        let payload = request.payload_bytes();
        assert_eq!(payload.len(), 6 + 46 + 8 + 8 + 2);
        assert_eq!(&payload[..6], &[0xC0, 0xA8, 0x1E, 0x01, 0x30, 0x39]);
        assert_eq!(&payload[52..60], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&payload[68..], &[b'a', 0]);
    }

    #[test]
    fn send_file_response_leads_with_status() {
        let response = SendFileResponse {
            status: SendFileResponse::REJECT,
            addr: addr(),
            client_id: client_id(),
            size: 1,
            timestamp: 2,
            path: String::new(),
        };
        let payload = response.payload_bytes();
        assert_eq!(payload[0], 0);
        assert_eq!(payload.len(), 1 + 6 + 46 + 16);
        assert!(!response.accepted());
    }

    #[test]
    fn notify_parameter_blocks_are_length_prefixed() {
        let notify = Notify {
            timestamp: 1,
            code: 2,
            params: vec!["hi".to_string()],
        };
        let payload = notify.payload_bytes();
        assert_eq!(&payload[..9], &[0, 0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&payload[9..13], &[0, 0, 0, 4]);
        assert_eq!(&payload[13..], &[b'h', 0, b'i', 0]);
    }

    #[test]
    fn notify_truncated_parameter_rejected() {
        let mut payload = BytesMut::new();
        payload.put_u64(1);
        payload.put_u8(2);
        payload.put_u32(10);
        payload.put_slice(&[b'x', 0]);
        assert_eq!(
            Notify::decode_payload(&payload),
            Err(DecodeError::Truncated {
                needed: 23,
                available: 15
            })
        );
    }

    #[test]
    fn fixed_payload_with_extra_bytes_rejected() {
        assert_eq!(
            GetConnStatusResponse::decode_payload(&[1, 2]),
            Err(DecodeError::LengthMismatch {
                expected: 1,
                actual: 2
            })
        );
        assert!(GetConnStatusRequest::decode_payload(&[0]).is_err());
    }

    #[test]
    fn wrong_frame_type_for_code_is_malformed_not_invalid() {
        let payload = GetConnStatusResponse { status: 1 }.payload_bytes();
        let mut wire = BytesMut::new();
        crate::codec::encode_frame(FrameType::Notify, MessageCode::GetConnStatus, &payload, &mut wire)
            .unwrap();

        assert_eq!(
            decode(&wire, DEFAULT_MAX_PAYLOAD),
            DecodeResult::Malformed {
                error: DecodeError::UnexpectedType {
                    code: MessageCode::GetConnStatus,
                    frame_type: FrameType::Notify,
                },
                consumed: HEADER_SIZE + 1,
            }
        );
    }

    #[test]
    fn odd_length_name_is_rejected_whole() {
        let mut payload = BytesMut::new();
        ClientStatus {
            client_id: client_id(),
            status: 1,
            addr: addr(),
            name: "ab".to_string(),
        }
        .encode_payload(&mut payload);
        payload.truncate(payload.len() - 1);

        assert_eq!(
            ClientStatus::decode_payload(&payload),
            Err(DecodeError::OddTextLength(3))
        );
    }

    #[test]
    fn client_id_pads_and_trims() {
        let id = ClientId::try_from("host-7").unwrap();
        assert_eq!(&id.as_bytes()[..6], b"host-7");
        assert!(id.as_bytes()[6..].iter().all(|&b| b == 0));
        assert_eq!(id.as_str(), "host-7");
        assert_eq!(id.to_string(), "host-7");

        let full = ClientId::from_bytes([b'Q'; CLIENT_ID_LEN]);
        assert_eq!(full.as_str().len(), CLIENT_ID_LEN);

        let too_long = "x".repeat(CLIENT_ID_LEN + 1);
        assert_eq!(
            ClientId::try_from(too_long.as_str()),
            Err(ClientIdTooLong(CLIENT_ID_LEN + 1))
        );
    }

    #[test]
    fn progress_percent() {
        let mut progress = UpdateProgress {
            addr: addr(),
            client_id: client_id(),
            size: 400,
            sent: 100,
            timestamp: 0,
            path: String::new(),
        };
        assert_eq!(progress.percent(), 25);
        progress.sent = 900;
        assert_eq!(progress.percent(), 100);
        progress.size = 0;
        assert_eq!(progress.percent(), 100);
    }
}
