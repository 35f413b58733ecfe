use bytes::{BufMut, BytesMut};

use crate::codec::{FrameType, MessageCode};
use crate::error::DecodeError;
use crate::message::MessagePayload;
use crate::wire::PayloadReader;

/// Monitor lifecycle events reported to the GUI shell.
///
/// Payload is a function byte followed by a fixed sub-shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAuthNotify {
    /// A monitor identified itself.
    MacAddress([u8; 6]),
    /// Authorization was requested for a client slot.
    AuthRequest(u8),
    /// Authorization finished. Zero means refused or failed.
    AuthResult(u8),
    /// Ask for the monitor's active source and port.
    SourcePortRequest,
    /// Active input source and port reported by the monitor.
    SourcePortResult { source: u8, port: u8 },
    /// The monitor was unplugged.
    ExtractDevice,
}

impl DeviceAuthNotify {
    pub const MAC_ADDRESS: u8 = 1;
    pub const AUTH_REQUEST: u8 = 2;
    pub const AUTH_RESULT: u8 = 3;
    pub const SOURCE_PORT_REQUEST: u8 = 4;
    pub const SOURCE_PORT_RESULT: u8 = 5;
    pub const EXTRACT_DEVICE: u8 = 6;

    /// The function byte that leads the payload.
    pub fn function(&self) -> u8 {
        match self {
            Self::MacAddress(_) => Self::MAC_ADDRESS,
            Self::AuthRequest(_) => Self::AUTH_REQUEST,
            Self::AuthResult(_) => Self::AUTH_RESULT,
            Self::SourcePortRequest => Self::SOURCE_PORT_REQUEST,
            Self::SourcePortResult { .. } => Self::SOURCE_PORT_RESULT,
            Self::ExtractDevice => Self::EXTRACT_DEVICE,
        }
    }
}

impl MessagePayload for DeviceAuthNotify {
    const FRAME_TYPE: FrameType = FrameType::Notify;
    const CODE: MessageCode = MessageCode::DeviceAuthNotify;

    fn encode_payload(&self, dst: &mut BytesMut) {
        dst.put_u8(self.function());
        match self {
            Self::MacAddress(mac) => dst.put_slice(mac),
            Self::AuthRequest(index) => dst.put_u8(*index),
            Self::AuthResult(result) => dst.put_u8(*result),
            Self::SourcePortResult { source, port } => {
                dst.put_u8(*source);
                dst.put_u8(*port);
            }
            Self::SourcePortRequest | Self::ExtractDevice => {}
        }
    }

    fn decode_payload(src: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PayloadReader::new(src);
        let notify = match r.u8()? {
            Self::MAC_ADDRESS => Self::MacAddress(r.array()?),
            Self::AUTH_REQUEST => Self::AuthRequest(r.u8()?),
            Self::AUTH_RESULT => Self::AuthResult(r.u8()?),
            Self::SOURCE_PORT_REQUEST => Self::SourcePortRequest,
            Self::SOURCE_PORT_RESULT => Self::SourcePortResult {
                source: r.u8()?,
                port: r.u8()?,
            },
            Self::EXTRACT_DEVICE => Self::ExtractDevice,
            other => return Err(DecodeError::UnknownFunction(other)),
        };
        r.finish()?;
        Ok(notify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_layout() {
        let payload = DeviceAuthNotify::MacAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]).payload_bytes();
        assert_eq!(payload.as_ref(), &[1, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    }

    #[test]
    fn every_function_roundtrips() {
        let all = [
            DeviceAuthNotify::MacAddress([1, 2, 3, 4, 5, 6]),
            DeviceAuthNotify::AuthRequest(3),
            DeviceAuthNotify::AuthResult(1),
            DeviceAuthNotify::SourcePortRequest,
            DeviceAuthNotify::SourcePortResult { source: 0x11, port: 2 },
            DeviceAuthNotify::ExtractDevice,
        ];
        for (n, notify) in all.into_iter().enumerate() {
            let payload = notify.payload_bytes();
            assert_eq!(payload[0] as usize, n + 1);
            assert_eq!(DeviceAuthNotify::decode_payload(&payload), Ok(notify));
        }
    }

    #[test]
    fn unknown_function_rejected() {
        assert_eq!(
            DeviceAuthNotify::decode_payload(&[7]),
            Err(DecodeError::UnknownFunction(7))
        );
        assert_eq!(
            DeviceAuthNotify::decode_payload(&[0]),
            Err(DecodeError::UnknownFunction(0))
        );
    }

    #[test]
    fn sub_shapes_must_match_exactly() {
        assert_eq!(
            DeviceAuthNotify::decode_payload(&[1, 0xAA, 0xBB]),
            Err(DecodeError::Truncated {
                needed: 7,
                available: 3
            })
        );
        assert_eq!(
            DeviceAuthNotify::decode_payload(&[6, 0]),
            Err(DecodeError::LengthMismatch {
                expected: 1,
                actual: 2
            })
        );
        assert!(DeviceAuthNotify::decode_payload(&[]).is_err());
    }
}
