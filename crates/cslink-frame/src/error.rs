use crate::codec::{FrameType, MessageCode};

/// Unrecoverable header problems. Framing on the stream is lost; the
/// connection carrying it must be torn down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFrame {
    /// The stream does not start with `RTKCS`.
    #[error("invalid frame magic (expected \"RTKCS\")")]
    BadMagic,

    /// The type byte is outside 0..=2.
    #[error("unknown frame type {0}")]
    UnknownType(u8),

    /// The code byte is not a known message kind.
    #[error("unknown message code {0}")]
    UnknownCode(u8),

    /// The declared payload length exceeds the configured maximum.
    #[error("declared payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// A complete frame whose payload violates its message's layout.
///
/// The frame boundary is intact, so only this message is dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload ends before a fixed-width field.
    #[error("payload truncated (need {needed} bytes, have {available})")]
    Truncated { needed: usize, available: usize },

    /// A fixed-size payload carries extra bytes.
    #[error("payload length mismatch (expected {expected} bytes, got {actual})")]
    LengthMismatch { expected: usize, actual: usize },

    /// UTF-16 text must be an even number of bytes.
    #[error("utf-16 text has odd byte length {0}")]
    OddTextLength(usize),

    /// UTF-16 text contains an unpaired surrogate.
    #[error("utf-16 text is not valid")]
    InvalidText,

    /// A known code arrived with a frame type it is never sent with.
    #[error("{code:?} is not valid as a {frame_type:?} frame")]
    UnexpectedType {
        code: MessageCode,
        frame_type: FrameType,
    },

    /// `DeviceAuthNotify` carried an unknown function byte.
    #[error("unknown device auth function {0}")]
    UnknownFunction(u8),
}

/// A client id string does not fit the fixed 46-byte field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("client id is {0} bytes, max 46")]
pub struct ClientIdTooLong(pub usize);

/// Errors raised while moving frames over a stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The inbound stream violated framing.
    #[error("invalid frame: {0}")]
    Invalid(#[from] InvalidFrame),

    /// An outbound payload exceeds the configured or wire maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True when a read or write timeout elapsed. Buffered state is intact and
    /// the operation can be retried.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            )
        )
    }
}

impl From<cslink_transport::TransportError> for FrameError {
    fn from(err: cslink_transport::TransportError) -> Self {
        use cslink_transport::TransportError;

        match err {
            TransportError::Io(io) | TransportError::Accept(io) => Self::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                Self::Io(source)
            }
            TransportError::Shutdown => Self::ConnectionClosed,
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
