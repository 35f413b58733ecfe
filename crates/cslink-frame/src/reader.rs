use std::io::{ErrorKind, Read};

use cslink_transport::IpcStream;

use crate::buffer::ReassemblyBuffer;
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::message::Message;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads typed messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get whole messages.
/// Frames whose payload does not decode are logged and skipped. A read
/// timeout surfaces as an I/O error with the buffered bytes kept, so the
/// call can simply be repeated.
pub struct MessageReader<T> {
    inner: T,
    buf: ReassemblyBuffer,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: ReassemblyBuffer::new(config.max_payload_size),
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = self.buf.next_message()? {
                return Ok(message);
            }
            self.fill()?;
        }
    }

    /// Block until at least one message is available, then return every
    /// complete message buffered. Only a partial frame is left behind, or
    /// broken framing that the next call reports as `Invalid`.
    pub fn read_batch(&mut self) -> Result<Vec<Message>> {
        loop {
            let messages = self.buf.drain()?;
            if !messages.is_empty() {
                return Ok(messages);
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.buf.extend(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Bytes received but not yet forming a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl MessageReader<IpcStream> {
    /// Create a reader for `IpcStream` and apply the read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode, encode_frame, encode_into, FrameType, MessageCode, MAGIC};
    use crate::device::DeviceAuthNotify;
    use crate::error::InvalidFrame;
    use crate::message::{GetConnStatusRequest, GetConnStatusResponse};
    use crate::writer::MessageWriter;

    fn wire(messages: &[Message]) -> Vec<u8> {
        let mut dst = BytesMut::new();
        for message in messages {
            encode_into(message, &mut dst).unwrap();
        }
        dst.to_vec()
    }

    #[test]
    fn read_single_message() {
        let message: Message = GetConnStatusResponse { status: 1 }.into();
        let mut reader = MessageReader::new(Cursor::new(wire(&[message.clone()])));
        assert_eq!(reader.read_message().unwrap(), message);
    }

    #[test]
    fn read_multiple_messages_in_order() {
        let messages: Vec<Message> = vec![
            GetConnStatusRequest.into(),
            DeviceAuthNotify::AuthRequest(2).into(),
            DeviceAuthNotify::ExtractDevice.into(),
        ];
        let mut reader = MessageReader::new(Cursor::new(wire(&messages)));
        for expected in &messages {
            assert_eq!(&reader.read_message().unwrap(), expected);
        }
        assert!(matches!(reader.read_message(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn read_batch_drains_everything_complete() {
        let messages: Vec<Message> = vec![
            DeviceAuthNotify::MacAddress([1, 2, 3, 4, 5, 6]).into(),
            DeviceAuthNotify::AuthResult(1).into(),
        ];
        let mut bytes = wire(&messages);
        let tail = encode(&DeviceAuthNotify::ExtractDevice.into()).unwrap();
        bytes.extend_from_slice(&tail[..4]);

        let mut reader = MessageReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_batch().unwrap(), messages);
        assert_eq!(reader.buffered(), 4);
    }

    #[test]
    fn read_batch_returns_messages_before_reporting_garbage() {
        let good: Message = DeviceAuthNotify::AuthResult(1).into();
        let mut bytes = wire(&[good.clone()]);
        bytes.extend_from_slice(b"XXXXXXXXXXXX");

        let mut reader = MessageReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_batch().unwrap(), vec![good]);
        assert!(matches!(
            reader.read_batch(),
            Err(FrameError::Invalid(InvalidFrame::BadMagic))
        ));
    }

    #[test]
    fn partial_read_handling() {
        let message: Message = DeviceAuthNotify::SourcePortResult { source: 0x11, port: 1 }.into();
        let byte_reader = ByteByByteReader {
            bytes: wire(&[message.clone()]),
            pos: 0,
        };
        let mut reader = MessageReader::new(byte_reader);
        assert_eq!(reader.read_message().unwrap(), message);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = MessageReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.extend_from_slice(&MAGIC);
        partial.extend_from_slice(&[2, 9, 0, 0, 0, 7, 1, 0xAA]);

        let mut reader = MessageReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn invalid_magic_in_stream() {
        let bytes = b"HELLO\x02\x09\x00\x00\x00\x00".to_vec();
        let mut reader = MessageReader::new(Cursor::new(bytes));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::Invalid(InvalidFrame::BadMagic)));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[2, 7, 0, 0, 4, 0]);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = MessageReader::with_config(Cursor::new(bytes), cfg);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Invalid(InvalidFrame::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn malformed_payload_is_skipped() {
        let mut bytes = BytesMut::new();
        encode_frame(FrameType::Notify, MessageCode::DeviceAuthNotify, &[42], &mut bytes).unwrap();
        let good: Message = DeviceAuthNotify::ExtractDevice.into();
        encode_into(&good, &mut bytes).unwrap();

        let mut reader = MessageReader::new(Cursor::new(bytes.to_vec()));
        assert_eq!(reader.read_message().unwrap(), good);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn would_block_keeps_buffered_bytes() {
        let message: Message = DeviceAuthNotify::AuthResult(1).into();
        let bytes = wire(&[message.clone()]);
        let reader = StallMidFrame {
            bytes,
            pos: 0,
            stall_at: 5,
            stalled: false,
        };
        let mut framed = MessageReader::new(reader);

        let err = framed.read_message().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(framed.buffered(), 5);

        assert_eq!(framed.read_message().unwrap(), message);
    }

    struct StallMidFrame {
        bytes: Vec<u8>,
        pos: usize,
        stall_at: usize,
        stalled: bool,
    }

    impl Read for StallMidFrame {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos == self.stall_at && !self.stalled {
                self.stalled = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let end = if self.stalled {
                self.bytes.len()
            } else {
                self.stall_at
            };
            let n = (end - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let message: Message = GetConnStatusRequest.into();
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[message.clone()])),
        };
        let mut framed = MessageReader::new(reader);
        assert_eq!(framed.read_message().unwrap(), message);
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_stream_pair() {
        let (left, right) = IpcStream::pair().unwrap();
        let mut writer = MessageWriter::new(left);
        let mut reader = MessageReader::new(right);

        let message: Message = DeviceAuthNotify::MacAddress([0xAA; 6]).into();
        writer.write_message(&message).unwrap();
        assert_eq!(reader.read_message().unwrap(), message);
    }

    #[test]
    #[cfg(unix)]
    fn read_timeout_applies_to_ipc_stream() {
        let (left, _right) = IpcStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        let mut reader = MessageReader::with_config_ipc(left, cfg).unwrap();
        let err = reader.read_message().unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err:?}");
    }

    #[test]
    #[cfg(unix)]
    fn concurrent_reader_writer_threads() {
        let (left, right) = IpcStream::pair().unwrap();
        let mut writer = MessageWriter::new(left);
        let mut reader = MessageReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            for expected in 0..64u8 {
                let message = reader.read_message().unwrap();
                assert_eq!(message, Message::from(DeviceAuthNotify::AuthRequest(expected)));
            }
        });

        for i in 0..64u8 {
            writer
                .write_message(&DeviceAuthNotify::AuthRequest(i).into())
                .unwrap();
        }
        reader_thread.join().unwrap();
    }
}
