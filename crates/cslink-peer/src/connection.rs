use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use cslink_frame::{FrameConfig, FrameError, Message, MessageReader, MessageWriter};
use cslink_transport::IpcStream;
use tracing::{debug, trace};

use crate::error::{ChannelError, Result};

/// Handles inbound messages. A returned message is sent back on the same
/// connection.
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, connection: &str, message: Message) -> Option<Message>;
}

impl<F> Dispatcher for F
where
    F: Fn(&str, Message) -> Option<Message> + Send + Sync + 'static,
{
    fn dispatch(&self, connection: &str, message: Message) -> Option<Message> {
        self(connection, message)
    }
}

/// One established connection, split into a reader and a writer.
pub struct Connection {
    id: String,
    reader: MessageReader<IpcStream>,
    writer: MessageWriter<IpcStream>,
}

impl Connection {
    pub(crate) fn from_stream(id: String, stream: IpcStream, config: &FrameConfig) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        let reader = MessageReader::with_config_ipc(reader_stream, config.clone())?;
        let writer = MessageWriter::with_config_ipc(stream, config.clone())?;
        Ok(Self { id, reader, writer })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn send(&mut self, message: &Message) -> Result<()> {
        self.writer.write_message(message)?;
        Ok(())
    }

    /// Block until the next message arrives.
    ///
    /// Returns `ChannelError::Disconnected` once the peer closes the stream.
    pub fn recv(&mut self) -> Result<Message> {
        match self.reader.read_message() {
            Ok(message) => Ok(message),
            Err(FrameError::ConnectionClosed) => Err(ChannelError::Disconnected(self.id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Send `message` and wait for the next inbound message.
    pub fn request(&mut self, message: &Message) -> Result<Message> {
        self.send(message)?;
        self.recv()
    }

    /// Dispatch every inbound message until the peer disconnects.
    ///
    /// Replies are written back in dispatch order. A framing violation or
    /// I/O error ends the connection with that error.
    pub fn serve(self, dispatcher: &dyn Dispatcher) -> Result<()> {
        let Self {
            id,
            mut reader,
            mut writer,
        } = self;
        let running = AtomicBool::new(false);
        pump(&mut reader, &id, &running, |message| {
            if let Some(reply) = dispatcher.dispatch(&id, message) {
                trace!(connection = %id, code = ?reply.code(), "sending reply");
                writer.write_message(&reply)?;
            }
            Ok(())
        })
    }

    /// Close both directions of the underlying stream.
    pub fn shutdown(&self) -> Result<()> {
        self.writer.get_ref().shutdown()?;
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (String, MessageReader<IpcStream>, MessageWriter<IpcStream>) {
        (self.id, self.reader, self.writer)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

/// Open a stream to a listening endpoint.
pub(crate) fn dial(path: &Path) -> Result<IpcStream> {
    #[cfg(not(unix))]
    {
        return Err(cslink_transport::TransportError::Connect {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "cslink-peer requires Unix domain sockets",
            ),
        }
        .into());
    }

    #[cfg(unix)]
    {
        Ok(cslink_transport::UnixDomainSocket::connect(path)?)
    }
}

/// Read batches and hand each message to `on_message` until the peer
/// closes the stream or `stop` is set.
///
/// Read timeouts only re-check `stop`. A clean close returns `Ok`.
pub(crate) fn pump<F>(
    reader: &mut MessageReader<IpcStream>,
    id: &str,
    stop: &AtomicBool,
    mut on_message: F,
) -> Result<()>
where
    F: FnMut(Message) -> std::result::Result<(), FrameError>,
{
    while !stop.load(Ordering::Acquire) {
        match reader.read_batch() {
            Ok(messages) => {
                trace!(connection = id, count = messages.len(), "read batch");
                for message in messages {
                    on_message(message)?;
                }
            }
            Err(err) if err.is_timeout() => continue,
            Err(FrameError::ConnectionClosed) => {
                debug!(connection = id, "peer closed connection");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
