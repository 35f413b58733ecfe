/// Errors raised by connections and channels.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] cslink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] cslink_frame::FrameError),

    /// The peer closed the connection.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The channel was shut down; nothing more can be queued.
    #[error("channel closed")]
    Closed,

    /// A background thread could not be started.
    #[error("failed to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
