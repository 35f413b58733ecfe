use std::path::PathBuf;

/// Errors raised by the local stream transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening endpoint failed.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Connecting to a listening endpoint failed.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Accepting an incoming connection failed.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on an established stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path does not fit in `sockaddr_un`.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The stream or listener has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// The underlying I/O error, if this variant carries one.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            Self::Bind { source, .. } | Self::Connect { source, .. } => Some(source),
            Self::Accept(err) | Self::Io(err) => Some(err),
            Self::PathTooLong { .. } | Self::Shutdown => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
