/// Register access failures.
///
/// Register transports never retry; callers decide through a
/// [`RetryPolicy`](crate::retry::RetryPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The device handle is closed or was never valid.
    #[error("register handle is invalid")]
    HandleInvalid,

    /// The platform call failed with a native error code.
    #[error("register I/O failed (native code {0})")]
    IoFailure(i32),
}

impl TransportError {
    /// Map an `io::Error` onto its native code.
    pub fn from_io(err: &std::io::Error) -> Self {
        Self::IoFailure(err.raw_os_error().unwrap_or(-1))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
