//! Local byte-stream transport for cslink.
//!
//! The GUI shell and the desktop client talk over a single named duplex
//! stream. On Unix this is a Unix domain socket whose path is derived from a
//! well-known endpoint name (see [`endpoint_path`]).
//!
//! This is the lowest layer of cslink. Framing lives in `cslink-frame`,
//! connection management in `cslink-peer`.

pub mod endpoint;
pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{endpoint_path, DEFAULT_ENDPOINT_NAME};
pub use error::{Result, TransportError};
pub use stream::IpcStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
