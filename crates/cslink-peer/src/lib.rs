//! Connection management for the cslink message protocol.
//!
//! [`ChannelListener`] is the accepting side: every client gets its own
//! `conn-N` id and thread. [`Channel`] is the dialing side: it reconnects on
//! its own and keeps outbound messages queued across outages. [`connect`]
//! opens a single one-shot [`Connection`].

pub mod channel;
pub mod connection;
pub mod connector;
pub mod error;
#[cfg(unix)]
pub mod listener;

#[cfg(all(test, unix))]
mod test_support;

pub use channel::{Channel, ChannelConfig, ChannelHandle, ChannelSender, ChannelState};
pub use connection::{Connection, Dispatcher};
pub use connector::{connect, connect_endpoint, connect_with_config};
pub use error::{ChannelError, Result};
#[cfg(unix)]
pub use listener::ChannelListener;
