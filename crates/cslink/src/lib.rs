//! Monitor authentication lifecycle relayed over a local message channel.
//!
//! A desktop client identifies DDC/CI-capable monitors, authenticates them
//! and tells a separate GUI shell what happened. The GUI shell and the client
//! exchange RTKCS frames over a local stream.
//!
//! # Crate Structure
//!
//! - [`transport`]: local stream transport and endpoint naming
//! - [`frame`]: RTKCS framing and the typed message set
//! - [`ddc`]: register access and the authentication state machine (behind `ddc` feature)
//! - [`peer`]: listeners, one-shot connections and reconnecting channels (behind `peer` feature)
//! - [`relay`]: forwards authentication transitions to a channel (needs `peer` and `ddc`)

/// Re-export transport types.
pub mod transport {
    pub use cslink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use cslink_frame::*;
}

/// Re-export DDC/CI types (requires `ddc` feature).
#[cfg(feature = "ddc")]
pub mod ddc {
    pub use cslink_ddc::*;
}

/// Re-export channel types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use cslink_peer::*;
}

#[cfg(all(feature = "peer", feature = "ddc"))]
pub mod relay;
