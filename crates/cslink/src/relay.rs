//! Forwards authentication transitions to the GUI shell.

use cslink_ddc::{AuthState, AuthSubscriber, EndpointId};
use cslink_frame::DeviceAuthNotify;
use cslink_peer::ChannelSender;
use tracing::{debug, warn};

/// Turns each [`AuthState`] transition into `DeviceAuthNotify` messages on
/// a channel.
///
/// Messages are queued, never written inline, so the authentication tasks
/// never wait on the channel.
#[derive(Debug, Clone)]
pub struct AuthRelay {
    channel: ChannelSender,
    auth_index: u8,
}

impl AuthRelay {
    /// `auth_index` is reported in `AuthRequest`; it should match
    /// `AuthConfig::auth_index`.
    pub fn new(channel: ChannelSender, auth_index: u8) -> Self {
        Self {
            channel,
            auth_index,
        }
    }

    /// Messages describing `state`, in send order.
    pub fn notifications(&self, state: &AuthState) -> Vec<DeviceAuthNotify> {
        match state {
            AuthState::Absent => vec![DeviceAuthNotify::ExtractDevice],
            AuthState::Discovering => Vec::new(),
            AuthState::Identified(identity) => {
                vec![DeviceAuthNotify::MacAddress(identity.mac.octets())]
            }
            AuthState::Authenticating => vec![DeviceAuthNotify::AuthRequest(self.auth_index)],
            AuthState::Authenticated(identity) => {
                let mut out = vec![
                    DeviceAuthNotify::MacAddress(identity.mac.octets()),
                    DeviceAuthNotify::AuthResult(identity.authorization.unwrap_or(0)),
                ];
                if let Some((source, port)) = identity.source_port {
                    out.push(DeviceAuthNotify::SourcePortResult { source, port });
                }
                out
            }
            AuthState::Failed(_) => vec![DeviceAuthNotify::AuthResult(0)],
        }
    }
}

impl AuthSubscriber for AuthRelay {
    fn on_transition(&self, endpoint: &EndpointId, state: &AuthState) {
        for notify in self.notifications(state) {
            debug!(%endpoint, function = notify.function(), "relaying");
            if let Err(err) = self.channel.send(notify) {
                warn!(%endpoint, error = %err, "relay channel closed, dropping notification");
                return;
            }
        }
    }
}
