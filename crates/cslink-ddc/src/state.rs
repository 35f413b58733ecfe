use std::fmt;

use crate::identify::MacAddress;

/// Opaque identifier for a connected monitor endpoint.
///
/// Usually a platform device path such as `/dev/i2c-5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EndpointId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What a monitor told us about itself during one connection epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub mac: MacAddress,
    pub authorization: Option<u8>,
    pub source_port: Option<(u8, u8)>,
}

impl Identity {
    pub fn new(mac: MacAddress) -> Self {
        Self {
            mac,
            authorization: None,
            source_port: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Discovery polling hit its deadline without an identity.
    Timeout,
    /// The monitor never answered the authorization query.
    AuthUnavailable,
}

/// Per-endpoint authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Absent,
    Discovering,
    Identified(Identity),
    Authenticating,
    Authenticated(Identity),
    Failed(FailureReason),
}

impl AuthState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Discovering => "discovering",
            Self::Identified(_) => "identified",
            Self::Authenticating => "authenticating",
            Self::Authenticated(_) => "authenticated",
            Self::Failed(FailureReason::Timeout) => "failed-timeout",
            Self::Failed(FailureReason::AuthUnavailable) => "failed-auth-unavailable",
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Identified(identity) | Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity() {
            Some(identity) => write!(f, "{} ({})", self.name(), identity.mac),
            None => f.write_str(self.name()),
        }
    }
}
